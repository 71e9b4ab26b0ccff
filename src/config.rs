use crate::geometry::CurveMode;
use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Space around the content on every side.
    pub padding: f32,
    pub curve: CurveMode,
    pub min_width: f32,
    pub min_height: f32,
    /// Raster output size; `None` keeps the natural size.
    pub png_width: Option<u32>,
    pub png_height: Option<u32>,
    /// Canvas fill. Empty falls back to the theme background.
    pub background: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            padding: 8.0,
            curve: CurveMode::Basis,
            min_width: 1.0,
            min_height: 1.0,
            png_width: None,
            png_height: None,
            background: "#FFFFFF".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryConfig {
    pub obstacle_samples: usize,
    pub obstacle_margin: f32,
    pub stack_spacing: f32,
    pub stack_entry_spacing: f32,
    pub stack_curve_radius: f32,
    pub arrow_length: f32,
    pub arrow_half_width: f32,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            obstacle_samples: 19,
            obstacle_margin: 12.0,
            stack_spacing: 50.0,
            stack_entry_spacing: 15.0,
            stack_curve_radius: 24.0,
            arrow_length: 10.0,
            arrow_half_width: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionConfig {
    pub edge_hit_threshold: f32,
    pub animation_interval_ms: u64,
    pub dash_step: f32,
    pub dash_wrap: f32,
    pub dash_pattern: [f32; 2],
    pub highlight_stroke_scale: f32,
    /// Upper bound on flow-trace hops in each direction; `None` walks until
    /// a branch or revisit.
    pub trace_hops: Option<usize>,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            edge_hit_threshold: 12.0,
            animation_interval_ms: 50,
            dash_step: 2.0,
            dash_wrap: 24.0,
            dash_pattern: [8.0, 4.0],
            highlight_stroke_scale: 1.6,
            trace_hops: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub render: RenderConfig,
    pub geometry: GeometryConfig,
    pub interaction: InteractionConfig,
}

impl Default for Config {
    fn default() -> Self {
        let theme = Theme::mermaid_default();
        let render = RenderConfig {
            background: theme.background.clone(),
            ..Default::default()
        };
        Self {
            theme,
            render,
            geometry: GeometryConfig::default(),
            interaction: InteractionConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<NumberOrString>,
    background: Option<String>,
    text_color: Option<String>,
    muted_text_color: Option<String>,
    primary_color: Option<String>,
    primary_border_color: Option<String>,
    secondary_color: Option<String>,
    secondary_border_color: Option<String>,
    tertiary_color: Option<String>,
    tertiary_border_color: Option<String>,
    line_color: Option<String>,
    grid_color: Option<String>,
    edge_label_background: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f32),
    String(String),
}

impl NumberOrString {
    fn as_f32(&self) -> Option<f32> {
        match self {
            NumberOrString::Number(val) => Some(*val),
            NumberOrString::String(val) => val.trim().trim_end_matches("px").parse::<f32>().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderConfigFile {
    padding: Option<f32>,
    min_width: Option<f32>,
    min_height: Option<f32>,
    png_width: Option<u32>,
    png_height: Option<u32>,
    background: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeometryConfigFile {
    obstacle_samples: Option<usize>,
    obstacle_margin: Option<f32>,
    stack_spacing: Option<f32>,
    stack_entry_spacing: Option<f32>,
    stack_curve_radius: Option<f32>,
    arrow_length: Option<f32>,
    arrow_half_width: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InteractionConfigFile {
    edge_hit_threshold: Option<f32>,
    animation_interval_ms: Option<u64>,
    dash_step: Option<f32>,
    dash_wrap: Option<f32>,
    dash_pattern: Option<[f32; 2]>,
    highlight_stroke_scale: Option<f32>,
    trace_hops: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    curve: Option<CurveMode>,
    padding: Option<f32>,
    render: Option<RenderConfigFile>,
    geometry: Option<GeometryConfigFile>,
    interaction: Option<InteractionConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = serde_json::from_str(contents)?;

    if let Some(theme_name) = parsed.theme.as_deref() {
        config.theme = Theme::named(theme_name);
    }

    if let Some(vars) = parsed.theme_variables {
        apply_theme_variables(&mut config.theme, vars);
    }
    config.render.background = config.theme.background.clone();

    if let Some(v) = parsed.curve {
        config.render.curve = v;
    }
    if let Some(v) = parsed.padding {
        config.render.padding = v;
    }

    if let Some(render) = parsed.render {
        if let Some(v) = render.padding {
            config.render.padding = v;
        }
        if let Some(v) = render.min_width {
            config.render.min_width = v;
        }
        if let Some(v) = render.min_height {
            config.render.min_height = v;
        }
        if render.png_width.is_some() {
            config.render.png_width = render.png_width;
        }
        if render.png_height.is_some() {
            config.render.png_height = render.png_height;
        }
        if let Some(v) = render.background {
            config.render.background = v;
        }
    }

    if let Some(geometry) = parsed.geometry {
        if let Some(v) = geometry.obstacle_samples {
            config.geometry.obstacle_samples = v;
        }
        if let Some(v) = geometry.obstacle_margin {
            config.geometry.obstacle_margin = v;
        }
        if let Some(v) = geometry.stack_spacing {
            config.geometry.stack_spacing = v;
        }
        if let Some(v) = geometry.stack_entry_spacing {
            config.geometry.stack_entry_spacing = v;
        }
        if let Some(v) = geometry.stack_curve_radius {
            config.geometry.stack_curve_radius = v;
        }
        if let Some(v) = geometry.arrow_length {
            config.geometry.arrow_length = v;
        }
        if let Some(v) = geometry.arrow_half_width {
            config.geometry.arrow_half_width = v;
        }
    }

    if let Some(interaction) = parsed.interaction {
        if let Some(v) = interaction.edge_hit_threshold {
            config.interaction.edge_hit_threshold = v;
        }
        if let Some(v) = interaction.animation_interval_ms {
            config.interaction.animation_interval_ms = v.max(1);
        }
        if let Some(v) = interaction.dash_step {
            config.interaction.dash_step = v;
        }
        if let Some(v) = interaction.dash_wrap {
            config.interaction.dash_wrap = v;
        }
        if let Some(v) = interaction.dash_pattern {
            config.interaction.dash_pattern = v;
        }
        if let Some(v) = interaction.highlight_stroke_scale {
            config.interaction.highlight_stroke_scale = v;
        }
        if interaction.trace_hops.is_some() {
            config.interaction.trace_hops = interaction.trace_hops;
        }
    }

    Ok(config)
}

fn apply_theme_variables(theme: &mut Theme, vars: ThemeVariables) {
    if let Some(v) = vars.font_family {
        theme.font_family = v;
    }
    if let Some(v) = vars.font_size.as_ref().and_then(NumberOrString::as_f32) {
        theme.font_size = v;
    }
    if let Some(v) = vars.background {
        theme.background = v;
    }
    if let Some(v) = vars.text_color {
        theme.text_color = v;
    }
    if let Some(v) = vars.muted_text_color {
        theme.muted_text_color = v;
    }
    if let Some(v) = vars.primary_color {
        theme.primary_color = v;
    }
    if let Some(v) = vars.primary_border_color {
        theme.primary_border_color = v;
    }
    if let Some(v) = vars.secondary_color {
        theme.secondary_color = v;
    }
    if let Some(v) = vars.secondary_border_color {
        theme.secondary_border_color = v;
    }
    if let Some(v) = vars.tertiary_color {
        theme.tertiary_color = v;
    }
    if let Some(v) = vars.tertiary_border_color {
        theme.tertiary_border_color = v;
    }
    if let Some(v) = vars.line_color {
        theme.line_color = v;
    }
    if let Some(v) = vars.grid_color {
        theme.grid_color = v;
    }
    if let Some(v) = vars.edge_label_background {
        theme.edge_label_background = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_yields_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.theme.name, "default");
        assert_eq!(config.render.padding, 8.0);
        assert_eq!(config.geometry.obstacle_samples, 19);
        assert_eq!(config.interaction.trace_hops, None);
    }

    #[test]
    fn theme_variables_override_named_theme() {
        let config = parse_config(
            r##"{
                "theme": "dark",
                "themeVariables": { "primaryColor": "#123456", "fontSize": "18px", "background": "#000000" },
                "curve": "linear",
                "interaction": { "traceHops": 1, "dashPattern": [6, 3] }
            }"##,
        )
        .unwrap();
        assert_eq!(config.theme.name, "dark");
        assert_eq!(config.theme.primary_color, "#123456");
        assert_eq!(config.theme.font_size, 18.0);
        assert_eq!(config.render.background, "#000000");
        assert_eq!(config.render.curve, CurveMode::Linear);
        assert_eq!(config.interaction.trace_hops, Some(1));
        assert_eq!(config.interaction.dash_pattern, [6.0, 3.0]);
    }

    #[test]
    fn unknown_theme_falls_back_to_default() {
        let config = parse_config(r#"{ "theme": "solarized" }"#).unwrap();
        assert_eq!(config.theme.name, "default");
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(parse_config("{ theme: ").is_err());
    }
}
