use mermaid_rs_canvas::config::Config;
use mermaid_rs_canvas::geometry::CurveMode;
use mermaid_rs_canvas::render::render_model_json;
use mermaid_rs_canvas::skin::SkinPack;
use mermaid_rs_canvas::theme::Theme;
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CanvasRenderOptions {
    theme: Option<String>,
    font_family: Option<String>,
    font_size: Option<f32>,
    curve: Option<CurveMode>,
    padding: Option<f32>,
    skin: Option<SkinPack>,
}

fn build_config(options: &CanvasRenderOptions) -> Config {
    let mut config = Config::default();
    if let Some(name) = options.theme.as_deref() {
        config.theme = Theme::named(name);
        config.render.background = config.theme.background.clone();
    }
    if let Some(font_family) = &options.font_family {
        config.theme.font_family = font_family.clone();
    }
    if let Some(font_size) = options.font_size {
        config.theme.font_size = font_size;
    }
    if let Some(curve) = options.curve {
        config.render.curve = curve;
    }
    if let Some(padding) = options.padding {
        config.render.padding = padding;
    }
    config
}

fn render(model_json: &str, options_json: Option<&str>) -> Result<String, String> {
    let options = match options_json {
        Some(raw) => serde_json::from_str::<CanvasRenderOptions>(raw).map_err(|e| e.to_string())?,
        None => CanvasRenderOptions::default(),
    };
    let config = build_config(&options);
    render_model_json(model_json, &config, options.skin.as_ref()).map_err(|e| e.to_string())
}

/// Renders a positioned diagram model (JSON) to SVG text.
#[wasm_bindgen]
pub fn render_diagram_svg(model_json: &str, options_json: Option<String>) -> Result<String, JsValue> {
    render(model_json, options_json.as_deref()).map_err(|error| JsValue::from_str(&error))
}

#[cfg(test)]
mod tests {
    use super::render;

    const MODEL: &str = r#"{
        "kind": "flowchart",
        "width": 120, "height": 160,
        "nodes": [
            {"id": "A", "x": 60, "y": 20, "width": 80, "height": 40, "label": "Alpha"},
            {"id": "B", "x": 60, "y": 140, "width": 80, "height": 40, "label": "Beta"}
        ],
        "edges": [{"from": "A", "to": "B", "points": [[60, 40], [60, 120]], "label": "yes"}]
    }"#;

    #[test]
    fn renders_model_with_options() {
        let svg = render(MODEL, Some(r#"{"theme": "dark", "padding": 0, "curve": "linear"}"#))
            .expect("model should render");
        assert!(svg.contains("width=\"120\""));
        assert!(svg.contains("Alpha"));
        assert!(svg.contains("yes"));
    }

    #[test]
    fn bad_options_are_reported() {
        assert!(render(MODEL, Some("{")).is_err());
    }
}
