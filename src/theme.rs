use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Text colors on dark backgrounds are lifted until they reach this luminance.
pub const DARK_TEXT_LUMINANCE_FLOOR: f32 = 168.0;
/// Stroke and line colors on dark backgrounds are lifted to this luminance.
pub const DARK_STROKE_LUMINANCE_FLOOR: f32 = 136.0;
const BLEND_STEP: f32 = 0.1;

/// Fixed fill palette for per-category coloring.
pub const CHART_PALETTE: [&str; 8] = [
    "#4E79A7", "#F28E2B", "#E15759", "#76B7B2", "#59A14F", "#EDC948", "#B07AA1", "#FF9DA7",
];

/// Fixed high-saturation palette, used for category strokes.
pub const VIVID_PALETTE: [&str; 8] = [
    "#E6194B", "#3CB44B", "#FFE119", "#4363D8", "#F58231", "#911EB4", "#42D4F4", "#F032E6",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub name: String,
    pub font_family: String,
    pub font_size: f32,
    pub background: String,
    pub text_color: String,
    pub muted_text_color: String,
    pub primary_color: String,
    pub primary_border_color: String,
    pub secondary_color: String,
    pub secondary_border_color: String,
    pub tertiary_color: String,
    pub tertiary_border_color: String,
    pub line_color: String,
    pub grid_color: String,
    pub edge_label_background: String,
}

static THEMES: Lazy<BTreeMap<&'static str, Theme>> = Lazy::new(|| {
    [
        ("default", Theme::mermaid_default()),
        ("dark", Theme::dark()),
        ("forest", Theme::forest()),
        ("neutral", Theme::neutral()),
        ("modern", Theme::modern()),
    ]
    .into_iter()
    .collect()
});

/// Names of the built-in themes.
pub fn theme_names() -> impl Iterator<Item = &'static str> {
    THEMES.keys().copied()
}

impl Theme {
    /// Looks up a built-in theme; unknown names fall back to `default`.
    pub fn named(name: &str) -> Theme {
        let key = name.trim().to_ascii_lowercase();
        let key = match key.as_str() {
            "base" | "mermaid" => "default",
            other => other,
        };
        match THEMES.get(key) {
            Some(theme) => theme.clone(),
            None => {
                tracing::warn!(theme = name, "unknown theme, using default");
                THEMES["default"].clone()
            }
        }
    }

    pub fn mermaid_default() -> Self {
        Self {
            name: "default".to_string(),
            font_family: "\"trebuchet ms\", verdana, arial, sans-serif".to_string(),
            font_size: 16.0,
            background: "#FFFFFF".to_string(),
            text_color: "#333333".to_string(),
            muted_text_color: "#666666".to_string(),
            primary_color: "#ECECFF".to_string(),
            primary_border_color: "#9370DB".to_string(),
            secondary_color: "#FFFFDE".to_string(),
            secondary_border_color: "#AAAA33".to_string(),
            tertiary_color: "#F4F4F4".to_string(),
            tertiary_border_color: "#CCCCCC".to_string(),
            line_color: "#333333".to_string(),
            grid_color: "#E0E0E0".to_string(),
            edge_label_background: "#E8E8E8".to_string(),
        }
    }

    pub fn dark() -> Self {
        Self {
            name: "dark".to_string(),
            font_family: "\"trebuchet ms\", verdana, arial, sans-serif".to_string(),
            font_size: 16.0,
            background: "#1E1E2E".to_string(),
            text_color: "#CCCCCC".to_string(),
            muted_text_color: "#9A9AAA".to_string(),
            primary_color: "#1F2020".to_string(),
            primary_border_color: "#81B1DB".to_string(),
            secondary_color: "#3A3A4A".to_string(),
            secondary_border_color: "#6A6A8A".to_string(),
            tertiary_color: "#2B2B3B".to_string(),
            tertiary_border_color: "#555566".to_string(),
            line_color: "#D3D3D3".to_string(),
            grid_color: "#3A3A4A".to_string(),
            edge_label_background: "#585858".to_string(),
        }
    }

    pub fn forest() -> Self {
        Self {
            name: "forest".to_string(),
            font_family: "\"trebuchet ms\", verdana, arial, sans-serif".to_string(),
            font_size: 16.0,
            background: "#FFFFFF".to_string(),
            text_color: "#000000".to_string(),
            muted_text_color: "#4D4D4D".to_string(),
            primary_color: "#CDE498".to_string(),
            primary_border_color: "#13540C".to_string(),
            secondary_color: "#CDFFB2".to_string(),
            secondary_border_color: "#6EAA49".to_string(),
            tertiary_color: "#EEEEEE".to_string(),
            tertiary_border_color: "#AAAAAA".to_string(),
            line_color: "#008000".to_string(),
            grid_color: "#DDEEDD".to_string(),
            edge_label_background: "#E8E8E8".to_string(),
        }
    }

    pub fn neutral() -> Self {
        Self {
            name: "neutral".to_string(),
            font_family: "\"trebuchet ms\", verdana, arial, sans-serif".to_string(),
            font_size: 16.0,
            background: "#FFFFFF".to_string(),
            text_color: "#333333".to_string(),
            muted_text_color: "#777777".to_string(),
            primary_color: "#EEEEEE".to_string(),
            primary_border_color: "#999999".to_string(),
            secondary_color: "#F5F5F5".to_string(),
            secondary_border_color: "#BBBBBB".to_string(),
            tertiary_color: "#FAFAFA".to_string(),
            tertiary_border_color: "#DDDDDD".to_string(),
            line_color: "#666666".to_string(),
            grid_color: "#E5E5E5".to_string(),
            edge_label_background: "#FFFFFF".to_string(),
        }
    }

    pub fn modern() -> Self {
        Self {
            name: "modern".to_string(),
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 13.0,
            background: "#FFFFFF".to_string(),
            text_color: "#1C2430".to_string(),
            muted_text_color: "#5B6678".to_string(),
            primary_color: "#F8FAFF".to_string(),
            primary_border_color: "#C7D2E5".to_string(),
            secondary_color: "#EEF2F8".to_string(),
            secondary_border_color: "#D7E0F0".to_string(),
            tertiary_color: "#F7FAFF".to_string(),
            tertiary_border_color: "#E3E9F4".to_string(),
            line_color: "#7A8AA6".to_string(),
            grid_color: "#EDF1F7".to_string(),
            edge_label_background: "#FFFFFF".to_string(),
        }
    }

    pub fn is_dark(&self) -> bool {
        parse_color(&self.background)
            .map(|c| c.luminance() < 128.0)
            .unwrap_or(false)
    }

    /// Returns the theme with text and stroke colors lifted to the dark-mode
    /// luminance floors. Light themes come back unchanged.
    pub fn with_contrast_floors(&self) -> Theme {
        if !self.is_dark() {
            return self.clone();
        }
        let mut theme = self.clone();
        theme.text_color = lift_text(&theme.text_color);
        theme.muted_text_color = lift_text(&theme.muted_text_color);
        theme.primary_border_color = lift_stroke(&theme.primary_border_color);
        theme.secondary_border_color = lift_stroke(&theme.secondary_border_color);
        theme.tertiary_border_color = lift_stroke(&theme.tertiary_border_color);
        theme.line_color = lift_stroke(&theme.line_color);
        theme
    }

    /// Identity of the palette contents, used to key resolution caches.
    pub fn fingerprint(&self) -> String {
        [
            &self.name,
            &self.background,
            &self.text_color,
            &self.muted_text_color,
            &self.primary_color,
            &self.primary_border_color,
            &self.secondary_color,
            &self.secondary_border_color,
            &self.tertiary_color,
            &self.tertiary_border_color,
            &self.line_color,
            &self.grid_color,
            &self.edge_label_background,
        ]
        .map(String::as_str)
        .join("|")
    }

    /// Fill for category `index`, cycling through the chart palette.
    pub fn category_fill(index: usize) -> &'static str {
        CHART_PALETTE[index % CHART_PALETTE.len()]
    }

    /// Stroke for category `index`, cycling through the vivid palette.
    pub fn category_stroke(index: usize) -> &'static str {
        VIVID_PALETTE[index % VIVID_PALETTE.len()]
    }
}

pub(crate) fn lift_text(color: &str) -> String {
    ensure_luminance(color, DARK_TEXT_LUMINANCE_FLOOR)
}

pub(crate) fn lift_stroke(color: &str) -> String {
    ensure_luminance(color, DARK_STROKE_LUMINANCE_FLOOR)
}

/// Blends `color` toward white in fixed steps until its luminance reaches
/// `floor`. Unparseable colors and references are returned as-is.
pub fn ensure_luminance(color: &str, floor: f32) -> String {
    let Some(mut rgba) = parse_color(color) else {
        return color.to_string();
    };
    if rgba.a <= 0.0 || rgba.luminance() >= floor {
        return color.to_string();
    }
    let original = rgba;
    let mut t = 0.0f32;
    while rgba.luminance() < floor && t < 1.0 {
        t = (t + BLEND_STEP).min(1.0);
        rgba = original.blend(Rgba::WHITE, t);
    }
    rgba.to_hex()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba {
        r: 255,
        g: 255,
        b: 255,
        a: 1.0,
    };
    pub const BLACK: Rgba = Rgba {
        r: 0,
        g: 0,
        b: 0,
        a: 1.0,
    };

    pub fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Perceived luminance on a 0..=255 scale.
    pub fn luminance(&self) -> f32 {
        0.299 * self.r as f32 + 0.587 * self.g as f32 + 0.114 * self.b as f32
    }

    pub fn blend(&self, other: Rgba, t: f32) -> Rgba {
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round().clamp(0.0, 255.0) as u8;
        Rgba {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: self.a + (other.a - self.a) * t,
        }
    }

    pub fn to_hex(&self) -> String {
        if self.a >= 1.0 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            let alpha = (self.a.clamp(0.0, 1.0) * 255.0).round() as u8;
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, alpha)
        }
    }
}

/// Parses CSS color syntax: hex, `rgb[a]()`, `hsl[a]()`, `transparent` and
/// common named colors. `none` and paint references are not colors.
pub fn parse_color(input: &str) -> Option<Rgba> {
    let value = input.trim().to_ascii_lowercase();
    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex);
    }
    if let Some(args) = function_args(&value, "rgba").or_else(|| function_args(&value, "rgb")) {
        return parse_rgb_args(&args);
    }
    if let Some(args) = function_args(&value, "hsla").or_else(|| function_args(&value, "hsl")) {
        return parse_hsl_args(&args);
    }
    if value == "transparent" {
        return Some(Rgba::new(0, 0, 0, 0.0));
    }
    named_color(&value)
}

fn function_args(value: &str, name: &str) -> Option<Vec<String>> {
    let rest = value.strip_prefix(name)?.trim_start();
    let inner = rest.strip_prefix('(')?.strip_suffix(')')?;
    Some(
        inner
            .split([',', ' ', '/'])
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |idx: usize| u8::from_str_radix(&hex[idx..idx + 1], 16).ok().map(|v| v * 17);
    let byte = |idx: usize| u8::from_str_radix(&hex[idx..idx + 2], 16).ok();
    match hex.len() {
        3 => Some(Rgba::new(nibble(0)?, nibble(1)?, nibble(2)?, 1.0)),
        4 => Some(Rgba::new(nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)? as f32 / 255.0)),
        6 => Some(Rgba::new(byte(0)?, byte(2)?, byte(4)?, 1.0)),
        8 => Some(Rgba::new(byte(0)?, byte(2)?, byte(4)?, byte(6)? as f32 / 255.0)),
        _ => None,
    }
}

fn parse_channel(part: &str) -> Option<u8> {
    if let Some(pct) = part.strip_suffix('%') {
        let v: f32 = pct.parse().ok()?;
        return Some((v / 100.0 * 255.0).round().clamp(0.0, 255.0) as u8);
    }
    let v: f32 = part.parse().ok()?;
    Some(v.round().clamp(0.0, 255.0) as u8)
}

fn parse_alpha(part: Option<&String>) -> Option<f32> {
    let Some(part) = part else {
        return Some(1.0);
    };
    if let Some(pct) = part.strip_suffix('%') {
        return pct.parse::<f32>().ok().map(|v| (v / 100.0).clamp(0.0, 1.0));
    }
    part.parse::<f32>().ok().map(|v| v.clamp(0.0, 1.0))
}

fn parse_rgb_args(args: &[String]) -> Option<Rgba> {
    if args.len() < 3 {
        return None;
    }
    Some(Rgba::new(
        parse_channel(&args[0])?,
        parse_channel(&args[1])?,
        parse_channel(&args[2])?,
        parse_alpha(args.get(3))?,
    ))
}

fn parse_hsl_args(args: &[String]) -> Option<Rgba> {
    if args.len() < 3 {
        return None;
    }
    let h: f32 = args[0].trim_end_matches("deg").parse().ok()?;
    let s: f32 = args[1].trim_end_matches('%').parse::<f32>().ok()? / 100.0;
    let l: f32 = args[2].trim_end_matches('%').parse::<f32>().ok()? / 100.0;
    let (r, g, b) = hsl_to_rgb(h, s.clamp(0.0, 1.0), l.clamp(0.0, 1.0));
    Some(Rgba::new(r, g, b, parse_alpha(args.get(3))?))
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (u8, u8, u8) {
    let h = h.rem_euclid(360.0) / 360.0;
    if s == 0.0 {
        let v = (l * 255.0).round() as u8;
        return (v, v, v);
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let channel = |mut t: f32| {
        if t < 0.0 {
            t += 1.0;
        }
        if t > 1.0 {
            t -= 1.0;
        }
        let v = if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        };
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    };
    (channel(h + 1.0 / 3.0), channel(h), channel(h - 1.0 / 3.0))
}

fn named_color(name: &str) -> Option<Rgba> {
    let hex = match name {
        "black" => "000000",
        "white" => "ffffff",
        "red" => "ff0000",
        "green" => "008000",
        "lime" => "00ff00",
        "blue" => "0000ff",
        "yellow" => "ffff00",
        "orange" => "ffa500",
        "purple" => "800080",
        "gray" | "grey" => "808080",
        "silver" => "c0c0c0",
        "navy" => "000080",
        "teal" => "008080",
        "maroon" => "800000",
        "olive" => "808000",
        "aqua" | "cyan" => "00ffff",
        "fuchsia" | "magenta" => "ff00ff",
        "pink" => "ffc0cb",
        "brown" => "a52a2a",
        "gold" => "ffd700",
        "darkgray" | "darkgrey" => "a9a9a9",
        "lightgray" | "lightgrey" => "d3d3d3",
        "steelblue" => "4682b4",
        "lightblue" => "add8e6",
        "darkblue" => "00008b",
        "darkgreen" => "006400",
        "lightgreen" => "90ee90",
        "coral" => "ff7f50",
        "salmon" => "fa8072",
        "tomato" => "ff6347",
        "crimson" => "dc143c",
        "indigo" => "4b0082",
        "violet" => "ee82ee",
        "khaki" => "f0e68c",
        "beige" => "f5f5dc",
        "ivory" => "fffff0",
        _ => return None,
    };
    parse_hex(hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_color_forms() {
        assert_eq!(parse_color("#fff"), Some(Rgba::WHITE));
        assert_eq!(parse_color("#FF000080").map(|c| c.r), Some(255));
        assert_eq!(parse_color("rgb(10, 20, 30)"), Some(Rgba::new(10, 20, 30, 1.0)));
        assert_eq!(parse_color("rgba(10,20,30,0.5)").map(|c| c.a), Some(0.5));
        assert_eq!(parse_color("hsl(0, 100%, 50%)"), Some(Rgba::new(255, 0, 0, 1.0)));
        assert_eq!(parse_color("Red"), Some(Rgba::new(255, 0, 0, 1.0)));
        assert_eq!(parse_color("url(#g)"), None);
        assert_eq!(parse_color("none"), None);
    }

    #[test]
    fn unknown_theme_falls_back() {
        assert_eq!(Theme::named("no-such-theme").name, "default");
        assert_eq!(Theme::named("Dark").name, "dark");
        assert!(theme_names().any(|n| n == "forest"));
    }

    #[test]
    fn dark_theme_lifts_low_luminance_text_and_strokes() {
        let mut theme = Theme::dark();
        theme.text_color = "#202020".to_string();
        theme.line_color = "#101010".to_string();
        assert!(theme.is_dark());
        let lifted = theme.with_contrast_floors();
        let text = parse_color(&lifted.text_color).unwrap();
        let line = parse_color(&lifted.line_color).unwrap();
        assert!(text.luminance() >= DARK_TEXT_LUMINANCE_FLOOR);
        assert!(line.luminance() >= DARK_STROKE_LUMINANCE_FLOOR);
        // Blending toward white keeps the channels ordered and lighter.
        assert!(text.r > 0x20);
    }

    #[test]
    fn light_theme_is_untouched() {
        let theme = Theme::mermaid_default();
        assert!(!theme.is_dark());
        assert_eq!(theme.with_contrast_floors(), theme);
    }

    #[test]
    fn ensure_luminance_keeps_bright_colors() {
        assert_eq!(ensure_luminance("#FFFFFF", 168.0), "#FFFFFF");
        assert_eq!(ensure_luminance("url(#x)", 168.0), "url(#x)");
    }

    #[test]
    fn category_palettes_cycle() {
        assert_eq!(Theme::category_fill(0), Theme::category_fill(CHART_PALETTE.len()));
        assert_ne!(Theme::category_stroke(0), Theme::category_stroke(1));
    }
}
