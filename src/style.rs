//! CSS declaration handling for node, edge and subgraph styling.
//!
//! Paint is resolved per property in a fixed order: the element's explicit
//! style override, then its inline style, then the merged styles of its
//! classes, and finally the theme default (applied by the caller).

use std::collections::{BTreeMap, HashMap};

use crate::model::NodeStyle;

/// Properties that become paint; everything else is passed through.
const PAINT_PROPERTIES: [&str; 5] = ["fill", "stroke", "stroke-width", "color", "stroke-dasharray"];

/// Ordered CSS declarations; setting an existing property replaces it in
/// place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Declarations(Vec<(String, String)>);

impl Declarations {
    /// Parses `prop:value` pairs separated by `;` (or `,` outside
    /// parentheses, as classDef text uses). A trailing `!important` is
    /// dropped.
    pub fn parse(css: &str) -> Self {
        let mut decls = Declarations::default();
        for part in split_declarations(css) {
            let Some((prop, value)) = part.split_once(':') else {
                continue;
            };
            let prop = prop.trim().to_ascii_lowercase();
            let value = strip_important(value.trim());
            if prop.is_empty() || value.is_empty() {
                continue;
            }
            decls.set(&prop, value);
        }
        decls
    }

    pub fn get(&self, prop: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(name, _)| name == prop)
            .map(|(_, value)| value.as_str())
    }

    pub fn set(&mut self, prop: &str, value: &str) {
        match self.0.iter_mut().find(|(name, _)| name == prop) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.0.push((prop.to_string(), value.to_string())),
        }
    }

    /// Applies `other` on top of `self`; later declarations win.
    pub fn merge(&mut self, other: &Declarations) {
        for (prop, value) in &other.0 {
            self.set(prop, value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(p, v)| (p.as_str(), v.as_str()))
    }

    pub fn to_css(&self) -> String {
        self.0
            .iter()
            .map(|(prop, value)| format!("{prop}:{value}"))
            .collect::<Vec<_>>()
            .join(";")
    }
}

fn strip_important(value: &str) -> &str {
    let lower = value.to_ascii_lowercase();
    match lower.rfind("!important") {
        Some(idx) if lower[idx..].trim() == "!important" => value[..idx].trim_end(),
        _ => value,
    }
}

fn split_declarations(css: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (idx, ch) in css.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = (depth - 1).max(0),
            ';' | ',' if depth == 0 => {
                parts.push(&css[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&css[start..]);
    parts.into_iter().map(str::trim).filter(|p| !p.is_empty()).collect()
}

/// Class definitions resolved once per document.
#[derive(Debug, Clone, Default)]
pub struct ClassTable {
    classes: HashMap<String, Declarations>,
}

impl ClassTable {
    pub fn new(defs: &BTreeMap<String, String>) -> Self {
        let classes = defs
            .iter()
            .map(|(name, css)| (name.clone(), Declarations::parse(css)))
            .collect();
        Self { classes }
    }

    /// Merges the declarations of space separated `classes`, left to right.
    /// Unknown class names contribute nothing.
    pub fn resolve(&self, classes: Option<&str>) -> Declarations {
        let mut merged = Declarations::default();
        for name in classes.unwrap_or_default().split_whitespace() {
            if let Some(decls) = self.classes.get(name) {
                merged.merge(decls);
            }
        }
        merged
    }
}

/// The three style layers of one element, ready for per-property lookup.
#[derive(Debug, Clone, Default)]
pub struct StyleLayers {
    explicit: NodeStyle,
    inline: Declarations,
    class: Declarations,
}

impl StyleLayers {
    pub fn new(explicit: &NodeStyle, inline: Option<&str>, class: Declarations) -> Self {
        Self {
            explicit: explicit.clone(),
            inline: inline.map(Declarations::parse).unwrap_or_default(),
            class,
        }
    }

    fn lookup(&self, explicit: Option<&String>, prop: &str) -> Option<String> {
        explicit
            .cloned()
            .or_else(|| self.inline.get(prop).map(str::to_string))
            .or_else(|| self.class.get(prop).map(str::to_string))
    }

    pub fn fill(&self) -> Option<String> {
        self.lookup(self.explicit.fill.as_ref(), "fill")
    }

    pub fn stroke(&self) -> Option<String> {
        self.lookup(self.explicit.stroke.as_ref(), "stroke")
    }

    pub fn text_color(&self) -> Option<String> {
        self.lookup(self.explicit.text_color.as_ref(), "color")
    }

    pub fn stroke_dasharray(&self) -> Option<String> {
        self.lookup(self.explicit.stroke_dasharray.as_ref(), "stroke-dasharray")
    }

    pub fn stroke_width(&self) -> Option<f32> {
        if let Some(width) = self.explicit.stroke_width {
            return Some(width);
        }
        self.inline
            .get("stroke-width")
            .and_then(parse_length)
            .or_else(|| self.class.get("stroke-width").and_then(parse_length))
    }

    /// Non-paint declarations, class first then inline, for pass-through as
    /// a style attribute.
    pub fn passthrough(&self) -> Declarations {
        let mut extra = Declarations::default();
        for layer in [&self.class, &self.inline] {
            for (prop, value) in layer.iter() {
                if !PAINT_PROPERTIES.contains(&prop) {
                    extra.set(prop, value);
                }
            }
        }
        extra
    }
}

/// Parses a CSS length such as `2`, `2px` or `1.5 px`.
pub fn parse_length(value: &str) -> Option<f32> {
    let trimmed = value.trim().trim_end_matches("px").trim();
    trimmed.parse::<f32>().ok().filter(|v| v.is_finite())
}
