//! Shape skins: per-shape path templates that replace the built-in
//! geometric shapes, plus the `(theme, skin)` resolution cache.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::model::{DiagramKind, NodeShape, Rect};
use crate::theme::Theme;

static FRAGMENT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bid\s*=\s*["']([A-Za-z_][\w.:-]*)["']"#).expect("valid regex"));

const DEFAULT_STROKE_WIDTH: f32 = 1.4;
const MARKER_STROKE_WIDTH: f32 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkinLayer {
    /// SVG path data in view-box coordinates.
    pub path: String,
    #[serde(default)]
    pub fill: Option<String>,
    #[serde(default)]
    pub stroke: Option<String>,
    #[serde(default)]
    pub stroke_width: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeSkin {
    pub layers: Vec<SkinLayer>,
    pub view_box: Rect,
    /// Auxiliary `<defs>` content (gradients, patterns) referenced by layers.
    #[serde(default)]
    pub defs: Option<String>,
}

impl ShapeSkin {
    /// Affine `[a, b, c, d, e, f]` stretching the view box onto `target`.
    pub fn placement(&self, target: Rect) -> [f32; 6] {
        let vb = self.view_box;
        let sx = if vb.width.abs() > f32::EPSILON {
            target.width / vb.width
        } else {
            1.0
        };
        let sy = if vb.height.abs() > f32::EPSILON {
            target.height / vb.height
        } else {
            1.0
        };
        [sx, 0.0, 0.0, sy, target.x - vb.x * sx, target.y - vb.y * sy]
    }

    /// The placement as an SVG transform string.
    pub fn transform_attr(&self, target: Rect) -> String {
        let [a, b, c, d, e, f] = self.placement(target);
        format!("matrix({a:.4},{b:.4},{c:.4},{d:.4},{e:.2},{f:.2})")
    }

    /// Element ids declared by the defs fragment.
    pub fn fragment_ids(&self) -> Vec<String> {
        self.defs
            .as_deref()
            .map(|defs| {
                FRAGMENT_ID_RE
                    .captures_iter(defs)
                    .map(|cap| cap[1].to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A named set of shape skins keyed by `{kind}.{shape}` or `{shape}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkinPack {
    pub name: String,
    #[serde(default)]
    pub shapes: BTreeMap<String, ShapeSkin>,
}

impl SkinPack {
    pub fn from_json(input: &str) -> serde_json::Result<Self> {
        serde_json::from_str(input)
    }

    /// Kind-qualified key first, then the bare shape key.
    pub fn lookup(&self, kind: DiagramKind, shape: NodeShape) -> Option<(String, &ShapeSkin)> {
        let qualified = format!("{}.{}", kind.key(), shape.key());
        if let Some(skin) = self.shapes.get(&qualified) {
            return Some((qualified, skin));
        }
        self.shapes
            .get(shape.key())
            .map(|skin| (shape.key().to_string(), skin))
    }
}

/// Skin packs by name, as handed over by the skin loader.
#[derive(Debug, Clone, Default)]
pub struct SkinRegistry {
    packs: HashMap<String, Rc<SkinPack>>,
}

impl SkinRegistry {
    pub fn insert(&mut self, pack: SkinPack) {
        self.packs.insert(pack.name.clone(), Rc::new(pack));
    }

    /// Unknown names resolve to no skin, i.e. the built-in shapes.
    pub fn get(&self, name: &str) -> Option<Rc<SkinPack>> {
        let pack = self.packs.get(name).cloned();
        if pack.is_none() {
            tracing::warn!(skin = name, "unknown skin pack, using built-in shapes");
        }
        pack
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapePalette {
    pub fill: String,
    pub stroke: String,
    pub text: String,
    pub stroke_width: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkinTemplate {
    pub pack: String,
    pub key: String,
    pub skin: ShapeSkin,
}

impl SkinTemplate {
    /// Stable cache key for layer `index`.
    pub fn layer_key(&self, index: usize) -> String {
        format!("skin:{}:{}:{}", self.pack, self.key, index)
    }
}

/// Result of resolving one `(kind, shape)` pair: the theme palette, and a
/// skin template when the pack overrides the shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedShape {
    pub palette: ShapePalette,
    pub template: Option<SkinTemplate>,
}

/// Pure resolution of `(theme, skin, kind, shape)`.
pub fn resolve_shape(
    theme: &Theme,
    skin: Option<&SkinPack>,
    kind: DiagramKind,
    shape: NodeShape,
) -> ResolvedShape {
    let palette = shape_palette(theme, kind, shape);
    let template = skin.and_then(|pack| {
        pack.lookup(kind, shape).map(|(key, skin)| SkinTemplate {
            pack: pack.name.clone(),
            key,
            skin: skin.clone(),
        })
    });
    ResolvedShape { palette, template }
}

fn shape_palette(theme: &Theme, kind: DiagramKind, shape: NodeShape) -> ShapePalette {
    if shape.is_marker() {
        return ShapePalette {
            fill: theme.line_color.clone(),
            stroke: theme.line_color.clone(),
            text: theme.text_color.clone(),
            stroke_width: MARKER_STROKE_WIDTH,
        };
    }
    if shape == NodeShape::Text {
        return ShapePalette {
            fill: "none".to_string(),
            stroke: "none".to_string(),
            text: theme.text_color.clone(),
            stroke_width: 0.0,
        };
    }
    let (fill, stroke) = match kind {
        DiagramKind::Mindmap | DiagramKind::Block => {
            (&theme.secondary_color, &theme.secondary_border_color)
        }
        DiagramKind::Class | DiagramKind::Er | DiagramKind::Requirement => {
            (&theme.tertiary_color, &theme.primary_border_color)
        }
        _ => (&theme.primary_color, &theme.primary_border_color),
    };
    ShapePalette {
        fill: fill.clone(),
        stroke: stroke.clone(),
        text: theme.text_color.clone(),
        stroke_width: DEFAULT_STROKE_WIDTH,
    }
}

type ThemeSkinKey = (String, String);

/// Caches shape resolutions per `(theme, skin)` pair.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: HashMap<ThemeSkinKey, HashMap<(DiagramKind, NodeShape), ResolvedShape>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(
        &mut self,
        theme: &Theme,
        skin: Option<&SkinPack>,
        kind: DiagramKind,
        shape: NodeShape,
    ) -> ResolvedShape {
        let key = (
            theme.fingerprint(),
            skin.map(|pack| pack.name.clone()).unwrap_or_default(),
        );
        self.entries
            .entry(key)
            .or_default()
            .entry((kind, shape))
            .or_insert_with(|| resolve_shape(theme, skin, kind, shape))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack() -> SkinPack {
        let layer = |path: &str| SkinLayer {
            path: path.to_string(),
            fill: None,
            stroke: None,
            stroke_width: None,
        };
        let mut shapes = BTreeMap::new();
        shapes.insert(
            "flowchart.diamond".to_string(),
            ShapeSkin {
                layers: vec![layer("M0 0 L10 0 L10 10 Z")],
                view_box: Rect::new(0.0, 0.0, 10.0, 10.0),
                defs: Some("<linearGradient id=\"shine\"/>".to_string()),
            },
        );
        shapes.insert(
            "diamond".to_string(),
            ShapeSkin {
                layers: vec![layer("M0 0 L1 1")],
                view_box: Rect::new(0.0, 0.0, 1.0, 1.0),
                defs: None,
            },
        );
        SkinPack {
            name: "sketch".to_string(),
            shapes,
        }
    }

    #[test]
    fn qualified_key_wins_over_bare() {
        let pack = pack();
        let (key, _) = pack.lookup(DiagramKind::Flowchart, NodeShape::Diamond).unwrap();
        assert_eq!(key, "flowchart.diamond");
        let (key, _) = pack.lookup(DiagramKind::State, NodeShape::Diamond).unwrap();
        assert_eq!(key, "diamond");
        assert!(pack.lookup(DiagramKind::State, NodeShape::Circle).is_none());
    }

    #[test]
    fn placement_maps_view_box_onto_node() {
        let skin = ShapeSkin {
            layers: Vec::new(),
            view_box: Rect::new(10.0, 10.0, 20.0, 10.0),
            defs: None,
        };
        let [a, _, _, d, e, f] = skin.placement(Rect::new(100.0, 50.0, 40.0, 40.0));
        assert_eq!((a, d), (2.0, 4.0));
        // view box origin lands on the node's top-left corner
        assert_eq!((10.0 * a + e, 10.0 * d + f), (100.0, 50.0));
    }

    #[test]
    fn fragment_ids_are_extracted() {
        let pack = pack();
        let (_, skin) = pack.lookup(DiagramKind::Flowchart, NodeShape::Diamond).unwrap();
        assert_eq!(skin.fragment_ids(), vec!["shine".to_string()]);
    }

    #[test]
    fn miss_falls_back_to_palette_only() {
        let theme = Theme::mermaid_default();
        let resolved = resolve_shape(&theme, Some(&pack()), DiagramKind::Flowchart, NodeShape::Circle);
        assert!(resolved.template.is_none());
        assert_eq!(resolved.palette.fill, theme.primary_color);
    }

    #[test]
    fn cache_reuses_entries_per_theme_and_skin() {
        let theme = Theme::mermaid_default();
        let pack = pack();
        let mut cache = ResolutionCache::new();
        let first = cache.resolve(&theme, Some(&pack), DiagramKind::Flowchart, NodeShape::Diamond);
        let second = cache.resolve(&theme, Some(&pack), DiagramKind::Flowchart, NodeShape::Diamond);
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
        cache.resolve(&Theme::dark(), Some(&pack), DiagramKind::Flowchart, NodeShape::Diamond);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn registry_misses_fall_back_to_builtin() {
        let mut registry = SkinRegistry::default();
        registry.insert(pack());
        assert_eq!(registry.get("sketch").map(|p| p.name.clone()), Some("sketch".into()));
        assert!(registry.get("missing").is_none());
    }
}
