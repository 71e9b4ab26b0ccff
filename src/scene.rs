//! The primitive stream: typed drawing commands built once per model and
//! consumed unchanged by both sinks.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{Config, GeometryConfig, RenderConfig};
use crate::geometry::shapes::{Outline, PartFill, node_outline};
use crate::geometry::{EdgeGeometry, resolve_edges};
use crate::model::{
    Diagram, Edge, EdgeKey, EdgeStyle, LinearGradient, Node, NodeLink, NodeStyle, Point, Rect,
    Subgraph,
};
use crate::skin::{ResolutionCache, SkinPack, SkinTemplate};
use crate::style::{ClassTable, Declarations, StyleLayers};
use crate::text_metrics::{LINE_HEIGHT, measure_label};
use crate::theme::{Theme, lift_stroke, lift_text};

// ── Edge strokes ────────────────────────────────────────────────────
const EDGE_STROKE_WIDTH: f32 = 1.4;
const THICK_EDGE_STROKE_WIDTH: f32 = 3.5;
const DOTTED_EDGE_DASH: &str = "3 3";

// ── Labels ──────────────────────────────────────────────────────────
const EDGE_LABEL_PAD_X: f32 = 6.0;
const EDGE_LABEL_PAD_Y: f32 = 4.0;
const EDGE_LABEL_RADIUS: f32 = 4.0;

// ── Subgraphs ───────────────────────────────────────────────────────
const SUBGRAPH_RADIUS: f32 = 10.0;
const SUBGRAPH_STROKE_WIDTH: f32 = 1.2;
const SUBGRAPH_TITLE_INSET: (f32, f32) = (12.0, 20.0);

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Paint {
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub stroke_width: f32,
    pub dash: Option<String>,
}

impl Paint {
    pub fn fill(color: &str) -> Self {
        Self {
            fill: Some(color.to_string()),
            ..Default::default()
        }
    }

    pub fn stroke(color: &str, width: f32) -> Self {
        Self {
            fill: Some("none".to_string()),
            stroke: Some(color.to_string()),
            stroke_width: width,
            dash: None,
        }
    }

    pub fn has_stroke(&self) -> bool {
        self.stroke.as_deref().is_some_and(|s| s != "none") && self.stroke_width > 0.0
    }

    pub fn has_fill(&self) -> bool {
        self.fill.as_deref().is_some_and(|f| f != "none")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAnchor {
    Start,
    #[default]
    Middle,
    End,
}

impl TextAnchor {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Middle => "middle",
            Self::End => "end",
        }
    }
}

/// One line of text; `origin` is on the baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub origin: Point,
    pub content: String,
    pub font_family: String,
    pub font_size: f32,
    pub anchor: TextAnchor,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Rect { rect: Rect, radius: f32 },
    Ellipse { center: Point, rx: f32, ry: f32 },
    Line { from: Point, to: Point },
    Path { d: String },
    Polygon { points: Vec<Point> },
    Text(TextRun),
}

/// Model element a primitive was generated for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Owner {
    Node(String),
    Edge(EdgeKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Subgraph,
    SubgraphTitle,
    NodeShape,
    NodeLabel,
    EdgeLine,
    EdgeArrow,
    EdgeLabelBackground,
    EdgeLabel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub shape: Shape,
    pub paint: Paint,
    pub transform: Option<String>,
    /// Stable key for sinks that cache derived geometry.
    pub cache_key: Option<String>,
    /// Free-form CSS carried through to the document (unsanitized here).
    pub style: Option<String>,
    pub owner: Option<Owner>,
    pub role: Role,
}

impl Primitive {
    fn new(shape: Shape, paint: Paint, role: Role) -> Self {
        Self {
            shape,
            paint,
            transform: None,
            cache_key: None,
            style: None,
            owner: None,
            role,
        }
    }

    fn owned_by(mut self, owner: &Owner) -> Self {
        self.owner = Some(owner.clone());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    pub class: String,
    pub id: Option<String>,
    pub transform: Option<String>,
    pub link: Option<NodeLink>,
}

impl Group {
    fn new(class: &str) -> Self {
        Self {
            class: class.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Push(Group),
    Pop,
    Draw(Primitive),
}

/// Per-document definitions: model gradients and skin fragments, plus the
/// ids they make referenceable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Defs {
    pub gradients: BTreeMap<String, LinearGradient>,
    pub fragments: Vec<String>,
    ids: BTreeSet<String>,
}

impl Defs {
    fn new(gradients: &BTreeMap<String, LinearGradient>) -> Self {
        Self {
            gradients: gradients.clone(),
            fragments: Vec::new(),
            ids: gradients.keys().cloned().collect(),
        }
    }

    fn add_fragment(&mut self, fragment: &str, ids: Vec<String>) {
        if self.fragments.iter().any(|f| f == fragment) {
            return;
        }
        self.fragments.push(fragment.to_string());
        self.ids.extend(ids);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.gradients.is_empty() && self.fragments.is_empty()
    }

    /// Resolves `url(#id)` paint against the table. Unknown or external
    /// references become `none`; plain colors pass through.
    pub fn resolve_paint(&self, paint: &str) -> String {
        let Some(reference) = paint_reference(paint) else {
            return paint.to_string();
        };
        match reference.strip_prefix('#') {
            Some(id) if self.contains(id) => format!("url(#{id})"),
            _ => {
                tracing::debug!(paint, "unresolved paint reference, using none");
                "none".to_string()
            }
        }
    }
}

/// Inner text of a `url(...)` paint, without quotes.
pub(crate) fn paint_reference(paint: &str) -> Option<&str> {
    let trimmed = paint.trim();
    let head = trimmed.get(..4)?;
    if !head.eq_ignore_ascii_case("url(") {
        return None;
    }
    let inner = trimmed[4..].strip_suffix(')')?.trim();
    Some(inner.trim_matches(|c| c == '"' || c == '\''))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    /// Natural size: content plus padding on both sides.
    pub width: f32,
    pub height: f32,
    pub padding: f32,
    pub background: String,
    pub defs: Defs,
    pub commands: Vec<DrawCommand>,
}

impl Scene {
    pub fn primitives(&self) -> impl Iterator<Item = &Primitive> {
        self.commands.iter().filter_map(|cmd| match cmd {
            DrawCommand::Draw(primitive) => Some(primitive),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Consumer of the primitive stream.
pub trait PrimitiveSink {
    fn push_group(&mut self, group: &Group);
    fn pop_group(&mut self);
    fn draw(&mut self, primitive: &Primitive);
}

impl Scene {
    /// Feeds every command, in order, to `sink`.
    pub fn replay(&self, sink: &mut impl PrimitiveSink) {
        for cmd in &self.commands {
            match cmd {
                DrawCommand::Push(group) => sink.push_group(group),
                DrawCommand::Pop => sink.pop_group(),
                DrawCommand::Draw(primitive) => sink.draw(primitive),
            }
        }
    }
}

/// Builds the primitive stream for one `(model, theme, skin)` triple.
pub struct SceneBuilder<'a> {
    theme: Theme,
    skin: Option<&'a SkinPack>,
    render: &'a RenderConfig,
    geometry: &'a GeometryConfig,
}

impl<'a> SceneBuilder<'a> {
    pub fn new(theme: &Theme, skin: Option<&'a SkinPack>, config: &'a Config) -> Self {
        Self {
            theme: theme.with_contrast_floors(),
            skin,
            render: &config.render,
            geometry: &config.geometry,
        }
    }

    pub fn build(&self, diagram: &Diagram, resolutions: &mut ResolutionCache) -> Scene {
        let padding = self.render.padding.max(0.0);
        let background = match self.render.background.trim() {
            "" => self.theme.background.clone(),
            explicit => explicit.to_string(),
        };
        let mut scene = Scene {
            width: (diagram.width + padding * 2.0).max(self.render.min_width),
            height: (diagram.height + padding * 2.0).max(self.render.min_height),
            padding,
            background,
            defs: Defs::new(&diagram.gradients),
            commands: Vec::new(),
        };
        if diagram.is_empty() {
            return scene;
        }

        let classes = ClassTable::new(&diagram.class_defs);
        let geometry = resolve_edges(diagram, self.geometry, self.render.curve);

        // Skin fragments must be registered before any paint resolves.
        let mut resolved = Vec::with_capacity(diagram.nodes().len());
        for node in diagram.nodes() {
            let shape = resolutions.resolve(&self.theme, self.skin, diagram.kind, node.shape);
            if let Some(template) = &shape.template
                && let Some(fragment) = &template.skin.defs
            {
                scene.defs.add_fragment(fragment, template.skin.fragment_ids());
            }
            resolved.push(shape);
        }

        let mut out = Vec::new();
        out.push(DrawCommand::Push(Group {
            class: format!("diagram {}", diagram.kind.key()),
            transform: (padding > 0.0).then(|| format!("translate({padding},{padding})")),
            ..Default::default()
        }));

        for (subgraph, depth) in diagram.subgraphs_by_depth() {
            self.emit_subgraph(&mut out, subgraph, depth, &classes, &scene.defs);
        }
        for (edge, geometry) in diagram.edges.iter().zip(&geometry) {
            if let Some(geometry) = geometry {
                self.emit_edge(&mut out, edge, geometry, &scene.defs);
            }
        }
        for (node, shape) in diagram.nodes().iter().zip(&resolved) {
            let layers = StyleLayers::new(
                &node.style,
                node.inline_style.as_deref(),
                classes.resolve(node.classes.as_deref()),
            );
            let paint = NodePaint {
                fill: scene.defs.resolve_paint(
                    &layers
                        .fill()
                        .or_else(|| node.category.map(|c| Theme::category_fill(c).to_string()))
                        .unwrap_or_else(|| shape.palette.fill.clone()),
                ),
                stroke: scene.defs.resolve_paint(&self.floor_stroke(
                    layers
                        .stroke()
                        .or_else(|| node.category.map(|c| Theme::category_stroke(c).to_string()))
                        .unwrap_or_else(|| shape.palette.stroke.clone()),
                )),
                stroke_width: layers.stroke_width().unwrap_or(shape.palette.stroke_width),
                dash: layers.stroke_dasharray(),
                text: self.floor_text(layers.text_color().unwrap_or_else(|| shape.palette.text.clone())),
                style: Some(layers.passthrough()).filter(|d| !d.is_empty()).map(|d| d.to_css()),
            };
            self.emit_node(&mut out, node, shape.template.as_ref(), &paint, &scene.defs);
        }
        out.push(DrawCommand::Pop);

        scene.commands = out;
        scene
    }

    fn floor_text(&self, color: String) -> String {
        if self.theme.is_dark() {
            lift_text(&color)
        } else {
            color
        }
    }

    fn floor_stroke(&self, color: String) -> String {
        if self.theme.is_dark() {
            lift_stroke(&color)
        } else {
            color
        }
    }

    fn emit_subgraph(
        &self,
        out: &mut Vec<DrawCommand>,
        subgraph: &Subgraph,
        depth: usize,
        classes: &ClassTable,
        defs: &Defs,
    ) {
        let layers = StyleLayers::new(
            &subgraph.style,
            None,
            classes.resolve(subgraph.classes.as_deref()),
        );
        let fill = defs.resolve_paint(
            &layers
                .fill()
                .unwrap_or_else(|| self.theme.secondary_color.clone()),
        );
        let stroke = self.floor_stroke(
            layers
                .stroke()
                .unwrap_or_else(|| self.theme.secondary_border_color.clone()),
        );
        out.push(DrawCommand::Push(Group {
            class: format!("subgraph depth-{depth}"),
            id: Some(subgraph.id.clone()),
            ..Default::default()
        }));
        let mut frame = Primitive::new(
            Shape::Rect {
                rect: subgraph.bounds(),
                radius: SUBGRAPH_RADIUS,
            },
            Paint {
                fill: Some(fill),
                stroke: Some(defs.resolve_paint(&stroke)),
                stroke_width: layers.stroke_width().unwrap_or(SUBGRAPH_STROKE_WIDTH),
                dash: layers.stroke_dasharray(),
            },
            Role::Subgraph,
        );
        frame.style = Some(layers.passthrough())
            .filter(|d| !d.is_empty())
            .map(|d| d.to_css());
        out.push(DrawCommand::Draw(frame));
        if !subgraph.title.is_empty() {
            let color = self.floor_text(
                layers
                    .text_color()
                    .unwrap_or_else(|| self.theme.text_color.clone()),
            );
            out.push(DrawCommand::Draw(Primitive::new(
                Shape::Text(TextRun {
                    origin: (
                        subgraph.x + SUBGRAPH_TITLE_INSET.0,
                        subgraph.y + SUBGRAPH_TITLE_INSET.1,
                    ),
                    content: subgraph.title.clone(),
                    font_family: self.theme.font_family.clone(),
                    font_size: self.theme.font_size,
                    anchor: TextAnchor::Start,
                }),
                Paint::fill(&color),
                Role::SubgraphTitle,
            )));
        }
        out.push(DrawCommand::Pop);
    }

    fn emit_edge(&self, out: &mut Vec<DrawCommand>, edge: &Edge, geometry: &EdgeGeometry, defs: &Defs) {
        let owner = Owner::Edge(edge.key());
        let layers = StyleLayers::new(
            &NodeStyle::default(),
            edge.inline_style.as_deref(),
            Declarations::default(),
        );
        let (default_width, default_dash) = match edge.style {
            EdgeStyle::Plain => (EDGE_STROKE_WIDTH, None),
            EdgeStyle::Dotted => (EDGE_STROKE_WIDTH, Some(DOTTED_EDGE_DASH.to_string())),
            EdgeStyle::Thick => (THICK_EDGE_STROKE_WIDTH, None),
        };
        let stroke = defs.resolve_paint(&self.floor_stroke(
            layers
                .stroke()
                .or_else(|| edge.category.map(|c| Theme::category_stroke(c).to_string()))
                .unwrap_or_else(|| self.theme.line_color.clone()),
        ));
        let width = layers.stroke_width().unwrap_or(default_width);

        out.push(DrawCommand::Push(Group::new(match edge.style {
            EdgeStyle::Plain => "edge",
            EdgeStyle::Dotted => "edge dotted",
            EdgeStyle::Thick => "edge thick",
        })));
        let mut line = Primitive::new(
            Shape::Path {
                d: geometry.path_data(),
            },
            Paint {
                dash: layers.stroke_dasharray().or(default_dash),
                ..Paint::stroke(&stroke, width)
            },
            Role::EdgeLine,
        )
        .owned_by(&owner);
        line.style = Some(layers.passthrough())
            .filter(|d| !d.is_empty())
            .map(|d| d.to_css());
        out.push(DrawCommand::Draw(line));

        for head in [geometry.arrow_start, geometry.arrow_end].into_iter().flatten() {
            out.push(DrawCommand::Draw(
                Primitive::new(
                    Shape::Polygon {
                        points: head.to_vec(),
                    },
                    Paint::fill(&stroke),
                    Role::EdgeArrow,
                )
                .owned_by(&owner),
            ));
        }

        if let (Some(label), Some(anchor)) = (&edge.label, geometry.label_anchor) {
            self.emit_label(out, label, anchor, &owner);
        }
        out.push(DrawCommand::Pop);
    }

    fn emit_label(&self, out: &mut Vec<DrawCommand>, label: &str, anchor: Point, owner: &Owner) {
        let font_size = self.theme.font_size;
        let block = measure_label(label, font_size, &self.theme.font_family);
        let background = Rect::from_center(
            anchor,
            block.width + EDGE_LABEL_PAD_X * 2.0,
            block.height + EDGE_LABEL_PAD_Y * 2.0,
        );
        out.push(DrawCommand::Draw(
            Primitive::new(
                Shape::Rect {
                    rect: background,
                    radius: EDGE_LABEL_RADIUS,
                },
                Paint::fill(&self.theme.edge_label_background),
                Role::EdgeLabelBackground,
            )
            .owned_by(owner),
        ));
        let color = self.theme.text_color.clone();
        for primitive in self.text_lines(&block.lines, anchor, &color, Role::EdgeLabel) {
            out.push(DrawCommand::Draw(primitive.owned_by(owner)));
        }
    }

    fn emit_node(
        &self,
        out: &mut Vec<DrawCommand>,
        node: &Node,
        template: Option<&SkinTemplate>,
        paint: &NodePaint,
        defs: &Defs,
    ) {
        let owner = Owner::Node(node.id.clone());
        let bounds = node.bounds();
        out.push(DrawCommand::Push(Group {
            class: format!("node {}", node.shape.key()),
            id: Some(node.id.clone()),
            transform: None,
            link: node.link.clone(),
        }));

        match template {
            Some(template) => {
                let transform = template.skin.transform_attr(bounds);
                for (idx, layer) in template.skin.layers.iter().enumerate() {
                    let fill = layer
                        .fill
                        .as_deref()
                        .map(|f| defs.resolve_paint(f))
                        .unwrap_or_else(|| paint.fill.clone());
                    let stroke = layer
                        .stroke
                        .as_deref()
                        .map(|s| defs.resolve_paint(&self.floor_stroke(s.to_string())))
                        .unwrap_or_else(|| paint.stroke.clone());
                    let mut primitive = Primitive::new(
                        Shape::Path {
                            d: layer.path.clone(),
                        },
                        Paint {
                            fill: Some(fill),
                            stroke: Some(stroke),
                            stroke_width: layer.stroke_width.unwrap_or(paint.stroke_width),
                            dash: paint.dash.clone(),
                        },
                        Role::NodeShape,
                    )
                    .owned_by(&owner);
                    primitive.transform = Some(transform.clone());
                    primitive.cache_key = Some(template.layer_key(idx));
                    primitive.style = paint.style.clone();
                    out.push(DrawCommand::Draw(primitive));
                }
            }
            None => {
                for (outline, part) in node_outline(node.shape, bounds) {
                    let fill = match part {
                        PartFill::Shape => paint.fill.clone(),
                        PartFill::Hollow => "none".to_string(),
                    };
                    let shape = match outline {
                        Outline::Rect { rect, radius } => Shape::Rect { rect, radius },
                        Outline::Ellipse { center, rx, ry } => Shape::Ellipse { center, rx, ry },
                        Outline::Polygon(points) => Shape::Polygon { points },
                        Outline::Path(d) => Shape::Path { d },
                    };
                    let mut primitive = Primitive::new(
                        shape,
                        Paint {
                            fill: Some(fill),
                            stroke: Some(paint.stroke.clone()),
                            stroke_width: paint.stroke_width,
                            dash: paint.dash.clone(),
                        },
                        Role::NodeShape,
                    )
                    .owned_by(&owner);
                    primitive.style = paint.style.clone();
                    out.push(DrawCommand::Draw(primitive));
                }
            }
        }

        if !node.shape.is_marker() && !node.label.is_empty() {
            let lines = node.label_lines();
            for primitive in self.text_lines(&lines, node.center(), &paint.text, Role::NodeLabel) {
                out.push(DrawCommand::Draw(primitive.owned_by(&owner)));
            }
        }
        out.push(DrawCommand::Pop);
    }

    /// Centered text lines around `center`.
    fn text_lines(&self, lines: &[String], center: Point, color: &str, role: Role) -> Vec<Primitive> {
        let font_size = self.theme.font_size;
        let step = font_size * LINE_HEIGHT;
        let total = lines.len() as f32 * step;
        let first_baseline = center.1 - total / 2.0 + font_size;
        lines
            .iter()
            .enumerate()
            .filter(|(_, line)| !line.is_empty())
            .map(|(idx, line)| {
                Primitive::new(
                    Shape::Text(TextRun {
                        origin: (center.0, first_baseline + idx as f32 * step),
                        content: line.clone(),
                        font_family: self.theme.font_family.clone(),
                        font_size,
                        anchor: TextAnchor::Middle,
                    }),
                    Paint::fill(color),
                    role,
                )
            })
            .collect()
    }
}

struct NodePaint {
    fill: String,
    stroke: String,
    stroke_width: f32,
    dash: Option<String>,
    text: String,
    style: Option<String>,
}

/// Builds a scene with a throwaway resolution cache.
pub fn build_scene(diagram: &Diagram, theme: &Theme, skin: Option<&SkinPack>, config: &Config) -> Scene {
    SceneBuilder::new(theme, skin, config).build(diagram, &mut ResolutionCache::new())
}
