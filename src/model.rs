//! Positioned diagram model handed over by the layout step.
//!
//! Everything here is already placed: node centers and sizes, edge
//! waypoints, subgraph bounds. The renderer never moves anything; it only
//! reads this model. Nodes are stored in layout order and indexed by id, and
//! subgraph nesting is expressed through child ids rather than owned trees.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

pub type Point = (f32, f32);

/// Identity of an edge for highlighting purposes.
pub type EdgeKey = (String, String);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_center(center: Point, width: f32, height: f32) -> Self {
        Self::new(center.0 - width / 2.0, center.1 - height / 2.0, width, height)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.0 >= self.x && point.0 <= self.right() && point.1 >= self.y && point.1 <= self.bottom()
    }

    pub fn inflate(&self, margin: f32) -> Self {
        Self::new(
            self.x - margin,
            self.y - margin,
            self.width + margin * 2.0,
            self.height + margin * 2.0,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramKind {
    #[default]
    Flowchart,
    State,
    Class,
    Er,
    Requirement,
    Block,
    Architecture,
    Mindmap,
}

impl DiagramKind {
    /// Key used in skin lookups (`{kind}.{shape}`).
    pub fn key(self) -> &'static str {
        match self {
            Self::Flowchart => "flowchart",
            Self::State => "state",
            Self::Class => "class",
            Self::Er => "er",
            Self::Requirement => "requirement",
            Self::Block => "block",
            Self::Architecture => "architecture",
            Self::Mindmap => "mindmap",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeShape {
    #[default]
    Rectangle,
    RoundRect,
    Stadium,
    Subroutine,
    Cylinder,
    Circle,
    DoubleCircle,
    Diamond,
    Hexagon,
    Parallelogram,
    ParallelogramAlt,
    Trapezoid,
    TrapezoidAlt,
    Asymmetric,
    Text,
    /// Filled start dot of a state machine.
    StartMarker,
    /// Bullseye end state.
    EndMarker,
    /// Fork/join bar.
    ForkBar,
}

impl NodeShape {
    pub fn key(self) -> &'static str {
        match self {
            Self::Rectangle => "rectangle",
            Self::RoundRect => "round-rect",
            Self::Stadium => "stadium",
            Self::Subroutine => "subroutine",
            Self::Cylinder => "cylinder",
            Self::Circle => "circle",
            Self::DoubleCircle => "double-circle",
            Self::Diamond => "diamond",
            Self::Hexagon => "hexagon",
            Self::Parallelogram => "parallelogram",
            Self::ParallelogramAlt => "parallelogram-alt",
            Self::Trapezoid => "trapezoid",
            Self::TrapezoidAlt => "trapezoid-alt",
            Self::Asymmetric => "asymmetric",
            Self::Text => "text",
            Self::StartMarker => "start-marker",
            Self::EndMarker => "end-marker",
            Self::ForkBar => "fork-bar",
        }
    }

    /// Marker shapes are pseudo-states: they are never routing obstacles and
    /// do not count towards the normal-node bounds.
    pub fn is_marker(self) -> bool {
        matches!(self, Self::StartMarker | Self::EndMarker | Self::ForkBar)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeStyle {
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub text_color: Option<String>,
    pub stroke_width: Option<f32>,
    pub stroke_dasharray: Option<String>,
}

impl NodeStyle {
    pub fn is_empty(&self) -> bool {
        self.fill.is_none()
            && self.stroke.is_none()
            && self.text_color.is_none()
            && self.stroke_width.is_none()
            && self.stroke_dasharray.is_none()
    }
}

/// Opaque link payload; the renderer hands `url` back to the host untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLink {
    pub url: String,
    #[serde(default)]
    pub tooltip: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub shape: NodeShape,
    /// Center x.
    pub x: f32,
    /// Center y.
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub style: NodeStyle,
    #[serde(default)]
    pub inline_style: Option<String>,
    /// Space separated class names.
    #[serde(default)]
    pub classes: Option<String>,
    #[serde(default)]
    pub link: Option<NodeLink>,
    #[serde(default)]
    pub rank: Option<usize>,
    #[serde(default)]
    pub category: Option<usize>,
}

impl Node {
    pub fn new(id: &str, shape: NodeShape, center: Point, size: (f32, f32)) -> Self {
        Self {
            id: id.to_string(),
            shape,
            x: center.0,
            y: center.1,
            width: size.0,
            height: size.1,
            label: id.to_string(),
            style: NodeStyle::default(),
            inline_style: None,
            classes: None,
            link: None,
            rank: None,
            category: None,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn with_link(mut self, url: &str) -> Self {
        self.link = Some(NodeLink {
            url: url.to_string(),
            tooltip: None,
        });
        self
    }

    pub fn with_rank(mut self, rank: usize) -> Self {
        self.rank = Some(rank);
        self
    }

    pub fn center(&self) -> Point {
        (self.x, self.y)
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_center(self.center(), self.width, self.height)
    }

    /// Label lines; `\n` and `<br>` variants are forced breaks.
    pub fn label_lines(&self) -> Vec<String> {
        split_label(&self.label)
    }
}

pub(crate) fn split_label(label: &str) -> Vec<String> {
    let normalized = label
        .replace("<br/>", "\n")
        .replace("<br />", "\n")
        .replace("<br>", "\n");
    normalized.split('\n').map(|line| line.trim().to_string()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeStyle {
    #[default]
    Plain,
    Dotted,
    Thick,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub points: Vec<Point>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub label_anchor: Option<Point>,
    #[serde(default)]
    pub style: EdgeStyle,
    #[serde(default)]
    pub arrow_start: bool,
    #[serde(default = "default_true")]
    pub arrow_end: bool,
    #[serde(default)]
    pub inline_style: Option<String>,
    #[serde(default)]
    pub category: Option<usize>,
}

impl Edge {
    pub fn new(from: &str, to: &str, points: Vec<Point>) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            points,
            label: None,
            label_anchor: None,
            style: EdgeStyle::Plain,
            arrow_start: false,
            arrow_end: true,
            inline_style: None,
            category: None,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn key(&self) -> EdgeKey {
        (self.from.clone(), self.to.clone())
    }

    pub fn matches(&self, key: &EdgeKey) -> bool {
        self.from == key.0 && self.to == key.1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subgraph {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub nodes: Vec<String>,
    /// Ids of directly nested subgraphs.
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub style: NodeStyle,
    #[serde(default)]
    pub classes: Option<String>,
}

impl Subgraph {
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    pub offset: f32,
    pub color: String,
}

/// Linear gradient in object-bounding-box units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearGradient {
    #[serde(default)]
    pub x1: f32,
    #[serde(default)]
    pub y1: f32,
    #[serde(default = "one")]
    pub x2: f32,
    #[serde(default)]
    pub y2: f32,
    pub stops: Vec<GradientStop>,
}

fn one() -> f32 {
    1.0
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiagramFile {
    #[serde(default)]
    kind: DiagramKind,
    width: f32,
    height: f32,
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    edges: Vec<Edge>,
    #[serde(default)]
    subgraphs: Vec<Subgraph>,
    #[serde(default)]
    class_defs: BTreeMap<String, String>,
    #[serde(default)]
    gradients: BTreeMap<String, LinearGradient>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "DiagramFile", into = "DiagramFile")]
pub struct Diagram {
    pub kind: DiagramKind,
    /// Canvas size reported by layout.
    pub width: f32,
    pub height: f32,
    nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    subgraphs: Vec<Subgraph>,
    /// Class name -> CSS declaration text.
    pub class_defs: BTreeMap<String, String>,
    pub gradients: BTreeMap<String, LinearGradient>,
    node_index: HashMap<String, usize>,
    subgraph_index: HashMap<String, usize>,
}

impl From<DiagramFile> for Diagram {
    fn from(file: DiagramFile) -> Self {
        let mut diagram = Diagram::new(file.kind, file.width, file.height);
        for node in file.nodes {
            diagram.add_node(node);
        }
        for subgraph in file.subgraphs {
            diagram.add_subgraph(subgraph);
        }
        diagram.edges = file.edges;
        diagram.class_defs = file.class_defs;
        diagram.gradients = file.gradients;
        diagram
    }
}

impl From<Diagram> for DiagramFile {
    fn from(diagram: Diagram) -> Self {
        DiagramFile {
            kind: diagram.kind,
            width: diagram.width,
            height: diagram.height,
            nodes: diagram.nodes,
            edges: diagram.edges,
            subgraphs: diagram.subgraphs,
            class_defs: diagram.class_defs,
            gradients: diagram.gradients,
        }
    }
}

impl Diagram {
    pub fn new(kind: DiagramKind, width: f32, height: f32) -> Self {
        Self {
            kind,
            width,
            height,
            ..Default::default()
        }
    }

    pub fn from_json(input: &str) -> serde_json::Result<Self> {
        let mut diagram: Diagram = serde_json::from_str(input)?;
        diagram.validate_soft();
        Ok(diagram)
    }

    /// Adds or replaces a node by id, keeping first-insertion order.
    pub fn add_node(&mut self, node: Node) {
        if let Some(&idx) = self.node_index.get(&node.id) {
            self.nodes[idx] = node;
            return;
        }
        self.node_index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
    }

    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    pub fn add_subgraph(&mut self, subgraph: Subgraph) {
        if let Some(&idx) = self.subgraph_index.get(&subgraph.id) {
            self.subgraphs[idx] = subgraph;
            return;
        }
        self.subgraph_index.insert(subgraph.id.clone(), self.subgraphs.len());
        self.subgraphs.push(subgraph);
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_index.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn subgraphs(&self) -> &[Subgraph] {
        &self.subgraphs
    }

    pub fn subgraph(&self, id: &str) -> Option<&Subgraph> {
        self.subgraph_index.get(id).map(|&idx| &self.subgraphs[idx])
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty() && self.subgraphs.is_empty()
    }

    /// Incoming edges of `id` in insertion order.
    pub fn incoming<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |edge| edge.to == id)
    }

    /// Outgoing edges of `id` in insertion order.
    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |edge| edge.from == id)
    }

    /// Bounding box of all non-marker nodes.
    pub fn normal_node_bounds(&self) -> Option<Rect> {
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        let mut any = false;
        for node in self.nodes.iter().filter(|node| !node.shape.is_marker()) {
            let b = node.bounds();
            min_x = min_x.min(b.x);
            min_y = min_y.min(b.y);
            max_x = max_x.max(b.right());
            max_y = max_y.max(b.bottom());
            any = true;
        }
        any.then(|| Rect::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }

    /// Subgraphs paired with their nesting depth, parents before children.
    ///
    /// Roots are subgraphs nobody lists as a child. A subgraph reachable
    /// twice (malformed input) is emitted once.
    pub fn subgraphs_by_depth(&self) -> Vec<(&Subgraph, usize)> {
        let nested: HashSet<&str> = self
            .subgraphs
            .iter()
            .flat_map(|sub| sub.children.iter().map(String::as_str))
            .collect();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();
        let mut stack: Vec<(&Subgraph, usize)> = self
            .subgraphs
            .iter()
            .filter(|sub| !nested.contains(sub.id.as_str()))
            .rev()
            .map(|sub| (sub, 0))
            .collect();
        while let Some((sub, depth)) = stack.pop() {
            if !visited.insert(sub.id.as_str()) {
                continue;
            }
            out.push((sub, depth));
            for child in sub.children.iter().rev() {
                if let Some(child) = self.subgraph(child) {
                    stack.push((child, depth + 1));
                }
            }
        }
        out
    }

    /// Drops edges that reference unknown nodes or carry fewer than two
    /// waypoints. Layout is expected never to produce these; we log instead
    /// of failing.
    pub fn validate_soft(&mut self) {
        let before = self.edges.len();
        let index = &self.node_index;
        self.edges.retain(|edge| {
            if !(index.contains_key(&edge.from) && index.contains_key(&edge.to)) {
                tracing::warn!(from = %edge.from, to = %edge.to, "dropping edge with unknown endpoint");
                return false;
            }
            if edge.points.len() < 2 {
                tracing::warn!(from = %edge.from, to = %edge.to, "dropping edge with fewer than two waypoints");
                return false;
            }
            true
        });
        if self.edges.len() != before {
            tracing::debug!(dropped = before - self.edges.len(), "edges removed during validation");
        }
    }
}
