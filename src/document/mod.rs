//! Document sink: a retained primitive tree that serializes to SVG text.
//!
//! Free-form strings (style, transform, paint, link targets, skin
//! definitions) are sanitized as they enter the tree, so both the
//! serialized text and any later replay of the tree only ever see the
//! cleaned values.

mod escape;
mod sanitize;

pub use escape::{escape_attr, escape_text, num};
pub use sanitize::{sanitize_fragment, sanitize_href, sanitize_paint, sanitize_style, sanitize_transform};

use std::fmt::Write;

use crate::model::{LinearGradient, NodeLink};
use crate::scene::{Group, Paint, Primitive, PrimitiveSink, Scene, Shape};

#[derive(Debug, Clone, PartialEq)]
pub enum DocNode {
    Group { group: Group, children: Vec<DocNode> },
    Element(Primitive),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub width: f32,
    pub height: f32,
    pub background: String,
    pub gradients: Vec<(String, LinearGradient)>,
    pub fragments: Vec<String>,
    pub children: Vec<DocNode>,
}

impl Document {
    pub fn from_scene(scene: &Scene) -> Self {
        let mut sink = DocumentSink::new(scene);
        scene.replay(&mut sink);
        sink.finish()
    }

    /// Replays the retained tree in document order.
    pub fn replay(&self, sink: &mut impl PrimitiveSink) {
        fn walk(nodes: &[DocNode], sink: &mut impl PrimitiveSink) {
            for node in nodes {
                match node {
                    DocNode::Group { group, children } => {
                        sink.push_group(group);
                        walk(children, sink);
                        sink.pop_group();
                    }
                    DocNode::Element(primitive) => sink.draw(primitive),
                }
            }
        }
        walk(&self.children, sink);
    }

    pub fn to_svg(&self) -> String {
        let mut out = String::new();
        let (w, h) = (num(self.width), num(self.height));
        let _ = write!(
            out,
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">"
        );
        let _ = write!(
            out,
            "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
            escape_attr(&self.background)
        );
        if !self.gradients.is_empty() || !self.fragments.is_empty() {
            out.push_str("<defs>");
            for (id, gradient) in &self.gradients {
                write_gradient(&mut out, id, gradient);
            }
            for fragment in &self.fragments {
                out.push_str(fragment);
            }
            out.push_str("</defs>");
        }
        for node in &self.children {
            write_node(&mut out, node);
        }
        out.push_str("</svg>");
        out
    }
}

/// Accumulates the primitive stream into a [`Document`].
pub struct DocumentSink {
    document: Document,
    stack: Vec<(Group, Vec<DocNode>)>,
}

impl DocumentSink {
    pub fn new(scene: &Scene) -> Self {
        let background = sanitize_paint(&scene.background).unwrap_or_else(|| "none".to_string());
        Self {
            document: Document {
                width: scene.width,
                height: scene.height,
                background,
                gradients: scene
                    .defs
                    .gradients
                    .iter()
                    .map(|(id, g)| (id.clone(), g.clone()))
                    .collect(),
                fragments: scene
                    .defs
                    .fragments
                    .iter()
                    .filter_map(|f| sanitize_fragment(f))
                    .collect(),
                children: Vec::new(),
            },
            stack: Vec::new(),
        }
    }

    fn current(&mut self) -> &mut Vec<DocNode> {
        match self.stack.last_mut() {
            Some((_, children)) => children,
            None => &mut self.document.children,
        }
    }

    pub fn finish(mut self) -> Document {
        while !self.stack.is_empty() {
            self.pop_group();
        }
        self.document
    }
}

impl PrimitiveSink for DocumentSink {
    fn push_group(&mut self, group: &Group) {
        let mut group = group.clone();
        group.transform = group.transform.as_deref().and_then(sanitize_transform);
        group.link = group.link.and_then(|link| {
            sanitize_href(&link.url).map(|url| NodeLink {
                url,
                tooltip: link.tooltip,
            })
        });
        self.stack.push((group, Vec::new()));
    }

    fn pop_group(&mut self) {
        let Some((group, children)) = self.stack.pop() else {
            tracing::debug!("unbalanced group pop ignored");
            return;
        };
        self.current().push(DocNode::Group { group, children });
    }

    fn draw(&mut self, primitive: &Primitive) {
        let mut primitive = primitive.clone();
        primitive.transform = primitive.transform.as_deref().and_then(sanitize_transform);
        primitive.style = primitive.style.as_deref().and_then(sanitize_style);
        let paint = &mut primitive.paint;
        paint.fill = paint
            .fill
            .as_deref()
            .map(|f| sanitize_paint(f).unwrap_or_else(|| "none".to_string()));
        paint.stroke = paint
            .stroke
            .as_deref()
            .map(|s| sanitize_paint(s).unwrap_or_else(|| "none".to_string()));
        paint.dash = paint.dash.as_deref().and_then(sanitize_paint);
        self.current().push(DocNode::Element(primitive));
    }
}

fn write_gradient(out: &mut String, id: &str, gradient: &LinearGradient) {
    let _ = write!(
        out,
        "<linearGradient id=\"{}\" x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\">",
        escape_attr(id),
        num(gradient.x1),
        num(gradient.y1),
        num(gradient.x2),
        num(gradient.y2)
    );
    for stop in &gradient.stops {
        let color = sanitize_paint(&stop.color).unwrap_or_else(|| "none".to_string());
        let _ = write!(
            out,
            "<stop offset=\"{}\" stop-color=\"{}\"/>",
            num(stop.offset),
            escape_attr(&color)
        );
    }
    out.push_str("</linearGradient>");
}

fn write_node(out: &mut String, node: &DocNode) {
    match node {
        DocNode::Group { group, children } => {
            if let Some(link) = &group.link {
                let _ = write!(out, "<a href=\"{}\">", escape_attr(&link.url));
                if let Some(tooltip) = &link.tooltip {
                    let _ = write!(out, "<title>{}</title>", escape_text(tooltip));
                }
            }
            out.push_str("<g");
            if !group.class.is_empty() {
                let _ = write!(out, " class=\"{}\"", escape_attr(&group.class));
            }
            if let Some(id) = &group.id {
                let _ = write!(out, " id=\"{}\"", escape_attr(id));
            }
            if let Some(transform) = &group.transform {
                let _ = write!(out, " transform=\"{}\"", escape_attr(transform));
            }
            out.push('>');
            for child in children {
                write_node(out, child);
            }
            out.push_str("</g>");
            if group.link.is_some() {
                out.push_str("</a>");
            }
        }
        DocNode::Element(primitive) => write_primitive(out, primitive),
    }
}

fn write_primitive(out: &mut String, primitive: &Primitive) {
    let content = match &primitive.shape {
        Shape::Rect { rect, radius } => {
            let _ = write!(
                out,
                "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\"",
                num(rect.x),
                num(rect.y),
                num(rect.width),
                num(rect.height)
            );
            if *radius > 0.0 {
                let _ = write!(out, " rx=\"{0}\" ry=\"{0}\"", num(*radius));
            }
            None
        }
        Shape::Ellipse { center, rx, ry } => {
            let _ = write!(
                out,
                "<ellipse cx=\"{}\" cy=\"{}\" rx=\"{}\" ry=\"{}\"",
                num(center.0),
                num(center.1),
                num(*rx),
                num(*ry)
            );
            None
        }
        Shape::Line { from, to } => {
            let _ = write!(
                out,
                "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\"",
                num(from.0),
                num(from.1),
                num(to.0),
                num(to.1)
            );
            None
        }
        Shape::Path { d } => {
            let _ = write!(out, "<path d=\"{}\"", escape_attr(d));
            None
        }
        Shape::Polygon { points } => {
            let list: Vec<String> = points
                .iter()
                .map(|p| format!("{},{}", num(p.0), num(p.1)))
                .collect();
            let _ = write!(out, "<polygon points=\"{}\"", list.join(" "));
            None
        }
        Shape::Text(run) => {
            let _ = write!(
                out,
                "<text x=\"{}\" y=\"{}\" text-anchor=\"{}\" font-family=\"{}\" font-size=\"{}\"",
                num(run.origin.0),
                num(run.origin.1),
                run.anchor.as_str(),
                escape_attr(&run.font_family),
                num(run.font_size)
            );
            Some(run.content.as_str())
        }
    };
    write_paint(out, &primitive.paint);
    if let Some(transform) = &primitive.transform {
        let _ = write!(out, " transform=\"{}\"", escape_attr(transform));
    }
    if let Some(style) = &primitive.style {
        let _ = write!(out, " style=\"{}\"", escape_attr(style));
    }
    match content {
        Some(text) => {
            let _ = write!(out, ">{}</text>", escape_text(text));
        }
        None => out.push_str("/>"),
    }
}

fn write_paint(out: &mut String, paint: &Paint) {
    let _ = write!(
        out,
        " fill=\"{}\"",
        escape_attr(paint.fill.as_deref().unwrap_or("none"))
    );
    if paint.has_stroke() {
        if let Some(stroke) = &paint.stroke {
            let _ = write!(
                out,
                " stroke=\"{}\" stroke-width=\"{}\"",
                escape_attr(stroke),
                num(paint.stroke_width)
            );
        }
        if let Some(dash) = &paint.dash {
            let _ = write!(out, " stroke-dasharray=\"{}\"", escape_attr(dash));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::{Diagram, DiagramKind, Edge, Node, NodeShape};
    use crate::scene::{DrawCommand, Role, build_scene};
    use crate::theme::Theme;

    fn scene() -> Scene {
        let mut diagram = Diagram::new(DiagramKind::Flowchart, 120.0, 160.0);
        diagram.add_node(
            Node::new("A", NodeShape::Rectangle, (60.0, 30.0), (60.0, 30.0))
                .with_label("a < b & c")
                .with_link("https://example.com/?a=1&b=2"),
        );
        diagram.add_node(Node::new("B", NodeShape::Diamond, (60.0, 130.0), (40.0, 40.0)));
        diagram.add_edge(Edge::new("A", "B", vec![(60.0, 45.0), (60.0, 110.0)]));
        build_scene(&diagram, &Theme::mermaid_default(), None, &Config::default())
    }

    #[test]
    fn serialization_is_deterministic() {
        let scene = scene();
        let first = Document::from_scene(&scene).to_svg();
        let second = Document::from_scene(&scene).to_svg();
        assert_eq!(first, second);
        assert!(first.starts_with("<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"136\""));
        assert!(first.ends_with("</svg>"));
    }

    #[test]
    fn text_and_attributes_escape_differently() {
        let svg = Document::from_scene(&scene()).to_svg();
        assert!(svg.contains(">a &lt; b &amp; c</text>"));
        assert!(svg.contains("<a href=\"https://example.com/?a=1&amp;b=2\">"));
    }

    #[test]
    fn tree_nesting_mirrors_stream() {
        let scene = scene();
        let document = Document::from_scene(&scene);
        assert_eq!(document.children.len(), 1, "single diagram root");
        let DocNode::Group { children, .. } = &document.children[0] else {
            panic!("root group expected");
        };
        let groups = scene
            .commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Push(_)))
            .count();
        assert_eq!(children.len(), groups - 1);
    }

    #[test]
    fn injected_strings_are_cleaned_on_entry() {
        let mut scene = scene();
        for cmd in &mut scene.commands {
            if let DrawCommand::Draw(p) = cmd
                && p.role == Role::NodeShape
            {
                p.style = Some("fill:url(javascript:alert(1))".into());
                p.transform = Some("translate(1,1)\" onload=\"x".into());
                p.paint.fill = Some("url(javascript:x)".into());
            }
            if let DrawCommand::Push(g) = cmd
                && let Some(link) = &mut g.link
            {
                link.url = "javascript:alert(1)".into();
            }
        }
        let svg = Document::from_scene(&scene).to_svg();
        assert!(!svg.to_ascii_lowercase().contains("javascript"));
        assert!(!svg.contains("onload"));
        assert!(!svg.contains("<a "));
    }
}
