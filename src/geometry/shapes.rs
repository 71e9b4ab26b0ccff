//! Built-in geometric node shapes.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::model::{NodeShape, Point, Rect};

const ROUND_RECT_RADIUS: f32 = 5.0;
const SUBROUTINE_INSET: f32 = 8.0;
const DOUBLE_CIRCLE_GAP: f32 = 4.0;
const END_MARKER_INNER_RATIO: f32 = 0.6;
const CYLINDER_CAP_RATIO: f32 = 0.1;

/// Shape description in unit-box coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltinShape {
    Rect { radius: f32 },
    Stadium,
    Ellipse,
    DoubleEllipse,
    Bullseye,
    Polygon(Vec<Point>),
    Cylinder,
    Subroutine,
    Empty,
}

static BUILTIN_SHAPES: Lazy<HashMap<NodeShape, BuiltinShape>> = Lazy::new(|| {
    use BuiltinShape::*;
    let mut table = HashMap::new();
    table.insert(NodeShape::Rectangle, Rect { radius: 0.0 });
    table.insert(NodeShape::RoundRect, Rect { radius: ROUND_RECT_RADIUS });
    table.insert(NodeShape::ForkBar, Rect { radius: 0.0 });
    table.insert(NodeShape::Stadium, Stadium);
    table.insert(NodeShape::Circle, Ellipse);
    table.insert(NodeShape::StartMarker, Ellipse);
    table.insert(NodeShape::DoubleCircle, DoubleEllipse);
    table.insert(NodeShape::EndMarker, Bullseye);
    table.insert(NodeShape::Cylinder, Cylinder);
    table.insert(NodeShape::Subroutine, Subroutine);
    table.insert(NodeShape::Text, Empty);
    table.insert(
        NodeShape::Diamond,
        Polygon(vec![(0.5, 0.0), (1.0, 0.5), (0.5, 1.0), (0.0, 0.5)]),
    );
    table.insert(
        NodeShape::Hexagon,
        Polygon(vec![
            (0.25, 0.0),
            (0.75, 0.0),
            (1.0, 0.5),
            (0.75, 1.0),
            (0.25, 1.0),
            (0.0, 0.5),
        ]),
    );
    table.insert(
        NodeShape::Parallelogram,
        Polygon(vec![(0.18, 0.0), (1.0, 0.0), (0.82, 1.0), (0.0, 1.0)]),
    );
    table.insert(
        NodeShape::ParallelogramAlt,
        Polygon(vec![(0.0, 0.0), (0.82, 0.0), (1.0, 1.0), (0.18, 1.0)]),
    );
    table.insert(
        NodeShape::Trapezoid,
        Polygon(vec![(0.18, 0.0), (0.82, 0.0), (1.0, 1.0), (0.0, 1.0)]),
    );
    table.insert(
        NodeShape::TrapezoidAlt,
        Polygon(vec![(0.0, 0.0), (1.0, 0.0), (0.82, 1.0), (0.18, 1.0)]),
    );
    table.insert(
        NodeShape::Asymmetric,
        Polygon(vec![(0.0, 0.0), (0.78, 0.0), (1.0, 0.5), (0.78, 1.0), (0.0, 1.0)]),
    );
    table
});

/// The built-in description for `shape`.
pub fn builtin_shape(shape: NodeShape) -> &'static BuiltinShape {
    static FALLBACK: BuiltinShape = BuiltinShape::Rect { radius: 0.0 };
    BUILTIN_SHAPES.get(&shape).unwrap_or(&FALLBACK)
}

/// Whether a part takes the shape fill or stays hollow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartFill {
    Shape,
    Hollow,
}

/// A concrete outline placed in a node box.
#[derive(Debug, Clone, PartialEq)]
pub enum Outline {
    Rect { rect: Rect, radius: f32 },
    Ellipse { center: Point, rx: f32, ry: f32 },
    Polygon(Vec<Point>),
    Path(String),
}

/// Places the built-in shape for `shape` into `rect`.
pub fn node_outline(shape: NodeShape, rect: Rect) -> Vec<(Outline, PartFill)> {
    let center = rect.center();
    let (rx, ry) = (rect.width / 2.0, rect.height / 2.0);
    match builtin_shape(shape) {
        BuiltinShape::Rect { radius } => vec![(Outline::Rect { rect, radius: *radius }, PartFill::Shape)],
        BuiltinShape::Stadium => vec![(
            Outline::Rect {
                rect,
                radius: rect.height.min(rect.width) / 2.0,
            },
            PartFill::Shape,
        )],
        BuiltinShape::Ellipse => vec![(Outline::Ellipse { center, rx, ry }, PartFill::Shape)],
        BuiltinShape::DoubleEllipse => vec![
            (Outline::Ellipse { center, rx, ry }, PartFill::Shape),
            (
                Outline::Ellipse {
                    center,
                    rx: (rx - DOUBLE_CIRCLE_GAP).max(0.0),
                    ry: (ry - DOUBLE_CIRCLE_GAP).max(0.0),
                },
                PartFill::Hollow,
            ),
        ],
        BuiltinShape::Bullseye => vec![
            (Outline::Ellipse { center, rx, ry }, PartFill::Hollow),
            (
                Outline::Ellipse {
                    center,
                    rx: rx * END_MARKER_INNER_RATIO,
                    ry: ry * END_MARKER_INNER_RATIO,
                },
                PartFill::Shape,
            ),
        ],
        BuiltinShape::Polygon(unit) => vec![(
            Outline::Polygon(
                unit.iter()
                    .map(|(u, v)| (rect.x + u * rect.width, rect.y + v * rect.height))
                    .collect(),
            ),
            PartFill::Shape,
        )],
        BuiltinShape::Cylinder => {
            let cap = rect.height * CYLINDER_CAP_RATIO;
            let (x, y, w, h) = (rect.x, rect.y, rect.width, rect.height);
            let body = format!(
                "M {x:.2} {top:.2} A {rx:.2} {cap:.2} 0 0 1 {right:.2} {top:.2} L {right:.2} {bottom:.2} A {rx:.2} {cap:.2} 0 0 1 {x:.2} {bottom:.2} Z",
                top = y + cap,
                right = x + w,
                bottom = y + h - cap,
            );
            let lip = format!(
                "M {x:.2} {top:.2} A {rx:.2} {cap:.2} 0 0 0 {right:.2} {top:.2}",
                top = y + cap,
                right = x + w,
            );
            vec![(Outline::Path(body), PartFill::Shape), (Outline::Path(lip), PartFill::Hollow)]
        }
        BuiltinShape::Subroutine => {
            let inset = SUBROUTINE_INSET.min(rect.width / 4.0);
            let bars = format!(
                "M {l:.2} {top:.2} L {l:.2} {bottom:.2} M {r:.2} {top:.2} L {r:.2} {bottom:.2}",
                l = rect.x + inset,
                r = rect.right() - inset,
                top = rect.y,
                bottom = rect.bottom(),
            );
            vec![
                (Outline::Rect { rect, radius: 0.0 }, PartFill::Shape),
                (Outline::Path(bars), PartFill::Hollow),
            ]
        }
        BuiltinShape::Empty => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_shape_has_a_table_entry() {
        for shape in [
            NodeShape::Rectangle,
            NodeShape::RoundRect,
            NodeShape::Stadium,
            NodeShape::Subroutine,
            NodeShape::Cylinder,
            NodeShape::Circle,
            NodeShape::DoubleCircle,
            NodeShape::Diamond,
            NodeShape::Hexagon,
            NodeShape::Parallelogram,
            NodeShape::ParallelogramAlt,
            NodeShape::Trapezoid,
            NodeShape::TrapezoidAlt,
            NodeShape::Asymmetric,
            NodeShape::Text,
            NodeShape::StartMarker,
            NodeShape::EndMarker,
            NodeShape::ForkBar,
        ] {
            assert!(BUILTIN_SHAPES.contains_key(&shape), "{shape:?}");
        }
    }

    #[test]
    fn diamond_touches_box_midpoints() {
        let outline = node_outline(NodeShape::Diamond, Rect::new(0.0, 0.0, 100.0, 50.0));
        assert_eq!(
            outline,
            vec![(
                Outline::Polygon(vec![(50.0, 0.0), (100.0, 25.0), (50.0, 50.0), (0.0, 25.0)]),
                PartFill::Shape
            )]
        );
    }

    #[test]
    fn text_shape_draws_nothing() {
        assert!(node_outline(NodeShape::Text, Rect::new(0.0, 0.0, 10.0, 10.0)).is_empty());
    }
}
