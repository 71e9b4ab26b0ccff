use crate::model::{Diagram, EdgeKey, Point};

/// What the pointer is over, in model space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitTarget {
    Node(String),
    Edge(EdgeKey),
}

impl HitTarget {
    /// Node the hover is attributed to; an edge hit reports its source.
    pub fn node_id(&self) -> &str {
        match self {
            Self::Node(id) => id,
            Self::Edge((from, _)) => from,
        }
    }
}

/// Nodes win over edges. Edges are tested against their waypoint polyline
/// within `threshold` model units; the first match wins in both passes.
pub fn hit_test(diagram: &Diagram, point: Point, threshold: f32) -> Option<HitTarget> {
    if let Some(node) = diagram
        .nodes()
        .iter()
        .find(|node| node.bounds().contains(point))
    {
        return Some(HitTarget::Node(node.id.clone()));
    }
    diagram
        .edges
        .iter()
        .find(|edge| {
            edge.points
                .windows(2)
                .any(|pair| point_segment_distance(point, pair[0], pair[1]) <= threshold)
        })
        .map(|edge| HitTarget::Edge(edge.key()))
}

fn point_segment_distance(point: Point, a: Point, b: Point) -> f32 {
    let vx = b.0 - a.0;
    let vy = b.1 - a.1;
    let len2 = vx * vx + vy * vy;
    if len2 <= 1e-6 {
        return ((point.0 - a.0).powi(2) + (point.1 - a.1).powi(2)).sqrt();
    }
    let t = (((point.0 - a.0) * vx + (point.1 - a.1) * vy) / len2).clamp(0.0, 1.0);
    let dx = point.0 - (a.0 + vx * t);
    let dy = point.1 - (a.1 + vy * t);
    (dx * dx + dy * dy).sqrt()
}
