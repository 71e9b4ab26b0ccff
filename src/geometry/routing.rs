use std::collections::{HashMap, HashSet};

use crate::config::GeometryConfig;
use crate::model::{Diagram, Edge, Node, Point, Rect};

use super::PathSegment;

// ── Stacked routes ──────────────────────────────────────────────────
/// Fraction of the horizontal run used for the first bezier handle.
const STACK_HANDLE_RATIO: f32 = 0.55;
/// Keeps stacked entry points inside the target box.
const STACK_ENTRY_INSET: f32 = 1.0;
/// Tolerance when comparing node centers.
const CENTER_EPS: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackSide {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackSlot {
    pub side: StackSide,
    pub index: usize,
}

/// Assigns riser slots to back edges and to the forward member of each
/// bidirectional pair.
///
/// Back edges (source below target) exit right; forward members of a pair
/// exit left. Within a side, slots are numbered by ascending source x.
pub(super) fn plan_stacks(diagram: &Diagram) -> HashMap<usize, StackSlot> {
    let pairs: HashSet<(&str, &str)> = diagram
        .edges
        .iter()
        .filter(|edge| edge.from != edge.to)
        .map(|edge| (edge.from.as_str(), edge.to.as_str()))
        .collect();

    let mut left: Vec<(f32, usize)> = Vec::new();
    let mut right: Vec<(f32, usize)> = Vec::new();
    for (idx, edge) in diagram.edges.iter().enumerate() {
        if edge.from == edge.to || edge.points.len() < 2 {
            continue;
        }
        let (Some(from), Some(to)) = (diagram.node(&edge.from), diagram.node(&edge.to)) else {
            continue;
        };
        if is_back_edge(from, to) {
            right.push((from.x, idx));
        } else if pairs.contains(&(edge.to.as_str(), edge.from.as_str())) && from.y < to.y - CENTER_EPS {
            left.push((from.x, idx));
        }
    }

    let mut slots = HashMap::new();
    for (side, mut candidates) in [(StackSide::Left, left), (StackSide::Right, right)] {
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        for (index, (_, edge_idx)) in candidates.into_iter().enumerate() {
            slots.insert(edge_idx, StackSlot { side, index });
        }
    }
    slots
}

pub(super) fn is_back_edge(from: &Node, to: &Node) -> bool {
    from.y > to.y + CENTER_EPS
}

/// Curved route through a vertical riser outside the diagram.
///
/// Returns the segments and the label anchor on the riser.
pub(super) fn stacked_route(
    diagram: &Diagram,
    from: &Node,
    to: &Node,
    slot: StackSlot,
    config: &GeometryConfig,
) -> (Vec<PathSegment>, Point) {
    let source = from.bounds();
    let target = to.bounds();
    let bounds = diagram
        .normal_node_bounds()
        .unwrap_or_else(|| union(source, target));
    let offset = config.stack_spacing * (slot.index as f32 + 1.0);
    let entry_y = (target.center().1 + config.stack_entry_spacing * slot.index as f32)
        .min(target.bottom() - STACK_ENTRY_INSET);

    let (riser_x, start, end) = match slot.side {
        StackSide::Left => (
            bounds.x - offset,
            (source.x, source.center().1),
            (target.x, entry_y),
        ),
        StackSide::Right => (
            bounds.right() + offset,
            (source.right(), source.center().1),
            (target.right(), entry_y),
        ),
    };

    let rise = end.1 - start.1;
    let dir = if rise >= 0.0 { 1.0 } else { -1.0 };
    let radius = config
        .stack_curve_radius
        .min(rise.abs() / 2.0)
        .min((riser_x - start.0).abs())
        .max(0.0);

    let segments = vec![
        PathSegment::MoveTo(start),
        PathSegment::CubicTo(
            (start.0 + (riser_x - start.0) * STACK_HANDLE_RATIO, start.1),
            (riser_x, start.1),
            (riser_x, start.1 + dir * radius),
        ),
        PathSegment::LineTo((riser_x, end.1 - dir * radius)),
        PathSegment::CubicTo(
            (riser_x, end.1),
            (end.0 + (riser_x - end.0) * STACK_HANDLE_RATIO, end.1),
            end,
        ),
    ];
    let anchor = (riser_x, (start.1 + end.1) / 2.0);
    (segments, anchor)
}

fn union(a: Rect, b: Rect) -> Rect {
    let x = a.x.min(b.x);
    let y = a.y.min(b.y);
    Rect::new(x, y, a.right().max(b.right()) - x, a.bottom().max(b.bottom()) - y)
}

/// Source and target ranks one apart (or equal) are adjacent and never
/// detoured. Unknown ranks are treated as non-adjacent.
fn ranks_adjacent(from: &Node, to: &Node) -> bool {
    match (from.rank, to.rank) {
        (Some(a), Some(b)) => a.abs_diff(b) <= 1,
        _ => false,
    }
}

/// First third-party node hit by the sampled straight line, nearest the
/// source first.
pub(super) fn find_obstacle<'a>(
    diagram: &'a Diagram,
    edge: &Edge,
    config: &GeometryConfig,
) -> Option<&'a Node> {
    let (&start, &end) = (edge.points.first()?, edge.points.last()?);
    let samples = config.obstacle_samples.max(1);
    let candidates: Vec<(&Node, Rect)> = diagram
        .nodes()
        .iter()
        .filter(|node| node.id != edge.from && node.id != edge.to && !node.shape.is_marker())
        .map(|node| (node, node.bounds().inflate(config.obstacle_margin)))
        .collect();
    if candidates.is_empty() {
        return None;
    }
    for step in 1..=samples {
        let t = step as f32 / (samples as f32 + 1.0);
        let point = (start.0 + (end.0 - start.0) * t, start.1 + (end.1 - start.1) * t);
        if let Some((node, _)) = candidates.iter().find(|(_, rect)| rect.contains(point)) {
            return Some(node);
        }
    }
    None
}

/// Orthogonal detour around `obstacle`: down out of the source, across to
/// the obstacle side nearer the source, down past the obstacle, across to
/// the target column and into the target.
///
/// Returns the route and the label anchor on the vertical leg.
pub(super) fn detour_route(
    from: &Node,
    to: &Node,
    obstacle: &Node,
    config: &GeometryConfig,
) -> (Vec<Point>, Point) {
    let margin = config.obstacle_margin;
    let source = from.bounds();
    let target = to.bounds();
    let block = obstacle.bounds();
    let (sx, tx) = (source.center().0, target.center().0);

    let y1 = source.bottom() + margin;
    let side_x = if (sx - block.x).abs() <= (sx - block.right()).abs() {
        block.x - margin
    } else {
        block.right() + margin
    };
    // Enter from above when the target sits below the obstacle and below the
    // source's exit run, otherwise pass under both and come up into the target.
    let (y2, entry) = if target.y > block.bottom() && y1 < target.y {
        let gap = (target.y - block.bottom()) / 2.0;
        (block.bottom() + margin.min(gap), (tx, target.y))
    } else {
        (block.bottom().max(target.bottom()) + margin, (tx, target.bottom()))
    };
    let y2 = y2.max(y1);

    let points = vec![
        (sx, source.bottom()),
        (sx, y1),
        (side_x, y1),
        (side_x, y2),
        (tx, y2),
        entry,
    ];
    let anchor = (side_x, (y1 + y2) / 2.0);
    (points, anchor)
}

/// Whether the edge qualifies for an obstacle check at all.
pub(super) fn wants_obstacle_check(from: &Node, to: &Node) -> bool {
    !ranks_adjacent(from, to) && !is_back_edge(from, to)
}
