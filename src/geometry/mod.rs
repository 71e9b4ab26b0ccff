//! Edge geometry: the single place where drawn edge paths, arrowheads and
//! label anchors are computed. Both sinks consume the result.

mod arrow;
mod routing;
pub mod shapes;
mod spline;

pub use routing::{StackSide, StackSlot};

use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::config::GeometryConfig;
use crate::model::{Diagram, Edge, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveMode {
    Linear,
    #[default]
    Basis,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    MoveTo(Point),
    LineTo(Point),
    CubicTo(Point, Point, Point),
}

impl PathSegment {
    pub fn end(&self) -> Point {
        match *self {
            Self::MoveTo(p) | Self::LineTo(p) | Self::CubicTo(_, _, p) => p,
        }
    }
}

/// How an edge ended up being routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Straight,
    Spline,
    BezierSequence,
    Detour,
    Stacked(StackSlot),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeGeometry {
    pub segments: Vec<PathSegment>,
    /// `[tip, left, right]` at the target end.
    pub arrow_end: Option<[Point; 3]>,
    /// `[tip, left, right]` at the source end.
    pub arrow_start: Option<[Point; 3]>,
    pub label_anchor: Option<Point>,
    pub route: RouteKind,
}

impl EdgeGeometry {
    /// Every point the path is built from, control points included, in
    /// drawing order.
    pub fn geometry_points(&self) -> Vec<Point> {
        geometry_points(&self.segments)
    }

    pub fn start(&self) -> Option<Point> {
        self.segments.first().map(PathSegment::end)
    }

    pub fn end(&self) -> Option<Point> {
        self.segments.last().map(PathSegment::end)
    }

    /// SVG path data for the segments.
    pub fn path_data(&self) -> String {
        path_data(&self.segments)
    }
}

pub fn geometry_points(segments: &[PathSegment]) -> Vec<Point> {
    let mut points = Vec::with_capacity(segments.len() * 2);
    for segment in segments {
        match *segment {
            PathSegment::MoveTo(p) | PathSegment::LineTo(p) => points.push(p),
            PathSegment::CubicTo(c1, c2, p) => points.extend([c1, c2, p]),
        }
    }
    points
}

pub fn path_data(segments: &[PathSegment]) -> String {
    let mut d = String::new();
    for segment in segments {
        if !d.is_empty() {
            d.push(' ');
        }
        let _ = match *segment {
            PathSegment::MoveTo(p) => write!(d, "M {:.2} {:.2}", p.0, p.1),
            PathSegment::LineTo(p) => write!(d, "L {:.2} {:.2}", p.0, p.1),
            PathSegment::CubicTo(c1, c2, p) => write!(
                d,
                "C {:.2} {:.2} {:.2} {:.2} {:.2} {:.2}",
                c1.0, c1.1, c2.0, c2.1, p.0, p.1
            ),
        };
    }
    d
}

/// Resolves the geometry of every edge, index-aligned with `diagram.edges`.
/// Edges that cannot be drawn map to `None`.
pub fn resolve_edges(
    diagram: &Diagram,
    config: &GeometryConfig,
    curve: CurveMode,
) -> Vec<Option<EdgeGeometry>> {
    let stacks = routing::plan_stacks(diagram);
    diagram
        .edges
        .iter()
        .enumerate()
        .map(|(idx, edge)| resolve_edge(diagram, edge, stacks.get(&idx).copied(), config, curve))
        .collect()
}

fn resolve_edge(
    diagram: &Diagram,
    edge: &Edge,
    stack: Option<StackSlot>,
    config: &GeometryConfig,
    curve: CurveMode,
) -> Option<EdgeGeometry> {
    if edge.points.len() < 2 {
        tracing::trace!(from = %edge.from, to = %edge.to, "edge has fewer than two waypoints");
        return None;
    }
    let endpoints = diagram.node(&edge.from).zip(diagram.node(&edge.to));

    let (segments, routed_anchor, route) = match (endpoints, stack) {
        (Some((from, to)), Some(slot)) => {
            let (segments, anchor) = routing::stacked_route(diagram, from, to, slot, config);
            (segments, Some(anchor), RouteKind::Stacked(slot))
        }
        (Some((from, to)), None) if routing::wants_obstacle_check(from, to) => {
            match routing::find_obstacle(diagram, edge, config) {
                Some(obstacle) => {
                    let (points, anchor) = routing::detour_route(from, to, obstacle, config);
                    tracing::debug!(from = %edge.from, to = %edge.to, obstacle = %obstacle.id, "detouring edge");
                    (spline::linear(&points), Some(anchor), RouteKind::Detour)
                }
                None => plain_route(&edge.points, curve),
            }
        }
        _ => plain_route(&edge.points, curve),
    };

    let points = geometry_points(&segments);
    let arrow_end = if edge.arrow_end {
        tail_pair(&points).and_then(|(from, tip)| {
            arrow::arrowhead(from, tip, config.arrow_length, config.arrow_half_width)
        })
    } else {
        None
    };
    let arrow_start = if edge.arrow_start && points.len() >= 2 {
        arrow::arrowhead(points[1], points[0], config.arrow_length, config.arrow_half_width)
    } else {
        None
    };
    let label_anchor = if edge.label.is_some() {
        routed_anchor
            .or(edge.label_anchor)
            .or_else(|| label_anchor_from_points(&edge.points))
    } else {
        None
    };

    Some(EdgeGeometry {
        segments,
        arrow_end,
        arrow_start,
        label_anchor,
        route,
    })
}

fn plain_route(points: &[Point], curve: CurveMode) -> (Vec<PathSegment>, Option<Point>, RouteKind) {
    let route = if points.len() == 2 || curve == CurveMode::Linear {
        RouteKind::Straight
    } else if spline::is_bezier_sequence(points) {
        RouteKind::BezierSequence
    } else {
        RouteKind::Spline
    };
    (spline::resolve_points(points, curve), None, route)
}

fn tail_pair(points: &[Point]) -> Option<(Point, Point)> {
    let n = points.len();
    (n >= 2).then(|| (points[n - 2], points[n - 1]))
}

/// Midpoint of the longest interior segment, skipping the first and last
/// segment when there are enough of them.
pub(crate) fn label_anchor_from_points(points: &[Point]) -> Option<Point> {
    if points.len() < 2 {
        return None;
    }
    let segment_count = points.len() - 1;
    let range = if segment_count >= 3 {
        1..segment_count - 1
    } else {
        0..segment_count
    };
    let mut best_idx = range.start;
    let mut best_len = -1.0f32;
    for idx in range {
        let (p1, p2) = (points[idx], points[idx + 1]);
        let len = (p2.0 - p1.0).powi(2) + (p2.1 - p1.1).powi(2);
        if len > best_len {
            best_len = len;
            best_idx = idx;
        }
    }
    let (p1, p2) = (points[best_idx], points[best_idx + 1]);
    Some(((p1.0 + p2.0) / 2.0, (p1.1 + p2.1) / 2.0))
}
