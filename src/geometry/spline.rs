use crate::model::Point;

use super::{CurveMode, PathSegment};

/// Turns waypoints into drawable segments.
///
/// Two points, or linear mode, give straight segments. In basis mode a
/// `1 + 3k` point list is taken as already-expanded bezier control points;
/// anything else is smoothed with the uniform cubic B-spline approximation.
pub(super) fn resolve_points(points: &[Point], mode: CurveMode) -> Vec<PathSegment> {
    if points.len() < 2 {
        return Vec::new();
    }
    if points.len() == 2 || mode == CurveMode::Linear {
        return linear(points);
    }
    if is_bezier_sequence(points) {
        return bezier_sequence(points);
    }
    basis(points)
}

pub(super) fn is_bezier_sequence(points: &[Point]) -> bool {
    points.len() >= 4 && (points.len() - 1) % 3 == 0
}

pub(super) fn linear(points: &[Point]) -> Vec<PathSegment> {
    let mut segments = Vec::with_capacity(points.len());
    segments.push(PathSegment::MoveTo(points[0]));
    segments.extend(points[1..].iter().map(|&p| PathSegment::LineTo(p)));
    segments
}

fn bezier_sequence(points: &[Point]) -> Vec<PathSegment> {
    let mut segments = Vec::with_capacity(1 + points.len() / 3);
    segments.push(PathSegment::MoveTo(points[0]));
    for chunk in points[1..].chunks_exact(3) {
        segments.push(PathSegment::CubicTo(chunk[0], chunk[1], chunk[2]));
    }
    segments
}

/// Uniform cubic B-spline through `points` (three or more).
///
/// Opens with a line to the 5/6-1/6 blend of the first two points, emits one
/// cubic per interior triple, closes with the triple that repeats the last
/// point and a final line onto it.
fn basis(points: &[Point]) -> Vec<PathSegment> {
    let n = points.len();
    let mut segments = Vec::with_capacity(n + 2);
    let (p0, p1) = (points[0], points[1]);
    segments.push(PathSegment::MoveTo(p0));
    segments.push(PathSegment::LineTo((
        (5.0 * p0.0 + p1.0) / 6.0,
        (5.0 * p0.1 + p1.1) / 6.0,
    )));
    for idx in 2..n {
        segments.push(basis_segment(points[idx - 2], points[idx - 1], points[idx]));
    }
    let last = points[n - 1];
    segments.push(basis_segment(points[n - 2], last, last));
    segments.push(PathSegment::LineTo(last));
    segments
}

fn basis_segment(a: Point, b: Point, c: Point) -> PathSegment {
    PathSegment::CubicTo(
        ((2.0 * a.0 + b.0) / 3.0, (2.0 * a.1 + b.1) / 3.0),
        ((a.0 + 2.0 * b.0) / 3.0, (a.1 + 2.0 * b.1) / 3.0),
        ((a.0 + 4.0 * b.0 + c.0) / 6.0, (a.1 + 4.0 * b.1 + c.1) / 6.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints(segments: &[PathSegment]) -> (Point, Point) {
        (segments[0].end(), segments[segments.len() - 1].end())
    }

    #[test]
    fn two_points_match_in_both_modes() {
        let pts = [(3.0, 4.0), (40.0, 90.0)];
        let linear = resolve_points(&pts, CurveMode::Linear);
        let spline = resolve_points(&pts, CurveMode::Basis);
        assert_eq!(endpoints(&linear), endpoints(&spline));
        assert_eq!(linear, spline);
    }

    #[test]
    fn basis_control_points_for_three_points() {
        let pts = [(0.0, 0.0), (6.0, 6.0), (12.0, 0.0)];
        let segments = resolve_points(&pts, CurveMode::Basis);
        assert_eq!(
            segments,
            vec![
                PathSegment::MoveTo((0.0, 0.0)),
                PathSegment::LineTo((1.0, 1.0)),
                PathSegment::CubicTo((2.0, 2.0), (4.0, 4.0), (6.0, 4.0)),
                PathSegment::CubicTo((8.0, 4.0), (10.0, 2.0), (11.0, 1.0)),
                PathSegment::LineTo((12.0, 0.0)),
            ]
        );
    }

    #[test]
    fn basis_is_deterministic() {
        let pts = [(0.0, 0.0), (10.0, 30.0), (50.0, 35.0), (60.0, 80.0), (90.0, 95.0)];
        assert_eq!(
            resolve_points(&pts, CurveMode::Basis),
            resolve_points(&pts, CurveMode::Basis)
        );
    }

    #[test]
    fn bezier_sequences_pass_through() {
        let pts = [(0.0, 0.0), (1.0, 2.0), (3.0, 4.0), (5.0, 6.0)];
        assert!(is_bezier_sequence(&pts));
        let segments = resolve_points(&pts, CurveMode::Basis);
        assert_eq!(
            segments,
            vec![
                PathSegment::MoveTo((0.0, 0.0)),
                PathSegment::CubicTo((1.0, 2.0), (3.0, 4.0), (5.0, 6.0)),
            ]
        );
        // linear mode never reinterprets waypoints
        assert_eq!(resolve_points(&pts, CurveMode::Linear).len(), 4);
    }

    #[test]
    fn fewer_than_two_points_draw_nothing() {
        assert!(resolve_points(&[(1.0, 1.0)], CurveMode::Basis).is_empty());
    }
}
