//! Bridge from scene shapes and SVG path strings to kurbo paths.

use kurbo::{BezPath, Ellipse, Rect, RoundedRect, Shape};
use thiserror::Error;

use crate::model::Point;

/// Flattening tolerance for rects and ellipses, in model units.
pub const TOLERANCE: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PathDataError {
    #[error("path data must start with a move command")]
    NoInitialMove,
    #[error("invalid path data: {0}")]
    Syntax(String),
}

/// Parses SVG path data. Relative commands, shorthands and arcs all come
/// back as absolute move/line/quad/cubic/close elements.
pub fn parse_path_data(d: &str) -> Result<BezPath, PathDataError> {
    if !d.trim_start().starts_with(['M', 'm']) {
        return Err(PathDataError::NoInitialMove);
    }
    BezPath::from_svg(d).map_err(|err| PathDataError::Syntax(err.to_string()))
}

pub fn to_point(p: Point) -> kurbo::Point {
    kurbo::Point::new(f64::from(p.0), f64::from(p.1))
}

pub fn polyline(points: &[Point], closed: bool) -> BezPath {
    let mut path = BezPath::new();
    let mut points = points.iter().map(|p| to_point(*p));
    if let Some(first) = points.next() {
        path.move_to(first);
        for p in points {
            path.line_to(p);
        }
        if closed {
            path.close_path();
        }
    }
    path
}

/// Rectangle outline; a positive `radius` rounds the corners, clamped to
/// half the shorter side.
pub fn rect_path(x: f32, y: f32, width: f32, height: f32, radius: f32) -> BezPath {
    let rect = Rect::from_origin_size(to_point((x, y)), (f64::from(width), f64::from(height)));
    let radius = f64::from(radius).min(rect.width().min(rect.height()) / 2.0);
    if radius > 0.0 {
        RoundedRect::from_rect(rect, radius).to_path(TOLERANCE)
    } else {
        rect.to_path(TOLERANCE)
    }
}

pub fn ellipse_path(center: Point, rx: f32, ry: f32) -> BezPath {
    Ellipse::new(to_point(center), (f64::from(rx), f64::from(ry)), 0.0).to_path(TOLERANCE)
}

#[cfg(test)]
mod tests {
    use kurbo::PathEl;

    use super::*;

    #[test]
    fn absolute_and_relative_agree() {
        let abs = parse_path_data("M 10 10 L 20 10 L 20 20 Z").unwrap();
        let rel = parse_path_data("m10,10 l10,0 0,10z").unwrap();
        assert_eq!(abs, rel);
    }

    #[test]
    fn edge_output_parses_to_expected_elements() {
        let path = parse_path_data("M 0.00 0.00 C 1.00 2.00 3.00 4.00 5.50 6.25 L 7.00 8.00").unwrap();
        assert_eq!(path.elements().len(), 3);
        assert!(matches!(path.elements()[1], PathEl::CurveTo(..)));
        let bounds = path.bounding_box();
        assert_eq!((bounds.x1, bounds.y1), (7.0, 8.0));
    }

    #[test]
    fn malformed_input_is_reported() {
        assert_eq!(parse_path_data("L 1 2"), Err(PathDataError::NoInitialMove));
        assert_eq!(parse_path_data(""), Err(PathDataError::NoInitialMove));
        assert!(matches!(parse_path_data("M 1 2 L oops"), Err(PathDataError::Syntax(_))));
        assert!(matches!(parse_path_data("Mé 1 2"), Err(PathDataError::Syntax(_))));
        assert!(matches!(parse_path_data("M 1"), Err(PathDataError::Syntax(_))));
    }

    #[test]
    fn rounded_rect_radius_is_clamped() {
        let sharp = rect_path(0.0, 0.0, 10.0, 4.0, 0.0);
        let round = rect_path(0.0, 0.0, 10.0, 4.0, 50.0);
        assert!(sharp.elements().iter().all(|el| !matches!(el, PathEl::CurveTo(..))));
        assert!(round.elements().iter().any(|el| matches!(el, PathEl::CurveTo(..))));
        let bounds = round.bounding_box();
        assert!((bounds.width() - 10.0).abs() < 1e-6 && (bounds.height() - 4.0).abs() < 1e-6);
    }

    #[test]
    fn ellipse_and_polygon_outlines() {
        let ellipse = ellipse_path((10.0, 10.0), 5.0, 3.0).bounding_box();
        assert!((ellipse.x0 - 5.0).abs() < 1e-3 && (ellipse.y1 - 13.0).abs() < 1e-3);

        let triangle = polyline(&[(0.0, 0.0), (4.0, 0.0), (2.0, 3.0)], true);
        assert_eq!(triangle.elements().last(), Some(&PathEl::ClosePath));
        assert!(polyline(&[], false).elements().is_empty());
    }
}
