use crate::model::Point;

/// Isoceles arrowhead with its tip at `tip`, pointing along `from -> tip`.
///
/// Returns `[tip, left, right]`, or `None` when the tangent has no length.
pub(super) fn arrowhead(from: Point, tip: Point, length: f32, half_width: f32) -> Option<[Point; 3]> {
    let dx = tip.0 - from.0;
    let dy = tip.1 - from.1;
    let len = (dx * dx + dy * dy).sqrt();
    if !len.is_finite() || len < 1e-6 {
        return None;
    }
    let (ux, uy) = (dx / len, dy / len);
    let base = (tip.0 - ux * length, tip.1 - uy * length);
    let (px, py) = (-uy * half_width, ux * half_width);
    Some([tip, (base.0 + px, base.1 + py), (base.0 - px, base.1 - py)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_is_perpendicular_to_tangent() {
        let [tip, left, right] = arrowhead((0.0, 0.0), (0.0, 100.0), 10.0, 5.0).unwrap();
        assert_eq!(tip, (0.0, 100.0));
        assert_eq!(left, (-5.0, 90.0));
        assert_eq!(right, (5.0, 90.0));
    }

    #[test]
    fn zero_length_tangent_has_no_arrow() {
        assert!(arrowhead((4.0, 4.0), (4.0, 4.0), 10.0, 5.0).is_none());
    }
}
