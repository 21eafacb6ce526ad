//! Angle/time based polyline reduction for finished strokes.
//!
//! A point survives when the heading leaving it differs from the heading
//! recorded at the last kept point by more than [`ANGLE_THRESHOLD`], or when
//! more than [`TIME_THRESHOLD`] seconds passed since the last kept point.
//! Endpoints are always kept.

use std::f64::consts::PI;

use crate::TimedPoint;

pub const ANGLE_THRESHOLD: f64 = PI / 18.0;
pub const TIME_THRESHOLD: f64 = 0.030;

pub fn simplify(points: &[TimedPoint]) -> Vec<TimedPoint> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let first = points[0];
    let last = points[points.len() - 1];
    let mut simplified = vec![first];
    let mut last_angle = bearing(first, points[1]);
    let mut last_kept_timestamp = first.timestamp;

    for window in points.windows(2).skip(1) {
        let (point, next) = (window[0], window[1]);
        let current_angle = bearing(point, next);
        // No wraparound: a swing across +/-PI counts as a large turn.
        let turned = (current_angle - last_angle).abs() > ANGLE_THRESHOLD;
        let stale = point.timestamp - last_kept_timestamp > TIME_THRESHOLD;
        if turned || stale {
            simplified.push(point);
            last_angle = current_angle;
            last_kept_timestamp = point.timestamp;
        }
    }

    simplified.push(last);
    simplified
}

fn bearing(from: TimedPoint, to: TimedPoint) -> f64 {
    (to.y - from.y).atan2(to.x - from.x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f64, y: f64, timestamp: f64) -> TimedPoint {
        TimedPoint::new(x, y, timestamp)
    }

    #[test]
    fn short_inputs_are_returned_unchanged() {
        assert!(simplify(&[]).is_empty());
        let one = [at(1.0, 2.0, 0.0)];
        assert_eq!(simplify(&one), one.to_vec());
        let two = [at(1.0, 2.0, 0.0), at(1.0, 2.0, 5.0)];
        assert_eq!(simplify(&two), two.to_vec());
    }

    #[test]
    fn straight_fast_line_collapses_to_endpoints() {
        let points: Vec<_> = (0..10)
            .map(|i| at(i as f64 * 3.0, i as f64 * 2.0, 100.0 + i as f64 * 0.002))
            .collect();
        let simplified = simplify(&points);
        assert_eq!(simplified, vec![points[0], points[9]]);
    }

    #[test]
    fn sharp_turn_is_kept_without_elapsed_time() {
        let turn = 11.0_f64.to_radians();
        let points = [
            at(0.0, 0.0, 0.0),
            at(5.0, 0.0, 0.0),
            at(10.0, 0.0, 0.0),
            at(10.0 + 10.0 * turn.cos(), 10.0 * turn.sin(), 0.0),
        ];
        let simplified = simplify(&points);
        assert_eq!(simplified, vec![points[0], points[2], points[3]]);
    }

    #[test]
    fn slow_samples_are_kept_on_a_straight_line() {
        let points: Vec<_> = (0..4).map(|i| at(i as f64, 0.0, i as f64 * 0.031)).collect();
        assert_eq!(simplify(&points), points);
    }

    #[test]
    fn endpoints_always_survive() {
        let points = [
            at(0.0, 0.0, 0.0),
            at(1.0, 1.0, 0.001),
            at(2.0, 0.0, 0.002),
            at(3.0, 1.0, 0.003),
            at(4.0, 0.0, 0.004),
        ];
        let simplified = simplify(&points);
        assert_eq!(simplified.first(), points.first());
        assert_eq!(simplified.last(), points.last());
    }

    #[test]
    fn angle_difference_does_not_wrap() {
        // Headings of roughly +179 and -179 degrees are 2 degrees apart
        // geometrically but far apart numerically.
        let points = [
            at(0.0, 0.0, 0.0),
            at(-10.0, 0.17, 0.0),
            at(-20.0, 0.0, 0.0),
            at(-30.0, -0.17, 0.0),
        ];
        let simplified = simplify(&points);
        assert_eq!(simplified, vec![points[0], points[1], points[3]]);
    }
}
