//! Cubic Bézier curve fitting with Schneider's algorithm.
//!
//! Reference: Philip J. Schneider, "An Algorithm for Automatically Fitting
//! Digitized Curves", Graphics Gems (FitCurves.c).

use crate::geom::Point;

const SINGULAR_EPS: f64 = 1e-10;

/// One cubic Bézier arc. Within a fitted stroke, consecutive segments share
/// an endpoint: `segment[i].p3 == segment[i + 1].p0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BezierSegment {
    pub p0: Point,
    pub p1: Point,
    pub p2: Point,
    pub p3: Point,
}

impl BezierSegment {
    /// Q(t) via the cubic Bernstein basis.
    pub fn eval(&self, t: f64) -> Point {
        self.p0
            .scale(b0(t))
            .add(self.p1.scale(b1(t)))
            .add(self.p2.scale(b2(t)))
            .add(self.p3.scale(b3(t)))
    }

    /// Q'(t).
    pub fn deriv1(&self, t: f64) -> Point {
        self.p0
            .scale(b0_prime(t))
            .add(self.p1.scale(b1_prime(t)))
            .add(self.p2.scale(b2_prime(t)))
            .add(self.p3.scale(b3_prime(t)))
    }

    /// Q''(t).
    pub fn deriv2(&self, t: f64) -> Point {
        self.p0
            .scale(b0_double_prime(t))
            .add(self.p1.scale(b1_double_prime(t)))
            .add(self.p2.scale(b2_double_prime(t)))
            .add(self.p3.scale(b3_double_prime(t)))
    }
}

// Cubic Bernstein basis functions and their derivatives.

fn b0(t: f64) -> f64 {
    (1.0 - t).powi(3)
}

fn b1(t: f64) -> f64 {
    3.0 * (1.0 - t).powi(2) * t
}

fn b2(t: f64) -> f64 {
    3.0 * (1.0 - t) * t * t
}

fn b3(t: f64) -> f64 {
    t.powi(3)
}

fn b0_prime(t: f64) -> f64 {
    -3.0 * (1.0 - t).powi(2)
}

fn b1_prime(t: f64) -> f64 {
    3.0 * (1.0 - t).powi(2) - 6.0 * (1.0 - t) * t
}

fn b2_prime(t: f64) -> f64 {
    6.0 * (1.0 - t) * t - 3.0 * t * t
}

fn b3_prime(t: f64) -> f64 {
    3.0 * t * t
}

fn b0_double_prime(t: f64) -> f64 {
    6.0 * (1.0 - t)
}

fn b1_double_prime(t: f64) -> f64 {
    -12.0 * (1.0 - t) + 6.0 * t
}

fn b2_double_prime(t: f64) -> f64 {
    6.0 * (1.0 - t) - 12.0 * t
}

fn b3_double_prime(t: f64) -> f64 {
    6.0 * t
}

/// Fits an ordered point run to a minimal list of cubic Bézier segments whose
/// maximum deviation from the input stays under `max_error` pixels.
///
/// Numerical degeneracies (singular least-squares system, collapsed Newton
/// denominator, zero-length tangents) always fall back to a geometrically
/// valid heuristic; `fit` never fails.
#[derive(Debug, Clone, Copy)]
pub struct CurveFitter {
    pub max_error: f64,
    pub max_iterations: usize,
}

impl Default for CurveFitter {
    fn default() -> Self {
        Self {
            max_error: 4.0,
            max_iterations: 4,
        }
    }
}

impl CurveFitter {
    pub fn new(max_error: f64, max_iterations: usize) -> Self {
        Self {
            max_error,
            max_iterations,
        }
    }

    pub fn fit(&self, points: &[Point]) -> Vec<BezierSegment> {
        if points.len() < 2 {
            return Vec::new();
        }

        if points.len() == 2 {
            // Straight line: control points interpolated at t = 1/3 and 2/3.
            let (p0, p3) = (points[0], points[1]);
            return vec![BezierSegment {
                p0,
                p1: p0.lerp(p3, 1.0 / 3.0),
                p2: p0.lerp(p3, 2.0 / 3.0),
                p3,
            }];
        }

        let left_tangent = points[1].sub(points[0]).normalized();
        let right_tangent = points[points.len() - 2].sub(points[points.len() - 1]).normalized();

        let mut segments = Vec::new();
        self.fit_cubic(points, 0, points.len() - 1, left_tangent, right_tangent, &mut segments);
        segments
    }

    /// Recursive core over the inclusive index range `[first, last]` of the
    /// shared point buffer.
    fn fit_cubic(
        &self,
        points: &[Point],
        first: usize,
        last: usize,
        left_tangent: Point,
        right_tangent: Point,
        out: &mut Vec<BezierSegment>,
    ) {
        let n = last - first + 1;

        if n == 2 {
            let dist = points[last].distance(points[first]) / 3.0;
            out.push(BezierSegment {
                p0: points[first],
                p1: points[first].add(left_tangent.scale(dist)),
                p2: points[last].add(right_tangent.scale(dist)),
                p3: points[last],
            });
            return;
        }

        let mut u = chord_length_parameterize(points, first, last);
        let mut bezier = self.generate_bezier(points, first, last, &u, left_tangent, right_tangent);

        for _ in 0..self.max_iterations {
            let (error, _) = max_fit_error(points, first, last, &bezier, &u);
            if error < self.max_error {
                break;
            }
            u = reparameterize(points, first, &bezier, &u);
            bezier = self.generate_bezier(points, first, last, &u, left_tangent, right_tangent);
        }

        let (error, split) = max_fit_error(points, first, last, &bezier, &u);
        if error < self.max_error {
            out.push(bezier);
            return;
        }

        // Split at the worst point, clamped strictly inside the run so both
        // halves shrink, and recurse with a shared tangent across the split.
        let split = split.clamp(first + 1, last - 1);
        let center_tangent = points[split - 1].sub(points[split + 1]).normalized();

        self.fit_cubic(points, first, split, left_tangent, center_tangent, out);
        self.fit_cubic(points, split, last, center_tangent.neg(), right_tangent, out);
    }

    /// Least-squares solve for the two free control points, holding the end
    /// tangent directions fixed.
    fn generate_bezier(
        &self,
        points: &[Point],
        first: usize,
        last: usize,
        u: &[f64],
        left_tangent: Point,
        right_tangent: Point,
    ) -> BezierSegment {
        let p0 = points[first];
        let p3 = points[last];

        let mut c00 = 0.0;
        let mut c01 = 0.0;
        let mut c11 = 0.0;
        let mut x0 = 0.0;
        let mut x1 = 0.0;

        for (i, &ui) in u.iter().enumerate() {
            let a0 = left_tangent.scale(b1(ui));
            let a1 = right_tangent.scale(b2(ui));

            c00 += a0.dot(a0);
            c01 += a0.dot(a1);
            c11 += a1.dot(a1);

            let tmp = points[first + i]
                .sub(p0.scale(b0(ui)))
                .sub(p3.scale(b3(ui)));
            x0 += a0.dot(tmp);
            x1 += a1.dot(tmp);
        }

        let det = c00 * c11 - c01 * c01;

        let fallback = |p0: Point, p3: Point| {
            let dist = p3.distance(p0) / 3.0;
            (
                p0.add(left_tangent.scale(dist)),
                p3.add(right_tangent.scale(dist)),
            )
        };

        let (p1, p2) = if det.abs() < SINGULAR_EPS {
            fallback(p0, p3)
        } else {
            let alpha_l = (x0 * c11 - x1 * c01) / det;
            let alpha_r = (c00 * x1 - c01 * x0) / det;

            if alpha_l < 0.0 || alpha_r < 0.0 {
                // Wrong-direction control point; fall back to the heuristic.
                fallback(p0, p3)
            } else {
                (
                    p0.add(left_tangent.scale(alpha_l)),
                    p3.add(right_tangent.scale(alpha_r)),
                )
            }
        };

        BezierSegment { p0, p1, p2, p3 }
    }
}

/// Cumulative chord length along `[first, last]`, normalized to `[0, 1]`.
fn chord_length_parameterize(points: &[Point], first: usize, last: usize) -> Vec<f64> {
    let mut u = Vec::with_capacity(last - first + 1);
    u.push(0.0);
    for i in (first + 1)..=last {
        let prev = *u.last().unwrap_or(&0.0);
        u.push(prev + points[i].distance(points[i - 1]));
    }

    let total = *u.last().unwrap_or(&0.0);
    if total > 0.0 {
        for ui in &mut u {
            *ui /= total;
        }
    }
    u
}

/// One Newton-Raphson step per parameter value:
/// `u' = u - (Q(u)-P)·Q'(u) / (Q'(u)·Q'(u) + (Q(u)-P)·Q''(u))`.
fn reparameterize(points: &[Point], first: usize, bezier: &BezierSegment, u: &[f64]) -> Vec<f64> {
    u.iter()
        .enumerate()
        .map(|(i, &ui)| {
            let diff = bezier.eval(ui).sub(points[first + i]);
            let d1 = bezier.deriv1(ui);
            let d2 = bezier.deriv2(ui);

            let numerator = diff.dot(d1);
            let denominator = d1.dot(d1) + diff.dot(d2);

            let next = if denominator.abs() > SINGULAR_EPS {
                ui - numerator / denominator
            } else {
                ui
            };
            next.clamp(0.0, 1.0)
        })
        .collect()
}

/// Maximum Euclidean deviation between the curve (at the current
/// parameterization) and the input run, plus the index where it occurs.
fn max_fit_error(
    points: &[Point],
    first: usize,
    last: usize,
    bezier: &BezierSegment,
    u: &[f64],
) -> (f64, usize) {
    let mut max_dist = 0.0;
    let mut split = first + (last - first) / 2;

    for (i, &ui) in u.iter().enumerate() {
        let dist = bezier.eval(ui).distance(points[first + i]);
        if dist > max_dist {
            max_dist = dist;
            split = first + i;
        }
    }

    (max_dist, split)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bernstein_basis_partitions_unity() {
        for t in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let sum = b0(t) + b1(t) + b2(t) + b3(t);
            assert!((sum - 1.0).abs() < 1e-12, "sum at t={t} was {sum}");
        }
    }

    #[test]
    fn eval_hits_endpoints() {
        let seg = BezierSegment {
            p0: Point::new(0.0, 0.0),
            p1: Point::new(10.0, 20.0),
            p2: Point::new(30.0, 20.0),
            p3: Point::new(40.0, 0.0),
        };
        assert!(seg.eval(0.0).distance(seg.p0) < 1e-12);
        assert!(seg.eval(1.0).distance(seg.p3) < 1e-12);
    }

    #[test]
    fn chord_parameterization_is_monotonic() {
        let pts = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(3.0, 0.0),
            Point::new(7.0, 0.0),
        ];
        let u = chord_length_parameterize(&pts, 0, 3);
        assert_eq!(u[0], 0.0);
        assert_eq!(*u.last().unwrap(), 1.0);
        for w in u.windows(2) {
            assert!(w[1] > w[0]);
        }
    }
}
