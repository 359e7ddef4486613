//! Rational Bezier curves of degree one to three.
//!
//! Evaluation uses the closed-form Bernstein basis of the curve's degree rather
//! than de Casteljau recursion. A curve stores four control points and four
//! weights; only the first `deg + 1` entries are meaningful.

use serde::{Deserialize, Serialize};

use super::core::{BBox, Point3, Quaternion, Tolerance, Vec3};
use super::tessellation::CurveTessellationOptions;

/// Bernstein basis polynomial `B(k, deg)` evaluated at `t`.
///
/// # Panics
/// Panics when `deg` is not 1, 2 or 3, or when `k > deg`.
#[must_use]
pub fn bernstein(k: usize, deg: usize, t: f64) -> f64 {
    let s = 1.0 - t;
    match (deg, k) {
        (1, 0) => s,
        (1, 1) => t,

        (2, 0) => s * s,
        (2, 1) => 2.0 * t * s,
        (2, 2) => t * t,

        (3, 0) => s * s * s,
        (3, 1) => 3.0 * t * s * s,
        (3, 2) => 3.0 * t * t * s,
        (3, 3) => t * t * t,

        _ => panic!("bernstein basis requested for k={k}, deg={deg}; degree must be 1..=3"),
    }
}

/// Derivative with respect to `t` of [`bernstein`].
///
/// # Panics
/// Panics when `deg` is not 1, 2 or 3, or when `k > deg`.
#[must_use]
pub fn bernstein_derivative(k: usize, deg: usize, t: f64) -> f64 {
    let s = 1.0 - t;
    match (deg, k) {
        (1, 0) => -1.0,
        (1, 1) => 1.0,

        (2, 0) => -2.0 * s,
        (2, 1) => 2.0 - 4.0 * t,
        (2, 2) => 2.0 * t,

        (3, 0) => -3.0 * s * s,
        (3, 1) => 3.0 * s * (1.0 - 3.0 * t),
        (3, 2) => 3.0 * t * (2.0 - 3.0 * t),
        (3, 3) => 3.0 * t * t,

        _ => panic!("bernstein derivative requested for k={k}, deg={deg}; degree must be 1..=3"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BezierCurve
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BezierCurve {
    /// Caller-defined tag, carried through reversal and transformation.
    pub tag: i32,
    pub deg: usize,
    pub ctrl: [Point3; 4],
    pub weight: [f64; 4],
}

impl BezierCurve {
    /// Build a curve from explicit control points and weights.
    ///
    /// # Panics
    /// Panics on a degree outside 1..=3 or a non-positive weight; both are
    /// contract violations rather than geometric conditions.
    #[must_use]
    pub fn rational(deg: usize, ctrl: [Point3; 4], weight: [f64; 4]) -> Self {
        assert!(
            (1..=3).contains(&deg),
            "bezier curve degree must be 1, 2 or 3 (got {deg})"
        );
        assert!(
            weight[..=deg].iter().all(|w| w.is_finite() && *w > 0.0),
            "bezier curve weights must be positive and finite"
        );
        Self {
            tag: 0,
            deg,
            ctrl,
            weight,
        }
    }

    #[must_use]
    pub fn line(p0: Point3, p1: Point3) -> Self {
        Self::rational(1, [p0, p1, p1, p1], [1.0; 4])
    }

    #[must_use]
    pub fn quadratic(p0: Point3, p1: Point3, p2: Point3) -> Self {
        Self::rational(2, [p0, p1, p2, p2], [1.0; 4])
    }

    #[must_use]
    pub fn cubic(p0: Point3, p1: Point3, p2: Point3, p3: Point3) -> Self {
        Self::rational(3, [p0, p1, p2, p3], [1.0; 4])
    }

    #[must_use]
    pub fn with_tag(mut self, tag: i32) -> Self {
        self.tag = tag;
        self
    }

    #[must_use]
    pub fn control_points(&self) -> &[Point3] {
        &self.ctrl[..=self.deg]
    }

    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weight[..=self.deg]
    }

    #[must_use]
    pub fn point_at(&self, t: f64) -> Point3 {
        let (num, den) = self.weighted_sum(t);
        Point3::from(num.div_scalar(den))
    }

    /// Exact first derivative of the rational form.
    ///
    /// Degenerate curves (coincident control points) return a zero vector.
    #[must_use]
    pub fn tangent_at(&self, t: f64) -> Vec3 {
        let (num, den) = self.weighted_sum(t);
        let mut dnum = Vec3::ZERO;
        let mut dden = 0.0;
        for k in 0..=self.deg {
            let b = bernstein_derivative(k, self.deg, t) * self.weight[k];
            dnum = dnum + self.ctrl[k].to_vec3().mul_scalar(b);
            dden += b;
        }
        (dnum.mul_scalar(den) - num.mul_scalar(dden)).div_scalar(den * den)
    }

    fn weighted_sum(&self, t: f64) -> (Vec3, f64) {
        let mut num = Vec3::ZERO;
        let mut den = 0.0;
        for k in 0..=self.deg {
            let b = bernstein(k, self.deg, t) * self.weight[k];
            num = num + self.ctrl[k].to_vec3().mul_scalar(b);
            den += b;
        }
        (num, den)
    }

    #[must_use]
    pub fn start(&self) -> Point3 {
        self.ctrl[0]
    }

    #[must_use]
    pub fn finish(&self) -> Point3 {
        self.ctrl[self.deg]
    }

    /// Swap control points and weights end to end. Applying it twice restores
    /// the original curve.
    pub fn reverse(&mut self) {
        self.ctrl[..=self.deg].reverse();
        self.weight[..=self.deg].reverse();
    }

    #[must_use]
    pub fn reversed(&self) -> Self {
        let mut out = *self;
        out.reverse();
        out
    }

    #[must_use]
    pub fn transformed_by(&self, t: Vec3, q: Quaternion) -> Self {
        let mut out = *self;
        for p in &mut out.ctrl[..=self.deg] {
            *p = q.transform_point(*p, t);
        }
        out
    }

    #[must_use]
    pub fn translated_by(&self, t: Vec3) -> Self {
        self.transformed_by(t, Quaternion::IDENTITY)
    }

    #[must_use]
    pub fn bbox(&self) -> BBox {
        // Control polygon hull bounds the curve for positive weights.
        BBox::from_points(self.control_points())
            .unwrap_or_else(|| BBox::new(self.start(), self.start()))
    }

    /// True when the control polygon is a straight segment.
    #[must_use]
    pub fn is_straight(&self, tol: Tolerance) -> bool {
        let (a, b) = (self.start(), self.finish());
        self.control_points()
            .iter()
            .all(|p| p.distance_to_segment(a, b) <= tol.eps)
    }

    /// Flatten into `out` using [`CurveTessellationOptions::default`].
    pub fn make_pwl_into(&self, out: &mut Vec<Point3>) {
        self.make_pwl_into_with(out, Vec3::ZERO, CurveTessellationOptions::default());
    }

    /// Flatten into `out`, translating every emitted point by `offset`.
    pub fn make_pwl_into_offset(&self, out: &mut Vec<Point3>, offset: Vec3) {
        self.make_pwl_into_with(out, offset, CurveTessellationOptions::default());
    }

    /// Adaptive flattening: the interval is split until the chord deviates from
    /// the curve by at most `options.max_deviation`.
    ///
    /// The curve's start point is only pushed when `out` is empty so chains of
    /// curves produce one shared vertex per joint.
    pub fn make_pwl_into_with(
        &self,
        out: &mut Vec<Point3>,
        offset: Vec3,
        options: CurveTessellationOptions,
    ) {
        if out.is_empty() {
            out.push(self.start().add_vec(offset));
        }
        if self.deg == 1 {
            out.push(self.finish().add_vec(offset));
            return;
        }
        self.make_pwl_worker(out, 0.0, 1.0, offset, options, 0);
    }

    fn make_pwl_worker(
        &self,
        out: &mut Vec<Point3>,
        ta: f64,
        tb: f64,
        offset: Vec3,
        options: CurveTessellationOptions,
        depth: usize,
    ) {
        let pa = self.point_at(ta);
        let pb = self.point_at(tb);

        // Quarter points catch S-shaped spans whose midpoint sits on the chord.
        let deviation = [0.25, 0.5, 0.75]
            .into_iter()
            .map(|f| self.point_at(ta + (tb - ta) * f).distance_to_segment(pa, pb))
            .fold(0.0_f64, f64::max);

        let must_split = depth < options.min_depth;
        if !must_split && (deviation <= options.max_deviation || depth >= options.max_depth) {
            out.push(pb.add_vec(offset));
            return;
        }

        let tm = 0.5 * (ta + tb);
        self.make_pwl_worker(out, ta, tm, offset, options, depth + 1);
        self.make_pwl_worker(out, tm, tb, offset, options, depth + 1);
    }

    /// Same end points in either direction.
    #[must_use]
    pub fn is_coincident_with(&self, other: &Self, tol: Tolerance) -> bool {
        let same = tol.approx_eq_point3(self.start(), other.start())
            && tol.approx_eq_point3(self.finish(), other.finish());
        let flipped = tol.approx_eq_point3(self.start(), other.finish())
            && tol.approx_eq_point3(self.finish(), other.start());
        same || flipped
    }

    /// Length of the default flattening.
    #[must_use]
    pub fn length_estimate(&self) -> f64 {
        let mut pts = Vec::new();
        self.make_pwl_into(&mut pts);
        pts.windows(2).map(|w| w[0].distance_to(w[1])).sum()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BezierList
// ─────────────────────────────────────────────────────────────────────────────

/// Unordered collection of curves, the input to loop assembly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BezierList {
    pub l: Vec<BezierCurve>,
}

impl BezierList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, curve: BezierCurve) {
        self.l.push(curve);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.l.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.l.is_empty()
    }

    pub fn clear(&mut self) {
        self.l.clear();
    }

    /// Closed polyline of straight segments through `points`.
    #[must_use]
    pub fn from_polygon(points: &[Point3]) -> Self {
        let n = points.len();
        let l = (0..n)
            .map(|i| BezierCurve::line(points[i], points[(i + 1) % n]))
            .collect();
        Self { l }
    }
}

impl FromIterator<BezierCurve> for BezierList {
    fn from_iter<I: IntoIterator<Item = BezierCurve>>(iter: I) -> Self {
        Self {
            l: iter.into_iter().collect(),
        }
    }
}

impl Extend<BezierCurve> for BezierList {
    fn extend<I: IntoIterator<Item = BezierCurve>>(&mut self, iter: I) {
        self.l.extend(iter);
    }
}
