//! Trimmed rational Bezier surface patches.
//!
//! A patch has degree `degm` in u and `degn` in v (each 1..=3) and stores a 4x4 grid
//! of control points; `ctrl[i][j]` is the point at u-index `i`, v-index `j`. The
//! visible part of the patch is bounded by its trims.

use serde::{Deserialize, Serialize};

use super::bezier::{BezierCurve, bernstein, bernstein_derivative};
use super::core::{BBox, Point3, Quaternion, Tolerance, Vec3};
use super::curve::TrimBy;
use super::handle::{HasHandle, SurfaceHandle};
use super::mesh::Rgba;
use super::trim::UvPoint;

/// Newton steps allowed by [`BezierSurface::closest_point_to`] before it falls back
/// to a grid search.
pub const NEWTON_ITERATIONS: usize = 20;

const SEED_GRID: usize = 8;
const REFINE_ROUNDS: usize = 8;
const REFINE_SAMPLES: usize = 5;

/// Result of projecting a point onto a surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClosestPoint {
    pub uv: UvPoint,
    /// Distance from the query point to `point_at(uv)`.
    pub distance: f64,
    /// False when the Newton iteration had to be abandoned for the grid search.
    pub converged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BezierSurface {
    pub h: SurfaceHandle,
    pub color: Rgba,
    /// Caller-visible face id, carried onto every triangle of this surface.
    pub face: u32,
    pub degm: usize,
    pub degn: usize,
    pub ctrl: [[Point3; 4]; 4],
    pub weight: [[f64; 4]; 4],
    pub trims: Vec<TrimBy>,
}

impl HasHandle for BezierSurface {
    type H = SurfaceHandle;

    fn handle(&self) -> SurfaceHandle {
        self.h
    }

    fn set_handle(&mut self, h: SurfaceHandle) {
        self.h = h;
    }
}

impl BezierSurface {
    /// Untrimmed patch from explicit control points and weights.
    ///
    /// # Panics
    /// Panics when either degree is outside 1..=3 or a used weight is not positive.
    #[must_use]
    pub fn new(degm: usize, degn: usize, ctrl: [[Point3; 4]; 4], weight: [[f64; 4]; 4]) -> Self {
        assert!(
            (1..=3).contains(&degm) && (1..=3).contains(&degn),
            "bezier surface degrees must be 1..=3 (got {degm}x{degn})"
        );
        assert!(
            (0..=degm).all(|i| (0..=degn).all(|j| weight[i][j].is_finite() && weight[i][j] > 0.0)),
            "bezier surface weights must be positive and finite"
        );
        Self {
            h: SurfaceHandle::default(),
            color: Rgba::default(),
            face: 0,
            degm,
            degn,
            ctrl,
            weight,
            trims: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_color(mut self, color: Rgba) -> Self {
        self.color = color;
        self
    }

    #[must_use]
    pub fn with_face(mut self, face: u32) -> Self {
        self.face = face;
        self
    }

    // ── evaluation ──────────────────────────────────────────────────────────

    /// Weighted numerator and denominator, optionally differentiated in u and/or v.
    fn weighted_sum(&self, u: f64, v: f64, du: bool, dv: bool) -> (Vec3, f64) {
        let mut num = Vec3::ZERO;
        let mut den = 0.0;
        for i in 0..=self.degm {
            let bu = if du {
                bernstein_derivative(i, self.degm, u)
            } else {
                bernstein(i, self.degm, u)
            };
            for j in 0..=self.degn {
                let bv = if dv {
                    bernstein_derivative(j, self.degn, v)
                } else {
                    bernstein(j, self.degn, v)
                };
                let b = bu * bv * self.weight[i][j];
                num = num + self.ctrl[i][j].to_vec3() * b;
                den += b;
            }
        }
        (num, den)
    }

    #[must_use]
    pub fn point_at(&self, u: f64, v: f64) -> Point3 {
        let (num, den) = self.weighted_sum(u, v, false, false);
        Point3::from(num / den)
    }

    #[must_use]
    pub fn point_at_uv(&self, uv: UvPoint) -> Point3 {
        self.point_at(uv.u, uv.v)
    }

    /// Exact partial derivatives `(dS/du, dS/dv)` of the rational patch.
    #[must_use]
    pub fn tangents_at(&self, u: f64, v: f64) -> (Vec3, Vec3) {
        let (num, den) = self.weighted_sum(u, v, false, false);
        let (num_u, den_u) = self.weighted_sum(u, v, true, false);
        let (num_v, den_v) = self.weighted_sum(u, v, false, true);
        let d2 = den * den;
        let tu = (num_u * den - num * den_u) / d2;
        let tv = (num_v * den - num * den_v) / d2;
        (tu, tv)
    }

    /// `tu x tv`, unnormalized. Zero at degenerate points.
    #[must_use]
    pub fn normal_at(&self, u: f64, v: f64) -> Vec3 {
        let (tu, tv) = self.tangents_at(u, v);
        tu.cross(tv)
    }

    /// Unit normal, falling back to nearby samples and the control net when the
    /// patch is degenerate at `(u, v)`.
    #[must_use]
    pub fn unit_normal_at(&self, u: f64, v: f64) -> Option<Vec3> {
        if let Some(n) = self.normal_at(u, v).normalized() {
            return Some(n);
        }
        let (cu, cv) = (u + (0.5 - u) * 1e-3, v + (0.5 - v) * 1e-3);
        self.normal_at(cu, cv).normalized().or_else(|| self.control_normal())
    }

    fn control_normal(&self) -> Option<Vec3> {
        let p00 = self.ctrl[0][0];
        let pm0 = self.ctrl[self.degm][0];
        let p0n = self.ctrl[0][self.degn];
        let pmn = self.ctrl[self.degm][self.degn];
        (pmn - p00).cross(p0n - pm0).normalized()
    }

    #[must_use]
    pub fn bbox(&self) -> BBox {
        let pts: Vec<Point3> = (0..=self.degm)
            .flat_map(|i| (0..=self.degn).map(move |j| (i, j)))
            .map(|(i, j)| self.ctrl[i][j])
            .collect();
        BBox::from_points(&pts).unwrap_or_else(|| BBox::new(self.ctrl[0][0], self.ctrl[0][0]))
    }

    /// All control points within `tol` of one plane.
    #[must_use]
    pub fn is_planar(&self, tol: Tolerance) -> bool {
        let Some(n) = self.control_normal() else {
            return false;
        };
        let p0 = self.ctrl[0][0];
        (0..=self.degm).all(|i| (0..=self.degn).all(|j| (self.ctrl[i][j] - p0).dot(n).abs() <= tol.eps))
    }

    /// Degree 1x1 with equal weights and P11 = P10 + P01 - P00: an affine map of
    /// the plane, for which projection has a closed form.
    fn is_affine_parallelogram(&self) -> bool {
        if self.degm != 1 || self.degn != 1 {
            return false;
        }
        let w = self.weight[0][0];
        let same_weights = [self.weight[0][1], self.weight[1][0], self.weight[1][1]]
            .iter()
            .all(|x| (x - w).abs() <= 1e-12 * w);
        let p = &self.ctrl;
        let expected = p[1][0] + (p[0][1] - p[0][0]);
        same_weights && Tolerance::LENGTH.approx_eq_point3(p[1][1], expected)
    }

    // ── projection ──────────────────────────────────────────────────────────

    /// Parameters of the surface point closest to `p`.
    ///
    /// Affine planar patches are solved exactly and without clamping, so points
    /// beyond the unit square map to parameters outside [0, 1]. Other patches are
    /// seeded from a coarse grid and refined by Gauss-Newton within [0, 1]^2; if the
    /// iteration stalls, a shrinking grid search takes over and `converged` is false.
    #[must_use]
    pub fn closest_point_to(&self, p: Point3) -> ClosestPoint {
        if self.is_affine_parallelogram() {
            if let Some(uv) = self.affine_projection(p) {
                return ClosestPoint {
                    uv,
                    distance: p.distance_to(self.point_at_uv(uv)),
                    converged: true,
                };
            }
        }

        let seed = self.grid_seed(p);
        let seed_dist = p.distance_to(self.point_at_uv(seed));

        if let Some((uv, dist)) = self.newton(p, seed) {
            if dist <= seed_dist + Tolerance::ZERO_LENGTH.eps {
                return ClosestPoint {
                    uv,
                    distance: dist,
                    converged: true,
                };
            }
        }

        let (uv, distance) = self.refine_search(p, seed, seed_dist);
        #[cfg(feature = "debug_logs")]
        log::debug!(
            "closest_point_to fell back to grid search on {}: distance {distance:.3e}",
            self.h
        );
        ClosestPoint {
            uv,
            distance,
            converged: false,
        }
    }

    fn affine_projection(&self, p: Point3) -> Option<UvPoint> {
        let o = self.ctrl[0][0];
        let a = self.ctrl[1][0] - o;
        let b = self.ctrl[0][1] - o;
        let d = p - o;
        let (aa, ab, bb) = (a.dot(a), a.dot(b), b.dot(b));
        let det = aa * bb - ab * ab;
        if det.abs() <= Tolerance::ZERO_LENGTH.eps * aa * bb {
            return None;
        }
        let (ad, bd) = (a.dot(d), b.dot(d));
        Some(UvPoint::new((bb * ad - ab * bd) / det, (aa * bd - ab * ad) / det))
    }

    fn grid_seed(&self, p: Point3) -> UvPoint {
        let mut best = UvPoint::new(0.0, 0.0);
        let mut best_d = f64::INFINITY;
        for i in 0..=SEED_GRID {
            for j in 0..=SEED_GRID {
                let uv = UvPoint::new(i as f64 / SEED_GRID as f64, j as f64 / SEED_GRID as f64);
                let d = p.distance_squared_to(self.point_at_uv(uv));
                if d < best_d {
                    best_d = d;
                    best = uv;
                }
            }
        }
        best
    }

    /// Gauss-Newton on |S(u,v) - p|^2, clamped to the unit square.
    fn newton(&self, p: Point3, seed: UvPoint) -> Option<(UvPoint, f64)> {
        let (mut u, mut v) = (seed.u, seed.v);
        for _ in 0..NEWTON_ITERATIONS {
            let r = self.point_at(u, v) - p;
            let (tu, tv) = self.tangents_at(u, v);
            let (a, b, c) = (tu.dot(tu), tu.dot(tv), tv.dot(tv));
            let det = a * c - b * b;
            if !det.is_finite() || det.abs() <= Tolerance::ZERO_LENGTH.eps * a.max(c).max(1.0) {
                return None;
            }
            let (gu, gv) = (tu.dot(r), tv.dot(r));
            let du = -(c * gu - b * gv) / det;
            let dv = -(a * gv - b * gu) / det;

            let nu = (u + du).clamp(0.0, 1.0);
            let nv = (v + dv).clamp(0.0, 1.0);
            let step = (nu - u).abs() + (nv - v).abs();
            u = nu;
            v = nv;
            if step <= Tolerance::PARAM.eps {
                let uv = UvPoint::new(u, v);
                return Some((uv, p.distance_to(self.point_at_uv(uv))));
            }
        }
        None
    }

    fn refine_search(&self, p: Point3, seed: UvPoint, seed_dist: f64) -> (UvPoint, f64) {
        let mut best = seed;
        let mut best_d = seed_dist;
        let mut half = 1.0 / SEED_GRID as f64;
        for _ in 0..REFINE_ROUNDS {
            let (cu, cv) = (best.u, best.v);
            for i in 0..REFINE_SAMPLES {
                for j in 0..REFINE_SAMPLES {
                    let fu = i as f64 / (REFINE_SAMPLES - 1) as f64;
                    let fv = j as f64 / (REFINE_SAMPLES - 1) as f64;
                    let uv = UvPoint::new(
                        (cu - half + 2.0 * half * fu).clamp(0.0, 1.0),
                        (cv - half + 2.0 * half * fv).clamp(0.0, 1.0),
                    );
                    let d = p.distance_to(self.point_at_uv(uv));
                    if d < best_d {
                        best_d = d;
                        best = uv;
                    }
                }
            }
            half *= 0.5;
        }
        (best, best_d)
    }

    // ── constructors ────────────────────────────────────────────────────────

    /// Ruled surface sweeping `curve` from offset `t0` to offset `t1`.
    ///
    /// u follows the curve (degree = curve degree), v the sweep (degree 1).
    #[must_use]
    pub fn from_extrusion_of(curve: &BezierCurve, t0: Vec3, t1: Vec3) -> Self {
        let mut ctrl = [[Point3::ORIGIN; 4]; 4];
        let mut weight = [[1.0; 4]; 4];
        for i in 0..=curve.deg {
            ctrl[i][0] = curve.ctrl[i] + t0;
            ctrl[i][1] = curve.ctrl[i] + t1;
            weight[i][0] = curve.weight[i];
            weight[i][1] = curve.weight[i];
        }
        Self::new(curve.deg, 1, ctrl, weight)
    }

    /// Degree 1x1 unit parallelogram at `pt` whose normal `u x v` points along `n`.
    ///
    /// # Panics
    /// Panics when `n` has zero length.
    #[must_use]
    pub fn from_plane(pt: Point3, n: Vec3) -> Self {
        let Some(n) = n.normalized() else {
            panic!("plane normal must be non-zero");
        };
        let u = n.any_perpendicular();
        let v = n.cross(u);
        let mut ctrl = [[pt; 4]; 4];
        ctrl[1][0] = pt + u;
        ctrl[0][1] = pt + v;
        ctrl[1][1] = pt + u + v;
        Self::new(1, 1, ctrl, [[1.0; 4]; 4])
    }

    /// Rotated by `q` then translated by `t`. Trims are copied (with transformed end
    /// points) only when `include_trims`; their curve handles still refer to the
    /// source shell and must be remapped by the caller.
    #[must_use]
    pub fn from_transformation_of(a: &Self, t: Vec3, q: Quaternion, include_trims: bool) -> Self {
        let mut out = a.clone();
        for i in 0..=a.degm {
            for j in 0..=a.degn {
                out.ctrl[i][j] = q.transform_point(a.ctrl[i][j], t);
            }
        }
        if include_trims {
            for tr in &mut out.trims {
                tr.start = q.transform_point(tr.start, t);
                tr.finish = q.transform_point(tr.finish, t);
            }
        } else {
            out.trims.clear();
        }
        out
    }

    /// Same patch with u reversed, so the normal points the other way. Trims are
    /// left untouched; see [`Self::flip_trims`].
    #[must_use]
    pub fn reversed(&self) -> Self {
        let mut out = self.clone();
        for i in 0..=self.degm {
            out.ctrl[i] = self.ctrl[self.degm - i];
            out.weight[i] = self.weight[self.degm - i];
        }
        out
    }

    /// Reverse the traversal direction of every trim.
    pub fn flip_trims(&mut self) {
        for tr in &mut self.trims {
            *tr = tr.flipped();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bilinear_saddle() -> BezierSurface {
        let mut ctrl = [[Point3::ORIGIN; 4]; 4];
        ctrl[0][0] = Point3::new(0.0, 0.0, 0.0);
        ctrl[1][0] = Point3::new(1.0, 0.0, 0.0);
        ctrl[0][1] = Point3::new(0.0, 1.0, 0.0);
        ctrl[1][1] = Point3::new(1.0, 1.0, 1.0);
        BezierSurface::new(1, 1, ctrl, [[1.0; 4]; 4])
    }

    #[test]
    fn plane_normal_matches_request() {
        let n = Vec3::new(1.0, 2.0, -2.0);
        let s = BezierSurface::from_plane(Point3::new(3.0, 0.0, 1.0), n);
        let got = s.normal_at(0.3, 0.7).normalized().unwrap();
        let want = n.normalized().unwrap();
        assert!(Tolerance::LENGTH.approx_eq_vec3(got, want));
        assert!(s.is_planar(Tolerance::LENGTH));
    }

    #[test]
    fn affine_projection_is_unclamped() {
        let s = BezierSurface::from_plane(Point3::ORIGIN, Vec3::Z);
        let p = Point3::new(3.0, -2.0, 0.5);
        let cp = s.closest_point_to(p);
        assert!(cp.converged);
        assert!((cp.distance - 0.5).abs() < 1e-12);
        let on = s.point_at_uv(cp.uv);
        assert!((on.x - 3.0).abs() < 1e-12 && (on.y + 2.0).abs() < 1e-12);
    }

    #[test]
    fn newton_recovers_points_on_a_curved_patch() {
        let s = bilinear_saddle();
        for (u, v) in [(0.2, 0.3), (0.75, 0.5), (0.9, 0.1)] {
            let cp = s.closest_point_to(s.point_at(u, v));
            assert!(cp.distance < 1e-9, "distance {} at ({u}, {v})", cp.distance);
            assert!((cp.uv.u - u).abs() < 1e-6 && (cp.uv.v - v).abs() < 1e-6);
        }
    }

    #[test]
    fn tangents_match_finite_differences() {
        let arc = BezierCurve::rational(
            2,
            [
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            [1.0, std::f64::consts::FRAC_1_SQRT_2, 1.0, 1.0],
        );
        let s = BezierSurface::from_extrusion_of(&arc, Vec3::ZERO, Vec3::Z);
        let (u, v, h) = (0.4, 0.6, 1e-6);
        let (tu, tv) = s.tangents_at(u, v);
        let fu = (s.point_at(u + h, v) - s.point_at(u - h, v)) / (2.0 * h);
        let fv = (s.point_at(u, v + h) - s.point_at(u, v - h)) / (2.0 * h);
        assert!((tu - fu).length() < 1e-6);
        assert!((tv - fv).length() < 1e-6);
    }

    #[test]
    fn reversal_flips_the_normal() {
        let s = bilinear_saddle();
        let r = s.reversed();
        let n = s.normal_at(0.5, 0.5);
        let m = r.normal_at(0.5, 0.5);
        assert!(Tolerance::LENGTH.approx_eq_vec3(n, -m));
    }
}
