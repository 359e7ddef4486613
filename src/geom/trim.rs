//! Trim loops and regions in surface parameter space.
//!
//! A surface's trims are chained into closed loops, projected into (u,v) and grouped
//! by even-odd nesting: a loop at even depth bounds material, a loop at odd depth is
//! a hole in the smallest even-depth loop around it. Each loop keeps the model-space
//! points it was projected from so meshes reuse the exact boundary vertices.
//!
//! # Example
//! ```ignore
//! use srf_kernel::geom::{Tolerance, TrimLoop, UvPoint, regions_from_loops};
//!
//! let tol = Tolerance::PARAM;
//! let outer = TrimLoop::new(vec![
//!     UvPoint::new(0.0, 0.0),
//!     UvPoint::new(1.0, 0.0),
//!     UvPoint::new(1.0, 1.0),
//!     UvPoint::new(0.0, 1.0),
//! ], tol)?;
//!
//! let (regions, _diag) = regions_from_loops(vec![outer], tol)?;
//! assert!(regions[0].contains(UvPoint::new(0.5, 0.5), tol));
//! ```

use serde::{Deserialize, Serialize};

use super::core::{Point3, Tolerance};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrimError {
    #[error("trim loop points must be finite")]
    NonFinitePoints,
    #[error("trim loop requires at least 3 points, got {count}")]
    InsufficientPoints { count: usize },
    #[error("trim loop self-intersects")]
    SelfIntersection,
    #[error("trim region requires at least one loop")]
    EmptyLoopSet,
    #[error("trim loop has {points} uv points but {model} model points")]
    ModelMismatch { points: usize, model: usize },
    #[error("hole loop is not enclosed by any boundary loop")]
    HoleOutsideBoundary,
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Diagnostics collected during trim operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrimDiagnostics {
    pub loop_count: usize,
    pub hole_count: usize,
    /// Loops reversed to match their nesting orientation.
    pub orientation_flips: usize,
    pub duplicate_points_removed: usize,
    pub closing_points_removed: usize,
    pub warnings: Vec<String>,
}

impl TrimDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: &Self) {
        self.loop_count += other.loop_count;
        self.hole_count += other.hole_count;
        self.orientation_flips += other.orientation_flips;
        self.duplicate_points_removed += other.duplicate_points_removed;
        self.closing_points_removed += other.closing_points_removed;
        self.warnings.extend(other.warnings.iter().cloned());
    }

    #[must_use]
    pub fn had_adjustments(&self) -> bool {
        self.orientation_flips > 0
            || self.duplicate_points_removed > 0
            || self.closing_points_removed > 0
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

// ============================================================================
// UV Domain
// ============================================================================

/// A rectangular domain in UV parameter space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UvDomain {
    pub u_min: f64,
    pub u_max: f64,
    pub v_min: f64,
    pub v_max: f64,
}

impl UvDomain {
    #[must_use]
    pub fn new(u_min: f64, u_max: f64, v_min: f64, v_max: f64) -> Self {
        Self {
            u_min,
            u_max,
            v_min,
            v_max,
        }
    }

    /// The patch's natural domain [0, 1] x [0, 1].
    #[must_use]
    pub fn unit() -> Self {
        Self::new(0.0, 1.0, 0.0, 1.0)
    }

    /// Bounds of `points`, or `None` when empty.
    #[must_use]
    pub fn from_points(points: &[UvPoint]) -> Option<Self> {
        let first = points.first()?;
        let init = Self::new(first.u, first.u, first.v, first.v);
        Some(points.iter().fold(init, |d, p| {
            Self::new(d.u_min.min(p.u), d.u_max.max(p.u), d.v_min.min(p.v), d.v_max.max(p.v))
        }))
    }

    #[must_use]
    pub fn contains(&self, point: UvPoint, tol: Tolerance) -> bool {
        point.u >= self.u_min - tol.eps
            && point.u <= self.u_max + tol.eps
            && point.v >= self.v_min - tol.eps
            && point.v <= self.v_max + tol.eps
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.u_min.is_finite()
            && self.u_max.is_finite()
            && self.v_min.is_finite()
            && self.v_max.is_finite()
            && self.u_min <= self.u_max
            && self.v_min <= self.v_max
    }

    #[must_use]
    pub fn u_span(&self) -> f64 {
        self.u_max - self.u_min
    }

    #[must_use]
    pub fn v_span(&self) -> f64 {
        self.v_max - self.v_min
    }
}

impl Default for UvDomain {
    fn default() -> Self {
        Self::unit()
    }
}

// ============================================================================
// UvPoint
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UvPoint {
    pub u: f64,
    pub v: f64,
}

impl UvPoint {
    #[must_use]
    pub const fn new(u: f64, v: f64) -> Self {
        Self { u, v }
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.u.is_finite() && self.v.is_finite()
    }

    #[must_use]
    pub fn distance_squared(&self, other: UvPoint) -> f64 {
        let du = self.u - other.u;
        let dv = self.v - other.v;
        du * du + dv * dv
    }

    #[must_use]
    pub fn distance(&self, other: UvPoint) -> f64 {
        self.distance_squared(other).sqrt()
    }

    #[must_use]
    pub fn lerp(&self, other: UvPoint, t: f64) -> Self {
        Self::new(self.u + (other.u - self.u) * t, self.v + (other.v - self.v) * t)
    }

    #[must_use]
    pub fn distance_to_segment(&self, a: UvPoint, b: UvPoint) -> f64 {
        let (du, dv) = (b.u - a.u, b.v - a.v);
        let len2 = du * du + dv * dv;
        if len2 <= 0.0 {
            return self.distance(a);
        }
        let t = (((self.u - a.u) * du + (self.v - a.v) * dv) / len2).clamp(0.0, 1.0);
        self.distance(a.lerp(b, t))
    }
}

fn approx_eq_uv(tol: Tolerance, a: UvPoint, b: UvPoint) -> bool {
    (a.u - b.u).abs() <= tol.eps && (a.v - b.v).abs() <= tol.eps
}

/// Shoelace area; positive for counter-clockwise rings.
#[must_use]
pub fn signed_area(points: &[UvPoint]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let mut area = 0.0;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        area += a.u * b.v - b.u * a.v;
    }
    0.5 * area
}

fn point_on_segment(p: UvPoint, a: UvPoint, b: UvPoint, tol: Tolerance) -> bool {
    let ab_u = b.u - a.u;
    let ab_v = b.v - a.v;
    let ap_u = p.u - a.u;
    let ap_v = p.v - a.v;

    let ab_len2 = ab_u * ab_u + ab_v * ab_v;
    let cross = ab_u * ap_v - ab_v * ap_u;
    if cross.abs() > tol.eps * ab_len2.sqrt().max(1.0) {
        return false;
    }

    let dot = ap_u * ab_u + ap_v * ab_v;
    if dot < -tol.eps {
        return false;
    }

    dot - ab_len2 <= tol.eps
}

fn orient2d(a: UvPoint, b: UvPoint, c: UvPoint) -> f64 {
    (b.u - a.u) * (c.v - a.v) - (b.v - a.v) * (c.u - a.u)
}

fn segments_intersect(a: UvPoint, b: UvPoint, c: UvPoint, d: UvPoint, tol: Tolerance) -> bool {
    let o1 = orient2d(a, b, c);
    let o2 = orient2d(a, b, d);
    let o3 = orient2d(c, d, a);
    let o4 = orient2d(c, d, b);

    if o1.abs() <= tol.eps && point_on_segment(c, a, b, tol) {
        return true;
    }
    if o2.abs() <= tol.eps && point_on_segment(d, a, b, tol) {
        return true;
    }
    if o3.abs() <= tol.eps && point_on_segment(a, c, d, tol) {
        return true;
    }
    if o4.abs() <= tol.eps && point_on_segment(b, c, d, tol) {
        return true;
    }

    let ab = (o1 > tol.eps && o2 < -tol.eps) || (o1 < -tol.eps && o2 > tol.eps);
    let cd = (o3 > tol.eps && o4 < -tol.eps) || (o3 < -tol.eps && o4 > tol.eps);
    ab && cd
}

fn loop_self_intersects(points: &[UvPoint], tol: Tolerance) -> bool {
    let n = points.len();
    if n < 4 {
        return false;
    }

    for i in 0..n {
        let a0 = points[i];
        let a1 = points[(i + 1) % n];

        for j in (i + 1)..n {
            let j_next = (j + 1) % n;
            if j == (i + 1) % n || j_next == i {
                continue;
            }
            if segments_intersect(a0, a1, points[j], points[j_next], tol) {
                return true;
            }
        }
    }

    false
}

/// Crossing-parity test; points exactly on the boundary may go either way.
#[must_use]
pub fn point_in_polygon(p: UvPoint, points: &[UvPoint]) -> bool {
    let mut inside = false;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        if (a.v > p.v) != (b.v > p.v) {
            let t = (p.v - a.v) / (b.v - a.v);
            if p.u < a.u + t * (b.u - a.u) {
                inside = !inside;
            }
        }
    }
    inside
}

fn on_boundary(p: UvPoint, points: &[UvPoint], tol: Tolerance) -> bool {
    (0..points.len()).any(|i| point_on_segment(p, points[i], points[(i + 1) % points.len()], tol))
}

/// Containment with boundary points counted as inside.
fn contains_point_polygon(p: UvPoint, points: &[UvPoint], tol: Tolerance) -> bool {
    if points.len() < 3 {
        return false;
    }
    on_boundary(p, points, tol) || point_in_polygon(p, points)
}

/// True when `inner` lies inside `outer`, judged by the first vertex of `inner` that
/// is not on `outer`'s boundary. Loops sharing every vertex compare by area.
fn loop_inside(inner: &TrimLoop, outer: &TrimLoop, tol: Tolerance) -> bool {
    for p in &inner.points {
        if !on_boundary(*p, &outer.points, tol) {
            return point_in_polygon(*p, &outer.points);
        }
    }
    inner.signed_area().abs() < outer.signed_area().abs()
}

// ============================================================================
// TrimLoop
// ============================================================================

/// A closed loop of UV points with the model-space points they came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrimLoop {
    points: Vec<UvPoint>,
    model: Vec<Point3>,
}

impl TrimLoop {
    /// Build a loop from bare UV points; model points are taken as (u, v, 0).
    ///
    /// # Errors
    /// Returns `TrimError` for non-finite input, fewer than three distinct points or
    /// a self-intersecting loop.
    pub fn new(points: Vec<UvPoint>, tol: Tolerance) -> Result<Self, TrimError> {
        let model = points.iter().map(|p| Point3::new(p.u, p.v, 0.0)).collect();
        let (loop_, diag) = Self::with_model(points, model, tol)?;
        if !diag.warnings.is_empty() {
            return Err(TrimError::SelfIntersection);
        }
        Ok(loop_)
    }

    /// Build a loop whose vertices map to `model` points one to one.
    ///
    /// The closing point and consecutive duplicates are removed from both lists.
    /// A self-intersection is reported as a warning rather than an error; loops
    /// projected from adjacent faces may touch at a vertex.
    ///
    /// # Errors
    /// Returns `TrimError` for mismatched lengths, non-finite input or fewer than
    /// three distinct points.
    pub fn with_model(
        points: Vec<UvPoint>,
        model: Vec<Point3>,
        tol: Tolerance,
    ) -> Result<(Self, TrimDiagnostics), TrimError> {
        let mut diagnostics = TrimDiagnostics::new();
        diagnostics.loop_count = 1;

        if points.len() != model.len() {
            return Err(TrimError::ModelMismatch {
                points: points.len(),
                model: model.len(),
            });
        }
        if points.iter().any(|p| !p.is_finite()) {
            return Err(TrimError::NonFinitePoints);
        }

        let mut pairs: Vec<(UvPoint, Point3)> = points.into_iter().zip(model).collect();

        if pairs.len() > 2 {
            if let (Some(first), Some(last)) = (pairs.first(), pairs.last()) {
                if approx_eq_uv(tol, first.0, last.0) {
                    pairs.pop();
                    diagnostics.closing_points_removed += 1;
                }
            }
        }

        let original_count = pairs.len();
        let mut cleaned: Vec<(UvPoint, Point3)> = Vec::with_capacity(pairs.len());
        for pair in pairs {
            if cleaned
                .last()
                .is_some_and(|prev| approx_eq_uv(tol, prev.0, pair.0))
            {
                continue;
            }
            cleaned.push(pair);
        }
        while cleaned.len() > 1
            && approx_eq_uv(tol, cleaned[0].0, cleaned[cleaned.len() - 1].0)
        {
            cleaned.pop();
        }
        diagnostics.duplicate_points_removed = original_count - cleaned.len();

        if cleaned.len() < 3 {
            return Err(TrimError::InsufficientPoints {
                count: cleaned.len(),
            });
        }

        let (points, model): (Vec<_>, Vec<_>) = cleaned.into_iter().unzip();
        if loop_self_intersects(&points, tol) {
            diagnostics
                .warnings
                .push(format!("trim loop with {} points self-intersects", points.len()));
        }

        Ok((Self { points, model }, diagnostics))
    }

    #[must_use]
    pub fn points(&self) -> &[UvPoint] {
        &self.points
    }

    #[must_use]
    pub fn model_points(&self) -> &[Point3] {
        &self.model
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn bounds(&self) -> UvDomain {
        UvDomain::from_points(&self.points).unwrap_or_else(|| UvDomain::new(0.0, 0.0, 0.0, 0.0))
    }

    /// Positive area = counter-clockwise, negative = clockwise.
    #[must_use]
    pub fn signed_area(&self) -> f64 {
        signed_area(&self.points)
    }

    #[must_use]
    pub fn is_ccw(&self) -> bool {
        self.signed_area() > 0.0
    }

    #[must_use]
    pub fn is_cw(&self) -> bool {
        self.signed_area() < 0.0
    }

    #[must_use]
    pub fn reversed(&self) -> Self {
        let mut out = self.clone();
        out.points.reverse();
        out.model.reverse();
        out
    }

    /// Boundary points count as inside.
    #[must_use]
    pub fn contains(&self, point: UvPoint, tol: Tolerance) -> bool {
        contains_point_polygon(point, &self.points, tol)
    }

    /// Distance from `p` to the nearest loop edge.
    #[must_use]
    pub fn distance_to_boundary(&self, p: UvPoint) -> f64 {
        let n = self.points.len();
        (0..n)
            .map(|i| p.distance_to_segment(self.points[i], self.points[(i + 1) % n]))
            .fold(f64::INFINITY, f64::min)
    }
}

// ============================================================================
// TrimRegion
// ============================================================================

/// One connected piece of trimmed surface: a CCW outer loop and its CW holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrimRegion {
    pub outer: TrimLoop,
    pub holes: Vec<TrimLoop>,
}

impl TrimRegion {
    /// Inside the outer loop and not strictly inside any hole.
    #[must_use]
    pub fn contains(&self, point: UvPoint, tol: Tolerance) -> bool {
        if !self.outer.contains(point, tol) {
            return false;
        }
        !self
            .holes
            .iter()
            .any(|h| h.contains(point, tol) && !on_boundary(point, h.points(), tol))
    }

    /// Distance from `p` to the nearest edge of the outer loop or of any hole.
    #[must_use]
    pub fn distance_to_boundary(&self, p: UvPoint) -> f64 {
        self.holes
            .iter()
            .map(|h| h.distance_to_boundary(p))
            .fold(self.outer.distance_to_boundary(p), f64::min)
    }

    #[must_use]
    pub fn bounds(&self) -> UvDomain {
        self.outer.bounds()
    }

    /// Outer area minus hole areas.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.outer.signed_area().abs() - self.holes.iter().map(|h| h.signed_area().abs()).sum::<f64>()
    }
}

/// Group loops into regions by even-odd nesting.
///
/// A loop's depth is the number of other loops that enclose it. Even-depth loops
/// become region boundaries (made CCW); odd-depth loops become holes (made CW) of
/// the smallest even-depth loop around them.
///
/// # Errors
/// [`TrimError::EmptyLoopSet`] for no loops; [`TrimError::HoleOutsideBoundary`] if a
/// hole finds no enclosing boundary (inconsistent containment).
pub fn regions_from_loops(
    loops: Vec<TrimLoop>,
    tol: Tolerance,
) -> Result<(Vec<TrimRegion>, TrimDiagnostics), TrimError> {
    let mut diagnostics = TrimDiagnostics::new();
    if loops.is_empty() {
        return Err(TrimError::EmptyLoopSet);
    }
    diagnostics.loop_count = loops.len();

    let n = loops.len();
    let mut encloses = vec![vec![false; n]; n];
    for i in 0..n {
        for j in 0..n {
            if i != j {
                encloses[j][i] = loop_inside(&loops[i], &loops[j], tol);
            }
        }
    }
    let depth: Vec<usize> = (0..n)
        .map(|i| (0..n).filter(|&j| encloses[j][i]).count())
        .collect();

    let mut outer_index = vec![usize::MAX; n];
    let mut regions: Vec<TrimRegion> = Vec::new();
    for i in (0..n).filter(|&i| depth[i] % 2 == 0) {
        let outer = if loops[i].is_ccw() {
            loops[i].clone()
        } else {
            diagnostics.orientation_flips += 1;
            loops[i].reversed()
        };
        outer_index[i] = regions.len();
        regions.push(TrimRegion {
            outer,
            holes: Vec::new(),
        });
    }

    for i in (0..n).filter(|&i| depth[i] % 2 == 1) {
        let parent = (0..n)
            .filter(|&j| depth[j] % 2 == 0 && encloses[j][i])
            .min_by(|&a, &b| {
                loops[a]
                    .signed_area()
                    .abs()
                    .total_cmp(&loops[b].signed_area().abs())
            })
            .ok_or(TrimError::HoleOutsideBoundary)?;

        let hole = if loops[i].is_cw() {
            loops[i].clone()
        } else {
            diagnostics.orientation_flips += 1;
            loops[i].reversed()
        };
        regions[outer_index[parent]].holes.push(hole);
        diagnostics.hole_count += 1;
    }

    Ok((regions, diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(min: f64, max: f64) -> Vec<UvPoint> {
        vec![
            UvPoint::new(min, min),
            UvPoint::new(max, min),
            UvPoint::new(max, max),
            UvPoint::new(min, max),
        ]
    }

    #[test]
    fn closing_point_is_removed() {
        let mut pts = square(0.0, 1.0);
        pts.push(UvPoint::new(0.0, 0.0));
        let model: Vec<Point3> = pts.iter().map(|p| Point3::new(p.u, p.v, 5.0)).collect();
        let (lp, diag) = TrimLoop::with_model(pts, model, Tolerance::PARAM).unwrap();
        assert_eq!(lp.len(), 4);
        assert_eq!(lp.model_points().len(), 4);
        assert_eq!(diag.closing_points_removed, 1);
    }

    #[test]
    fn bowtie_is_rejected_by_new() {
        let pts = vec![
            UvPoint::new(0.0, 0.0),
            UvPoint::new(1.0, 1.0),
            UvPoint::new(1.0, 0.0),
            UvPoint::new(0.0, 1.0),
        ];
        assert_eq!(
            TrimLoop::new(pts, Tolerance::PARAM),
            Err(TrimError::SelfIntersection)
        );
    }

    #[test]
    fn nested_loops_alternate_between_material_and_hole() {
        let tol = Tolerance::PARAM;
        let loops = vec![
            TrimLoop::new(square(0.0, 10.0), tol).unwrap(),
            TrimLoop::new(square(1.0, 9.0), tol).unwrap(),
            TrimLoop::new(square(2.0, 8.0), tol).unwrap(),
            TrimLoop::new(square(3.0, 7.0), tol).unwrap(),
        ];
        let (regions, diag) = regions_from_loops(loops, tol).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(diag.hole_count, 2);
        assert!(regions.iter().all(|r| r.outer.is_ccw() && r.holes.iter().all(TrimLoop::is_cw)));

        let contains = |p: UvPoint| regions.iter().any(|r| r.contains(p, tol));
        assert!(contains(UvPoint::new(0.5, 5.0)));
        assert!(!contains(UvPoint::new(1.5, 5.0)));
        assert!(contains(UvPoint::new(2.5, 5.0)));
        assert!(!contains(UvPoint::new(5.0, 5.0)));
    }

    #[test]
    fn region_distance_includes_holes() {
        let tol = Tolerance::PARAM;
        let loops = vec![
            TrimLoop::new(square(0.0, 10.0), tol).unwrap(),
            TrimLoop::new(square(4.0, 6.0), tol).unwrap(),
        ];
        let (regions, _) = regions_from_loops(loops, tol).unwrap();
        let d = regions[0].distance_to_boundary(UvPoint::new(3.0, 5.0));
        assert!((d - 1.0).abs() < 1e-12);
        assert!((regions[0].area() - 96.0).abs() < 1e-12);
    }
}
