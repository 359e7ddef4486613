//! Boolean combination of shells.
//!
//! Both operands are triangulated per trimmed surface and indexed in a BVH. Every
//! surface of A is intersected with every surface of B through their triangles; the
//! resulting segments are chained into cut polylines and snapped onto both exact
//! surfaces. Original curves are split where cuts end on them, every boundary piece
//! is classified by probing the region of its surface next to it against the other
//! operand, and the kept pieces plus the cuts become the trims of a new shell.
//!
//! Operands are never modified.

use std::collections::HashMap;
use std::fmt;
use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};

use super::bvh::Bvh;
use super::core::{BBox, Point3, Tolerance, Vec3};
use super::curve::{CurveSource, ShellCurve, TrimBy};
use super::edges::Edge;
use super::handle::{CurveHandle, SurfaceHandle};
use super::shell::{Shell, SurfaceMeshError};
use super::surface::BezierSurface;
use super::tessellation::GeomContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BooleanOp {
    Union,
    Difference,
}

impl fmt::Display for BooleanOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Union => write!(f, "union"),
            Self::Difference => write!(f, "difference"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment3 {
    pub a: Point3,
    pub b: Point3,
}

impl Segment3 {
    #[must_use]
    pub const fn new(a: Point3, b: Point3) -> Self {
        Self { a, b }
    }

    #[must_use]
    pub fn direction(self) -> Vec3 {
        self.b.sub_point(self.a)
    }

    #[must_use]
    pub fn length_squared(self) -> f64 {
        self.direction().length_squared()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle3 {
    pub a: Point3,
    pub b: Point3,
    pub c: Point3,
}

impl Triangle3 {
    #[must_use]
    pub const fn new(a: Point3, b: Point3, c: Point3) -> Self {
        Self { a, b, c }
    }

    /// Unnormalized, following the a-b-c winding.
    #[must_use]
    pub fn normal(self) -> Vec3 {
        self.b.sub_point(self.a).cross(self.c.sub_point(self.a))
    }

    #[must_use]
    pub fn bbox(self) -> BBox {
        let mut min = self.a;
        let mut max = self.a;
        for p in [self.b, self.c] {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }
        BBox::new(min, max)
    }

    /// Closest point of the (solid) triangle to `p`.
    #[must_use]
    pub fn closest_point(self, p: Point3) -> Point3 {
        let (a, b, c) = (self.a, self.b, self.c);
        let ab = b - a;
        let ac = c - a;

        let ap = p - a;
        let d1 = ab.dot(ap);
        let d2 = ac.dot(ap);
        if d1 <= 0.0 && d2 <= 0.0 {
            return a;
        }

        let bp = p - b;
        let d3 = ab.dot(bp);
        let d4 = ac.dot(bp);
        if d3 >= 0.0 && d4 <= d3 {
            return b;
        }

        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            return a + ab * (d1 / (d1 - d3));
        }

        let cp = p - c;
        let d5 = ab.dot(cp);
        let d6 = ac.dot(cp);
        if d6 >= 0.0 && d5 <= d6 {
            return c;
        }

        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            return a + ac * (d2 / (d2 - d6));
        }

        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
            return b + (c - b) * ((d4 - d3) / ((d4 - d3) + (d5 - d6)));
        }

        let denom = 1.0 / (va + vb + vc);
        a + ab * (vb * denom) + ac * (vc * denom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TriTriIntersection {
    Point(Point3),
    Segment(Segment3),
    Coplanar,
}

/// Where a point lies relative to a closed shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointContainment {
    Inside,
    Outside,
    OnSurface,
    Indeterminate,
}

/// Where the region of a surface next to one boundary piece lies relative to the
/// other operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegionClass {
    Inside,
    Outside,
    /// On the other shell's surface, both normals pointing the same way.
    CoincidentSame,
    /// On the other shell's surface, normals opposed.
    CoincidentOpposite,
    Indeterminate,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BooleanError {
    #[error("shell {operand} cannot be meshed for classification: {source}")]
    Operand {
        operand: &'static str,
        #[source]
        source: SurfaceMeshError,
    },
    #[error("boundary of {surface} near {point:?} could not be classified")]
    Ambiguous { surface: SurfaceHandle, point: Point3 },
    /// A result surface whose trims do not chain into closed loops. `surface` is
    /// the handle in the operand it was copied from.
    #[error("trims of {surface} from shell {operand} do not close, dangling at {at}")]
    OpenTrims {
        operand: &'static str,
        surface: SurfaceHandle,
        at: Edge,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanDiagnostics {
    pub op: BooleanOp,
    pub input_a_triangle_count: usize,
    pub input_b_triangle_count: usize,
    pub intersection_segment_count: usize,
    pub coplanar_pair_count: usize,
    /// Cut polylines added as trims.
    pub intersection_curve_count: usize,
    /// Cuts that ran along existing boundaries of both surfaces.
    pub boundary_curves_skipped: usize,
    /// Cuts where the surfaces touch without crossing.
    pub tangent_curves_skipped: usize,
    /// Cuts left off a surface because the regions on both sides of them share
    /// the same fate (coplanar overlaps).
    pub same_fate_cuts_skipped: usize,
    /// Cuts left off a surface that already carries the same polyline.
    pub duplicate_cuts_skipped: usize,
    pub split_point_count: usize,
    pub pieces_classified: usize,
    pub pieces_kept: usize,
    /// Classification probes that came back indeterminate and were retried.
    pub indeterminate_retries: usize,
    pub surfaces_removed: usize,
    pub warnings: Vec<String>,
}

impl Default for BooleanDiagnostics {
    fn default() -> Self {
        Self {
            op: BooleanOp::Union,
            input_a_triangle_count: 0,
            input_b_triangle_count: 0,
            intersection_segment_count: 0,
            coplanar_pair_count: 0,
            intersection_curve_count: 0,
            boundary_curves_skipped: 0,
            tangent_curves_skipped: 0,
            same_fate_cuts_skipped: 0,
            duplicate_cuts_skipped: 0,
            split_point_count: 0,
            pieces_classified: 0,
            pieces_kept: 0,
            indeterminate_retries: 0,
            surfaces_removed: 0,
            warnings: Vec::new(),
        }
    }
}

impl BooleanDiagnostics {
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Triangle primitives
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlaneSide {
    Positive,
    Negative,
    OnPlane,
}

fn plane_from_triangle(tri: Triangle3, tol: Tolerance) -> Option<(Vec3, f64, f64)> {
    let n = tri.normal();
    let len = n.length();
    if !len.is_finite() || len <= tol.eps {
        return None;
    }
    let d = n.dot(Vec3::from(tri.a));
    Some((n, d, len))
}

fn plane_side(n: Vec3, d: f64, n_len: f64, p: Point3, tol: Tolerance) -> PlaneSide {
    if !n_len.is_finite() || n_len <= tol.eps {
        return PlaneSide::OnPlane;
    }
    let signed = n.dot(Vec3::from(p)) - d;
    if !signed.is_finite() {
        return PlaneSide::OnPlane;
    }
    let bound = tol.eps * n_len;
    if signed > bound {
        PlaneSide::Positive
    } else if signed < -bound {
        PlaneSide::Negative
    } else {
        PlaneSide::OnPlane
    }
}

fn push_unique_point(points: &mut Vec<Point3>, point: Point3, tol: Tolerance) {
    if points.iter().any(|&p| tol.approx_eq_point3(p, point)) {
        return;
    }
    points.push(point);
}

fn triangle_triangle_coplanar(tri_a: Triangle3, tri_b: Triangle3, tol: Tolerance) -> bool {
    let Some((n_a, d_a, n_len)) = plane_from_triangle(tri_a, tol) else {
        return false;
    };
    let Some((n_b, _, _)) = plane_from_triangle(tri_b, tol) else {
        return false;
    };

    let cross_len2 = n_a.cross(n_b).length_squared();
    let denom = n_len * n_b.length();
    if !cross_len2.is_finite() || !denom.is_finite() || denom <= tol.eps {
        return false;
    }
    if cross_len2 > (tol.eps * denom).powi(2) {
        return false;
    }

    matches!(plane_side(n_a, d_a, n_len, tri_b.a, tol), PlaneSide::OnPlane)
}

/// Möller–Trumbore, restricted to the segment.
fn segment_triangle_intersection(segment: Segment3, triangle: Triangle3, tol: Tolerance) -> Option<Point3> {
    let dir = segment.direction();
    let edge1 = triangle.b.sub_point(triangle.a);
    let edge2 = triangle.c.sub_point(triangle.a);
    let h = dir.cross(edge2);
    let det = edge1.dot(h);

    let det_eps = tol.eps * edge1.length() * h.length();
    if !det.is_finite() || det.abs() <= det_eps {
        return None;
    }

    let inv_det = 1.0 / det;
    let s = segment.a.sub_point(triangle.a);
    let u = inv_det * s.dot(h);
    if u < -tol.eps || u > 1.0 + tol.eps {
        return None;
    }

    let q = s.cross(edge1);
    let v = inv_det * dir.dot(q);
    if v < -tol.eps || u + v > 1.0 + tol.eps {
        return None;
    }

    let t = inv_det * edge2.dot(q);
    if t < -tol.eps || t > 1.0 + tol.eps {
        return None;
    }

    Some(segment.a + dir * t)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RayHit {
    t: f64,
    u: f64,
    v: f64,
}

fn ray_triangle_intersection(origin: Point3, dir: Vec3, tri: Triangle3, tol: Tolerance) -> Option<RayHit> {
    let edge1 = tri.b.sub_point(tri.a);
    let edge2 = tri.c.sub_point(tri.a);
    let h = dir.cross(edge2);
    let det = edge1.dot(h);
    let det_eps = tol.eps * edge1.length() * h.length();
    if !det.is_finite() || det.abs() <= det_eps {
        return None;
    }

    let inv_det = 1.0 / det;
    let s = origin.sub_point(tri.a);
    let u = inv_det * s.dot(h);
    if u < -tol.eps || u > 1.0 + tol.eps {
        return None;
    }

    let q = s.cross(edge1);
    let v = inv_det * dir.dot(q);
    if v < -tol.eps || u + v > 1.0 + tol.eps {
        return None;
    }

    let t = inv_det * edge2.dot(q);
    if !t.is_finite() || t < -tol.eps {
        return None;
    }

    Some(RayHit { t, u, v })
}

/// Intersection of two triangles.
///
/// Returns `None` when they do not meet (within tolerance). Coplanar overlaps are
/// reported as [`TriTriIntersection::Coplanar`] without computing the overlap.
#[must_use]
pub fn triangle_triangle_intersection(tri_a: Triangle3, tri_b: Triangle3, tol: Tolerance) -> Option<TriTriIntersection> {
    let bbox_a = tri_a.bbox().expand_tolerance(tol);
    let bbox_b = tri_b.bbox().expand_tolerance(tol);
    if !bbox_a.intersects(bbox_b) {
        return None;
    }

    if triangle_triangle_coplanar(tri_a, tri_b, tol) {
        return Some(TriTriIntersection::Coplanar);
    }

    let mut points = Vec::new();
    for (p0, p1) in [(tri_a.a, tri_a.b), (tri_a.b, tri_a.c), (tri_a.c, tri_a.a)] {
        if let Some(hit) = segment_triangle_intersection(Segment3::new(p0, p1), tri_b, tol) {
            push_unique_point(&mut points, hit, tol);
        }
    }
    for (p0, p1) in [(tri_b.a, tri_b.b), (tri_b.b, tri_b.c), (tri_b.c, tri_b.a)] {
        if let Some(hit) = segment_triangle_intersection(Segment3::new(p0, p1), tri_a, tol) {
            push_unique_point(&mut points, hit, tol);
        }
    }

    match points.len() {
        0 => None,
        1 => Some(TriTriIntersection::Point(points[0])),
        _ => {
            let mut best = (0usize, 1usize, 0.0f64);
            for i in 0..points.len() {
                for j in (i + 1)..points.len() {
                    let d2 = points[j].sub_point(points[i]).length_squared();
                    if d2 > best.2 {
                        best = (i, j, d2);
                    }
                }
            }
            Some(TriTriIntersection::Segment(Segment3::new(points[best.0], points[best.1])))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Prepared operands
// ─────────────────────────────────────────────────────────────────────────────

/// Triangulated operand with a BVH over its triangles.
struct PreparedShell {
    tris: Vec<Triangle3>,
    /// Index into `surfaces.as_slice()` of each triangle's surface.
    owner: Vec<usize>,
    /// How far each triangle may sit from its exact surface.
    slack: Vec<f64>,
    max_slack: f64,
    bvh: Option<Bvh>,
    bbox: Option<BBox>,
}

fn prepare_shell(shell: &Shell, operand: &'static str, ctx: &GeomContext) -> Result<PreparedShell, BooleanError> {
    let tol = ctx.tolerance;
    let mut prepared = PreparedShell {
        tris: Vec::new(),
        owner: Vec::new(),
        slack: Vec::new(),
        max_slack: 0.0,
        bvh: None,
        bbox: None,
    };

    for (index, srf) in shell.surfaces.iter().enumerate() {
        let (triangles, _) = shell
            .triangulate_surface(srf, ctx)
            .map_err(|source| BooleanError::Operand { operand, source })?;
        let slack = if srf.is_planar(tol) {
            0.0
        } else {
            ctx.surface.max_deviation
        };
        prepared.max_slack = prepared.max_slack.max(slack);
        for t in triangles {
            if t.area() <= tol.eps_squared() {
                continue;
            }
            prepared.tris.push(Triangle3::new(t.a, t.b, t.c));
            prepared.owner.push(index);
            prepared.slack.push(slack);
        }
    }

    let boxes: Vec<BBox> = prepared.tris.iter().map(|t| t.bbox().expand_tolerance(tol)).collect();
    prepared.bbox = boxes.iter().copied().reduce(BBox::union);
    prepared.bvh = Bvh::build(&boxes);
    Ok(prepared)
}

// ─────────────────────────────────────────────────────────────────────────────
// Point classification
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RayVote {
    Certain(PointContainment),
    Ambiguous,
}

const RAY_DIRECTIONS: [Vec3; 3] = [
    Vec3::new(1.0, 0.234_567_89, 0.345_678_91),
    Vec3::new(0.345_678_91, 1.0, 0.234_567_89),
    Vec3::new(0.234_567_89, 0.345_678_91, 1.0),
];

fn ray_cast_containment(point: Point3, mesh: &PreparedShell, bvh: &Bvh, dir: Vec3, tol: Tolerance) -> RayVote {
    let edge_eps = tol.eps * 10.0;
    let mut intersections = 0usize;
    let mut ambiguous = false;

    bvh.query_ray(point, dir, f64::INFINITY, |i| {
        let Some(hit) = ray_triangle_intersection(point, dir, mesh.tris[i], tol) else {
            return ControlFlow::Continue(());
        };
        if hit.t <= tol.eps {
            return ControlFlow::Continue(());
        }
        let w = 1.0 - hit.u - hit.v;
        if hit.u.abs() <= edge_eps || hit.v.abs() <= edge_eps || w.abs() <= edge_eps {
            ambiguous = true;
            return ControlFlow::Break(());
        }
        intersections += 1;
        ControlFlow::Continue(())
    });

    if ambiguous {
        return RayVote::Ambiguous;
    }
    RayVote::Certain(if intersections % 2 == 1 {
        PointContainment::Inside
    } else {
        PointContainment::Outside
    })
}

/// Parity vote over three skewed rays. The first certain answer stands unless a
/// later certain ray contradicts it.
fn classify_point_in_prepared(point: Point3, mesh: &PreparedShell, tol: Tolerance) -> PointContainment {
    let (Some(bvh), Some(bbox)) = (mesh.bvh.as_ref(), mesh.bbox) else {
        return PointContainment::Outside;
    };
    if !bbox.expand_tolerance(tol).contains_point(point) {
        return PointContainment::Outside;
    }

    let on_tol = tol.eps * 10.0;
    let touching = bvh.nearest(point, on_tol * on_tol, |i| {
        point.distance_squared_to(mesh.tris[i].closest_point(point))
    });
    if touching.is_some() {
        return PointContainment::OnSurface;
    }

    let mut vote: Option<PointContainment> = None;
    for dir in RAY_DIRECTIONS {
        let dir = dir.normalized().unwrap_or(Vec3::X);
        match ray_cast_containment(point, mesh, bvh, dir, tol) {
            RayVote::Certain(result) => match vote {
                None => vote = Some(result),
                Some(prev) if prev == result => return result,
                Some(_) => return PointContainment::Indeterminate,
            },
            RayVote::Ambiguous => {}
        }
    }
    vote.unwrap_or(PointContainment::Indeterminate)
}

/// Classify `point` against the closed shell `shell`.
///
/// # Errors
/// [`BooleanError::Operand`] when a surface of `shell` cannot be triangulated.
pub fn classify_point_in_shell(point: Point3, shell: &Shell, ctx: &GeomContext) -> Result<PointContainment, BooleanError> {
    let prepared = prepare_shell(shell, "query", ctx)?;
    Ok(classify_point_in_prepared(point, &prepared, ctx.tolerance))
}

/// Classify a point lying on a surface with unit normal `n` against `other`.
fn classify_surface_point(q: Point3, n: Vec3, other: &PreparedShell, tol: Tolerance) -> RegionClass {
    let Some(bvh) = other.bvh.as_ref() else {
        return RegionClass::Outside;
    };

    let on_tol = tol.eps * 10.0;
    let reach = on_tol + other.max_slack;
    let nearest = bvh.nearest(q, reach * reach, |i| {
        q.distance_squared_to(other.tris[i].closest_point(q))
    });
    if let Some((i, d2)) = nearest {
        let d = d2.sqrt();
        if d <= on_tol + other.slack[i] {
            if let Some(nt) = other.tris[i].normal().normalized() {
                let c = nt.dot(n);
                if c >= 0.99 {
                    return RegionClass::CoincidentSame;
                }
                if c <= -0.99 {
                    return RegionClass::CoincidentOpposite;
                }
            }
            if d <= on_tol {
                return RegionClass::Indeterminate;
            }
        }
    }

    match classify_point_in_prepared(q, other, tol) {
        PointContainment::Inside => RegionClass::Inside,
        PointContainment::Outside => RegionClass::Outside,
        PointContainment::OnSurface | PointContainment::Indeterminate => RegionClass::Indeterminate,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cuts
// ─────────────────────────────────────────────────────────────────────────────

/// An intersection polyline between surface `sa` of A and surface `sb` of B.
///
/// Oriented so that A's kept region lies on its left (seen down A's normal).
#[derive(Debug, Clone)]
struct Cut {
    sa: usize,
    sb: usize,
    pts: Vec<Point3>,
    closed: bool,
    on_a: bool,
    on_b: bool,
}

/// Chain loose segments into polylines. Closed chains do not repeat their first
/// point.
fn chain_segments(segments: &[Segment3], tol: f64) -> Vec<(Vec<Point3>, bool)> {
    let mut nodes: Vec<Point3> = Vec::new();
    let mut node_id = |p: Point3| {
        if let Some(i) = nodes.iter().position(|q| q.distance_to(p) <= tol) {
            i
        } else {
            nodes.push(p);
            nodes.len() - 1
        }
    };

    let mut edges: Vec<(usize, usize)> = Vec::new();
    for s in segments {
        let (a, b) = (node_id(s.a), node_id(s.b));
        if a == b {
            continue;
        }
        let key = (a.min(b), a.max(b));
        if !edges.contains(&key) {
            edges.push(key);
        }
    }

    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (e, &(a, b)) in edges.iter().enumerate() {
        adjacency[a].push(e);
        adjacency[b].push(e);
    }

    let mut used = vec![false; edges.len()];
    let walk = |start: usize, first: usize, used: &mut Vec<bool>| {
        let mut pts = vec![nodes[start]];
        let mut cur = start;
        let mut e = first;
        loop {
            used[e] = true;
            let (a, b) = edges[e];
            cur = if a == cur { b } else { a };
            pts.push(nodes[cur]);
            if adjacency[cur].len() != 2 {
                break;
            }
            match adjacency[cur].iter().copied().find(|&next| !used[next]) {
                Some(next) => e = next,
                None => break,
            }
        }
        let closed = cur == start && pts.len() > 2;
        if closed {
            pts.pop();
        }
        (pts, closed)
    };

    let mut out = Vec::new();
    for start in 0..nodes.len() {
        if adjacency[start].len() == 2 {
            continue;
        }
        for k in 0..adjacency[start].len() {
            let e = adjacency[start][k];
            if !used[e] {
                out.push(walk(start, e, &mut used));
            }
        }
    }
    for e in 0..edges.len() {
        if !used[e] {
            out.push(walk(edges[e].0, e, &mut used));
        }
    }
    out
}

/// Drop vertices that lie within `tol` of the chord through their neighbours.
fn simplify_polyline(pts: &[Point3], tol: f64) -> Vec<Point3> {
    if pts.len() < 3 {
        return pts.to_vec();
    }
    let mut out = vec![pts[0]];
    for i in 1..pts.len() - 1 {
        let prev = out[out.len() - 1];
        if pts[i].distance_to_segment(prev, pts[i + 1]) > tol {
            out.push(pts[i]);
        }
    }
    out.push(pts[pts.len() - 1]);
    out
}

/// Move `p` onto the intersection of `s` and `t` by repeated projection onto the
/// line where their tangent planes meet.
fn snap_to_both(p: Point3, s: &BezierSurface, t: &BezierSurface, tol: Tolerance) -> Point3 {
    let mut x = p;
    for _ in 0..8 {
        let cs = s.closest_point_to(x);
        let ct = t.closest_point_to(x);
        let (Some(ns), Some(nt)) = (
            s.unit_normal_at(cs.uv.u, cs.uv.v),
            t.unit_normal_at(ct.uv.u, ct.uv.v),
        ) else {
            break;
        };
        let c = ns.dot(nt);
        let det = 1.0 - c * c;
        if det < 1e-12 {
            break;
        }
        let rs = ns.dot(s.point_at_uv(cs.uv) - x);
        let rt = nt.dot(t.point_at_uv(ct.uv) - x);
        let alpha = (rs - c * rt) / det;
        let beta = (rt - c * rs) / det;
        let next = x + ns * alpha + nt * beta;
        let moved = next.distance_to(x);
        x = next;
        if moved <= tol.eps * 1e-2 {
            break;
        }
    }
    x
}

fn near_polylines(p: Point3, polylines: &[Vec<Point3>], tol: f64) -> bool {
    polylines
        .iter()
        .any(|pl| pl.windows(2).any(|w| p.distance_to_segment(w[0], w[1]) <= tol))
}

/// Every vertex and segment midpoint of `pts` lies on one of `boundary`.
fn runs_along(pts: &[Point3], closed: bool, boundary: &[Vec<Point3>], tol: f64) -> bool {
    let wrap = if closed { pts.first().copied() } else { None };
    pts.iter().all(|p| near_polylines(*p, boundary, tol))
        && pts
            .windows(2)
            .map(|w| (w[0], w[1]))
            .chain(pts.last().copied().zip(wrap))
            .all(|(a, b)| near_polylines(a.midpoint(b), boundary, tol))
}

fn unit_normal_near(srf: &BezierSurface, p: Point3) -> Option<Vec3> {
    let uv = srf.closest_point_to(p).uv;
    srf.unit_normal_at(uv.u, uv.v)
}

// ─────────────────────────────────────────────────────────────────────────────
// Curve splitting
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct CurvePiece {
    /// Range along the curve polyline (`segment index + fraction`).
    from: f64,
    to: f64,
    /// Curve order.
    pts: Vec<Point3>,
}

/// Split every curve of `shell` at the junctions lying strictly inside it.
fn split_curves(
    shell: &Shell,
    junctions: &[Point3],
    tol: Tolerance,
    split_count: &mut usize,
) -> HashMap<CurveHandle, Vec<CurvePiece>> {
    let mut out = HashMap::with_capacity(shell.curves.len());
    for c in &shell.curves {
        let last = c.pts.len().saturating_sub(1) as f64;
        let mut cuts: Vec<(f64, Point3)> = junctions
            .iter()
            .filter(|j| !tol.approx_eq_point3(**j, c.start()) && !tol.approx_eq_point3(**j, c.finish()))
            .filter_map(|j| c.locate(*j, tol).map(|t| (t, *j)))
            .collect();
        cuts.sort_by(|a, b| a.0.total_cmp(&b.0));
        cuts.dedup_by(|a, b| tol.approx_eq_point3(a.1, b.1));

        if cuts.is_empty() {
            out.insert(
                c.h,
                vec![CurvePiece {
                    from: 0.0,
                    to: last,
                    pts: c.pts.clone(),
                }],
            );
            continue;
        }
        *split_count += cuts.len();

        let mut marks = vec![(0.0, c.start())];
        marks.extend(cuts);
        marks.push((last, c.finish()));
        let pieces = marks
            .windows(2)
            .map(|w| CurvePiece {
                from: w[0].0,
                to: w[1].0,
                pts: c
                    .piece(w[0].1, w[1].1, tol)
                    .unwrap_or_else(|| vec![w[0].1, w[1].1]),
            })
            .collect();
        out.insert(c.h, pieces);
    }
    out
}

/// One piece of an operand trim, in the trim's traversal order.
#[derive(Debug, Clone)]
struct TrimPiece {
    curve: CurveHandle,
    index: usize,
    backwards: bool,
    pts: Vec<Point3>,
}

fn trim_pieces(
    shell: &Shell,
    trim: &TrimBy,
    split: &HashMap<CurveHandle, Vec<CurvePiece>>,
    tol: Tolerance,
) -> Vec<TrimPiece> {
    let (Some(curve), Some(pieces)) = (shell.curves.find(trim.curve), split.get(&trim.curve)) else {
        return Vec::new();
    };
    let (a, b) = if trim.backwards {
        (trim.finish, trim.start)
    } else {
        (trim.start, trim.finish)
    };
    let last = curve.pts.len().saturating_sub(1) as f64;
    let (ta, tb) = if tol.approx_eq_point3(a, curve.start()) && tol.approx_eq_point3(b, curve.finish()) {
        (0.0, last)
    } else {
        (
            curve.locate(a, tol).unwrap_or(0.0),
            curve.locate(b, tol).unwrap_or(last),
        )
    };

    let mut out: Vec<TrimPiece> = pieces
        .iter()
        .enumerate()
        .filter(|(_, p)| p.from >= ta - 1e-9 && p.to <= tb + 1e-9)
        .map(|(index, p)| {
            let mut pts = p.pts.clone();
            if trim.backwards {
                pts.reverse();
            }
            TrimPiece {
                curve: trim.curve,
                index,
                backwards: trim.backwards,
                pts,
            }
        })
        .collect();
    if trim.backwards {
        out.reverse();
    }
    out
}

/// Midpoint by arc length and the direction of the segment holding it.
fn polyline_midpoint(pts: &[Point3]) -> Option<(Point3, Vec3, f64)> {
    let total: f64 = pts.windows(2).map(|w| w[0].distance_to(w[1])).sum();
    if total <= 0.0 {
        return None;
    }
    let mut walked = 0.0;
    for w in pts.windows(2) {
        let len = w[0].distance_to(w[1]);
        if len > 0.0 && walked + len >= total * 0.5 {
            let s = (total * 0.5 - walked) / len;
            return Some((w[0].lerp(w[1], s), (w[1] - w[0]) / len, total));
        }
        walked += len;
    }
    None
}

/// Probe the region of `srf` just left of `pts` (its material side) against
/// `other`, shrinking the probe offset when the answer is indeterminate.
fn classify_piece(
    pts: &[Point3],
    srf: &BezierSurface,
    other: &PreparedShell,
    tol: Tolerance,
    retries: &mut usize,
) -> (RegionClass, Point3) {
    let Some((mid, tangent, length)) = polyline_midpoint(pts) else {
        return (RegionClass::Indeterminate, pts.first().copied().unwrap_or(Point3::ORIGIN));
    };
    let Some(n) = unit_normal_near(srf, mid) else {
        return (RegionClass::Indeterminate, mid);
    };
    let Some(inward) = n.cross(tangent).normalized() else {
        return (RegionClass::Indeterminate, mid);
    };

    let diagonal = srf.bbox().diagonal();
    let delta = (0.25 * length).min(0.01 * diagonal).max(10.0 * tol.eps);
    for scale in [1.0, 0.25, 0.0625] {
        let probe = mid + inward * (delta * scale);
        let uv = srf.closest_point_to(probe).uv;
        let q = srf.point_at_uv(uv);
        let nq = srf.unit_normal_at(uv.u, uv.v).unwrap_or(n);
        let class = classify_surface_point(q, nq, other, tol);
        if class != RegionClass::Indeterminate {
            return (class, q);
        }
        *retries += 1;
    }
    (RegionClass::Indeterminate, mid)
}

fn keep_piece(op: BooleanOp, from_a: bool, class: RegionClass) -> bool {
    match (op, from_a) {
        (BooleanOp::Union, true) => matches!(class, RegionClass::Outside | RegionClass::CoincidentSame),
        (BooleanOp::Union, false) => matches!(class, RegionClass::Outside),
        (BooleanOp::Difference, true) => {
            matches!(class, RegionClass::Outside | RegionClass::CoincidentOpposite)
        }
        (BooleanOp::Difference, false) => matches!(class, RegionClass::Inside),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Driver
// ─────────────────────────────────────────────────────────────────────────────

/// Combine `a` and `b` into a new shell.
pub(crate) fn boolean_shells(
    a: &Shell,
    b: &Shell,
    op: BooleanOp,
    ctx: &GeomContext,
) -> Result<(Shell, BooleanDiagnostics), BooleanError> {
    let tol = ctx.tolerance;
    let weld = tol.eps * 10.0;
    let mut diag = BooleanDiagnostics {
        op,
        ..BooleanDiagnostics::default()
    };

    if a.is_empty() || b.is_empty() {
        let source = match op {
            BooleanOp::Union if a.is_empty() => b,
            _ => a,
        };
        let mut out = Shell::new();
        out.make_from_copy_of(source);
        log::debug!("boolean {op}: empty operand, result has {} surfaces", out.surfaces.len());
        return Ok((out, diag));
    }

    let prep_a = prepare_shell(a, "A", ctx)?;
    let prep_b = prepare_shell(b, "B", ctx)?;
    diag.input_a_triangle_count = prep_a.tris.len();
    diag.input_b_triangle_count = prep_b.tris.len();

    let surfaces_a = a.surfaces.as_slice();
    let surfaces_b = b.surfaces.as_slice();

    // Triangle/triangle intersections, grouped by surface pair.
    let mut segments: HashMap<(usize, usize), Vec<Segment3>> = HashMap::new();
    if let Some(bvh_b) = prep_b.bvh.as_ref() {
        for (ia, &ta) in prep_a.tris.iter().enumerate() {
            bvh_b.query_bbox(ta.bbox().expand_tolerance(tol), |ib| {
                match triangle_triangle_intersection(ta, prep_b.tris[ib], tol) {
                    Some(TriTriIntersection::Segment(s)) if s.length_squared() > tol.eps_squared() => {
                        diag.intersection_segment_count += 1;
                        segments
                            .entry((prep_a.owner[ia], prep_b.owner[ib]))
                            .or_default()
                            .push(s);
                    }
                    Some(TriTriIntersection::Coplanar) => diag.coplanar_pair_count += 1,
                    _ => {}
                }
                ControlFlow::Continue(())
            });
        }
    }

    let boundary = |shell: &Shell, srf: &BezierSurface| -> Vec<Vec<Point3>> {
        srf.trims.iter().map(|tr| shell.trim_polyline_with(tr, tol)).collect()
    };
    let boundary_a: Vec<Vec<Vec<Point3>>> = surfaces_a.iter().map(|s| boundary(a, s)).collect();
    let boundary_b: Vec<Vec<Vec<Point3>>> = surfaces_b.iter().map(|s| boundary(b, s)).collect();

    let mut pairs: Vec<(usize, usize)> = segments.keys().copied().collect();
    pairs.sort_unstable();

    let mut cuts: Vec<Cut> = Vec::new();
    let mut junctions: Vec<Point3> = Vec::new();
    for (sa, sb) in pairs {
        let (srf_a, srf_b) = (&surfaces_a[sa], &surfaces_b[sb]);
        for (raw, closed) in chain_segments(&segments[&(sa, sb)], weld) {
            let on_a = !runs_along(&raw, closed, &boundary_a[sa], weld);
            let on_b = !runs_along(&raw, closed, &boundary_b[sb], weld);

            let mut pts = simplify_polyline(&raw, weld);
            let interior = if closed { 0..pts.len() } else { 1..pts.len().saturating_sub(1) };
            for i in interior {
                pts[i] = snap_to_both(pts[i], srf_a, srf_b, tol);
            }
            if !closed {
                let n = pts.len();
                for i in [0, n - 1] {
                    pts[i] = match junctions.iter().find(|j| j.distance_to(pts[i]) <= weld) {
                        Some(j) => *j,
                        None => {
                            junctions.push(pts[i]);
                            pts[i]
                        }
                    };
                }
            }

            if !on_a && !on_b {
                diag.boundary_curves_skipped += 1;
                continue;
            }

            // A keeps the side away from B's material, so its cut runs along n_B x n_A.
            let mut length = 0.0;
            let mut along = 0.0;
            let wrap = if closed { pts.first().copied() } else { None };
            for (p, q) in pts.windows(2).map(|w| (w[0], w[1])).chain(pts.last().copied().zip(wrap)) {
                let m = p.midpoint(q);
                if let (Some(na), Some(nb)) = (unit_normal_near(srf_a, m), unit_normal_near(srf_b, m)) {
                    along += (q - p).dot(nb.cross(na));
                }
                length += p.distance_to(q);
            }
            if length <= 0.0 || along.abs() <= 1e-3 * length {
                diag.tangent_curves_skipped += 1;
                continue;
            }
            if along < 0.0 {
                pts.reverse();
            }

            cuts.push(Cut {
                sa,
                sb,
                pts,
                closed,
                on_a,
                on_b,
            });
        }
    }
    diag.intersection_curve_count = cuts.len();

    let split_a = split_curves(a, &junctions, Tolerance::new(weld), &mut diag.split_point_count);
    let split_b = split_curves(b, &junctions, Tolerance::new(weld), &mut diag.split_point_count);

    log::debug!(
        "boolean {op}: {} segments, {} cuts, {} split points",
        diag.intersection_segment_count,
        cuts.len(),
        diag.split_point_count
    );

    // Assemble.
    let mut out = Shell::new();
    let mut piece_curves: HashMap<(bool, CurveHandle, usize), CurveHandle> = HashMap::new();
    let mut cut_curves: HashMap<usize, CurveHandle> = HashMap::new();

    for (from_a, shell, split, other) in [(true, a, &split_a, &prep_b), (false, b, &split_b, &prep_a)] {
        let source = if from_a {
            CurveSource::ShellA
        } else {
            CurveSource::ShellB
        };

        for (s, srf) in shell.surfaces.iter().enumerate() {
            let mut trims: Vec<TrimBy> = Vec::new();

            for tr in &srf.trims {
                for piece in trim_pieces(shell, tr, split, Tolerance::new(weld)) {
                    let (class, at) =
                        classify_piece(&piece.pts, srf, other, tol, &mut diag.indeterminate_retries);
                    diag.pieces_classified += 1;
                    if class == RegionClass::Indeterminate {
                        return Err(BooleanError::Ambiguous {
                            surface: srf.h,
                            point: at,
                        });
                    }
                    if !keep_piece(op, from_a, class) {
                        continue;
                    }
                    diag.pieces_kept += 1;

                    let h = *piece_curves
                        .entry((from_a, piece.curve, piece.index))
                        .or_insert_with(|| {
                            let whole = split.get(&piece.curve).is_some_and(|p| p.len() == 1);
                            let curve = match shell.curves.find(piece.curve) {
                                Some(c) if whole => c.clone().with_source(source),
                                _ => {
                                    let mut pts = piece.pts.clone();
                                    if piece.backwards {
                                        pts.reverse();
                                    }
                                    ShellCurve::from_points(pts, source)
                                }
                            };
                            out.curves.add_and_assign_id(curve)
                        });
                    trims.push(TrimBy {
                        curve: h,
                        backwards: piece.backwards,
                        start: piece.pts[0],
                        finish: piece.pts[piece.pts.len() - 1],
                    });
                }
            }

            let mut attached: Vec<usize> = Vec::new();
            for (k, cut) in cuts.iter().enumerate() {
                let mine = if from_a {
                    cut.sa == s && cut.on_a
                } else {
                    cut.sb == s && cut.on_b
                };
                if !mine {
                    continue;
                }
                if attached.iter().any(|&j| same_polyline(&cuts[j].pts, &cut.pts, weld)) {
                    diag.duplicate_cuts_skipped += 1;
                    continue;
                }

                // Attach only where one side is kept and the other dropped.
                let (left, at) = classify_piece(&cut.pts, srf, other, tol, &mut diag.indeterminate_retries);
                let reversed: Vec<Point3> = cut.pts.iter().rev().copied().collect();
                let (right, _) = classify_piece(&reversed, srf, other, tol, &mut diag.indeterminate_retries);
                if left == RegionClass::Indeterminate || right == RegionClass::Indeterminate {
                    return Err(BooleanError::Ambiguous {
                        surface: srf.h,
                        point: at,
                    });
                }
                let keep_left = keep_piece(op, from_a, left);
                if keep_left == keep_piece(op, from_a, right) {
                    diag.same_fate_cuts_skipped += 1;
                    continue;
                }
                attached.push(k);

                let h = *cut_curves.entry(k).or_insert_with(|| {
                    let mut pts = cut.pts.clone();
                    if cut.closed {
                        pts.push(pts[0]);
                    }
                    out.curves
                        .add_and_assign_id(ShellCurve::from_points(pts, CurveSource::Intersection))
                });
                // Kept region on the left, seen down the operand's own normal.
                let backwards = !keep_left;
                let first = cut.pts[0];
                let last = if cut.closed {
                    first
                } else {
                    cut.pts[cut.pts.len() - 1]
                };
                let (start, finish) = if backwards { (last, first) } else { (first, last) };
                trims.push(TrimBy {
                    curve: h,
                    backwards,
                    start,
                    finish,
                });
            }

            if trims.is_empty() {
                diag.surfaces_removed += 1;
                continue;
            }

            let mut kept = srf.clone();
            kept.trims = trims;
            if !from_a && op == BooleanOp::Difference {
                kept = kept.reversed();
                kept.flip_trims();
            }

            if let Err(SurfaceMeshError::OpenTrims { at, .. }) = out.trim_loops(&kept, tol) {
                let operand = if from_a { "A" } else { "B" };
                log::warn!("boolean {op}: trims of {} from shell {operand} do not close at {at}", srf.h);
                return Err(BooleanError::OpenTrims {
                    operand,
                    surface: srf.h,
                    at,
                });
            }
            out.surfaces.add_and_assign_id(kept);
        }
    }

    log::debug!(
        "boolean {op}: kept {} of {} pieces, {} surfaces in result, {} removed",
        diag.pieces_kept,
        diag.pieces_classified,
        out.surfaces.len(),
        diag.surfaces_removed
    );

    Ok((out, diag))
}

/// Same end points (either direction) and every vertex of `a` on `b`.
fn same_polyline(a: &[Point3], b: &[Point3], tol: f64) -> bool {
    let (Some(&a0), Some(&a1), Some(&b0), Some(&b1)) = (a.first(), a.last(), b.first(), b.last()) else {
        return false;
    };
    let close = |p: Point3, q: Point3| p.distance_to(q) <= tol;
    let ends = (close(a0, b0) && close(a1, b1)) || (close(a0, b1) && close(a1, b0));
    ends && a
        .iter()
        .all(|p| b.windows(2).any(|w| p.distance_to_segment(w[0], w[1]) <= tol))
}
