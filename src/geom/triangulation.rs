//! Constrained triangulation of trim regions in parameter space.
//!
//! The region's outer loop and holes are ear-clipped (holes are first bridged into
//! the outer ring). Boundary edges are constraints: no vertex is ever added to or
//! removed from them, so two surfaces that share a trim curve produce matching
//! triangle edges along it. Interior sample points are then inserted one at a time
//! with Lawson flips that never touch a constrained edge.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::core::Tolerance;
use super::trim::{TrimRegion, UvPoint};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TriangulationError {
    #[error("triangulation vertices must be finite")]
    NonFinite,
    #[error("trim region outer loop must have at least 3 points")]
    OuterTooSmall,
    #[error("trim region degenerates after filtering")]
    Degenerate,
    #[error("failed to find a bridge from hole to outer loop")]
    NoBridge,
    #[error("failed to triangulate polygon (no ears found, {remaining} vertices left)")]
    NoEars { remaining: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriangulationOptions {
    /// Interior samples closer than this (in uv) to any boundary edge are dropped.
    pub steiner_clearance: f64,
    /// Cap on Lawson flips per inserted point.
    pub max_flips_per_point: usize,
}

impl Default for TriangulationOptions {
    fn default() -> Self {
        Self {
            steiner_clearance: 0.0,
            max_flips_per_point: 256,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriangulationDiagnostics {
    pub input_vertex_count: usize,
    pub output_triangle_count: usize,
    /// Zero-area triangles emitted to clip collinear boundary vertices.
    pub sliver_triangles: usize,
    pub steiner_points_inserted: usize,
    pub steiner_points_rejected: usize,
    pub edge_flips: usize,
    /// Surfaces left out of a shell mesh because their trims could not be meshed.
    pub skipped_surfaces: usize,
    pub warnings: Vec<String>,
}

impl TriangulationDiagnostics {
    pub fn merge(&mut self, other: &Self) {
        self.input_vertex_count += other.input_vertex_count;
        self.output_triangle_count += other.output_triangle_count;
        self.sliver_triangles += other.sliver_triangles;
        self.steiner_points_inserted += other.steiner_points_inserted;
        self.steiner_points_rejected += other.steiner_points_rejected;
        self.edge_flips += other.edge_flips;
        self.skipped_surfaces += other.skipped_surfaces;
        self.warnings.extend(other.warnings.iter().cloned());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriangulationResult {
    /// Outer loop points, then each hole's points, then inserted samples.
    pub vertices: Vec<UvPoint>,
    /// Number of leading `vertices` that come from the region's loops.
    pub boundary_count: usize,
    /// Counter-clockwise index triples.
    pub indices: Vec<u32>,
    pub diagnostics: TriangulationDiagnostics,
}

impl TriangulationResult {
    pub fn triangles(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|t| [t[0] as usize, t[1] as usize, t[2] as usize])
    }
}

#[derive(Debug, Clone, Copy)]
struct Node {
    idx: u32,
    point: UvPoint,
    prev: usize,
    next: usize,
    removed: bool,
}

/// Ear-clip `region` without interior samples.
///
/// # Errors
/// See [`TriangulationError`].
pub fn triangulate_trim_region(
    region: &TrimRegion,
    tol: Tolerance,
) -> Result<TriangulationResult, TriangulationError> {
    triangulate_trim_region_with_steiner_points(region, &[], tol, TriangulationOptions::default())
}

/// Ear-clip `region`, then insert `steiner_points` that fall inside it.
///
/// Samples outside the region, within `options.steiner_clearance` of its boundary,
/// or on a constrained edge are rejected and counted in the diagnostics.
///
/// # Errors
/// See [`TriangulationError`].
pub fn triangulate_trim_region_with_steiner_points(
    region: &TrimRegion,
    steiner_points: &[UvPoint],
    tol: Tolerance,
    options: TriangulationOptions,
) -> Result<TriangulationResult, TriangulationError> {
    let mut vertices = Vec::new();
    vertices.extend_from_slice(region.outer.points());
    for hole in &region.holes {
        vertices.extend_from_slice(hole.points());
    }

    if vertices.iter().any(|p| !p.is_finite()) {
        return Err(TriangulationError::NonFinite);
    }

    let mut diagnostics = TriangulationDiagnostics {
        input_vertex_count: vertices.len(),
        ..TriangulationDiagnostics::default()
    };

    let mut nodes: Vec<Node> = Vec::new();
    let mut constrained: HashSet<(usize, usize)> = HashSet::new();

    let outer_len = region.outer.points().len();
    if outer_len < 3 {
        return Err(TriangulationError::OuterTooSmall);
    }
    add_ring_constraints(&mut constrained, 0, outer_len);

    let outer_start = build_ring_nodes(&mut nodes, 0, outer_len as u32, &vertices);
    let mut outer_start =
        filter_ring_points(outer_start, &mut nodes, tol).ok_or(TriangulationError::Degenerate)?;

    let mut hole_starts = Vec::new();
    let mut cursor = outer_len as u32;
    for hole in &region.holes {
        let len = hole.points().len();
        add_ring_constraints(&mut constrained, cursor as usize, len);
        if len >= 3 {
            let start = build_ring_nodes(&mut nodes, cursor, cursor + len as u32, &vertices);
            if let Some(filtered) = filter_ring_points(start, &mut nodes, tol) {
                hole_starts.push(filtered);
            }
        }
        cursor += len as u32;
    }

    let mut hole_lefts: Vec<usize> = hole_starts
        .into_iter()
        .map(|start| leftmost_node(start, &nodes))
        .collect();
    hole_lefts.sort_by(|&a, &b| {
        let pa = nodes[a].point;
        let pb = nodes[b].point;
        pa.u.total_cmp(&pb.u).then_with(|| pa.v.total_cmp(&pb.v))
    });

    for hole_left in hole_lefts {
        let bridge = find_hole_bridge(hole_left, outer_start, &nodes, tol)
            .ok_or(TriangulationError::NoBridge)?;
        split_polygon(bridge, hole_left, &mut nodes);
        outer_start =
            filter_ring_points(outer_start, &mut nodes, tol).ok_or(TriangulationError::Degenerate)?;
    }

    let boundary_count = vertices.len();
    let clipped = earclip_polygon(outer_start, &mut nodes, tol, &mut diagnostics)?;
    let tris: Vec<[usize; 3]> = clipped
        .into_iter()
        .filter(|t| t[0] != t[1] && t[1] != t[2] && t[0] != t[2])
        .map(|t| [t[0] as usize, t[1] as usize, t[2] as usize])
        .collect();

    let mut mesh = Mesh2d::new(vertices, tris, constrained);
    for &p in steiner_points {
        if !p.is_finite()
            || !region.contains(p, tol)
            || region.distance_to_boundary(p) < options.steiner_clearance.max(tol.eps)
        {
            diagnostics.steiner_points_rejected += 1;
            continue;
        }
        match mesh.insert(p, tol, options.max_flips_per_point) {
            Some(flips) => {
                diagnostics.steiner_points_inserted += 1;
                diagnostics.edge_flips += flips;
            }
            None => diagnostics.steiner_points_rejected += 1,
        }
    }

    let indices: Vec<u32> = mesh
        .tris
        .iter()
        .flat_map(|t| t.iter().map(|&i| i as u32))
        .collect();
    diagnostics.output_triangle_count = indices.len() / 3;

    Ok(TriangulationResult {
        vertices: mesh.pts,
        boundary_count,
        indices,
        diagnostics,
    })
}

fn add_ring_constraints(set: &mut HashSet<(usize, usize)>, start: usize, len: usize) {
    for i in 0..len {
        let a = start + i;
        let b = start + (i + 1) % len;
        set.insert((a.min(b), a.max(b)));
    }
}

// ============================================================================
// Ear clipping
// ============================================================================

fn build_ring_nodes(nodes: &mut Vec<Node>, start: u32, end: u32, vertices: &[UvPoint]) -> usize {
    let start_idx = nodes.len();
    let len = (end - start) as usize;
    for i in 0..len {
        let idx = start + i as u32;
        nodes.push(Node {
            idx,
            point: vertices[idx as usize],
            prev: 0,
            next: 0,
            removed: false,
        });
    }

    for i in 0..len {
        let current = start_idx + i;
        nodes[current].prev = start_idx + ((i + len - 1) % len);
        nodes[current].next = start_idx + ((i + 1) % len);
    }

    start_idx
}

fn ring_len(start: usize, nodes: &[Node]) -> usize {
    let mut count = 0usize;
    let mut cur = start;
    loop {
        count += 1;
        cur = nodes[cur].next;
        if cur == start || count > nodes.len().saturating_add(1) {
            break;
        }
    }
    count
}

/// Drop coincident neighbours. Collinear vertices stay: they are shared with the
/// neighbouring surface's boundary.
fn filter_ring_points(start: usize, nodes: &mut [Node], tol: Tolerance) -> Option<usize> {
    if ring_len(start, nodes) < 3 {
        return None;
    }

    let mut start = start;
    let mut cur = start;
    let mut guard = 0usize;

    loop {
        guard += 1;
        if guard > nodes.len().saturating_mul(4).max(16) {
            break;
        }

        let next = nodes[cur].next;
        if cur == next {
            break;
        }

        if approx_eq_uv(nodes[cur].point, nodes[next].point, tol) {
            if next == start {
                start = cur;
            }
            remove_node(next, nodes);
            if ring_len(start, nodes) < 3 {
                return None;
            }
            continue;
        }

        cur = next;
        if cur == start {
            break;
        }
    }

    Some(start)
}

fn leftmost_node(start: usize, nodes: &[Node]) -> usize {
    let mut left = start;
    let mut cur = nodes[start].next;
    while cur != start {
        let a = nodes[cur].point;
        let b = nodes[left].point;
        if a.u < b.u || (a.u == b.u && a.v < b.v) {
            left = cur;
        }
        cur = nodes[cur].next;
    }
    left
}

fn find_hole_bridge(hole: usize, outer_start: usize, nodes: &[Node], tol: Tolerance) -> Option<usize> {
    let hole_p = nodes[hole].point;
    let mut best_x = f64::NEG_INFINITY;
    let mut best_edge = None;

    let mut p = outer_start;
    loop {
        let q = nodes[p].next;
        let a = nodes[p].point;
        let b = nodes[q].point;

        if (a.v > hole_p.v) != (b.v > hole_p.v) {
            let denom = b.v - a.v;
            if denom != 0.0 {
                let t = (hole_p.v - a.v) / denom;
                let x = a.u + t * (b.u - a.u);
                if x <= hole_p.u + tol.eps && x > best_x {
                    best_x = x;
                    best_edge = Some((p, q));
                }
            }
        }

        p = q;
        if p == outer_start {
            break;
        }
    }

    if let Some((e0, e1)) = best_edge {
        let candidates = if nodes[e0].point.u < nodes[e1].point.u {
            [e0, e1]
        } else {
            [e1, e0]
        };
        for cand in candidates {
            if is_visible(hole_p, nodes[cand].point, cand, outer_start, nodes, tol) {
                return Some(cand);
            }
        }
    }

    let mut best = None;
    let mut best_dist2 = f64::INFINITY;

    let mut v = outer_start;
    loop {
        let p = nodes[v].point;
        if p.u <= hole_p.u + tol.eps && is_visible(hole_p, p, v, outer_start, nodes, tol) {
            let d2 = p.distance_squared(hole_p);
            if d2 < best_dist2 {
                best_dist2 = d2;
                best = Some(v);
            }
        }

        v = nodes[v].next;
        if v == outer_start {
            break;
        }
    }

    best
}

fn split_polygon(a: usize, b: usize, nodes: &mut Vec<Node>) {
    let a_next = nodes[a].next;
    let b_prev = nodes[b].prev;

    let a2 = nodes.len();
    nodes.push(Node {
        idx: nodes[a].idx,
        point: nodes[a].point,
        prev: 0,
        next: 0,
        removed: false,
    });

    let b2 = nodes.len();
    nodes.push(Node {
        idx: nodes[b].idx,
        point: nodes[b].point,
        prev: 0,
        next: 0,
        removed: false,
    });

    nodes[a].next = b;
    nodes[b].prev = a;

    nodes[b_prev].next = b2;
    nodes[b2].prev = b_prev;

    nodes[b2].next = a2;
    nodes[a2].prev = b2;

    nodes[a2].next = a_next;
    nodes[a_next].prev = a2;
}

fn earclip_polygon(
    start: usize,
    nodes: &mut Vec<Node>,
    tol: Tolerance,
    diagnostics: &mut TriangulationDiagnostics,
) -> Result<Vec<[u32; 3]>, TriangulationError> {
    let mut start = filter_ring_points(start, nodes, tol).ok_or(TriangulationError::Degenerate)?;

    let is_ccw = signed_area_ring(start, nodes) > 0.0;
    let mut remaining = ring_len(start, nodes);
    if remaining < 3 {
        return Err(TriangulationError::Degenerate);
    }

    let mut ear = start;
    let mut stop = start;
    let mut triangles = Vec::with_capacity(remaining.saturating_sub(2));

    while remaining > 2 {
        let prev = nodes[ear].prev;
        let next = nodes[ear].next;
        if is_ear(prev, ear, next, nodes, is_ccw, tol) {
            push_oriented(&mut triangles, nodes, [prev, ear, next], is_ccw);

            if ear == start {
                start = next;
            }
            remove_node(ear, nodes);
            remaining -= 1;
            ear = next;
            stop = next;
            continue;
        }

        ear = next;
        if ear != stop {
            continue;
        }

        // A full pass without an ear: clip a straight (collinear) vertex as a
        // zero-area triangle, which keeps both boundary edges in the mesh.
        if let Some(flat) = find_collinear_node(start, nodes, tol) {
            let (p, n) = (nodes[flat].prev, nodes[flat].next);
            push_oriented(&mut triangles, nodes, [p, flat, n], is_ccw);
            diagnostics.sliver_triangles += 1;
            if flat == start {
                start = n;
            }
            remove_node(flat, nodes);
            remaining -= 1;
            ear = n;
            stop = n;
            continue;
        }

        if signed_area_ring(start, nodes).abs() <= tol.eps * tol.eps {
            break;
        }
        return Err(TriangulationError::NoEars { remaining });
    }

    Ok(triangles)
}

fn push_oriented(out: &mut Vec<[u32; 3]>, nodes: &[Node], [a, b, c]: [usize; 3], is_ccw: bool) {
    if is_ccw {
        out.push([nodes[a].idx, nodes[b].idx, nodes[c].idx]);
    } else {
        out.push([nodes[a].idx, nodes[c].idx, nodes[b].idx]);
    }
}

fn find_collinear_node(start: usize, nodes: &[Node], tol: Tolerance) -> Option<usize> {
    let mut cur = start;
    loop {
        let (p, n) = (nodes[cur].prev, nodes[cur].next);
        if line_distance(nodes[p].point, nodes[n].point, nodes[cur].point) <= tol.eps {
            return Some(cur);
        }
        cur = n;
        if cur == start {
            return None;
        }
    }
}

fn is_ear(prev: usize, ear: usize, next: usize, nodes: &[Node], is_ccw: bool, tol: Tolerance) -> bool {
    let a = nodes[prev].point;
    let b = nodes[ear].point;
    let c = nodes[next].point;

    let cross = orient2d(a, b, c);
    if line_distance(a, c, b) <= tol.eps {
        return false;
    }

    if is_ccw {
        if cross <= 0.0 {
            return false;
        }
    } else if cross >= 0.0 {
        return false;
    }

    let mut p = nodes[next].next;
    let mut guard = 0usize;
    while p != prev {
        guard += 1;
        if guard > nodes.len().saturating_add(1) {
            break;
        }
        let pt = nodes[p].point;
        let is_corner = approx_eq_uv(pt, a, tol) || approx_eq_uv(pt, b, tol) || approx_eq_uv(pt, c, tol);
        if !is_corner && point_in_triangle(a, b, c, pt, is_ccw, tol) {
            let prev_p = nodes[p].prev;
            let next_p = nodes[p].next;
            let cross_p = orient2d(nodes[prev_p].point, pt, nodes[next_p].point);
            let is_reflex = if is_ccw {
                cross_p <= tol.eps
            } else {
                cross_p >= -tol.eps
            };
            if is_reflex {
                return false;
            }
        }
        p = nodes[p].next;
    }

    true
}

fn signed_area_ring(start: usize, nodes: &[Node]) -> f64 {
    let mut area = 0.0;
    let mut p = start;
    loop {
        let q = nodes[p].next;
        let a = nodes[p].point;
        let b = nodes[q].point;
        area += a.u * b.v - b.u * a.v;
        p = q;
        if p == start {
            break;
        }
    }
    0.5 * area
}

fn remove_node(node: usize, nodes: &mut [Node]) {
    let prev = nodes[node].prev;
    let next = nodes[node].next;
    nodes[prev].next = next;
    nodes[next].prev = prev;
    nodes[node].removed = true;
}

fn is_visible(
    a: UvPoint,
    b: UvPoint,
    b_node: usize,
    ring_start: usize,
    nodes: &[Node],
    tol: Tolerance,
) -> bool {
    let mut e = ring_start;
    loop {
        let n = nodes[e].next;
        if e != b_node && n != b_node {
            let c = nodes[e].point;
            let d = nodes[n].point;
            if segments_intersect(a, b, c, d, tol) {
                return false;
            }
        }

        e = n;
        if e == ring_start {
            break;
        }
    }
    true
}

// ============================================================================
// Steiner insertion
// ============================================================================

/// Counter-clockwise triangles with directed-edge adjacency.
struct Mesh2d {
    pts: Vec<UvPoint>,
    tris: Vec<[usize; 3]>,
    /// Directed edge -> triangle that has it in its winding.
    owner: HashMap<(usize, usize), usize>,
    /// Undirected boundary edges.
    constrained: HashSet<(usize, usize)>,
}

enum Location {
    Inside(usize),
    OnEdge(usize, usize),
}

impl Mesh2d {
    fn new(pts: Vec<UvPoint>, tris: Vec<[usize; 3]>, constrained: HashSet<(usize, usize)>) -> Self {
        let mut mesh = Self {
            pts,
            tris: Vec::with_capacity(tris.len()),
            owner: HashMap::new(),
            constrained,
        };
        for t in tris {
            mesh.push(t);
        }
        mesh
    }

    fn push(&mut self, t: [usize; 3]) -> usize {
        let idx = self.tris.len();
        self.tris.push(t);
        self.own(idx);
        idx
    }

    fn replace(&mut self, idx: usize, t: [usize; 3]) {
        let old = self.tris[idx];
        for k in 0..3 {
            let e = (old[k], old[(k + 1) % 3]);
            if self.owner.get(&e) == Some(&idx) {
                self.owner.remove(&e);
            }
        }
        self.tris[idx] = t;
        self.own(idx);
    }

    fn own(&mut self, idx: usize) {
        let t = self.tris[idx];
        for k in 0..3 {
            self.owner.insert((t[k], t[(k + 1) % 3]), idx);
        }
    }

    fn is_constrained(&self, a: usize, b: usize) -> bool {
        self.constrained.contains(&(a.min(b), a.max(b)))
    }

    fn locate(&self, p: UvPoint, tol: Tolerance) -> Option<Location> {
        for (i, t) in self.tris.iter().enumerate() {
            let (a, b, c) = (self.pts[t[0]], self.pts[t[1]], self.pts[t[2]]);
            let d = [
                signed_distance(a, b, p),
                signed_distance(b, c, p),
                signed_distance(c, a, p),
            ];
            if d.iter().any(|&x| x < -tol.eps) {
                continue;
            }
            let on: Vec<usize> = (0..3).filter(|&k| d[k] <= tol.eps).collect();
            return match on.as_slice() {
                [] => Some(Location::Inside(i)),
                [k] => Some(Location::OnEdge(t[*k], t[(*k + 1) % 3])),
                // Coincides with an existing vertex.
                _ => None,
            };
        }
        None
    }

    /// Insert `p`, returning the number of flips, or `None` if `p` was rejected.
    fn insert(&mut self, p: UvPoint, tol: Tolerance, max_flips: usize) -> Option<usize> {
        let location = self.locate(p, tol)?;
        let pi = self.pts.len();
        let mut stack: Vec<(usize, usize)> = Vec::new();

        match location {
            Location::Inside(t) => {
                self.pts.push(p);
                let [a, b, c] = self.tris[t];
                self.replace(t, [a, b, pi]);
                self.push([b, c, pi]);
                self.push([c, a, pi]);
                stack.extend([(a, b), (b, c), (c, a)]);
            }
            Location::OnEdge(a, b) => {
                if self.is_constrained(a, b) {
                    return None;
                }
                let t = *self.owner.get(&(a, b))?;
                let u = *self.owner.get(&(b, a))?;
                let c = opposite(self.tris[t], a, b);
                let d = opposite(self.tris[u], b, a);
                self.pts.push(p);
                self.replace(t, [a, pi, c]);
                self.push([pi, b, c]);
                self.replace(u, [b, pi, d]);
                self.push([pi, a, d]);
                stack.extend([(b, c), (c, a), (a, d), (d, b)]);
            }
        }

        let mut flips = 0usize;
        while let Some((x, y)) = stack.pop() {
            if flips >= max_flips {
                break;
            }
            if self.is_constrained(x, y) {
                continue;
            }
            let (Some(&t1), Some(&t2)) = (self.owner.get(&(x, y)), self.owner.get(&(y, x))) else {
                continue;
            };
            let q = opposite(self.tris[t2], y, x);
            let (px, py, pp, pq) = (self.pts[x], self.pts[y], self.pts[pi], self.pts[q]);
            if !in_circle(px, py, pp, pq) {
                continue;
            }
            if orient2d(px, pq, pp) <= 0.0 || orient2d(pq, py, pp) <= 0.0 {
                continue;
            }
            self.replace(t1, [x, q, pi]);
            self.replace(t2, [q, y, pi]);
            flips += 1;
            stack.push((x, q));
            stack.push((q, y));
        }
        Some(flips)
    }
}

fn opposite(t: [usize; 3], a: usize, b: usize) -> usize {
    t.into_iter().find(|&v| v != a && v != b).unwrap_or(t[0])
}

// ============================================================================
// Predicates
// ============================================================================

fn approx_eq_uv(a: UvPoint, b: UvPoint, tol: Tolerance) -> bool {
    (a.u - b.u).abs() <= tol.eps && (a.v - b.v).abs() <= tol.eps
}

/// Twice the signed area of `a, b, c`; positive when counter-clockwise.
fn orient2d(a: UvPoint, b: UvPoint, c: UvPoint) -> f64 {
    (b.u - a.u) * (c.v - a.v) - (b.v - a.v) * (c.u - a.u)
}

/// Sign of an orientation value, zero within `tol`.
fn side(o: f64, tol: Tolerance) -> i8 {
    if o > tol.eps {
        1
    } else if o < -tol.eps {
        -1
    } else {
        0
    }
}

/// Distance of `p` left of the line `a -> b`. Zero for a degenerate line.
fn signed_distance(a: UvPoint, b: UvPoint, p: UvPoint) -> f64 {
    let len = a.distance(b);
    if len <= 0.0 {
        return 0.0;
    }
    orient2d(a, b, p) / len
}

/// Unsigned distance of `p` from the line through `a` and `b`, or from `a` when
/// they coincide.
fn line_distance(a: UvPoint, b: UvPoint, p: UvPoint) -> f64 {
    let len = a.distance(b);
    if !len.is_finite() || len <= 0.0 {
        return p.distance(a);
    }
    signed_distance(a, b, p).abs()
}

/// `p` inside or on triangle `a, b, c` wound as `is_ccw` says.
fn point_in_triangle(a: UvPoint, b: UvPoint, c: UvPoint, p: UvPoint, is_ccw: bool, tol: Tolerance) -> bool {
    let wanted = if is_ccw { -1 } else { 1 };
    [orient2d(a, b, p), orient2d(b, c, p), orient2d(c, a, p)]
        .into_iter()
        .all(|o| side(o, tol) != wanted)
}

/// Closed segments `a-b` and `c-d` touch or cross.
fn segments_intersect(a: UvPoint, b: UvPoint, c: UvPoint, d: UvPoint, tol: Tolerance) -> bool {
    let (o1, o2) = (orient2d(a, b, c), orient2d(a, b, d));
    let (o3, o4) = (orient2d(c, d, a), orient2d(c, d, b));

    let touching = [(o1, c, a, b), (o2, d, a, b), (o3, a, c, d), (o4, b, c, d)]
        .into_iter()
        .any(|(o, p, s, e)| side(o, tol) == 0 && in_span(s, e, p, tol));
    touching || (side(o1, tol) * side(o2, tol) < 0 && side(o3, tol) * side(o4, tol) < 0)
}

/// `p` within the bounding box of `a` and `b`, grown by `tol`.
fn in_span(a: UvPoint, b: UvPoint, p: UvPoint, tol: Tolerance) -> bool {
    let within = |x: f64, lo: f64, hi: f64| x >= lo.min(hi) - tol.eps && x <= lo.max(hi) + tol.eps;
    within(p.u, a.u, b.u) && within(p.v, a.v, b.v)
}

/// `d` strictly inside the circumcircle of counter-clockwise `a, b, c`.
fn in_circle(a: UvPoint, b: UvPoint, c: UvPoint, d: UvPoint) -> bool {
    let (adx, ady) = (a.u - d.u, a.v - d.v);
    let (bdx, bdy) = (b.u - d.u, b.v - d.v);
    let (cdx, cdy) = (c.u - d.u, c.v - d.v);
    let ad = adx * adx + ady * ady;
    let bd = bdx * bdx + bdy * bdy;
    let cd = cdx * cdx + cdy * cdy;
    let det = adx * (bdy * cd - bd * cdy) - ady * (bdx * cd - bd * cdx) + ad * (bdx * cdy - bdy * cdx);
    det > 1e-18
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uv(u: f64, v: f64) -> UvPoint {
        UvPoint::new(u, v)
    }

    #[test]
    fn segment_predicates() {
        let tol = Tolerance::new(1e-9);
        // Crossing, touching at an end, collinear overlap, collinear gap, parallel.
        assert!(segments_intersect(uv(0.0, 0.0), uv(1.0, 1.0), uv(0.0, 1.0), uv(1.0, 0.0), tol));
        assert!(segments_intersect(uv(0.0, 0.0), uv(1.0, 0.0), uv(1.0, 0.0), uv(1.0, 1.0), tol));
        assert!(segments_intersect(uv(0.0, 0.0), uv(2.0, 0.0), uv(1.0, 0.0), uv(3.0, 0.0), tol));
        assert!(!segments_intersect(uv(0.0, 0.0), uv(1.0, 0.0), uv(2.0, 0.0), uv(3.0, 0.0), tol));
        assert!(!segments_intersect(uv(0.0, 0.0), uv(1.0, 0.0), uv(0.0, 1.0), uv(1.0, 1.0), tol));

        assert!((line_distance(uv(0.0, 0.0), uv(2.0, 0.0), uv(1.0, -3.0)) - 3.0).abs() < 1e-12);
        assert!((line_distance(uv(1.0, 1.0), uv(1.0, 1.0), uv(4.0, 5.0)) - 5.0).abs() < 1e-12);
        assert!(signed_distance(uv(0.0, 0.0), uv(2.0, 0.0), uv(1.0, -3.0)) < 0.0);
    }

    #[test]
    fn point_in_triangle_follows_winding() {
        let tol = Tolerance::new(1e-9);
        let (a, b, c) = (uv(0.0, 0.0), uv(1.0, 0.0), uv(0.0, 1.0));
        assert!(point_in_triangle(a, b, c, uv(0.25, 0.25), true, tol));
        assert!(point_in_triangle(a, b, c, uv(0.5, 0.0), true, tol));
        assert!(!point_in_triangle(a, b, c, uv(0.75, 0.75), true, tol));
        assert!(point_in_triangle(a, c, b, uv(0.25, 0.25), false, tol));
        assert!(!point_in_triangle(a, c, b, uv(0.25, 0.25), true, tol));
    }
}
