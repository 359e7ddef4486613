//! Bounding-volume hierarchy over triangle boxes, used by the Boolean engine for
//! overlap, ray and nearest-triangle queries.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::ops::ControlFlow;

use super::core::{BBox, Point3, Vec3};

#[derive(Debug, Clone, Copy)]
struct Node {
    bbox: BBox,
    /// Inner nodes: child indices. Leaves: range into `order`.
    a: u32,
    b: u32,
    leaf: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct Bvh {
    nodes: Vec<Node>,
    order: Vec<u32>,
}

impl Bvh {
    const LEAF_SIZE: usize = 6;

    /// `None` for an empty input.
    #[must_use]
    pub(crate) fn build(boxes: &[BBox]) -> Option<Self> {
        if boxes.is_empty() {
            return None;
        }
        let mut bvh = Self {
            nodes: Vec::with_capacity(boxes.len() * 2),
            order: (0..boxes.len() as u32).collect(),
        };
        bvh.build_range(boxes, 0, boxes.len());
        Some(bvh)
    }

    fn build_range(&mut self, boxes: &[BBox], start: usize, end: usize) -> u32 {
        let index = self.nodes.len() as u32;
        let bbox = self.order[start + 1..end]
            .iter()
            .fold(boxes[self.order[start] as usize], |acc, &i| acc.union(boxes[i as usize]));
        self.nodes.push(Node {
            bbox,
            a: start as u32,
            b: end as u32,
            leaf: true,
        });

        if end - start <= Self::LEAF_SIZE {
            return index;
        }

        let axis = widest_centroid_axis(boxes, &self.order[start..end]);
        let mid = start + (end - start) / 2;
        self.order[start..end].select_nth_unstable_by(mid - start, |&x, &y| {
            axis_of(boxes[x as usize].center(), axis).total_cmp(&axis_of(boxes[y as usize].center(), axis))
        });

        let left = self.build_range(boxes, start, mid);
        let right = self.build_range(boxes, mid, end);
        self.nodes[index as usize] = Node {
            bbox,
            a: left,
            b: right,
            leaf: false,
        };
        index
    }

    fn walk<P, F>(&self, mut prune: P, mut visit: F)
    where
        P: FnMut(&BBox) -> bool,
        F: FnMut(usize) -> ControlFlow<()>,
    {
        let mut stack = vec![0u32];
        while let Some(i) = stack.pop() {
            let node = self.nodes[i as usize];
            if prune(&node.bbox) {
                continue;
            }
            if node.leaf {
                for &prim in &self.order[node.a as usize..node.b as usize] {
                    if visit(prim as usize).is_break() {
                        return;
                    }
                }
            } else {
                stack.push(node.a);
                stack.push(node.b);
            }
        }
    }

    /// Visit every primitive whose box overlaps `query`.
    pub(crate) fn query_bbox<F>(&self, query: BBox, visit: F)
    where
        F: FnMut(usize) -> ControlFlow<()>,
    {
        self.walk(|b| !b.intersects(query), visit);
    }

    /// Visit every primitive whose box the ray `origin + t * dir`, `t` in
    /// `[0, t_max]`, passes through.
    pub(crate) fn query_ray<F>(&self, origin: Point3, dir: Vec3, t_max: f64, visit: F)
    where
        F: FnMut(usize) -> ControlFlow<()>,
    {
        self.walk(|b| !ray_hits_box(origin, dir, *b, t_max), visit);
    }

    /// Closest primitive to `point` by the caller's squared-distance function,
    /// considering only primitives closer than `max_dist2`.
    pub(crate) fn nearest<F>(&self, point: Point3, max_dist2: f64, mut dist2: F) -> Option<(usize, f64)>
    where
        F: FnMut(usize) -> f64,
    {
        let mut best: Option<(usize, f64)> = None;
        let mut limit = max_dist2;
        let mut heap = BinaryHeap::new();
        heap.push(Pending {
            dist2: box_dist2(self.nodes[0].bbox, point),
            node: 0,
        });

        while let Some(Pending { dist2: d, node }) = heap.pop() {
            if d > limit {
                break;
            }
            let n = self.nodes[node as usize];
            if n.leaf {
                for &prim in &self.order[n.a as usize..n.b as usize] {
                    let dp = dist2(prim as usize);
                    if dp.is_finite() && dp <= limit {
                        limit = dp;
                        best = Some((prim as usize, dp));
                    }
                }
                continue;
            }
            for child in [n.a, n.b] {
                let dc = box_dist2(self.nodes[child as usize].bbox, point);
                if dc <= limit {
                    heap.push(Pending { dist2: dc, node: child });
                }
            }
        }
        best
    }
}

fn axis_of(p: Point3, axis: usize) -> f64 {
    match axis {
        0 => p.x,
        1 => p.y,
        _ => p.z,
    }
}

fn widest_centroid_axis(boxes: &[BBox], prims: &[u32]) -> usize {
    let mut lo = [f64::INFINITY; 3];
    let mut hi = [f64::NEG_INFINITY; 3];
    for &i in prims {
        let c = boxes[i as usize].center();
        for (k, v) in [c.x, c.y, c.z].into_iter().enumerate() {
            lo[k] = lo[k].min(v);
            hi[k] = hi[k].max(v);
        }
    }
    let ext = [hi[0] - lo[0], hi[1] - lo[1], hi[2] - lo[2]];
    if ext[0] >= ext[1] && ext[0] >= ext[2] {
        0
    } else if ext[1] >= ext[2] {
        1
    } else {
        2
    }
}

/// Slab test.
fn ray_hits_box(origin: Point3, dir: Vec3, bbox: BBox, t_max: f64) -> bool {
    let mut t0 = 0.0_f64;
    let mut t1 = t_max;
    for axis in 0..3 {
        let o = axis_of(origin, axis);
        let d = axis_of(Point3::from(dir), axis);
        let (lo, hi) = (axis_of(bbox.min, axis), axis_of(bbox.max, axis));
        if d.abs() <= 1e-15 {
            if o < lo || o > hi {
                return false;
            }
            continue;
        }
        let (mut ta, mut tb) = ((lo - o) / d, (hi - o) / d);
        if ta > tb {
            std::mem::swap(&mut ta, &mut tb);
        }
        t0 = t0.max(ta);
        t1 = t1.min(tb);
        if t1 < t0 {
            return false;
        }
    }
    true
}

fn box_dist2(bbox: BBox, p: Point3) -> f64 {
    (0..3)
        .map(|axis| {
            let v = axis_of(p, axis);
            let (lo, hi) = (axis_of(bbox.min, axis), axis_of(bbox.max, axis));
            let d = if v < lo {
                lo - v
            } else if v > hi {
                v - hi
            } else {
                0.0
            };
            d * d
        })
        .sum()
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    dist2: f64,
    node: u32,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so BinaryHeap pops the nearest node first.
        other
            .dist2
            .total_cmp(&self.dist2)
            .then_with(|| self.node.cmp(&other.node))
    }
}
