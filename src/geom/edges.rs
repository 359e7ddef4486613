//! Edge and point artifacts handed to renderers and exporters.

use serde::{Deserialize, Serialize};

use super::core::{Point3, Tolerance};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub a: Point3,
    pub b: Point3,
}

impl Edge {
    #[must_use]
    pub const fn new(a: Point3, b: Point3) -> Self {
        Self { a, b }
    }

    #[must_use]
    pub fn length(&self) -> f64 {
        self.a.distance_to(self.b)
    }

    #[must_use]
    pub fn reversed(&self) -> Self {
        Self::new(self.b, self.a)
    }

    /// Same end points in either order.
    #[must_use]
    pub fn is_same_as(&self, other: &Self, tol: Tolerance) -> bool {
        (tol.approx_eq_point3(self.a, other.a) && tol.approx_eq_point3(self.b, other.b))
            || (tol.approx_eq_point3(self.a, other.b) && tol.approx_eq_point3(self.b, other.a))
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:.6}, {:.6}, {:.6}) -> ({:.6}, {:.6}, {:.6})",
            self.a.x, self.a.y, self.a.z, self.b.x, self.b.y, self.b.z
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeList {
    pub edges: Vec<Edge>,
}

impl EdgeList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, a: Point3, b: Point3) {
        self.edges.push(Edge::new(a, b));
    }

    /// Add one edge per consecutive pair of `pts`.
    pub fn add_polyline(&mut self, pts: &[Point3]) {
        for w in pts.windows(2) {
            self.add_edge(w[0], w[1]);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn clear(&mut self) {
        self.edges.clear();
    }

    #[must_use]
    pub fn total_length(&self) -> f64 {
        self.edges.iter().map(Edge::length).sum()
    }

    /// Edges with duplicates (in either direction) removed, first occurrence kept.
    #[must_use]
    pub fn distinct(&self, tol: Tolerance) -> Self {
        let mut out = Self::new();
        for e in &self.edges {
            if !out.edges.iter().any(|o| o.is_same_as(e, tol)) {
                out.edges.push(*e);
            }
        }
        out
    }

    /// Unique end points, for vertex markers.
    #[must_use]
    pub fn points(&self, tol: Tolerance) -> PointList {
        let mut out = PointList::new();
        for e in &self.edges {
            out.add_unique(e.a, tol);
            out.add_unique(e.b, tol);
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointList {
    pub points: Vec<Point3>,
}

impl PointList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_point(&mut self, p: Point3) {
        self.points.push(p);
    }

    /// Push `p` unless a point within `tol` is already present.
    pub fn add_unique(&mut self, p: Point3, tol: Tolerance) {
        if !self.points.iter().any(|q| tol.approx_eq_point3(*q, p)) {
            self.points.push(p);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}
