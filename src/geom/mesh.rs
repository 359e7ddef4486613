//! Triangle mesh artifact produced by the triangulator.
//!
//! Triangles are independent (no shared index buffer) and tagged with the face id
//! and color of the surface they came from, which is what renderers and pickers
//! consume.

use serde::{Deserialize, Serialize};

use super::core::{BBox, Point3, Tolerance, Vec3};
use super::diagnostics::MeshDiagnostics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    pub const RED: Self = Self::new(255, 0, 0, 255);
    pub const GREEN: Self = Self::new(0, 255, 0, 255);
    pub const BLUE: Self = Self::new(0, 0, 255, 255);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// From components in [0, 1]; out-of-range values are clamped.
    #[must_use]
    pub fn from_f32(r: f32, g: f32, b: f32, a: f32) -> Self {
        let c = |x: f32| (x.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::new(c(r), c(g), c(b), c(a))
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::WHITE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    pub a: Point3,
    pub b: Point3,
    pub c: Point3,
    /// Unit normal, consistent with the a-b-c winding.
    pub normal: Vec3,
    pub face: u32,
    pub color: Rgba,
}

impl Triangle {
    /// Triangle with its normal computed from the winding.
    #[must_use]
    pub fn new(a: Point3, b: Point3, c: Point3, face: u32, color: Rgba) -> Self {
        let normal = (b - a).cross(c - a).normalized().unwrap_or(Vec3::ZERO);
        Self {
            a,
            b,
            c,
            normal,
            face,
            color,
        }
    }

    #[must_use]
    pub fn area(&self) -> f64 {
        0.5 * (self.b - self.a).cross(self.c - self.a).length()
    }

    #[must_use]
    pub fn centroid(&self) -> Point3 {
        Point3::new(
            (self.a.x + self.b.x + self.c.x) / 3.0,
            (self.a.y + self.b.y + self.c.y) / 3.0,
            (self.a.z + self.b.z + self.c.z) / 3.0,
        )
    }

    /// Swap two vertices and negate the normal.
    pub fn flip(&mut self) {
        std::mem::swap(&mut self.b, &mut self.c);
        self.normal = -self.normal;
    }

    #[must_use]
    pub fn vertices(&self) -> [Point3; 3] {
        [self.a, self.b, self.c]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_triangle(&mut self, t: Triangle) {
        self.triangles.push(t);
    }

    pub fn append(&mut self, other: &mut Self) {
        self.triangles.append(&mut other.triangles);
    }

    pub fn clear(&mut self) {
        self.triangles.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    #[must_use]
    pub fn area(&self) -> f64 {
        self.triangles.iter().map(Triangle::area).sum()
    }

    /// Enclosed volume by the divergence theorem; positive for outward-facing
    /// closed meshes.
    #[must_use]
    pub fn signed_volume(&self) -> f64 {
        self.triangles
            .iter()
            .map(|t| t.a.to_vec3().dot(t.b.to_vec3().cross(t.c.to_vec3())) / 6.0)
            .sum()
    }

    #[must_use]
    pub fn bbox(&self) -> Option<BBox> {
        let pts: Vec<Point3> = self.triangles.iter().flat_map(Triangle::vertices).collect();
        BBox::from_points(&pts)
    }

    /// Triangles whose face id is listed, grouped in the order of `faces`.
    #[must_use]
    pub fn faces_subset(&self, faces: &[u32]) -> Self {
        let mut out = Self::new();
        for face in faces {
            out.triangles
                .extend(self.triangles.iter().filter(|t| t.face == *face).copied());
        }
        out
    }

    /// Distinct face ids in first-seen order.
    #[must_use]
    pub fn face_ids(&self) -> Vec<u32> {
        let mut out: Vec<u32> = Vec::new();
        for t in &self.triangles {
            if !out.contains(&t.face) {
                out.push(t.face);
            }
        }
        out
    }

    /// Topology report of the welded mesh (see [`MeshDiagnostics::from_mesh`]).
    #[must_use]
    pub fn diagnostics(&self, tol: Tolerance) -> MeshDiagnostics {
        MeshDiagnostics::from_mesh(self, tol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri(face: u32) -> Triangle {
        Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            face,
            Rgba::default(),
        )
    }

    #[test]
    fn normal_follows_winding() {
        let mut t = tri(0);
        assert_eq!(t.normal, Vec3::Z);
        t.flip();
        assert_eq!(t.normal, -Vec3::Z);
        assert!((t.area() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn faces_subset_follows_requested_order() {
        let mesh = Mesh {
            triangles: vec![tri(1), tri(2), tri(1), tri(3)],
        };
        let sub = mesh.faces_subset(&[3, 1]);
        let faces: Vec<u32> = sub.triangles.iter().map(|t| t.face).collect();
        assert_eq!(faces, vec![3, 1, 1]);
        assert_eq!(mesh.face_ids(), vec![1, 2, 3]);
    }

    #[test]
    fn color_from_unit_floats_clamps() {
        assert_eq!(Rgba::from_f32(1.5, 0.0, -1.0, 1.0), Rgba::new(255, 0, 0, 255));
    }
}
