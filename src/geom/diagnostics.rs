//! Mesh topology diagnostics.
//!
//! A triangulated closed shell should weld into a watertight, manifold, consistently
//! oriented mesh: every edge shared by exactly two triangles that traverse it in
//! opposite directions. [`MeshDiagnostics`] counts the ways a mesh falls short.
//!
//! # Example
//!
//! ```ignore
//! use srf_kernel::geom::{Mesh, Tolerance};
//!
//! let mut mesh = Mesh::new();
//! shell.triangulate_into(&mut mesh);
//!
//! let diagnostics = mesh.diagnostics(Tolerance::LENGTH);
//! if !diagnostics.is_watertight() {
//!     log::warn!("mesh has {} open edges", diagnostics.open_edge_count);
//! }
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::core::{Point3, Tolerance};
use super::mesh::Mesh;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshDiagnostics {
    /// Distinct vertices after welding within tolerance.
    pub vertex_count: usize,

    pub triangle_count: usize,

    /// Triangles whose corners weld to fewer than three vertices.
    pub degenerate_triangle_count: usize,

    /// Edges with only one adjacent triangle (holes in the mesh).
    pub open_edge_count: usize,

    /// Edges with more than two adjacent triangles.
    pub non_manifold_edge_count: usize,

    /// Two-triangle edges traversed in the same direction by both triangles.
    ///
    /// Non-zero values mean neighbouring triangles disagree about which side is
    /// outside.
    pub inconsistent_edge_count: usize,

    pub warnings: Vec<String>,
}

impl MeshDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Weld `mesh` on a grid of `tol` and count edge uses.
    #[must_use]
    pub fn from_mesh(mesh: &Mesh, tol: Tolerance) -> Self {
        let mut diag = Self {
            triangle_count: mesh.triangles.len(),
            ..Self::default()
        };

        let mut welder = Welder::new(tol);
        let mut edges: HashMap<(usize, usize), (usize, usize)> = HashMap::new();
        for t in &mesh.triangles {
            let ids = [welder.id(t.a), welder.id(t.b), welder.id(t.c)];
            if ids[0] == ids[1] || ids[1] == ids[2] || ids[2] == ids[0] {
                diag.degenerate_triangle_count += 1;
                continue;
            }
            for k in 0..3 {
                let (a, b) = (ids[k], ids[(k + 1) % 3]);
                let entry = edges.entry((a.min(b), a.max(b))).or_default();
                if a < b {
                    entry.0 += 1;
                } else {
                    entry.1 += 1;
                }
            }
        }
        diag.vertex_count = welder.len();

        for (forward, backward) in edges.values().copied() {
            match forward + backward {
                1 => diag.open_edge_count += 1,
                2 if forward != backward => diag.inconsistent_edge_count += 1,
                2 => {}
                _ => diag.non_manifold_edge_count += 1,
            }
        }

        if diag.open_edge_count > 0 {
            diag.add_warning(format!("mesh has {} open edges", diag.open_edge_count));
        }
        if diag.non_manifold_edge_count > 0 {
            diag.add_warning(format!(
                "mesh has {} non-manifold edges",
                diag.non_manifold_edge_count
            ));
        }
        diag
    }

    /// A watertight mesh forms a closed volume with no holes or gaps.
    #[must_use]
    pub fn is_watertight(&self) -> bool {
        self.open_edge_count == 0
    }

    #[must_use]
    pub fn is_manifold(&self) -> bool {
        self.non_manifold_edge_count == 0
    }

    /// Watertight, manifold and consistently oriented.
    #[must_use]
    pub fn is_valid_solid(&self) -> bool {
        self.is_watertight() && self.is_manifold() && self.inconsistent_edge_count == 0
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Counts are summed, warnings appended.
    pub fn merge(&mut self, other: &MeshDiagnostics) {
        self.vertex_count += other.vertex_count;
        self.triangle_count += other.triangle_count;
        self.degenerate_triangle_count += other.degenerate_triangle_count;
        self.open_edge_count += other.open_edge_count;
        self.non_manifold_edge_count += other.non_manifold_edge_count;
        self.inconsistent_edge_count += other.inconsistent_edge_count;
        self.warnings.extend(other.warnings.iter().cloned());
    }

    /// Format: `"V:{vertices} T:{triangles} [issues...]"`
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("V:{} T:{}", self.vertex_count, self.triangle_count)];

        if self.degenerate_triangle_count > 0 {
            parts.push(format!("degenerate:{}", self.degenerate_triangle_count));
        }
        if self.open_edge_count > 0 {
            parts.push(format!("open:{}", self.open_edge_count));
        }
        if self.non_manifold_edge_count > 0 {
            parts.push(format!("non-manifold:{}", self.non_manifold_edge_count));
        }
        if self.inconsistent_edge_count > 0 {
            parts.push(format!("inconsistent:{}", self.inconsistent_edge_count));
        }

        parts.join(" ")
    }
}

impl fmt::Display for MeshDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mesh Diagnostics:")?;
        writeln!(f, "  Vertices: {}", self.vertex_count)?;
        writeln!(f, "  Triangles: {}", self.triangle_count)?;

        if self.open_edge_count > 0 || self.non_manifold_edge_count > 0 || self.inconsistent_edge_count > 0 {
            writeln!(f, "  Topology issues:")?;
            if self.open_edge_count > 0 {
                writeln!(f, "    - Open edges: {}", self.open_edge_count)?;
            }
            if self.non_manifold_edge_count > 0 {
                writeln!(f, "    - Non-manifold edges: {}", self.non_manifold_edge_count)?;
            }
            if self.inconsistent_edge_count > 0 {
                writeln!(f, "    - Inconsistent edges: {}", self.inconsistent_edge_count)?;
            }
        }

        if !self.warnings.is_empty() {
            writeln!(f, "  Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "    - {warning}")?;
            }
        }

        let status = if self.is_valid_solid() { "SOLID" } else { "ISSUES DETECTED" };
        writeln!(f, "  Status: {status}")?;

        Ok(())
    }
}

/// Assigns ids to points, merging points that fall within `tol` of an earlier one.
struct Welder {
    cell: f64,
    buckets: HashMap<(i64, i64, i64), Vec<usize>>,
    points: Vec<Point3>,
    tol: Tolerance,
}

impl Welder {
    fn new(tol: Tolerance) -> Self {
        Self {
            cell: (tol.eps * 4.0).max(f64::MIN_POSITIVE),
            buckets: HashMap::new(),
            points: Vec::new(),
            tol,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn key(&self, p: Point3) -> (i64, i64, i64) {
        (
            (p.x / self.cell).floor() as i64,
            (p.y / self.cell).floor() as i64,
            (p.z / self.cell).floor() as i64,
        )
    }

    fn id(&mut self, p: Point3) -> usize {
        let (kx, ky, kz) = self.key(p);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    if let Some(ids) = self.buckets.get(&(kx + dx, ky + dy, kz + dz)) {
                        if let Some(&id) = ids
                            .iter()
                            .find(|&&id| self.tol.approx_eq_point3(self.points[id], p))
                        {
                            return id;
                        }
                    }
                }
            }
        }
        let id = self.points.len();
        self.points.push(p);
        self.buckets.entry((kx, ky, kz)).or_default().push(id);
        id
    }

    fn len(&self) -> usize {
        self.points.len()
    }
}
