//! Shells: sets of trimmed surfaces that share their boundary curves.
//!
//! A closed shell bounds a solid. Every curve lives once in `curves` and is
//! referenced by the trims of the (usually two) surfaces it separates, one of them
//! traversing it backwards. That sharing is what keeps triangulations watertight.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::bezier::BezierCurve;
use super::boolean::{self, BooleanDiagnostics, BooleanError, BooleanOp};
use super::core::{BBox, Point3, Quaternion, Tolerance, Vec3};
use super::curve::{ShellCurve, TrimBy};
use super::edges::{Edge, EdgeList};
use super::handle::{CurveHandle, IdList, SurfaceHandle};
use super::loops::BezierLoopSet;
use super::mesh::{Mesh, Rgba, Triangle};
use super::surface::BezierSurface;
use super::tessellation::{GeomContext, choose_surface_grid_counts};
use super::trim::{TrimError, TrimLoop, UvPoint, regions_from_loops};
use super::triangulation::{
    TriangulationDiagnostics, TriangulationError, TriangulationOptions,
    triangulate_trim_region_with_steiner_points,
};

/// Why one surface of a shell could not be meshed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SurfaceMeshError {
    #[error("trims of {surface} do not close, dangling at {at}")]
    OpenTrims { surface: SurfaceHandle, at: Edge },
    #[error("trim loops of {surface} are invalid: {source}")]
    Trim {
        surface: SurfaceHandle,
        #[source]
        source: TrimError,
    },
    #[error("trim region of {surface} failed to triangulate: {source}")]
    Triangulation {
        surface: SurfaceHandle,
        #[source]
        source: TriangulationError,
    },
}

type SurfaceMeshResult = Result<(Vec<Triangle>, TriangulationDiagnostics), SurfaceMeshError>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Shell {
    pub curves: IdList<ShellCurve>,
    pub surfaces: IdList<BezierSurface>,
}

impl Shell {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// Destroy every curve and surface.
    pub fn clear(&mut self) {
        self.curves.clear();
        self.surfaces.clear();
    }

    #[must_use]
    pub fn bbox(&self) -> Option<BBox> {
        self.curves
            .iter()
            .filter_map(ShellCurve::bbox)
            .chain(self.surfaces.iter().map(BezierSurface::bbox))
            .reduce(BBox::union)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Construction
    // ─────────────────────────────────────────────────────────────────────────

    /// Solid swept by the planar loop set `sbls` from offset `t0` to offset `t1`.
    #[must_use]
    pub fn from_extrusion_of(sbls: &BezierLoopSet, t0: Vec3, t1: Vec3, color: Rgba) -> Self {
        let mut shell = Self::new();
        shell.make_from_extrusion_of(sbls, t0, t1, color);
        shell
    }

    pub fn make_from_extrusion_of(&mut self, sbls: &BezierLoopSet, t0: Vec3, t1: Vec3, color: Rgba) {
        self.make_from_extrusion_of_with_context(sbls, t0, t1, color, &GeomContext::default());
    }

    /// Replace the contents with an extrusion: one ruled side per loop curve, a
    /// bottom cap at `t0` and a top cap at `t1`.
    ///
    /// The solid is the same whichever way `t1 - t0` points relative to the loop
    /// normal; surfaces are always oriented with their normals out of it.
    pub fn make_from_extrusion_of_with_context(
        &mut self,
        sbls: &BezierLoopSet,
        t0: Vec3,
        t1: Vec3,
        color: Rgba,
        ctx: &GeomContext,
    ) {
        self.clear();
        if sbls.is_empty() {
            return;
        }

        // Sweep along the loop normal so that CCW outer loops give outward sides.
        let (t0, t1) = if (t1 - t0).dot(sbls.normal) < 0.0 {
            (t1, t0)
        } else {
            (t0, t1)
        };

        let mut face = 0u32;
        let mut next_face = || {
            face += 1;
            face
        };

        let mut bottom_trims = Vec::new();
        let mut top_trims = Vec::new();
        let mut sides = Vec::new();

        for lp in &sbls.l {
            let rails: Vec<(CurveHandle, CurveHandle, CurveHandle)> = lp
                .l
                .iter()
                .map(|c| {
                    let bottom = self
                        .curves
                        .add_and_assign_id(ShellCurve::from_exact(c.translated_by(t0), ctx.curve));
                    let top = self
                        .curves
                        .add_and_assign_id(ShellCurve::from_exact(c.translated_by(t1), ctx.curve));
                    let vertical = self.curves.add_and_assign_id(ShellCurve::from_exact(
                        BezierCurve::line(c.start() + t0, c.start() + t1),
                        ctx.curve,
                    ));
                    (bottom, top, vertical)
                })
                .collect();

            for (i, c) in lp.l.iter().enumerate() {
                let (bottom, top, left) = rails[i];
                let right = rails[(i + 1) % rails.len()].2;

                let mut side = BezierSurface::from_extrusion_of(c, t0, t1);
                side.trims = vec![
                    TrimBy::entire_curve(self, bottom, false),
                    TrimBy::entire_curve(self, right, false),
                    TrimBy::entire_curve(self, top, true),
                    TrimBy::entire_curve(self, left, true),
                ];
                sides.push(side);

                bottom_trims.push(TrimBy::entire_curve(self, bottom, true));
                top_trims.push(TrimBy::entire_curve(self, top, false));
            }
        }

        let mut bottom = BezierSurface::from_plane(sbls.point + t0, -sbls.normal);
        bottom.trims = bottom_trims;
        let mut top = BezierSurface::from_plane(sbls.point + t1, sbls.normal);
        top.trims = top_trims;

        for srf in sides.into_iter().chain([bottom, top]) {
            let srf = srf.with_color(color).with_face(next_face());
            self.surfaces.add_and_assign_id(srf);
        }

        log::debug!(
            "extruded {} loops into {} surfaces and {} curves",
            sbls.len(),
            self.surfaces.len(),
            self.curves.len()
        );
    }

    /// A shell holding one untrimmed plane surface through `pt` facing `n`.
    ///
    /// # Panics
    /// Panics when `n` has zero length.
    #[must_use]
    pub fn from_plane(pt: Point3, n: Vec3, color: Rgba) -> Self {
        let mut shell = Self::new();
        shell
            .surfaces
            .add_and_assign_id(BezierSurface::from_plane(pt, n).with_color(color).with_face(1));
        shell
    }

    /// Replace the contents with a deep copy of `a`. Handles are reallocated.
    pub fn make_from_copy_of(&mut self, a: &Self) {
        self.make_from_transformation_of(a, Vec3::ZERO, Quaternion::IDENTITY);
    }

    /// Replace the contents with `a` rotated by `q` then translated by `t`.
    pub fn make_from_transformation_of(&mut self, a: &Self, t: Vec3, q: Quaternion) {
        self.make_from_transformation_of_with_context(a, t, q, &GeomContext::default());
    }

    pub fn make_from_transformation_of_with_context(
        &mut self,
        a: &Self,
        t: Vec3,
        q: Quaternion,
        ctx: &GeomContext,
    ) {
        self.clear();
        let identity = t == Vec3::ZERO && q == Quaternion::IDENTITY;

        let mut remap: HashMap<CurveHandle, CurveHandle> = HashMap::with_capacity(a.curves.len());
        for c in &a.curves {
            let copy = if identity {
                c.clone()
            } else {
                ShellCurve::from_transformation_of(c, t, q, ctx.curve)
            };
            remap.insert(c.h, self.curves.add_and_assign_id(copy));
        }

        for s in &a.surfaces {
            let mut copy = BezierSurface::from_transformation_of(s, t, q, true);
            for tr in &mut copy.trims {
                tr.curve = *remap
                    .get(&tr.curve)
                    .unwrap_or_else(|| panic!("trim references unknown curve {}", tr.curve));
            }
            self.surfaces.add_and_assign_id(copy);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Booleans
    // ─────────────────────────────────────────────────────────────────────────

    /// `a ∪ b` as a new shell.
    ///
    /// # Errors
    /// See [`BooleanError`].
    pub fn union(a: &Self, b: &Self) -> Result<(Self, BooleanDiagnostics), BooleanError> {
        boolean::boolean_shells(a, b, BooleanOp::Union, &GeomContext::default())
    }

    /// `a − b` as a new shell.
    ///
    /// # Errors
    /// See [`BooleanError`].
    pub fn difference(a: &Self, b: &Self) -> Result<(Self, BooleanDiagnostics), BooleanError> {
        boolean::boolean_shells(a, b, BooleanOp::Difference, &GeomContext::default())
    }

    /// # Errors
    /// See [`BooleanError`].
    pub fn union_with_context(
        a: &Self,
        b: &Self,
        ctx: &GeomContext,
    ) -> Result<(Self, BooleanDiagnostics), BooleanError> {
        boolean::boolean_shells(a, b, BooleanOp::Union, ctx)
    }

    /// # Errors
    /// See [`BooleanError`].
    pub fn difference_with_context(
        a: &Self,
        b: &Self,
        ctx: &GeomContext,
    ) -> Result<(Self, BooleanDiagnostics), BooleanError> {
        boolean::boolean_shells(a, b, BooleanOp::Difference, ctx)
    }

    /// Replace the contents with `a ∪ b`. On error the shell is left unchanged.
    ///
    /// # Errors
    /// See [`BooleanError`].
    pub fn make_from_union_of(&mut self, a: &Self, b: &Self) -> Result<BooleanDiagnostics, BooleanError> {
        let (shell, diagnostics) = Self::union(a, b)?;
        *self = shell;
        Ok(diagnostics)
    }

    /// Replace the contents with `a − b`. On error the shell is left unchanged.
    ///
    /// # Errors
    /// See [`BooleanError`].
    pub fn make_from_difference_of(
        &mut self,
        a: &Self,
        b: &Self,
    ) -> Result<BooleanDiagnostics, BooleanError> {
        let (shell, diagnostics) = Self::difference(a, b)?;
        *self = shell;
        Ok(diagnostics)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Trims
    // ─────────────────────────────────────────────────────────────────────────

    /// The polyline `trim` covers, in its traversal order.
    ///
    /// # Panics
    /// Panics when the trim's curve is not part of this shell.
    #[must_use]
    pub fn trim_polyline(&self, trim: &TrimBy) -> Vec<Point3> {
        self.trim_polyline_with(trim, Tolerance::default())
    }

    /// [`Shell::trim_polyline`] matching the trim's end points within `tol`.
    ///
    /// # Panics
    /// Panics when the trim's curve is not part of this shell.
    #[must_use]
    pub fn trim_polyline_with(&self, trim: &TrimBy, tol: Tolerance) -> Vec<Point3> {
        let curve = self
            .curves
            .find(trim.curve)
            .unwrap_or_else(|| panic!("trim references unknown curve {}", trim.curve));

        let (a, b) = if trim.backwards {
            (trim.finish, trim.start)
        } else {
            (trim.start, trim.finish)
        };
        let whole = tol.approx_eq_point3(a, curve.start()) && tol.approx_eq_point3(b, curve.finish());
        let mut pts = if whole {
            curve.pts.clone()
        } else {
            curve.piece(a, b, tol).unwrap_or_else(|| curve.pts.clone())
        };
        if trim.backwards {
            pts.reverse();
        }
        pts
    }

    /// Chain the trims of `srf` into closed model-space loops (closing point not
    /// repeated).
    ///
    /// # Errors
    /// [`SurfaceMeshError::OpenTrims`] naming the first dangling edge.
    pub(crate) fn trim_loops(
        &self,
        srf: &BezierSurface,
        tol: Tolerance,
    ) -> Result<Vec<Vec<Point3>>, SurfaceMeshError> {
        let mut pending: Vec<Vec<Point3>> = srf
            .trims
            .iter()
            .map(|tr| self.trim_polyline_with(tr, tol))
            .filter(|pts| pts.len() >= 2)
            .collect();

        let mut loops = Vec::new();
        while !pending.is_empty() {
            let mut current = pending.remove(0);
            loop {
                let (Some(&first), Some(&last)) = (current.first(), current.last()) else {
                    break;
                };
                if current.len() > 2 && tol.approx_eq_point3(first, last) {
                    current.pop();
                    break;
                }
                let Some(next) = pending
                    .iter()
                    .position(|pts| tol.approx_eq_point3(pts[0], last))
                else {
                    return Err(SurfaceMeshError::OpenTrims {
                        surface: srf.h,
                        at: Edge::new(last, first),
                    });
                };
                let next = pending.remove(next);
                current.extend_from_slice(&next[1..]);
            }
            loops.push(current);
        }
        Ok(loops)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Triangulation
    // ─────────────────────────────────────────────────────────────────────────

    /// Triangulate one surface of this shell.
    ///
    /// Boundary vertices are the trim polylines' own points, so neighbouring
    /// surfaces meet exactly; interior vertices come from the adaptive sample grid.
    ///
    /// # Errors
    /// See [`SurfaceMeshError`].
    pub fn triangulate_surface(&self, srf: &BezierSurface, ctx: &GeomContext) -> SurfaceMeshResult {
        let tol = ctx.tolerance;
        let mut diagnostics = TriangulationDiagnostics::default();

        let mut loops = Vec::new();
        if srf.trims.is_empty() {
            let uv = vec![
                UvPoint::new(0.0, 0.0),
                UvPoint::new(1.0, 0.0),
                UvPoint::new(1.0, 1.0),
                UvPoint::new(0.0, 1.0),
            ];
            let model = uv.iter().map(|p| srf.point_at_uv(*p)).collect();
            let (lp, _) = TrimLoop::with_model(uv, model, tol)
                .map_err(|source| SurfaceMeshError::Trim { surface: srf.h, source })?;
            loops.push(lp);
        } else {
            for model in self.trim_loops(srf, tol)? {
                let mut uv = Vec::with_capacity(model.len());
                for p in &model {
                    let cp = srf.closest_point_to(*p);
                    if !cp.converged && cp.distance > ctx.curve.max_deviation {
                        diagnostics.warnings.push(format!(
                            "{}: trim point ({:.4}, {:.4}, {:.4}) projects {:.2e} off the surface",
                            srf.h, p.x, p.y, p.z, cp.distance
                        ));
                    }
                    uv.push(cp.uv);
                }
                let (lp, trim_diag) = TrimLoop::with_model(uv, model, tol)
                    .map_err(|source| SurfaceMeshError::Trim { surface: srf.h, source })?;
                diagnostics.warnings.extend(trim_diag.warnings);
                loops.push(lp);
            }
        }

        let (regions, _) = regions_from_loops(loops, tol)
            .map_err(|source| SurfaceMeshError::Trim { surface: srf.h, source })?;

        let mut triangles = Vec::new();
        for region in &regions {
            let bounds = region.bounds();
            let (mut nu, mut nv) = choose_surface_grid_counts(srf, bounds, ctx.surface);
            if nu > 1 || nv > 1 {
                nu = nu.max(2);
                nv = nv.max(2);
            }
            let du = bounds.u_span() / nu as f64;
            let dv = bounds.v_span() / nv as f64;
            let steiner: Vec<UvPoint> = (1..nu)
                .flat_map(|i| {
                    (1..nv).map(move |j| {
                        UvPoint::new(bounds.u_min + du * i as f64, bounds.v_min + dv * j as f64)
                    })
                })
                .collect();
            let options = TriangulationOptions {
                steiner_clearance: 0.3 * du.min(dv),
                ..TriangulationOptions::default()
            };

            let result = triangulate_trim_region_with_steiner_points(region, &steiner, tol, options)
                .map_err(|source| SurfaceMeshError::Triangulation { surface: srf.h, source })?;

            let model: Vec<Point3> = region
                .outer
                .model_points()
                .iter()
                .chain(region.holes.iter().flat_map(TrimLoop::model_points))
                .copied()
                .collect();
            let vertex = |i: usize| {
                if i < result.boundary_count {
                    model[i]
                } else {
                    srf.point_at_uv(result.vertices[i])
                }
            };

            for [ia, ib, ic] in result.triangles() {
                let (a, mut b, mut c) = (vertex(ia), vertex(ib), vertex(ic));
                let (pa, pb, pc) = (result.vertices[ia], result.vertices[ib], result.vertices[ic]);
                let n = srf.normal_at((pa.u + pb.u + pc.u) / 3.0, (pa.v + pb.v + pc.v) / 3.0);
                if (b - a).cross(c - a).dot(n) < 0.0 {
                    std::mem::swap(&mut b, &mut c);
                }
                triangles.push(Triangle::new(a, b, c, srf.face, srf.color));
            }
            diagnostics.merge(&result.diagnostics);
        }

        #[cfg(feature = "debug_logs")]
        log::debug!(
            "{}: {} regions, {} triangles",
            srf.h,
            regions.len(),
            triangles.len()
        );

        Ok((triangles, diagnostics))
    }

    /// Append the triangulation of every surface to `mesh`.
    pub fn triangulate_into(&self, mesh: &mut Mesh) -> TriangulationDiagnostics {
        self.triangulate_into_with_context(mesh, &GeomContext::default())
    }

    /// Surfaces that cannot be meshed are skipped and reported in the returned
    /// diagnostics.
    pub fn triangulate_into_with_context(&self, mesh: &mut Mesh, ctx: &GeomContext) -> TriangulationDiagnostics {
        let mut diagnostics = TriangulationDiagnostics::default();
        for result in mesh_surfaces(self, ctx) {
            match result {
                Ok((triangles, surface_diag)) => {
                    mesh.triangles.extend(triangles);
                    diagnostics.merge(&surface_diag);
                }
                Err(err) => {
                    log::warn!("skipping surface: {err}");
                    diagnostics.skipped_surfaces += 1;
                    diagnostics.warnings.push(err.to_string());
                }
            }
        }
        diagnostics
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Edges
    // ─────────────────────────────────────────────────────────────────────────

    /// Append every trim polyline as edges, in model space or, with `as_uv`, as
    /// `(u, v, 0)` points in its surface's parameter space.
    pub fn make_edges_into(&self, el: &mut EdgeList, as_uv: bool) {
        self.make_edges_into_with_context(el, as_uv, &GeomContext::default());
    }

    pub fn make_edges_into_with_context(&self, el: &mut EdgeList, as_uv: bool, ctx: &GeomContext) {
        for srf in &self.surfaces {
            for tr in &srf.trims {
                let mut pts = self.trim_polyline_with(tr, ctx.tolerance);
                if as_uv {
                    for p in &mut pts {
                        let uv = srf.closest_point_to(*p).uv;
                        *p = Point3::new(uv.u, uv.v, 0.0);
                    }
                }
                el.add_polyline(&pts);
            }
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "parallel")] {
        fn mesh_surfaces(shell: &Shell, ctx: &GeomContext) -> Vec<SurfaceMeshResult> {
            use rayon::prelude::*;

            shell
                .surfaces
                .as_slice()
                .par_iter()
                .map(|srf| shell.triangulate_surface(srf, ctx))
                .collect()
        }
    } else {
        fn mesh_surfaces(shell: &Shell, ctx: &GeomContext) -> Vec<SurfaceMeshResult> {
            shell
                .surfaces
                .iter()
                .map(|srf| shell.triangulate_surface(srf, ctx))
                .collect()
        }
    }
}
