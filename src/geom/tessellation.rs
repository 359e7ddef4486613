//! Tessellation resolution policy for curves and surfaces.
//!
//! Every numeric threshold used by flattening and surface sampling lives in one of
//! the option structs below, each with documented defaults. [`GeomContext`] bundles
//! them with the shared [`Tolerance`] so callers configure the kernel in one place.
//!
//! ```ignore
//! use srf_kernel::geom::{GeomContext, SurfaceTessellationOptions};
//!
//! let ctx = GeomContext {
//!     surface: SurfaceTessellationOptions { max_deviation: 0.001, ..Default::default() },
//!     ..GeomContext::default()
//! };
//! ```

use serde::{Deserialize, Serialize};

use super::core::{Point3, Tolerance};
use super::surface::BezierSurface;
use super::trim::UvDomain;

/// Options controlling adaptive curve flattening.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveTessellationOptions {
    /// Maximum chord-to-arc distance of an emitted segment.
    pub max_deviation: f64,
    /// Recursion depth cap; a span at this depth is emitted as is.
    pub max_depth: usize,
    /// Spans are always split at least this many times (degree > 1 only).
    pub min_depth: usize,
}

impl Default for CurveTessellationOptions {
    fn default() -> Self {
        Self {
            max_deviation: 0.001,
            max_depth: 12,
            min_depth: 1,
        }
    }
}

impl CurveTessellationOptions {
    #[must_use]
    pub const fn new(max_deviation: f64, max_depth: usize) -> Self {
        Self {
            max_deviation,
            max_depth,
            min_depth: 1,
        }
    }
}

/// Options controlling the interior sample grid of trimmed surfaces.
///
/// The grid is refined (by doubling counts) until bilinear interpolation of each
/// cell deviates from the surface by at most `max_deviation`, every cell edge is
/// shorter than `max_edge_length`, or the caps are reached. Flat patches stay at a
/// single cell, so their triangulation uses trim vertices only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceTessellationOptions {
    /// Maximum deviation between the sampled grid and the true surface.
    pub max_deviation: f64,
    /// Maximum cell edge length in model units; `f64::INFINITY` disables it.
    pub max_edge_length: f64,
    pub max_u_count: usize,
    pub max_v_count: usize,
    pub initial_u_count: usize,
    pub initial_v_count: usize,
    pub max_iterations: usize,
}

impl Default for SurfaceTessellationOptions {
    fn default() -> Self {
        Self {
            max_deviation: 0.005,
            max_edge_length: f64::INFINITY,
            max_u_count: 32,
            max_v_count: 32,
            initial_u_count: 1,
            initial_v_count: 1,
            max_iterations: 10,
        }
    }
}

impl SurfaceTessellationOptions {
    #[must_use]
    pub fn new(max_deviation: f64, max_edge_length: f64) -> Self {
        Self {
            max_deviation,
            max_edge_length,
            ..Self::default()
        }
    }
}

/// Shared configuration threaded through construction, Boolean and meshing calls.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeomContext {
    pub tolerance: Tolerance,
    pub curve: CurveTessellationOptions,
    pub surface: SurfaceTessellationOptions,
}

impl GeomContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tolerance(tolerance: Tolerance) -> Self {
        Self {
            tolerance,
            ..Self::default()
        }
    }
}

/// Picks `(u_cells, v_cells)` for sampling `surface` over `bounds`.
///
/// Refinement is anisotropic: the direction whose edge midpoints deviate more from
/// their chords is doubled first.
#[must_use]
pub fn choose_surface_grid_counts(
    surface: &BezierSurface,
    bounds: UvDomain,
    options: SurfaceTessellationOptions,
) -> (usize, usize) {
    let mut u_count = options.initial_u_count.max(1);
    let mut v_count = options.initial_v_count.max(1);
    let u_max = options.max_u_count.max(u_count);
    let v_max = options.max_v_count.max(v_count);

    if !bounds.is_valid() || bounds.u_span() <= 0.0 || bounds.v_span() <= 0.0 {
        return (u_count, v_count);
    }

    for _ in 0..options.max_iterations.max(1) {
        let err = estimate_grid_error(surface, bounds, u_count, v_count);

        let dev_ok = !options.max_deviation.is_finite()
            || options.max_deviation <= 0.0
            || err.deviation() <= options.max_deviation;
        let edge_limit = options.max_edge_length;
        let edge_u_ok = !edge_limit.is_finite() || err.edge_u <= edge_limit;
        let edge_v_ok = !edge_limit.is_finite() || err.edge_v <= edge_limit;
        if dev_ok && edge_u_ok && edge_v_ok {
            break;
        }

        let mut refine_u = !edge_u_ok;
        let mut refine_v = !edge_v_ok;
        if !dev_ok {
            if err.dev_u >= err.dev_v {
                refine_u = true;
            } else {
                refine_v = true;
            }
            if err.dev_center > options.max_deviation && err.dev_u.max(err.dev_v) <= options.max_deviation {
                refine_u = true;
                refine_v = true;
            }
        }

        let (prev_u, prev_v) = (u_count, v_count);
        if refine_u {
            u_count = (u_count * 2).min(u_max);
        }
        if refine_v {
            v_count = (v_count * 2).min(v_max);
        }
        if (u_count, v_count) == (prev_u, prev_v) {
            // One direction is capped; spend the budget on the other one.
            if u_count < u_max {
                u_count = (u_count * 2).min(u_max);
            } else if v_count < v_max {
                v_count = (v_count * 2).min(v_max);
            } else {
                break;
            }
        }
    }

    (u_count, v_count)
}

#[derive(Debug, Clone, Copy, Default)]
struct GridError {
    dev_u: f64,
    dev_v: f64,
    dev_center: f64,
    edge_u: f64,
    edge_v: f64,
}

impl GridError {
    fn deviation(self) -> f64 {
        self.dev_u.max(self.dev_v).max(self.dev_center)
    }
}

fn estimate_grid_error(
    surface: &BezierSurface,
    bounds: UvDomain,
    u_count: usize,
    v_count: usize,
) -> GridError {
    // Sample at most 12x12 cells; the error of a Bezier patch varies smoothly.
    let step_u = u_count.div_ceil(12).max(1);
    let step_v = v_count.div_ceil(12).max(1);
    let du = bounds.u_span() / u_count as f64;
    let dv = bounds.v_span() / v_count as f64;

    let mut err = GridError::default();
    for i in (0..u_count).step_by(step_u) {
        for j in (0..v_count).step_by(step_v) {
            let ua = bounds.u_min + du * i as f64;
            let va = bounds.v_min + dv * j as f64;
            let (ub, vb) = (ua + du, va + dv);
            let (um, vm) = (0.5 * (ua + ub), 0.5 * (va + vb));

            let p00 = surface.point_at(ua, va);
            let p10 = surface.point_at(ub, va);
            let p01 = surface.point_at(ua, vb);
            let p11 = surface.point_at(ub, vb);

            err.edge_u = err.edge_u.max(p00.distance_to(p10)).max(p01.distance_to(p11));
            err.edge_v = err.edge_v.max(p00.distance_to(p01)).max(p10.distance_to(p11));

            err.dev_u = err
                .dev_u
                .max(surface.point_at(um, va).distance_to(p00.midpoint(p10)))
                .max(surface.point_at(um, vb).distance_to(p01.midpoint(p11)));
            err.dev_v = err
                .dev_v
                .max(surface.point_at(ua, vm).distance_to(p00.midpoint(p01)))
                .max(surface.point_at(ub, vm).distance_to(p10.midpoint(p11)));

            let bilinear: Point3 = p00.midpoint(p10).midpoint(p01.midpoint(p11));
            err.dev_center = err.dev_center.max(surface.point_at(um, vm).distance_to(bilinear));
        }
    }
    err
}
