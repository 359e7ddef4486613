//! Shell curves and the trim references that bound surfaces with them.
//!
//! A [`ShellCurve`] is owned by one shell and shared by the surfaces on either side
//! of it; both surfaces read the same polyline, which keeps their meshes watertight
//! along the edge.

use serde::{Deserialize, Serialize};

use super::bezier::BezierCurve;
use super::core::{BBox, Point3, Quaternion, Tolerance, Vec3};
use super::handle::{CurveHandle, HasHandle};
use super::shell::Shell;
use super::tessellation::CurveTessellationOptions;

/// Where a curve came from. Boolean results tag their curves with the operand (or
/// the intersection) that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CurveSource {
    #[default]
    Original,
    ShellA,
    ShellB,
    Intersection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellCurve {
    pub h: CurveHandle,
    /// The exact curve, when one is known. `pts` is then its flattening.
    pub exact: Option<BezierCurve>,
    /// Piecewise-linear form, always populated, in curve order.
    pub pts: Vec<Point3>,
    pub source: CurveSource,
}

impl HasHandle for ShellCurve {
    type H = CurveHandle;

    fn handle(&self) -> CurveHandle {
        self.h
    }

    fn set_handle(&mut self, h: CurveHandle) {
        self.h = h;
    }
}

impl ShellCurve {
    #[must_use]
    pub fn from_exact(curve: BezierCurve, options: CurveTessellationOptions) -> Self {
        let mut pts = Vec::new();
        curve.make_pwl_into_with(&mut pts, Vec3::ZERO, options);
        Self {
            h: CurveHandle::default(),
            exact: Some(curve),
            pts,
            source: CurveSource::Original,
        }
    }

    #[must_use]
    pub fn from_points(pts: Vec<Point3>, source: CurveSource) -> Self {
        Self {
            h: CurveHandle::default(),
            exact: None,
            pts,
            source,
        }
    }

    /// Rotate by `q` then translate by `t`. Exact curves are re-flattened so the
    /// polyline keeps the requested resolution.
    #[must_use]
    pub fn from_transformation_of(
        a: &Self,
        t: Vec3,
        q: Quaternion,
        options: CurveTessellationOptions,
    ) -> Self {
        let mut out = match a.exact {
            Some(exact) => Self::from_exact(exact.transformed_by(t, q), options),
            None => Self::from_points(
                a.pts.iter().map(|p| q.transform_point(*p, t)).collect(),
                a.source,
            ),
        };
        out.source = a.source;
        out.h = a.h;
        out
    }

    #[must_use]
    pub fn with_source(mut self, source: CurveSource) -> Self {
        self.source = source;
        self
    }

    #[must_use]
    pub fn is_exact(&self) -> bool {
        self.exact.is_some()
    }

    #[must_use]
    pub fn start(&self) -> Point3 {
        self.pts.first().copied().unwrap_or(Point3::ORIGIN)
    }

    #[must_use]
    pub fn finish(&self) -> Point3 {
        self.pts.last().copied().unwrap_or(Point3::ORIGIN)
    }

    #[must_use]
    pub fn length(&self) -> f64 {
        self.pts.windows(2).map(|w| w[0].distance_to(w[1])).sum()
    }

    #[must_use]
    pub fn bbox(&self) -> Option<BBox> {
        BBox::from_points(&self.pts)
    }

    /// Position of `p` along the polyline as `segment index + fraction`, or `None`
    /// when `p` is farther than `tol` from every segment.
    #[must_use]
    pub fn locate(&self, p: Point3, tol: Tolerance) -> Option<f64> {
        if let Some(i) = self.pts.iter().position(|q| tol.approx_eq_point3(*q, p)) {
            return Some(i as f64);
        }

        let mut best: Option<(f64, f64)> = None;
        for (i, w) in self.pts.windows(2).enumerate() {
            let d = w[1] - w[0];
            let len2 = d.length_squared();
            if len2 <= 0.0 {
                continue;
            }
            let s = ((p - w[0]).dot(d) / len2).clamp(0.0, 1.0);
            let dist = p.distance_to(w[0].lerp(w[1], s));
            if dist <= tol.eps && best.is_none_or(|(bd, _)| dist < bd) {
                best = Some((dist, i as f64 + s));
            }
        }
        best.map(|(_, param)| param)
    }

    /// The polyline between `a` and `b`, in curve order (`a` must come first).
    ///
    /// The returned piece starts exactly at `a` and ends exactly at `b`, with the
    /// curve's own vertices in between.
    #[must_use]
    pub fn piece(&self, a: Point3, b: Point3, tol: Tolerance) -> Option<Vec<Point3>> {
        let ta = self.locate(a, tol)?;
        let tb = self.locate(b, tol)?;
        if ta > tb + 1e-12 {
            return None;
        }

        let mut out = vec![a];
        for (k, p) in self.pts.iter().enumerate() {
            let kf = k as f64;
            if kf > ta + 1e-9 && kf < tb - 1e-9 {
                out.push(*p);
            }
        }
        out.push(b);
        Some(out)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TrimBy
// ─────────────────────────────────────────────────────────────────────────────

/// A surface's reference to (part of) a shell curve.
///
/// Traversal runs from `start` to `finish`; `backwards` means that is against the
/// curve's own direction. Trims are directed so the surface's material lies to the
/// left when looking down the surface normal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimBy {
    pub curve: CurveHandle,
    pub backwards: bool,
    pub start: Point3,
    pub finish: Point3,
}

impl TrimBy {
    /// Trim along all of curve `h` of `shell`.
    ///
    /// # Panics
    /// Panics when `h` is not a curve of `shell`.
    #[must_use]
    pub fn entire_curve(shell: &Shell, h: CurveHandle, backwards: bool) -> Self {
        let curve = shell
            .curves
            .find(h)
            .unwrap_or_else(|| panic!("trim references unknown curve {h}"));
        Self::entire(curve, backwards)
    }

    #[must_use]
    pub fn entire(curve: &ShellCurve, backwards: bool) -> Self {
        let (start, finish) = if backwards {
            (curve.finish(), curve.start())
        } else {
            (curve.start(), curve.finish())
        };
        Self {
            curve: curve.h,
            backwards,
            start,
            finish,
        }
    }

    /// Same curve traversed the other way.
    #[must_use]
    pub fn flipped(&self) -> Self {
        Self {
            curve: self.curve,
            backwards: !self.backwards,
            start: self.finish,
            finish: self.start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn polyline() -> ShellCurve {
        ShellCurve::from_points(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
                Point3::new(3.0, 0.0, 0.0),
            ],
            CurveSource::Original,
        )
    }

    #[test]
    fn piece_keeps_interior_vertices() {
        let c = polyline();
        let piece = c
            .piece(Point3::new(0.5, 0.0, 0.0), Point3::new(2.5, 0.0, 0.0), Tolerance::LENGTH)
            .unwrap();
        assert_eq!(piece.len(), 4);
        assert_eq!(piece[1], Point3::new(1.0, 0.0, 0.0));
        assert_eq!(piece[3], Point3::new(2.5, 0.0, 0.0));
    }

    #[test]
    fn piece_rejects_reversed_order_and_off_curve_points() {
        let c = polyline();
        let tol = Tolerance::LENGTH;
        assert!(c.piece(Point3::new(2.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0), tol).is_none());
        assert!(c.piece(Point3::new(0.0, 1.0, 0.0), Point3::new(1.0, 0.0, 0.0), tol).is_none());
    }

    #[test]
    fn entire_trim_swaps_ends_when_backwards() {
        let c = polyline();
        let fwd = TrimBy::entire(&c, false);
        let back = TrimBy::entire(&c, true);
        assert_eq!(fwd.start, c.start());
        assert_eq!(back.start, c.finish());
        assert_eq!(fwd.flipped(), back);
    }

    #[test]
    fn transforming_an_exact_curve_reflattens_it() {
        let arc = BezierCurve::quadratic(
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        );
        let c = ShellCurve::from_exact(arc, CurveTessellationOptions::default());
        let moved = ShellCurve::from_transformation_of(
            &c,
            Vec3::new(0.0, 0.0, 5.0),
            Quaternion::IDENTITY,
            CurveTessellationOptions::default(),
        );
        assert!(moved.is_exact());
        assert_eq!(moved.pts.len(), c.pts.len());
        assert!((moved.start().z - 5.0).abs() < 1e-12);
    }
}
