//! Assembly of unordered Bezier curves into closed loops and planar loop sets.

use serde::{Deserialize, Serialize};

use super::bezier::{BezierCurve, BezierList};
use super::core::{Point3, Tolerance, Vec3};
use super::edges::Edge;
use super::trim::{UvPoint, point_in_polygon, signed_area};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoopError {
    #[error("no curves to assemble into a loop")]
    Empty,
    #[error("curves do not close into a loop; dangling edge {at}")]
    NotClosed { at: Edge },
    #[error("loop set is not planar (deviation {deviation:.3e})")]
    NotPlanar { deviation: f64 },
    #[error("loop set has zero area, no normal can be computed")]
    Degenerate,
}

/// A closed polyline in model space. The closing point is not repeated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contour {
    pub points: Vec<Point3>,
}

impl Contour {
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    /// Newell's method: twice the vector area of the polygon.
    #[must_use]
    pub fn newell_normal(&self) -> Vec3 {
        let n = self.points.len();
        let mut acc = Vec3::ZERO;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            acc.x += (a.y - b.y) * (a.z + b.z);
            acc.y += (a.z - b.z) * (a.x + b.x);
            acc.z += (a.x - b.x) * (a.y + b.y);
        }
        acc
    }
}

/// Flattened loop set, one contour per loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub contours: Vec<Contour>,
    pub normal: Vec3,
}

impl Polygon {
    /// Net area about `normal`: outer contours count positive, holes negative.
    #[must_use]
    pub fn signed_area(&self) -> f64 {
        self.contours
            .iter()
            .map(|c| 0.5 * c.newell_normal().dot(self.normal))
            .sum()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BezierLoop
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BezierLoop {
    pub l: Vec<BezierCurve>,
}

impl BezierLoop {
    /// Chain curves from `list` into one closed loop, consuming them.
    ///
    /// Starting from the first remaining curve, the curve whose start (or, reversed,
    /// whose finish) matches the chain's open end is appended until the chain closes.
    ///
    /// # Errors
    /// [`LoopError::Empty`] for an empty list, [`LoopError::NotClosed`] naming the
    /// dangling edge when no curve continues the chain.
    pub fn from_curves(list: &mut BezierList, tol: Tolerance) -> Result<Self, LoopError> {
        if list.is_empty() {
            return Err(LoopError::Empty);
        }
        let first = list.l.remove(0);
        let mut lp = Self { l: vec![first] };

        while !lp.is_closed(tol) {
            let end = lp.finish();
            let next = list.l.iter().position(|c| tol.approx_eq_point3(c.start(), end));
            let next = next.map(|i| (i, false)).or_else(|| {
                list.l
                    .iter()
                    .position(|c| tol.approx_eq_point3(c.finish(), end))
                    .map(|i| (i, true))
            });

            let Some((i, flip)) = next else {
                return Err(LoopError::NotClosed {
                    at: Edge::new(end, lp.start()),
                });
            };
            let mut c = list.l.remove(i);
            if flip {
                c.reverse();
            }
            lp.l.push(c);
        }
        Ok(lp)
    }

    #[must_use]
    pub fn start(&self) -> Point3 {
        self.l.first().map_or(Point3::ORIGIN, BezierCurve::start)
    }

    #[must_use]
    pub fn finish(&self) -> Point3 {
        self.l.last().map_or(Point3::ORIGIN, BezierCurve::finish)
    }

    #[must_use]
    pub fn is_closed(&self, tol: Tolerance) -> bool {
        if self.l.is_empty() {
            return false;
        }
        let joints_ok = self
            .l
            .windows(2)
            .all(|w| tol.approx_eq_point3(w[0].finish(), w[1].start()));
        // A lone straight segment cannot close on itself.
        let degenerate = self.l.len() == 1 && self.l[0].deg == 1;
        joints_ok && !degenerate && tol.approx_eq_point3(self.finish(), self.start())
    }

    /// Reverse traversal direction: curve order and each curve.
    pub fn reverse(&mut self) {
        self.l.reverse();
        for c in &mut self.l {
            c.reverse();
        }
    }

    /// Append the loop's flattening to `out`, without repeating the closing point.
    pub fn make_pwl_into(&self, out: &mut Contour) {
        let mut pts = Vec::new();
        for c in &self.l {
            c.make_pwl_into(&mut pts);
        }
        if pts.len() > 1 && Tolerance::LENGTH.approx_eq_point3(pts[0], pts[pts.len() - 1]) {
            pts.pop();
        }
        out.points.extend(pts);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BezierLoopSet
// ─────────────────────────────────────────────────────────────────────────────

/// Planar set of closed loops: outer boundaries and their holes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BezierLoopSet {
    pub l: Vec<BezierLoop>,
    /// Unit plane normal; outer loops wind counter-clockwise about it.
    pub normal: Vec3,
    /// A point on the plane (the first loop's start).
    pub point: Point3,
}

impl BezierLoopSet {
    /// Assemble every curve of `list` into loops, returning the oriented set and its
    /// flattening.
    ///
    /// Loops at even nesting depth are wound counter-clockwise about `normal`, loops
    /// at odd depth (holes) clockwise.
    ///
    /// # Errors
    /// Propagates loop assembly failures; [`LoopError::Degenerate`] when the first
    /// loop has no area, [`LoopError::NotPlanar`] when a flattened point leaves the
    /// plane by more than `tol`.
    pub fn from_curves(mut list: BezierList, tol: Tolerance) -> Result<(Self, Polygon), LoopError> {
        if list.is_empty() {
            return Err(LoopError::Empty);
        }

        let mut loops = Vec::new();
        let mut contours = Vec::new();
        while !list.is_empty() {
            let lp = BezierLoop::from_curves(&mut list, tol)?;
            let mut contour = Contour::default();
            lp.make_pwl_into(&mut contour);
            loops.push(lp);
            contours.push(contour);
        }

        let normal = contours[0]
            .newell_normal()
            .normalized()
            .ok_or(LoopError::Degenerate)?;
        let point = loops[0].start();

        let deviation = contours
            .iter()
            .flat_map(|c| c.points.iter())
            .map(|p| (*p - point).dot(normal).abs())
            .fold(0.0_f64, f64::max);
        if deviation > tol.eps {
            return Err(LoopError::NotPlanar { deviation });
        }

        let u = normal.any_perpendicular();
        let v = normal.cross(u);
        let flat: Vec<Vec<UvPoint>> = contours
            .iter()
            .map(|c| {
                c.points
                    .iter()
                    .map(|p| {
                        let d = *p - point;
                        UvPoint::new(d.dot(u), d.dot(v))
                    })
                    .collect()
            })
            .collect();

        for i in 0..loops.len() {
            let Some(probe) = flat[i].first().copied() else {
                continue;
            };
            let depth = (0..flat.len())
                .filter(|&j| j != i && point_in_polygon(probe, &flat[j]))
                .count();
            let ccw = signed_area(&flat[i]) > 0.0;
            if ccw != (depth % 2 == 0) {
                loops[i].reverse();
                contours[i].reverse();
            }
        }

        log::debug!(
            "assembled loop set: {} loops, normal ({:.3}, {:.3}, {:.3})",
            loops.len(),
            normal.x,
            normal.y,
            normal.z
        );

        let set = Self {
            l: loops,
            normal,
            point,
        };
        Ok((set, Polygon { contours, normal }))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.l.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.l.is_empty()
    }

    pub fn iter_curves(&self) -> impl Iterator<Item = &BezierCurve> {
        self.l.iter().flat_map(|lp| lp.l.iter())
    }
}
