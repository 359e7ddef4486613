use std::ops::{Add, Div, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Vec3
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const X: Self = Self::new(1.0, 0.0, 0.0);
    pub const Y: Self = Self::new(0.0, 1.0, 0.0);
    pub const Z: Self = Self::new(0.0, 0.0, 1.0);

    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    #[must_use]
    pub const fn length_squared(self) -> f64 {
        self.dot(self)
    }

    #[must_use]
    pub const fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    #[must_use]
    pub const fn cross(self, rhs: Self) -> Self {
        Self {
            x: self.y * rhs.z - self.z * rhs.y,
            y: self.z * rhs.x - self.x * rhs.z,
            z: self.x * rhs.y - self.y * rhs.x,
        }
    }

    /// Unit vector in the same direction, or `None` for zero/non-finite input.
    #[must_use]
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        if len.is_finite() && len > 0.0 {
            Some(self.div_scalar(len))
        } else {
            None
        }
    }

    /// Rescale to the given magnitude; zero vectors stay zero.
    #[must_use]
    pub fn with_magnitude(self, magnitude: f64) -> Self {
        self.normalized()
            .map_or(Self::ZERO, |unit| unit.mul_scalar(magnitude))
    }

    #[must_use]
    pub const fn mul_scalar(self, s: f64) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    #[must_use]
    pub const fn div_scalar(self, s: f64) -> Self {
        Self::new(self.x / s, self.y / s, self.z / s)
    }

    #[must_use]
    pub const fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    #[must_use]
    pub const fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    /// Any unit vector perpendicular to `self`.
    ///
    /// Picks the world axis least aligned with `self` so the cross product is
    /// well conditioned.
    #[must_use]
    pub fn any_perpendicular(self) -> Self {
        let a = self.abs();
        let seed = if a.x <= a.y && a.x <= a.z {
            Self::X
        } else if a.y <= a.z {
            Self::Y
        } else {
            Self::Z
        };
        self.cross(seed).normalized().unwrap_or(Self::X)
    }

    /// Component of `self` perpendicular to the unit vector `n`.
    #[must_use]
    pub fn reject_from(self, n: Self) -> Self {
        self.sub(n.mul_scalar(self.dot(n)))
    }

    #[must_use]
    pub fn abs(self) -> Self {
        Self::new(self.x.abs(), self.y.abs(), self.z.abs())
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Vec3::add(self, rhs)
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Vec3::sub(self, rhs)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self::Output {
        self.mul_scalar(rhs)
    }
}

impl Mul<Vec3> for f64 {
    type Output = Vec3;
    fn mul(self, rhs: Vec3) -> Self::Output {
        rhs.mul_scalar(self)
    }
}

impl Div<f64> for Vec3 {
    type Output = Self;
    fn div(self, rhs: f64) -> Self::Output {
        self.div_scalar(rhs)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y, -self.z)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Point3
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const ORIGIN: Self = Self::new(0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub const fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    #[must_use]
    pub const fn add_vec(self, v: Vec3) -> Self {
        Self::new(self.x + v.x, self.y + v.y, self.z + v.z)
    }

    #[must_use]
    pub const fn sub_point(self, rhs: Self) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    #[must_use]
    pub fn lerp(self, rhs: Self, t: f64) -> Self {
        self.add_vec(rhs.sub_point(self).mul_scalar(t))
    }

    #[must_use]
    pub fn midpoint(self, rhs: Self) -> Self {
        self.lerp(rhs, 0.5)
    }

    #[must_use]
    pub fn distance_to(self, other: Self) -> f64 {
        self.sub_point(other).length()
    }

    #[must_use]
    pub fn distance_squared_to(self, other: Self) -> f64 {
        self.sub_point(other).length_squared()
    }

    /// Distance from `self` to the segment `a`-`b`.
    #[must_use]
    pub fn distance_to_segment(self, a: Self, b: Self) -> f64 {
        let ab = b.sub_point(a);
        let len2 = ab.length_squared();
        if len2 <= 0.0 {
            return self.distance_to(a);
        }
        let t = (self.sub_point(a).dot(ab) / len2).clamp(0.0, 1.0);
        self.distance_to(a.add_vec(ab.mul_scalar(t)))
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Default for Point3 {
    fn default() -> Self {
        Self::ORIGIN
    }
}

impl From<Vec3> for Point3 {
    fn from(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<Point3> for Vec3 {
    fn from(p: Point3) -> Self {
        p.to_vec3()
    }
}

impl From<[f64; 3]> for Point3 {
    fn from(arr: [f64; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }
}

impl Add<Vec3> for Point3 {
    type Output = Self;
    fn add(self, rhs: Vec3) -> Self::Output {
        self.add_vec(rhs)
    }
}

impl Sub<Vec3> for Point3 {
    type Output = Self;
    fn sub(self, rhs: Vec3) -> Self::Output {
        self.add_vec(-rhs)
    }
}

impl Sub for Point3 {
    type Output = Vec3;
    fn sub(self, rhs: Self) -> Self::Output {
        self.sub_point(rhs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Quaternion
// ─────────────────────────────────────────────────────────────────────────────

/// Rotation quaternion `w + vx*i + vy*j + vz*k`.
///
/// Rigid transforms in the kernel are always "rotate by `q`, then translate";
/// the quaternion is expected to be unit length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
}

impl Quaternion {
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(w: f64, vx: f64, vy: f64, vz: f64) -> Self {
        Self { w, vx, vy, vz }
    }

    /// Rotation by `angle` radians about `axis` (right-handed).
    #[must_use]
    pub fn from_axis_angle(axis: Vec3, angle: f64) -> Self {
        let Some(axis) = axis.normalized() else {
            return Self::IDENTITY;
        };
        let (s, c) = (0.5 * angle).sin_cos();
        Self::new(c, axis.x * s, axis.y * s, axis.z * s)
    }

    #[must_use]
    pub fn magnitude(self) -> f64 {
        (self.w * self.w + self.vx * self.vx + self.vy * self.vy + self.vz * self.vz).sqrt()
    }

    #[must_use]
    pub fn normalized(self) -> Self {
        let m = self.magnitude();
        if !m.is_finite() || m <= 0.0 {
            return Self::IDENTITY;
        }
        Self::new(self.w / m, self.vx / m, self.vy / m, self.vz / m)
    }

    #[must_use]
    pub const fn conjugate(self) -> Self {
        Self::new(self.w, -self.vx, -self.vy, -self.vz)
    }

    /// Hamilton product `self * rhs` (apply `rhs` first).
    #[must_use]
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.vx * rhs.vx - self.vy * rhs.vy - self.vz * rhs.vz,
            self.w * rhs.vx + self.vx * rhs.w + self.vy * rhs.vz - self.vz * rhs.vy,
            self.w * rhs.vy - self.vx * rhs.vz + self.vy * rhs.w + self.vz * rhs.vx,
            self.w * rhs.vz + self.vx * rhs.vy - self.vy * rhs.vx + self.vz * rhs.w,
        )
    }

    #[must_use]
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let q = Vec3::new(self.vx, self.vy, self.vz);
        let t = q.cross(v).mul_scalar(2.0);
        v + t.mul_scalar(self.w) + q.cross(t)
    }

    /// Rotate then translate a point.
    #[must_use]
    pub fn transform_point(self, p: Point3, translation: Vec3) -> Point3 {
        Point3::from(self.rotate(p.to_vec3())).add_vec(translation)
    }

    #[must_use]
    pub fn is_identity(self, tol: Tolerance) -> bool {
        (self.w.abs() - 1.0).abs() <= tol.eps
            && self.vx.abs() <= tol.eps
            && self.vy.abs() <= tol.eps
            && self.vz.abs() <= tol.eps
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Quaternion {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self::Output {
        Quaternion::mul(self, rhs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BBox
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min: Point3,
    pub max: Point3,
}

impl BBox {
    #[must_use]
    pub const fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn from_points(points: &[Point3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        Some(
            rest.iter()
                .fold(Self::new(*first, *first), |bbox, &p| bbox.expand_point(p)),
        )
    }

    #[must_use]
    pub fn center(self) -> Point3 {
        self.min.midpoint(self.max)
    }

    #[must_use]
    pub fn size(self) -> Vec3 {
        self.max.sub_point(self.min)
    }

    #[must_use]
    pub fn diagonal(self) -> f64 {
        self.size().length()
    }

    #[must_use]
    pub fn contains_point(self, p: Point3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    #[must_use]
    pub fn intersects(self, other: Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    #[must_use]
    pub fn expand_point(self, p: Point3) -> Self {
        Self::new(
            Point3::new(self.min.x.min(p.x), self.min.y.min(p.y), self.min.z.min(p.z)),
            Point3::new(self.max.x.max(p.x), self.max.y.max(p.y), self.max.z.max(p.z)),
        )
    }

    #[must_use]
    pub fn expand_by(self, amount: f64) -> Self {
        let d = Vec3::new(amount, amount, amount);
        Self::new(self.min - d, self.max + d)
    }

    #[must_use]
    pub fn expand_tolerance(self, tol: Tolerance) -> Self {
        self.expand_by(tol.eps)
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        self.expand_point(other.min).expand_point(other.max)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tolerance
// ─────────────────────────────────────────────────────────────────────────────

/// Tolerance configuration for geometric operations.
///
/// One model-space tolerance (`Tolerance::LENGTH` by default) is shared by curve
/// flattening, loop assembly, point containment and Boolean classification so the
/// components agree on what "coincident" means. Parameter-space work uses
/// `Tolerance::PARAM`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub eps: f64,
}

impl Tolerance {
    /// Model-space coincidence of points and curves (1e-6).
    pub const LENGTH: Self = Self { eps: 1e-6 };

    /// Comparisons in (u,v) parameter space (1e-9).
    pub const PARAM: Self = Self { eps: 1e-9 };

    /// Detecting zero-length vectors (1e-12).
    pub const ZERO_LENGTH: Self = Self { eps: 1e-12 };

    /// Loose tolerance for classification probes (1e-4).
    pub const LOOSE: Self = Self { eps: 1e-4 };

    #[must_use]
    pub const fn new(eps: f64) -> Self {
        Self { eps }
    }

    #[must_use]
    pub const fn eps_squared(self) -> f64 {
        self.eps * self.eps
    }

    #[must_use]
    pub fn scaled(self, scale: f64) -> Self {
        Self::new(self.eps * scale.abs())
    }

    #[must_use]
    pub fn approx_eq_f64(self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.eps
    }

    #[must_use]
    pub fn approx_eq_point3(self, a: Point3, b: Point3) -> bool {
        a.distance_squared_to(b) <= self.eps_squared()
    }

    #[must_use]
    pub fn approx_eq_vec3(self, a: Vec3, b: Vec3) -> bool {
        a.sub(b).length_squared() <= self.eps_squared()
    }

    #[must_use]
    pub fn is_zero_vec3(self, v: Vec3) -> bool {
        v.length_squared() <= self.eps_squared()
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::LENGTH
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_vec3_cross_follows_right_hand_rule() {
        assert_eq!(Vec3::X.cross(Vec3::Y), Vec3::Z);
        assert_eq!(Vec3::Y.cross(Vec3::Z), Vec3::X);
    }

    #[test]
    fn test_any_perpendicular_is_unit_and_orthogonal() {
        for v in [Vec3::X, Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 0.0, -5.0)] {
            let p = v.any_perpendicular();
            assert!((p.length() - 1.0).abs() < 1e-12);
            assert!(p.dot(v).abs() < 1e-12);
        }
    }

    #[test]
    fn test_quaternion_quarter_turn_about_z() {
        let q = Quaternion::from_axis_angle(Vec3::Z, FRAC_PI_2);
        let r = q.rotate(Vec3::X);
        assert!(Tolerance::LENGTH.approx_eq_vec3(r, Vec3::Y));
    }

    #[test]
    fn test_quaternion_identity_leaves_points() {
        let p = Point3::new(1.5, -2.0, 0.25);
        let out = Quaternion::IDENTITY.transform_point(p, Vec3::ZERO);
        assert_eq!(out, p);
    }

    #[test]
    fn test_quaternion_product_composes_rotations() {
        let a = Quaternion::from_axis_angle(Vec3::Z, FRAC_PI_2);
        let b = Quaternion::from_axis_angle(Vec3::X, FRAC_PI_2);
        let v = Vec3::new(0.3, -0.7, 1.1);
        let composed = (a * b).rotate(v);
        let sequential = a.rotate(b.rotate(v));
        assert!(Tolerance::LENGTH.approx_eq_vec3(composed, sequential));
    }

    #[test]
    fn test_bbox_from_points_and_intersects() {
        let a = BBox::from_points(&[Point3::ORIGIN, Point3::new(1.0, 1.0, 1.0)]).unwrap();
        let b = BBox::new(Point3::new(0.5, 0.5, 0.5), Point3::new(2.0, 2.0, 2.0));
        let c = BBox::new(Point3::new(1.5, 1.5, 1.5), Point3::new(2.0, 2.0, 2.0));
        assert!(a.intersects(b));
        assert!(!a.intersects(c));
        assert!(a.union(c).contains_point(Point3::new(1.8, 1.8, 1.8)));
        assert!(BBox::from_points(&[]).is_none());
    }

    #[test]
    fn test_distance_to_segment_clamps() {
        let p = Point3::new(2.0, 1.0, 0.0);
        let d = p.distance_to_segment(Point3::ORIGIN, Point3::new(1.0, 0.0, 0.0));
        assert!((d - 2.0_f64.sqrt()).abs() < 1e-12);
    }
}
