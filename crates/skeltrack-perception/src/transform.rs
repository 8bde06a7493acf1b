//! Rigid-body transform primitives.
//!
//! Translation + unit-quaternion rotation, composed the same way a TF tree
//! composes parent → child edges.  Quaternions are built either from a 3×3
//! rotation matrix (as delivered by the skeleton middleware) or from intrinsic
//! ZYX Euler angles.
//!
//! # Example
//!
//! ```rust
//! use skeltrack_perception::transform::{Quaternion, Transform3D, Vec3};
//!
//! let base = Transform3D::new(Vec3::new(1.0, 0.0, 0.0), Quaternion::identity());
//! let child = Transform3D::new(Vec3::new(0.5, 0.0, 0.0), Quaternion::identity());
//!
//! let t = base.compose(child);
//! assert!((t.translation.x - 1.5).abs() < 1e-9);
//! ```

use skeltrack_types::StampedTransform;

// ────────────────────────────────────────────────────────────────────────────
// Primitive types
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D translation vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Create a new vector.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1).
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation (no rotation).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation from a row-major 3×3 matrix.
    ///
    /// Picks the numerically largest of `w, x, y, z` to divide by, so the
    /// result stays stable near 180° rotations.
    pub fn from_rotation_matrix(m: &[f64; 9]) -> Self {
        let at = |r: usize, c: usize| m[r * 3 + c];
        let trace = at(0, 0) + at(1, 1) + at(2, 2);

        if trace > 1e-12 {
            let s = 0.5 / (trace + 1.0).sqrt();
            Self::new(
                0.25 / s,
                (at(2, 1) - at(1, 2)) * s,
                (at(0, 2) - at(2, 0)) * s,
                (at(1, 0) - at(0, 1)) * s,
            )
        } else if at(0, 0) > at(1, 1) && at(0, 0) > at(2, 2) {
            let s = 2.0 * (1.0 + at(0, 0) - at(1, 1) - at(2, 2)).sqrt();
            Self::new(
                (at(2, 1) - at(1, 2)) / s,
                0.25 * s,
                (at(0, 1) + at(1, 0)) / s,
                (at(0, 2) + at(2, 0)) / s,
            )
        } else if at(1, 1) > at(2, 2) {
            let s = 2.0 * (1.0 + at(1, 1) - at(0, 0) - at(2, 2)).sqrt();
            Self::new(
                (at(0, 2) - at(2, 0)) / s,
                (at(0, 1) + at(1, 0)) / s,
                0.25 * s,
                (at(1, 2) + at(2, 1)) / s,
            )
        } else {
            let s = 2.0 * (1.0 + at(2, 2) - at(0, 0) - at(1, 1)).sqrt();
            Self::new(
                (at(1, 0) - at(0, 1)) / s,
                (at(0, 2) + at(2, 0)) / s,
                (at(1, 2) + at(2, 1)) / s,
                0.25 * s,
            )
        }
    }

    /// Rotation from intrinsic ZYX Euler angles: yaw about Z, then pitch
    /// about the new Y, then roll about the newest X.
    pub fn from_euler_zyx(yaw: f64, pitch: f64, roll: f64) -> Self {
        let (sy, cy) = (yaw * 0.5).sin_cos();
        let (sp, cp) = (pitch * 0.5).sin_cos();
        let (sr, cr) = (roll * 0.5).sin_cos();
        Self::new(
            cr * cp * cy + sr * sp * sy,
            sr * cp * cy - cr * sp * sy,
            cr * sp * cy + sr * cp * sy,
            cr * cp * sy - sr * sp * cy,
        )
    }

    /// Hamilton product: compose two rotations.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }

    /// `[x, y, z, w]`, the order used on the wire.
    pub fn to_xyzw(self) -> [f64; 4] {
        [self.x, self.y, self.z, self.w]
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transform3D
// ────────────────────────────────────────────────────────────────────────────

/// A rigid-body 3-D transform: translation followed by rotation.
///
/// Represents the pose of frame B relative to frame A: to convert a point
/// expressed in frame B into frame A, rotate it by `rotation` then add
/// `translation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Quaternion,
}

impl Transform3D {
    /// Create a transform from a translation and rotation.
    pub fn new(translation: Vec3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// The identity transform (no translation, no rotation).
    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    /// Compose two transforms: `self · other`.
    ///
    /// If `self` = T_A_B and `other` = T_B_C, the result is T_A_C.
    pub fn compose(self, other: Self) -> Self {
        let translated = self.translation.add(self.rotation.rotate(other.translation));
        let rotated = self.rotation.mul(other.rotation);
        Self::new(translated, rotated)
    }

    /// The inverse transform (T_B_A for T_A_B).
    pub fn inverse(self) -> Self {
        let rotation = self.rotation.conjugate();
        let t = rotation.rotate(self.translation);
        Self::new(Vec3::new(-t.x, -t.y, -t.z), rotation)
    }

    /// Stamp this transform with its parent and child frame names.
    pub fn stamped(
        self,
        frame_id: impl Into<String>,
        child_frame_id: impl Into<String>,
    ) -> StampedTransform {
        StampedTransform {
            frame_id: frame_id.into(),
            child_frame_id: child_frame_id.into(),
            translation: [self.translation.x, self.translation.y, self.translation.z],
            rotation: self.rotation.to_xyzw(),
        }
    }
}

impl From<&StampedTransform> for Transform3D {
    fn from(msg: &StampedTransform) -> Self {
        let [x, y, z] = msg.translation;
        let [qx, qy, qz, qw] = msg.rotation;
        Self::new(Vec3::new(x, y, z), Quaternion::new(qw, qx, qy, qz))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_2};

    fn assert_quat_eq(a: Quaternion, b: Quaternion) {
        // q and -q are the same rotation.
        let same = (a.w - b.w).abs() < 1e-9
            && (a.x - b.x).abs() < 1e-9
            && (a.y - b.y).abs() < 1e-9
            && (a.z - b.z).abs() < 1e-9;
        let negated = (a.w + b.w).abs() < 1e-9
            && (a.x + b.x).abs() < 1e-9
            && (a.y + b.y).abs() < 1e-9
            && (a.z + b.z).abs() < 1e-9;
        assert!(same || negated, "{a:?} != {b:?}");
    }

    // ── Quaternion ──────────────────────────────────────────────────────────

    #[test]
    fn quaternion_identity_rotate_is_noop() {
        let r = Quaternion::identity().rotate(Vec3::new(1.0, 2.0, 3.0));
        assert!((r.x - 1.0).abs() < 1e-9);
        assert!((r.y - 2.0).abs() < 1e-9);
        assert!((r.z - 3.0).abs() < 1e-9);
    }

    #[test]
    fn quaternion_90deg_yaw_rotates_x_to_y() {
        let q = Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);
        let r = q.rotate(Vec3::new(1.0, 0.0, 0.0));
        assert!(r.x.abs() < 1e-9, "x should be ~0, got {}", r.x);
        assert!((r.y - 1.0).abs() < 1e-9, "y should be ~1, got {}", r.y);
        assert!(r.z.abs() < 1e-9);
    }

    #[test]
    fn identity_matrix_gives_identity_quaternion() {
        let m = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        assert_quat_eq(Quaternion::from_rotation_matrix(&m), Quaternion::identity());
    }

    #[test]
    fn yaw_matrix_matches_axis_angle() {
        // 90° about Z, row-major.
        let m = [0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0];
        let q = Quaternion::from_rotation_matrix(&m);
        assert_quat_eq(q, Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2));
    }

    #[test]
    fn half_turn_matrices_take_the_non_trace_branches() {
        // 180° about X, Y and Z: trace = -1 in every case.
        let about_x = [1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, -1.0];
        let about_y = [-1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, -1.0];
        let about_z = [-1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, 1.0];
        assert_quat_eq(Quaternion::from_rotation_matrix(&about_x), Quaternion::new(0.0, 1.0, 0.0, 0.0));
        assert_quat_eq(Quaternion::from_rotation_matrix(&about_y), Quaternion::new(0.0, 0.0, 1.0, 0.0));
        assert_quat_eq(Quaternion::from_rotation_matrix(&about_z), Quaternion::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn matrix_quaternion_rotates_like_the_matrix() {
        // 90° about X: y → z.
        let m = [1.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0, 1.0, 0.0];
        let r = Quaternion::from_rotation_matrix(&m).rotate(Vec3::new(0.0, 1.0, 0.0));
        assert!(r.x.abs() < 1e-9);
        assert!(r.y.abs() < 1e-9);
        assert!((r.z - 1.0).abs() < 1e-9);
    }

    #[test]
    fn euler_zyx_single_axes() {
        let yaw = Quaternion::from_euler_zyx(FRAC_PI_2, 0.0, 0.0);
        assert_quat_eq(yaw, Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2));
        let roll = Quaternion::from_euler_zyx(0.0, 0.0, FRAC_PI_2);
        assert_quat_eq(roll, Quaternion::new(FRAC_1_SQRT_2, FRAC_1_SQRT_2, 0.0, 0.0));
    }

    #[test]
    fn euler_zyx_is_yaw_then_roll() {
        let composed = Quaternion::from_euler_zyx(FRAC_PI_2, 0.0, 0.0)
            .mul(Quaternion::from_euler_zyx(0.0, 0.0, FRAC_PI_2));
        assert_quat_eq(Quaternion::from_euler_zyx(FRAC_PI_2, 0.0, FRAC_PI_2), composed);
    }

    #[test]
    fn quaternion_conjugate_is_inverse() {
        let q = Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);
        assert_quat_eq(q.mul(q.conjugate()), Quaternion::identity());
    }

    // ── Transform3D ─────────────────────────────────────────────────────────

    #[test]
    fn transform_compose_translations_add() {
        let t1 = Transform3D::new(Vec3::new(1.0, 0.0, 0.0), Quaternion::identity());
        let t2 = Transform3D::new(Vec3::new(2.0, 0.0, 0.0), Quaternion::identity());
        assert!((t1.compose(t2).translation.x - 3.0).abs() < 1e-9);
    }

    #[test]
    fn compose_respects_parent_rotation() {
        let q90z = Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);
        let parent = Transform3D::new(Vec3::zero(), q90z);
        let child = Transform3D::new(Vec3::new(1.0, 0.0, 0.0), Quaternion::identity());
        let t = parent.compose(child);
        assert!(t.translation.x.abs() < 1e-9, "x={}", t.translation.x);
        assert!((t.translation.y - 1.0).abs() < 1e-9, "y={}", t.translation.y);
    }

    #[test]
    fn inverse_undoes_compose() {
        let q90z = Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);
        let t = Transform3D::new(Vec3::new(1.0, -2.0, 0.5), q90z);
        let round = t.inverse().compose(t);
        assert!(round.translation.x.abs() < 1e-9);
        assert!(round.translation.y.abs() < 1e-9);
        assert!(round.translation.z.abs() < 1e-9);
        assert_quat_eq(round.rotation, Quaternion::identity());
    }

    #[test]
    fn identity_is_neutral_for_compose() {
        let q90z = Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);
        let t = Transform3D::new(Vec3::new(1.0, -2.0, 0.5), q90z);
        assert_eq!(Transform3D::identity().compose(t), t);
        assert_eq!(t.compose(Transform3D::identity()), t);
        assert_eq!(Transform3D::identity().inverse(), Transform3D::identity());
    }

    #[test]
    fn stamped_uses_xyzw_order() {
        let t = Transform3D::new(Vec3::new(1.0, 2.0, 3.0), Quaternion::new(0.5, 0.5, 0.5, 0.5));
        let msg = t.stamped("base", "head_1");
        assert_eq!(msg.frame_id, "base");
        assert_eq!(msg.child_frame_id, "head_1");
        assert_eq!(msg.translation, [1.0, 2.0, 3.0]);
        assert_eq!(msg.rotation, [0.5, 0.5, 0.5, 0.5]);
        assert_eq!(Transform3D::from(&msg), t);
    }
}
