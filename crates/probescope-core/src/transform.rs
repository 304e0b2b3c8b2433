//! Rigid pose math for probes and scene objects.
//!
//! Stereotaxic world axes are `x = ML` (right positive), `y = AP` (anterior
//! positive) and `z = DV` (dorsal positive), in micrometers from bregma. An
//! orientation is three angles in degrees, `(elevation, spin, azimuth)`, composed as
//!
//! ```text
//! R = Rz(azimuth) * Rx(elevation) * Ry(spin)
//! ```
//!
//! so a local vector is spun about the probe's own Y axis first, then tilted, then
//! turned about the world DV axis. The probe's local +Y axis runs from the tip up
//! the shank; `(90, 0, 0)` is a vertical probe.
//!
//! # Gimbal lock
//!
//! At `elevation = ±90` only `azimuth ± spin` is recoverable from a matrix.
//! [`to_euler`] then reports `spin = 0`, and [`to_euler_near`] keeps the hint's
//! spin. This loss of distinction is inherent to the angle set and is accepted;
//! [`Pose`] keeps its angles alongside the rotation so user-facing values never
//! jump because of it.

use std::ops::{Add, Neg, Sub};

use glam::{DMat3, DMat4, DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::error::{ProbescopeError, Result};

const GIMBAL_EPS: f64 = 1e-9;

/// Wraps an angle in degrees into `(-180, 180]`.
#[must_use]
pub fn normalize_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Probe orientation angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EulerAngles {
    /// Rotation about the X axis (tilt).
    pub elevation: f64,
    /// Rotation about the probe's own Y axis.
    pub spin: f64,
    /// Rotation about the world Z (DV) axis.
    pub azimuth: f64,
}

impl EulerAngles {
    /// Angles of a vertical probe with the shank pointing up from the tip.
    pub const VERTICAL: Self = Self {
        elevation: 90.0,
        spin: 0.0,
        azimuth: 0.0,
    };

    /// Creates a new angle triple.
    #[must_use]
    pub const fn new(elevation: f64, spin: f64, azimuth: f64) -> Self {
        Self {
            elevation,
            spin,
            azimuth,
        }
    }

    /// Creates angles from an `[elevation, spin, azimuth]` array.
    #[must_use]
    pub const fn from_array(a: [f64; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }

    /// Returns `[elevation, spin, azimuth]`.
    #[must_use]
    pub const fn to_array(self) -> [f64; 3] {
        [self.elevation, self.spin, self.azimuth]
    }

    /// Returns the angles wrapped into `(-180, 180]`.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self::new(
            normalize_degrees(self.elevation),
            normalize_degrees(self.spin),
            normalize_degrees(self.azimuth),
        )
    }

    /// Returns true if every angle is finite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.elevation.is_finite() && self.spin.is_finite() && self.azimuth.is_finite()
    }

    /// Squared angular distance, with each component wrapped.
    fn wrapped_distance2(self, other: Self) -> f64 {
        let d = (self - other).normalized();
        d.elevation * d.elevation + d.spin * d.spin + d.azimuth * d.azimuth
    }
}

impl Add for EulerAngles {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(
            self.elevation + rhs.elevation,
            self.spin + rhs.spin,
            self.azimuth + rhs.azimuth,
        )
    }
}

impl Sub for EulerAngles {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(
            self.elevation - rhs.elevation,
            self.spin - rhs.spin,
            self.azimuth - rhs.azimuth,
        )
    }
}

impl Neg for EulerAngles {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.elevation, -self.spin, -self.azimuth)
    }
}

/// Builds the rotation matrix for an angle triple.
#[must_use]
pub fn from_euler(angles: EulerAngles) -> DMat3 {
    DMat3::from_rotation_z(angles.azimuth.to_radians())
        * DMat3::from_rotation_x(angles.elevation.to_radians())
        * DMat3::from_rotation_y(angles.spin.to_radians())
}

/// Row-major element access on a column-major matrix.
fn at(m: &DMat3, row: usize, col: usize) -> f64 {
    m.col(col)[row]
}

/// Recovers angles from a rotation matrix, with elevation in `[-90, 90]`.
///
/// Round-trips [`from_euler`] for inputs whose elevation already lies in that
/// range and is away from gimbal lock.
#[must_use]
pub fn to_euler(matrix: &DMat3) -> EulerAngles {
    let cos_el = at(matrix, 2, 0).hypot(at(matrix, 2, 2));
    if cos_el < GIMBAL_EPS {
        return gimbal_locked(matrix, 0.0);
    }
    EulerAngles::new(
        at(matrix, 2, 1).atan2(cos_el).to_degrees(),
        (-at(matrix, 2, 0)).atan2(at(matrix, 2, 2)).to_degrees(),
        (-at(matrix, 0, 1)).atan2(at(matrix, 1, 1)).to_degrees(),
    )
    .normalized()
}

/// Recovers the angle triple nearest `hint` that produces `matrix`.
///
/// Every non-degenerate rotation has two triples,
/// `(e, s, a)` and `(180 - e, s + 180, a + 180)`; this picks the one closest to
/// the hint. At gimbal lock the hint's spin is kept.
#[must_use]
pub fn to_euler_near(matrix: &DMat3, hint: EulerAngles) -> EulerAngles {
    let cos_el = at(matrix, 2, 0).hypot(at(matrix, 2, 2));
    if cos_el < GIMBAL_EPS {
        return gimbal_locked(matrix, hint.spin);
    }
    let principal = to_euler(matrix);
    let mirrored = EulerAngles::new(
        180.0 - principal.elevation,
        principal.spin + 180.0,
        principal.azimuth + 180.0,
    )
    .normalized();
    if mirrored.wrapped_distance2(hint) < principal.wrapped_distance2(hint) {
        mirrored
    } else {
        principal
    }
}

fn gimbal_locked(matrix: &DMat3, spin: f64) -> EulerAngles {
    let r00 = at(matrix, 0, 0);
    let r02 = at(matrix, 0, 2);
    if at(matrix, 2, 1) > 0.0 {
        // Only azimuth + spin is observable.
        let sum = r02.atan2(r00).to_degrees();
        EulerAngles::new(90.0, spin, sum - spin).normalized()
    } else {
        // Only azimuth - spin is observable.
        let diff = (-r02).atan2(r00).to_degrees();
        EulerAngles::new(-90.0, spin, diff + spin).normalized()
    }
}

/// Returns true if `m` is a proper rotation within `tol`.
#[must_use]
pub fn is_orthonormal(m: &DMat3, tol: f64) -> bool {
    let columns_unit = [m.x_axis, m.y_axis, m.z_axis]
        .iter()
        .all(|c| (c.length() - 1.0).abs() <= tol);
    let orthogonal = m.x_axis.dot(m.y_axis).abs() <= tol
        && m.y_axis.dot(m.z_axis).abs() <= tol
        && m.z_axis.dot(m.x_axis).abs() <= tol;
    columns_unit && orthogonal && (m.determinant() - 1.0).abs() <= tol
}

/// A rigid placement: a position plus an orientation kept both as angles and as a
/// unit quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "PoseRecord", into = "PoseRecord")]
pub struct Pose {
    position: DVec3,
    angles: EulerAngles,
    rotation: DQuat,
}

#[derive(Serialize, Deserialize)]
struct PoseRecord {
    position: DVec3,
    angles: EulerAngles,
}

impl From<PoseRecord> for Pose {
    fn from(r: PoseRecord) -> Self {
        Self::new(r.position, r.angles)
    }
}

impl From<Pose> for PoseRecord {
    fn from(p: Pose) -> Self {
        Self {
            position: p.position,
            angles: p.angles,
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// The identity pose at bregma.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            position: DVec3::ZERO,
            angles: EulerAngles::default(),
            rotation: DQuat::IDENTITY,
        }
    }

    /// Creates a pose from a position and angles. Angles are normalized.
    #[must_use]
    pub fn new(position: DVec3, angles: EulerAngles) -> Self {
        let angles = angles.normalized();
        Self {
            position,
            angles,
            rotation: DQuat::from_mat3(&from_euler(angles)).normalize(),
        }
    }

    /// Like [`Pose::new`] but rejects non-finite input.
    pub fn try_new(position: DVec3, angles: EulerAngles) -> Result<Self> {
        if !position.is_finite() {
            return Err(ProbescopeError::InvalidPose(format!(
                "non-finite position {position}"
            )));
        }
        if !angles.is_finite() {
            return Err(ProbescopeError::InvalidPose(format!(
                "non-finite angles {:?}",
                angles.to_array()
            )));
        }
        Ok(Self::new(position, angles))
    }

    /// A pure translation.
    #[must_use]
    pub fn from_translation(translation: DVec3) -> Self {
        Self {
            position: translation,
            ..Self::identity()
        }
    }

    /// A pure rotation about the origin.
    #[must_use]
    pub fn from_angles(angles: EulerAngles) -> Self {
        Self::new(DVec3::ZERO, angles)
    }

    /// Creates a pose from a rotation matrix, choosing angles near `hint`.
    #[must_use]
    pub fn from_rotation_matrix(position: DVec3, rotation: &DMat3, hint: EulerAngles) -> Self {
        let quat = DQuat::from_mat3(rotation).normalize();
        Self {
            position,
            angles: to_euler_near(&DMat3::from_quat(quat), hint),
            rotation: quat,
        }
    }

    /// Returns the position in micrometers from bregma.
    #[must_use]
    pub fn position(&self) -> DVec3 {
        self.position
    }

    /// Returns the orientation angles in degrees.
    #[must_use]
    pub fn angles(&self) -> EulerAngles {
        self.angles
    }

    /// Returns the orientation quaternion.
    #[must_use]
    pub fn rotation(&self) -> DQuat {
        self.rotation
    }

    /// Returns the orientation as a 3x3 matrix.
    #[must_use]
    pub fn rotation_matrix(&self) -> DMat3 {
        DMat3::from_quat(self.rotation)
    }

    /// Returns a copy moved to `position`.
    #[must_use]
    pub fn with_position(self, position: DVec3) -> Self {
        Self { position, ..self }
    }

    /// Returns a copy with new angles, keeping the position.
    #[must_use]
    pub fn with_angles(self, angles: EulerAngles) -> Self {
        Self::new(self.position, angles)
    }

    /// Returns a copy with `delta` added to the angles.
    ///
    /// The rotation is rebuilt from the summed angles, so repeated increments never
    /// accumulate drift.
    #[must_use]
    pub fn rotated_by(self, delta: EulerAngles) -> Self {
        self.with_angles(self.angles + delta)
    }

    /// Maps a point from this pose's local frame to the parent frame.
    #[must_use]
    pub fn transform_point(&self, local: DVec3) -> DVec3 {
        self.position + self.rotation * local
    }

    /// Maps a direction from this pose's local frame to the parent frame.
    #[must_use]
    pub fn transform_vector(&self, local: DVec3) -> DVec3 {
        self.rotation * local
    }

    /// Returns the inverse pose.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let inv = self.rotation.inverse();
        let position = -(inv * self.position);
        let rotation = DMat3::from_quat(inv);
        Self::from_rotation_matrix(position, &rotation, -self.angles)
    }

    /// Returns true if both position and angles are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.angles.is_finite()
    }
}

/// Applies `b` in the frame that results from `a`.
///
/// The returned pose places `b`'s origin at `a.transform_point(b.position)` with
/// rotation `a * b`; neither input is modified. Angles are recovered nearest to
/// `a.angles + b.angles`, which is exact for pure spin or pure azimuth deltas.
/// A pure translation keeps `a`'s angles as they are.
#[must_use]
pub fn compose(a: &Pose, b: &Pose) -> Pose {
    if b.rotation == DQuat::IDENTITY {
        // Pure translation: the orientation is untouched.
        return Pose {
            position: a.transform_point(b.position),
            ..*a
        };
    }
    let rotation = (a.rotation * b.rotation).normalize();
    Pose {
        position: a.transform_point(b.position),
        angles: to_euler_near(&DMat3::from_quat(rotation), a.angles + b.angles),
        rotation,
    }
}

/// Returns the 4x4 homogeneous matrix of a pose.
#[must_use]
pub fn to_matrix(pose: &Pose) -> DMat4 {
    DMat4::from_rotation_translation(pose.rotation, pose.position)
}

/// Rotation applied about x, then y, then z (`Rz * Ry * Rx`), in degrees.
///
/// Used for mesh placement and atlas axes, which are specified in this order
/// rather than the probe convention.
#[must_use]
pub fn rotation_xyz(degrees: [f64; 3]) -> DMat3 {
    DMat3::from_rotation_z(degrees[2].to_radians())
        * DMat3::from_rotation_y(degrees[1].to_radians())
        * DMat3::from_rotation_x(degrees[0].to_radians())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_angles_close(a: EulerAngles, b: EulerAngles, tol: f64) {
        assert!(
            a.wrapped_distance2(b).sqrt() < tol,
            "{:?} != {:?}",
            a.to_array(),
            b.to_array()
        );
    }

    #[test]
    fn test_normalize_degrees() {
        assert_eq!(normalize_degrees(180.0), 180.0);
        assert_eq!(normalize_degrees(-180.0), 180.0);
        assert_eq!(normalize_degrees(190.0), -170.0);
        assert_eq!(normalize_degrees(-350.0), 10.0);
        assert_eq!(normalize_degrees(720.0), 0.0);
    }

    #[test]
    fn test_vertical_probe_points_up() {
        let r = from_euler(EulerAngles::VERTICAL);
        let axis = r * DVec3::Y;
        assert!((axis - DVec3::Z).length() < 1e-12);
    }

    #[test]
    fn test_euler_roundtrip_principal_branch() {
        let angles = EulerAngles::new(30.0, 20.0, -45.0);
        let back = to_euler(&from_euler(angles));
        assert_angles_close(back, angles, 1e-9);
    }

    #[test]
    fn test_euler_near_keeps_steep_elevation() {
        let angles = EulerAngles::new(115.0, 0.0, -10.0);
        let m = from_euler(angles);
        let principal = to_euler(&m);
        assert!(principal.elevation <= 90.0);
        assert!(from_euler(principal).abs_diff_eq(m, 1e-9));
        assert_angles_close(to_euler_near(&m, angles), angles, 1e-9);
    }

    #[test]
    fn test_gimbal_lock_keeps_hint_spin() {
        let angles = EulerAngles::new(90.0, 25.0, 10.0);
        let m = from_euler(angles);
        assert_angles_close(to_euler_near(&m, angles), angles, 1e-6);

        // Without a hint only the sum is recovered.
        let plain = to_euler(&m);
        assert_eq!(plain.spin, 0.0);
        assert!((plain.azimuth - 35.0).abs() < 1e-6);
    }

    #[test]
    fn test_compose_applies_in_local_frame() {
        let a = Pose::new(DVec3::new(100.0, 0.0, 0.0), EulerAngles::VERTICAL);
        let step = Pose::from_translation(DVec3::new(0.0, -50.0, 0.0));
        let moved = compose(&a, &step);
        assert!((moved.position() - DVec3::new(100.0, 0.0, -50.0)).length() < 1e-9);
        assert_angles_close(moved.angles(), a.angles(), 1e-9);
        // Inputs untouched.
        assert_eq!(a.position(), DVec3::new(100.0, 0.0, 0.0));
    }

    #[test]
    fn test_compose_with_inverse_is_identity() {
        let a = Pose::new(DVec3::new(1.0, -2.0, 3.0), EulerAngles::new(40.0, 10.0, 70.0));
        let id = compose(&a, &a.inverse());
        assert!(id.position().length() < 1e-9);
        assert!(id.rotation().angle_between(DQuat::IDENTITY) < 1e-9);
    }

    #[test]
    fn test_rotation_xyz_order() {
        // x first: Y -> Z, then z by 90 leaves Z alone.
        let r = rotation_xyz([90.0, 0.0, 90.0]);
        assert!((r * DVec3::Y).abs_diff_eq(DVec3::Z, 1e-12));
        assert!((r * DVec3::X).abs_diff_eq(DVec3::Y, 1e-12));
    }

    #[test]
    fn test_matrix_layout() {
        let pose = Pose::new(DVec3::new(5.0, 6.0, 7.0), EulerAngles::new(0.0, 0.0, 90.0));
        let m = to_matrix(&pose);
        assert_eq!(m.w_axis.truncate(), DVec3::new(5.0, 6.0, 7.0));
        let x = m.transform_vector3(DVec3::X);
        assert!((x - DVec3::Y).length() < 1e-12);
    }

    #[test]
    fn test_try_new_rejects_nan() {
        assert!(Pose::try_new(DVec3::new(f64::NAN, 0.0, 0.0), EulerAngles::default()).is_err());
        assert!(Pose::try_new(DVec3::ZERO, EulerAngles::new(0.0, f64::INFINITY, 0.0)).is_err());
    }

    #[test]
    fn test_pose_serde_roundtrip() {
        let pose = Pose::new(DVec3::new(-1578.0, -2485.0, 12.5), EulerAngles::new(115.0, 0.0, -10.0));
        let json = serde_json::to_string(&pose).unwrap();
        let back: Pose = serde_json::from_str(&json).unwrap();
        assert_eq!(back.position(), pose.position());
        assert_angles_close(back.angles(), pose.angles(), 1e-12);
    }

    proptest::proptest! {
        #[test]
        fn prop_euler_near_roundtrip(
            el in -179.0f64..179.0,
            sp in -179.0f64..179.0,
            az in -179.0f64..179.0,
        ) {
            proptest::prop_assume!((el.abs() - 90.0).abs() > 1e-3);
            let angles = EulerAngles::new(el, sp, az);
            let back = to_euler_near(&from_euler(angles), angles);
            proptest::prop_assert!(back.wrapped_distance2(angles).sqrt() < 1e-6);
        }
    }
}
