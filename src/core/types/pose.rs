//! SE(3) pose and twist types.

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use super::Point3D;

/// Rigid transform in SE(3).
///
/// Composition follows the usual convention: `a.compose(&b)` applies `b`
/// in the frame of `a`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose3D {
    /// Translation in meters.
    pub translation: Vector3<f64>,
    /// Rotation as a unit quaternion.
    pub rotation: UnitQuaternion<f64>,
}

impl Pose3D {
    /// Create a pose from translation and rotation.
    #[inline]
    pub fn new(translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Identity transform.
    #[inline]
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Pure translation.
    #[inline]
    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            translation: Vector3::new(x, y, z),
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Compose two poses: `self ⊕ other`.
    #[inline]
    pub fn compose(&self, other: &Pose3D) -> Pose3D {
        Pose3D {
            translation: self.translation + self.rotation * other.translation,
            rotation: self.rotation * other.rotation,
        }
    }

    /// Inverse transform.
    #[inline]
    pub fn inverse(&self) -> Pose3D {
        let inv_rot = self.rotation.inverse();
        Pose3D {
            translation: -(inv_rot * self.translation),
            rotation: inv_rot,
        }
    }

    /// This pose expressed in the frame of `reference`: `reference⁻¹ ⊕ self`.
    #[inline]
    pub fn relative_to(&self, reference: &Pose3D) -> Pose3D {
        reference.inverse().compose(self)
    }

    /// Euclidean norm of the translation component, in meters.
    #[inline]
    pub fn translation_norm(&self) -> f64 {
        self.translation.norm()
    }

    /// Transform a point from the local frame to the parent frame.
    #[inline]
    pub fn transform_point(&self, point: &Point3D) -> Point3D {
        let p = self.rotation * Vector3::new(point.x, point.y, point.z) + self.translation;
        Point3D::new(p.x, p.y, p.z)
    }
}

impl Default for Pose3D {
    fn default() -> Self {
        Self::identity()
    }
}

/// Instantaneous SE(3) velocity.
///
/// The angular rates are reserved for a future rotational motion prior and
/// are currently always zero; the prediction below uses the linear part
/// only.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Twist3D {
    /// Linear velocity along x, m/s.
    pub vx: f64,
    /// Linear velocity along y, m/s.
    pub vy: f64,
    /// Linear velocity along z, m/s.
    pub vz: f64,
    /// Angular rate about x, rad/s. Reserved, always zero.
    pub wx: f64,
    /// Angular rate about y, rad/s. Reserved, always zero.
    pub wy: f64,
    /// Angular rate about z, rad/s. Reserved, always zero.
    pub wz: f64,
}

impl Twist3D {
    /// Zero twist.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Constant-velocity prediction of the relative motion over `dt` seconds.
    ///
    /// Returns the identity when `dt <= 0`. The rotational component is
    /// left at identity while the angular rates stay reserved.
    pub fn motion_guess(&self, dt: f64) -> Pose3D {
        if dt <= 0.0 {
            return Pose3D::identity();
        }
        Pose3D::from_translation(self.vx * dt, self.vy * dt, self.vz * dt)
    }

    /// Re-estimate the linear velocity from a registered relative pose.
    ///
    /// Keeps the previous estimate when `dt <= 0`.
    pub fn update_from(&mut self, rel_pose: &Pose3D, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        self.vx = rel_pose.translation.x / dt;
        self.vy = rel_pose.translation.y / dt;
        self.vz = rel_pose.translation.z / dt;
    }

    /// Magnitude of the linear velocity, m/s.
    pub fn linear_norm(&self) -> f64 {
        (self.vx * self.vx + self.vy * self.vy + self.vz * self.vz).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_compose_identity() {
        let p = Pose3D::from_translation(1.0, 2.0, 3.0);
        let result = p.compose(&Pose3D::identity());
        assert_relative_eq!(result.translation.x, 1.0);
        assert_relative_eq!(result.translation.y, 2.0);
        assert_relative_eq!(result.translation.z, 3.0);
    }

    #[test]
    fn test_inverse_roundtrip() {
        let p = Pose3D::new(
            Vector3::new(1.0, -2.0, 0.5),
            UnitQuaternion::from_euler_angles(0.1, -0.2, 0.3),
        );
        let result = p.compose(&p.inverse());
        assert_relative_eq!(result.translation_norm(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(result.rotation.angle(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_compose_rotates_translation() {
        let yaw = Pose3D::new(
            Vector3::zeros(),
            UnitQuaternion::from_euler_angles(0.0, 0.0, FRAC_PI_2),
        );
        let forward = Pose3D::from_translation(1.0, 0.0, 0.0);
        let result = yaw.compose(&forward);
        assert_relative_eq!(result.translation.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(result.translation.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_relative_to() {
        let a = Pose3D::from_translation(1.0, 0.0, 0.0);
        let b = Pose3D::from_translation(3.0, 0.0, 0.0);
        let rel = b.relative_to(&a);
        assert_relative_eq!(rel.translation.x, 2.0, epsilon = 1e-12);
        assert_relative_eq!(rel.translation_norm(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_transform_point() {
        let pose = Pose3D::new(
            Vector3::new(1.0, 0.0, 0.0),
            UnitQuaternion::from_euler_angles(0.0, 0.0, FRAC_PI_2),
        );
        let p = pose.transform_point(&Point3D::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_motion_guess_zero_dt() {
        let twist = Twist3D {
            vx: 2.0,
            vy: 1.0,
            ..Twist3D::zero()
        };
        let guess = twist.motion_guess(0.0);
        assert_relative_eq!(guess.translation_norm(), 0.0);
    }

    #[test]
    fn test_motion_guess_scales_with_dt() {
        let twist = Twist3D {
            vx: 2.0,
            vy: -1.0,
            vz: 0.5,
            ..Twist3D::zero()
        };
        let guess = twist.motion_guess(0.5);
        assert_relative_eq!(guess.translation.x, 1.0);
        assert_relative_eq!(guess.translation.y, -0.5);
        assert_relative_eq!(guess.translation.z, 0.25);
        assert_relative_eq!(guess.rotation.angle(), 0.0);
    }

    #[test]
    fn test_twist_update_from_rel_pose() {
        let mut twist = Twist3D::zero();
        twist.update_from(&Pose3D::from_translation(1.2, 0.0, -0.6), 0.2);
        assert_relative_eq!(twist.vx, 6.0);
        assert_relative_eq!(twist.vz, -3.0);

        // dt = 0 keeps the previous estimate instead of dividing by zero
        twist.update_from(&Pose3D::from_translation(9.9, 0.0, 0.0), 0.0);
        assert_relative_eq!(twist.vx, 6.0);
    }

    #[test]
    fn test_twist_zero_from_identity_motion() {
        let mut twist = Twist3D {
            vx: 3.0,
            ..Twist3D::zero()
        };
        twist.update_from(&Pose3D::identity(), 0.1);
        assert_relative_eq!(twist.linear_norm(), 0.0);
    }
}
