use bitflags::bitflags;
use glam::{Affine3A, EulerRot, Quat, Vec3};

bitflags! {
    /// Channels baked by a freeze (`makeIdentity -apply`).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct FreezeChannels: u8 {
        const TRANSLATE = 1 << 0;
        const ROTATE    = 1 << 1;
        const SCALE     = 1 << 2;
    }
}

/// Transform component
///
/// Translation, rotation (XYZ Euler angles in radians, applied X first),
/// scale and, for joints, a joint orient. The local matrix is
/// `T * JO * R * S`; for plain transforms the joint orient stays identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
    pub joint_orient: Quat,
}

impl Transform {
    #[must_use]
    pub fn new() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            joint_orient: Quat::IDENTITY,
        }
    }

    /// Rotate channels as a quaternion (X applied first, then Y, then Z).
    #[inline]
    #[must_use]
    pub fn rotation_quat(&self) -> Quat {
        Quat::from_euler(EulerRot::ZYX, self.rotation.z, self.rotation.y, self.rotation.x)
    }

    pub fn set_rotation_quat(&mut self, rotation: Quat) {
        let (z, y, x) = rotation.to_euler(EulerRot::ZYX);
        self.rotation = Vec3::new(x, y, z);
    }

    /// Joint orient followed by the rotate channels.
    #[inline]
    #[must_use]
    pub fn total_rotation(&self) -> Quat {
        self.joint_orient * self.rotation_quat()
    }

    #[must_use]
    pub fn local_matrix(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.total_rotation(), self.translation)
    }

    /// Overwrites TRS from a matrix.
    ///
    /// Joints keep their rotate channels and absorb the rotation difference
    /// into the joint orient; plain transforms take it on the rotate channels.
    /// Shear is lost in the decomposition.
    pub fn set_local_matrix(&mut self, matrix: Affine3A, is_joint: bool) {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        self.translation = translation;
        self.scale = scale;
        if is_joint {
            self.joint_orient = (rotation * self.rotation_quat().inverse()).normalize();
        } else {
            self.joint_orient = Quat::IDENTITY;
            self.set_rotation_quat(rotation);
        }
    }

    /// Bakes a joint's rotate channels into its joint orient.
    ///
    /// The local matrix is unchanged.
    pub fn orient_from_rotation(&mut self) {
        self.joint_orient = self.total_rotation().normalize();
        self.rotation = Vec3::ZERO;
    }

    /// The part of the local matrix that survives a freeze of `channels`.
    ///
    /// Joint orient is rest state and always survives.
    #[must_use]
    pub fn kept_matrix(&self, channels: FreezeChannels) -> Affine3A {
        let translation = if channels.contains(FreezeChannels::TRANSLATE) {
            Vec3::ZERO
        } else {
            self.translation
        };
        let rotation = if channels.contains(FreezeChannels::ROTATE) {
            self.joint_orient
        } else {
            self.total_rotation()
        };
        let scale = if channels.contains(FreezeChannels::SCALE) {
            Vec3::ONE
        } else {
            self.scale
        };
        Affine3A::from_scale_rotation_translation(scale, rotation, translation)
    }

    /// Resets the frozen channels to their identity values.
    pub fn reset(&mut self, channels: FreezeChannels) {
        if channels.contains(FreezeChannels::TRANSLATE) {
            self.translation = Vec3::ZERO;
        }
        if channels.contains(FreezeChannels::ROTATE) {
            self.rotation = Vec3::ZERO;
        }
        if channels.contains(FreezeChannels::SCALE) {
            self.scale = Vec3::ONE;
        }
    }

    #[must_use]
    pub fn has_rotation(&self, epsilon: f32) -> bool {
        self.rotation.abs().max_element() > epsilon
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_rotation_quat_round_trip() {
        let mut t = Transform::new();
        t.rotation = Vec3::new(0.3, -0.2, 0.7);
        let q = t.rotation_quat();

        let mut u = Transform::new();
        u.set_rotation_quat(q);
        assert!((u.rotation - t.rotation).abs().max_element() < EPSILON);
    }

    #[test]
    fn test_orient_from_rotation_keeps_matrix() {
        let mut t = Transform::new();
        t.translation = Vec3::new(1.0, 2.0, 3.0);
        t.rotation = Vec3::new(0.0, FRAC_PI_2, 0.0);
        let before = t.local_matrix();

        t.orient_from_rotation();

        assert_eq!(t.rotation, Vec3::ZERO);
        assert!(t.local_matrix().abs_diff_eq(before, EPSILON));
    }

    #[test]
    fn test_kept_matrix_translation_only() {
        let mut t = Transform::new();
        t.translation = Vec3::new(4.0, 0.0, 0.0);
        t.rotation = Vec3::new(0.5, 0.0, 0.0);
        t.scale = Vec3::splat(2.0);

        let kept = t.kept_matrix(FreezeChannels::ROTATE | FreezeChannels::SCALE);
        assert!(kept.abs_diff_eq(Affine3A::from_translation(Vec3::new(4.0, 0.0, 0.0)), EPSILON));
    }

    #[test]
    fn test_set_local_matrix_joint_keeps_rotate_channels() {
        let mut t = Transform::new();
        t.rotation = Vec3::new(0.0, 0.0, 0.4);
        let target = Affine3A::from_rotation_z(1.0);

        t.set_local_matrix(target, true);

        assert!((t.rotation.z - 0.4).abs() < EPSILON);
        assert!(t.local_matrix().abs_diff_eq(target, EPSILON));
    }
}
