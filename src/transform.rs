//! Parent-relative rigid transforms with per-axis scale.
//!
//! A [`Transform`] is the local placement of a scene entity: where it sits,
//! how it is oriented, and how it is stretched **relative to its parent's
//! frame** (or the world frame, for roots). The scene composes these up the
//! parent chain to obtain world matrices.
//!
//! # Transformation Order
//!
//! [`Transform::matrix()`] produces `Translate · Rotate · Scale`:
//! 1. The object is scaled in its own local space
//! 2. Then rotated about its local origin
//! 3. Finally translated into the parent's frame
//!
//! ```
//! use pivot::{Transform, Vec3};
//! use pivot::math::rotation_y;
//!
//! let transform = Transform::new()
//!     .translation(Vec3::new(0.0, 0.25, 0.0))
//!     .rotation(rotation_y(40.0))
//!     .uniform_scale(0.5);
//!
//! let local = transform.matrix();
//! assert!(local.transform_point3(Vec3::ZERO).abs_diff_eq(Vec3::new(0.0, 0.25, 0.0), 1e-6));
//! ```

use glam::{Mat4, Quat, Vec3};

/// Translation, rotation and scale of an entity relative to its parent.
///
/// `rotation` is expected to be unit length; `scale` is componentwise. A zero
/// scale component is allowed and simply yields a singular matrix.
///
/// # Default Values
///
/// - `translation`: `(0, 0, 0)`
/// - `rotation`: identity quaternion
/// - `scale`: `(1, 1, 1)`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// Offset from the parent's origin.
    pub translation: Vec3,
    /// Orientation as a unit quaternion.
    pub rotation: Quat,
    /// Scale factors for each local axis.
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Creates an identity transform (origin, no rotation, unit scale).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transform that only translates.
    ///
    /// ```
    /// use pivot::{Transform, Vec3};
    ///
    /// let transform = Transform::from_translation(Vec3::new(1.0, 2.0, 3.0));
    /// assert_eq!(transform.translation, Vec3::new(1.0, 2.0, 3.0));
    /// ```
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// Sets the translation component.
    pub fn translation(mut self, translation: Vec3) -> Self {
        self.translation = translation;
        self
    }

    /// Sets the rotation component.
    ///
    /// The degree-based helpers in [`math`](crate::math) cover the common
    /// single-axis cases.
    pub fn rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Sets per-axis scale factors.
    pub fn scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Sets the same scale factor on all three axes.
    pub fn uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }

    /// Composes the local matrix `Translate · Rotate · Scale`.
    ///
    /// Pure function of the three fields.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_translation(self.translation)
            * Mat4::from_quat(self.rotation)
            * Mat4::from_scale(self.scale)
    }
}
