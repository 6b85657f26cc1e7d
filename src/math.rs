//! Matrix and quaternion helpers layered over [`glam`].
//!
//! glam provides the algebra itself (composition with `*`, `inverse`,
//! translation/rotation/scale constructors). This module adds the handful of
//! derived operations the renderer needs on top of it:
//!
//! - [`normal_matrix`] — inverse-transpose of a model-view matrix's linear block
//! - [`perspective`] — projection matrix for wgpu's 0..1 depth range
//! - [`rotation_x`], [`rotation_y`], [`rotation_z`] — degree-based quaternions
//! - [`eye_matrix`] — camera placement from a position and a pitch angle
//!
//! Angles in this module are in **degrees**, matching how frame drivers usually
//! animate (`angle = seconds * degrees_per_second`).

use glam::{Mat3, Mat4, Quat, Vec3};

/// Derives the matrix that transforms surface normals under `model_view`.
///
/// This is the inverse-transpose of the upper 3×3 block, re-embedded in a 4×4
/// with the translation zeroed. Non-uniform scale would otherwise skew normals
/// away from the surface they belong to.
///
/// A singular linear block (for example a zero scale component) produces a
/// non-finite result; it is not corrected here.
///
/// # Example
///
/// ```
/// use pivot::math::normal_matrix;
/// use pivot::{Mat4, Quat};
///
/// // Rotations are their own inverse-transpose.
/// let rotation = Mat4::from_quat(Quat::from_rotation_y(0.7));
/// assert!(normal_matrix(rotation).abs_diff_eq(rotation, 1e-5));
/// ```
pub fn normal_matrix(model_view: Mat4) -> Mat4 {
    let linear = Mat3::from_mat4(model_view);
    Mat4::from_mat3(linear.inverse().transpose())
}

/// Builds a right-handed perspective projection.
///
/// * `fovy_degrees` - Vertical field of view
/// * `aspect` - Viewport width divided by height
/// * `near`, `far` - Positive distances to the clip planes
///
/// Depth maps to wgpu's `0..1` clip range.
pub fn perspective(fovy_degrees: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    Mat4::perspective_rh(fovy_degrees.to_radians(), aspect, near, far)
}

/// Rotation of `degrees` about the X axis.
pub fn rotation_x(degrees: f32) -> Quat {
    Quat::from_rotation_x(degrees.to_radians())
}

/// Rotation of `degrees` about the Y axis.
pub fn rotation_y(degrees: f32) -> Quat {
    Quat::from_rotation_y(degrees.to_radians())
}

/// Rotation of `degrees` about the Z axis.
pub fn rotation_z(degrees: f32) -> Quat {
    Quat::from_rotation_z(degrees.to_radians())
}

/// Places a camera at `position`, pitched by `pitch_degrees` about its own X axis.
///
/// Returns the camera's world matrix (`Translate(position) · RotX(pitch)`).
/// The view matrix handed to [`Scene::draw`](crate::Scene::draw) is its inverse.
pub fn eye_matrix(position: Vec3, pitch_degrees: f32) -> Mat4 {
    Mat4::from_translation(position) * Mat4::from_quat(rotation_x(pitch_degrees))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_matrix_of_rotation_is_rotation() {
        let rotation = Mat4::from_quat(rotation_x(30.0) * rotation_y(-75.0));
        assert!(normal_matrix(rotation).abs_diff_eq(rotation, 1e-5));
    }

    #[test]
    fn normal_matrix_drops_translation() {
        let m = Mat4::from_translation(Vec3::new(4.0, -2.0, 9.0))
            * Mat4::from_quat(rotation_z(45.0));
        let n = normal_matrix(m);
        assert!(n.w_axis.abs_diff_eq(glam::Vec4::W, 1e-6));
        assert!(n.abs_diff_eq(Mat4::from_quat(rotation_z(45.0)), 1e-5));
    }

    #[test]
    fn normal_matrix_keeps_normals_perpendicular_under_nonuniform_scale() {
        let m = Mat4::from_scale(Vec3::new(4.0, 1.0, 1.0)) * Mat4::from_quat(rotation_z(30.0));

        // A surface tangent and its normal before the transform.
        let tangent = Vec3::new(1.0, 1.0, 0.0).normalize();
        let normal = Vec3::new(-1.0, 1.0, 0.0).normalize();

        let tangent_after = m.transform_vector3(tangent);
        let naive = m.transform_vector3(normal);
        let corrected = normal_matrix(m).transform_vector3(normal);

        assert!(tangent_after.dot(naive).abs() > 1e-3);
        assert!(tangent_after.dot(corrected).abs() < 1e-4);
    }

    #[test]
    fn degree_rotations_match_radians() {
        let q = rotation_y(90.0);
        let v = q * Vec3::X;
        assert!(v.abs_diff_eq(Vec3::NEG_Z, 1e-6));
    }

    #[test]
    fn eye_matrix_inverse_maps_eye_to_origin() {
        let eye = eye_matrix(Vec3::new(0.0, 1.25, 3.0), -15.0);
        let view = eye.inverse();
        let origin = view.transform_point3(Vec3::new(0.0, 1.25, 3.0));
        assert!(origin.abs_diff_eq(Vec3::ZERO, 1e-5));
    }

    #[test]
    fn perspective_maps_near_plane_to_zero_depth() {
        let proj = perspective(45.0, 1.0, 0.1, 100.0);
        let clip = proj * glam::Vec4::new(0.0, 0.0, -0.1, 1.0);
        assert!((clip.z / clip.w).abs() < 1e-5);
    }
}
