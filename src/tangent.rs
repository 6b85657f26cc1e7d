//! Per-face tangent and binormal generation for normal mapping.
//!
//! Input is a triangle list where every consecutive run of three vertices is
//! one triangle. Each triangle gets its own tangent/binormal pair, replicated
//! to its three corners; vertices shared between faces are **not** averaged,
//! so shading stays faceted across UV seams exactly as authored.
//!
//! A triangle whose texture coordinates have zero area has no defined tangent
//! direction and yields NaN components. Callers that can't tolerate that should
//! filter such faces before building tangents.

use glam::{Vec2, Vec3};

use crate::vertex::VertexPntb;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TangentError {
    #[error("triangle list has {0} vertices, which is not a multiple of 3")]
    IncompleteTriangle(usize),
}

/// Computes the tangent and binormal of one triangle.
///
/// With edges `side0 = v1 - v2` and `side1 = v3 - v1`:
///
/// - `tangent  = normalize(side0 * (t3.v - t1.v) - side1 * (t1.v - t2.v))`
/// - `binormal = normalize(side0 * (t3.u - t1.u) - side1 * (t1.u - t2.u))`
///
/// The tangent is negated when `cross(tangent, binormal)` points away from the
/// face normal `cross(side1, side0)`, keeping the basis consistent when the UV
/// layout is mirrored.
///
/// # Example
///
/// ```
/// use pivot::tangent::face_tangent;
/// use pivot::{Vec2, Vec3};
///
/// let (tangent, binormal) = face_tangent(
///     [Vec3::ZERO, Vec3::X, Vec3::Y],
///     [Vec2::ZERO, Vec2::X, Vec2::Y],
/// );
/// assert!(tangent.abs_diff_eq(Vec3::X, 1e-6));
/// assert!(binormal.abs_diff_eq(Vec3::Y, 1e-6));
/// ```
pub fn face_tangent(positions: [Vec3; 3], tex_coords: [Vec2; 3]) -> (Vec3, Vec3) {
    let [v1, v2, v3] = positions;
    let [t1, t2, t3] = tex_coords;

    let side0 = v1 - v2;
    let side1 = v3 - v1;
    let normal = side1.cross(side0).normalize();

    let delta_v0 = t1.y - t2.y;
    let delta_v1 = t3.y - t1.y;
    let mut tangent = (side0 * delta_v1 - side1 * delta_v0).normalize();

    let delta_u0 = t1.x - t2.x;
    let delta_u1 = t3.x - t1.x;
    let binormal = (side0 * delta_u1 - side1 * delta_u0).normalize();

    if tangent.cross(binormal).dot(normal) < 0.0 {
        tangent = -tangent;
    }

    (tangent, binormal)
}

/// Writes a flat tangent basis into every triangle of a non-indexed list.
///
/// Fails without touching any vertex if the slice doesn't split evenly into
/// triangles.
pub fn fill_tangents(vertices: &mut [VertexPntb]) -> Result<(), TangentError> {
    if vertices.len() % 3 != 0 {
        return Err(TangentError::IncompleteTriangle(vertices.len()));
    }

    for triangle in vertices.chunks_exact_mut(3) {
        let positions = [
            Vec3::from(triangle[0].position),
            Vec3::from(triangle[1].position),
            Vec3::from(triangle[2].position),
        ];
        let tex_coords = [
            triangle[0].tex_coord(),
            triangle[1].tex_coord(),
            triangle[2].tex_coord(),
        ];

        let (tangent, binormal) = face_tangent(positions, tex_coords);

        for corner in triangle.iter_mut() {
            corner.tangent = tangent.to_array();
            corner.binormal = binormal.to_array();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corner(p: [f32; 3], uv: [f32; 2]) -> VertexPntb {
        VertexPntb::new(p, [0.0, 0.0, 1.0], uv)
    }

    #[test]
    fn canonical_right_triangle() {
        let (tangent, binormal) = face_tangent(
            [Vec3::ZERO, Vec3::X, Vec3::Y],
            [Vec2::ZERO, Vec2::X, Vec2::Y],
        );

        assert!(tangent.cross(Vec3::X).length() < 1e-6);
        assert!(binormal.cross(Vec3::Y).length() < 1e-6);
        assert!(tangent.abs_diff_eq(Vec3::X, 1e-6));
        assert!(binormal.abs_diff_eq(Vec3::Y, 1e-6));
    }

    #[test]
    fn basis_is_unit_length() {
        let (tangent, binormal) = face_tangent(
            [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(3.0, 0.5, 0.0),
                Vec3::new(0.2, 2.0, 1.0),
            ],
            [Vec2::new(0.1, 0.1), Vec2::new(0.9, 0.2), Vec2::new(0.3, 0.8)],
        );
        assert!((tangent.length() - 1.0).abs() < 1e-5);
        assert!((binormal.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn handedness_follows_face_normal() {
        // Same triangle with the U axis mirrored; the basis must still agree
        // with the face normal after correction.
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y];
        let normal = (positions[2] - positions[0])
            .cross(positions[0] - positions[1])
            .normalize();

        for uvs in [
            [Vec2::ZERO, Vec2::X, Vec2::Y],
            [Vec2::new(1.0, 0.0), Vec2::ZERO, Vec2::new(1.0, 1.0)],
        ] {
            let (tangent, binormal) = face_tangent(positions, uvs);
            assert!(tangent.cross(binormal).dot(normal) >= 0.0);
        }
    }

    #[test]
    fn degenerate_uvs_produce_nan() {
        let (tangent, _) = face_tangent([Vec3::ZERO, Vec3::X, Vec3::Y], [Vec2::ZERO; 3]);
        assert!(tangent.is_nan());
    }

    #[test]
    fn fill_replicates_per_face_without_averaging() {
        let mut vertices = vec![
            corner([0.0, 0.0, 0.0], [0.0, 0.0]),
            corner([1.0, 0.0, 0.0], [1.0, 0.0]),
            corner([0.0, 1.0, 0.0], [0.0, 1.0]),
            // Second face shares two positions but mirrors U.
            corner([1.0, 0.0, 0.0], [0.0, 0.0]),
            corner([1.0, 1.0, 0.0], [0.0, 1.0]),
            corner([0.0, 1.0, 0.0], [1.0, 1.0]),
        ];

        fill_tangents(&mut vertices).unwrap();

        for v in &vertices[..3] {
            assert_eq!(v.tangent, vertices[0].tangent);
            assert_eq!(v.binormal, vertices[0].binormal);
        }
        for v in &vertices[3..] {
            assert_eq!(v.tangent, vertices[3].tangent);
            assert_eq!(v.binormal, vertices[3].binormal);
        }
        assert_ne!(vertices[0].binormal, vertices[3].binormal);
    }

    #[test]
    fn fill_rejects_partial_triangle() {
        let mut vertices = vec![corner([0.0; 3], [0.0; 2]); 4];
        assert_eq!(
            fill_tangents(&mut vertices),
            Err(TangentError::IncompleteTriangle(4))
        );
        assert_eq!(vertices[0].tangent, [0.0; 3]);
    }
}
