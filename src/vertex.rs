//! Vertex layouts understood by [`MeshBuffer`](crate::MeshBuffer).
//!
//! Two layouts are supported, selected by the [`VertexKind`] tag:
//!
//! | Kind | Type | Attributes | Stride |
//! |------|------|------------|--------|
//! | [`VertexKind::PositionNormal`] | [`VertexPn`] | position, normal | 24 |
//! | [`VertexKind::TangentSpace`] | [`VertexPntb`] | position, normal, binormal, tangent, tex_coord | 56 |
//!
//! Each vertex type describes its attributes through [`Vertex::ATTRIBUTES`], so
//! the draw path binds whatever the active layout carries instead of
//! duplicating a mesh type per layout.

use std::mem::{offset_of, size_of};

use glam::{Vec2, Vec3};

/// A shader input semantic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Attribute {
    Position,
    Normal,
    TexCoord,
    Binormal,
    Tangent,
}

/// Where one attribute lives inside a vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttributeSlot {
    pub attribute: Attribute,
    pub format: wgpu::VertexFormat,
    /// Byte offset from the start of the vertex.
    pub offset: u64,
}

/// Tag identifying which vertex layout a buffer holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexKind {
    /// [`VertexPn`]: position and normal.
    PositionNormal,
    /// [`VertexPntb`]: position, normal, binormal, tangent and texture coordinates.
    TangentSpace,
}

impl VertexKind {
    /// Attribute slots of this layout.
    pub fn attributes(self) -> &'static [AttributeSlot] {
        match self {
            VertexKind::PositionNormal => VertexPn::ATTRIBUTES,
            VertexKind::TangentSpace => VertexPntb::ATTRIBUTES,
        }
    }

    /// Size of one vertex in bytes.
    pub fn stride(self) -> u64 {
        match self {
            VertexKind::PositionNormal => size_of::<VertexPn>() as u64,
            VertexKind::TangentSpace => size_of::<VertexPntb>() as u64,
        }
    }
}

/// A GPU-uploadable vertex type with a self-describing layout.
pub trait Vertex: bytemuck::Pod {
    const KIND: VertexKind;
    const ATTRIBUTES: &'static [AttributeSlot];

    /// Model-space position.
    fn position(&self) -> Vec3;

    fn position_mut(&mut self) -> &mut [f32; 3];
}

/// Position + normal vertex for untextured, flat-coloured geometry.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VertexPn {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl VertexPn {
    pub fn new(position: [f32; 3], normal: [f32; 3]) -> Self {
        Self { position, normal }
    }
}

impl Vertex for VertexPn {
    const KIND: VertexKind = VertexKind::PositionNormal;
    const ATTRIBUTES: &'static [AttributeSlot] = &[
        AttributeSlot {
            attribute: Attribute::Position,
            format: wgpu::VertexFormat::Float32x3,
            offset: offset_of!(VertexPn, position) as u64,
        },
        AttributeSlot {
            attribute: Attribute::Normal,
            format: wgpu::VertexFormat::Float32x3,
            offset: offset_of!(VertexPn, normal) as u64,
        },
    ];

    fn position(&self) -> Vec3 {
        Vec3::from(self.position)
    }

    fn position_mut(&mut self) -> &mut [f32; 3] {
        &mut self.position
    }
}

/// Vertex carrying a full tangent basis for normal-mapped shading.
///
/// `binormal` and `tangent` are usually left zeroed at construction and filled
/// in by [`fill_tangents`](crate::tangent::fill_tangents).
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VertexPntb {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub binormal: [f32; 3],
    pub tangent: [f32; 3],
    pub tex_coord: [f32; 2],
}

impl VertexPntb {
    /// Creates a vertex with an empty tangent basis.
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            binormal: [0.0; 3],
            tangent: [0.0; 3],
            tex_coord,
        }
    }

    pub fn tex_coord(&self) -> Vec2 {
        Vec2::from(self.tex_coord)
    }
}

impl Vertex for VertexPntb {
    const KIND: VertexKind = VertexKind::TangentSpace;
    const ATTRIBUTES: &'static [AttributeSlot] = &[
        AttributeSlot {
            attribute: Attribute::Position,
            format: wgpu::VertexFormat::Float32x3,
            offset: offset_of!(VertexPntb, position) as u64,
        },
        AttributeSlot {
            attribute: Attribute::Normal,
            format: wgpu::VertexFormat::Float32x3,
            offset: offset_of!(VertexPntb, normal) as u64,
        },
        AttributeSlot {
            attribute: Attribute::Binormal,
            format: wgpu::VertexFormat::Float32x3,
            offset: offset_of!(VertexPntb, binormal) as u64,
        },
        AttributeSlot {
            attribute: Attribute::Tangent,
            format: wgpu::VertexFormat::Float32x3,
            offset: offset_of!(VertexPntb, tangent) as u64,
        },
        AttributeSlot {
            attribute: Attribute::TexCoord,
            format: wgpu::VertexFormat::Float32x2,
            offset: offset_of!(VertexPntb, tex_coord) as u64,
        },
    ];

    fn position(&self) -> Vec3 {
        Vec3::from(self.position)
    }

    fn position_mut(&mut self) -> &mut [f32; 3] {
        &mut self.position
    }
}

impl From<VertexPntb> for VertexPn {
    fn from(v: VertexPntb) -> Self {
        Self {
            position: v.position,
            normal: v.normal,
        }
    }
}

/// Vertex storage tagged with its layout.
#[derive(Clone, Debug, PartialEq)]
pub enum VertexData {
    PositionNormal(Vec<VertexPn>),
    TangentSpace(Vec<VertexPntb>),
}

impl VertexData {
    pub fn kind(&self) -> VertexKind {
        match self {
            VertexData::PositionNormal(_) => VertexKind::PositionNormal,
            VertexData::TangentSpace(_) => VertexKind::TangentSpace,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            VertexData::PositionNormal(v) => v.len(),
            VertexData::TangentSpace(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes for upload, laid out per [`VertexKind::stride`].
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            VertexData::PositionNormal(v) => bytemuck::cast_slice(v),
            VertexData::TangentSpace(v) => bytemuck::cast_slice(v),
        }
    }

    pub fn positions(&self) -> Box<dyn Iterator<Item = Vec3> + '_> {
        match self {
            VertexData::PositionNormal(v) => Box::new(v.iter().map(Vertex::position)),
            VertexData::TangentSpace(v) => Box::new(v.iter().map(Vertex::position)),
        }
    }

    pub fn positions_mut(&mut self) -> Box<dyn Iterator<Item = &mut [f32; 3]> + '_> {
        match self {
            VertexData::PositionNormal(v) => Box::new(v.iter_mut().map(Vertex::position_mut)),
            VertexData::TangentSpace(v) => Box::new(v.iter_mut().map(Vertex::position_mut)),
        }
    }
}

impl From<Vec<VertexPn>> for VertexData {
    fn from(vertices: Vec<VertexPn>) -> Self {
        VertexData::PositionNormal(vertices)
    }
}

impl From<Vec<VertexPntb>> for VertexData {
    fn from(vertices: Vec<VertexPntb>) -> Self {
        VertexData::TangentSpace(vertices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_are_tightly_packed() {
        assert_eq!(VertexKind::PositionNormal.stride(), 24);
        assert_eq!(VertexKind::TangentSpace.stride(), 56);

        let offsets: Vec<u64> = VertexKind::TangentSpace
            .attributes()
            .iter()
            .map(|slot| slot.offset)
            .collect();
        assert_eq!(offsets, vec![0, 12, 24, 36, 48]);
    }

    #[test]
    fn vertex_data_reports_kind_and_bytes() {
        let data = VertexData::from(vec![VertexPn::new([1.0, 2.0, 3.0], [0.0, 1.0, 0.0]); 3]);
        assert_eq!(data.kind(), VertexKind::PositionNormal);
        assert_eq!(data.len(), 3);
        assert_eq!(data.as_bytes().len(), 72);
    }

    #[test]
    fn positions_mut_edits_either_layout() {
        let mut data =
            VertexData::from(vec![VertexPntb::new([1.0, 1.0, 1.0], [0.0, 0.0, 1.0], [0.0, 0.0])]);
        for p in data.positions_mut() {
            p[1] += 2.0;
        }
        assert_eq!(data.positions().next(), Some(Vec3::new(1.0, 3.0, 1.0)));
    }
}
