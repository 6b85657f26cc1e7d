//! GPU-resident triangle meshes and their attribute bindings.
//!
//! A [`MeshBuffer`] owns one vertex buffer and one 16-bit index buffer created
//! through a [`RenderBackend`]. It is validated and uploaded once, then treated
//! as immutable for as long as it is rendered.
//!
//! Drawing needs to know which shader location each vertex attribute feeds.
//! That mapping is an [`AttributeBindings`]; the mesh binds only the attributes
//! its own [`VertexKind`] carries.
//!
//! ```
//! use pivot::{AttributeBindings, MeshBuffer, RecordingBackend, VertexData, VertexPn};
//!
//! let mut backend = RecordingBackend::new();
//! let vertices = VertexData::from(vec![
//!     VertexPn::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
//!     VertexPn::new([-1.0, -1.0, 0.0], [0.0, 0.0, 1.0]),
//!     VertexPn::new([1.0, -1.0, 0.0], [0.0, 0.0, 1.0]),
//! ]);
//! let triangle = MeshBuffer::new(&mut backend, &vertices, &[0, 1, 2]).unwrap();
//! assert_eq!(triangle.index_count(), 3);
//!
//! // Index lists must describe whole triangles.
//! assert!(MeshBuffer::new(&mut backend, &vertices, &[0, 1]).is_err());
//! ```

use crate::geometry::RawGeometry;
use crate::render::{BoundAttribute, BufferId, IndexedDraw, RenderBackend, RenderError};
use crate::vertex::{Attribute, VertexData, VertexKind};

/// Most vertices a 16-bit index buffer can address.
pub const MAX_VERTICES: usize = u16::MAX as usize + 1;

/// Reasons a mesh can't be built from the supplied data.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    #[error("index count {0} is not a multiple of 3; only triangle lists are supported")]
    IncompleteTriangle(usize),
    #[error("index {value} at position {position} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        value: u16,
        position: usize,
        vertex_count: usize,
    },
    #[error("{0} vertices exceed the 16-bit index range")]
    TooManyVertices(usize),
}

/// Shader input location for each vertex attribute.
///
/// Unbound attributes are `None`. A mesh whose layout carries an attribute
/// that isn't bound refuses to draw.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AttributeBindings {
    pub position: Option<u32>,
    pub normal: Option<u32>,
    pub tex_coord: Option<u32>,
    pub binormal: Option<u32>,
    pub tangent: Option<u32>,
}

impl AttributeBindings {
    /// No attributes bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// The locations used by the built-in shaders:
    /// position 0, normal 1, tex_coord 2, binormal 3, tangent 4.
    pub fn standard() -> Self {
        Self {
            position: Some(0),
            normal: Some(1),
            tex_coord: Some(2),
            binormal: Some(3),
            tangent: Some(4),
        }
    }

    /// Binds `attribute` to shader `location`.
    pub fn with(mut self, attribute: Attribute, location: u32) -> Self {
        *self.slot_mut(attribute) = Some(location);
        self
    }

    pub fn location(&self, attribute: Attribute) -> Option<u32> {
        match attribute {
            Attribute::Position => self.position,
            Attribute::Normal => self.normal,
            Attribute::TexCoord => self.tex_coord,
            Attribute::Binormal => self.binormal,
            Attribute::Tangent => self.tangent,
        }
    }

    fn slot_mut(&mut self, attribute: Attribute) -> &mut Option<u32> {
        match attribute {
            Attribute::Position => &mut self.position,
            Attribute::Normal => &mut self.normal,
            Attribute::TexCoord => &mut self.tex_coord,
            Attribute::Binormal => &mut self.binormal,
            Attribute::Tangent => &mut self.tangent,
        }
    }

    /// Resolves every attribute of `kind` to a location, failing on the first
    /// attribute with no binding.
    pub fn resolve(&self, kind: VertexKind) -> Result<Vec<BoundAttribute>, RenderError> {
        kind.attributes()
            .iter()
            .map(|slot| {
                let location = self
                    .location(slot.attribute)
                    .ok_or(RenderError::MissingAttribute {
                        attribute: slot.attribute,
                        kind,
                    })?;
                Ok(BoundAttribute {
                    attribute: slot.attribute,
                    location,
                    format: slot.format,
                    offset: slot.offset,
                })
            })
            .collect()
    }
}

/// Vertex and index storage for one mesh, resident in a render backend.
///
/// Built once by [`MeshBuffer::new`]; there is no way to modify the geometry
/// afterwards. To render different geometry, build a new mesh.
#[derive(Debug, PartialEq, Eq)]
pub struct MeshBuffer {
    kind: VertexKind,
    vertex_buffer: BufferId,
    index_buffer: BufferId,
    vertex_count: usize,
    index_count: u32,
}

impl MeshBuffer {
    /// Validates the geometry and uploads it through `backend`.
    ///
    /// # Errors
    ///
    /// - [`MeshError::IncompleteTriangle`] if `indices.len()` isn't a multiple of 3
    /// - [`MeshError::IndexOutOfRange`] if any index is `>= vertices.len()`
    /// - [`MeshError::TooManyVertices`] if the vertices can't all be addressed
    ///   by 16-bit indices
    ///
    /// Nothing is uploaded when validation fails.
    pub fn new<B: RenderBackend + ?Sized>(
        backend: &mut B,
        vertices: &VertexData,
        indices: &[u16],
    ) -> Result<Self, MeshError> {
        validate(vertices.len(), indices)?;

        let kind = vertices.kind();
        let vertex_buffer = backend.create_vertex_buffer("Mesh Vertex Buffer", vertices.as_bytes());
        let index_buffer = backend.create_index_buffer("Mesh Index Buffer", indices);

        log::debug!(
            "uploaded {:?} mesh: {} vertices, {} indices",
            kind,
            vertices.len(),
            indices.len()
        );

        Ok(Self {
            kind,
            vertex_buffer,
            index_buffer,
            vertex_count: vertices.len(),
            index_count: indices.len() as u32,
        })
    }

    /// Uploads already-assembled [`RawGeometry`].
    pub fn from_geometry<B: RenderBackend + ?Sized>(
        backend: &mut B,
        geometry: &RawGeometry,
    ) -> Result<Self, MeshError> {
        Self::new(backend, &geometry.vertices, &geometry.indices)
    }

    pub fn kind(&self) -> VertexKind {
        self.kind
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Number of indices drawn per call.
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn vertex_buffer(&self) -> BufferId {
        self.vertex_buffer
    }

    pub fn index_buffer(&self) -> BufferId {
        self.index_buffer
    }

    /// Issues exactly one indexed triangle-list draw of the whole mesh.
    ///
    /// Attributes are bound with this layout's stride and offsets at the
    /// locations given by `bindings`. No draw is issued if an attribute the
    /// layout carries has no binding.
    pub fn draw<B: RenderBackend + ?Sized>(
        &self,
        backend: &mut B,
        bindings: &AttributeBindings,
    ) -> Result<(), RenderError> {
        let attributes = bindings.resolve(self.kind)?;

        backend.draw_indexed(&IndexedDraw {
            kind: self.kind,
            vertex_buffer: self.vertex_buffer,
            stride: self.kind.stride(),
            attributes: &attributes,
            index_buffer: self.index_buffer,
            index_count: self.index_count,
            index_format: wgpu::IndexFormat::Uint16,
        });

        Ok(())
    }
}

pub(crate) fn validate(vertex_count: usize, indices: &[u16]) -> Result<(), MeshError> {
    if vertex_count > MAX_VERTICES {
        return Err(MeshError::TooManyVertices(vertex_count));
    }

    if indices.len() % 3 != 0 {
        return Err(MeshError::IncompleteTriangle(indices.len()));
    }

    if let Some((position, &value)) = indices
        .iter()
        .enumerate()
        .find(|&(_, &index)| usize::from(index) >= vertex_count)
    {
        return Err(MeshError::IndexOutOfRange {
            value,
            position,
            vertex_count,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{Command, RecordingBackend};
    use crate::vertex::{VertexPn, VertexPntb};

    fn triangle_pn() -> VertexData {
        VertexData::from(vec![
            VertexPn::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            VertexPn::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            VertexPn::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
        ])
    }

    #[test]
    fn index_count_round_trips() {
        let mut backend = RecordingBackend::new();
        let vertices = triangle_pn();
        let indices = [0, 1, 2, 2, 1, 0, 0, 2, 1];

        let mesh = MeshBuffer::new(&mut backend, &vertices, &indices).unwrap();

        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.index_count(), 9);
        assert_eq!(mesh.kind(), VertexKind::PositionNormal);
    }

    #[test]
    fn rejects_partial_triangle() {
        let mut backend = RecordingBackend::new();
        let err = MeshBuffer::new(&mut backend, &triangle_pn(), &[0, 1, 2, 0]).unwrap_err();

        assert_eq!(err, MeshError::IncompleteTriangle(4));
        assert!(backend.commands().is_empty());
    }

    #[test]
    fn rejects_out_of_range_index() {
        let mut backend = RecordingBackend::new();
        let err = MeshBuffer::new(&mut backend, &triangle_pn(), &[0, 1, 3]).unwrap_err();

        assert_eq!(
            err,
            MeshError::IndexOutOfRange {
                value: 3,
                position: 2,
                vertex_count: 3,
            }
        );
    }

    #[test]
    fn rejects_vertices_beyond_u16_range() {
        let mut backend = RecordingBackend::new();
        let vertices = VertexData::from(vec![VertexPn::default(); MAX_VERTICES + 1]);
        let err = MeshBuffer::new(&mut backend, &vertices, &[]).unwrap_err();
        assert_eq!(err, MeshError::TooManyVertices(MAX_VERTICES + 1));
    }

    #[test]
    fn draw_issues_one_indexed_u16_call() {
        let mut backend = RecordingBackend::new();
        let mesh = MeshBuffer::new(&mut backend, &triangle_pn(), &[0, 1, 2]).unwrap();
        backend.clear();

        mesh.draw(&mut backend, &AttributeBindings::standard()).unwrap();

        let draws: Vec<_> = backend.draws().collect();
        assert_eq!(draws.len(), 1);
        let draw = draws[0];
        assert_eq!(draw.index_count, 3);
        assert_eq!(draw.index_format, wgpu::IndexFormat::Uint16);
        assert_eq!(draw.stride, 24);
        assert_eq!(draw.vertex_buffer, mesh.vertex_buffer());
        assert_eq!(draw.index_buffer, mesh.index_buffer());
    }

    #[test]
    fn position_normal_layout_binds_only_its_attributes() {
        let mut backend = RecordingBackend::new();
        let mesh = MeshBuffer::new(&mut backend, &triangle_pn(), &[0, 1, 2]).unwrap();

        // Tangent-space locations are irrelevant to this layout.
        let bindings = AttributeBindings::new()
            .with(Attribute::Position, 5)
            .with(Attribute::Normal, 7);
        mesh.draw(&mut backend, &bindings).unwrap();

        let draw = backend.draws().next().unwrap();
        let bound: Vec<_> = draw
            .attributes
            .iter()
            .map(|a| (a.attribute, a.location, a.offset))
            .collect();
        assert_eq!(
            bound,
            vec![(Attribute::Position, 5, 0), (Attribute::Normal, 7, 12)]
        );
    }

    #[test]
    fn tangent_layout_requires_all_bindings() {
        let mut backend = RecordingBackend::new();
        let vertices = VertexData::from(vec![VertexPntb::default(); 3]);
        let mesh = MeshBuffer::new(&mut backend, &vertices, &[0, 1, 2]).unwrap();

        let bindings = AttributeBindings::standard();
        let partial = AttributeBindings {
            tangent: None,
            ..bindings
        };

        assert_eq!(
            mesh.draw(&mut backend, &partial),
            Err(RenderError::MissingAttribute {
                attribute: Attribute::Tangent,
                kind: VertexKind::TangentSpace,
            })
        );
        assert_eq!(backend.draws().count(), 0);

        mesh.draw(&mut backend, &bindings).unwrap();
        let draw = backend.draws().next().unwrap();
        assert_eq!(draw.attributes.len(), 5);
        assert_eq!(draw.stride, 56);
    }

    #[test]
    fn upload_goes_through_backend() {
        let mut backend = RecordingBackend::new();
        MeshBuffer::new(&mut backend, &triangle_pn(), &[0, 1, 2]).unwrap();

        assert!(matches!(
            backend.commands()[0],
            Command::CreateVertexBuffer { bytes: 72, .. }
        ));
        assert!(matches!(
            &backend.commands()[1],
            Command::CreateIndexBuffer { indices, .. } if indices == &[0, 1, 2]
        ));
    }
}
