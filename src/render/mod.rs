//! The draw-call sink the scene renders into.
//!
//! Everything that touches GPU state goes through [`RenderBackend`]: buffer
//! creation, uniform uploads and indexed draws. Uniform handles are passed
//! explicitly in a [`RenderContext`] rather than living in globals, so the
//! whole transform pipeline can run headless against a [`RecordingBackend`].
//!
//! # Backends
//!
//! - [`RecordingBackend`] — records every command; used for tests and tooling
//! - [`WgpuBackend`] — records draws per frame and replays them in one wgpu render pass
//!
//! # Example
//!
//! ```
//! use pivot::{AttributeBindings, MeshBuffer, RecordingBackend, RenderBackend, RawGeometry};
//!
//! let mut backend = RecordingBackend::new();
//! let cube = RawGeometry::cube(1.0).into_position_normal();
//! let mesh = MeshBuffer::from_geometry(&mut backend, &cube).unwrap();
//!
//! mesh.draw(&mut backend, &AttributeBindings::standard()).unwrap();
//! assert_eq!(backend.draws().count(), 1);
//! ```

mod recording;
mod wgpu_backend;

pub use recording::{Command, RecordedDraw, RecordingBackend};
pub use wgpu_backend::{LightLocations, MAX_LIGHTS, MaterialId, WgpuBackend};

use glam::{Mat4, Vec3};

use crate::mesh::AttributeBindings;
use crate::vertex::{Attribute, VertexKind};

/// Handle to a buffer created through a [`RenderBackend`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub(crate) u32);

impl BufferId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to a shader uniform slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

/// Uniform slots a scene draw writes into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShaderUniforms {
    pub model_view: UniformLocation,
    pub normal_matrix: UniformLocation,
    pub projection: UniformLocation,
    /// Receives an entity's [`SurfaceColor`](crate::SurfaceColor), when present.
    pub color: Option<UniformLocation>,
}

/// One vertex attribute bound to a shader input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoundAttribute {
    pub attribute: Attribute,
    pub location: u32,
    pub format: wgpu::VertexFormat,
    pub offset: u64,
}

/// A single indexed triangle-list draw.
#[derive(Clone, Copy, Debug)]
pub struct IndexedDraw<'a> {
    pub kind: VertexKind,
    pub vertex_buffer: BufferId,
    /// Bytes between consecutive vertices.
    pub stride: u64,
    pub attributes: &'a [BoundAttribute],
    pub index_buffer: BufferId,
    pub index_count: u32,
    pub index_format: wgpu::IndexFormat,
}

/// A sink for GPU resources, uniform uploads and draw calls.
///
/// Implementations are driven from a single render thread; nothing here is
/// expected to be `Send`.
pub trait RenderBackend {
    /// Uploads vertex bytes and returns a handle to the new buffer.
    fn create_vertex_buffer(&mut self, label: &str, contents: &[u8]) -> BufferId;

    /// Uploads 16-bit indices and returns a handle to the new buffer.
    fn create_index_buffer(&mut self, label: &str, indices: &[u16]) -> BufferId;

    fn upload_matrix(&mut self, location: UniformLocation, matrix: Mat4);

    fn upload_vec3(&mut self, location: UniformLocation, value: Vec3);

    /// Issues one indexed triangle-list draw using the currently uploaded uniforms.
    fn draw_indexed(&mut self, draw: &IndexedDraw<'_>);
}

/// Everything a scene needs to issue draws: the sink, the uniform slots, and
/// the attribute-to-location bindings of the active shader.
pub struct RenderContext<'a> {
    pub backend: &'a mut dyn RenderBackend,
    pub uniforms: ShaderUniforms,
    pub bindings: &'a AttributeBindings,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        backend: &'a mut dyn RenderBackend,
        uniforms: ShaderUniforms,
        bindings: &'a AttributeBindings,
    ) -> Self {
        Self {
            backend,
            uniforms,
            bindings,
        }
    }
}

/// Errors raised while issuing draws.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("{kind:?} mesh needs a shader location for {attribute:?}, but none is bound")]
    MissingAttribute {
        attribute: Attribute,
        kind: VertexKind,
    },
}
