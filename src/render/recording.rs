use glam::{Mat4, Vec3};

use super::{BoundAttribute, BufferId, IndexedDraw, RenderBackend, UniformLocation};
use crate::vertex::VertexKind;

/// An owned copy of an [`IndexedDraw`].
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedDraw {
    pub kind: VertexKind,
    pub vertex_buffer: BufferId,
    pub stride: u64,
    pub attributes: Vec<BoundAttribute>,
    pub index_buffer: BufferId,
    pub index_count: u32,
    pub index_format: wgpu::IndexFormat,
}

impl From<&IndexedDraw<'_>> for RecordedDraw {
    fn from(draw: &IndexedDraw<'_>) -> Self {
        Self {
            kind: draw.kind,
            vertex_buffer: draw.vertex_buffer,
            stride: draw.stride,
            attributes: draw.attributes.to_vec(),
            index_buffer: draw.index_buffer,
            index_count: draw.index_count,
            index_format: draw.index_format,
        }
    }
}

/// A command received by a [`RecordingBackend`], in arrival order.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    CreateVertexBuffer { id: BufferId, bytes: usize },
    CreateIndexBuffer { id: BufferId, indices: Vec<u16> },
    UploadMatrix(UniformLocation, Mat4),
    UploadVec3(UniformLocation, Vec3),
    Draw(RecordedDraw),
}

/// A [`RenderBackend`] that performs no GPU work and keeps a log of every call.
///
/// Useful for running scenes headless and for asserting on the exact
/// sequence of uploads and draws.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    commands: Vec<Command>,
    next_buffer: u32,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Every draw recorded so far.
    pub fn draws(&self) -> impl Iterator<Item = &RecordedDraw> {
        self.commands.iter().filter_map(|c| match c {
            Command::Draw(draw) => Some(draw),
            _ => None,
        })
    }

    /// Matrices uploaded to `location`, oldest first.
    pub fn matrices(&self, location: UniformLocation) -> impl Iterator<Item = Mat4> + '_ {
        self.commands.iter().filter_map(move |c| match c {
            Command::UploadMatrix(loc, m) if *loc == location => Some(*m),
            _ => None,
        })
    }

    /// The most recent matrix uploaded to `location`.
    pub fn last_matrix(&self, location: UniformLocation) -> Option<Mat4> {
        self.matrices(location).last()
    }

    /// The most recent vector uploaded to `location`.
    pub fn last_vec3(&self, location: UniformLocation) -> Option<Vec3> {
        self.commands.iter().rev().find_map(|c| match c {
            Command::UploadVec3(loc, v) if *loc == location => Some(*v),
            _ => None,
        })
    }

    /// Drops recorded commands but keeps buffer ids monotonic.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    fn allocate(&mut self) -> BufferId {
        let id = BufferId(self.next_buffer);
        self.next_buffer += 1;
        id
    }
}

impl RenderBackend for RecordingBackend {
    fn create_vertex_buffer(&mut self, _label: &str, contents: &[u8]) -> BufferId {
        let id = self.allocate();
        self.commands.push(Command::CreateVertexBuffer {
            id,
            bytes: contents.len(),
        });
        id
    }

    fn create_index_buffer(&mut self, _label: &str, indices: &[u16]) -> BufferId {
        let id = self.allocate();
        self.commands.push(Command::CreateIndexBuffer {
            id,
            indices: indices.to_vec(),
        });
        id
    }

    fn upload_matrix(&mut self, location: UniformLocation, matrix: Mat4) {
        self.commands.push(Command::UploadMatrix(location, matrix));
    }

    fn upload_vec3(&mut self, location: UniformLocation, value: Vec3) {
        self.commands.push(Command::UploadVec3(location, value));
    }

    fn draw_indexed(&mut self, draw: &IndexedDraw<'_>) {
        self.commands.push(Command::Draw(RecordedDraw::from(draw)));
    }
}
