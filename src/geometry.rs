//! Geometry loading and preparation before upload.
//!
//! [`RawGeometry`] is CPU-side vertex and index data that can still be
//! reshaped (recentred, rescaled, de-indexed, given tangents) before becoming
//! a [`MeshBuffer`]. [`GeometryLoader`] reads it from model files.
//!
//! # Supported Formats
//!
//! | Format | Extensions | Layout produced |
//! |--------|------------|-----------------|
//! | Wavefront OBJ | `.obj` | [`VertexKind::TangentSpace`] (positions, normals, UVs required) |
//! | STL | `.stl` | [`VertexKind::PositionNormal`] (face normals, no UVs) |
//!
//! Malformed input is reported as a [`GeometryError`]; nothing here aborts.
//!
//! # Example
//!
//! ```no_run
//! use pivot::{GeometryLoader, RecordingBackend};
//!
//! let mut backend = RecordingBackend::new();
//! let monk = GeometryLoader::from_file("monk.obj")
//!     .centered()
//!     .normalized()
//!     .with_tangents()
//!     .upload(&mut backend)?;
//! # Ok::<(), pivot::GeometryError>(())
//! ```

use std::io::{BufRead, Read, Seek};
use std::path::Path;

use glam::Vec3;

use crate::mesh::{MAX_VERTICES, MeshBuffer, MeshError, validate};
use crate::render::RenderBackend;
use crate::tangent::{TangentError, fill_tangents};
use crate::vertex::{VertexData, VertexKind, VertexPn, VertexPntb};

/// Errors that can occur while loading or preparing geometry.
#[derive(thiserror::Error, Debug)]
pub enum GeometryError {
    #[error("failed to read geometry: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown geometry format: '{0}'")]
    UnknownFormat(String),
    #[error("failed to parse geometry: {0}")]
    Parse(String),
    #[error("face corner {corner} of model '{model}' references a missing {attribute}")]
    MissingAttribute {
        model: String,
        corner: usize,
        attribute: &'static str,
    },
    #[error("{0} vertices exceed the 16-bit index range")]
    TooManyVertices(usize),
    #[error("tangents need texture coordinates, but the geometry has a {0:?} layout")]
    NoTexCoords(VertexKind),
    #[error(transparent)]
    Tangent(#[from] TangentError),
    #[error(transparent)]
    Mesh(#[from] MeshError),
}

/// Vertex and index data before upload.
#[derive(Clone, Debug, PartialEq)]
pub struct RawGeometry {
    pub vertices: VertexData,
    pub indices: Vec<u16>,
}

impl RawGeometry {
    pub fn new(vertices: impl Into<VertexData>, indices: Vec<u16>) -> Self {
        Self {
            vertices: vertices.into(),
            indices,
        }
    }

    /// An axis-aligned cube of edge length `size`, centred at the origin.
    ///
    /// Each face has its own four vertices so normals and UVs stay per-face:
    /// 24 vertices, 36 indices, counter-clockwise front faces.
    pub fn cube(size: f32) -> Self {
        let h = size * 0.5;
        let v = |p: [f32; 3], n: [f32; 3], uv: [f32; 2]| VertexPntb::new(p, n, uv);

        #[rustfmt::skip]
        let vertices = vec![
            // Front (Z+)
            v([-h, -h,  h], [ 0.0,  0.0,  1.0], [0.0, 1.0]),
            v([ h, -h,  h], [ 0.0,  0.0,  1.0], [1.0, 1.0]),
            v([ h,  h,  h], [ 0.0,  0.0,  1.0], [1.0, 0.0]),
            v([-h,  h,  h], [ 0.0,  0.0,  1.0], [0.0, 0.0]),
            // Back (Z-)
            v([ h, -h, -h], [ 0.0,  0.0, -1.0], [0.0, 1.0]),
            v([-h, -h, -h], [ 0.0,  0.0, -1.0], [1.0, 1.0]),
            v([-h,  h, -h], [ 0.0,  0.0, -1.0], [1.0, 0.0]),
            v([ h,  h, -h], [ 0.0,  0.0, -1.0], [0.0, 0.0]),
            // Top (Y+)
            v([-h,  h,  h], [ 0.0,  1.0,  0.0], [0.0, 1.0]),
            v([ h,  h,  h], [ 0.0,  1.0,  0.0], [1.0, 1.0]),
            v([ h,  h, -h], [ 0.0,  1.0,  0.0], [1.0, 0.0]),
            v([-h,  h, -h], [ 0.0,  1.0,  0.0], [0.0, 0.0]),
            // Bottom (Y-)
            v([-h, -h, -h], [ 0.0, -1.0,  0.0], [0.0, 1.0]),
            v([ h, -h, -h], [ 0.0, -1.0,  0.0], [1.0, 1.0]),
            v([ h, -h,  h], [ 0.0, -1.0,  0.0], [1.0, 0.0]),
            v([-h, -h,  h], [ 0.0, -1.0,  0.0], [0.0, 0.0]),
            // Right (X+)
            v([ h, -h,  h], [ 1.0,  0.0,  0.0], [0.0, 1.0]),
            v([ h, -h, -h], [ 1.0,  0.0,  0.0], [1.0, 1.0]),
            v([ h,  h, -h], [ 1.0,  0.0,  0.0], [1.0, 0.0]),
            v([ h,  h,  h], [ 1.0,  0.0,  0.0], [0.0, 0.0]),
            // Left (X-)
            v([-h, -h, -h], [-1.0,  0.0,  0.0], [0.0, 1.0]),
            v([-h, -h,  h], [-1.0,  0.0,  0.0], [1.0, 1.0]),
            v([-h,  h,  h], [-1.0,  0.0,  0.0], [1.0, 0.0]),
            v([-h,  h, -h], [-1.0,  0.0,  0.0], [0.0, 0.0]),
        ];

        #[rustfmt::skip]
        let indices = vec![
            0,  1,  2,  2,  3,  0,
            4,  5,  6,  6,  7,  4,
            8,  9,  10, 10, 11, 8,
            12, 13, 14, 14, 15, 12,
            16, 17, 18, 18, 19, 16,
            20, 21, 22, 22, 23, 20,
        ];

        Self::new(vertices, indices)
    }

    /// A square of edge length `size` on the XZ plane, facing +Y.
    pub fn plane(size: f32) -> Self {
        let h = size * 0.5;
        let up = [0.0, 1.0, 0.0];
        let vertices = vec![
            VertexPntb::new([-h, 0.0, h], up, [0.0, 1.0]),
            VertexPntb::new([h, 0.0, h], up, [1.0, 1.0]),
            VertexPntb::new([h, 0.0, -h], up, [1.0, 0.0]),
            VertexPntb::new([-h, 0.0, -h], up, [0.0, 0.0]),
        ];

        Self::new(vertices, vec![0, 1, 2, 2, 3, 0])
    }

    /// Returns `(min, max)` corners of the axis-aligned bounding box.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        self.vertices.positions().fold(
            (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
            |(min, max), p| (min.min(p), max.max(p)),
        )
    }

    pub fn center(&self) -> Vec3 {
        let (min, max) = self.bounds();
        (min + max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        let (min, max) = self.bounds();
        max - min
    }

    pub fn translate(&mut self, offset: Vec3) {
        for p in self.vertices.positions_mut() {
            *p = (Vec3::from(*p) + offset).to_array();
        }
    }

    /// Scales positions uniformly about the origin.
    pub fn scale(&mut self, factor: f32) {
        for p in self.vertices.positions_mut() {
            *p = (Vec3::from(*p) * factor).to_array();
        }
    }

    /// Moves the bounding-box centre to the origin.
    pub fn recenter(&mut self) {
        let center = self.center();
        self.translate(-center);
    }

    /// Scales the geometry so its largest extent is 1.
    pub fn normalize(&mut self) {
        let size = self.size();
        let max_dim = size.max_element();
        if max_dim > 0.0 {
            self.scale(1.0 / max_dim);
        }
    }

    /// Expands indexed triangles into consecutive 3-vertex runs with
    /// sequential indices.
    ///
    /// Fails with the same [`MeshError`] an upload would report when the
    /// indices don't form valid triangles over the vertex list.
    pub fn unindexed(&self) -> Result<Self, MeshError> {
        validate(self.vertices.len(), &self.indices)?;

        fn expand<V: Copy>(vertices: &[V], indices: &[u16]) -> Vec<V> {
            indices.iter().map(|&i| vertices[usize::from(i)]).collect()
        }

        let vertices = match &self.vertices {
            VertexData::PositionNormal(v) => VertexData::PositionNormal(expand(v, &self.indices)),
            VertexData::TangentSpace(v) => VertexData::TangentSpace(expand(v, &self.indices)),
        };
        let indices = (0..self.indices.len()).map(|i| i as u16).collect();

        Ok(Self { vertices, indices })
    }

    /// De-indexes and fills a flat tangent basis for every triangle.
    ///
    /// # Errors
    ///
    /// [`GeometryError::NoTexCoords`] for position+normal geometry,
    /// [`GeometryError::Mesh`] for indices that don't form valid triangles,
    /// [`GeometryError::TooManyVertices`] when the expanded list no longer fits
    /// 16-bit indices.
    pub fn with_tangents(&self) -> Result<Self, GeometryError> {
        if self.vertices.kind() != VertexKind::TangentSpace {
            return Err(GeometryError::NoTexCoords(self.vertices.kind()));
        }
        if self.indices.len() > MAX_VERTICES {
            return Err(GeometryError::TooManyVertices(self.indices.len()));
        }

        let mut flat = self.unindexed()?;
        if let VertexData::TangentSpace(vertices) = &mut flat.vertices {
            fill_tangents(vertices)?;
        }
        Ok(flat)
    }

    /// Drops texture coordinates and the tangent basis.
    pub fn into_position_normal(self) -> Self {
        let vertices = match self.vertices {
            VertexData::TangentSpace(v) => {
                VertexData::PositionNormal(v.into_iter().map(VertexPn::from).collect())
            }
            pn => pn,
        };
        Self {
            vertices,
            indices: self.indices,
        }
    }

    /// Uploads this geometry as a [`MeshBuffer`].
    pub fn upload<B: RenderBackend + ?Sized>(&self, backend: &mut B) -> Result<MeshBuffer, MeshError> {
        MeshBuffer::from_geometry(backend, self)
    }
}

/// A fluent builder for loading geometry and preparing it for upload.
///
/// Operations are applied in a fixed order regardless of call order:
/// 1. Center (if requested)
/// 2. Normalize (if requested)
/// 3. Scale (if specified)
/// 4. Translate (if specified)
/// 5. Tangents (if requested)
#[derive(Debug)]
pub struct GeometryLoader {
    result: Result<RawGeometry, GeometryError>,
    center: bool,
    normalize: bool,
    tangents: bool,
    scale_factor: Option<f32>,
    translation: Option<Vec3>,
}

impl GeometryLoader {
    fn pending(result: Result<RawGeometry, GeometryError>) -> Self {
        Self {
            result,
            center: false,
            normalize: false,
            tangents: false,
            scale_factor: None,
            translation: None,
        }
    }

    /// Loads a file, picking the format from its extension.
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        Self::pending(load_file(path.as_ref()))
    }

    pub fn from_obj(path: impl AsRef<Path>) -> Self {
        Self::pending(load_obj_file(path.as_ref()))
    }

    /// Parses OBJ text held in memory. Material libraries are not resolved.
    pub fn from_obj_bytes(bytes: &[u8]) -> Self {
        let mut reader = std::io::BufReader::new(bytes);
        Self::pending(parse_obj(&mut reader))
    }

    pub fn from_stl(path: impl AsRef<Path>) -> Self {
        Self::pending(load_stl_file(path.as_ref()))
    }

    pub fn from_stl_bytes(bytes: &[u8]) -> Self {
        let mut cursor = std::io::Cursor::new(bytes);
        Self::pending(parse_stl(&mut cursor))
    }

    /// Starts from procedurally built geometry.
    pub fn from_raw(geometry: RawGeometry) -> Self {
        Self::pending(Ok(geometry))
    }

    /// Moves the bounding-box centre to the origin.
    pub fn centered(mut self) -> Self {
        self.center = true;
        self
    }

    /// Fits the geometry into a unit cube, preserving aspect ratio.
    pub fn normalized(mut self) -> Self {
        self.normalize = true;
        self
    }

    pub fn scaled(mut self, factor: f32) -> Self {
        self.scale_factor = Some(factor);
        self
    }

    pub fn translated(mut self, offset: Vec3) -> Self {
        self.translation = Some(offset);
        self
    }

    /// Computes per-face tangents and binormals (requires UVs).
    pub fn with_tangents(mut self) -> Self {
        self.tangents = true;
        self
    }

    /// Finishes loading and applies the requested operations.
    pub fn load(self) -> Result<RawGeometry, GeometryError> {
        let mut geometry = self.result?;

        if self.center {
            geometry.recenter();
        }
        if self.normalize {
            geometry.normalize();
        }
        if let Some(factor) = self.scale_factor {
            geometry.scale(factor);
        }
        if let Some(offset) = self.translation {
            geometry.translate(offset);
        }
        if self.tangents {
            geometry = geometry.with_tangents()?;
        }

        Ok(geometry)
    }

    /// Loads, prepares and uploads in one step.
    pub fn upload<B: RenderBackend + ?Sized>(self, backend: &mut B) -> Result<MeshBuffer, GeometryError> {
        let geometry = self.load()?;
        Ok(geometry.upload(backend)?)
    }
}

fn load_file(path: &Path) -> Result<RawGeometry, GeometryError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "obj" => load_obj_file(path),
        "stl" => load_stl_file(path),
        _ => Err(GeometryError::UnknownFormat(ext)),
    }
}

fn obj_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        triangulate: true,
        single_index: false,
        ..Default::default()
    }
}

fn load_obj_file(path: &Path) -> Result<RawGeometry, GeometryError> {
    let (models, materials) = tobj::load_obj(path, &obj_options()).map_err(|e| match e {
        tobj::LoadError::OpenFileFailed => GeometryError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("cannot open {}", path.display()),
        )),
        other => GeometryError::Parse(format!("OBJ parse error: {}", other)),
    })?;

    if let Err(e) = materials {
        log::warn!("ignoring materials of {}: {}", path.display(), e);
    }

    assemble_obj(&models)
}

fn parse_obj<R: BufRead>(reader: &mut R) -> Result<RawGeometry, GeometryError> {
    let (models, _) = tobj::load_obj_buf(reader, &obj_options(), |_| Ok(Default::default()))
        .map_err(|e| GeometryError::Parse(format!("OBJ parse error: {}", e)))?;

    assemble_obj(&models)
}

/// One output vertex per face corner, indices sequential, V flipped so the
/// image origin sits at the top-left.
fn assemble_obj(models: &[tobj::Model]) -> Result<RawGeometry, GeometryError> {
    let mut vertices = Vec::new();

    for model in models {
        let mesh = &model.mesh;
        let missing = |corner: usize, attribute: &'static str| GeometryError::MissingAttribute {
            model: model.name.clone(),
            corner,
            attribute,
        };

        for (corner, &position_index) in mesh.indices.iter().enumerate() {
            let normal_index = *mesh
                .normal_indices
                .get(corner)
                .ok_or_else(|| missing(corner, "normal"))?;
            let tex_index = *mesh
                .texcoord_indices
                .get(corner)
                .ok_or_else(|| missing(corner, "texture coordinate"))?;

            let position = read3(&mesh.positions, position_index).ok_or_else(|| missing(corner, "position"))?;
            let normal = read3(&mesh.normals, normal_index).ok_or_else(|| missing(corner, "normal"))?;
            let [u, v] =
                read2(&mesh.texcoords, tex_index).ok_or_else(|| missing(corner, "texture coordinate"))?;

            vertices.push(VertexPntb::new(position, normal, [u, 1.0 - v]));
        }
    }

    if vertices.len() > MAX_VERTICES {
        return Err(GeometryError::TooManyVertices(vertices.len()));
    }

    let indices = (0..vertices.len()).map(|i| i as u16).collect();
    Ok(RawGeometry::new(vertices, indices))
}

fn read3(data: &[f32], index: u32) -> Option<[f32; 3]> {
    let start = index as usize * 3;
    let slice = data.get(start..start + 3)?;
    Some([slice[0], slice[1], slice[2]])
}

fn read2(data: &[f32], index: u32) -> Option<[f32; 2]> {
    let start = index as usize * 2;
    let slice = data.get(start..start + 2)?;
    Some([slice[0], slice[1]])
}

fn load_stl_file(path: &Path) -> Result<RawGeometry, GeometryError> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    parse_stl(&mut reader)
}

fn parse_stl<R: Read + Seek>(reader: &mut R) -> Result<RawGeometry, GeometryError> {
    let stl = stl_io::read_stl(reader)
        .map_err(|e| GeometryError::Parse(format!("STL parse error: {}", e)))?;

    let vertex_count = stl.faces.len() * 3;
    if vertex_count > MAX_VERTICES {
        return Err(GeometryError::TooManyVertices(vertex_count));
    }

    let mut vertices = Vec::with_capacity(vertex_count);
    for face in &stl.faces {
        let normal: [f32; 3] = face.normal.into();
        for &vertex_index in &face.vertices {
            let position: [f32; 3] = stl.vertices[vertex_index].into();
            vertices.push(VertexPn::new(position, normal));
        }
    }

    let indices = (0..vertex_count).map(|i| i as u16).collect();
    Ok(RawGeometry::new(vertices, indices))
}
