//! # Pivot
//!
//! **Hierarchical transforms and mesh drawing on top of wgpu.**
//!
//! Entities live in a [`Scene`] arena and carry a local [`Transform`], an
//! optional parent and an optional [`MeshBuffer`]. Each draw composes the
//! entity's world matrix from its ancestor chain, multiplies in the inverse
//! eye matrix, and uploads the model-view and normal matrices before issuing
//! an indexed triangle draw.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pivot::{RawGeometry, SceneEntity, Transform, Vec3};
//! use pivot::math::rotation_y;
//!
//! fn main() -> Result<(), pivot::AppError> {
//!     pivot::run(|ctx| {
//!         let cube = ctx.upload(&RawGeometry::cube(0.5).into_position_normal())?;
//!         let entity = ctx.scene.spawn(
//!             SceneEntity::new(Transform::default())
//!                 .with_mesh(cube)
//!                 .with_color(Vec3::new(1.0, 0.0, 0.0)),
//!         )?;
//!
//!         Ok::<_, Box<dyn std::error::Error>>(move |frame: &mut pivot::Frame| {
//!             if let Ok(mut t) = frame.scene.transform_mut(entity) {
//!                 t.rotation = rotation_y(frame.time * 15.0);
//!             }
//!         })
//!     })
//! }
//! ```
//!
//! ## Layout
//!
//! - **Vertices** — [`VertexPn`] for plain lit meshes, [`VertexPntb`] when a
//!   normal map needs a tangent frame
//! - **Meshes** — [`MeshBuffer`] owns one vertex and one index buffer; build
//!   them from [`RawGeometry`] or load OBJ/STL through [`GeometryLoader`]
//! - **Backends** — [`RenderBackend`] is the seam between the scene and the
//!   GPU; [`RecordingBackend`] runs the whole pipeline headless
//!
//! The scene graph itself never touches wgpu, so everything up to the draw
//! call is testable without a window.

mod app;
mod geometry;
mod gpu;
pub mod math;
mod mesh;
mod render;
mod scene;
pub mod tangent;
mod texture;
mod transform;
mod vertex;

pub use app::{
    AppConfig, AppError, Frame, PointLight, SetupContext, run, run_with_config, upload_lights,
};
pub use geometry::{GeometryError, GeometryLoader, RawGeometry};
pub use gpu::{GpuContext, GpuError};
pub use mesh::{AttributeBindings, MAX_VERTICES, MeshBuffer, MeshError};
pub use render::{
    BoundAttribute, BufferId, Command, IndexedDraw, LightLocations, MAX_LIGHTS, MaterialId,
    RecordedDraw, RecordingBackend, RenderBackend, RenderContext, RenderError, ShaderUniforms,
    UniformLocation, WgpuBackend,
};
pub use scene::{Parent, Scene, SceneEntity, SceneError, SurfaceColor};
pub use tangent::TangentError;
pub use texture::{ColorSpace, Texture, tile_normal_data};
pub use transform::Transform;
pub use vertex::{Attribute, AttributeSlot, Vertex, VertexData, VertexKind, VertexPn, VertexPntb};

// Re-export glam math types for convenience
pub use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

// Entity handles come straight from hecs
pub use hecs::{Entity, World};
