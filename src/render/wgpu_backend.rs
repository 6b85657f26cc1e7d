use std::collections::HashMap;

use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use super::{BoundAttribute, BufferId, IndexedDraw, RenderBackend, ShaderUniforms, UniformLocation};
use crate::gpu::GpuContext;
use crate::mesh::AttributeBindings;
use crate::texture::{ColorSpace, Texture};
use crate::vertex::VertexKind;

/// Number of point lights the built-in shaders evaluate.
pub const MAX_LIGHTS: usize = 3;

/// Uniform slots of one point light.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LightLocations {
    /// Eye-space position.
    pub position: UniformLocation,
    pub color: UniformLocation,
    pub specular: UniformLocation,
}

/// Handle to a material created with [`WgpuBackend::create_material`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(usize);

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct LightUniform {
    position: [f32; 4],
    color: [f32; 4],
    specular: [f32; 4],
}

/// Uniform block shared by both shaders; must match `Uniforms` in the WGSL.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct DrawUniforms {
    model_view: [[f32; 4]; 4],
    normal_matrix: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
    color: [f32; 4],
    lights: [LightUniform; MAX_LIGHTS],
}

impl Default for DrawUniforms {
    fn default() -> Self {
        Self {
            model_view: Mat4::IDENTITY.to_cols_array_2d(),
            normal_matrix: Mat4::IDENTITY.to_cols_array_2d(),
            projection: Mat4::IDENTITY.to_cols_array_2d(),
            color: [1.0, 1.0, 1.0, 1.0],
            lights: bytemuck::Zeroable::zeroed(),
        }
    }
}

/// A draw waiting for [`WgpuBackend::submit`], with the uniforms that were
/// current when it was issued.
struct PendingDraw {
    uniforms: DrawUniforms,
    kind: VertexKind,
    vertex_buffer: BufferId,
    index_buffer: BufferId,
    index_count: u32,
    index_format: wgpu::IndexFormat,
    material: Option<MaterialId>,
}

/// A [`RenderBackend`] that renders through wgpu.
///
/// Uniform uploads update a current-state block; every `draw_indexed` records
/// a snapshot of that block so draws issued one after another each keep their
/// own matrices. [`submit`](Self::submit) writes all snapshots into a single
/// dynamic-offset uniform buffer and replays the frame in one depth-tested
/// render pass.
///
/// Position+normal meshes use a flat-shaded pipeline; tangent-space meshes use
/// a normal-mapped pipeline sampling the current material. Both expect the
/// attribute locations of [`AttributeBindings::standard`] and the uniform
/// slots of [`WgpuBackend::uniforms`].
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target_format: wgpu::TextureFormat,

    buffers: Vec<wgpu::Buffer>,
    current: DrawUniforms,
    pending: Vec<PendingDraw>,

    uniform_stride: u64,
    uniform_capacity: usize,
    uniform_buffer: wgpu::Buffer,
    uniform_layout: wgpu::BindGroupLayout,
    uniform_bind_group: wgpu::BindGroup,

    material_layout: wgpu::BindGroupLayout,
    materials: Vec<wgpu::BindGroup>,
    default_material: MaterialId,
    current_material: Option<MaterialId>,

    pipelines: HashMap<VertexKind, wgpu::RenderPipeline>,

    depth_view: wgpu::TextureView,
    depth_size: (u32, u32),
}

impl WgpuBackend {
    pub const MODEL_VIEW: UniformLocation = UniformLocation(0);
    pub const NORMAL_MATRIX: UniformLocation = UniformLocation(1);
    pub const PROJECTION: UniformLocation = UniformLocation(2);
    pub const COLOR: UniformLocation = UniformLocation(3);
    const FIRST_LIGHT: u32 = 4;

    pub fn new(gpu: &GpuContext) -> Self {
        let device = gpu.device.clone();

        let alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment);
        let uniform_stride = (std::mem::size_of::<DrawUniforms>() as u64).div_ceil(alignment) * alignment;

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Draw Uniforms Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<DrawUniforms>() as u64),
                },
                count: None,
            }],
        });

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material Layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                texture_entry(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let uniform_capacity = 16;
        let (uniform_buffer, uniform_bind_group) =
            create_uniform_buffer(&device, &uniform_layout, uniform_stride, uniform_capacity);

        let (depth_view, depth_size) = create_depth_view(&device, gpu.width(), gpu.height());

        let mut backend = Self {
            device,
            queue: gpu.queue.clone(),
            target_format: gpu.config.format,
            buffers: Vec::new(),
            current: DrawUniforms::default(),
            pending: Vec::new(),
            uniform_stride,
            uniform_capacity,
            uniform_buffer,
            uniform_layout,
            uniform_bind_group,
            material_layout,
            materials: Vec::new(),
            default_material: MaterialId(0),
            current_material: None,
            pipelines: HashMap::new(),
            depth_view,
            depth_size,
        };

        let white = Texture::solid(gpu, [255, 255, 255, 255], ColorSpace::Srgb, "Default Diffuse");
        let gloss = Texture::solid(gpu, [255, 255, 255, 255], ColorSpace::Linear, "Default Specular");
        let flat = Texture::solid(gpu, [128, 128, 255, 255], ColorSpace::Linear, "Default Normal");
        backend.default_material = backend.create_material(&white, &gloss, &flat);

        backend
    }

    /// Uniform slots understood by the built-in shaders.
    pub fn uniforms() -> ShaderUniforms {
        ShaderUniforms {
            model_view: Self::MODEL_VIEW,
            normal_matrix: Self::NORMAL_MATRIX,
            projection: Self::PROJECTION,
            color: Some(Self::COLOR),
        }
    }

    /// Attribute locations the built-in shaders read.
    pub fn bindings() -> AttributeBindings {
        AttributeBindings::standard()
    }

    /// Uniform slots of light `index`, or `None` past [`MAX_LIGHTS`].
    pub fn light(index: usize) -> Option<LightLocations> {
        if index >= MAX_LIGHTS {
            return None;
        }
        let base = Self::FIRST_LIGHT + 3 * index as u32;
        Some(LightLocations {
            position: UniformLocation(base),
            color: UniformLocation(base + 1),
            specular: UniformLocation(base + 2),
        })
    }

    /// Bundles diffuse, specular and normal maps for the normal-mapped pipeline.
    pub fn create_material(
        &mut self,
        diffuse: &Texture,
        specular: &Texture,
        normal: &Texture,
    ) -> MaterialId {
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Material Bind Group"),
            layout: &self.material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&diffuse.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&specular.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&normal.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&diffuse.sampler),
                },
            ],
        });
        self.materials.push(bind_group);
        MaterialId(self.materials.len() - 1)
    }

    /// Material used by subsequent tangent-space draws; `None` restores the
    /// default white material with a flat normal map.
    pub fn set_material(&mut self, material: Option<MaterialId>) {
        self.current_material = material;
    }

    /// Number of draws recorded since the last submit.
    pub fn pending_draws(&self) -> usize {
        self.pending.len()
    }

    /// Renders every pending draw into `target` and clears the pending list.
    pub fn submit(&mut self, target: &wgpu::TextureView, width: u32, height: u32, clear: wgpu::Color) {
        if self.depth_size != (width, height) {
            let (view, size) = create_depth_view(&self.device, width, height);
            self.depth_view = view;
            self.depth_size = size;
        }

        let draws = std::mem::take(&mut self.pending);
        self.write_uniforms(&draws);

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for (i, draw) in draws.iter().enumerate() {
                let Some(pipeline) = self.pipelines.get(&draw.kind) else {
                    continue;
                };
                let (Some(vertices), Some(indices)) = (
                    self.buffers.get(draw.vertex_buffer.index()),
                    self.buffers.get(draw.index_buffer.index()),
                ) else {
                    log::warn!("skipping draw with unknown buffers");
                    continue;
                };

                let offset = (i as u64 * self.uniform_stride) as u32;
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &self.uniform_bind_group, &[offset]);
                if draw.kind == VertexKind::TangentSpace {
                    let material = draw.material.unwrap_or(self.default_material);
                    pass.set_bind_group(1, &self.materials[material.0], &[]);
                }
                pass.set_vertex_buffer(0, vertices.slice(..));
                pass.set_index_buffer(indices.slice(..), draw.index_format);
                pass.draw_indexed(0..draw.index_count, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn write_uniforms(&mut self, draws: &[PendingDraw]) {
        if draws.is_empty() {
            return;
        }

        if draws.len() > self.uniform_capacity {
            self.uniform_capacity = draws.len().next_power_of_two();
            let (buffer, bind_group) = create_uniform_buffer(
                &self.device,
                &self.uniform_layout,
                self.uniform_stride,
                self.uniform_capacity,
            );
            self.uniform_buffer = buffer;
            self.uniform_bind_group = bind_group;
            log::debug!("grew uniform buffer to {} draws", self.uniform_capacity);
        }

        let stride = self.uniform_stride as usize;
        let mut bytes = vec![0u8; draws.len() * stride];
        for (chunk, draw) in bytes.chunks_exact_mut(stride).zip(draws) {
            let block = bytemuck::bytes_of(&draw.uniforms);
            chunk[..block.len()].copy_from_slice(block);
        }
        self.queue.write_buffer(&self.uniform_buffer, 0, &bytes);
    }

    fn ensure_pipeline(&mut self, draw: &IndexedDraw<'_>) {
        if self.pipelines.contains_key(&draw.kind) {
            return;
        }

        let (label, source) = match draw.kind {
            VertexKind::PositionNormal => ("Solid", include_str!("../shaders/solid.wgsl")),
            VertexKind::TangentSpace => ("Normal Mapped", include_str!("../shaders/normal_mapped.wgsl")),
        };

        let shader = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let bind_group_layouts: &[&wgpu::BindGroupLayout] = match draw.kind {
            VertexKind::PositionNormal => &[&self.uniform_layout],
            VertexKind::TangentSpace => &[&self.uniform_layout, &self.material_layout],
        };
        let layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts,
            push_constant_ranges: &[],
        });

        let attributes: Vec<wgpu::VertexAttribute> = draw
            .attributes
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: a.format,
                offset: a.offset,
                shader_location: a.location,
            })
            .collect();

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: draw.stride,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.target_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                front_face: wgpu::FrontFace::Ccw,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        log::debug!("created {} pipeline for {:?} vertices", label, draw.kind);
        self.pipelines.insert(draw.kind, pipeline);
    }

    fn allocate(&mut self, buffer: wgpu::Buffer) -> BufferId {
        self.buffers.push(buffer);
        BufferId((self.buffers.len() - 1) as u32)
    }
}

impl RenderBackend for WgpuBackend {
    fn create_vertex_buffer(&mut self, label: &str, contents: &[u8]) -> BufferId {
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage: wgpu::BufferUsages::VERTEX,
        });
        self.allocate(buffer)
    }

    fn create_index_buffer(&mut self, label: &str, indices: &[u16]) -> BufferId {
        // Buffer writes must be 4-byte aligned; pad odd index counts.
        let mut padded = indices.to_vec();
        if padded.len() % 2 != 0 {
            padded.push(0);
        }
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&padded),
            usage: wgpu::BufferUsages::INDEX,
        });
        self.allocate(buffer)
    }

    fn upload_matrix(&mut self, location: UniformLocation, matrix: Mat4) {
        let cols = matrix.to_cols_array_2d();
        match location {
            Self::MODEL_VIEW => self.current.model_view = cols,
            Self::NORMAL_MATRIX => self.current.normal_matrix = cols,
            Self::PROJECTION => self.current.projection = cols,
            other => log::warn!("no matrix uniform at location {}", other.0),
        }
    }

    fn upload_vec3(&mut self, location: UniformLocation, value: Vec3) {
        if location == Self::COLOR {
            self.current.color = value.extend(1.0).to_array();
            return;
        }

        let slot = location.0.checked_sub(Self::FIRST_LIGHT).map(|s| s as usize);
        match slot {
            Some(slot) if slot < 3 * MAX_LIGHTS => {
                let light = &mut self.current.lights[slot / 3];
                let value = value.extend(1.0).to_array();
                match slot % 3 {
                    0 => light.position = value,
                    1 => light.color = value,
                    _ => light.specular = value,
                }
            }
            _ => log::warn!("no vector uniform at location {}", location.0),
        }
    }

    fn draw_indexed(&mut self, draw: &IndexedDraw<'_>) {
        if let Some(bound) = nonstandard_binding(draw.attributes) {
            log::warn!(
                "{:?} is bound to location {}, but the built-in shaders read it elsewhere; draw skipped",
                bound.attribute,
                bound.location
            );
            return;
        }
        self.ensure_pipeline(draw);

        self.pending.push(PendingDraw {
            uniforms: self.current,
            kind: draw.kind,
            vertex_buffer: draw.vertex_buffer,
            index_buffer: draw.index_buffer,
            index_count: draw.index_count,
            index_format: draw.index_format,
            material: self.current_material,
        });
    }
}

/// First attribute bound somewhere other than the location the built-in
/// shaders read it from. Pipelines are cached per [`VertexKind`], so every
/// draw must use the standard locations.
fn nonstandard_binding(attributes: &[BoundAttribute]) -> Option<&BoundAttribute> {
    let standard = AttributeBindings::standard();
    attributes
        .iter()
        .find(|a| standard.location(a.attribute) != Some(a.location))
}

fn create_uniform_buffer(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    stride: u64,
    capacity: usize,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Draw Uniforms"),
        size: stride * capacity as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Draw Uniforms Bind Group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: wgpu::BufferSize::new(std::mem::size_of::<DrawUniforms>() as u64),
            }),
        }],
    });

    (buffer, bind_group)
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> (wgpu::TextureView, (u32, u32)) {
    let size = (width.max(1), height.max(1));
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: size.0,
            height: size.1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Depth32Float,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (view, size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::Attribute;

    #[test]
    fn uniform_block_matches_shader_layout() {
        // 3 mat4 + vec4 colour + 3 lights of 3 vec4 each.
        assert_eq!(std::mem::size_of::<DrawUniforms>(), 3 * 64 + 16 + 3 * 48);
    }

    #[test]
    fn light_slots_follow_the_fixed_uniforms() {
        let first = WgpuBackend::light(0).unwrap();
        assert_eq!(first.position, UniformLocation(4));
        assert_eq!(first.color, UniformLocation(5));
        assert_eq!(first.specular, UniformLocation(6));

        let last = WgpuBackend::light(MAX_LIGHTS - 1).unwrap();
        assert_eq!(last.specular, UniformLocation(12));
        assert!(WgpuBackend::light(MAX_LIGHTS).is_none());
    }

    #[test]
    fn standard_bindings_pass_for_both_layouts() {
        let bindings = AttributeBindings::standard();
        for kind in [VertexKind::PositionNormal, VertexKind::TangentSpace] {
            let attributes = bindings.resolve(kind).unwrap();
            assert!(nonstandard_binding(&attributes).is_none());
        }
    }

    #[test]
    fn moved_locations_are_rejected() {
        let bindings = AttributeBindings::new()
            .with(Attribute::Position, 5)
            .with(Attribute::Normal, 7);
        let attributes = bindings.resolve(VertexKind::PositionNormal).unwrap();

        let bound = nonstandard_binding(&attributes).unwrap();
        assert_eq!((bound.attribute, bound.location), (Attribute::Position, 5));

        // A single moved attribute is enough to reject the draw.
        let partial = AttributeBindings::standard().with(Attribute::Tangent, 9);
        let attributes = partial.resolve(VertexKind::TangentSpace).unwrap();
        let bound = nonstandard_binding(&attributes).unwrap();
        assert_eq!((bound.attribute, bound.location), (Attribute::Tangent, 9));
    }

    #[test]
    fn uniform_slots_are_distinct() {
        let u = WgpuBackend::uniforms();
        let mut slots = vec![u.model_view.0, u.normal_matrix.0, u.projection.0, u.color.unwrap().0];
        for i in 0..MAX_LIGHTS {
            let l = WgpuBackend::light(i).unwrap();
            slots.extend([l.position.0, l.color.0, l.specular.0]);
        }
        let count = slots.len();
        slots.sort_unstable();
        slots.dedup();
        assert_eq!(slots.len(), count);
    }
}
