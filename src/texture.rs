use crate::gpu::GpuContext;

/// How texel values are interpreted when sampled.
///
/// Colour maps are authored in sRGB; specular and normal maps hold linear data
/// and must not be gamma-decoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorSpace {
    #[default]
    Srgb,
    Linear,
}

impl ColorSpace {
    fn format(self) -> wgpu::TextureFormat {
        match self {
            ColorSpace::Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            ColorSpace::Linear => wgpu::TextureFormat::Rgba8Unorm,
        }
    }
}

/// A GPU texture that can be bound to shaders.
#[derive(Debug)]
pub struct Texture {
    #[allow(dead_code)]
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) sampler: wgpu::Sampler,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    /// Create a texture from raw RGBA data.
    pub fn from_rgba(
        gpu: &GpuContext,
        data: &[u8],
        width: u32,
        height: u32,
        color_space: ColorSpace,
        label: &str,
    ) -> Self {
        use wgpu::util::DeviceExt;

        let texture = gpu.device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: color_space.format(),
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            data,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{} Sampler", label)),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        log::debug!("created {}x{} {:?} texture '{}'", width, height, color_space, label);

        Self {
            texture,
            view,
            sampler,
            width,
            height,
        }
    }

    /// A 1x1 texture of a single colour.
    pub fn solid(gpu: &GpuContext, rgba: [u8; 4], color_space: ColorSpace, label: &str) -> Self {
        Self::from_rgba(gpu, &rgba, 1, 1, color_space, label)
    }

    /// Load a texture from an image file.
    pub fn from_file(
        gpu: &GpuContext,
        path: &str,
        color_space: ColorSpace,
    ) -> Result<Self, image::ImageError> {
        let img = image::open(path)?.to_rgba8();
        let (width, height) = img.dimensions();
        Ok(Self::from_rgba(gpu, &img, width, height, color_space, path))
    }

    /// Load a texture from embedded bytes.
    pub fn from_bytes(
        gpu: &GpuContext,
        bytes: &[u8],
        color_space: ColorSpace,
        label: &str,
    ) -> Result<Self, image::ImageError> {
        let img = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = img.dimensions();
        Ok(Self::from_rgba(gpu, &img, width, height, color_space, label))
    }

    /// Generate a tangent-space normal map of raised square tiles.
    pub fn tile_normals(gpu: &GpuContext, size: u32, tiles: u32, seed: u32) -> Self {
        let data = tile_normal_data(size, tiles, seed);
        Self::from_rgba(gpu, &data, size, size, ColorSpace::Linear, "Tile Normal Map")
    }
}

/// RGBA bytes of a tangent-space normal map: flat tile faces with bevelled
/// edges, each tile slightly tilted by a hashed offset.
///
/// Normals are encoded as `(n * 0.5 + 0.5) * 255` with +Z out of the surface.
pub fn tile_normal_data(size: u32, tiles: u32, seed: u32) -> Vec<u8> {
    let tiles = tiles.max(1);
    let tile_size = (size / tiles).max(1);
    let bevel = (tile_size / 8).max(1);
    let mut data = vec![0u8; (size * size * 4) as usize];

    for y in 0..size {
        for x in 0..size {
            let idx = ((y * size + x) * 4) as usize;
            let (tx, ty) = (x % tile_size, y % tile_size);

            let mut nx = 0.0f32;
            let mut ny = 0.0f32;
            if tx < bevel {
                nx -= 0.7;
            } else if tx >= tile_size - bevel {
                nx += 0.7;
            }
            if ty < bevel {
                ny -= 0.7;
            } else if ty >= tile_size - bevel {
                ny += 0.7;
            }

            let tilt = hash(x / tile_size, y / tile_size, seed);
            nx += ((tilt % 17) as f32 - 8.0) * 0.01;
            ny += (((tilt >> 8) % 17) as f32 - 8.0) * 0.01;

            let n = glam::Vec3::new(nx, ny, 1.0).normalize();
            data[idx] = encode(n.x);
            data[idx + 1] = encode(n.y);
            data[idx + 2] = encode(n.z);
            data[idx + 3] = 255;
        }
    }

    data
}

fn encode(component: f32) -> u8 {
    ((component * 0.5 + 0.5) * 255.0).round().clamp(0.0, 255.0) as u8
}

fn hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_add(x.wrapping_mul(374761393));
    h = h.wrapping_add(y.wrapping_mul(668265263));
    h ^= h >> 13;
    h = h.wrapping_mul(1274126177);
    h ^= h >> 16;
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_normals_fill_every_texel() {
        let data = tile_normal_data(32, 4, 7);
        assert_eq!(data.len(), 32 * 32 * 4);
        assert!(data.chunks_exact(4).all(|texel| texel[3] == 255));
    }

    #[test]
    fn tile_normals_point_out_of_the_surface() {
        let data = tile_normal_data(16, 2, 1);
        for texel in data.chunks_exact(4) {
            // Z is always the dominant positive component.
            assert!(texel[2] > 128);
        }
    }

    #[test]
    fn tile_centres_are_nearly_flat() {
        let size = 64;
        let data = tile_normal_data(size, 4, 3);
        let center = ((8 * size + 8) * 4) as usize;
        assert!((data[center] as i32 - 128).abs() < 16);
        assert!((data[center + 1] as i32 - 128).abs() < 16);
    }

    #[test]
    fn same_seed_is_deterministic() {
        assert_eq!(tile_normal_data(8, 2, 42), tile_normal_data(8, 2, 42));
    }
}
