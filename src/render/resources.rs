//! GPU-resident memory: uploaded geometry buffers, textures and materials.
//!
//! Every resource is addressed by a typed handle. Releasing a handle that is
//! absent is a no-op.

use crate::scene::Aabb;
use glam::Vec3;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryHandle(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialHandle(u32);

/// Triangle list in object space.
#[derive(Debug, Clone)]
pub struct GeometryBuffer {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl GeometryBuffer {
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self { positions, indices }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn local_bounds(&self) -> Aabb {
        let mut bounds = Aabb::empty();
        for position in &self.positions {
            bounds.extend_point(*position);
        }
        bounds
    }
}

#[derive(Debug, Clone)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
    average: [f32; 4],
}

impl TextureImage {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        let average = average_rgba(&rgba);
        Self {
            width,
            height,
            rgba,
            average,
        }
    }

    /// Mean linear color over all texels, used as the texture's flat albedo.
    pub fn average(&self) -> [f32; 4] {
        self.average
    }
}

fn average_rgba(rgba: &[u8]) -> [f32; 4] {
    let texels = rgba.len() / 4;
    if texels == 0 {
        return [1.0, 1.0, 1.0, 1.0];
    }
    let mut sum = [0u64; 4];
    for texel in rgba.chunks_exact(4) {
        for (acc, value) in sum.iter_mut().zip(texel) {
            *acc += *value as u64;
        }
    }
    let scale = 1.0 / (texels as f32 * 255.0);
    [
        srgb_to_linear(sum[0] as f32 * scale),
        srgb_to_linear(sum[1] as f32 * scale),
        srgb_to_linear(sum[2] as f32 * scale),
        sum[3] as f32 * scale,
    ]
}

fn srgb_to_linear(value: f32) -> f32 {
    if value <= 0.04045 {
        value / 12.92
    } else {
        ((value + 0.055) / 1.055).powf(2.4)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceMaterial {
    pub name: String,
    pub base_color: [f32; 4],
    pub map: Option<TextureHandle>,
    pub double_sided: bool,
}

impl Default for SurfaceMaterial {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color: [1.0, 1.0, 1.0, 1.0],
            map: None,
            double_sided: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceStats {
    pub live_geometries: usize,
    pub live_textures: usize,
    pub live_materials: usize,
    pub released_geometries: usize,
    pub released_textures: usize,
    pub released_materials: usize,
}

impl ResourceStats {
    pub fn live_total(&self) -> usize {
        self.live_geometries + self.live_textures + self.live_materials
    }
}

#[derive(Debug, Default)]
pub struct GpuResources {
    geometries: HashMap<GeometryHandle, GeometryBuffer>,
    textures: HashMap<TextureHandle, TextureImage>,
    materials: HashMap<MaterialHandle, SurfaceMaterial>,
    next_id: u32,
    released_geometries: usize,
    released_textures: usize,
    released_materials: usize,
}

impl GpuResources {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> u32 {
        self.next_id = self.next_id.wrapping_add(1);
        self.next_id
    }

    pub fn upload_geometry(&mut self, buffer: GeometryBuffer) -> GeometryHandle {
        let handle = GeometryHandle(self.allocate_id());
        self.geometries.insert(handle, buffer);
        handle
    }

    pub fn upload_texture(&mut self, image: TextureImage) -> TextureHandle {
        let handle = TextureHandle(self.allocate_id());
        self.textures.insert(handle, image);
        handle
    }

    pub fn create_material(&mut self, material: SurfaceMaterial) -> MaterialHandle {
        let handle = MaterialHandle(self.allocate_id());
        self.materials.insert(handle, material);
        handle
    }

    pub fn geometry(&self, handle: GeometryHandle) -> Option<&GeometryBuffer> {
        self.geometries.get(&handle)
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&TextureImage> {
        self.textures.get(&handle)
    }

    pub fn material(&self, handle: MaterialHandle) -> Option<&SurfaceMaterial> {
        self.materials.get(&handle)
    }

    pub fn contains_geometry(&self, handle: GeometryHandle) -> bool {
        self.geometries.contains_key(&handle)
    }

    pub fn contains_texture(&self, handle: TextureHandle) -> bool {
        self.textures.contains_key(&handle)
    }

    pub fn contains_material(&self, handle: MaterialHandle) -> bool {
        self.materials.contains_key(&handle)
    }

    pub fn release_geometry(&mut self, handle: GeometryHandle) -> bool {
        let released = self.geometries.remove(&handle).is_some();
        if released {
            self.released_geometries += 1;
        }
        released
    }

    pub fn release_texture(&mut self, handle: TextureHandle) -> bool {
        let released = self.textures.remove(&handle).is_some();
        if released {
            self.released_textures += 1;
        }
        released
    }

    pub fn release_material(&mut self, handle: MaterialHandle) -> bool {
        let released = self.materials.remove(&handle).is_some();
        if released {
            self.released_materials += 1;
        }
        released
    }

    /// Linear RGB albedo of a material, falling back to white when the
    /// material is gone.
    pub fn material_albedo(&self, handle: MaterialHandle) -> (Vec3, bool) {
        let Some(material) = self.materials.get(&handle) else {
            return (Vec3::ONE, true);
        };
        let mut albedo = Vec3::new(
            material.base_color[0],
            material.base_color[1],
            material.base_color[2],
        );
        if let Some(texture) = material.map.and_then(|map| self.textures.get(&map)) {
            let average = texture.average();
            albedo *= Vec3::new(average[0], average[1], average[2]);
        }
        (albedo, material.double_sided)
    }

    pub fn stats(&self) -> ResourceStats {
        ResourceStats {
            live_geometries: self.geometries.len(),
            live_textures: self.textures.len(),
            live_materials: self.materials.len(),
            released_geometries: self.released_geometries,
            released_textures: self.released_textures,
            released_materials: self.released_materials,
        }
    }
}
