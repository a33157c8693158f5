mod gltf_decoder;
mod loader;
mod reclaim;

#[cfg(test)]
pub(crate) mod testing;

pub use gltf_decoder::GltfDecoder;
pub use loader::{AssetLoader, LoadCompletion, LoadTicket};
pub use reclaim::{reclaim, reclaim_graph};

use crate::animation::AnimationClip;
use crate::render::resources::{
    GeometryBuffer, GpuResources, MaterialHandle, SurfaceMaterial, TextureHandle, TextureImage,
};
use crate::scene::{Aabb, Mesh, NodeId, Primitive, SceneGraph, SceneNode, Transform};
use glam::{Mat4, Vec3};
use std::path::Path;
use std::sync::Arc;

/// Where an asset comes from: a URL or path, or bytes the caller already holds.
#[derive(Debug, Clone)]
pub enum AssetSource {
    Url(String),
    Bytes { name: String, bytes: Arc<[u8]> },
}

impl AssetSource {
    pub fn bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        AssetSource::Bytes {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            AssetSource::Url(url) => {
                let trimmed = url.split(['?', '#']).next().unwrap_or(url);
                Path::new(trimmed)
                    .file_name()
                    .and_then(|value| value.to_str())
                    .filter(|value| !value.is_empty())
                    .unwrap_or(url)
                    .to_string()
            }
            AssetSource::Bytes { name, .. } => name.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read asset at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },
    #[error("failed to decode {name}: {message}")]
    Decode { name: String, message: String },
    #[error("load worker for {name} panicked")]
    WorkerPanicked { name: String },
    #[error("failed to start load worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPrimitive {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub material: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMaterial {
    pub name: String,
    pub base_color: [f32; 4],
    pub texture: Option<usize>,
    pub double_sided: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedNode {
    pub name: String,
    pub transform: Transform,
    pub primitives: Vec<DecodedPrimitive>,
    pub children: Vec<usize>,
}

/// CPU-side result of decoding, before anything is uploaded.
#[derive(Debug, Clone)]
pub struct DecodedAsset {
    pub name: String,
    pub nodes: Vec<DecodedNode>,
    pub roots: Vec<usize>,
    pub materials: Vec<DecodedMaterial>,
    pub textures: Vec<TextureImage>,
    pub clips: Vec<AnimationClip>,
}

/// Turns an [`AssetSource`] into decoded content. Runs on load worker threads.
pub trait AssetDecoder: Send + Sync {
    fn decode(&self, source: &AssetSource) -> Result<DecodedAsset, AssetError>;
}

/// The live, uploaded asset.
#[derive(Debug)]
pub struct Asset {
    token: u64,
    name: String,
    graph: SceneGraph,
    clips: Vec<AnimationClip>,
    bounds: Aabb,
    center: Vec3,
    rotation: f32,
}

impl Asset {
    /// Uploads `decoded` into `resources`. Node `i` of the decoded asset
    /// becomes `NodeId(i)`.
    pub fn install(token: u64, decoded: DecodedAsset, resources: &mut GpuResources) -> Self {
        let DecodedAsset {
            name,
            nodes,
            roots,
            materials,
            textures,
            clips,
        } = decoded;

        let mut uploader = Uploader {
            resources,
            textures: textures.into_iter().map(Some).collect(),
            texture_handles: Vec::new(),
            materials,
            material_handles: Vec::new(),
            default_material: None,
        };
        uploader.texture_handles = vec![None; uploader.textures.len()];
        uploader.material_handles = vec![None; uploader.materials.len()];

        let node_count = nodes.len();
        let mut graph = SceneGraph::new();
        for decoded_node in nodes {
            let mut node = SceneNode::new(decoded_node.name);
            node.transform = decoded_node.transform;
            node.children = decoded_node
                .children
                .into_iter()
                .filter(|child| *child < node_count)
                .map(NodeId)
                .collect();
            if !decoded_node.primitives.is_empty() {
                let primitives = decoded_node
                    .primitives
                    .into_iter()
                    .map(|primitive| uploader.primitive(primitive))
                    .collect();
                node.mesh = Some(Mesh { primitives });
            }
            graph.add_node(node);
        }
        for root in roots {
            graph.add_root(NodeId(root));
        }

        let world = graph.world_bounds(Mat4::IDENTITY, uploader.resources);
        let center = world.center();
        let bounds = world.translated(-center);
        log::info!(
            "Installed '{}': {} nodes, {} clips, extent {:?}",
            name,
            graph.len(),
            clips.len(),
            bounds.size()
        );

        Self {
            token,
            name,
            graph,
            clips,
            bounds,
            center,
            rotation: 0.0,
        }
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    pub fn clips(&self) -> &[AnimationClip] {
        &self.clips
    }

    /// Bounds after recentering on the origin.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Centroid of the asset in its own coordinates, before recentering.
    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn rotate_by(&mut self, radians: f32) {
        self.rotation += radians;
    }

    /// Recenters the asset on the origin, then spins it about the up axis.
    pub fn root_matrix(&self) -> Mat4 {
        Mat4::from_rotation_y(self.rotation) * Mat4::from_translation(-self.center)
    }
}

struct Uploader<'a> {
    resources: &'a mut GpuResources,
    textures: Vec<Option<TextureImage>>,
    texture_handles: Vec<Option<TextureHandle>>,
    materials: Vec<DecodedMaterial>,
    material_handles: Vec<Option<MaterialHandle>>,
    default_material: Option<MaterialHandle>,
}

impl Uploader<'_> {
    fn primitive(&mut self, primitive: DecodedPrimitive) -> Primitive {
        let material = self.material(primitive.material);
        let geometry = self
            .resources
            .upload_geometry(GeometryBuffer::new(primitive.positions, primitive.indices));
        Primitive { geometry, material }
    }

    fn material(&mut self, index: Option<usize>) -> MaterialHandle {
        let Some(index) = index.filter(|index| *index < self.materials.len()) else {
            return self.default_material();
        };
        if let Some(handle) = self.material_handles[index] {
            return handle;
        }
        let decoded = self.materials[index].clone();
        let map = decoded.texture.and_then(|texture| self.texture(texture));
        let handle = self.resources.create_material(SurfaceMaterial {
            name: decoded.name,
            base_color: decoded.base_color,
            map,
            double_sided: decoded.double_sided,
        });
        self.material_handles[index] = Some(handle);
        handle
    }

    // Only textures some material references are uploaded.
    fn texture(&mut self, index: usize) -> Option<TextureHandle> {
        if let Some(handle) = self.texture_handles.get(index).copied().flatten() {
            return Some(handle);
        }
        let image = self.textures.get_mut(index)?.take()?;
        let handle = self.resources.upload_texture(image);
        self.texture_handles[index] = Some(handle);
        Some(handle)
    }

    fn default_material(&mut self) -> MaterialHandle {
        match self.default_material {
            Some(handle) => handle,
            None => {
                let handle = self.resources.create_material(SurfaceMaterial::default());
                self.default_material = Some(handle);
                handle
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::testing::cube_asset;

    #[test]
    fn install_uploads_and_recenters() {
        let mut resources = GpuResources::new();
        let mut decoded = cube_asset("cube.glb", false);
        decoded.nodes[0].transform.translation = Vec3::new(5.0, 0.0, 0.0);
        let asset = Asset::install(1, decoded, &mut resources);

        let stats = resources.stats();
        assert_eq!(stats.live_geometries, 1);
        assert_eq!(stats.live_materials, 1);
        assert_eq!(stats.live_textures, 1);
        assert_eq!(asset.center(), Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(asset.bounds().min, Vec3::splat(-1.0));
        assert_eq!(asset.bounds().max, Vec3::splat(1.0));
        let origin = asset.root_matrix().transform_point3(asset.center());
        assert!(origin.length() < 1e-6);
    }

    #[test]
    fn unreferenced_textures_are_not_uploaded() {
        let mut resources = GpuResources::new();
        let mut decoded = cube_asset("cube.glb", false);
        decoded.materials[0].texture = None;
        Asset::install(1, decoded, &mut resources);
        assert_eq!(resources.stats().live_textures, 0);
    }

    #[test]
    fn primitives_without_material_share_one_default() {
        let mut resources = GpuResources::new();
        let mut decoded = cube_asset("cube.glb", false);
        let mut extra = decoded.nodes[0].primitives[0].clone();
        extra.material = None;
        decoded.nodes[0].primitives = vec![extra.clone(), extra];
        Asset::install(1, decoded, &mut resources);
        assert_eq!(resources.stats().live_materials, 1);
        assert_eq!(resources.stats().live_geometries, 2);
    }

    #[test]
    fn display_name_strips_path_and_query() {
        let source = AssetSource::Url("https://example.com/models/duck.glb?v=2".to_string());
        assert_eq!(source.display_name(), "duck.glb");
        assert_eq!(AssetSource::bytes("upload.glb", vec![1u8]).display_name(), "upload.glb");
    }
}
