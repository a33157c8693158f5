use crate::render::resources::{GeometryHandle, GpuResources, MaterialHandle};
use glam::{Mat4, Quat, Vec3};

/// Local node transform, decomposed the way glTF stores it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_trs(translation: [f32; 3], rotation: [f32; 4], scale: [f32; 3]) -> Self {
        Self {
            translation: Vec3::from_array(translation),
            rotation: Quat::from_array(rotation).normalize(),
            scale: Vec3::from_array(scale),
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Primitive {
    pub geometry: GeometryHandle,
    pub material: MaterialHandle,
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub primitives: Vec<Primitive>,
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub mesh: Option<Mesh>,
    pub children: Vec<NodeId>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            mesh: None,
            children: Vec::new(),
        }
    }
}

/// Capability view of a node that may hold GPU-backed resources.
pub trait Renderable {
    fn geometry_handles(&self) -> Vec<GeometryHandle>;
    fn material_handles(&self) -> Vec<MaterialHandle>;

    fn has_drawable_geometry(&self) -> bool {
        !self.geometry_handles().is_empty()
    }

    fn has_surface_materials(&self) -> bool {
        !self.material_handles().is_empty()
    }
}

/// Any graph whose nodes can be visited one by one.
pub trait Traversable {
    type Node: Renderable;

    fn traverse<F: FnMut(&Self::Node)>(&self, visit: F);
}

impl Renderable for SceneNode {
    fn geometry_handles(&self) -> Vec<GeometryHandle> {
        self.mesh
            .iter()
            .flat_map(|mesh| mesh.primitives.iter().map(|primitive| primitive.geometry))
            .collect()
    }

    fn material_handles(&self) -> Vec<MaterialHandle> {
        let mut handles: Vec<MaterialHandle> = Vec::new();
        for primitive in self.mesh.iter().flat_map(|mesh| mesh.primitives.iter()) {
            if !handles.contains(&primitive.material) {
                handles.push(primitive.material);
            }
        }
        handles
    }
}

/// Flat arena of scene nodes. `NodeId(i)` is the i-th node added.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
    roots: Vec<NodeId>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
        }
    }

    pub fn add_node(&mut self, node: SceneNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn add_root(&mut self, id: NodeId) {
        if id.0 < self.nodes.len() && !self.roots.contains(&id) {
            self.roots.push(id);
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// World matrices of every node reachable from the roots, parents first.
    pub fn world_transforms(&self, root: Mat4) -> Vec<(NodeId, Mat4)> {
        let mut visited = vec![false; self.nodes.len()];
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(NodeId, Mat4)> =
            self.roots.iter().rev().map(|id| (*id, root)).collect();

        while let Some((id, parent)) = stack.pop() {
            let Some(node) = self.nodes.get(id.0) else {
                continue;
            };
            if visited[id.0] {
                log::warn!("Scene node {} is reachable twice; skipping", id.0);
                continue;
            }
            visited[id.0] = true;
            let world = parent * node.transform.matrix();
            out.push((id, world));
            for child in node.children.iter().rev() {
                stack.push((*child, world));
            }
        }
        out
    }

    /// Axis-aligned bounds of all live geometry under `root`.
    pub fn world_bounds(&self, root: Mat4, resources: &GpuResources) -> Aabb {
        let mut bounds = Aabb::empty();
        for (id, world) in self.world_transforms(root) {
            let Some(mesh) = self.nodes[id.0].mesh.as_ref() else {
                continue;
            };
            for primitive in &mesh.primitives {
                if let Some(geometry) = resources.geometry(primitive.geometry) {
                    for position in &geometry.positions {
                        bounds.extend_point(world.transform_point3(*position));
                    }
                }
            }
        }
        bounds
    }
}

impl Traversable for SceneGraph {
    type Node = SceneNode;

    // Every node in the arena, including ones no root reaches.
    fn traverse<F: FnMut(&SceneNode)>(&self, visit: F) {
        self.nodes.iter().for_each(visit);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn extend_point(&mut self, point: Vec3) {
        if !point.is_finite() {
            return;
        }
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn translated(&self, offset: Vec3) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        Aabb {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    pub fn center(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            (self.min + self.max) * 0.5
        }
    }

    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    pub fn max_extent(&self) -> f32 {
        self.size().max_element()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

/// Key light front-right-top, dimmer fill light back-left.
pub const DEFAULT_LIGHTS: [PointLight; 2] = [
    PointLight {
        position: Vec3::new(100.0, 100.0, 400.0),
        color: Vec3::ONE,
        intensity: 1.0,
    },
    PointLight {
        position: Vec3::new(-500.0, 100.0, -400.0),
        color: Vec3::ONE,
        intensity: 0.5,
    },
];

/// Everything in the rendered world that is not the loaded asset.
#[derive(Debug, Clone)]
pub struct Stage {
    pub background: [u8; 3],
    pub lights: Vec<PointLight>,
}

impl Default for Stage {
    fn default() -> Self {
        Self {
            background: [0, 0, 0],
            lights: DEFAULT_LIGHTS.to_vec(),
        }
    }
}

/// Borrowed view handed to the rasterizer for one frame.
pub struct SceneView<'a> {
    pub stage: &'a Stage,
    pub content: Option<(&'a SceneGraph, Mat4)>,
}
