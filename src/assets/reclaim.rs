use super::Asset;
use crate::render::resources::GpuResources;
use crate::scene::{Renderable, Traversable};

/// Releases the GPU resources held by `asset`. Safe to call on an asset whose
/// resources are already gone.
pub fn reclaim(asset: Option<&Asset>, resources: &mut GpuResources) {
    let Some(asset) = asset else {
        return;
    };
    let before = resources.stats().live_total();
    reclaim_graph(asset.graph(), resources);
    log::debug!(
        "Reclaimed '{}': {} resources released",
        asset.name(),
        before - resources.stats().live_total()
    );
}

/// Walks every node of `graph`, releasing geometry, then each material's map
/// followed by the material.
pub fn reclaim_graph<G: Traversable>(graph: &G, resources: &mut GpuResources) {
    graph.traverse(|node| {
        if node.has_drawable_geometry() {
            for geometry in node.geometry_handles() {
                if resources.contains_geometry(geometry) {
                    resources.release_geometry(geometry);
                }
            }
        }
        if node.has_surface_materials() {
            for material in node.material_handles() {
                let map = resources.material(material).and_then(|material| material.map);
                if let Some(texture) = map.filter(|texture| resources.contains_texture(*texture)) {
                    resources.release_texture(texture);
                }
                if resources.contains_material(material) {
                    resources.release_material(material);
                }
            }
        }
    });
}
