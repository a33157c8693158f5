use super::{
    AssetDecoder, AssetError, AssetSource, DecodedAsset, DecodedMaterial, DecodedNode,
    DecodedPrimitive,
};
use crate::animation::{AnimationClip, Channel, ChannelValues, Interpolation};
use crate::render::resources::TextureImage;
use crate::scene::{NodeId, Transform};
use gltf::animation::util::ReadOutputs;
use glam::{Quat, Vec3};
use std::io::Read;
use std::path::PathBuf;

const MAX_FETCH_BYTES: u64 = 512 * 1024 * 1024;

type Imported = (
    gltf::Document,
    Vec<gltf::buffer::Data>,
    Vec<gltf::image::Data>,
);

/// glTF 2.0 (`.gltf` and `.glb`) decoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct GltfDecoder;

impl AssetDecoder for GltfDecoder {
    fn decode(&self, source: &AssetSource) -> Result<DecodedAsset, AssetError> {
        let name = source.display_name();
        let (document, buffers, images) = import(source, &name)?;

        let nodes = document
            .nodes()
            .map(|node| convert_node(&node, &buffers))
            .collect();
        let materials = document.materials().map(convert_material).collect();
        let textures = images.iter().map(convert_image).collect();
        let clips: Vec<AnimationClip> = document
            .animations()
            .enumerate()
            .map(|(index, animation)| convert_animation(index, &animation, &buffers))
            .collect();

        log::debug!(
            "Decoded '{}': {} nodes, {} materials, {} images, {} animations",
            name,
            document.nodes().len(),
            document.materials().len(),
            images.len(),
            clips.len()
        );

        Ok(DecodedAsset {
            roots: scene_roots(&document),
            name,
            nodes,
            materials,
            textures,
            clips,
        })
    }
}

fn import(source: &AssetSource, name: &str) -> Result<Imported, AssetError> {
    let decode_error = |err: gltf::Error| AssetError::Decode {
        name: name.to_string(),
        message: err.to_string(),
    };
    match source {
        AssetSource::Bytes { bytes, .. } => gltf::import_slice(&bytes[..]).map_err(decode_error),
        AssetSource::Url(url) if is_remote(url) => {
            let bytes = fetch(url)?;
            gltf::import_slice(&bytes).map_err(decode_error)
        }
        AssetSource::Url(url) => {
            let path = url
                .strip_prefix("file://")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(url));
            std::fs::metadata(&path).map_err(|source| AssetError::Read {
                path: path.display().to_string(),
                source,
            })?;
            gltf::import(&path).map_err(decode_error)
        }
    }
}

fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn fetch(url: &str) -> Result<Vec<u8>, AssetError> {
    let fetch_error = |message: String| AssetError::Fetch {
        url: url.to_string(),
        message,
    };
    let response = ureq::get(url)
        .call()
        .map_err(|err| fetch_error(err.to_string()))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_FETCH_BYTES)
        .read_to_end(&mut bytes)
        .map_err(|err| fetch_error(err.to_string()))?;
    log::debug!("Fetched {} bytes from {}", bytes.len(), url);
    Ok(bytes)
}

/// Default scene, else the first scene, else every node nobody parents.
fn scene_roots(document: &gltf::Document) -> Vec<usize> {
    if let Some(scene) = document.default_scene().or_else(|| document.scenes().next()) {
        return scene.nodes().map(|node| node.index()).collect();
    }
    let mut is_child = vec![false; document.nodes().len()];
    for node in document.nodes() {
        for child in node.children() {
            is_child[child.index()] = true;
        }
    }
    (0..is_child.len()).filter(|index| !is_child[*index]).collect()
}

fn convert_node(node: &gltf::Node<'_>, buffers: &[gltf::buffer::Data]) -> DecodedNode {
    let (translation, rotation, scale) = node.transform().decomposed();
    let primitives = node
        .mesh()
        .map(|mesh| {
            mesh.primitives()
                .filter_map(|primitive| convert_primitive(&primitive, buffers))
                .collect()
        })
        .unwrap_or_default();
    DecodedNode {
        name: node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("node_{}", node.index())),
        transform: Transform::from_trs(translation, rotation, scale),
        primitives,
        children: node.children().map(|child| child.index()).collect(),
    }
}

fn convert_primitive(
    primitive: &gltf::Primitive<'_>,
    buffers: &[gltf::buffer::Data],
) -> Option<DecodedPrimitive> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        log::debug!("Skipping {:?} primitive", primitive.mode());
        return None;
    }
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
    let positions: Vec<Vec3> = reader.read_positions()?.map(Vec3::from_array).collect();
    let count = positions.len() as u32;
    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..count).collect(),
    };
    let indices = indices
        .chunks_exact(3)
        .filter(|triangle| triangle.iter().all(|index| *index < count))
        .flatten()
        .copied()
        .collect();
    Some(DecodedPrimitive {
        positions,
        indices,
        material: primitive.material().index(),
    })
}

fn convert_material(material: gltf::Material<'_>) -> DecodedMaterial {
    let pbr = material.pbr_metallic_roughness();
    DecodedMaterial {
        name: material.name().unwrap_or("material").to_string(),
        base_color: pbr.base_color_factor(),
        texture: pbr
            .base_color_texture()
            .map(|info| info.texture().source().index()),
        double_sided: material.double_sided(),
    }
}

fn convert_image(image: &gltf::image::Data) -> TextureImage {
    use gltf::image::Format;
    let rgba: Vec<u8> = match image.format {
        Format::R8 => image.pixels.iter().flat_map(|v| [*v, *v, *v, 255]).collect(),
        Format::R8G8 => image
            .pixels
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[1], 0, 255])
            .collect(),
        Format::R8G8B8 => image
            .pixels
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        Format::R8G8B8A8 => image.pixels.clone(),
        other => {
            log::warn!("Unsupported texture format {:?}; using white", other);
            return TextureImage::new(1, 1, vec![255; 4]);
        }
    };
    TextureImage::new(image.width, image.height, rgba)
}

fn convert_animation(
    index: usize,
    animation: &gltf::Animation<'_>,
    buffers: &[gltf::buffer::Data],
) -> AnimationClip {
    let channels = animation
        .channels()
        .filter_map(|channel| convert_channel(&channel, buffers))
        .collect();
    let name = animation
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("clip_{index}"));
    AnimationClip::new(name, channels)
}

fn convert_channel(
    channel: &gltf::animation::Channel<'_>,
    buffers: &[gltf::buffer::Data],
) -> Option<Channel> {
    let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
    let times: Vec<f32> = reader.read_inputs()?.collect();
    // Cubic spline keys are stored as (in-tangent, value, out-tangent); only the
    // values are kept and interpolated linearly.
    let (interpolation, cubic) = match channel.sampler().interpolation() {
        gltf::animation::Interpolation::Linear => (Interpolation::Linear, false),
        gltf::animation::Interpolation::Step => (Interpolation::Step, false),
        gltf::animation::Interpolation::CubicSpline => (Interpolation::Linear, true),
    };
    let values = match reader.read_outputs()? {
        ReadOutputs::Translations(values) => {
            ChannelValues::Translation(keys(values.map(Vec3::from_array), cubic))
        }
        ReadOutputs::Rotations(values) => ChannelValues::Rotation(keys(
            values
                .into_f32()
                .map(|value| Quat::from_array(value).normalize()),
            cubic,
        )),
        ReadOutputs::Scales(values) => {
            ChannelValues::Scale(keys(values.map(Vec3::from_array), cubic))
        }
        ReadOutputs::MorphTargetWeights(_) => return None,
    };
    Some(Channel {
        target: NodeId(channel.target().node().index()),
        interpolation,
        times,
        values,
    })
}

fn keys<T>(values: impl Iterator<Item = T>, cubic: bool) -> Vec<T> {
    if cubic {
        values.skip(1).step_by(3).collect()
    } else {
        values.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::testing::triangle_glb;
    use crate::assets::Asset;
    use crate::render::resources::GpuResources;

    #[test]
    fn decodes_nodes_materials_and_animation_from_glb() {
        let source = AssetSource::bytes("triangle.glb", triangle_glb());
        let decoded = GltfDecoder.decode(&source).unwrap();

        assert_eq!(decoded.name, "triangle.glb");
        assert_eq!(decoded.roots, vec![0]);
        assert_eq!(decoded.nodes.len(), 2);
        assert_eq!(decoded.nodes[0].children, vec![1]);
        assert_eq!(decoded.nodes[0].transform.translation, Vec3::new(0.0, 1.0, 0.0));

        let primitive = &decoded.nodes[1].primitives[0];
        assert_eq!(primitive.positions.len(), 3);
        assert_eq!(primitive.indices, vec![0, 1, 2]);
        assert_eq!(primitive.material, Some(0));

        assert_eq!(decoded.materials[0].base_color, [1.0, 0.0, 0.0, 1.0]);
        assert!(decoded.materials[0].double_sided);

        assert_eq!(decoded.clips.len(), 1);
        let clip = &decoded.clips[0];
        assert_eq!(clip.name, "lift");
        assert_eq!(clip.duration, 1.0);
        assert_eq!(clip.channels[0].target, NodeId(1));
    }

    #[test]
    fn decoded_glb_installs_with_world_bounds() {
        let decoded = GltfDecoder
            .decode(&AssetSource::bytes("triangle.glb", triangle_glb()))
            .unwrap();
        let mut resources = GpuResources::new();
        let asset = Asset::install(1, decoded, &mut resources);
        assert_eq!(asset.center(), Vec3::new(0.5, 1.5, 0.0));
        assert_eq!(asset.bounds().max_extent(), 1.0);
    }

    #[test]
    fn malformed_bytes_are_a_decode_error() {
        let source = AssetSource::bytes("junk.glb", b"definitely not gltf".to_vec());
        let err = GltfDecoder.decode(&source).unwrap_err();
        assert!(matches!(err, AssetError::Decode { ref name, .. } if name == "junk.glb"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.glb");
        let source = AssetSource::Url(format!("file://{}", path.display()));
        let err = GltfDecoder.decode(&source).unwrap_err();
        assert!(matches!(err, AssetError::Read { .. }));
    }

    #[test]
    fn glb_file_on_disk_decodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triangle.glb");
        std::fs::write(&path, triangle_glb()).unwrap();
        let decoded = GltfDecoder
            .decode(&AssetSource::Url(path.display().to_string()))
            .unwrap();
        assert_eq!(decoded.name, "triangle.glb");
        assert_eq!(decoded.nodes.len(), 2);
    }

    #[test]
    fn cubic_keys_keep_only_values() {
        let packed = vec![0, 1, 2, 10, 11, 12];
        assert_eq!(keys(packed.into_iter(), true), vec![1, 11]);
    }
}
