//! In-memory assets and a scriptable decoder for loader and viewer tests.

use super::{
    AssetDecoder, AssetError, AssetSource, DecodedAsset, DecodedMaterial, DecodedNode,
    DecodedPrimitive,
};
use crate::animation::{AnimationClip, Channel, ChannelValues, Interpolation};
use crate::render::resources::TextureImage;
use crate::scene::{NodeId, Transform};
use glam::Vec3;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

/// Unit-radius cube (extent 2 on every axis) with one textured material.
pub fn cube_asset(name: &str, animated: bool) -> DecodedAsset {
    let positions = vec![
        Vec3::new(-1.0, -1.0, -1.0),
        Vec3::new(1.0, -1.0, -1.0),
        Vec3::new(1.0, 1.0, -1.0),
        Vec3::new(-1.0, 1.0, -1.0),
        Vec3::new(-1.0, -1.0, 1.0),
        Vec3::new(1.0, -1.0, 1.0),
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(-1.0, 1.0, 1.0),
    ];
    let indices = vec![
        4, 5, 6, 4, 6, 7, // +z
        1, 0, 3, 1, 3, 2, // -z
        5, 1, 2, 5, 2, 6, // +x
        0, 4, 7, 0, 7, 3, // -x
        7, 6, 2, 7, 2, 3, // +y
        0, 1, 5, 0, 5, 4, // -y
    ];
    let clips = if animated {
        vec![AnimationClip::new(
            "hover",
            vec![Channel {
                target: NodeId(0),
                interpolation: Interpolation::Linear,
                times: vec![0.0, 1.0],
                values: ChannelValues::Translation(vec![Vec3::ZERO, Vec3::new(0.0, 0.5, 0.0)]),
            }],
        )]
    } else {
        Vec::new()
    };

    DecodedAsset {
        name: name.to_string(),
        nodes: vec![DecodedNode {
            name: "cube".to_string(),
            transform: Transform::IDENTITY,
            primitives: vec![DecodedPrimitive {
                positions,
                indices,
                material: Some(0),
            }],
            children: Vec::new(),
        }],
        roots: vec![0],
        materials: vec![DecodedMaterial {
            name: "checker".to_string(),
            base_color: [1.0, 1.0, 1.0, 1.0],
            texture: Some(0),
            double_sided: false,
        }],
        textures: vec![TextureImage::new(1, 1, vec![200, 200, 200, 255])],
        clips,
    }
}

/// Decodes byte sources by prefix: `cube…` and `anim…` succeed, anything
/// else fails. A gate registered for a source name holds its decode until
/// released.
#[derive(Default)]
pub struct ScriptedDecoder {
    gates: Mutex<HashMap<String, Receiver<()>>>,
}

impl ScriptedDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gate(&self, name: &str) -> Sender<()> {
        let (tx, rx) = mpsc::channel();
        self.gates
            .lock()
            .expect("gate lock poisoned")
            .insert(name.to_string(), rx);
        tx
    }
}

impl AssetDecoder for ScriptedDecoder {
    fn decode(&self, source: &AssetSource) -> Result<DecodedAsset, AssetError> {
        let name = source.display_name();
        let gate = self.gates.lock().expect("gate lock poisoned").remove(&name);
        if let Some(gate) = gate {
            let _ = gate.recv();
        }
        match source {
            AssetSource::Bytes { bytes, .. } if bytes.starts_with(b"cube") => {
                Ok(cube_asset(&name, false))
            }
            AssetSource::Bytes { bytes, .. } if bytes.starts_with(b"anim") => {
                Ok(cube_asset(&name, true))
            }
            AssetSource::Bytes { .. } => Err(AssetError::Decode {
                name,
                message: "unrecognized header".to_string(),
            }),
            AssetSource::Url(url) => Err(AssetError::Fetch {
                url: url.clone(),
                message: "offline".to_string(),
            }),
        }
    }
}

/// Binary glTF with a root node lifting a red triangle child, and a clip
/// animating the child's translation.
pub fn triangle_glb() -> Vec<u8> {
    let mut bin: Vec<u8> = Vec::new();
    for value in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
        bin.extend_from_slice(&value.to_le_bytes());
    }
    for index in [0u16, 1, 2, 0] {
        bin.extend_from_slice(&index.to_le_bytes());
    }
    for time in [0.0f32, 1.0] {
        bin.extend_from_slice(&time.to_le_bytes());
    }
    for value in [0.0f32, 0.0, 0.0, 0.0, 2.0, 0.0] {
        bin.extend_from_slice(&value.to_le_bytes());
    }

    let json = serde_json::json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [
            { "name": "root", "children": [1], "translation": [0.0, 1.0, 0.0] },
            { "name": "triangle", "mesh": 0 }
        ],
        "meshes": [{
            "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1, "material": 0 }]
        }],
        "materials": [{
            "name": "red",
            "pbrMetallicRoughness": { "baseColorFactor": [1.0, 0.0, 0.0, 1.0] },
            "doubleSided": true
        }],
        "buffers": [{ "byteLength": bin.len() }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 6 },
            { "buffer": 0, "byteOffset": 44, "byteLength": 8 },
            { "buffer": 0, "byteOffset": 52, "byteLength": 24 }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
              "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
            { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" },
            { "bufferView": 2, "componentType": 5126, "count": 2, "type": "SCALAR",
              "min": [0.0], "max": [1.0] },
            { "bufferView": 3, "componentType": 5126, "count": 2, "type": "VEC3" }
        ],
        "animations": [{
            "name": "lift",
            "channels": [{ "sampler": 0, "target": { "node": 1, "path": "translation" } }],
            "samplers": [{ "input": 2, "output": 3, "interpolation": "LINEAR" }]
        }]
    });

    let mut json_bytes = serde_json::to_vec(&json).expect("fixture json");
    while json_bytes.len() % 4 != 0 {
        json_bytes.push(b' ');
    }
    let total = 12 + 8 + json_bytes.len() + 8 + bin.len();
    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());
    glb.extend_from_slice(&(json_bytes.len() as u32).to_le_bytes());
    glb.extend_from_slice(&0x4E4F_534Au32.to_le_bytes());
    glb.extend_from_slice(&json_bytes);
    glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    glb.extend_from_slice(&0x004E_4942u32.to_le_bytes());
    glb.extend_from_slice(&bin);
    glb
}
