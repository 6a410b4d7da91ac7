//! Model decoding for GLB/glTF files
//!
//! Uses the gltf crate to turn a binary glTF blob into an [`Object3D`]
//! hierarchy. Node transforms are kept; each triangle primitive becomes its
//! own mesh child so every primitive carries its own material.

use crate::material::{Material, Shading};
use crate::mesh::Geometry;
use crate::scene::{Object3D, Transform};
use glam::{Quat, Vec3};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to parse model: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("model contains no scenes")]
    NoScene,
    #[error("mesh {0:?} has a primitive without positions")]
    MissingPositions(String),
    #[error("model contains no triangle meshes")]
    Empty,
}

/// Decode a GLB (or self-contained glTF) byte slice into a scene subtree.
///
/// Only geometry buffers are resolved. Embedded images are never decoded,
/// so textures in formats the image decoder lacks (WebP, KTX2) do not fail
/// the model.
pub fn decode_model(name: &str, bytes: &[u8]) -> Result<Object3D, AssetError> {
    let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(bytes)?;
    let buffers = gltf::import_buffers(&document, None, blob)?;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or(AssetError::NoScene)?;

    let mut root = Object3D::group(name);
    for node in scene.nodes() {
        root.add_child(convert_node(&node, &buffers)?);
    }

    let mesh_count = root.mesh_count();
    if mesh_count == 0 {
        return Err(AssetError::Empty);
    }

    log::info!("Decoded model {}: {} mesh nodes", name, mesh_count);
    Ok(root)
}

fn convert_node(node: &gltf::Node, buffers: &[gltf::buffer::Data]) -> Result<Object3D, AssetError> {
    let label = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node-{}", node.index()));

    let (translation, rotation, scale) = node.transform().decomposed();
    let mut object = Object3D::group(label.clone());
    object.transform = Transform {
        position: Vec3::from_array(translation),
        rotation: Quat::from_array(rotation),
        scale: Vec3::from_array(scale),
    };

    if let Some(mesh) = node.mesh() {
        let mesh_name = mesh.name().unwrap_or(&label).to_string();
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!("Skipping non-triangle primitive in mesh {}", mesh_name);
                continue;
            }

            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));

            let positions: Vec<[f32; 3]> = reader
                .read_positions()
                .ok_or_else(|| AssetError::MissingPositions(mesh_name.clone()))?
                .collect();
            let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(|n| n.collect());
            let indices: Option<Vec<u32>> = reader.read_indices().map(|i| i.into_u32().collect());

            let geometry = Geometry::from_buffers(positions, normals, indices);
            let material = convert_material(&primitive.material());
            let child_name = format!("{}-{}", mesh_name, primitive.index());
            object.add_child(Object3D::from_geometry(child_name, Arc::new(geometry), material));
        }
    }

    for child in node.children() {
        object.add_child(convert_node(&child, buffers)?);
    }

    Ok(object)
}

fn convert_material(material: &gltf::Material) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let [r, g, b, a] = pbr.base_color_factor();
    let blended = material.alpha_mode() == gltf::material::AlphaMode::Blend;
    Material {
        color: [r, g, b],
        metalness: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
        opacity: if blended { a } else { 1.0 },
        transparent: blended && a < 1.0,
        double_sided: material.double_sided(),
        shading: Shading::Standard,
    }
}
