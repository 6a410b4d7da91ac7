//! Placeholder figure shown when the model cannot be loaded
//!
//! A stylised helmeted figure: capsule body, sphere head, inverted cone
//! helmet and a thin box crest.

use crate::material::Material;
use crate::mesh::MeshResource;
use crate::scene::Object3D;
use std::f32::consts::PI;

pub const PLACEHOLDER_NAME: &str = "placeholder";

pub fn create_placeholder() -> Object3D {
    let mut group = Object3D::group(PLACEHOLDER_NAME)
        .position(0.0, -1.0, 0.0)
        .rotation(0.0, PI / 6.0, 0.0);

    group.add_child(
        Object3D::mesh(
            "body",
            MeshResource::generate_capsule(0.5, 1.5, 4, 8),
            Material::standard(0x8B4513).metalness(0.2).roughness(0.7),
        )
        .position(0.0, 1.5, 0.0),
    );

    group.add_child(
        Object3D::mesh(
            "head",
            MeshResource::generate_sphere(0.6, 16, 16),
            Material::standard(0xF1C27D).metalness(0.1).roughness(0.8),
        )
        .position(0.0, 2.8, 0.0),
    );

    group.add_child(
        Object3D::mesh(
            "helmet",
            MeshResource::generate_cone(0.7, 0.8, 8),
            Material::standard(0xd4af37).metalness(0.9).roughness(0.2),
        )
        .position(0.0, 3.2, 0.0)
        .rotation(PI, 0.0, 0.0),
    );

    group.add_child(
        Object3D::mesh("crest", MeshResource::generate_box(0.1, 0.8, 0.02), Material::standard(0x8B0000))
            .position(0.0, 3.7, 0.4),
    );

    group
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};

    #[test]
    fn test_four_primitives_in_order() {
        let figure = create_placeholder();
        let kinds: Vec<_> = figure
            .children()
            .iter()
            .map(|c| c.as_mesh().unwrap().geometry.source().unwrap().kind_name())
            .collect();
        assert_eq!(kinds, vec!["capsule", "sphere", "cone", "box"]);
        assert_eq!(figure.mesh_count(), 4);
    }

    #[test]
    fn test_helmet_points_down() {
        let figure = create_placeholder();
        let helmet = &figure.children()[2];
        // Apex starts at +Y; flipped about X it points down onto the head
        let apex = helmet.transform.matrix().transform_point3(Vec3::new(0.0, 0.4, 0.0));
        assert!(apex.y < helmet.transform.position.y);
    }

    #[test]
    fn test_group_offsets() {
        let figure = create_placeholder();
        assert_eq!(figure.transform.position, Vec3::new(0.0, -1.0, 0.0));
        assert!((figure.transform.yaw() - PI / 6.0).abs() < 1e-5);

        let mut head_world = None;
        figure.traverse_world(Mat4::IDENTITY, &mut |world, o| {
            if o.name == "head" {
                head_world = Some(world.transform_point3(Vec3::ZERO));
            }
        });
        assert!((head_world.unwrap().y - 1.8).abs() < 1e-5);
    }
}
