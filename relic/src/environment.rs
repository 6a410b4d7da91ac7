//! Environment - lights, ground, decorative ring and starfield
//!
//! Everything here is static for the lifetime of the viewer; only the
//! subject model changes.

use crate::material::{Material, PointsMaterial};
use crate::mesh::{Geometry, MeshResource};
use crate::scene::{Fog, Light, Object3D, Scene};
use glam::Vec3;
use rand::Rng;
use std::f32::consts::FRAC_PI_2;

pub const BACKGROUND_HEX: u32 = 0x0a1420;
pub const FOG_DENSITY: f32 = 0.02;

/// Half extents of the box stars are scattered in.
pub const STARFIELD_HALF_EXTENT: Vec3 = Vec3::new(50.0, 20.0, 50.0);
pub const STARFIELD_NAME: &str = "starfield";
pub const GROUND_NAME: &str = "ground";
pub const RING_NAME: &str = "ground-pattern";

/// Fresh scene with the page background and fog.
pub fn create_scene() -> Scene {
    let mut scene = Scene::new(BACKGROUND_HEX);
    scene.fog = Some(Fog::exp2(BACKGROUND_HEX, FOG_DENSITY));
    scene
}

/// Ambient fill, a warm key light casting shadows, a cool back light and a
/// point light above the subject.
pub fn add_lights(scene: &mut Scene) {
    scene.add_light(Light::ambient(0xffffff, 0.6));
    scene.add_light(Light::directional(0xd4af37, 1.0, Vec3::new(5.0, 5.0, 5.0)).with_shadow());
    scene.add_light(Light::directional(0x1a75bc, 0.6, Vec3::new(-5.0, -3.0, -5.0)));
    scene.add_light(Light::point(0xffffff, 0.4, Vec3::new(0.0, 3.0, 0.0)));
}

/// Ground disk, the translucent ring above it, and the starfield.
pub fn add_environment(scene: &mut Scene, star_count: usize, rng: &mut impl Rng) {
    let ground = Object3D::mesh(
        GROUND_NAME,
        MeshResource::generate_circle(15.0, 32),
        Material::standard(0x5d4037).roughness(0.9).metalness(0.1),
    )
    .rotation(-FRAC_PI_2, 0.0, 0.0)
    .position(0.0, -1.5, 0.0)
    .receive_shadow(true);
    scene.add(ground);

    let pattern = Object3D::mesh(
        RING_NAME,
        MeshResource::generate_ring(2.0, 15.0, 32),
        Material::unlit(0xd4af37).double_sided().opacity(0.2),
    )
    .rotation(-FRAC_PI_2, 0.0, 0.0)
    .position(0.0, -1.4, 0.0);
    scene.add(pattern);

    scene.add(starfield(star_count, rng));
}

/// `count` points uniformly distributed in the starfield box.
pub fn starfield(count: usize, rng: &mut impl Rng) -> Object3D {
    let h = STARFIELD_HALF_EXTENT;
    let positions = (0..count)
        .map(|_| {
            [
                rng.gen_range(-h.x..=h.x),
                rng.gen_range(-h.y..=h.y),
                rng.gen_range(-h.z..=h.z),
            ]
        })
        .collect();
    Object3D::points(STARFIELD_NAME, Geometry::points(positions), PointsMaterial::new(0xffffff, 0.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{LightKind, ObjectKind};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_starfield_count_and_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let stars = starfield(1000, &mut rng);
        let ObjectKind::Points(points) = &stars.kind else {
            panic!("starfield should be a point cloud");
        };
        assert_eq!(points.geometry.vertex_count(), 1000);
        for [x, y, z] in &points.geometry.positions {
            assert!((-50.0..=50.0).contains(x));
            assert!((-20.0..=20.0).contains(y));
            assert!((-50.0..=50.0).contains(z));
        }
    }

    #[test]
    fn test_starfield_spreads_out() {
        let mut rng = StdRng::seed_from_u64(7);
        let stars = starfield(1000, &mut rng);
        let ObjectKind::Points(points) = &stars.kind else { unreachable!() };
        let (min, max) = points.geometry.bounds().unwrap();
        // 1000 uniform samples get close to every face of the box
        assert!(min.x < -45.0 && max.x > 45.0);
        assert!(min.y < -18.0 && max.y > 18.0);
    }

    #[test]
    fn test_lighting_rig() {
        let mut scene = create_scene();
        add_lights(&mut scene);
        let kinds: Vec<_> = scene.lights().iter().map(|l| l.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![LightKind::Ambient, LightKind::Directional, LightKind::Directional, LightKind::Point]
        );
        assert_eq!(scene.lights().iter().filter(|l| l.cast_shadow).count(), 1);
    }

    #[test]
    fn test_ground_is_flat_and_below_ring() {
        let mut scene = create_scene();
        add_environment(&mut scene, 10, &mut StdRng::seed_from_u64(1));

        let ground = scene.find_object(GROUND_NAME).unwrap();
        let (min, max) = ground.world_bounds().unwrap();
        assert!((min.y + 1.5).abs() < 1e-5 && (max.y + 1.5).abs() < 1e-5);
        assert!(ground.receive_shadow);

        let ring = scene.find_object(RING_NAME).unwrap();
        assert!(ring.transform.position.y > ground.transform.position.y);
        assert!(ring.as_mesh().unwrap().material.transparent);
        assert_eq!(scene.objects().len(), 3);
    }
}
