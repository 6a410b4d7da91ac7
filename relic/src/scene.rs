//! Scene graph - lights, environment objects and the subject model
//!
//! The scene owns every object by value. Geometry is shared through `Arc`
//! so renderers can cache GPU buffers by [`GeometryId`](crate::GeometryId).
//!
//! # Example
//!
//! ```rust,ignore
//! use relic::{Object3D, MeshResource, Material, Scene};
//!
//! let mut scene = Scene::new(0x0a1420);
//! let mut group = Object3D::group("figure");
//! group.add_child(
//!     Object3D::mesh("head", MeshResource::generate_sphere(0.6, 16, 16), Material::standard(0xF1C27D))
//!         .position(0.0, 2.8, 0.0),
//! );
//! scene.set_subject(group);
//! ```

use crate::material::{Material, PointsMaterial, hex_to_linear};
use crate::mesh::{Geometry, MeshResource};
use glam::{Mat4, Quat, Vec3};
use std::sync::Arc;

/// Unique identifier for scene objects.
pub type ObjectId = String;

/// Local transform relative to the parent object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Spin about the parent's Y axis.
    pub fn rotate_y(&mut self, angle: f32) {
        self.rotation = (Quat::from_rotation_y(angle) * self.rotation).normalize();
    }

    /// Yaw angle in radians, assuming the rotation is yaw-first.
    pub fn yaw(&self) -> f32 {
        let (yaw, _, _) = self.rotation.to_euler(glam::EulerRot::YXZ);
        yaw
    }
}

/// A triangle mesh with its material.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub geometry: Arc<Geometry>,
    pub material: Material,
}

/// A point cloud.
#[derive(Debug, Clone)]
pub struct Points {
    pub geometry: Arc<Geometry>,
    pub material: PointsMaterial,
}

#[derive(Debug, Clone)]
pub enum ObjectKind {
    /// Transform-only container
    Group,
    Mesh(Mesh),
    Points(Points),
}

/// A node in the scene hierarchy.
#[derive(Debug, Clone)]
pub struct Object3D {
    id: ObjectId,
    pub name: String,
    pub transform: Transform,
    pub kind: ObjectKind,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    children: Vec<Object3D>,
}

impl Object3D {
    fn with_kind(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            id: generate_id(),
            name: name.into(),
            transform: Transform::default(),
            kind,
            cast_shadow: false,
            receive_shadow: false,
            children: Vec::new(),
        }
    }

    /// Create an empty group.
    pub fn group(name: impl Into<String>) -> Self {
        Self::with_kind(name, ObjectKind::Group)
    }

    /// Create a mesh from a procedural primitive.
    pub fn mesh(name: impl Into<String>, resource: MeshResource, material: Material) -> Self {
        Self::from_geometry(name, Arc::new(resource.tessellate()), material)
    }

    /// Create a mesh from existing geometry.
    pub fn from_geometry(name: impl Into<String>, geometry: Arc<Geometry>, material: Material) -> Self {
        Self::with_kind(name, ObjectKind::Mesh(Mesh { geometry, material }))
    }

    /// Create a point cloud.
    pub fn points(name: impl Into<String>, geometry: Geometry, material: PointsMaterial) -> Self {
        Self::with_kind(
            name,
            ObjectKind::Points(Points {
                geometry: Arc::new(geometry),
                material,
            }),
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Set position (builder style).
    pub fn position(mut self, x: f32, y: f32, z: f32) -> Self {
        self.transform.position = Vec3::new(x, y, z);
        self
    }

    /// Set rotation from XYZ Euler angles in radians (builder style).
    pub fn rotation(mut self, x: f32, y: f32, z: f32) -> Self {
        self.transform.rotation = Quat::from_euler(glam::EulerRot::XYZ, x, y, z);
        self
    }

    /// Set uniform scale (builder style).
    pub fn scale(mut self, s: f32) -> Self {
        self.transform.scale = Vec3::splat(s);
        self
    }

    pub fn cast_shadow(mut self, cast: bool) -> Self {
        self.cast_shadow = cast;
        self
    }

    pub fn receive_shadow(mut self, receive: bool) -> Self {
        self.receive_shadow = receive;
        self
    }

    pub fn add_child(&mut self, child: Object3D) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[Object3D] {
        &self.children
    }

    pub fn is_mesh(&self) -> bool {
        matches!(self.kind, ObjectKind::Mesh(_))
    }

    pub fn as_mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            ObjectKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    /// Visit this object and all descendants, depth first.
    pub fn traverse(&self, f: &mut impl FnMut(&Object3D)) {
        f(self);
        for child in &self.children {
            child.traverse(f);
        }
    }

    pub fn traverse_mut(&mut self, f: &mut impl FnMut(&mut Object3D)) {
        f(self);
        for child in &mut self.children {
            child.traverse_mut(f);
        }
    }

    /// Visit every object with its world matrix.
    pub fn traverse_world(&self, parent: Mat4, f: &mut impl FnMut(Mat4, &Object3D)) {
        let world = parent * self.transform.matrix();
        f(world, self);
        for child in &self.children {
            child.traverse_world(world, f);
        }
    }

    /// Number of mesh nodes in this subtree.
    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.traverse(&mut |o| {
            if o.is_mesh() {
                count += 1;
            }
        });
        count
    }

    /// World-space bounds of all meshes in this subtree.
    pub fn world_bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut bounds: Option<(Vec3, Vec3)> = None;
        self.traverse_world(Mat4::IDENTITY, &mut |world, o| {
            let Some(mesh) = o.as_mesh() else { return };
            for p in &mesh.geometry.positions {
                let p = world.transform_point3(Vec3::from_array(*p));
                bounds = Some(match bounds {
                    Some((min, max)) => (min.min(p), max.max(p)),
                    None => (p, p),
                });
            }
        });
        bounds
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LightKind {
    Ambient,
    Directional,
    Point,
}

/// A light source. Directional lights shine from `position` toward the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    /// Linear RGB
    pub color: [f32; 3],
    pub intensity: f32,
    pub position: Vec3,
    pub cast_shadow: bool,
}

impl Light {
    pub fn ambient(hex: u32, intensity: f32) -> Self {
        Self {
            kind: LightKind::Ambient,
            color: hex_to_linear(hex),
            intensity,
            position: Vec3::ZERO,
            cast_shadow: false,
        }
    }

    pub fn directional(hex: u32, intensity: f32, position: Vec3) -> Self {
        Self {
            kind: LightKind::Directional,
            color: hex_to_linear(hex),
            intensity,
            position,
            cast_shadow: false,
        }
    }

    pub fn point(hex: u32, intensity: f32, position: Vec3) -> Self {
        Self {
            kind: LightKind::Point,
            color: hex_to_linear(hex),
            intensity,
            position,
            cast_shadow: false,
        }
    }

    pub fn with_shadow(mut self) -> Self {
        self.cast_shadow = true;
        self
    }
}

/// Exponential-squared distance fog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fog {
    pub color: [f32; 3],
    pub density: f32,
}

impl Fog {
    pub fn exp2(hex: u32, density: f32) -> Self {
        Self {
            color: hex_to_linear(hex),
            density,
        }
    }

    /// Fraction of fog color mixed in at `distance`.
    pub fn factor(&self, distance: f32) -> f32 {
        let d = self.density * distance;
        (1.0 - (-d * d).exp()).clamp(0.0, 1.0)
    }
}

/// The complete scene: environment plus at most one subject model.
#[derive(Debug, Clone)]
pub struct Scene {
    /// Linear RGB
    pub background: [f32; 3],
    pub fog: Option<Fog>,
    lights: Vec<Light>,
    objects: Vec<Object3D>,
    subject: Option<Object3D>,
}

impl Scene {
    pub fn new(background_hex: u32) -> Self {
        Self {
            background: hex_to_linear(background_hex),
            fog: None,
            lights: Vec::new(),
            objects: Vec::new(),
            subject: None,
        }
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Add an environment object (ground, decorations, starfield).
    pub fn add(&mut self, object: Object3D) {
        self.objects.push(object);
    }

    pub fn objects(&self) -> &[Object3D] {
        &self.objects
    }

    pub fn find_object(&self, name: &str) -> Option<&Object3D> {
        self.objects.iter().find(|o| o.name == name)
    }

    /// Install the subject model, dropping any previous one.
    pub fn set_subject(&mut self, subject: Object3D) -> Option<Object3D> {
        self.subject.replace(subject)
    }

    pub fn subject(&self) -> Option<&Object3D> {
        self.subject.as_ref()
    }

    pub fn subject_mut(&mut self) -> Option<&mut Object3D> {
        self.subject.as_mut()
    }

    /// Environment objects followed by the subject.
    pub fn iter_roots(&self) -> impl Iterator<Item = &Object3D> {
        self.objects.iter().chain(self.subject.iter())
    }
}

// Simple sequential ids, unique per process
fn generate_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    format!("object-{}", COUNTER.fetch_add(1, Ordering::Relaxed))
}
