//! MeshResource - Geometry generation for procedural primitives
//!
//! Segment counts and orientation follow the usual WebGL conventions:
//! solids are centred on the origin with +Y up, flat shapes (circle, ring)
//! lie in the XY plane facing +Z. Triangles wind counter-clockwise when
//! seen from outside.
//!
//! # Example
//!
//! ```rust,ignore
//! use relic::MeshResource;
//!
//! let head = MeshResource::generate_sphere(0.6, 16, 16).tessellate();
//! let ground = MeshResource::generate_circle(15.0, 32).tessellate();
//! ```
//!
//! Meshes decoded from GLB files are built with [`Geometry::from_buffers`].

use glam::Vec3;
use std::f32::consts::{FRAC_PI_2, PI, TAU};

/// Process-unique geometry identifier, used by renderers to cache GPU buffers.
pub type GeometryId = u64;

/// Procedural primitive description.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshResource {
    Box { width: f32, height: f32, depth: f32 },
    Sphere { radius: f32, width_segments: u32, height_segments: u32 },
    Capsule { radius: f32, length: f32, cap_segments: u32, radial_segments: u32 },
    Cone { radius: f32, height: f32, radial_segments: u32 },
    Circle { radius: f32, segments: u32 },
    Ring { inner_radius: f32, outer_radius: f32, segments: u32 },
}

impl MeshResource {
    /// Generate a box with specific dimensions.
    pub fn generate_box(width: f32, height: f32, depth: f32) -> Self {
        MeshResource::Box { width, height, depth }
    }

    /// Generate a UV sphere.
    pub fn generate_sphere(radius: f32, width_segments: u32, height_segments: u32) -> Self {
        MeshResource::Sphere {
            radius,
            width_segments: width_segments.max(3),
            height_segments: height_segments.max(2),
        }
    }

    /// Generate a capsule: a cylinder of `length` capped by two hemispheres.
    pub fn generate_capsule(radius: f32, length: f32, cap_segments: u32, radial_segments: u32) -> Self {
        MeshResource::Capsule {
            radius,
            length,
            cap_segments: cap_segments.max(1),
            radial_segments: radial_segments.max(3),
        }
    }

    /// Generate a closed cone with its apex at +Y.
    pub fn generate_cone(radius: f32, height: f32, radial_segments: u32) -> Self {
        MeshResource::Cone {
            radius,
            height,
            radial_segments: radial_segments.max(3),
        }
    }

    /// Generate a flat disk.
    pub fn generate_circle(radius: f32, segments: u32) -> Self {
        MeshResource::Circle { radius, segments: segments.max(3) }
    }

    /// Generate a flat annulus.
    pub fn generate_ring(inner_radius: f32, outer_radius: f32, segments: u32) -> Self {
        MeshResource::Ring {
            inner_radius,
            outer_radius,
            segments: segments.max(3),
        }
    }

    /// Short name of the primitive kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            MeshResource::Box { .. } => "box",
            MeshResource::Sphere { .. } => "sphere",
            MeshResource::Capsule { .. } => "capsule",
            MeshResource::Cone { .. } => "cone",
            MeshResource::Circle { .. } => "circle",
            MeshResource::Ring { .. } => "ring",
        }
    }

    /// Build the triangle geometry for this primitive.
    pub fn tessellate(&self) -> Geometry {
        let (positions, normals, indices) = match *self {
            MeshResource::Box { width, height, depth } => box_buffers(width, height, depth),
            MeshResource::Sphere { radius, width_segments, height_segments } => {
                let profile: Vec<ProfilePoint> = (0..=height_segments)
                    .map(|j| {
                        let a = -FRAC_PI_2 + PI * j as f32 / height_segments as f32;
                        ProfilePoint::new(radius * a.cos(), radius * a.sin(), a.cos(), a.sin())
                    })
                    .collect();
                lathe(&profile, width_segments)
            }
            MeshResource::Capsule { radius, length, cap_segments, radial_segments } => {
                let half = length / 2.0;
                let mut profile = Vec::with_capacity(2 * (cap_segments as usize + 1));
                for i in 0..=cap_segments {
                    let a = -FRAC_PI_2 + FRAC_PI_2 * i as f32 / cap_segments as f32;
                    profile.push(ProfilePoint::new(radius * a.cos(), -half + radius * a.sin(), a.cos(), a.sin()));
                }
                for i in 0..=cap_segments {
                    let a = FRAC_PI_2 * i as f32 / cap_segments as f32;
                    profile.push(ProfilePoint::new(radius * a.cos(), half + radius * a.sin(), a.cos(), a.sin()));
                }
                lathe(&profile, radial_segments)
            }
            MeshResource::Cone { radius, height, radial_segments } => {
                let half = height / 2.0;
                let slant = glam::Vec2::new(height, radius).normalize_or_zero();
                let profile = [
                    ProfilePoint::new(0.0, -half, 0.0, -1.0),
                    ProfilePoint::new(radius, -half, 0.0, -1.0),
                    ProfilePoint::new(radius, -half, slant.x, slant.y),
                    ProfilePoint::new(0.0, half, slant.x, slant.y),
                ];
                lathe(&profile, radial_segments)
            }
            MeshResource::Circle { radius, segments } => circle_buffers(radius, segments),
            MeshResource::Ring { inner_radius, outer_radius, segments } => {
                ring_buffers(inner_radius, outer_radius, segments)
            }
        };

        Geometry {
            id: next_geometry_id(),
            source: Some(self.clone()),
            positions,
            normals,
            indices,
        }
    }
}

/// Triangle or point geometry ready for upload.
#[derive(Debug, Clone)]
pub struct Geometry {
    id: GeometryId,
    source: Option<MeshResource>,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    /// Triangle list; empty for point clouds
    pub indices: Vec<u32>,
}

impl Geometry {
    /// Build geometry from decoded buffers. Missing normals are computed
    /// from the triangles; missing indices mean an unindexed triangle list.
    pub fn from_buffers(positions: Vec<[f32; 3]>, normals: Option<Vec<[f32; 3]>>, indices: Option<Vec<u32>>) -> Self {
        let indices = indices.unwrap_or_else(|| (0..positions.len() as u32).collect());
        let normals = match normals {
            Some(n) if n.len() == positions.len() => n,
            _ => compute_normals(&positions, &indices),
        };
        Self {
            id: next_geometry_id(),
            source: None,
            positions,
            normals,
            indices,
        }
    }

    /// Point cloud geometry (no triangles).
    pub fn points(positions: Vec<[f32; 3]>) -> Self {
        let normals = vec![[0.0, 1.0, 0.0]; positions.len()];
        Self {
            id: next_geometry_id(),
            source: None,
            positions,
            normals,
            indices: Vec::new(),
        }
    }

    pub fn id(&self) -> GeometryId {
        self.id
    }

    /// The primitive this geometry was generated from, if procedural.
    pub fn source(&self) -> Option<&MeshResource> {
        self.source.as_ref()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Axis-aligned bounds in local space.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut iter = self.positions.iter().map(|p| Vec3::from_array(*p));
        let first = iter.next()?;
        Some(iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p))))
    }
}

fn next_geometry_id() -> GeometryId {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

type Buffers = (Vec<[f32; 3]>, Vec<[f32; 3]>, Vec<u32>);

/// Point on a surface-of-revolution profile: radius, height and the 2D
/// outward normal in the (radial, y) plane.
#[derive(Debug, Clone, Copy)]
struct ProfilePoint {
    r: f32,
    y: f32,
    nr: f32,
    ny: f32,
}

impl ProfilePoint {
    fn new(r: f32, y: f32, nr: f32, ny: f32) -> Self {
        Self { r, y, nr, ny }
    }
}

/// Revolve a profile around the Y axis. Consecutive profile points are
/// joined by a band of quads; duplicate points give zero-area bands.
fn lathe(profile: &[ProfilePoint], segments: u32) -> Buffers {
    let ring = segments as usize + 1;
    let mut positions = Vec::with_capacity(profile.len() * ring);
    let mut normals = Vec::with_capacity(profile.len() * ring);

    for p in profile {
        for i in 0..=segments {
            let phi = TAU * i as f32 / segments as f32;
            let (sin, cos) = phi.sin_cos();
            positions.push([p.r * sin, p.y, p.r * cos]);
            normals.push([p.nr * sin, p.ny, p.nr * cos]);
        }
    }

    let mut indices = Vec::with_capacity(profile.len().saturating_sub(1) * segments as usize * 6);
    for j in 0..profile.len().saturating_sub(1) {
        for i in 0..segments as usize {
            let a = (j * ring + i) as u32;
            let b = ((j + 1) * ring + i) as u32;
            indices.extend_from_slice(&[a, a + 1, b + 1, a, b + 1, b]);
        }
    }

    (positions, normals, indices)
}

fn box_buffers(width: f32, height: f32, depth: f32) -> Buffers {
    let half = Vec3::new(width, height, depth) / 2.0;
    // (normal, u, v) with u x v = normal
    let faces = [
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    ];

    let mut positions = Vec::with_capacity(24);
    let mut normals = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, u, v) in faces {
        let base = positions.len() as u32;
        let center = normal * half;
        let (u, v) = (u * half, v * half);
        for corner in [center - u - v, center + u - v, center + u + v, center - u + v] {
            positions.push(corner.to_array());
            normals.push(normal.to_array());
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }

    (positions, normals, indices)
}

fn circle_buffers(radius: f32, segments: u32) -> Buffers {
    let mut positions = vec![[0.0, 0.0, 0.0]];
    for s in 0..=segments {
        let theta = TAU * s as f32 / segments as f32;
        positions.push([radius * theta.cos(), radius * theta.sin(), 0.0]);
    }
    let normals = vec![[0.0, 0.0, 1.0]; positions.len()];
    let indices = (1..=segments).flat_map(|i| [i, i + 1, 0]).collect();
    (positions, normals, indices)
}

fn ring_buffers(inner: f32, outer: f32, segments: u32) -> Buffers {
    let mut positions = Vec::with_capacity(2 * (segments as usize + 1));
    for radius in [inner, outer] {
        for s in 0..=segments {
            let theta = TAU * s as f32 / segments as f32;
            positions.push([radius * theta.cos(), radius * theta.sin(), 0.0]);
        }
    }
    let normals = vec![[0.0, 0.0, 1.0]; positions.len()];
    let mut indices = Vec::with_capacity(segments as usize * 6);
    for i in 0..segments {
        let a = i;
        let b = i + segments + 1;
        let c = i + segments + 2;
        let d = i + 1;
        indices.extend_from_slice(&[a, b, d, b, c, d]);
    }
    (positions, normals, indices)
}

/// Area-weighted smooth vertex normals.
fn compute_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut acc = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        let (pa, pb, pc) = (
            Vec3::from_array(positions[a]),
            Vec3::from_array(positions[b]),
            Vec3::from_array(positions[c]),
        );
        let n = (pb - pa).cross(pc - pa);
        acc[a] += n;
        acc[b] += n;
        acc[c] += n;
    }
    acc.into_iter()
        .map(|n| {
            let n = n.normalize_or_zero();
            if n == Vec3::ZERO { [0.0, 1.0, 0.0] } else { n.to_array() }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_indices_in_range(g: &Geometry) {
        assert_eq!(g.indices.len() % 3, 0);
        assert!(g.indices.iter().all(|&i| (i as usize) < g.vertex_count()));
        assert_eq!(g.positions.len(), g.normals.len());
    }

    /// Sum of signed triangle normals dotted with the direction to the
    /// triangle from the centre; positive when faces point outwards.
    fn outward_score(g: &Geometry) -> f32 {
        g.indices
            .chunks_exact(3)
            .map(|t| {
                let [a, b, c] = [t[0], t[1], t[2]].map(|i| Vec3::from_array(g.positions[i as usize]));
                let n = (b - a).cross(c - a);
                n.dot((a + b + c) / 3.0)
            })
            .sum()
    }

    #[test]
    fn test_box_counts_and_extent() {
        let g = MeshResource::generate_box(0.1, 0.8, 0.02).tessellate();
        assert_eq!(g.vertex_count(), 24);
        assert_eq!(g.triangle_count(), 12);
        assert_indices_in_range(&g);
        let (min, max) = g.bounds().unwrap();
        assert!((max - min - Vec3::new(0.1, 0.8, 0.02)).abs().max_element() < 1e-6);
        assert!(outward_score(&g) > 0.0);
    }

    #[test]
    fn test_sphere_vertices_on_surface() {
        let g = MeshResource::generate_sphere(0.6, 16, 16).tessellate();
        assert_eq!(g.vertex_count(), 17 * 17);
        assert_indices_in_range(&g);
        for p in &g.positions {
            assert!((Vec3::from_array(*p).length() - 0.6).abs() < 1e-5);
        }
        assert!(outward_score(&g) > 0.0);
    }

    #[test]
    fn test_capsule_extent() {
        let g = MeshResource::generate_capsule(0.5, 1.5, 4, 8).tessellate();
        assert_eq!(g.vertex_count(), 2 * 5 * 9);
        assert_indices_in_range(&g);
        let (min, max) = g.bounds().unwrap();
        assert!((min.y + 1.25).abs() < 1e-5);
        assert!((max.y - 1.25).abs() < 1e-5);
        assert!((max.x - 0.5).abs() < 1e-5);
        assert!(outward_score(&g) > 0.0);
    }

    #[test]
    fn test_cone_apex_and_base() {
        let g = MeshResource::generate_cone(0.7, 0.8, 8).tessellate();
        assert_indices_in_range(&g);
        let (min, max) = g.bounds().unwrap();
        assert!((min.y + 0.4).abs() < 1e-6);
        assert!((max.y - 0.4).abs() < 1e-6);
        assert!(outward_score(&g) > 0.0);
    }

    #[test]
    fn test_circle_faces_positive_z() {
        let g = MeshResource::generate_circle(15.0, 32).tessellate();
        assert_eq!(g.vertex_count(), 34);
        assert_eq!(g.triangle_count(), 32);
        assert_indices_in_range(&g);
        let t = &g.indices[0..3];
        let [a, b, c] = [t[0], t[1], t[2]].map(|i| Vec3::from_array(g.positions[i as usize]));
        assert!((b - a).cross(c - a).z > 0.0);
    }

    #[test]
    fn test_ring_radii() {
        let g = MeshResource::generate_ring(2.0, 15.0, 32).tessellate();
        assert_eq!(g.vertex_count(), 66);
        assert_eq!(g.triangle_count(), 64);
        assert_indices_in_range(&g);
        for p in &g.positions {
            let r = Vec3::from_array(*p).length();
            assert!((r - 2.0).abs() < 1e-4 || (r - 15.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_from_buffers_computes_normals() {
        let g = Geometry::from_buffers(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            None,
            None,
        );
        assert_eq!(g.indices, vec![0, 1, 2]);
        for n in &g.normals {
            assert_eq!(*n, [0.0, 0.0, 1.0]);
        }
        assert!(g.source().is_none());
    }

    #[test]
    fn test_geometry_ids_unique() {
        let a = MeshResource::generate_box(1.0, 1.0, 1.0).tessellate();
        let b = MeshResource::generate_box(1.0, 1.0, 1.0).tessellate();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.source().map(|s| s.kind_name()), Some("box"));
    }
}
