//! Materials - Surface appearance
//!
//! Colors are given as sRGB hex values, the way page designers write them,
//! and stored linear for lighting.
//!
//! # Example
//!
//! ```rust,ignore
//! use relic::Material;
//!
//! // Bronze-ish standard material
//! let helmet = Material::standard(0xd4af37).metalness(0.9).roughness(0.2);
//!
//! // Unlit translucent overlay
//! let ring = Material::unlit(0xd4af37).opacity(0.2).double_sided();
//! ```

/// Convert an sRGB hex color (`0xRRGGBB`) to linear RGB.
pub fn hex_to_linear(hex: u32) -> [f32; 3] {
    let channel = |shift: u32| srgb_to_linear(((hex >> shift) & 0xff) as f32 / 255.0);
    [channel(16), channel(8), channel(0)]
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shading {
    /// Lit with metalness/roughness
    Standard,
    /// Flat color, unaffected by lights
    Unlit,
}

/// Surface material for triangle meshes.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Linear RGB
    pub color: [f32; 3],
    pub metalness: f32,
    pub roughness: f32,
    pub opacity: f32,
    pub transparent: bool,
    pub double_sided: bool,
    pub shading: Shading,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            metalness: 0.0,
            roughness: 1.0,
            opacity: 1.0,
            transparent: false,
            double_sided: false,
            shading: Shading::Standard,
        }
    }
}

impl Material {
    /// Lit material from an sRGB hex color.
    pub fn standard(hex: u32) -> Self {
        Self {
            color: hex_to_linear(hex),
            ..Default::default()
        }
    }

    /// Unlit material from an sRGB hex color.
    pub fn unlit(hex: u32) -> Self {
        Self {
            color: hex_to_linear(hex),
            shading: Shading::Unlit,
            ..Default::default()
        }
    }

    pub fn metalness(mut self, metalness: f32) -> Self {
        self.metalness = metalness.clamp(0.0, 1.0);
        self
    }

    /// Set the roughness (0.0 = smooth/glossy, 1.0 = rough/matte).
    pub fn roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness.clamp(0.0, 1.0);
        self
    }

    /// Set opacity; anything below 1 is alpha blended.
    pub fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self.transparent = self.opacity < 1.0;
        self
    }

    pub fn double_sided(mut self) -> Self {
        self.double_sided = true;
        self
    }

    /// RGBA with opacity in alpha.
    pub fn rgba(&self) -> [f32; 4] {
        [self.color[0], self.color[1], self.color[2], self.opacity]
    }
}

/// Material for point clouds.
#[derive(Debug, Clone, PartialEq)]
pub struct PointsMaterial {
    pub color: [f32; 3],
    /// World-space size when attenuated, pixels otherwise
    pub size: f32,
    pub size_attenuation: bool,
}

impl PointsMaterial {
    pub fn new(hex: u32, size: f32) -> Self {
        Self {
            color: hex_to_linear(hex),
            size,
            size_attenuation: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_endpoints() {
        for c in hex_to_linear(0xffffff) {
            assert!((c - 1.0).abs() < 1e-5);
        }
        assert_eq!(hex_to_linear(0x000000), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_hex_channel_order() {
        let [r, g, b] = hex_to_linear(0x8b0000);
        assert!(r > 0.2 && r < 0.3);
        assert_eq!(g, 0.0);
        assert_eq!(b, 0.0);
    }

    #[test]
    fn test_opacity_marks_transparent() {
        let m = Material::unlit(0xd4af37).opacity(0.2);
        assert!(m.transparent);
        assert_eq!(m.rgba()[3], 0.2);
        assert!(!Material::standard(0x5d4037).transparent);
    }

    #[test]
    fn test_builder_clamps() {
        let m = Material::standard(0xffffff).metalness(3.0).roughness(-1.0);
        assert_eq!(m.metalness, 1.0);
        assert_eq!(m.roughness, 0.0);
    }
}
