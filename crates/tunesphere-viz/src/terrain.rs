//! Procedural planet surfaces
//!
//! A planet is a UV sphere whose vertices are pushed outward by noise and
//! colored by how far they were pushed:
//!
//! - below sea level: sea blue, half-way toward the genre color
//! - a band above that: land green, tinted toward the genre color
//! - anything higher: land blending into mountain brown, then tinted
//!
//! Generation is pure so it can run on a background thread and be tested
//! without a renderer. [`PlanetSurface::to_mesh`] turns the result into a
//! Bevy mesh on the main thread.

use crate::config::PlanetConfig;
use crate::noise::Perlin3;
use bevy::asset::RenderAssetUsages;
use bevy::mesh::{Indices, PrimitiveTopology};
use bevy::prelude::*;
use std::f32::consts::PI;
use tunesphere_core::Rgb;

pub const SEA_COLOR: Rgb = Rgb::from_hex(0x0077be);
pub const LAND_COLOR: Rgb = Rgb::from_hex(0x228b22);
pub const MOUNTAIN_COLOR: Rgb = Rgb::from_hex(0x8b4513);

/// Height of the land band above sea level
const LAND_BAND: f32 = 0.2;
/// Height over which land turns into mountain
const MOUNTAIN_BAND: f32 = 0.1;

/// How strongly each band is tinted toward the genre color
const SEA_TINT: f32 = 0.5;
const LAND_TINT: f32 = 0.2;

/// Generated geometry for one planet, in local space
#[derive(Debug, Clone, PartialEq)]
pub struct PlanetSurface {
    pub positions: Vec<[f32; 3]>,
    /// Per-vertex sRGB color
    pub colors: Vec<Rgb>,
    /// Per-vertex displacement factor
    pub displacements: Vec<f32>,
    pub indices: Vec<u32>,
    /// Distance of the farthest vertex from the center
    pub bounding_radius: f32,
}

/// Surface color for a vertex displaced by `displacement`
pub fn surface_color(displacement: f32, genre: Rgb, sea_level: f32) -> Rgb {
    let land_top = sea_level + LAND_BAND;
    if displacement < sea_level {
        SEA_COLOR.lerp(genre, SEA_TINT)
    } else if displacement < land_top {
        LAND_COLOR.lerp(genre, LAND_TINT)
    } else {
        let t = ((displacement - land_top) / MOUNTAIN_BAND).clamp(0.0, 1.0);
        LAND_COLOR.lerp(MOUNTAIN_COLOR, t).lerp(genre, LAND_TINT)
    }
}

/// Displacement factor for a raw noise sample
pub fn displacement(noise: f32, scale: f32) -> f32 {
    noise.abs().powf(1.5) * scale
}

/// Undisplaced UV sphere vertices, north pole first, row-major
///
/// Produces `(width + 1) * (height + 1)` vertices; the seam column and the
/// pole rows are duplicated so every row has the same length.
pub fn uv_sphere_positions(radius: f32, width: u32, height: u32) -> Vec<Vec3> {
    let mut positions = Vec::with_capacity(((width + 1) * (height + 1)) as usize);
    for iy in 0..=height {
        let v = iy as f32 / height as f32;
        for ix in 0..=width {
            let u = ix as f32 / width as f32;
            let (sin_phi, cos_phi) = (u * 2.0 * PI).sin_cos();
            let (sin_theta, cos_theta) = (v * PI).sin_cos();
            positions.push(Vec3::new(
                -radius * cos_phi * sin_theta,
                radius * cos_theta,
                radius * sin_phi * sin_theta,
            ));
        }
    }
    positions
}

/// Triangle indices for [`uv_sphere_positions`], counter-clockwise from outside
pub fn uv_sphere_indices(width: u32, height: u32) -> Vec<u32> {
    let row = width + 1;
    let mut indices = Vec::with_capacity((width * height * 6) as usize);
    for iy in 0..height {
        for ix in 0..width {
            let a = iy * row + ix + 1;
            let b = iy * row + ix;
            let c = (iy + 1) * row + ix;
            let d = (iy + 1) * row + ix + 1;

            // The pole rows collapse to a point, so they get one triangle
            if iy != 0 {
                indices.extend_from_slice(&[a, b, d]);
            }
            if iy != height - 1 {
                indices.extend_from_slice(&[b, c, d]);
            }
        }
    }
    indices
}

/// Build a planet surface
///
/// Deterministic for a given noise field, config and genre color.
pub fn generate_surface(config: &PlanetConfig, noise: &Perlin3, genre: Rgb) -> PlanetSurface {
    let sphere = uv_sphere_positions(
        config.radius,
        config.width_segments,
        config.height_segments,
    );
    let y_scale = config.noise_scale * config.vertical_noise_factor;

    let mut positions = Vec::with_capacity(sphere.len());
    let mut colors = Vec::with_capacity(sphere.len());
    let mut displacements = Vec::with_capacity(sphere.len());
    let mut bounding_radius: f32 = 0.0;

    for vertex in sphere {
        let n = noise.sample(
            vertex.x * config.noise_scale,
            vertex.y * y_scale,
            vertex.z * config.noise_scale,
        );
        let d = displacement(n, config.displacement_scale);
        let displaced = vertex.normalize_or_zero() * config.radius * (1.0 + d);

        bounding_radius = bounding_radius.max(displaced.length());
        positions.push(displaced.to_array());
        colors.push(surface_color(d, genre, config.sea_level));
        displacements.push(d);
    }

    PlanetSurface {
        positions,
        colors,
        displacements,
        indices: uv_sphere_indices(config.width_segments, config.height_segments),
        bounding_radius,
    }
}

impl PlanetSurface {
    /// Convert to a renderable mesh with vertex colors and smooth normals
    pub fn to_mesh(&self) -> Mesh {
        let colors: Vec<[f32; 4]> = self
            .colors
            .iter()
            .map(|c| {
                let linear = Color::srgb(c.r, c.g, c.b).to_linear();
                [linear.red, linear.green, linear.blue, 1.0]
            })
            .collect();

        let mut mesh = Mesh::new(
            PrimitiveTopology::TriangleList,
            RenderAssetUsages::RENDER_WORLD,
        );
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, self.positions.clone());
        mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, colors);
        mesh.insert_indices(Indices::U32(self.indices.clone()));

        // Smooth normals follow the displaced terrain
        mesh.compute_smooth_normals();

        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> PlanetConfig {
        PlanetConfig {
            width_segments: 16,
            height_segments: 12,
            ..PlanetConfig::default()
        }
    }

    #[test]
    fn test_vertex_and_index_counts() {
        let config = small_config();
        let surface = generate_surface(&config, &Perlin3::new(0), Rgb::from_hex(0xff4500));
        assert_eq!(surface.positions.len(), 17 * 13);
        assert_eq!(surface.colors.len(), surface.positions.len());
        // Two triangles per quad, minus one per quad in each pole row
        assert_eq!(surface.indices.len(), (16 * 12 * 2 - 2 * 16) * 3);
        assert!(
            surface
                .indices
                .iter()
                .all(|&i| (i as usize) < surface.positions.len())
        );
    }

    #[test]
    fn test_reference_resolution() {
        let positions = uv_sphere_positions(12.0, 200, 200);
        assert_eq!(positions.len(), 201 * 201);
        assert!((positions[0] - Vec3::new(0.0, 12.0, 0.0)).length() < 1e-4);
        assert!((positions[positions.len() - 1] - Vec3::new(0.0, -12.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let config = small_config();
        let genre = Rgb::from_hex(0x00ff7f);
        let a = generate_surface(&config, &Perlin3::new(5), genre);
        let b = generate_surface(&config, &Perlin3::new(5), genre);
        assert_eq!(a.displacements, b.displacements);
        assert_eq!(a, b);
    }

    #[test]
    fn test_displacement_within_bounds() {
        let config = small_config();
        let surface = generate_surface(&config, &Perlin3::new(9), Rgb::from_hex(0x00ff00));
        for (pos, d) in surface.positions.iter().zip(&surface.displacements) {
            assert!(*d >= 0.0);
            let length = Vec3::from_array(*pos).length();
            assert!((length - config.radius * (1.0 + d)).abs() < 1e-3);
        }
        assert!(surface.bounding_radius >= config.radius);
        assert!(surface.bounding_radius <= config.radius * (1.0 + config.displacement_scale * 1.9));
    }

    #[test]
    fn test_displacement_curve() {
        assert_eq!(displacement(0.0, 0.15), 0.0);
        assert!((displacement(-1.0, 0.15) - 0.15).abs() < 1e-6);
        assert!((displacement(0.25, 0.15) - 0.125 * 0.15).abs() < 1e-6);
    }

    #[test]
    fn test_color_bands() {
        let genre = Rgb::from_hex(0xff0000);
        let sea = surface_color(0.01, genre, 0.02);
        assert_eq!(sea, SEA_COLOR.lerp(genre, 0.5));

        let land = surface_color(0.1, genre, 0.02);
        assert_eq!(land, LAND_COLOR.lerp(genre, 0.2));

        // Half-way up the mountain band
        let mountain = surface_color(0.27, genre, 0.02);
        let expected = LAND_COLOR.lerp(MOUNTAIN_COLOR, 0.5).lerp(genre, 0.2);
        assert!((mountain.r - expected.r).abs() < 1e-5);
        assert!((mountain.g - expected.g).abs() < 1e-5);

        // Saturates past the top of the band
        let peak = surface_color(5.0, genre, 0.02);
        assert_eq!(peak.to_hex(), MOUNTAIN_COLOR.lerp(genre, 0.2).to_hex());
    }

    #[test]
    fn test_to_mesh_attributes() {
        let surface = generate_surface(&small_config(), &Perlin3::new(1), Rgb::from_hex(0xffd700));
        let mesh = surface.to_mesh();
        assert_eq!(mesh.count_vertices(), surface.positions.len());
        assert!(mesh.attribute(Mesh::ATTRIBUTE_COLOR).is_some());
        assert!(mesh.attribute(Mesh::ATTRIBUTE_NORMAL).is_some());
    }
}
