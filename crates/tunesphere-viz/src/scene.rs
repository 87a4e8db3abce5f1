//! Scene setup - lighting, the central sun and a starfield

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub struct ScenePlugin;

impl Plugin for ScenePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_scene);
    }
}

const STAR_COUNT: usize = 600;
const STAR_SHELL: std::ops::Range<f32> = 1500.0..2500.0;
/// Fixed so the sky is the same every run
const STAR_SEED: u64 = 0x5eed;

/// Points scattered on a thick spherical shell around the origin
pub fn star_positions(count: usize, seed: u64) -> Vec<Vec3> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            // Uniform direction from a uniform height and azimuth
            let y: f32 = rng.gen_range(-1.0..1.0);
            let azimuth: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
            let ring = (1.0 - y * y).sqrt();
            let distance = rng.gen_range(STAR_SHELL);
            Vec3::new(ring * azimuth.cos(), y, ring * azimuth.sin()) * distance
        })
        .collect()
}

/// Setup lights, the sun and the stars
fn setup_scene(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    // Soft ambient so the night side of planets is still readable
    commands.insert_resource(AmbientLight {
        color: Color::WHITE,
        brightness: 300.0,
        affects_lightmapped_meshes: true,
    });

    // The sun: a glowing sphere with a point light inside
    commands.spawn((
        Mesh3d(meshes.add(Sphere::new(20.0).mesh().uv(48, 24))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(1.0, 0.85, 0.4),
            emissive: LinearRgba::rgb(8.0, 6.0, 2.0),
            unlit: true,
            ..default()
        })),
        Transform::default(),
    ));
    commands.spawn((
        PointLight {
            color: Color::srgb(1.0, 0.95, 0.85),
            intensity: 2.0e9,
            range: 4000.0,
            shadows_enabled: false,
            ..default()
        },
        Transform::default(),
    ));

    // Bright white directional fill
    commands.spawn((
        DirectionalLight {
            color: Color::WHITE,
            illuminance: 3000.0,
            shadows_enabled: false,
            ..default()
        },
        Transform::from_xyz(100.0, 300.0, 100.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    // Every star shares one mesh and one material
    let star_mesh = meshes.add(Sphere::new(2.0).mesh().uv(8, 4));
    let star_material = materials.add(StandardMaterial {
        base_color: Color::WHITE,
        unlit: true,
        ..default()
    });
    for position in star_positions(STAR_COUNT, STAR_SEED) {
        commands.spawn((
            Mesh3d(star_mesh.clone()),
            MeshMaterial3d(star_material.clone()),
            Transform::from_translation(position),
        ));
    }
}
