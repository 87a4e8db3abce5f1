//! Connection lines between the selected planet and its neighbors.
//!
//! Every edge shares one material, so a single color update per frame
//! makes all of them flash together between white and yellow.

use crate::config::VizConfig;
use crate::registry::{Edge, SceneRegistry};
use bevy::asset::RenderAssetUsages;
use bevy::mesh::PrimitiveTopology;
use bevy::prelude::*;

pub struct EdgePlugin;

impl Plugin for EdgePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_edge_material)
            .add_systems(Update, flash_edges);
    }
}

/// Marker for a drawn connection line
#[derive(Component, Debug)]
pub struct ConnectionEdge;

/// The material every edge shares, plus its flash phase
#[derive(Resource, Debug)]
pub struct EdgeMaterial {
    pub handle: Handle<StandardMaterial>,
    pub phase: f32,
}

impl EdgeMaterial {
    pub fn new(handle: Handle<StandardMaterial>) -> Self {
        Self { handle, phase: 0.0 }
    }
}

/// Blend factor toward yellow for a flash phase
pub fn flash_alpha(phase: f32) -> f32 {
    (phase * 2.0).sin() * 0.5 + 0.5
}

/// White at 0, yellow at 1
pub fn flash_color(alpha: f32) -> Color {
    Color::srgb(1.0, 1.0, 1.0 - alpha)
}

/// A single line segment mesh
pub fn line_mesh(from: Vec3, to: Vec3) -> Mesh {
    let mut mesh = Mesh::new(PrimitiveTopology::LineList, RenderAssetUsages::RENDER_WORLD);
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, vec![from.to_array(), to.to_array()]);
    mesh
}

fn setup_edge_material(mut commands: Commands, mut materials: ResMut<Assets<StandardMaterial>>) {
    let handle = materials.add(StandardMaterial {
        base_color: flash_color(flash_alpha(0.0)),
        unlit: true,
        ..default()
    });
    commands.insert_resource(EdgeMaterial::new(handle));
}

/// Despawn the current connection set and draw `edges` in its place
///
/// Edges whose endpoints are not registered are skipped.
pub fn replace_edges(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    material: &EdgeMaterial,
    registry: &mut SceneRegistry,
    edges: &[Edge],
) {
    for entity in registry.take_edges() {
        commands.entity(entity).despawn();
    }

    let mut drawn = Vec::with_capacity(edges.len());
    for edge in edges {
        let (Some(from), Some(to)) = (registry.get(edge.from), registry.get(edge.to)) else {
            continue;
        };
        let entity = commands
            .spawn((
                Mesh3d(meshes.add(line_mesh(from.position, to.position))),
                MeshMaterial3d(material.handle.clone()),
                Transform::default(),
                ConnectionEdge,
            ))
            .id();
        drawn.push(entity);
    }

    tracing::debug!("Drew {} connection edges", drawn.len());
    registry.set_edges(drawn);
}

fn flash_edges(
    time: Res<Time>,
    config: Res<VizConfig>,
    edge_material: Option<ResMut<EdgeMaterial>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let Some(mut edge_material) = edge_material else {
        return;
    };
    edge_material.phase += config.proximity.flash_rate * time.delta_secs();

    if let Some(material) = materials.get_mut(&edge_material.handle) {
        material.base_color = flash_color(flash_alpha(edge_material.phase));
    }
}
