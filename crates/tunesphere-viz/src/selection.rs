//! Planet selection
//!
//! A click is turned into a [`Hit`] by casting a ray against every planet's
//! bounding sphere and every label billboard; the nearest hit names the
//! planet. Clicks and info-panel entries both end up as a [`SelectPlanet`]
//! message, and [`plan_selection`] decides what that selection does:
//!
//! - a different planet: load its preview, grow it (and shrink the old
//!   one), fly the camera over, redraw edges, rebuild the info panel
//! - the planet already playing: toggle pause, redraw edges and rebuild the
//!   info panel, nothing else

use crate::GalaxySystems;
use crate::camera::{CameraFlight, OrbitCamera, framing_position};
use crate::config::VizConfig;
use crate::edges::{EdgeMaterial, replace_edges};
use crate::panel::{InfoPanel, PanelContent, PointerOverUi};
use crate::planets::{LABEL_SIZE, Planet, ScaleState, ScaleTween};
use crate::playback::PlaybackCommand;
use crate::registry::{Edge, PlanetId, SceneRegistry};
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use tracing::debug;

pub struct SelectionPlugin;

impl Plugin for SelectionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SelectionState>()
            .add_message::<SelectPlanet>()
            .add_systems(
                Update,
                (click_to_select, apply_selection)
                    .chain()
                    .in_set(GalaxySystems::Select),
            );
    }
}

/// The planet whose preview is loaded, if any
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionState {
    #[default]
    Idle,
    Selected(PlanetId),
}

/// What a selection changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// A different planet (or the first one) is now selected
    Switched { previous: Option<PlanetId> },
    /// The selected planet was selected again
    Reselected,
}

impl SelectionState {
    pub fn current(self) -> Option<PlanetId> {
        match self {
            Self::Idle => None,
            Self::Selected(id) => Some(id),
        }
    }

    pub fn select(&mut self, id: PlanetId) -> SelectOutcome {
        let previous = self.current();
        if previous == Some(id) {
            return SelectOutcome::Reselected;
        }
        *self = Self::Selected(id);
        SelectOutcome::Switched { previous }
    }
}

/// Request to select a planet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectPlanet(pub PlanetId);

impl Message for SelectPlanet {}

/// What a click landed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit {
    Planet(PlanetId),
    Label { owner: PlanetId },
}

impl Hit {
    /// The planet this hit selects
    pub fn planet(self) -> PlanetId {
        match self {
            Self::Planet(id) | Self::Label { owner: id } => id,
        }
    }
}

/// Pickable geometry of one planet, in world space
#[derive(Debug, Clone, Copy)]
pub struct PickTarget {
    pub id: PlanetId,
    pub center: Vec3,
    pub radius: f32,
    pub label_center: Vec3,
    pub label_half_size: Vec2,
}

/// Distance along the ray to the first sphere intersection
pub fn ray_sphere(origin: Vec3, direction: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let to_center = origin - center;
    let b = to_center.dot(direction);
    let c = to_center.length_squared() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    let near = -b - root;
    if near >= 0.0 {
        return Some(near);
    }
    // Ray starts inside the sphere
    let far = -b + root;
    (far >= 0.0).then_some(far)
}

/// Distance along the ray to a camera-facing rectangle
///
/// `right` and `up` are the camera's unit axes; the rectangle spans
/// `half_size` along each.
pub fn ray_billboard(
    origin: Vec3,
    direction: Vec3,
    center: Vec3,
    half_size: Vec2,
    right: Vec3,
    up: Vec3,
) -> Option<f32> {
    let normal = right.cross(up);
    let denom = direction.dot(normal);
    if denom.abs() < 1e-6 {
        return None;
    }
    let t = (center - origin).dot(normal) / denom;
    if t < 0.0 {
        return None;
    }
    let local = origin + direction * t - center;
    (local.dot(right).abs() <= half_size.x && local.dot(up).abs() <= half_size.y).then_some(t)
}

/// Nearest hit among all targets
pub fn pick(
    origin: Vec3,
    direction: Vec3,
    right: Vec3,
    up: Vec3,
    targets: &[PickTarget],
) -> Option<Hit> {
    let mut best: Option<(f32, Hit)> = None;
    let mut consider = |t: Option<f32>, hit: Hit| {
        if let Some(t) = t
            && best.is_none_or(|(best_t, _)| t < best_t)
        {
            best = Some((t, hit));
        }
    };

    for target in targets {
        consider(
            ray_sphere(origin, direction, target.center, target.radius),
            Hit::Planet(target.id),
        );
        consider(
            ray_billboard(
                origin,
                direction,
                target.label_center,
                target.label_half_size,
                right,
                up,
            ),
            Hit::Label { owner: target.id },
        );
    }
    best.map(|(_, hit)| hit)
}

/// What to do with the audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioAction {
    Load { url: String, title: String },
    TogglePause,
}

/// Which planets change scale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emphasis {
    pub grow: PlanetId,
    pub shrink: Option<PlanetId>,
}

/// Where the camera flies
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMove {
    pub position: Vec3,
    pub target: Vec3,
}

/// Everything one selection does
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionPlan {
    pub planet: PlanetId,
    pub audio: AudioAction,
    /// `None` when reselecting
    pub emphasis: Option<Emphasis>,
    /// `None` when reselecting
    pub camera: Option<CameraMove>,
    pub edges: Vec<Edge>,
    pub panel: PanelContent,
}

/// Update the selection state and work out the effects
///
/// Returns `None` for an unknown planet, leaving the state untouched.
pub fn plan_selection(
    state: &mut SelectionState,
    registry: &SceneRegistry,
    id: PlanetId,
    config: &VizConfig,
) -> Option<SelectionPlan> {
    let planet = registry.get(id)?;
    let neighbors = registry.find_closest(id, config.proximity.neighbor_count);
    let edges = registry.connection_edges(id, &neighbors);
    let panel = PanelContent::build(registry, id, &neighbors)?;

    let plan = match state.select(id) {
        SelectOutcome::Reselected => SelectionPlan {
            planet: id,
            audio: AudioAction::TogglePause,
            emphasis: None,
            camera: None,
            edges,
            panel,
        },
        SelectOutcome::Switched { previous } => SelectionPlan {
            planet: id,
            audio: AudioAction::Load {
                url: planet.info.preview_url.clone(),
                title: planet.info.display_title(),
            },
            emphasis: Some(Emphasis {
                grow: id,
                shrink: previous,
            }),
            camera: Some(CameraMove {
                position: framing_position(
                    planet.position,
                    config.selection.camera_offset,
                    config.selection.camera_height,
                ),
                target: planet.position,
            }),
            edges,
            panel,
        },
    };
    Some(plan)
}

/// Turn a left click on the scene into a selection
fn click_to_select(
    mouse: Res<ButtonInput<MouseButton>>,
    pointer: Res<PointerOverUi>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&Camera, &GlobalTransform), With<OrbitCamera>>,
    planets: Query<(&Planet, &GlobalTransform)>,
    mut select: MessageWriter<SelectPlanet>,
) {
    if !mouse.just_pressed(MouseButton::Left) || pointer.0 {
        return;
    }
    let Ok(window) = windows.single() else {
        return;
    };
    let Some(cursor) = window.cursor_position() else {
        return;
    };
    let Ok((camera, camera_transform)) = cameras.single() else {
        return;
    };
    let Ok(ray) = camera.viewport_to_world(camera_transform, cursor) else {
        return;
    };

    let targets: Vec<PickTarget> = planets
        .iter()
        .map(|(planet, transform)| {
            let (scale, _, center) = transform.to_scale_rotation_translation();
            PickTarget {
                id: planet.id,
                center,
                radius: planet.bounding_radius * scale.x,
                label_center: center + Vec3::Y * planet.label_height * scale.y,
                label_half_size: LABEL_SIZE * 0.5 * scale.x,
            }
        })
        .collect();

    match pick(
        ray.origin,
        *ray.direction,
        *camera_transform.right(),
        *camera_transform.up(),
        &targets,
    ) {
        Some(hit) => {
            debug!("Click hit {hit:?}");
            select.write(SelectPlanet(hit.planet()));
        }
        None => debug!("Click missed"),
    }
}

/// Carry out selections
#[allow(clippy::too_many_arguments)] // Bevy system parameters
fn apply_selection(
    mut commands: Commands,
    mut requests: MessageReader<SelectPlanet>,
    mut state: ResMut<SelectionState>,
    mut registry: ResMut<SceneRegistry>,
    mut panel: ResMut<InfoPanel>,
    mut playback: MessageWriter<PlaybackCommand>,
    mut meshes: ResMut<Assets<Mesh>>,
    edge_material: Option<Res<EdgeMaterial>>,
    config: Res<VizConfig>,
    mut planets: Query<(&mut Planet, &Transform)>,
    cameras: Query<(Entity, &Transform, &OrbitCamera), Without<Planet>>,
) {
    for SelectPlanet(id) in requests.read() {
        let Some(plan) = plan_selection(&mut state, &registry, *id, &config) else {
            debug!("Ignoring selection of unknown planet {id:?}");
            continue;
        };

        match plan.audio {
            AudioAction::Load { url, title } => {
                playback.write(PlaybackCommand::LoadPreview { url, title });
            }
            AudioAction::TogglePause => {
                playback.write(PlaybackCommand::TogglePlayback);
            }
        }

        if let Some(emphasis) = plan.emphasis {
            let secs = config.selection.scale_secs;
            let mut tween = |id: PlanetId, to: f32, scale_state: ScaleState| {
                let Some(entity) = registry.get(id).map(|p| p.entity) else {
                    return;
                };
                if let Ok((mut planet, transform)) = planets.get_mut(entity) {
                    planet.scale_state = scale_state;
                    commands
                        .entity(entity)
                        .insert(ScaleTween::new(transform.scale.x, to, secs));
                }
            };
            tween(
                emphasis.grow,
                config.selection.emphasis_scale,
                ScaleState::Emphasized,
            );
            if let Some(previous) = emphasis.shrink {
                tween(previous, 1.0, ScaleState::Baseline);
            }
        }

        if let Some(edge_material) = edge_material.as_deref() {
            replace_edges(
                &mut commands,
                &mut meshes,
                edge_material,
                &mut registry,
                &plan.edges,
            );
        }

        panel.show(plan.panel);

        if let Some(camera_move) = plan.camera {
            for (entity, transform, orbit) in &cameras {
                commands.entity(entity).insert(CameraFlight {
                    from_position: transform.translation,
                    to_position: camera_move.position,
                    from_target: orbit.target,
                    to_target: camera_move.target,
                    elapsed: 0.0,
                    duration: config.selection.camera_secs,
                });
            }
        }
    }
}
