//! Orbit camera with keyboard/mouse controls and animated flights
//!
//! The camera always looks at its orbit target. Selecting a planet starts a
//! [`CameraFlight`] that moves both the camera and the target; while no
//! flight runs, the whole view slowly revolves around the world origin.

use crate::config::VizConfig;
use bevy::input::mouse::{MouseMotion, MouseWheel};
use bevy::prelude::*;
use leafwing_input_manager::prelude::*;

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(InputManagerPlugin::<CameraAction>::default())
            .add_systems(Startup, setup_camera)
            .add_systems(
                Update,
                (camera_flight, camera_controls, camera_drag, auto_orbit).chain(),
            );
    }
}

/// Actions for camera control
#[derive(Actionlike, PartialEq, Eq, Clone, Copy, Hash, Debug, Reflect)]
pub enum CameraAction {
    OrbitLeft,
    OrbitRight,
    ZoomIn,
    ZoomOut,
    Raise,
    Lower,
    Drag,
}

/// Component marking the orbit camera
#[derive(Component, Debug)]
pub struct OrbitCamera {
    /// Point the camera looks at and orbits
    pub target: Vec3,
    /// Keyboard orbit speed (radians per second)
    pub orbit_speed: f32,
    /// Fraction of the distance covered per second of zoom
    pub zoom_speed: f32,
    /// Raise/lower speed (units per second)
    pub climb_speed: f32,
    /// Drag rotation (radians per pixel)
    pub drag_sensitivity: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            orbit_speed: 1.2,
            zoom_speed: 1.0,
            climb_speed: 80.0,
            drag_sensitivity: 0.005,
        }
    }
}

const MIN_DISTANCE: f32 = 20.0;
const MAX_DISTANCE: f32 = 3000.0;
/// Keeps the camera off the poles so `looking_at` stays well defined
const MAX_ELEVATION: f32 = 1.45;

/// An in-progress camera move
#[derive(Component, Debug, Clone)]
pub struct CameraFlight {
    pub from_position: Vec3,
    pub to_position: Vec3,
    pub from_target: Vec3,
    pub to_target: Vec3,
    pub elapsed: f32,
    pub duration: f32,
}

impl CameraFlight {
    /// Camera position and target `dt` seconds further along, and whether
    /// the flight has arrived
    pub fn advance(&mut self, dt: f32) -> (Vec3, Vec3, bool) {
        self.elapsed += dt;
        let t = if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).min(1.0)
        };
        let eased = ease_out(t, 1);
        (
            self.from_position.lerp(self.to_position, eased),
            self.from_target.lerp(self.to_target, eased),
            t >= 1.0,
        )
    }
}

/// Power-out easing: `power` 1 is quadratic, 2 cubic, and so on
pub fn ease_out(t: f32, power: i32) -> f32 {
    1.0 - (1.0 - t.clamp(0.0, 1.0)).powi(power + 1)
}

/// Where the camera parks when framing a planet
///
/// Offset outward on X and Z in the direction of the planet's own
/// coordinates (zero counts as positive), and raised above it.
pub fn framing_position(planet: Vec3, horizontal: f32, height: f32) -> Vec3 {
    let sign = |v: f32| if v >= 0.0 { 1.0 } else { -1.0 };
    Vec3::new(
        planet.x + sign(planet.x) * horizontal,
        planet.y + height,
        planet.z + sign(planet.z) * horizontal,
    )
}

/// Rotate a target-relative offset by yaw (around Y) then pitch (elevation)
pub fn orbit_offset(offset: Vec3, yaw: f32, pitch: f32) -> Vec3 {
    let distance = offset.length();
    if distance <= f32::EPSILON {
        return offset;
    }
    let rotated = Quat::from_rotation_y(yaw) * offset;
    let horizontal = Vec2::new(rotated.x, rotated.z).length();
    let elevation = (rotated.y.atan2(horizontal) + pitch).clamp(-MAX_ELEVATION, MAX_ELEVATION);
    let azimuth = Vec2::new(rotated.x, rotated.z).normalize_or(Vec2::X);
    Vec3::new(
        azimuth.x * elevation.cos() * distance,
        elevation.sin() * distance,
        azimuth.y * elevation.cos() * distance,
    )
}

/// Setup the camera looking down at the galaxy
fn setup_camera(mut commands: Commands) {
    let input_map = InputMap::new([
        (CameraAction::OrbitLeft, KeyCode::KeyA),
        (CameraAction::OrbitRight, KeyCode::KeyD),
        (CameraAction::ZoomIn, KeyCode::KeyW),
        (CameraAction::ZoomOut, KeyCode::KeyS),
        (CameraAction::Raise, KeyCode::KeyQ),
        (CameraAction::Lower, KeyCode::KeyE),
    ])
    .with(CameraAction::Drag, MouseButton::Right);

    commands.spawn((
        Camera3d::default(),
        Camera {
            clear_color: ClearColorConfig::Custom(Color::srgb(0.0, 0.0, 0.02)),
            ..default()
        },
        Transform::from_xyz(0.0, 150.0, 300.0).looking_at(Vec3::ZERO, Vec3::Y),
        OrbitCamera::default(),
        input_map,
    ));
}

/// Advance any camera flight and drop it when done
fn camera_flight(
    mut commands: Commands,
    time: Res<Time>,
    mut query: Query<(Entity, &mut Transform, &mut OrbitCamera, &mut CameraFlight)>,
) {
    for (entity, mut transform, mut camera, mut flight) in &mut query {
        let (position, target, done) = flight.advance(time.delta_secs());
        camera.target = target;
        *transform = Transform::from_translation(position).looking_at(target, Vec3::Y);
        if done {
            commands.entity(entity).remove::<CameraFlight>();
        }
    }
}

/// Keyboard orbit, zoom and height (A/D, W/S, Q/E) plus wheel zoom
fn camera_controls(
    time: Res<Time>,
    mut wheel: MessageReader<MouseWheel>,
    mut query: Query<
        (&mut Transform, &OrbitCamera, &ActionState<CameraAction>),
        Without<CameraFlight>,
    >,
) {
    let dt = time.delta_secs();
    let scroll: f32 = wheel.read().map(|w| w.y).sum();

    for (mut transform, camera, action_state) in &mut query {
        let mut offset = transform.translation - camera.target;

        let mut yaw = 0.0;
        if action_state.pressed(&CameraAction::OrbitLeft) {
            yaw -= camera.orbit_speed * dt;
        }
        if action_state.pressed(&CameraAction::OrbitRight) {
            yaw += camera.orbit_speed * dt;
        }
        if yaw != 0.0 {
            offset = orbit_offset(offset, yaw, 0.0);
        }

        let mut zoom = -scroll * 0.1;
        if action_state.pressed(&CameraAction::ZoomIn) {
            zoom -= camera.zoom_speed * dt;
        }
        if action_state.pressed(&CameraAction::ZoomOut) {
            zoom += camera.zoom_speed * dt;
        }
        if zoom != 0.0 {
            let distance = (offset.length() * (1.0 + zoom)).clamp(MIN_DISTANCE, MAX_DISTANCE);
            offset = offset.normalize_or(Vec3::Z) * distance;
        }

        if action_state.pressed(&CameraAction::Raise) {
            offset.y += camera.climb_speed * dt;
        }
        if action_state.pressed(&CameraAction::Lower) {
            offset.y -= camera.climb_speed * dt;
        }

        *transform = Transform::from_translation(camera.target + offset)
            .looking_at(camera.target, Vec3::Y);
    }
}

/// Orbit around the target while the right mouse button is held
fn camera_drag(
    mut mouse_motion: MessageReader<MouseMotion>,
    mut query: Query<
        (&mut Transform, &OrbitCamera, &ActionState<CameraAction>),
        Without<CameraFlight>,
    >,
) {
    for motion in mouse_motion.read() {
        for (mut transform, camera, action_state) in &mut query {
            if !action_state.pressed(&CameraAction::Drag) {
                continue;
            }
            let offset = orbit_offset(
                transform.translation - camera.target,
                -motion.delta.x * camera.drag_sensitivity,
                motion.delta.y * camera.drag_sensitivity,
            );
            *transform = Transform::from_translation(camera.target + offset)
                .looking_at(camera.target, Vec3::Y);
        }
    }
}

/// Slowly revolve the camera around the world origin, still facing its target
fn auto_orbit(
    time: Res<Time>,
    config: Res<VizConfig>,
    mut query: Query<(&mut Transform, &OrbitCamera), Without<CameraFlight>>,
) {
    let rotation = Quat::from_rotation_y(config.selection.auto_orbit_speed * time.delta_secs());
    for (mut transform, camera) in &mut query {
        // Only the eye moves; a framed planet stays in view
        *transform = Transform::from_translation(rotation * transform.translation)
            .looking_at(camera.target, Vec3::Y);
    }
}
