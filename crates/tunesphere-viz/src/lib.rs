//! The tunesphere galaxy
//!
//! Every liked track with a predicted genre becomes a procedurally generated
//! planet, placed by the classifier's 2D embedding and tinted by its genre.
//! Clicking a planet plays its preview clip, flies the camera over and
//! links it to its nearest neighbours with flashing edges.

use bevy::prelude::*;
use std::sync::Arc;
use tunesphere_comms::UiChannels;
use tunesphere_remote::GenreLookup;

pub mod camera;
pub mod config;
pub mod edges;
pub mod noise;
pub mod panel;
pub mod planets;
pub mod playback;
pub mod registry;
pub mod scene;
pub mod selection;
pub mod terrain;
pub mod waveform;

pub use config::VizConfig;
pub use planets::LibrarySource;

/// Resource wrapping the command sender (UI -> Audio)
pub struct AudioCommandChannel(pub tunesphere_comms::CommandSender);

// SAFETY: `rtrb::Producer` is not `Sync` because of its internal `Cell`
// cache and raw pointers. It is still built for exactly one producer thread
// talking to one consumer thread:
// 1. Bevy hands out a resource to one system at a time, so the producer is
//    never touched from two threads concurrently
// 2. The audio thread only ever holds the matching `Consumer`
// 3. Coordination between the two ends is done with atomics inside rtrb
#[allow(unsafe_code)]
unsafe impl Send for AudioCommandChannel {}
#[allow(unsafe_code)]
unsafe impl Sync for AudioCommandChannel {}

impl Resource for AudioCommandChannel {}

/// Resource wrapping the event receiver (Audio -> UI)
pub struct AudioEventChannel(pub tunesphere_comms::EventReceiver);

// SAFETY: Same reasoning as `AudioCommandChannel`, mirrored. Only the UI
// thread reads from this `Consumer`, through Bevy's exclusive resource
// access; the audio thread owns the `Producer`.
#[allow(unsafe_code)]
unsafe impl Send for AudioEventChannel {}
#[allow(unsafe_code)]
unsafe impl Sync for AudioEventChannel {}

impl Resource for AudioEventChannel {}

/// Resource wrapping the clip sender (UI -> Audio)
pub struct AudioClipChannel(pub crossbeam_channel::Sender<tunesphere_comms::DecodedClip>);

// crossbeam_channel::Sender already implements Send + Sync
impl Resource for AudioClipChannel {}

/// Resource containing information about the audio engine
///
/// Filled in from `PlayerEvent::EngineInitialized`. Decoded clips are
/// resampled to this rate. `None` means no engine has reported yet, or the
/// app is running without audio.
#[derive(Resource, Debug, Clone, Default)]
pub struct AudioEngineInfo {
    pub sample_rate: Option<u32>,
}

/// Frame order of the systems that share the scene registry
///
/// Planets spawned this frame are registered before any selection runs, so
/// a selection never sees a half-built galaxy.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GalaxySystems {
    /// Library loading, planet spawning and scale tweens
    Build,
    /// Selection handling: playback, edges, panel and camera flights
    Select,
}

/// Orders the [`GalaxySystems`] sets in `Update`
pub struct GalaxyOrderPlugin;

impl Plugin for GalaxyOrderPlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(Update, (GalaxySystems::Build, GalaxySystems::Select).chain());
    }
}

/// Plugin that sets up the whole galaxy view
pub struct TunesphereVizPlugin;

impl Plugin for TunesphereVizPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<VizConfig>() {
            app.init_resource::<VizConfig>();
        }

        app.init_resource::<registry::SceneRegistry>()
            .init_resource::<waveform::WaveformData>()
            .init_resource::<AudioEngineInfo>()
            .init_resource::<planets::StartupLibrary>()
            .add_plugins(GalaxyOrderPlugin)
            .add_plugins(scene::ScenePlugin)
            .add_plugins(camera::CameraPlugin)
            .add_plugins(edges::EdgePlugin)
            .add_plugins(planets::PlanetPlugin)
            .add_plugins(selection::SelectionPlugin)
            .add_plugins(playback::PlaybackPlugin)
            .add_plugins(panel::PanelPlugin)
            .add_systems(Last, stop_audio_on_exit);
    }
}

/// Silence the output before the window goes away
fn stop_audio_on_exit(
    mut exit_events: MessageReader<AppExit>,
    mut audio: Option<ResMut<AudioCommandChannel>>,
) {
    if exit_events.read().next().is_none() {
        return;
    }
    tracing::info!("App exit detected, stopping playback");
    if let Some(tx) = &mut audio
        && tx.0.push(tunesphere_comms::PlayerCommand::Stop).is_err()
    {
        tracing::warn!("Command queue full, could not stop playback on exit");
    }
}

/// Create a Bevy app configured for the galaxy view
///
/// `ui_channels` is `None` when no output device could be opened; the scene
/// still works, selection just doesn't play anything. `library`, if given,
/// is loaded as soon as the app starts instead of waiting for the File menu.
pub fn create_app(
    ui_channels: Option<UiChannels>,
    config: VizConfig,
    genre: Arc<dyn GenreLookup>,
    library: Option<LibrarySource>,
) -> App {
    let mut app = App::new();

    app.add_plugins(
        DefaultPlugins
            .set(WindowPlugin {
                primary_window: Some(Window {
                    title: "tunesphere".to_string(),
                    resolution: (1920, 1080).into(),
                    ..default()
                }),
                ..default()
            })
            .disable::<bevy::log::LogPlugin>(), // tracing is initialized in main.rs
    )
    .insert_resource(config)
    .insert_resource(planets::GenreService(genre))
    .insert_resource(planets::StartupLibrary(library))
    .add_plugins(TunesphereVizPlugin);

    if let Some(channels) = ui_channels {
        app.insert_resource(AudioCommandChannel(channels.command_tx))
            .insert_resource(AudioEventChannel(channels.event_rx))
            .insert_resource(AudioClipChannel(channels.clip_tx));
    }

    app
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Resource, Default)]
    struct Ran(Vec<&'static str>);

    #[test]
    fn test_build_runs_before_select() {
        let mut app = App::new();
        app.init_resource::<Ran>().add_plugins(GalaxyOrderPlugin);
        // Registered in reverse on purpose
        app.add_systems(
            Update,
            (|mut ran: ResMut<Ran>| ran.0.push("select")).in_set(GalaxySystems::Select),
        );
        app.add_systems(
            Update,
            (|mut ran: ResMut<Ran>| ran.0.push("build")).in_set(GalaxySystems::Build),
        );

        app.update();
        app.update();

        assert_eq!(
            app.world().resource::<Ran>().0,
            vec!["build", "select", "build", "select"]
        );
    }
}
