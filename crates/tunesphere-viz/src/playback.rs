//! Playback state and control systems
//!
//! Preview clips are fetched and decoded on background threads. Every load
//! gets a generation number; a clip that finishes after a newer load was
//! requested is thrown away, so quick successive selections can never
//! start the wrong track.

use crate::config::VizConfig;
use crate::waveform::WaveformData;
use crate::{AudioClipChannel, AudioCommandChannel, AudioEngineInfo, AudioEventChannel};
use bevy::prelude::*;
use tracing::{debug, error, info, warn};
use tunesphere_audio::{ClipError, ClipLoader};
use tunesphere_comms::{DecodedClip, PlayerCommand, PlayerEvent};

/// Plugin that manages playback state
pub struct PlaybackPlugin;

impl Plugin for PlaybackPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PlaybackState>()
            .init_resource::<ClipLoadTasks>()
            .add_message::<PlaybackCommand>()
            .add_systems(
                Update,
                (handle_playback_commands, poll_clip_loads, drain_player_events).chain(),
            );
    }
}

pub const PLAY_LABEL: &str = "Play";
pub const PAUSE_LABEL: &str = "Pause";

/// Fallback when the engine has not reported its rate
const DEFAULT_SAMPLE_RATE: u32 = 48000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Stopped,
    /// Waiting for the clip to be fetched and handed to the engine
    Loading,
    Playing,
    Paused,
}

/// Current playback state
#[derive(Resource, Debug)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub current_position: f32, // In seconds
    pub total_duration: f32,   // Total clip length
    pub sample_rate: u32,
    /// Preview URL of the latest load request
    pub loaded_url: Option<String>,
    /// Generation of the latest load request
    pub generation: u64,
    /// "name - artist" of the loaded clip, empty while loading
    pub now_playing: String,
    /// Text on the play/pause button
    pub button_label: &'static str,
    /// Start playback as soon as the pending clip is ready
    play_when_ready: bool,
    pending_title: Option<String>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            status: PlaybackStatus::Stopped,
            current_position: 0.0,
            total_duration: 0.0,
            sample_rate: DEFAULT_SAMPLE_RATE,
            loaded_url: None,
            generation: 0,
            now_playing: String::new(),
            button_label: PLAY_LABEL,
            play_when_ready: false,
            pending_title: None,
        }
    }
}

impl PlaybackState {
    /// Start a fresh load, returning its generation
    ///
    /// Clears the now-playing label and sets the button to "Pause".
    pub fn begin_load(&mut self, url: String, title: String) -> u64 {
        self.generation += 1;
        self.loaded_url = Some(url);
        self.pending_title = Some(title);
        self.now_playing.clear();
        self.button_label = PAUSE_LABEL;
        self.status = PlaybackStatus::Loading;
        self.play_when_ready = true;
        self.current_position = 0.0;
        self.total_duration = 0.0;
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    /// The clip for `generation` is ready to play
    ///
    /// Returns the command to send, if playback should start. Stale
    /// generations change nothing.
    pub fn clip_ready(&mut self, generation: u64) -> Option<PlayerCommand> {
        if !self.is_current(generation) || self.status != PlaybackStatus::Loading {
            return None;
        }
        self.now_playing = self.pending_title.take().unwrap_or_default();
        if self.play_when_ready {
            self.status = PlaybackStatus::Playing;
            Some(PlayerCommand::Play)
        } else {
            self.status = PlaybackStatus::Paused;
            None
        }
    }

    /// The latest load failed
    pub fn load_failed(&mut self, generation: u64) {
        if self.is_current(generation) {
            self.status = PlaybackStatus::Stopped;
            self.pending_title = None;
        }
    }

    /// Pause if playing, play otherwise; the button label is left alone
    pub fn toggle(&mut self) -> Option<PlayerCommand> {
        match self.status {
            PlaybackStatus::Playing => {
                self.status = PlaybackStatus::Paused;
                Some(PlayerCommand::Pause)
            }
            PlaybackStatus::Paused | PlaybackStatus::Stopped => {
                if self.loaded_url.is_none() {
                    return None;
                }
                self.status = PlaybackStatus::Playing;
                Some(PlayerCommand::Play)
            }
            PlaybackStatus::Loading => {
                self.play_when_ready = !self.play_when_ready;
                None
            }
        }
    }

    /// The play/pause button was pressed
    ///
    /// The button acts on its own label: "Play" plays and becomes "Pause",
    /// "Pause" pauses and becomes "Play".
    pub fn press_button(&mut self) -> Option<PlayerCommand> {
        let play = self.button_label == PLAY_LABEL;
        self.button_label = if play { PAUSE_LABEL } else { PLAY_LABEL };

        if self.status == PlaybackStatus::Loading {
            self.play_when_ready = play;
            return None;
        }
        if self.loaded_url.is_none() {
            return None;
        }
        if play {
            self.status = PlaybackStatus::Playing;
            Some(PlayerCommand::Play)
        } else {
            self.status = PlaybackStatus::Paused;
            Some(PlayerCommand::Pause)
        }
    }

    /// Fraction of the clip already played
    pub fn progress(&self) -> f32 {
        if self.total_duration <= 0.0 {
            return 0.0;
        }
        (self.current_position / self.total_duration).clamp(0.0, 1.0)
    }
}

/// Commands for controlling playback
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackCommand {
    /// Fetch a preview and play it when ready
    LoadPreview { url: String, title: String },
    /// Pause/resume without touching the button label
    TogglePlayback,
    /// The play/pause button
    PressPlayPause,
    /// Jump to a fraction of the clip
    Seek(f32),
}

impl Message for PlaybackCommand {}

/// A preview fetch in flight
struct ClipLoad {
    generation: u64,
    handle: std::thread::JoinHandle<Result<DecodedClip, ClipError>>,
}

/// Resource for tracking clip loading tasks
///
/// Superseded loads stay here until their thread finishes, then get dropped.
#[derive(Resource, Default)]
struct ClipLoadTasks {
    pending: Vec<ClipLoad>,
}

fn send(audio: &mut Option<ResMut<AudioCommandChannel>>, command: PlayerCommand) {
    if let Some(tx) = audio
        && tx.0.push(command).is_err()
    {
        warn!("Audio command queue full, dropped {command:?}");
    }
}

/// System to handle playback commands
fn handle_playback_commands(
    mut commands: MessageReader<PlaybackCommand>,
    mut state: ResMut<PlaybackState>,
    mut tasks: ResMut<ClipLoadTasks>,
    mut waveform: ResMut<WaveformData>,
    mut audio: Option<ResMut<AudioCommandChannel>>,
    engine: Res<AudioEngineInfo>,
    config: Res<VizConfig>,
) {
    for command in commands.read() {
        match command {
            PlaybackCommand::LoadPreview { url, title } => {
                let generation = state.begin_load(url.clone(), title.clone());
                info!("Loading preview {generation}: {title}");
                send(&mut audio, PlayerCommand::Stop);
                waveform.clear();

                let url = url.clone();
                let rate = engine.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);
                let timeout = config.remote.preview_timeout();
                let handle = std::thread::spawn(move || {
                    ClipLoader::new(rate, timeout)?.load(&url, generation)
                });
                tasks.pending.push(ClipLoad { generation, handle });
            }
            PlaybackCommand::TogglePlayback => {
                if let Some(command) = state.toggle() {
                    info!("Toggle -> {command:?}");
                    send(&mut audio, command);
                }
            }
            PlaybackCommand::PressPlayPause => {
                if let Some(command) = state.press_button() {
                    info!("Play/Pause button -> {command:?}");
                    send(&mut audio, command);
                }
            }
            PlaybackCommand::Seek(fraction) => {
                let fraction = fraction.clamp(0.0, 1.0);
                info!("Seek to {:.0}%", fraction * 100.0);
                state.current_position = fraction * state.total_duration;
                send(&mut audio, PlayerCommand::Seek(fraction));
            }
        }
    }
}

/// System that polls for finished clip loads
fn poll_clip_loads(
    mut tasks: ResMut<ClipLoadTasks>,
    mut state: ResMut<PlaybackState>,
    mut waveform: ResMut<WaveformData>,
    clip_channel: Option<Res<AudioClipChannel>>,
    mut audio: Option<ResMut<AudioCommandChannel>>,
) {
    let (finished, pending): (Vec<ClipLoad>, Vec<ClipLoad>) = std::mem::take(&mut tasks.pending)
        .into_iter()
        .partition(|load| load.handle.is_finished());
    tasks.pending = pending;

    for load in finished {
        let generation = load.generation;
        let result = load.handle.join();

        if !state.is_current(generation) {
            debug!("Discarding superseded clip load {generation}");
            continue;
        }

        match result {
            Ok(Ok(clip)) => {
                info!(
                    "Clip {generation} ready: {:.1}s at {}Hz",
                    clip.duration_secs(),
                    clip.sample_rate
                );
                waveform.set_clip(&clip);
                state.total_duration = clip.duration_secs();
                state.sample_rate = clip.sample_rate;

                if let Some(channel) = clip_channel.as_deref() {
                    // The engine confirms with ClipLoaded, which starts playback
                    if channel.0.send(clip).is_err() {
                        error!("Audio engine is gone, cannot hand over clip");
                        state.load_failed(generation);
                        continue;
                    }
                    send(&mut audio, PlayerCommand::LoadClip { generation });
                } else if state.clip_ready(generation).is_some() {
                    debug!("No audio engine, playback is visual only");
                }
            }
            Ok(Err(e)) => {
                error!("Failed to load preview: {e}");
                state.load_failed(generation);
            }
            Err(_) => {
                error!("Clip loading thread panicked");
                state.load_failed(generation);
            }
        }
    }
}

/// System that applies events from the audio thread
fn drain_player_events(
    events: Option<ResMut<AudioEventChannel>>,
    mut state: ResMut<PlaybackState>,
    mut engine: ResMut<AudioEngineInfo>,
    mut audio: Option<ResMut<AudioCommandChannel>>,
) {
    let Some(mut events) = events else {
        return;
    };

    while let Ok(event) = events.0.pop() {
        match event {
            PlayerEvent::EngineInitialized { sample_rate } => {
                info!("Audio engine running at {sample_rate}Hz");
                engine.sample_rate = Some(sample_rate);
            }
            PlayerEvent::ClipLoaded { generation, frames } => {
                debug!("Engine loaded clip {generation} ({frames} frames)");
                if let Some(command) = state.clip_ready(generation) {
                    send(&mut audio, command);
                }
            }
            PlayerEvent::Started => state.status = PlaybackStatus::Playing,
            PlayerEvent::Paused => {
                if state.status != PlaybackStatus::Loading {
                    state.status = PlaybackStatus::Paused;
                }
            }
            PlayerEvent::Stopped => {
                if state.status != PlaybackStatus::Loading {
                    state.status = PlaybackStatus::Stopped;
                }
            }
            PlayerEvent::Position { frame } => {
                if state.sample_rate > 0 {
                    state.current_position = frame as f32 / state.sample_rate as f32;
                }
            }
            PlayerEvent::Finished => {
                state.status = PlaybackStatus::Stopped;
                state.current_position = state.total_duration;
            }
            PlayerEvent::Error(message) => error!("Audio engine error: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_load_resets_labels() {
        let mut state = PlaybackState {
            now_playing: "Old - Artist".to_string(),
            button_label: PLAY_LABEL,
            ..PlaybackState::default()
        };
        let generation = state.begin_load("a.mp3".to_string(), "A - X".to_string());
        assert_eq!(generation, 1);
        assert!(state.now_playing.is_empty());
        assert_eq!(state.button_label, PAUSE_LABEL);
        assert_eq!(state.status, PlaybackStatus::Loading);

        assert_eq!(state.clip_ready(1), Some(PlayerCommand::Play));
        assert_eq!(state.now_playing, "A - X");
        assert_eq!(state.status, PlaybackStatus::Playing);
    }

    #[test]
    fn test_stale_clip_is_ignored() {
        let mut state = PlaybackState::default();
        let p = state.begin_load("p.mp3".to_string(), "P".to_string());
        let q = state.begin_load("q.mp3".to_string(), "Q".to_string());
        let p_again = state.begin_load("p.mp3".to_string(), "P".to_string());

        // Loads for P and Q finish late
        assert_eq!(state.clip_ready(p), None);
        assert_eq!(state.clip_ready(q), None);
        assert!(state.now_playing.is_empty());
        assert_eq!(state.loaded_url.as_deref(), Some("p.mp3"));

        assert_eq!(state.clip_ready(p_again), Some(PlayerCommand::Play));
        assert_eq!(state.now_playing, "P");
    }

    #[test]
    fn test_toggle_leaves_button_label() {
        let mut state = PlaybackState::default();
        let generation = state.begin_load("a.mp3".to_string(), "A".to_string());
        state.clip_ready(generation);

        assert_eq!(state.toggle(), Some(PlayerCommand::Pause));
        assert_eq!(state.status, PlaybackStatus::Paused);
        assert_eq!(state.button_label, PAUSE_LABEL);

        assert_eq!(state.toggle(), Some(PlayerCommand::Play));
        assert_eq!(state.button_label, PAUSE_LABEL);
    }

    #[test]
    fn test_button_follows_its_own_label() {
        let mut state = PlaybackState::default();
        let generation = state.begin_load("a.mp3".to_string(), "A".to_string());
        state.clip_ready(generation);

        // Paused by a reselection; the button still reads "Pause"
        state.toggle();
        assert_eq!(state.press_button(), Some(PlayerCommand::Pause));
        assert_eq!(state.button_label, PLAY_LABEL);

        assert_eq!(state.press_button(), Some(PlayerCommand::Play));
        assert_eq!(state.button_label, PAUSE_LABEL);
        assert_eq!(state.status, PlaybackStatus::Playing);
    }

    #[test]
    fn test_pause_while_loading_defers() {
        let mut state = PlaybackState::default();
        let generation = state.begin_load("a.mp3".to_string(), "A".to_string());
        assert_eq!(state.press_button(), None);
        assert_eq!(state.button_label, PLAY_LABEL);

        assert_eq!(state.clip_ready(generation), None);
        assert_eq!(state.status, PlaybackStatus::Paused);
        assert_eq!(state.now_playing, "A");
    }

    #[test]
    fn test_nothing_loaded_is_noop() {
        let mut state = PlaybackState::default();
        assert_eq!(state.toggle(), None);
        assert_eq!(state.press_button(), None);
    }

    #[test]
    fn test_failed_load() {
        let mut state = PlaybackState::default();
        let generation = state.begin_load("a.mp3".to_string(), "A".to_string());
        state.load_failed(generation);
        assert_eq!(state.status, PlaybackStatus::Stopped);
        assert_eq!(state.clip_ready(generation), None);
    }

    #[test]
    fn test_progress() {
        let state = PlaybackState {
            current_position: 15.0,
            total_duration: 30.0,
            ..PlaybackState::default()
        };
        assert!((state.progress() - 0.5).abs() < f32::EPSILON);
        assert_eq!(PlaybackState::default().progress(), 0.0);
    }
}
