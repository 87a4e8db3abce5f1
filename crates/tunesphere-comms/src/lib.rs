//! Lockless communication between the UI thread and the audio thread.
//!
//! Control messages travel over rtrb ring buffers (no locks, no allocation on
//! the audio side). Decoded clips are heap data, so they take a separate
//! crossbeam channel and the audio thread only ever `try_recv`s them.

pub use rtrb;

use crossbeam_channel::{Receiver, Sender};

/// Transport control, UI -> audio thread
///
/// Every variant is `Copy`, so pushing and popping never touches the heap.
/// Clip data goes over the separate `clip_tx` channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerCommand {
    /// Swap in the clip with this generation (already sent on `clip_tx`)
    LoadClip {
        /// Generation of the clip to activate
        generation: u64,
    },
    /// Resume or start output of the current clip
    Play,
    /// Pause output, keeping the position
    Pause,
    /// Pause and rewind to the start
    Stop,
    /// Jump to a fraction (0.0-1.0) of the clip's length
    Seek(f32),
}

/// Transport notifications, audio thread -> UI
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Output device opened
    ///
    /// Reports the sample rate the device actually runs at, which decoded
    /// clips must be resampled to.
    EngineInitialized {
        /// Device sample rate in Hz
        sample_rate: u32,
    },
    /// A clip became the current clip
    ClipLoaded {
        /// Generation of the activated clip
        generation: u64,
        /// Length in frames at the device rate
        frames: u64,
    },
    /// Playback started or resumed
    Started,
    /// Playback paused
    Paused,
    /// Playback stopped and rewound
    Stopped,
    /// Current playhead, in frames, sent once per audio buffer while playing
    Position {
        /// Frame index into the current clip
        frame: u64,
    },
    /// Playhead reached the end of the clip
    Finished,
    /// Error occurred
    Error(String),
}

/// A decoded clip ready for output
///
/// Samples are interleaved stereo at the engine's sample rate. Boxed slice
/// so dropping it is a single free.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedClip {
    /// Load generation this clip answers
    pub generation: u64,
    /// Interleaved stereo, left first
    pub samples: Box<[f32]>,
    /// Sample rate of `samples`
    pub sample_rate: u32,
}

impl DecodedClip {
    /// Number of stereo frames
    pub fn frame_count(&self) -> usize {
        self.samples.len() / 2
    }

    /// Clip length in seconds
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f32 / self.sample_rate as f32
    }
}

/// UI end of the command ring
pub type CommandSender = rtrb::Producer<PlayerCommand>;
/// Audio end of the command ring
pub type CommandReceiver = rtrb::Consumer<PlayerCommand>;

/// Audio end of the event ring
pub type EventSender = rtrb::Producer<PlayerEvent>;
/// UI end of the event ring
pub type EventReceiver = rtrb::Consumer<PlayerEvent>;

/// Build the UI and audio halves of every channel
///
/// `capacity` bounds both rings; the clip channel is unbounded.
pub fn create_channels(capacity: usize) -> (UiChannels, AudioChannels) {
    let (command_tx, command_rx) = rtrb::RingBuffer::new(capacity);
    let (event_tx, event_rx) = rtrb::RingBuffer::new(capacity);
    let (clip_tx, clip_rx) = crossbeam_channel::unbounded();

    (
        UiChannels {
            command_tx,
            event_rx,
            clip_tx,
        },
        AudioChannels {
            command_rx,
            event_tx,
            clip_rx,
        },
    )
}

/// Held by the Bevy app
pub struct UiChannels {
    /// Transport commands
    pub command_tx: CommandSender,
    /// Transport notifications
    pub event_rx: EventReceiver,
    /// Clip sender (UI -> Audio) - separate channel for heap data
    pub clip_tx: Sender<DecodedClip>,
}

/// Moved into the output stream callback
pub struct AudioChannels {
    /// Transport commands
    pub command_rx: CommandReceiver,
    /// Transport notifications
    pub event_tx: EventSender,
    /// Clip receiver (UI -> Audio) - `try_recv` is non-blocking
    pub clip_rx: Receiver<DecodedClip>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_ring() {
        let (mut ui, mut audio) = create_channels(256);
        assert!(ui.command_tx.push(PlayerCommand::Play).is_ok());
        assert_eq!(audio.command_rx.pop().ok(), Some(PlayerCommand::Play));
    }

    #[test]
    fn test_clip_channel() {
        let (ui, audio) = create_channels(4);
        let clip = DecodedClip {
            generation: 3,
            samples: vec![0.0; 96_000].into_boxed_slice(),
            sample_rate: 48_000,
        };
        ui.clip_tx.send(clip).unwrap();
        let received = audio.clip_rx.try_recv().unwrap();
        assert_eq!(received.generation, 3);
        assert_eq!(received.frame_count(), 48_000);
        assert!((received.duration_secs() - 1.0).abs() < f32::EPSILON);
    }
}
