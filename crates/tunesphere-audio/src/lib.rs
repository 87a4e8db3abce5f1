//! Preview clip playback.
//!
//! This crate fetches and decodes preview clips, owns the cpal output stream,
//! and runs the transport (play/pause/seek over a single clip) on the audio
//! thread.

pub mod clip;
pub mod engine;
pub mod transport;

pub use clip::{ClipError, ClipLoader};
pub use engine::AudioEngine;
pub use transport::Transport;

/// Audio configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Preferred sample rate; the device's default rate wins if it differs
    pub sample_rate: u32,
    pub output_channels: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            output_channels: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AudioConfig::default();
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.output_channels, 2);
    }
}
