//! Audio engine - owns the cpal output stream that plays preview clips.
//!
//! The stream callback owns a [`CallbackState`]: the transport plus the
//! audio-side ends of the UI channels. Nothing else touches them once the
//! stream is built.

use crate::AudioConfig;
use crate::transport::{RenderOutcome, Transport};
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use tunesphere_comms::{AudioChannels, PlayerEvent};

/// Preview playback on the default output device
pub struct AudioEngine {
    config: AudioConfig,
    stream: Option<Stream>,
    sample_rate: Option<u32>,
}

/// Everything the realtime callback needs
///
/// REAL-TIME SAFE: `process` neither allocates nor logs. Events that do
/// not fit in the queue are dropped instead of blocking.
struct CallbackState {
    transport: Transport,
    channels: AudioChannels,
    output_channels: usize,
}

impl CallbackState {
    fn process(&mut self, data: &mut [f32]) {
        while let Ok(command) = self.channels.command_rx.pop() {
            if let Some(event) = self
                .transport
                .handle_command(command, &self.channels.clip_rx)
            {
                let _ = self.channels.event_tx.push(event);
            }
        }

        let event = match self.transport.render(data, self.output_channels) {
            RenderOutcome::Silent => return,
            // Superseded by the next buffer's position anyway
            RenderOutcome::Played { frame } => PlayerEvent::Position { frame },
            RenderOutcome::Finished => PlayerEvent::Finished,
        };
        let _ = self.channels.event_tx.push(event);
    }
}

/// Default device and a stream config at the device's preferred rate
fn open_output(config: &AudioConfig) -> Result<(Device, StreamConfig)> {
    let host = cpal::default_host();
    tracing::debug!("Audio host: {}", host.id().name());

    let device = host
        .default_output_device()
        .context("No output device available")?;
    tracing::info!("Output device: {}", device.name()?);

    // Preview clips are resampled to whatever the device prefers
    let preferred = device
        .default_output_config()
        .context("Output device has no default config")?;
    let sample_rate = preferred.sample_rate().0;
    if sample_rate != config.sample_rate {
        tracing::info!(
            "Device runs at {sample_rate}Hz (requested {}Hz)",
            config.sample_rate
        );
    }

    let stream_config = StreamConfig {
        channels: config.output_channels as u16,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    Ok((device, stream_config))
}

impl AudioEngine {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            stream: None,
            sample_rate: None,
        }
    }

    /// Sample rate of the running stream, `None` until started
    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    /// Open the output device and start the stream
    ///
    /// Reports `EngineInitialized` on the event channel before any audio
    /// flows, so the UI knows which rate to decode clips to.
    pub fn start(&mut self, mut channels: AudioChannels) -> Result<()> {
        tracing::info!("Starting preview output: {:?}", self.config);

        let (device, stream_config) = open_output(&self.config)?;
        let sample_rate = stream_config.sample_rate.0;
        tracing::debug!("Output stream: {stream_config:?}");

        if channels
            .event_tx
            .push(PlayerEvent::EngineInitialized { sample_rate })
            .is_err()
        {
            tracing::warn!("Event queue full, UI will not see EngineInitialized");
        }

        let mut state = CallbackState {
            transport: Transport::new(),
            channels,
            output_channels: stream_config.channels as usize,
        };
        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| state.process(data),
                |err| tracing::error!("Output stream error: {err}"),
                None,
            )
            .context("Failed to build output stream")?;

        stream.play().context("Failed to start output stream")?;
        tracing::info!("Preview output running at {sample_rate}Hz");

        // Dropping the stream would silence it
        self.stream = Some(stream);
        self.sample_rate = Some(sample_rate);
        Ok(())
    }

    /// Pause and release the output stream
    pub fn stop(&mut self) -> Result<()> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };
        stream.pause()?;
        drop(stream);
        tracing::info!("Preview output stopped");
        Ok(())
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::error!("Failed to stop preview output: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tunesphere_comms::{DecodedClip, PlayerCommand, create_channels};

    /// Start an engine, or `None` on machines without a usable device (CI)
    fn started_engine(channels: AudioChannels) -> Option<AudioEngine> {
        if cpal::default_host().default_output_device().is_none() {
            eprintln!("No output device, skipping");
            return None;
        }
        let mut engine = AudioEngine::new(AudioConfig::default());
        match engine.start(channels) {
            Ok(()) => Some(engine),
            Err(e) => {
                eprintln!("Output device unusable, skipping: {e:#}");
                None
            }
        }
    }

    #[test]
    fn test_stop_without_start() {
        let mut engine = AudioEngine::new(AudioConfig::default());
        assert!(engine.stop().is_ok());
        assert_eq!(engine.sample_rate(), None);
    }

    #[test]
    fn test_start_reports_rate() {
        let (mut ui, audio) = create_channels(64);
        let Some(mut engine) = started_engine(audio) else {
            return;
        };

        let rate = engine.sample_rate().unwrap();
        assert_eq!(
            ui.event_rx.pop().ok(),
            Some(PlayerEvent::EngineInitialized { sample_rate: rate })
        );
        assert!(engine.stop().is_ok());
    }

    #[test]
    fn test_load_and_play_events() {
        let (mut ui, audio) = create_channels(256);
        let Some(mut engine) = started_engine(audio) else {
            return;
        };
        let rate = engine.sample_rate().unwrap_or(48000);

        ui.clip_tx
            .send(DecodedClip {
                generation: 1,
                samples: vec![0.0; rate as usize * 2].into_boxed_slice(),
                sample_rate: rate,
            })
            .unwrap();
        ui.command_tx
            .push(PlayerCommand::LoadClip { generation: 1 })
            .unwrap();
        ui.command_tx.push(PlayerCommand::Play).unwrap();

        std::thread::sleep(Duration::from_millis(200));

        let events: Vec<PlayerEvent> = std::iter::from_fn(|| ui.event_rx.pop().ok()).collect();
        assert!(events.contains(&PlayerEvent::ClipLoaded {
            generation: 1,
            frames: u64::from(rate),
        }));
        assert!(events.contains(&PlayerEvent::Started));

        engine.stop().unwrap();
    }
}
