//! Single-clip transport run inside the audio callback.
//!
//! # Real-Time Safety
//!
//! `handle_command` and `render` never allocate. Clips arrive pre-decoded and
//! pre-resampled over the clip channel; swapping one in drops the old boxed
//! slice, which is a single free.

use crossbeam_channel::Receiver;
use tunesphere_comms::{DecodedClip, PlayerCommand, PlayerEvent};

/// Playhead over the current clip
#[derive(Debug, Default)]
pub struct Transport {
    clip: Option<DecodedClip>,
    /// Current position in frames
    position: usize,
    playing: bool,
}

/// What a render pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Nothing playing, buffer silenced
    Silent,
    /// Frames were written; playhead now at `frame`
    Played { frame: u64 },
    /// The clip ran out during this buffer
    Finished,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn current_generation(&self) -> Option<u64> {
        self.clip.as_ref().map(|c| c.generation)
    }

    /// Apply one command, returning the event to report (if any)
    pub fn handle_command(
        &mut self,
        command: PlayerCommand,
        clips: &Receiver<DecodedClip>,
    ) -> Option<PlayerEvent> {
        match command {
            PlayerCommand::LoadClip { generation } => {
                // Older clips still queued were superseded before they got here
                while let Ok(clip) = clips.try_recv() {
                    if clip.generation == generation {
                        let frames = clip.frame_count() as u64;
                        self.clip = Some(clip);
                        self.position = 0;
                        self.playing = false;
                        return Some(PlayerEvent::ClipLoaded { generation, frames });
                    }
                }
                None
            }
            PlayerCommand::Play => {
                let clip = self.clip.as_ref()?;
                if self.position >= clip.frame_count() {
                    self.position = 0;
                }
                self.playing = true;
                Some(PlayerEvent::Started)
            }
            PlayerCommand::Pause => {
                self.playing = false;
                Some(PlayerEvent::Paused)
            }
            PlayerCommand::Stop => {
                self.playing = false;
                self.position = 0;
                Some(PlayerEvent::Stopped)
            }
            PlayerCommand::Seek(fraction) => {
                let clip = self.clip.as_ref()?;
                let frames = clip.frame_count();
                self.position = ((fraction.clamp(0.0, 1.0) * frames as f32) as usize).min(frames);
                Some(PlayerEvent::Position {
                    frame: self.position as u64,
                })
            }
        }
    }

    /// Fill an interleaved output buffer with `channels` channels
    ///
    /// The clip is stereo; extra output channels get silence, a mono output
    /// gets the left channel.
    pub fn render(&mut self, data: &mut [f32], channels: usize) -> RenderOutcome {
        let Some(clip) = self.clip.as_ref().filter(|_| self.playing) else {
            data.fill(0.0);
            return RenderOutcome::Silent;
        };
        if channels == 0 {
            return RenderOutcome::Silent;
        }

        let total = clip.frame_count();
        for frame in data.chunks_exact_mut(channels) {
            if self.position >= total {
                frame.fill(0.0);
                continue;
            }
            let left = clip.samples[self.position * 2];
            let right = clip.samples[self.position * 2 + 1];
            for (ch, sample) in frame.iter_mut().enumerate() {
                *sample = match ch {
                    0 => left,
                    1 => right,
                    _ => 0.0,
                };
            }
            self.position += 1;
        }

        if self.position >= total {
            self.playing = false;
            RenderOutcome::Finished
        } else {
            RenderOutcome::Played {
                frame: self.position as u64,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_clip(generation: u64, frames: usize) -> DecodedClip {
        let samples: Vec<f32> = (0..frames)
            .flat_map(|i| [i as f32, -(i as f32)])
            .collect();
        DecodedClip {
            generation,
            samples: samples.into_boxed_slice(),
            sample_rate: 48000,
        }
    }

    fn loaded(frames: usize) -> Transport {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(ramp_clip(1, frames)).unwrap();
        let mut transport = Transport::new();
        transport.handle_command(PlayerCommand::LoadClip { generation: 1 }, &rx);
        transport
    }

    #[test]
    fn test_load_skips_stale_generations() {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(ramp_clip(1, 10)).unwrap();
        tx.send(ramp_clip(2, 20)).unwrap();

        let mut transport = Transport::new();
        let event = transport.handle_command(PlayerCommand::LoadClip { generation: 2 }, &rx);

        assert_eq!(
            event,
            Some(PlayerEvent::ClipLoaded {
                generation: 2,
                frames: 20
            })
        );
        assert_eq!(transport.current_generation(), Some(2));
    }

    #[test]
    fn test_silent_until_play() {
        let (_tx, rx) = crossbeam_channel::unbounded();
        let mut transport = loaded(8);
        let mut out = [1.0; 8];
        assert_eq!(transport.render(&mut out, 2), RenderOutcome::Silent);
        assert!(out.iter().all(|s| *s == 0.0));

        transport.handle_command(PlayerCommand::Play, &rx);
        assert_eq!(transport.render(&mut out, 2), RenderOutcome::Played { frame: 4 });
        assert_eq!(out, [0.0, 0.0, 1.0, -1.0, 2.0, -2.0, 3.0, -3.0]);
    }

    #[test]
    fn test_play_without_clip_is_ignored() {
        let (_tx, rx) = crossbeam_channel::unbounded();
        let mut transport = Transport::new();
        assert!(transport.handle_command(PlayerCommand::Play, &rx).is_none());
        assert!(!transport.is_playing());
    }

    #[test]
    fn test_pause_keeps_position() {
        let (_tx, rx) = crossbeam_channel::unbounded();
        let mut transport = loaded(8);
        transport.handle_command(PlayerCommand::Play, &rx);
        let mut out = [0.0; 4];
        transport.render(&mut out, 2);
        transport.handle_command(PlayerCommand::Pause, &rx);
        assert_eq!(transport.position(), 2);
        transport.handle_command(PlayerCommand::Play, &rx);
        transport.render(&mut out, 2);
        assert_eq!(out, [2.0, -2.0, 3.0, -3.0]);
    }

    #[test]
    fn test_seek_fraction() {
        let (_tx, rx) = crossbeam_channel::unbounded();
        let mut transport = loaded(100);
        let event = transport.handle_command(PlayerCommand::Seek(0.25), &rx);
        assert_eq!(event, Some(PlayerEvent::Position { frame: 25 }));
        transport.handle_command(PlayerCommand::Seek(7.0), &rx);
        assert_eq!(transport.position(), 100);
    }

    #[test]
    fn test_finishes_and_replays_from_start() {
        let (_tx, rx) = crossbeam_channel::unbounded();
        let mut transport = loaded(3);
        transport.handle_command(PlayerCommand::Play, &rx);
        let mut out = [0.0; 8];
        assert_eq!(transport.render(&mut out, 2), RenderOutcome::Finished);
        assert_eq!(&out[6..], &[0.0, 0.0]);
        assert!(!transport.is_playing());

        transport.handle_command(PlayerCommand::Play, &rx);
        assert_eq!(transport.position(), 0);
    }

    #[test]
    fn test_extra_output_channels_are_silent() {
        let (_tx, rx) = crossbeam_channel::unbounded();
        let mut transport = loaded(4);
        transport.handle_command(PlayerCommand::Play, &rx);
        transport.handle_command(PlayerCommand::Seek(0.5), &rx);
        let mut out = [9.0; 4];
        transport.render(&mut out, 4);
        assert_eq!(out, [2.0, -2.0, 0.0, 0.0]);
    }
}
