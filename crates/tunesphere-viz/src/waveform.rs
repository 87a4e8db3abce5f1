//! Waveform data for the player bar
//!
//! The widget draws one bar per bucket of the decoded clip. Buckets are
//! computed once per clip, when it finishes loading.

use bevy::prelude::*;
use tunesphere_comms::DecodedClip;

/// Number of bars across the widget
pub const BAR_COUNT: usize = 160;

/// Peaks of the loaded clip, ready for drawing
#[derive(Resource, Debug, Clone, Default)]
pub struct WaveformData {
    /// One peak per bar, 0.0-1.0
    peaks: Vec<f32>,
    /// Load generation these peaks belong to
    generation: u64,
}

impl WaveformData {
    pub fn set_clip(&mut self, clip: &DecodedClip) {
        self.peaks = peak_bars(&clip.samples, BAR_COUNT);
        self.generation = clip.generation;
    }

    pub fn clear(&mut self) {
        self.peaks.clear();
        self.generation = 0;
    }

    pub fn is_loaded(&self) -> bool {
        !self.peaks.is_empty()
    }

    pub fn peaks(&self) -> &[f32] {
        &self.peaks
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Peak absolute amplitude of each of `bars` equal slices of a stereo clip
///
/// Slices that end up empty (clips shorter than `bars` frames) are zero.
pub fn peak_bars(stereo: &[f32], bars: usize) -> Vec<f32> {
    let frames = stereo.len() / 2;
    if frames == 0 || bars == 0 {
        return Vec::new();
    }

    (0..bars)
        .map(|bar| {
            let start = bar * frames / bars;
            let end = (bar + 1) * frames / bars;
            stereo[start * 2..end * 2]
                .iter()
                .fold(0.0_f32, |peak, s| peak.max(s.abs()))
                .min(1.0)
        })
        .collect()
}

/// Fraction of the clip for a click at `x` inside a widget starting at
/// `left` that is `width` wide
pub fn seek_fraction(x: f32, left: f32, width: f32) -> f32 {
    if width <= 0.0 {
        return 0.0;
    }
    ((x - left) / width).clamp(0.0, 1.0)
}

/// How many bars are drawn as already played
pub fn played_bars(bars: usize, progress: f32) -> usize {
    ((bars as f32) * progress.clamp(0.0, 1.0)).floor() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_bars() {
        // Four frames, the loudest sample of each pair wins
        let stereo = [0.1, -0.2, 0.5, 0.0, -0.9, 0.3, 0.0, 0.05];
        assert_eq!(peak_bars(&stereo, 2), vec![0.5, 0.9]);
        assert_eq!(peak_bars(&stereo, 4), vec![0.2, 0.5, 0.9, 0.05]);
    }

    #[test]
    fn test_peak_bars_short_clip() {
        let stereo = [0.5, 0.5];
        let bars = peak_bars(&stereo, 4);
        assert_eq!(bars.len(), 4);
        assert_eq!(bars.iter().filter(|&&p| p > 0.0).count(), 1);
        assert!(peak_bars(&[], 4).is_empty());
    }

    #[test]
    fn test_peaks_clamped() {
        assert_eq!(peak_bars(&[3.0, -2.0], 1), vec![1.0]);
    }

    #[test]
    fn test_seek_fraction() {
        assert_eq!(seek_fraction(150.0, 100.0, 200.0), 0.25);
        assert_eq!(seek_fraction(50.0, 100.0, 200.0), 0.0);
        assert_eq!(seek_fraction(400.0, 100.0, 200.0), 1.0);
        assert_eq!(seek_fraction(150.0, 100.0, 0.0), 0.0);
    }

    #[test]
    fn test_played_bars() {
        assert_eq!(played_bars(160, 0.0), 0);
        assert_eq!(played_bars(160, 0.5), 80);
        assert_eq!(played_bars(160, 2.0), 160);
    }

    #[test]
    fn test_set_clip_and_clear() {
        let mut waveform = WaveformData::default();
        waveform.set_clip(&DecodedClip {
            generation: 3,
            samples: vec![0.25; 48000 * 2].into_boxed_slice(),
            sample_rate: 48000,
        });
        assert!(waveform.is_loaded());
        assert_eq!(waveform.peaks().len(), BAR_COUNT);
        assert_eq!(waveform.generation(), 3);

        waveform.clear();
        assert!(!waveform.is_loaded());
    }
}
