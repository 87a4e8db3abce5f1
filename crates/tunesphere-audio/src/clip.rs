//! Preview clip loading: fetch, decode, convert to stereo, resample.
//!
//! Runs on a background thread; nothing here is real-time safe.

use dasp::interpolate::linear::Linear;
use dasp::{Signal, signal};
use std::io::Cursor;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};
use tunesphere_comms::DecodedClip;

/// Preview clips are 30 s MP3s; anything past this is not a preview
const MAX_CLIP_BYTES: usize = 20 * 1024 * 1024;

/// Errors from fetching or decoding a clip
#[derive(Debug, thiserror::Error)]
pub enum ClipError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Fetch returned HTTP {0}")]
    Status(u16),

    #[error("Clip too large: {0} bytes")]
    TooLarge(usize),

    #[error("Decode failed: {0}")]
    Decode(#[from] SymphoniaError),

    #[error("No decodable audio track")]
    NoTrack,

    #[error("Clip decoded to zero samples")]
    Empty,
}

/// Audio decoded at its native rate, before conversion
#[derive(Debug, Clone, PartialEq)]
pub struct RawAudio {
    /// Interleaved samples with `channels` channels
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

/// Fetches preview clips and prepares them for a given output rate
#[derive(Debug, Clone)]
pub struct ClipLoader {
    client: reqwest::blocking::Client,
    target_rate: u32,
}

impl ClipLoader {
    /// Create a loader that resamples to `target_rate`
    pub fn new(target_rate: u32, timeout: Duration) -> Result<Self, ClipError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            target_rate,
        })
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Fetch a preview URL and decode it into a playable clip
    pub fn load(&self, url: &str, generation: u64) -> Result<DecodedClip, ClipError> {
        debug!("Fetching preview clip {url}");
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            return Err(ClipError::Status(response.status().as_u16()));
        }
        let bytes = response.bytes()?;
        if bytes.len() > MAX_CLIP_BYTES {
            return Err(ClipError::TooLarge(bytes.len()));
        }
        let raw = decode_bytes(bytes.to_vec(), extension_hint(url))?;
        Ok(prepare_clip(&raw, self.target_rate, generation))
    }
}

/// File extension of a URL path, ignoring any query string
fn extension_hint(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    (!ext.is_empty()).then_some(ext)
}

/// Decode an in-memory audio file
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<RawAudio, ClipError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;
    let track = format.default_track().ok_or(ClipError::NoTrack)?;
    let track_id = track.id;
    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track.codec_params.channels.map_or(0, |c| c.count());

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count();
                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            // Corrupt frames are skipped, the rest of the clip still plays
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet: {e}");
            }
            Err(SymphoniaError::IoError(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }

    if samples.is_empty() || channels == 0 || sample_rate == 0 {
        return Err(ClipError::Empty);
    }

    Ok(RawAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// Convert to interleaved stereo
pub fn to_stereo(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.iter().flat_map(|s| [*s, *s]).collect(),
        2 => samples.to_vec(),
        _ => samples
            .chunks_exact(channels)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}

/// Linearly resample interleaved stereo between rates
pub fn resample_stereo(samples: &[f32], from_hz: u32, to_hz: u32) -> Vec<f32> {
    let frames = samples.len() / 2;
    if from_hz == to_hz || from_hz == 0 || to_hz == 0 || frames < 2 {
        return samples.to_vec();
    }

    let out_frames =
        (frames as f64 * f64::from(to_hz) / f64::from(from_hz)).round() as usize;

    let mut source =
        signal::from_interleaved_samples_iter::<_, [f32; 2]>(samples.iter().copied());
    let first = source.next();
    let second = source.next();
    let interpolator = Linear::new(first, second);

    source
        .from_hz_to_hz(interpolator, f64::from(from_hz), f64::from(to_hz))
        .take(out_frames)
        .flat_map(|[left, right]| [left, right])
        .collect()
}

/// Turn decoded audio into a clip for the engine
pub fn prepare_clip(raw: &RawAudio, target_rate: u32, generation: u64) -> DecodedClip {
    let stereo = to_stereo(&raw.samples, raw.channels);
    let samples = resample_stereo(&stereo, raw.sample_rate, target_rate);
    DecodedClip {
        generation,
        samples: samples.into_boxed_slice(),
        sample_rate: target_rate,
    }
}
