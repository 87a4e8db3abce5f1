//! Genre annotations and the genre color palette.

use serde::{Deserialize, Serialize};

/// Classifier output for one preview URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreAnnotation {
    /// Preview URL this annotation belongs to
    pub url: String,
    /// Predicted genre label
    pub genre: String,
    /// Layout X coordinate
    pub x: f32,
    /// Layout Z coordinate
    pub z: f32,
}

/// Find the annotation for a preview URL (exact match)
pub fn annotation_for<'a>(
    annotations: &'a [GenreAnnotation],
    url: &str,
) -> Option<&'a GenreAnnotation> {
    annotations.iter().find(|a| a.url == url)
}

/// sRGB color triple in 0.0-1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    /// Build from a `0xRRGGBB` value
    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as f32 / 255.0,
            g: ((hex >> 8) & 0xff) as f32 / 255.0,
            b: (hex & 0xff) as f32 / 255.0,
        }
    }

    /// Back to `0xRRGGBB`
    pub fn to_hex(self) -> u32 {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
        (channel(self.r) << 16) | (channel(self.g) << 8) | channel(self.b)
    }

    /// Move `t` of the way toward `other`
    pub fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
        }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

/// Genre labels the classifier emits, with their planet base colors
pub const GENRE_PALETTE: &[(&str, u32)] = &[
    ("rock", 0xff4500),
    ("pop", 0x00ff00),
    ("classical", 0xffff00),
    ("hiphop", 0x00ffff),
    ("country", 0xff00ff),
    ("latin", 0xffd700),
    ("edm_dance", 0x8a2be2),
    ("jazz", 0x00ff7f),
];

/// Base color for labels outside the palette
pub const UNKNOWN_GENRE_COLOR: u32 = 0x808080;

/// Base color for a genre label, if it is one we know
pub fn genre_color(genre: &str) -> Option<Rgb> {
    GENRE_PALETTE
        .iter()
        .find(|(label, _)| *label == genre)
        .map(|(_, hex)| Rgb::from_hex(*hex))
}

/// Base color for a genre label, grey for unknown labels
pub fn genre_color_or_default(genre: &str) -> Rgb {
    genre_color(genre).unwrap_or_else(|| Rgb::from_hex(UNKNOWN_GENRE_COLOR))
}
