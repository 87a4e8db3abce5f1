//! Core types, palettes, and errors shared across the tunesphere crates.
//!
//! This crate provides the data model every other crate depends on: the
//! flattened track records read from a Spotify library, the genre annotations
//! produced by the classifier, and the genre color palette.

pub mod genre;
pub mod track;

pub use genre::{GenreAnnotation, Rgb, annotation_for, genre_color, genre_color_or_default};
pub use track::{TrackRecord, load_library_file, parse_library_json, preview_urls};

/// Common error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Library JSON could not be parsed
    #[error("Library parse error: {0}")]
    Library(#[from] serde_json::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other unclassified error
    #[error("Other error: {0}")]
    Other(String),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;
