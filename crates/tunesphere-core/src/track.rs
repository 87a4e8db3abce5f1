//! Track records in the shape the Spotify saved-tracks API returns them.

use serde::Deserialize;
use std::path::Path;

/// Artist entry inside a Spotify track object
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyArtist {
    pub name: String,
}

/// The subset of a Spotify track object we read
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTrack {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
}

/// One entry of `/me/tracks`
#[derive(Debug, Clone, Deserialize)]
pub struct SavedTrackItem {
    pub track: SpotifyTrack,
}

/// A page of `/me/tracks`
#[derive(Debug, Clone, Deserialize)]
pub struct SavedTracksPage {
    pub items: Vec<serde_json::Value>,
}

/// Flattened, immutable view of a liked track
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRecord {
    /// Spotify track ID (empty if the source omitted it)
    pub id: String,
    pub name: String,
    /// First listed artist, empty if none
    pub artist: String,
    /// Preview clip URL; tracks without one are never visualized
    pub preview_url: Option<String>,
    /// The untouched source item
    pub raw: serde_json::Value,
}

impl TrackRecord {
    /// Flatten a raw saved-track item
    pub fn from_item(raw: serde_json::Value) -> crate::Result<Self> {
        let item: SavedTrackItem = serde_json::from_value(raw.clone())?;
        let track = item.track;
        Ok(Self {
            id: track.id.unwrap_or_default(),
            name: track.name,
            artist: track
                .artists
                .into_iter()
                .next()
                .map(|a| a.name)
                .unwrap_or_default(),
            preview_url: track.preview_url.filter(|url| !url.is_empty()),
            raw,
        })
    }

    /// Whether this track can become a planet
    pub fn is_playable(&self) -> bool {
        self.preview_url.is_some()
    }
}

/// Parse a library document
///
/// Accepts either a full `/me/tracks` page (`{ "items": [...] }`) or a bare
/// array of saved-track items.
pub fn parse_library_json(json: &str) -> crate::Result<Vec<TrackRecord>> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let items = match value {
        serde_json::Value::Array(items) => items,
        other => serde_json::from_value::<SavedTracksPage>(other)?.items,
    };
    items.into_iter().map(TrackRecord::from_item).collect()
}

/// Read and parse a library file from disk
pub fn load_library_file(path: &Path) -> crate::Result<Vec<TrackRecord>> {
    let json = std::fs::read_to_string(path)?;
    parse_library_json(&json)
}

/// Preview URLs of every playable track, in library order
pub fn preview_urls(tracks: &[TrackRecord]) -> Vec<String> {
    tracks
        .iter()
        .filter_map(|t| t.preview_url.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{
        "items": [
            {"track": {"id": "1", "name": "Song A", "preview_url": "a.mp3",
                       "artists": [{"name": "Artist A"}, {"name": "Feat"}]}},
            {"track": {"id": "2", "name": "Song B", "preview_url": null,
                       "artists": [{"name": "Artist B"}]}}
        ]
    }"#;

    #[test]
    fn test_parse_page() {
        let tracks = parse_library_json(PAGE).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].artist, "Artist A");
        assert_eq!(tracks[0].preview_url.as_deref(), Some("a.mp3"));
        assert!(!tracks[1].is_playable());
        assert_eq!(tracks[0].raw["track"]["id"], "1");
    }

    #[test]
    fn test_parse_bare_array() {
        let json = r#"[{"track": {"name": "Solo", "preview_url": "s.mp3"}}]"#;
        let tracks = parse_library_json(json).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].artist, "");
        assert_eq!(tracks[0].id, "");
    }

    #[test]
    fn test_empty_preview_url_is_not_playable() {
        let json = r#"[{"track": {"name": "Blank", "preview_url": ""}}]"#;
        let tracks = parse_library_json(json).unwrap();
        assert!(!tracks[0].is_playable());
    }

    #[test]
    fn test_preview_urls_skip_missing() {
        let tracks = parse_library_json(PAGE).unwrap();
        assert_eq!(preview_urls(&tracks), vec!["a.mp3".to_string()]);
    }

    #[test]
    fn test_malformed_item_is_an_error() {
        let json = r#"[{"not_a_track": {}}]"#;
        assert!(parse_library_json(json).is_err());
    }
}
