//! The user's saved tracks from the Spotify Web API.
//!
//! Only the API call lives here; getting the bearer token (the OAuth dance)
//! is the caller's business.

use crate::RemoteError;
use std::time::Duration;
use tracing::{error, info};
use tunesphere_core::{TrackRecord, parse_library_json};

pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";

/// How many saved tracks one page asks for
pub const PAGE_LIMIT: u32 = 50;

/// Authenticated client for `/me/tracks`
#[derive(Debug, Clone)]
pub struct SpotifyLibrary {
    client: reqwest::blocking::Client,
    api_base: String,
    access_token: String,
}

impl SpotifyLibrary {
    pub fn new(access_token: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        Self::with_api_base(SPOTIFY_API_BASE, access_token, timeout)
    }

    /// Point at a different API root (tests, proxies)
    pub fn with_api_base(
        api_base: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }

    pub fn saved_tracks_url(&self) -> String {
        format!("{}/me/tracks?limit={PAGE_LIMIT}", self.api_base)
    }

    /// Fetch the first page of liked tracks
    pub fn saved_tracks(&self) -> Result<Vec<TrackRecord>, RemoteError> {
        let response = self
            .client
            .get(self.saved_tracks_url())
            .bearer_auth(&self.access_token)
            .send()?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            error!("Spotify rejected the access token");
            return Err(RemoteError::Unauthorized);
        }
        if !status.is_success() {
            error!("Spotify returned HTTP {status}");
            return Err(RemoteError::Status(status.as_u16()));
        }

        let body = response.text()?;
        let tracks = parse_library_json(&body)?;
        info!("Fetched {} saved tracks", tracks.len());
        Ok(tracks)
    }
}
