//! Everything tunesphere fetches from outside the process.
//!
//! - [`GenreLookup`]: one batched request per session, mapping preview URLs to
//!   genre annotations. Backed either by an HTTP endpoint or by running the
//!   classifier script directly.
//! - [`SpotifyLibrary`]: the user's saved tracks, given a bearer token.

use std::time::Duration;
use tunesphere_core::GenreAnnotation;

pub mod classifier;
pub mod http;
pub mod library;

pub use classifier::ProcessGenreLookup;
pub use http::HttpGenreLookup;
pub use library::SpotifyLibrary;

/// Default bound on a whole genre batch
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors from remote lookups
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error {0}")]
    Status(u16),

    #[error("Invalid or expired access token")]
    Unauthorized,

    #[error("Invalid endpoint URL: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("Malformed response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Failed to run classifier: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Classifier timed out after {0:?}")]
    Timeout(Duration),

    #[error("Classifier exited with {status}: {stderr}")]
    ClassifierFailed { status: String, stderr: String },

    #[error("Library error: {0}")]
    Library(#[from] tunesphere_core::Error),
}

/// Batched genre prediction for a set of preview URLs
///
/// Implementations make exactly one round trip per call. URLs the classifier
/// could not annotate are simply absent from the result.
pub trait GenreLookup: Send + Sync {
    fn lookup(&self, preview_urls: &[String]) -> Result<Vec<GenreAnnotation>, RemoteError>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Parse a classifier response body
///
/// An empty or whitespace-only body means "no annotations".
pub fn parse_annotations(body: &str) -> Result<Vec<GenreAnnotation>, RemoteError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_annotations() {
        let body = r#"[{"url":"a.mp3","genre":"rock","x":1.5,"z":-3}]"#;
        let annotations = parse_annotations(body).unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].genre, "rock");
    }

    #[test]
    fn test_empty_body_is_no_annotations() {
        assert!(parse_annotations("  \n").unwrap().is_empty());
    }

    #[test]
    fn test_garbage_body_is_malformed() {
        assert!(matches!(
            parse_annotations("Traceback (most recent call last)"),
            Err(RemoteError::Malformed(_))
        ));
    }
}
