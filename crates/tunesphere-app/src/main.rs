//! tunesphere - liked tracks as a galaxy of planets
//!
//! Main application entry point.

use anyhow::{Context, Result};
use bevy::app::AppExit;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tunesphere_audio::{AudioConfig, AudioEngine};
use tunesphere_comms::create_channels;
use tunesphere_remote::{GenreLookup, HttpGenreLookup, ProcessGenreLookup};
use tunesphere_viz::config::RemoteConfig;
use tunesphere_viz::{LibrarySource, VizConfig, create_app};

/// Ring buffer capacity for UI <-> audio messages
const CHANNEL_CAPACITY: usize = 1024;

/// Explore your liked tracks as planets
#[derive(Parser, Debug, Default)]
#[command(name = "tunesphere", version, about, long_about = None)]
struct Args {
    /// RON config file (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Saved-tracks JSON to load at startup
    #[arg(long)]
    tracks: Option<PathBuf>,

    /// Genre endpoint URL
    #[arg(long)]
    genre_endpoint: Option<String>,

    /// Run the classifier locally instead of calling the endpoint
    #[arg(long, value_name = "PROGRAM")]
    classifier: Option<String>,

    /// Classifier arguments, passed after `--` so they may start with `-`
    #[arg(last = true, requires = "classifier", value_name = "CLASSIFIER_ARGS")]
    classifier_args: Vec<String>,

    /// Terrain noise seed
    #[arg(long)]
    seed: Option<u64>,

    /// Spotify access token, used when no tracks file is given
    #[arg(long, env = "SPOTIFY_ACCESS_TOKEN", hide_env_values = true)]
    spotify_token: Option<String>,
}

impl Args {
    /// Command line flags win over the config file
    fn apply_overrides(&self, mut config: VizConfig) -> VizConfig {
        if let Some(endpoint) = &self.genre_endpoint {
            config.remote.genre_endpoint.clone_from(endpoint);
        }
        if let Some(command) = self.classifier_command() {
            config.remote.classifier = Some(command);
        }
        if let Some(seed) = self.seed {
            config.planet.seed = seed;
        }
        config
    }

    /// Classifier program followed by its arguments
    fn classifier_command(&self) -> Option<Vec<String>> {
        let program = self.classifier.clone()?;
        Some(
            std::iter::once(program)
                .chain(self.classifier_args.iter().cloned())
                .collect(),
        )
    }

    /// A tracks file takes precedence over the Spotify API
    fn library_source(&self) -> Option<LibrarySource> {
        if let Some(path) = &self.tracks {
            return Some(LibrarySource::File(path.clone()));
        }
        self.spotify_token
            .as_ref()
            .filter(|token| !token.is_empty())
            .map(|token| LibrarySource::Spotify {
                access_token: token.clone(),
            })
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<VizConfig> {
    match path {
        Some(path) => VizConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => Ok(VizConfig::default()),
    }
}

/// Local classifier if one is configured, the HTTP endpoint otherwise
fn genre_lookup(remote: &RemoteConfig) -> Result<Arc<dyn GenreLookup>> {
    if let Some((program, args)) = remote
        .classifier
        .as_deref()
        .and_then(<[String]>::split_first)
    {
        return Ok(Arc::new(ProcessGenreLookup::new(
            program.clone(),
            args.to_vec(),
            remote.lookup_timeout(),
        )));
    }

    let lookup = HttpGenreLookup::new(&remote.genre_endpoint, remote.lookup_timeout())
        .with_context(|| format!("Invalid genre endpoint: {}", remote.genre_endpoint))?;
    Ok(Arc::new(lookup))
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tunesphere=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting tunesphere...");

    let args = Args::parse();
    let config = args.apply_overrides(load_config(args.config.as_ref())?);
    config.validate().context("Invalid configuration")?;

    let genre = genre_lookup(&config.remote)?;
    tracing::info!("Genre lookup: {}", genre.describe());

    let library = args.library_source();
    if library.is_none() {
        tracing::info!("No library given, use File > Open library...");
    }

    // Create communication channels
    let (ui_channels, audio_channels) = create_channels(CHANNEL_CAPACITY);

    // The scene is still usable without an output device
    let mut engine = AudioEngine::new(AudioConfig::default());
    let ui_channels = match engine.start(audio_channels) {
        Ok(()) => {
            tracing::info!("Audio engine started");
            Some(ui_channels)
        }
        Err(e) => {
            tracing::warn!("Audio unavailable, continuing without playback: {e:#}");
            None
        }
    };

    let exit = create_app(ui_channels, config, genre, library).run();

    tracing::info!("tunesphere shutting down");

    // Stop the audio engine
    engine.stop()?;

    if let AppExit::Error(code) = exit {
        anyhow::bail!("App exited with error code {code}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "tunesphere",
            "--genre-endpoint",
            "http://example.com/genre",
            "--seed",
            "42",
        ]);
        let config = args.apply_overrides(VizConfig::default());
        assert_eq!(config.remote.genre_endpoint, "http://example.com/genre");
        assert_eq!(config.planet.seed, 42);
        assert!(config.remote.classifier.is_none());
    }

    #[test]
    fn test_no_flags_keep_config() {
        let mut file_config = VizConfig::default();
        file_config.planet.seed = 9;
        let config = Args::default().apply_overrides(file_config.clone());
        assert_eq!(config.planet.seed, 9);
        assert_eq!(config.remote.genre_endpoint, file_config.remote.genre_endpoint);
    }

    #[test]
    fn test_classifier_takes_program_and_args() {
        let args = Args::parse_from([
            "tunesphere",
            "--classifier",
            "python3",
            "--seed",
            "1",
            "--",
            "classify.py",
            "--top",
            "3",
            "-v",
        ]);
        assert_eq!(args.classifier.as_deref(), Some("python3"));
        assert_eq!(args.seed, Some(1));

        let config = args.apply_overrides(VizConfig::default());
        assert_eq!(
            config.remote.classifier,
            Some(
                ["python3", "classify.py", "--top", "3", "-v"]
                    .map(String::from)
                    .to_vec()
            )
        );
    }

    #[test]
    fn test_classifier_without_args() {
        let args = Args::parse_from(["tunesphere", "--classifier", "./classify"]);
        assert_eq!(args.classifier_command(), Some(vec!["./classify".to_string()]));
        assert!(Args::default().classifier_command().is_none());
    }

    #[test]
    fn test_classifier_args_need_classifier() {
        assert!(Args::try_parse_from(["tunesphere", "--", "classify.py"]).is_err());
    }

    #[test]
    fn test_tracks_file_wins_over_token() {
        let args = Args {
            tracks: Some(PathBuf::from("liked.json")),
            spotify_token: Some("token".to_string()),
            ..Args::default()
        };
        assert!(matches!(args.library_source(), Some(LibrarySource::File(_))));

        let args = Args {
            spotify_token: Some("token".to_string()),
            ..Args::default()
        };
        assert!(matches!(
            args.library_source(),
            Some(LibrarySource::Spotify { .. })
        ));

        let args = Args {
            spotify_token: Some(String::new()),
            ..Args::default()
        };
        assert!(args.library_source().is_none());
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tunesphere.ron");
        let mut config = VizConfig::default();
        config.proximity.neighbor_count = 3;
        config.save(&path).unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.proximity.neighbor_count, 3);
        assert!(load_config(Some(&dir.path().join("missing.ron"))).is_err());
        assert_eq!(load_config(None).unwrap().planet.seed, 0);
    }

    #[test]
    fn test_genre_lookup_selection() {
        let mut remote = RemoteConfig::default();
        assert!(genre_lookup(&remote).unwrap().describe().contains("localhost"));

        remote.classifier = Some(vec!["python3".to_string(), "classify.py".to_string()]);
        assert!(genre_lookup(&remote).unwrap().describe().contains("python3"));

        remote.classifier = None;
        remote.genre_endpoint = "not a url".to_string();
        assert!(genre_lookup(&remote).is_err());
    }
}
