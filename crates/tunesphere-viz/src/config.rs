//! Visualizer configuration
//!
//! Stored as RON. Every field has a default, so a config file only needs the
//! values it changes:
//!
//! ```ron
//! (
//!     planet: (seed: 7),
//!     remote: (genre_endpoint: Some("http://localhost:3000/getGenre")),
//! )
//! ```

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Newest config layout this build understands
pub const CONFIG_VERSION: u32 = 1;

/// Top-level configuration
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VizConfig {
    pub version: u32,
    pub planet: PlanetConfig,
    pub proximity: ProximityConfig,
    pub selection: SelectionConfig,
    pub remote: RemoteConfig,
}

impl Default for VizConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            planet: PlanetConfig::default(),
            proximity: ProximityConfig::default(),
            selection: SelectionConfig::default(),
            remote: RemoteConfig::default(),
        }
    }
}

/// Planet geometry and terrain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanetConfig {
    /// Undisplaced sphere radius in world units
    pub radius: f32,
    pub width_segments: u32,
    pub height_segments: u32,
    /// Noise frequency on X and Z
    pub noise_scale: f32,
    /// Y frequency relative to `noise_scale`
    pub vertical_noise_factor: f32,
    /// Largest displacement as a fraction of the radius
    pub displacement_scale: f32,
    /// Displacements below this are sea
    pub sea_level: f32,
    /// Base noise seed; each planet mixes in its preview URL
    pub seed: u64,
}

impl Default for PlanetConfig {
    fn default() -> Self {
        Self {
            radius: 12.0,
            width_segments: 200,
            height_segments: 200,
            noise_scale: 0.2,
            vertical_noise_factor: 0.5,
            displacement_scale: 0.15,
            sea_level: 0.02,
            seed: 0,
        }
    }
}

/// Proximity graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityConfig {
    /// Neighbors connected to the selected planet
    pub neighbor_count: usize,
    /// Edge flash phase advance per second
    pub flash_rate: f32,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            neighbor_count: 5,
            flash_rate: 0.6,
        }
    }
}

/// Selection animation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Scale of the playing planet
    pub emphasis_scale: f32,
    /// Length of the scale tween
    pub scale_secs: f32,
    /// Length of the camera flight
    pub camera_secs: f32,
    /// Camera X/Z distance from the selected planet
    pub camera_offset: f32,
    /// Camera height above the selected planet
    pub camera_height: f32,
    /// Idle orbit speed around the origin, radians per second
    pub auto_orbit_speed: f32,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            emphasis_scale: 1.5,
            scale_secs: 1.5,
            camera_secs: 1.5,
            camera_offset: 50.0,
            camera_height: 75.0,
            auto_orbit_speed: 0.006,
        }
    }
}

/// External services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// HTTP genre endpoint, used unless a classifier command is set
    pub genre_endpoint: String,
    /// Run this command instead of calling the endpoint
    /// (program followed by its leading arguments)
    pub classifier: Option<Vec<String>>,
    /// Bound on one whole genre batch
    pub lookup_timeout_secs: u64,
    /// Bound on fetching one preview clip
    pub preview_timeout_secs: u64,
}

impl RemoteConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    pub fn preview_timeout(&self) -> Duration {
        Duration::from_secs(self.preview_timeout_secs)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            genre_endpoint: "http://localhost:3000/getGenre".to_string(),
            classifier: None,
            lookup_timeout_secs: tunesphere_remote::DEFAULT_LOOKUP_TIMEOUT.as_secs(),
            preview_timeout_secs: 20,
        }
    }
}

impl VizConfig {
    /// Save to a RON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::SerializationFailed(e.to_string()))?;

        std::fs::write(path.as_ref(), ron_string)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Load from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let ron_string = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: Self = ron::from_str(&ron_string)
            .map_err(|e| ConfigError::DeserializationFailed(e.to_string()))?;

        if config.version > CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(config.version));
        }
        config.validate()?;

        Ok(config)
    }

    /// Reject values the planet builder or proximity graph cannot use
    pub fn validate(&self) -> Result<(), ConfigError> {
        let planet = &self.planet;
        if planet.width_segments < 3 || planet.height_segments < 2 {
            return Err(ConfigError::InvalidValue(format!(
                "sphere needs at least 3x2 segments, got {}x{}",
                planet.width_segments, planet.height_segments
            )));
        }
        if planet.radius <= 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "planet radius must be positive, got {}",
                planet.radius
            )));
        }
        if self.selection.emphasis_scale <= 0.0 {
            return Err(ConfigError::InvalidValue(
                "emphasis scale must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Errors from reading or writing the config file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),

    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_planet() {
        let config = VizConfig::default();
        assert_eq!(config.planet.radius, 12.0);
        assert_eq!(config.planet.width_segments, 200);
        assert_eq!(config.planet.sea_level, 0.02);
        assert_eq!(config.proximity.neighbor_count, 5);
        assert_eq!(config.selection.emphasis_scale, 1.5);
        assert_eq!(config.remote.lookup_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tunesphere.ron");

        let mut config = VizConfig::default();
        config.planet.seed = 42;
        config.remote.classifier = Some(vec!["python3".to_string(), "predict.py".to_string()]);
        config.save(&path).unwrap();

        let loaded = VizConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.ron");
        std::fs::write(&path, "(planet: (seed: 7), proximity: (neighbor_count: 3))").unwrap();

        let loaded = VizConfig::load(&path).unwrap();
        assert_eq!(loaded.planet.seed, 7);
        assert_eq!(loaded.planet.radius, 12.0);
        assert_eq!(loaded.proximity.neighbor_count, 3);
        assert_eq!(loaded.selection, SelectionConfig::default());
    }

    #[test]
    fn test_future_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.ron");
        std::fs::write(&path, "(version: 99)").unwrap();

        assert!(matches!(
            VizConfig::load(&path),
            Err(ConfigError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_degenerate_sphere_rejected() {
        let mut config = VizConfig::default();
        config.planet.width_segments = 2;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            VizConfig::load("/nonexistent/tunesphere.ron"),
            Err(ConfigError::IoError(_))
        ));
    }
}
