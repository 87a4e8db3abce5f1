//! Planet building
//!
//! Once per session, the track library is fetched, the batch genre lookup
//! is made, and one planet is generated per track whose preview URL came
//! back annotated. All of that runs on a background thread; the polling
//! system then spawns the meshes, labels and registry entries.

use crate::GalaxySystems;
use crate::config::{PlanetConfig, VizConfig};
use crate::noise::{Perlin3, seed_for};
use crate::registry::{PlanetId, PlanetInfo, SceneRegistry};
use crate::terrain::{PlanetSurface, generate_surface};
use bevy::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tunesphere_core::{
    GenreAnnotation, TrackRecord, annotation_for, genre_color_or_default, load_library_file,
    preview_urls,
};
use tunesphere_remote::{GenreLookup, RemoteError, SpotifyLibrary};

/// Plugin that builds and animates the planets
pub struct PlanetPlugin;

impl Plugin for PlanetPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PlanetBuildTask>()
            .init_resource::<LoadingState>()
            .add_message::<LoadLibrary>()
            .add_systems(Startup, (setup_planet_material, request_startup_library))
            .add_systems(
                Update,
                (start_planet_build, poll_planet_build, animate_scale)
                    .chain()
                    .in_set(GalaxySystems::Build),
            );
    }
}

/// Gap between the planet surface and its label
pub const LABEL_GAP: f32 = 2.0;
/// World-space footprint of a label billboard
pub const LABEL_SIZE: Vec2 = Vec2::new(10.0, 5.0);

/// Whether a planet is currently drawn at emphasis scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleState {
    #[default]
    Baseline,
    Emphasized,
}

/// Metadata carried by every planet entity
#[derive(Component, Debug, Clone)]
pub struct Planet {
    pub id: PlanetId,
    pub info: PlanetInfo,
    /// The child entity holding the track label
    pub label: Entity,
    pub scale_state: ScaleState,
    /// Farthest surface point from the center, at scale 1
    pub bounding_radius: f32,
    /// Label offset above the center, at scale 1
    pub label_height: f32,
}

/// Track name floating above a planet
#[derive(Component, Debug, Clone)]
pub struct PlanetLabel {
    pub owner: PlanetId,
    pub text: String,
}

/// In-progress uniform scale change
#[derive(Component, Debug, Clone)]
pub struct ScaleTween {
    pub from: f32,
    pub to: f32,
    pub elapsed: f32,
    pub duration: f32,
}

impl ScaleTween {
    pub fn new(from: f32, to: f32, duration: f32) -> Self {
        Self {
            from,
            to,
            elapsed: 0.0,
            duration,
        }
    }

    /// Scale after another `dt` seconds, and whether the tween is done
    pub fn advance(&mut self, dt: f32) -> (f32, bool) {
        self.elapsed += dt;
        let t = if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).min(1.0)
        };
        let eased = crate::camera::ease_out(t, 2);
        (self.from + (self.to - self.from) * eased, t >= 1.0)
    }
}

/// Where the track library comes from
#[derive(Debug, Clone)]
pub enum LibrarySource {
    /// Saved-tracks JSON on disk
    File(PathBuf),
    /// Spotify Web API with a bearer token
    Spotify { access_token: String },
    /// Already in memory
    Tracks(Vec<TrackRecord>),
}

/// Request to build the galaxy from a library
#[derive(Debug, Clone)]
pub struct LoadLibrary(pub LibrarySource);

impl Message for LoadLibrary {}

/// Library requested on the command line, sent once at startup
#[derive(Resource, Debug, Default)]
pub struct StartupLibrary(pub Option<LibrarySource>);

/// The genre lookup backend
#[derive(Resource, Clone)]
pub struct GenreService(pub Arc<dyn GenreLookup>);

/// Progress of the one-time planet build
#[derive(Resource, Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadingState {
    /// No library requested yet
    #[default]
    Waiting,
    Loading,
    Ready { planets: usize },
    /// Logged; the scene stays as it was
    Failed(String),
}

/// Errors from the background build
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Library error: {0}")]
    Library(#[from] tunesphere_core::Error),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),
}

/// A track that made it through the annotation match
#[derive(Debug, Clone, PartialEq)]
pub struct PlanetSeed {
    pub info: PlanetInfo,
    /// Center on the XZ plane
    pub position: Vec3,
}

/// A seed with its generated surface
#[derive(Debug, Clone)]
pub struct BuiltPlanet {
    pub seed: PlanetSeed,
    pub surface: PlanetSurface,
}

/// Pair each playable track with its annotation
///
/// Tracks without a preview URL, or whose URL got no annotation, are
/// skipped. Library order is kept.
pub fn match_annotations(
    tracks: &[TrackRecord],
    annotations: &[GenreAnnotation],
) -> Vec<PlanetSeed> {
    tracks
        .iter()
        .filter_map(|track| {
            let url = track.preview_url.as_deref()?;
            let annotation = annotation_for(annotations, url)?;
            Some(PlanetSeed {
                info: PlanetInfo {
                    preview_url: url.to_string(),
                    name: track.name.clone(),
                    artist: track.artist.clone(),
                    genre: annotation.genre.clone(),
                    color: genre_color_or_default(&annotation.genre),
                },
                position: Vec3::new(annotation.x, 0.0, annotation.z),
            })
        })
        .collect()
}

/// Generate surfaces for every seed
///
/// Each planet's noise is seeded from the configured seed and its preview
/// URL, so a rebuild gives identical terrain.
pub fn build_planets(seeds: Vec<PlanetSeed>, config: &PlanetConfig) -> Vec<BuiltPlanet> {
    seeds
        .into_iter()
        .map(|seed| {
            let noise = Perlin3::new(seed_for(config.seed, &seed.info.preview_url));
            let surface = generate_surface(config, &noise, seed.info.color);
            BuiltPlanet { seed, surface }
        })
        .collect()
}

fn fetch_tracks(source: LibrarySource, timeout: Duration) -> Result<Vec<TrackRecord>, BuildError> {
    match source {
        LibrarySource::File(path) => {
            info!("Loading library from {}", path.display());
            Ok(load_library_file(&path)?)
        }
        LibrarySource::Spotify { access_token } => {
            info!("Fetching saved tracks from Spotify");
            Ok(SpotifyLibrary::new(access_token, timeout)?.saved_tracks()?)
        }
        LibrarySource::Tracks(tracks) => Ok(tracks),
    }
}

/// Everything the background thread does
fn run_build(
    source: LibrarySource,
    lookup: &dyn GenreLookup,
    config: &VizConfig,
) -> Result<Vec<BuiltPlanet>, BuildError> {
    let tracks = fetch_tracks(source, config.remote.lookup_timeout())?;
    let urls = preview_urls(&tracks);
    info!(
        "{} of {} tracks have preview clips",
        urls.len(),
        tracks.len()
    );
    if urls.is_empty() {
        warn!("No playable tracks in library");
    }

    info!("Looking up genres via {}", lookup.describe());
    let annotations = lookup.lookup(&urls)?;
    let seeds = match_annotations(&tracks, &annotations);
    info!(
        "{} annotations matched {} tracks",
        annotations.len(),
        seeds.len()
    );

    Ok(build_planets(seeds, &config.planet))
}

/// Resource for tracking the build task
#[derive(Resource, Default)]
struct PlanetBuildTask {
    pending: Option<std::thread::JoinHandle<Result<Vec<BuiltPlanet>, BuildError>>>,
}

/// Material shared by every planet
#[derive(Resource, Debug)]
pub struct PlanetMaterial(pub Handle<StandardMaterial>);

fn setup_planet_material(
    mut commands: Commands,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let emissive = LinearRgba::from(Color::srgb_u8(0x22, 0x22, 0x22)) * 0.5;
    let handle = materials.add(StandardMaterial {
        // Vertex colors carry the terrain; the base color only multiplies
        base_color: Color::WHITE,
        perceptual_roughness: 0.8,
        metallic: 0.2,
        emissive,
        ..default()
    });
    commands.insert_resource(PlanetMaterial(handle));
}

fn request_startup_library(
    mut startup: ResMut<StartupLibrary>,
    mut load: MessageWriter<LoadLibrary>,
) {
    if let Some(source) = startup.0.take() {
        load.write(LoadLibrary(source));
    }
}

/// Start the background build for the first library request
fn start_planet_build(
    mut requests: MessageReader<LoadLibrary>,
    mut task: ResMut<PlanetBuildTask>,
    mut loading: ResMut<LoadingState>,
    registry: Res<SceneRegistry>,
    service: Option<Res<GenreService>>,
    config: Res<VizConfig>,
) {
    for LoadLibrary(source) in requests.read() {
        if task.pending.is_some() || !registry.is_empty() {
            warn!("Galaxy already built or building, ignoring library request");
            continue;
        }
        let Some(service) = service.as_deref() else {
            error!("No genre lookup configured, cannot build planets");
            continue;
        };

        let lookup = Arc::clone(&service.0);
        let source = source.clone();
        let config = config.clone();
        info!("Starting planet build");
        task.pending = Some(std::thread::spawn(move || {
            run_build(source, lookup.as_ref(), &config)
        }));
        *loading = LoadingState::Loading;
    }
}

/// Spawn finished planets
fn poll_planet_build(
    mut commands: Commands,
    mut task: ResMut<PlanetBuildTask>,
    mut loading: ResMut<LoadingState>,
    mut registry: ResMut<SceneRegistry>,
    mut meshes: ResMut<Assets<Mesh>>,
    material: Option<Res<PlanetMaterial>>,
    config: Res<VizConfig>,
) {
    let Some(handle) = task.pending.take() else {
        return;
    };
    if !handle.is_finished() {
        // Put it back if not finished
        task.pending = Some(handle);
        return;
    }

    let built = match handle.join() {
        Ok(Ok(built)) => built,
        Ok(Err(e)) => {
            error!("Failed to build planets: {e}");
            *loading = LoadingState::Failed(e.to_string());
            return;
        }
        Err(_) => {
            error!("Planet build thread panicked");
            *loading = LoadingState::Failed("build thread panicked".to_string());
            return;
        }
    };

    let Some(material) = material else {
        error!("Planet material missing, cannot spawn planets");
        return;
    };

    for planet in built {
        spawn_planet(
            &mut commands,
            &mut registry,
            &mut meshes,
            &material.0,
            planet,
            config.planet.radius,
        );
    }

    info!("Spawned {} planets", registry.len());
    *loading = LoadingState::Ready {
        planets: registry.len(),
    };
}

fn spawn_planet(
    commands: &mut Commands,
    registry: &mut SceneRegistry,
    meshes: &mut Assets<Mesh>,
    material: &Handle<StandardMaterial>,
    planet: BuiltPlanet,
    radius: f32,
) -> PlanetId {
    let BuiltPlanet { seed, surface } = planet;

    let entity = commands
        .spawn((
            Mesh3d(meshes.add(surface.to_mesh())),
            MeshMaterial3d(material.clone()),
            Transform::from_translation(seed.position),
        ))
        .id();
    let id = registry.register(entity, seed.position, seed.info.clone());

    let label_height = radius + LABEL_GAP;
    let label = commands
        .spawn((
            PlanetLabel {
                owner: id,
                text: seed.info.name.clone(),
            },
            Transform::from_xyz(0.0, label_height, 0.0),
            Visibility::default(),
            ChildOf(entity),
        ))
        .id();

    commands.entity(entity).insert(Planet {
        id,
        info: seed.info,
        label,
        scale_state: ScaleState::Baseline,
        bounding_radius: surface.bounding_radius,
        label_height,
    });
    id
}

fn animate_scale(
    mut commands: Commands,
    time: Res<Time>,
    mut query: Query<(Entity, &mut Transform, &mut ScaleTween)>,
) {
    for (entity, mut transform, mut tween) in &mut query {
        let (scale, done) = tween.advance(time.delta_secs());
        transform.scale = Vec3::splat(scale);
        if done {
            commands.entity(entity).remove::<ScaleTween>();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::RunSystemOnce;

    fn track(name: &str, preview_url: Option<&str>) -> TrackRecord {
        TrackRecord {
            id: name.to_lowercase(),
            name: name.to_string(),
            artist: "Artist".to_string(),
            preview_url: preview_url.map(str::to_string),
            raw: serde_json::Value::Null,
        }
    }

    fn annotation(url: &str, genre: &str, x: f32, z: f32) -> GenreAnnotation {
        GenreAnnotation {
            url: url.to_string(),
            genre: genre.to_string(),
            x,
            z,
        }
    }

    struct FixedLookup(Vec<GenreAnnotation>);

    impl GenreLookup for FixedLookup {
        fn lookup(&self, _: &[String]) -> Result<Vec<GenreAnnotation>, RemoteError> {
            Ok(self.0.clone())
        }

        fn describe(&self) -> String {
            "fixed".to_string()
        }
    }

    struct FailingLookup;

    impl GenreLookup for FailingLookup {
        fn lookup(&self, _: &[String]) -> Result<Vec<GenreAnnotation>, RemoteError> {
            Err(RemoteError::Status(500))
        }

        fn describe(&self) -> String {
            "failing".to_string()
        }
    }

    fn small_config() -> VizConfig {
        let mut config = VizConfig::default();
        config.planet.width_segments = 8;
        config.planet.height_segments = 6;
        config
    }

    #[test]
    fn test_only_annotated_tracks_become_planets() {
        let tracks = vec![
            track("Song A", Some("a.mp3")),
            track("Song B", Some("b.mp3")),
        ];
        let annotations = vec![annotation("a.mp3", "rock", 1.0, 2.0)];

        let seeds = match_annotations(&tracks, &annotations);
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].info.name, "Song A");
        assert_eq!(seeds[0].position, Vec3::new(1.0, 0.0, 2.0));
        assert!(seeds.iter().all(|s| s.info.name != "Song B"));
    }

    #[test]
    fn test_tracks_without_preview_skipped() {
        let tracks = vec![track("Silent", None), track("Loud", Some("l.mp3"))];
        let annotations = vec![annotation("l.mp3", "jazz", 0.0, 0.0)];
        let seeds = match_annotations(&tracks, &annotations);
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].info.genre, "jazz");
    }

    #[test]
    fn test_unknown_genre_gets_grey() {
        let tracks = vec![track("Odd", Some("o.mp3"))];
        let annotations = vec![annotation("o.mp3", "polka", 0.0, 0.0)];
        let seeds = match_annotations(&tracks, &annotations);
        assert_eq!(
            seeds[0].info.color.to_hex(),
            tunesphere_core::genre::UNKNOWN_GENRE_COLOR
        );
    }

    #[test]
    fn test_build_is_deterministic() {
        let config = small_config();
        let seeds = match_annotations(
            &[track("Song A", Some("a.mp3"))],
            &[annotation("a.mp3", "pop", 0.0, 0.0)],
        );
        let first = build_planets(seeds.clone(), &config.planet);
        let second = build_planets(seeds, &config.planet);
        assert_eq!(first[0].surface, second[0].surface);
    }

    #[test]
    fn test_run_build_from_memory() {
        let config = small_config();
        let lookup = FixedLookup(vec![annotation("a.mp3", "rock", 3.0, -4.0)]);
        let source = LibrarySource::Tracks(vec![
            track("Song A", Some("a.mp3")),
            track("Song B", Some("b.mp3")),
        ]);

        let built = run_build(source, &lookup, &config).unwrap();
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].seed.position, Vec3::new(3.0, 0.0, -4.0));
    }

    #[test]
    fn test_lookup_failure_builds_nothing() {
        let config = small_config();
        let source = LibrarySource::Tracks(vec![track("Song A", Some("a.mp3"))]);
        assert!(matches!(
            run_build(source, &FailingLookup, &config),
            Err(BuildError::Remote(RemoteError::Status(500)))
        ));
    }

    #[test]
    fn test_scale_tween() {
        let mut tween = ScaleTween::new(1.0, 1.5, 1.5);
        let (mid, done) = tween.advance(0.75);
        assert!(!done);
        assert!(mid > 1.25 && mid < 1.5);
        let (end, done) = tween.advance(1.0);
        assert!(done);
        assert_eq!(end, 1.5);
    }

    #[test]
    fn test_poll_spawns_planets_and_labels() {
        let config = small_config();
        let lookup = FixedLookup(vec![
            annotation("a.mp3", "rock", 0.0, 0.0),
            annotation("b.mp3", "pop", 40.0, 0.0),
        ]);
        let built = run_build(
            LibrarySource::Tracks(vec![
                track("Song A", Some("a.mp3")),
                track("Song B", Some("b.mp3")),
            ]),
            &lookup,
            &config,
        )
        .unwrap();

        let mut world = World::new();
        world.insert_resource(Assets::<Mesh>::default());
        world.insert_resource(PlanetMaterial(Handle::default()));
        world.insert_resource(config);
        world.insert_resource(SceneRegistry::default());
        world.insert_resource(LoadingState::Loading);
        world.insert_resource(PlanetBuildTask {
            pending: Some(std::thread::spawn(move || Ok(built))),
        });

        // Wait for the (already finished) thread to report done
        while world
            .resource::<PlanetBuildTask>()
            .pending
            .as_ref()
            .is_some_and(|h| !h.is_finished())
        {
            std::thread::sleep(Duration::from_millis(5));
        }

        world.run_system_once(poll_planet_build).unwrap();

        assert_eq!(
            *world.resource::<LoadingState>(),
            LoadingState::Ready { planets: 2 }
        );
        assert_eq!(world.resource::<SceneRegistry>().len(), 2);

        let labels: Vec<String> = world
            .query::<&PlanetLabel>()
            .iter(&world)
            .map(|l| l.text.clone())
            .collect();
        assert_eq!(labels.len(), 2);
        assert!(labels.contains(&"Song A".to_string()));

        let planet = world
            .query::<&Planet>()
            .iter(&world)
            .find(|p| p.info.name == "Song B")
            .cloned()
            .unwrap();
        assert_eq!(planet.label_height, 14.0);
        let owner = world.resource::<SceneRegistry>().get(planet.id).unwrap().entity;
        let parent = world.get::<ChildOf>(planet.label).map(ChildOf::parent);
        assert_eq!(parent, Some(owner));
    }
}
