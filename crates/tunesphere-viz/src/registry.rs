//! Scene registry: the indexed set of planets and the currently drawn edges.
//!
//! Systems that need "all planets" or "the current connection set" get it
//! from this resource instead of walking the world. Planets are appended as
//! they are built and never removed, so a [`PlanetId`] stays valid for the
//! whole session.

use bevy::prelude::*;
use tunesphere_core::Rgb;

/// Index of a planet in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlanetId(pub usize);

/// Track metadata a planet carries
#[derive(Debug, Clone, PartialEq)]
pub struct PlanetInfo {
    pub preview_url: String,
    pub name: String,
    pub artist: String,
    pub genre: String,
    /// Genre base color
    pub color: Rgb,
}

impl PlanetInfo {
    /// "name - artist", as shown in the player bar
    pub fn display_title(&self) -> String {
        if self.artist.is_empty() {
            self.name.clone()
        } else {
            format!("{} - {}", self.name, self.artist)
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegisteredPlanet {
    pub entity: Entity,
    /// World position of the planet center
    pub position: Vec3,
    pub info: PlanetInfo,
}

/// One segment of the connection set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: PlanetId,
    pub to: PlanetId,
}

#[derive(Resource, Debug, Default)]
pub struct SceneRegistry {
    planets: Vec<RegisteredPlanet>,
    edges: Vec<Entity>,
}

impl SceneRegistry {
    pub fn register(&mut self, entity: Entity, position: Vec3, info: PlanetInfo) -> PlanetId {
        let id = PlanetId(self.planets.len());
        self.planets.push(RegisteredPlanet {
            entity,
            position,
            info,
        });
        id
    }

    pub fn get(&self, id: PlanetId) -> Option<&RegisteredPlanet> {
        self.planets.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.planets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlanetId, &RegisteredPlanet)> {
        self.planets
            .iter()
            .enumerate()
            .map(|(i, planet)| (PlanetId(i), planet))
    }

    pub fn id_for_entity(&self, entity: Entity) -> Option<PlanetId> {
        self.planets
            .iter()
            .position(|p| p.entity == entity)
            .map(PlanetId)
    }

    /// The `count` planets nearest to `origin`, nearest first
    ///
    /// Never includes `origin` itself. Equal distances keep registration
    /// order. Returns fewer than `count` when the registry is smaller.
    pub fn find_closest(&self, origin: PlanetId, count: usize) -> Vec<PlanetId> {
        let Some(center) = self.get(origin).map(|p| p.position) else {
            return Vec::new();
        };

        let mut candidates: Vec<(f32, PlanetId)> = self
            .iter()
            .filter(|(id, _)| *id != origin)
            .map(|(id, planet)| (planet.position.distance_squared(center), id))
            .collect();

        // Stable sort, so ties stay in registration order
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));
        candidates.into_iter().take(count).map(|(_, id)| id).collect()
    }

    /// Edges to draw for a selection rooted at `origin`
    ///
    /// For each neighbor: origin to neighbor, then neighbor to its own
    /// nearest planet (which may be the origin again).
    pub fn connection_edges(&self, origin: PlanetId, neighbors: &[PlanetId]) -> Vec<Edge> {
        let mut edges = Vec::with_capacity(neighbors.len() * 2);
        for &neighbor in neighbors {
            edges.push(Edge {
                from: origin,
                to: neighbor,
            });
            if let Some(&nearest) = self.find_closest(neighbor, 1).first() {
                edges.push(Edge {
                    from: neighbor,
                    to: nearest,
                });
            }
        }
        edges
    }

    /// Edge entities currently in the scene
    pub fn edges(&self) -> &[Entity] {
        &self.edges
    }

    /// Hand over the drawn edges for despawning, leaving none registered
    pub fn take_edges(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.edges)
    }

    pub fn set_edges(&mut self, edges: Vec<Entity>) {
        self.edges = edges;
    }
}
