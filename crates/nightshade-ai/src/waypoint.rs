//! Pre-placed waypoints used as stalk and search destinations.
//!
//! The graph is a flat list: no edges are stored, closeness is computed on
//! demand by straight-line distance. It is populated once at level load and
//! only read afterwards, so every antagonist can share one instance.

use std::cmp::Ordering;
use std::sync::Arc;

use glam::Vec3;
use nightshade_common::WaypointId;
use serde::{Deserialize, Serialize};

/// A named world position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Stable id
    pub id: WaypointId,
    /// World position
    pub position: Vec3,
}

impl Waypoint {
    /// Creates a new waypoint.
    #[must_use]
    pub const fn new(id: WaypointId, position: Vec3) -> Self {
        Self { id, position }
    }

    /// Straight-line distance to a point.
    #[must_use]
    pub fn distance_to(&self, point: Vec3) -> f32 {
        self.position.distance(point)
    }
}

/// Read-only list of all waypoints in a level.
#[derive(Debug, Clone)]
pub struct WaypointGraph {
    waypoints: Arc<[Waypoint]>,
}

impl Default for WaypointGraph {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl WaypointGraph {
    /// Creates a graph from a list of waypoints.
    #[must_use]
    pub fn new(waypoints: Vec<Waypoint>) -> Self {
        Self {
            waypoints: waypoints.into(),
        }
    }

    /// Creates a graph from positions, assigning sequential ids from 0.
    #[must_use]
    pub fn from_positions(positions: impl IntoIterator<Item = Vec3>) -> Self {
        Self::new(
            positions
                .into_iter()
                .enumerate()
                .map(|(i, position)| Waypoint::new(WaypointId::new(i as u32), position))
                .collect(),
        )
    }

    /// Number of waypoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Returns true if the level has no waypoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// All waypoints in authoring order.
    #[must_use]
    pub fn as_slice(&self) -> &[Waypoint] {
        &self.waypoints
    }

    /// Iterates over all waypoints.
    pub fn iter(&self) -> impl Iterator<Item = &Waypoint> {
        self.waypoints.iter()
    }

    /// Looks up a waypoint by id.
    #[must_use]
    pub fn get(&self, id: WaypointId) -> Option<&Waypoint> {
        self.waypoints.iter().find(|wp| wp.id == id)
    }

    /// The `count` waypoints nearest to `point`, nearest first.
    ///
    /// `exclude` is removed before sorting, so the result still holds
    /// `min(count, len - excluded)` entries. Ties keep authoring order.
    #[must_use]
    pub fn closest_to(
        &self,
        point: Vec3,
        count: usize,
        exclude: Option<WaypointId>,
    ) -> Vec<Waypoint> {
        self.sorted_by_distance(point, count, exclude, |a, b| a.total_cmp(&b))
    }

    /// The `count` waypoints farthest from `point`, farthest first.
    #[must_use]
    pub fn farthest_from(
        &self,
        point: Vec3,
        count: usize,
        exclude: Option<WaypointId>,
    ) -> Vec<Waypoint> {
        self.sorted_by_distance(point, count, exclude, |a, b| b.total_cmp(&a))
    }

    fn sorted_by_distance(
        &self,
        point: Vec3,
        count: usize,
        exclude: Option<WaypointId>,
        order: impl Fn(f32, f32) -> Ordering,
    ) -> Vec<Waypoint> {
        let mut candidates: Vec<(f32, Waypoint)> = self
            .waypoints
            .iter()
            .filter(|wp| Some(wp.id) != exclude)
            .map(|wp| (wp.position.distance_squared(point), *wp))
            .collect();
        candidates.sort_by(|a, b| order(a.0, b.0));
        candidates.truncate(count);
        candidates.into_iter().map(|(_, wp)| wp).collect()
    }
}

impl FromIterator<Waypoint> for WaypointGraph {
    fn from_iter<T: IntoIterator<Item = Waypoint>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
