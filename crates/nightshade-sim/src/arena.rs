//! Flat square arena implementing the engine ports.
//!
//! The floor is a square at `y = 0` split into two triangles. Walls are
//! boxes: they block straight-line paths, sight lines and raycasts on their
//! layer. There is no path routing around walls, so a destination behind a
//! wall is unreachable.

use glam::Vec3;
use nightshade_ai::{
    NavMeshTriangulation, NavPath, NavigationQuery, Perception, TargetPose, VisibilityQuery,
    WaypointGraph, WorldPorts,
};
use nightshade_common::{Aabb, EntityId, Frustum, LayerMask, Ray};
use tracing::debug;

use crate::config::SimConfig;

/// Distance under which the agent counts as arrived.
const ARRIVAL_TOLERANCE: f32 = 0.05;

/// Height above the floor at which paths are tested against walls.
const STEP_HEIGHT: f32 = 0.25;

/// Navigation agent walking straight lines across the arena.
#[derive(Debug, Clone)]
pub struct ArenaNav {
    position: Vec3,
    forward: Vec3,
    destination: Option<Vec3>,
    speed: f32,
    half_size: f32,
    walls: Vec<Aabb>,
    mesh: NavMeshTriangulation,
}

impl ArenaNav {
    /// Creates an agent at `spawn` on a floor of the given half size.
    #[must_use]
    pub fn new(spawn: Vec3, half_size: f32, speed: f32, walls: Vec<Aabb>) -> Self {
        let h = half_size;
        Self {
            position: spawn,
            forward: Vec3::Z,
            destination: None,
            speed,
            half_size,
            walls,
            mesh: NavMeshTriangulation {
                vertices: vec![
                    Vec3::new(-h, 0.0, -h),
                    Vec3::new(h, 0.0, -h),
                    Vec3::new(h, 0.0, h),
                    Vec3::new(-h, 0.0, h),
                ],
                indices: vec![0, 1, 2, 0, 2, 3],
            },
        }
    }

    /// Current destination, if any.
    #[must_use]
    #[cfg(test)]
    pub const fn destination(&self) -> Option<Vec3> {
        self.destination
    }

    /// Walks towards the destination for `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        let Some(destination) = self.destination else {
            return;
        };
        let delta = destination - self.position;
        let distance = delta.length();
        let travel = self.speed * dt;
        if distance <= travel {
            self.position = destination;
        } else {
            self.forward = delta / distance;
            self.position += self.forward * travel;
        }
    }

    fn in_bounds(&self, point: Vec3) -> bool {
        point.x.abs() <= self.half_size && point.z.abs() <= self.half_size
    }

    fn inside_wall(&self, point: Vec3) -> bool {
        let probe = point + Vec3::Y * STEP_HEIGHT;
        self.walls.iter().any(|wall| wall.contains(probe))
    }

    fn segment_clear(&self, from: Vec3, to: Vec3) -> bool {
        let lift = Vec3::Y * STEP_HEIGHT;
        match Ray::between(from + lift, to + lift) {
            Some((ray, length)) => !self
                .walls
                .iter()
                .any(|wall| wall.ray_hit(&ray, length).is_some()),
            None => true,
        }
    }
}

impl NavigationQuery for ArenaNav {
    fn path_valid(&self, from: Vec3, to: Vec3) -> bool {
        self.in_bounds(to) && !self.inside_wall(to) && self.segment_clear(from, to)
    }

    fn calculate_path(&self, from: Vec3, to: Vec3) -> Option<NavPath> {
        self.path_valid(from, to)
            .then(|| NavPath::complete(vec![from, to]))
    }

    fn set_destination(&mut self, destination: Vec3) {
        if !self.path_valid(self.position, destination) {
            debug!(?destination, "destination unreachable, stopping");
            self.destination = None;
            return;
        }
        self.destination = Some(destination);
        if let Some(direction) = (destination - self.position).try_normalize() {
            self.forward = direction;
        }
    }

    fn teleport(&mut self, position: Vec3) {
        self.position = position;
        self.destination = None;
    }

    fn at_destination(&self) -> bool {
        self.destination
            .map_or(true, |d| d.distance(self.position) <= ARRIVAL_TOLERANCE)
    }

    fn agent_position(&self) -> Vec3 {
        self.position
    }

    fn agent_forward(&self) -> Vec3 {
        self.forward
    }

    fn speed(&self) -> f32 {
        self.speed
    }

    fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    fn sample_position(&self, point: Vec3, max_distance: f32) -> Option<Vec3> {
        let h = self.half_size;
        let snapped = Vec3::new(point.x.clamp(-h, h), 0.0, point.z.clamp(-h, h));
        (snapped.distance(point) <= max_distance && !self.inside_wall(snapped)).then_some(snapped)
    }

    fn triangulation(&self) -> &NavMeshTriangulation {
        &self.mesh
    }
}

/// What the antagonist knows about the target this frame.
#[derive(Debug, Clone, Default)]
pub struct ArenaPerception {
    target: Option<EntityId>,
    pose: Option<TargetPose>,
    sighted: bool,
}

impl ArenaPerception {
    /// Publishes the target's pose, or its absence.
    pub fn update(&mut self, target: Option<(EntityId, TargetPose)>, sighted: bool) {
        self.target = target.map(|(id, _)| id);
        self.pose = target.map(|(_, pose)| pose);
        self.sighted = sighted && self.target.is_some();
    }
}

impl Perception for ArenaPerception {
    fn locate_target(&self) -> Option<EntityId> {
        self.target
    }

    fn target_pose(&self, target: EntityId) -> Option<TargetPose> {
        if self.target == Some(target) {
            self.pose
        } else {
            None
        }
    }

    fn is_target_sighted(&self) -> bool {
        self.sighted
    }
}

/// Arena colliders and the target's camera.
#[derive(Debug, Clone, Default)]
pub struct ArenaVisibility {
    colliders: Vec<(Aabb, LayerMask)>,
    camera: Option<(EntityId, Frustum)>,
}

impl ArenaVisibility {
    /// Replaces the camera of the viewer that has one.
    pub fn set_camera(&mut self, camera: Option<(EntityId, Frustum)>) {
        self.camera = camera;
    }
}

impl VisibilityQuery for ArenaVisibility {
    fn frustum(&self, viewer: EntityId) -> Option<Frustum> {
        self.camera
            .filter(|(id, _)| *id == viewer)
            .map(|(_, frustum)| frustum)
    }

    fn raycast(&self, ray: Ray, max_distance: f32, mask: LayerMask) -> bool {
        self.colliders
            .iter()
            .filter(|(_, layer)| layer.intersects(mask))
            .any(|(bounds, _)| bounds.ray_hit(&ray, max_distance).is_some())
    }
}

/// Every port of the arena, owned in one place.
#[derive(Debug, Clone)]
pub struct ArenaWorld {
    /// Antagonist navigation agent
    pub nav: ArenaNav,
    /// Antagonist perception
    pub perception: ArenaPerception,
    /// Scene visibility
    pub visibility: ArenaVisibility,
    /// Level waypoints
    pub waypoints: WaypointGraph,
}

impl ArenaWorld {
    /// Builds the arena described by `config`.
    #[must_use]
    pub fn from_config(config: &SimConfig) -> Self {
        let colliders: Vec<(Aabb, LayerMask)> = config
            .walls
            .iter()
            .map(|wall| (Aabb::new(wall.center, wall.extents), wall.layer))
            .collect();
        let walls = colliders.iter().map(|(bounds, _)| *bounds).collect();

        Self {
            nav: ArenaNav::new(
                config.spawn,
                config.arena_half_size,
                config.behavior.antagonist.base_speed,
                walls,
            ),
            perception: ArenaPerception::default(),
            visibility: ArenaVisibility {
                colliders,
                camera: None,
            },
            waypoints: WaypointGraph::from_positions(config.waypoints.iter().copied()),
        }
    }

    /// Whether nothing on `mask` lies between two points.
    #[must_use]
    pub fn line_of_sight(&self, from: Vec3, to: Vec3, mask: LayerMask) -> bool {
        Ray::between(from, to)
            .map_or(true, |(ray, length)| !self.visibility.raycast(ray, length, mask))
    }

    /// Lends the ports to the antagonist for one tick.
    pub fn ports(&mut self) -> WorldPorts<'_> {
        WorldPorts {
            nav: &mut self.nav,
            perception: &self.perception,
            visibility: &self.visibility,
            waypoints: &self.waypoints,
        }
    }
}
