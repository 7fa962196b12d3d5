//! In-memory implementations of the engine ports.
//!
//! Used by the unit and integration tests and handy for headless tools. The
//! world is a flat floor at `y = 0`; paths are straight lines that are
//! invalid when either endpoint lies inside a blocked region.

use ahash::AHashMap;
use glam::Vec3;
use nightshade_common::{Aabb, EntityId, Frustum, LayerMask, Ray};

use crate::antagonist::WorldPorts;
use crate::context::{AgentBody, BehaviorContext};
use crate::events::NotificationBus;
use crate::ports::{
    NavMeshTriangulation, NavPath, NavigationQuery, Perception, TargetPose, VisibilityQuery,
};
use crate::waypoint::WaypointGraph;

/// Distance under which the mock agent counts as arrived.
const ARRIVAL_TOLERANCE: f32 = 0.05;

/// Navigation agent moving in straight lines over a flat floor.
#[derive(Debug, Clone)]
pub struct MockNavigation {
    /// Agent position
    pub position: Vec3,
    /// Agent heading
    pub forward: Vec3,
    /// Active destination
    pub destination: Option<Vec3>,
    /// Movement speed
    pub speed: f32,
    /// Arrive immediately on `set_destination` instead of walking in `step`
    pub instant: bool,
    /// Regions no path may start or end in
    pub blocked: Vec<Aabb>,
    /// Every destination ever issued, in order
    pub destinations: Vec<Vec3>,
    /// Every teleport target, in order
    pub teleports: Vec<Vec3>,
    /// Walkable surface
    pub mesh: NavMeshTriangulation,
}

impl Default for MockNavigation {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            forward: Vec3::Z,
            destination: None,
            speed: 3.5,
            instant: true,
            blocked: Vec::new(),
            destinations: Vec::new(),
            teleports: Vec::new(),
            mesh: NavMeshTriangulation::default(),
        }
    }
}

impl MockNavigation {
    /// Creates an agent at the origin facing +Z.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a region as unreachable.
    pub fn block_region(&mut self, region: Aabb) {
        self.blocked.push(region);
    }

    /// Removes all blocked regions.
    pub fn clear_blocked(&mut self) {
        self.blocked.clear();
    }

    /// Replaces the walkable surface.
    pub fn set_triangulation(&mut self, vertices: Vec<Vec3>, indices: Vec<u32>) {
        self.mesh = NavMeshTriangulation { vertices, indices };
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

    fn is_blocked(&self, point: Vec3) -> bool {
        self.blocked.iter().any(|region| region.contains(point))
    }
}

impl NavigationQuery for MockNavigation {
    fn path_valid(&self, from: Vec3, to: Vec3) -> bool {
        !self.is_blocked(from) && !self.is_blocked(to)
    }

    fn calculate_path(&self, from: Vec3, to: Vec3) -> Option<NavPath> {
        self.path_valid(from, to)
            .then(|| NavPath::complete(vec![from, to]))
    }

    fn set_destination(&mut self, destination: Vec3) {
        self.destinations.push(destination);
        self.destination = Some(destination);
        if let Some(direction) = (destination - self.position).try_normalize() {
            self.forward = direction;
        }
        if self.instant {
            self.position = destination;
        }
    }

    fn teleport(&mut self, position: Vec3) {
        self.teleports.push(position);
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
        (point.y.abs() <= max_distance).then(|| Vec3::new(point.x, 0.0, point.z))
    }

    fn triangulation(&self) -> &NavMeshTriangulation {
        &self.mesh
    }
}

/// Perception with a single scripted target.
#[derive(Debug, Clone, Default)]
pub struct MockPerception {
    /// Target returned by `locate_target`
    pub target: Option<EntityId>,
    /// Pose of the target
    pub pose: Option<TargetPose>,
    /// Whether the target is currently sighted
    pub sighted: bool,
}

impl MockPerception {
    /// Creates perception with no target.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a target with a pose.
    pub fn set_target(&mut self, target: EntityId, pose: TargetPose) {
        self.target = Some(target);
        self.pose = Some(pose);
    }

    /// Removes the target, as if it had been destroyed.
    pub fn clear_target(&mut self) {
        self.target = None;
        self.pose = None;
        self.sighted = false;
    }

    /// Moves the target, keeping its eye height and look direction.
    pub fn move_target(&mut self, position: Vec3) {
        if let Some(pose) = &mut self.pose {
            let eye = pose.viewpoint - pose.position;
            pose.move_direction = (position - pose.position).normalize_or_zero();
            pose.position = position;
            pose.viewpoint = position + eye;
        }
    }
}

impl Perception for MockPerception {
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
        self.target.is_some() && self.sighted
    }
}

/// Box colliders and fixed per-viewer frustums.
#[derive(Debug, Clone, Default)]
pub struct MockVisibility {
    /// Colliders with their layers
    pub colliders: Vec<(Aabb, LayerMask)>,
    /// Frustum of each viewer with a camera
    pub frustums: AHashMap<EntityId, Frustum>,
}

impl MockVisibility {
    /// Creates an empty scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a box collider on `layer`.
    pub fn add_collider(&mut self, bounds: Aabb, layer: LayerMask) {
        self.colliders.push((bounds, layer));
    }

    /// Gives `viewer` a camera.
    pub fn set_frustum(&mut self, viewer: EntityId, frustum: Frustum) {
        self.frustums.insert(viewer, frustum);
    }
}

impl VisibilityQuery for MockVisibility {
    fn frustum(&self, viewer: EntityId) -> Option<Frustum> {
        self.frustums.get(&viewer).copied()
    }

    fn raycast(&self, ray: Ray, max_distance: f32, mask: LayerMask) -> bool {
        self.colliders
            .iter()
            .filter(|(_, layer)| layer.intersects(mask))
            .any(|(bounds, _)| bounds.ray_hit(&ray, max_distance).is_some())
    }
}

/// Owns one antagonist's worth of ports and hands out contexts.
#[derive(Debug)]
pub struct TestWorld {
    /// Antagonist id
    pub entity: EntityId,
    /// Antagonist body
    pub body: AgentBody,
    /// Navigation port
    pub nav: MockNavigation,
    /// Perception port
    pub perception: MockPerception,
    /// Visibility port
    pub visibility: MockVisibility,
    /// Level waypoints
    pub waypoints: WaypointGraph,
    /// Notification bus
    pub bus: NotificationBus,
    /// Seeded random source
    pub rng: fastrand::Rng,
}

impl TestWorld {
    /// Eye height of spawned targets.
    pub const TARGET_EYE_HEIGHT: f32 = 1.7;

    /// Creates an empty world with a fixed seed.
    #[must_use]
    pub fn new() -> Self {
        Self::with_seed(7)
    }

    /// Creates an empty world with the given seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            entity: EntityId::new(),
            body: AgentBody::default(),
            nav: MockNavigation::new(),
            perception: MockPerception::new(),
            visibility: MockVisibility::new(),
            waypoints: WaypointGraph::default(),
            bus: NotificationBus::new(),
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// Spawns the target at `position`, looking along -Z.
    pub fn spawn_target(&mut self, position: Vec3) -> EntityId {
        let target = EntityId::new();
        self.perception.set_target(
            target,
            TargetPose::standing(position, Self::TARGET_EYE_HEIGHT, Vec3::NEG_Z),
        );
        target
    }

    /// Lends the ports to an [`Antagonist`](crate::antagonist::Antagonist),
    /// which brings its own body, random source and bus.
    pub fn ports(&mut self) -> WorldPorts<'_> {
        WorldPorts {
            nav: &mut self.nav,
            perception: &self.perception,
            visibility: &self.visibility,
            waypoints: &self.waypoints,
        }
    }

    /// Borrows everything as a behavior context.
    pub fn context(&mut self, dt: f32) -> BehaviorContext<'_> {
        BehaviorContext {
            entity: self.entity,
            dt,
            body: &mut self.body,
            nav: &mut self.nav,
            perception: &self.perception,
            visibility: &self.visibility,
            waypoints: &self.waypoints,
            events: &self.bus,
            rng: &mut self.rng,
        }
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}
