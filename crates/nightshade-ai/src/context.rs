//! Per-tick context handed to behaviors.

use glam::Vec3;
use nightshade_common::{Aabb, EntityId};

use crate::events::{NotificationBus, NotificationKind};
use crate::ports::{NavigationQuery, Perception, VisibilityQuery};
use crate::waypoint::WaypointGraph;

/// Physical properties of the antagonist that behaviors modify and restore.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentBody {
    /// Speed restored when a behavior ends
    pub base_speed: f32,
    /// Animation rate restored when a behavior ends
    pub base_animation_rate: f32,
    /// Current animation rate, read by presentation
    pub animation_rate: f32,
    /// Half extents of the body's bounding box (center sits `extents.y` above the feet)
    pub half_extents: Vec3,
}

impl AgentBody {
    /// Creates a body at its base rates.
    #[must_use]
    pub fn new(base_speed: f32, base_animation_rate: f32, half_extents: Vec3) -> Self {
        Self {
            base_speed,
            base_animation_rate,
            animation_rate: base_animation_rate,
            half_extents,
        }
    }
}

impl Default for AgentBody {
    fn default() -> Self {
        Self::new(3.5, 1.0, Vec3::new(0.4, 1.0, 0.4))
    }
}

/// Everything a behavior may read or drive during one tick.
pub struct BehaviorContext<'a> {
    /// Antagonist running the behavior
    pub entity: EntityId,
    /// Seconds since the previous tick of the same kind
    pub dt: f32,
    /// Antagonist body
    pub body: &'a mut AgentBody,
    /// Navigation agent and path queries
    pub nav: &'a mut dyn NavigationQuery,
    /// Target lookup and sight
    pub perception: &'a dyn Perception,
    /// Frustum and raycast queries
    pub visibility: &'a dyn VisibilityQuery,
    /// Level waypoints
    pub waypoints: &'a WaypointGraph,
    /// Notification bus
    pub events: &'a NotificationBus,
    /// Random source
    pub rng: &'a mut fastrand::Rng,
}

impl BehaviorContext<'_> {
    /// Current antagonist position.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.nav.agent_position()
    }

    /// Current antagonist heading.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.nav.agent_forward()
    }

    /// World-space bounds of the antagonist's body.
    #[must_use]
    pub fn agent_bounds(&self) -> Aabb {
        let extents = self.body.half_extents;
        Aabb::new(self.position() + Vec3::Y * extents.y, extents)
    }

    /// Publishes a notification from this antagonist.
    pub fn notify(&self, kind: NotificationKind) {
        self.events.publish(self.entity, kind);
    }
}
