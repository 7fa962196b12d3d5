//! Running to the far side of the level.

use glam::Vec3;
use tracing::{debug, warn};

use super::base::BehaviorState;
use crate::config::{BehaviorConfig, FleeConfig};
use crate::context::BehaviorContext;
use crate::state_machine::{BehaviorKind, EntityState};

/// Flee behavior.
#[derive(Debug, Clone)]
pub struct FleeBehavior {
    base: BehaviorState,
    config: FleeConfig,
    destination: Option<Vec3>,
}

impl FleeBehavior {
    /// Creates a flee behavior.
    #[must_use]
    pub fn new(config: &BehaviorConfig) -> Self {
        Self {
            base: BehaviorState::new(&config.acquisition, &config.navigation),
            config: config.flee.clone(),
            destination: None,
        }
    }

    /// Where the antagonist is fleeing to.
    #[must_use]
    pub const fn destination(&self) -> Option<Vec3> {
        self.destination
    }

    /// Shared behavior state.
    #[must_use]
    pub const fn base(&self) -> &BehaviorState {
        &self.base
    }

    fn flee(&mut self, ctx: &mut BehaviorContext<'_>) {
        let farthest = self.base.get_farthest_waypoints(ctx, self.config.farthest_count);
        if let Some(waypoint) = self.base.random_waypoint(ctx, &farthest, false) {
            self.destination = self
                .base
                .move_to_waypoint(ctx, waypoint, true)
                .map(|wp| wp.position);
            if self.destination.is_some() {
                return;
            }
        }

        match self
            .base
            .find_random_position_on_navmesh(ctx, self.config.min_flee_distance)
        {
            Some(point) => {
                debug!(entity = %ctx.entity, ?point, "fleeing to navmesh point");
                self.base.issue_destination(ctx, point);
                self.destination = Some(point);
            },
            None => {
                warn!(entity = %ctx.entity, "nowhere to flee");
                self.destination = None;
            },
        }
    }
}

impl EntityState for FleeBehavior {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Flee
    }

    fn enter(&mut self, ctx: &mut BehaviorContext<'_>) {
        self.base.enter(ctx);
        self.flee(ctx);
    }

    fn exit(&mut self, _ctx: &mut BehaviorContext<'_>) {
        self.base.clear_destination();
        self.destination = None;
    }

    fn frame_update(&mut self, ctx: &mut BehaviorContext<'_>) {
        if !self.base.frame_update(ctx) {
            return;
        }
        // Keep running while the target is still close
        let near = self
            .base
            .target_pose(ctx)
            .is_some_and(|pose| {
                pose.position.distance(ctx.position()) < self.config.min_flee_distance
            });
        if near {
            self.flee(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::TestWorld;
    use crate::waypoint::WaypointGraph;

    #[test]
    fn test_flees_to_one_of_the_farthest() {
        let mut world = TestWorld::new();
        world.waypoints = WaypointGraph::from_positions(
            (0..8).map(|i| Vec3::new(i as f32 * 5.0, 0.0, 0.0)),
        );
        let mut flee = FleeBehavior::new(&BehaviorConfig::default());

        let mut ctx = world.context(0.1);
        flee.enter(&mut ctx);
        let destination = flee.destination().expect("waypoints exist");
        // Three farthest from the origin: x = 35, 30, 25
        assert!(destination.x >= 25.0);
    }

    #[test]
    fn test_empty_graph_uses_navmesh() {
        let mut world = TestWorld::new();
        world.nav.set_triangulation(
            vec![
                Vec3::new(-40.0, 0.0, -40.0),
                Vec3::new(40.0, 0.0, -40.0),
                Vec3::new(40.0, 0.0, 40.0),
                Vec3::new(-40.0, 0.0, 40.0),
            ],
            vec![0, 1, 2, 0, 2, 3],
        );
        let mut flee = FleeBehavior::new(&BehaviorConfig::default());

        let mut ctx = world.context(0.1);
        flee.enter(&mut ctx);
        let destination = flee.destination().expect("large navmesh");
        assert!(destination.length() >= 15.0);
    }

    #[test]
    fn test_flees_again_while_target_close() {
        let mut world = TestWorld::new();
        world.waypoints = WaypointGraph::from_positions([
            Vec3::new(-5.0, 0.0, 0.0),
            Vec3::new(5.0, 0.0, 0.0),
        ]);
        world.spawn_target(Vec3::ZERO);
        let mut config = BehaviorConfig::default();
        config.flee.farthest_count = 1;
        let mut flee = FleeBehavior::new(&config);

        let mut ctx = world.context(0.1);
        flee.enter(&mut ctx);
        flee.frame_update(&mut ctx);
        drop(ctx);
        assert_eq!(world.nav.destinations.len(), 2);
        assert_ne!(world.nav.destinations[0], world.nav.destinations[1]);
    }
}
