//! Wandering search between waypoints and random reachable points.

use glam::Vec3;
use tracing::{debug, trace};

use super::base::BehaviorState;
use crate::config::{BehaviorConfig, SearchConfig};
use crate::context::BehaviorContext;
use crate::state_machine::{BehaviorKind, EntityState};

/// Search behavior.
#[derive(Debug, Clone)]
pub struct SearchBehavior {
    base: BehaviorState,
    config: SearchConfig,
    pause_remaining: f32,
    destination: Option<Vec3>,
}

impl SearchBehavior {
    /// Creates a search behavior.
    #[must_use]
    pub fn new(config: &BehaviorConfig) -> Self {
        Self {
            base: BehaviorState::new(&config.acquisition, &config.navigation),
            config: config.search.clone(),
            pause_remaining: 0.0,
            destination: None,
        }
    }

    /// Where the antagonist is currently headed.
    #[must_use]
    pub const fn destination(&self) -> Option<Vec3> {
        self.destination
    }

    /// Seconds left in the current pause.
    #[must_use]
    pub const fn pause_remaining(&self) -> f32 {
        self.pause_remaining
    }

    /// Shared behavior state.
    #[must_use]
    pub const fn base(&self) -> &BehaviorState {
        &self.base
    }

    fn pick_next(&mut self, ctx: &mut BehaviorContext<'_>) {
        if ctx.rng.f32() < self.config.random_point_chance {
            if let Some(point) = self.base.find_random_position_in_range(
                ctx,
                self.config.search_radius,
                self.config.check_occlusion,
                None,
            ) {
                trace!(entity = %ctx.entity, ?point, "searching random point");
                self.base.issue_destination(ctx, point);
                self.destination = Some(point);
                return;
            }
        }

        let graph = ctx.waypoints;
        let moved = self
            .base
            .random_waypoint(ctx, graph.as_slice(), true)
            .and_then(|waypoint| self.base.move_to_waypoint(ctx, waypoint, true));
        match moved {
            Some(waypoint) => {
                trace!(entity = %ctx.entity, waypoint = %waypoint.id, "searching waypoint");
                self.destination = Some(waypoint.position);
            },
            None => {
                debug!(entity = %ctx.entity, "nowhere to search");
                self.destination = None;
            },
        }
    }
}

impl EntityState for SearchBehavior {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Search
    }

    fn enter(&mut self, ctx: &mut BehaviorContext<'_>) {
        self.base.enter(ctx);
        self.pause_remaining = 0.0;
        self.pick_next(ctx);
    }

    fn exit(&mut self, _ctx: &mut BehaviorContext<'_>) {
        self.base.clear_destination();
        self.destination = None;
    }

    fn frame_update(&mut self, ctx: &mut BehaviorContext<'_>) {
        if self.base.frame_update(ctx) {
            self.pause_remaining = self.config.pause_range.sample(ctx.rng);
        }
        if self.base.is_moving() {
            return;
        }
        if self.pause_remaining > 0.0 {
            self.pause_remaining = (self.pause_remaining - ctx.dt).max(0.0);
            return;
        }
        self.pick_next(ctx);
    }
}
