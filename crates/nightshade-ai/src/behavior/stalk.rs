//! Tactical repositioning around the target.
//!
//! Stalking starts passive and turns aggressive for good after
//! `aggressive_after` seconds. Movement is a small sub-state machine
//! evaluated every frame, first match wins:
//!
//! 1. stopped near the target (forced reposition once stalled and unseen)
//! 2. paused between moves
//! 3. strategic reposition (teleport to a scored waypoint while in cover)
//! 4. sequential approach (one waypoint at a time towards the target), also
//!    taken inside the strategic radius while exposed

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::base::BehaviorState;
use super::scoring::{StalkMode, StalkScorer};
use crate::config::{BehaviorConfig, StalkConfig};
use crate::context::BehaviorContext;
use crate::events::NotificationKind;
use crate::ports::TargetPose;
use crate::state_machine::{BehaviorKind, EntityState};

/// Movement phase chosen on the last frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalkPhase {
    /// No target to stalk
    #[default]
    NoTarget,
    /// Holding still close to the target
    StoppedNearTarget,
    /// Waiting between moves
    Paused,
    /// Teleported to a scored waypoint
    StrategicReposition,
    /// Inside the strategic radius without cover, approaching in the open
    Exposed,
    /// Walking waypoint to waypoint towards the target
    SequentialApproach,
}

/// Stalk behavior.
#[derive(Debug, Clone)]
pub struct StalkBehavior {
    base: BehaviorState,
    scorer: StalkScorer,
    config: StalkConfig,
    max_sequential: usize,
    cover_mask: nightshade_common::LayerMask,
    mode: StalkMode,
    phase: StalkPhase,
    /// Seconds since activation
    elapsed_stalking: f32,
    /// Seconds held near the target
    time_stopped: f32,
    /// Seconds left in the current pause
    pause_remaining: f32,
}

impl StalkBehavior {
    /// Creates a stalk behavior.
    #[must_use]
    pub fn new(config: &BehaviorConfig) -> Self {
        Self {
            base: BehaviorState::new(&config.acquisition, &config.navigation),
            scorer: StalkScorer::new(&config.stalk, config.navigation.cover_mask),
            config: config.stalk.clone(),
            max_sequential: config.navigation.sequential_max_waypoints,
            cover_mask: config.navigation.cover_mask,
            mode: StalkMode::Passive,
            phase: StalkPhase::NoTarget,
            elapsed_stalking: 0.0,
            time_stopped: 0.0,
            pause_remaining: 0.0,
        }
    }

    /// Current posture.
    #[must_use]
    pub const fn mode(&self) -> StalkMode {
        self.mode
    }

    /// Movement phase chosen on the last frame.
    #[must_use]
    pub const fn phase(&self) -> StalkPhase {
        self.phase
    }

    /// Seconds since activation.
    #[must_use]
    pub const fn elapsed_stalking(&self) -> f32 {
        self.elapsed_stalking
    }

    /// Seconds held near the target.
    #[must_use]
    pub const fn time_stopped(&self) -> f32 {
        self.time_stopped
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

    /// The scorer used for strategic repositioning.
    #[must_use]
    pub const fn scorer(&self) -> &StalkScorer {
        &self.scorer
    }

    fn start_pause(&mut self, ctx: &mut BehaviorContext<'_>) {
        self.pause_remaining = self.config.pause_range.sample(ctx.rng);
    }

    fn update_mode(&mut self, ctx: &BehaviorContext<'_>) {
        if self.mode == StalkMode::Passive && self.elapsed_stalking > self.config.aggressive_after {
            self.mode = StalkMode::Aggressive;
            info!(entity = %ctx.entity, after = self.elapsed_stalking, "stalk turned aggressive");
            ctx.notify(NotificationKind::StalkTurnedAggressive);
        }
    }

    /// Teleports to a scored waypoint near the target.
    ///
    /// An attempt fails when no candidate survives or the chosen one is in
    /// the target's view; each retry widens the candidate set by one. After
    /// `reposition_attempts` failures a random waypoint is used instead.
    fn strategic_reposition(&mut self, ctx: &mut BehaviorContext<'_>, pose: &TargetPose) -> bool {
        let mut count = self.config.candidate_count;

        for attempt in 0..self.config.reposition_attempts {
            let candidates = self.scorer.candidates(&self.base, ctx, pose, count);
            let ranked = self
                .scorer
                .score_candidates(&self.base, ctx, pose, &candidates, self.mode);
            let choice = self
                .scorer
                .select(&ranked, ctx.rng)
                .filter(|chosen| !chosen.in_view)
                .map(|chosen| chosen.waypoint);

            if let Some(waypoint) = choice {
                debug!(
                    entity = %ctx.entity,
                    waypoint = %waypoint.id,
                    attempt,
                    "strategic reposition"
                );
                self.base.teleport_to_waypoint(ctx, waypoint);
                return true;
            }
            count += 1;
        }

        warn!(
            entity = %ctx.entity,
            attempts = self.config.reposition_attempts,
            "strategic reposition failed, using random waypoint"
        );
        ctx.notify(NotificationKind::StrategicRepositionFailed);
        let graph = ctx.waypoints;
        if let Some(waypoint) = self.base.random_waypoint(ctx, graph.as_slice(), true) {
            self.base.teleport_to_waypoint(ctx, waypoint);
        }
        false
    }

    /// Walks one waypoint closer to the target unless already moving.
    fn approach(&mut self, ctx: &mut BehaviorContext<'_>, pose: &TargetPose) {
        if self.base.is_moving() {
            return;
        }
        if let Some(next) =
            self.base.get_sequential_waypoint_towards(ctx, pose.position, self.max_sequential)
        {
            self.base.move_to_waypoint(ctx, next, true);
        }
    }

    fn hold_position(&mut self, ctx: &mut BehaviorContext<'_>) {
        if self.base.is_moving() {
            let here = ctx.position();
            ctx.nav.set_destination(here);
            self.base.clear_destination();
        }
    }

    fn in_cover(&self, ctx: &BehaviorContext<'_>, pose: &TargetPose) -> bool {
        self.base.behind_cover(
            ctx,
            pose.viewpoint,
            ctx.position(),
            Vec3::Y * self.config.cover_ray_height,
            self.cover_mask,
        )
    }
}

impl EntityState for StalkBehavior {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Stalk
    }

    fn enter(&mut self, ctx: &mut BehaviorContext<'_>) {
        self.base.enter(ctx);
        self.mode = StalkMode::Passive;
        self.phase = StalkPhase::NoTarget;
        self.elapsed_stalking = 0.0;
        self.time_stopped = 0.0;
        self.pause_remaining = 0.0;
        debug!(entity = %ctx.entity, "stalk started");
    }

    fn exit(&mut self, ctx: &mut BehaviorContext<'_>) {
        self.base.clear_destination();
        debug!(entity = %ctx.entity, mode = ?self.mode, "stalk ended");
    }

    fn frame_update(&mut self, ctx: &mut BehaviorContext<'_>) {
        let arrived = self.base.frame_update(ctx);
        self.elapsed_stalking += ctx.dt;
        self.update_mode(ctx);

        let Some(pose) = self.base.target_pose(ctx) else {
            self.phase = StalkPhase::NoTarget;
            return;
        };
        if arrived {
            self.start_pause(ctx);
        }

        let distance = ctx.position().distance(pose.position);

        if distance < self.config.stop_radius {
            self.phase = StalkPhase::StoppedNearTarget;
            self.hold_position(ctx);
            self.time_stopped += ctx.dt;
            if self.time_stopped > self.config.max_stopped_time
                && !self.base.visible_to_target(ctx, None)
            {
                debug!(entity = %ctx.entity, stopped = self.time_stopped, "stalled near target");
                self.strategic_reposition(ctx, &pose);
                self.time_stopped = 0.0;
            }
            return;
        }
        self.time_stopped = 0.0;

        if self.pause_remaining > 0.0 {
            self.phase = StalkPhase::Paused;
            self.pause_remaining = (self.pause_remaining - ctx.dt).max(0.0);
            return;
        }

        if distance < self.config.strategic_radius {
            if self.in_cover(ctx, &pose) {
                self.phase = StalkPhase::StrategicReposition;
                self.strategic_reposition(ctx, &pose);
                self.start_pause(ctx);
                return;
            }
            self.phase = StalkPhase::Exposed;
        } else {
            self.phase = StalkPhase::SequentialApproach;
        }
        self.approach(ctx, &pose);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::drain;
    use crate::mock::TestWorld;
    use crate::waypoint::WaypointGraph;
    use nightshade_common::{Aabb, Frustum, LayerMask};

    fn config() -> BehaviorConfig {
        BehaviorConfig::default()
    }

    #[test]
    fn test_turns_aggressive_once() {
        let mut world = TestWorld::new();
        world.spawn_target(Vec3::new(0.0, 0.0, 50.0));
        let inbox = world.bus.subscribe();
        let mut stalk = StalkBehavior::new(&config());

        let mut ctx = world.context(1.0);
        stalk.enter(&mut ctx);
        for _ in 0..22 {
            stalk.frame_update(&mut ctx);
        }
        assert_eq!(stalk.mode(), StalkMode::Passive);
        for _ in 0..10 {
            stalk.frame_update(&mut ctx);
        }
        assert_eq!(stalk.mode(), StalkMode::Aggressive);
        drop(ctx);

        let turned = drain(&inbox)
            .into_iter()
            .filter(|n| n.kind == NotificationKind::StalkTurnedAggressive)
            .count();
        assert_eq!(turned, 1);
    }

    #[test]
    fn test_enter_resets_to_passive() {
        let mut world = TestWorld::new();
        world.spawn_target(Vec3::new(0.0, 0.0, 50.0));
        let mut stalk = StalkBehavior::new(&config());
        let mut ctx = world.context(30.0);
        stalk.enter(&mut ctx);
        stalk.frame_update(&mut ctx);
        assert_eq!(stalk.mode(), StalkMode::Aggressive);

        stalk.exit(&mut ctx);
        stalk.enter(&mut ctx);
        assert_eq!(stalk.mode(), StalkMode::Passive);
        assert_eq!(stalk.elapsed_stalking(), 0.0);
    }

    #[test]
    fn test_sequential_approach_from_afar() {
        let mut world = TestWorld::new();
        world.waypoints = WaypointGraph::from_positions(
            (1..=10).map(|i| Vec3::new(0.0, 0.0, i as f32 * 4.0)),
        );
        world.spawn_target(Vec3::new(0.0, 0.0, 40.0));
        let mut stalk = StalkBehavior::new(&config());

        let mut ctx = world.context(0.1);
        stalk.enter(&mut ctx);
        stalk.frame_update(&mut ctx);
        assert_eq!(stalk.phase(), StalkPhase::SequentialApproach);
        drop(ctx);
        assert_eq!(world.nav.destinations.len(), 1);
        assert!(world.nav.destinations[0].z > 0.0);
    }

    #[test]
    fn test_pause_after_arrival() {
        let mut world = TestWorld::new();
        world.waypoints = WaypointGraph::from_positions(
            (1..=10).map(|i| Vec3::new(0.0, 0.0, i as f32 * 4.0)),
        );
        world.spawn_target(Vec3::new(0.0, 0.0, 80.0));
        let mut stalk = StalkBehavior::new(&config());

        let mut ctx = world.context(0.1);
        stalk.enter(&mut ctx);
        // Issues the move; the mock arrives instantly
        stalk.frame_update(&mut ctx);
        // Sees the arrival and pauses
        stalk.frame_update(&mut ctx);
        assert!(stalk.pause_remaining() > 0.0);
        stalk.frame_update(&mut ctx);
        assert_eq!(stalk.phase(), StalkPhase::Paused);
    }

    #[test]
    fn test_strategic_reposition_when_in_cover() {
        let mut world = TestWorld::new();
        let target = world.spawn_target(Vec3::new(0.0, 0.0, 10.0));
        world.visibility.set_frustum(
            target,
            Frustum::from_view(Vec3::new(0.0, 1.7, 10.0), Vec3::Z, Vec3::Y, 60.0, 1.0, 0.1, 100.0),
        );
        // Wall between the antagonist and the target
        world.visibility.add_collider(
            Aabb::new(Vec3::new(0.0, 1.0, 5.0), Vec3::new(4.0, 1.0, 0.2)),
            LayerMask::COVER,
        );
        world.waypoints = WaypointGraph::from_positions([
            Vec3::new(2.0, 0.0, 4.0),
            Vec3::new(-2.0, 0.0, 4.0),
            Vec3::new(0.0, 0.0, 20.0),
        ]);
        let mut stalk = StalkBehavior::new(&config());

        let mut ctx = world.context(0.1);
        stalk.enter(&mut ctx);
        stalk.frame_update(&mut ctx);
        assert_eq!(stalk.phase(), StalkPhase::StrategicReposition);
        assert!(stalk.pause_remaining() > 0.0);
        drop(ctx);

        assert_eq!(world.nav.teleports.len(), 1);
        // The waypoint in front of the target is in view and never chosen
        assert_ne!(world.nav.teleports[0], Vec3::new(0.0, 0.0, 20.0));
    }

    #[test]
    fn test_exposed_inside_strategic_radius_keeps_approaching() {
        let mut world = TestWorld::new();
        let target_at = Vec3::new(0.0, 0.0, 10.0);
        world.spawn_target(target_at);
        world.waypoints = WaypointGraph::from_positions([
            Vec3::new(0.0, 0.0, 4.0),
            Vec3::new(3.0, 0.0, 6.0),
            Vec3::new(-3.0, 0.0, 6.0),
        ]);
        let mut stalk = StalkBehavior::new(&config());

        let mut ctx = world.context(0.1);
        stalk.enter(&mut ctx);
        stalk.frame_update(&mut ctx);
        assert_eq!(stalk.phase(), StalkPhase::Exposed);
        for _ in 0..200 {
            stalk.frame_update(&mut ctx);
        }
        drop(ctx);

        assert_eq!(world.nav.destinations.first(), Some(&Vec3::new(0.0, 0.0, 4.0)));
        assert!(world.nav.destinations.len() >= 2);
        assert!(world.nav.teleports.is_empty());
        assert!(world.nav.position.distance(target_at) < 10.0);
    }

    #[test]
    fn test_reposition_failure_falls_back_to_random_waypoint() {
        let mut world = TestWorld::new();
        let target = world.spawn_target(Vec3::new(0.0, 0.0, 10.0));
        // The target sees everything around it
        world.visibility.set_frustum(
            target,
            Frustum::from_view(
                Vec3::new(0.0, 1.7, -50.0),
                Vec3::Z,
                Vec3::Y,
                120.0,
                1.0,
                0.1,
                200.0,
            ),
        );
        world.visibility.add_collider(
            Aabb::new(Vec3::new(0.0, 1.0, 5.0), Vec3::new(4.0, 1.0, 0.2)),
            LayerMask::COVER,
        );
        world.waypoints = WaypointGraph::from_positions([
            Vec3::new(3.0, 0.0, 12.0),
            Vec3::new(-3.0, 0.0, 12.0),
        ]);
        let inbox = world.bus.subscribe();
        let mut config = config();
        config.stalk.reposition_attempts = 5;
        let mut stalk = StalkBehavior::new(&config);

        let mut ctx = world.context(0.1);
        stalk.enter(&mut ctx);
        stalk.frame_update(&mut ctx);
        drop(ctx);

        let kinds: Vec<_> = drain(&inbox).into_iter().map(|n| n.kind).collect();
        assert_eq!(kinds, vec![NotificationKind::StrategicRepositionFailed]);
        assert_eq!(world.nav.teleports.len(), 1);
    }

    #[test]
    fn test_stalled_near_target_forces_reposition() {
        let mut world = TestWorld::new();
        world.spawn_target(Vec3::new(0.0, 0.0, 2.0));
        world.waypoints = WaypointGraph::from_positions([
            Vec3::new(8.0, 0.0, 2.0),
            Vec3::new(-8.0, 0.0, 2.0),
        ]);
        let mut stalk = StalkBehavior::new(&config());

        let mut ctx = world.context(1.0);
        stalk.enter(&mut ctx);
        for _ in 0..5 {
            stalk.frame_update(&mut ctx);
            assert_eq!(stalk.phase(), StalkPhase::StoppedNearTarget);
        }
        assert!(stalk.time_stopped() >= 5.0);

        // No camera on the target, so the antagonist is never visible
        stalk.frame_update(&mut ctx);
        assert_eq!(stalk.time_stopped(), 0.0);
        drop(ctx);
        assert_eq!(world.nav.teleports.len(), 1);
    }

    #[test]
    fn test_stalled_but_visible_keeps_waiting() {
        let mut world = TestWorld::new();
        let target = world.spawn_target(Vec3::new(0.0, 0.0, 2.0));
        world.visibility.set_frustum(
            target,
            Frustum::from_view(
                Vec3::new(0.0, 1.7, 2.0),
                Vec3::NEG_Z,
                Vec3::Y,
                90.0,
                1.0,
                0.1,
                100.0,
            ),
        );
        world.waypoints = WaypointGraph::from_positions([Vec3::new(8.0, 0.0, 2.0)]);
        let mut stalk = StalkBehavior::new(&config());

        let mut ctx = world.context(1.0);
        stalk.enter(&mut ctx);
        for _ in 0..10 {
            stalk.frame_update(&mut ctx);
        }
        assert!(stalk.time_stopped() > 5.0);
        drop(ctx);
        assert!(world.nav.teleports.is_empty());
    }
}
