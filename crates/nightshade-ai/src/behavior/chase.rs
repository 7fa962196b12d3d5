//! Pursuit of the target.
//!
//! Both strategies remember where the target was last sighted and fall back
//! to that position when the direct path is blocked. Once the antagonist has
//! waited there long enough it gives up. The timed strategy additionally
//! gives up once its time budget is spent, whatever else is going on.
//!
//! Giving up publishes [`NotificationKind::ChaseStopped`] at most once per
//! activation; choosing the next behavior is left to the owner.

use glam::Vec3;
use tracing::{debug, info};

use super::base::BehaviorState;
use crate::config::{BehaviorConfig, ChaseConfig, ChaseStrategy, SpeedModifier};
use crate::context::BehaviorContext;
use crate::events::NotificationKind;
use crate::state_machine::{BehaviorKind, EntityState};

/// Minimum pursuit point shift before a new destination is issued.
const REPATH_DISTANCE: f32 = 0.1;

/// Chase behavior.
#[derive(Debug, Clone)]
pub struct ChaseBehavior {
    base: BehaviorState,
    config: ChaseConfig,
    /// Seconds since the target was last sighted
    elapsed_in_chase: f32,
    /// Seconds spent near the last known position
    elapsed_waiting: f32,
    /// Seconds since activation, never reset by sightings
    elapsed_budget: f32,
    last_known_position: Option<Vec3>,
    /// Point chosen this frame, driven on the next physics step
    pursuit_point: Option<Vec3>,
    /// Last destination handed to navigation
    issued: Option<Vec3>,
    /// `ChaseStopped` already raised this activation
    stop_latched: bool,
}

impl ChaseBehavior {
    /// Creates a chase behavior.
    #[must_use]
    pub fn new(config: &BehaviorConfig) -> Self {
        Self {
            base: BehaviorState::new(&config.acquisition, &config.navigation),
            config: config.chase.clone(),
            elapsed_in_chase: 0.0,
            elapsed_waiting: 0.0,
            elapsed_budget: 0.0,
            last_known_position: None,
            pursuit_point: None,
            issued: None,
            stop_latched: false,
        }
    }

    /// Pursuit strategy.
    #[must_use]
    pub fn strategy(&self) -> ChaseStrategy {
        self.config.strategy
    }

    /// Seconds since the target was last sighted.
    #[must_use]
    pub const fn elapsed_in_chase(&self) -> f32 {
        self.elapsed_in_chase
    }

    /// Seconds spent waiting near the last known position.
    #[must_use]
    pub const fn elapsed_waiting(&self) -> f32 {
        self.elapsed_waiting
    }

    /// Where the target was last sighted.
    #[must_use]
    pub const fn last_known_position(&self) -> Option<Vec3> {
        self.last_known_position
    }

    /// Whether this activation has already given up.
    #[must_use]
    pub const fn has_given_up(&self) -> bool {
        self.stop_latched
    }

    /// Point the antagonist is currently running towards.
    #[must_use]
    pub const fn pursuit_point(&self) -> Option<Vec3> {
        self.pursuit_point
    }

    /// Shared behavior state.
    #[must_use]
    pub const fn base(&self) -> &BehaviorState {
        &self.base
    }

    fn give_up(&mut self, ctx: &BehaviorContext<'_>, reason: &'static str) {
        self.pursuit_point = None;
        if self.stop_latched {
            return;
        }
        self.stop_latched = true;
        info!(
            entity = %ctx.entity,
            reason,
            chase = self.elapsed_in_chase,
            waiting = self.elapsed_waiting,
            "chase gave up"
        );
        ctx.notify(NotificationKind::ChaseStopped);
    }

    fn apply_speed(&self, ctx: &mut BehaviorContext<'_>) {
        match self.config.speed {
            SpeedModifier::Static(speed) => ctx.nav.set_speed(speed),
            SpeedModifier::Multiplier(factor) => {
                ctx.nav.set_speed(ctx.body.base_speed * factor);
                ctx.body.animation_rate = ctx.body.base_animation_rate * factor;
            },
        }
    }
}

impl EntityState for ChaseBehavior {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Chase
    }

    fn enter(&mut self, ctx: &mut BehaviorContext<'_>) {
        self.base.enter(ctx);
        self.apply_speed(ctx);

        self.elapsed_in_chase = 0.0;
        self.elapsed_waiting = 0.0;
        self.elapsed_budget = 0.0;
        self.stop_latched = false;
        self.pursuit_point = None;
        self.issued = None;
        self.last_known_position = self.base.target_pose(ctx).map(|pose| pose.position);

        info!(entity = %ctx.entity, strategy = ?self.config.strategy, "chase started");
        ctx.notify(NotificationKind::ChaseStarted);
    }

    fn exit(&mut self, ctx: &mut BehaviorContext<'_>) {
        ctx.nav.set_speed(ctx.body.base_speed);
        ctx.body.animation_rate = ctx.body.base_animation_rate;
        self.pursuit_point = None;
        self.issued = None;
        self.base.clear_destination();

        debug!(entity = %ctx.entity, "chase ended");
        ctx.notify(NotificationKind::ChaseEnded);
    }

    fn frame_update(&mut self, ctx: &mut BehaviorContext<'_>) {
        self.base.frame_update(ctx);
        self.elapsed_in_chase += ctx.dt;
        self.elapsed_budget += ctx.dt;

        let Some(pose) = self.base.target_pose(ctx) else {
            self.pursuit_point = None;
            return;
        };

        if ctx.perception.is_target_sighted() {
            self.elapsed_in_chase = 0.0;
            self.elapsed_waiting = 0.0;
            self.last_known_position = Some(pose.position);
        }

        if self.config.strategy == ChaseStrategy::Timed
            && self.elapsed_budget > self.config.max_chase_time
        {
            self.give_up(ctx, "time budget spent");
            return;
        }

        if self.base.is_path_valid(ctx, pose.position) {
            self.pursuit_point = Some(pose.position);
            return;
        }

        let Some(last_known) = self.last_known_position else {
            self.pursuit_point = None;
            return;
        };
        self.pursuit_point = Some(last_known);

        if ctx.position().distance(last_known) <= self.config.last_known_radius {
            self.elapsed_waiting += ctx.dt;
            if self.elapsed_waiting > self.config.wait_threshold {
                self.give_up(ctx, "waited at last known position");
            }
        }

        if self.stop_latched {
            self.pursuit_point = None;
        }
    }

    fn physics_update(&mut self, ctx: &mut BehaviorContext<'_>) {
        let Some(point) = self.pursuit_point else {
            return;
        };
        let stale = self
            .issued
            .map_or(true, |issued| issued.distance(point) > REPATH_DISTANCE);
        if stale {
            self.base.issue_destination(ctx, point);
            self.issued = Some(point);
        }
    }
}
