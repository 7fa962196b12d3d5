//! Simulation loop.
//!
//! Each frame the target walks, perception is refreshed, the antagonist
//! thinks, physics catches up in fixed steps and every notification raised
//! during the frame is logged and recorded.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use glam::Vec3;
use nightshade_ai::{
    drain, Antagonist, BehaviorKind, NavigationQuery, Notification, NotificationBus,
    NotificationKind, SetupError,
};
use nightshade_common::LayerMask;
use tracing::{debug, info, warn};

use crate::arena::ArenaWorld;
use crate::config::SimConfig;
use crate::target::ScriptedTarget;
use crate::timing::FixedStep;

/// Layers that block the antagonist's sight.
const SIGHT_BLOCKERS: LayerMask = LayerMask::COVER.union(LayerMask::OBSTACLE);

/// A behavior change observed during the run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    /// Simulated time in seconds
    pub time: f32,
    /// Previous behavior
    pub from: Option<BehaviorKind>,
    /// New behavior
    pub to: BehaviorKind,
}

/// Outcome of a run.
#[derive(Debug, Clone, Default)]
pub struct SimReport {
    /// Frames simulated
    pub frames: u64,
    /// Physics steps simulated
    pub physics_steps: u64,
    /// Simulated seconds
    pub elapsed: f32,
    /// Behavior changes in order
    pub transitions: Vec<Transition>,
    /// Every notification with its time, in order
    pub notifications: Vec<(f32, NotificationKind)>,
    /// Frames during which the antagonist saw the target
    pub frames_sighted: u64,
    /// Smallest antagonist to target distance
    pub closest_approach: f32,
    /// Behavior active at the end
    pub final_behavior: Option<BehaviorKind>,
}

impl SimReport {
    /// Number of notifications of `kind`.
    #[must_use]
    pub fn count(&self, kind: NotificationKind) -> usize {
        self.notifications.iter().filter(|(_, k)| *k == kind).count()
    }

    /// Whether the antagonist ever switched into `kind`.
    #[must_use]
    #[cfg(test)]
    pub fn entered(&self, kind: BehaviorKind) -> bool {
        self.transitions.iter().any(|t| t.to == kind)
    }
}

/// One antagonist hunting one scripted target.
#[derive(Debug)]
pub struct Simulation {
    config: SimConfig,
    world: ArenaWorld,
    target: ScriptedTarget,
    antagonist: Antagonist,
    inbox: Receiver<Notification>,
    timing: FixedStep,
    report: SimReport,
}

impl Simulation {
    /// Builds the arena and the antagonist and enters the start behavior.
    ///
    /// The configuration is used as given; call [`SimConfig::validate`]
    /// first to clamp user input.
    pub fn new(config: SimConfig) -> Result<Self, SetupError> {
        let bus = Arc::new(NotificationBus::new());
        let inbox = bus.subscribe();
        let antagonist = Antagonist::new(config.behavior.clone(), Arc::clone(&bus))?;

        let mut sim = Self {
            world: ArenaWorld::from_config(&config),
            target: ScriptedTarget::new(config.target.clone()),
            antagonist,
            inbox,
            timing: FixedStep::new(config.fixed_dt),
            report: SimReport {
                closest_approach: f32::INFINITY,
                ..SimReport::default()
            },
            config,
        };

        sim.sense();
        if !sim.antagonist.start(sim.world.ports()) {
            warn!("antagonist failed to enter its start behavior");
        }
        sim.collect();
        Ok(sim)
    }

    /// Runs the configured duration and returns the report.
    pub fn run(mut self) -> SimReport {
        let frames = self.config.frame_count();
        info!(
            frames,
            waypoints = self.world.waypoints.len(),
            target = %self.target.id(),
            "simulation starting"
        );

        for _ in 0..frames {
            self.tick();
        }

        self.report.final_behavior = self.antagonist.current_behavior();
        self.report
    }

    /// Advances one frame.
    pub fn tick(&mut self) {
        let dt = self.config.frame_dt;

        self.target.advance(dt);
        let sighted = self.sense();
        if sighted {
            self.report.frames_sighted += 1;
        }

        self.antagonist.frame_update(self.world.ports(), dt);

        let fixed_dt = self.timing.fixed_dt();
        for _ in 0..self.timing.accumulate(dt) {
            self.antagonist.physics_update(self.world.ports(), fixed_dt);
            self.world.nav.step(fixed_dt);
            self.report.physics_steps += 1;
        }

        self.report.frames += 1;
        self.report.elapsed += dt;
        self.collect();
    }

    /// Antagonist position.
    #[must_use]
    pub fn antagonist_position(&self) -> Vec3 {
        self.world.nav.agent_position()
    }

    /// Active behavior.
    #[must_use]
    #[cfg(test)]
    pub fn current_behavior(&self) -> Option<BehaviorKind> {
        self.antagonist.current_behavior()
    }

    /// Report so far.
    #[must_use]
    #[cfg(test)]
    pub const fn report(&self) -> &SimReport {
        &self.report
    }

    /// Refreshes perception and the target camera. Returns whether the
    /// antagonist sees the target.
    fn sense(&mut self) -> bool {
        let position = self.antagonist_position();
        let Some(pose) = self.target.pose() else {
            self.world.perception.update(None, false);
            self.world.visibility.set_camera(None);
            return false;
        };

        let distance = position.distance(self.target.position());
        self.report.closest_approach = self.report.closest_approach.min(distance);

        let eye = position + Vec3::Y * self.config.eye_height;
        let sighted = eye.distance(pose.viewpoint) <= self.config.sight_range
            && self.world.line_of_sight(eye, pose.viewpoint, SIGHT_BLOCKERS);

        self.world
            .perception
            .update(Some((self.target.id(), pose)), sighted);
        self.world
            .visibility
            .set_camera(self.target.frustum().map(|frustum| (self.target.id(), frustum)));
        sighted
    }

    /// Logs and records what the antagonist raised this frame.
    fn collect(&mut self) {
        let time = self.report.elapsed;
        for notification in drain(&self.inbox) {
            match notification.kind {
                NotificationKind::BehaviorChanged { from, to } => {
                    info!(time, ?from, %to, "behavior changed");
                    self.report.transitions.push(Transition { time, from, to });
                },
                kind => debug!(time, ?kind, "notification"),
            }
            self.report.notifications.push((time, notification.kind));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightshade_ai::ChaseStrategy;

    /// Open arena, target standing still.
    fn open_arena(target_at: Vec3) -> SimConfig {
        let mut config = SimConfig::default();
        config.duration = 4.0;
        config.walls.clear();
        config.spawn = Vec3::ZERO;
        config.target.route = vec![target_at];
        config.behavior.antagonist.seed = Some(5);
        config
    }

    #[test]
    fn test_frames_cover_duration() {
        let mut config = open_arena(Vec3::new(15.0, 0.0, 15.0));
        config.duration = 2.0;
        let report = Simulation::new(config).expect("valid config").run();

        assert_eq!(report.frames, 60);
        assert!((110..=130).contains(&report.physics_steps));
        assert!((report.elapsed - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_start_is_recorded() {
        let mut config = open_arena(Vec3::new(15.0, 0.0, 15.0));
        config.behavior.antagonist.start_behavior = BehaviorKind::Idle;
        config.behavior.antagonist.chase_on_sight = false;
        let sim = Simulation::new(config).expect("valid config");

        let first = sim.report().transitions.first().copied().expect("start recorded");
        assert_eq!(first.from, None);
        assert_eq!(first.to, BehaviorKind::Idle);
        assert!(first.time.abs() < f32::EPSILON);
        assert_eq!(sim.current_behavior(), Some(BehaviorKind::Idle));
    }

    #[test]
    fn test_sighted_target_is_chased() {
        let mut config = open_arena(Vec3::new(0.0, 0.0, 8.0));
        config.behavior.antagonist.start_behavior = BehaviorKind::Search;
        config.behavior.chase.strategy = ChaseStrategy::Memory;
        let report = Simulation::new(config).expect("valid config").run();

        assert!(report.entered(BehaviorKind::Chase));
        assert_eq!(report.count(NotificationKind::ChaseStarted), 1);
        assert!(report.frames_sighted > 0);
        assert!(report.closest_approach < 8.0);
    }

    #[test]
    fn test_wall_hides_target() {
        let mut config = open_arena(Vec3::new(0.0, 0.0, 8.0));
        config.walls = vec![crate::config::WallConfig::cover(0.0, 4.0, 3.0, 0.5)];
        config.behavior.antagonist.start_behavior = BehaviorKind::Idle;
        let report = Simulation::new(config).expect("valid config").run();

        assert_eq!(report.frames_sighted, 0);
        assert!(!report.entered(BehaviorKind::Chase));
        assert_eq!(report.final_behavior, Some(BehaviorKind::Idle));
    }

    #[test]
    fn test_despawned_target_triggers_fallback() {
        let mut config = open_arena(Vec3::new(15.0, 0.0, -15.0));
        config.target.despawn_after = Some(0.5);
        config.behavior.antagonist.start_behavior = BehaviorKind::Stalk;
        config.behavior.antagonist.chase_on_sight = false;
        config.behavior.acquisition.target_timeout = 1.0;
        let report = Simulation::new(config).expect("valid config").run();

        // Search keeps looking for the target too, but is not replaced
        assert!(report.count(NotificationKind::TargetNotFound) >= 1);
        assert!(report.entered(BehaviorKind::Search));
        assert_eq!(report.final_behavior, Some(BehaviorKind::Search));
    }

    #[test]
    fn test_rejected_behavior_config() {
        let mut config = open_arena(Vec3::ZERO);
        config.behavior.acquisition.target_timeout = 0.0;
        assert!(matches!(Simulation::new(config), Err(SetupError::Config(_))));
    }
}
