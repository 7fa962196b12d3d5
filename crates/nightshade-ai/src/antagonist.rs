//! Owner of one antagonist's behaviors.
//!
//! The antagonist registers its behaviors at setup, resolves the configured
//! fallback priority against what is actually registered, and afterwards
//! reacts to the one-shot notifications its behaviors raise: a chase that
//! gives up or a behavior that cannot find its target is replaced by the
//! first available fallback.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use nightshade_common::{ConfigError, EntityId};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::behavior;
use crate::config::BehaviorConfig;
use crate::context::{AgentBody, BehaviorContext};
use crate::events::{Notification, NotificationBus, NotificationKind};
use crate::ports::{NavigationQuery, Perception, VisibilityQuery};
use crate::state_machine::{BehaviorKind, EntityStateMachine};
use crate::waypoint::WaypointGraph;

/// Errors raised while setting up an antagonist.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The configuration was rejected
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The start behavior is not among the registered ones
    #[error("start behavior '{0}' is not registered")]
    StartUnavailable(BehaviorKind),
}

/// Engine ports lent to the antagonist for one tick.
pub struct WorldPorts<'a> {
    /// Navigation agent of this antagonist
    pub nav: &'a mut dyn NavigationQuery,
    /// Target perception of this antagonist
    pub perception: &'a dyn Perception,
    /// Scene visibility queries
    pub visibility: &'a dyn VisibilityQuery,
    /// Level waypoints
    pub waypoints: &'a WaypointGraph,
}

/// Reacts to behavior notifications by switching behaviors.
#[derive(Debug)]
struct Director {
    fallback: Vec<BehaviorKind>,
    chase_on_sight: bool,
    reengage_cooldown: f32,
    cooldown_remaining: f32,
    inbox: Receiver<Notification>,
}

impl Director {
    fn react(&mut self, machine: &mut EntityStateMachine, ctx: &mut BehaviorContext<'_>) {
        self.cooldown_remaining = (self.cooldown_remaining - ctx.dt).max(0.0);

        let pending: Vec<NotificationKind> = self
            .inbox
            .try_iter()
            .filter(|n| n.source == ctx.entity)
            .map(|n| n.kind)
            .collect();

        for kind in pending {
            let current = machine.current_state();
            match kind {
                NotificationKind::ChaseStopped if current == Some(BehaviorKind::Chase) => {
                    self.cooldown_remaining = self.reengage_cooldown;
                    self.fall_back(machine, ctx);
                },
                NotificationKind::TargetNotFound
                    if current.is_some_and(BehaviorKind::needs_target) =>
                {
                    self.fall_back(machine, ctx);
                },
                _ => {},
            }
        }

        if self.chase_on_sight
            && self.cooldown_remaining <= 0.0
            && machine.current_state() != Some(BehaviorKind::Chase)
            && machine.is_available(BehaviorKind::Chase)
            && ctx.perception.is_target_sighted()
        {
            debug!(entity = %ctx.entity, "target sighted, engaging");
            switch(machine, ctx, BehaviorKind::Chase);
        }
    }

    fn fall_back(&self, machine: &mut EntityStateMachine, ctx: &mut BehaviorContext<'_>) {
        let current = machine.current_state();
        let next = self
            .fallback
            .iter()
            .copied()
            .find(|kind| Some(*kind) != current && machine.is_available(*kind));

        match next {
            Some(kind) => {
                switch(machine, ctx, kind);
            },
            None => warn!(entity = %ctx.entity, ?current, "no fallback behavior available"),
        }
    }
}

/// Changes behavior and announces it.
fn switch(
    machine: &mut EntityStateMachine,
    ctx: &mut BehaviorContext<'_>,
    to: BehaviorKind,
) -> bool {
    let from = machine.current_state();
    if !machine.change_state(to, ctx) {
        return false;
    }
    info!(entity = %ctx.entity, from = ?from, %to, "behavior changed");
    ctx.notify(NotificationKind::BehaviorChanged { from, to });
    true
}

/// One antagonist: body, behaviors and the logic choosing between them.
#[derive(Debug)]
pub struct Antagonist {
    id: EntityId,
    config: BehaviorConfig,
    body: AgentBody,
    machine: EntityStateMachine,
    director: Director,
    bus: Arc<NotificationBus>,
    rng: fastrand::Rng,
}

impl Antagonist {
    /// Creates an antagonist with every behavior registered.
    pub fn new(config: BehaviorConfig, bus: Arc<NotificationBus>) -> Result<Self, SetupError> {
        Self::with_behaviors(config, bus, &BehaviorKind::all())
    }

    /// Creates an antagonist with only the given behaviors registered.
    pub fn with_behaviors(
        config: BehaviorConfig,
        bus: Arc<NotificationBus>,
        kinds: &[BehaviorKind],
    ) -> Result<Self, SetupError> {
        config.check()?;

        let mut machine = EntityStateMachine::new();
        for &kind in kinds {
            machine.register(behavior::build(kind, &config));
        }

        let start = config.antagonist.start_behavior;
        if !machine.is_available(start) {
            return Err(SetupError::StartUnavailable(start));
        }

        let mut fallback: Vec<BehaviorKind> = Vec::new();
        for &kind in &config.antagonist.fallback_priority {
            if machine.is_available(kind) && !fallback.contains(&kind) {
                fallback.push(kind);
            }
        }
        if fallback.is_empty() {
            warn!("no fallback behavior registered, give-ups will be ignored");
        }

        let owner = &config.antagonist;
        let body = AgentBody::new(owner.base_speed, owner.base_animation_rate, owner.half_extents);
        let rng = owner
            .seed
            .map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        let director = Director {
            fallback,
            chase_on_sight: owner.chase_on_sight,
            reengage_cooldown: owner.reengage_cooldown,
            cooldown_remaining: 0.0,
            inbox: bus.subscribe(),
        };

        Ok(Self {
            id: EntityId::new(),
            config,
            body,
            machine,
            director,
            bus,
            rng,
        })
    }

    /// Antagonist id, the source of all its notifications.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Active behavior.
    #[must_use]
    pub fn current_behavior(&self) -> Option<BehaviorKind> {
        self.machine.current_state()
    }

    /// Fallback order resolved at setup.
    #[must_use]
    pub fn fallback(&self) -> &[BehaviorKind] {
        &self.director.fallback
    }

    /// Body state.
    #[must_use]
    pub const fn body(&self) -> &AgentBody {
        &self.body
    }

    /// Configuration this antagonist was built from.
    #[must_use]
    pub const fn config(&self) -> &BehaviorConfig {
        &self.config
    }

    /// Behavior state machine.
    #[must_use]
    pub const fn machine(&self) -> &EntityStateMachine {
        &self.machine
    }

    /// Mutable access to the state machine, e.g. to disable a behavior.
    pub fn machine_mut(&mut self) -> &mut EntityStateMachine {
        &mut self.machine
    }

    /// Enters the configured start behavior.
    pub fn start(&mut self, ports: WorldPorts<'_>) -> bool {
        let start = self.config.antagonist.start_behavior;
        let mut ctx = BehaviorContext {
            entity: self.id,
            dt: 0.0,
            body: &mut self.body,
            nav: ports.nav,
            perception: ports.perception,
            visibility: ports.visibility,
            waypoints: ports.waypoints,
            events: self.bus.as_ref(),
            rng: &mut self.rng,
        };
        if !self.machine.initialize(start, &mut ctx) {
            return false;
        }
        info!(entity = %self.id, %start, "antagonist started");
        ctx.notify(NotificationKind::BehaviorChanged {
            from: None,
            to: start,
        });
        true
    }

    /// Requests a behavior change from outside.
    pub fn change_state(&mut self, kind: BehaviorKind, ports: WorldPorts<'_>) -> bool {
        let mut ctx = BehaviorContext {
            entity: self.id,
            dt: 0.0,
            body: &mut self.body,
            nav: ports.nav,
            perception: ports.perception,
            visibility: ports.visibility,
            waypoints: ports.waypoints,
            events: self.bus.as_ref(),
            rng: &mut self.rng,
        };
        switch(&mut self.machine, &mut ctx, kind)
    }

    /// Frame tick: runs the active behavior, then reacts to what it raised.
    pub fn frame_update(&mut self, ports: WorldPorts<'_>, dt: f32) {
        let mut ctx = BehaviorContext {
            entity: self.id,
            dt,
            body: &mut self.body,
            nav: ports.nav,
            perception: ports.perception,
            visibility: ports.visibility,
            waypoints: ports.waypoints,
            events: self.bus.as_ref(),
            rng: &mut self.rng,
        };
        self.machine.frame_update(&mut ctx);
        self.director.react(&mut self.machine, &mut ctx);
    }

    /// Physics tick.
    pub fn physics_update(&mut self, ports: WorldPorts<'_>, dt: f32) {
        let mut ctx = BehaviorContext {
            entity: self.id,
            dt,
            body: &mut self.body,
            nav: ports.nav,
            perception: ports.perception,
            visibility: ports.visibility,
            waypoints: ports.waypoints,
            events: self.bus.as_ref(),
            rng: &mut self.rng,
        };
        self.machine.physics_update(&mut ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChaseStrategy;
    use crate::events::drain;
    use crate::mock::TestWorld;
    use glam::Vec3;

    fn seeded() -> BehaviorConfig {
        let mut config = BehaviorConfig::default();
        config.antagonist.seed = Some(11);
        config
    }

    #[test]
    fn test_start_enters_configured_behavior() {
        let mut world = TestWorld::new();
        let bus = Arc::new(NotificationBus::new());
        let inbox = bus.subscribe();
        let mut antagonist = Antagonist::new(seeded(), Arc::clone(&bus)).expect("valid setup");

        assert!(antagonist.start(world.ports()));
        assert_eq!(antagonist.current_behavior(), Some(BehaviorKind::Search));
        let kinds: Vec<_> = drain(&inbox).into_iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![NotificationKind::BehaviorChanged {
                from: None,
                to: BehaviorKind::Search
            }]
        );
    }

    #[test]
    fn test_unregistered_start_is_rejected() {
        let bus = Arc::new(NotificationBus::new());
        let result = Antagonist::with_behaviors(seeded(), bus, &[BehaviorKind::Idle]);
        assert!(matches!(
            result,
            Err(SetupError::StartUnavailable(BehaviorKind::Search))
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = seeded();
        config.stalk.highest_selection_weight = 2.0;
        let result = Antagonist::new(config, Arc::new(NotificationBus::new()));
        assert!(matches!(result, Err(SetupError::Config(_))));
    }

    #[test]
    fn test_fallback_resolved_against_registered() {
        let mut config = seeded();
        config.antagonist.start_behavior = BehaviorKind::Chase;
        config.antagonist.fallback_priority = vec![
            BehaviorKind::Stalk,
            BehaviorKind::Search,
            BehaviorKind::Search,
            BehaviorKind::Idle,
        ];
        let antagonist = Antagonist::with_behaviors(
            config,
            Arc::new(NotificationBus::new()),
            &[BehaviorKind::Chase, BehaviorKind::Search, BehaviorKind::Idle],
        )
        .expect("valid setup");
        assert_eq!(antagonist.fallback(), &[BehaviorKind::Search, BehaviorKind::Idle]);
    }

    #[test]
    fn test_chase_give_up_falls_back() {
        let mut world = TestWorld::new();
        world.spawn_target(Vec3::new(0.0, 0.0, 10.0));
        let mut config = seeded();
        config.antagonist.start_behavior = BehaviorKind::Chase;
        config.antagonist.chase_on_sight = false;
        config.chase.strategy = ChaseStrategy::Timed;
        config.chase.max_chase_time = 1.0;
        let mut antagonist =
            Antagonist::new(config, Arc::new(NotificationBus::new())).expect("valid setup");

        antagonist.start(world.ports());
        for _ in 0..5 {
            antagonist.frame_update(world.ports(), 0.5);
        }
        assert_eq!(antagonist.current_behavior(), Some(BehaviorKind::Stalk));
        // Exit restored the base speed
        assert_eq!(world.nav.speed, 3.5);
    }

    #[test]
    fn test_target_not_found_abandons_stalk() {
        let mut world = TestWorld::new();
        let mut config = seeded();
        config.antagonist.start_behavior = BehaviorKind::Stalk;
        let mut antagonist =
            Antagonist::new(config, Arc::new(NotificationBus::new())).expect("valid setup");

        antagonist.start(world.ports());
        for _ in 0..12 {
            antagonist.frame_update(world.ports(), 0.5);
        }
        assert_eq!(antagonist.current_behavior(), Some(BehaviorKind::Search));

        // Search does not need a target and stays put
        for _ in 0..20 {
            antagonist.frame_update(world.ports(), 0.5);
        }
        assert_eq!(antagonist.current_behavior(), Some(BehaviorKind::Search));
    }

    #[test]
    fn test_sighting_engages_after_cooldown() {
        let mut world = TestWorld::new();
        world.spawn_target(Vec3::new(0.0, 0.0, 10.0));
        world.perception.sighted = true;
        let mut config = seeded();
        config.antagonist.start_behavior = BehaviorKind::Chase;
        config.antagonist.reengage_cooldown = 3.0;
        config.chase.strategy = ChaseStrategy::Timed;
        config.chase.max_chase_time = 1.0;
        let mut antagonist =
            Antagonist::new(config, Arc::new(NotificationBus::new())).expect("valid setup");

        antagonist.start(world.ports());
        // Budget spent on the third tick, cooldown starts
        for _ in 0..3 {
            antagonist.frame_update(world.ports(), 0.5);
        }
        assert_eq!(antagonist.current_behavior(), Some(BehaviorKind::Stalk));

        // Still cooling down
        for _ in 0..5 {
            antagonist.frame_update(world.ports(), 0.5);
        }
        assert_eq!(antagonist.current_behavior(), Some(BehaviorKind::Stalk));

        antagonist.frame_update(world.ports(), 0.5);
        assert_eq!(antagonist.current_behavior(), Some(BehaviorKind::Chase));
    }

    #[test]
    fn test_ignores_other_antagonists_notifications() {
        let mut world = TestWorld::new();
        world.spawn_target(Vec3::new(0.0, 0.0, 10.0));
        let bus = Arc::new(NotificationBus::new());
        let mut config = seeded();
        config.antagonist.start_behavior = BehaviorKind::Chase;
        config.antagonist.chase_on_sight = false;
        let mut antagonist = Antagonist::new(config, Arc::clone(&bus)).expect("valid setup");

        antagonist.start(world.ports());
        bus.publish(EntityId::new(), NotificationKind::ChaseStopped);
        antagonist.frame_update(world.ports(), 0.1);
        assert_eq!(antagonist.current_behavior(), Some(BehaviorKind::Chase));
    }

    #[test]
    fn test_disabled_fallback_is_skipped() {
        let mut world = TestWorld::new();
        world.spawn_target(Vec3::new(0.0, 0.0, 10.0));
        let mut config = seeded();
        config.antagonist.start_behavior = BehaviorKind::Chase;
        config.antagonist.chase_on_sight = false;
        config.chase.strategy = ChaseStrategy::Timed;
        config.chase.max_chase_time = 0.1;
        let mut antagonist =
            Antagonist::new(config, Arc::new(NotificationBus::new())).expect("valid setup");
        antagonist.machine_mut().set_enabled(BehaviorKind::Stalk, false);

        antagonist.start(world.ports());
        antagonist.frame_update(world.ports(), 0.5);
        assert_eq!(antagonist.current_behavior(), Some(BehaviorKind::Search));
    }
}
