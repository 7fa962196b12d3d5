//! Hierarchical state machine owning an antagonist's active behavior.
//!
//! States are behavior instances registered once at setup under a
//! [`BehaviorKind`]. Transitions are arbitrary point-to-point requests issued
//! by owner logic; there is no transition table. A request for a behavior
//! that is not registered or is disabled is ignored, so the machine is never
//! left without an active behavior because of a missing reference.

use std::fmt;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::context::BehaviorContext;

/// Kinds of behavior an antagonist can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BehaviorKind {
    /// Stand still
    Idle,
    /// Wander between waypoints and random points
    Search,
    /// Reposition tactically around the target
    Stalk,
    /// Pursue the target
    Chase,
    /// Run to the far side of the level
    Flee,
}

impl BehaviorKind {
    /// Get display name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Search => "search",
            Self::Stalk => "stalk",
            Self::Chase => "chase",
            Self::Flee => "flee",
        }
    }

    /// Whether the behavior is pointless without a resolved target.
    #[must_use]
    pub const fn needs_target(self) -> bool {
        matches!(self, Self::Stalk | Self::Chase)
    }

    /// Get all behavior kinds.
    #[must_use]
    pub const fn all() -> [Self; 5] {
        [Self::Idle, Self::Search, Self::Stalk, Self::Chase, Self::Flee]
    }
}

impl fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Lifecycle hooks every behavior implements.
///
/// `enter` is always preceded by `exit` on the previously active behavior.
pub trait EntityState: fmt::Debug {
    /// Kind this behavior is registered under.
    fn kind(&self) -> BehaviorKind;
    /// Called when the behavior becomes active.
    fn enter(&mut self, ctx: &mut BehaviorContext<'_>);
    /// Called when the behavior stops being active.
    fn exit(&mut self, ctx: &mut BehaviorContext<'_>);
    /// Called once per frame while active.
    fn frame_update(&mut self, ctx: &mut BehaviorContext<'_>);
    /// Called once per physics step while active.
    fn physics_update(&mut self, _ctx: &mut BehaviorContext<'_>) {}
}

/// Registered behavior plus its availability flag.
#[derive(Debug)]
struct StateSlot {
    state: Box<dyn EntityState>,
    enabled: bool,
}

/// Holds at most one active behavior and switches between registered ones.
#[derive(Debug, Default)]
pub struct EntityStateMachine {
    /// All registered behaviors
    states: AHashMap<BehaviorKind, StateSlot>,
    /// Kind of the active behavior
    current: Option<BehaviorKind>,
}

impl EntityStateMachine {
    /// Creates an empty state machine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a behavior, replacing any previous one of the same kind.
    ///
    /// Returns the replaced behavior. Replacing the active behavior does not
    /// call its hooks.
    pub fn register(&mut self, state: Box<dyn EntityState>) -> Option<Box<dyn EntityState>> {
        let kind = state.kind();
        self.states
            .insert(
                kind,
                StateSlot {
                    state,
                    enabled: true,
                },
            )
            .map(|slot| slot.state)
    }

    /// Removes a behavior. If it was active the machine is left without one.
    pub fn remove(&mut self, kind: BehaviorKind) -> Option<Box<dyn EntityState>> {
        self.states.remove(&kind).map(|slot| slot.state)
    }

    /// Enables or disables a registered behavior.
    pub fn set_enabled(&mut self, kind: BehaviorKind, enabled: bool) {
        if let Some(slot) = self.states.get_mut(&kind) {
            slot.enabled = enabled;
        }
    }

    /// Whether `kind` is registered and enabled.
    #[must_use]
    pub fn is_available(&self, kind: BehaviorKind) -> bool {
        self.states.get(&kind).is_some_and(|slot| slot.enabled)
    }

    /// The active behavior, or `None` if it has become unavailable.
    #[must_use]
    pub fn current_state(&self) -> Option<BehaviorKind> {
        self.current.filter(|kind| self.is_available(*kind))
    }

    /// Borrows a registered behavior.
    #[must_use]
    pub fn state(&self, kind: BehaviorKind) -> Option<&dyn EntityState> {
        self.states.get(&kind).map(|slot| slot.state.as_ref())
    }

    /// Sets the first active behavior and enters it, without any exit call.
    ///
    /// Does nothing if `kind` is unavailable.
    pub fn initialize(&mut self, kind: BehaviorKind, ctx: &mut BehaviorContext<'_>) -> bool {
        let Some(slot) = self.states.get_mut(&kind).filter(|slot| slot.enabled) else {
            debug!(%kind, "initialize ignored, behavior unavailable");
            return false;
        };
        self.current = Some(kind);
        slot.state.enter(ctx);
        true
    }

    /// Exits the active behavior and enters `kind`.
    ///
    /// Ignored if `kind` is unavailable; the current behavior stays active.
    pub fn change_state(&mut self, kind: BehaviorKind, ctx: &mut BehaviorContext<'_>) -> bool {
        if !self.is_available(kind) {
            debug!(%kind, current = ?self.current, "transition ignored, behavior unavailable");
            return false;
        }

        if let Some(previous) = self.current_state() {
            if let Some(slot) = self.states.get_mut(&previous) {
                slot.state.exit(ctx);
            }
        }

        trace!(from = ?self.current, to = %kind, "transition");
        self.current = Some(kind);
        if let Some(slot) = self.states.get_mut(&kind) {
            slot.state.enter(ctx);
        }
        true
    }

    /// Forwards the frame tick to the active behavior.
    pub fn frame_update(&mut self, ctx: &mut BehaviorContext<'_>) {
        if let Some(slot) = self.active_slot_mut() {
            slot.state.frame_update(ctx);
        }
    }

    /// Forwards the physics tick to the active behavior.
    pub fn physics_update(&mut self, ctx: &mut BehaviorContext<'_>) {
        if let Some(slot) = self.active_slot_mut() {
            slot.state.physics_update(ctx);
        }
    }

    fn active_slot_mut(&mut self) -> Option<&mut StateSlot> {
        let kind = self.current?;
        self.states.get_mut(&kind).filter(|slot| slot.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::TestWorld;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records every hook call as "<kind>:<hook>".
    #[derive(Debug)]
    struct SpyState {
        kind: BehaviorKind,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl SpyState {
        fn boxed(kind: BehaviorKind, log: &Arc<Mutex<Vec<String>>>) -> Box<dyn EntityState> {
            Box::new(Self {
                kind,
                log: Arc::clone(log),
            })
        }

        fn record(&self, hook: &str) {
            self.log.lock().push(format!("{}:{hook}", self.kind));
        }
    }

    impl EntityState for SpyState {
        fn kind(&self) -> BehaviorKind {
            self.kind
        }
        fn enter(&mut self, _ctx: &mut BehaviorContext<'_>) {
            self.record("enter");
        }
        fn exit(&mut self, _ctx: &mut BehaviorContext<'_>) {
            self.record("exit");
        }
        fn frame_update(&mut self, _ctx: &mut BehaviorContext<'_>) {
            self.record("frame");
        }
        fn physics_update(&mut self, _ctx: &mut BehaviorContext<'_>) {
            self.record("physics");
        }
    }

    fn machine_with(
        kinds: &[BehaviorKind],
    ) -> (EntityStateMachine, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut machine = EntityStateMachine::new();
        for &kind in kinds {
            machine.register(SpyState::boxed(kind, &log));
        }
        (machine, log)
    }

    #[test]
    fn test_initialize_enters_without_exit() {
        let (mut machine, log) = machine_with(&[BehaviorKind::Idle]);
        let mut world = TestWorld::new();
        let mut ctx = world.context(0.016);

        assert!(machine.initialize(BehaviorKind::Idle, &mut ctx));
        assert_eq!(machine.current_state(), Some(BehaviorKind::Idle));
        assert_eq!(*log.lock(), vec!["idle:enter"]);
    }

    #[test]
    fn test_initialize_unavailable_is_noop() {
        let (mut machine, log) = machine_with(&[BehaviorKind::Idle]);
        machine.set_enabled(BehaviorKind::Idle, false);
        let mut world = TestWorld::new();
        let mut ctx = world.context(0.016);

        assert!(!machine.initialize(BehaviorKind::Idle, &mut ctx));
        assert!(!machine.initialize(BehaviorKind::Chase, &mut ctx));
        assert_eq!(machine.current_state(), None);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_change_state_exits_then_enters() {
        let (mut machine, log) = machine_with(&[BehaviorKind::Search, BehaviorKind::Chase]);
        let mut world = TestWorld::new();
        let mut ctx = world.context(0.016);

        machine.initialize(BehaviorKind::Search, &mut ctx);
        machine.change_state(BehaviorKind::Chase, &mut ctx);
        machine.change_state(BehaviorKind::Search, &mut ctx);

        assert_eq!(
            *log.lock(),
            vec![
                "search:enter",
                "search:exit",
                "chase:enter",
                "chase:exit",
                "search:enter"
            ]
        );
    }

    #[test]
    fn test_reject_unavailable_keeps_current() {
        for kind in BehaviorKind::all() {
            let (mut machine, _log) = machine_with(&BehaviorKind::all());
            let mut world = TestWorld::new();
            let mut ctx = world.context(0.016);
            machine.initialize(kind, &mut ctx);

            let other = BehaviorKind::all()
                .into_iter()
                .find(|k| *k != kind)
                .expect("at least two kinds");
            machine.set_enabled(other, false);
            assert!(!machine.change_state(other, &mut ctx));
            assert_eq!(machine.current_state(), Some(kind));

            machine.remove(other);
            assert!(!machine.change_state(other, &mut ctx));
            assert_eq!(machine.current_state(), Some(kind));
        }
    }

    #[test]
    fn test_current_state_none_after_disable() {
        let (mut machine, log) = machine_with(&[BehaviorKind::Stalk, BehaviorKind::Idle]);
        let mut world = TestWorld::new();
        let mut ctx = world.context(0.016);

        machine.initialize(BehaviorKind::Stalk, &mut ctx);
        machine.set_enabled(BehaviorKind::Stalk, false);
        assert_eq!(machine.current_state(), None);

        // Ticks are not forwarded to an unavailable behavior
        machine.frame_update(&mut ctx);
        machine.physics_update(&mut ctx);

        // Nothing to exit, so the next transition only enters
        machine.change_state(BehaviorKind::Idle, &mut ctx);
        assert_eq!(*log.lock(), vec!["stalk:enter", "idle:enter"]);
    }

    #[test]
    fn test_ticks_forward_to_active_state() {
        let (mut machine, log) = machine_with(&[BehaviorKind::Flee]);
        let mut world = TestWorld::new();
        let mut ctx = world.context(0.016);

        machine.frame_update(&mut ctx);
        machine.initialize(BehaviorKind::Flee, &mut ctx);
        machine.frame_update(&mut ctx);
        machine.physics_update(&mut ctx);

        assert_eq!(*log.lock(), vec!["flee:enter", "flee:frame", "flee:physics"]);
    }

    #[test]
    fn test_every_enter_paired_with_prior_exit() {
        let (mut machine, log) = machine_with(&BehaviorKind::all());
        let mut world = TestWorld::new();
        let mut ctx = world.context(0.016);
        let mut rng = fastrand::Rng::with_seed(3);

        machine.initialize(BehaviorKind::Idle, &mut ctx);
        for _ in 0..200 {
            let kind = BehaviorKind::all()[rng.usize(..5)];
            machine.change_state(kind, &mut ctx);
        }

        let entries = log.lock();
        let mut active: Option<String> = None;
        for entry in entries.iter() {
            let (kind, hook) = entry.split_once(':').expect("kind:hook");
            match hook {
                "exit" => {
                    assert_eq!(active.as_deref(), Some(kind));
                    active = None;
                },
                "enter" => {
                    assert!(active.is_none(), "enter without prior exit: {entry}");
                    active = Some(kind.to_string());
                },
                _ => {},
            }
        }
    }

    #[test]
    fn test_register_replaces_existing() {
        let (mut machine, log) = machine_with(&[BehaviorKind::Idle]);
        let replaced = machine.register(SpyState::boxed(BehaviorKind::Idle, &log));
        assert!(replaced.is_some());
        assert!(machine.state(BehaviorKind::Idle).is_some());
        assert!(machine.state(BehaviorKind::Chase).is_none());
    }
}
