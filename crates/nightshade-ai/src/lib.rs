//! # Nightshade AI
//!
//! Antagonist decision layer for Project Nightshade.
//!
//! This crate decides where a hunting antagonist goes next:
//! - Behavior state machine with fail-safe transitions
//! - Shared behavior primitives (target acquisition, cover and view tests, navmesh sampling)
//! - Waypoint navigation (closest, farthest, sequential approach)
//! - Chase with memory-based and time-boxed pursuit
//! - Stalk with five-factor waypoint scoring and strategic teleports
//! - Search, flee and idle fallbacks
//! - Notification bus for one-shot behavior events
//! - Per-antagonist TOML configuration
//!
//! The engine side (pathfinding, perception, raycasts) is reached only
//! through the traits in [`ports`]; [`mock`] provides in-memory versions.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod antagonist;
pub mod behavior;
pub mod config;
pub mod context;
pub mod events;
pub mod mock;
pub mod ports;
pub mod state_machine;
pub mod waypoint;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::antagonist::*;
    pub use crate::behavior::{
        BehaviorState, ChaseBehavior, FleeBehavior, IdleBehavior, SearchBehavior, StalkBehavior,
        StalkMode, StalkPhase, StalkScorer,
    };
    pub use crate::config::*;
    pub use crate::context::*;
    pub use crate::events::*;
    pub use crate::ports::*;
    pub use crate::state_machine::*;
    pub use crate::waypoint::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_every_kind_builds_its_behavior() {
        let config = BehaviorConfig::default();
        for kind in BehaviorKind::all() {
            assert_eq!(behavior::build(kind, &config).kind(), kind);
        }
    }

    #[test]
    fn test_default_antagonist_setup() {
        let antagonist =
            Antagonist::new(BehaviorConfig::default(), Arc::new(NotificationBus::new()))
                .expect("defaults are valid");
        assert_eq!(
            antagonist.fallback(),
            &[BehaviorKind::Stalk, BehaviorKind::Search, BehaviorKind::Idle]
        );
        assert_eq!(antagonist.current_behavior(), None);
        assert_eq!(antagonist.body().base_speed, 3.5);
    }
}
