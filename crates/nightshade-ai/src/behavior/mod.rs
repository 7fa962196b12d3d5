//! Concrete behaviors and the primitives they share.

pub mod base;
pub mod chase;
pub mod flee;
pub mod idle;
pub mod navigation;
pub mod scoring;
pub mod search;
pub mod stalk;

pub use base::BehaviorState;
pub use chase::ChaseBehavior;
pub use flee::FleeBehavior;
pub use idle::IdleBehavior;
pub use navigation::cannot_move_forward;
pub use scoring::{FactorScores, ScoredWaypoint, StalkMode, StalkScorer};
pub use search::SearchBehavior;
pub use stalk::{StalkBehavior, StalkPhase};

use crate::config::BehaviorConfig;
use crate::state_machine::{BehaviorKind, EntityState};

/// Builds the behavior registered under `kind`.
#[must_use]
pub fn build(kind: BehaviorKind, config: &BehaviorConfig) -> Box<dyn EntityState> {
    match kind {
        BehaviorKind::Idle => Box::new(IdleBehavior::new(config)),
        BehaviorKind::Search => Box::new(SearchBehavior::new(config)),
        BehaviorKind::Stalk => Box::new(StalkBehavior::new(config)),
        BehaviorKind::Chase => Box::new(ChaseBehavior::new(config)),
        BehaviorKind::Flee => Box::new(FleeBehavior::new(config)),
    }
}
