//! Standing still.

use tracing::trace;

use super::base::BehaviorState;
use crate::config::BehaviorConfig;
use crate::context::BehaviorContext;
use crate::state_machine::{BehaviorKind, EntityState};

/// Idle behavior, the last resort of every fallback chain.
#[derive(Debug, Clone)]
pub struct IdleBehavior {
    base: BehaviorState,
}

impl IdleBehavior {
    /// Creates an idle behavior.
    #[must_use]
    pub fn new(config: &BehaviorConfig) -> Self {
        Self {
            base: BehaviorState::new(&config.acquisition, &config.navigation),
        }
    }

    /// Shared behavior state.
    #[must_use]
    pub const fn base(&self) -> &BehaviorState {
        &self.base
    }
}

impl EntityState for IdleBehavior {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Idle
    }

    fn enter(&mut self, ctx: &mut BehaviorContext<'_>) {
        self.base.enter(ctx);
        let here = ctx.position();
        self.base.issue_destination(ctx, here);
        trace!(entity = %ctx.entity, "idle");
    }

    fn exit(&mut self, _ctx: &mut BehaviorContext<'_>) {
        self.base.clear_destination();
    }

    fn frame_update(&mut self, ctx: &mut BehaviorContext<'_>) {
        self.base.frame_update(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::TestWorld;
    use glam::Vec3;

    #[test]
    fn test_idle_holds_position() {
        let mut world = TestWorld::new();
        world.nav.position = Vec3::new(3.0, 0.0, 4.0);
        let mut idle = IdleBehavior::new(&BehaviorConfig::default());

        let mut ctx = world.context(0.1);
        idle.enter(&mut ctx);
        idle.frame_update(&mut ctx);
        drop(ctx);
        assert_eq!(world.nav.destinations, vec![Vec3::new(3.0, 0.0, 4.0)]);
        assert_eq!(world.nav.position, Vec3::new(3.0, 0.0, 4.0));
    }
}
