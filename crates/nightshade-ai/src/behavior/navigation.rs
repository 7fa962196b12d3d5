//! Waypoint navigation helpers shared by every waypoint-driven behavior.

use glam::Vec3;
use nightshade_common::angle_degrees;
use tracing::{debug, error};

use super::base::BehaviorState;
use crate::context::BehaviorContext;
use crate::waypoint::Waypoint;

/// True when no candidate lies meaningfully ahead of `forward`.
///
/// A candidate is ahead when the dot product of `forward` and the unit
/// direction towards it exceeds `threshold`. An empty set is never ahead.
#[must_use]
pub fn cannot_move_forward(
    forward: Vec3,
    position: Vec3,
    candidates: &[Waypoint],
    threshold: f32,
) -> bool {
    candidates.iter().all(|wp| {
        let direction = (wp.position - position).normalize_or_zero();
        forward.dot(direction) <= threshold
    })
}

impl BehaviorState {
    /// The `count` waypoints closest to `around` (the antagonist when `None`).
    #[must_use]
    pub fn get_closest_waypoints(
        &self,
        ctx: &BehaviorContext<'_>,
        count: usize,
        exclude_current: bool,
        around: Option<Vec3>,
    ) -> Vec<Waypoint> {
        let reference = around.unwrap_or_else(|| ctx.position());
        let exclude = if exclude_current {
            self.current_waypoint
        } else {
            None
        };
        ctx.waypoints.closest_to(reference, count, exclude)
    }

    /// The `count` waypoints farthest from the antagonist.
    #[must_use]
    pub fn get_farthest_waypoints(&self, ctx: &BehaviorContext<'_>, count: usize) -> Vec<Waypoint> {
        ctx.waypoints.farthest_from(ctx.position(), count, None)
    }

    /// Next waypoint on a step-by-step approach towards `target`.
    ///
    /// Starts from the `max_waypoints` closest waypoints and widens the set
    /// one at a time while none of them lies ahead, never past
    /// `sequential_widen_cap`. The winner minimizes
    /// `heading_angle * heading_weight + distance_to_target * goal_distance_weight`.
    #[must_use]
    pub fn get_sequential_waypoint_towards(
        &self,
        ctx: &BehaviorContext<'_>,
        target: Vec3,
        max_waypoints: usize,
    ) -> Option<Waypoint> {
        let position = ctx.position();
        let forward = ctx.forward();
        let cap = self.nav.sequential_widen_cap.min(ctx.waypoints.len());

        let mut count = max_waypoints.max(1);
        let mut candidates = self.get_closest_waypoints(ctx, count, true, None);
        while count < cap
            && cannot_move_forward(forward, position, &candidates, self.nav.forward_dot_threshold)
        {
            count += 1;
            candidates = self.get_closest_waypoints(ctx, count, true, None);
        }

        let to_target = target - position;
        candidates
            .into_iter()
            .map(|wp| {
                let heading = angle_degrees(to_target, wp.position - position);
                let score = heading * self.nav.heading_weight
                    + wp.distance_to(target) * self.nav.goal_distance_weight;
                (score, wp)
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, wp)| wp)
    }

    /// Uniform pick from `list`, skipping the current waypoint when asked.
    ///
    /// Lists of zero or one entries short-circuit without exclusion.
    pub fn random_waypoint(
        &self,
        ctx: &mut BehaviorContext<'_>,
        list: &[Waypoint],
        exclude_current: bool,
    ) -> Option<Waypoint> {
        if list.len() <= 1 {
            return list.first().copied();
        }

        let pool: Vec<Waypoint> = list
            .iter()
            .copied()
            .filter(|wp| !exclude_current || Some(wp.id) != self.current_waypoint)
            .collect();
        if pool.is_empty() {
            return list.first().copied();
        }
        Some(pool[ctx.rng.usize(..pool.len())])
    }

    /// Sends the agent to `waypoint`.
    ///
    /// With `verify_path`, an unreachable waypoint is swapped for a random
    /// reachable one; if `move_retry_attempts` draws find none, no movement
    /// command is issued. Returns the waypoint actually moved to.
    pub fn move_to_waypoint(
        &mut self,
        ctx: &mut BehaviorContext<'_>,
        waypoint: Waypoint,
        verify_path: bool,
    ) -> Option<Waypoint> {
        let mut destination = waypoint;

        if verify_path && !self.is_path_valid(ctx, destination.position) {
            let graph = ctx.waypoints;
            let mut replacement = None;
            for _ in 0..self.nav.move_retry_attempts {
                let Some(candidate) = self.random_waypoint(ctx, graph.as_slice(), true) else {
                    break;
                };
                if self.is_path_valid(ctx, candidate.position) {
                    replacement = Some(candidate);
                    break;
                }
            }

            match replacement {
                Some(candidate) => {
                    debug!(
                        entity = %ctx.entity,
                        requested = %waypoint.id,
                        chosen = %candidate.id,
                        "waypoint unreachable, moving to replacement"
                    );
                    destination = candidate;
                },
                None => {
                    error!(
                        entity = %ctx.entity,
                        waypoint = %waypoint.id,
                        attempts = self.nav.move_retry_attempts,
                        "no reachable waypoint found"
                    );
                    return None;
                },
            }
        }

        self.current_waypoint = Some(destination.id);
        self.issue_destination(ctx, destination.position);
        Some(destination)
    }

    /// Relocates the agent to `waypoint` instantly, without path checks.
    pub fn teleport_to_waypoint(&mut self, ctx: &mut BehaviorContext<'_>, waypoint: Waypoint) {
        ctx.nav.teleport(waypoint.position);
        self.current_waypoint = Some(waypoint.id);
        self.clear_destination();
    }
}
