//! Five-factor waypoint scoring for stalking.
//!
//! Each candidate waypoint around the target gets a composite score:
//!
//! ```text
//! score = Wv*visibility*Pm + Wc*cover*Pm + Wl*low_exposure*Pm
//!       + Wp*proximity*Am + Wa*ambush*Am
//!       + shortest_path_bonus
//! ```
//!
//! `Pm` is the passive multiplier while passive (1 otherwise) and `Am` the
//! aggressive multiplier while aggressive (1 otherwise). Selection takes the
//! best candidate with probability `highest_selection_weight`, otherwise the
//! runner-up.

use glam::Vec3;
use nightshade_common::{remap_clamped, Aabb, Frustum, LayerMask};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::base::BehaviorState;
use crate::config::StalkConfig;
use crate::context::BehaviorContext;
use crate::ports::TargetPose;
use crate::waypoint::Waypoint;

/// Tactical posture of a stalking antagonist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StalkMode {
    /// Favors hiding: visibility, cover and exposure are boosted
    #[default]
    Passive,
    /// Favors pressure: proximity and ambush are boosted
    Aggressive,
}

/// Individual sub-scores of one candidate, before weighting.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FactorScores {
    /// Outside the target's view
    pub visibility: f32,
    /// Behind cover from the target's viewpoint
    pub cover: f32,
    /// On the antagonist's side of the target
    pub low_exposure: f32,
    /// Close to the target
    pub proximity: f32,
    /// Where the target is heading or looking
    pub ambush: f32,
    /// Flat bonus when this candidate has the shortest path
    pub path_bonus: f32,
}

/// A candidate with its composite score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredWaypoint {
    /// Candidate waypoint
    pub waypoint: Waypoint,
    /// Composite score, higher is better
    pub score: f32,
    /// Sub-scores that produced it
    pub factors: FactorScores,
    /// Whether the candidate is inside the target's view frustum
    pub in_view: bool,
}

/// Scores and selects strategic waypoints around a target.
#[derive(Debug, Clone)]
pub struct StalkScorer {
    config: StalkConfig,
    cover_mask: LayerMask,
}

impl StalkScorer {
    /// Creates a scorer.
    #[must_use]
    pub fn new(config: &StalkConfig, cover_mask: LayerMask) -> Self {
        Self {
            config: config.clone(),
            cover_mask,
        }
    }

    /// `(Pm, Am)` for a mode.
    #[must_use]
    pub fn mode_multipliers(&self, mode: StalkMode) -> (f32, f32) {
        match mode {
            StalkMode::Passive => (self.config.passive_multiplier, 1.0),
            StalkMode::Aggressive => (1.0, self.config.aggressive_multiplier),
        }
    }

    /// Visibility sub-score.
    #[must_use]
    pub fn visibility_score(&self, in_view: bool) -> f32 {
        if in_view {
            0.0
        } else {
            self.config.not_visible_score
        }
    }

    /// Proximity sub-score, falling linearly to the bottom of the range at
    /// `max_distance`.
    #[must_use]
    pub fn proximity_score(&self, distance: f32) -> f32 {
        let range = self.config.score_range;
        remap_clamped(distance, self.config.max_distance, 0.0, range.min, range.max)
    }

    /// Ambush sub-score: alignment of the waypoint with where the target is
    /// moving and looking.
    #[must_use]
    pub fn ambush_score(&self, pose: &TargetPose, waypoint: Vec3) -> f32 {
        let intent = (pose.move_direction + pose.look_direction).normalize_or_zero();
        let to_waypoint = (waypoint - pose.position).normalize_or_zero();
        let alignment = intent.dot(to_waypoint);
        if alignment < self.config.ambush_threshold {
            return 0.0;
        }
        let range = self.config.score_range;
        remap_clamped(alignment, -1.0, 1.0, range.min, range.max)
    }

    /// Low-exposure sub-score: zero for waypoints whose approach would cross
    /// the target.
    #[must_use]
    pub fn exposure_score(&self, target: Vec3, agent: Vec3, waypoint: Vec3) -> f32 {
        let to_agent = (agent - target).normalize_or_zero();
        let to_waypoint = (waypoint - target).normalize_or_zero();
        let alignment = to_agent.dot(to_waypoint);
        let threshold = self.config.exposure_threshold;
        if alignment < threshold {
            return 0.0;
        }
        let range = self.config.score_range;
        remap_clamped(alignment, threshold, 1.0, range.min, range.max)
    }

    /// Bounds the antagonist would occupy standing on `waypoint`.
    fn bounds_at(ctx: &BehaviorContext<'_>, waypoint: Vec3) -> Aabb {
        let extents = ctx.body.half_extents;
        Aabb::new(waypoint + Vec3::Y * extents.y, extents)
    }

    fn in_view(
        base: &BehaviorState,
        ctx: &BehaviorContext<'_>,
        frustum: Option<&Frustum>,
        waypoint: Vec3,
    ) -> bool {
        match (base.target(), frustum) {
            (Some(target), Some(frustum)) => {
                let bounds = Self::bounds_at(ctx, waypoint);
                base.within_view_frustum(ctx, target, &bounds, Some(frustum))
            },
            _ => false,
        }
    }

    fn behind_cover(
        &self,
        base: &BehaviorState,
        ctx: &BehaviorContext<'_>,
        pose: &TargetPose,
        waypoint: Vec3,
    ) -> bool {
        base.behind_cover(
            ctx,
            pose.viewpoint,
            waypoint,
            Vec3::Y * self.config.cover_ray_height,
            self.cover_mask,
        )
    }

    /// The `count` waypoints closest to the target, excluding the current one.
    ///
    /// With hidden repositioning only waypoints outside the target's view and
    /// behind cover survive.
    #[must_use]
    pub fn candidates(
        &self,
        base: &BehaviorState,
        ctx: &BehaviorContext<'_>,
        pose: &TargetPose,
        count: usize,
    ) -> Vec<Waypoint> {
        let closest = base.get_closest_waypoints(ctx, count, true, Some(pose.position));
        if !self.config.hidden_repositioning {
            return closest;
        }

        let frustum = base.target().and_then(|target| ctx.visibility.frustum(target));
        closest
            .into_iter()
            .filter(|wp| {
                !Self::in_view(base, ctx, frustum.as_ref(), wp.position)
                    && self.behind_cover(base, ctx, pose, wp.position)
            })
            .collect()
    }

    /// Scores `candidates` and returns them best first.
    ///
    /// Ties keep candidate order.
    #[must_use]
    pub fn score_candidates(
        &self,
        base: &BehaviorState,
        ctx: &BehaviorContext<'_>,
        pose: &TargetPose,
        candidates: &[Waypoint],
        mode: StalkMode,
    ) -> Vec<ScoredWaypoint> {
        let weights = self.config.weights;
        let (pm, am) = self.mode_multipliers(mode);
        let agent = ctx.position();
        let frustum = base.target().and_then(|target| ctx.visibility.frustum(target));

        let shortest = candidates
            .iter()
            .enumerate()
            .filter_map(|(i, wp)| {
                ctx.nav
                    .calculate_path(wp.position, pose.position)
                    .filter(|path| path.complete)
                    .map(|path| (i, path.length()))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i);

        let mut scored: Vec<ScoredWaypoint> = candidates
            .iter()
            .enumerate()
            .map(|(i, wp)| {
                let in_view = Self::in_view(base, ctx, frustum.as_ref(), wp.position);
                let factors = FactorScores {
                    visibility: self.visibility_score(in_view),
                    cover: if self.behind_cover(base, ctx, pose, wp.position) {
                        1.0
                    } else {
                        0.0
                    },
                    low_exposure: self.exposure_score(pose.position, agent, wp.position),
                    proximity: self.proximity_score(wp.distance_to(pose.position)),
                    ambush: self.ambush_score(pose, wp.position),
                    path_bonus: if shortest == Some(i) {
                        self.config.shortest_path_bonus
                    } else {
                        0.0
                    },
                };
                let score = weights.visibility * factors.visibility * pm
                    + weights.cover * factors.cover * pm
                    + weights.low_exposure * factors.low_exposure * pm
                    + weights.proximity * factors.proximity * am
                    + weights.ambush * factors.ambush * am
                    + factors.path_bonus;
                ScoredWaypoint {
                    waypoint: *wp,
                    score,
                    factors,
                    in_view,
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        trace!(
            entity = %ctx.entity,
            ?mode,
            best = ?scored.first().map(|s| (s.waypoint.id, s.score)),
            "scored stalk candidates"
        );
        scored
    }

    /// Picks the best candidate with probability `highest_selection_weight`,
    /// otherwise the runner-up. A single candidate is always returned.
    pub fn select<'s>(
        &self,
        ranked: &'s [ScoredWaypoint],
        rng: &mut fastrand::Rng,
    ) -> Option<&'s ScoredWaypoint> {
        match ranked {
            [] => None,
            [only] => Some(only),
            [best, second, ..] => {
                if rng.f32() < self.config.highest_selection_weight {
                    Some(best)
                } else {
                    Some(second)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AcquisitionConfig, NavigationConfig};
    use nightshade_common::WaypointId;
    use proptest::prelude::*;

    fn scorer() -> StalkScorer {
        StalkScorer::new(&StalkConfig::default(), LayerMask::COVER)
    }

    fn scored(id: u32, score: f32) -> ScoredWaypoint {
        ScoredWaypoint {
            waypoint: Waypoint::new(WaypointId::new(id), Vec3::ZERO),
            score,
            factors: FactorScores::default(),
            in_view: false,
        }
    }

    #[test]
    fn test_mode_multipliers_leave_off_mode_unweighted() {
        let s = scorer();
        assert_eq!(s.mode_multipliers(StalkMode::Passive), (1.5, 1.0));
        assert_eq!(s.mode_multipliers(StalkMode::Aggressive), (1.0, 1.5));
    }

    #[test]
    fn test_proximity_bounds() {
        let s = scorer();
        assert_eq!(s.proximity_score(0.0), 1.0);
        assert_eq!(s.proximity_score(25.0), 0.0);
        assert_eq!(s.proximity_score(40.0), 0.0);
        assert!((s.proximity_score(12.5) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_ambush_threshold() {
        let s = scorer();
        let pose = TargetPose::standing(Vec3::ZERO, 1.7, Vec3::Z);
        // Straight ahead of the target's gaze
        assert!((s.ambush_score(&pose, Vec3::new(0.0, 0.0, 5.0)) - 1.0).abs() < 1e-5);
        // Perpendicular, below threshold
        assert_eq!(s.ambush_score(&pose, Vec3::new(5.0, 0.0, 0.0)), 0.0);
        // Behind the target
        assert_eq!(s.ambush_score(&pose, Vec3::new(0.0, 0.0, -5.0)), 0.0);
    }

    #[test]
    fn test_exposure_penalizes_crossing_target() {
        let s = scorer();
        let target = Vec3::ZERO;
        let agent = Vec3::new(-10.0, 0.0, 0.0);
        assert!((s.exposure_score(target, agent, Vec3::new(-4.0, 0.0, 0.0)) - 1.0).abs() < 1e-5);
        assert_eq!(s.exposure_score(target, agent, Vec3::new(4.0, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn test_select_single_and_empty() {
        let s = scorer();
        let mut rng = fastrand::Rng::with_seed(1);
        assert!(s.select(&[], &mut rng).is_none());
        let only = [scored(3, 0.1)];
        for _ in 0..20 {
            assert_eq!(s.select(&only, &mut rng).map(|c| c.waypoint.id), Some(WaypointId::new(3)));
        }
    }

    #[test]
    fn test_select_extreme_weights() {
        let ranked = [scored(0, 2.0), scored(1, 1.0), scored(2, 0.5)];
        let mut rng = fastrand::Rng::with_seed(9);

        let mut config = StalkConfig::default();
        config.highest_selection_weight = 1.0;
        let always_best = StalkScorer::new(&config, LayerMask::COVER);
        config.highest_selection_weight = 0.0;
        let always_second = StalkScorer::new(&config, LayerMask::COVER);

        for _ in 0..100 {
            assert_eq!(always_best.select(&ranked, &mut rng).map(|c| c.waypoint.id.raw()), Some(0));
            assert_eq!(
                always_second.select(&ranked, &mut rng).map(|c| c.waypoint.id.raw()),
                Some(1)
            );
        }
    }

    #[test]
    fn test_hidden_repositioning_filters_candidates() {
        use crate::mock::TestWorld;
        use crate::waypoint::WaypointGraph;

        let mut world = TestWorld::new();
        let target = world.spawn_target(Vec3::ZERO);
        world.visibility.set_frustum(
            target,
            Frustum::from_view(Vec3::Y * 1.7, Vec3::NEG_Z, Vec3::Y, 60.0, 1.0, 0.1, 100.0),
        );
        // Wall behind the target, it looks along -Z
        world.visibility.add_collider(
            Aabb::new(Vec3::new(0.0, 1.0, 4.0), Vec3::new(3.0, 1.0, 0.2)),
            LayerMask::COVER,
        );
        world.waypoints = WaypointGraph::from_positions([
            Vec3::new(0.0, 0.0, 6.0),  // behind wall, out of view
            Vec3::new(0.0, 0.0, -6.0), // in plain view
            Vec3::new(6.0, 0.0, 0.0),  // out of view, no cover
        ]);

        let mut config = StalkConfig::default();
        config.hidden_repositioning = true;
        let s = StalkScorer::new(&config, LayerMask::COVER);
        let mut base =
            BehaviorState::new(&AcquisitionConfig::default(), &NavigationConfig::default());
        let mut ctx = world.context(0.016);
        base.enter(&mut ctx);
        let pose = base.target_pose(&ctx).expect("target spawned");

        let hidden = s.candidates(&base, &ctx, &pose, 3);
        assert_eq!(hidden.iter().map(|wp| wp.id.raw()).collect::<Vec<_>>(), vec![0]);
    }

    proptest! {
        #[test]
        fn prop_proximity_strictly_decreasing(a in 0.0f32..24.0, delta in 0.01f32..1.0) {
            let s = scorer();
            let b = (a + delta).min(24.99);
            prop_assume!(b > a);
            prop_assert!(s.proximity_score(b) < s.proximity_score(a));
        }

        #[test]
        fn prop_out_of_view_never_worse(score in 0.0f32..5.0) {
            let mut config = StalkConfig::default();
            config.not_visible_score = score;
            let s = StalkScorer::new(&config, LayerMask::COVER);
            prop_assert!(s.visibility_score(false) >= s.visibility_score(true));
        }
    }
}
