//! Shared primitives every behavior builds on.
//!
//! [`BehaviorState`] is embedded in each concrete behavior and owns target
//! acquisition, movement-completion tracking and the geometry queries that
//! are backed by the engine ports.

use glam::Vec3;
use nightshade_common::{point_in_triangle, Aabb, EntityId, Frustum, LayerMask, Ray, WaypointId};
use tracing::{debug, trace, warn};

use crate::config::{AcquisitionConfig, NavigationConfig};
use crate::context::BehaviorContext;
use crate::events::NotificationKind;
use crate::ports::TargetPose;

/// Target tracking and movement bookkeeping shared by all behaviors.
#[derive(Debug, Clone)]
pub struct BehaviorState {
    /// Resolved target, if any
    target: Option<EntityId>,
    /// Seconds spent without a resolved target
    acquisition_elapsed: f32,
    /// Timeout before `TargetNotFound` is raised
    target_timeout: f32,
    /// `TargetNotFound` already raised for the current search
    target_not_found_raised: bool,
    /// A movement command is in flight
    destination_pending: bool,
    /// Waypoint the last movement command went to
    pub(crate) current_waypoint: Option<WaypointId>,
    /// Navigation tuning
    pub(crate) nav: NavigationConfig,
}

impl BehaviorState {
    /// Creates the shared state from configuration.
    #[must_use]
    pub fn new(acquisition: &AcquisitionConfig, navigation: &NavigationConfig) -> Self {
        Self {
            target: None,
            acquisition_elapsed: 0.0,
            target_timeout: acquisition.target_timeout,
            target_not_found_raised: false,
            destination_pending: false,
            current_waypoint: None,
            nav: navigation.clone(),
        }
    }

    /// Resolved target, if any.
    #[must_use]
    pub const fn target(&self) -> Option<EntityId> {
        self.target
    }

    /// Waypoint the antagonist last moved or teleported to.
    #[must_use]
    pub const fn current_waypoint(&self) -> Option<WaypointId> {
        self.current_waypoint
    }

    /// Seconds spent so far without a resolved target.
    #[must_use]
    pub const fn acquisition_elapsed(&self) -> f32 {
        self.acquisition_elapsed
    }

    /// Activation hook: restarts the acquisition timer and tries to resolve
    /// the target if it is not already known.
    pub fn enter(&mut self, ctx: &mut BehaviorContext<'_>) {
        self.acquisition_elapsed = 0.0;
        self.target_not_found_raised = false;
        self.destination_pending = false;
        if self.target.is_none() {
            self.target = ctx.perception.locate_target();
        }
    }

    /// Frame hook: advances target acquisition and detects the completion
    /// of the pending movement command.
    ///
    /// Returns true on the tick the agent arrives at its destination.
    pub fn frame_update(&mut self, ctx: &mut BehaviorContext<'_>) -> bool {
        self.update_acquisition(ctx);
        self.poll_arrival(ctx)
    }

    fn update_acquisition(&mut self, ctx: &mut BehaviorContext<'_>) {
        if self.target.is_some() {
            return;
        }

        self.target = ctx.perception.locate_target();
        if let Some(target) = self.target {
            debug!(entity = %ctx.entity, %target, "target resolved");
            self.acquisition_elapsed = 0.0;
            return;
        }

        self.acquisition_elapsed += ctx.dt;
        if !self.target_not_found_raised && self.acquisition_elapsed > self.target_timeout {
            self.target_not_found_raised = true;
            warn!(
                entity = %ctx.entity,
                elapsed = self.acquisition_elapsed,
                "target not found"
            );
            ctx.notify(NotificationKind::TargetNotFound);
        }
    }

    fn poll_arrival(&mut self, ctx: &BehaviorContext<'_>) -> bool {
        if self.destination_pending && ctx.nav.at_destination() {
            self.destination_pending = false;
            trace!(entity = %ctx.entity, "movement command completed");
            return true;
        }
        false
    }

    /// Current pose of the target.
    ///
    /// Forgets the target once it no longer exists, which restarts acquisition.
    pub fn target_pose(&mut self, ctx: &BehaviorContext<'_>) -> Option<TargetPose> {
        let target = self.target?;
        let pose = ctx.perception.target_pose(target);
        if pose.is_none() {
            debug!(entity = %ctx.entity, %target, "target lost");
            self.target = None;
            self.acquisition_elapsed = 0.0;
            self.target_not_found_raised = false;
        }
        pose
    }

    /// Sends the agent towards `destination` and tracks its completion.
    pub fn issue_destination(&mut self, ctx: &mut BehaviorContext<'_>, destination: Vec3) {
        ctx.nav.set_destination(destination);
        self.destination_pending = true;
    }

    /// Cancels tracking of the in-flight movement command.
    pub fn clear_destination(&mut self) {
        self.destination_pending = false;
    }

    /// Whether a movement command is still in flight.
    #[must_use]
    pub const fn is_moving(&self) -> bool {
        self.destination_pending
    }

    /// Whether a complete path leads from the antagonist to `position`.
    #[must_use]
    pub fn is_path_valid(&self, ctx: &BehaviorContext<'_>, position: Vec3) -> bool {
        ctx.nav.path_valid(ctx.position(), position)
    }

    /// Whether something in `mask` blocks the line from `viewpoint` to
    /// `position + offset`.
    #[must_use]
    pub fn behind_cover(
        &self,
        ctx: &BehaviorContext<'_>,
        viewpoint: Vec3,
        position: Vec3,
        offset: Vec3,
        mask: LayerMask,
    ) -> bool {
        Ray::between(viewpoint, position + offset)
            .is_some_and(|(ray, length)| ctx.visibility.raycast(ray, length, mask))
    }

    /// Whether `bounds` intersects the view frustum of `viewer`.
    ///
    /// Pass `planes` to reuse a frustum computed earlier in the same tick;
    /// otherwise it is queried from the viewer on every call.
    #[must_use]
    pub fn within_view_frustum(
        &self,
        ctx: &BehaviorContext<'_>,
        viewer: EntityId,
        bounds: &Aabb,
        planes: Option<&Frustum>,
    ) -> bool {
        match planes {
            Some(frustum) => frustum.intersects_aabb(bounds),
            None => ctx
                .visibility
                .frustum(viewer)
                .is_some_and(|frustum| frustum.intersects_aabb(bounds)),
        }
    }

    /// Whether the antagonist's body is inside the target's view.
    #[must_use]
    pub fn visible_to_target(&self, ctx: &BehaviorContext<'_>, planes: Option<&Frustum>) -> bool {
        let Some(target) = self.target else {
            return false;
        };
        self.within_view_frustum(ctx, target, &ctx.agent_bounds(), planes)
    }

    /// Uniformly random reachable point on the navmesh at least
    /// `min_distance` away from the antagonist.
    ///
    /// Gives up after `navmesh_sample_attempts` rejected samples.
    pub fn find_random_position_on_navmesh(
        &self,
        ctx: &mut BehaviorContext<'_>,
        min_distance: f32,
    ) -> Option<Vec3> {
        let origin = ctx.nav.agent_position();
        let mesh = ctx.nav.triangulation();
        let triangles = mesh.triangle_count();
        if triangles == 0 {
            warn!(entity = %ctx.entity, "navmesh has no triangles");
            return None;
        }

        for _ in 0..self.nav.navmesh_sample_attempts {
            let Some([a, b, c]) = mesh.triangle(ctx.rng.usize(..triangles)) else {
                continue;
            };
            let point = point_in_triangle(a, b, c, ctx.rng.f32(), ctx.rng.f32());
            if point.distance(origin) < min_distance || !ctx.nav.path_valid(origin, point) {
                continue;
            }
            return Some(point);
        }

        debug!(entity = %ctx.entity, min_distance, "navmesh sampling exhausted");
        None
    }

    /// Random navmesh point within `range` of `center` (the antagonist when
    /// `None`).
    ///
    /// With `check_occlusion`, points with an obstacle between the antagonist
    /// and the point are rejected.
    pub fn find_random_position_in_range(
        &self,
        ctx: &mut BehaviorContext<'_>,
        range: f32,
        check_occlusion: bool,
        center: Option<Vec3>,
    ) -> Option<Vec3> {
        let origin = ctx.position();
        let center = center.unwrap_or(origin);
        let eye = Vec3::Y * ctx.body.half_extents.y;

        for _ in 0..self.nav.range_sample_attempts {
            let candidate = center + random_in_unit_sphere(ctx.rng) * range;
            let Some(point) = ctx.nav.sample_position(candidate, range) else {
                continue;
            };
            if check_occlusion {
                let blocked = Ray::between(origin + eye, point + eye).is_some_and(|(ray, length)| {
                    ctx.visibility.raycast(ray, length, self.nav.obstacle_mask)
                });
                if blocked {
                    continue;
                }
            }
            return Some(point);
        }

        debug!(entity = %ctx.entity, range, "range sampling exhausted");
        None
    }
}

/// Uniform point inside the unit sphere, by rejection from the enclosing cube.
fn random_in_unit_sphere(rng: &mut fastrand::Rng) -> Vec3 {
    loop {
        let point = Vec3::new(
            rng.f32() * 2.0 - 1.0,
            rng.f32() * 2.0 - 1.0,
            rng.f32() * 2.0 - 1.0,
        );
        if point.length_squared() <= 1.0 {
            return point;
        }
    }
}
