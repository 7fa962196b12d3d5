//! Scripted target walking a fixed route.

use glam::Vec3;
use nightshade_ai::TargetPose;
use nightshade_common::{EntityId, Frustum};

use crate::config::TargetConfig;

/// A target that walks its route and looks where it walks.
#[derive(Debug, Clone)]
pub struct ScriptedTarget {
    id: EntityId,
    config: TargetConfig,
    position: Vec3,
    look: Vec3,
    heading: Vec3,
    next: usize,
    elapsed: f32,
}

impl ScriptedTarget {
    /// Places the target at the start of its route.
    #[must_use]
    pub fn new(config: TargetConfig) -> Self {
        let position = config.route.first().copied().unwrap_or(Vec3::ZERO);
        let look = config
            .route
            .get(1)
            .and_then(|next| (*next - position).try_normalize())
            .unwrap_or(Vec3::NEG_Z);
        Self {
            id: EntityId::new(),
            config,
            position,
            look,
            heading: Vec3::ZERO,
            next: 1,
            elapsed: 0.0,
        }
    }

    /// Target id.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Feet position.
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.position
    }

    /// Whether the target still exists.
    #[must_use]
    pub fn alive(&self) -> bool {
        self.config.despawn_after.map_or(true, |at| self.elapsed < at)
    }

    /// Walks the route for `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        self.elapsed += dt;
        self.heading = Vec3::ZERO;

        let mut budget = self.config.speed * dt;
        while budget > 0.0 {
            let Some(&goal) = self.config.route.get(self.next) else {
                break;
            };
            let delta = goal - self.position;
            let distance = delta.length();
            if distance > budget {
                self.heading = delta / distance;
                self.position += self.heading * budget;
                break;
            }

            self.position = goal;
            budget -= distance;
            if let Some(direction) = delta.try_normalize() {
                self.heading = direction;
            }
            self.next += 1;
            if self.next >= self.config.route.len() && self.config.looping {
                self.next = 0;
            }
        }

        if self.heading != Vec3::ZERO {
            self.look = self.heading;
        }
    }

    /// Current pose, `None` once despawned.
    #[must_use]
    pub fn pose(&self) -> Option<TargetPose> {
        self.alive().then(|| TargetPose {
            position: self.position,
            viewpoint: self.position + Vec3::Y * self.config.eye_height,
            look_direction: self.look,
            move_direction: self.heading,
        })
    }

    /// Camera frustum, `None` once despawned.
    #[must_use]
    pub fn frustum(&self) -> Option<Frustum> {
        self.alive().then(|| {
            Frustum::from_view(
                self.position + Vec3::Y * self.config.eye_height,
                self.look,
                Vec3::Y,
                self.config.fov_degrees,
                self.config.aspect,
                self.config.near,
                self.config.far,
            )
        })
    }
}
