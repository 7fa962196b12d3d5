//! Interfaces to the engine collaborators the decision layer depends on.
//!
//! Navigation, perception and visibility are owned by the engine; behaviors
//! only ever talk to them through these traits. All calls are synchronous and
//! are expected to return in bounded time.

use glam::Vec3;
use nightshade_common::{EntityId, Frustum, LayerMask, Ray};
use serde::{Deserialize, Serialize};

/// Corner list returned by a path query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavPath {
    /// Path corners from start to end
    pub corners: Vec<Vec3>,
    /// Whether the path reaches the requested end point
    pub complete: bool,
}

impl NavPath {
    /// Creates a complete path through the given corners.
    #[must_use]
    pub fn complete(corners: Vec<Vec3>) -> Self {
        Self {
            corners,
            complete: true,
        }
    }

    /// Sum of the distances between consecutive corners.
    #[must_use]
    pub fn length(&self) -> f32 {
        self.corners
            .windows(2)
            .map(|pair| pair[0].distance(pair[1]))
            .sum()
    }
}

/// Triangle soup of the walkable surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavMeshTriangulation {
    /// Vertex positions
    pub vertices: Vec<Vec3>,
    /// Triangle vertex indices, three per triangle
    pub indices: Vec<u32>,
}

impl NavMeshTriangulation {
    /// Number of complete triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Corner positions of triangle `index`, if its indices are valid.
    #[must_use]
    pub fn triangle(&self, index: usize) -> Option<[Vec3; 3]> {
        let base = index.checked_mul(3)?;
        let ids = self.indices.get(base..base.checked_add(3)?)?;
        Some([
            *self.vertices.get(ids[0] as usize)?,
            *self.vertices.get(ids[1] as usize)?,
            *self.vertices.get(ids[2] as usize)?,
        ])
    }
}

/// Path queries and control of the antagonist's navigation agent.
pub trait NavigationQuery {
    /// Checks whether a complete path exists between two points.
    fn path_valid(&self, from: Vec3, to: Vec3) -> bool;
    /// Computes the path between two points, `None` if no path could be built.
    fn calculate_path(&self, from: Vec3, to: Vec3) -> Option<NavPath>;
    /// Sends the agent towards a destination.
    fn set_destination(&mut self, destination: Vec3);
    /// Moves the agent instantly, bypassing path checks.
    fn teleport(&mut self, position: Vec3);
    /// Whether the agent has reached its last destination.
    fn at_destination(&self) -> bool;
    /// Current agent position.
    fn agent_position(&self) -> Vec3;
    /// Current agent heading (unit length or zero).
    fn agent_forward(&self) -> Vec3;
    /// Current movement speed.
    fn speed(&self) -> f32;
    /// Sets the movement speed.
    fn set_speed(&mut self, speed: f32);
    /// Projects a point onto the walkable surface within `max_distance`.
    fn sample_position(&self, point: Vec3, max_distance: f32) -> Option<Vec3>;
    /// Full triangulation of the walkable surface.
    fn triangulation(&self) -> &NavMeshTriangulation;
}

/// Snapshot of the pursued target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetPose {
    /// Feet position
    pub position: Vec3,
    /// Eye (camera) position
    pub viewpoint: Vec3,
    /// Look direction
    pub look_direction: Vec3,
    /// Movement direction (zero when standing still)
    pub move_direction: Vec3,
}

impl TargetPose {
    /// Pose of a target standing at `position` looking along `look_direction`.
    #[must_use]
    pub fn standing(position: Vec3, eye_height: f32, look_direction: Vec3) -> Self {
        Self {
            position,
            viewpoint: position + Vec3::Y * eye_height,
            look_direction,
            move_direction: Vec3::ZERO,
        }
    }
}

/// Target lookup and sight information.
pub trait Perception {
    /// Attempts to resolve the target this antagonist pursues.
    fn locate_target(&self) -> Option<EntityId>;
    /// Current pose of `target`, `None` once it no longer exists.
    fn target_pose(&self, target: EntityId) -> Option<TargetPose>;
    /// Whether the antagonist's senses currently see the target.
    fn is_target_sighted(&self) -> bool;
}

/// Frustum and raycast queries.
pub trait VisibilityQuery {
    /// View frustum of `viewer`, `None` if it has no camera.
    fn frustum(&self, viewer: EntityId) -> Option<Frustum>;
    /// Whether the ray hits a collider in `mask` within `max_distance`.
    fn raycast(&self, ray: Ray, max_distance: f32, mask: LayerMask) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_length_sums_corners() {
        let path = NavPath::complete(vec![
            Vec3::ZERO,
            Vec3::new(3.0, 0.0, 0.0),
            Vec3::new(3.0, 0.0, 4.0),
        ]);
        assert!((path.length() - 7.0).abs() < 1e-5);
        assert_eq!(NavPath::default().length(), 0.0);
    }

    #[test]
    fn test_triangulation_lookup() {
        let mesh = NavMeshTriangulation {
            vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Z],
            indices: vec![0, 1, 2, 0, 1],
        };
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.triangle(0), Some([Vec3::ZERO, Vec3::X, Vec3::Z]));
        assert_eq!(mesh.triangle(1), None);
    }

    #[test]
    fn test_standing_pose_viewpoint() {
        let pose = TargetPose::standing(Vec3::new(1.0, 0.0, 2.0), 1.7, Vec3::Z);
        assert_eq!(pose.viewpoint, Vec3::new(1.0, 1.7, 2.0));
        assert_eq!(pose.move_direction, Vec3::ZERO);
    }
}
