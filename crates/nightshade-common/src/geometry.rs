//! Geometry primitives shared by the navigation and perception layers.
//!
//! Conventions follow a Y-up, right-handed world. Frustum planes store inward
//! facing normals, so a point is inside a plane's half-space when its signed
//! distance is non-negative.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Tolerance below which a direction is treated as degenerate.
pub const DIRECTION_EPSILON: f32 = 1e-6;

/// A plane in Hessian normal form: `dot(normal, p) + distance == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    /// Unit normal
    pub normal: Vec3,
    /// Signed offset from the origin
    pub distance: f32,
}

impl Plane {
    /// Creates a plane from an arbitrary (non-zero) normal and a point on it.
    #[must_use]
    pub fn from_normal_and_point(normal: Vec3, point: Vec3) -> Self {
        let normal = normal.normalize_or_zero();
        Self {
            normal,
            distance: -normal.dot(point),
        }
    }

    /// Signed distance from the plane to a point.
    #[must_use]
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

/// Axis-aligned bounding box stored as center and half extents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Box center
    pub center: Vec3,
    /// Half size along each axis
    pub extents: Vec3,
}

impl Aabb {
    /// Creates a new bounding box.
    #[must_use]
    pub const fn new(center: Vec3, extents: Vec3) -> Self {
        Self { center, extents }
    }

    /// Creates a zero-volume box around a point.
    #[must_use]
    pub const fn point(center: Vec3) -> Self {
        Self::new(center, Vec3::ZERO)
    }

    /// Minimum corner.
    #[must_use]
    pub fn min(&self) -> Vec3 {
        self.center - self.extents
    }

    /// Maximum corner.
    #[must_use]
    pub fn max(&self) -> Vec3 {
        self.center + self.extents
    }

    /// Checks whether a point lies inside (or on) the box.
    #[must_use]
    pub fn contains(&self, point: Vec3) -> bool {
        let min = self.min();
        let max = self.max();
        point.cmpge(min).all() && point.cmple(max).all()
    }

    /// Slab test of a ray segment against the box.
    ///
    /// Returns the entry distance along the ray when it is within `max_distance`.
    #[must_use]
    pub fn ray_hit(&self, ray: &Ray, max_distance: f32) -> Option<f32> {
        let min = self.min();
        let max = self.max();
        let mut t_near = 0.0_f32;
        let mut t_far = max_distance;

        for axis in 0..3 {
            let origin = ray.origin[axis];
            let dir = ray.direction[axis];
            if dir.abs() < DIRECTION_EPSILON {
                if origin < min[axis] || origin > max[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / dir;
            let mut t0 = (min[axis] - origin) * inv;
            let mut t1 = (max[axis] - origin) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_near = t_near.max(t0);
            t_far = t_far.min(t1);
            if t_near > t_far {
                return None;
            }
        }
        Some(t_near)
    }
}

/// Ray with a normalized direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    /// Ray origin
    pub origin: Vec3,
    /// Unit direction
    pub direction: Vec3,
}

impl Ray {
    /// Creates a ray, normalizing the direction.
    #[must_use]
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Builds the ray from `from` towards `to` and the segment length.
    ///
    /// Returns `None` when the two points coincide.
    #[must_use]
    pub fn between(from: Vec3, to: Vec3) -> Option<(Self, f32)> {
        let delta = to - from;
        let length = delta.length();
        if length < DIRECTION_EPSILON {
            return None;
        }
        Some((
            Self {
                origin: from,
                direction: delta / length,
            },
            length,
        ))
    }

    /// Point at distance `t` along the ray.
    #[must_use]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Six-plane view frustum (left, right, bottom, top, near, far).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frustum {
    /// Inward facing planes
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Builds a perspective frustum from a viewer pose.
    ///
    /// `fov_y_degrees` is the full vertical field of view.
    #[must_use]
    pub fn from_view(
        position: Vec3,
        forward: Vec3,
        up: Vec3,
        fov_y_degrees: f32,
        aspect: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let forward = forward.normalize_or_zero();
        let right = forward.cross(up).normalize_or_zero();
        let up = right.cross(forward);

        let half_v = (fov_y_degrees.to_radians() * 0.5).tan();
        let half_h = half_v * aspect;

        let left_edge = forward - right * half_h;
        let right_edge = forward + right * half_h;
        let bottom_edge = forward - up * half_v;
        let top_edge = forward + up * half_v;

        Self {
            planes: [
                Plane::from_normal_and_point(left_edge.cross(up), position),
                Plane::from_normal_and_point(up.cross(right_edge), position),
                Plane::from_normal_and_point(right.cross(bottom_edge), position),
                Plane::from_normal_and_point(top_edge.cross(right), position),
                Plane::from_normal_and_point(forward, position + forward * near),
                Plane::from_normal_and_point(-forward, position + forward * far),
            ],
        }
    }

    /// Tests whether a bounding box is at least partially inside the frustum.
    #[must_use]
    pub fn intersects_aabb(&self, bounds: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            let radius = bounds.extents.dot(plane.normal.abs());
            plane.signed_distance(bounds.center) >= -radius
        })
    }

    /// Tests whether a point is inside the frustum.
    #[must_use]
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.intersects_aabb(&Aabb::point(point))
    }
}

/// Bit mask of collision layers used to filter raycasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerMask(pub u32);

impl LayerMask {
    /// Matches nothing.
    pub const NONE: Self = Self(0);
    /// Matches every layer.
    pub const ALL: Self = Self(u32::MAX);
    /// Default geometry layer.
    pub const DEFAULT: Self = Self(1);
    /// Geometry tagged as cover.
    pub const COVER: Self = Self(1 << 1);
    /// Geometry that blocks movement and sight but is not cover.
    pub const OBSTACLE: Self = Self(1 << 2);

    /// Mask for a single layer index.
    #[must_use]
    pub const fn layer(index: u32) -> Self {
        Self(1 << index)
    }

    /// Union of two masks.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Checks whether any layer of `other` is in this mask.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

/// Linear remap of `value` from `[from_min, from_max]` to `[to_min, to_max]`.
///
/// Not clamped. A degenerate source range maps everything to `to_min`.
#[must_use]
pub fn remap(value: f32, from_min: f32, from_max: f32, to_min: f32, to_max: f32) -> f32 {
    let span = from_max - from_min;
    if span.abs() < f32::EPSILON {
        return to_min;
    }
    to_min + (value - from_min) / span * (to_max - to_min)
}

/// [`remap`] with the result clamped to the target range.
#[must_use]
pub fn remap_clamped(value: f32, from_min: f32, from_max: f32, to_min: f32, to_max: f32) -> f32 {
    let lo = to_min.min(to_max);
    let hi = to_min.max(to_max);
    remap(value, from_min, from_max, to_min, to_max).clamp(lo, hi)
}

/// Unsigned angle between two vectors in degrees, `0` if either is degenerate.
#[must_use]
pub fn angle_degrees(a: Vec3, b: Vec3) -> f32 {
    if a.length_squared() < DIRECTION_EPSILON || b.length_squared() < DIRECTION_EPSILON {
        return 0.0;
    }
    a.angle_between(b).to_degrees()
}

/// Point inside triangle `abc` from two uniform samples in `[0, 1)`.
///
/// Samples whose sum exceeds one are reflected back into the triangle, which
/// keeps the distribution uniform over its area.
#[must_use]
pub fn point_in_triangle(a: Vec3, b: Vec3, c: Vec3, r1: f32, r2: f32) -> Vec3 {
    let (r1, r2) = if r1 + r2 > 1.0 {
        (1.0 - r1, 1.0 - r2)
    } else {
        (r1, r2)
    };
    a + (b - a) * r1 + (c - a) * r2
}

/// Barycentric coordinates `(u, v, w)` of `p` with respect to triangle `abc`.
///
/// Returns `None` for degenerate triangles.
#[must_use]
pub fn barycentric(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Option<(f32, f32, f32)> {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);
    let denom = d00 * d11 - d01 * d01;
    if denom.abs() < f32::EPSILON {
        return None;
    }
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    Some((1.0 - v - w, v, w))
}
