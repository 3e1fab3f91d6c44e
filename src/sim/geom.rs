//! Geometry utilities
//!
//! Bounding boxes for transformed objects and the analytic test between two
//! finite cylinders (the saber blades). Everything here is stateless.

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::consts::{GEOM_EPSILON, PARALLEL_EPSILON};

/// Axis-aligned bounding box in world space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Build from two corners in any order
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        let half = half_extents.abs();
        Self {
            min: center - half,
            max: center + half,
        }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Interval overlap on all three axes (touching counts)
    #[inline]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }
}

/// World-space box enclosing a box of `half_extents` centered at `position`
/// and rotated by `orientation`
///
/// Recompute whenever the transform changes.
pub fn bounding_box_from_transform(position: Vec3, orientation: Quat, half_extents: Vec3) -> Aabb {
    let rot = Mat3::from_quat(orientation.normalize());
    // Each world axis extent is the sum of the rotated local extents projected onto it
    let abs = Mat3::from_cols(rot.x_axis.abs(), rot.y_axis.abs(), rot.z_axis.abs());
    let world_half = abs * half_extents.abs();
    Aabb::from_center_half_extents(position, world_half)
}

#[inline]
pub fn box_intersects_box(a: &Aabb, b: &Aabb) -> bool {
    a.intersects(b)
}

/// Center line of a cylinder
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CylinderAxis {
    /// Midpoint of the cylinder
    pub origin: Vec3,
    /// Unit direction along the cylinder
    pub direction: Vec3,
}

/// Axis of a cylinder whose base sits at `position` and which extends
/// `length` along the pose's local up axis
pub fn cylinder_axis(position: Vec3, orientation: Quat, length: f32) -> CylinderAxis {
    let direction = (orientation.normalize() * Vec3::Y).normalize();
    CylinderAxis {
        origin: position + direction * (length * 0.5),
        direction,
    }
}

/// A finite cylinder: axis plus dimensions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cylinder {
    pub axis: CylinderAxis,
    pub length: f32,
    pub radius: f32,
}

impl Cylinder {
    #[inline]
    pub fn half_length(&self) -> f32 {
        self.length * 0.5
    }
}

/// Result of a cylinder-cylinder test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestApproach {
    pub intersects: bool,
    /// Closest point on the first axis (meaningful only when intersecting)
    pub point_a: Vec3,
    /// Closest point on the second axis
    pub point_b: Vec3,
}

impl ClosestApproach {
    pub fn miss() -> Self {
        Self {
            intersects: false,
            point_a: Vec3::ZERO,
            point_b: Vec3::ZERO,
        }
    }

    fn hit(point_a: Vec3, point_b: Vec3) -> Self {
        Self {
            intersects: true,
            point_a,
            point_b,
        }
    }
}

/// Analytic intersection test between two finite cylinders
///
/// Skew axes: the perpendicular distance between the infinite lines must be
/// within the radius sum, and the closest points must lie on both segments.
/// Parallel axes: the lateral distance must be within the radius sum and the
/// segments must overlap along the shared direction.
pub fn closest_approach_segments(a: &Cylinder, b: &Cylinder) -> ClosestApproach {
    let d1 = a.axis.direction;
    let d2 = b.axis.direction;
    let offset = b.axis.origin - a.axis.origin;
    let radius_sum = a.radius + b.radius;

    let cross = d1.cross(d2);
    let sin_theta = cross.length();

    if sin_theta < PARALLEL_EPSILON {
        return parallel_approach(a, b, radius_sum);
    }

    let normal = cross / sin_theta;
    let line_distance = offset.dot(normal).abs();
    if line_distance > radius_sum + GEOM_EPSILON {
        return ClosestApproach::miss();
    }

    // |d1 x d2|^2 instead of 1 - (d1 . d2)^2, which cancels to zero in f32
    let denom = sin_theta * sin_theta;
    let t1 = offset.cross(d2).dot(cross) / denom;
    let t2 = offset.cross(d1).dot(cross) / denom;

    if !t1.is_finite() || !t2.is_finite() {
        return ClosestApproach::miss();
    }
    if t1.abs() > a.half_length() || t2.abs() > b.half_length() {
        return ClosestApproach::miss();
    }

    ClosestApproach::hit(a.axis.origin + d1 * t1, b.axis.origin + d2 * t2)
}

/// Parallel (or nearly parallel) axes, measured along their mean direction
///
/// The segments must overlap along that direction, and the axes must be
/// within the radius sum of each other at the middle of the overlap.
fn parallel_approach(a: &Cylinder, b: &Cylinder, radius_sum: f32) -> ClosestApproach {
    let d1 = a.axis.direction;
    let d2 = if d1.dot(b.axis.direction) < 0.0 {
        -b.axis.direction
    } else {
        b.axis.direction
    };
    let axis = (d1 + d2).normalize();

    let center_a = a.axis.origin.dot(axis);
    let center_b = b.axis.origin.dot(axis);
    let lo = (center_a - a.half_length()).max(center_b - b.half_length());
    let hi = (center_a + a.half_length()).min(center_b + b.half_length());
    if lo > hi + GEOM_EPSILON {
        return ClosestApproach::miss();
    }

    let mid = (lo + hi) * 0.5;
    let point_a = a.axis.origin + d1 * ((mid - center_a) / d1.dot(axis));
    let point_b = b.axis.origin + d2 * ((mid - center_b) / d2.dot(axis));

    if point_a.distance(point_b) > radius_sum + GEOM_EPSILON {
        return ClosestApproach::miss();
    }

    ClosestApproach::hit(point_a, point_b)
}
