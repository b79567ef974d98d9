/// Axis-aligned bounding boxes for broad-phase culling.
///
/// Subsets and solitary meshes carry an Aabb in their local space. The
/// scanner expands it by the detection radius and rejects containers
/// whose expanded box does not contain the detection center.

use glam::Vec3;

// ===== AABB =====

/// Axis-Aligned Bounding Box
///
/// Stored in the owning container's local space. Expanded by the
/// detection radius at scan time (Minkowski sum with the sphere, per
/// axis), which makes the contains-center test exactly conservative:
/// it never rejects a container the narrow phase would accept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner (x, y, z)
    pub min: Vec3,
    /// Maximum corner (x, y, z)
    pub max: Vec3,
}

impl Aabb {
    /// Create an Aabb from explicit corners.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Compute the tight bounds of a point set.
    ///
    /// Returns `None` for an empty slice.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut min = *first;
        let mut max = *first;
        for p in rest {
            min = min.min(*p);
            max = max.max(*p);
        }
        Some(Self { min, max })
    }

    /// Return this box grown by `margin` on every side.
    ///
    /// `expanded(radius).contains_point(center)` is the broad-phase test:
    /// any sphere of that radius intersecting the box has its center
    /// inside the expanded box.
    pub fn expanded(&self, margin: f32) -> Aabb {
        Aabb {
            min: self.min - Vec3::splat(margin),
            max: self.max + Vec3::splat(margin),
        }
    }

    /// Test if a point lies inside (or on the surface of) this box.
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.min.x <= point.x && point.x <= self.max.x
        && self.min.y <= point.y && point.y <= self.max.y
        && self.min.z <= point.z && point.z <= self.max.z
    }

    /// Test if this box overlaps (or touches) another box.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x
        && self.min.y <= other.max.y && self.max.y >= other.min.y
        && self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Center point of the box.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

#[cfg(test)]
#[path = "bounds_tests.rs"]
mod tests;
