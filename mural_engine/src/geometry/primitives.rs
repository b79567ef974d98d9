/// Sphere/triangle/segment intersection primitives.
///
/// All functions are pure and operate in whatever space the caller's
/// inputs share (the scanner passes canvas-space or object-local values).

use glam::Vec3;

/// Signed distance from `query` to the plane through `point_on_plane`
/// with unit normal `normal`.
///
/// Positive on the side the normal points toward.
pub fn signed_distance_plane_point(normal: Vec3, point_on_plane: Vec3, query: Vec3) -> f32 {
    normal.dot(query - point_on_plane)
}

/// Test whether `point1` and `point2` lie on the same side of the line
/// through `a` and `b`.
fn same_side(point1: Vec3, point2: Vec3, a: Vec3, b: Vec3) -> bool {
    let cross1 = (b - a).cross(point1 - a);
    let cross2 = (b - a).cross(point2 - a);
    cross1.dot(cross2) >= 0.0
}

/// Test whether `point` lies inside triangle `(a, b, c)`.
///
/// Same-side test against all three edges. The point is assumed to
/// already lie on the triangle's plane.
pub fn point_in_triangle(point: Vec3, a: Vec3, b: Vec3, c: Vec3) -> bool {
    same_side(point, a, b, c) && same_side(point, b, a, c) && same_side(point, c, a, b)
}

/// Test whether the segment from `seg_a` to `seg_b` intersects a sphere.
///
/// Takes the squared radius so callers can precompute it once per frame.
pub fn segment_sphere_intersection(
    seg_a: Vec3,
    seg_b: Vec3,
    sphere_center: Vec3,
    sphere_radius_sq: f32,
) -> bool {
    // Segment start inside the sphere
    let start_to_sphere = sphere_center - seg_a;
    if start_to_sphere.length_squared() < sphere_radius_sq {
        return true;
    }

    // Project the sphere center onto the segment's ray and reject if the
    // projection falls behind the origin
    let segment = seg_b - seg_a;
    let direction = segment.normalize_or_zero();
    let dist_to_center_proj = start_to_sphere.dot(direction);
    if dist_to_center_proj < 0.0 {
        return false;
    }

    // Reject if the projection falls past the end of the segment
    if dist_to_center_proj * dist_to_center_proj > segment.length_squared() {
        return false;
    }

    // Accept if the projected point lies within the sphere
    let projected_point = seg_a + direction * dist_to_center_proj;
    (projected_point - sphere_center).length_squared() <= sphere_radius_sq
}

/// Test whether a sphere intersects triangle `(v0, v1, v2)`.
///
/// Composition:
/// 1. reject if the center is farther from the triangle's plane than the
///    radius;
/// 2. accept if the triangle centroid lies inside the sphere;
/// 3. accept if any edge segment intersects the sphere (covers spheres
///    straddling an edge without containing the projected point);
/// 4. otherwise project the center onto the plane, walk the projection
///    toward the centroid by the chord distance `sin(acos(|d|/r)) * r`,
///    and accept if the walked point lies in the triangle.
///
/// Degenerate (zero-area) triangles fall back to the edge tests alone.
pub fn sphere_triangle_intersection(
    center: Vec3,
    radius: f32,
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
) -> bool {
    let radius_sq = radius * radius;
    let centroid = (v0 + v1 + v2) / 3.0;

    if (centroid - center).length_squared() < radius_sq {
        return true;
    }

    let normal = (v1 - v0).cross(v2 - v0).normalize_or_zero();
    if normal == Vec3::ZERO {
        // Degenerate triangle: no plane, edges are all there is
        return segment_sphere_intersection(v0, v1, center, radius_sq)
            || segment_sphere_intersection(v1, v2, center, radius_sq)
            || segment_sphere_intersection(v2, v0, center, radius_sq);
    }

    let dist_to_plane = signed_distance_plane_point(normal, v0, center);
    if dist_to_plane.abs() >= radius {
        return false;
    }

    if segment_sphere_intersection(v0, v1, center, radius_sq)
        || segment_sphere_intersection(v1, v2, center, radius_sq)
        || segment_sphere_intersection(v2, v0, center, radius_sq)
    {
        return true;
    }

    // Project the center onto the plane
    let plane_intersection = center - normal * dist_to_plane;

    // How far the sphere's cross-section at the plane still reaches
    let norm_angle = (dist_to_plane.abs() / radius).clamp(0.0, 1.0).acos();
    let dist_left = norm_angle.sin() * radius;

    // Walk the projection toward the centroid by that distance
    let to_centroid = (centroid - plane_intersection).normalize_or_zero() * dist_left;
    let test_point = plane_intersection + to_centroid;

    point_in_triangle(test_point, v0, v1, v2)
}

#[cfg(test)]
#[path = "primitives_tests.rs"]
mod tests;
