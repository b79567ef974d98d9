//! Geometry module — stateless intersection math
//!
//! Pure functions and value types shared by both detection backends.
//! Nothing here is budget-aware; time slicing lives in `detect`.

mod bounds;
mod primitives;

pub use bounds::Aabb;
pub use primitives::{
    point_in_triangle, segment_sphere_intersection, signed_distance_plane_point,
    sphere_triangle_intersection,
};
