/*!
# Mural Intersection Engine

Time-sliced spatial intersection engine for the Mural 3D painting
application.

Each frame, a hand-held tool asks the engine which painted-stroke geometry
(or interactive widgets) lies inside a moving detection sphere. Scanning
tens of thousands of triangles cannot finish in one frame, so the engine
suspends and resumes work across frames under a strict per-call time
budget, using one of two cooperating backends:

- **CPU scanner**: brute-force triangle walk over the canvas' batched
  stroke storage (pools → batches → subsets → triangles) or its flat
  object list, with a resumable cursor and broad-phase bounds culling.
- **GPU coordinator**: an asynchronous, inherently-latent batch query
  against an external accelerated intersection service, double-buffered
  and paced so result consumption also respects the time budget.

The effects of an intersection (deleting, selecting, recoloring a stroke)
are left to the caller through the [`detect::IntersectionHandler`]
callback contract.

## Architecture

- **geometry**: stateless sphere/triangle/segment primitives and AABBs
- **scene**: canvas, batch pools, subsets, widgets, solitary objects
- **detect**: scan cursors, time budget, GPU coordinator, state machine
- **log** / **engine**: pluggable logging behind a process-wide singleton
*/

// Internal modules
mod engine;
mod error;
pub mod detect;
pub mod geometry;
pub mod log;
pub mod scene;

// Main mural namespace module
pub mod mural {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine singleton (logging host)
    pub use crate::engine::Engine;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
        // Note: engine_* macros are NOT re-exported here - they are internal only
    }

    // Geometry sub-module
    pub mod geometry {
        pub use crate::geometry::*;
    }

    // Scene sub-module
    pub mod scene {
        pub use crate::scene::*;
    }

    // Detection sub-module
    pub mod detect {
        pub use crate::detect::*;
    }
}

// Re-export math library at crate root
pub use glam;
