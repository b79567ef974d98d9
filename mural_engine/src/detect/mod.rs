//! Detection module — the time-sliced intersection engine
//!
//! Per-tool state machine deciding each frame which backend to run (CPU
//! triangle scan or asynchronous GPU batch query), driving it forward by
//! one time slice, and reporting hits through the callback contract.

mod budget;
mod cursor;
mod detector;
mod gpu;
mod handler;

#[cfg(test)]
pub(crate) mod mock_intersector;

pub use budget::TimeBudget;
pub use cursor::{BatchCursor, FlatCursor};
pub use detector::{DetectionConfig, DetectionReport, ResetBehavior, StrokeDetector};
pub use gpu::{BatchHit, BatchIntersector, FutureBatchResult, GpuBatchCoordinator};
pub use handler::IntersectionHandler;
