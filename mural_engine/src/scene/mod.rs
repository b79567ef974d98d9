//! Scene geometry module
//!
//! The data the detection engine reads: canvases (spatial partitions)
//! holding batched stroke storage (pools → batches → subsets), widgets,
//! and non-batched solitary objects. The engine only ever reads this
//! hierarchy; painting tools mutate it between frames.

mod batch;
mod canvas;

pub use batch::{
    Batch, BatchPool, BatchRef, BatchSubset, Stroke,
    StrokeKey, SubsetKey, WidgetKey,
};
pub use canvas::{Canvas, CanvasId, LayerMask, Pose, SolitaryObject, Widget};
