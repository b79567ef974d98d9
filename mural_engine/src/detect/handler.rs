/// Intersection callback contract.

use crate::scene::{Canvas, StrokeKey, SubsetKey, WidgetKey};

/// Receiver for intersection hits.
///
/// Tools implement whichever hooks they care about; every hook has a
/// default. The specific hooks (`handle_batched_stroke`,
/// `handle_solitary_object`) default to delegating to `handle_stroke`,
/// so a selection/erase tool only has to override that one method.
///
/// The boolean returns mean "actionable": a false return tells the
/// detector the hit was ignored, and scanning continues within the same
/// time slice instead of finishing the pass early.
pub trait IntersectionHandler {
    /// A paintable stroke was hit. Default: ignore.
    fn handle_stroke(&mut self, _stroke: StrokeKey) {}

    /// A batched stroke subset was hit.
    ///
    /// Default: resolve the owning stroke and delegate to
    /// `handle_stroke`. Returns true (actionable) when the subset still
    /// resolves.
    fn handle_batched_stroke(&mut self, canvas: &Canvas, subset: SubsetKey) -> bool {
        match canvas.subset(subset) {
            Some(s) => {
                self.handle_stroke(s.stroke());
                true
            }
            None => false,
        }
    }

    /// A widget was hit. Default: actionable, no side effect.
    fn handle_widget(&mut self, _canvas: &Canvas, _widget: WidgetKey) -> bool {
        true
    }

    /// A solitary object was hit.
    ///
    /// Default: delegate to `handle_stroke` when the object is a stroke;
    /// otherwise not actionable.
    fn handle_solitary_object(&mut self, canvas: &Canvas, index: usize) -> bool {
        match canvas.solitary_object(index).and_then(|o| o.stroke()) {
            Some(stroke) => {
                self.handle_stroke(stroke);
                true
            }
            None => false,
        }
    }

    /// At least one actionable hit was delivered during the current
    /// detection call. Fired at most once per call, after the hits.
    /// Default: ignore.
    fn intersection_happened_this_frame(&mut self) {}
}
