/// Asynchronous GPU batch intersection.
///
/// The actual GPU query lives behind the `BatchIntersector` trait; this
/// module owns the request/consume state machine around it. A request is
/// issued against a snapshot of the scene and its results come back
/// frames later, so every returned key is re-validated against the live
/// canvas before a hit is delivered.

use glam::Vec3;
use rustc_hash::FxHashSet;
use crate::scene::{Canvas, LayerMask, SubsetKey, WidgetKey};
use super::budget::TimeBudget;
use super::handler::IntersectionHandler;

// ===== RESULT TYPES =====

/// One entry of a GPU batch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchHit {
    /// An interactive widget was inside the query sphere
    Widget(WidgetKey),
    /// A batched stroke subset was inside the query sphere
    Subset(SubsetKey),
}

/// Handle to an in-flight GPU query.
///
/// Polled once per detection call; `take_results` may only be called
/// after `is_ready` has returned true, and at most once.
pub trait FutureBatchResult {
    /// Whether the readback has completed
    fn is_ready(&self) -> bool;

    /// Drain the completed results
    fn take_results(&mut self) -> Vec<BatchHit>;
}

/// Backend issuing sphere queries against the GPU copy of the scene.
///
/// Returning None means the backend cannot serve requests right now
/// (no readback support, device lost); batched GPU detection is simply
/// unavailable, not an error.
pub trait BatchIntersector {
    /// Request all subsets and widgets intersecting the world-space
    /// sphere, restricted to the given render layers.
    fn request_batch_intersections(
        &mut self,
        center_ws: Vec3,
        radius_ws: f32,
        max_results: u8,
        layer_mask: LayerMask,
    ) -> Option<Box<dyn FutureBatchResult>>;
}

// ===== COORDINATOR =====

/// Double-buffered request/consume state machine over a BatchIntersector.
///
/// At most one request is in flight at a time. Completed results are
/// swapped into a consumption queue and delivered across subsequent
/// calls under the time budget; the next request goes out as soon as
/// none is pending (the swap call itself excepted), so leftover queue
/// entries drain while the follow-up query is already running.
pub struct GpuBatchCoordinator {
    /// Request awaiting readback, if any
    pending: Option<Box<dyn FutureBatchResult>>,
    /// Completed results being consumed
    queue: Vec<BatchHit>,
    /// Number of queue entries already examined
    consumed: usize,
    /// Result cap passed to the backend
    max_results: u8,
}

impl GpuBatchCoordinator {
    /// Create a coordinator with the given per-request result cap.
    pub fn new(max_results: u8) -> Self {
        Self {
            pending: None,
            queue: Vec::new(),
            consumed: 0,
            max_results,
        }
    }

    /// Whether a request is awaiting readback.
    ///
    /// Detection suppresses position-change resets while this holds, so
    /// results are never matched against a moved query sphere.
    pub fn request_in_flight(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of completed results not yet examined.
    pub fn unconsumed(&self) -> usize {
        self.queue.len().saturating_sub(self.consumed)
    }

    /// Drop the pending request and any unconsumed results.
    pub fn clear(&mut self) {
        self.pending = None;
        self.queue.clear();
        self.consumed = 0;
    }

    /// Drive the state machine by one detection call.
    ///
    /// Polls the pending request, issues a new one whenever none is in
    /// flight (except on the call that just swapped results in, which
    /// paces queries to roughly one every few frames), and consumes
    /// queued results through `handler` under `budget` — leftover
    /// entries keep draining while the next request is already in
    /// flight. At least one queued entry is always examined per call,
    /// so consumption makes progress even under a zero budget;
    /// `times_up` is re-checked only after an actionable hit, since
    /// skipped stale entries cost next to nothing.
    ///
    /// Returns true when at least one actionable hit was delivered.
    pub fn advance(
        &mut self,
        canvas: &Canvas,
        intersector: &mut dyn BatchIntersector,
        center_ws: Vec3,
        radius_ws: f32,
        layer_mask: LayerMask,
        budget: &TimeBudget,
        times_up: &mut bool,
        handler: &mut dyn IntersectionHandler,
    ) -> bool {
        let mut swapped = false;
        if let Some(future) = self.pending.as_mut() {
            if future.is_ready() {
                let raw = future.take_results();
                self.pending = None;

                // The backend may report a subset once per intersecting
                // triangle; collapse duplicates, keeping first-seen order.
                let mut seen: FxHashSet<BatchHit> = FxHashSet::default();
                self.queue = raw.into_iter().filter(|hit| seen.insert(*hit)).collect();
                self.consumed = 0;
                swapped = true;
            }
        }

        if self.pending.is_none() && !swapped {
            self.pending = intersector.request_batch_intersections(
                center_ws,
                radius_ws,
                self.max_results,
                layer_mask,
            );
        }

        self.consume(canvas, budget, times_up, handler)
    }

    /// Deliver queued results until the budget runs out.
    fn consume(
        &mut self,
        canvas: &Canvas,
        budget: &TimeBudget,
        times_up: &mut bool,
        handler: &mut dyn IntersectionHandler,
    ) -> bool {
        let mut any_hit = false;
        while self.consumed < self.queue.len() {
            let hit = self.queue[self.consumed];
            self.consumed += 1;

            // Keys resolve against the live canvas; anything removed or
            // detached since the request was issued is silently skipped.
            let actionable = match hit {
                BatchHit::Subset(key) => match canvas.subset(key) {
                    Some(subset) if !subset.is_stale() && subset.active() => {
                        handler.handle_batched_stroke(canvas, key)
                    }
                    _ => false,
                },
                BatchHit::Widget(key) => match canvas.widget(key) {
                    Some(widget) if widget.active() => handler.handle_widget(canvas, key),
                    _ => false,
                },
            };

            if actionable {
                any_hit = true;
                *times_up = budget.expired();
                if *times_up {
                    break;
                }
            }
        }
        any_hit
    }
}

#[cfg(test)]
#[path = "gpu_tests.rs"]
mod tests;
