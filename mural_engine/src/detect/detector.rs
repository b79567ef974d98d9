/// Time-sliced stroke detection state machine.
///
/// One StrokeDetector per tool. Each frame the owning tool calls one of
/// the update methods with the current query sphere; the detector spends
/// at most one time slice of work, suspends mid-scan when the budget
/// runs out, and resumes from the saved cursor on the next call.

use std::time::Duration;
use glam::Vec3;
use crate::geometry::sphere_triangle_intersection;
use crate::scene::{Canvas, CanvasId, LayerMask};
use crate::{engine_debug, engine_error, engine_warn};
use super::budget::TimeBudget;
use super::cursor::{BatchCursor, FlatCursor};
use super::gpu::{BatchIntersector, GpuBatchCoordinator};
use super::handler::IntersectionHandler;

const SOURCE: &str = "mural::StrokeDetector";

/// Upper bound on scan-loop iterations per call. A cursor that stops
/// making progress against live scene data would otherwise spin forever.
const SANITY_LIMIT: u32 = 10_000;

// ===== CONFIG =====

/// What the detector does with its scan state after an actionable hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetBehavior {
    /// Keep scanning within the same slice
    None,
    /// End the slice; resume from the cursor next call
    ResetPosition,
    /// End the slice and restart detection from scratch next call
    ResetDetection,
}

/// Detector tuning, fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct DetectionConfig {
    /// Work budget per update call
    pub time_slice: Duration,
    /// Scan-state policy after an actionable hit
    pub reset_behavior: ResetBehavior,
    /// Prefer the GPU backend when an intersector is supplied
    pub gpu_enabled: bool,
    /// Result cap per GPU request
    pub max_gpu_results: u8,
    /// Render layers queried in addition to the active canvas' layer
    pub extra_gpu_layers: LayerMask,
    /// World-space movement below this does not restart the scan
    pub movement_epsilon: f32,
    /// Radius change below this does not restart the scan
    pub radius_epsilon: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            time_slice: Duration::from_millis(5),
            reset_behavior: ResetBehavior::ResetDetection,
            gpu_enabled: true,
            max_gpu_results: u8::MAX,
            extra_gpu_layers: LayerMask::NONE,
            movement_epsilon: 1e-4,
            radius_epsilon: 1e-4,
        }
    }
}

// ===== REPORT =====

/// Outcome of one update call.
#[derive(Debug, Clone, Copy)]
pub struct DetectionReport {
    /// At least one actionable hit was delivered
    pub actionable: bool,
    /// Detection state was restarted at the end of this call
    pub reset_requested: bool,
}

// ===== DETECTOR =====

/// Per-tool detection state machine.
pub struct StrokeDetector {
    config: DetectionConfig,
    /// Resume point for the batched CPU scan
    batch_cursor: BatchCursor,
    /// Resume point for the solitary-object scan
    flat_cursor: FlatCursor,
    /// GPU request/consume state
    gpu: GpuBatchCoordinator,
    /// Canvas the saved cursors refer to
    previous_canvas: Option<CanvasId>,
    /// Query sphere the saved cursors refer to (world space)
    last_center: Vec3,
    last_radius: f32,
    /// Whether the last call ended on an exhausted budget
    times_up: bool,
    /// Restart detection at the end of the current call
    reset_requested: bool,
    /// Fraction of the current container already scanned
    container_progress: f32,
}

/// How one CPU scan pass ended.
struct ScanOutcome {
    actionable: bool,
    finished: bool,
}

enum TriOutcome {
    Exhausted,
    ActionableHit,
    BudgetExpired,
    SanityExhausted,
}

impl StrokeDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self {
            config,
            batch_cursor: BatchCursor::default(),
            flat_cursor: FlatCursor::default(),
            gpu: GpuBatchCoordinator::new(config.max_gpu_results),
            previous_canvas: None,
            last_center: Vec3::ZERO,
            last_radius: 0.0,
            times_up: false,
            reset_requested: false,
            container_progress: 0.0,
        }
    }

    /// Detector tuning
    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Fraction of the current container already scanned.
    pub fn scan_progress(&self) -> f32 {
        self.container_progress
    }

    /// Whether the last update call ended on an exhausted budget.
    pub fn times_up(&self) -> bool {
        self.times_up
    }

    /// Forget all scan state: cursors, GPU request, queued results.
    /// Idempotent.
    pub fn reset_detection(&mut self) {
        self.batch_cursor.reset();
        self.flat_cursor.reset();
        self.gpu.clear();
        self.container_progress = 0.0;
        self.reset_requested = false;
    }

    // ===== UPDATE ENTRY POINTS =====

    /// Run one slice of detection against the canvas' batched strokes
    /// (and, on the GPU path, its widgets).
    ///
    /// `intersector` supplies the GPU backend; detection falls back to
    /// the CPU triangle scan when it is absent or `gpu_enabled` is off.
    /// The query sphere is given in world space.
    pub fn update_batched_detection(
        &mut self,
        canvas: &Canvas,
        mut intersector: Option<&mut dyn BatchIntersector>,
        center_ws: Vec3,
        radius_ws: f32,
        handler: &mut dyn IntersectionHandler,
    ) -> DetectionReport {
        self.begin_call(canvas, center_ws, radius_ws);
        let budget = TimeBudget::start(self.config.time_slice);

        if self.config.gpu_enabled {
            if let Some(intersector) = intersector.as_deref_mut() {
                let layer_mask = canvas.layer_mask() | self.config.extra_gpu_layers;
                let mut times_up = false;
                let hit = self.gpu.advance(
                    canvas,
                    intersector,
                    center_ws,
                    radius_ws,
                    layer_mask,
                    &budget,
                    &mut times_up,
                    handler,
                );
                self.times_up = times_up;
                if hit {
                    self.apply_reset_behavior();
                    handler.intersection_happened_this_frame();
                }
                // Queue drained with nothing in flight: the consumption
                // cycle is over and the caller should treat detection as
                // restarted
                if !self.gpu.request_in_flight() && self.gpu.unconsumed() == 0 {
                    self.reset_requested = true;
                }
                return self.finish_call(hit);
            }
        }

        let pose = canvas.pose();
        let center_cs = pose.inverse_transform_point(center_ws);
        let radius_cs = radius_ws / pose.scale;

        let outcome = self.scan_batched(canvas, center_cs, radius_cs, &budget, handler);
        if outcome.actionable {
            handler.intersection_happened_this_frame();
        }
        // A completed pass leaves no pending work; the caller should
        // treat detection as restarted
        if outcome.finished {
            self.batch_cursor.reset();
            self.container_progress = 0.0;
            self.reset_requested = true;
        }
        self.finish_call(outcome.actionable)
    }

    /// Run one slice of detection against the canvas' solitary objects.
    /// CPU only; the query sphere is given in world space.
    pub fn update_solitary_detection(
        &mut self,
        canvas: &Canvas,
        center_ws: Vec3,
        radius_ws: f32,
        handler: &mut dyn IntersectionHandler,
    ) -> DetectionReport {
        self.begin_call(canvas, center_ws, radius_ws);
        let budget = TimeBudget::start(self.config.time_slice);
        let center_cs = canvas.pose().inverse_transform_point(center_ws);

        let outcome = self.scan_solitary(canvas, center_cs, radius_ws, &budget, handler);
        if outcome.actionable {
            handler.intersection_happened_this_frame();
        }
        if outcome.finished {
            self.flat_cursor.reset();
            self.container_progress = 0.0;
            self.reset_requested = true;
        }
        self.finish_call(outcome.actionable)
    }

    // ===== CALL FRAMING =====

    /// Canvas-change and movement resets, applied before any scanning.
    fn begin_call(&mut self, canvas: &Canvas, center_ws: Vec3, radius_ws: f32) {
        self.times_up = false;

        if self.previous_canvas != Some(canvas.id()) {
            engine_debug!(SOURCE, "active canvas changed, restarting detection");
            self.reset_detection();
            self.previous_canvas = Some(canvas.id());
            self.last_center = center_ws;
            self.last_radius = radius_ws;
            return;
        }

        let moved = self.last_center.distance_squared(center_ws)
            > self.config.movement_epsilon * self.config.movement_epsilon
            || (self.last_radius - radius_ws).abs() > self.config.radius_epsilon;

        // A moved sphere invalidates partial scan progress, but never
        // while a GPU request is in flight: its results must be matched
        // against the sphere they were issued for. last_center stays
        // behind, so the restart happens once the request completes.
        if moved && !self.gpu.request_in_flight() {
            self.batch_cursor.reset();
            self.flat_cursor.reset();
            // Any unconsumed results belong to the old sphere
            self.gpu.clear();
            self.container_progress = 0.0;
            self.last_center = center_ws;
            self.last_radius = radius_ws;
        }
    }

    fn finish_call(&mut self, actionable: bool) -> DetectionReport {
        if self.gpu.request_in_flight() {
            // Restarting now would orphan the pending request's results
            self.reset_requested = false;
            return DetectionReport { actionable, reset_requested: false };
        }
        let reset_requested = std::mem::take(&mut self.reset_requested);
        if reset_requested {
            self.reset_detection();
        }
        DetectionReport { actionable, reset_requested }
    }

    fn apply_reset_behavior(&mut self) {
        match self.config.reset_behavior {
            ResetBehavior::None => {}
            ResetBehavior::ResetPosition => {
                self.times_up = true;
            }
            ResetBehavior::ResetDetection => {
                self.reset_requested = true;
                self.times_up = true;
            }
        }
    }

    // ===== CPU SCAN, BATCHED =====

    fn scan_batched(
        &mut self,
        canvas: &Canvas,
        center_cs: Vec3,
        radius_cs: f32,
        budget: &TimeBudget,
        handler: &mut dyn IntersectionHandler,
    ) -> ScanOutcome {
        let pool_count = canvas.pool_count();
        let mut actionable = false;
        let mut finished = false;
        let mut sanity = SANITY_LIMIT;

        'scan: loop {
            if self.batch_cursor.pool >= pool_count {
                finished = true;
                break;
            }
            if sanity == 0 {
                self.log_batched_sanity_exhausted(pool_count);
                break;
            }
            sanity -= 1;

            let pool = match canvas.pool(self.batch_cursor.pool) {
                Some(pool) => pool,
                None => {
                    finished = true;
                    break;
                }
            };
            let batch_count = pool.batch_count();
            if self.batch_cursor.batch >= batch_count {
                if !self.batch_cursor.advance_pool(pool_count) {
                    finished = true;
                    break;
                }
                continue;
            }
            let batch = match pool.batch(self.batch_cursor.batch) {
                Some(batch) => batch,
                None => {
                    if !self.batch_cursor.advance_batch(batch_count, pool_count) {
                        finished = true;
                        break;
                    }
                    continue;
                }
            };
            let subset_count = batch.subset_count();
            if self.batch_cursor.subset >= subset_count {
                if !self.batch_cursor.advance_batch(batch_count, pool_count) {
                    finished = true;
                    break;
                }
                continue;
            }

            let subset_key = match batch.subset_key(self.batch_cursor.subset) {
                Some(key) => key,
                None => {
                    if !self.batch_cursor.advance_subset(subset_count, batch_count, pool_count) {
                        finished = true;
                        break;
                    }
                    continue;
                }
            };
            let subset = match canvas.subset(subset_key) {
                Some(subset) if !subset.is_stale() => subset,
                _ => {
                    // Batches drop detached subsets immediately, so a
                    // stale key here means inconsistent scene state
                    engine_warn!(SOURCE, "stale subset reached by CPU scan, skipping");
                    if !self.batch_cursor.advance_subset(subset_count, batch_count, pool_count) {
                        finished = true;
                        break;
                    }
                    continue;
                }
            };

            if !subset.active()
                || !subset.bounds().expanded(radius_cs).contains_point(center_cs)
            {
                if !self.batch_cursor.advance_subset(subset_count, batch_count, pool_count) {
                    finished = true;
                    break;
                }
                if budget.expired() {
                    self.times_up = true;
                    break;
                }
                continue;
            }

            let (vertices, indices) = batch.triangle_data();
            let first = subset.first_index();
            let count = subset.index_count();

            let mut tri_outcome = TriOutcome::Exhausted;
            while self.batch_cursor.tri + 2 < count {
                if sanity == 0 {
                    tri_outcome = TriOutcome::SanityExhausted;
                    break;
                }
                sanity -= 1;

                let base = first + self.batch_cursor.tri;
                if base + 2 >= indices.len() {
                    // Malformed range; skip the rest of the subset
                    break;
                }
                let i0 = indices[base] as usize;
                let i1 = indices[base + 1] as usize;
                let i2 = indices[base + 2] as usize;
                if i0 >= vertices.len() || i1 >= vertices.len() || i2 >= vertices.len() {
                    self.batch_cursor.advance_leaf();
                    continue;
                }
                let (v0, v1, v2) = (vertices[i0], vertices[i1], vertices[i2]);

                if Self::triangle_near(center_cs, radius_cs, v0, v1, v2)
                    && sphere_triangle_intersection(center_cs, radius_cs, v0, v1, v2)
                    && handler.handle_batched_stroke(canvas, subset_key)
                {
                    tri_outcome = TriOutcome::ActionableHit;
                    break;
                }

                self.batch_cursor.advance_leaf();
                self.container_progress = self.batch_cursor.tri as f32 / count as f32;
                if budget.expired() {
                    tri_outcome = TriOutcome::BudgetExpired;
                    break;
                }
            }

            match tri_outcome {
                TriOutcome::Exhausted | TriOutcome::ActionableHit => {
                    let hit = matches!(tri_outcome, TriOutcome::ActionableHit);
                    if hit {
                        actionable = true;
                        self.apply_reset_behavior();
                    }
                    // A hit subset is never re-delivered on resume
                    if !self.batch_cursor.advance_subset(subset_count, batch_count, pool_count) {
                        finished = true;
                        break 'scan;
                    }
                    if hit && self.times_up {
                        break 'scan;
                    }
                    if budget.expired() {
                        self.times_up = true;
                        break 'scan;
                    }
                }
                TriOutcome::BudgetExpired => {
                    self.times_up = true;
                    break 'scan;
                }
                TriOutcome::SanityExhausted => {
                    self.log_batched_sanity_exhausted(pool_count);
                    break 'scan;
                }
            }
        }

        ScanOutcome { actionable, finished }
    }

    fn log_batched_sanity_exhausted(&self, pool_count: usize) {
        engine_error!(
            SOURCE,
            "scan sanity limit hit at pool {}/{} batch {} subset {} tri {}",
            self.batch_cursor.pool,
            pool_count,
            self.batch_cursor.batch,
            self.batch_cursor.subset,
            self.batch_cursor.tri
        );
    }

    // ===== CPU SCAN, SOLITARY =====

    fn scan_solitary(
        &mut self,
        canvas: &Canvas,
        center_cs: Vec3,
        radius_ws: f32,
        budget: &TimeBudget,
        handler: &mut dyn IntersectionHandler,
    ) -> ScanOutcome {
        let object_count = canvas.solitary_count();
        let canvas_scale = canvas.pose().scale;
        let mut actionable = false;
        let mut finished = false;
        let mut sanity = SANITY_LIMIT;

        'scan: loop {
            if self.flat_cursor.object >= object_count {
                finished = true;
                break;
            }
            if sanity == 0 {
                self.log_solitary_sanity_exhausted(object_count);
                break;
            }
            sanity -= 1;

            let index = self.flat_cursor.object;
            let object = match canvas.solitary_object(index) {
                Some(object) => object,
                None => {
                    finished = true;
                    break;
                }
            };

            // Query sphere in object-local space; radius undoes both the
            // canvas and the object scale
            let center_os = object.pose().inverse_transform_point(center_cs);
            let radius_os = radius_ws / (canvas_scale * object.pose().scale);

            if !object.active()
                || !object.bounds().expanded(radius_os).contains_point(center_os)
            {
                if !self.flat_cursor.advance_object(object_count) {
                    finished = true;
                    break;
                }
                if budget.expired() {
                    self.times_up = true;
                    break;
                }
                continue;
            }

            let vertices = object.vertices();
            let mut tri_outcome = TriOutcome::Exhausted;
            while self.flat_cursor.vert + 2 < vertices.len() {
                if sanity == 0 {
                    tri_outcome = TriOutcome::SanityExhausted;
                    break;
                }
                sanity -= 1;

                let v0 = vertices[self.flat_cursor.vert];
                let v1 = vertices[self.flat_cursor.vert + 1];
                let v2 = vertices[self.flat_cursor.vert + 2];

                if Self::triangle_near(center_os, radius_os, v0, v1, v2)
                    && sphere_triangle_intersection(center_os, radius_os, v0, v1, v2)
                    && handler.handle_solitary_object(canvas, index)
                {
                    tri_outcome = TriOutcome::ActionableHit;
                    break;
                }

                self.flat_cursor.advance_leaf();
                self.container_progress = self.flat_cursor.vert as f32 / vertices.len() as f32;
                if budget.expired() {
                    tri_outcome = TriOutcome::BudgetExpired;
                    break;
                }
            }

            match tri_outcome {
                TriOutcome::Exhausted | TriOutcome::ActionableHit => {
                    let hit = matches!(tri_outcome, TriOutcome::ActionableHit);
                    if hit {
                        actionable = true;
                        self.apply_reset_behavior();
                    }
                    if !self.flat_cursor.advance_object(object_count) {
                        finished = true;
                        break 'scan;
                    }
                    if hit && self.times_up {
                        break 'scan;
                    }
                    if budget.expired() {
                        self.times_up = true;
                        break 'scan;
                    }
                }
                TriOutcome::BudgetExpired => {
                    self.times_up = true;
                    break 'scan;
                }
                TriOutcome::SanityExhausted => {
                    self.log_solitary_sanity_exhausted(object_count);
                    break 'scan;
                }
            }
        }

        ScanOutcome { actionable, finished }
    }

    fn log_solitary_sanity_exhausted(&self, object_count: usize) {
        engine_error!(
            SOURCE,
            "solitary scan sanity limit hit at object {}/{} vert {}",
            self.flat_cursor.object,
            object_count,
            self.flat_cursor.vert
        );
    }

    /// Cheap pre-reject before the full sphere/triangle test: the sphere
    /// cannot touch a triangle whose centroid is farther away than one
    /// edge length plus the radius.
    fn triangle_near(center: Vec3, radius: f32, v0: Vec3, v1: Vec3, v2: Vec3) -> bool {
        let centroid = (v0 + v1 + v2) / 3.0;
        let reach = (v1 - v2).length() + radius;
        center.distance_squared(centroid) <= reach * reach
    }
}

#[cfg(test)]
#[path = "detector_tests.rs"]
mod tests;
