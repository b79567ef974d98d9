/// Tests for the detection state machine: time slicing, resume, resets,
/// GPU/CPU selection.

use std::time::Duration;
use glam::{Quat, Vec3};
use crate::detect::mock_intersector::MockIntersector;
use crate::detect::BatchHit;
use crate::scene::{Canvas, Pose, StrokeKey, SubsetKey};
use super::*;

// ============================================================================
// Fixtures
// ============================================================================

struct RecordingHandler {
    strokes: Vec<StrokeKey>,
    frames: u32,
    actionable: bool,
}

impl RecordingHandler {
    fn new() -> Self {
        Self { strokes: Vec::new(), frames: 0, actionable: true }
    }

    fn ignoring() -> Self {
        Self { actionable: false, ..Self::new() }
    }
}

impl IntersectionHandler for RecordingHandler {
    fn handle_batched_stroke(&mut self, canvas: &Canvas, subset: SubsetKey) -> bool {
        if !self.actionable {
            return false;
        }
        self.strokes.push(canvas.subset(subset).unwrap().stroke());
        true
    }

    fn handle_solitary_object(&mut self, canvas: &Canvas, index: usize) -> bool {
        match canvas.solitary_object(index).and_then(|o| o.stroke()) {
            Some(stroke) if self.actionable => {
                self.strokes.push(stroke);
                true
            }
            _ => false,
        }
    }

    fn intersection_happened_this_frame(&mut self) {
        self.frames += 1;
    }
}

/// Handler that only overrides handle_stroke, exercising the default
/// delegation of the specific hooks.
#[derive(Default)]
struct DelegatingHandler {
    strokes: Vec<StrokeKey>,
}

impl IntersectionHandler for DelegatingHandler {
    fn handle_stroke(&mut self, stroke: StrokeKey) {
        self.strokes.push(stroke);
    }
}

fn triangle_at(z: f32) -> (Vec<Vec3>, Vec<u32>) {
    (
        vec![
            Vec3::new(0.0, 0.0, z),
            Vec3::new(1.0, 0.0, z),
            Vec3::new(0.0, 1.0, z),
        ],
        vec![0, 1, 2],
    )
}

fn canvas_with_two_strokes() -> (Canvas, StrokeKey, StrokeKey) {
    let mut canvas = Canvas::new(0);
    let pool = canvas.find_or_create_pool("ink");
    let (va, ta) = triangle_at(0.0);
    let (vb, tb) = triangle_at(1.0);
    let (a, _) = canvas.add_batched_stroke(pool, &va, &ta).unwrap();
    let (b, _) = canvas.add_batched_stroke(pool, &vb, &tb).unwrap();
    (canvas, a, b)
}

fn cpu_config(reset_behavior: ResetBehavior, time_slice: Duration) -> DetectionConfig {
    DetectionConfig {
        time_slice,
        reset_behavior,
        gpu_enabled: false,
        ..DetectionConfig::default()
    }
}

const COVERING: Vec3 = Vec3::new(0.2, 0.2, 0.5);

// ============================================================================
// CPU path: hits, misses, callback contract
// ============================================================================

#[test]
fn test_cpu_hit_delivers_stroke_and_frame_callback() {
    let (canvas, a, b) = canvas_with_two_strokes();
    let mut detector =
        StrokeDetector::new(cpu_config(ResetBehavior::None, Duration::MAX));
    let mut handler = RecordingHandler::new();

    let report =
        detector.update_batched_detection(&canvas, None, COVERING, 2.0, &mut handler);

    assert!(report.actionable);
    assert_eq!(handler.strokes, vec![a, b]);
    assert_eq!(handler.frames, 1);
}

#[test]
fn test_cpu_near_miss_is_not_actionable() {
    // Passes the broad phase but fails the triangle test; the completed
    // pass still restarts detection
    let (canvas, _, _) = canvas_with_two_strokes();
    let mut detector =
        StrokeDetector::new(cpu_config(ResetBehavior::None, Duration::MAX));
    let mut handler = RecordingHandler::new();

    let report = detector.update_batched_detection(
        &canvas,
        None,
        Vec3::new(2.0, 2.0, 0.0),
        1.2,
        &mut handler,
    );

    assert!(!report.actionable);
    assert!(report.reset_requested);
    assert!(handler.strokes.is_empty());
    assert_eq!(handler.frames, 0);
}

#[test]
fn test_cpu_completed_pass_requests_reset_every_call() {
    // A full pass with no hits finishes with no pending work, so every
    // unlimited-slice call reports a restart
    let (canvas, _, _) = canvas_with_two_strokes();
    let mut detector =
        StrokeDetector::new(cpu_config(ResetBehavior::None, Duration::MAX));
    let mut handler = RecordingHandler::new();

    for _ in 0..3 {
        let report = detector.update_batched_detection(
            &canvas,
            None,
            Vec3::new(2.0, 2.0, 0.0),
            1.2,
            &mut handler,
        );
        assert!(!report.actionable);
        assert!(report.reset_requested);
    }
    assert!(handler.strokes.is_empty());
}

#[test]
fn test_cpu_far_miss_requests_reset() {
    // Everything culled by the broad phase; the pass still completes
    let (canvas, _, _) = canvas_with_two_strokes();
    let mut detector =
        StrokeDetector::new(cpu_config(ResetBehavior::None, Duration::MAX));
    let mut handler = RecordingHandler::new();

    let report = detector.update_batched_detection(
        &canvas,
        None,
        Vec3::new(100.0, 0.0, 0.0),
        0.5,
        &mut handler,
    );

    assert!(!report.actionable);
    assert!(report.reset_requested);
}

#[test]
fn test_empty_canvas_requests_reset() {
    let canvas = Canvas::new(0);
    let mut detector =
        StrokeDetector::new(cpu_config(ResetBehavior::None, Duration::MAX));
    let mut handler = RecordingHandler::new();

    let report =
        detector.update_batched_detection(&canvas, None, Vec3::ZERO, 1.0, &mut handler);

    assert!(!report.actionable);
    assert!(report.reset_requested);
}

#[test]
fn test_ignored_hits_are_not_actionable() {
    let (canvas, _, _) = canvas_with_two_strokes();
    let mut detector =
        StrokeDetector::new(cpu_config(ResetBehavior::None, Duration::MAX));
    let mut handler = RecordingHandler::ignoring();

    let report =
        detector.update_batched_detection(&canvas, None, COVERING, 2.0, &mut handler);

    assert!(!report.actionable);
    assert_eq!(handler.frames, 0);
}

#[test]
fn test_default_hook_delegates_to_handle_stroke() {
    let (canvas, a, b) = canvas_with_two_strokes();
    let mut detector =
        StrokeDetector::new(cpu_config(ResetBehavior::None, Duration::MAX));
    let mut handler = DelegatingHandler::default();

    detector.update_batched_detection(&canvas, None, COVERING, 2.0, &mut handler);

    assert_eq!(handler.strokes, vec![a, b]);
}

#[test]
fn test_inactive_subsets_are_skipped() {
    let (mut canvas, a, _) = canvas_with_two_strokes();
    let a_subset = canvas.stroke(a).unwrap().subsets()[0];
    canvas.set_subset_active(a_subset, false).unwrap();

    let mut detector =
        StrokeDetector::new(cpu_config(ResetBehavior::None, Duration::MAX));
    let mut handler = RecordingHandler::new();

    detector.update_batched_detection(&canvas, None, COVERING, 2.0, &mut handler);

    assert!(!handler.strokes.contains(&a));
}

// ============================================================================
// Time slicing and resume
// ============================================================================

#[test]
fn test_zero_slice_resumes_across_calls() {
    let (canvas, a, b) = canvas_with_two_strokes();
    let mut detector =
        StrokeDetector::new(cpu_config(ResetBehavior::None, Duration::ZERO));
    let mut handler = RecordingHandler::new();

    for _ in 0..50 {
        detector.update_batched_detection(&canvas, None, COVERING, 2.0, &mut handler);
        if handler.strokes.len() >= 2 {
            break;
        }
    }

    // One pass delivers each stroke exactly once, in scan order
    assert_eq!(handler.strokes, vec![a, b]);
}

#[test]
fn test_zero_slice_matches_unlimited_scan() {
    let (canvas, _, _) = canvas_with_two_strokes();

    let mut handler_unlimited = RecordingHandler::new();
    StrokeDetector::new(cpu_config(ResetBehavior::None, Duration::MAX))
        .update_batched_detection(&canvas, None, COVERING, 2.0, &mut handler_unlimited);

    let mut handler_sliced = RecordingHandler::new();
    let mut detector =
        StrokeDetector::new(cpu_config(ResetBehavior::None, Duration::ZERO));
    for _ in 0..50 {
        detector.update_batched_detection(&canvas, None, COVERING, 2.0, &mut handler_sliced);
        if handler_sliced.strokes.len() >= handler_unlimited.strokes.len() {
            break;
        }
    }

    assert_eq!(handler_sliced.strokes, handler_unlimited.strokes);
}

#[test]
fn test_times_up_set_when_budget_exhausted_mid_pass() {
    let (canvas, _, _) = canvas_with_two_strokes();
    let mut detector =
        StrokeDetector::new(cpu_config(ResetBehavior::None, Duration::ZERO));
    let mut handler = RecordingHandler::new();

    detector.update_batched_detection(&canvas, None, COVERING, 2.0, &mut handler);

    assert!(detector.times_up());
}

// ============================================================================
// Reset behaviors
// ============================================================================

#[test]
fn test_reset_position_ends_slice_but_keeps_cursor() {
    let (canvas, a, b) = canvas_with_two_strokes();
    let mut detector =
        StrokeDetector::new(cpu_config(ResetBehavior::ResetPosition, Duration::MAX));
    let mut handler = RecordingHandler::new();

    let report =
        detector.update_batched_detection(&canvas, None, COVERING, 2.0, &mut handler);
    assert!(report.actionable);
    assert_eq!(handler.strokes, vec![a]);

    // Resumes past the already-delivered stroke
    detector.update_batched_detection(&canvas, None, COVERING, 2.0, &mut handler);
    assert_eq!(handler.strokes, vec![a, b]);
}

#[test]
fn test_reset_detection_restarts_from_scratch() {
    let (mut canvas, a, b) = canvas_with_two_strokes();
    let mut detector =
        StrokeDetector::new(cpu_config(ResetBehavior::ResetDetection, Duration::MAX));
    let mut handler = RecordingHandler::new();

    let report =
        detector.update_batched_detection(&canvas, None, COVERING, 2.0, &mut handler);
    assert!(report.actionable);
    assert!(report.reset_requested);
    assert_eq!(handler.strokes, vec![a]);

    // The tool erases the hit stroke between frames; the restarted pass
    // finds the next one from the top
    canvas.remove_stroke(a).unwrap();
    detector.update_batched_detection(&canvas, None, COVERING, 2.0, &mut handler);
    assert_eq!(handler.strokes, vec![a, b]);
}

#[test]
fn test_reset_detection_is_idempotent() {
    let (canvas, _, _) = canvas_with_two_strokes();
    let mut detector =
        StrokeDetector::new(cpu_config(ResetBehavior::None, Duration::ZERO));
    let mut handler = RecordingHandler::new();

    detector.update_batched_detection(&canvas, None, COVERING, 2.0, &mut handler);
    detector.reset_detection();
    detector.reset_detection();
    assert_eq!(detector.scan_progress(), 0.0);
}

// ============================================================================
// Canvas change and movement resets
// ============================================================================

#[test]
fn test_canvas_change_restarts_detection() {
    let (canvas_a, a, _) = canvas_with_two_strokes();
    let (canvas_b, b, _) = canvas_with_two_strokes();
    let mut detector =
        StrokeDetector::new(cpu_config(ResetBehavior::ResetPosition, Duration::MAX));
    let mut handler = RecordingHandler::new();

    detector.update_batched_detection(&canvas_a, None, COVERING, 2.0, &mut handler);
    assert_eq!(handler.strokes, vec![a]);

    // Partial progress on canvas_a is meaningless on canvas_b
    detector.update_batched_detection(&canvas_b, None, COVERING, 2.0, &mut handler);
    assert_eq!(handler.strokes, vec![a, b]);
}

#[test]
fn test_movement_restarts_scan() {
    let (canvas, a, _) = canvas_with_two_strokes();
    let mut detector =
        StrokeDetector::new(cpu_config(ResetBehavior::None, Duration::ZERO));
    let mut handler = RecordingHandler::new();

    detector.update_batched_detection(&canvas, None, COVERING, 2.0, &mut handler);
    assert_eq!(handler.strokes, vec![a]);

    // Sphere moved: the partial pass restarts and re-delivers
    let moved = COVERING + Vec3::new(0.1, 0.0, 0.0);
    detector.update_batched_detection(&canvas, None, moved, 2.0, &mut handler);
    assert_eq!(handler.strokes, vec![a, a]);
}

#[test]
fn test_sub_epsilon_movement_does_not_restart() {
    let (canvas, a, b) = canvas_with_two_strokes();
    let mut detector =
        StrokeDetector::new(cpu_config(ResetBehavior::None, Duration::ZERO));
    let mut handler = RecordingHandler::new();

    detector.update_batched_detection(&canvas, None, COVERING, 2.0, &mut handler);
    let nudged = COVERING + Vec3::new(1e-6, 0.0, 0.0);
    detector.update_batched_detection(&canvas, None, nudged, 2.0, &mut handler);

    assert_eq!(handler.strokes, vec![a, b]);
}

// ============================================================================
// GPU path
// ============================================================================

fn gpu_config(reset_behavior: ResetBehavior) -> DetectionConfig {
    DetectionConfig {
        reset_behavior,
        time_slice: Duration::MAX,
        ..DetectionConfig::default()
    }
}

#[test]
fn test_gpu_path_delivers_after_readback() {
    let (canvas, a, _) = canvas_with_two_strokes();
    let a_subset = canvas.stroke(a).unwrap().subsets()[0];

    let mut mock = MockIntersector::new(0);
    mock.push_results(vec![BatchHit::Subset(a_subset)]);
    let mut detector = StrokeDetector::new(gpu_config(ResetBehavior::None));
    let mut handler = RecordingHandler::new();

    // Call 1 issues the request
    let report = detector.update_batched_detection(
        &canvas,
        Some(&mut mock),
        COVERING,
        2.0,
        &mut handler,
    );
    assert!(!report.actionable);
    assert_eq!(mock.request_count(), 1);
    assert_eq!(mock.requests[0].center_ws, COVERING);
    assert_eq!(mock.requests[0].layer_mask, canvas.layer_mask());

    // Call 2 consumes the readback
    let report = detector.update_batched_detection(
        &canvas,
        Some(&mut mock),
        COVERING,
        2.0,
        &mut handler,
    );
    assert!(report.actionable);
    assert_eq!(handler.strokes, vec![a]);
    assert_eq!(handler.frames, 1);
}

#[test]
fn test_gpu_enabled_without_backend_falls_back_to_cpu() {
    let (canvas, a, b) = canvas_with_two_strokes();
    let mut detector = StrokeDetector::new(gpu_config(ResetBehavior::None));
    let mut handler = RecordingHandler::new();

    let report =
        detector.update_batched_detection(&canvas, None, COVERING, 2.0, &mut handler);

    assert!(report.actionable);
    assert_eq!(handler.strokes, vec![a, b]);
}

#[test]
fn test_movement_reset_deferred_while_request_in_flight() {
    let (canvas, a, _) = canvas_with_two_strokes();
    let a_subset = canvas.stroke(a).unwrap().subsets()[0];

    let mut mock = MockIntersector::new(1);
    mock.push_results(vec![BatchHit::Subset(a_subset)]);
    let mut detector = StrokeDetector::new(gpu_config(ResetBehavior::None));
    let mut handler = RecordingHandler::new();

    detector.update_batched_detection(&canvas, Some(&mut mock), COVERING, 2.0, &mut handler);

    // Sphere moves while the request is pending: the request survives
    // and its results are still delivered
    let moved = COVERING + Vec3::new(1.0, 0.0, 0.0);
    detector.update_batched_detection(&canvas, Some(&mut mock), moved, 2.0, &mut handler);
    detector.update_batched_detection(&canvas, Some(&mut mock), moved, 2.0, &mut handler);
    assert_eq!(handler.strokes, vec![a]);
    assert_eq!(mock.request_count(), 1);

    // Once idle, the deferred restart kicks in and the next request uses
    // the new sphere
    detector.update_batched_detection(&canvas, Some(&mut mock), moved, 2.0, &mut handler);
    assert_eq!(mock.request_count(), 2);
    assert_eq!(mock.requests[1].center_ws, moved);
}

#[test]
fn test_gpu_reset_detection_restarts_after_delivery() {
    let (canvas, a, b) = canvas_with_two_strokes();
    let a_subset = canvas.stroke(a).unwrap().subsets()[0];
    let b_subset = canvas.stroke(b).unwrap().subsets()[0];

    let mut mock = MockIntersector::new(0);
    mock.push_results(vec![BatchHit::Subset(a_subset), BatchHit::Subset(b_subset)]);
    let mut detector = StrokeDetector::new(gpu_config(ResetBehavior::ResetDetection));
    let mut handler = RecordingHandler::new();

    detector.update_batched_detection(&canvas, Some(&mut mock), COVERING, 2.0, &mut handler);
    let report = detector.update_batched_detection(
        &canvas,
        Some(&mut mock),
        COVERING,
        2.0,
        &mut handler,
    );

    // Every queued hit the budget allows is delivered in one call,
    // then detection restarts
    assert!(report.actionable);
    assert!(report.reset_requested);
    assert_eq!(handler.strokes, vec![a, b]);
    assert_eq!(handler.frames, 1);

    // Restarted state issues a fresh request
    let report = detector.update_batched_detection(
        &canvas,
        Some(&mut mock),
        COVERING,
        2.0,
        &mut handler,
    );
    assert!(!report.actionable);
    assert_eq!(mock.request_count(), 2);
}

#[test]
fn test_gpu_empty_result_cycle_requests_reset() {
    let (canvas, _, _) = canvas_with_two_strokes();
    let mut mock = MockIntersector::new(0);
    let mut detector = StrokeDetector::new(gpu_config(ResetBehavior::None));
    let mut handler = RecordingHandler::new();

    // Call 1 issues the request; no restart while it is in flight
    let report = detector.update_batched_detection(
        &canvas,
        Some(&mut mock),
        COVERING,
        2.0,
        &mut handler,
    );
    assert!(!report.reset_requested);

    // Call 2 swaps in an empty result set: nothing pending, nothing
    // queued, so the cycle is over and detection restarts
    let report = detector.update_batched_detection(
        &canvas,
        Some(&mut mock),
        COVERING,
        2.0,
        &mut handler,
    );
    assert!(!report.actionable);
    assert!(report.reset_requested);
    assert!(handler.strokes.is_empty());
}

// ============================================================================
// Solitary path
// ============================================================================

#[test]
fn test_solitary_hit_delivers_stroke() {
    let mut canvas = Canvas::new(0);
    let (vertices, _) = triangle_at(0.0);
    let (stroke, _) = canvas.add_solitary_stroke(Pose::IDENTITY, vertices).unwrap();

    let mut detector =
        StrokeDetector::new(cpu_config(ResetBehavior::None, Duration::MAX));
    let mut handler = RecordingHandler::new();

    let report = detector.update_solitary_detection(
        &canvas,
        Vec3::new(0.2, 0.2, 0.0),
        0.5,
        &mut handler,
    );

    assert!(report.actionable);
    assert_eq!(handler.strokes, vec![stroke]);
    assert_eq!(handler.frames, 1);
}

#[test]
fn test_solitary_respects_canvas_and_object_scale() {
    // Canvas scaled 2x, object translated within the canvas: the query
    // sphere must land on the triangle after both transforms are undone
    let mut canvas = Canvas::new(0);
    canvas.set_pose(Pose::new(Vec3::ZERO, Quat::IDENTITY, 2.0));
    let (vertices, _) = triangle_at(0.0);
    let object_pose = Pose::new(Vec3::new(10.0, 0.0, 0.0), Quat::IDENTITY, 1.0);
    let (stroke, _) = canvas.add_solitary_stroke(object_pose, vertices).unwrap();

    let mut detector =
        StrokeDetector::new(cpu_config(ResetBehavior::None, Duration::MAX));
    let mut handler = RecordingHandler::new();

    let report = detector.update_solitary_detection(
        &canvas,
        Vec3::new(20.0, 0.0, 0.0),
        0.2,
        &mut handler,
    );

    assert!(report.actionable);
    assert_eq!(handler.strokes, vec![stroke]);
}

#[test]
fn test_solitary_inactive_object_skipped() {
    let mut canvas = Canvas::new(0);
    let (vertices, _) = triangle_at(0.0);
    let (_, index) = canvas.add_solitary_stroke(Pose::IDENTITY, vertices).unwrap();
    canvas.set_solitary_active(index, false).unwrap();

    let mut detector =
        StrokeDetector::new(cpu_config(ResetBehavior::None, Duration::MAX));
    let mut handler = RecordingHandler::new();

    let report = detector.update_solitary_detection(
        &canvas,
        Vec3::new(0.2, 0.2, 0.0),
        0.5,
        &mut handler,
    );

    assert!(!report.actionable);
    assert!(report.reset_requested);
    assert!(handler.strokes.is_empty());
}

#[test]
fn test_solitary_non_stroke_object_not_actionable() {
    let mut canvas = Canvas::new(0);
    let (vertices, _) = triangle_at(0.0);
    canvas.add_solitary_object(Pose::IDENTITY, vertices).unwrap();

    let mut detector =
        StrokeDetector::new(cpu_config(ResetBehavior::None, Duration::MAX));
    let mut handler = RecordingHandler::new();

    let report = detector.update_solitary_detection(
        &canvas,
        Vec3::new(0.2, 0.2, 0.0),
        0.5,
        &mut handler,
    );

    assert!(!report.actionable);
    assert!(handler.strokes.is_empty());
}
