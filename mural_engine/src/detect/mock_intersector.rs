/// Scripted BatchIntersector for unit tests.

use std::cell::Cell;
use std::collections::VecDeque;
use glam::Vec3;
use crate::scene::LayerMask;
use super::gpu::{BatchHit, BatchIntersector, FutureBatchResult};

/// Parameters of one recorded request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordedRequest {
    pub center_ws: Vec3,
    pub radius_ws: f32,
    pub max_results: u8,
    pub layer_mask: LayerMask,
}

/// A future that becomes ready after a fixed number of polls.
struct ScriptedFuture {
    polls_until_ready: Cell<u32>,
    results: Vec<BatchHit>,
}

impl FutureBatchResult for ScriptedFuture {
    fn is_ready(&self) -> bool {
        let remaining = self.polls_until_ready.get();
        if remaining == 0 {
            return true;
        }
        self.polls_until_ready.set(remaining - 1);
        false
    }

    fn take_results(&mut self) -> Vec<BatchHit> {
        std::mem::take(&mut self.results)
    }
}

/// Backend that replays scripted result sets with configurable latency.
pub struct MockIntersector {
    /// Result sets returned by successive requests, in order
    script: VecDeque<Vec<BatchHit>>,
    /// Number of is_ready polls each future answers false before ready
    latency: u32,
    /// When set, request_batch_intersections returns None
    disabled: bool,
    /// Every request received, in order
    pub requests: Vec<RecordedRequest>,
}

impl MockIntersector {
    pub fn new(latency: u32) -> Self {
        Self {
            script: VecDeque::new(),
            latency,
            disabled: false,
            requests: Vec::new(),
        }
    }

    pub fn disabled() -> Self {
        let mut mock = Self::new(0);
        mock.disabled = true;
        mock
    }

    pub fn push_results(&mut self, results: Vec<BatchHit>) {
        self.script.push_back(results);
    }

    pub fn request_count(&self) -> usize {
        self.requests.len()
    }
}

impl BatchIntersector for MockIntersector {
    fn request_batch_intersections(
        &mut self,
        center_ws: Vec3,
        radius_ws: f32,
        max_results: u8,
        layer_mask: LayerMask,
    ) -> Option<Box<dyn FutureBatchResult>> {
        if self.disabled {
            return None;
        }
        self.requests.push(RecordedRequest {
            center_ws,
            radius_ws,
            max_results,
            layer_mask,
        });
        let results = self.script.pop_front().unwrap_or_default();
        Some(Box::new(ScriptedFuture {
            polls_until_ready: Cell::new(self.latency),
            results,
        }))
    }
}
