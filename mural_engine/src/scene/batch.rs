/// Batched stroke storage: pools → batches → subsets.
///
/// All strokes painted with the same brush share a pool; each pool packs
/// its strokes into a small number of batches, each batch owning one
/// contiguous vertex/triangle-index array. A BatchSubset is one stroke's
/// contiguous triangle range inside a batch, the unit the detection
/// engine reports hits against.

use glam::Vec3;
use slotmap::new_key_type;
use crate::geometry::Aabb;

// ===== SLOT MAP KEYS =====

new_key_type! {
    /// Stable key for a painted stroke within a Canvas.
    pub struct StrokeKey;

    /// Stable key for a BatchSubset within a Canvas.
    ///
    /// GPU intersection results carry SubsetKeys across frames; a key
    /// whose subset has been detached (or freed) marks a stale result.
    pub struct SubsetKey;

    /// Stable key for an interactive widget within a Canvas.
    pub struct WidgetKey;
}

// ===== BATCH REF =====

/// Location of a batch inside a canvas' pool list.
///
/// BatchSubsets hold this as their owning-batch back-reference; it is
/// cleared (set to None) when the subset is detached, which marks the
/// subset stale for any result still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchRef {
    /// Index of the pool within the canvas
    pub pool: usize,
    /// Index of the batch within the pool
    pub batch: usize,
}

// ===== STROKE =====

/// A painted stroke.
///
/// Batched strokes own one subset per batch they were split across
/// (typically exactly one). Solitary strokes own none.
pub struct Stroke {
    /// Subsets holding this stroke's geometry
    subsets: Vec<SubsetKey>,
}

impl Stroke {
    pub(crate) fn new() -> Self {
        Self { subsets: Vec::new() }
    }

    /// Subsets holding this stroke's geometry
    pub fn subsets(&self) -> &[SubsetKey] {
        &self.subsets
    }

    pub(crate) fn push_subset(&mut self, key: SubsetKey) {
        self.subsets.push(key);
    }
}

// ===== BATCH SUBSET =====

/// One stroke's contiguous triangle range inside a batch.
pub struct BatchSubset {
    /// Owning stroke
    stroke: StrokeKey,
    /// Owning batch; None once the subset has been detached (stale)
    owning_batch: Option<BatchRef>,
    /// Offset of the first triangle index within the batch index array
    first_index: usize,
    /// Number of triangle indices (a multiple of 3)
    index_count: usize,
    /// Bounds of the subset's vertices, in canvas space
    bounds: Aabb,
    /// Inactive subsets are skipped by detection (e.g. erased strokes)
    active: bool,
}

impl BatchSubset {
    pub(crate) fn new(
        stroke: StrokeKey,
        owning_batch: BatchRef,
        first_index: usize,
        index_count: usize,
        bounds: Aabb,
    ) -> Self {
        Self {
            stroke,
            owning_batch: Some(owning_batch),
            first_index,
            index_count,
            bounds,
            active: true,
        }
    }

    /// Owning stroke
    pub fn stroke(&self) -> StrokeKey {
        self.stroke
    }

    /// Owning batch, or None if the subset has been detached
    pub fn owning_batch(&self) -> Option<BatchRef> {
        self.owning_batch
    }

    /// A subset without an owning batch is stale: results referencing it
    /// must be discarded, not acted upon.
    pub fn is_stale(&self) -> bool {
        self.owning_batch.is_none()
    }

    /// Offset of the first triangle index within the batch index array
    pub fn first_index(&self) -> usize {
        self.first_index
    }

    /// Number of triangle indices (a multiple of 3)
    pub fn index_count(&self) -> usize {
        self.index_count
    }

    /// Bounds of the subset's vertices, in canvas space
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Whether detection should consider this subset
    pub fn active(&self) -> bool {
        self.active
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub(crate) fn detach(&mut self) {
        self.owning_batch = None;
        self.active = false;
    }
}

// ===== BATCH =====

/// Soft cap on vertices per batch; a new batch is started past this.
/// Keeps triangle indices comfortably within 16 bits for GPU id packing.
pub(crate) const BATCH_VERTEX_CAPACITY: usize = 65_000;

/// A contiguous vertex/index store shared by many subsets.
pub struct Batch {
    /// Vertex positions in canvas space
    vertices: Vec<Vec3>,
    /// Triangle indices into `vertices`, three per triangle
    triangles: Vec<u32>,
    /// Subsets packed into this batch, in triangle-range order
    subsets: Vec<SubsetKey>,
}

impl Batch {
    pub(crate) fn new() -> Self {
        Self {
            vertices: Vec::new(),
            triangles: Vec::new(),
            subsets: Vec::new(),
        }
    }

    /// Raw triangle data: (vertex positions, triangle indices).
    ///
    /// Valid only for the duration of the borrow; never cache across
    /// frames.
    pub fn triangle_data(&self) -> (&[Vec3], &[u32]) {
        (&self.vertices, &self.triangles)
    }

    /// Number of vertices in the batch
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of subsets packed into this batch
    pub fn subset_count(&self) -> usize {
        self.subsets.len()
    }

    /// Get a subset key by position within the batch
    pub fn subset_key(&self, index: usize) -> Option<SubsetKey> {
        self.subsets.get(index).copied()
    }

    /// Append stroke geometry, rebasing indices onto this batch's
    /// vertex array. Returns (first_index, index_count) for the subset.
    pub(crate) fn append_geometry(&mut self, vertices: &[Vec3], triangles: &[u32]) -> (usize, usize) {
        let base = self.vertices.len() as u32;
        let first_index = self.triangles.len();
        self.vertices.extend_from_slice(vertices);
        self.triangles.extend(triangles.iter().map(|i| i + base));
        (first_index, triangles.len())
    }

    pub(crate) fn push_subset(&mut self, key: SubsetKey) {
        self.subsets.push(key);
    }

    pub(crate) fn remove_subset(&mut self, key: SubsetKey) {
        self.subsets.retain(|k| *k != key);
    }
}

// ===== BATCH POOL =====

/// A named group of batches (one pool per brush).
pub struct BatchPool {
    /// Brush name this pool groups strokes for
    name: String,
    /// Batches in creation order; strokes append to the last one
    batches: Vec<Batch>,
}

impl BatchPool {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            batches: Vec::new(),
        }
    }

    /// Brush name this pool groups strokes for
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of batches in the pool
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    /// Get a batch by index
    pub fn batch(&self, index: usize) -> Option<&Batch> {
        self.batches.get(index)
    }

    pub(crate) fn batch_mut(&mut self, index: usize) -> Option<&mut Batch> {
        self.batches.get_mut(index)
    }

    /// Index of the batch new geometry should append to, creating a new
    /// batch when the last one is full (or none exists).
    pub(crate) fn writable_batch_index(&mut self, incoming_vertices: usize) -> usize {
        let needs_new = match self.batches.last() {
            Some(batch) => batch.vertex_count() + incoming_vertices > BATCH_VERTEX_CAPACITY,
            None => true,
        };
        if needs_new {
            self.batches.push(Batch::new());
        }
        self.batches.len() - 1
    }
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
