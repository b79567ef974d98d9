/// Canvas — one spatial partition of the painting.
///
/// A canvas owns batched stroke storage, widgets, and solitary (non-
/// batched) objects, and carries the pose that maps canvas space to
/// world space. The detection engine resolves the active canvas each
/// frame and abandons partial scan progress when it changes.

use std::sync::atomic::{AtomicU32, Ordering};
use bitflags::bitflags;
use glam::{Quat, Vec3};
use slotmap::SlotMap;
use crate::error::{Error, Result};
use crate::geometry::Aabb;
use super::batch::{
    BatchPool, BatchRef, BatchSubset, Stroke, StrokeKey, SubsetKey, WidgetKey,
};

// ===== CANVAS ID =====

/// Process-unique canvas identity.
///
/// Detection compares ids across frames to notice partition changes;
/// partial scan progress against a different canvas is meaningless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanvasId(u32);

static NEXT_CANVAS_ID: AtomicU32 = AtomicU32::new(1);

// ===== LAYER MASK =====

bitflags! {
    /// Render-layer mask for GPU intersection requests.
    ///
    /// One bit per render layer; a request only considers geometry on
    /// layers whose bit is set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LayerMask: u32 {
        /// No layers
        const NONE = 0;
    }
}

impl LayerMask {
    /// Mask selecting a single render layer.
    pub fn from_layer(layer: u8) -> Self {
        Self::from_bits_retain(1 << (layer as u32 % 32))
    }
}

// ===== POSE =====

/// Rigid transform plus uniform scale (canvas → world).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Translation component
    pub translation: Vec3,
    /// Rotation component
    pub rotation: Quat,
    /// Uniform scale (canvas units to world units)
    pub scale: f32,
}

impl Pose {
    /// The identity pose
    pub const IDENTITY: Pose = Pose {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: 1.0,
    };

    /// Create a pose from components
    pub fn new(translation: Vec3, rotation: Quat, scale: f32) -> Self {
        Self { translation, rotation, scale }
    }

    /// Transform a local-space point to world space
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * (point * self.scale) + self.translation
    }

    /// Transform a world-space point to local space
    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        (self.rotation.inverse() * (point - self.translation)) / self.scale
    }
}

// ===== WIDGET =====

/// An interactive widget (mirror, panel, model pin, ...).
///
/// Widgets participate in GPU intersection only; the CPU scanner covers
/// stroke geometry alone.
pub struct Widget {
    /// Display name
    name: String,
    /// Inactive widgets are never reported
    active: bool,
}

impl Widget {
    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the widget is live
    pub fn active(&self) -> bool {
        self.active
    }
}

// ===== SOLITARY OBJECT =====

/// A non-batched canvas child carrying its own triangle-soup mesh.
///
/// Vertices are consecutive triplets (no index array), in the object's
/// local space.
pub struct SolitaryObject {
    /// Object transform within the canvas
    pose: Pose,
    /// Triangle soup, three vertices per triangle
    vertices: Vec<Vec3>,
    /// Mesh bounds in object-local space
    bounds: Aabb,
    /// Inactive objects are skipped by detection
    active: bool,
    /// Paintable-stroke association, if this object is a stroke
    stroke: Option<StrokeKey>,
}

impl SolitaryObject {
    /// Object transform within the canvas
    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// Triangle soup, three vertices per triangle
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    /// Mesh bounds in object-local space
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Whether detection should consider this object
    pub fn active(&self) -> bool {
        self.active
    }

    /// Paintable-stroke association, if any
    pub fn stroke(&self) -> Option<StrokeKey> {
        self.stroke
    }
}

// ===== CANVAS =====

/// One spatial partition of the painting.
pub struct Canvas {
    /// Process-unique identity
    id: CanvasId,
    /// Canvas → world transform
    pose: Pose,
    /// Render layer for GPU intersection culling
    layer: u8,
    /// Batched stroke storage, one pool per brush
    pools: Vec<BatchPool>,
    /// All subsets, addressed by stable key
    subsets: SlotMap<SubsetKey, BatchSubset>,
    /// All strokes, addressed by stable key
    strokes: SlotMap<StrokeKey, Stroke>,
    /// Interactive widgets
    widgets: SlotMap<WidgetKey, Widget>,
    /// Non-batched children, scanned in flat mode
    solitary: Vec<SolitaryObject>,
}

impl Canvas {
    /// Create an empty canvas on the given render layer.
    pub fn new(layer: u8) -> Self {
        Self {
            id: CanvasId(NEXT_CANVAS_ID.fetch_add(1, Ordering::Relaxed)),
            pose: Pose::IDENTITY,
            layer,
            pools: Vec::new(),
            subsets: SlotMap::with_key(),
            strokes: SlotMap::with_key(),
            widgets: SlotMap::with_key(),
            solitary: Vec::new(),
        }
    }

    // ===== ACCESSORS =====

    /// Process-unique identity
    pub fn id(&self) -> CanvasId {
        self.id
    }

    /// Canvas → world transform
    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// Replace the canvas → world transform
    pub fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }

    /// Render layer for GPU intersection culling
    pub fn layer(&self) -> u8 {
        self.layer
    }

    /// Mask selecting this canvas' render layer
    pub fn layer_mask(&self) -> LayerMask {
        LayerMask::from_layer(self.layer)
    }

    /// Number of batch pools
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Get a batch pool by index
    pub fn pool(&self, index: usize) -> Option<&BatchPool> {
        self.pools.get(index)
    }

    /// Get a subset by key (None once freed)
    pub fn subset(&self, key: SubsetKey) -> Option<&BatchSubset> {
        self.subsets.get(key)
    }

    /// Get a stroke by key
    pub fn stroke(&self, key: StrokeKey) -> Option<&Stroke> {
        self.strokes.get(key)
    }

    /// Number of live strokes
    pub fn stroke_count(&self) -> usize {
        self.strokes.len()
    }

    /// Get a widget by key
    pub fn widget(&self, key: WidgetKey) -> Option<&Widget> {
        self.widgets.get(key)
    }

    /// Number of solitary objects
    pub fn solitary_count(&self) -> usize {
        self.solitary.len()
    }

    /// Get a solitary object by index
    pub fn solitary_object(&self, index: usize) -> Option<&SolitaryObject> {
        self.solitary.get(index)
    }

    // ===== POOLS =====

    /// Find the pool for a brush name, creating it if absent.
    pub fn find_or_create_pool(&mut self, name: &str) -> usize {
        if let Some(index) = self.pools.iter().position(|p| p.name() == name) {
            return index;
        }
        self.pools.push(BatchPool::new(name));
        self.pools.len() - 1
    }

    // ===== BATCHED STROKES =====

    /// Add a batched stroke to a pool.
    ///
    /// Vertices are in canvas space; `triangles` indexes into `vertices`,
    /// three entries per triangle. Geometry is appended to the pool's
    /// last batch (a new batch is started when it is full).
    ///
    /// # Errors
    ///
    /// `InvalidReference` for a bad pool index; `InvalidGeometry` for
    /// fewer than 3 vertices, an index count that is not a multiple of 3,
    /// or an index out of range.
    pub fn add_batched_stroke(
        &mut self,
        pool_index: usize,
        vertices: &[Vec3],
        triangles: &[u32],
    ) -> Result<(StrokeKey, SubsetKey)> {
        if pool_index >= self.pools.len() {
            return Err(Error::InvalidReference(format!(
                "pool index {} out of range ({} pools)",
                pool_index,
                self.pools.len()
            )));
        }
        if vertices.len() < 3 {
            return Err(Error::InvalidGeometry(format!(
                "stroke needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }
        if triangles.is_empty() || triangles.len() % 3 != 0 {
            return Err(Error::InvalidGeometry(format!(
                "triangle index count {} is not a positive multiple of 3",
                triangles.len()
            )));
        }
        if let Some(bad) = triangles.iter().find(|i| **i as usize >= vertices.len()) {
            return Err(Error::InvalidGeometry(format!(
                "triangle index {} out of range ({} vertices)",
                bad,
                vertices.len()
            )));
        }

        let pool = &mut self.pools[pool_index];
        let batch_index = pool.writable_batch_index(vertices.len());
        let batch = pool.batch_mut(batch_index).expect("writable batch exists");
        let (first_index, index_count) = batch.append_geometry(vertices, triangles);

        let bounds = Aabb::from_points(vertices).expect("non-empty vertex set");
        let stroke_key = self.strokes.insert(Stroke::new());
        let subset_key = self.subsets.insert(BatchSubset::new(
            stroke_key,
            BatchRef { pool: pool_index, batch: batch_index },
            first_index,
            index_count,
            bounds,
        ));

        self.strokes[stroke_key].push_subset(subset_key);
        self.pools[pool_index]
            .batch_mut(batch_index)
            .expect("writable batch exists")
            .push_subset(subset_key);

        Ok((stroke_key, subset_key))
    }

    /// Toggle a subset's active flag (e.g. erase / un-erase).
    pub fn set_subset_active(&mut self, key: SubsetKey, active: bool) -> Result<()> {
        match self.subsets.get_mut(key) {
            Some(subset) => {
                subset.set_active(active);
                Ok(())
            }
            None => Err(Error::InvalidReference("subset key not found".to_string())),
        }
    }

    /// Detach a subset from its batch.
    ///
    /// The subset stays allocated with its owning-batch reference
    /// cleared, so results still in flight observe it as stale instead
    /// of dangling. The batch stops iterating over it immediately.
    pub fn remove_subset(&mut self, key: SubsetKey) -> Result<()> {
        let owning = match self.subsets.get(key) {
            Some(subset) => subset.owning_batch(),
            None => {
                return Err(Error::InvalidReference("subset key not found".to_string()));
            }
        };

        if let Some(batch_ref) = owning {
            if let Some(batch) = self
                .pools
                .get_mut(batch_ref.pool)
                .and_then(|p| p.batch_mut(batch_ref.batch))
            {
                batch.remove_subset(key);
            }
        }

        self.subsets[key].detach();
        Ok(())
    }

    /// Remove a stroke: detaches all of its subsets.
    pub fn remove_stroke(&mut self, key: StrokeKey) -> Result<()> {
        let subset_keys: Vec<SubsetKey> = match self.strokes.get(key) {
            Some(stroke) => stroke.subsets().to_vec(),
            None => {
                return Err(Error::InvalidReference("stroke key not found".to_string()));
            }
        };
        for subset_key in subset_keys {
            // Subsets already detached by an earlier removal are fine
            let _ = self.remove_subset(subset_key);
        }
        self.strokes.remove(key);
        Ok(())
    }

    // ===== WIDGETS =====

    /// Add a widget.
    pub fn add_widget(&mut self, name: &str) -> WidgetKey {
        self.widgets.insert(Widget {
            name: name.to_string(),
            active: true,
        })
    }

    /// Remove a widget. Returns false if the key was already invalid.
    ///
    /// GPU results referencing the removed key observe staleness via the
    /// failed lookup.
    pub fn remove_widget(&mut self, key: WidgetKey) -> bool {
        self.widgets.remove(key).is_some()
    }

    // ===== SOLITARY OBJECTS =====

    /// Add a plain solitary object (no stroke association).
    pub fn add_solitary_object(&mut self, pose: Pose, vertices: Vec<Vec3>) -> Result<usize> {
        self.push_solitary(pose, vertices, None)
    }

    /// Add a solitary object that is itself a paintable stroke.
    pub fn add_solitary_stroke(
        &mut self,
        pose: Pose,
        vertices: Vec<Vec3>,
    ) -> Result<(StrokeKey, usize)> {
        let stroke_key = self.strokes.insert(Stroke::new());
        let index = self.push_solitary(pose, vertices, Some(stroke_key))?;
        Ok((stroke_key, index))
    }

    /// Toggle a solitary object's active flag.
    pub fn set_solitary_active(&mut self, index: usize, active: bool) -> Result<()> {
        match self.solitary.get_mut(index) {
            Some(object) => {
                object.active = active;
                Ok(())
            }
            None => Err(Error::InvalidReference(format!(
                "solitary object index {} out of range",
                index
            ))),
        }
    }

    fn push_solitary(
        &mut self,
        pose: Pose,
        vertices: Vec<Vec3>,
        stroke: Option<StrokeKey>,
    ) -> Result<usize> {
        if vertices.len() < 3 || vertices.len() % 3 != 0 {
            return Err(Error::InvalidGeometry(format!(
                "solitary mesh vertex count {} is not a positive multiple of 3",
                vertices.len()
            )));
        }
        let bounds = Aabb::from_points(&vertices).expect("non-empty vertex set");
        self.solitary.push(SolitaryObject {
            pose,
            vertices,
            bounds,
            active: true,
            stroke,
        });
        Ok(self.solitary.len() - 1)
    }
}

#[cfg(test)]
#[path = "canvas_tests.rs"]
mod tests;
