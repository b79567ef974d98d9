/// Resumable scan cursors.
///
/// Plain value types holding one integer per nesting level of the scene
/// hierarchy. A cursor only ever moves forward within one scan pass;
/// `reset()` is the single way back to the zero position. No recursion,
/// so suspending between frames is just returning to the caller.

// ===== BATCH CURSOR =====

/// Scan position over batched storage: pools → batches → subsets →
/// triangle indices.
///
/// `tri` is the offset within the current subset's triangle index range
/// and advances three indices at a time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchCursor {
    /// Pool index within the canvas
    pub pool: usize,
    /// Batch index within the pool
    pub batch: usize,
    /// Subset index within the batch
    pub subset: usize,
    /// Triangle-index offset within the subset (multiple of 3)
    pub tri: usize,
}

impl BatchCursor {
    /// Return to the zero position.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Step to the next triangle of the current subset.
    pub fn advance_leaf(&mut self) {
        self.tri += 3;
    }

    /// Step to the next subset, rolling over into the next batch or pool
    /// when the current container is exhausted.
    ///
    /// Returns false once the cursor has moved past the last pool.
    pub fn advance_subset(
        &mut self,
        subset_count: usize,
        batch_count: usize,
        pool_count: usize,
    ) -> bool {
        self.tri = 0;
        self.subset += 1;
        if self.subset < subset_count {
            return true;
        }
        self.subset = 0;
        self.batch += 1;
        if self.batch < batch_count {
            return true;
        }
        self.batch = 0;
        self.pool += 1;
        self.pool < pool_count
    }

    /// Skip the remainder of the current batch.
    ///
    /// Returns false once the cursor has moved past the last pool.
    pub fn advance_batch(&mut self, batch_count: usize, pool_count: usize) -> bool {
        self.tri = 0;
        self.subset = 0;
        self.batch += 1;
        if self.batch < batch_count {
            return true;
        }
        self.batch = 0;
        self.pool += 1;
        self.pool < pool_count
    }

    /// Skip the remainder of the current pool.
    ///
    /// Returns false once the cursor has moved past the last pool.
    pub fn advance_pool(&mut self, pool_count: usize) -> bool {
        self.tri = 0;
        self.subset = 0;
        self.batch = 0;
        self.pool += 1;
        self.pool < pool_count
    }
}

// ===== FLAT CURSOR =====

/// Scan position over the flat object list: object → vertex triplet.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlatCursor {
    /// Object index within the canvas' solitary list
    pub object: usize,
    /// Vertex offset within the object's triangle soup (multiple of 3)
    pub vert: usize,
}

impl FlatCursor {
    /// Return to the zero position.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Step to the next triangle of the current object.
    pub fn advance_leaf(&mut self) {
        self.vert += 3;
    }

    /// Step to the next object.
    ///
    /// Returns false once the cursor has moved past the last object.
    pub fn advance_object(&mut self, object_count: usize) -> bool {
        self.vert = 0;
        self.object += 1;
        self.object < object_count
    }
}

#[cfg(test)]
#[path = "cursor_tests.rs"]
mod tests;
