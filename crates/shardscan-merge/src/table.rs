use crate::comparator::MergeOrder;
use ndarray::parallel::prelude::*;
use ndarray::{Array3, ArrayView3, ArrayViewMut2, Axis};
use shardscan_core::INVALID_LABEL;

/// Stacked per-shard candidates, `[nshard][n][k]`, shard-major.
///
/// Every slot starts as the sentinel `(neutral, -1)`, so a shard that never
/// writes (or whose write is discarded) contributes nothing to a merge.
#[derive(Debug, Clone)]
pub struct CandidateTable {
    distances: Array3<f32>,
    labels: Array3<i64>,
    order: MergeOrder,
}

/// One shard's `[n][k]` slice of a [`CandidateTable`].
#[derive(Debug)]
pub struct ShardSlot<'a> {
    pub distances: ArrayViewMut2<'a, f32>,
    pub labels: ArrayViewMut2<'a, i64>,
    neutral: f32,
}

impl ShardSlot<'_> {
    /// Resets the slot to the sentinel, discarding anything partially written.
    pub fn invalidate(&mut self) {
        self.distances.fill(self.neutral);
        self.labels.fill(INVALID_LABEL);
    }
}

impl CandidateTable {
    pub fn new(nshard: usize, n: usize, k: usize, order: MergeOrder) -> Self {
        Self {
            distances: Array3::from_elem((nshard, n, k), order.neutral()),
            labels: Array3::from_elem((nshard, n, k), INVALID_LABEL),
            order,
        }
    }

    /// Wraps already-filled tables.
    ///
    /// # Panics
    /// If the two arrays differ in shape.
    pub fn from_parts(distances: Array3<f32>, labels: Array3<i64>, order: MergeOrder) -> Self {
        assert_eq!(
            distances.dim(),
            labels.dim(),
            "distance and label tables must have the same shape"
        );
        Self {
            distances,
            labels,
            order,
        }
    }

    /// `(nshard, n, k)`
    pub fn dim(&self) -> (usize, usize, usize) {
        self.distances.dim()
    }

    /// Direction candidates are sorted in and merged by.
    pub fn order(&self) -> MergeOrder {
        self.order
    }

    pub fn distances(&self) -> ArrayView3<'_, f32> {
        self.distances.view()
    }

    pub fn labels(&self) -> ArrayView3<'_, i64> {
        self.labels.view()
    }

    pub fn shard_mut(&mut self, shard: usize) -> ShardSlot<'_> {
        ShardSlot {
            distances: self.distances.index_axis_mut(Axis(0), shard),
            labels: self.labels.index_axis_mut(Axis(0), shard),
            neutral: self.order.neutral(),
        }
    }

    /// Disjoint mutable slots, one per shard, for parallel writers.
    pub fn shard_slots_mut(&mut self) -> impl IndexedParallelIterator<Item = ShardSlot<'_>> + '_ {
        let neutral = self.order.neutral();
        self.distances
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(self.labels.axis_iter_mut(Axis(0)).into_par_iter())
            .map(move |(distances, labels)| ShardSlot {
                distances,
                labels,
                neutral,
            })
    }

    pub fn invalidate_shard(&mut self, shard: usize) {
        self.shard_mut(shard).invalidate();
    }

    /// Number of non-sentinel candidates held for `shard`.
    pub fn valid_count(&self, shard: usize) -> usize {
        self.labels
            .index_axis(Axis(0), shard)
            .iter()
            .filter(|&&label| label >= 0)
            .count()
    }
}
