//! Distance backend abstraction.
//!
//! A backend knows which compute contexts it can reach and opens a transient
//! stream on one of them. The stream runs a brute-force top-k search of one
//! shard against the full query batch and writes straight into the shard's
//! slot of the stacked candidate table.
//!
//! ```text
//!  ShardHandle ──► recognizes(ctx)? ──► open_stream(ctx, scratch)
//!                                              │
//!                                              ▼
//!                               brute_force_knn(reference, queries, k)
//!                                              │  writes [n, k] distances
//!                                              │  and local labels
//!                                              ▼
//!                                        synchronize()
//!                                              │
//!                                              ▼
//!                                        drop (release)
//! ```
//!
//! Output contract for `brute_force_knn`: every one of the `n * k` slots is
//! written. Each query row is sorted ascending by distance, and rows for
//! shards with fewer than `k` reference points are padded with
//! `(f32::MAX, -1)`.

use crate::config::ScratchMemory;
use crate::error::BackendError;
use crate::shard::ComputeContext;
use ndarray::{ArrayView2, ArrayViewMut2};

pub trait DistanceBackend: Send + Sync {
    type Stream: ComputeStream;

    fn name(&self) -> &'static str;

    /// Whether data resident on `context` can be searched by this backend.
    fn recognizes(&self, context: ComputeContext) -> bool;

    /// Opens a stream scoped to one shard search. Dropping it releases it.
    fn open_stream(
        &self,
        context: ComputeContext,
        scratch: ScratchMemory,
    ) -> Result<Self::Stream, BackendError>;
}

pub trait ComputeStream {
    fn brute_force_knn(
        &mut self,
        reference: ArrayView2<'_, f32>,
        queries: ArrayView2<'_, f32>,
        k: usize,
        distances: ArrayViewMut2<'_, f32>,
        labels: ArrayViewMut2<'_, i64>,
    ) -> Result<(), BackendError>;

    /// Blocks until all work queued on the stream has completed.
    fn synchronize(&mut self) -> Result<(), BackendError> {
        Ok(())
    }
}
