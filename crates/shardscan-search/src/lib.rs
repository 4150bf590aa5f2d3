#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]

//! Exact KNN over a sharded reference set.
//!
//! [`ShardSearchDispatcher`] runs one brute-force search per shard on the
//! configured [`DistanceBackend`], each on its own transient stream, then
//! merges the per-shard top-k lists into one global top-k per query with
//! local row ids translated into the global numbering.

pub mod dispatcher;
pub mod error;
pub mod outcome;
pub mod translations;

pub use dispatcher::{finishing_transform, ShardSearchDispatcher};
pub use error::SearchError;
pub use outcome::{SearchOutcome, ShardFailure, ShardStatus};

use ndarray::ArrayView2;
use shardscan_core::{DistanceBackend, DistanceType, ShardHandle};

/// One-shot search with the default configuration.
pub fn search_with_backend<B: DistanceBackend>(
    backend: B,
    shards: &[ShardHandle],
    queries: ArrayView2<'_, f32>,
    k: usize,
    metric: DistanceType,
    translations: Option<&[i64]>,
) -> Result<SearchOutcome, SearchError> {
    ShardSearchDispatcher::new(backend).search(shards, queries, k, metric, translations)
}
