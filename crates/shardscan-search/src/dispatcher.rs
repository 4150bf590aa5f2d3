use crate::error::SearchError;
use crate::outcome::{SearchOutcome, ShardFailure, ShardStatus};
use crate::translations;
use ndarray::ArrayView2;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use shardscan_core::transform::finish;
use shardscan_core::{
    BackendError, ComputeStream, ContextPolicy, DistanceBackend, DistanceTransform, DistanceType,
    Identity, SearchConfig, ShardHandle, Sqrt,
};
use shardscan_merge::{CandidateTable, MergeOrder, ShardSlot};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

/// Finishing step for a metric, or the rejection for metrics brute-force
/// sharded search does not serve.
pub fn finishing_transform(metric: DistanceType) -> Result<Box<dyn DistanceTransform>, SearchError> {
    match metric {
        DistanceType::L2Unexpanded => Ok(Box::new(Identity)),
        DistanceType::L2UnexpandedSqrt => Ok(Box::new(Sqrt)),
        other => Err(SearchError::UnsupportedMetric(other)),
    }
}

/// Runs one brute-force search per shard in parallel and merges the
/// per-shard top-k lists into the global top-k.
pub struct ShardSearchDispatcher<B: DistanceBackend> {
    backend: B,
    config: SearchConfig,
    pool: Option<ThreadPool>,
}

impl<B: DistanceBackend> ShardSearchDispatcher<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            config: SearchConfig::default(),
            pool: None,
        }
    }

    pub fn with_config(backend: B, config: SearchConfig) -> Result<Self, SearchError> {
        let pool = config
            .threads
            .map(|threads| {
                ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("shardscan-{i}"))
                    .build()
            })
            .transpose()?;
        Ok(Self {
            backend,
            config,
            pool,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Exact top-`k` of every query row over all shards.
    ///
    /// Configuration problems fail the call before any shard runs. A shard
    /// that fails while searching is reported in [`SearchOutcome::shards`]
    /// and simply contributes no candidates.
    pub fn search(
        &self,
        shards: &[ShardHandle],
        queries: ArrayView2<'_, f32>,
        k: usize,
        metric: DistanceType,
        translations: Option<&[i64]>,
    ) -> Result<SearchOutcome, SearchError> {
        let transform = finishing_transform(metric)?;
        self.search_with_transform(shards, queries, k, translations, transform.as_ref())
    }

    /// Like [`search`](Self::search) with squared-L2 ranking and a caller
    /// supplied monotonic finishing transform.
    pub fn search_with_transform(
        &self,
        shards: &[ShardHandle],
        queries: ArrayView2<'_, f32>,
        k: usize,
        translations: Option<&[i64]>,
        transform: &dyn DistanceTransform,
    ) -> Result<SearchOutcome, SearchError> {
        let translations = translations::resolve(shards, translations)?;
        self.validate(shards, queries)?;

        let run = || self.run(shards, queries, k, &translations, transform);
        Ok(match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        })
    }

    /// Dispatch only: the stacked per-shard candidates, before any merge.
    pub fn dispatch(
        &self,
        shards: &[ShardHandle],
        queries: ArrayView2<'_, f32>,
        k: usize,
    ) -> Result<(CandidateTable, Vec<ShardStatus>), SearchError> {
        self.validate(shards, queries)?;

        let run = || {
            let mut table = CandidateTable::new(shards.len(), queries.nrows(), k, MergeOrder::Smallest);
            let statuses = self.dispatch_into(&mut table, shards, queries, k);
            (table, statuses)
        };
        Ok(match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        })
    }

    fn validate(&self, shards: &[ShardHandle], queries: ArrayView2<'_, f32>) -> Result<(), SearchError> {
        let expected = queries.ncols();
        for (shard, handle) in shards.iter().enumerate() {
            if handle.dim() != expected {
                return Err(SearchError::DimensionMismatch {
                    shard,
                    expected,
                    got: handle.dim(),
                });
            }
            let context = handle.compute_context();
            if self.config.context_policy == ContextPolicy::FailFast
                && !self.backend.recognizes(context)
            {
                return Err(SearchError::UnresolvableContext { shard, context });
            }
        }
        Ok(())
    }

    fn run(
        &self,
        shards: &[ShardHandle],
        queries: ArrayView2<'_, f32>,
        k: usize,
        translations: &[i64],
        transform: &dyn DistanceTransform,
    ) -> SearchOutcome {
        let start = Instant::now();
        let n = queries.nrows();

        // Every slot starts as the sentinel, so a failed shard adds nothing.
        let mut table = CandidateTable::new(shards.len(), n, k, MergeOrder::Smallest);
        let statuses = self.dispatch_into(&mut table, shards, queries, k);

        let (mut distances, labels) = table.merge(translations);
        finish(transform, distances.view_mut(), labels.view());

        let failed = statuses.iter().filter(|s| !s.is_ok()).count();
        tracing::info!(
            backend = self.backend.name(),
            shards = shards.len(),
            failed,
            queries = n,
            k,
            elapsed_us = start.elapsed().as_micros() as u64,
            "sharded search complete"
        );

        SearchOutcome {
            distances,
            labels,
            shards: statuses,
        }
    }

    /// Joins every shard task before returning; the table is complete after.
    fn dispatch_into(
        &self,
        table: &mut CandidateTable,
        shards: &[ShardHandle],
        queries: ArrayView2<'_, f32>,
        k: usize,
    ) -> Vec<ShardStatus> {
        shards
            .par_iter()
            .zip(table.shard_slots_mut())
            .enumerate()
            .map(|(shard, (handle, slot))| self.search_shard(shard, handle, queries, k, slot))
            .collect()
    }

    fn search_shard(
        &self,
        shard: usize,
        handle: &ShardHandle,
        queries: ArrayView2<'_, f32>,
        k: usize,
        mut slot: ShardSlot<'_>,
    ) -> ShardStatus {
        let context = handle.compute_context();
        tracing::debug!(shard, rows = handle.rows(), %context, "dispatching shard search");

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.search_shard_inner(handle, queries, k, &mut slot)
        }))
        .unwrap_or_else(|payload| Err(BackendError::Panicked(panic_message(payload.as_ref()))));

        match result {
            Ok(()) => ShardStatus::Ok,
            Err(reason) => {
                // discard anything the backend wrote before failing
                slot.invalidate();
                tracing::warn!(shard, %context, error = %reason, "shard search failed; excluded from merge");
                ShardStatus::Failed(ShardFailure {
                    shard,
                    context,
                    reason,
                })
            }
        }
    }

    fn search_shard_inner(
        &self,
        handle: &ShardHandle,
        queries: ArrayView2<'_, f32>,
        k: usize,
        slot: &mut ShardSlot<'_>,
    ) -> Result<(), BackendError> {
        let context = handle.compute_context();
        if !self.backend.recognizes(context) {
            return Err(BackendError::ContextUnavailable {
                context,
                backend: self.backend.name(),
            });
        }

        let mut stream = self.backend.open_stream(context, self.config.scratch)?;
        stream.brute_force_knn(
            handle.data(),
            queries,
            k,
            slot.distances.view_mut(),
            slot.labels.view_mut(),
        )?;
        stream.synchronize()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
