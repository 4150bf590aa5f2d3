use ndarray::Array2;
use shardscan_core::{BackendError, ComputeContext};
use std::fmt;

/// Why one shard contributed nothing to the merge.
#[derive(Debug, Clone, PartialEq)]
pub struct ShardFailure {
    pub shard: usize,
    pub context: ComputeContext,
    pub reason: BackendError,
}

impl fmt::Display for ShardFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shard {} on {}: {}", self.shard, self.context, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShardStatus {
    Ok,
    Failed(ShardFailure),
}

impl ShardStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    pub fn failure(&self) -> Option<&ShardFailure> {
        match self {
            Self::Ok => None,
            Self::Failed(failure) => Some(failure),
        }
    }
}

/// Result of one search call: the merged `[n][k]` top-k plus one status per
/// shard. Rows may hold fewer than `k` real neighbors when shards failed.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub distances: Array2<f32>,
    pub labels: Array2<i64>,
    pub shards: Vec<ShardStatus>,
}

impl SearchOutcome {
    pub fn is_complete(&self) -> bool {
        self.shards.iter().all(ShardStatus::is_ok)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ShardFailure> {
        self.shards.iter().filter_map(ShardStatus::failure)
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    /// `(global label, distance)` pairs of query `row`, empty slots skipped.
    pub fn neighbors(&self, row: usize) -> Vec<(i64, f32)> {
        self.labels
            .row(row)
            .iter()
            .zip(self.distances.row(row).iter())
            .filter(|(&label, _)| label >= 0)
            .map(|(&label, &dist)| (label, dist))
            .collect()
    }
}
