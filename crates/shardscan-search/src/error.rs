use shardscan_core::{ComputeContext, ConfigError, DistanceType};
use thiserror::Error;

/// Rejection of a whole search call. Raised before any shard runs, so there
/// are never partial results alongside one of these.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("distance type '{0}' is not supported; sharded brute-force search serves l2 and l2_sqrt")]
    UnsupportedMetric(DistanceType),

    #[error("translation table has {got} entries but there are {expected} shards")]
    TranslationLength { expected: usize, got: usize },

    #[error("translation offset {offset} for shard {shard} is negative")]
    NegativeTranslation { shard: usize, offset: i64 },

    #[error("global row offset overflows at shard {shard}")]
    TranslationOverflow { shard: usize },

    #[error("shard {shard} has dimension {got}, queries have dimension {expected}")]
    DimensionMismatch {
        shard: usize,
        expected: usize,
        got: usize,
    },

    #[error("shard {shard} is not resident on a recognized compute context ({context})")]
    UnresolvableContext {
        shard: usize,
        context: ComputeContext,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build search worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
