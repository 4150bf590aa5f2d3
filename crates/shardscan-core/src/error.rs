use crate::shard::ComputeContext;
use thiserror::Error;

/// Failure of a single shard's search. Never aborts the batch; the
/// dispatcher records it and excludes the shard from the merge.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("compute context {context} is not available on backend '{backend}'")]
    ContextUnavailable {
        context: ComputeContext,
        backend: &'static str,
    },

    #[error("failed to open compute stream on {context}: {reason}")]
    StreamAllocation {
        context: ComputeContext,
        reason: String,
    },

    #[error("reference dimension {reference} does not match query dimension {query}")]
    DimensionMismatch { reference: usize, query: usize },

    #[error("output buffer has shape {got:?}, expected {expected:?}")]
    OutputShape {
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("distance kernel failed: {0}")]
    Kernel(String),

    #[error("stream synchronization failed: {0}")]
    Synchronize(String),

    #[error("backend panicked: {0}")]
    Panicked(String),
}

/// Invalid configuration value, from the environment, a file, or a flag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("unknown distance type '{0}'")]
    UnknownDistance(String),
}
