#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]

pub mod backend;
pub mod config;
pub mod cpu;
pub mod error;
pub mod shard;
pub mod transform;

pub use backend::{ComputeStream, DistanceBackend};
pub use config::{ContextPolicy, ScratchMemory, SearchConfig};
pub use cpu::CpuBackend;
pub use error::{BackendError, ConfigError};
pub use shard::{ComputeContext, ShardHandle};
pub use transform::{DistanceTransform, FnTransform, Identity, Sqrt};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Row identifier as produced by a backend or the merger.
pub type Label = i64;

/// Label of an empty candidate slot.
pub const INVALID_LABEL: Label = -1;

/// Distance semantics a search can be asked for.
///
/// Only the unexpanded L2 variants are served by sharded brute-force search;
/// the others exist so configuration can name them and be rejected cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceType {
    /// `||a||^2 + ||b||^2 - 2<a,b>`
    L2Expanded,
    L2ExpandedSqrt,
    /// `sum((a - b)^2)`
    L2Unexpanded,
    L2UnexpandedSqrt,
    Cosine,
    L1,
    InnerProduct,
}

impl DistanceType {
    pub fn name(self) -> &'static str {
        match self {
            Self::L2Expanded => "l2_expanded",
            Self::L2ExpandedSqrt => "l2_expanded_sqrt",
            Self::L2Unexpanded => "l2",
            Self::L2UnexpandedSqrt => "l2_sqrt",
            Self::Cosine => "cosine",
            Self::L1 => "l1",
            Self::InnerProduct => "inner_product",
        }
    }

    /// True when results are reported as the square root of the squared distance.
    pub fn is_sqrt(self) -> bool {
        matches!(self, Self::L2ExpandedSqrt | Self::L2UnexpandedSqrt)
    }
}

impl fmt::Display for DistanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistanceType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "l2" | "l2_unexpanded" | "euclidean_sq" => Ok(Self::L2Unexpanded),
            "l2_sqrt" | "l2_unexpanded_sqrt" | "euclidean" => Ok(Self::L2UnexpandedSqrt),
            "l2_expanded" => Ok(Self::L2Expanded),
            "l2_expanded_sqrt" => Ok(Self::L2ExpandedSqrt),
            "cosine" => Ok(Self::Cosine),
            "l1" | "manhattan" => Ok(Self::L1),
            "inner_product" | "ip" => Ok(Self::InnerProduct),
            other => Err(ConfigError::UnknownDistance(other.to_string())),
        }
    }
}
