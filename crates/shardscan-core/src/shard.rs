use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Where a shard's reference data lives.
///
/// Decided when the shard is registered, never inferred at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputeContext {
    Host,
    Device(u32),
}

impl fmt::Display for ComputeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => f.write_str("host"),
            Self::Device(ordinal) => write!(f, "device:{ordinal}"),
        }
    }
}

/// One reference partition: `rows x dim` row-major data plus its affinity.
///
/// Cloning is cheap; the data is shared read-only between searches.
#[derive(Debug, Clone)]
pub struct ShardHandle {
    data: Arc<Array2<f32>>,
    compute_context: ComputeContext,
}

impl ShardHandle {
    pub fn new(data: Arc<Array2<f32>>, compute_context: ComputeContext) -> Self {
        Self {
            data,
            compute_context,
        }
    }

    pub fn host(data: Array2<f32>) -> Self {
        Self::new(Arc::new(data), ComputeContext::Host)
    }

    pub fn on_device(data: Array2<f32>, ordinal: u32) -> Self {
        Self::new(Arc::new(data), ComputeContext::Device(ordinal))
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.data.ncols()
    }

    #[inline]
    pub fn data(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    #[inline]
    pub fn compute_context(&self) -> ComputeContext {
        self.compute_context
    }
}
