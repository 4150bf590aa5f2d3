//! CPU reference backend for exact brute-force KNN.
//!
//! Serves as the validation baseline for device backends and as the fallback
//! when no accelerator is available. Distances are unexpanded squared L2,
//! `sum((r - q)^2)`, so results are bit-identical no matter how the
//! reference rows are partitioned.

use crate::backend::{ComputeStream, DistanceBackend};
use crate::config::ScratchMemory;
use crate::error::BackendError;
use crate::shard::ComputeContext;
use crate::{Label, INVALID_LABEL};
use ndarray::{ArrayView1, ArrayView2, ArrayViewMut2, Axis};
use std::cmp::Ordering;

const CANDIDATE_BYTES: usize = std::mem::size_of::<(f32, usize)>();

/// Host backend. Optionally exposes `device_count` simulated device
/// ordinals that run on the host too, so multi-device layouts can be
/// exercised without hardware.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBackend {
    device_count: u32,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(device_count: u32) -> Self {
        Self { device_count }
    }
}

impl DistanceBackend for CpuBackend {
    type Stream = CpuStream;

    fn name(&self) -> &'static str {
        "cpu"
    }

    fn recognizes(&self, context: ComputeContext) -> bool {
        match context {
            ComputeContext::Host => true,
            ComputeContext::Device(ordinal) => ordinal < self.device_count,
        }
    }

    fn open_stream(
        &self,
        context: ComputeContext,
        scratch: ScratchMemory,
    ) -> Result<CpuStream, BackendError> {
        if !self.recognizes(context) {
            return Err(BackendError::ContextUnavailable {
                context,
                backend: self.name(),
            });
        }
        let reserved = scratch.bytes() / CANDIDATE_BYTES;
        tracing::trace!(%context, reserved, "opened cpu stream");
        Ok(CpuStream {
            candidates: Vec::with_capacity(reserved),
        })
    }
}

/// Shard-scoped stream. Owns the candidate buffer reused across queries.
#[derive(Debug)]
pub struct CpuStream {
    candidates: Vec<(f32, usize)>,
}

impl ComputeStream for CpuStream {
    fn brute_force_knn(
        &mut self,
        reference: ArrayView2<'_, f32>,
        queries: ArrayView2<'_, f32>,
        k: usize,
        mut distances: ArrayViewMut2<'_, f32>,
        mut labels: ArrayViewMut2<'_, i64>,
    ) -> Result<(), BackendError> {
        if reference.ncols() != queries.ncols() {
            return Err(BackendError::DimensionMismatch {
                reference: reference.ncols(),
                query: queries.ncols(),
            });
        }
        let expected = (queries.nrows(), k);
        for got in [distances.dim(), labels.dim()] {
            if got != expected {
                return Err(BackendError::OutputShape { expected, got });
            }
        }

        for ((query, mut d_row), mut l_row) in queries
            .axis_iter(Axis(0))
            .zip(distances.axis_iter_mut(Axis(0)))
            .zip(labels.axis_iter_mut(Axis(0)))
        {
            l2_unexpanded_batch(reference, query, &mut self.candidates);
            select_k_smallest(&mut self.candidates, k);

            for slot in 0..k {
                match self.candidates.get(slot) {
                    Some(&(dist, row)) => {
                        d_row[slot] = dist;
                        l_row[slot] = Label::try_from(row)
                            .map_err(|_| BackendError::Kernel(format!("row {row} overflows label")))?;
                    }
                    None => {
                        d_row[slot] = f32::MAX;
                        l_row[slot] = INVALID_LABEL;
                    }
                }
            }
        }

        Ok(())
    }
}

/// Squared L2 from `query` to every row of `reference`, as `(distance, row)`.
pub fn l2_unexpanded_batch(
    reference: ArrayView2<'_, f32>,
    query: ArrayView1<'_, f32>,
    out: &mut Vec<(f32, usize)>,
) {
    out.clear();
    out.extend(reference.axis_iter(Axis(0)).enumerate().map(|(row, r)| {
        let dist: f32 = r
            .iter()
            .zip(query.iter())
            .map(|(a, b)| {
                let d = a - b;
                d * d
            })
            .sum();
        (dist, row)
    }));
}

#[inline]
fn by_distance_then_row(a: &(f32, usize), b: &(f32, usize)) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}

/// Keeps the `k` smallest candidates, sorted. Ties go to the lower row.
pub fn select_k_smallest(candidates: &mut Vec<(f32, usize)>, k: usize) {
    if k == 0 {
        candidates.clear();
        return;
    }
    if candidates.len() > k {
        candidates.select_nth_unstable_by(k - 1, by_distance_then_row);
        candidates.truncate(k);
    }
    candidates.sort_unstable_by(by_distance_then_row);
}
