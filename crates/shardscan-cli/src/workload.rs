use ndarray::{s, Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shardscan_core::{ComputeContext, ShardHandle};

/// Device ordinal no backend recognizes; used to force a shard failure.
pub const UNREACHABLE_DEVICE: u32 = 999;

/// A reproducible reference set split into shards plus a query batch.
pub struct Workload {
    pub data: Array2<f32>,
    pub queries: Array2<f32>,
    pub shards: Vec<ShardHandle>,
}

pub struct Layout {
    pub shards: usize,
    pub rows: usize,
    pub dim: usize,
    pub queries: usize,
    pub devices: u32,
    pub seed: u64,
    pub fail_shard: Option<usize>,
}

impl Workload {
    /// Shards are as even as possible; the first `rows % shards` get one
    /// extra row. Contexts rotate over host and the simulated devices.
    pub fn generate(layout: &Layout) -> Self {
        let mut rng = StdRng::seed_from_u64(layout.seed);
        let data = Array2::from_shape_fn((layout.rows, layout.dim), |_| rng.gen_range(-1.0..1.0));
        let queries =
            Array2::from_shape_fn((layout.queries, layout.dim), |_| rng.gen_range(-1.0..1.0));

        let nshard = layout.shards.max(1);
        let base = layout.rows / nshard;
        let extra = layout.rows % nshard;
        let mut start = 0;
        let mut shards = Vec::with_capacity(nshard);
        for i in 0..nshard {
            let rows = base + usize::from(i < extra);
            let part = data.slice(s![start..start + rows, ..]).to_owned();
            start += rows;

            let slot = i as u32 % (layout.devices + 1);
            let context = if layout.fail_shard == Some(i) {
                ComputeContext::Device(UNREACHABLE_DEVICE)
            } else if slot == 0 {
                ComputeContext::Host
            } else {
                ComputeContext::Device(slot - 1)
            };
            shards.push(ShardHandle::new(part.into(), context));
        }

        Self {
            data,
            queries,
            shards,
        }
    }
}

/// Naive exact top-k by full sort over `data`, skipping rows for which
/// `excluded` is true. Ties go to the lower row.
pub fn reference_top_k(
    data: ArrayView2<'_, f32>,
    queries: ArrayView2<'_, f32>,
    k: usize,
    excluded: impl Fn(usize) -> bool,
) -> Vec<Vec<(i64, f32)>> {
    queries
        .rows()
        .into_iter()
        .map(|q| {
            let mut all: Vec<(f32, usize)> = data
                .rows()
                .into_iter()
                .enumerate()
                .filter(|(row, _)| !excluded(*row))
                .map(|(row, r)| {
                    let d: f32 = q.iter().zip(r.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
                    (d, row)
                })
                .collect();
            all.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            all.into_iter()
                .take(k)
                .map(|(d, row)| (row as i64, d))
                .collect()
        })
        .collect()
}
