use ndarray::{concatenate, Array2, Axis};
use shardscan_core::{CpuBackend, DistanceType, ShardHandle};
use shardscan_search::search_with_backend;

const DIM: usize = 1024;

fn point(x: f32) -> Array2<f32> {
    let mut v = Array2::zeros((1, DIM));
    v[[0, 0]] = x;
    v
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🚀 Starting L2 Integrity Test");

    // A at the origin on its own shard, B (0.5) and C (0.8) on a second one
    let (b, c) = (point(0.5), point(0.8));
    let shards = vec![
        ShardHandle::host(point(0.0)),
        ShardHandle::on_device(concatenate(Axis(0), &[b.view(), c.view()])?, 0),
    ];
    let origin = point(0.0);
    let rows: Vec<usize> = shards.iter().map(ShardHandle::rows).collect();
    println!("📦 {} shards, rows {rows:?}", shards.len());

    for (metric, to_b, to_c) in [
        (DistanceType::L2Unexpanded, 0.25, 0.64),
        (DistanceType::L2UnexpandedSqrt, 0.5, 0.8),
    ] {
        println!("🔍 Searching for origin with metric={metric}...");
        let outcome = search_with_backend(
            CpuBackend::with_devices(1),
            &shards,
            origin.view(),
            3,
            metric,
            None,
        )?;
        let found = outcome.neighbors(0);
        println!("Results: {found:?}");

        let expected = [(0_i64, 0.0_f32), (1, to_b), (2, to_c)];
        if found.len() != expected.len()
            || found
                .iter()
                .zip(expected)
                .any(|(&(l, d), (el, ed))| l != el || (d - ed).abs() > 1e-6)
        {
            return Err(format!("{metric}: expected {expected:?}, got {found:?}").into());
        }
    }

    println!("✅ L2 Distance Verification PASSED!");
    Ok(())
}
