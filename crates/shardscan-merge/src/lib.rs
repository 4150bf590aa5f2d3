#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

//! K-way merge of per-shard top-k lists into one global top-k per query.
//!
//! Each shard contributes, for every query row, `k` candidates already sorted
//! by the merge direction, with local label `-1` marking an empty slot. The
//! merge keeps one head per shard in a heap bounded by `nshard`, so a row
//! costs `O(k log nshard)` instead of sorting all `nshard * k` candidates.

pub mod comparator;
pub mod table;

pub use comparator::{Comparator, LargestFirst, MergeOrder, SmallestFirst};
pub use table::{CandidateTable, ShardSlot};

use ndarray::{s, Array2, ArrayView2, ArrayView3, ArrayViewMut1, ArrayViewMut2, Axis};
use rayon::prelude::*;
use shardscan_core::INVALID_LABEL;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::marker::PhantomData;

/// Current best unread candidate of one shard.
#[derive(Debug)]
struct Head<C> {
    distance: f32,
    shard: usize,
    _order: PhantomData<fn() -> C>,
}

impl<C> Head<C> {
    #[inline]
    fn new(distance: f32, shard: usize) -> Self {
        Self {
            distance,
            shard,
            _order: PhantomData,
        }
    }
}

// BinaryHeap pops its greatest element, so the head to emit next must
// compare greatest: better distance first, then lower shard.
impl<C: Comparator> Ord for Head<C> {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        C::order(self.distance, other.distance)
            .then(self.shard.cmp(&other.shard))
            .reverse()
    }
}
impl<C: Comparator> PartialOrd for Head<C> {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}
impl<C: Comparator> PartialEq for Head<C> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}
impl<C: Comparator> Eq for Head<C> {}

/// Per-worker scratch, sized once to `nshard` and reused across rows.
struct RowScratch<C> {
    heap: BinaryHeap<Head<C>>,
    pointers: Vec<usize>,
}

impl<C: Comparator> RowScratch<C> {
    fn new(nshard: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(nshard),
            pointers: vec![0; nshard],
        }
    }
}

/// Merges stacked `[nshard][n][k]` candidate tables into `[n][k]` outputs.
///
/// For every query row the output holds the `k` best candidates over all
/// shards, ordered by `C`, with `translations[s]` added to labels from shard
/// `s`. Exact ties go to the lower shard, then to the earlier position in
/// that shard's list. Slots beyond the available candidates get
/// `(C::neutral(), -1)`. With `k == 0` nothing is written.
///
/// Rows are merged in parallel on the current rayon pool.
///
/// # Panics
/// If the two input tables differ in shape, an output is not `[n][k]`, or
/// `translations.len() != nshard`.
pub fn merge_tables<C: Comparator>(
    all_distances: ArrayView3<'_, f32>,
    all_labels: ArrayView3<'_, i64>,
    translations: &[i64],
    mut distances: ArrayViewMut2<'_, f32>,
    mut labels: ArrayViewMut2<'_, i64>,
) {
    let (nshard, n, k) = all_distances.dim();
    assert_eq!(
        all_labels.dim(),
        (nshard, n, k),
        "label table shape does not match distance table"
    );
    assert_eq!(
        translations.len(),
        nshard,
        "translation table must have one entry per shard"
    );
    assert_eq!(distances.dim(), (n, k), "distance output must be [n][k]");
    assert_eq!(labels.dim(), (n, k), "label output must be [n][k]");

    if k == 0 {
        return;
    }

    distances
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(labels.axis_iter_mut(Axis(0)).into_par_iter())
        .enumerate()
        .for_each_init(
            || RowScratch::<C>::new(nshard),
            |scratch, (row, (d_out, l_out))| {
                merge_row(
                    all_distances.index_axis(Axis(1), row),
                    all_labels.index_axis(Axis(1), row),
                    translations,
                    scratch,
                    d_out,
                    l_out,
                );
            },
        );
}

/// [`merge_tables`] with the direction chosen at runtime.
pub fn merge_tables_ordered(
    order: MergeOrder,
    all_distances: ArrayView3<'_, f32>,
    all_labels: ArrayView3<'_, i64>,
    translations: &[i64],
    distances: ArrayViewMut2<'_, f32>,
    labels: ArrayViewMut2<'_, i64>,
) {
    match order {
        MergeOrder::Smallest => merge_tables::<SmallestFirst>(
            all_distances,
            all_labels,
            translations,
            distances,
            labels,
        ),
        MergeOrder::Largest => {
            merge_tables::<LargestFirst>(all_distances, all_labels, translations, distances, labels);
        }
    }
}

impl CandidateTable {
    /// Merges into freshly allocated `[n][k]` outputs, in the direction the
    /// table was created with.
    ///
    /// # Panics
    /// If `translations.len()` differs from the number of shards.
    pub fn merge(&self, translations: &[i64]) -> (Array2<f32>, Array2<i64>) {
        let (_, n, k) = self.dim();
        let order = self.order();
        let mut distances = Array2::from_elem((n, k), order.neutral());
        let mut labels = Array2::from_elem((n, k), INVALID_LABEL);
        merge_tables_ordered(
            order,
            self.distances(),
            self.labels(),
            translations,
            distances.view_mut(),
            labels.view_mut(),
        );
        (distances, labels)
    }
}

/// `d_in`/`l_in` are this row's `[nshard][k]` candidates.
fn merge_row<C: Comparator>(
    d_in: ArrayView2<'_, f32>,
    l_in: ArrayView2<'_, i64>,
    translations: &[i64],
    scratch: &mut RowScratch<C>,
    mut d_out: ArrayViewMut1<'_, f32>,
    mut l_out: ArrayViewMut1<'_, i64>,
) {
    let k = d_out.len();
    let RowScratch { heap, pointers } = scratch;
    heap.clear();

    for (shard, pointer) in pointers.iter_mut().enumerate() {
        *pointer = 0;
        if l_in[[shard, 0]] >= 0 {
            heap.push(Head::new(d_in[[shard, 0]], shard));
        }
    }

    for j in 0..k {
        let Some(head) = heap.pop() else {
            d_out.slice_mut(s![j..]).fill(C::neutral());
            l_out.slice_mut(s![j..]).fill(INVALID_LABEL);
            break;
        };

        let shard = head.shard;
        let p = pointers[shard];
        d_out[j] = head.distance;
        l_out[j] = l_in[[shard, p]] + translations[shard];

        let next = p + 1;
        pointers[shard] = next;
        if next < k && l_in[[shard, next]] >= 0 {
            heap.push(Head::new(d_in[[shard, next]], shard));
        }
        debug_assert!(heap.len() <= pointers.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};

    fn table(rows: &[Vec<(f32, i64)>], n: usize, k: usize) -> CandidateTable {
        let nshard = rows.len() / n;
        let mut d = Array3::from_elem((nshard, n, k), f32::MAX);
        let mut l = Array3::from_elem((nshard, n, k), -1_i64);
        for (idx, row) in rows.iter().enumerate() {
            let (s, q) = (idx / n, idx % n);
            for (j, &(dist, label)) in row.iter().enumerate() {
                d[[s, q, j]] = dist;
                l[[s, q, j]] = label;
            }
        }
        CandidateTable::from_parts(d, l, MergeOrder::Smallest)
    }

    #[test]
    fn test_two_shards_with_translation() {
        let t = table(
            &[vec![(0.1, 0), (0.5, 1)], vec![(0.3, 0), (0.9, 1)]],
            1,
            2,
        );
        let (d, l) = t.merge(&[0, 3]);
        assert_eq!(d, array![[0.1_f32, 0.3]]);
        assert_eq!(l, array![[0_i64, 3]]);
    }

    #[test]
    fn test_all_shards_empty() {
        let empty = vec![(f32::MAX, -1), (f32::MAX, -1), (f32::MAX, -1)];
        let t = table(&[empty.clone(), empty.clone(), empty], 1, 3);
        let (d, l) = t.merge(&[0, 10, 20]);
        assert_eq!(l, array![[-1_i64, -1, -1]]);
        assert!(d.iter().all(|&x| x == f32::MAX));
    }

    #[test]
    fn test_single_shard_passthrough() {
        let t = table(&[vec![(0.2, 4), (0.4, 1), (0.7, 2)]], 1, 3);
        let (d, l) = t.merge(&[100]);
        assert_eq!(d, array![[0.2_f32, 0.4, 0.7]]);
        assert_eq!(l, array![[104_i64, 101, 102]]);
    }

    #[test]
    fn test_ties_resolve_by_shard_then_position() {
        let t = table(
            &[
                vec![(1.0, 7), (1.0, 8), (2.0, 9)],
                vec![(1.0, 0), (1.0, 1), (1.0, 2)],
            ],
            1,
            3,
        );
        let (_, l) = t.merge(&[0, 100]);
        assert_eq!(l, array![[7_i64, 8, 100]]);
    }

    #[test]
    fn test_sentinel_stops_shard_stream() {
        // shard 0 has one candidate, shard 1 has two; k = 4 leaves one empty slot
        let t = table(
            &[
                vec![(0.5, 0), (f32::MAX, -1), (f32::MAX, -1), (f32::MAX, -1)],
                vec![(0.1, 0), (0.7, 1), (f32::MAX, -1), (f32::MAX, -1)],
            ],
            1,
            4,
        );
        let (d, l) = t.merge(&[0, 5]);
        assert_eq!(l, array![[5_i64, 0, 6, -1]]);
        assert_eq!(d, array![[0.1_f32, 0.5, 0.7, f32::MAX]]);
    }

    #[test]
    fn test_rows_are_independent() {
        // 2 shards x 2 queries
        let t = table(
            &[
                vec![(0.1, 0), (0.2, 1)],
                vec![(0.9, 0), (f32::MAX, -1)],
                vec![(0.3, 0), (0.4, 1)],
                vec![(0.05, 1), (0.06, 0)],
            ],
            2,
            2,
        );
        let (d, l) = t.merge(&[0, 2]);
        assert_eq!(l, array![[0_i64, 1], [3, 2]]);
        assert_eq!(d, array![[0.1_f32, 0.2], [0.05, 0.06]]);
    }

    #[test]
    fn test_largest_first() {
        let mut t = table(&[vec![(0.9, 0), (0.2, 1)], vec![(0.5, 0), (0.4, 1)]], 1, 2);
        t = CandidateTable::from_parts(
            t.distances().to_owned(),
            t.labels().to_owned(),
            MergeOrder::Largest,
        );
        let (d, l) = t.merge(&[0, 2]);
        assert_eq!(d, array![[0.9_f32, 0.5]]);
        assert_eq!(l, array![[0_i64, 2]]);
    }

    #[test]
    fn test_zero_k_writes_nothing() {
        let all_d = Array3::<f32>::zeros((2, 3, 0));
        let all_l = Array3::<i64>::zeros((2, 3, 0));
        let mut d = Array2::<f32>::zeros((3, 0));
        let mut l = Array2::<i64>::zeros((3, 0));
        merge_tables::<SmallestFirst>(all_d.view(), all_l.view(), &[0, 1], d.view_mut(), l.view_mut());
        assert_eq!(d.len(), 0);
        assert_eq!(l.len(), 0);
    }

    #[test]
    fn test_runtime_order_matches_generic() {
        let t = table(&[vec![(0.3, 0), (0.6, 1)], vec![(0.1, 0), (0.8, 1)]], 1, 2);
        let mut d = Array2::<f32>::zeros((1, 2));
        let mut l = Array2::<i64>::zeros((1, 2));
        merge_tables_ordered(
            MergeOrder::Smallest,
            t.distances(),
            t.labels(),
            &[0, 2],
            d.view_mut(),
            l.view_mut(),
        );
        let mut gd = Array2::<f32>::zeros((1, 2));
        let mut gl = Array2::<i64>::zeros((1, 2));
        merge_tables::<SmallestFirst>(t.distances(), t.labels(), &[0, 2], gd.view_mut(), gl.view_mut());
        assert_eq!(d, gd);
        assert_eq!(l, gl);
        assert_eq!((d, l), t.merge(&[0, 2]));
    }

    #[test]
    fn test_table_order_picks_merge_direction() {
        let rows = [vec![(0.2, 0), (0.9, 1)], vec![(0.5, 0), (0.4, 1)]];
        let smallest = table(&rows, 1, 2);
        let largest = CandidateTable::from_parts(
            smallest.distances().to_owned(),
            smallest.labels().to_owned(),
            MergeOrder::Largest,
        );
        assert_eq!(smallest.order(), MergeOrder::Smallest);
        assert_eq!(largest.order(), MergeOrder::Largest);

        let (d, l) = smallest.merge(&[0, 2]);
        assert_eq!(l, array![[0_i64, 2]]);
        assert_eq!(d, array![[0.2_f32, 0.5]]);

        // descending input per shard is what a largest-first backend writes
        let desc = table(&[vec![(0.9, 1), (0.2, 0)], vec![(0.5, 0), (0.4, 1)]], 1, 3);
        let desc = CandidateTable::from_parts(
            desc.distances().to_owned(),
            desc.labels().to_owned(),
            MergeOrder::Largest,
        );
        let (d, l) = desc.merge(&[0, 2]);
        assert_eq!(l, array![[1_i64, 2, 3]]);
        assert_eq!(d, array![[0.9_f32, 0.5, 0.4]]);
    }

    #[test]
    #[should_panic(expected = "translation table must have one entry per shard")]
    fn test_translation_length_precondition() {
        let t = table(&[vec![(0.1, 0)], vec![(0.2, 0)]], 1, 1);
        let _ = t.merge(&[0]);
    }

    #[test]
    #[should_panic(expected = "label table shape does not match distance table")]
    fn test_k_mismatch_precondition() {
        let all_d = Array3::<f32>::zeros((1, 1, 2));
        let all_l = Array3::<i64>::zeros((1, 1, 3));
        let mut d = Array2::<f32>::zeros((1, 2));
        let mut l = Array2::<i64>::zeros((1, 2));
        merge_tables::<SmallestFirst>(all_d.view(), all_l.view(), &[0], d.view_mut(), l.view_mut());
    }

    #[test]
    fn test_invalidate_shard_resets_slot() {
        let mut t = table(&[vec![(0.1, 0), (0.2, 1)], vec![(0.3, 0), (0.4, 1)]], 1, 2);
        assert_eq!(t.valid_count(1), 2);
        t.invalidate_shard(1);
        assert_eq!(t.valid_count(1), 0);
        let (_, l) = t.merge(&[0, 2]);
        assert_eq!(l, array![[0_i64, 1]]);
    }
}
