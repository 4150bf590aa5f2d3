use ndarray::Array3;
use proptest::prelude::*;
use shardscan_merge::{CandidateTable, MergeOrder};

/// One shard's candidates for one query: sorted distances (coarse, so ties
/// are common) paired with arbitrary local labels, followed by padding.
fn arb_row(k: usize) -> impl Strategy<Value = Vec<(f32, i64)>> {
    proptest::collection::vec((0u8..12, 0i64..500), 0..=k).prop_map(|mut row| {
        row.sort_by_key(|&(d, _)| d);
        row.into_iter().map(|(d, l)| (f32::from(d) / 4.0, l)).collect()
    })
}

#[derive(Debug, Clone)]
struct Case {
    nshard: usize,
    n: usize,
    k: usize,
    rows: Vec<Vec<(f32, i64)>>, // shard-major, nshard * n
    translations: Vec<i64>,
}

fn arb_case() -> impl Strategy<Value = Case> {
    (1usize..6, 1usize..5, 0usize..8).prop_flat_map(|(nshard, n, k)| {
        (
            proptest::collection::vec(arb_row(k), nshard * n),
            proptest::collection::vec(0i64..2_000, nshard),
        )
            .prop_map(move |(rows, translations)| Case {
                nshard,
                n,
                k,
                rows,
                translations,
            })
    })
}

fn build(case: &Case, neutral: f32, order: MergeOrder) -> CandidateTable {
    let mut d = Array3::from_elem((case.nshard, case.n, case.k), neutral);
    let mut l = Array3::from_elem((case.nshard, case.n, case.k), -1_i64);
    for (idx, row) in case.rows.iter().enumerate() {
        let (s, q) = (idx / case.n, idx % case.n);
        for (j, &(dist, label)) in row.iter().enumerate() {
            d[[s, q, j]] = dist;
            l[[s, q, j]] = label;
        }
    }
    CandidateTable::from_parts(d, l, order)
}

/// Sort-everything reference: (distance, shard, position) order, first k.
fn expected(case: &Case, q: usize, descending: bool) -> Vec<(f32, i64)> {
    let mut all = Vec::new();
    for s in 0..case.nshard {
        for (pos, &(dist, label)) in case.rows[s * case.n + q].iter().enumerate() {
            all.push((dist, s, pos, label + case.translations[s]));
        }
    }
    all.sort_by(|a, b| {
        let by_dist = if descending {
            b.0.total_cmp(&a.0)
        } else {
            a.0.total_cmp(&b.0)
        };
        by_dist.then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2))
    });
    all.into_iter().take(case.k).map(|(d, _, _, g)| (d, g)).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn test_merge_matches_full_sort(case in arb_case()) {
        let table = build(&case, f32::MAX, MergeOrder::Smallest);
        let (d, l) = table.merge(&case.translations);

        for q in 0..case.n {
            let want = expected(&case, q, false);
            let m = want.len();
            for (j, &(dist, global)) in want.iter().enumerate() {
                prop_assert_eq!(d[[q, j]], dist);
                prop_assert_eq!(l[[q, j]], global);
            }
            // exactly k - m trailing sentinels
            for j in m..case.k {
                prop_assert_eq!(l[[q, j]], -1);
                prop_assert_eq!(d[[q, j]], f32::MAX);
            }
            let row = d.row(q).to_vec();
            prop_assert!(row.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_merge_largest_first_matches_full_sort(case in arb_case()) {
        // rows are generated ascending; flip them for the descending policy
        let mut flipped = case.clone();
        for row in &mut flipped.rows {
            for entry in row.iter_mut() {
                entry.0 = -entry.0;
            }
        }
        let table = build(&flipped, f32::MIN, MergeOrder::Largest);
        let (d, l) = table.merge(&flipped.translations);

        for q in 0..flipped.n {
            let want = expected(&flipped, q, true);
            for (j, &(dist, global)) in want.iter().enumerate() {
                prop_assert_eq!(d[[q, j]], dist);
                prop_assert_eq!(l[[q, j]], global);
            }
            for j in want.len()..flipped.k {
                prop_assert_eq!(l[[q, j]], -1);
                prop_assert_eq!(d[[q, j]], f32::MIN);
            }
        }
    }

    #[test]
    fn test_labels_carry_origin_translation(case in arb_case()) {
        let table = build(&case, f32::MAX, MergeOrder::Smallest);
        let (_, l) = table.merge(&case.translations);

        for q in 0..case.n {
            for j in 0..case.k {
                let global = l[[q, j]];
                if global < 0 {
                    continue;
                }
                let explained = (0..case.nshard).any(|s| {
                    case.rows[s * case.n + q]
                        .iter()
                        .any(|&(_, local)| local + case.translations[s] == global)
                });
                prop_assert!(explained, "label {} has no origin shard", global);
            }
        }
    }
}
