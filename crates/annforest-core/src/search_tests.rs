//! Tests for `search` module

use super::forest::Forest;
use super::metric::Metric;
use super::node::{NodeLayout, NodeStore};
use super::search::{search, SearchParams};
use super::storage::Storage;
use super::test_fixtures::{item_record, random_vectors, record, Fixture};

fn params(n_results: usize, search_k: i32) -> SearchParams {
    SearchParams {
        n_results,
        search_k,
        include_distance: true,
        search_k_multiplier: 1,
    }
}

fn open(fixture: &Fixture) -> (NodeStore, Forest) {
    let store = NodeStore::new(
        Storage::from_bytes(&fixture.bytes),
        NodeLayout::new(fixture.metric, fixture.dimension),
    );
    let forest = Forest::discover(&store, None).expect("discover");
    (store, forest)
}

// -------------------------------------------------------------------------
// Budget
// -------------------------------------------------------------------------

#[test]
fn test_budget_explicit_search_k_wins() {
    assert_eq!(params(10, 5).budget(100, 10), 5);
}

#[test]
fn test_budget_default_scales_with_trees_and_results() {
    assert_eq!(params(10, -1).budget(100, 10), 100);
    assert_eq!(params(10, 0).budget(100, 10), 100);
    assert_eq!(params(500, -1).budget(100, 10), 1000);
    assert_eq!(params(0, -1).budget(100, 10), 10);
}

#[test]
fn test_budget_multiplier() {
    let p = SearchParams {
        search_k_multiplier: 4,
        ..params(10, -1)
    };
    assert_eq!(p.budget(100, 10), 400);
}

// -------------------------------------------------------------------------
// Traversal and ranking
// -------------------------------------------------------------------------

#[test]
fn test_exhaustive_search_matches_brute_force() {
    for metric in Metric::ALL {
        let fixture = Fixture::random(metric, 8, 200, 5, 11);
        let (store, forest) = open(&fixture);

        for query in random_vectors(5, 8, 99) {
            let result = search(&store, &forest, &query, &params(10, fixture.exhaustive_k()));
            let expected = fixture.brute_force(&query, 10);

            let ids: Vec<u64> = expected.iter().map(|(id, _)| *id).collect();
            let distances: Vec<f32> = expected.iter().map(|(_, d)| *d).collect();
            assert_eq!(result.id_list, ids, "{metric}");
            assert_eq!(result.distance_list, distances, "{metric}");
        }
    }
}

#[test]
fn test_results_are_sorted_by_distance() {
    let fixture = Fixture::random(Metric::Euclidean, 6, 150, 8, 3);
    let (store, forest) = open(&fixture);

    let result = search(&store, &forest, &[0.1; 6], &params(25, -1));

    assert_eq!(result.count, 25);
    assert!(result.distance_list.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_dot_results_are_sorted_by_descending_inner_product() {
    let fixture = Fixture::random(Metric::DotProduct, 6, 150, 8, 3);
    let (store, forest) = open(&fixture);

    let result = search(&store, &forest, &[0.5; 6], &params(20, fixture.exhaustive_k()));

    assert!(result.distance_list.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn test_output_never_exceeds_item_count() {
    let fixture = Fixture::random(Metric::Manhattan, 3, 12, 2, 8);
    let (store, forest) = open(&fixture);

    let result = search(&store, &forest, &[0.0; 3], &params(1000, fixture.exhaustive_k()));

    assert_eq!(result.count, 12);
    assert_eq!(result.id_list.len(), 12);
}

#[test]
fn test_zero_results_requested() {
    let fixture = Fixture::random(Metric::Angular, 3, 20, 2, 8);
    let (store, forest) = open(&fixture);

    let result = search(&store, &forest, &[1.0; 3], &params(0, -1));

    assert!(result.is_empty());
    assert!(result.is_distance_included);
}

#[test]
fn test_distance_flag_does_not_change_ranking() {
    let fixture = Fixture::random(Metric::Angular, 10, 300, 6, 21);
    let (store, forest) = open(&fixture);
    let query = random_vectors(1, 10, 4).remove(0);

    let with = search(&store, &forest, &query, &params(15, -1));
    let without = search(
        &store,
        &forest,
        &query,
        &SearchParams {
            include_distance: false,
            ..params(15, -1)
        },
    );

    assert_eq!(with.id_list, without.id_list);
    assert_eq!(with.distance_list.len(), 15);
    assert!(without.distance_list.is_empty());
    assert!(!without.is_distance_included);
}

#[test]
fn test_holes_are_never_returned() {
    let mut items: Vec<Option<Vec<f32>>> =
        random_vectors(40, 4, 17).into_iter().map(Some).collect();
    for id in [3, 10, 11, 25] {
        items[id] = None;
    }
    let fixture = Fixture::build(Metric::Euclidean, items, 3, 17);
    let (store, forest) = open(&fixture);

    let result = search(&store, &forest, &[0.0; 4], &params(100, fixture.exhaustive_k()));

    assert_eq!(result.count, 36);
    for hole in [3u64, 10, 11, 25] {
        assert!(!result.id_list.contains(&hole));
    }
}

// -------------------------------------------------------------------------
// Malformed links
// -------------------------------------------------------------------------

#[test]
fn test_cyclic_links_terminate() {
    let m = Metric::Euclidean;
    let bytes = [
        item_record(m, &[1.0, 0.0]),
        item_record(m, &[0.0, 1.0]),
        record(m, 5, [2, 2], 0.0, 0.0, &[1.0, 0.0]),
    ]
    .concat();
    let store = NodeStore::new(Storage::from_bytes(&bytes), NodeLayout::new(m, 2));
    let forest = Forest {
        roots: vec![2],
        item_count: 2,
    };

    let result = search(&store, &forest, &[1.0, 0.0], &params(2, 50));

    assert!(result.is_empty());
}

#[test]
fn test_shared_root_span_stays_linear() {
    // Every record claims the full span, so each one is discovered as a root
    // and each split links back into the others.
    let m = Metric::Euclidean;
    let n = 400;
    let bytes: Vec<u8> = (0..n)
        .flat_map(|i| record(m, n, [(i + 1) % n, (i + 2) % n], 0.0, 0.0, &[1.0, 0.0]))
        .collect();
    let store = NodeStore::new(Storage::from_bytes(&bytes), NodeLayout::new(m, 2));
    let forest = Forest::discover(&store, None).expect("discover");

    let result = search(&store, &forest, &[1.0, 0.0], &params(5, -1));

    assert!(forest.n_trees() > 1);
    assert!(result.is_empty());
}

#[test]
fn test_dangling_children_are_skipped() {
    let m = Metric::Euclidean;
    let bytes = [
        item_record(m, &[1.0, 0.0]),
        item_record(m, &[0.0, 1.0]),
        record(m, 5, [0, 99], 0.0, 0.0, &[1.0, 0.0]),
    ]
    .concat();
    let store = NodeStore::new(Storage::from_bytes(&bytes), NodeLayout::new(m, 2));
    let forest = Forest {
        roots: vec![2],
        item_count: 2,
    };

    let result = search(&store, &forest, &[1.0, 0.0], &params(2, 10));

    assert_eq!(result.id_list, vec![0]);
}

// -------------------------------------------------------------------------
// Property-based tests
// -------------------------------------------------------------------------

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Property: an exhaustive budget returns exactly the brute-force top n
        #[test]
        fn prop_exhaustive_equals_brute_force(
            metric_idx in 0usize..4,
            seed in any::<u64>(),
            n_items in 2usize..80,
            n_trees in 1usize..5,
            n in 1usize..20,
        ) {
            let metric = Metric::ALL[metric_idx];
            let fixture = Fixture::random(metric, 4, n_items, n_trees, seed);
            let (store, forest) = open(&fixture);
            let query = random_vectors(1, 4, seed.wrapping_add(1)).remove(0);

            let result = search(&store, &forest, &query, &params(n, fixture.exhaustive_k()));
            let expected: Vec<u64> = fixture.brute_force(&query, n).into_iter().map(|(id, _)| id).collect();

            prop_assert_eq!(result.id_list, expected);
        }

        /// Property: include_distance only changes what is materialized
        #[test]
        fn prop_distance_flag_independence(
            metric_idx in 0usize..4,
            seed in any::<u64>(),
            n in 0usize..30,
            search_k in -1i32..300,
        ) {
            let metric = Metric::ALL[metric_idx];
            let fixture = Fixture::random(metric, 6, 60, 3, seed);
            let (store, forest) = open(&fixture);
            let query = random_vectors(1, 6, seed ^ 0xff).remove(0);
            let off = SearchParams { include_distance: false, ..params(n, search_k) };

            let with = search(&store, &forest, &query, &params(n, search_k));
            let without = search(&store, &forest, &query, &off);

            prop_assert_eq!(&with.id_list, &without.id_list);
            prop_assert_eq!(with.distance_list.len(), with.count);
            prop_assert!(without.distance_list.is_empty());
        }

        /// Property: output never exceeds n, and the default budget fills min(n, size)
        #[test]
        fn prop_output_is_bounded(
            seed in any::<u64>(),
            n in 0usize..50,
            search_k in -1i32..200,
        ) {
            let fixture = Fixture::random(Metric::Angular, 5, 40, 3, seed);
            let (store, forest) = open(&fixture);

            let result = search(&store, &forest, &[0.3; 5], &params(n, search_k));

            prop_assert!(result.count <= n);
            prop_assert_eq!(result.count, result.id_list.len());
            prop_assert!(result.id_list.iter().all(|&id| id < 40));
            if search_k <= 0 {
                prop_assert_eq!(result.count, n.min(40));
            }
        }
    }
}
