//! Fuzz target for index loading and traversal.
//!
//! Index files are untrusted input: node counts, child links and bucket
//! lengths all come straight from the bytes. Loading arbitrary data must
//! either fail with a `LoadError` or yield a handle whose queries return
//! without panicking, looping forever or reading out of bounds.

#![no_main]

use annforest_core::{AnnoyIndex, Metric};
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    dimension: u8,
    metric: u8,
    n_results: u8,
    search_k: i16,
    item: u16,
    bytes: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let metric = Metric::ALL[usize::from(input.metric) % Metric::ALL.len()];
    let dimension = usize::from(input.dimension % 16) + 1;

    let Ok(index) = AnnoyIndex::load_from_buffer(&input.bytes, dimension, metric) else {
        return;
    };

    let query = vec![0.5f32; dimension];
    let n = usize::from(input.n_results);
    let search_k = i32::from(input.search_k);

    if let Ok(result) = index.get_nearest(&query, n, search_k, true) {
        assert!(result.count <= n);
        assert!(result.id_list.iter().all(|&id| (id as usize) < index.size()));
    }
    let _ = index.get_nearest_to_item(u64::from(input.item), n, search_k, false);
    let _ = index.get_item_vector(u64::from(input.item));
});
