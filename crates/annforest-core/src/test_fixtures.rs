//! Test-only writer for Annoy-format index files.
//!
//! Builds a small random-projection forest the same way the upstream builder
//! lays it out: item records first, then every tree (children before their
//! parent), then a copy of every root. Shared with the integration tests
//! through `#[path]`, so it only names `super::Metric`.

#![allow(dead_code)]

use super::Metric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};

/// Serializes one split or item record.
pub fn record(
    metric: Metric,
    n_descendants: i32,
    children: [i32; 2],
    bias: f32,
    dot_factor: f32,
    vector: &[f32],
) -> Vec<u8> {
    let mut bytes = vec![0u8; metric.node_size(vector.len())];
    put(&mut bytes, 0, n_descendants.to_le_bytes());
    let base = metric.children_offset();
    put(&mut bytes, base, children[0].to_le_bytes());
    put(&mut bytes, base + 4, children[1].to_le_bytes());
    match metric {
        Metric::Euclidean | Metric::Manhattan => put(&mut bytes, 4, bias.to_le_bytes()),
        Metric::DotProduct => put(&mut bytes, 12, dot_factor.to_le_bytes()),
        Metric::Angular => {}
    }
    for (i, value) in vector.iter().enumerate() {
        put(&mut bytes, metric.header_size() + 4 * i, value.to_le_bytes());
    }
    bytes
}

/// Serializes a bucket record listing `ids` from `children[0]` onward.
pub fn bucket_record(metric: Metric, dimension: usize, n_descendants: i32, ids: &[i32]) -> Vec<u8> {
    let mut bytes = vec![0u8; metric.node_size(dimension)];
    put(&mut bytes, 0, n_descendants.to_le_bytes());
    for (i, id) in ids.iter().enumerate() {
        put(&mut bytes, metric.children_offset() + 4 * i, id.to_le_bytes());
    }
    bytes
}

/// Item record holding `vector`.
pub fn item_record(metric: Metric, vector: &[f32]) -> Vec<u8> {
    record(metric, 1, [0, 0], 0.0, 0.0, vector)
}

fn put(bytes: &mut [u8], offset: usize, field: [u8; 4]) {
    bytes[offset..offset + 4].copy_from_slice(&field);
}

/// Deterministic vectors in `[-1, 1)`.
pub fn random_vectors(n_items: usize, dimension: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n_items)
        .map(|_| (0..dimension).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect()
}

/// A serialized forest plus the vectors it was built from.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub metric: Metric,
    pub dimension: usize,
    /// Item vectors by id; `None` marks an unused id.
    pub items: Vec<Option<Vec<f32>>>,
    pub n_trees: usize,
    pub bytes: Vec<u8>,
}

impl Fixture {
    /// `n_items` random items, `n_trees` trees.
    pub fn random(metric: Metric, dimension: usize, n_items: usize, n_trees: usize, seed: u64) -> Self {
        Self::from_vectors(metric, random_vectors(n_items, dimension, seed), n_trees, seed)
    }

    pub fn from_vectors(metric: Metric, vectors: Vec<Vec<f32>>, n_trees: usize, seed: u64) -> Self {
        Self::build(metric, vectors.into_iter().map(Some).collect(), n_trees, seed)
    }

    /// Builds the forest over `items`; ids mapped to `None` are left as
    /// zeroed placeholder records.
    pub fn build(metric: Metric, items: Vec<Option<Vec<f32>>>, n_trees: usize, seed: u64) -> Self {
        let dimension = items
            .iter()
            .flatten()
            .map(Vec::len)
            .next()
            .expect("fixture needs at least one item");
        let mut builder = Builder {
            metric,
            dimension,
            max_bucket_size: (metric.node_size(dimension) - metric.children_offset()) / 4,
            n_items: items.len(),
            items: &items,
            records: Vec::new(),
            rng: StdRng::seed_from_u64(seed ^ 0x5eed),
        };

        for item in &items {
            let record = match item {
                Some(vector) => item_record(metric, vector),
                None => bucket_record(metric, dimension, 0, &[]),
            };
            builder.records.push(record);
        }

        let present: Vec<usize> = (0..items.len()).filter(|&i| items[i].is_some()).collect();
        let roots: Vec<usize> = (0..n_trees)
            .map(|_| builder.make_tree(&present, true))
            .collect();
        for root in roots {
            let copy = builder.records[root].clone();
            builder.records.push(copy);
        }

        let bytes = builder.records.concat();
        Self {
            metric,
            dimension,
            items,
            n_trees,
            bytes,
        }
    }

    /// Number of item slots, holes included.
    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn vector(&self, id: usize) -> &[f32] {
        self.items[id].as_deref().expect("id is a hole")
    }

    /// Candidate budget that makes every query exhaustive.
    pub fn exhaustive_k(&self) -> i32 {
        i32::try_from(self.size() * self.n_trees.max(1)).expect("fixture too large")
    }

    /// Writes the index as `<dir>/<name>`.
    pub fn write_to(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, &self.bytes).expect("write fixture");
        path
    }

    /// Writes the index into a fresh temporary directory.
    pub fn write_temp(&self) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = self.write_to(dir.path(), &format!("{}.ann", self.metric.name()));
        (dir, path)
    }

    /// Exact `n` nearest neighbors as `(id, reported distance)`.
    pub fn brute_force(&self, query: &[f32], n: usize) -> Vec<(u64, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .items
            .iter()
            .enumerate()
            .filter_map(|(id, v)| v.as_ref().map(|v| (id, self.metric.raw_distance(query, v))))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(n);
        scored
            .into_iter()
            .map(|(id, raw)| (id as u64, self.metric.normalized_distance(raw)))
            .collect()
    }
}

struct Builder<'a> {
    metric: Metric,
    dimension: usize,
    max_bucket_size: usize,
    n_items: usize,
    items: &'a [Option<Vec<f32>>],
    records: Vec<Vec<u8>>,
    rng: StdRng,
}

impl Builder<'_> {
    fn vector(&self, id: usize) -> &[f32] {
        self.items[id].as_deref().expect("only present ids are split")
    }

    fn push(&mut self, record: Vec<u8>) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    fn make_tree(&mut self, ids: &[usize], is_root: bool) -> usize {
        if ids.len() == 1 && !is_root {
            return ids[0];
        }

        let span = if is_root { self.n_items } else { ids.len() };
        if ids.len() <= self.max_bucket_size
            && (!is_root || self.n_items <= self.max_bucket_size || ids.len() == 1)
        {
            let list: Vec<i32> = ids.iter().map(|&id| id as i32).collect();
            let record = bucket_record(self.metric, self.dimension, span as i32, &list);
            return self.push(record);
        }

        let (normal, bias) = self.hyperplane(ids);
        let mut sides: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
        for &id in ids {
            let margin = bias + dot(&normal, self.vector(id));
            sides[usize::from(margin > 0.0)].push(id);
        }
        if sides[0].is_empty() || sides[1].is_empty() {
            sides = [Vec::new(), Vec::new()];
            for (i, &id) in ids.iter().enumerate() {
                sides[i % 2].push(id);
            }
        }

        let left = self.make_tree(&sides[0], false) as i32;
        let right = self.make_tree(&sides[1], false) as i32;
        let record = record(self.metric, span as i32, [left, right], bias, 0.0, &normal);
        self.push(record)
    }

    /// Plane equidistant from two random items.
    fn hyperplane(&mut self, ids: &[usize]) -> (Vec<f32>, f32) {
        let a = ids[self.rng.gen_range(0..ids.len())];
        let mut b = ids[self.rng.gen_range(0..ids.len() - 1)];
        if b == a {
            b = ids[ids.len() - 1];
        }
        let (va, vb) = (self.vector(a).to_vec(), self.vector(b).to_vec());

        match self.metric {
            Metric::Angular => {
                let normal: Vec<f32> = normalized(&va)
                    .iter()
                    .zip(normalized(&vb))
                    .map(|(x, y)| x - y)
                    .collect();
                (normalized(&normal), 0.0)
            }
            Metric::Euclidean | Metric::Manhattan => {
                let normal = normalized(&va.iter().zip(&vb).map(|(x, y)| x - y).collect::<Vec<_>>());
                let midpoint: Vec<f32> = va.iter().zip(&vb).map(|(x, y)| (x + y) / 2.0).collect();
                let bias = -dot(&normal, &midpoint);
                (normal, bias)
            }
            Metric::DotProduct => (va.iter().zip(&vb).map(|(x, y)| x - y).collect(), 0.0),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn normalized(v: &[f32]) -> Vec<f32> {
    let norm = dot(v, v).sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}
