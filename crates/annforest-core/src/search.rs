//! Best-first search across the forest.
//!
//! A single max-heap holds frontier nodes of *all* trees, keyed by the
//! smallest margin seen on the path from their root. Popping always expands
//! the most promising subtree in the whole forest, so exploration spreads
//! across trees by itself.
//!
//! Once the candidate budget is reached, candidates are deduplicated and
//! re-ranked by exact distance.

use crate::forest::Forest;
use crate::metric::Metric;
use crate::node::{Node, NodeStore};
use crate::result::SearchResult;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Per-call knobs of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SearchParams {
    /// Maximum number of neighbors to return.
    pub(crate) n_results: usize,
    /// Candidate budget; `<= 0` selects the default.
    pub(crate) search_k: i32,
    /// Whether to materialize distances.
    pub(crate) include_distance: bool,
    /// Scales the default budget.
    pub(crate) search_k_multiplier: usize,
}

impl SearchParams {
    /// Number of candidates to collect before ranking.
    ///
    /// The default is `min(n_results, item_count) × n_trees × multiplier`,
    /// so more trees or more requested results buy more exploration.
    pub(crate) fn budget(&self, item_count: usize, n_trees: usize) -> usize {
        match usize::try_from(self.search_k) {
            Ok(k) if k > 0 => k,
            _ => self
                .n_results
                .min(item_count)
                .max(1)
                .saturating_mul(n_trees)
                .saturating_mul(self.search_k_multiplier.max(1)),
        }
    }
}

/// Frontier entry. Ordered by priority, then by node index, so that equal
/// priorities pop in a reproducible order.
#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    priority: f32,
    node: usize,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| self.node.cmp(&other.node))
    }
}

/// Runs one query against `store` / `forest`.
///
/// The caller has validated `query.len()` against the index dimension.
pub(crate) fn search(
    store: &NodeStore,
    forest: &Forest,
    query: &[f32],
    params: &SearchParams,
) -> SearchResult {
    if params.n_results == 0 {
        return SearchResult::empty(params.include_distance);
    }

    let metric = store.layout().metric;
    let item_count = forest.item_count;
    let budget = params.budget(item_count, forest.n_trees());

    let candidates = collect_candidates(store, forest, query, budget);
    let collected = candidates.len();
    let ranked = rank(store, metric, item_count, query, candidates, params.n_results);

    tracing::debug!(
        n_results = params.n_results,
        budget,
        candidates = collected,
        returned = ranked.len(),
        "Forest search complete"
    );

    SearchResult::from_ranked(
        ranked
            .into_iter()
            .map(|(id, raw)| (id as u64, metric.normalized_distance(raw)))
            .collect(),
        params.include_distance,
    )
}

/// Best-first traversal until `budget` candidate ids (duplicates included)
/// are collected or the frontier runs dry.
fn collect_candidates(
    store: &NodeStore,
    forest: &Forest,
    query: &[f32],
    budget: usize,
) -> Vec<usize> {
    let metric = store.layout().metric;
    let item_count = forest.item_count;

    let mut queue: BinaryHeap<QueueEntry> = forest
        .roots
        .iter()
        .map(|&node| QueueEntry {
            priority: f32::INFINITY,
            node,
        })
        .collect();

    let mut candidates = Vec::with_capacity(budget.min(item_count.saturating_mul(2)));
    // Split and bucket records belong to a single tree and every item pop
    // yields a candidate, so a well-formed forest needs at most
    // `node_count + budget` pops. More than that means the links are cyclic.
    let max_pops = store.node_count().saturating_add(budget);
    let mut pops = 0usize;
    let mut dangling = 0usize;

    while candidates.len() < budget {
        let Some(top) = queue.pop() else {
            break;
        };
        pops += 1;
        if pops > max_pops {
            tracing::warn!(pops, "Traversal exceeded record count, index links are cyclic");
            break;
        }

        match store.node(top.node, item_count) {
            Some(Node::Item(id)) => candidates.push(id),
            Some(Node::Bucket(ids)) => {
                candidates.extend(ids.iter().filter_map(|&id| usize::try_from(id).ok()));
            }
            Some(Node::Split(split)) => {
                let margin = metric.margin(&split, query);
                let sides = [
                    (split.children[1], top.priority.min(margin)),
                    (split.children[0], top.priority.min(-margin)),
                ];
                for (child, priority) in sides {
                    match usize::try_from(child) {
                        Ok(node) if node < store.node_count() => {
                            queue.push(QueueEntry { priority, node });
                        }
                        _ => dangling += 1,
                    }
                }
            }
            None => dangling += 1,
        }
    }

    if dangling > 0 {
        tracing::warn!(dangling, "Skipped child references outside the node store");
    }

    candidates
}

/// Deduplicates candidates, drops non-items and returns the `n_results`
/// closest as `(id, raw distance)`, ascending by distance then id.
fn rank(
    store: &NodeStore,
    metric: Metric,
    item_count: usize,
    query: &[f32],
    mut candidates: Vec<usize>,
    n_results: usize,
) -> Vec<(usize, f32)> {
    candidates.sort_unstable();
    candidates.dedup();

    let mut scored: Vec<(usize, f32)> = candidates
        .into_iter()
        .filter(|&id| id < item_count && store.n_descendants(id) == Some(1))
        .filter_map(|id| {
            store
                .vector(id)
                .map(|vector| (id, metric.raw_distance(query, vector)))
        })
        .collect();

    scored.sort_unstable_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    scored.truncate(n_results);
    scored
}
