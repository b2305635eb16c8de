//! Root discovery.
//!
//! Trees are serialized back to back and the builder appends a copy of every
//! root at the very end of the file. Every root records the full item span as
//! its descendant count, so a backward scan that keeps going while the count
//! stays equal to the last record's finds all roots without any explicit
//! tree boundaries in the format.

use crate::error::LoadError;
use crate::node::NodeStore;

/// Tree roots of a loaded index plus the item span they cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Forest {
    /// Root record indices, in discovery order (last record first).
    pub(crate) roots: Vec<usize>,
    /// Number of item slots; records `[0, item_count)` are items.
    pub(crate) item_count: usize,
}

impl Forest {
    /// Scans `store` backwards for roots.
    ///
    /// Stops at the first record whose descendant count differs, or once
    /// `expected_trees` roots are collected.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::InvalidHeader`] if the last record does not look
    /// like a root, or if `expected_trees` is `Some(0)`.
    pub(crate) fn discover(
        store: &NodeStore,
        expected_trees: Option<usize>,
    ) -> Result<Self, LoadError> {
        if expected_trees == Some(0) {
            return Err(LoadError::InvalidHeader(
                "expected_trees must be at least 1".to_string(),
            ));
        }
        let node_count = store.node_count();
        let last = node_count
            .checked_sub(1)
            .ok_or_else(|| LoadError::InvalidHeader("index holds no records".to_string()))?;
        let span = store
            .n_descendants(last)
            .ok_or_else(|| LoadError::InvalidHeader("last record is unreadable".to_string()))?;

        let item_count = usize::try_from(span)
            .ok()
            .filter(|&count| count >= 1 && count <= node_count)
            .ok_or_else(|| {
                LoadError::InvalidHeader(format!(
                    "root descendant count {span} outside [1, {node_count}]"
                ))
            })?;

        let limit = expected_trees.unwrap_or(usize::MAX);
        let mut roots = Vec::new();
        for index in (0..node_count).rev() {
            if roots.len() >= limit || store.n_descendants(index) != Some(span) {
                break;
            }
            roots.push(index);
        }
        let reached_limit = roots.len() >= limit;

        // The original root of the last tree sits right before the appended
        // copies and shares its children with the first copy found.
        if !reached_limit && roots.len() > 1 {
            let first = roots.first().and_then(|&r| store.children(r));
            let tail = roots.last().and_then(|&r| store.children(r));
            if let (Some(first), Some(tail)) = (first, tail) {
                if first[0] == tail[0] {
                    roots.pop();
                }
            }
        }

        if roots.is_empty() {
            return Err(LoadError::InvalidHeader("no tree roots found".to_string()));
        }

        tracing::debug!(
            roots = roots.len(),
            item_count,
            node_count,
            "Discovered forest roots"
        );

        Ok(Self { roots, item_count })
    }

    /// Number of trees in the forest.
    #[inline]
    pub(crate) fn n_trees(&self) -> usize {
        self.roots.len()
    }
}
