//! Flat node store over the index bytes.
//!
//! Records are addressed by index; a record's kind is never stored
//! explicitly but follows from its index and descendant count:
//!
//! - **Item**: `index < item_count` and `n_descendants == 1`. Holds the
//!   original vector of item `index`.
//! - **Bucket**: `n_descendants <= max_bucket_size`. The id array starting at
//!   `children[0]` lists `n_descendants` item ids and runs on into the
//!   vector area. Unused item slots (`n_descendants == 0`) are empty buckets.
//! - **Split**: everything else. A hyperplane plus two child indices.

use crate::metric::{Metric, FIELD_SIZE};
use crate::storage::Storage;

/// Record geometry for one (metric, dimension) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodeLayout {
    pub(crate) metric: Metric,
    pub(crate) dimension: usize,
    pub(crate) node_size: usize,
    /// Largest descendant count stored inline as an id list.
    pub(crate) max_bucket_size: usize,
}

impl NodeLayout {
    pub(crate) fn new(metric: Metric, dimension: usize) -> Self {
        let node_size = metric.node_size(dimension);
        Self {
            metric,
            dimension,
            node_size,
            max_bucket_size: (node_size - metric.children_offset()) / FIELD_SIZE,
        }
    }

    #[inline]
    fn offset(&self, index: usize) -> Option<usize> {
        index.checked_mul(self.node_size)
    }
}

/// Hyperplane view of a split record.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SplitNode<'a> {
    pub(crate) normal: &'a [f32],
    /// Hyperplane offset (Euclidean/Manhattan only, 0 otherwise).
    pub(crate) bias: f32,
    /// Extra component of the normal (DotProduct only, 0 otherwise).
    pub(crate) dot_factor: f32,
    pub(crate) children: [i32; 2],
}

/// Typed view of one record.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Node<'a> {
    Item(usize),
    Bucket(&'a [i32]),
    Split(SplitNode<'a>),
}

/// Storage plus layout: the arena every tree of the forest lives in.
pub(crate) struct NodeStore {
    storage: Storage,
    layout: NodeLayout,
    node_count: usize,
}

impl NodeStore {
    /// Wraps `storage`; the caller has already checked that its length is a
    /// non-zero multiple of the record size.
    pub(crate) fn new(storage: Storage, layout: NodeLayout) -> Self {
        let node_count = storage.len() / layout.node_size;
        Self {
            storage,
            layout,
            node_count,
        }
    }

    #[inline]
    pub(crate) fn layout(&self) -> &NodeLayout {
        &self.layout
    }

    #[inline]
    pub(crate) fn node_count(&self) -> usize {
        self.node_count
    }

    #[inline]
    pub(crate) fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Descendant count of record `index`, `None` past the end.
    #[inline]
    pub(crate) fn n_descendants(&self, index: usize) -> Option<i32> {
        if index >= self.node_count {
            return None;
        }
        self.storage.read_i32(self.layout.offset(index)?)
    }

    /// `children[0]` and `children[1]` of record `index`, read raw.
    pub(crate) fn children(&self, index: usize) -> Option<[i32; 2]> {
        if index >= self.node_count {
            return None;
        }
        let base = self.layout.offset(index)? + self.layout.metric.children_offset();
        Some([
            self.storage.read_i32(base)?,
            self.storage.read_i32(base + FIELD_SIZE)?,
        ])
    }

    /// Trailing `dimension` floats of record `index` (item vector or
    /// hyperplane normal).
    #[inline]
    pub(crate) fn vector(&self, index: usize) -> Option<&[f32]> {
        if index >= self.node_count {
            return None;
        }
        let offset = self.layout.offset(index)? + self.layout.metric.header_size();
        self.storage.f32_slice(offset, self.layout.dimension)
    }

    /// Classifies record `index` for traversal.
    pub(crate) fn node(&self, index: usize, item_count: usize) -> Option<Node<'_>> {
        let n_descendants = self.n_descendants(index)?;
        if n_descendants == 1 && index < item_count {
            return Some(Node::Item(index));
        }

        let base = self.layout.offset(index)?;
        let metric = self.layout.metric;
        // Negative counts only appear in corrupt files; treat them as empty.
        let count = usize::try_from(n_descendants).unwrap_or(0);
        if count <= self.layout.max_bucket_size {
            let ids = self
                .storage
                .i32_slice(base + metric.children_offset(), count)?;
            return Some(Node::Bucket(ids));
        }

        let (bias, dot_factor) = match metric {
            Metric::Angular => (0.0, 0.0),
            Metric::Euclidean | Metric::Manhattan => {
                (self.storage.read_f32(base + FIELD_SIZE)?, 0.0)
            }
            Metric::DotProduct => (0.0, self.storage.read_f32(base + 3 * FIELD_SIZE)?),
        };

        Some(Node::Split(SplitNode {
            normal: self.vector(index)?,
            bias,
            dot_factor,
            children: self.children(index)?,
        }))
    }
}
