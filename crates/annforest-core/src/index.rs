//! Index handle: loading, lifecycle and the public query surface.

use crate::config::AnnforestConfig;
use crate::error::{Error, LoadError, Result};
use crate::forest::Forest;
use crate::metric::Metric;
use crate::node::{NodeLayout, NodeStore};
use crate::result::SearchResult;
use crate::search::{self, SearchParams};
use crate::storage::{Storage, StorageMode};
use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;

/// Options controlling how an index is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOptions {
    /// Memory map the file or read it into memory.
    pub storage_mode: StorageMode,
    /// Stop root discovery after this many trees.
    pub expected_trees: Option<usize>,
    /// Scales the default candidate budget of `search_k = -1` queries.
    pub search_k_multiplier: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            storage_mode: StorageMode::Mmap,
            expected_trees: None,
            search_k_multiplier: 1,
        }
    }
}

impl From<&AnnforestConfig> for IndexOptions {
    fn from(config: &AnnforestConfig) -> Self {
        Self {
            storage_mode: config.index.storage_mode,
            expected_trees: config.index.expected_trees,
            search_k_multiplier: config.search.search_k_multiplier,
        }
    }
}

/// Node store and forest, dropped together on release.
struct Loaded {
    store: NodeStore,
    forest: Forest,
}

/// A loaded, immutable Annoy-format index.
///
/// All query methods take `&self` and touch only shared read-only memory, so
/// one handle can serve any number of threads without locking. Releasing
/// requires `&mut self`, which rules out in-flight queries at compile time.
///
/// # Example
///
/// ```rust,ignore
/// use annforest_core::{AnnoyIndex, Metric};
///
/// let index = AnnoyIndex::load("items.ann", 40, Metric::Angular)?;
/// let nearest = index.get_nearest_to_item(0, 10, -1, true)?;
/// for (id, distance) in nearest.iter() {
///     println!("{id}: {distance:?}");
/// }
/// ```
pub struct AnnoyIndex {
    dimension: usize,
    metric: Metric,
    size: usize,
    n_trees: usize,
    storage_mode: StorageMode,
    search_k_multiplier: usize,
    inner: Option<Loaded>,
}

impl AnnoyIndex {
    /// Memory maps the index at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] if the file is missing, unreadable, or its
    /// layout does not fit `dimension` and `metric`. No handle is produced.
    pub fn load<P: AsRef<Path>>(
        path: P,
        dimension: usize,
        metric: Metric,
    ) -> std::result::Result<Self, LoadError> {
        Self::load_with_options(path, dimension, metric, &IndexOptions::default())
    }

    /// Reads the whole index at `path` into memory.
    ///
    /// # Errors
    ///
    /// See [`AnnoyIndex::load`].
    pub fn load_into_memory<P: AsRef<Path>>(
        path: P,
        dimension: usize,
        metric: Metric,
    ) -> std::result::Result<Self, LoadError> {
        let options = IndexOptions {
            storage_mode: StorageMode::Memory,
            ..IndexOptions::default()
        };
        Self::load_with_options(path, dimension, metric, &options)
    }

    /// Opens the index at `path` with explicit options.
    ///
    /// # Errors
    ///
    /// See [`AnnoyIndex::load`].
    pub fn load_with_options<P: AsRef<Path>>(
        path: P,
        dimension: usize,
        metric: Metric,
        options: &IndexOptions,
    ) -> std::result::Result<Self, LoadError> {
        let path = path.as_ref();
        let layout = checked_layout(dimension, metric)?;

        let mut file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound(path.to_path_buf()),
            _ => LoadError::Io(e),
        })?;
        let file_size = usize::try_from(file.metadata()?.len()).map_err(|_| {
            LoadError::InvalidHeader("file does not fit in the address space".to_string())
        })?;
        check_file_size(file_size, layout.node_size)?;

        let storage = match options.storage_mode {
            #[cfg(feature = "mmap")]
            StorageMode::Mmap => Storage::map(&file)?,
            #[cfg(not(feature = "mmap"))]
            StorageMode::Mmap => Storage::read(&mut file, file_size)?,
            StorageMode::Memory => Storage::read(&mut file, file_size)?,
        };

        let index = Self::from_storage(storage, layout, options)?;
        tracing::info!(
            path = %path.display(),
            metric = %metric,
            dimension,
            items = index.size,
            trees = index.n_trees,
            storage_mode = ?index.storage_mode,
            "Index loaded"
        );
        Ok(index)
    }

    /// Builds an index from bytes already in memory. The bytes are copied
    /// into an aligned buffer.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] if the layout does not fit `dimension` and
    /// `metric`.
    pub fn load_from_buffer(
        bytes: &[u8],
        dimension: usize,
        metric: Metric,
    ) -> std::result::Result<Self, LoadError> {
        let layout = checked_layout(dimension, metric)?;
        check_file_size(bytes.len(), layout.node_size)?;
        let index = Self::from_storage(
            Storage::from_bytes(bytes),
            layout,
            &IndexOptions {
                storage_mode: StorageMode::Memory,
                ..IndexOptions::default()
            },
        )?;
        tracing::info!(
            metric = %metric,
            dimension,
            items = index.size,
            trees = index.n_trees,
            "Index loaded from buffer"
        );
        Ok(index)
    }

    fn from_storage(
        storage: Storage,
        layout: NodeLayout,
        options: &IndexOptions,
    ) -> std::result::Result<Self, LoadError> {
        check_file_size(storage.len(), layout.node_size)?;
        let storage_mode = storage.mode();
        let store = NodeStore::new(storage, layout);
        let forest = Forest::discover(&store, options.expected_trees)?;

        Ok(Self {
            dimension: layout.dimension,
            metric: layout.metric,
            size: forest.item_count,
            n_trees: forest.n_trees(),
            storage_mode,
            search_k_multiplier: options.search_k_multiplier.max(1),
            inner: Some(Loaded { store, forest }),
        })
    }

    /// Releases the underlying storage. Calling it again is a no-op.
    ///
    /// Every query on a released handle fails with [`Error::UseAfterRelease`].
    pub fn release(&mut self) {
        if self.inner.take().is_some() {
            tracing::debug!(items = self.size, "Index released");
        }
    }

    /// Returns true once [`AnnoyIndex::release`] has been called.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.inner.is_none()
    }

    /// Vector dimension.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of item slots (highest item id + 1).
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Distance metric.
    #[must_use]
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Number of trees in the forest.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// How the index bytes are held.
    #[must_use]
    pub fn storage_mode(&self) -> StorageMode {
        self.storage_mode
    }

    fn loaded(&self) -> Result<&Loaded> {
        self.inner.as_ref().ok_or_else(|| {
            tracing::error!("Query issued against a released index handle");
            Error::UseAfterRelease
        })
    }

    fn item_slice<'a>(&self, loaded: &'a Loaded, item: u64) -> Result<&'a [f32]> {
        let out_of_range = || Error::OutOfRange {
            item,
            size: self.size,
        };
        let index = usize::try_from(item)
            .ok()
            .filter(|&i| i < self.size)
            .ok_or_else(out_of_range)?;
        loaded.store.vector(index).ok_or_else(out_of_range)
    }

    fn check_dimension(&self, query: &[f32]) -> Result<()> {
        if query.len() == self.dimension {
            Ok(())
        } else {
            Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            })
        }
    }

    fn params(&self, n_results: usize, search_k: i32, include_distance: bool) -> SearchParams {
        SearchParams {
            n_results,
            search_k,
            include_distance,
            search_k_multiplier: self.search_k_multiplier,
        }
    }

    /// Stored vector of `item`.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] if `item >= size()`, [`Error::UseAfterRelease`]
    /// on a released handle.
    pub fn get_item_vector(&self, item: u64) -> Result<Vec<f32>> {
        let loaded = self.loaded()?;
        Ok(self.item_slice(loaded, item)?.to_vec())
    }

    /// Reported distance between two stored items.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] if either id is `>= size()`.
    pub fn get_distance(&self, i: u64, j: u64) -> Result<f32> {
        let loaded = self.loaded()?;
        let a = self.item_slice(loaded, i)?;
        let b = self.item_slice(loaded, j)?;
        Ok(self.metric.distance(a, b))
    }

    /// Approximate `n_results` nearest neighbors of `query`.
    ///
    /// `search_k` is the candidate budget; `-1` (or any value `<= 0`) picks
    /// `min(n_results, size) × n_trees`. Larger budgets trade latency for
    /// recall.
    ///
    /// # Errors
    ///
    /// [`Error::DimensionMismatch`] if `query.len() != dimension()`.
    pub fn get_nearest(
        &self,
        query: &[f32],
        n_results: usize,
        search_k: i32,
        include_distance: bool,
    ) -> Result<SearchResult> {
        let loaded = self.loaded()?;
        self.check_dimension(query)?;
        let params = self.params(n_results, search_k, include_distance);
        Ok(search::search(&loaded.store, &loaded.forest, query, &params))
    }

    /// Approximate nearest neighbors of stored item `item`. Under every
    /// metric but `DotProduct` the item itself ranks first.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] if `item >= size()`.
    pub fn get_nearest_to_item(
        &self,
        item: u64,
        n_results: usize,
        search_k: i32,
        include_distance: bool,
    ) -> Result<SearchResult> {
        let loaded = self.loaded()?;
        let query = self.item_slice(loaded, item)?;
        let params = self.params(n_results, search_k, include_distance);
        Ok(search::search(&loaded.store, &loaded.forest, query, &params))
    }

    /// Runs independent queries against this handle, in parallel when the
    /// `parallel` feature is enabled. Results keep the order of `queries`.
    ///
    /// # Errors
    ///
    /// [`Error::DimensionMismatch`] if any query has the wrong length; no
    /// query runs in that case.
    pub fn get_nearest_batch(
        &self,
        queries: &[&[f32]],
        n_results: usize,
        search_k: i32,
        include_distance: bool,
    ) -> Result<Vec<SearchResult>> {
        let loaded = self.loaded()?;
        for query in queries {
            self.check_dimension(query)?;
        }
        let params = self.params(n_results, search_k, include_distance);
        let run = |query: &&[f32]| search::search(&loaded.store, &loaded.forest, query, &params);

        #[cfg(feature = "parallel")]
        let results = {
            use rayon::prelude::*;
            queries.par_iter().map(run).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let results = queries.iter().map(run).collect();

        Ok(results)
    }

    /// Byte length of the underlying storage, `0` once released.
    #[must_use]
    pub fn storage_len(&self) -> usize {
        self.inner.as_ref().map_or(0, |l| l.store.storage().len())
    }

    /// Total number of records (items, split nodes and root copies).
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.as_ref().map_or(0, |l| l.store.node_count())
    }
}

impl fmt::Debug for AnnoyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnoyIndex")
            .field("dimension", &self.dimension)
            .field("metric", &self.metric)
            .field("size", &self.size)
            .field("n_trees", &self.n_trees)
            .field("storage_mode", &self.storage_mode)
            .field("released", &self.is_released())
            .finish()
    }
}

fn checked_layout(
    dimension: usize,
    metric: Metric,
) -> std::result::Result<NodeLayout, LoadError> {
    if dimension == 0 || dimension > (i32::MAX as usize) / 4 {
        return Err(LoadError::InvalidDimension(dimension));
    }
    Ok(NodeLayout::new(metric, dimension))
}

fn check_file_size(file_size: usize, node_size: usize) -> std::result::Result<(), LoadError> {
    if file_size == 0 || file_size % node_size != 0 {
        return Err(LoadError::CorruptOrDimensionMismatch {
            file_size,
            node_size,
        });
    }
    Ok(())
}
