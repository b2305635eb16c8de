//! # `annforest` Core
//!
//! Read-only approximate nearest neighbor queries over forests of random
//! projection trees stored in the Annoy on-disk format.
//!
//! An index file is produced by an external builder. This crate only maps it
//! (or reads it into memory) and answers queries, without ever copying
//! vectors out of the file on the query path.
//!
//! ## Features
//!
//! - **4 Distance Metrics**: Angular, Euclidean, Manhattan, Dot Product
//! - **Zero-copy Loading**: memory-mapped files, pages faulted in on demand
//! - **Concurrent Queries**: a loaded handle is `Send + Sync` and lock free
//! - **Explicit SIMD**: distance and margin kernels built on `wide`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use annforest_core::{AnnoyIndex, Metric};
//!
//! let index = AnnoyIndex::load("glove.ann", 100, Metric::Angular)?;
//!
//! // 10 neighbors of item 0, default candidate budget, with distances
//! let result = index.get_nearest_to_item(0, 10, -1, true)?;
//! assert_eq!(result.id_list[0], 0);
//!
//! // Arbitrary query vector, wider budget for better recall
//! let result = index.get_nearest(&query, 10, 5_000, false)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::suboptimal_flops)]
#![allow(clippy::redundant_pub_crate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::wildcard_imports)]

pub mod config;
pub mod error;
mod forest;
pub mod index;
pub mod logging;
pub mod metric;
mod node;
pub mod result;
mod search;
#[cfg(test)]
mod search_tests;
pub mod simd;
mod storage;
#[cfg(test)]
mod test_fixtures;

pub use config::{AnnforestConfig, ConfigError, IndexConfig, LoggingConfig, SearchConfig};
pub use error::{Error, LoadError, Result};
pub use index::{AnnoyIndex, IndexOptions};
pub use logging::init_tracing;
pub use metric::Metric;
pub use result::SearchResult;
pub use storage::StorageMode;
