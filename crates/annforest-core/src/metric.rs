//! Distance metrics and split-node margins.
//!
//! A metric is part of an index's identity: it fixes the record layout of
//! the file, the hyperplane margin used while descending the trees, and the
//! distance used to rank the final candidates.
//!
//! # Raw vs reported distances
//!
//! Ranking works on a cheap *raw* key where smaller is always better:
//!
//! | Metric | Raw key | Reported distance |
//! |--------|---------|-------------------|
//! | Angular | `2 - 2·cos(a, b)` | `sqrt(raw)` |
//! | Euclidean | `Σ (aᵢ - bᵢ)²` | `sqrt(raw)` |
//! | Manhattan | `Σ |aᵢ - bᵢ|` | `raw` |
//! | DotProduct | `-(a·b)` | `a·b` |
//!
//! Reported values match what the upstream Annoy tooling prints, so a
//! DotProduct result lists its largest inner product first.

use crate::node::SplitNode;
use crate::simd;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Size of every integer and float field in the file.
pub(crate) const FIELD_SIZE: usize = 4;

/// Distance metric an index was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Cosine-based distance `sqrt(2 - 2·cos)`.
    /// Identical directions are at 0, opposite directions at 2.
    Angular,

    /// L2 distance.
    Euclidean,

    /// L1 distance.
    Manhattan,

    /// Inner product, for maximum inner product search.
    #[serde(alias = "dot")]
    DotProduct,
}

impl Metric {
    /// All supported metrics, in upstream type-code order.
    pub const ALL: [Metric; 4] = [
        Self::Angular,
        Self::Euclidean,
        Self::Manhattan,
        Self::DotProduct,
    ];

    /// Short name used in file names and configuration (`"angular"`, `"dot"`, ...).
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Angular => "angular",
            Self::Euclidean => "euclidean",
            Self::Manhattan => "manhattan",
            Self::DotProduct => "dot",
        }
    }

    /// Bytes preceding the vector in every record.
    ///
    /// Angular: `n_descendants, children[2]`.
    /// Euclidean/Manhattan: `n_descendants, bias, children[2]`.
    /// DotProduct: `n_descendants, children[2], dot_factor`.
    #[must_use]
    pub const fn header_size(&self) -> usize {
        match self {
            Self::Angular => 3 * FIELD_SIZE,
            Self::Euclidean | Self::Manhattan | Self::DotProduct => 4 * FIELD_SIZE,
        }
    }

    /// Byte offset of `children[0]` inside a record.
    #[must_use]
    pub const fn children_offset(&self) -> usize {
        match self {
            Self::Angular | Self::DotProduct => FIELD_SIZE,
            Self::Euclidean | Self::Manhattan => 2 * FIELD_SIZE,
        }
    }

    /// Record size for a given dimension.
    #[must_use]
    pub const fn node_size(&self, dimension: usize) -> usize {
        self.header_size() + FIELD_SIZE * dimension
    }

    /// Raw ranking key between two vectors. Smaller is closer.
    #[inline]
    #[must_use]
    pub fn raw_distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Angular => angular_raw(a, b),
            Self::Euclidean => simd::squared_l2_distance(a, b),
            Self::Manhattan => simd::manhattan_distance(a, b),
            Self::DotProduct => -simd::dot_product(a, b),
        }
    }

    /// Converts a raw ranking key into the distance reported to callers.
    #[inline]
    #[must_use]
    pub fn normalized_distance(&self, raw: f32) -> f32 {
        match self {
            Self::Angular | Self::Euclidean => raw.max(0.0).sqrt(),
            Self::Manhattan => raw.max(0.0),
            Self::DotProduct => -raw,
        }
    }

    /// Reported distance between two full vectors.
    ///
    /// # Example
    ///
    /// ```
    /// use annforest_core::Metric;
    ///
    /// let d = Metric::Euclidean.distance(&[0.0, 0.0], &[3.0, 4.0]);
    /// assert!((d - 5.0).abs() < 1e-6);
    /// ```
    #[must_use]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        self.normalized_distance(self.raw_distance(a, b))
    }

    /// Signed distance of `query` from a split node's hyperplane.
    ///
    /// Positive values mean `children[1]` is the near side.
    #[inline]
    #[must_use]
    pub(crate) fn margin(&self, split: &SplitNode<'_>, query: &[f32]) -> f32 {
        let projection = simd::dot_product(split.normal, query);
        match self {
            Self::Angular => projection,
            Self::Euclidean | Self::Manhattan => split.bias + projection,
            Self::DotProduct => projection + split.dot_factor * split.dot_factor,
        }
    }
}

/// `2 - 2·cos(a, b)`, i.e. the squared distance between the normalized vectors.
///
/// A zero vector is maximally far (4.0) from any non-zero vector and at 0
/// from another zero vector.
#[inline]
#[allow(clippy::similar_names)]
fn angular_raw(a: &[f32], b: &[f32]) -> f32 {
    let (pp, qq, pq) = simd::fused_norms_and_dot(a, b);
    let ppqq = pp * qq;
    if ppqq > 0.0 {
        2.0 - 2.0 * pq / ppqq.sqrt()
    } else if pp == 0.0 && qq == 0.0 {
        0.0
    } else {
        4.0
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "angular" | "cosine" => Ok(Self::Angular),
            "euclidean" | "l2" => Ok(Self::Euclidean),
            "manhattan" | "l1" => Ok(Self::Manhattan),
            "dot" | "dot_product" | "dotproduct" => Ok(Self::DotProduct),
            other => Err(format!(
                "unknown metric '{other}', expected one of: angular, euclidean, manhattan, dot"
            )),
        }
    }
}

impl TryFrom<u8> for Metric {
    type Error = String;

    /// Upstream binding type codes: 0 angular, 1 euclidean, 2 manhattan, 4 dot.
    /// Code 3 (hamming) is not supported.
    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Angular),
            1 => Ok(Self::Euclidean),
            2 => Ok(Self::Manhattan),
            4 => Ok(Self::DotProduct),
            other => Err(format!("unsupported metric type code {other}")),
        }
    }
}
