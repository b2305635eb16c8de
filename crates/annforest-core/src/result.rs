//! Ranked query output.

use serde::{Deserialize, Serialize};

/// Ranked neighbors of one query, closest first.
///
/// `id_list` and `distance_list` are parallel; `distance_list` is empty when
/// the caller opted out of distances. The ranking is identical either way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Number of neighbors returned.
    pub count: usize,
    /// Whether `distance_list` was materialized.
    pub is_distance_included: bool,
    /// Item ids, closest first.
    pub id_list: Vec<u64>,
    /// Reported distances matching `id_list`, or empty.
    pub distance_list: Vec<f32>,
}

impl SearchResult {
    /// Builds a result from ranked `(id, distance)` pairs.
    #[must_use]
    pub fn from_ranked(ranked: Vec<(u64, f32)>, include_distance: bool) -> Self {
        let count = ranked.len();
        let (id_list, distance_list) = if include_distance {
            ranked.into_iter().unzip()
        } else {
            (ranked.into_iter().map(|(id, _)| id).collect(), Vec::new())
        };

        Self {
            count,
            is_distance_included: include_distance,
            id_list,
            distance_list,
        }
    }

    /// Empty result.
    #[must_use]
    pub fn empty(include_distance: bool) -> Self {
        Self {
            is_distance_included: include_distance,
            ..Self::default()
        }
    }

    /// Number of neighbors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if no neighbor was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Iterates `(id, distance)` pairs; distances are `None` when not included.
    pub fn iter(&self) -> impl Iterator<Item = (u64, Option<f32>)> + '_ {
        self.id_list
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, self.distance_list.get(i).copied()))
    }
}
