//! Exact nearest-neighbour search over the corpus feature table
//!
//! Brute force: every query is compared against every corpus window under
//! Euclidean distance. Large tables are scanned in parallel.

use mosaic_corpus::FeatureTable;
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use thiserror::Error;

#[cfg(test)]
mod tests;

/// Tables at least this large are scanned with rayon.
const PARALLEL_THRESHOLD: usize = 4096;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("query has {found} dimensions, index has {expected}")]
pub struct DimensionMismatch {
    pub expected: usize,
    pub found: usize,
}

/// One search hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub id: usize,
    pub distance: f32,
}

#[derive(Debug, Clone)]
pub struct NearestNeighborIndex {
    num_coeffs: usize,
    points: Vec<f32>,
    ids: Vec<usize>,
}

impl NearestNeighborIndex {
    /// Index every row of `table` under its id.
    pub fn train(table: &FeatureTable) -> Self {
        Self::train_with_ids(table, table.ids())
    }

    /// Index `table` with explicit labels, one per row.
    pub fn train_with_ids(table: &FeatureTable, ids: &[usize]) -> Self {
        assert_eq!(ids.len(), table.num_points(), "one id per row");
        log::info!(
            "Indexed {} windows of {} dimensions",
            table.num_points(),
            table.num_coeffs()
        );
        Self {
            num_coeffs: table.num_coeffs(),
            points: table.values().to_vec(),
            ids: ids.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn num_coeffs(&self) -> usize {
        self.num_coeffs
    }

    /// The `k` closest windows, nearest first. Equal distances are ordered
    /// by id. Fewer than `k` hits come back only when the index is smaller.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, DimensionMismatch> {
        if query.len() != self.num_coeffs {
            return Err(DimensionMismatch {
                expected: self.num_coeffs,
                found: query.len(),
            });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let width = self.num_coeffs.max(1);
        let distance = |(row, &id): (&[f32], &usize)| (squared_distance(row, query), id);

        let mut scored: Vec<(f32, usize)> = if self.len() >= PARALLEL_THRESHOLD {
            self.points
                .par_chunks(width)
                .zip(self.ids.par_iter())
                .map(distance)
                .collect()
        } else {
            self.points
                .chunks(width)
                .zip(self.ids.iter())
                .map(distance)
                .collect()
        };

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, compare);
            scored.truncate(k);
        }
        scored.sort_unstable_by(compare);

        Ok(scored
            .into_iter()
            .map(|(d, id)| Neighbor {
                id,
                distance: d.sqrt(),
            })
            .collect())
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn compare(a: &(f32, usize), b: &(f32, usize)) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}
