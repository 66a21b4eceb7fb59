//! Corpus model structures
//!
//! A model file holds one analysed window per line:
//!
//! ```text
//! <sourceFilePath> <startTimeSeconds> <v1> <v2> ... <vN>
//! ```
//!
//! In memory the windows are split into an [`AudioWindow`] table and a
//! row-major [`FeatureTable`] whose row index is the window id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Number of leading non-feature columns (filename, start time).
pub const META_COLUMNS: usize = 2;

/// One corpus grain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioWindow {
    /// Position in the feature table, also the search label.
    pub id: usize,
    /// Index into [`Corpus::files`].
    pub source_file_index: usize,
    /// Offset into the source file in seconds.
    pub start_time: f64,
}

/// `num_points x num_coeffs` feature matrix with parallel id labels.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    num_coeffs: usize,
    values: Vec<f32>,
    ids: Vec<usize>,
}

impl FeatureTable {
    pub fn new(num_coeffs: usize) -> Self {
        Self {
            num_coeffs,
            values: Vec::new(),
            ids: Vec::new(),
        }
    }

    pub fn with_capacity(num_coeffs: usize, num_points: usize) -> Self {
        Self {
            num_coeffs,
            values: Vec::with_capacity(num_coeffs * num_points),
            ids: Vec::with_capacity(num_points),
        }
    }

    /// Append a row and return its id.
    ///
    /// Panics if the row width differs from `num_coeffs`; callers validate
    /// column counts while parsing.
    pub fn push_row(&mut self, row: &[f32]) -> usize {
        assert_eq!(row.len(), self.num_coeffs, "feature row width mismatch");
        let id = self.ids.len();
        self.values.extend_from_slice(row);
        self.ids.push(id);
        id
    }

    pub fn num_points(&self) -> usize {
        self.ids.len()
    }

    pub fn num_coeffs(&self) -> usize {
        self.num_coeffs
    }

    pub fn ids(&self) -> &[usize] {
        &self.ids
    }

    pub fn row(&self, id: usize) -> Option<&[f32]> {
        let start = id.checked_mul(self.num_coeffs)?;
        self.values.get(start..start + self.num_coeffs)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        // chunks_exact(0) panics, and a zero-width table has no rows anyway
        self.values.chunks_exact(self.num_coeffs.max(1))
    }

    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        self.values.chunks_exact_mut(self.num_coeffs.max(1))
    }

    /// Flat row-major view of every value.
    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

/// Fully loaded corpus: windows, their features and the source file list.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub windows: Vec<AudioWindow>,
    pub table: FeatureTable,
    /// Deduplicated source files in first-seen order.
    pub files: Vec<String>,
    file_lookup: HashMap<String, usize>,
}

impl Corpus {
    pub fn new(num_coeffs: usize) -> Self {
        Self::with_capacity(num_coeffs, 0)
    }

    pub fn with_capacity(num_coeffs: usize, num_points: usize) -> Self {
        Self {
            windows: Vec::with_capacity(num_points),
            table: FeatureTable::with_capacity(num_coeffs, num_points),
            files: Vec::new(),
            file_lookup: HashMap::new(),
        }
    }

    /// Add a window, registering `source` in the file dictionary on first
    /// sight. Returns the new window id.
    pub fn push(&mut self, source: &str, start_time: f64, features: &[f32]) -> usize {
        let source_file_index = self.file_index(source);
        let id = self.table.push_row(features);
        self.windows.push(AudioWindow {
            id,
            source_file_index,
            start_time,
        });
        id
    }

    fn file_index(&mut self, source: &str) -> usize {
        if let Some(&index) = self.file_lookup.get(source) {
            return index;
        }
        let index = self.files.len();
        self.files.push(source.to_string());
        self.file_lookup.insert(source.to_string(), index);
        index
    }

    pub fn num_points(&self) -> usize {
        self.windows.len()
    }

    pub fn num_coeffs(&self) -> usize {
        self.table.num_coeffs()
    }

    pub fn window(&self, id: usize) -> Option<&AudioWindow> {
        self.windows.get(id)
    }

    /// Source file path backing a window.
    pub fn source_path(&self, window: &AudioWindow) -> &str {
        &self.files[window.source_file_index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_dictionary_assigns_indices_in_first_seen_order() {
        let mut corpus = Corpus::new(1);
        corpus.push("b.wav", 0.0, &[1.0]);
        corpus.push("a.wav", 0.0, &[2.0]);
        corpus.push("b.wav", 0.5, &[3.0]);

        assert_eq!(corpus.files, vec!["b.wav".to_string(), "a.wav".to_string()]);
        assert_eq!(corpus.windows[2].source_file_index, 0);
        assert_eq!(corpus.source_path(&corpus.windows[1]), "a.wav");
    }

    #[test]
    fn test_window_id_matches_table_position() {
        let mut corpus = Corpus::new(2);
        for i in 0..5 {
            let id = corpus.push("a.wav", i as f64, &[i as f32, 0.0]);
            assert_eq!(id, i);
        }
        assert_eq!(corpus.table.ids(), &[0, 1, 2, 3, 4]);
        assert_eq!(corpus.table.row(3), Some(&[3.0, 0.0][..]));
        assert_eq!(corpus.table.row(5), None);
    }
}
