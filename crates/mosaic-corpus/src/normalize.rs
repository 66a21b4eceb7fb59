//! Offline corpus normalization
//!
//! Rescales every feature dimension of a model file to `[0, 1]` using the
//! corpus's own min/max and writes the ranges alongside.

use crate::error::ToolError;
use crate::format::Corpus;
use crate::ranges::MinMax;
use crate::reader::CorpusReader;
use crate::writer::CorpusWriter;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Result of a normalization run.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizeOutcome {
    pub output_path: PathBuf,
    pub minmax_path: PathBuf,
    pub ranges: MinMax,
    pub num_points: usize,
    pub num_coeffs: usize,
    /// Dimensions whose min equals their max (written as all zeros).
    pub constant_dims: Vec<usize>,
}

/// Default output locations beside `input`:
/// `<stem>_normalized.<ext>` and `<stem>_minmax.txt`.
pub fn default_output_paths(input: &Path) -> (PathBuf, PathBuf) {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "corpus".to_string());
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "txt".to_string());
    let dir = input.parent().unwrap_or_else(|| Path::new(""));

    (
        dir.join(format!("{stem}_normalized.{ext}")),
        dir.join(format!("{stem}_minmax.txt")),
    )
}

/// Normalize `input` into the default output paths.
pub fn normalize_corpus(input: &Path) -> Result<NormalizeOutcome, ToolError> {
    let (output, minmax) = default_output_paths(input);
    normalize_corpus_to(input, &output, &minmax)
}

pub fn normalize_corpus_to(
    input: &Path,
    output: &Path,
    minmax: &Path,
) -> Result<NormalizeOutcome, ToolError> {
    let mut corpus = CorpusReader::read(input)?;
    let ranges = normalize_in_place(&mut corpus);

    CorpusWriter::write(output, &corpus)?;
    ranges.write(minmax)?;

    let constant_dims: Vec<usize> = ranges
        .ranges()
        .iter()
        .enumerate()
        .filter(|(_, r)| r.min == r.max)
        .map(|(dim, _)| dim)
        .collect();

    if !constant_dims.is_empty() {
        log::warn!(
            "{} constant dimension(s) written as 0.0: {:?}",
            constant_dims.len(),
            constant_dims
        );
    }

    log::info!(
        "Normalized {} windows x {} coefficients -> {} (ranges: {})",
        corpus.num_points(),
        corpus.num_coeffs(),
        output.display(),
        minmax.display()
    );

    Ok(NormalizeOutcome {
        output_path: output.to_path_buf(),
        minmax_path: minmax.to_path_buf(),
        ranges,
        num_points: corpus.num_points(),
        num_coeffs: corpus.num_coeffs(),
        constant_dims,
    })
}

/// Compute the corpus ranges, then rescale every row with them.
pub fn normalize_in_place(corpus: &mut Corpus) -> MinMax {
    let ranges = MinMax::from_rows(corpus.num_coeffs(), corpus.table.rows());

    for row in corpus.table.rows_mut() {
        for (value, range) in row.iter_mut().zip(ranges.ranges()) {
            *value = range.normalize(*value);
        }
    }

    ranges
}
