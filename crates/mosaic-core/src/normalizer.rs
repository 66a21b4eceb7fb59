//! Query remapping from the driver's feature ranges onto the corpus ranges

use mosaic_corpus::{MinMax, RangeError};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    /// Soft: the current cycle is skipped and the loop continues.
    #[error("query has {found} dimensions, range files have {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("corpus ranges were given without driver ranges")]
    MissingDriverRanges,

    #[error("driver ranges are unusable: {0}")]
    BadDriverRanges(#[source] RangeError),

    #[error("corpus ranges are unusable: {0}")]
    BadCorpusRanges(#[source] RangeError),
}

impl NormalizeError {
    /// Whether the error must stop the process before the real-time loop.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, NormalizeError::DimensionMismatch { .. })
    }
}

#[derive(Debug, Clone)]
struct RangePair {
    corpus: MinMax,
    driver: MinMax,
}

/// Maps each query dimension from `[driver_min, driver_max]` onto
/// `[corpus_min, corpus_max]`, extrapolating outside the driver range.
#[derive(Debug, Clone, Default)]
pub struct RangeNormalizer {
    ranges: Option<RangePair>,
}

impl RangeNormalizer {
    /// Queries pass through untouched.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn new(corpus: MinMax, driver: MinMax) -> Self {
        Self {
            ranges: Some(RangePair { corpus, driver }),
        }
    }

    /// Load the range files given on the command line.
    ///
    /// Without driver ranges normalization is off. Corpus ranges without
    /// driver ranges is a configuration error.
    pub fn from_files(
        corpus_path: Option<&Path>,
        driver_path: Option<&Path>,
        num_coeffs: usize,
    ) -> Result<Self, NormalizeError> {
        let normalizer = match (corpus_path, driver_path) {
            (None, None) => Self::disabled(),
            (Some(_), None) => return Err(NormalizeError::MissingDriverRanges),
            (None, Some(driver)) => {
                log::warn!(
                    "Driver ranges {} given without corpus ranges; normalization disabled",
                    driver.display()
                );
                Self::disabled()
            }
            (Some(corpus), Some(driver)) => {
                let corpus = MinMax::read(corpus).map_err(NormalizeError::BadCorpusRanges)?;
                let driver = MinMax::read(driver).map_err(NormalizeError::BadDriverRanges)?;
                for (label, ranges) in [("corpus", &corpus), ("driver", &driver)] {
                    if ranges.len() != num_coeffs {
                        log::warn!(
                            "{} ranges cover {} dimensions but the corpus has {}; cycles will be skipped",
                            label,
                            ranges.len(),
                            num_coeffs
                        );
                    }
                }
                Self::new(corpus, driver)
            }
        };

        log::info!("Range normalization {}", if normalizer.is_enabled() { "on" } else { "off" });
        Ok(normalizer)
    }

    pub fn is_enabled(&self) -> bool {
        self.ranges.is_some()
    }

    /// Remap a query. Only [`NormalizeError::DimensionMismatch`] is returned here.
    pub fn apply(&self, mut query: Vec<f32>) -> Result<Vec<f32>, NormalizeError> {
        let Some(pair) = &self.ranges else {
            return Ok(query);
        };

        for ranges in [&pair.corpus, &pair.driver] {
            if ranges.len() != query.len() {
                return Err(NormalizeError::DimensionMismatch {
                    expected: ranges.len(),
                    found: query.len(),
                });
            }
        }

        let dims = pair.driver.ranges().iter().zip(pair.corpus.ranges());
        for (value, (driver, corpus)) in query.iter_mut().zip(dims) {
            *value = corpus.denormalize(driver.normalize(*value));
        }
        Ok(query)
    }
}
