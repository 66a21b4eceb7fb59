//! Shared pieces of the mosaic command-line tools

pub mod output;

use anyhow::{Context, Result};
use mosaic_core::analysis::{ensure_dimensions, probe_dimensions};
use mosaic_core::{BandEnergyAnalyzer, MosaicConfig, NearestNeighborIndex, RangeNormalizer};
use mosaic_corpus::{Corpus, CorpusReader};
use output::MosaicReport;
use std::path::{Path, PathBuf};

/// Initialise env_logger. `quiet` is the level used without `--verbose`;
/// `RUST_LOG` still takes precedence for individual modules.
pub fn init_logging(verbose: bool, quiet: log::LevelFilter) {
    let level = if verbose {
        log::LevelFilter::Info
    } else {
        quiet
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// Defaults, or the TOML file at `path`.
pub fn load_config(path: Option<&Path>) -> Result<MosaicConfig> {
    match path {
        Some(path) => {
            let config = MosaicConfig::load(path)?;
            log::info!("Loaded configuration from: {}", path.display());
            Ok(config)
        }
        None => Ok(MosaicConfig::default()),
    }
}

/// Everything `mosaic` needs before the real-time loop can start.
pub struct CorpusCheck {
    pub features: PathBuf,
    pub corpus: Corpus,
    pub analyzer: BandEnergyAnalyzer,
    pub normalizer: RangeNormalizer,
    pub index: NearestNeighborIndex,
}

/// Load the corpus, confirm the analyzer matches its width, load the range
/// files and train the index. Any failure here is fatal.
pub fn check_corpus(
    features: &Path,
    corpus_minmax: Option<&Path>,
    driver_minmax: Option<&Path>,
    config: &MosaicConfig,
) -> Result<CorpusCheck> {
    let corpus = CorpusReader::read(features)
        .with_context(|| format!("Failed to load corpus {}", features.display()))?;

    let mut analyzer = BandEnergyAnalyzer::new(&config.analysis);
    ensure_dimensions(corpus.num_coeffs(), probe_dimensions(&mut analyzer))?;

    let normalizer = RangeNormalizer::from_files(corpus_minmax, driver_minmax, corpus.num_coeffs())?;
    let index = NearestNeighborIndex::train(&corpus.table);

    Ok(CorpusCheck {
        features: features.to_path_buf(),
        corpus,
        analyzer,
        normalizer,
        index,
    })
}

impl CorpusCheck {
    /// Report with no run attached; `mosaic <features>` prints this and exits.
    pub fn report(&self, driver: Option<&Path>, offline: bool) -> MosaicReport {
        MosaicReport {
            corpus: self.features.clone(),
            windows: self.corpus.num_points(),
            source_files: self.corpus.files.len(),
            num_coeffs: self.corpus.num_coeffs(),
            normalization: self.normalizer.is_enabled(),
            driver: driver.map(Path::to_path_buf),
            offline,
            run: None,
            output: None,
        }
    }
}
