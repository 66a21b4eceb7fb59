//! Corpus model and range file formats for the mosaic engine

pub mod error;
pub mod format;
pub mod normalize;
pub mod ranges;
pub mod reader;
pub mod writer;

pub use error::{CorpusError, RangeError, ToolError};
pub use format::{AudioWindow, Corpus, FeatureTable, META_COLUMNS};
pub use normalize::{default_output_paths, normalize_corpus, normalize_corpus_to, NormalizeOutcome};
pub use ranges::{MinMax, Range};
pub use reader::CorpusReader;
pub use writer::CorpusWriter;
