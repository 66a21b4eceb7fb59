//! Mosaic Core - real-time audio mosaicing engine
//!
//! A driver signal is analysed hop by hop, its features averaged into one
//! query per cycle, remapped into the corpus feature ranges and matched
//! against the corpus windows. The closest windows are played back as
//! enveloped grains on a rotating voice pool while a sync message per
//! analysis frame keeps an external renderer in step.

pub mod aggregator;
pub mod analysis;
pub mod audio;
pub mod bounce;
pub mod builder;
pub mod config;
pub mod control;
pub mod driver;
pub mod engine;
pub mod envelope;
pub mod index;
pub mod keyboard;
pub mod normalizer;
pub mod scheduler;
pub mod sync;
pub mod voice;

pub use aggregator::{AggregatorState, FeatureAggregator};
pub use analysis::{BandEnergyAnalyzer, FeatureAnalyzer};
pub use bounce::{Bounce, BounceSummary, BounceVoice};
pub use config::MosaicConfig;
pub use control::{ControlEvent, ControlState};
pub use driver::{DriverInput, FileDriver};
pub use engine::{Engine, RunStats};
pub use index::{NearestNeighborIndex, Neighbor};
pub use normalizer::{NormalizeError, RangeNormalizer};
pub use scheduler::{GrainScheduler, GrainSpec, Trigger};
pub use sync::{NullSync, OscSync, SyncEmitter, SyncError};
pub use voice::{SourceBank, SourceBuffer, VoiceOutput};
