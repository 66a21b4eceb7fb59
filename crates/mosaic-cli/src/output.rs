//! JSON output formatting

use mosaic_core::{BounceSummary, RunStats};
use serde::Serialize;
use std::path::PathBuf;

/// Summary printed by `mosaic` when it exits.
#[derive(Debug, Serialize)]
pub struct MosaicReport {
    pub corpus: PathBuf,
    pub windows: usize,
    pub source_files: usize,
    pub num_coeffs: usize,
    pub normalization: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<PathBuf>,
    pub offline: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<RunStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<BounceSummary>,
}

/// Summary printed by `mosaic-build`.
#[derive(Debug, Serialize)]
pub struct BuildReport {
    pub output: PathBuf,
    pub files: usize,
    pub windows: usize,
    pub num_coeffs: usize,
    pub window_seconds: f64,
    pub hop_seconds: f64,
    pub created_at: String,
    pub elapsed_secs: f64,
}

/// Summary printed by `mosaic-ranges`.
#[derive(Debug, Serialize)]
pub struct RangesReport {
    pub driver: PathBuf,
    pub output: PathBuf,
    pub num_coeffs: usize,
    pub tempo_bpm: f64,
    pub num_frames: usize,
}

/// Print any report as pretty JSON on stdout.
pub fn print_json<T: Serialize>(report: &T) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing report: {}", e),
    }
}
