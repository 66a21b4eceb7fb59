//! Audio decoding and resampling
//!
//! Supports WAV, MP3, FLAC and OGG with dedicated decoders, and any other
//! container Symphonia can probe (M4A/AAC, MP4 audio tracks).

mod container;
mod decoder;
mod resample;

pub use container::decode_container;
pub use decoder::{decode_audio, AudioData};
pub use resample::resample_to_target;

use std::path::Path;

/// Supported audio formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
    Flac,
    Ogg,
    /// Anything else; handed to Symphonia's probe.
    Container,
}

impl AudioFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("wav") | Some("wave") => AudioFormat::Wav,
            Some("mp3") => AudioFormat::Mp3,
            Some("flac") => AudioFormat::Flac,
            Some("ogg") | Some("oga") => AudioFormat::Ogg,
            _ => AudioFormat::Container,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(AudioFormat::from_path(Path::new("a.WAV")), AudioFormat::Wav);
        assert_eq!(AudioFormat::from_path(Path::new("a.flac")), AudioFormat::Flac);
        assert_eq!(AudioFormat::from_path(Path::new("dir/a.ogg")), AudioFormat::Ogg);
        assert_eq!(AudioFormat::from_path(Path::new("a.m4a")), AudioFormat::Container);
        assert_eq!(AudioFormat::from_path(Path::new("noext")), AudioFormat::Container);
    }
}
