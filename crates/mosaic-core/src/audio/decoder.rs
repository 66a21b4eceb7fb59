//! Audio decoding for multiple formats

use super::{decode_container, resample_to_target, AudioFormat};
use anyhow::{Context, Result};
use std::path::Path;

/// Decoded audio data
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Interleaved samples
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_ms: u32,
}

impl AudioData {
    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        let duration_ms = duration_ms(samples.len(), sample_rate, 1);
        Self {
            samples,
            sample_rate,
            channels: 1,
            duration_ms,
        }
    }

    /// Convert to mono by averaging channels
    pub fn to_mono(&self) -> Vec<f32> {
        if self.channels <= 1 {
            return self.samples.clone();
        }

        self.samples
            .chunks(self.channels as usize)
            .map(|chunk| chunk.iter().sum::<f32>() / chunk.len() as f32)
            .collect()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels.max(1) as f64)
    }
}

pub(crate) fn duration_ms(num_samples: usize, sample_rate: u32, channels: u16) -> u32 {
    if sample_rate == 0 || channels == 0 {
        return 0;
    }
    (num_samples as f64 / (sample_rate as f64 * channels as f64) * 1000.0) as u32
}

/// Decode an audio file to mono at `target_sample_rate`.
pub fn decode_audio(path: &Path, target_sample_rate: u32) -> Result<AudioData> {
    if !path.exists() {
        anyhow::bail!("Audio file not found: {}", path.display());
    }

    let audio_data = match AudioFormat::from_path(path) {
        AudioFormat::Wav => decode_wav(path)?,
        AudioFormat::Mp3 => decode_mp3(path)?,
        AudioFormat::Flac => decode_flac(path)?,
        AudioFormat::Ogg => decode_ogg(path)?,
        AudioFormat::Container => decode_container(path)?,
    };

    if audio_data.sample_rate == 0 {
        anyhow::bail!("Audio file reports a zero sample rate: {}", path.display());
    }

    let mono = audio_data.to_mono();
    let samples = if audio_data.sample_rate != target_sample_rate {
        log::debug!(
            "Resampling {} from {}Hz to {}Hz",
            path.display(),
            audio_data.sample_rate,
            target_sample_rate
        );
        resample_to_target(&mono, audio_data.sample_rate, target_sample_rate)?
    } else {
        mono
    };

    Ok(AudioData::from_mono(samples, target_sample_rate))
}

/// Decode WAV file
fn decode_wav(path: &Path) -> Result<AudioData> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok(AudioData {
        duration_ms: duration_ms(samples.len(), spec.sample_rate, spec.channels),
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Decode MP3 file
fn decode_mp3(path: &Path) -> Result<AudioData> {
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read MP3 file: {}", path.display()))?;

    let mut decoder = minimp3::Decoder::new(&data[..]);
    let mut samples = Vec::new();
    let mut sample_rate = 0;
    let mut channels = 0;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate == 0 {
                    sample_rate = frame.sample_rate as u32;
                    channels = frame.channels as u16;
                }
                samples.extend(frame.data.iter().map(|&s| s as f32 / 32768.0));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => anyhow::bail!("MP3 decode error in {}: {}", path.display(), e),
        }
    }

    Ok(AudioData {
        duration_ms: duration_ms(samples.len(), sample_rate, channels),
        samples,
        sample_rate,
        channels,
    })
}

/// Decode FLAC file
fn decode_flac(path: &Path) -> Result<AudioData> {
    let mut reader = claxon::FlacReader::open(path)
        .with_context(|| format!("Failed to open FLAC file: {}", path.display()))?;

    let info = reader.streaminfo();
    let channels = info.channels as u16;
    let max_val = (1i64 << (info.bits_per_sample - 1)) as f32;

    let samples: Vec<f32> = reader
        .samples()
        .map(|s| s.map(|v| v as f32 / max_val))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AudioData {
        duration_ms: duration_ms(samples.len(), info.sample_rate, channels),
        samples,
        sample_rate: info.sample_rate,
        channels,
    })
}

/// Decode OGG Vorbis file
fn decode_ogg(path: &Path) -> Result<AudioData> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open OGG file: {}", path.display()))?;

    let mut reader = lewton::inside_ogg::OggStreamReader::new(file)?;

    let sample_rate = reader.ident_hdr.audio_sample_rate;
    let channels = reader.ident_hdr.audio_channels as u16;

    let mut samples = Vec::new();
    while let Some(packet) = reader.read_dec_packet_itl()? {
        samples.extend(packet.iter().map(|&s| s as f32 / 32768.0));
    }

    Ok(AudioData {
        duration_ms: duration_ms(samples.len(), sample_rate, channels),
        samples,
        sample_rate,
        channels,
    })
}
