//! Fallback decoding through Symphonia's format probe

use super::decoder::{duration_ms, AudioData};
use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decode the first audio track of any container Symphonia recognises.
pub fn decode_container(path: &Path) -> Result<AudioData> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let format_opts = FormatOptions {
        enable_gapless: true,
        ..Default::default()
    };

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &MetadataOptions::default())
        .with_context(|| format!("Unsupported audio format: {}", path.display()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow::anyhow!("No audio track found in {}", path.display()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut sample_rate = codec_params.sample_rate.unwrap_or(0);
    let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(0) as u16;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break
            }
            Err(e) => return Err(anyhow::anyhow!("Error reading packet: {}", e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(err) => {
                log::debug!("Skipping undecodable packet in {}: {}", path.display(), err);
                continue;
            }
        };

        let spec = *decoded.spec();
        if sample_rate == 0 {
            sample_rate = spec.rate;
        }
        if channels == 0 {
            channels = spec.channels.count() as u16;
        }

        match decoded {
            AudioBufferRef::F32(buf) => interleave(&mut samples, &*buf, |s| s),
            AudioBufferRef::F64(buf) => interleave(&mut samples, &*buf, |s| s as f32),
            AudioBufferRef::S32(buf) => {
                interleave(&mut samples, &*buf, |s| s as f32 / i32::MAX as f32)
            }
            AudioBufferRef::S16(buf) => {
                interleave(&mut samples, &*buf, |s| s as f32 / i16::MAX as f32)
            }
            AudioBufferRef::U8(buf) => {
                interleave(&mut samples, &*buf, |s| (s as f32 - 128.0) / 128.0)
            }
            _ => anyhow::bail!("Unsupported sample format in {}", path.display()),
        }
    }

    Ok(AudioData {
        duration_ms: duration_ms(samples.len(), sample_rate, channels),
        samples,
        sample_rate,
        channels,
    })
}

fn interleave<S, F>(out: &mut Vec<f32>, buf: &symphonia::core::audio::AudioBuffer<S>, convert: F)
where
    S: symphonia::core::sample::Sample,
    F: Fn(S) -> f32,
{
    let num_channels = buf.spec().channels.count();
    for frame in 0..buf.frames() {
        for ch in 0..num_channels {
            out.push(convert(buf.chan(ch)[frame]));
        }
    }
}
