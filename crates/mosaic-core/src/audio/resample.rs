//! Sample-rate conversion with a windowed-sinc resampler

use anyhow::Result;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

const CHUNK_SIZE: usize = 1024;

/// Resample mono audio from `from_rate` to `to_rate`.
///
/// The output is trimmed of the resampler's group delay and cut to
/// `ceil(len * to_rate / from_rate)` samples so start times stay aligned.
pub fn resample_to_target(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let expected_len = (samples.len() as f64 * ratio).ceil() as usize;

    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_SIZE, 1)?;

    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected_len + delay);

    let mut chunks = samples.chunks_exact(CHUNK_SIZE);
    for chunk in &mut chunks {
        let out = resampler.process(&[chunk], None)?;
        output.extend_from_slice(&out[0]);
    }

    let remainder = chunks.remainder();
    if !remainder.is_empty() {
        let out = resampler.process_partial(Some(&[remainder]), None)?;
        output.extend_from_slice(&out[0]);
    }

    // Flush until the delayed tail is out.
    while output.len() < expected_len + delay {
        let out = resampler.process_partial::<&[f32]>(None, None)?;
        if out[0].is_empty() {
            break;
        }
        output.extend_from_slice(&out[0]);
    }

    let end = (delay + expected_len).min(output.len());
    let start = delay.min(end);
    let mut resampled = output[start..end].to_vec();
    resampled.resize(expected_len, 0.0);

    Ok(resampled)
}
