use crate::{error::Result, types::AudioData};
use anyhow::anyhow;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

/// Resamples `audio` to `target_rate`. Returns a copy when the rate already matches.
pub fn resample(audio: &AudioData, target_rate: u32) -> Result<AudioData> {
    if audio.sample_rate == target_rate || audio.frames() == 0 {
        return Ok(AudioData {
            sample_rate: if audio.frames() == 0 {
                target_rate
            } else {
                audio.sample_rate
            },
            ..audio.clone()
        });
    }

    let channels = audio.channels as usize;
    let frames = audio.frames();
    debug!(
        from = audio.sample_rate,
        to = target_rate,
        channels,
        frames,
        "resampling"
    );

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = target_rate as f64 / audio.sample_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, frames, channels)
        .map_err(|e| anyhow!("Failed to create resampler: {e}"))?;

    let planar = deinterleave(&audio.samples, channels);
    let mut out = resampler
        .process(&planar, None)
        .map_err(|e| anyhow!("Resampling failed: {e}"))?;
    // flush the samples still held back by the filter
    let tail = resampler
        .process_partial(None::<&[Vec<f32>]>, None)
        .map_err(|e| anyhow!("Resampling failed: {e}"))?;
    for (ch, rest) in out.iter_mut().zip(tail) {
        ch.extend(rest);
    }

    let delay = resampler.output_delay();
    let expected = (frames as f64 * ratio).round() as usize;
    let aligned: Vec<Vec<f32>> = out
        .into_iter()
        .map(|ch| ch.into_iter().skip(delay).take(expected).collect())
        .collect();

    Ok(AudioData {
        samples: interleave(&aligned),
        sample_rate: target_rate,
        channels: audio.channels,
    })
}

fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (ch, s) in frame.iter().enumerate() {
            planar[ch].push(*s);
        }
    }
    planar
}

fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = planar.first() else {
        return Vec::new();
    };
    let frames = first.len();
    let mut out = Vec::with_capacity(frames * planar.len());
    for i in 0..frames {
        for ch in planar {
            out.push(ch[i]);
        }
    }
    out
}
