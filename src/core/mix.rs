use crate::{
    config::Settings,
    error::{KaraokeError, Result},
    io::process::run_tool,
    media::{
        audio::{read_audio, to_channels, write_audio},
        probe::probe_duration,
        resample::resample,
    },
    types::{AudioData, MixResult, MixStrategy},
};
use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, info};

/// Adds `vocal` onto `instrumental` sample by sample. The result keeps the
/// instrumental's rate and channel layout and is truncated to the shorter track.
pub fn sum_tracks(instrumental: &AudioData, vocal: &AudioData) -> Result<AudioData> {
    if instrumental.channels == 0 || vocal.channels == 0 {
        return Err(KaraokeError::Mix("track without channels".into()));
    }

    let vocal = if vocal.sample_rate != instrumental.sample_rate {
        resample(vocal, instrumental.sample_rate)?
    } else {
        vocal.clone()
    };
    let vocal = to_channels(&vocal, instrumental.channels);

    let frames = instrumental.frames().min(vocal.frames());
    let len = frames * instrumental.channels as usize;
    debug!(
        instrumental_frames = instrumental.frames(),
        vocal_frames = vocal.frames(),
        frames,
        "summing tracks"
    );

    let samples = instrumental.samples[..len]
        .iter()
        .zip(&vocal.samples[..len])
        .map(|(a, b)| a + b)
        .collect();

    Ok(AudioData {
        samples,
        sample_rate: instrumental.sample_rate,
        channels: instrumental.channels,
    })
}

/// Two-input `amix` graph, each input scaled by its own `volume` filter. The
/// result follows the first (instrumental) input's length.
pub fn filter_graph(instrumental_gain: f32, vocal_gain: f32, dropout_transition: u32) -> String {
    format!(
        "[0:a]volume={instrumental_gain}[a0];[1:a]volume={vocal_gain}[a1];\
         [a0][a1]amix=inputs=2:duration=first:dropout_transition={dropout_transition}"
    )
}

pub fn filter_graph_command(
    ffmpeg: &Path,
    instrumental: &Path,
    vocal: &Path,
    output: &Path,
    graph: &str,
) -> Command {
    let mut cmd = Command::new(ffmpeg);
    cmd.args(["-hide_banner", "-loglevel", "error", "-y"])
        .arg("-i")
        .arg(instrumental)
        .arg("-i")
        .arg(vocal)
        .args(["-filter_complex", graph])
        .arg(output);
    cmd
}

/// Combines an instrumental stem with a vocal take and writes `output` once.
pub fn mix(
    instrumental: &Path,
    vocal: &Path,
    output: &Path,
    strategy: &MixStrategy,
    settings: &Settings,
) -> Result<MixResult> {
    for input in [instrumental, vocal] {
        if !input.is_file() {
            return Err(KaraokeError::Mix(format!("missing input {}", input.display())));
        }
    }
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    info!(
        instrumental = %instrumental.display(),
        vocal = %vocal.display(),
        output = %output.display(),
        ?strategy,
        "mixing"
    );

    let duration_secs = match strategy {
        MixStrategy::SampleSum => {
            let mixed = sum_tracks(&read_audio(instrumental)?, &read_audio(vocal)?)?;
            write_audio(output, &mixed)?;
            mixed.duration_secs()
        }
        MixStrategy::FilterGraph {
            instrumental_gain,
            vocal_gain,
            dropout_transition,
        } => {
            let graph = filter_graph(*instrumental_gain, *vocal_gain, *dropout_transition);
            let out = run_tool(&mut filter_graph_command(
                &settings.tools.ffmpeg,
                instrumental,
                vocal,
                output,
                &graph,
            ))?;
            if !out.success() {
                return Err(KaraokeError::Mix(format!(
                    "{}: {}",
                    out.exit_description(),
                    out.stderr_tail(3)
                )));
            }
            if !output.is_file() {
                return Err(KaraokeError::Mix(format!(
                    "mixer exited cleanly but {} was not written",
                    output.display()
                )));
            }
            probe_duration(output, settings)?
        }
    };

    info!(path = %output.display(), duration_secs, "mix written");
    Ok(MixResult {
        path: output.to_path_buf(),
        strategy: strategy.clone(),
        duration_secs,
    })
}

/// Sums several stems (drums, bass, other) into a single instrumental track.
pub fn combine_stems(stems: &[PathBuf], output: &Path) -> Result<PathBuf> {
    let mut iter = stems.iter();
    let Some(first) = iter.next() else {
        return Err(KaraokeError::Mix("no stems to combine".into()));
    };

    let mut acc = read_audio(first)?;
    for path in iter {
        acc = sum_tracks(&acc, &read_audio(path)?)?;
    }
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    write_audio(output, &acc)?;
    info!(stems = stems.len(), path = %output.display(), "instrumental combined");
    Ok(output.to_path_buf())
}
