//! Voice capture bounded by the instrumental's duration.

use crate::{
    config::{CaptureBackend, Settings},
    core::separate::separate,
    error::{KaraokeError, Result},
    io::process::run_tool,
    media::audio::read_audio,
    types::{Recording, SourceTrack, StemMode, StemName, TrackOrigin},
};
use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{info, warn};

pub trait Recorder {
    fn record(&self, duration_secs: f64, output: &Path) -> Result<Recording>;
}

/// Captures from the system microphone through the external media tool.
#[derive(Clone, Debug)]
pub struct FfmpegRecorder {
    pub ffmpeg: PathBuf,
    pub backend: CaptureBackend,
    pub device: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl FfmpegRecorder {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            ffmpeg: settings.tools.ffmpeg.clone(),
            backend: settings.recording.backend,
            device: settings.recording.device.clone(),
            sample_rate: settings.recording.sample_rate,
            channels: settings.recording.channels,
        }
    }

    pub fn with_device(mut self, device: Option<String>) -> Self {
        if device.is_some() {
            self.device = device;
        }
        self
    }

    /// The capture input, e.g. `default` for ALSA or `audio=default` for DirectShow.
    pub fn input_device(&self) -> Result<String> {
        let Some(device) = &self.device else {
            return Ok(self.backend.default_device().to_string());
        };
        let device = device.trim();
        if device.is_empty() || device.chars().any(char::is_control) {
            return Err(KaraokeError::InvalidDevice(device.to_string()));
        }
        if self.backend == CaptureBackend::DirectShow && !device.starts_with("audio=") {
            return Ok(format!("audio={device}"));
        }
        Ok(device.to_string())
    }

    pub fn command(&self, duration_secs: f64, output: &Path) -> Result<Command> {
        let device = self.input_device()?;
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(["-f", self.backend.format_name()])
            .args(["-i", &device])
            .args(["-t", &format!("{duration_secs:.3}")])
            .args(["-ac", &self.channels.to_string()])
            .args(["-ar", &self.sample_rate.to_string()])
            .arg(output);
        Ok(cmd)
    }
}

impl Recorder for FfmpegRecorder {
    fn record(&self, duration_secs: f64, output: &Path) -> Result<Recording> {
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return Err(KaraokeError::Recording(format!(
                "invalid duration {duration_secs}"
            )));
        }
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut cmd = self.command(duration_secs, output)?;
        info!(duration_secs, output = %output.display(), "recording started");
        let out = run_tool(&mut cmd)?;

        if !out.success() {
            let tail = out.stderr_tail(3);
            let lower = tail.to_lowercase();
            let device_error = ["no such", "cannot open", "could not"]
                .iter()
                .any(|needle| lower.contains(needle));
            if device_error {
                return Err(KaraokeError::InvalidDevice(format!(
                    "{}: {tail}",
                    self.input_device()?
                )));
            }
            return Err(KaraokeError::Recording(format!(
                "{}: {tail}",
                out.exit_description()
            )));
        }
        if !output.exists() {
            return Err(KaraokeError::Recording(format!(
                "capture finished but {} was not written",
                output.display()
            )));
        }

        let audio = read_audio(output)?;
        if audio.sample_rate != self.sample_rate {
            warn!(
                expected = self.sample_rate,
                got = audio.sample_rate,
                "recording sample rate differs from requested"
            );
        }
        info!(frames = audio.frames(), "recording saved");

        Ok(Recording {
            path: output.to_path_buf(),
            audio,
        })
    }
}

/// Strips background noise from a recording by separating it and keeping the
/// vocal stem. The cleaned file is written next to the recording as
/// `<name>_clean.<ext>`.
pub fn clean_recording(recording: &Path, settings: &Settings) -> Result<PathBuf> {
    let duration_secs = read_audio(recording)?.duration_secs();
    let source = SourceTrack {
        path: recording.to_path_buf(),
        duration_secs,
        origin: TrackOrigin::Upload {
            original: recording.to_path_buf(),
        },
    };

    let stems = separate(&source, StemMode::TwoStems, settings)?;
    let vocals = stems
        .get(StemName::Vocals)
        .ok_or_else(|| KaraokeError::OutputNotFound {
            dir: stems.directory.clone(),
            missing: StemName::Vocals.to_string(),
        })?;

    let ext = vocals
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "wav".into());
    let cleaned = recording.with_file_name(format!("{}_clean.{ext}", source.basename()));
    fs::copy(vocals, &cleaned)?;
    info!(path = %cleaned.display(), "cleaned recording saved");
    Ok(cleaned)
}
