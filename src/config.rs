//! Runtime settings loaded from TOML.
//!
//! Lookup order for the config file:
//! 1. explicit path (`--config`)
//! 2. `STEM_KARAOKE_CONFIG`
//! 3. `<platform config dir>/config.toml`
//! 4. built-in defaults
//!
//! `STEM_KARAOKE_WORKSPACE` overrides the workspace root afterwards.

use crate::{
    error::{KaraokeError, Result},
    io::paths::{config_file_path, default_workspace},
    types::{MixStrategy, StemMode},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

pub const CONFIG_ENV: &str = "STEM_KARAOKE_CONFIG";
pub const WORKSPACE_ENV: &str = "STEM_KARAOKE_WORKSPACE";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub workspace: PathBuf,
    pub dirs: DirLayout,
    pub tools: ToolPaths,
    pub fetch: FetchSettings,
    pub separation: SeparationSettings,
    pub recording: RecordingSettings,
    pub mix: MixSettings,
}

/// Directory names relative to the workspace root.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DirLayout {
    pub uploads: String,
    pub downloads: String,
    pub separated: String,
    pub results: String,
    pub recordings: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub fetcher: PathBuf,
    pub separator: PathBuf,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub format: String,
    pub audio_codec: String,
    pub audio_quality: String,
    pub output_template: String,
    pub search_prefix: String,
    pub cookies: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StemFormat {
    #[default]
    Wav,
    Mp3,
    Flac,
}

impl StemFormat {
    pub fn separator_flag(self) -> Option<&'static str> {
        match self {
            StemFormat::Wav => None,
            StemFormat::Mp3 => Some("--mp3"),
            StemFormat::Flac => Some("--flac"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationSettings {
    pub model: String,
    pub mode: StemMode,
    pub format: StemFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureBackend {
    DirectShow,
    AvFoundation,
    Alsa,
    Pulse,
}

impl CaptureBackend {
    pub fn for_current_os() -> Self {
        if cfg!(target_os = "windows") {
            CaptureBackend::DirectShow
        } else if cfg!(target_os = "macos") {
            CaptureBackend::AvFoundation
        } else {
            CaptureBackend::Alsa
        }
    }

    pub fn format_name(self) -> &'static str {
        match self {
            CaptureBackend::DirectShow => "dshow",
            CaptureBackend::AvFoundation => "avfoundation",
            CaptureBackend::Alsa => "alsa",
            CaptureBackend::Pulse => "pulse",
        }
    }

    pub fn default_device(self) -> &'static str {
        match self {
            CaptureBackend::DirectShow => "audio=default",
            CaptureBackend::AvFoundation => ":0",
            CaptureBackend::Alsa | CaptureBackend::Pulse => "default",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    pub sample_rate: u32,
    pub channels: u16,
    pub device: Option<String>,
    pub backend: CaptureBackend,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MixSettings {
    pub strategy: MixStrategy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            dirs: DirLayout::default(),
            tools: ToolPaths::default(),
            fetch: FetchSettings::default(),
            separation: SeparationSettings::default(),
            recording: RecordingSettings::default(),
            mix: MixSettings::default(),
        }
    }
}

impl Default for DirLayout {
    fn default() -> Self {
        Self {
            uploads: "uploads".into(),
            downloads: "downloads".into(),
            separated: "separated".into(),
            results: "results".into(),
            recordings: "recordings".into(),
        }
    }
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            fetcher: "yt-dlp".into(),
            separator: "demucs".into(),
            ffmpeg: "ffmpeg".into(),
            ffprobe: "ffprobe".into(),
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            format: "bestaudio/best".into(),
            audio_codec: "mp3".into(),
            audio_quality: "192K".into(),
            output_template: "%(title)s.%(ext)s".into(),
            search_prefix: "ytsearch1".into(),
            cookies: None,
        }
    }
}

impl Default for SeparationSettings {
    fn default() -> Self {
        Self {
            model: "htdemucs".into(),
            mode: StemMode::TwoStems,
            format: StemFormat::Wav,
        }
    }
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 1,
            device: None,
            backend: CaptureBackend::for_current_os(),
        }
    }
}

impl Default for MixSettings {
    fn default() -> Self {
        Self {
            strategy: MixStrategy::default(),
        }
    }
}

impl Settings {
    /// Defaults rooted at `workspace`, ignoring config files and environment.
    pub fn with_workspace(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            ..Self::default()
        }
    }

    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => std::env::var_os(CONFIG_ENV)
                .map(PathBuf::from)
                .or_else(|| config_file_path().filter(|p| p.exists())),
        };

        let mut settings = match path {
            Some(p) => {
                info!(path = %p.display(), "loading config");
                Self::from_file(&p)?
            }
            None => {
                debug!("no config file found, using defaults");
                Self::default()
            }
        };

        if let Some(ws) = std::env::var_os(WORKSPACE_ENV) {
            settings.workspace = PathBuf::from(ws);
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            KaraokeError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.recording.sample_rate == 0 {
            return Err(KaraokeError::Config("recording.sample_rate must be > 0".into()));
        }
        if !(1..=2).contains(&self.recording.channels) {
            return Err(KaraokeError::Config(
                "recording.channels must be 1 or 2".into(),
            ));
        }
        if self.separation.model.trim().is_empty() {
            return Err(KaraokeError::Config("separation.model is empty".into()));
        }
        if self.fetch.audio_codec.trim().is_empty() {
            return Err(KaraokeError::Config("fetch.audio_codec is empty".into()));
        }
        if let MixStrategy::FilterGraph {
            instrumental_gain,
            vocal_gain,
            ..
        } = self.mix.strategy
        {
            if instrumental_gain < 0.0 || vocal_gain < 0.0 {
                return Err(KaraokeError::Config("mix gains must be >= 0".into()));
            }
        }
        Ok(())
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.workspace.join(&self.dirs.uploads)
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.workspace.join(&self.dirs.downloads)
    }

    pub fn separated_dir(&self) -> PathBuf {
        self.workspace.join(&self.dirs.separated)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.workspace.join(&self.dirs.results)
    }

    pub fn recordings_dir(&self) -> PathBuf {
        self.workspace.join(&self.dirs.recordings)
    }

    pub fn session_path(&self) -> PathBuf {
        self.workspace.join("session.json")
    }

    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [
            self.uploads_dir(),
            self.downloads_dir(),
            self.separated_dir(),
            self.results_dir(),
            self.recordings_dir(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}
