use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, path::PathBuf};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioData {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Where a source track came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackOrigin {
    Download { identifier: String },
    Upload { original: PathBuf },
}

/// The original, unseparated audio file. Read-only once acquired.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceTrack {
    pub path: PathBuf,
    pub duration_secs: f64,
    pub origin: TrackOrigin,
}

impl SourceTrack {
    /// File name without extension; the separator names its output folder after it.
    pub fn basename(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".into())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StemMode {
    /// Vocals + instrumental.
    #[default]
    TwoStems,
    /// Vocals, drums, bass, other.
    FourStems,
}

impl StemMode {
    pub fn expected_stems(self) -> &'static [StemName] {
        match self {
            StemMode::TwoStems => &[StemName::Vocals, StemName::NoVocals],
            StemMode::FourStems => &[
                StemName::Vocals,
                StemName::Drums,
                StemName::Bass,
                StemName::Other,
            ],
        }
    }

    /// Separator flags selecting this mode.
    pub fn separator_args(self) -> &'static [&'static str] {
        match self {
            StemMode::TwoStems => &["--two-stems", "vocals"],
            StemMode::FourStems => &[],
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "2" | "two" | "two_stems" | "two-stems" => Some(StemMode::TwoStems),
            "4" | "four" | "four_stems" | "four-stems" => Some(StemMode::FourStems),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StemName {
    Vocals,
    NoVocals,
    Drums,
    Bass,
    Other,
}

impl StemName {
    pub fn as_str(self) -> &'static str {
        match self {
            StemName::Vocals => "vocals",
            StemName::NoVocals => "no_vocals",
            StemName::Drums => "drums",
            StemName::Bass => "bass",
            StemName::Other => "other",
        }
    }

    /// Maps a stem file stem (`no_vocals`, `Vocals`, `instrumental`, ...) to a known stem.
    pub fn from_file_stem(stem: &str) -> Option<Self> {
        match stem.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "vocals" => Some(StemName::Vocals),
            "no_vocals" | "instrumental" => Some(StemName::NoVocals),
            "drums" => Some(StemName::Drums),
            "bass" => Some(StemName::Bass),
            "other" => Some(StemName::Other),
            _ => None,
        }
    }
}

impl fmt::Display for StemName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed(String),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed(_))
    }
}

/// Serializable summary of a separation job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub source: PathBuf,
    pub mode: StemMode,
    pub model: String,
    pub status: JobStatus,
}

/// Files produced by a successful separation job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StemSet {
    pub model: String,
    pub directory: PathBuf,
    pub stems: BTreeMap<StemName, PathBuf>,
    /// Files in the stem folder whose names matched no known stem.
    #[serde(default)]
    pub extras: Vec<PathBuf>,
}

impl StemSet {
    pub fn get(&self, stem: StemName) -> Option<&PathBuf> {
        self.stems.get(&stem)
    }

    pub fn instrumental(&self) -> Option<&PathBuf> {
        self.get(StemName::NoVocals)
    }

    pub fn missing(&self, mode: StemMode) -> Vec<StemName> {
        mode.expected_stems()
            .iter()
            .copied()
            .filter(|s| !self.stems.contains_key(s))
            .collect()
    }
}

/// A captured voice track.
#[derive(Clone, Debug)]
pub struct Recording {
    pub path: PathBuf,
    pub audio: AudioData,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MixStrategy {
    /// Native sample-wise addition, truncated to the shorter track.
    SampleSum,
    /// External filter graph (`amix`), length follows the instrumental.
    FilterGraph {
        instrumental_gain: f32,
        vocal_gain: f32,
        dropout_transition: u32,
    },
}

impl Default for MixStrategy {
    fn default() -> Self {
        MixStrategy::FilterGraph {
            instrumental_gain: 0.7,
            vocal_gain: 1.5,
            dropout_transition: 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MixResult {
    pub path: PathBuf,
    pub strategy: MixStrategy,
    pub duration_secs: f64,
}

#[derive(Clone, Debug, Default)]
pub struct KaraokeOptions {
    pub clean_recording: bool,
    /// Overrides the configured mix strategy.
    pub strategy: Option<MixStrategy>,
}

#[derive(Clone, Debug)]
pub struct KaraokeResult {
    pub source: SourceTrack,
    pub job: JobRecord,
    pub stems: StemSet,
    pub instrumental: PathBuf,
    pub recording: PathBuf,
    pub cleaned_recording: Option<PathBuf>,
    pub mix: MixResult,
}
