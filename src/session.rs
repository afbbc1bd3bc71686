//! State carried between invocations: which track is selected and what has
//! been produced from it so far.

use crate::{
    error::{KaraokeError, Result},
    types::{JobRecord, JobStatus, KaraokeResult, MixResult, SourceTrack, StemSet},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::debug;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub selected: Option<SourceTrack>,
    pub last_job: Option<JobRecord>,
    stems: Option<StemSet>,
    pub recording: Option<PathBuf>,
    pub cleaned_recording: Option<PathBuf>,
    pub mix: Option<MixResult>,
}

impl SessionState {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        let state: SessionState = serde_json::from_str(&text)?;
        debug!(path = %path.display(), "session loaded");
        Ok(state)
    }

    /// Writes through a temp file in the same directory so a crash never
    /// leaves a truncated session behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(serde_json::to_string_pretty(self)?.as_bytes())?;
        tmp.persist(path).map_err(|e| KaraokeError::from(e.error))?;
        debug!(path = %path.display(), "session saved");
        Ok(())
    }

    /// Selecting a new track discards everything derived from the old one.
    pub fn select(&mut self, track: SourceTrack) {
        if self.selected.as_ref() != Some(&track) {
            *self = Self {
                selected: Some(track),
                ..Self::default()
            };
        }
    }

    pub fn selected(&self) -> Result<&SourceTrack> {
        self.selected.as_ref().ok_or(KaraokeError::NoSelection)
    }

    pub fn record_job(&mut self, job: JobRecord, stems: Option<StemSet>) {
        let succeeded = job.status == JobStatus::Succeeded;
        self.last_job = Some(job);
        self.stems = if succeeded { stems } else { None };
        self.recording = None;
        self.cleaned_recording = None;
        self.mix = None;
    }

    /// The stem set of the last job, only if that job succeeded.
    pub fn stems(&self) -> Option<&StemSet> {
        match &self.last_job {
            Some(job) if job.status == JobStatus::Succeeded => self.stems.as_ref(),
            _ => None,
        }
    }

    pub fn set_recording(&mut self, path: PathBuf) {
        self.recording = Some(path);
        self.cleaned_recording = None;
        self.mix = None;
    }

    /// Takes over everything a one-shot karaoke run produced, so later steps
    /// can pick up from it.
    pub fn record_karaoke(&mut self, result: &KaraokeResult) {
        self.select(result.source.clone());
        self.record_job(result.job.clone(), Some(result.stems.clone()));
        self.set_recording(result.recording.clone());
        self.cleaned_recording = result.cleaned_recording.clone();
        self.mix = Some(result.mix.clone());
    }

    /// Cleaned take if there is one, else the raw recording.
    pub fn voice_track(&self) -> Option<&PathBuf> {
        self.cleaned_recording.as_ref().or(self.recording.as_ref())
    }
}
