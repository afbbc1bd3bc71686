//! # stem-karaoke-core
//!
//! Fetches songs, splits them into stems with an external separator, records
//! a voice take against the instrumental and mixes the two.

mod error;
mod types;

pub mod config;
pub mod pipeline;
pub mod session;

pub mod core {
    pub mod acquire;
    pub mod mix;
    pub mod record;
    pub mod resolve;
    pub mod separate;
}

pub mod media {
    pub mod audio;
    pub mod probe;
    pub mod resample;
}

pub mod io {
    pub mod crypto;
    pub mod net;
    pub mod paths;
    pub mod process;
    pub mod progress;
}

// Public API
pub use crate::config::Settings;
pub use crate::core::{
    acquire::{acquire, find_previous_download, import_upload, select_existing, Identifier},
    mix::{combine_stems, mix, sum_tracks},
    record::{clean_recording, FfmpegRecorder, Recorder},
    resolve::resolve_stems,
    separate::{separate, SeparationJob},
};
pub use crate::error::{KaraokeError, Result};
pub use crate::io::progress::{
    set_download_progress_callback, set_pipeline_progress_callback, PipelineProgress,
};
pub use crate::media::{
    audio::{read_audio, write_audio},
    probe::probe_duration,
};
pub use crate::pipeline::make_karaoke;
pub use crate::session::SessionState;
pub use crate::types::{
    AudioData, JobRecord, JobStatus, KaraokeOptions, KaraokeResult, MixResult, MixStrategy,
    Recording, SourceTrack, StemMode, StemName, StemSet, TrackOrigin,
};
