use crate::{
    config::Settings,
    core::{
        acquire::acquire,
        mix::{combine_stems, mix},
        record::{clean_recording, Recorder},
        separate::SeparationJob,
    },
    error::{KaraokeError, Result},
    io::progress::{emit_pipeline_progress, stage, PipelineProgress},
    media::probe::probe_duration,
    types::{KaraokeOptions, KaraokeResult, StemMode, StemName, StemSet},
};
use std::path::PathBuf;
use tracing::info;

/// The instrumental for a stem set: `no_vocals` when present, otherwise the
/// sum of drums, bass and other written to `<results>/<song>_instrumental.wav`.
pub fn instrumental_track(stems: &StemSet, song: &str, settings: &Settings) -> Result<PathBuf> {
    if let Some(path) = stems.instrumental() {
        return Ok(path.clone());
    }

    let parts: Vec<PathBuf> = [StemName::Drums, StemName::Bass, StemName::Other]
        .into_iter()
        .filter_map(|s| stems.get(s).cloned())
        .collect();
    if parts.is_empty() {
        return Err(KaraokeError::OutputNotFound {
            dir: stems.directory.clone(),
            missing: "no_vocals".into(),
        });
    }
    let output = settings.results_dir().join(format!("{song}_instrumental.wav"));
    combine_stems(&parts, &output)
}

pub fn recording_path(song: &str, settings: &Settings) -> PathBuf {
    settings.results_dir().join(format!("{song}_recorded.wav"))
}

pub fn karaoke_path(song: &str, settings: &Settings) -> PathBuf {
    settings.results_dir().join(format!("{song}_karaoke.wav"))
}

/// Fetch, separate, record and mix in one go. The microphone is whatever
/// `recorder` was built for.
pub fn make_karaoke(
    identifier: &str,
    opts: &KaraokeOptions,
    recorder: &dyn Recorder,
    settings: &Settings,
) -> Result<KaraokeResult> {
    stage("acquire");
    let source = acquire(identifier, settings)?;
    let song = source.basename();

    stage("separate");
    let mut job = SeparationJob::new(
        source.clone(),
        StemMode::TwoStems,
        settings.separation.model.clone(),
    );
    let stems = job.run(&settings.separated_dir(), settings)?;

    stage("resolve_stems");
    let instrumental = instrumental_track(&stems, &song, settings)?;

    stage("probe");
    let duration = probe_duration(&instrumental, settings)?;

    stage("record");
    let recording = recorder.record(duration, &recording_path(&song, settings))?;

    let cleaned_recording = if opts.clean_recording {
        stage("clean");
        Some(clean_recording(&recording.path, settings)?)
    } else {
        None
    };
    let voice = cleaned_recording.as_ref().unwrap_or(&recording.path);

    stage("mix");
    let strategy = opts
        .strategy
        .clone()
        .unwrap_or_else(|| settings.mix.strategy.clone());
    let mixed = mix(
        &instrumental,
        voice,
        &karaoke_path(&song, settings),
        &strategy,
        settings,
    )?;

    stage("finalize");
    info!(path = %mixed.path.display(), "karaoke track created");
    emit_pipeline_progress(PipelineProgress::Finished);

    Ok(KaraokeResult {
        source,
        job: job.record(),
        stems,
        instrumental,
        recording: recording.path,
        cleaned_recording,
        mix: mixed,
    })
}
