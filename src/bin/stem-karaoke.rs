use clap::{Parser, Subcommand, ValueEnum};
use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};
use stem_karaoke_core::{
    acquire, clean_recording, find_previous_download, import_upload, make_karaoke, mix,
    pipeline::{instrumental_track, karaoke_path, recording_path},
    probe_duration, select_existing, set_download_progress_callback,
    set_pipeline_progress_callback, FfmpegRecorder, KaraokeOptions, MixStrategy,
    PipelineProgress, Recorder, SeparationJob, SessionState, Settings, StemMode,
};
use tracing_subscriber::EnvFilter;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "stem-karaoke")]
#[command(about = "Fetch a song, split it into stems and build a karaoke mix", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (TOML)
    #[arg(short, long, global = true, env = "STEM_KARAOKE_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only print result paths
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum StemsArg {
    Two,
    Four,
}

impl From<StemsArg> for StemMode {
    fn from(s: StemsArg) -> Self {
        match s {
            StemsArg::Two => StemMode::TwoStems,
            StemsArg::Four => StemMode::FourStems,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Add samples, truncating to the shorter track
    Sum,
    /// ffmpeg amix filter graph
    Filter,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a song by URL or search term and select it
    Fetch {
        identifier: String,

        /// Reuse an earlier download whose name matches instead of fetching again
        #[arg(long)]
        reuse: bool,
    },

    /// Import a local mp3/wav file and select it
    Upload { file: PathBuf },

    /// Split the selected track into stems
    Separate {
        #[arg(short, long, value_enum)]
        stems: Option<StemsArg>,

        #[arg(short, long)]
        model: Option<String>,
    },

    /// List the stems of the last successful separation
    Stems,

    /// Print the duration of an audio file
    Probe { file: PathBuf },

    /// Record a voice take as long as the instrumental
    Record {
        /// Override the capture length in seconds
        #[arg(short, long)]
        duration: Option<f64>,

        #[arg(long)]
        device: Option<String>,
    },

    /// Remove background noise from the last recording
    Clean,

    /// Mix instrumental and voice (defaults come from the session)
    Mix {
        #[arg(long)]
        instrumental: Option<PathBuf>,

        #[arg(long)]
        vocal: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,
    },

    /// Fetch, separate, record and mix in one go
    Karaoke {
        identifier: String,

        #[arg(long)]
        device: Option<String>,

        #[arg(long)]
        clean: bool,

        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,
    },

    /// Show the current session
    Status,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if !cli.quiet {
        setup_progress_callbacks();
    }

    let result = match cli.command {
        Commands::Fetch { identifier, reuse } => {
            handle_fetch(&settings, &identifier, reuse, cli.quiet)
        }
        Commands::Upload { file } => handle_upload(&settings, &file, cli.quiet),
        Commands::Separate { stems, model } => handle_separate(&settings, stems, model, cli.quiet),
        Commands::Stems => handle_stems(&settings),
        Commands::Probe { file } => handle_probe(&settings, &file),
        Commands::Record { duration, device } => {
            handle_record(&settings, duration, device, cli.quiet)
        }
        Commands::Clean => handle_clean(&settings, cli.quiet),
        Commands::Mix {
            instrumental,
            vocal,
            output,
            strategy,
        } => handle_mix(&settings, instrumental, vocal, output, strategy, cli.quiet),
        Commands::Karaoke {
            identifier,
            device,
            clean,
            strategy,
        } => handle_karaoke(&settings, &identifier, device, clean, strategy, cli.quiet),
        Commands::Status => handle_status(&settings),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = if quiet { "error" } else { filter };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn strategy_for(arg: Option<StrategyArg>, settings: &Settings) -> MixStrategy {
    match arg {
        None => settings.mix.strategy.clone(),
        Some(StrategyArg::Sum) => MixStrategy::SampleSum,
        Some(StrategyArg::Filter) => match &settings.mix.strategy {
            s @ MixStrategy::FilterGraph { .. } => s.clone(),
            MixStrategy::SampleSum => MixStrategy::default(),
        },
    }
}

fn load_session(settings: &Settings) -> Result<SessionState, Box<dyn std::error::Error>> {
    Ok(SessionState::load(&settings.session_path())?)
}

fn handle_fetch(settings: &Settings, identifier: &str, reuse: bool, quiet: bool) -> CliResult {
    let previous = if reuse {
        find_previous_download(identifier, settings)?
    } else {
        None
    };

    let track = match previous {
        Some(path) => {
            if !quiet {
                eprintln!("♻️  Reusing earlier download");
            }
            select_existing(&path, identifier, settings)?
        }
        None => {
            if !quiet {
                eprintln!("⏳ Fetching audio for `{identifier}`...");
            }
            acquire(identifier, settings)?
        }
    };

    let mut session = load_session(settings)?;
    session.select(track.clone());
    session.save(&settings.session_path())?;

    if quiet {
        println!("{}", track.path.display());
    } else {
        eprintln!("✅ Selected: {} ({:.1}s)", track.path.display(), track.duration_secs);
    }
    Ok(())
}

fn handle_upload(settings: &Settings, file: &Path, quiet: bool) -> CliResult {
    let track = import_upload(file, settings)?;

    let mut session = load_session(settings)?;
    session.select(track.clone());
    session.save(&settings.session_path())?;

    if quiet {
        println!("{}", track.path.display());
    } else {
        eprintln!("✅ File uploaded: {} ({:.1}s)", track.path.display(), track.duration_secs);
    }
    Ok(())
}

fn handle_separate(
    settings: &Settings,
    stems: Option<StemsArg>,
    model: Option<String>,
    quiet: bool,
) -> CliResult {
    let mut session = load_session(settings)?;
    let track = session.selected()?.clone();
    let mode = stems.map(StemMode::from).unwrap_or(settings.separation.mode);
    let model = model.unwrap_or_else(|| settings.separation.model.clone());

    if !quiet {
        eprintln!("🎵 Separating {}", track.path.display());
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("Mode:  {mode:?}");
        eprintln!("Model: {model}");
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("⏳ Processing... This may take a while.");
    }

    let mut job = SeparationJob::new(track, mode, model);
    let result = job.run(&settings.separated_dir(), settings);
    session.record_job(job.record(), result.as_ref().ok().cloned());
    session.save(&settings.session_path())?;

    let set = result?;
    if !quiet {
        eprintln!("✅ Separation complete!");
        eprintln!();
        eprintln!("Output files:");
    }
    for (stem, path) in &set.stems {
        if quiet {
            println!("{}", path.display());
        } else {
            eprintln!("  {:<10} {}", stem.as_str(), path.display());
        }
    }
    Ok(())
}

fn handle_stems(settings: &Settings) -> CliResult {
    let session = load_session(settings)?;
    let Some(set) = session.stems() else {
        return Err("no completed separation in this session, run `separate` first".into());
    };
    for (stem, path) in &set.stems {
        println!("{}\t{}", stem.as_str(), path.display());
    }
    for extra in &set.extras {
        println!("?\t{}", extra.display());
    }
    Ok(())
}

fn handle_probe(settings: &Settings, file: &Path) -> CliResult {
    let secs = probe_duration(file, settings)?;
    println!("{secs:.3}");
    Ok(())
}

fn handle_record(
    settings: &Settings,
    duration: Option<f64>,
    device: Option<String>,
    quiet: bool,
) -> CliResult {
    let mut session = load_session(settings)?;
    let song = session.selected()?.basename();
    let Some(stems) = session.stems() else {
        return Err("⚠️ No instrumental track found. Please separate audio first!".into());
    };
    let instrumental = instrumental_track(stems, &song, settings)?;
    let duration = match duration {
        Some(d) => d,
        None => probe_duration(&instrumental, settings)?,
    };

    let recorder = FfmpegRecorder::from_settings(settings).with_device(device);
    if !quiet {
        eprintln!("🎧 Recording {duration:.1}s... Sing into the microphone!");
    }
    let recording = recorder.record(duration, &recording_path(&song, settings))?;

    session.set_recording(recording.path.clone());
    session.save(&settings.session_path())?;

    if quiet {
        println!("{}", recording.path.display());
    } else {
        eprintln!("✅ Recording saved: {}", recording.path.display());
    }
    Ok(())
}

fn handle_clean(settings: &Settings, quiet: bool) -> CliResult {
    let mut session = load_session(settings)?;
    let Some(recording) = session.recording.clone() else {
        return Err("no recording in this session, run `record` first".into());
    };

    let cleaned = clean_recording(&recording, settings)?;
    session.cleaned_recording = Some(cleaned.clone());
    session.save(&settings.session_path())?;

    if quiet {
        println!("{}", cleaned.display());
    } else {
        eprintln!("✅ Background noise removed: {}", cleaned.display());
    }
    Ok(())
}

fn handle_mix(
    settings: &Settings,
    instrumental: Option<PathBuf>,
    vocal: Option<PathBuf>,
    output: Option<PathBuf>,
    strategy: Option<StrategyArg>,
    quiet: bool,
) -> CliResult {
    let mut session = load_session(settings)?;
    let song = session.selected.as_ref().map(|t| t.basename());

    let instrumental = match instrumental {
        Some(p) => p,
        None => {
            let (Some(stems), Some(song)) = (session.stems(), song.as_deref()) else {
                return Err(
                    "no instrumental given and no completed separation in this session".into(),
                );
            };
            instrumental_track(stems, song, settings)?
        }
    };
    let vocal = match vocal.or_else(|| session.voice_track().cloned()) {
        Some(v) => v,
        None => return Err("no vocal given and no recording in this session".into()),
    };
    let output = match output.or_else(|| song.as_deref().map(|s| karaoke_path(s, settings))) {
        Some(o) => o,
        None => return Err("no output path given and no track selected".into()),
    };

    let result = mix(
        &instrumental,
        &vocal,
        &output,
        &strategy_for(strategy, settings),
        settings,
    )?;

    if session.selected.is_some() {
        session.mix = Some(result.clone());
        session.save(&settings.session_path())?;
    }

    if quiet {
        println!("{}", result.path.display());
    } else {
        eprintln!(
            "✅ Karaoke mix created: {} ({:.1}s)",
            result.path.display(),
            result.duration_secs
        );
    }
    Ok(())
}

fn handle_karaoke(
    settings: &Settings,
    identifier: &str,
    device: Option<String>,
    clean: bool,
    strategy: Option<StrategyArg>,
    quiet: bool,
) -> CliResult {
    let opts = KaraokeOptions {
        clean_recording: clean,
        strategy: strategy.map(|s| strategy_for(Some(s), settings)),
    };
    let recorder = FfmpegRecorder::from_settings(settings).with_device(device);

    let result = make_karaoke(identifier, &opts, &recorder, settings)?;

    let mut session = load_session(settings)?;
    session.record_karaoke(&result);
    session.save(&settings.session_path())?;

    if quiet {
        println!("{}", result.mix.path.display());
    } else {
        eprintln!();
        eprintln!("✅ Karaoke track created!");
        eprintln!("  🎵 Source:       {}", result.source.path.display());
        eprintln!("  🎹 Instrumental: {}", result.instrumental.display());
        eprintln!("  🎤 Recording:    {}", result.recording.display());
        eprintln!("  💿 Mix:          {}", result.mix.path.display());
    }
    Ok(())
}

fn handle_status(settings: &Settings) -> CliResult {
    let session = load_session(settings)?;
    println!("{}", serde_json::to_string_pretty(&session)?);
    Ok(())
}

fn setup_progress_callbacks() {
    set_download_progress_callback(|downloaded, total| {
        if total > 0 {
            let percent = (downloaded as f64 / total as f64 * 100.0).round() as u64;
            let downloaded_mb = downloaded as f64 / 1_000_000.0;
            let total_mb = total as f64 / 1_000_000.0;
            eprint!(
                "\r📥 Downloading: {:>3}% ({:.2} MB / {:.2} MB)",
                percent, downloaded_mb, total_mb
            );
            if downloaded >= total {
                eprintln!();
            }
        } else {
            eprint!("\r📥 Downloading: {:.2} MB", downloaded as f64 / 1_000_000.0);
        }
    });

    set_pipeline_progress_callback(|progress| match progress {
        PipelineProgress::Stage(stage) => {
            let stage_name = match stage {
                "acquire" => "Fetching audio",
                "separate" => "Separating stems (this may take a while)",
                "resolve_stems" => "Locating instrumental",
                "probe" => "Measuring instrumental",
                "record" => "Recording, sing into the microphone!",
                "clean" => "Removing background noise",
                "mix" => "Mixing karaoke track",
                "finalize" => "Finalizing",
                _ => stage,
            };
            eprintln!("⏳ {stage_name}");
        }
        PipelineProgress::ToolExited { tool, success } => {
            if !success {
                eprintln!("❌ {tool} failed");
            }
        }
        PipelineProgress::Finished => {}
    });
}
