use crate::{
    config::Settings,
    core::resolve::{resolve_stems_since, stem_directory},
    error::{KaraokeError, Result},
    io::{crypto::sha256_hex, process::run_tool},
    types::{JobRecord, JobStatus, SourceTrack, StemMode, StemSet},
};
use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    process::Command,
    time::{Duration, SystemTime},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Lock files live here, under the separator's output root.
pub const LOCK_DIR: &str = ".locks";

/// A lock this old was left behind by a run that never finished.
const STALE_LOCK_AFTER: Duration = Duration::from_secs(6 * 60 * 60);

/// Marks a source track as being separated, across processes. Backed by a
/// lock file created exclusively and removed on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    lock: PathBuf,
}

impl InFlightGuard {
    /// `<output_root>/.locks/<sha256 of the canonical source path>.lock`
    pub fn lock_path(output_root: &Path, source: &Path) -> PathBuf {
        let key = fs::canonicalize(source).unwrap_or_else(|_| source.to_path_buf());
        output_root
            .join(LOCK_DIR)
            .join(format!("{}.lock", sha256_hex(key.to_string_lossy().as_bytes())))
    }

    pub fn acquire(output_root: &Path, source: &Path) -> Result<Self> {
        let lock = Self::lock_path(output_root, source);
        if let Some(dir) = lock.parent() {
            fs::create_dir_all(dir)?;
        }

        match create_lock(&lock) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if !is_stale(&lock) {
                    return Err(KaraokeError::JobInFlight(source.to_path_buf()));
                }
                warn!(lock = %lock.display(), "removing stale separation lock");
                fs::remove_file(&lock)?;
                create_lock(&lock).map_err(|e| match e.kind() {
                    io::ErrorKind::AlreadyExists => KaraokeError::JobInFlight(source.to_path_buf()),
                    _ => e.into(),
                })?;
            }
            Err(e) => return Err(e.into()),
        }
        debug!(lock = %lock.display(), "separation lock taken");
        Ok(Self { lock })
    }

    /// When the lock was taken, by the clock of the filesystem holding the output.
    pub fn taken_at(&self) -> Result<SystemTime> {
        Ok(fs::metadata(&self.lock)?.modified()?)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.lock) {
            warn!(lock = %self.lock.display(), error = %e, "could not release separation lock");
        }
    }
}

fn create_lock(path: &Path) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    writeln!(file, "{}", std::process::id())
}

fn is_stale(lock: &Path) -> bool {
    fs::metadata(lock)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.elapsed().ok())
        .is_some_and(|age| age > STALE_LOCK_AFTER)
}

#[derive(Clone, Debug)]
pub struct SeparationJob {
    pub id: Uuid,
    pub source: SourceTrack,
    pub mode: StemMode,
    pub model: String,
    pub status: JobStatus,
}

impl SeparationJob {
    pub fn new(source: SourceTrack, mode: StemMode, model: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            mode,
            model: model.into(),
            status: JobStatus::Pending,
        }
    }

    pub fn record(&self) -> JobRecord {
        JobRecord {
            id: self.id,
            source: self.source.path.clone(),
            mode: self.mode,
            model: self.model.clone(),
            status: self.status.clone(),
        }
    }

    pub fn command(&self, output_root: &Path, settings: &Settings) -> Command {
        separation_command(&self.source.path, self.mode, &self.model, output_root, settings)
    }

    /// Runs the separator and resolves its output. The job ends `Succeeded`
    /// only when the process exits cleanly and every expected stem is found.
    pub fn run(&mut self, output_root: &Path, settings: &Settings) -> Result<StemSet> {
        if self.status != JobStatus::Pending {
            return Err(anyhow::anyhow!("job {} already ran", self.id).into());
        }
        fs::create_dir_all(output_root)?;
        let guard = InFlightGuard::acquire(output_root, &self.source.path)?;

        self.status = JobStatus::Running;
        info!(
            job = %self.id,
            source = %self.source.path.display(),
            mode = ?self.mode,
            model = %self.model,
            "separation started"
        );

        let result = self.execute(output_root, &guard, settings);
        match &result {
            Ok(set) => {
                self.status = JobStatus::Succeeded;
                info!(
                    job = %self.id,
                    stems = set.stems.len(),
                    dir = %set.directory.display(),
                    "separation finished"
                );
            }
            Err(e) => {
                self.status = JobStatus::Failed(e.to_string());
                error!(job = %self.id, error = %e, "separation failed");
            }
        }
        result
    }

    /// Only stems written during this run count: the target folder is cleared
    /// first and anything older than the lock is ignored.
    fn execute(
        &self,
        output_root: &Path,
        guard: &InFlightGuard,
        settings: &Settings,
    ) -> Result<StemSet> {
        let basename = self.source.basename();
        let target = stem_directory(output_root, &self.model, &basename);
        if target.exists() {
            debug!(dir = %target.display(), "removing previous stems");
            fs::remove_dir_all(&target)?;
        }
        let started = guard.taken_at()?;

        let out = run_tool(&mut self.command(output_root, settings))?;
        if !out.success() {
            return Err(KaraokeError::Separation {
                path: self.source.path.clone(),
                reason: format!("{}: {}", out.exit_description(), out.stderr_tail(5)),
            });
        }
        resolve_stems_since(output_root, &self.model, &basename, self.mode, Some(started))
    }
}

pub fn separation_command(
    source: &Path,
    mode: StemMode,
    model: &str,
    output_root: &Path,
    settings: &Settings,
) -> Command {
    let mut cmd = Command::new(&settings.tools.separator);
    cmd.args(mode.separator_args())
        .args(["-n", model])
        .arg("-o")
        .arg(output_root);
    if let Some(flag) = settings.separation.format.separator_flag() {
        cmd.arg(flag);
    }
    cmd.arg(source);
    cmd
}

/// Separates `source` into the workspace's separated directory.
pub fn separate(source: &SourceTrack, mode: StemMode, settings: &Settings) -> Result<StemSet> {
    let mut job = SeparationJob::new(source.clone(), mode, settings.separation.model.clone());
    job.run(&settings.separated_dir(), settings)
}
