//! Locating separator output.
//!
//! The separator writes `<output_root>/<model_name>/<source_basename>/<stem>.<ext>`.
//! Extension and model folder vary between separator versions and options, so
//! resolution lists the folder instead of guessing exact file names.

use crate::{
    error::{KaraokeError, Result},
    io::paths::{has_extension, AUDIO_EXTENSIONS},
    types::{StemMode, StemName, StemSet},
};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};
use tracing::{debug, warn};

pub fn stem_directory(output_root: &Path, model: &str, basename: &str) -> PathBuf {
    output_root.join(model).join(basename)
}

/// Audio files directly inside `dir`, skipping any last modified before `since`.
fn audio_files(dir: &Path, since: Option<SystemTime>) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && has_extension(p, AUDIO_EXTENSIONS))
        .filter(|p| match since {
            None => true,
            Some(since) => fs::metadata(p)
                .and_then(|m| m.modified())
                .map(|t| t >= since)
                .unwrap_or(false),
        })
        .collect()
}

/// Finds the stem folder for `basename`, preferring `model`'s folder and
/// falling back to any other model folder under `output_root`. With `since`,
/// only files written at or after that instant count.
pub fn locate_stem_directory(
    output_root: &Path,
    model: &str,
    basename: &str,
    since: Option<SystemTime>,
) -> Option<PathBuf> {
    let preferred = stem_directory(output_root, model, basename);
    if !audio_files(&preferred, since).is_empty() {
        return Some(preferred);
    }

    let mut candidates: Vec<PathBuf> = fs::read_dir(output_root)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path().join(basename))
        .filter(|p| p != &preferred && !audio_files(p, since).is_empty())
        .collect();
    candidates.sort();

    let found = candidates.into_iter().next();
    if let Some(dir) = &found {
        warn!(
            expected = %preferred.display(),
            found = %dir.display(),
            "stems found under a different model folder"
        );
    }
    found
}

/// The model a stem folder belongs to: the name of its parent directory.
pub fn model_of(dir: &Path) -> String {
    dir.parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Lists a stem folder into a [`StemSet`]. Unknown audio files end up in `extras`.
/// When the same stem exists in several encodings, `wav` wins, then the
/// alphabetically first file.
pub fn list_stems(dir: &Path) -> Result<StemSet> {
    list_stems_since(dir, None)
}

fn list_stems_since(dir: &Path, since: Option<SystemTime>) -> Result<StemSet> {
    if !dir.is_dir() {
        return Err(KaraokeError::OutputNotFound {
            dir: dir.to_path_buf(),
            missing: "stem folder".into(),
        });
    }
    let mut files = audio_files(dir, since);
    files.sort_by_key(|p| (!has_extension(p, &["wav"]), p.clone()));

    let mut stems = BTreeMap::new();
    let mut extras = Vec::new();
    for path in files {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(StemName::from_file_stem);
        match name {
            Some(stem) if !stems.contains_key(&stem) => {
                debug!(%stem, path = %path.display(), "found stem");
                stems.insert(stem, path);
            }
            Some(_) => {}
            None => extras.push(path),
        }
    }

    Ok(StemSet {
        model: model_of(dir),
        directory: dir.to_path_buf(),
        stems,
        extras,
    })
}

/// Resolves and validates the stems written for `basename`. Every stem
/// expected for `mode` must be present.
pub fn resolve_stems(
    output_root: &Path,
    model: &str,
    basename: &str,
    mode: StemMode,
) -> Result<StemSet> {
    resolve_stems_since(output_root, model, basename, mode, None)
}

/// Like [`resolve_stems`], ignoring files older than `since`.
pub fn resolve_stems_since(
    output_root: &Path,
    model: &str,
    basename: &str,
    mode: StemMode,
    since: Option<SystemTime>,
) -> Result<StemSet> {
    let Some(dir) = locate_stem_directory(output_root, model, basename, since) else {
        return Err(KaraokeError::OutputNotFound {
            dir: stem_directory(output_root, model, basename),
            missing: join_names(mode.expected_stems()),
        });
    };

    let set = list_stems_since(&dir, since)?;
    let missing = set.missing(mode);
    if !missing.is_empty() {
        return Err(KaraokeError::OutputNotFound {
            dir,
            missing: join_names(&missing),
        });
    }
    Ok(set)
}

fn join_names(stems: &[StemName]) -> String {
    stems
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
