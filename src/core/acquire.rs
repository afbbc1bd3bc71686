//! Turning a user identifier (page URL, direct audio URL, search term or local
//! file) into a [`SourceTrack`] inside the workspace.

use crate::{
    config::Settings,
    error::{KaraokeError, Result},
    io::{
        crypto::same_content,
        net::{download_with_progress, http_client},
        paths::{has_extension, sanitize_file_name, AUDIO_EXTENSIONS},
        process::run_tool,
    },
    media::probe::probe_duration,
    types::{SourceTrack, TrackOrigin},
};
use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, info, warn};

pub const UPLOAD_EXTENSIONS: &[&str] = &["mp3", "wav"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Identifier {
    /// A page the fetcher knows how to extract audio from.
    PageUrl(String),
    /// A URL pointing straight at an audio file.
    DirectUrl(String),
    /// Free text, resolved through the fetcher's search.
    Search(String),
}

impl Identifier {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(KaraokeError::Acquisition {
                identifier: String::new(),
                reason: "empty identifier".into(),
            });
        }

        if !is_url(input) {
            return Ok(Identifier::Search(input.to_string()));
        }

        let lower = input.to_ascii_lowercase();
        let is_page_host = lower.contains("youtube.com") || lower.contains("youtu.be");
        if !is_page_host && has_extension(Path::new(url_path(input)), AUDIO_EXTENSIONS) {
            Ok(Identifier::DirectUrl(input.to_string()))
        } else {
            Ok(Identifier::PageUrl(input.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Identifier::PageUrl(s) | Identifier::DirectUrl(s) | Identifier::Search(s) => s,
        }
    }

    /// What the fetcher receives: URLs as-is, search terms behind the search prefix.
    pub fn fetcher_query(&self, settings: &Settings) -> String {
        match self {
            Identifier::Search(term) => format!("{}:{}", settings.fetch.search_prefix, term),
            other => other.as_str().to_string(),
        }
    }
}

pub fn is_url(input: &str) -> bool {
    let lower = input.trim().to_ascii_lowercase();
    lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.contains("youtube.com")
        || lower.contains("youtu.be")
}

fn url_path(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

pub fn fetch_command(identifier: &Identifier, settings: &Settings) -> Command {
    let fetch = &settings.fetch;
    let template = settings.downloads_dir().join(&fetch.output_template);

    let mut cmd = Command::new(&settings.tools.fetcher);
    cmd.args(["-f", &fetch.format])
        .arg("-x")
        .args(["--audio-format", &fetch.audio_codec])
        .args(["--audio-quality", &fetch.audio_quality])
        .arg("--no-playlist")
        .arg("-o")
        .arg(template)
        .args(["--print", "after_move:filepath"])
        .arg("--no-simulate")
        .arg("--no-progress");
    if let Some(cookies) = &fetch.cookies {
        cmd.arg("--cookies").arg(cookies);
    }
    cmd.arg(identifier.fetcher_query(settings));
    cmd
}

/// The pre-transcode name with its container extension swapped for the
/// preferred codec's.
pub fn transcoded_path(path: &Path, codec: &str) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("webm") || ext.eq_ignore_ascii_case("m4a") => {
            path.with_extension(codec)
        }
        _ => path.to_path_buf(),
    }
}

pub fn acquire(input: &str, settings: &Settings) -> Result<SourceTrack> {
    let identifier = Identifier::parse(input)?;
    settings.ensure_layout()?;
    info!(identifier = identifier.as_str(), "acquiring track");

    let path = match &identifier {
        Identifier::DirectUrl(url) => download_direct(url, settings)?,
        _ => fetch_with_tool(&identifier, settings)?,
    };

    let duration_secs = probe_duration(&path, settings).map_err(|e| {
        warn!(path = %path.display(), error = %e, "downloaded file is not readable audio");
        KaraokeError::UnsupportedFormat { path: path.clone() }
    })?;

    info!(path = %path.display(), duration_secs, "track acquired");
    Ok(SourceTrack {
        path,
        duration_secs,
        origin: TrackOrigin::Download {
            identifier: identifier.as_str().to_string(),
        },
    })
}

fn fetch_with_tool(identifier: &Identifier, settings: &Settings) -> Result<PathBuf> {
    let out = run_tool(&mut fetch_command(identifier, settings))?;
    if !out.success() {
        return Err(KaraokeError::Acquisition {
            identifier: identifier.as_str().to_string(),
            reason: format!(
                "{} failed ({}): {}",
                settings.tools.fetcher.display(),
                out.exit_description(),
                out.stderr_tail(5)
            ),
        });
    }

    let reported = out
        .stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .map(PathBuf::from);

    let Some(reported) = reported else {
        return Err(KaraokeError::NoResults(identifier.as_str().to_string()));
    };
    debug!(path = %reported.display(), "fetcher reported file");

    if reported.exists() {
        return Ok(reported);
    }
    let transcoded = transcoded_path(&reported, &settings.fetch.audio_codec);
    if transcoded.exists() {
        return Ok(transcoded);
    }

    Err(KaraokeError::Acquisition {
        identifier: identifier.as_str().to_string(),
        reason: format!("fetcher reported {} but no such file exists", reported.display()),
    })
}

fn download_direct(url: &str, settings: &Settings) -> Result<PathBuf> {
    let name = Path::new(url_path(url))
        .file_name()
        .map(|n| sanitize_file_name(&n.to_string_lossy()))
        .unwrap_or_else(|| "track".into());
    let dest = settings.downloads_dir().join(name);

    let client = http_client()?;
    download_with_progress(&client, url, &dest).map_err(|e| KaraokeError::Acquisition {
        identifier: url.to_string(),
        reason: e.to_string(),
    })?;
    Ok(dest)
}

/// Copies a local file into the uploads directory. Re-importing identical
/// content reuses the existing copy; a different file with the same name gets
/// a numbered name.
pub fn import_upload(path: &Path, settings: &Settings) -> Result<SourceTrack> {
    if !path.is_file() {
        return Err(KaraokeError::Acquisition {
            identifier: path.display().to_string(),
            reason: "file not found".into(),
        });
    }
    if !has_extension(path, UPLOAD_EXTENSIONS) {
        return Err(KaraokeError::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    }
    settings.ensure_layout()?;

    let file_name = path
        .file_name()
        .map(|n| sanitize_file_name(&n.to_string_lossy()))
        .unwrap_or_else(|| "upload".into());
    let dest = unique_destination(&settings.uploads_dir(), &file_name, path)?;

    if !dest.exists() {
        fs::copy(path, &dest)?;
        info!(from = %path.display(), to = %dest.display(), "file uploaded");
    } else {
        debug!(path = %dest.display(), "identical upload already present");
    }

    let duration_secs = probe_duration(&dest, settings)
        .map_err(|_| KaraokeError::UnsupportedFormat { path: dest.clone() })?;

    Ok(SourceTrack {
        path: dest,
        duration_secs,
        origin: TrackOrigin::Upload {
            original: path.to_path_buf(),
        },
    })
}

fn unique_destination(dir: &Path, file_name: &str, source: &Path) -> Result<PathBuf> {
    let candidate = dir.join(file_name);
    if !candidate.exists() || same_content(&candidate, source)? {
        return Ok(candidate);
    }

    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".into());
    let ext = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();

    for n in 1.. {
        let candidate = dir.join(format!("{stem} ({n}).{ext}"));
        if !candidate.exists() || same_content(&candidate, source)? {
            return Ok(candidate);
        }
    }
    unreachable!("exhausted upload names")
}

/// Finds an earlier download whose file name contains `query`, ignoring case.
pub fn find_previous_download(query: &str, settings: &Settings) -> Result<Option<PathBuf>> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Ok(None);
    }
    let dir = settings.downloads_dir();
    if !dir.is_dir() {
        return Ok(None);
    }

    let mut matches: Vec<PathBuf> = fs::read_dir(&dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && has_extension(p, AUDIO_EXTENSIONS))
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().to_lowercase().contains(&query))
                .unwrap_or(false)
        })
        .collect();
    matches.sort();
    Ok(matches.into_iter().next())
}

/// Builds a [`SourceTrack`] for a file that is already in the workspace.
pub fn select_existing(path: &Path, identifier: &str, settings: &Settings) -> Result<SourceTrack> {
    let duration_secs = probe_duration(path, settings)
        .map_err(|_| KaraokeError::UnsupportedFormat { path: path.to_path_buf() })?;
    Ok(SourceTrack {
        path: path.to_path_buf(),
        duration_secs,
        origin: TrackOrigin::Download {
            identifier: identifier.to_string(),
        },
    })
}
