//! Duration probing through the external media prober, with a native fallback.

use crate::{
    config::Settings,
    error::{KaraokeError, Result},
    io::process::run_tool,
    media::audio::native_duration,
};
use serde::Deserialize;
use std::{path::Path, process::Command};
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct ProbeReport {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    // ffprobe reports numbers as strings
    duration: Option<String>,
}

pub fn parse_probe_json(json: &str) -> Option<f64> {
    let report: ProbeReport = serde_json::from_str(json).ok()?;
    let secs: f64 = report.format?.duration?.trim().parse().ok()?;
    (secs.is_finite() && secs > 0.0).then_some(secs)
}

pub fn probe_command(ffprobe: &Path, path: &Path) -> Command {
    let mut cmd = Command::new(ffprobe);
    cmd.arg("-i")
        .arg(path)
        .args(["-show_entries", "format=duration", "-v", "quiet", "-of", "json"]);
    cmd
}

pub fn probe_duration(path: &Path, settings: &Settings) -> Result<f64> {
    if !path.exists() {
        return Err(KaraokeError::Probe {
            path: path.to_path_buf(),
            reason: "file does not exist".into(),
        });
    }

    match run_tool(&mut probe_command(&settings.tools.ffprobe, path)) {
        Ok(out) if out.success() => {
            if let Some(secs) = parse_probe_json(&out.stdout) {
                debug!(path = %path.display(), secs, "probed duration");
                return Ok(secs);
            }
            warn!(path = %path.display(), "prober returned no duration, decoding natively");
        }
        Ok(out) => {
            warn!(
                path = %path.display(),
                status = %out.exit_description(),
                "prober failed, decoding natively"
            );
        }
        Err(KaraokeError::ToolUnavailable { tool, .. }) => {
            warn!(%tool, "prober unavailable, decoding natively");
        }
        Err(e) => return Err(e),
    }

    let secs = native_duration(path).map_err(|e| KaraokeError::Probe {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if secs > 0.0 {
        Ok(secs)
    } else {
        Err(KaraokeError::Probe {
            path: path.to_path_buf(),
            reason: "no audio frames".into(),
        })
    }
}
