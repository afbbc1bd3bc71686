//! Synchronous invocation of external tools.

use crate::{
    error::{KaraokeError, Result},
    io::progress::{emit_pipeline_progress, PipelineProgress},
};
use std::{
    ffi::OsStr,
    path::Path,
    process::{Command, ExitStatus},
};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Last `n` non-empty stderr lines, for error messages.
    pub fn stderr_tail(&self, n: usize) -> String {
        let lines: Vec<&str> = self
            .stderr
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        let start = lines.len().saturating_sub(n);
        lines[start..].join("\n")
    }

    pub fn exit_description(&self) -> String {
        match self.status.code() {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".into(),
        }
    }
}

pub fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .unwrap_or_else(|| OsStr::new("tool"))
        .to_string_lossy()
        .into_owned()
}

pub fn command_line(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

/// Runs `cmd` to completion, capturing its output. Only a failure to spawn is
/// an error here; callers decide what a non-zero exit means.
pub fn run_tool(cmd: &mut Command) -> Result<ToolOutput> {
    let tool = tool_name(Path::new(cmd.get_program()));
    debug!(command = %command_line(cmd), "running external tool");

    let out = cmd.output().map_err(|source| KaraokeError::ToolUnavailable {
        tool: tool.clone(),
        source,
    })?;

    let output = ToolOutput {
        status: out.status,
        stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
    };

    if output.success() {
        debug!(%tool, "tool finished");
    } else {
        warn!(%tool, status = %output.exit_description(), "tool failed");
    }
    emit_pipeline_progress(PipelineProgress::ToolExited {
        tool,
        success: output.success(),
    });

    Ok(output)
}
