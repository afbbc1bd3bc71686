#![allow(dead_code)]

use std::{
    f32::consts::PI,
    fs,
    path::{Path, PathBuf},
};
use stem_karaoke_core::Settings;
use tempfile::TempDir;

/// Settings rooted in a fresh temp dir. The prober points nowhere so durations
/// come from the native decoder.
pub fn workspace() -> (TempDir, Settings) {
    let tmp = tempfile::tempdir().unwrap();
    let mut settings = Settings::with_workspace(tmp.path().join("ws"));
    settings.tools.ffprobe = tmp.path().join("missing-ffprobe");
    settings.ensure_layout().unwrap();
    (tmp, settings)
}

pub fn tone(secs: f32, sample_rate: u32, channels: u16, freq: f32) -> Vec<f32> {
    let frames = (secs * sample_rate as f32) as usize;
    let mut samples = Vec::with_capacity(frames * channels as usize);
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let s = (2.0 * PI * freq * t).sin() * 0.2;
        for _ in 0..channels {
            samples.push(s);
        }
    }
    samples
}

pub fn write_tone(path: &Path, secs: f32, sample_rate: u32, channels: u16) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut w = hound::WavWriter::create(path, spec).unwrap();
    for s in tone(secs, sample_rate, channels, 440.0) {
        w.write_sample((s * i16::MAX as f32) as i16).unwrap();
    }
    w.finalize().unwrap();
    path.to_path_buf()
}

/// Writes an executable `/bin/sh` script standing in for an external tool.
#[cfg(unix)]
pub fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A separator that writes `<out>/<model>/<name>/<stem>.<ext>` copies of its input,
/// like demucs does.
#[cfg(unix)]
pub fn fake_separator(dir: &Path) -> PathBuf {
    fake_tool(
        dir,
        "demucs",
        r#"two=""; model="htdemucs"; out="separated"; ext="wav"
while [ $# -gt 0 ]; do
  case "$1" in
    --two-stems) two="$2"; shift 2;;
    -n) model="$2"; shift 2;;
    -o) out="$2"; shift 2;;
    --mp3) ext="mp3"; shift;;
    --flac) ext="flac"; shift;;
    *) input="$1"; shift;;
  esac
done
name=$(basename "$input"); name="${name%.*}"
dir="$out/$model/$name"
mkdir -p "$dir"
if [ -n "$two" ]; then stems="$two no_$two"; else stems="vocals drums bass other"; fi
for s in $stems; do cp "$input" "$dir/$s.$ext"; done
echo "Separated tracks will be stored in $out/$model" >&2"#,
    )
}

/// A fetcher that copies `fixture` into the `-o` directory as `<title>.wav`
/// and prints the final path, like `--print after_move:filepath`.
#[cfg(unix)]
pub fn fake_fetcher(dir: &Path, fixture: &Path, title: &str) -> PathBuf {
    fake_tool(
        dir,
        "yt-dlp",
        &format!(
            r#"out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2;;
    *) last="$1"; shift;;
  esac
done
target=$(dirname "$out")
printf '%s' "$last" > "$target/.query"
cp "{fixture}" "$target/{title}.wav"
echo "$target/{title}.wav""#,
            fixture = fixture.display(),
        ),
    )
}
