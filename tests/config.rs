use std::{fs, path::PathBuf};
use stem_karaoke_core::{
    config::{CaptureBackend, StemFormat},
    KaraokeError, MixStrategy, Settings, StemMode,
};

#[test]
fn partial_toml_keeps_defaults_for_the_rest() {
    let settings = Settings::from_toml(
        r#"
workspace = "/srv/karaoke"

[tools]
separator = "/opt/demucs/bin/demucs"

[separation]
model = "mdx_extra"
mode = "four_stems"
format = "flac"

[recording]
backend = "pulse"
device = "alsa_input.usb"
"#,
    )
    .unwrap();

    assert_eq!(settings.workspace, PathBuf::from("/srv/karaoke"));
    assert_eq!(settings.tools.separator, PathBuf::from("/opt/demucs/bin/demucs"));
    assert_eq!(settings.tools.fetcher, PathBuf::from("yt-dlp"));
    assert_eq!(settings.separation.model, "mdx_extra");
    assert_eq!(settings.separation.mode, StemMode::FourStems);
    assert_eq!(settings.separation.format, StemFormat::Flac);
    assert_eq!(settings.recording.backend, CaptureBackend::Pulse);
    assert_eq!(settings.recording.sample_rate, 44_100);
    assert_eq!(settings.fetch.search_prefix, "ytsearch1");
    assert_eq!(settings.mix.strategy, MixStrategy::default());
}

#[test]
fn mix_strategy_is_selected_by_kind() {
    let settings = Settings::from_toml(
        r#"
[mix.strategy]
kind = "sample_sum"
"#,
    )
    .unwrap();
    assert_eq!(settings.mix.strategy, MixStrategy::SampleSum);

    let settings = Settings::from_toml(
        r#"
[mix.strategy]
kind = "filter_graph"
instrumental_gain = 0.5
vocal_gain = 2.0
dropout_transition = 3
"#,
    )
    .unwrap();
    assert_eq!(
        settings.mix.strategy,
        MixStrategy::FilterGraph {
            instrumental_gain: 0.5,
            vocal_gain: 2.0,
            dropout_transition: 3
        }
    );
}

#[test]
fn out_of_range_values_are_config_errors() {
    for bad in [
        "[recording]\nchannels = 3",
        "[recording]\nsample_rate = 0",
        "[separation]\nmodel = \"  \"",
        concat!(
            "[mix.strategy]\nkind = \"filter_graph\"\n",
            "instrumental_gain = -1.0\nvocal_gain = 1.0\ndropout_transition = 2"
        ),
    ] {
        assert!(
            matches!(Settings::from_toml(bad), Err(KaraokeError::Config(_))),
            "accepted {bad:?}"
        );
    }
}

#[test]
fn malformed_toml_is_a_config_error() {
    assert!(matches!(
        Settings::from_toml("[tools\nffmpeg ="),
        Err(KaraokeError::Config(_))
    ));
}

#[test]
fn explicit_config_file_is_loaded() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("karaoke.toml");
    fs::write(&path, "[fetch]\naudio_codec = \"wav\"\n").unwrap();

    let settings = Settings::from_file(&path).unwrap();
    assert_eq!(settings.fetch.audio_codec, "wav");

    assert!(matches!(
        Settings::from_file(&tmp.path().join("absent.toml")),
        Err(KaraokeError::Config(_))
    ));
}

#[test]
fn workspace_layout_is_created_under_root() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = Settings::with_workspace(tmp.path().join("ws"));
    settings.ensure_layout().unwrap();

    for dir in [
        settings.uploads_dir(),
        settings.downloads_dir(),
        settings.separated_dir(),
        settings.results_dir(),
        settings.recordings_dir(),
    ] {
        assert!(dir.is_dir(), "{} missing", dir.display());
        assert!(dir.starts_with(&settings.workspace));
    }
    assert_eq!(settings.session_path(), tmp.path().join("ws/session.json"));
}

#[test]
fn stem_format_maps_to_separator_flag() {
    assert_eq!(StemFormat::Wav.separator_flag(), None);
    assert_eq!(StemFormat::Mp3.separator_flag(), Some("--mp3"));
    assert_eq!(StemFormat::Flac.separator_flag(), Some("--flac"));
}
