mod common;

use approx::assert_abs_diff_eq;
use httpmock::prelude::*;
use std::fs;
use stem_karaoke_core::{
    acquire, find_previous_download, import_upload, KaraokeError, TrackOrigin,
};

#[test]
fn direct_audio_url_is_downloaded_and_probed() {
    let (tmp, settings) = common::workspace();
    let fixture = common::write_tone(&tmp.path().join("fixture.wav"), 1.0, 44_100, 2);
    let body = fs::read(&fixture).unwrap();

    let server = MockServer::start();
    let song = server.mock(|when, then| {
        when.method(GET).path("/media/song.wav");
        then.status(200)
            .header("Content-Length", body.len().to_string().as_str())
            .body(body.clone());
    });

    let url = format!("{}/media/song.wav", server.base_url());
    let track = acquire(&url, &settings).expect("direct download failed");

    song.assert_hits(1);
    assert_eq!(track.path, settings.downloads_dir().join("song.wav"));
    assert_abs_diff_eq!(track.duration_secs, 1.0, epsilon = 1e-3);
    assert_eq!(
        track.origin,
        TrackOrigin::Download {
            identifier: url.clone()
        }
    );
    assert!(!settings.downloads_dir().join("song.part").exists());
}

#[test]
fn direct_audio_url_http_error_is_acquisition_error() {
    let (_tmp, settings) = common::workspace();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/gone.mp3");
        then.status(404);
    });

    let err = acquire(&format!("{}/gone.mp3", server.base_url()), &settings).unwrap_err();
    assert!(matches!(err, KaraokeError::Acquisition { .. }), "got {err:?}");
}

#[test]
fn downloaded_garbage_is_unsupported() {
    let (_tmp, settings) = common::workspace();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/fake.mp3");
        then.status(200).body("<html>not audio</html>");
    });

    let err = acquire(&format!("{}/fake.mp3", server.base_url()), &settings).unwrap_err();
    assert!(matches!(err, KaraokeError::UnsupportedFormat { .. }), "got {err:?}");
}

#[test]
fn empty_identifier_is_rejected() {
    let (_tmp, settings) = common::workspace();
    assert!(matches!(
        acquire("   ", &settings),
        Err(KaraokeError::Acquisition { .. })
    ));
}

#[cfg(unix)]
#[test]
fn search_term_goes_through_fetcher() {
    let (tmp, mut settings) = common::workspace();
    let fixture = common::write_tone(&tmp.path().join("fixture.wav"), 0.5, 44_100, 2);
    settings.tools.fetcher = common::fake_fetcher(&tmp.path().join("bin"), &fixture, "Fake Song");
    settings.fetch.audio_codec = "wav".into();

    let track = acquire("never gonna give you up", &settings).expect("fetch failed");

    assert_eq!(track.path, settings.downloads_dir().join("Fake Song.wav"));
    assert_abs_diff_eq!(track.duration_secs, 0.5, epsilon = 1e-3);
    let query = fs::read_to_string(settings.downloads_dir().join(".query")).unwrap();
    assert_eq!(query, "ytsearch1:never gonna give you up");
}

#[cfg(unix)]
#[test]
fn page_url_is_passed_through_unchanged() {
    let (tmp, mut settings) = common::workspace();
    let fixture = common::write_tone(&tmp.path().join("fixture.wav"), 0.5, 44_100, 2);
    settings.tools.fetcher = common::fake_fetcher(&tmp.path().join("bin"), &fixture, "Clip");

    acquire("https://youtu.be/dQw4w9WgXcQ", &settings).unwrap();
    let query = fs::read_to_string(settings.downloads_dir().join(".query")).unwrap();
    assert_eq!(query, "https://youtu.be/dQw4w9WgXcQ");
}

#[cfg(unix)]
#[test]
fn fetcher_without_output_means_no_results() {
    let (tmp, mut settings) = common::workspace();
    settings.tools.fetcher = common::fake_tool(&tmp.path().join("bin"), "yt-dlp", "exit 0");

    let err = acquire("zzzz no such song", &settings).unwrap_err();
    assert!(matches!(err, KaraokeError::NoResults(ref q) if q == "zzzz no such song"));
}

#[cfg(unix)]
#[test]
fn fetcher_failure_reports_stderr() {
    let (tmp, mut settings) = common::workspace();
    settings.tools.fetcher = common::fake_tool(
        &tmp.path().join("bin"),
        "yt-dlp",
        "echo 'ERROR: Unable to download webpage' >&2\nexit 1",
    );

    let err = acquire("https://www.youtube.com/watch?v=x", &settings).unwrap_err();
    match err {
        KaraokeError::Acquisition { reason, .. } => {
            assert!(reason.contains("Unable to download webpage"), "{reason}")
        }
        other => panic!("expected acquisition error, got {other:?}"),
    }
}

#[cfg(unix)]
#[test]
fn pre_transcode_name_falls_back_to_codec_extension() {
    let (tmp, mut settings) = common::workspace();
    let fixture = common::write_tone(&tmp.path().join("fixture.wav"), 0.25, 22_050, 1);
    let downloads = settings.downloads_dir();
    settings.tools.fetcher = common::fake_tool(
        &tmp.path().join("bin"),
        "yt-dlp",
        &format!(
            "cp \"{}\" \"{}/Song.wav\"\necho \"{}/Song.webm\"",
            fixture.display(),
            downloads.display(),
            downloads.display()
        ),
    );
    settings.fetch.audio_codec = "wav".into();

    let track = acquire("song", &settings).unwrap();
    assert_eq!(track.path, downloads.join("Song.wav"));
}

#[cfg(unix)]
#[test]
fn missing_fetcher_binary_is_tool_unavailable() {
    let (tmp, mut settings) = common::workspace();
    settings.tools.fetcher = tmp.path().join("no-such-fetcher");

    let err = acquire("anything", &settings).unwrap_err();
    assert!(matches!(err, KaraokeError::ToolUnavailable { .. }), "got {err:?}");
}

#[test]
fn upload_is_copied_into_uploads() {
    let (tmp, settings) = common::workspace();
    let original = common::write_tone(&tmp.path().join("incoming/My Song.wav"), 0.5, 44_100, 2);

    let track = import_upload(&original, &settings).unwrap();
    assert_eq!(track.path, settings.uploads_dir().join("My Song.wav"));
    assert!(track.path.exists());
    assert_abs_diff_eq!(track.duration_secs, 0.5, epsilon = 1e-3);
    assert_eq!(track.basename(), "My Song");

    // same content again reuses the copy
    let again = import_upload(&original, &settings).unwrap();
    assert_eq!(again.path, track.path);
}

#[test]
fn upload_name_clash_gets_numbered() {
    let (tmp, settings) = common::workspace();
    let first = common::write_tone(&tmp.path().join("a/take.wav"), 0.5, 44_100, 1);
    let second = common::write_tone(&tmp.path().join("b/take.wav"), 0.75, 44_100, 1);

    let t1 = import_upload(&first, &settings).unwrap();
    let t2 = import_upload(&second, &settings).unwrap();
    assert_eq!(t1.path, settings.uploads_dir().join("take.wav"));
    assert_eq!(t2.path, settings.uploads_dir().join("take (1).wav"));
}

#[test]
fn upload_rejects_other_formats() {
    let (tmp, settings) = common::workspace();
    let notes = tmp.path().join("notes.txt");
    fs::write(&notes, "la la la").unwrap();

    assert!(matches!(
        import_upload(&notes, &settings),
        Err(KaraokeError::UnsupportedFormat { .. })
    ));
    assert!(matches!(
        import_upload(&tmp.path().join("missing.mp3"), &settings),
        Err(KaraokeError::Acquisition { .. })
    ));
}

#[test]
fn previous_download_matches_case_insensitively() {
    let (_tmp, settings) = common::workspace();
    let dl = settings.downloads_dir();
    common::write_tone(&dl.join("Queen - Bohemian Rhapsody.mp3"), 0.1, 8_000, 1);
    fs::write(dl.join("bohemian notes.txt"), "x").unwrap();

    let found = find_previous_download("bohemian", &settings).unwrap();
    assert_eq!(found, Some(dl.join("Queen - Bohemian Rhapsody.mp3")));
    assert_eq!(find_previous_download("abba", &settings).unwrap(), None);
    assert_eq!(find_previous_download("  ", &settings).unwrap(), None);
}
