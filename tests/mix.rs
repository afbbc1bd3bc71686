mod common;

use approx::assert_abs_diff_eq;
use std::fs;
use stem_karaoke_core::{
    combine_stems,
    core::mix::filter_graph,
    mix, read_audio, sum_tracks, write_audio, AudioData, KaraokeError, MixStrategy,
};

fn audio(samples: Vec<f32>, sample_rate: u32, channels: u16) -> AudioData {
    AudioData {
        samples,
        sample_rate,
        channels,
    }
}

#[test]
fn sum_truncates_to_shorter_track() {
    let instrumental = audio(vec![0.1, 0.2, 0.3, 0.4, 0.5], 44_100, 1);
    let vocal = audio(vec![0.5, 0.5, 0.5], 44_100, 1);

    let mixed = sum_tracks(&instrumental, &vocal).unwrap();
    assert_eq!(mixed.samples.len(), 3);
    for (got, want) in mixed.samples.iter().zip([0.6, 0.7, 0.8]) {
        assert_abs_diff_eq!(*got, want, epsilon = 1e-6);
    }
}

#[test]
fn mono_vocal_is_spread_over_stereo_instrumental() {
    let instrumental = audio(vec![0.1, -0.1, 0.2, -0.2, 0.3, -0.3], 44_100, 2);
    let vocal = audio(vec![0.5, 0.25, 0.0, 1.0], 44_100, 1);

    let mixed = sum_tracks(&instrumental, &vocal).unwrap();
    assert_eq!(mixed.channels, 2);
    assert_eq!(mixed.frames(), 3);
    let want = [0.6, 0.4, 0.45, 0.05, 0.3, -0.3];
    for (got, want) in mixed.samples.iter().zip(want) {
        assert_abs_diff_eq!(*got, want, epsilon = 1e-6);
    }
}

#[test]
fn vocal_at_other_rate_is_resampled_to_instrumental_rate() {
    let instrumental = audio(common::tone(0.5, 44_100, 2, 220.0), 44_100, 2);
    let vocal = audio(common::tone(0.5, 48_000, 1, 440.0), 48_000, 1);

    let mixed = sum_tracks(&instrumental, &vocal).unwrap();
    assert_eq!(mixed.sample_rate, 44_100);
    assert_eq!(mixed.channels, 2);
    assert!(mixed.frames() > 0);
    assert!(mixed.frames() <= instrumental.frames());
}

#[test]
fn filter_graph_matches_amix_layout() {
    assert_eq!(
        filter_graph(0.7, 1.5, 2),
        concat!(
            "[0:a]volume=0.7[a0];[1:a]volume=1.5[a1];",
            "[a0][a1]amix=inputs=2:duration=first:dropout_transition=2"
        )
    );
}

#[test]
fn sample_sum_mix_writes_result_once() {
    let (tmp, settings) = common::workspace();
    let instrumental = common::write_tone(&tmp.path().join("no_vocals.wav"), 1.0, 44_100, 2);
    let vocal = common::write_tone(&tmp.path().join("take.wav"), 0.5, 44_100, 1);
    let out = settings.results_dir().join("song_karaoke.wav");

    let result = mix(&instrumental, &vocal, &out, &MixStrategy::SampleSum, &settings).unwrap();

    assert_eq!(result.path, out);
    assert_eq!(result.strategy, MixStrategy::SampleSum);
    assert_abs_diff_eq!(result.duration_secs, 0.5, epsilon = 1e-3);
    let written = read_audio(&out).unwrap();
    assert_eq!(written.channels, 2);
    assert_eq!(written.frames(), 22_050);
}

#[test]
fn mix_rejects_missing_inputs() {
    let (tmp, settings) = common::workspace();
    let instrumental = common::write_tone(&tmp.path().join("no_vocals.wav"), 0.2, 44_100, 2);

    let err = mix(
        &instrumental,
        &tmp.path().join("never-recorded.wav"),
        &tmp.path().join("out.wav"),
        &MixStrategy::SampleSum,
        &settings,
    )
    .unwrap_err();
    assert!(matches!(err, KaraokeError::Mix(_)), "got {err:?}");
}

#[test]
fn four_stems_combine_into_instrumental() {
    let tmp = tempfile::tempdir().unwrap();
    let mk = |name: &str, value: f32| {
        let p = tmp.path().join(name);
        write_audio(&p, &audio(vec![value; 200], 8_000, 2)).unwrap();
        p
    };
    let stems = vec![mk("drums.wav", 0.1), mk("bass.wav", 0.2), mk("other.wav", 0.3)];
    let out = tmp.path().join("instrumental.wav");

    combine_stems(&stems, &out).unwrap();

    let combined = read_audio(&out).unwrap();
    assert_eq!(combined.frames(), 100);
    for s in &combined.samples {
        assert_abs_diff_eq!(*s, 0.6, epsilon = 1e-3);
    }
    assert!(combine_stems(&[], &out).is_err());
}

#[cfg(unix)]
#[test]
fn filter_graph_mix_invokes_media_tool() {
    let (tmp, mut settings) = common::workspace();
    let args_log = tmp.path().join("ffmpeg.args");
    settings.tools.ffmpeg = common::fake_tool(
        &tmp.path().join("bin"),
        "ffmpeg",
        &format!(
            r#"printf '%s\n' "$@" > "{log}"
first=""
while [ $# -gt 0 ]; do
  case "$1" in
    -i) [ -z "$first" ] && first="$2"; shift 2;;
    *) last="$1"; shift;;
  esac
done
cp "$first" "$last""#,
            log = args_log.display()
        ),
    );
    let instrumental = common::write_tone(&tmp.path().join("no_vocals.wav"), 1.0, 44_100, 2);
    let vocal = common::write_tone(&tmp.path().join("take.wav"), 0.5, 44_100, 1);
    let out = settings.results_dir().join("mix.wav");

    let result = mix(&instrumental, &vocal, &out, &MixStrategy::default(), &settings).unwrap();

    // duration=first: the instrumental decides the length
    assert_abs_diff_eq!(result.duration_secs, 1.0, epsilon = 1e-3);
    let args = fs::read_to_string(&args_log).unwrap();
    assert!(args.contains("-filter_complex"));
    assert!(args.contains("amix=inputs=2:duration=first:dropout_transition=2"));
    assert!(args.contains("volume=0.7"));
    assert!(args.contains("volume=1.5"));
}

#[cfg(unix)]
#[test]
fn filter_graph_mix_failure_is_mix_error() {
    let (tmp, mut settings) = common::workspace();
    settings.tools.ffmpeg = common::fake_tool(
        &tmp.path().join("bin"),
        "ffmpeg",
        "echo 'Invalid data found when processing input' >&2\nexit 1",
    );
    let instrumental = common::write_tone(&tmp.path().join("no_vocals.wav"), 0.2, 44_100, 2);
    let vocal = common::write_tone(&tmp.path().join("take.wav"), 0.2, 44_100, 1);

    let err = mix(
        &instrumental,
        &vocal,
        &tmp.path().join("out.wav"),
        &MixStrategy::default(),
        &settings,
    )
    .unwrap_err();
    match err {
        KaraokeError::Mix(msg) => assert!(msg.contains("Invalid data"), "{msg}"),
        other => panic!("expected mix error, got {other:?}"),
    }
}
