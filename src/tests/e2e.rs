//! Whole-export scenarios against a fake encoder and a temporary directory

use std::path::Path;

use tempfile::TempDir;

use super::fixtures::{FailingEncoder, FakeEncoder, SilentEncoder};
use crate::config::{ExportTarget, SegmentType};
use crate::descriptor::Representation;
use crate::encoder::Encoder;
use crate::error::{EncoderError, ExportError};
use crate::export::{ExportState, Exporter};
use crate::format::{AudioSpec, FixedValues, FormatSpec, MediaType, SegmentTemplate};
use crate::source::{MediaSource, SourceInfo};
use crate::storage::LocalDisk;

fn exporter(dir: &TempDir, target: ExportTarget, encoder: impl Encoder + 'static) -> Exporter {
    let source = MediaSource::with_info("/media/video.mp4", SourceInfo::audio_video());
    let mut exporter = Exporter::new(source, target);
    exporter
        .to_storage(LocalDisk::new(dir.path()))
        .unwrap()
        .with_encoder(encoder)
        .unwrap()
        .segment_length(4)
        .unwrap();
    exporter
}

fn ladder(exporter: &mut Exporter, bitrates: &[u32]) {
    for &kbps in bitrates {
        exporter.add_representation(FormatSpec::x264(kbps)).unwrap();
    }
}

fn read(dir: &TempDir, name: &str) -> String {
    std::fs::read_to_string(dir.path().join(name)).unwrap()
}

/// Representation ids in the order they appear in an MPD
fn representation_ids(mpd: &str) -> Vec<String> {
    regex::Regex::new(r#"<Representation id="(\d+)""#)
        .unwrap()
        .captures_iter(mpd)
        .map(|c| c[1].to_string())
        .collect()
}

#[test]
fn test_dash_ladder_with_default_names() {
    let dir = TempDir::new().unwrap();
    let encoder = FakeEncoder::new(4, 10);
    let calls = encoder.calls.clone();
    let mut e = exporter(&dir, ExportTarget::Dash, encoder);
    ladder(&mut e, &[250, 1000, 4000]);

    let outcome = e.save("adaptive.mpd").unwrap();
    assert_eq!(calls.get(), 1);
    assert_eq!(e.state(), ExportState::Committed);
    assert_eq!(outcome.master_path, dir.path().join("adaptive.mpd"));
    assert_eq!(
        outcome.sub_manifests,
        vec![
            dir.path().join("adaptive_0_250.mpd"),
            dir.path().join("adaptive_1_1000.mpd"),
            dir.path().join("adaptive_2_4000.mpd"),
        ]
    );
    for path in &outcome.sub_manifests {
        assert!(path.exists());
    }

    let mpd = read(&dir, "adaptive.mpd");
    assert_eq!(representation_ids(&mpd), vec!["0", "1", "2"]);
    assert!(mpd.contains("type=\"static\""));
    assert!(mpd.contains("mediaPresentationDuration=\"PT10.000S\""));
    assert!(mpd.contains("media=\"adaptive_0_250_0_$Number%05d$.m4s\""));
    assert!(mpd.contains("media=\"adaptive_2_4000_0_$Number%05d$.m4s\""));
    assert!(mpd.contains("initialization=\"adaptive_0_250_init_0.m4s\""));
    assert!(mpd.contains("initialization=\"adaptive_2_4000_init_0.m4s\""));
    assert!(mpd.contains("<S t=\"0\" d=\"4000\" r=\"1\"/>"));
    assert!(mpd.contains("<S d=\"2000\"/>"));

    // First segment of the lowest rung, as a player would expand it
    let template = SegmentTemplate::parse_media("adaptive_0_250_0_$Number%05d$.m4s").unwrap();
    let values = FixedValues {
        representation_id: "0",
        bandwidth: 250_000,
        ext: "m4s",
    };
    assert_eq!(template.expand(&values, 1, 0), "adaptive_0_250_0_00001.m4s");
}

fn assert_unique(written: &[std::path::PathBuf]) {
    let mut seen = std::collections::HashSet::new();
    for path in written {
        assert!(seen.insert(path), "{} written twice", path.display());
    }
}

#[test]
fn test_dash_outputs_write_distinct_files() {
    let dir = TempDir::new().unwrap();
    let encoder = FakeEncoder::new(4, 10);
    let written = encoder.written.clone();
    let mut e = exporter(&dir, ExportTarget::Dash, encoder);
    ladder(&mut e, &[250, 1000, 4000]);
    e.save("adaptive.mpd").unwrap();

    let written = written.borrow();
    // three outputs, each with a video and an audio stream of one init and three segments
    assert_eq!(written.len(), 3 * 2 * 4);
    assert_unique(&written);
    assert!(written.contains(&dir.path().join("adaptive_1_1000_1_00003.m4s")));
    assert!(written.contains(&dir.path().join("adaptive_1_1000_init_1.m4s")));
}

#[test]
fn test_hls_outputs_write_distinct_files() {
    let dir = TempDir::new().unwrap();
    let encoder = FakeEncoder::new(4, 10);
    let written = encoder.written.clone();
    let mut e = exporter(&dir, ExportTarget::Hls, encoder);
    ladder(&mut e, &[250, 1000]);
    e.save("adaptive.m3u8").unwrap();

    let written = written.borrow();
    assert_eq!(written.len(), 2 * 4);
    assert_unique(&written);
    assert!(written.contains(&dir.path().join("adaptive_0_250_init.mp4")));
}

#[test]
fn test_nested_sub_manifests_resolve_from_master() {
    let dir = TempDir::new().unwrap();
    let encoder = FakeEncoder::new(4, 8);
    let written = encoder.written.clone();
    let mut e = exporter(&dir, ExportTarget::Dash, encoder);
    e.segment_naming(
        |_: &str, r: &Representation, _: usize, ctx: &crate::naming::NamingContext| crate::naming::SegmentNames {
            segment_pattern: format!("seg_$RepresentationID$_$Number$.{}", ctx.segment_ext),
            sub_manifest_path: format!("{}k/stream.{}", r.format().bitrate_kbps(), ctx.manifest_ext),
            init_pattern: Some(format!("init_$RepresentationID$.{}", ctx.segment_ext)),
        },
    )
    .unwrap();
    ladder(&mut e, &[250, 1000]);
    e.save("adaptive.mpd").unwrap();

    let written = written.borrow();
    assert_unique(&written);
    assert!(written.contains(&dir.path().join("250k/seg_0_1.m4s")));
    assert!(written.contains(&dir.path().join("1000k/init_1.m4s")));

    // Every name the master advertises resolves, against its BaseURL, to a written file
    let mpd = read(&dir, "adaptive.mpd");
    assert!(mpd.contains("<BaseURL>250k/</BaseURL>"));
    assert!(mpd.contains("<BaseURL>1000k/</BaseURL>"));
    let reps = regex::Regex::new(r#"<BaseURL>([^<]*)</BaseURL>\s*<SegmentTemplate[^>]*initialization="([^"]*)" media="([^"]*)""#).unwrap();
    let mut resolved = 0;
    for caps in reps.captures_iter(&mpd) {
        let base = dir.path().join(&caps[1]);
        assert!(written.contains(&base.join(&caps[2])));
        assert!(written.contains(&base.join(caps[3].replace("$Number$", "1"))));
        resolved += 1;
    }
    assert_eq!(resolved, 2);
}

#[test]
fn test_representations_emitted_by_ascending_bitrate() {
    let dir = TempDir::new().unwrap();
    let mut e = exporter(&dir, ExportTarget::Dash, FakeEncoder::new(4, 8));
    ladder(&mut e, &[4000, 250, 1000]);
    e.save("adaptive.mpd").unwrap();

    let mpd = read(&dir, "adaptive.mpd");
    // ids keep registration ordinals, emission follows bitrate
    assert_eq!(representation_ids(&mpd), vec!["1", "2", "0"]);
    let low = mpd.find("bandwidth=\"250000\"").unwrap();
    let mid = mpd.find("bandwidth=\"1000000\"").unwrap();
    let high = mpd.find("bandwidth=\"4000000\"").unwrap();
    assert!(low < mid && mid < high);
    assert_eq!(mpd.matches("<AdaptationSet").count(), 1);
}

#[test]
fn test_equal_bitrates_keep_registration_order() {
    let dir = TempDir::new().unwrap();
    let mut e = exporter(&dir, ExportTarget::Dash, FakeEncoder::new(4, 8));
    e.add_representation(FormatSpec::x264(1000).with_resolution(1280, 720))
        .unwrap()
        .add_representation(FormatSpec::x264(500))
        .unwrap()
        .add_representation(
            Representation::new(FormatSpec::x264(1000).with_resolution(960, 540))
                .with_segment_template("alt_$RepresentationID$_$Number$.m4s")
                .unwrap(),
        )
        .unwrap();
    e.save("adaptive.mpd").unwrap();
    assert_eq!(representation_ids(&read(&dir, "adaptive.mpd")), vec!["1", "0", "2"]);
}

#[test]
fn test_synthesis_is_deterministic() {
    let render = |target: ExportTarget, master: &str| {
        let dir = TempDir::new().unwrap();
        let mut e = exporter(&dir, target, FakeEncoder::new(4, 10));
        ladder(&mut e, &[250, 1000]);
        e.add_representation(FormatSpec::Audio(AudioSpec::aac(96))).unwrap();
        e.save(master).unwrap();
        read(&dir, master)
    };
    assert_eq!(render(ExportTarget::Dash, "a.mpd"), render(ExportTarget::Dash, "a.mpd"));
    assert_eq!(render(ExportTarget::Hls, "a.m3u8"), render(ExportTarget::Hls, "a.m3u8"));
}

#[test]
fn test_empty_export_never_invokes_encoder() {
    let dir = TempDir::new().unwrap();
    let encoder = FakeEncoder::new(4, 10);
    let calls = encoder.calls.clone();
    let mut e = exporter(&dir, ExportTarget::Dash, encoder);

    let err = e.save("adaptive.mpd").unwrap_err();
    assert!(matches!(err, ExportError::EmptyExport));
    assert_eq!(calls.get(), 0);
    assert_eq!(e.state(), ExportState::Accumulating);
    assert!(!dir.path().join("adaptive.mpd").exists());
}

#[test]
fn test_static_template_rejected_at_registration() {
    let err = Representation::new(FormatSpec::x264(250))
        .with_segment_template("adaptive_0_250.m4s")
        .unwrap_err();
    assert!(matches!(err, ExportError::Configuration(_)));
}

#[test]
fn test_resolver_pattern_validated_before_encoding() {
    let dir = TempDir::new().unwrap();
    let encoder = FakeEncoder::new(4, 10);
    let calls = encoder.calls.clone();
    let mut e = exporter(&dir, ExportTarget::Dash, encoder);
    e.segment_naming(
        |base: &str, _: &Representation, ordinal: usize, ctx: &crate::naming::NamingContext| {
            crate::naming::SegmentNames {
                segment_pattern: format!("{}_{}.m4s", base, ordinal),
                sub_manifest_path: format!("{}_{}.{}", base, ordinal, ctx.manifest_ext),
                init_pattern: None,
            }
        },
    )
    .unwrap();
    ladder(&mut e, &[250]);

    let err = e.save("adaptive.mpd").unwrap_err();
    assert!(matches!(err, ExportError::Configuration(_)));
    assert_eq!(calls.get(), 0);
}

#[test]
fn test_mismatched_segment_durations() {
    let dir = TempDir::new().unwrap();
    let encoder = FakeEncoder::new(4, 12).with_override(1, 6, 12);
    let mut e = exporter(&dir, ExportTarget::Dash, encoder);
    ladder(&mut e, &[250, 1000]);

    match e.save("adaptive.mpd").unwrap_err() {
        ExportError::InconsistentTimeline {
            media_type,
            expected_id,
            expected,
            found_id,
            found,
        } => {
            assert_eq!(media_type, MediaType::Video);
            assert_eq!(expected_id, 0);
            assert_eq!(expected, "4.000s");
            assert_eq!(found_id, 1);
            assert_eq!(found, "6.000s");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!dir.path().join("adaptive.mpd").exists());
}

#[test]
fn test_shorter_representation_ends_early() {
    let dir = TempDir::new().unwrap();
    let encoder = FakeEncoder::new(4, 10).with_override(1, 4, 9);
    let mut e = exporter(&dir, ExportTarget::Dash, encoder);
    ladder(&mut e, &[250, 1000]);
    e.save("adaptive.mpd").unwrap();

    let mpd = read(&dir, "adaptive.mpd");
    assert!(mpd.contains("mediaPresentationDuration=\"PT10.000S\""));
    assert!(mpd.contains("<S d=\"1000\"/>"));
}

#[test]
fn test_encoder_failure_writes_no_master() {
    let dir = TempDir::new().unwrap();
    let encoder = FailingEncoder::new();
    let calls = encoder.calls.clone();
    let mut e = exporter(&dir, ExportTarget::Dash, encoder);
    ladder(&mut e, &[250, 1000]);

    let err = e.save("adaptive.mpd").unwrap_err();
    assert!(matches!(err, ExportError::Encoder(EncoderError::Failed { .. })));
    assert_eq!(calls.get(), 1);
    assert!(!dir.path().join("adaptive.mpd").exists());

    // The invocation was issued, so the export is spent
    assert!(matches!(e.save("adaptive.mpd"), Err(ExportError::AlreadyCommitted)));
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_no_changes_after_commit() {
    let dir = TempDir::new().unwrap();
    let mut e = exporter(&dir, ExportTarget::Dash, FakeEncoder::new(4, 8));
    ladder(&mut e, &[250]);
    e.save("adaptive.mpd").unwrap();

    assert!(matches!(
        e.add_representation(FormatSpec::x264(1000)),
        Err(ExportError::AlreadyCommitted)
    ));
    assert!(matches!(e.segment_length(2), Err(ExportError::AlreadyCommitted)));
    assert!(matches!(e.command("adaptive.mpd"), Err(ExportError::AlreadyCommitted)));
}

#[test]
fn test_missing_sub_manifest() {
    let dir = TempDir::new().unwrap();
    let mut e = exporter(&dir, ExportTarget::Dash, SilentEncoder);
    ladder(&mut e, &[250]);

    match e.save("adaptive.mpd").unwrap_err() {
        ExportError::ManifestRead { path, .. } => {
            assert_eq!(path, dir.path().join("adaptive_0_250.mpd"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!dir.path().join("adaptive.mpd").exists());
}

#[test]
fn test_dash_audio_set_follows_video() {
    let dir = TempDir::new().unwrap();
    let mut e = exporter(&dir, ExportTarget::Dash, FakeEncoder::new(4, 8));
    e.add_representation(FormatSpec::Audio(AudioSpec::aac(128)))
        .unwrap()
        .add_representation(FormatSpec::x264(1000))
        .unwrap();
    e.save("adaptive.mpd").unwrap();

    let mpd = read(&dir, "adaptive.mpd");
    let video = mpd.find("contentType=\"video\"").unwrap();
    let audio = mpd.find("contentType=\"audio\"").unwrap();
    assert!(video < audio);
    assert_eq!(representation_ids(&mpd), vec!["1", "0"]);
    assert!(mpd.contains("audioSamplingRate=\"48000\""));
    assert!(mpd.contains("mimeType=\"audio/mp4\""));
}

#[test]
fn test_hls_master_playlist() {
    let dir = TempDir::new().unwrap();
    let mut e = exporter(&dir, ExportTarget::Hls, FakeEncoder::new(4, 10));
    e.segment_type(SegmentType::MpegTs).unwrap();
    ladder(&mut e, &[1000, 250]);
    let outcome = e.save("adaptive.m3u8").unwrap();

    let playlist = read(&dir, "adaptive.m3u8");
    assert!(playlist.starts_with("#EXTM3U\n"));
    assert_eq!(playlist.matches("#EXT-X-STREAM-INF").count(), 2);
    let low = playlist.find("adaptive_1_250.m3u8").unwrap();
    let high = playlist.find("adaptive_0_1000.m3u8").unwrap();
    assert!(low < high);
    assert!(playlist.contains("BANDWIDTH=378000,CODECS=\"avc1.4d001f,mp4a.40.2\""));

    let variant = read(&dir, "adaptive_1_250.m3u8");
    assert!(variant.contains("adaptive_1_250_00000.ts"));
    let args = outcome.command.outputs[1].args.join(" ");
    let expected = dir.path().join("adaptive_1_250_%05d.ts");
    assert!(args.contains(&format!("-hls_segment_filename {}", expected.display())));
    assert!(args.contains("-hls_segment_type mpegts"));
}

#[test]
fn test_watermark_adds_encoder_input() {
    let dir = TempDir::new().unwrap();
    let mut e = exporter(&dir, ExportTarget::Dash, FakeEncoder::new(4, 8));
    e.add_representation_with_filters(FormatSpec::x264(250), |f: &mut dyn crate::filters::FilterOps| {
        f.add_watermark(&crate::filters::Watermark::new("/media/logo.png").bottom_right(10));
    })
    .unwrap()
    .add_representation(FormatSpec::x264(1000))
    .unwrap();

    let outcome = e.save("adaptive.mpd").unwrap();
    assert_eq!(outcome.command.inputs.len(), 2);
    assert_eq!(outcome.command.inputs[1], Path::new("/media/logo.png"));
    assert_eq!(outcome.command.outputs[0].maps, vec!["[v0_1]", "0:a"]);
    assert!(dir.path().join("adaptive.mpd").exists());
}
