//! DASH sub-manifest reader
//!
//! Reads the first Period of an MPD written by the encoder and extracts
//! the representation matching the descriptor's media type.

use std::collections::HashMap;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{ExportError, Result};
use crate::format::{MediaType, Resolution};
use crate::timeline::Rational;

use super::submanifest::{SubManifest, TimelineEntry, MAX_SEGMENTS};

type Attrs = HashMap<String, String>;

#[derive(Debug, Default)]
struct RawTemplate {
    attrs: Attrs,
    timeline: Vec<TimelineEntry>,
}

#[derive(Debug, Default)]
struct RawRepresentation {
    attrs: Attrs,
    template: Option<RawTemplate>,
}

#[derive(Debug, Default)]
struct RawAdaptationSet {
    attrs: Attrs,
    template: Option<RawTemplate>,
    representations: Vec<RawRepresentation>,
}

impl RawAdaptationSet {
    fn content_type(&self) -> Option<&str> {
        if let Some(ct) = self.attrs.get("contentType") {
            return Some(ct.as_str());
        }
        self.attrs
            .get("mimeType")
            .or_else(|| self.representations.iter().find_map(|r| r.attrs.get("mimeType")))
            .and_then(|m| m.split('/').next())
    }
}

fn attributes(path: &Path, e: &BytesStart<'_>) -> Result<Attrs> {
    let mut attrs = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| ExportError::manifest_read(path, err))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| ExportError::manifest_read(path, err))?
            .into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

fn number<T: std::str::FromStr>(path: &Path, attrs: &Attrs, key: &str) -> Result<Option<T>> {
    match attrs.get(key) {
        Some(v) => v.trim().parse::<T>().map(Some).map_err(|_| {
            ExportError::manifest_read(path, format!("invalid {} value {:?}", key, v))
        }),
        None => Ok(None),
    }
}

/// Parse an ISO 8601 duration such as `PT1H2M3.5S`
pub fn parse_iso8601_duration(s: &str) -> Option<Rational> {
    let caps = regex!(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d*)?|\.\d+)S)?)?$")
        .captures(s.trim())?;
    let whole = |i: usize| -> Option<u64> {
        caps.get(i).map(|m| m.as_str().parse::<u64>().ok()).unwrap_or(Some(0))
    };
    let secs = whole(1)?
        .checked_mul(86400)?
        .checked_add(whole(2)?.checked_mul(3600)?)?
        .checked_add(whole(3)?.checked_mul(60)?)?;
    let fraction = match caps.get(4) {
        Some(m) => Rational::parse_decimal(m.as_str())?,
        None => Rational::ZERO,
    };
    Rational::from_secs(secs).checked_add(fraction)
}

/// Collected elements of the first Period
#[derive(Default)]
struct Document {
    presentation_duration: Option<String>,
    sets: Vec<RawAdaptationSet>,
}

fn read_document(path: &Path, xml: &str) -> Result<Document> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut doc = Document::default();
    let mut saw_mpd = false;
    let mut periods = 0usize;
    let mut set: Option<RawAdaptationSet> = None;
    let mut rep: Option<RawRepresentation> = None;
    let mut template: Option<RawTemplate> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ExportError::manifest_read(path, e))?;
        let (start, empty) = match &event {
            Event::Start(e) => (Some(e.clone()), false),
            Event::Empty(e) => (Some(e.clone()), true),
            Event::Eof => break,
            _ => (None, false),
        };

        if let Some(e) = start {
            let name = e.local_name();
            let name = name.as_ref();
            // Only the first Period describes the encoded representation
            let in_first_period = periods == 1;
            match name {
                b"MPD" => {
                    saw_mpd = true;
                    doc.presentation_duration = attributes(path, &e)?.remove("mediaPresentationDuration");
                }
                b"Period" => periods += 1,
                b"AdaptationSet" if in_first_period => {
                    set = Some(RawAdaptationSet {
                        attrs: attributes(path, &e)?,
                        ..Default::default()
                    })
                }
                b"Representation" if in_first_period => {
                    rep = Some(RawRepresentation {
                        attrs: attributes(path, &e)?,
                        template: None,
                    })
                }
                b"SegmentTemplate" if in_first_period => {
                    template = Some(RawTemplate {
                        attrs: attributes(path, &e)?,
                        timeline: Vec::new(),
                    })
                }
                b"S" if in_first_period => {
                    if let Some(t) = template.as_mut() {
                        let attrs = attributes(path, &e)?;
                        let d = number::<u64>(path, &attrs, "d")?.ok_or_else(|| {
                            ExportError::manifest_read(path, "SegmentTimeline entry without d")
                        })?;
                        let r = number::<i64>(path, &attrs, "r")?.unwrap_or(0);
                        if r < 0 {
                            return Err(ExportError::manifest_read(
                                path,
                                "open-ended segment repeat in a static manifest",
                            ));
                        }
                        if r as u64 >= MAX_SEGMENTS {
                            return Err(ExportError::manifest_read(
                                path,
                                format!("segment repeat count {} is too large", r),
                            ));
                        }
                        t.timeline.push(TimelineEntry {
                            t: number::<u64>(path, &attrs, "t")?,
                            d,
                            r: r as u64,
                        });
                    }
                }
                _ => {}
            }
            if empty {
                close(name, &mut doc, &mut set, &mut rep, &mut template);
            }
            continue;
        }

        if let Event::End(e) = &event {
            if periods == 1 {
                close(e.local_name().as_ref(), &mut doc, &mut set, &mut rep, &mut template);
            }
        }
    }

    if !saw_mpd {
        return Err(ExportError::manifest_read(path, "no MPD root element"));
    }
    Ok(doc)
}

fn close(
    name: &[u8],
    doc: &mut Document,
    set: &mut Option<RawAdaptationSet>,
    rep: &mut Option<RawRepresentation>,
    template: &mut Option<RawTemplate>,
) {
    match name {
        b"SegmentTemplate" => {
            if let Some(t) = template.take() {
                if let Some(r) = rep.as_mut() {
                    r.template = Some(t);
                } else if let Some(s) = set.as_mut() {
                    s.template = Some(t);
                }
            }
        }
        b"Representation" => {
            if let (Some(r), Some(s)) = (rep.take(), set.as_mut()) {
                s.representations.push(r);
            }
        }
        b"AdaptationSet" => {
            if let Some(s) = set.take() {
                doc.sets.push(s);
            }
        }
        _ => {}
    }
}

/// Parse a DASH sub-manifest, selecting the representation for `media_type`
pub fn parse(path: &Path, xml: &str, media_type: MediaType) -> Result<SubManifest> {
    let doc = read_document(path, xml)?;

    let wanted = match media_type {
        MediaType::Video => "video",
        MediaType::Audio | MediaType::Muxed => "audio",
    };
    let set = doc
        .sets
        .iter()
        .filter(|s| !s.representations.is_empty())
        .find(|s| s.content_type() == Some(wanted))
        .or_else(|| doc.sets.iter().find(|s| !s.representations.is_empty()))
        .ok_or_else(|| ExportError::manifest_read(path, "no Representation in the first Period"))?;
    if set.content_type() != Some(wanted) {
        tracing::warn!(
            "{:?} has no {} adaptation set, using the first representation",
            path,
            wanted
        );
    }
    let rep = &set.representations[0];

    let get = |key: &str| rep.attrs.get(key).or_else(|| set.attrs.get(key)).cloned();
    let mut merged = set.attrs.clone();
    merged.extend(rep.attrs.clone());

    let template = match (&rep.template, &set.template) {
        (Some(r), Some(s)) => {
            let mut attrs = s.attrs.clone();
            attrs.extend(r.attrs.clone());
            let timeline = if r.timeline.is_empty() {
                s.timeline.clone()
            } else {
                r.timeline.clone()
            };
            RawTemplate { attrs, timeline }
        }
        (Some(t), None) | (None, Some(t)) => RawTemplate {
            attrs: t.attrs.clone(),
            timeline: t.timeline.clone(),
        },
        (None, None) => {
            return Err(ExportError::manifest_read(
                path,
                "representation has no SegmentTemplate",
            ))
        }
    };

    let width = number::<u32>(path, &merged, "width")?;
    let height = number::<u32>(path, &merged, "height")?;

    let presentation_duration = match &doc.presentation_duration {
        Some(d) => Some(parse_iso8601_duration(d).ok_or_else(|| {
            ExportError::manifest_read(path, format!("invalid mediaPresentationDuration {:?}", d))
        })?),
        None => None,
    };

    let mut sub = SubManifest {
        representation_id: get("id"),
        codecs: get("codecs"),
        bandwidth: number(path, &merged, "bandwidth")?,
        mime_type: get("mimeType"),
        resolution: match (width, height) {
            (Some(w), Some(h)) => Some(Resolution::new(w, h)),
            _ => None,
        },
        frame_rate: get("frameRate"),
        audio_sampling_rate: number(path, &merged, "audioSamplingRate")?,
        timescale: number(path, &template.attrs, "timescale")?.unwrap_or(1),
        start_number: number(path, &template.attrs, "startNumber")?.unwrap_or(1),
        media_template: template.attrs.get("media").cloned(),
        init_template: template.attrs.get("initialization").cloned(),
        template_duration: number(path, &template.attrs, "duration")?,
        timeline: template.timeline,
        segments: Vec::new(),
        presentation_duration,
        target_duration: None,
    };

    if sub.timescale == 0 {
        return Err(ExportError::manifest_read(path, "timescale is zero"));
    }
    if sub.media_template.is_none() {
        return Err(ExportError::manifest_read(path, "SegmentTemplate has no media attribute"));
    }
    if sub.timeline.is_empty() && sub.template_duration.is_none() {
        return Err(ExportError::manifest_read(
            path,
            "SegmentTemplate has neither a SegmentTimeline nor a duration",
        ));
    }
    if sub.timeline.is_empty() && sub.presentation_duration.is_none() {
        return Err(ExportError::manifest_read(path, "no mediaPresentationDuration"));
    }
    sub.expand_timeline()
        .map_err(|reason| ExportError::manifest_read(path, reason))?;
    if sub.total_duration().is_none() {
        return Err(ExportError::manifest_read(path, "segment durations overflow"));
    }

    Ok(sub)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FFMPEG_MPD: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<MPD xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
	xmlns="urn:mpeg:dash:schema:mpd:2011"
	xmlns:xlink="http://www.w3.org/1999/xlink"
	profiles="urn:mpeg:dash:profile:isoff-live:2011"
	type="static"
	mediaPresentationDuration="PT0H0M10.0S"
	minBufferTime="PT4.0S">
	<Period id="0" start="PT0.0S">
		<AdaptationSet id="0" contentType="video" startWithSAP="1" segmentAlignment="true" bitstreamSwitching="true" frameRate="25/1" maxWidth="640" maxHeight="360" par="16:9" lang="und">
			<Representation id="0" mimeType="video/mp4" codecs="avc1.64001e" bandwidth="250000" width="640" height="360" sar="1:1">
				<SegmentTemplate timescale="12800" initialization="init-stream$RepresentationID$.m4s" media="adaptive_0_250_$Number%05d$.m4s" startNumber="1">
					<SegmentTimeline>
						<S t="0" d="51200" r="1" />
						<S d="25600" />
					</SegmentTimeline>
				</SegmentTemplate>
			</Representation>
		</AdaptationSet>
		<AdaptationSet id="1" contentType="audio" startWithSAP="1" segmentAlignment="true" bitstreamSwitching="true" lang="und">
			<Representation id="1" mimeType="audio/mp4" codecs="mp4a.40.2" bandwidth="128000" audioSamplingRate="48000">
				<AudioChannelConfiguration schemeIdUri="urn:mpeg:dash:23003:3:audio_channel_configuration:2011" value="2" />
				<SegmentTemplate timescale="48000" initialization="init-stream$RepresentationID$.m4s" media="adaptive_0_250_$Number%05d$.m4s" startNumber="1">
					<SegmentTimeline>
						<S t="0" d="192000" r="1" />
						<S d="96000" />
					</SegmentTimeline>
				</SegmentTemplate>
			</Representation>
		</AdaptationSet>
	</Period>
</MPD>
"#;

    #[test]
    fn test_parse_video_representation() {
        let sub = parse(Path::new("a.mpd"), FFMPEG_MPD, MediaType::Video).unwrap();
        assert_eq!(sub.representation_id.as_deref(), Some("0"));
        assert_eq!(sub.codecs.as_deref(), Some("avc1.64001e"));
        assert_eq!(sub.bandwidth, Some(250000));
        assert_eq!(sub.resolution, Some(Resolution::new(640, 360)));
        assert_eq!(sub.frame_rate.as_deref(), Some("25/1"));
        assert_eq!(sub.timescale, 12800);
        assert_eq!(sub.timeline.len(), 2);
        assert_eq!(sub.segments.len(), 3);
        assert_eq!(sub.total_duration(), Some(Rational::from_secs(10)));
        assert_eq!(sub.nominal_segment_duration(), Some(Rational::from_secs(4)));
        assert_eq!(sub.init_template.as_deref(), Some("init-stream$RepresentationID$.m4s"));
    }

    #[test]
    fn test_parse_audio_representation() {
        let sub = parse(Path::new("a.mpd"), FFMPEG_MPD, MediaType::Muxed).unwrap();
        assert_eq!(sub.representation_id.as_deref(), Some("1"));
        assert_eq!(sub.audio_sampling_rate, Some(48000));
        assert_eq!(sub.mime_type.as_deref(), Some("audio/mp4"));
        assert_eq!(sub.total_duration(), Some(Rational::from_secs(10)));
    }

    #[test]
    fn test_template_duration_without_timeline() {
        let xml = r#"<MPD mediaPresentationDuration="PT30S"><Period>
            <AdaptationSet mimeType="video/mp4">
              <SegmentTemplate timescale="1000" duration="4000" media="v_$Number$.m4s"/>
              <Representation id="v0" bandwidth="500000"/>
            </AdaptationSet></Period></MPD>"#;
        let sub = parse(Path::new("v.mpd"), xml, MediaType::Video).unwrap();
        assert!(sub.segments.is_empty());
        assert_eq!(sub.nominal_segment_duration(), Some(Rational::from_secs(4)));
        assert_eq!(sub.total_duration(), Some(Rational::from_secs(30)));
        assert_eq!(sub.mime_type.as_deref(), Some("video/mp4"));
    }

    #[test]
    fn test_malformed_documents() {
        let path = Path::new("bad.mpd");
        let err = parse(path, "<html></html>", MediaType::Video).unwrap_err();
        assert!(matches!(err, ExportError::ManifestRead { .. }));

        let no_template = r#"<MPD><Period><AdaptationSet contentType="video">
            <Representation id="0"/></AdaptationSet></Period></MPD>"#;
        assert!(parse(path, no_template, MediaType::Video).is_err());

        let open_repeat = r#"<MPD><Period><AdaptationSet contentType="video">
            <Representation id="0"><SegmentTemplate media="a_$Number$.m4s">
            <SegmentTimeline><S d="4" r="-1"/></SegmentTimeline>
            </SegmentTemplate></Representation></AdaptationSet></Period></MPD>"#;
        assert!(parse(path, open_repeat, MediaType::Video).is_err());

        let truncated = r#"<MPD><Period><AdaptationSet contentType="video">"#;
        assert!(parse(path, truncated, MediaType::Video).is_err());
    }

    #[test]
    fn test_oversized_repeat_rejected() {
        let path = Path::new("huge.mpd");
        let xml = r#"<MPD><Period><AdaptationSet contentType="video">
            <Representation id="0"><SegmentTemplate timescale="1000" media="a_$Number$.m4s">
            <SegmentTimeline><S t="0" d="4000" r="9000000000000"/></SegmentTimeline>
            </SegmentTemplate></Representation></AdaptationSet></Period></MPD>"#;
        let err = parse(path, xml, MediaType::Video).unwrap_err();
        assert!(matches!(err, ExportError::ManifestRead { .. }));

        // Many moderate entries that add up past the bound
        let entries = r#"<S d="4000" r="600000"/>"#.repeat(2);
        let xml = format!(
            r#"<MPD><Period><AdaptationSet contentType="video">
            <Representation id="0"><SegmentTemplate timescale="1000" media="a_$Number$.m4s">
            <SegmentTimeline>{}</SegmentTimeline>
            </SegmentTemplate></Representation></AdaptationSet></Period></MPD>"#,
            entries
        );
        let err = parse(path, &xml, MediaType::Video).unwrap_err();
        assert!(matches!(err, ExportError::ManifestRead { .. }));
    }

    #[test]
    fn test_iso8601_duration() {
        assert_eq!(parse_iso8601_duration("PT0H0M10.0S"), Some(Rational::from_secs(10)));
        assert_eq!(parse_iso8601_duration("PT1H1M1.5S"), Rational::new(7323, 2));
        assert_eq!(parse_iso8601_duration("PT2M"), Some(Rational::from_secs(120)));
        assert_eq!(parse_iso8601_duration("P1DT0S"), Some(Rational::from_secs(86400)));
        assert_eq!(parse_iso8601_duration("10 seconds"), None);
        assert_eq!(parse_iso8601_duration("P999999999999999999DT0S"), None);
        assert_eq!(parse_iso8601_duration("PT99999999999999999999H"), None);
    }
}
