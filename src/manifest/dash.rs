//! DASH master manifest (MPD) generation

use std::path::Path;

use quick_xml::escape::escape;

use super::codec::codecs_for;
use super::{iso8601_duration, MasterManifest, PlaylistGenerator, SynthesisContext, SynthesizedRepresentation};
use crate::config::{ExportTarget, SegmentType};
use crate::error::Result;
use crate::format::{FixedValues, MediaType, SegmentTemplate};

const MPD_NAMESPACE: &str = "urn:mpeg:dash:schema:mpd:2011";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";
const SCHEMA_LOCATION: &str = "urn:mpeg:DASH:schema:MPD:2011 \
    http://standards.iso.org/ittf/PubliclyAvailableStandards/MPEG-DASH_schema_files/DASH-MPD.xsd";
const LIVE_PROFILE: &str = "urn:mpeg:dash:profile:isoff-live:2011";

/// Writes a static, single-period MPD
#[derive(Debug, Clone, Copy, Default)]
pub struct DashManifestGenerator;

fn content_type(media_type: MediaType) -> &'static str {
    match media_type {
        MediaType::Video => "video",
        MediaType::Audio | MediaType::Muxed => "audio",
    }
}

fn default_mime_type(media_type: MediaType, segment_type: SegmentType) -> &'static str {
    match (media_type, segment_type) {
        (MediaType::Video, SegmentType::Webm) => "video/webm",
        (MediaType::Video, _) => "video/mp4",
        (_, SegmentType::Webm) => "audio/webm",
        _ => "audio/mp4",
    }
}

/// Directory of a sub-manifest relative to the master, as a `BaseURL`.
/// Segment names in a sub-manifest are relative to its own location.
fn base_url(uri: &str) -> Option<String> {
    let parent = Path::new(uri).parent()?;
    if parent.as_os_str().is_empty() {
        return None;
    }
    Some(format!("{}/", parent.to_string_lossy().replace('\\', "/")))
}

fn attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&escape(value));
    out.push('"');
}

impl DashManifestGenerator {
    fn write_representation(
        &self,
        out: &mut String,
        rep: &SynthesizedRepresentation,
        ctx: &SynthesisContext<'_>,
    ) {
        let descriptor = &rep.descriptor;
        let sub = &rep.manifest;
        let resolution = rep.resolution(ctx.source);

        out.push_str("      <Representation");
        attr(out, "id", &rep.id.to_string());
        attr(out, "bandwidth", &(descriptor.bitrate_kbps() as u64 * 1000).to_string());
        let codecs = sub
            .codecs
            .clone()
            .or_else(|| codecs_for(&descriptor.format, resolution, false));
        if let Some(codecs) = codecs {
            attr(out, "codecs", &codecs);
        }
        if descriptor.media_type() == MediaType::Video {
            if let Some(res) = resolution {
                attr(out, "width", &res.width.to_string());
                attr(out, "height", &res.height.to_string());
            }
            if let Some(rate) = rep.frame_rate(ctx.source) {
                attr(out, "frameRate", &rate.to_fraction_string());
            }
        } else if let Some(rate) = sub.audio_sampling_rate {
            attr(out, "audioSamplingRate", &rate.to_string());
        }
        out.push_str(">\n");
        if let Some(base) = base_url(&rep.uri) {
            out.push_str("        <BaseURL>");
            out.push_str(&escape(&base));
            out.push_str("</BaseURL>\n");
        }

        // Segment names resolve to what the encoder actually wrote
        let encoder_id = sub
            .representation_id
            .clone()
            .unwrap_or_else(|| rep.id.to_string());
        let values = FixedValues {
            representation_id: &encoder_id,
            bandwidth: sub
                .bandwidth
                .unwrap_or_else(|| descriptor.declared_bandwidth(ctx.source.has_audio)),
            ext: ctx.segment_type.segment_ext(),
        };
        let init = match &descriptor.init_template {
            Some(t) => Some(t.resolve_fixed(&values)),
            None => sub.init_template.as_deref().map(|raw| match SegmentTemplate::parse(raw) {
                Ok(t) => t.resolve_fixed(&values),
                Err(_) => raw.to_string(),
            }),
        };

        out.push_str("        <SegmentTemplate");
        attr(out, "timescale", &sub.timescale.to_string());
        if let Some(init) = &init {
            attr(out, "initialization", init);
        }
        attr(out, "media", &descriptor.segment_template.resolve_fixed(&values));
        attr(out, "startNumber", &sub.start_number.to_string());

        if sub.timeline.is_empty() {
            if let Some(duration) = sub.template_duration {
                attr(out, "duration", &duration.to_string());
            }
            out.push_str("/>\n");
        } else {
            out.push_str(">\n");
            out.push_str("          <SegmentTimeline>\n");
            for entry in &sub.timeline {
                out.push_str("            <S");
                if let Some(t) = entry.t {
                    attr(out, "t", &t.to_string());
                }
                attr(out, "d", &entry.d.to_string());
                if entry.r > 0 {
                    attr(out, "r", &entry.r.to_string());
                }
                out.push_str("/>\n");
            }
            out.push_str("          </SegmentTimeline>\n");
            out.push_str("        </SegmentTemplate>\n");
        }
        out.push_str("      </Representation>\n");
    }
}

impl PlaylistGenerator for DashManifestGenerator {
    fn target(&self) -> ExportTarget {
        ExportTarget::Dash
    }

    fn render(&self, master: &MasterManifest, ctx: &SynthesisContext<'_>) -> Result<String> {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        out.push_str("<MPD");
        attr(&mut out, "xmlns:xsi", XSI_NAMESPACE);
        attr(&mut out, "xmlns", MPD_NAMESPACE);
        attr(&mut out, "xmlns:xlink", XLINK_NAMESPACE);
        attr(&mut out, "xsi:schemaLocation", SCHEMA_LOCATION);
        attr(&mut out, "profiles", LIVE_PROFILE);
        attr(&mut out, "type", "static");
        attr(&mut out, "mediaPresentationDuration", &iso8601_duration(master.duration));
        attr(&mut out, "minBufferTime", &iso8601_duration(master.max_segment_duration()));
        out.push_str(">\n");

        out.push_str("  <Period id=\"0\" start=\"PT0.000S\">\n");
        for (id, set) in master.adaptation_sets.iter().enumerate() {
            let mime_type = set
                .representations
                .iter()
                .find_map(|r| r.manifest.mime_type.clone())
                .unwrap_or_else(|| default_mime_type(set.media_type, ctx.segment_type).to_string());

            out.push_str("    <AdaptationSet");
            attr(&mut out, "id", &id.to_string());
            attr(&mut out, "contentType", content_type(set.media_type));
            attr(&mut out, "mimeType", &mime_type);
            attr(&mut out, "segmentAlignment", "true");
            attr(&mut out, "startWithSAP", "1");
            out.push_str(">\n");
            for rep in &set.representations {
                self.write_representation(&mut out, rep, ctx);
            }
            out.push_str("    </AdaptationSet>\n");
        }
        out.push_str("  </Period>\n");
        out.push_str("</MPD>\n");

        Ok(out)
    }
}
