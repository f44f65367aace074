//! HLS master playlist generation
//!
//! One `#EXT-X-STREAM-INF` per representation, pointing at the media
//! playlist the HLS muxer wrote for it.

use super::codec::codecs_for;
use super::{MasterManifest, PlaylistGenerator, SynthesisContext, SynthesizedRepresentation};
use crate::config::ExportTarget;
use crate::error::Result;

/// Writes a master playlist referencing every variant
#[derive(Debug, Clone, Copy, Default)]
pub struct HlsPlaylistGenerator;

fn stream_inf(rep: &SynthesizedRepresentation, ctx: &SynthesisContext<'_>) -> String {
    let descriptor = &rep.descriptor;
    let sub = &rep.manifest;

    // BANDWIDTH must cover the peak segment bitrate
    let declared = descriptor.declared_bandwidth(ctx.source.has_audio);
    let bandwidth = sub.peak_bandwidth().map_or(declared, |peak| peak.max(declared));

    let mut attrs = vec![format!("BANDWIDTH={}", bandwidth)];
    if let Some(average) = sub.average_bandwidth() {
        attrs.push(format!("AVERAGE-BANDWIDTH={}", average));
    }

    let has_video = descriptor.format.has_video() && ctx.source.has_video;
    let resolution = if has_video { rep.resolution(ctx.source) } else { None };
    let codecs = sub
        .codecs
        .clone()
        .or_else(|| codecs_for(&descriptor.format, resolution, ctx.source.has_audio));
    if let Some(codecs) = codecs {
        attrs.push(format!("CODECS=\"{}\"", codecs));
    }
    if let Some(res) = resolution {
        attrs.push(format!("RESOLUTION={}", res));
    }
    if has_video {
        if let Some(rate) = rep.frame_rate(ctx.source) {
            let millis = rate.round_scaled(1000);
            attrs.push(format!("FRAME-RATE={}.{:03}", millis / 1000, millis % 1000));
        }
    }

    format!("#EXT-X-STREAM-INF:{}\n{}\n", attrs.join(","), rep.uri)
}

impl PlaylistGenerator for HlsPlaylistGenerator {
    fn target(&self) -> ExportTarget {
        ExportTarget::Hls
    }

    fn render(&self, master: &MasterManifest, ctx: &SynthesisContext<'_>) -> Result<String> {
        let mut output = String::new();

        output.push_str("#EXTM3U\n");
        output.push_str("#EXT-X-VERSION:7\n");
        output.push_str("#EXT-X-INDEPENDENT-SEGMENTS\n");
        output.push('\n');

        for rep in master.representations() {
            output.push_str(&stream_inf(rep, ctx));
        }

        Ok(output)
    }
}
