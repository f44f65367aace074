//! Segment naming
//!
//! Maps a base name and a registered representation to the segment
//! pattern handed to the encoder and the path of the sub-manifest it writes.

use crate::config::ExportTarget;
use crate::descriptor::Representation;

/// Names resolved for one representation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentNames {
    pub segment_pattern: String,
    pub sub_manifest_path: String,
    /// Init segment template, used unless the representation or the
    /// export configures one
    pub init_pattern: Option<String>,
}

/// Export-wide facts a resolver may use
#[derive(Debug, Clone, Copy)]
pub struct NamingContext {
    pub target: ExportTarget,
    pub segment_ext: &'static str,
    pub manifest_ext: &'static str,
    pub source_has_video: bool,
}

/// Resolver contract. Must be a pure function of its inputs.
pub trait SegmentNaming {
    fn resolve(
        &self,
        base_name: &str,
        representation: &Representation,
        ordinal: usize,
        ctx: &NamingContext,
    ) -> SegmentNames;
}

impl<F> SegmentNaming for F
where
    F: Fn(&str, &Representation, usize, &NamingContext) -> SegmentNames,
{
    fn resolve(
        &self,
        base_name: &str,
        representation: &Representation,
        ordinal: usize,
        ctx: &NamingContext,
    ) -> SegmentNames {
        self(base_name, representation, ordinal, ctx)
    }
}

/// `{base}_{ordinal}_{kbps}.{ext}` sub-manifests.
///
/// The DASH muxer writes every stream of an output (video and its audio)
/// under the same templates, numbering them through `$RepresentationID$`:
/// segments are `{base}_{ordinal}_{kbps}_$RepresentationID$_$Number%05d$.{ext}`
/// and init segments `{base}_{ordinal}_{kbps}_init_$RepresentationID$.{ext}`.
/// HLS outputs hold one muxed stream, so segments are
/// `{base}_{ordinal}_{kbps}_$Number%05d$.{ext}` with a
/// `{base}_{ordinal}_{kbps}_init.mp4` init segment for fMP4.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNaming;

impl DefaultNaming {
    fn kbps(representation: &Representation, ctx: &NamingContext) -> u32 {
        let format = representation.format();
        if ctx.source_has_video && format.has_video() {
            format.bitrate_kbps()
        } else {
            format
                .audio_spec()
                .map(|a| a.bitrate_kbps)
                .unwrap_or_else(|| format.bitrate_kbps())
        }
    }
}

impl SegmentNaming for DefaultNaming {
    fn resolve(
        &self,
        base_name: &str,
        representation: &Representation,
        ordinal: usize,
        ctx: &NamingContext,
    ) -> SegmentNames {
        let stem = format!("{}_{}_{}", base_name, ordinal, Self::kbps(representation, ctx));
        let (segment_pattern, init_pattern) = match ctx.target {
            ExportTarget::Dash => (
                format!("{}_$RepresentationID$_$Number%05d$.{}", stem, ctx.segment_ext),
                Some(format!("{}_init_$RepresentationID$.{}", stem, ctx.segment_ext)),
            ),
            ExportTarget::Hls => (
                format!("{}_$Number%05d$.{}", stem, ctx.segment_ext),
                (ctx.segment_ext != "ts").then(|| format!("{}_init.mp4", stem)),
            ),
        };
        SegmentNames {
            segment_pattern,
            sub_manifest_path: format!("{}.{}", stem, ctx.manifest_ext),
            init_pattern,
        }
    }
}
