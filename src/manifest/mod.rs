//! Master manifest synthesis
//!
//! After the encoder finishes, every representation has its own
//! sub-manifest. Synthesis reads them back, groups representations into
//! adaptation sets by media type, checks that members of a set segment
//! identically, and hands the result to a `PlaylistGenerator` that
//! renders the master manifest for one streaming format.
//!
//! Synthesis is pure: the same sub-manifests and descriptors always
//! produce byte-identical output.

pub mod codec;
pub mod dash;
pub mod hls;
pub mod m3u8;
pub mod mpd;
pub mod submanifest;

use std::path::{Path, PathBuf};

pub use self::dash::DashManifestGenerator;
pub use self::hls::HlsPlaylistGenerator;
pub use self::submanifest::{Segment, SubManifest, TimelineEntry};

use crate::config::{ExportTarget, SegmentType};
use crate::descriptor::RepresentationDescriptor;
use crate::error::{ExportError, Result};
use crate::format::{MediaType, Resolution};
use crate::source::SourceInfo;
use crate::storage::Storage;
use crate::timeline::Rational;

/// An encoded representation handed to synthesis
#[derive(Debug, Clone)]
pub struct ExportedRepresentation {
    pub descriptor: RepresentationDescriptor,
    /// Storage location of the sub-manifest the encoder wrote
    pub sub_manifest_path: PathBuf,
    /// A filter graph was applied, so the source frame size may not apply
    pub filtered: bool,
}

/// Everything synthesis reads besides the representations themselves
pub struct SynthesisContext<'a> {
    pub storage: &'a dyn Storage,
    pub source: &'a SourceInfo,
    pub master_path: &'a Path,
    pub segment_type: SegmentType,
}

/// A representation with its sub-manifest loaded
#[derive(Debug, Clone)]
pub struct SynthesizedRepresentation {
    /// Manifest-local id, equal to the registration ordinal
    pub id: usize,
    pub descriptor: RepresentationDescriptor,
    /// Sub-manifest location relative to the master manifest
    pub uri: String,
    pub filtered: bool,
    pub manifest: SubManifest,
}

impl SynthesizedRepresentation {
    /// Best known frame size: the declared one, then what the encoder
    /// reported, then the source's when no filter changed it.
    pub fn resolution(&self, source: &SourceInfo) -> Option<Resolution> {
        self.descriptor
            .resolution()
            .or(self.manifest.resolution)
            .or(if self.filtered { None } else { source.resolution })
    }

    pub fn frame_rate(&self, source: &SourceInfo) -> Option<Rational> {
        self.manifest
            .frame_rate
            .as_deref()
            .and_then(Rational::parse_fraction)
            .or(source.frame_rate)
    }
}

/// Representations of one media type, in emission order
#[derive(Debug, Clone)]
pub struct AdaptationSet {
    pub media_type: MediaType,
    /// Nominal segment duration shared by every member
    pub segment_duration: Rational,
    /// Longest member duration
    pub duration: Rational,
    pub representations: Vec<SynthesizedRepresentation>,
}

/// Target-independent master manifest model
#[derive(Debug, Clone)]
pub struct MasterManifest {
    pub duration: Rational,
    pub adaptation_sets: Vec<AdaptationSet>,
}

impl MasterManifest {
    /// Load, group, number and time every representation
    pub fn build(
        representations: &[ExportedRepresentation],
        ctx: &SynthesisContext<'_>,
        target: ExportTarget,
    ) -> Result<Self> {
        let loaded = representations
            .iter()
            .map(|r| load(r, ctx, target))
            .collect::<Result<Vec<_>>>()?;

        let mut adaptation_sets = Vec::new();
        for media_type in MediaType::EMISSION_ORDER {
            let members: Vec<SynthesizedRepresentation> = loaded
                .iter()
                .filter(|r| r.descriptor.media_type() == media_type)
                .cloned()
                .collect();
            if members.is_empty() {
                continue;
            }
            adaptation_sets.push(group(media_type, members)?);
        }

        let duration = adaptation_sets
            .iter()
            .map(|s| s.duration)
            .max()
            .unwrap_or_default();

        tracing::debug!(
            "Synthesized {} adaptation sets, duration {}",
            adaptation_sets.len(),
            duration
        );

        Ok(Self {
            duration,
            adaptation_sets,
        })
    }

    /// Longest nominal segment duration over all adaptation sets
    pub fn max_segment_duration(&self) -> Rational {
        self.adaptation_sets
            .iter()
            .map(|s| s.segment_duration)
            .max()
            .unwrap_or_default()
    }

    pub fn representations(&self) -> impl Iterator<Item = &SynthesizedRepresentation> {
        self.adaptation_sets.iter().flat_map(|s| s.representations.iter())
    }
}

/// Renders a master manifest for one streaming format
pub trait PlaylistGenerator {
    fn target(&self) -> ExportTarget;

    fn render(&self, master: &MasterManifest, ctx: &SynthesisContext<'_>) -> Result<String>;

    fn generate(
        &self,
        representations: &[ExportedRepresentation],
        ctx: &SynthesisContext<'_>,
    ) -> Result<String> {
        let master = MasterManifest::build(representations, ctx, self.target())?;
        self.render(&master, ctx)
    }
}

/// The built-in generator for a target
pub fn generator_for(target: ExportTarget) -> Box<dyn PlaylistGenerator> {
    match target {
        ExportTarget::Dash => Box::new(DashManifestGenerator),
        ExportTarget::Hls => Box::new(HlsPlaylistGenerator),
    }
}

fn load(
    exported: &ExportedRepresentation,
    ctx: &SynthesisContext<'_>,
    target: ExportTarget,
) -> Result<SynthesizedRepresentation> {
    let path = &exported.sub_manifest_path;
    let text = ctx
        .storage
        .read_text(path)
        .map_err(|e| ExportError::manifest_read(path, e))?;

    let manifest = match target {
        ExportTarget::Dash => mpd::parse(path, &text, exported.descriptor.media_type())?,
        ExportTarget::Hls => m3u8::parse(path, &text)?,
    };
    let duration = manifest
        .total_duration()
        .ok_or_else(|| ExportError::manifest_read(path, "segment durations overflow"))?;
    tracing::debug!(
        representation = exported.descriptor.ordinal,
        "Loaded {:?}: {} segments, {}",
        path,
        manifest.segments.len(),
        duration
    );

    Ok(SynthesizedRepresentation {
        id: exported.descriptor.ordinal,
        descriptor: exported.descriptor.clone(),
        uri: relative_uri(ctx.master_path, path),
        filtered: exported.filtered,
        manifest,
    })
}

/// Check timeline consistency and order members by ascending bitrate
fn group(media_type: MediaType, mut members: Vec<SynthesizedRepresentation>) -> Result<AdaptationSet> {
    members.sort_by_key(|r| r.id);

    let nominal = |r: &SynthesizedRepresentation| {
        r.manifest.nominal_segment_duration().ok_or_else(|| {
            ExportError::manifest_read(format!("representation {}", r.id), "no segment duration")
        })
    };

    let reference = &members[0];
    let segment_duration = nominal(reference)?;
    for other in &members[1..] {
        let found = nominal(other)?;
        if found != segment_duration {
            return Err(ExportError::InconsistentTimeline {
                media_type,
                expected_id: reference.id,
                expected: segment_duration.to_string(),
                found_id: other.id,
                found: found.to_string(),
            });
        }
    }

    let mut duration = Rational::ZERO;
    for member in &members {
        let total = member.manifest.total_duration().ok_or_else(|| {
            ExportError::manifest_read(format!("representation {}", member.id), "segment durations overflow")
        })?;
        duration = duration.max(total);
    }

    members.sort_by_key(|r| (r.descriptor.bitrate_kbps(), r.id));

    Ok(AdaptationSet {
        media_type,
        segment_duration,
        duration,
        representations: members,
    })
}

/// Path of `sub` as referenced from the directory holding `master`
pub fn relative_uri(master: &Path, sub: &Path) -> String {
    let base = master.parent().unwrap_or_else(|| Path::new(""));
    let relative = sub.strip_prefix(base).unwrap_or(sub);
    relative.to_string_lossy().replace('\\', "/")
}

/// `PT{seconds}.{millis}S`
pub fn iso8601_duration(value: Rational) -> String {
    let ms = value.round_millis();
    format!("PT{}.{:03}S", ms / 1000, ms % 1000)
}
