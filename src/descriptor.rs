//! Representation descriptors
//!
//! `Representation` is what the caller registers; `RepresentationDescriptor`
//! is the frozen form produced when the export commits, after segment
//! naming has been resolved. Descriptors are never mutated afterwards.

use std::path::PathBuf;

use crate::error::{ExportError, Result};
use crate::format::{FormatSpec, MediaType, Resolution, SegmentTemplate};

/// A representation registered with an exporter
#[derive(Debug, Clone)]
pub struct Representation {
    format: FormatSpec,
    segment_template: Option<SegmentTemplate>,
    init_template: Option<SegmentTemplate>,
    additional_params: Vec<String>,
}

impl Representation {
    pub fn new(format: FormatSpec) -> Self {
        Self {
            format,
            segment_template: None,
            init_template: None,
            additional_params: Vec::new(),
        }
    }

    /// Use an explicit media segment template instead of the naming
    /// resolver's pattern. Validated immediately.
    pub fn with_segment_template(mut self, template: &str) -> Result<Self> {
        self.segment_template = Some(SegmentTemplate::parse_media(template)?);
        Ok(self)
    }

    /// Per-representation init segment template, overriding the export-wide one
    pub fn with_init_template(mut self, template: &str) -> Result<Self> {
        self.init_template = Some(SegmentTemplate::parse_init(template)?);
        Ok(self)
    }

    /// Encoder arguments kept ahead of the streaming arguments
    pub fn with_additional_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.additional_params.extend(params.into_iter().map(Into::into));
        self
    }

    pub fn format(&self) -> &FormatSpec {
        &self.format
    }

    pub fn segment_template(&self) -> Option<&SegmentTemplate> {
        self.segment_template.as_ref()
    }

    pub fn init_template(&self) -> Option<&SegmentTemplate> {
        self.init_template.as_ref()
    }

    pub fn additional_params(&self) -> &[String] {
        &self.additional_params
    }

    pub(crate) fn map_format(mut self, f: impl FnOnce(FormatSpec) -> FormatSpec) -> Self {
        self.format = f(self.format);
        self
    }
}

impl From<FormatSpec> for Representation {
    fn from(format: FormatSpec) -> Self {
        Representation::new(format)
    }
}

/// Resolved, immutable description of one encoded output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepresentationDescriptor {
    /// Position in registration order; also the manifest-local id
    pub ordinal: usize,
    pub format: FormatSpec,
    pub segment_template: SegmentTemplate,
    pub init_template: Option<SegmentTemplate>,
    /// Location of the per-representation manifest, relative to storage
    pub sub_manifest_path: PathBuf,
    /// Encoder arguments supplied by the caller
    pub additional_params: Vec<String>,
}

impl RepresentationDescriptor {
    pub fn new(
        ordinal: usize,
        format: FormatSpec,
        segment_template: SegmentTemplate,
        init_template: Option<SegmentTemplate>,
        sub_manifest_path: PathBuf,
        additional_params: Vec<String>,
    ) -> Result<Self> {
        if !segment_template.has_varying_token() {
            return Err(ExportError::config(format!(
                "segment template {:?} for representation {} needs $Number$ or $Time$",
                segment_template.as_str(),
                ordinal
            )));
        }
        if format.bitrate_kbps() == 0 {
            return Err(ExportError::config(format!(
                "representation {} has a zero bitrate",
                ordinal
            )));
        }
        Ok(Self {
            ordinal,
            format,
            segment_template,
            init_template,
            sub_manifest_path,
            additional_params,
        })
    }

    pub fn media_type(&self) -> MediaType {
        self.format.media_type()
    }

    pub fn codec(&self) -> &str {
        self.format.codec()
    }

    pub fn bitrate_kbps(&self) -> u32 {
        self.format.bitrate_kbps()
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.format.resolution()
    }

    pub fn audio_channels(&self) -> Option<u16> {
        self.format.audio_spec().and_then(|a| a.channels)
    }

    /// Declared bits per second of everything written into this output
    pub fn declared_bandwidth(&self, source_has_audio: bool) -> u64 {
        let kbps = match &self.format {
            FormatSpec::Video {
                bitrate_kbps,
                audio,
                ..
            } => {
                let audio_kbps = match audio {
                    Some(a) if source_has_audio => a.bitrate_kbps,
                    _ => 0,
                };
                *bitrate_kbps + audio_kbps
            }
            other => other.bitrate_kbps(),
        };
        kbps as u64 * 1000
    }
}
