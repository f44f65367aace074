//! Adaptive-bitrate export orchestration
//!
//! An `Exporter` accumulates representations, then `save` commits them:
//! names are resolved, one encoder invocation writes every output with its
//! own sub-manifest, and the master manifest is synthesized from those
//! sub-manifests and written through storage.
//!
//! ```no_run
//! use abr_export::{Exporter, ExportTarget, FormatSpec, MediaSource};
//!
//! # fn main() -> abr_export::Result<()> {
//! let source = MediaSource::open("video.mp4")?;
//! let mut exporter = Exporter::new(source, ExportTarget::Dash);
//! exporter
//!     .add_representation(FormatSpec::x264(250))?
//!     .add_representation(FormatSpec::x264(1000))?
//!     .add_representation(FormatSpec::x264(4000))?;
//! exporter.save("adaptive.mpd")?;
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::args::output_args;
use crate::config::{EncoderConfig, ExportConfig, ExportTarget, SegmentType, StreamingParams};
use crate::descriptor::{Representation, RepresentationDescriptor};
use crate::encoder::{Encoder, EncoderCommand, FfmpegCli, OutputMapping};
use crate::error::{ExportError, Result};
use crate::filters::{FilterCallback, FilterGraph, FilterOps, VideoFilters};
use crate::format::{FixedValues, FormatSpec, SegmentTemplate};
use crate::manifest::{generator_for, ExportedRepresentation, PlaylistGenerator, SynthesisContext};
use crate::naming::{DefaultNaming, NamingContext, SegmentNaming};
use crate::source::{MediaSource, SourceInfo};
use crate::storage::{LocalDisk, Storage};

/// Init segment name the DASH muxer uses when none is given
const DASH_DEFAULT_INIT: &str = "init-stream$RepresentationID$.$ext$";

/// Init segment name the HLS muxer uses for fMP4 when none is given
const HLS_DEFAULT_INIT: &str = "init.mp4";

/// Lifecycle of an exporter. The transition is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Accumulating,
    Committed,
}

/// Result of a successful export
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    /// Storage location of the master manifest
    pub master_path: PathBuf,
    /// Sub-manifests in registration order
    pub sub_manifests: Vec<PathBuf>,
    /// The encoder invocation that produced them
    pub command: EncoderCommand,
}

struct Pending {
    representation: Representation,
    filters: Option<FilterCallback>,
}

/// Everything `save` needs, resolved before the encoder runs
struct Plan {
    command: EncoderCommand,
    exported: Vec<ExportedRepresentation>,
    master_path: PathBuf,
}

pub struct Exporter {
    source: MediaSource,
    target: ExportTarget,
    streaming: StreamingParams,
    encoder_config: EncoderConfig,
    storage: Box<dyn Storage>,
    encoder: Box<dyn Encoder>,
    naming: Box<dyn SegmentNaming>,
    generator: Option<Box<dyn PlaylistGenerator>>,
    pending: Vec<Pending>,
    state: ExportState,
}

impl Exporter {
    pub fn new(source: MediaSource, target: ExportTarget) -> Self {
        Self {
            source,
            target,
            streaming: StreamingParams::default(),
            encoder_config: EncoderConfig::default(),
            storage: Box::new(LocalDisk::new(".")),
            encoder: Box::new(FfmpegCli::default()),
            naming: Box::new(DefaultNaming),
            generator: None,
            pending: Vec::new(),
            state: ExportState::Accumulating,
        }
    }

    /// Exporter with target, streaming and encoder settings from a config
    pub fn from_config(source: MediaSource, config: &ExportConfig) -> Self {
        let mut exporter = Self::new(source, config.target);
        exporter.streaming = config.streaming.clone();
        exporter.encoder = Box::new(FfmpegCli::from_config(&config.encoder));
        exporter.encoder_config = config.encoder.clone();
        exporter
    }

    pub fn state(&self) -> ExportState {
        self.state
    }

    pub fn target(&self) -> ExportTarget {
        self.target
    }

    pub fn streaming_params(&self) -> &StreamingParams {
        &self.streaming
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn ensure_accumulating(&self) -> Result<()> {
        match self.state {
            ExportState::Accumulating => Ok(()),
            ExportState::Committed => Err(ExportError::AlreadyCommitted),
        }
    }

    /// Register a representation. Explicit templates are validated when
    /// the representation is built; the DASH muxer only writes video
    /// containers, so audio formats are re-tagged accordingly.
    pub fn add_representation(&mut self, representation: impl Into<Representation>) -> Result<&mut Self> {
        self.push(representation.into(), None)
    }

    /// Register a representation with a filter callback applied to its video
    pub fn add_representation_with_filters<F>(
        &mut self,
        representation: impl Into<Representation>,
        filters: F,
    ) -> Result<&mut Self>
    where
        F: Fn(&mut dyn FilterOps) + 'static,
    {
        self.push(representation.into(), Some(Box::new(filters)))
    }

    fn push(&mut self, representation: Representation, filters: Option<FilterCallback>) -> Result<&mut Self> {
        self.ensure_accumulating()?;
        let representation = match self.target {
            ExportTarget::Dash => representation.map_format(FormatSpec::into_video_container),
            ExportTarget::Hls => representation,
        };
        tracing::debug!(
            ordinal = self.pending.len(),
            "Registered {} representation ({}, {} kbps)",
            representation.format().media_type(),
            representation.format().codec(),
            representation.format().bitrate_kbps()
        );
        self.pending.push(Pending {
            representation,
            filters,
        });
        Ok(self)
    }

    pub fn to_storage(&mut self, storage: impl Storage + 'static) -> Result<&mut Self> {
        self.ensure_accumulating()?;
        self.storage = Box::new(storage);
        Ok(self)
    }

    pub fn with_encoder(&mut self, encoder: impl Encoder + 'static) -> Result<&mut Self> {
        self.ensure_accumulating()?;
        self.encoder = Box::new(encoder);
        Ok(self)
    }

    /// Global encoder arguments (`-loglevel` and extra arguments)
    pub fn encoder_config(&mut self, config: EncoderConfig) -> Result<&mut Self> {
        self.ensure_accumulating()?;
        self.encoder_config = config;
        Ok(self)
    }

    pub fn segment_length(&mut self, secs: u32) -> Result<&mut Self> {
        self.ensure_accumulating()?;
        self.streaming.segment_length_secs = secs;
        Ok(self)
    }

    pub fn key_frame_interval(&mut self, frames: u32) -> Result<&mut Self> {
        self.ensure_accumulating()?;
        self.streaming.key_frame_interval = frames;
        Ok(self)
    }

    pub fn segment_type(&mut self, segment_type: SegmentType) -> Result<&mut Self> {
        self.ensure_accumulating()?;
        segment_type.muxer_value(self.target)?;
        self.streaming.segment_type = segment_type;
        Ok(self)
    }

    /// Init segment template for every representation without its own
    pub fn initialization_segment_name(&mut self, template: &str) -> Result<&mut Self> {
        self.ensure_accumulating()?;
        SegmentTemplate::parse_init(template)?;
        self.streaming.init_segment_name = Some(template.to_string());
        Ok(self)
    }

    pub fn segment_naming(&mut self, naming: impl SegmentNaming + 'static) -> Result<&mut Self> {
        self.ensure_accumulating()?;
        self.naming = Box::new(naming);
        Ok(self)
    }

    pub fn with_playlist_generator(&mut self, generator: impl PlaylistGenerator + 'static) -> Result<&mut Self> {
        self.ensure_accumulating()?;
        if generator.target() != self.target {
            return Err(ExportError::config(format!(
                "playlist generator writes {} manifests but the export targets {}",
                generator.target().manifest_ext(),
                self.target.manifest_ext()
            )));
        }
        self.generator = Some(Box::new(generator));
        Ok(self)
    }

    /// The encoder invocation `save` would run, without running it
    pub fn command(&self, master_path: &str) -> Result<EncoderCommand> {
        self.ensure_accumulating()?;
        Ok(self.plan(master_path)?.command)
    }

    /// Encode every representation and write the master manifest.
    ///
    /// Validation failures leave the exporter accumulating. Once the
    /// encoder has been invoked the exporter is committed, whether or not
    /// the run succeeds.
    pub fn save(&mut self, master_path: &str) -> Result<ExportOutcome> {
        self.ensure_accumulating()?;
        let plan = self.plan(master_path)?;

        self.state = ExportState::Committed;
        tracing::info!(
            "Encoding {} representations for {:?}",
            plan.exported.len(),
            plan.master_path
        );
        tracing::debug!("{}", plan.command.display_line(&self.encoder_config.binary));
        self.encoder.run(&plan.command)?;

        let ctx = SynthesisContext {
            storage: self.storage.as_ref(),
            source: self.source.info(),
            master_path: &plan.master_path,
            segment_type: self.streaming.segment_type,
        };
        let content = match &self.generator {
            Some(generator) => generator.generate(&plan.exported, &ctx)?,
            None => generator_for(self.target).generate(&plan.exported, &ctx)?,
        };
        self.storage.write_text(&plan.master_path, &content)?;
        tracing::info!("Wrote master manifest {:?}", plan.master_path);

        Ok(ExportOutcome {
            master_path: plan.master_path,
            sub_manifests: plan.exported.into_iter().map(|r| r.sub_manifest_path).collect(),
            command: plan.command,
        })
    }

    fn plan(&self, master_path: &str) -> Result<Plan> {
        if self.pending.is_empty() {
            return Err(ExportError::EmptyExport);
        }
        self.streaming.validate()?;

        let master = Path::new(master_path);
        let base_name = master
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ExportError::config(format!("invalid master manifest path {:?}", master_path)))?;
        let directory = master.parent().unwrap_or_else(|| Path::new(""));
        let info = self.source.info();

        let naming_ctx = NamingContext {
            target: self.target,
            segment_ext: self.streaming.segment_type.segment_ext(),
            manifest_ext: self.target.manifest_ext(),
            source_has_video: info.has_video,
        };
        let default_init = match &self.streaming.init_segment_name {
            Some(name) => Some(SegmentTemplate::parse_init(name)?),
            None => None,
        };

        let mut command = EncoderCommand::new(self.source.path());
        command.global_args = vec![
            "-y".to_string(),
            "-loglevel".to_string(),
            self.encoder_config.log_level.clone(),
        ];
        command.global_args.extend(self.encoder_config.extra_args.iter().cloned());

        let mut graph = FilterGraph::new();
        let mut exported = Vec::with_capacity(self.pending.len());
        let mut written: HashMap<PathBuf, usize> = HashMap::new();
        let mut manifests = HashSet::new();

        for (ordinal, pending) in self.pending.iter().enumerate() {
            let representation = &pending.representation;
            let names = self.naming.resolve(&base_name, representation, ordinal, &naming_ctx);

            let segment_template = match representation.segment_template() {
                Some(t) => t.clone(),
                None => SegmentTemplate::parse_media(&names.segment_pattern)?,
            };
            let init_template = match representation.init_template().or(default_init.as_ref()) {
                Some(t) => Some(t.clone()),
                None => names
                    .init_pattern
                    .as_deref()
                    .map(SegmentTemplate::parse_init)
                    .transpose()?,
            };
            let descriptor = RepresentationDescriptor::new(
                ordinal,
                representation.format().clone(),
                segment_template,
                init_template,
                directory.join(&names.sub_manifest_path),
                representation.additional_params().to_vec(),
            )?;

            if !manifests.insert(descriptor.sub_manifest_path.clone()) {
                return Err(ExportError::config(format!(
                    "representation {} reuses sub-manifest path {:?}",
                    ordinal, descriptor.sub_manifest_path
                )));
            }
            for name in self.written_names(&descriptor, naming_ctx.segment_ext)? {
                match written.get(&name) {
                    Some(&other) if other == ordinal => {
                        return Err(ExportError::config(format!(
                            "representation {} writes {:?} from more than one stream; \
                             add $RepresentationID$ to its segment names",
                            ordinal, name
                        )))
                    }
                    Some(&other) => {
                        return Err(ExportError::config(format!(
                            "representations {} and {} both write {:?}",
                            other, ordinal, name
                        )))
                    }
                    None => {
                        written.insert(name, ordinal);
                    }
                }
            }

            let (maps, filtered) = self.maps(&descriptor, pending.filters.as_ref(), &mut graph)?;

            let output_path = self
                .storage
                .make_output_path(&descriptor.sub_manifest_path.to_string_lossy());
            let output_dir = output_path.parent().unwrap_or_else(|| Path::new(""));
            let args = output_args(&descriptor, &self.streaming, self.target, info.has_audio, output_dir)?;

            command.outputs.push(OutputMapping {
                maps,
                args,
                path: output_path.clone(),
            });
            exported.push(ExportedRepresentation {
                descriptor,
                sub_manifest_path: output_path,
                filtered,
            });
        }

        command.inputs.extend(graph.extra_inputs().iter().cloned());
        command.filter_complex = graph.render();

        Ok(Plan {
            command,
            exported,
            master_path: self.storage.make_output_path(master_path),
        })
    }

    /// Segment and init segment names an output will write, with every
    /// per-output token substituted the way the muxer does it. The DASH
    /// muxer numbers the streams of each output from zero, so
    /// `$RepresentationID$` repeats across outputs; HLS outputs carry one
    /// muxed stream named after the ordinal.
    fn written_names(&self, descriptor: &RepresentationDescriptor, ext: &'static str) -> Result<Vec<PathBuf>> {
        let dir = descriptor
            .sub_manifest_path
            .parent()
            .unwrap_or_else(|| Path::new(""));
        let info = self.source.info();
        let mut names = Vec::new();

        match self.target {
            ExportTarget::Dash => {
                let init = match &descriptor.init_template {
                    Some(t) => t.clone(),
                    None => SegmentTemplate::parse_init(DASH_DEFAULT_INIT)?,
                };
                for (index, bandwidth) in stream_bandwidths(descriptor, info).into_iter().enumerate() {
                    let id = index.to_string();
                    let values = FixedValues {
                        representation_id: &id,
                        bandwidth,
                        ext,
                    };
                    names.push(dir.join(descriptor.segment_template.resolve_fixed(&values)));
                    names.push(dir.join(init.resolve_fixed(&values)));
                }
            }
            ExportTarget::Hls => {
                let id = descriptor.ordinal.to_string();
                let values = FixedValues {
                    representation_id: &id,
                    bandwidth: descriptor.declared_bandwidth(info.has_audio),
                    ext,
                };
                names.push(dir.join(descriptor.segment_template.resolve_fixed(&values)));
                if ext != "ts" {
                    let init = match &descriptor.init_template {
                        Some(t) => t.expand(&values, 0, 0),
                        None => HLS_DEFAULT_INIT.to_string(),
                    };
                    names.push(dir.join(init));
                }
            }
        }
        Ok(names)
    }

    /// Streams one output maps, and whether a filter chain feeds its video
    fn maps(
        &self,
        descriptor: &RepresentationDescriptor,
        filters: Option<&FilterCallback>,
        graph: &mut FilterGraph,
    ) -> Result<(Vec<String>, bool)> {
        let info = self.source.info();
        let mut maps = Vec::new();
        let mut filtered = false;

        if descriptor.format.has_video() {
            if !info.has_video {
                return Err(ExportError::config(format!(
                    "representation {} encodes video but the source has none",
                    descriptor.ordinal
                )));
            }
            let mut video = VideoFilters::new(graph, descriptor.ordinal);
            if let Some(callback) = filters {
                callback(&mut video);
            }
            filtered = video.count() > 0;
            maps.push(video.output_map());
        } else {
            if !info.has_audio {
                return Err(ExportError::config(format!(
                    "representation {} encodes audio but the source has none",
                    descriptor.ordinal
                )));
            }
            if filters.is_some() {
                tracing::warn!(
                    representation = descriptor.ordinal,
                    "Ignoring video filters on an audio-only representation"
                );
            }
        }

        if info.has_audio {
            maps.push("0:a".to_string());
        }
        Ok((maps, filtered))
    }
}

/// Bitrate of each stream the muxer receives for one output, in map order
fn stream_bandwidths(descriptor: &RepresentationDescriptor, info: &SourceInfo) -> Vec<u64> {
    let audio = descriptor
        .format
        .audio_spec()
        .map(|a| a.bitrate_kbps as u64 * 1000)
        .unwrap_or(0);
    let mut streams = Vec::new();
    if descriptor.format.has_video() {
        streams.push(descriptor.bitrate_kbps() as u64 * 1000);
    }
    if info.has_audio {
        streams.push(audio);
    }
    streams
}
