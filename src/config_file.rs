//! Job file support
//!
//! Describes a whole export in TOML: input, master manifest, encoder and
//! streaming settings, and the bitrate ladder.
//!
//! ```toml
//! [job]
//! input = "video.mp4"
//! output = "adaptive.mpd"
//! target = "dash"
//!
//! [[representation]]
//! kind = "video"
//! codec = "libx264"
//! bitrate_kbps = 1000
//! width = 1280
//! height = 720
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{EncoderConfig, ExportConfig, ExportTarget, SegmentType, StreamingParams};
use crate::descriptor::Representation;
use crate::error::Result;
use crate::format::{AudioSpec, FormatSpec};

/// Job file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// What to export and where
    pub job: JobSettings,
    /// Encoder settings
    pub encoder: Option<EncoderSettings>,
    /// Segmenting settings
    pub streaming: Option<StreamingSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
    /// Bitrate ladder, in registration order
    #[serde(default)]
    pub representation: Vec<RepresentationSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSettings {
    /// Source media file
    pub input: PathBuf,
    /// Master manifest name, relative to the output directory
    pub output: String,
    /// Directory every output is written to
    pub output_dir: Option<PathBuf>,
    /// dash or hls
    pub target: ExportTarget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderSettings {
    /// Encoder binary name or path
    pub binary: Option<PathBuf>,
    /// Encoder log level
    pub log_level: Option<String>,
    /// Extra global arguments
    pub extra_args: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingSettings {
    /// Segment duration in seconds
    pub segment_length_secs: Option<u32>,
    /// GOP size in frames
    pub key_frame_interval: Option<u32>,
    /// auto, mp4, webm or mpegts
    pub segment_type: Option<SegmentType>,
    /// Init segment template
    pub init_segment_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepresentationKind {
    Video,
    Audio,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepresentationSettings {
    pub kind: RepresentationKind,
    /// Encoder name of the primary stream
    pub codec: String,
    pub bitrate_kbps: u32,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Audio encoded alongside a video representation
    pub audio_codec: Option<String>,
    pub audio_bitrate_kbps: Option<u32>,
    pub audio_channels: Option<u16>,
    /// Explicit media segment template
    pub segment_template: Option<String>,
    /// Explicit init segment template
    pub init_template: Option<String>,
    /// Encoder arguments placed ahead of the streaming arguments
    pub additional_params: Option<Vec<String>>,
}

impl RepresentationSettings {
    fn format(&self) -> FormatSpec {
        match self.kind {
            RepresentationKind::Video => {
                let mut format = FormatSpec::video(self.codec.clone(), self.bitrate_kbps);
                if let (Some(w), Some(h)) = (self.width, self.height) {
                    format = format.with_resolution(w, h);
                }
                if let Some(codec) = &self.audio_codec {
                    let mut audio = AudioSpec::new(codec.clone(), self.audio_bitrate_kbps.unwrap_or(128));
                    audio.channels = self.audio_channels;
                    format = format.with_audio(audio);
                }
                format
            }
            RepresentationKind::Audio => {
                let mut audio = AudioSpec::new(self.codec.clone(), self.bitrate_kbps);
                audio.channels = self.audio_channels;
                FormatSpec::Audio(audio)
            }
        }
    }

    /// Build the registered representation, validating its templates
    pub fn to_representation(&self) -> Result<Representation> {
        let mut representation = Representation::new(self.format());
        if let Some(template) = &self.segment_template {
            representation = representation.with_segment_template(template)?;
        }
        if let Some(template) = &self.init_template {
            representation = representation.with_init_template(template)?;
        }
        if let Some(params) = &self.additional_params {
            representation = representation.with_additional_params(params.iter().cloned());
        }
        Ok(representation)
    }
}

impl ConfigFile {
    /// Load a job from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ConfigFile = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save the job to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Example job: a three-rung H.264 ladder exported as DASH
    pub fn default_config() -> Self {
        let rung = |kbps: u32, width: u32, height: u32| RepresentationSettings {
            kind: RepresentationKind::Video,
            codec: "libx264".to_string(),
            bitrate_kbps: kbps,
            width: Some(width),
            height: Some(height),
            audio_codec: Some("aac".to_string()),
            audio_bitrate_kbps: Some(128),
            audio_channels: None,
            segment_template: None,
            init_template: None,
            additional_params: None,
        };
        Self {
            job: JobSettings {
                input: PathBuf::from("video.mp4"),
                output: "adaptive.mpd".to_string(),
                output_dir: Some(PathBuf::from("out")),
                target: ExportTarget::Dash,
            },
            encoder: Some(EncoderSettings {
                binary: Some(PathBuf::from("ffmpeg")),
                log_level: Some("error".to_string()),
                extra_args: None,
            }),
            streaming: Some(StreamingSettings {
                segment_length_secs: Some(10),
                key_frame_interval: Some(48),
                segment_type: Some(SegmentType::Auto),
                init_segment_name: None,
            }),
            logging: Some(LoggingSettings {
                level: "info".to_string(),
                format: Some("pretty".to_string()),
            }),
            representation: vec![
                rung(250, 640, 360),
                rung(1000, 1280, 720),
                rung(4000, 1920, 1080),
            ],
        }
    }

    /// Convert to the runtime export configuration
    pub fn to_export_config(&self) -> ExportConfig {
        let encoder_defaults = EncoderConfig::default();
        let streaming_defaults = StreamingParams::default();
        let encoder = self.encoder.as_ref();
        let streaming = self.streaming.as_ref();

        ExportConfig {
            target: self.job.target,
            streaming: StreamingParams {
                segment_length_secs: streaming
                    .and_then(|s| s.segment_length_secs)
                    .unwrap_or(streaming_defaults.segment_length_secs),
                key_frame_interval: streaming
                    .and_then(|s| s.key_frame_interval)
                    .unwrap_or(streaming_defaults.key_frame_interval),
                segment_type: streaming
                    .and_then(|s| s.segment_type)
                    .unwrap_or(streaming_defaults.segment_type),
                init_segment_name: streaming.and_then(|s| s.init_segment_name.clone()),
            },
            encoder: EncoderConfig {
                binary: encoder
                    .and_then(|e| e.binary.clone())
                    .unwrap_or(encoder_defaults.binary),
                log_level: encoder
                    .and_then(|e| e.log_level.clone())
                    .unwrap_or(encoder_defaults.log_level),
                extra_args: encoder
                    .and_then(|e| e.extra_args.clone())
                    .unwrap_or_default(),
            },
            log_level: self
                .logging
                .as_ref()
                .map(|l| l.level.clone())
                .unwrap_or_else(|| "info".to_string()),
            log_json: self
                .logging
                .as_ref()
                .and_then(|l| l.format.as_deref())
                .map_or(false, |f| f == "json"),
        }
    }

    /// The ladder as registrable representations
    pub fn representations(&self) -> Result<Vec<Representation>> {
        self.representation
            .iter()
            .map(RepresentationSettings::to_representation)
            .collect()
    }
}

/// Generate an example job file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let config = ConfigFile::default_config();
    config.to_file(path)?;
    Ok(())
}
