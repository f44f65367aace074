//! Export configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};

/// Streaming format the export targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportTarget {
    Dash,
    Hls,
}

impl ExportTarget {
    /// Name of the encoder muxer
    pub fn muxer(&self) -> &'static str {
        match self {
            ExportTarget::Dash => "dash",
            ExportTarget::Hls => "hls",
        }
    }

    /// Extension of the manifests written for this target
    pub fn manifest_ext(&self) -> &'static str {
        match self {
            ExportTarget::Dash => "mpd",
            ExportTarget::Hls => "m3u8",
        }
    }
}

/// Segment container type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    Auto,
    Mp4,
    Webm,
    MpegTs,
}

impl SegmentType {
    /// Value passed to the muxer's segment type option
    pub fn muxer_value(&self, target: ExportTarget) -> Result<&'static str> {
        match (target, self) {
            (ExportTarget::Dash, SegmentType::Auto) => Ok("auto"),
            (ExportTarget::Dash, SegmentType::Mp4) => Ok("mp4"),
            (ExportTarget::Dash, SegmentType::Webm) => Ok("webm"),
            (ExportTarget::Hls, SegmentType::Auto | SegmentType::Mp4) => Ok("fmp4"),
            (ExportTarget::Hls, SegmentType::MpegTs) => Ok("mpegts"),
            (target, kind) => Err(ExportError::config(format!(
                "segment type {:?} is not supported by the {} muxer",
                kind,
                target.muxer()
            ))),
        }
    }

    /// File extension of the media segments
    pub fn segment_ext(&self) -> &'static str {
        match self {
            SegmentType::Auto | SegmentType::Mp4 => "m4s",
            SegmentType::Webm => "webm",
            SegmentType::MpegTs => "ts",
        }
    }
}

/// Segmenting parameters shared by every representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingParams {
    /// Target segment duration in seconds
    pub segment_length_secs: u32,

    /// GOP size in frames
    pub key_frame_interval: u32,

    /// Segment container type
    pub segment_type: SegmentType,

    /// Init segment template (`$RepresentationID$` etc. allowed)
    pub init_segment_name: Option<String>,
}

impl Default for StreamingParams {
    fn default() -> Self {
        Self {
            segment_length_secs: 10,
            key_frame_interval: 48,
            segment_type: SegmentType::Auto,
            init_segment_name: None,
        }
    }
}

impl StreamingParams {
    pub fn validate(&self) -> Result<()> {
        if self.segment_length_secs == 0 {
            return Err(ExportError::config("segment length must be positive"));
        }
        if self.key_frame_interval == 0 {
            return Err(ExportError::config("key frame interval must be positive"));
        }
        Ok(())
    }
}

/// Encoder process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Path or name of the encoder binary
    pub binary: PathBuf,

    /// Encoder log level (`-loglevel`)
    pub log_level: String,

    /// Arguments appended before the first output
    pub extra_args: Vec<String>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
            log_level: "error".to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// Full export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub target: ExportTarget,

    pub streaming: StreamingParams,

    pub encoder: EncoderConfig,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            target: ExportTarget::Dash,
            streaming: StreamingParams::default(),
            encoder: EncoderConfig::default(),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExportConfig::default();
        assert_eq!(config.target, ExportTarget::Dash);
        assert_eq!(config.streaming.segment_length_secs, 10);
        assert_eq!(config.streaming.key_frame_interval, 48);
        assert_eq!(config.streaming.segment_type, SegmentType::Auto);
        assert_eq!(config.encoder.binary, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_validate_rejects_zero() {
        let params = StreamingParams {
            segment_length_secs: 0,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(ExportError::Configuration(_))));

        let params = StreamingParams {
            key_frame_interval: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
        assert!(StreamingParams::default().validate().is_ok());
    }

    #[test]
    fn test_segment_type_per_target() {
        assert_eq!(SegmentType::Auto.muxer_value(ExportTarget::Dash).unwrap(), "auto");
        assert_eq!(SegmentType::Auto.muxer_value(ExportTarget::Hls).unwrap(), "fmp4");
        assert_eq!(SegmentType::MpegTs.muxer_value(ExportTarget::Hls).unwrap(), "mpegts");
        assert!(SegmentType::MpegTs.muxer_value(ExportTarget::Dash).is_err());
        assert!(SegmentType::Webm.muxer_value(ExportTarget::Hls).is_err());
        assert_eq!(SegmentType::Webm.segment_ext(), "webm");
    }
}
