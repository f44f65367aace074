//! Output format descriptions
//!
//! A `FormatSpec` is what the caller asks for: one rung of the bitrate
//! ladder. Audio-only rungs exported to a video-container muxer use the
//! `MuxedAudioInForVideoContainer` variant.

pub mod template;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use template::{FixedValues, SegmentTemplate, Token};

/// Media carried by one representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Audio,
    Muxed,
}

impl MediaType {
    /// Adaptation set emission order: video, then audio, then audio
    /// carried in video containers.
    pub const EMISSION_ORDER: [MediaType; 3] = [MediaType::Video, MediaType::Audio, MediaType::Muxed];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Muxed => "muxed",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frame size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Audio encoding settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSpec {
    /// Encoder name, e.g. `aac` or `libopus`
    pub codec: String,
    pub bitrate_kbps: u32,
    pub channels: Option<u16>,
}

impl AudioSpec {
    pub fn new(codec: impl Into<String>, bitrate_kbps: u32) -> Self {
        Self {
            codec: codec.into(),
            bitrate_kbps,
            channels: None,
        }
    }

    pub fn aac(bitrate_kbps: u32) -> Self {
        Self::new("aac", bitrate_kbps)
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = Some(channels);
        self
    }
}

/// One requested output encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatSpec {
    Video {
        /// Encoder name, e.g. `libx264`
        codec: String,
        bitrate_kbps: u32,
        resolution: Option<Resolution>,
        /// Audio encoding used when the source has an audio stream
        audio: Option<AudioSpec>,
    },
    Audio(AudioSpec),
    MuxedAudioInForVideoContainer(AudioSpec),
}

impl FormatSpec {
    pub fn video(codec: impl Into<String>, bitrate_kbps: u32) -> Self {
        FormatSpec::Video {
            codec: codec.into(),
            bitrate_kbps,
            resolution: None,
            audio: None,
        }
    }

    /// H.264 video with 128 kbps AAC audio
    pub fn x264(bitrate_kbps: u32) -> Self {
        Self::video("libx264", bitrate_kbps).with_audio(AudioSpec::aac(128))
    }

    pub fn audio(codec: impl Into<String>, bitrate_kbps: u32) -> Self {
        FormatSpec::Audio(AudioSpec::new(codec, bitrate_kbps))
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        if let FormatSpec::Video { resolution, .. } = &mut self {
            *resolution = Some(Resolution::new(width, height));
        }
        self
    }

    pub fn with_audio(mut self, spec: AudioSpec) -> Self {
        if let FormatSpec::Video { audio, .. } = &mut self {
            *audio = Some(spec);
        }
        self
    }

    pub fn media_type(&self) -> MediaType {
        match self {
            FormatSpec::Video { .. } => MediaType::Video,
            FormatSpec::Audio(_) => MediaType::Audio,
            FormatSpec::MuxedAudioInForVideoContainer(_) => MediaType::Muxed,
        }
    }

    /// Encoder name of the primary stream
    pub fn codec(&self) -> &str {
        match self {
            FormatSpec::Video { codec, .. } => codec,
            FormatSpec::Audio(a) | FormatSpec::MuxedAudioInForVideoContainer(a) => &a.codec,
        }
    }

    /// Video bitrate for video formats, audio bitrate otherwise
    pub fn bitrate_kbps(&self) -> u32 {
        match self {
            FormatSpec::Video { bitrate_kbps, .. } => *bitrate_kbps,
            FormatSpec::Audio(a) | FormatSpec::MuxedAudioInForVideoContainer(a) => a.bitrate_kbps,
        }
    }

    pub fn resolution(&self) -> Option<Resolution> {
        match self {
            FormatSpec::Video { resolution, .. } => *resolution,
            _ => None,
        }
    }

    pub fn audio_spec(&self) -> Option<&AudioSpec> {
        match self {
            FormatSpec::Video { audio, .. } => audio.as_ref(),
            FormatSpec::Audio(a) | FormatSpec::MuxedAudioInForVideoContainer(a) => Some(a),
        }
    }

    pub fn has_video(&self) -> bool {
        matches!(self, FormatSpec::Video { .. })
    }

    /// Re-tag an audio-only format for a muxer that only writes video
    /// containers. Other formats are returned unchanged.
    pub fn into_video_container(self) -> Self {
        match self {
            FormatSpec::Audio(a) => FormatSpec::MuxedAudioInForVideoContainer(a),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitrate_prefers_video() {
        let f = FormatSpec::x264(1000);
        assert_eq!(f.bitrate_kbps(), 1000);
        assert_eq!(f.audio_spec().map(|a| a.bitrate_kbps), Some(128));
        assert_eq!(f.media_type(), MediaType::Video);

        let a = FormatSpec::audio("aac", 96);
        assert_eq!(a.bitrate_kbps(), 96);
        assert_eq!(a.media_type(), MediaType::Audio);
    }

    #[test]
    fn test_into_video_container() {
        let a = FormatSpec::Audio(AudioSpec::aac(64).with_channels(2)).into_video_container();
        assert_eq!(a.media_type(), MediaType::Muxed);
        assert_eq!(a.audio_spec().and_then(|s| s.channels), Some(2));
        assert_eq!(a.codec(), "aac");

        let v = FormatSpec::x264(250).into_video_container();
        assert_eq!(v.media_type(), MediaType::Video);
    }

    #[test]
    fn test_resolution_only_applies_to_video() {
        let v = FormatSpec::x264(250).with_resolution(640, 360);
        assert_eq!(v.resolution(), Some(Resolution::new(640, 360)));
        let a = FormatSpec::audio("aac", 96).with_resolution(640, 360);
        assert_eq!(a.resolution(), None);
    }
}
