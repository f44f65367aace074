//! Codec string generation
//!
//! RFC 6381 codec strings for manifests, derived from the encoder names a
//! representation was registered with. Used when the encoder's own
//! sub-manifest does not carry a `codecs` attribute.

use crate::format::{FormatSpec, Resolution};

/// Codec string for a video encoder
pub fn video_codec_string(encoder: &str, resolution: Option<Resolution>) -> Option<String> {
    match encoder {
        "libx264" | "h264" | "h264_nvenc" | "h264_vaapi" | "h264_qsv" | "h264_videotoolbox" => {
            let (width, height) = resolution.map(|r| (r.width, r.height)).unwrap_or((1280, 720));
            Some(h264_profile_level(width, height))
        }
        "libx265" | "hevc" | "hevc_nvenc" | "hevc_vaapi" | "hevc_qsv" => {
            Some("hvc1.1.6.L93.B0".to_string()) // HEVC Main
        }
        "libvpx-vp9" | "vp9" | "vp9_vaapi" => Some("vp09.00.10.08".to_string()),
        "libaom-av1" | "libsvtav1" | "librav1e" | "av1_nvenc" => Some("av01.0.04M.08".to_string()),
        _ => None,
    }
}

/// Codec string for an audio encoder
pub fn audio_codec_string(encoder: &str) -> Option<&'static str> {
    match encoder {
        "aac" | "libfdk_aac" => Some("mp4a.40.2"), // AAC-LC
        "ac3" => Some("ac-3"),
        "eac3" => Some("ec-3"),
        "libopus" | "opus" => Some("opus"),
        "libvorbis" | "vorbis" => Some("vorbis"),
        "libmp3lame" | "mp3" => Some("mp4a.40.34"),
        "flac" => Some("flac"),
        _ => None,
    }
}

/// Codec attribute for a format.
///
/// With `include_audio`, a video format that also encodes audio lists both
/// codecs, as in an HLS variant whose segments carry both streams.
pub fn codecs_for(format: &FormatSpec, resolution: Option<Resolution>, include_audio: bool) -> Option<String> {
    let mut codecs: Vec<String> = Vec::new();
    match format {
        FormatSpec::Video { codec, audio, .. } => {
            if let Some(v) = video_codec_string(codec, resolution) {
                codecs.push(v);
            }
            if include_audio {
                if let Some(a) = audio.as_ref().and_then(|a| audio_codec_string(&a.codec)) {
                    codecs.push(a.to_string());
                }
            }
        }
        FormatSpec::Audio(a) | FormatSpec::MuxedAudioInForVideoContainer(a) => {
            if let Some(s) = audio_codec_string(&a.codec) {
                codecs.push(s.to_string());
            }
        }
    }

    if codecs.is_empty() {
        None
    } else {
        Some(codecs.join(","))
    }
}

/// Profile and level for H.264, estimated from the frame size
pub fn h264_profile_level(width: u32, height: u32) -> String {
    let pixels = width as u64 * height as u64;
    let profile_byte = if pixels <= 130000 {
        0x42 // Baseline
    } else if pixels <= 921600 {
        0x4d // Main
    } else {
        0x64 // High
    };

    let level_byte: u8 = if pixels <= 130000 {
        21 // 2.1
    } else if pixels <= 414720 {
        30 // 3.0
    } else if pixels <= 921600 {
        31 // 3.1
    } else if pixels <= 2073600 {
        40 // 4.0
    } else if pixels <= 8847360 {
        51 // 5.1
    } else {
        52 // 5.2
    };

    format!("avc1.{:02x}00{:02x}", profile_byte, level_byte)
}
