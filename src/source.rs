//! Source media inspection
//!
//! The exporter needs to know whether the input carries video and audio
//! (stream mapping, default naming) and its frame rate (HLS `FRAME-RATE`).
//! `MediaSource::open` reads this from the container header with FFmpeg.

use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;

use crate::error::{ExportError, Result};
use crate::format::Resolution;
use crate::timeline::Rational;

/// Initialize the FFmpeg library. Call once at startup before probing.
pub fn init() -> Result<()> {
    ffmpeg::init().map_err(|e| ExportError::Probe(format!("ffmpeg::init() failed: {}", e)))?;
    // Probing an input should not print the demuxer banner on stderr
    ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Error);
    tracing::debug!("FFmpeg initialized");
    Ok(())
}

/// What the exporter knows about its input
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceInfo {
    pub has_video: bool,
    pub has_audio: bool,
    pub resolution: Option<Resolution>,
    pub frame_rate: Option<Rational>,
    pub duration: Option<Rational>,
}

impl SourceInfo {
    /// Video with audio, typical for tests and CLI dry runs
    pub fn audio_video() -> Self {
        Self {
            has_video: true,
            has_audio: true,
            ..Default::default()
        }
    }

    pub fn audio_only() -> Self {
        Self {
            has_audio: true,
            ..Default::default()
        }
    }
}

/// Input file plus its probed stream layout
#[derive(Debug, Clone)]
pub struct MediaSource {
    path: PathBuf,
    info: SourceInfo,
}

impl MediaSource {
    /// Open and probe a media file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let info = probe(&path)?;
        tracing::info!(
            "Probed {:?}: video={}, audio={}, resolution={:?}",
            path,
            info.has_video,
            info.has_audio,
            info.resolution.map(|r| r.to_string())
        );
        Ok(Self { path, info })
    }

    /// Use already-known stream information
    pub fn with_info<P: AsRef<Path>>(path: P, info: SourceInfo) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            info,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> &SourceInfo {
        &self.info
    }
}

fn to_rational(r: ffmpeg::Rational) -> Option<Rational> {
    let (num, den) = (r.numerator(), r.denominator());
    if num <= 0 || den <= 0 {
        return None;
    }
    Rational::new(num as u64, den as u64)
}

fn probe(path: &Path) -> Result<SourceInfo> {
    let context = ffmpeg::format::input(&path)
        .map_err(|e| ExportError::Probe(format!("Failed to open {:?}: {}", path, e)))?;

    let mut info = SourceInfo::default();

    let duration = context.duration();
    if duration > 0 {
        info.duration = Rational::from_ticks(duration as u64, ffmpeg::ffi::AV_TIME_BASE as u64);
    }

    for (i, stream) in context.streams().enumerate() {
        match stream.parameters().medium() {
            ffmpeg::media::Type::Video if !info.has_video => {
                info.has_video = true;
                let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
                    .and_then(|context| context.decoder().video())
                    .map_err(|e| ExportError::Probe(format!("Failed to read video stream {}: {}", i, e)))?;
                let (width, height) = (decoder.width(), decoder.height());
                if width > 0 && height > 0 {
                    info.resolution = Some(Resolution::new(width, height));
                }
                info.frame_rate = to_rational(stream.avg_frame_rate());
                tracing::debug!("Found video stream {}: {}x{}", i, width, height);
            }
            ffmpeg::media::Type::Audio if !info.has_audio => {
                info.has_audio = true;
                tracing::debug!("Found audio stream {}", i);
            }
            medium => tracing::debug!("Skipping stream {} (type={:?})", i, medium),
        }
    }

    if !info.has_video && !info.has_audio {
        return Err(ExportError::Probe(format!(
            "{:?} has neither video nor audio streams",
            path
        )));
    }

    Ok(info)
}
