//! Adaptive-bitrate export for the ffmpeg CLI
//!
//! Turns a bitrate ladder into a single ffmpeg invocation that writes one
//! segmented output per representation, then synthesizes the DASH MPD or
//! HLS master playlist that ties those outputs together.

macro_rules! regex {
    ($re:literal $(,)?) => {{
        static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
        RE.get_or_init(|| regex::Regex::new($re).unwrap())
    }};
}

pub mod args;
pub mod config;
pub mod config_file;
pub mod descriptor;
pub mod encoder;
pub mod error;
pub mod export;
pub mod filters;
pub mod format;
pub mod manifest;
pub mod naming;
pub mod source;
pub mod storage;
pub mod timeline;

pub use config::{EncoderConfig, ExportConfig, ExportTarget, SegmentType, StreamingParams};
pub use descriptor::{Representation, RepresentationDescriptor};
pub use encoder::{Encoder, EncoderCommand, FfmpegCli, OutputMapping};
pub use error::{EncoderError, ExportError, Result, StorageError};
pub use export::{ExportOutcome, ExportState, Exporter};
pub use filters::{FilterOps, Watermark};
pub use format::{AudioSpec, FormatSpec, MediaType, Resolution, SegmentTemplate};
pub use manifest::{DashManifestGenerator, HlsPlaylistGenerator, PlaylistGenerator};
pub use naming::{DefaultNaming, NamingContext, SegmentNames, SegmentNaming};
pub use source::{MediaSource, SourceInfo};
pub use storage::{LocalDisk, Storage};
pub use timeline::Rational;

#[cfg(test)]
mod tests;
