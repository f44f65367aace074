//! Encoder invocation boundary
//!
//! The exporter describes a single encoder run as an `EncoderCommand`; an
//! `Encoder` executes it. `FfmpegCli` runs the ffmpeg binary.

pub mod ffmpeg;

use std::path::{Path, PathBuf};

use crate::error::EncoderError;

pub use self::ffmpeg::FfmpegCli;

/// One output of the encoder run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputMapping {
    /// Stream specifiers or filter labels passed to `-map`
    pub maps: Vec<String>,
    /// Codec and muxer arguments for this output
    pub args: Vec<String>,
    /// Sub-manifest written by this output
    pub path: PathBuf,
}

/// A complete encoder invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncoderCommand {
    /// Arguments ahead of the inputs (`-y`, `-loglevel` ...)
    pub global_args: Vec<String>,
    /// Source first, then auxiliary inputs such as watermark images
    pub inputs: Vec<PathBuf>,
    pub filter_complex: Option<String>,
    pub outputs: Vec<OutputMapping>,
}

impl EncoderCommand {
    pub fn new(source: &Path) -> Self {
        Self {
            inputs: vec![source.to_path_buf()],
            ..Default::default()
        }
    }

    /// Flatten to the argument vector (without the binary name)
    pub fn to_args(&self) -> Vec<String> {
        let mut args = self.global_args.clone();

        for input in &self.inputs {
            args.push("-i".to_string());
            args.push(input.to_string_lossy().to_string());
        }

        if let Some(graph) = &self.filter_complex {
            args.push("-filter_complex".to_string());
            args.push(graph.clone());
        }

        for output in &self.outputs {
            for map in &output.maps {
                args.push("-map".to_string());
                args.push(map.clone());
            }
            args.extend(output.args.iter().cloned());
            args.push(output.path.to_string_lossy().to_string());
        }

        args
    }

    /// Shell-like rendering for logs
    pub fn display_line(&self, binary: &Path) -> String {
        let mut line = binary.to_string_lossy().to_string();
        for arg in self.to_args() {
            line.push(' ');
            if arg.is_empty() || arg.contains(|c: char| c.is_whitespace() || c == '$' || c == ';') {
                line.push('\'');
                line.push_str(&arg.replace('\'', "'\\''"));
                line.push('\'');
            } else {
                line.push_str(&arg);
            }
        }
        line
    }
}

/// Runs an encoder command to completion
pub trait Encoder {
    fn run(&self, command: &EncoderCommand) -> Result<(), EncoderError>;
}
