//! ffmpeg command-line encoder

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Instant;

use crate::config::EncoderConfig;
use crate::error::EncoderError;

use super::{Encoder, EncoderCommand};

/// Number of trailing stderr lines kept in a failure report
const STDERR_TAIL_LINES: usize = 20;

/// Runs the ffmpeg binary as a blocking child process
#[derive(Debug, Clone)]
pub struct FfmpegCli {
    binary: PathBuf,
}

impl FfmpegCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn from_config(config: &EncoderConfig) -> Self {
        Self::new(config.binary.clone())
    }

    pub fn binary(&self) -> &PathBuf {
        &self.binary
    }
}

impl Default for FfmpegCli {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

impl Encoder for FfmpegCli {
    fn run(&self, command: &EncoderCommand) -> Result<(), EncoderError> {
        tracing::info!(
            outputs = command.outputs.len(),
            "Running encoder: {}",
            command.display_line(&self.binary)
        );
        let start = Instant::now();

        let output = Command::new(&self.binary)
            .args(command.to_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EncoderError::NotFound(self.binary.clone())
                } else {
                    EncoderError::Spawn(e)
                }
            })?;

        if !output.status.success() {
            let stderr = stderr_tail(&output.stderr);
            tracing::error!(status = %output.status, "Encoder failed: {}", stderr);
            return Err(EncoderError::Failed {
                status: output.status.to_string(),
                stderr,
            });
        }

        tracing::info!("Encoder finished in {:.1}s", start.elapsed().as_secs_f64());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_missing_binary() {
        let encoder = FfmpegCli::new("/nonexistent/path/to/ffmpeg");
        let cmd = EncoderCommand::new(Path::new("in.mp4"));
        let err = encoder.run(&cmd).unwrap_err();
        assert!(matches!(err, EncoderError::NotFound(_)));
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let text: String = (0..30).map(|i| format!("line {}\n\n", i)).collect();
        let tail = stderr_tail(text.as_bytes());
        assert_eq!(tail.lines().count(), STDERR_TAIL_LINES);
        assert!(tail.starts_with("line 10"));
        assert!(tail.ends_with("line 29"));
    }

    #[test]
    fn test_from_config() {
        let encoder = FfmpegCli::from_config(&EncoderConfig::default());
        assert_eq!(encoder.binary(), &PathBuf::from("ffmpeg"));
    }
}
