//! Encoder argument construction
//!
//! Builds the per-output argument list: codec settings for the format,
//! the caller's own parameters, then the segmenting parameters the
//! streaming muxer needs.

use std::path::Path;

use crate::config::{ExportTarget, StreamingParams};
use crate::descriptor::RepresentationDescriptor;
use crate::error::Result;
use crate::format::{FixedValues, FormatSpec};

fn push(args: &mut Vec<String>, flag: &str, value: impl ToString) {
    args.push(flag.to_string());
    args.push(value.to_string());
}

/// Codec and bitrate arguments for one output
pub fn codec_args(format: &FormatSpec, source_has_audio: bool) -> Vec<String> {
    let mut args = Vec::new();
    match format {
        FormatSpec::Video {
            codec,
            bitrate_kbps,
            resolution,
            audio,
        } => {
            push(&mut args, "-c:v", codec);
            push(&mut args, "-b:v", format!("{}k", bitrate_kbps));
            if let Some(res) = resolution {
                push(&mut args, "-s", res);
            }
            match audio {
                Some(a) if source_has_audio => {
                    push(&mut args, "-c:a", &a.codec);
                    push(&mut args, "-b:a", format!("{}k", a.bitrate_kbps));
                    if let Some(channels) = a.channels {
                        push(&mut args, "-ac", channels);
                    }
                }
                _ => {}
            }
        }
        // Audio destined for a video-container muxer is encoded the same
        // way; the muxer decides the container.
        FormatSpec::Audio(a) | FormatSpec::MuxedAudioInForVideoContainer(a) => {
            args.push("-vn".to_string());
            push(&mut args, "-c:a", &a.codec);
            push(&mut args, "-b:a", format!("{}k", a.bitrate_kbps));
            if let Some(channels) = a.channels {
                push(&mut args, "-ac", channels);
            }
        }
    }
    args
}

/// Streaming arguments merged after the descriptor's own parameters.
///
/// Order: `-sc_threshold`, `-g`, segment type, segment duration, media
/// segment name and, when configured, the init segment name.
///
/// `output_dir` is the directory of the sub-manifest. The HLS muxer
/// resolves segment filenames against the working directory, so they
/// are placed there explicitly.
pub fn streaming_args(
    descriptor: &RepresentationDescriptor,
    params: &StreamingParams,
    target: ExportTarget,
    source_has_audio: bool,
    output_dir: &Path,
) -> Result<Vec<String>> {
    params.validate()?;

    let mut args = descriptor.additional_params.clone();
    let segment_type = params.segment_type.muxer_value(target)?;
    let ordinal = descriptor.ordinal.to_string();
    let values = FixedValues {
        representation_id: &ordinal,
        bandwidth: descriptor.declared_bandwidth(source_has_audio),
        ext: params.segment_type.segment_ext(),
    };

    push(&mut args, "-sc_threshold", 0);
    push(&mut args, "-g", params.key_frame_interval);

    match target {
        ExportTarget::Dash => {
            push(&mut args, "-dash_segment_type", segment_type);
            push(&mut args, "-seg_duration", params.segment_length_secs);
            push(&mut args, "-media_seg_name", descriptor.segment_template.as_str());
            if let Some(init) = &descriptor.init_template {
                push(&mut args, "-init_seg_name", init.as_str());
            }
            push(&mut args, "-use_template", 1);
            push(&mut args, "-use_timeline", 1);
        }
        ExportTarget::Hls => {
            push(&mut args, "-hls_segment_type", segment_type);
            push(&mut args, "-hls_time", params.segment_length_secs);
            let pattern = descriptor.segment_template.to_printf(&values)?;
            push(
                &mut args,
                "-hls_segment_filename",
                output_dir.join(pattern).to_string_lossy(),
            );
            if let Some(init) = &descriptor.init_template {
                push(&mut args, "-hls_fmp4_init_filename", init.expand(&values, 0, 0));
            }
            push(&mut args, "-hls_playlist_type", "vod");
        }
    }

    Ok(args)
}

/// Everything that goes between an output's `-map`s and its path
pub fn output_args(
    descriptor: &RepresentationDescriptor,
    params: &StreamingParams,
    target: ExportTarget,
    source_has_audio: bool,
    output_dir: &Path,
) -> Result<Vec<String>> {
    let mut args = codec_args(&descriptor.format, source_has_audio);
    args.extend(streaming_args(
        descriptor,
        params,
        target,
        source_has_audio,
        output_dir,
    )?);
    push(&mut args, "-f", target.muxer());
    tracing::debug!(
        representation = descriptor.ordinal,
        "Encoder arguments: {}",
        args.join(" ")
    );
    Ok(args)
}
