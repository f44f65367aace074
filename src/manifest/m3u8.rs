//! HLS media playlist reader

use std::path::Path;

use crate::error::{ExportError, Result};
use crate::timeline::Rational;

use super::submanifest::{Segment, SubManifest};

fn quoted_attr(line: &str, key: &str) -> Option<String> {
    regex!(r#"([A-Z0-9-]+)=("[^"]*"|[^,]*)"#)
        .captures_iter(line)
        .find(|c| &c[1] == key)
        .map(|c| c[2].trim_matches('"').to_string())
}

/// Parse a media playlist written by the HLS muxer
pub fn parse(path: &Path, text: &str) -> Result<SubManifest> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    if lines.next() != Some("#EXTM3U") {
        return Err(ExportError::manifest_read(path, "missing #EXTM3U header"));
    }

    let mut sub = SubManifest {
        timescale: 1,
        start_number: 0,
        ..Default::default()
    };
    let mut pending_duration: Option<Rational> = None;
    let mut pending_bytes: Option<u64> = None;
    let mut ended = false;

    for line in lines {
        if let Some(value) = line.strip_prefix("#EXTINF:") {
            let duration = value.split(',').next().unwrap_or_default();
            pending_duration = Some(Rational::parse_decimal(duration).ok_or_else(|| {
                ExportError::manifest_read(path, format!("invalid #EXTINF duration {:?}", duration))
            })?);
        } else if let Some(value) = line.strip_prefix("#EXT-X-BYTERANGE:") {
            let length = value.split('@').next().unwrap_or_default();
            pending_bytes = Some(length.parse().map_err(|_| {
                ExportError::manifest_read(path, format!("invalid byte range {:?}", value))
            })?);
        } else if let Some(value) = line.strip_prefix("#EXT-X-TARGETDURATION:") {
            sub.target_duration = value.parse().ok();
        } else if let Some(value) = line.strip_prefix("#EXT-X-MEDIA-SEQUENCE:") {
            sub.start_number = value.parse().map_err(|_| {
                ExportError::manifest_read(path, format!("invalid media sequence {:?}", value))
            })?;
        } else if line.starts_with("#EXT-X-MAP:") {
            sub.init_template = quoted_attr(line, "URI");
        } else if line.starts_with("#EXT-X-STREAM-INF") {
            return Err(ExportError::manifest_read(path, "expected a media playlist, found a master playlist"));
        } else if line == "#EXT-X-ENDLIST" {
            ended = true;
        } else if !line.starts_with('#') {
            let duration = pending_duration.take().ok_or_else(|| {
                ExportError::manifest_read(path, format!("segment {:?} has no #EXTINF", line))
            })?;
            sub.segments.push(Segment {
                duration,
                byte_length: pending_bytes.take(),
                uri: Some(line.to_string()),
            });
        }
    }

    if !ended {
        return Err(ExportError::manifest_read(path, "playlist is not finished (no #EXT-X-ENDLIST)"));
    }
    if sub.segments.is_empty() {
        return Err(ExportError::manifest_read(path, "playlist has no segments"));
    }
    if sub.total_duration().is_none() {
        return Err(ExportError::manifest_read(path, "segment durations overflow"));
    }
    sub.media_template = sub.segments.first().and_then(|s| s.uri.clone());

    Ok(sub)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYLIST: &str = "#EXTM3U
#EXT-X-VERSION:7
#EXT-X-TARGETDURATION:4
#EXT-X-MEDIA-SEQUENCE:0
#EXT-X-PLAYLIST-TYPE:VOD
#EXT-X-MAP:URI=\"init_0.mp4\"
#EXTINF:4.000000,
#EXT-X-BYTERANGE:500000@0
adaptive_0_250_00000.m4s
#EXTINF:4.000000,
#EXT-X-BYTERANGE:400000@500000
adaptive_0_250_00001.m4s
#EXTINF:2.000000,
#EXT-X-BYTERANGE:100000@900000
adaptive_0_250_00002.m4s
#EXT-X-ENDLIST
";

    #[test]
    fn test_parse_media_playlist() {
        let sub = parse(Path::new("a.m3u8"), PLAYLIST).unwrap();
        assert_eq!(sub.segments.len(), 3);
        assert_eq!(sub.target_duration, Some(4));
        assert_eq!(sub.init_template.as_deref(), Some("init_0.mp4"));
        assert_eq!(sub.total_duration(), Some(Rational::from_secs(10)));
        assert_eq!(sub.nominal_segment_duration(), Some(Rational::from_secs(4)));
        assert_eq!(sub.peak_bandwidth(), Some(1_000_000));
        assert_eq!(sub.average_bandwidth(), Some(800_000));
    }

    #[test]
    fn test_rejects_unfinished_or_master() {
        let path = Path::new("a.m3u8");
        let unfinished = PLAYLIST.replace("#EXT-X-ENDLIST\n", "");
        assert!(matches!(
            parse(path, &unfinished).unwrap_err(),
            ExportError::ManifestRead { .. }
        ));
        assert!(parse(path, "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\nv.m3u8\n").is_err());
        assert!(parse(path, "not a playlist").is_err());
        assert!(parse(path, "#EXTM3U\n#EXTINF:abc,\na.ts\n#EXT-X-ENDLIST\n").is_err());
    }

    #[test]
    fn test_long_decimal_durations() {
        let text = "#EXTM3U\n#EXT-X-TARGETDURATION:300\n\
            #EXTINF:300.000000000000000001,\na0.ts\n\
            #EXTINF:300.000000000000000001,\na1.ts\n\
            #EXTINF:300.000000000000000001,\na2.ts\n#EXT-X-ENDLIST\n";
        let sub = parse(Path::new("long.m3u8"), text).unwrap();
        assert_eq!(sub.total_duration(), Some(Rational::from_secs(900)));
        assert_eq!(sub.nominal_segment_duration(), Some(Rational::from_secs(300)));
    }
}
