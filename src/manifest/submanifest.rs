//! Per-representation manifest contents
//!
//! Whatever the encoder wrote for one output, reduced to what master
//! manifest synthesis needs: stream attributes, segment addressing and
//! the segment timeline.

use crate::format::Resolution;
use crate::timeline::Rational;

/// Upper bound on the segments one representation may expand to
pub const MAX_SEGMENTS: u64 = 1_000_000;

/// One `<S>` element of a DASH segment timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineEntry {
    pub t: Option<u64>,
    pub d: u64,
    /// Additional repetitions after the first
    pub r: u64,
}

/// One media segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub duration: Rational,
    pub byte_length: Option<u64>,
    pub uri: Option<String>,
}

/// Parsed sub-manifest of one representation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubManifest {
    /// Representation id the encoder assigned
    pub representation_id: Option<String>,
    pub codecs: Option<String>,
    pub bandwidth: Option<u64>,
    pub mime_type: Option<String>,
    pub resolution: Option<Resolution>,
    /// Frame rate as written, e.g. `25` or `30000/1001`
    pub frame_rate: Option<String>,
    pub audio_sampling_rate: Option<u32>,
    pub timescale: u64,
    pub start_number: u64,
    pub media_template: Option<String>,
    pub init_template: Option<String>,
    /// `SegmentTemplate@duration` in timescale units
    pub template_duration: Option<u64>,
    pub timeline: Vec<TimelineEntry>,
    pub segments: Vec<Segment>,
    pub presentation_duration: Option<Rational>,
    /// HLS `#EXT-X-TARGETDURATION`
    pub target_duration: Option<u64>,
}

impl SubManifest {
    /// Total media duration, `None` if the segment sum cannot be represented
    pub fn total_duration(&self) -> Option<Rational> {
        if self.segments.is_empty() {
            Some(self.presentation_duration.unwrap_or_default())
        } else {
            self.segments
                .iter()
                .try_fold(Rational::ZERO, |acc, s| acc.checked_add(s.duration))
        }
    }

    /// Nominal segment duration used to align representations
    ///
    /// The template duration when the encoder declared one; otherwise the
    /// longest segment, ignoring the final segment which may be cut short.
    pub fn nominal_segment_duration(&self) -> Option<Rational> {
        if self.segments.is_empty() {
            return self
                .template_duration
                .and_then(|d| Rational::from_ticks(d, self.timescale.max(1)));
        }
        let body = if self.segments.len() > 1 {
            &self.segments[..self.segments.len() - 1]
        } else {
            &self.segments[..]
        };
        body.iter().map(|s| s.duration).max()
    }

    /// Highest per-segment bitrate, when segment sizes are known
    pub fn peak_bandwidth(&self) -> Option<u64> {
        self.segments
            .iter()
            .filter_map(|s| {
                let bytes = s.byte_length?;
                s.duration.rate_per_sec(bytes.checked_mul(8)?)
            })
            .max()
    }

    /// Mean bitrate over the whole representation, when every segment size is known
    pub fn average_bandwidth(&self) -> Option<u64> {
        if self.segments.is_empty() {
            return None;
        }
        let mut bytes = 0u64;
        for segment in &self.segments {
            bytes = bytes.checked_add(segment.byte_length?)?;
        }
        self.total_duration()?.rate_per_sec(bytes.checked_mul(8)?)
    }

    /// Expand a timeline into segments at the manifest timescale.
    /// Fails when the timeline repeats past `MAX_SEGMENTS`.
    pub(crate) fn expand_timeline(&mut self) -> std::result::Result<(), String> {
        let mut count = 0u64;
        for entry in &self.timeline {
            count = count.saturating_add(entry.r).saturating_add(1);
            if count > MAX_SEGMENTS {
                return Err(format!("segment timeline expands past {} segments", MAX_SEGMENTS));
            }
        }
        let timescale = self.timescale.max(1);
        self.segments = self
            .timeline
            .iter()
            .flat_map(|e| {
                let duration = Rational::from_ticks(e.d, timescale).unwrap_or_default();
                std::iter::repeat(duration).take(e.r as usize + 1)
            })
            .map(|duration| Segment {
                duration,
                byte_length: None,
                uri: None,
            })
            .collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(ms: u64, bytes: Option<u64>) -> Segment {
        Segment {
            duration: Rational::from_ticks(ms, 1000).unwrap(),
            byte_length: bytes,
            uri: None,
        }
    }

    #[test]
    fn test_nominal_ignores_short_tail() {
        let sub = SubManifest {
            segments: vec![seg(4000, None), seg(4000, None), seg(1500, None)],
            ..Default::default()
        };
        assert_eq!(sub.nominal_segment_duration(), Rational::new(4, 1));
        assert_eq!(sub.total_duration(), Rational::new(19, 2));
    }

    #[test]
    fn test_nominal_from_template() {
        let sub = SubManifest {
            timescale: 1000,
            template_duration: Some(4000),
            presentation_duration: Rational::new(60, 1),
            ..Default::default()
        };
        assert_eq!(sub.nominal_segment_duration(), Rational::new(4, 1));
        assert_eq!(sub.total_duration(), Some(Rational::from_secs(60)));
    }

    #[test]
    fn test_expand_timeline() {
        let mut sub = SubManifest {
            timescale: 90000,
            timeline: vec![
                TimelineEntry { t: Some(0), d: 360000, r: 2 },
                TimelineEntry { t: None, d: 90000, r: 0 },
            ],
            ..Default::default()
        };
        sub.expand_timeline().unwrap();
        assert_eq!(sub.segments.len(), 4);
        assert_eq!(sub.total_duration(), Some(Rational::from_secs(13)));
    }

    #[test]
    fn test_expand_timeline_bounded() {
        let mut sub = SubManifest {
            timescale: 1000,
            timeline: vec![TimelineEntry { t: Some(0), d: 4000, r: 9_000_000_000_000 }],
            ..Default::default()
        };
        assert!(sub.expand_timeline().is_err());
        assert!(sub.segments.is_empty());

        sub.timeline = vec![
            TimelineEntry { t: Some(0), d: 4000, r: u64::MAX },
            TimelineEntry { t: None, d: 4000, r: u64::MAX },
        ];
        assert!(sub.expand_timeline().is_err());
    }

    #[test]
    fn test_bandwidth_from_byte_ranges() {
        let sub = SubManifest {
            segments: vec![seg(4000, Some(500_000)), seg(4000, Some(250_000))],
            ..Default::default()
        };
        assert_eq!(sub.peak_bandwidth(), Some(1_000_000));
        assert_eq!(sub.average_bandwidth(), Some(750_000));

        let partial = SubManifest {
            segments: vec![seg(4000, Some(500_000)), seg(4000, None)],
            ..Default::default()
        };
        assert_eq!(partial.average_bandwidth(), None);
    }
}
