//! The Segment record (§3) and the upstream `segment_<NNN>.ts` filename matcher.

/// One entry in a channel's output window: `(output_uri, duration_seconds, discontinuity_before)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// `<N>.ts`, where `N` is the monotonic output index at admission time.
    pub output_uri: String,
    /// Carried verbatim from the source playlist; no re-measurement.
    pub duration_secs: f64,
    /// Whether an `#EXT-X-DISCONTINUITY` must precede this segment in the output playlist.
    pub discontinuity_before: bool,
}

impl Segment {
    pub fn new(media_seq: u64, duration_secs: f64, discontinuity_before: bool) -> Self {
        Self {
            output_uri: format!("{media_seq}.ts"),
            duration_secs,
            discontinuity_before,
        }
    }

    /// The integer index encoded in `output_uri`, used to check invariants 1-2.
    pub fn index(&self) -> Option<u64> {
        self.output_uri.strip_suffix(".ts")?.parse().ok()
    }
}

/// Parse the upstream segment number out of a `segment_<NNN>.ts`-shaped URI.
///
/// Anything not matching that shape is skipped defensively, per §9's
/// "Segment-number parsing" note.
pub fn parse_upstream_segment_number(uri: &str) -> Option<u64> {
    let stem = uri.strip_suffix(".ts")?;
    let digits = stem.strip_prefix("segment_")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_segment_names() {
        assert_eq!(parse_upstream_segment_number("segment_000.ts"), Some(0));
        assert_eq!(parse_upstream_segment_number("segment_042.ts"), Some(42));
        assert_eq!(parse_upstream_segment_number("segment_12345.ts"), Some(12345));
    }

    #[test]
    fn rejects_malformed_segment_names() {
        assert_eq!(parse_upstream_segment_number("index.m3u8"), None);
        assert_eq!(parse_upstream_segment_number("segment_abc.ts"), None);
        assert_eq!(parse_upstream_segment_number("segment_.ts"), None);
        assert_eq!(parse_upstream_segment_number("seg_001.ts"), None);
        assert_eq!(parse_upstream_segment_number("segment_001.mp4"), None);
    }

    #[test]
    fn segment_index_round_trips() {
        let seg = Segment::new(7, 2.0, false);
        assert_eq!(seg.output_uri, "7.ts");
        assert_eq!(seg.index(), Some(7));
    }
}
