// SPDX-License-Identifier: MIT OR Apache-2.0
//! `Accept` header negotiation.

/// One media range from an `Accept` header.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRange {
    /// Lower-cased `type/subtype`.
    pub media_type: String,
    /// Quality in `0.0..=1.0`.
    pub quality: f32,
}

impl MediaRange {
    /// `application/json`, `*/json`, or a structured `+json` suffix.
    pub fn is_json(&self) -> bool {
        self.media_type.ends_with("/json") || self.media_type.ends_with("+json")
    }
}

/// Parse an `Accept` header into ranges ordered by preference.
///
/// Ranges with `q=0` are dropped. Ordering is by quality, highest first;
/// equal qualities keep header order. A missing or malformed `q` counts as 1.
pub fn parse_accept(header: &str) -> Vec<MediaRange> {
    let mut ranges: Vec<MediaRange> = header
        .split(',')
        .filter_map(|part| {
            let mut params = part.split(';');
            let media_type = params.next()?.trim().to_ascii_lowercase();
            if media_type.is_empty() {
                return None;
            }
            let quality = params
                .filter_map(|p| {
                    let (k, v) = p.split_once('=')?;
                    k.trim().eq_ignore_ascii_case("q").then(|| v.trim())
                })
                .next()
                .map_or(1.0, parse_quality);
            Some(MediaRange {
                media_type,
                quality,
            })
        })
        .filter(|r| r.quality > 0.0)
        .collect();
    ranges.sort_by(|a, b| b.quality.total_cmp(&a.quality));
    ranges
}

fn parse_quality(raw: &str) -> f32 {
    match raw.parse::<f32>() {
        Ok(q) if q.is_finite() => q.clamp(0.0, 1.0),
        _ => 1.0,
    }
}

/// Whether the client's most preferred media range is JSON.
///
/// A bare `*/*` does not count.
pub fn wants_json(header: &str) -> bool {
    parse_accept(header).first().is_some_and(MediaRange::is_json)
}
