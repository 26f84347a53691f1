//! Frame rate extraction from `mkvinfo` text reports.

use regex::Regex;
use std::sync::LazyLock;

static FRAME_RATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([.0-9]+) frames/fields").unwrap());

/// Find the first `<rate> frames/fields` figure in an `mkvinfo` report.
///
/// The value is returned verbatim so it can be handed straight back to
/// mkvmerge as a default duration.
///
/// # Example
///
/// ```
/// use dvfix_av::probe::parse_frame_rate;
///
/// let report = "|  + Default duration: 00:00:00.041708333 (23.976 frames/fields per second for a video track)";
/// assert_eq!(parse_frame_rate(report).as_deref(), Some("23.976"));
/// ```
pub fn parse_frame_rate(report: &str) -> Option<String> {
    FRAME_RATE_REGEX
        .captures(report)
        .map(|caps| caps[1].to_string())
}
