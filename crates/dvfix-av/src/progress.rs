//! Translating tool progress chatter into completion percentages.
//!
//! ffmpeg reports how far it got as `time=HH:MM:SS.ms` on stderr; dovi_tool
//! and mkvmerge print a bare ` NN%`. Everything else a tool prints is
//! informational text.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

static TIMESTAMP_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)time=([.:0-9]+)").unwrap());

static PERCENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)([0-9]+)%").unwrap());

/// Terminal control sequences (`ESC [ ... letter`) plus the `[2K` erase-line
/// remnant left behind when the escape byte itself was lost.
static CONTROL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]|\[2K|\x1b|\r").unwrap());

/// One interpreted line of tool output.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressSample {
    /// Completion percentage. Advisory: may exceed 100 when the duration
    /// estimate is short.
    Percent(f64),
    /// Anything else, with control sequences removed.
    Info(String),
}

/// How a tool encodes its progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressParser {
    /// `time=HH:MM:SS.ms` tokens measured against a total duration in seconds.
    Timestamp { duration: f64 },
    /// Bare integer percentages such as ` 42%`.
    Percent,
}

impl ProgressParser {
    /// Interpret a single line. Blank lines (after stripping control
    /// sequences) yield `None`.
    ///
    /// # Example
    ///
    /// ```
    /// use dvfix_av::progress::{ProgressParser, ProgressSample};
    ///
    /// let ffmpeg = ProgressParser::Timestamp { duration: 120.0 };
    /// assert_eq!(
    ///     ffmpeg.parse("frame= 1440 fps=96 time=00:01:00.00 bitrate=N/A"),
    ///     Some(ProgressSample::Percent(50.0))
    /// );
    ///
    /// let dovi = ProgressParser::Percent;
    /// assert_eq!(dovi.parse("Parsing RPU file... 42%"), Some(ProgressSample::Percent(42.0)));
    /// ```
    pub fn parse(&self, line: &str) -> Option<ProgressSample> {
        let cleaned = strip_control_sequences(line);
        let cleaned = cleaned.trim_end();

        let percent = match self {
            ProgressParser::Timestamp { duration } => timestamp_percent(cleaned, *duration),
            ProgressParser::Percent => PERCENT_REGEX
                .captures(cleaned)
                .and_then(|caps| caps[1].parse::<u32>().ok())
                .map(f64::from),
        };

        match percent {
            Some(value) => Some(ProgressSample::Percent(value)),
            None if cleaned.trim().is_empty() => None,
            None => Some(ProgressSample::Info(cleaned.to_string())),
        }
    }
}

fn timestamp_percent(line: &str, duration: f64) -> Option<f64> {
    if duration <= 0.0 {
        return None;
    }
    let caps = TIMESTAMP_REGEX.captures(line)?;
    let seconds = timestamp_to_seconds(&caps[1])?;
    Some(seconds / duration * 100.0)
}

/// Convert `HH:MM:SS.ms` (or any right-aligned subset of it) to seconds.
///
/// Fields are read right to left as seconds, minutes and hours.
pub fn timestamp_to_seconds(text: &str) -> Option<f64> {
    let mut seconds = 0.0;
    for (field, scale) in text.rsplit(':').zip([1.0, 60.0, 3600.0]) {
        let value: f64 = field.parse().ok()?;
        seconds += value * scale;
    }
    Some(seconds)
}

/// Remove cursor movement / erase codes that tools emit when they think they
/// own a terminal.
pub fn strip_control_sequences(line: &str) -> Cow<'_, str> {
    CONTROL_REGEX.replace_all(line, "")
}
