//! Media probing.
//!
//! - [`probe_with_ffprobe`] extracts the stream descriptors the repair
//!   pipeline needs (duration, first video codec, Dolby Vision presence).
//! - [`parse_frame_rate`] pulls the frame rate out of an `mkvinfo` report.

mod ffprobe;
mod mkvinfo;
mod types;

pub use ffprobe::{parse_ffprobe_json, probe_with_ffprobe};
pub use mkvinfo::parse_frame_rate;
pub use types::*;
