//! Media information types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Codec name of the only video format the repair pipeline handles.
pub const SUPPORTED_CODEC: &str = "hevc";

/// What the pipeline needs to know about a media file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Path to the media file.
    pub file_path: PathBuf,
    /// Container format as reported by the prober (e.g. "matroska,webm").
    pub container: String,
    /// Duration of the media.
    pub duration: Option<Duration>,
    /// Video streams in file order.
    pub video_streams: Vec<VideoStream>,
}

/// Descriptor of a single video stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VideoStream {
    /// Stream index within the container.
    pub index: u32,
    /// Codec name, lower case (e.g. "hevc", "av1").
    pub codec: String,
    pub width: u32,
    pub height: u32,
    /// Frame rate in FPS.
    pub frame_rate: Option<f64>,
    /// Whether the stream carries a Dolby Vision configuration record.
    pub dolby_vision: bool,
    /// Dolby Vision profile, when reported.
    pub dv_profile: Option<u8>,
}

impl MediaInfo {
    /// The first video stream, which is the one the pipeline repairs.
    pub fn primary_video(&self) -> Option<&VideoStream> {
        self.video_streams.first()
    }

    /// Duration in seconds, or 0 when unknown.
    pub fn duration_secs(&self) -> f64 {
        self.duration.map(|d| d.as_secs_f64()).unwrap_or(0.0)
    }
}

impl VideoStream {
    /// Whether the codec is the one the metadata tool supports.
    pub fn has_supported_codec(&self) -> bool {
        self.codec.eq_ignore_ascii_case(SUPPORTED_CODEC)
    }
}
