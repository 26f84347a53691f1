//! FFprobe-based media probing.

use super::types::*;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

const DOVI_SIDE_DATA: &str = "DOVI configuration record";

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: String,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: u32,
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    side_data_type: Option<String>,
    dv_profile: Option<u8>,
}

/// Probe a media file using the ffprobe binary at `ffprobe`.
pub fn probe_with_ffprobe(ffprobe: &Path, path: &Path) -> Result<MediaInfo> {
    if !path.exists() {
        return Err(Error::file_not_found(path));
    }

    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool_not_found("ffprobe", format!("{} does not exist", ffprobe.display()))
            } else {
                Error::Io(e)
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::tool_failed("ffprobe", stderr.trim().to_string()));
    }

    let json_str = String::from_utf8(output.stdout)
        .map_err(|e| Error::parse_error("ffprobe", format!("Invalid UTF-8: {}", e)))?;

    parse_ffprobe_json(path, &json_str)
}

/// Build [`MediaInfo`] from ffprobe's `-print_format json` output.
pub fn parse_ffprobe_json(path: &Path, json: &str) -> Result<MediaInfo> {
    let output: FfprobeOutput = serde_json::from_str(json)?;

    let duration = output
        .format
        .duration
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64);

    let video_streams = output
        .streams
        .into_iter()
        .filter(|s| s.codec_type == "video")
        .map(|stream| {
            let dovi = stream
                .side_data_list
                .iter()
                .find(|sd| sd.side_data_type.as_deref() == Some(DOVI_SIDE_DATA));

            VideoStream {
                index: stream.index,
                codec: stream.codec_name.unwrap_or_default().to_lowercase(),
                width: stream.width.unwrap_or(0),
                height: stream.height.unwrap_or(0),
                frame_rate: stream.r_frame_rate.and_then(|s| parse_rational(&s)),
                dolby_vision: dovi.is_some(),
                dv_profile: dovi.and_then(|sd| sd.dv_profile),
            }
        })
        .collect();

    Ok(MediaInfo {
        file_path: path.to_path_buf(),
        container: output.format.format_name,
        duration,
        video_streams,
    })
}

fn parse_rational(rate_str: &str) -> Option<f64> {
    if let Some((num, den)) = rate_str.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den != 0.0 {
            return Some(num / den);
        }
        return None;
    }
    rate_str.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DV_MKV: &str = r#"{
        "streams": [
            {
                "index": 0,
                "codec_name": "hevc",
                "codec_type": "video",
                "width": 3840,
                "height": 2160,
                "r_frame_rate": "24000/1001",
                "side_data_list": [
                    {
                        "side_data_type": "DOVI configuration record",
                        "dv_version_major": 1,
                        "dv_version_minor": 0,
                        "dv_profile": 8,
                        "dv_level": 6,
                        "rpu_present_flag": 1,
                        "el_present_flag": 0,
                        "bl_present_flag": 1,
                        "dv_bl_signal_compatibility_id": 1
                    }
                ]
            },
            {
                "index": 1,
                "codec_name": "eac3",
                "codec_type": "audio"
            }
        ],
        "format": {
            "filename": "movie.mkv",
            "format_name": "matroska,webm",
            "duration": "5400.125000"
        }
    }"#;

    #[test]
    fn test_dolby_vision_stream_detected() {
        let info = parse_ffprobe_json(Path::new("movie.mkv"), DV_MKV).unwrap();
        assert_eq!(info.container, "matroska,webm");
        assert_eq!(info.duration_secs(), 5400.125);

        let video = info.primary_video().unwrap();
        assert_eq!(video.codec, "hevc");
        assert!(video.has_supported_codec());
        assert!(video.dolby_vision);
        assert_eq!(video.dv_profile, Some(8));
        assert_eq!(video.width, 3840);
        assert!((video.frame_rate.unwrap() - 23.976).abs() < 0.001);
    }

    #[test]
    fn test_plain_stream_has_no_dolby_vision() {
        let json = r#"{
            "streams": [{"index": 0, "codec_name": "AV1", "codec_type": "video"}],
            "format": {"format_name": "matroska,webm"}
        }"#;
        let info = parse_ffprobe_json(Path::new("plain.mkv"), json).unwrap();
        let video = info.primary_video().unwrap();
        assert_eq!(video.codec, "av1");
        assert!(!video.has_supported_codec());
        assert!(!video.dolby_vision);
        assert_eq!(info.duration, None);
        assert_eq!(info.duration_secs(), 0.0);
    }

    #[test]
    fn test_audio_only_file_has_no_video() {
        let json = r#"{
            "streams": [{"index": 0, "codec_name": "flac", "codec_type": "audio"}],
            "format": {"format_name": "flac", "duration": "12.5"}
        }"#;
        let info = parse_ffprobe_json(Path::new("a.flac"), json).unwrap();
        assert!(info.primary_video().is_none());
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(matches!(
            parse_ffprobe_json(Path::new("x"), "{not json"),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_parse_rational() {
        assert_eq!(parse_rational("24000/1001"), Some(23.976023976023978));
        assert_eq!(parse_rational("30/1"), Some(30.0));
        assert_eq!(parse_rational("25"), Some(25.0));
        assert_eq!(parse_rational("0/0"), None);
        assert_eq!(parse_rational("invalid"), None);
    }
}
