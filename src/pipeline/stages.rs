//! Stage definitions and the exact command lines each stage runs.

use dvfix_av::ToolInvocation;
use std::fmt;
use std::path::Path;

/// Raw bitstream extracted from the original source.
pub const ORIGINAL_HEVC: &str = "original.hevc";
/// RPU sidecar extracted from the original bitstream.
pub const ORIGINAL_RPU: &str = "original.rpu";
/// Raw bitstream extracted from the working (transcoded) file.
pub const WORKING_HEVC: &str = "converted_video.hevc";
/// Working bitstream with the original RPU injected.
pub const FIXED_HEVC: &str = "fixed.hevc";
/// Final container; becomes the new working file.
pub const OUTPUT_MKV: &str = "converted.mkv";

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Validate,
    ExtractOriginalBitstream,
    ExtractOriginalMetadata,
    ExtractWorkingBitstream,
    InjectMetadata,
    ProbeFrameRate,
    Remux,
}

impl Stage {
    /// Label announced to the host when the stage starts.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Init | Stage::Validate => "Initializing",
            Stage::ExtractOriginalBitstream => "Extracting HEVC bitstream",
            Stage::ExtractOriginalMetadata => "Extracting RPU",
            Stage::ExtractWorkingBitstream => "Extracting converted video",
            Stage::InjectMetadata => "Replacing RPU",
            Stage::ProbeFrameRate => "Probing frame rate",
            Stage::Remux => "Finishing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn extract_original_bitstream(ffmpeg: &Path, original: &Path, output: &Path) -> ToolInvocation {
    let mut cmd = ToolInvocation::new(ffmpeg);
    cmd.arg("-i")
        .path_arg(original)
        .args(["-c:v", "copy", "-bsf:v", "hevc_mp4toannexb", "-f", "hevc"])
        .path_arg(output);
    cmd
}

pub fn extract_rpu(
    dovi_tool: &Path,
    drop_hdr10plus: bool,
    bitstream: &Path,
    rpu: &Path,
) -> ToolInvocation {
    let mut cmd = dovi_command(dovi_tool, drop_hdr10plus);
    cmd.args(["extract-rpu", "-o"]).path_arg(rpu).path_arg(bitstream);
    cmd
}

pub fn extract_working_bitstream(ffmpeg: &Path, working: &Path, output: &Path) -> ToolInvocation {
    let mut cmd = ToolInvocation::new(ffmpeg);
    cmd.arg("-i")
        .path_arg(working)
        .args(["-c:v", "copy"])
        .path_arg(output);
    cmd
}

pub fn inject_rpu(
    dovi_tool: &Path,
    drop_hdr10plus: bool,
    rpu: &Path,
    bitstream: &Path,
    output: &Path,
) -> ToolInvocation {
    let mut cmd = dovi_command(dovi_tool, drop_hdr10plus);
    cmd.args(["inject-rpu", "--rpu-in"])
        .path_arg(rpu)
        .arg("--input")
        .path_arg(bitstream)
        .arg("--output")
        .path_arg(output);
    cmd
}

pub fn probe_frame_rate(mkvinfo: &Path, working: &Path) -> ToolInvocation {
    let mut cmd = ToolInvocation::new(mkvinfo);
    cmd.path_arg(working);
    cmd
}

/// The fixed bitstream becomes track 0; everything but video is taken from
/// the working container.
pub fn remux(
    mkvmerge: &Path,
    frame_rate: Option<&str>,
    fixed: &Path,
    working: &Path,
    output: &Path,
) -> ToolInvocation {
    let mut cmd = ToolInvocation::new(mkvmerge);
    if let Some(fps) = frame_rate {
        cmd.arg("--default-duration")
            .arg(format!("0:{fps}fps"))
            .args(["--fix-bitstream-timing-information", "0"]);
    }
    cmd.arg("-o")
        .path_arg(output)
        .path_arg(fixed)
        .arg("-D")
        .path_arg(working)
        .args(["--track-order", "1:0"]);
    cmd
}

/// dovi_tool global options must precede the subcommand.
fn dovi_command(dovi_tool: &Path, drop_hdr10plus: bool) -> ToolInvocation {
    let mut cmd = ToolInvocation::new(dovi_tool);
    if drop_hdr10plus {
        cmd.arg("--drop-hdr10plus");
    }
    cmd.args(["--crop", "--mode", "2"]);
    cmd
}
