use dvfix_av::tools::{self, ToolEnvironment};
use dvfix_av::Platform;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub platform: PlatformConfig,

    #[serde(default)]
    pub fix: FixConfig,
}

/// How tool locations are discovered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentSetting {
    /// Container if `/.dockerenv` exists, host otherwise.
    #[default]
    Auto,
    Container,
    Host,
}

impl EnvironmentSetting {
    pub fn resolve(self) -> ToolEnvironment {
        match self {
            EnvironmentSetting::Auto => ToolEnvironment::detect(),
            EnvironmentSetting::Container => ToolEnvironment::Container,
            EnvironmentSetting::Host => ToolEnvironment::Host,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub environment: EnvironmentSetting,

    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    #[serde(default)]
    pub mkvmerge_path: Option<PathBuf>,

    #[serde(default)]
    pub mkvinfo_path: Option<PathBuf>,

    #[serde(default)]
    pub dovi_tool_path: Option<PathBuf>,

    /// Per-tool timeout in seconds; 0 or absent waits forever.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ToolsConfig {
    /// Configured tool paths keyed by logical tool name.
    pub fn registry(&self) -> HashMap<String, PathBuf> {
        self.paths()
            .into_iter()
            .filter_map(|(name, path)| path.map(|p| (name.to_string(), p.clone())))
            .collect()
    }

    /// Every configurable path, set or not.
    pub fn paths(&self) -> [(&'static str, Option<&PathBuf>); 5] {
        [
            (tools::FFMPEG, self.ffmpeg_path.as_ref()),
            (tools::FFPROBE, self.ffprobe_path.as_ref()),
            (tools::MKVMERGE, self.mkvmerge_path.as_ref()),
            (tools::MKVINFO, self.mkvinfo_path.as_ref()),
            (tools::DOVI_TOOL, self.dovi_tool_path.as_ref()),
        ]
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlatformConfig {
    /// Treat the host as Windows (no terminal shim). Detected when absent.
    #[serde(default)]
    pub windows: Option<bool>,

    #[serde(default = "default_pty_wrapper")]
    pub pty_wrapper: PathBuf,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            windows: None,
            pty_wrapper: default_pty_wrapper(),
        }
    }
}

impl PlatformConfig {
    pub fn resolve(&self) -> Platform {
        let windows = self.windows.unwrap_or(cfg!(windows));
        Platform::new(windows, self.pty_wrapper.clone())
    }
}

fn default_pty_wrapper() -> PathBuf {
    PathBuf::from(dvfix_av::platform::DEFAULT_PTY_WRAPPER)
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct FixConfig {
    /// Drop the HDR10+ layer while extracting and injecting the RPU.
    #[serde(default)]
    pub remove_hdr10plus: bool,

    /// Treat mkvmerge exit code 1 (warnings) as success.
    #[serde(default)]
    pub accept_mkvmerge_warnings: bool,
}
