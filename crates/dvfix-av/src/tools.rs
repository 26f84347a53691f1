//! External tool resolution.
//!
//! A [`ToolResolver`] maps a logical tool name (`ffmpeg`, `dovi_tool`, ...)
//! to an executable path. How it does so depends on the [`ToolEnvironment`]:
//! inside a container the tools are expected on `PATH` (installed by the
//! container add-ons), on a plain host they must be configured explicitly.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const FFMPEG: &str = "ffmpeg";
pub const FFPROBE: &str = "ffprobe";
pub const DOVI_TOOL: &str = "dovi_tool";
pub const MKVMERGE: &str = "mkvmerge";
pub const MKVINFO: &str = "mkvinfo";

/// Tools the repair pipeline cannot run without, in resolution order.
pub const PIPELINE_TOOLS: &[&str] = &[DOVI_TOOL, MKVMERGE, MKVINFO, FFMPEG];

/// Every tool this crate knows how to drive.
pub const KNOWN_TOOLS: &[&str] = &[FFMPEG, FFPROBE, DOVI_TOOL, MKVMERGE, MKVINFO];

/// Marker file present in Docker containers.
const CONTAINER_MARKER: &str = "/.dockerenv";

/// Where the tools come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolEnvironment {
    /// Containerized: tools are looked up on `PATH`.
    Container,
    /// Bare host: tools come from the configured path registry.
    Host,
}

impl ToolEnvironment {
    /// Detect the environment from the running system.
    pub fn detect() -> Self {
        Self::detect_with_marker(Path::new(CONTAINER_MARKER))
    }

    fn detect_with_marker(marker: &Path) -> Self {
        if marker.exists() {
            ToolEnvironment::Container
        } else {
            ToolEnvironment::Host
        }
    }
}

/// Availability information for a tool, returned by [`ToolResolver::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version string (first line of version output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
    /// Why the tool is unavailable.
    pub problem: Option<String>,
}

/// Resolves logical tool names to executables for one pipeline run.
///
/// Outcomes are cached, so an unresolved tool is reported once no matter how
/// often it is asked for.
///
/// # Example
///
/// ```
/// use dvfix_av::tools::{ToolEnvironment, ToolResolver};
/// use std::collections::HashMap;
/// use std::path::PathBuf;
///
/// let mut registry = HashMap::new();
/// registry.insert("mkvmerge".to_string(), PathBuf::from("/opt/mkvtoolnix/mkvmerge"));
///
/// let mut resolver = ToolResolver::new(ToolEnvironment::Host, registry);
/// assert_eq!(
///     resolver.resolve("mkvmerge").unwrap(),
///     PathBuf::from("/opt/mkvtoolnix/mkvmerge")
/// );
/// assert!(resolver.resolve("dovi_tool").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct ToolResolver {
    environment: ToolEnvironment,
    registry: HashMap<String, PathBuf>,
    search_path: Option<OsString>,
    resolved: HashMap<String, std::result::Result<PathBuf, String>>,
}

impl ToolResolver {
    /// Create a resolver for the given environment and configured paths.
    pub fn new(environment: ToolEnvironment, registry: HashMap<String, PathBuf>) -> Self {
        Self {
            environment,
            registry,
            search_path: None,
            resolved: HashMap::new(),
        }
    }

    /// Override the `PATH` used for container lookups.
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    /// The environment this resolver was built for.
    pub fn environment(&self) -> ToolEnvironment {
        self.environment
    }

    /// Resolve a tool to its executable path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolNotFound`] carrying operator-facing guidance when
    /// the tool cannot be located. Reporting that error is left to the
    /// caller; the resolver only traces it at debug level, once.
    pub fn resolve(&mut self, name: &str) -> Result<PathBuf> {
        if let Some(cached) = self.resolved.get(name) {
            return cached
                .clone()
                .map_err(|message| Error::tool_not_found(name, message));
        }

        let outcome = self.lookup(name);
        match &outcome {
            Ok(_path) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Resolved {} to {:?}", name, _path);
            }
            Err(_message) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Cannot resolve {}: {}", name, _message);
            }
        }

        self.resolved.insert(name.to_string(), outcome.clone());
        outcome.map_err(|message| Error::tool_not_found(name, message))
    }

    /// Look a tool up without caching or logging.
    fn lookup(&self, name: &str) -> std::result::Result<PathBuf, String> {
        match self.environment {
            ToolEnvironment::Container => {
                let found = match &self.search_path {
                    Some(paths) => {
                        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
                        which::which_in(name, Some(paths), cwd)
                    }
                    None => which::which(name),
                };
                found.map_err(|_| {
                    format!(
                        "{name} not found; install both the MKVToolNix and dovi_tool container add-ons"
                    )
                })
            }
            ToolEnvironment::Host => self.registry.get(name).cloned().ok_or_else(|| {
                format!(
                    "{name} cannot be found; define a path for it (tools.{name}_path), see ffmpeg as an example"
                )
            }),
        }
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| match self.lookup(name) {
                Ok(path) => {
                    let version = detect_version(name, &path);
                    ToolInfo {
                        name: name.to_string(),
                        available: version.is_some(),
                        problem: version
                            .is_none()
                            .then(|| format!("{} did not run", path.display())),
                        version,
                        path: Some(path),
                    }
                }
                Err(problem) => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                    problem: Some(problem),
                },
            })
            .collect()
    }
}

/// Run the tool's version flag and return the first line of stdout.
fn detect_version(name: &str, path: &Path) -> Option<String> {
    let version_arg = match name {
        FFMPEG | FFPROBE => "-version",
        _ => "--version",
    };

    let output = Command::new(path).arg(version_arg).output().ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}
