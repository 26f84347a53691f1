//! # dvfix-av
//!
//! Plumbing for driving the external media tools used to repair Dolby Vision
//! metadata: ffmpeg, ffprobe, dovi_tool and the MKVToolNix binaries.
//!
//! This crate provides:
//! - Tool resolution for containerized and bare-host installs
//! - Line-streaming process execution with optional timeouts
//! - Progress parsing for ffmpeg timestamps and percentage meters
//! - The pseudo-terminal shim dovi_tool needs to print progress
//! - Probing (ffprobe JSON, mkvinfo frame rates)
//! - Scratch workspaces whose intermediates clean themselves up
//!
//! ## Features
//!
//! - `tracing` - Emit tracing events from the runner, resolver and workspace
//!
//! ## Example
//!
//! ```no_run
//! use dvfix_av::{CommandRunner, LineHandlers, SystemRunner, ToolInvocation};
//!
//! let mut cmd = ToolInvocation::new("mkvinfo");
//! cmd.arg("/media/movie.mkv");
//! let output = SystemRunner.run(&cmd, &mut LineHandlers::new())?;
//! if let Some(fps) = dvfix_av::probe::parse_frame_rate(&output.stdout) {
//!     println!("Frame rate: {fps}");
//! }
//! # Ok::<(), dvfix_av::Error>(())
//! ```

mod error;
pub mod command;
pub mod platform;
pub mod probe;
pub mod progress;
pub mod tools;
pub mod workspace;

// Re-exports
pub use command::{CommandRunner, LineHandlers, Stream, SystemRunner, ToolInvocation, ToolOutput};
pub use error::{Error, Result};
pub use platform::Platform;
pub use probe::{MediaInfo, VideoStream};
pub use progress::{ProgressParser, ProgressSample};
pub use tools::{ToolEnvironment, ToolInfo, ToolResolver};
pub use workspace::{Artifact, Workspace};
