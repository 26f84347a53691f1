//! Host platform capabilities and the pseudo-terminal shim.
//!
//! dovi_tool only prints its percentage meter when stdout is a terminal. On
//! non-Windows hosts its invocations are therefore run through `script`,
//! which allocates a pseudo-terminal, runs the flattened command line and
//! passes the child's exit code through.

use crate::command::ToolInvocation;
use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// Default pseudo-terminal wrapper program (util-linux `script`).
pub const DEFAULT_PTY_WRAPPER: &str = "script";

/// `script` flags: quiet, return the child's exit code, flush, run a command.
const PTY_WRAPPER_FLAGS: &str = "-qefc";

/// `script` insists on a typescript file; the transcript is thrown away.
const PTY_TRANSCRIPT: &str = "/dev/null";

/// Platform facts resolved once at startup and injected into the stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    windows: bool,
    pty_wrapper: PathBuf,
}

impl Default for Platform {
    fn default() -> Self {
        Self::detect()
    }
}

impl Platform {
    /// Platform of the running binary.
    pub fn detect() -> Self {
        Self::new(cfg!(windows), DEFAULT_PTY_WRAPPER)
    }

    /// Explicit platform, e.g. from configuration.
    pub fn new(windows: bool, pty_wrapper: impl Into<PathBuf>) -> Self {
        Self {
            windows,
            pty_wrapper: pty_wrapper.into(),
        }
    }

    pub fn is_windows(&self) -> bool {
        self.windows
    }

    pub fn pty_wrapper(&self) -> &Path {
        &self.pty_wrapper
    }

    /// Rewrite `invocation` so the tool believes it is attached to a
    /// terminal. Windows invocations are returned unchanged.
    ///
    /// # Example
    ///
    /// ```
    /// use dvfix_av::{Platform, ToolInvocation};
    ///
    /// let mut cmd = ToolInvocation::new("/usr/bin/dovi_tool");
    /// cmd.args(["--crop", "extract-rpu", "/tmp/work/original.hevc"]);
    ///
    /// let wrapped = Platform::new(false, "script").terminal_invocation(cmd);
    /// assert_eq!(wrapped.tool_name(), "script");
    /// assert_eq!(
    ///     wrapped.arg_list(),
    ///     ["-qefc", "/usr/bin/dovi_tool --crop extract-rpu /tmp/work/original.hevc", "/dev/null"]
    /// );
    /// ```
    pub fn terminal_invocation(&self, invocation: ToolInvocation) -> ToolInvocation {
        if self.windows {
            return invocation;
        }

        let mut payload = shell_quote(&invocation.program().to_string_lossy()).into_owned();
        for arg in invocation.arg_list() {
            payload.push(' ');
            payload.push_str(&shell_quote(arg));
        }

        let mut wrapped = ToolInvocation::new(self.pty_wrapper.clone());
        wrapped
            .args([PTY_WRAPPER_FLAGS, payload.as_str(), PTY_TRANSCRIPT])
            .timeout(invocation.timeout_value());
        wrapped
    }
}

/// Quote `arg` for a POSIX shell if it contains anything beyond a safe set.
fn shell_quote(arg: &str) -> Cow<'_, str> {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c));
    if safe {
        Cow::Borrowed(arg)
    } else {
        Cow::Owned(format!("'{}'", arg.replace('\'', r"'\''")))
    }
}
