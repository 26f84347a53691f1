//! Running external tools while observing their output line by line.
//!
//! [`SystemRunner`] spawns the process, reads stdout and stderr on two reader
//! threads and forwards every line over a channel, so the [`LineHandlers`]
//! run on the calling thread while the tool is still working. A non-zero exit
//! code is *not* an error here: callers decide what an exit code means.

use crate::{Error, Result};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Poll interval while waiting on a process that closed its pipes but has
/// not exited yet.
const WAIT_POLL: Duration = Duration::from_millis(50);

/// Which output stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// A single external command: program, ordered arguments and an optional
/// timeout.
///
/// # Example
///
/// ```
/// use dvfix_av::ToolInvocation;
///
/// let mut cmd = ToolInvocation::new("/usr/bin/mkvinfo");
/// cmd.arg("/media/movie.mkv");
/// assert_eq!(cmd.tool_name(), "mkvinfo");
/// assert_eq!(cmd.arg_list(), ["/media/movie.mkv"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl ToolInvocation {
    /// Create a new invocation of the given program.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append a path argument.
    pub fn path_arg(&mut self, path: &Path) -> &mut Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Kill the process if it runs longer than `timeout`. `None` waits forever.
    pub fn timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// The program to execute.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// The ordered argument list.
    pub fn arg_list(&self) -> &[String] {
        &self.args
    }

    /// The configured timeout, if any.
    pub fn timeout_value(&self) -> Option<Duration> {
        self.timeout
    }

    /// Short program name for logs and errors (file name of the program).
    pub fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Human-readable command line, for logs only.
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Captured result of a finished tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Both streams interleaved in arrival order.
    pub output: String,
}

impl ToolOutput {
    /// Whether the tool exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Exit code for reporting; signal terminations report as -1.
    pub fn code(&self) -> i32 {
        self.exit_code.unwrap_or(-1)
    }

    /// Record one line from `stream`.
    pub fn push_line(&mut self, stream: Stream, line: &str) {
        let target = match stream {
            Stream::Stdout => &mut self.stdout,
            Stream::Stderr => &mut self.stderr,
        };
        target.push_str(line);
        target.push('\n');
        self.output.push_str(line);
        self.output.push('\n');
    }
}

type LineHandler<'a> = Box<dyn FnMut(&str) + 'a>;

/// Optional per-stream line callbacks.
#[derive(Default)]
pub struct LineHandlers<'a> {
    stdout: Option<LineHandler<'a>>,
    stderr: Option<LineHandler<'a>>,
}

impl<'a> LineHandlers<'a> {
    /// No handlers: output is only captured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `handler` for every stdout line.
    pub fn on_stdout(mut self, handler: impl FnMut(&str) + 'a) -> Self {
        self.stdout = Some(Box::new(handler));
        self
    }

    /// Call `handler` for every stderr line.
    pub fn on_stderr(mut self, handler: impl FnMut(&str) + 'a) -> Self {
        self.stderr = Some(Box::new(handler));
        self
    }

    /// Deliver one line to the handler for its stream, if any.
    pub fn dispatch(&mut self, stream: Stream, line: &str) {
        let handler = match stream {
            Stream::Stdout => self.stdout.as_mut(),
            Stream::Stderr => self.stderr.as_mut(),
        };
        if let Some(handler) = handler {
            handler(line);
        }
    }
}

impl std::fmt::Debug for LineHandlers<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineHandlers")
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .finish()
    }
}

/// Executes a [`ToolInvocation`], streaming its output to handlers.
pub trait CommandRunner {
    /// Run the command to completion.
    ///
    /// # Errors
    ///
    /// Only for failures to run at all (spawn errors, timeouts, I/O). A tool
    /// that ran and exited non-zero returns `Ok` with that exit code.
    fn run(&self, invocation: &ToolInvocation, handlers: &mut LineHandlers<'_>)
        -> Result<ToolOutput>;
}

/// [`CommandRunner`] backed by real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(
        &self,
        invocation: &ToolInvocation,
        handlers: &mut LineHandlers<'_>,
    ) -> Result<ToolOutput> {
        let tool = invocation.tool_name();

        #[cfg(feature = "tracing")]
        tracing::debug!("Running: {}", invocation.command_line());

        let mut child = Command::new(invocation.program())
            .args(invocation.arg_list())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                tool: tool.clone(),
                source,
            })?;

        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, Stream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, Stream::Stderr, tx.clone()));
        }
        drop(tx);

        let deadline = invocation.timeout_value().map(|t| Instant::now() + t);
        let mut output = ToolOutput::default();

        loop {
            let next = match deadline {
                None => rx.recv().ok(),
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match rx.recv_timeout(remaining) {
                        Ok(message) => Some(message),
                        Err(RecvTimeoutError::Disconnected) => None,
                        Err(RecvTimeoutError::Timeout) => {
                            return Err(kill_on_timeout(&mut child, invocation, tool));
                        }
                    }
                }
            };

            let Some((stream, line)) = next else {
                break;
            };
            handlers.dispatch(stream, &line);
            output.push_line(stream, &line);
        }

        for reader in readers {
            let _ = reader.join();
        }

        let status = match deadline {
            None => child.wait()?,
            Some(deadline) => match wait_until(&mut child, deadline)? {
                Some(status) => status,
                None => return Err(kill_on_timeout(&mut child, invocation, tool)),
            },
        };
        output.exit_code = status.code();

        #[cfg(feature = "tracing")]
        tracing::debug!("{} exited with {:?}", tool, output.exit_code);

        Ok(output)
    }
}

/// Read `source` until EOF, sending each line to `tx`.
///
/// Lines are split on `\n` *and* `\r`: progress meters redraw in place with
/// carriage returns and every redraw is a sample worth seeing.
fn spawn_reader<R>(source: R, stream: Stream, tx: Sender<(Stream, String)>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let reader = BufReader::new(source);
        for chunk in reader.split(b'\n') {
            let Ok(chunk) = chunk else {
                break;
            };
            for segment in chunk.split(|b| *b == b'\r') {
                if segment.is_empty() {
                    continue;
                }
                let line = String::from_utf8_lossy(segment).into_owned();
                if tx.send((stream, line)).is_err() {
                    return;
                }
            }
        }
    })
}

fn wait_until(child: &mut Child, deadline: Instant) -> Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(WAIT_POLL);
    }
}

fn kill_on_timeout(child: &mut Child, invocation: &ToolInvocation, tool: String) -> Error {
    let _ = child.kill();
    let _ = child.wait();
    Error::TimedOut {
        tool,
        timeout: invocation.timeout_value().unwrap_or_default(),
    }
}
