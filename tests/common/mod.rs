//! Shared test harness for pipeline integration tests.
//!
//! [`ScriptedRunner`] stands in for the external tools: it records every
//! invocation, replays queued replies per tool, and writes the file a real
//! tool would have produced so cleanup can be observed on disk.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use dvfix::pipeline::{PipelineContext, PipelineExecutor, PipelineOptions, ProgressReporter};
use dvfix_av::tools::{ToolEnvironment, PIPELINE_TOOLS};
use dvfix_av::{
    CommandRunner, Error, LineHandlers, Platform, Stream, ToolInvocation, ToolOutput,
    ToolResolver, VideoStream,
};

/// What a scripted tool does when called.
#[derive(Debug, Clone)]
pub struct Reply {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub exit_code: i32,
    pub spawn_error: bool,
}

impl Reply {
    pub fn ok() -> Self {
        Self::exit(0)
    }

    pub fn exit(code: i32) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: code,
            spawn_error: false,
        }
    }

    pub fn spawn_error() -> Self {
        Self {
            spawn_error: true,
            ..Self::ok()
        }
    }

    pub fn stdout(mut self, line: &str) -> Self {
        self.stdout.push(line.to_string());
        self
    }

    pub fn stderr(mut self, line: &str) -> Self {
        self.stderr.push(line.to_string());
        self
    }
}

/// One recorded call, with any `script` wrapper peeled off.
#[derive(Debug, Clone)]
pub struct Call {
    /// Logical tool name (file name of the real program).
    pub tool: String,
    /// Arguments passed to the real program.
    pub args: Vec<String>,
    /// The invocation exactly as the runner received it.
    pub raw: ToolInvocation,
}

#[derive(Default)]
pub struct ScriptedRunner {
    replies: RefCell<HashMap<String, VecDeque<Reply>>>,
    calls: RefCell<Vec<Call>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next call of `tool`. Unqueued calls succeed
    /// silently.
    pub fn reply(&self, tool: &str, reply: Reply) -> &Self {
        self.replies
            .borrow_mut()
            .entry(tool.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn tools_called(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.tool.clone()).collect()
    }
}

impl CommandRunner for &ScriptedRunner {
    fn run(
        &self,
        invocation: &ToolInvocation,
        handlers: &mut LineHandlers<'_>,
    ) -> dvfix_av::Result<ToolOutput> {
        let (program, args) = unwrap_terminal(invocation);
        let tool = Path::new(&program)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(program);

        self.calls.borrow_mut().push(Call {
            tool: tool.clone(),
            args: args.clone(),
            raw: invocation.clone(),
        });

        let reply = self
            .replies
            .borrow_mut()
            .get_mut(&tool)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(Reply::ok);

        if reply.spawn_error {
            return Err(Error::Spawn {
                tool,
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }

        if let Some(path) = produced_file(&tool, &args) {
            std::fs::write(path, tool.as_bytes())?;
        }

        let mut output = ToolOutput::default();
        for line in &reply.stderr {
            handlers.dispatch(Stream::Stderr, line);
            output.push_line(Stream::Stderr, line);
        }
        for line in &reply.stdout {
            handlers.dispatch(Stream::Stdout, line);
            output.push_line(Stream::Stdout, line);
        }
        output.exit_code = Some(reply.exit_code);
        Ok(output)
    }
}

/// `script -qefc "<cmd>" /dev/null` back to program + args. Test paths
/// contain no spaces, so splitting on whitespace is enough.
fn unwrap_terminal(invocation: &ToolInvocation) -> (String, Vec<String>) {
    let args = invocation.arg_list();
    if invocation.tool_name() == "script" && args.len() == 3 && args[0] == "-qefc" {
        let mut words = args[1].split_whitespace().map(str::to_string);
        let program = words.next().unwrap_or_default();
        return (program, words.collect());
    }
    (
        invocation.program().to_string_lossy().into_owned(),
        args.to_vec(),
    )
}

fn produced_file(tool: &str, args: &[String]) -> Option<PathBuf> {
    let after = |flag: &str| {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(PathBuf::from)
    };
    match tool {
        "ffmpeg" => args.last().map(PathBuf::from),
        "dovi_tool" => after("-o").or_else(|| after("--output")),
        "mkvmerge" => after("-o"),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Stage(String),
    Percent(f64),
    Info(String),
    Error(String),
}

#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub events: Vec<Event>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stages(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Stage(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Error(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ProgressReporter for RecordingReporter {
    fn set_stage(&mut self, label: &str) {
        self.events.push(Event::Stage(label.to_string()));
    }

    fn set_percent(&mut self, percent: f64) {
        self.events.push(Event::Percent(percent));
    }

    fn info(&mut self, line: &str) {
        self.events.push(Event::Info(line.to_string()));
    }

    fn error(&mut self, message: &str) {
        self.events.push(Event::Error(message.to_string()));
    }
}

/// Host-mode resolver with every pipeline tool under `/opt/bin`.
pub fn host_resolver() -> ToolResolver {
    resolver_with(PIPELINE_TOOLS)
}

pub fn resolver_with(tools: &[&str]) -> ToolResolver {
    let registry = tools
        .iter()
        .map(|t| (t.to_string(), PathBuf::from(format!("/opt/bin/{t}"))))
        .collect();
    ToolResolver::new(ToolEnvironment::Host, registry)
}

pub fn hevc_dolby_vision() -> Vec<VideoStream> {
    vec![VideoStream {
        index: 0,
        codec: "hevc".to_string(),
        width: 3840,
        height: 2160,
        frame_rate: Some(23.976),
        dolby_vision: true,
        dv_profile: Some(8),
    }]
}

/// Context for a 10 second clip with its temp dir at `<root>/work`.
pub fn context(root: &Path) -> PipelineContext {
    PipelineContext::new(
        root.join("original.mp4"),
        root.join("encoded.mkv"),
        root.join("work"),
    )
    .with_duration(10.0)
    .with_video_streams(hevc_dolby_vision())
}

pub fn unix_options() -> PipelineOptions {
    PipelineOptions {
        platform: Platform::new(false, "script"),
        ..Default::default()
    }
}

pub fn windows_options() -> PipelineOptions {
    PipelineOptions {
        platform: Platform::new(true, "script"),
        ..Default::default()
    }
}

pub fn executor<'a>(
    runner: &'a ScriptedRunner,
    options: PipelineOptions,
) -> PipelineExecutor<&'a ScriptedRunner> {
    PipelineExecutor::new(runner, host_resolver()).with_options(options)
}

/// File names left in `dir`, sorted. Missing directory counts as empty.
pub fn files_in(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
