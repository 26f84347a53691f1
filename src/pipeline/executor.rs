use super::context::PipelineContext;
use super::error::PipelineError;
use super::reporter::ProgressReporter;
use super::stages::{self, Stage};
use dvfix_av::tools::{DOVI_TOOL, FFMPEG, MKVINFO, MKVMERGE};
use dvfix_av::{
    Artifact, CommandRunner, LineHandlers, Platform, ProgressParser, ProgressSample,
    ToolInvocation, ToolOutput, ToolResolver,
};
use std::path::PathBuf;
use std::time::Duration;

/// Terminal result of a pipeline run, as reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The working file now points at the repaired container.
    Fixed,
    /// No Dolby Vision on the first video stream, or not HEVC.
    NotApplicable,
    /// A required tool could not be resolved.
    ConfigurationError,
    /// A stage's tool failed.
    ProcessingFailure,
}

impl Outcome {
    /// Process exit code used by the CLI.
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Fixed => 0,
            Outcome::ProcessingFailure => 1,
            Outcome::NotApplicable => 2,
            Outcome::ConfigurationError => 3,
        }
    }
}

/// Knobs that are fixed for the lifetime of an executor.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub platform: Platform,
    /// Per-tool timeout. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Treat mkvmerge exit code 1 (warnings) as success.
    pub accept_mkvmerge_warnings: bool,
}

/// Resolved executables for the four pipeline tools.
#[derive(Debug, Clone)]
struct PipelineTools {
    dovi_tool: PathBuf,
    mkvmerge: PathBuf,
    mkvinfo: PathBuf,
    ffmpeg: PathBuf,
}

/// Pipeline position. Intermediates travel inside the state that still
/// needs them, so leaving the loop early drops (and deletes) them.
enum State {
    Init,
    Validate,
    ExtractOriginalBitstream {
        tools: PipelineTools,
    },
    ExtractOriginalMetadata {
        tools: PipelineTools,
        original_hevc: Artifact,
    },
    ExtractWorkingBitstream {
        tools: PipelineTools,
        rpu: Artifact,
    },
    InjectMetadata {
        tools: PipelineTools,
        rpu: Artifact,
        working_hevc: Artifact,
    },
    ProbeFrameRate {
        tools: PipelineTools,
        fixed_hevc: Artifact,
    },
    Remux {
        tools: PipelineTools,
        fixed_hevc: Artifact,
        frame_rate: Option<String>,
    },
    Done(PathBuf),
    NotApplicable,
}

/// Runs the RPU repair stages over a [`PipelineContext`].
pub struct PipelineExecutor<R> {
    runner: R,
    resolver: ToolResolver,
    options: PipelineOptions,
}

impl<R: CommandRunner> PipelineExecutor<R> {
    pub fn new(runner: R, resolver: ToolResolver) -> Self {
        Self {
            runner,
            resolver,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Run every stage in order.
    ///
    /// On [`Outcome::Fixed`] the context's working file is the new container
    /// inside the temp directory; on any other outcome it is untouched and
    /// no intermediate is left behind.
    pub fn run(
        &mut self,
        ctx: &mut PipelineContext,
        reporter: &mut dyn ProgressReporter,
    ) -> Outcome {
        let mut state = State::Init;
        loop {
            state = match state {
                State::Done(container) => {
                    tracing::info!("Working file is now {:?}", container);
                    ctx.set_working(container);
                    return Outcome::Fixed;
                }
                State::NotApplicable => return Outcome::NotApplicable,
                current => match self.step(current, ctx, reporter) {
                    Ok(next) => next,
                    Err(err) => {
                        abort(ctx.stage(), &err, reporter);
                        return err.outcome();
                    }
                },
            };
        }
    }

    fn step(
        &mut self,
        state: State,
        ctx: &mut PipelineContext,
        reporter: &mut dyn ProgressReporter,
    ) -> Result<State, PipelineError> {
        match state {
            State::Init => {
                enter(Stage::Init, ctx, reporter);
                tracing::debug!(
                    "Original {:?}, working {:?}, duration {}s, temp {:?}",
                    ctx.original(),
                    ctx.working(),
                    ctx.duration(),
                    ctx.temp_dir()
                );
                Ok(State::Validate)
            }

            State::Validate => {
                ctx.set_stage(Stage::Validate);
                if let Some(reason) = precondition_failure(ctx) {
                    tracing::info!("{}", reason);
                    reporter.info(reason);
                    return Ok(State::NotApplicable);
                }
                let tools = self.resolve_tools()?;
                Ok(State::ExtractOriginalBitstream { tools })
            }

            State::ExtractOriginalBitstream { tools } => {
                enter(Stage::ExtractOriginalBitstream, ctx, reporter);
                std::fs::create_dir_all(ctx.temp_dir())?;
                let original_hevc = Artifact::new(ctx.temp_file(stages::ORIGINAL_HEVC));
                let cmd = stages::extract_original_bitstream(
                    &tools.ffmpeg,
                    ctx.original(),
                    original_hevc.path(),
                );
                let output = self.run_tool(cmd, ffmpeg_handlers(ctx.duration(), reporter))?;
                expect_success(Stage::ExtractOriginalBitstream, FFMPEG, output, &[0])?;
                Ok(State::ExtractOriginalMetadata {
                    tools,
                    original_hevc,
                })
            }

            State::ExtractOriginalMetadata {
                tools,
                original_hevc,
            } => {
                enter(Stage::ExtractOriginalMetadata, ctx, reporter);
                let rpu = Artifact::new(ctx.temp_file(stages::ORIGINAL_RPU));
                let cmd = stages::extract_rpu(
                    &tools.dovi_tool,
                    ctx.remove_hdr10plus(),
                    original_hevc.path(),
                    rpu.path(),
                );
                let cmd = self.options.platform.terminal_invocation(cmd);
                let output = self.run_tool(cmd, meter_handlers(reporter, false))?;
                expect_success(Stage::ExtractOriginalMetadata, DOVI_TOOL, output, &[0])?;
                drop(original_hevc);
                Ok(State::ExtractWorkingBitstream { tools, rpu })
            }

            State::ExtractWorkingBitstream { tools, rpu } => {
                enter(Stage::ExtractWorkingBitstream, ctx, reporter);
                let working_hevc = Artifact::new(ctx.temp_file(stages::WORKING_HEVC));
                let cmd = stages::extract_working_bitstream(
                    &tools.ffmpeg,
                    ctx.working(),
                    working_hevc.path(),
                );
                let output = self.run_tool(cmd, ffmpeg_handlers(ctx.duration(), reporter))?;
                expect_success(Stage::ExtractWorkingBitstream, FFMPEG, output, &[0])?;
                Ok(State::InjectMetadata {
                    tools,
                    rpu,
                    working_hevc,
                })
            }

            State::InjectMetadata {
                tools,
                rpu,
                working_hevc,
            } => {
                enter(Stage::InjectMetadata, ctx, reporter);
                let fixed_hevc = Artifact::new(ctx.temp_file(stages::FIXED_HEVC));
                let cmd = stages::inject_rpu(
                    &tools.dovi_tool,
                    ctx.remove_hdr10plus(),
                    rpu.path(),
                    working_hevc.path(),
                    fixed_hevc.path(),
                );
                let cmd = self.options.platform.terminal_invocation(cmd);
                let output = self.run_tool(cmd, meter_handlers(reporter, true))?;
                expect_success(Stage::InjectMetadata, DOVI_TOOL, output, &[0])?;
                drop(working_hevc);
                drop(rpu);
                Ok(State::ProbeFrameRate { tools, fixed_hevc })
            }

            State::ProbeFrameRate { tools, fixed_hevc } => {
                enter(Stage::ProbeFrameRate, ctx, reporter);
                let cmd = stages::probe_frame_rate(&tools.mkvinfo, ctx.working());
                let output = self.run_tool(cmd, LineHandlers::new())?;
                // Exit status is irrelevant; a missing rate only costs the
                // timing fix.
                let frame_rate = dvfix_av::probe::parse_frame_rate(&output.stdout);
                match &frame_rate {
                    Some(fps) => tracing::debug!("Frame rate {} fps", fps),
                    None => tracing::debug!(
                        "No frame rate in mkvinfo report (exit {})",
                        output.code()
                    ),
                }
                Ok(State::Remux {
                    tools,
                    fixed_hevc,
                    frame_rate,
                })
            }

            State::Remux {
                tools,
                fixed_hevc,
                frame_rate,
            } => {
                enter(Stage::Remux, ctx, reporter);
                let container = Artifact::new(ctx.temp_file(stages::OUTPUT_MKV));
                let cmd = stages::remux(
                    &tools.mkvmerge,
                    frame_rate.as_deref(),
                    fixed_hevc.path(),
                    ctx.working(),
                    container.path(),
                );
                let accepted: &[i32] = if self.options.accept_mkvmerge_warnings {
                    &[0, 1]
                } else {
                    &[0]
                };
                let output = self.run_tool(cmd, meter_handlers(reporter, false))?;
                expect_success(Stage::Remux, MKVMERGE, output, accepted)?;
                drop(fixed_hevc);
                Ok(State::Done(container.keep()))
            }

            terminal @ (State::Done(_) | State::NotApplicable) => Ok(terminal),
        }
    }

    fn resolve_tools(&mut self) -> Result<PipelineTools, PipelineError> {
        Ok(PipelineTools {
            dovi_tool: self.resolver.resolve(DOVI_TOOL)?,
            mkvmerge: self.resolver.resolve(MKVMERGE)?,
            mkvinfo: self.resolver.resolve(MKVINFO)?,
            ffmpeg: self.resolver.resolve(FFMPEG)?,
        })
    }

    fn run_tool(
        &self,
        mut invocation: ToolInvocation,
        mut handlers: LineHandlers<'_>,
    ) -> Result<ToolOutput, PipelineError> {
        invocation.timeout(self.options.timeout);
        tracing::debug!("Executing {}", invocation.command_line());
        Ok(self.runner.run(&invocation, &mut handlers)?)
    }
}

/// Reset the meter and announce `stage`.
fn enter(stage: Stage, ctx: &mut PipelineContext, reporter: &mut dyn ProgressReporter) {
    ctx.set_stage(stage);
    reporter.set_percent(0.0);
    reporter.set_stage(stage.label());
}

fn precondition_failure(ctx: &PipelineContext) -> Option<&'static str> {
    match ctx.video_streams().first() {
        Some(video) if !video.dolby_vision => Some("No Dolby Vision detected"),
        None => Some("No Dolby Vision detected"),
        Some(video) if !video.has_supported_codec() => {
            Some("Video format must be HEVC, other codecs are not supported by dovi_tool")
        }
        Some(_) => None,
    }
}

fn expect_success(
    stage: Stage,
    tool: &str,
    output: ToolOutput,
    accepted: &[i32],
) -> Result<ToolOutput, PipelineError> {
    match output.exit_code {
        Some(code) if accepted.contains(&code) => {
            if code != 0 {
                tracing::warn!("{} finished with warnings (exit {})", tool, code);
            }
            Ok(output)
        }
        _ => Err(PipelineError::Stage {
            stage,
            tool: tool.to_string(),
            exit_code: output.code(),
            output: output.output,
        }),
    }
}

fn abort(stage: Stage, err: &PipelineError, reporter: &mut dyn ProgressReporter) {
    tracing::debug!("Aborted during {}", stage);
    reporter.error(&err.to_string());
    if let Some(output) = err.output() {
        reporter.error(output);
    }
}

/// ffmpeg reports `time=` on stderr; everything else it says is noise.
fn ffmpeg_handlers<'a, P>(duration: f64, reporter: &'a mut P) -> LineHandlers<'a>
where
    P: ProgressReporter + ?Sized,
{
    let parser = ProgressParser::Timestamp { duration };
    LineHandlers::new().on_stderr(move |line| match parser.parse(line) {
        Some(ProgressSample::Percent(percent)) => reporter.set_percent(percent),
        Some(ProgressSample::Info(text)) => tracing::trace!("ffmpeg: {}", text),
        None => {}
    })
}

/// dovi_tool and mkvmerge print ` NN%` meters on stdout. Other lines are
/// forwarded to the host, optionally resetting the meter first.
fn meter_handlers<P>(reporter: &mut P, reset_on_info: bool) -> LineHandlers<'_>
where
    P: ProgressReporter + ?Sized,
{
    let parser = ProgressParser::Percent;
    LineHandlers::new().on_stdout(move |line| match parser.parse(line) {
        Some(ProgressSample::Percent(percent)) => reporter.set_percent(percent),
        Some(ProgressSample::Info(text)) => {
            if reset_on_info {
                reporter.set_percent(0.0);
            }
            reporter.info(&text);
        }
        None => {}
    })
}
