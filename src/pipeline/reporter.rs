/// Progress and log callbacks exposed to whoever hosts the pipeline.
pub trait ProgressReporter {
    /// A new stage started.
    fn set_stage(&mut self, label: &str);

    /// Completion of the current stage, nominally 0-100. Advisory: ffmpeg
    /// estimates can run past 100.
    fn set_percent(&mut self, percent: f64);

    /// Informational line from a tool or the pipeline.
    fn info(&mut self, line: &str);

    fn error(&mut self, message: &str);
}

/// Reporter that writes everything to `tracing`.
///
/// Percentages go out at `debug` and only when the whole-number value
/// changes, since tools redraw their meters many times per percent.
#[derive(Debug, Default)]
pub struct TracingReporter {
    stage: String,
    last_percent: Option<i64>,
}

impl TracingReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressReporter for TracingReporter {
    fn set_stage(&mut self, label: &str) {
        self.stage = label.to_string();
        tracing::info!("{}", label);
    }

    fn set_percent(&mut self, percent: f64) {
        let whole = percent.floor() as i64;
        if self.last_percent == Some(whole) {
            return;
        }
        self.last_percent = Some(whole);
        tracing::debug!("[{}%] {}", whole, self.stage);
    }

    fn info(&mut self, line: &str) {
        tracing::info!("{}", line);
    }

    fn error(&mut self, message: &str) {
        tracing::error!("{}", message);
    }
}
