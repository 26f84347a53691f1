use super::stages::Stage;
use dvfix_av::VideoStream;
use std::path::{Path, PathBuf};

/// Inputs of one repair run, plus the two values the run updates: the
/// current stage and, on success, the working file.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    original: PathBuf,
    working: PathBuf,
    temp_dir: PathBuf,
    duration: f64,
    video_streams: Vec<VideoStream>,
    remove_hdr10plus: bool,
    stage: Stage,
}

impl PipelineContext {
    /// `original` carries the intact RPU, `working` is the transcode that
    /// lost it. Intermediates are written under `temp_dir`.
    pub fn new(
        original: impl Into<PathBuf>,
        working: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            original: original.into(),
            working: working.into(),
            temp_dir: temp_dir.into(),
            duration: 0.0,
            video_streams: Vec::new(),
            remove_hdr10plus: false,
            stage: Stage::Init,
        }
    }

    /// Total duration in seconds, used to turn ffmpeg timestamps into
    /// percentages.
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = seconds;
        self
    }

    /// Video stream descriptors of the original source, in stream order.
    /// The Dolby Vision layer being restored is only present there.
    pub fn with_video_streams(mut self, streams: Vec<VideoStream>) -> Self {
        self.video_streams = streams;
        self
    }

    pub fn with_remove_hdr10plus(mut self, remove: bool) -> Self {
        self.remove_hdr10plus = remove;
        self
    }

    pub fn original(&self) -> &Path {
        &self.original
    }

    pub fn working(&self) -> &Path {
        &self.working
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Path for the intermediate `name` under the temp directory.
    ///
    /// A name that would land on the original or working file gets a
    /// numeric suffix instead (`converted-1.mkv`), so an artifact guard
    /// never owns one of the run's inputs.
    pub fn temp_file(&self, name: &str) -> PathBuf {
        let candidate = self.temp_dir.join(name);
        if !self.is_input(&candidate) {
            return candidate;
        }
        let file = Path::new(name);
        let stem = file.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
        let ext = file.extension().map(|e| e.to_string_lossy());
        (1u32..)
            .map(|n| match &ext {
                Some(ext) => self.temp_dir.join(format!("{stem}-{n}.{ext}")),
                None => self.temp_dir.join(format!("{stem}-{n}")),
            })
            .find(|path| !self.is_input(path))
            .unwrap_or(candidate)
    }

    fn is_input(&self, path: &Path) -> bool {
        path == self.working || path == self.original
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn video_streams(&self) -> &[VideoStream] {
        &self.video_streams
    }

    pub fn remove_hdr10plus(&self) -> bool {
        self.remove_hdr10plus
    }

    /// Stage currently running, or the one that stopped the run.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub(crate) fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
    }

    pub(crate) fn set_working(&mut self, working: PathBuf) {
        self.working = working;
    }
}
