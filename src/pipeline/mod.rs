//! The Dolby Vision RPU repair pipeline.
//!
//! Copies the RPU of an original HEVC stream into a transcoded copy that lost
//! or mangled it, normalizing crop data on the way, and remuxes the result
//! into a new Matroska container next to the other intermediates.

mod context;
mod error;
mod executor;
mod reporter;
pub mod stages;

pub use context::PipelineContext;
pub use error::PipelineError;
pub use executor::{Outcome, PipelineExecutor, PipelineOptions};
pub use reporter::{ProgressReporter, TracingReporter};
pub use stages::Stage;
