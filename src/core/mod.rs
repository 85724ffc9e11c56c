//! Pipeline orchestration: one-shot runs and the background daemon.

pub mod daemon;
pub mod pipeline;

pub use daemon::{CycleReport, Daemon, DaemonState, StopFlag};
pub use pipeline::{PipelineError, PromptPipeline};
