//! Data structures for the brief-to-plan workflow.

pub mod audio;
pub mod outcome;
pub mod plan;

pub use audio::{AudioClip, TranscriptionResult};
pub use outcome::PipelineOutcome;
pub use plan::{PlanMetadata, PlanSection, StructuredPlan, WorkType};
