//! Result type shared by every pipeline entry mode.

use crate::domain::{StructuredPlan, TranscriptionResult};
use crate::storage::SavedPrompt;

/// The sole observable result of a pipeline invocation.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub saved_prompt: SavedPrompt,
    pub transcription: TranscriptionResult,
    pub plan: StructuredPlan,
}
