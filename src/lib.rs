//! briefcast: speak a brief, get a structured development plan.
//!
//! A push-to-talk workflow tool: hold a hotkey to capture a spoken brief,
//! transcribe it locally with whisper, have an LLM structure it into a
//! development plan, and persist the plan to a staging directory with
//! optional promotion into a project-management tree.

pub mod adapters;
pub mod api;
pub mod audio;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod input;
pub mod storage;

pub use config::AppConfig;
pub use core::{Daemon, PromptPipeline};
pub use domain::{PipelineOutcome, StructuredPlan, WorkType};
pub use storage::{PromptStorage, SavedPrompt};
