//! Collaborator interfaces for external systems.
//!
//! The pipeline core only talks to these traits; production adapters
//! (cpal microphone, whisper subprocess, OpenAI HTTP) and test doubles
//! both implement them.

pub mod openai;
pub mod whisper;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{AudioClip, StructuredPlan, TranscriptionResult};

pub use openai::OpenAiEnhancer;
pub use whisper::WhisperCli;

/// Owns a single recording lifecycle.
pub trait Recorder: Send {
    /// Begin capturing. Fails if already active or the backend is
    /// unavailable.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing and return the encoded clip. Fails if not active,
    /// nothing was captured, or the clip exceeds the configured ceiling.
    fn stop(&mut self) -> Result<AudioClip>;
}

/// Converts audio into text plus metadata.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        clip: &AudioClip,
        language: Option<&str>,
    ) -> Result<TranscriptionResult>;

    async fn transcribe_file(
        &self,
        path: &Path,
        language: Option<&str>,
    ) -> Result<TranscriptionResult>;
}

/// Structures a text brief into a plan.
#[async_trait]
pub trait Enhancer: Send + Sync {
    /// Fails on empty input or a malformed upstream response.
    async fn enhance(&self, brief: &str) -> Result<StructuredPlan>;
}

/// One push-to-talk session event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// The hotkey went down: start capturing.
    Activated,
    /// The hotkey came up: the session is over, process what was captured.
    Deactivated,
    /// The listener is gone (no backend, terminal closed, escape pressed).
    Closed,
}

/// Source of push-to-talk session events.
///
/// `listen_once` consumes events until a session completes; the sequence
/// for a normal cycle is Activated then Deactivated.
#[async_trait]
pub trait HotkeySource: Send {
    async fn next_event(&mut self) -> Result<HotkeyEvent>;
}
