//! The brief-to-plan pipeline.
//!
//! Every entry mode converges on the same tail: enhance the brief into a
//! structured plan, persist it, optionally promote it into the
//! project-management tree. The modes differ only in how the brief is
//! obtained (text argument, audio file, in-memory clip, or a live
//! push-to-talk session).

use std::path::{Path, PathBuf};

use anyhow::Result;
use thiserror::Error;
use tracing::{debug, info};

use crate::adapters::{
    Enhancer, HotkeyEvent, HotkeySource, OpenAiEnhancer, Recorder, Transcriber, WhisperCli,
};
use crate::audio::CpalRecorder;
use crate::config::AppConfig;
use crate::domain::{AudioClip, PipelineOutcome, TranscriptionResult};
use crate::input::TerminalHotkey;
use crate::storage::PromptStorage;

/// Errors raised by pipeline entry points.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The supplied brief was empty or whitespace-only.
    #[error("brief text is empty")]
    InvalidInput,

    /// Transcription succeeded but produced no usable text.
    #[error("transcription produced no text")]
    EmptyTranscription,

    /// A push-to-talk session ended without capturing anything.
    #[error("no audio was captured")]
    NoCapture,
}

/// Orchestrates capture, transcription, enhancement and persistence.
///
/// Collaborators are trait objects so tests can substitute doubles; the
/// pipeline itself holds no configuration beyond what those collaborators
/// need.
pub struct PromptPipeline {
    language: String,
    project_management_root: PathBuf,
    recorder: Box<dyn Recorder>,
    transcriber: Box<dyn Transcriber>,
    enhancer: Box<dyn Enhancer>,
    hotkeys: Box<dyn HotkeySource>,
    storage: PromptStorage,
}

impl PromptPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        language: impl Into<String>,
        project_management_root: impl Into<PathBuf>,
        recorder: Box<dyn Recorder>,
        transcriber: Box<dyn Transcriber>,
        enhancer: Box<dyn Enhancer>,
        hotkeys: Box<dyn HotkeySource>,
        storage: PromptStorage,
    ) -> Self {
        Self {
            language: language.into(),
            project_management_root: project_management_root.into(),
            recorder,
            transcriber,
            enhancer,
            hotkeys,
            storage,
        }
    }

    /// Wire the production adapters from resolved configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let storage = PromptStorage::new(
            &config.paths.prompt_output_root,
            &config.prompt.filename_pattern,
            &config.prompt.metadata_filename,
        );
        Ok(Self::new(
            config.capture.language.clone(),
            &config.paths.project_management_root,
            Box::new(CpalRecorder::new(config.capture.clone())),
            Box::new(WhisperCli::new(config.whisper.clone())),
            Box::new(OpenAiEnhancer::new(config.openai.clone())),
            Box::new(TerminalHotkey::new(&config.capture.hotkey)?),
            storage,
        ))
    }

    pub fn storage(&self) -> &PromptStorage {
        &self.storage
    }

    pub fn project_management_root(&self) -> &Path {
        &self.project_management_root
    }

    /// Structure a text brief directly, skipping capture and transcription.
    pub async fn enhance_text(
        &mut self,
        text: &str,
        story_id: Option<&str>,
        story_title: Option<&str>,
        promote: bool,
    ) -> Result<PipelineOutcome> {
        let brief = text.trim();
        if brief.is_empty() {
            return Err(PipelineError::InvalidInput.into());
        }
        let transcription =
            TranscriptionResult::synthesized(brief, Some(self.language.clone()));
        self.finish(transcription, story_id, story_title, promote)
            .await
    }

    /// Transcribe a captured clip and run the shared tail.
    pub async fn process_audio_buffer(
        &mut self,
        clip: &AudioClip,
        story_id: Option<&str>,
        story_title: Option<&str>,
        promote: bool,
    ) -> Result<PipelineOutcome> {
        debug!(duration_seconds = clip.duration_seconds, "transcribing captured clip");
        let transcription = self
            .transcriber
            .transcribe(clip, Some(&self.language))
            .await?;
        self.finish_transcribed(transcription, story_id, story_title, promote)
            .await
    }

    /// Transcribe an existing audio file and run the shared tail.
    pub async fn process_audio_file(
        &mut self,
        path: &Path,
        story_id: Option<&str>,
        story_title: Option<&str>,
        promote: bool,
    ) -> Result<PipelineOutcome> {
        debug!(path = %path.display(), "transcribing audio file");
        let transcription = self
            .transcriber
            .transcribe_file(path, Some(&self.language))
            .await?;
        self.finish_transcribed(transcription, story_id, story_title, promote)
            .await
    }

    /// Run one full push-to-talk session.
    ///
    /// Consumes hotkey events until a session completes: activation starts
    /// the recorder, deactivation stops it and the captured clip flows
    /// through the normal audio path. A session that closes or deactivates
    /// before anything was captured fails with `NoCapture`.
    pub async fn listen_once(
        &mut self,
        story_id: Option<&str>,
        story_title: Option<&str>,
        promote: bool,
    ) -> Result<PipelineOutcome> {
        let mut armed = false;
        loop {
            match self.hotkeys.next_event().await? {
                HotkeyEvent::Activated => {
                    if !armed {
                        self.recorder.start()?;
                        armed = true;
                        info!("recording started");
                    }
                }
                HotkeyEvent::Deactivated => {
                    if !armed {
                        return Err(PipelineError::NoCapture.into());
                    }
                    let clip = self.recorder.stop()?;
                    info!(duration_seconds = clip.duration_seconds, "recording stopped");
                    return self
                        .process_audio_buffer(&clip, story_id, story_title, promote)
                        .await;
                }
                HotkeyEvent::Closed => {
                    if armed {
                        // Best effort; the session is over either way.
                        let _ = self.recorder.stop();
                    }
                    return Err(PipelineError::NoCapture.into());
                }
            }
        }
    }

    async fn finish_transcribed(
        &mut self,
        transcription: TranscriptionResult,
        story_id: Option<&str>,
        story_title: Option<&str>,
        promote: bool,
    ) -> Result<PipelineOutcome> {
        if transcription.text.trim().is_empty() {
            return Err(PipelineError::EmptyTranscription.into());
        }
        self.finish(transcription, story_id, story_title, promote)
            .await
    }

    /// Shared tail: enhance, persist, optionally promote.
    async fn finish(
        &mut self,
        transcription: TranscriptionResult,
        story_id: Option<&str>,
        story_title: Option<&str>,
        promote: bool,
    ) -> Result<PipelineOutcome> {
        let plan = self.enhancer.enhance(transcription.text.trim()).await?;
        let saved_prompt = self.storage.save(&plan, story_id)?;
        info!(
            story_id = %saved_prompt.story_id,
            work_type = plan.work_type.as_str(),
            "plan saved"
        );

        if promote {
            // Untitled promotions fall back to the plan summary so the
            // destination directory always gets a README note.
            let title = story_title
                .map(str::to_string)
                .or_else(|| {
                    let summary = plan.summary.trim();
                    (!summary.is_empty()).then(|| summary.to_string())
                });
            let dest = self.storage.relocate_to_project_management(
                &saved_prompt,
                &self.project_management_root,
                title.as_deref(),
            )?;
            info!(dest = %dest.display(), "plan promoted");
        }

        Ok(PipelineOutcome {
            saved_prompt,
            transcription,
            plan,
        })
    }
}
