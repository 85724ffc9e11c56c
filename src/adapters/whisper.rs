//! Whisper transcription backend.
//!
//! Shells out to a local whisper binary and parses its JSON output.
//! In-memory clips are written to a scratch WAV first so the binary can
//! handle format details.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::config::WhisperSettings;
use crate::domain::{AudioClip, TranscriptionResult};

use super::Transcriber;

/// Transcription adapter driving a local whisper CLI.
pub struct WhisperCli {
    settings: WhisperSettings,
}

/// Whisper output JSON structure.
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    text: String,
    #[serde(default)]
    language: String,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    #[serde(default)]
    end: f64,
    #[serde(default)]
    temperature: f64,
}

impl WhisperCli {
    pub fn new(settings: WhisperSettings) -> Self {
        Self { settings }
    }

    async fn run(&self, audio_path: &Path, language: Option<&str>) -> Result<WhisperOutput> {
        let temp_dir = tempfile::tempdir().context("failed to create temp dir")?;

        let mut command = Command::new(&self.settings.binary_path);
        command
            .arg(audio_path)
            .arg("--model")
            .arg(&self.settings.model)
            .arg("--output_dir")
            .arg(temp_dir.path())
            .arg("--output_format")
            .arg("json")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(language) = language {
            command.arg("--language").arg(language);
        }

        debug!(path = %audio_path.display(), model = %self.settings.model, "transcribing");

        let output = command.output().await.with_context(|| {
            format!("failed to run whisper binary '{}'", self.settings.binary_path)
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("whisper failed: {}", stderr.trim());
        }

        let stem = audio_path.file_stem().unwrap_or_default().to_string_lossy();
        let json_path = temp_dir.path().join(format!("{}.json", stem));
        let json_content = tokio::fs::read_to_string(&json_path)
            .await
            .context("failed to read whisper output")?;
        serde_json::from_str(&json_content).context("failed to parse whisper JSON")
    }
}

#[async_trait]
impl Transcriber for WhisperCli {
    async fn transcribe(
        &self,
        clip: &AudioClip,
        language: Option<&str>,
    ) -> Result<TranscriptionResult> {
        let scratch = tempfile::Builder::new()
            .suffix(".wav")
            .tempfile()
            .context("failed to create scratch WAV")?;
        tokio::fs::write(scratch.path(), &clip.wav_bytes)
            .await
            .context("failed to write scratch WAV")?;

        let output = self.run(scratch.path(), language).await?;
        Ok(result_from_output(output, language, clip.duration_seconds))
    }

    async fn transcribe_file(
        &self,
        path: &Path,
        language: Option<&str>,
    ) -> Result<TranscriptionResult> {
        let output = self.run(path, language).await?;
        Ok(result_from_output(output, language, 0.0))
    }
}

fn result_from_output(
    output: WhisperOutput,
    requested_language: Option<&str>,
    fallback_duration: f64,
) -> TranscriptionResult {
    let duration = output
        .segments
        .last()
        .map(|s| s.end)
        .filter(|end| *end > 0.0)
        .unwrap_or(fallback_duration);
    let temperature = output.segments.last().map(|s| s.temperature).unwrap_or(0.0);
    let language = if output.language.is_empty() {
        requested_language.map(str::to_string)
    } else {
        Some(output.language)
    };
    TranscriptionResult {
        text: output.text.trim().to_string(),
        language,
        duration_seconds: duration,
        temperature,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_parses_text_language_and_duration() {
        let output: WhisperOutput = serde_json::from_str(
            r#"{
                "text": "  hello world  ",
                "language": "en",
                "segments": [{"end": 1.2, "temperature": 0.0}, {"end": 3.4, "temperature": 0.1}]
            }"#,
        )
        .unwrap();
        let result = result_from_output(output, None, 0.0);
        assert_eq!(result.text, "hello world");
        assert_eq!(result.language.as_deref(), Some("en"));
        assert!((result.duration_seconds - 3.4).abs() < f64::EPSILON);
        assert!((result.temperature - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_segments_fall_back_to_clip_duration() {
        let output: WhisperOutput =
            serde_json::from_str(r#"{"text": "hi", "language": ""}"#).unwrap();
        let result = result_from_output(output, Some("en"), 2.5);
        assert!((result.duration_seconds - 2.5).abs() < f64::EPSILON);
        assert_eq!(result.language.as_deref(), Some("en"));
    }

    #[test]
    fn empty_text_is_preserved_for_the_caller_to_reject() {
        let output: WhisperOutput =
            serde_json::from_str(r#"{"text": "   ", "language": "en"}"#).unwrap();
        let result = result_from_output(output, None, 0.0);
        assert!(result.text.is_empty());
    }
}
