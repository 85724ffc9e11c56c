//! Audio artifacts exchanged between the capture and transcription steps.

/// A finite captured recording, WAV-encoded.
///
/// Produced by a capture session on stop and consumed exactly once by the
/// transcription step.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub wav_bytes: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_seconds: f64,
}

/// Output of the transcription step.
///
/// `text` may legitimately be empty (silence, noise); callers treat that
/// as a failure condition rather than this type rejecting it.
#[derive(Debug, Clone)]
pub struct TranscriptionResult {
    pub text: String,
    pub language: Option<String>,
    pub duration_seconds: f64,
    pub temperature: f64,
}

impl TranscriptionResult {
    /// Stand-in result for briefs that entered the pipeline as text and
    /// never touched the transcriber.
    pub fn synthesized(text: impl Into<String>, language: Option<String>) -> Self {
        Self {
            text: text.into(),
            language,
            duration_seconds: 0.0,
            temperature: 0.0,
        }
    }
}
