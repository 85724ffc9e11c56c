//! Push-to-talk microphone recorder backed by cpal.
//!
//! cpal delivers samples on a backend callback thread; they are appended
//! into a shared lock-guarded buffer and drained by the thread that calls
//! `stop`. The stream itself lives on a dedicated thread so the recorder
//! handle stays `Send`.
//!
//! The configured silence threshold is carried for reference only; no
//! silence detection runs on the stream. The max-duration ceiling is
//! checked after the buffer is drained, not during capture.

use std::io::Cursor;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, StreamConfig};
use thiserror::Error;
use tracing::{debug, warn};

use crate::adapters::Recorder;
use crate::config::CaptureSettings;
use crate::domain::AudioClip;

/// Errors raised by the capture session.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("recorder already active")]
    AlreadyActive,

    #[error("recorder is not active")]
    NotActive,

    #[error("no audio frames captured")]
    NoAudio,

    #[error("recording exceeded max duration ({seconds:.2}s > {limit}s)")]
    TooLong { seconds: f64, limit: u32 },

    #[error("audio backend error: {0}")]
    Backend(String),
}

struct Session {
    buffer: Arc<Mutex<Vec<f32>>>,
    sample_rate: u32,
    stop_tx: mpsc::Sender<()>,
    done_rx: mpsc::Receiver<()>,
}

/// Microphone recorder for push-to-talk capture.
pub struct CpalRecorder {
    settings: CaptureSettings,
    session: Option<Session>,
}

impl CpalRecorder {
    pub fn new(settings: CaptureSettings) -> Self {
        Self {
            settings,
            session: None,
        }
    }
}

impl Recorder for CpalRecorder {
    fn start(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Err(CaptureError::AlreadyActive.into());
        }

        let buffer: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));
        let (ready_tx, ready_rx) = mpsc::channel::<std::result::Result<u32, String>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let stream_buffer = buffer.clone();
        let device_name = self.settings.input_device.clone();
        let sample_rate = self.settings.sample_rate;
        let chunk_frames = sample_rate * self.settings.chunk_duration_ms / 1000;

        // The cpal stream is !Send, so it is created and dropped on this
        // dedicated thread; the callback thread it spawns feeds the shared
        // buffer until stop is signalled.
        std::thread::spawn(move || {
            let stream = match build_stream(device_name.as_deref(), sample_rate, chunk_frames, stream_buffer)
            {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(e.to_string()));
                return;
            }
            let _ = ready_tx.send(Ok(sample_rate));
            let _ = stop_rx.recv();
            drop(stream);
            let _ = done_tx.send(());
        });

        let actual_rate = ready_rx
            .recv()
            .map_err(|_| CaptureError::Backend("capture thread exited".to_string()))?
            .map_err(CaptureError::Backend)?;

        debug!(
            sample_rate = actual_rate,
            silence_threshold = self.settings.silence_threshold,
            "capture session started"
        );

        self.session = Some(Session {
            buffer,
            sample_rate: actual_rate,
            stop_tx,
            done_rx,
        });
        Ok(())
    }

    fn stop(&mut self) -> Result<AudioClip> {
        let session = self.session.take().ok_or(CaptureError::NotActive)?;
        let _ = session.stop_tx.send(());
        if session.done_rx.recv().is_err() {
            warn!("capture thread ended before acknowledging stop");
        }

        let samples = {
            let mut guard = session
                .buffer
                .lock()
                .map_err(|_| CaptureError::Backend("capture buffer poisoned".to_string()))?;
            std::mem::take(&mut *guard)
        };
        if samples.is_empty() {
            return Err(CaptureError::NoAudio.into());
        }

        let duration_seconds = samples.len() as f64 / session.sample_rate as f64;
        let limit = self.settings.max_record_seconds;
        if duration_seconds > limit as f64 {
            return Err(CaptureError::TooLong {
                seconds: duration_seconds,
                limit,
            }
            .into());
        }

        let wav_bytes = encode_wav(&samples, session.sample_rate)?;
        debug!(duration_seconds, "capture session stopped");
        Ok(AudioClip {
            wav_bytes,
            sample_rate: session.sample_rate,
            channels: 1,
            duration_seconds,
        })
    }
}

fn build_stream(
    device_name: Option<&str>,
    sample_rate: u32,
    chunk_frames: u32,
    buffer: Arc<Mutex<Vec<f32>>>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => host
            .input_devices()
            .map_err(|e| CaptureError::Backend(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| CaptureError::Backend(format!("input device '{}' not found", name)))?,
        None => host
            .default_input_device()
            .ok_or_else(|| CaptureError::Backend("no default input device".to_string()))?,
    };

    let default_config = device
        .default_input_config()
        .map_err(|e| CaptureError::Backend(e.to_string()))?;
    let format = default_config.sample_format();
    let channels = usize::from(default_config.channels().max(1));
    let config = StreamConfig {
        channels: default_config.channels(),
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: BufferSize::Fixed(chunk_frames.max(1)),
    };

    let err_fn = |err| warn!(error = %err, "audio stream error");

    // Every supported sample type is converted to mono f32 in the
    // callback so the rest of the pipeline is format-agnostic.
    let stream = match format {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _| {
                if let Ok(mut buf) = buffer.lock() {
                    append_downmixed(&mut buf, data, channels, |s| s);
                }
            },
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _| {
                if let Ok(mut buf) = buffer.lock() {
                    append_downmixed(&mut buf, data, channels, |s| f32::from(s) / 32_768.0);
                }
            },
            err_fn,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            &config,
            move |data: &[u16], _| {
                if let Ok(mut buf) = buffer.lock() {
                    append_downmixed(&mut buf, data, channels, |s| {
                        (f32::from(s) - 32_768.0) / 32_768.0
                    });
                }
            },
            err_fn,
            None,
        ),
        other => {
            return Err(CaptureError::Backend(format!("unsupported sample format {other:?}")).into())
        }
    }
    .map_err(|e| CaptureError::Backend(e.to_string()))?;

    Ok(stream)
}

fn append_downmixed<S: Copy>(
    buffer: &mut Vec<f32>,
    data: &[S],
    channels: usize,
    convert: impl Fn(S) -> f32,
) {
    for frame in data.chunks(channels) {
        let sum: f32 = frame.iter().map(|s| convert(*s)).sum();
        buffer.push(sum / channels as f32);
    }
}

/// Encode float PCM samples to a 16-bit mono WAV byte stream.
fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| CaptureError::Backend(e.to_string()))?;
        for sample in samples {
            let scaled = (sample.clamp(-1.0, 1.0) * 32_767.0) as i16;
            writer
                .write_sample(scaled)
                .map_err(|e| CaptureError::Backend(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| CaptureError::Backend(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_wav_produces_riff_header_and_data() {
        let samples = vec![0.0f32, 0.5, -0.5, 1.5, -1.5];
        let bytes = encode_wav(&samples, 16_000).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        // 44-byte header + 2 bytes per sample
        assert_eq!(bytes.len(), 44 + samples.len() * 2);
    }

    #[test]
    fn downmix_averages_stereo_frames() {
        let mut buffer = Vec::new();
        append_downmixed(&mut buffer, &[0.2f32, 0.4, -1.0, 1.0], 2, |s| s);
        assert_eq!(buffer.len(), 2);
        assert!((buffer[0] - 0.3).abs() < 1e-6);
        assert!(buffer[1].abs() < 1e-6);
    }

    #[test]
    fn stop_without_start_is_rejected() {
        let mut recorder = CpalRecorder::new(CaptureSettings {
            language: "en".to_string(),
            sample_rate: 16_000,
            chunk_duration_ms: 64,
            silence_threshold: 0.015,
            max_record_seconds: 120,
            hotkey: "space".to_string(),
            input_device: None,
        });
        let err = recorder.stop().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CaptureError>(),
            Some(CaptureError::NotActive)
        ));
    }
}
