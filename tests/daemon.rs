//! Daemon loop behavior: per-cycle isolation and cooperative stop.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use briefcast::adapters::{Enhancer, HotkeyEvent, HotkeySource, Recorder, Transcriber};
use briefcast::core::{CycleReport, Daemon, PromptPipeline};
use briefcast::domain::{AudioClip, StructuredPlan, TranscriptionResult, WorkType};
use briefcast::storage::PromptStorage;

struct LoopingHotkeys {
    next_is_activate: bool,
}

#[async_trait]
impl HotkeySource for LoopingHotkeys {
    async fn next_event(&mut self) -> Result<HotkeyEvent> {
        let event = if self.next_is_activate {
            HotkeyEvent::Activated
        } else {
            HotkeyEvent::Deactivated
        };
        self.next_is_activate = !self.next_is_activate;
        Ok(event)
    }
}

struct CountingRecorder;

impl Recorder for CountingRecorder {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<AudioClip> {
        Ok(AudioClip {
            wav_bytes: vec![0u8; 64],
            sample_rate: 16_000,
            channels: 1,
            duration_seconds: 1.0,
        })
    }
}

/// Fails the first `failures` transcriptions, then succeeds.
struct FlakyTranscriber {
    failures: usize,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Transcriber for FlakyTranscriber {
    async fn transcribe(
        &self,
        _clip: &AudioClip,
        _language: Option<&str>,
    ) -> Result<TranscriptionResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            anyhow::bail!("transcriber unavailable");
        }
        Ok(TranscriptionResult {
            text: "spoken brief".to_string(),
            language: Some("en".to_string()),
            duration_seconds: 1.0,
            temperature: 0.0,
        })
    }

    async fn transcribe_file(
        &self,
        _path: &Path,
        _language: Option<&str>,
    ) -> Result<TranscriptionResult> {
        unreachable!("daemon never transcribes files")
    }
}

struct FixedEnhancer;

#[async_trait]
impl Enhancer for FixedEnhancer {
    async fn enhance(&self, brief: &str) -> Result<StructuredPlan> {
        Ok(StructuredPlan {
            work_type: WorkType::Feature,
            summary: "a plan".to_string(),
            objectives: vec![],
            risks: vec![],
            milestones: vec![],
            sections: vec![],
            acceptance_criteria: vec![],
            suggested_story_id: Some("US-DAEMON".to_string()),
            original_brief: brief.to_string(),
        })
    }
}

fn daemon_pipeline(staging: &TempDir, failures: usize, calls: Arc<AtomicUsize>) -> PromptPipeline {
    PromptPipeline::new(
        "en",
        staging.path().join("pm"),
        Box::new(CountingRecorder),
        Box::new(FlakyTranscriber { failures, calls }),
        Box::new(FixedEnhancer),
        Box::new(LoopingHotkeys {
            next_is_activate: true,
        }),
        PromptStorage::new(
            staging.path().join("staging"),
            "{story_id}.md",
            "prompt-metadata.json",
        ),
    )
}

#[tokio::test]
async fn observer_stop_ends_loop_after_one_cycle() {
    let staging = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = daemon_pipeline(&staging, 0, calls.clone());

    let completed = Arc::new(AtomicUsize::new(0));
    let seen = completed.clone();
    let mut daemon = Daemon::new(pipeline, false).with_observer(move |report, stop| {
        if matches!(report, CycleReport::Completed(_)) {
            seen.fetch_add(1, Ordering::SeqCst);
            stop.request_stop();
        }
    });

    daemon.run().await.unwrap();

    assert_eq!(completed.load(Ordering::SeqCst), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(staging
        .path()
        .join("staging")
        .join("US-DAEMON")
        .join("US-DAEMON.md")
        .exists());
}

#[tokio::test]
async fn failed_cycle_is_isolated_and_loop_continues() {
    let staging = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = daemon_pipeline(&staging, 1, calls.clone());

    let reports = Arc::new(Mutex::new(Vec::new()));
    let log = reports.clone();
    let mut daemon = Daemon::new(pipeline, false)
        .with_idle_sleep(Duration::from_millis(1))
        .with_observer(move |report, stop| {
            let kind = match report {
                CycleReport::Completed(_) => "completed",
                CycleReport::Failed(_) => "failed",
            };
            log.lock().unwrap().push(kind);
            if kind == "completed" {
                stop.request_stop();
            }
        });

    daemon.run().await.unwrap();

    assert_eq!(*reports.lock().unwrap(), vec!["failed", "completed"]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn stop_handle_set_before_run_prevents_any_cycle() {
    let staging = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = daemon_pipeline(&staging, 0, calls.clone());

    let mut daemon = Daemon::new(pipeline, false);
    daemon.stop_handle().request_stop();
    daemon.run().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
