//! Long-running push-to-talk daemon.
//!
//! Runs `listen_once` cycles back to back. Each cycle produces a typed
//! `CycleReport` handed to an optional observer; failures are logged and
//! followed by an idle pause so a persistent fault cannot spin the loop.
//! Ctrl+C interrupts between awaits; the stop flag ends the loop cleanly
//! after the current cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::core::pipeline::PromptPipeline;
use crate::domain::PipelineOutcome;

/// Cooperative stop signal shared with observers and other tasks.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Result of one daemon cycle.
#[derive(Debug)]
pub enum CycleReport {
    Completed(PipelineOutcome),
    Failed(anyhow::Error),
}

/// Daemon lifecycle states, reported via tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Idle,
    Running,
    Stopping,
    Interrupted,
}

type Observer = Box<dyn FnMut(&CycleReport, &StopFlag) + Send>;

/// Drives repeated push-to-talk cycles until stopped or interrupted.
pub struct Daemon {
    pipeline: PromptPipeline,
    promote: bool,
    idle_sleep: Duration,
    stop: StopFlag,
    observer: Option<Observer>,
}

impl Daemon {
    pub fn new(pipeline: PromptPipeline, promote: bool) -> Self {
        Self {
            pipeline,
            promote,
            idle_sleep: Duration::from_secs(1),
            stop: StopFlag::new(),
            observer: None,
        }
    }

    /// Observe every cycle report. The observer may request a stop via the
    /// provided flag; the loop ends before the next cycle starts.
    pub fn with_observer(
        mut self,
        observer: impl FnMut(&CycleReport, &StopFlag) + Send + 'static,
    ) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn with_idle_sleep(mut self, idle_sleep: Duration) -> Self {
        self.idle_sleep = idle_sleep;
        self
    }

    /// Handle for requesting a stop from outside the run loop.
    pub fn stop_handle(&self) -> StopFlag {
        self.stop.clone()
    }

    /// Run cycles until the stop flag is set or Ctrl+C arrives.
    pub async fn run(&mut self) -> Result<()> {
        let (interrupt_tx, mut interrupt_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = interrupt_tx.send(());
            }
        });

        info!(promote = self.promote, "daemon started");
        let mut state = DaemonState::Running;

        while !self.stop.is_set() {
            tokio::select! {
                _ = &mut interrupt_rx => {
                    state = DaemonState::Interrupted;
                    info!("daemon interrupted");
                    break;
                }
                result = self.pipeline.listen_once(None, None, self.promote) => {
                    let report = match result {
                        Ok(outcome) => CycleReport::Completed(outcome),
                        Err(e) => CycleReport::Failed(e),
                    };
                    if let Some(observer) = self.observer.as_mut() {
                        observer(&report, &self.stop);
                    }
                    match &report {
                        CycleReport::Completed(outcome) => {
                            info!(
                                story_id = %outcome.saved_prompt.story_id,
                                "cycle completed"
                            );
                        }
                        CycleReport::Failed(e) => {
                            warn!(error = %e, "cycle failed; idling before retry");
                            tokio::time::sleep(self.idle_sleep).await;
                        }
                    }
                }
            }
        }

        if state == DaemonState::Running {
            state = DaemonState::Stopping;
            info!("daemon stop requested");
        }
        debug_assert!(matches!(
            state,
            DaemonState::Stopping | DaemonState::Interrupted
        ));

        // Back to idle so the daemon can be restarted with the same handle.
        self.stop.clear();
        info!("daemon idle");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_flag_round_trip() {
        let flag = StopFlag::new();
        assert!(!flag.is_set());
        flag.request_stop();
        assert!(flag.is_set());
        flag.clear();
        assert!(!flag.is_set());
    }

    #[test]
    fn stop_flag_clones_share_state() {
        let flag = StopFlag::new();
        let other = flag.clone();
        other.request_stop();
        assert!(flag.is_set());
    }
}
