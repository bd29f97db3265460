//! Timer-driven progress simulation for the dashboard.
//!
//! The simulator gives the user continuous visual feedback while the real
//! measurement runs server-side with unpredictable latency. Its 100% state
//! and the measurement's completion are independent events; the controller
//! reconciles both before a run is considered over.

use crate::model::{ControllerEvent, ProgressState, TestPhase};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Fixed increment applied on every tick.
const STEP_PERCENT: u8 = 2;
/// Phase transitions are threshold-triggered, not measurement-triggered.
const DOWNLOAD_THRESHOLD: u8 = 33;
const UPLOAD_THRESHOLD: u8 = 66;

/// Pure progress state machine, advanced once per tick by the simulator
/// task. Kept separate from the timer so the transitions are testable
/// without any clock.
#[derive(Debug, Clone, Copy)]
pub struct ProgressTicker {
    state: ProgressState,
}

impl ProgressTicker {
    pub fn new() -> Self {
        Self {
            state: ProgressState {
                percent: 0,
                phase: TestPhase::Ping,
            },
        }
    }

    pub fn state(&self) -> ProgressState {
        self.state
    }

    /// 100% is the terminal state; the driving timer halts there.
    pub fn is_done(&self) -> bool {
        self.state.percent >= 100
    }

    /// Advance one tick and return the new snapshot. Percent is saturating
    /// and monotonically non-decreasing; the phase only ever moves forward.
    pub fn advance(&mut self) -> ProgressState {
        self.state.percent = self.state.percent.saturating_add(STEP_PERCENT).min(100);

        if self.state.percent >= UPLOAD_THRESHOLD {
            self.state.phase = TestPhase::Upload;
        } else if self.state.percent >= DOWNLOAD_THRESHOLD {
            self.state.phase = TestPhase::Download;
        }

        self.state
    }
}

impl Default for ProgressTicker {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellable handle to a running simulator task.
///
/// The timer is a resource acquired at run start; dropping the handle aborts
/// the task, so the controller cannot leak it on any exit path. `cancel` is
/// idempotent and safe to call on an already-halted simulator.
#[derive(Debug)]
pub struct ProgressHandle {
    task: JoinHandle<()>,
}

impl ProgressHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for ProgressHandle {
    fn drop(&mut self) {
        // Dropping a JoinHandle does NOT cancel the task in Tokio; abort
        // explicitly so no timer outlives its run.
        self.task.abort();
    }
}

pub struct ProgressSimulator;

impl ProgressSimulator {
    /// Start a free-running simulator that publishes a `Progress` event every
    /// `tick_interval` until it reaches 100% or is cancelled.
    pub fn start(
        tick_interval: Duration,
        events: mpsc::Sender<ControllerEvent>,
    ) -> ProgressHandle {
        let task = tokio::spawn(async move {
            let mut ticker = ProgressTicker::new();
            let mut interval = tokio::time::interval(tick_interval);
            // The first interval tick fires immediately; consume it so the
            // first advance happens one full interval after start.
            interval.tick().await;

            loop {
                interval.tick().await;
                let state = ticker.advance();
                if events
                    .send(ControllerEvent::Progress { state })
                    .await
                    .is_err()
                {
                    break;
                }
                if ticker.is_done() {
                    tracing::debug!("progress simulation reached 100%");
                    break;
                }
            }
        });

        ProgressHandle { task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_monotonic_and_bounded() {
        let mut ticker = ProgressTicker::new();
        let mut prev = ticker.state().percent;
        for _ in 0..200 {
            let s = ticker.advance();
            assert!(s.percent >= prev);
            assert!(s.percent <= 100);
            prev = s.percent;
        }
        assert!(ticker.is_done());
    }

    #[test]
    fn phases_flip_at_thresholds() {
        let mut ticker = ProgressTicker::new();
        assert_eq!(ticker.state().phase, TestPhase::Ping);

        let mut seen_download_at = None;
        let mut seen_upload_at = None;
        while !ticker.is_done() {
            let s = ticker.advance();
            if s.phase == TestPhase::Download && seen_download_at.is_none() {
                seen_download_at = Some(s.percent);
            }
            if s.phase == TestPhase::Upload && seen_upload_at.is_none() {
                seen_upload_at = Some(s.percent);
            }
        }
        // First tick at or past each threshold moves the phase.
        assert_eq!(seen_download_at, Some(34));
        assert_eq!(seen_upload_at, Some(66));
    }

    #[test]
    fn hundred_percent_is_terminal() {
        let mut ticker = ProgressTicker::new();
        while !ticker.is_done() {
            ticker.advance();
        }
        assert_eq!(ticker.state().percent, 100);
        let again = ticker.advance();
        assert_eq!(again.percent, 100);
        assert_eq!(again.phase, TestPhase::Upload);
    }

    #[tokio::test(start_paused = true)]
    async fn simulator_publishes_ticks_and_halts_at_100() {
        let (tx, mut rx) = mpsc::channel(256);
        let _handle = ProgressSimulator::start(Duration::from_millis(50), tx);

        let mut last = ProgressState::default();
        let mut prev_percent = 0u8;
        while let Some(ev) = rx.recv().await {
            let ControllerEvent::Progress { state } = ev else {
                panic!("unexpected event");
            };
            assert!(state.percent >= prev_percent);
            prev_percent = state.percent;
            last = state;
        }
        // Channel closed because the task halted itself at the terminal state.
        assert_eq!(last.percent, 100);
        assert_eq!(last.phase, TestPhase::Upload);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent_and_stops_ticks() {
        let (tx, mut rx) = mpsc::channel(256);
        let handle = ProgressSimulator::start(Duration::from_millis(50), tx);

        // Let a couple of ticks through, then cancel twice.
        let first = rx.recv().await.expect("at least one tick");
        assert!(matches!(first, ControllerEvent::Progress { .. }));
        handle.cancel();
        handle.cancel();

        // Sender side is gone once the task is aborted; drain whatever was
        // already in flight and observe the close.
        while rx.recv().await.is_some() {}
    }
}
