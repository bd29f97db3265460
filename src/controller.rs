//! Test-execution lifecycle controller.
//!
//! Owns the single writable copy of the current result, the history mirror
//! and the provider reference; everything else reads snapshots. One run at a
//! time: the measurement request and the progress simulator are two
//! independent time-driven activities with no ordering guarantee between
//! them, and both are reconciled in [`TestController::finish_run`].

use crate::backend::{BackendClient, BackendError};
use crate::history::HistoryStore;
use crate::model::{
    ControllerConfig, ControllerEvent, IspInfo, MeasurementResult, ProgressState,
};
use crate::progress::{ProgressHandle, ProgressSimulator};
use crate::{isp, quality};
use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Consolidated run state. A run is either not started, in flight with live
/// synthetic progress, or finished one way; stale combinations like
/// "loading with a result on screen" cannot be represented.
#[derive(Debug)]
pub enum RunState {
    Idle,
    Running { progress: ProgressState },
    Succeeded { result: MeasurementResult },
    Failed { reason: String },
}

pub struct TestController {
    cfg: ControllerConfig,
    client: BackendClient,
    state: RunState,
    history: HistoryStore,
    current_isp: Option<IspInfo>,
    support_modal_visible: bool,
    progress_handle: Option<ProgressHandle>,
    fetch_task: Option<JoinHandle<()>>,
}

impl TestController {
    pub fn new(cfg: ControllerConfig) -> Result<Self> {
        let client = BackendClient::new(&cfg)?;
        Ok(Self {
            cfg,
            client,
            state: RunState::Idle,
            history: HistoryStore::default(),
            current_isp: None,
            support_modal_visible: false,
            progress_handle: None,
            fetch_task: None,
        })
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, RunState::Running { .. })
    }

    /// Live synthetic progress. Zero/none whenever no run is in flight, so
    /// the value always resets at run end regardless of outcome.
    pub fn progress(&self) -> ProgressState {
        match &self.state {
            RunState::Running { progress } => *progress,
            _ => ProgressState::default(),
        }
    }

    pub fn latest_result(&self) -> Option<&MeasurementResult> {
        match &self.state {
            RunState::Succeeded { result } => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            RunState::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn current_isp(&self) -> Option<&IspInfo> {
        self.current_isp.as_ref()
    }

    pub fn support_modal_visible(&self) -> bool {
        self.support_modal_visible
    }

    pub fn open_support_modal(&mut self) {
        self.support_modal_visible = true;
    }

    pub fn close_support_modal(&mut self) {
        self.support_modal_visible = false;
    }

    pub fn dismiss_error(&mut self) {
        if matches!(self.state, RunState::Failed { .. }) {
            self.state = RunState::Idle;
        }
        self.history.dismiss_error();
    }

    /// Runs once at startup: initial history fetch and provider detection,
    /// concurrently. Neither blocks the other and detection failure is
    /// silent by design.
    pub async fn startup(&mut self) {
        let (history_value, detected) = tokio::join!(
            async {
                let mut store = HistoryStore::default();
                store.fetch(&self.client).await;
                store
            },
            isp::detect(&self.client)
        );
        self.history = history_value;
        if detected.is_some() {
            self.current_isp = detected;
        }
    }

    /// Start a new run. Returns `false` without side effects when a run is
    /// already in flight; this is a real state guard, not a disabled button.
    ///
    /// Entering `Running` discards any prior result or error. The simulator
    /// and the measurement request are started together; both report back
    /// through `events`.
    pub fn begin_run(&mut self, events: &mpsc::Sender<ControllerEvent>) -> bool {
        if self.is_running() {
            tracing::debug!("speed test already in progress; ignoring trigger");
            return false;
        }
        tracing::info!("starting speed test");

        self.state = RunState::Running {
            progress: ProgressState::default(),
        };
        self.progress_handle = Some(ProgressSimulator::start(
            self.cfg.tick_interval,
            events.clone(),
        ));

        let client = self.client.clone();
        let tx = events.clone();
        self.fetch_task = Some(tokio::spawn(async move {
            let outcome = client.fetch_measurement().await;
            // Receiver gone means the owning loop shut down; nothing to do.
            tx.send(ControllerEvent::MeasurementOutcome { outcome })
                .await
                .ok();
        }));

        true
    }

    /// Record a simulator tick. Ticks arriving outside a run (the simulator
    /// may outlive the measurement briefly) are dropped.
    pub fn on_progress(&mut self, p: ProgressState) {
        if let RunState::Running { progress } = &mut self.state {
            *progress = p;
        }
    }

    /// Complete the current run with the measurement outcome.
    ///
    /// On success the result is stored, provider info extracted, escalation
    /// applied, and the history refreshed. On any failure the error is
    /// surfaced with the backend address. On every path the simulator is
    /// cancelled and progress resets to zero/none.
    pub async fn finish_run(&mut self, outcome: Result<serde_json::Value, BackendError>) {
        if !self.is_running() {
            // Stale outcome from an aborted run.
            tracing::debug!("measurement outcome with no run in flight; dropping");
            return;
        }
        self.fetch_task = None;

        match outcome.and_then(|value| self.apply_measurement(value)) {
            Ok(()) => {
                tracing::info!("speed test completed");
                // Refresh history only after a successful test.
                self.history.fetch(&self.client).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "speed test failed");
                self.state = RunState::Failed {
                    reason: format!(
                        "Failed to run speed test: {e}. Please check if the backend is running on {}",
                        self.client.base_url()
                    ),
                };
            }
        }

        self.release_timer();
    }

    /// Early-abort exit path: cancel the outstanding request and the
    /// simulator, and return to idle.
    pub fn abort_run(&mut self) {
        if let Some(task) = self.fetch_task.take() {
            task.abort();
        }
        if self.is_running() {
            tracing::info!("speed test aborted");
            self.state = RunState::Idle;
        }
        self.release_timer();
    }

    pub async fn toggle_history(&mut self) {
        self.history.toggle(&self.client).await;
    }

    /// Validate and store a measurement payload.
    fn apply_measurement(&mut self, value: serde_json::Value) -> Result<(), BackendError> {
        if !value.is_object() {
            return Err(BackendError::Shape("payload is not an object".into()));
        }
        let mut result: MeasurementResult = serde_json::from_value(value)
            .map_err(|e| BackendError::Shape(e.to_string()))?;

        if result.timestamp.is_none() {
            result.timestamp = Some(local_timestamp());
        }

        // Provider info from the payload updates the shared reference when
        // it names a real ISP.
        if let Some(isp) = result.isp_info.as_ref().filter(|i| i.is_detected()) {
            self.current_isp = Some(isp.clone());
        }

        if quality::should_escalate(result.quality_assessment.as_ref()) {
            tracing::info!("quality assessment requests support contact");
            self.support_modal_visible = true;
        }

        self.state = RunState::Succeeded { result };
        Ok(())
    }

    /// Final step of every run: the timer acquired at run start must be
    /// released here, never left ticking.
    fn release_timer(&mut self) {
        if let Some(handle) = self.progress_handle.take() {
            handle.cancel();
        }
    }
}

fn local_timestamp() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "now".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TestPhase;
    use serde_json::json;
    use std::time::Duration;

    fn controller(base_url: &str) -> TestController {
        TestController::new(ControllerConfig {
            base_url: base_url.to_string(),
            tick_interval: Duration::from_millis(50),
            request_timeout: Duration::from_secs(1),
            user_agent: "speedtest-dashboard-cli/test".into(),
        })
        .unwrap()
    }

    // Nothing listens on this port; transport calls fail fast.
    const DEAD_BACKEND: &str = "http://127.0.0.1:9";

    #[tokio::test]
    async fn second_trigger_is_rejected_while_running() {
        let mut c = controller(DEAD_BACKEND);
        let (tx, _rx) = mpsc::channel(64);
        assert!(c.begin_run(&tx));
        assert!(c.is_running());
        assert!(!c.begin_run(&tx));
        c.abort_run();
        assert!(!c.is_running());
    }

    #[tokio::test]
    async fn transport_failure_surfaces_reason_and_address() {
        let mut c = controller(DEAD_BACKEND);
        let (tx, _rx) = mpsc::channel(64);
        c.begin_run(&tx);
        c.finish_run(Err(BackendError::Status {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
        }))
        .await;

        let reason = c.error().expect("run should have failed");
        assert!(reason.contains("Failed to run speed test"));
        assert!(reason.contains("500"));
        assert!(reason.contains("http://127.0.0.1:9"));
        // Progress reset on the failure path.
        assert_eq!(c.progress(), ProgressState::default());
        assert!(c.latest_result().is_none());
    }

    #[tokio::test]
    async fn non_object_payload_fails_with_shape_error() {
        let mut c = controller(DEAD_BACKEND);
        let (tx, _rx) = mpsc::channel(64);
        c.begin_run(&tx);
        c.finish_run(Ok(json!([1, 2, 3]))).await;
        assert!(c.error().unwrap().contains("invalid response data"));
    }

    #[tokio::test]
    async fn poor_result_raises_escalation_and_stores_result() {
        let mut c = controller(DEAD_BACKEND);
        let (tx, _rx) = mpsc::channel(64);
        c.begin_run(&tx);
        c.finish_run(Ok(json!({
            "ping": 12, "download_speed": 45.67, "upload_speed": 10.2,
            "quality_assessment": {
                "quality": "poor",
                "should_contact_support": true,
                "issues": ["high latency"],
                "recommendations": ["restart router"]
            }
        })))
        .await;

        let result = c.latest_result().expect("result stored");
        assert_eq!(result.ping, Some(12.0));
        let qa = result.quality_assessment.as_ref().unwrap();
        assert_eq!(qa.quality.as_deref(), Some("poor"));
        assert_eq!(qa.issues, vec!["high latency"]);
        assert!(c.support_modal_visible());
        // Timestamp stamped locally when the backend omits it.
        assert!(result.timestamp.is_some());
        // Post-success history refresh against a dead backend surfaces its
        // own error without demoting the run.
        assert!(c.history().error().is_some());
        assert!(c.latest_result().is_some());
    }

    #[tokio::test]
    async fn no_escalation_when_flag_is_false_or_absent() {
        let mut c = controller(DEAD_BACKEND);
        let (tx, _rx) = mpsc::channel(64);

        c.begin_run(&tx);
        c.finish_run(Ok(json!({
            "ping": 8,
            "quality_assessment": {"quality": "good", "should_contact_support": false}
        })))
        .await;
        assert!(!c.support_modal_visible());

        c.begin_run(&tx);
        c.finish_run(Ok(json!({"ping": 9}))).await;
        assert!(!c.support_modal_visible());
    }

    #[tokio::test]
    async fn provider_reference_updates_from_payload() {
        let mut c = controller(DEAD_BACKEND);
        let (tx, _rx) = mpsc::channel(64);
        c.begin_run(&tx);
        c.finish_run(Ok(json!({
            "ping": 10,
            "isp_info": {"name": "Rain", "support_email": "help@rain.example"}
        })))
        .await;
        assert_eq!(c.current_isp().unwrap().name, "Rain");

        // A placeholder provider does not clobber the reference.
        c.begin_run(&tx);
        c.finish_run(Ok(json!({
            "ping": 11,
            "isp_info": {"name": "Unknown ISP"}
        })))
        .await;
        assert_eq!(c.current_isp().unwrap().name, "Rain");
    }

    #[tokio::test]
    async fn progress_ticks_update_only_running_state() {
        let mut c = controller(DEAD_BACKEND);
        let tick = ProgressState {
            percent: 40,
            phase: TestPhase::Download,
        };

        // Ignored while idle.
        c.on_progress(tick);
        assert_eq!(c.progress(), ProgressState::default());

        let (tx, _rx) = mpsc::channel(64);
        c.begin_run(&tx);
        c.on_progress(tick);
        assert_eq!(c.progress(), tick);

        c.abort_run();
        assert_eq!(c.progress(), ProgressState::default());
    }

    #[tokio::test]
    async fn new_run_discards_previous_result() {
        let mut c = controller(DEAD_BACKEND);
        let (tx, _rx) = mpsc::channel(64);
        c.begin_run(&tx);
        c.finish_run(Ok(json!({"ping": 10}))).await;
        assert!(c.latest_result().is_some());

        c.begin_run(&tx);
        assert!(c.latest_result().is_none());
        c.abort_run();
    }
}
