use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::backend::BackendError;

/// Configuration for one controller instance, built from CLI arguments.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub base_url: String,
    /// Interval between synthetic progress ticks.
    pub tick_interval: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

/// One completed measurement as reported by the backend.
///
/// Every field is optional: the backend fills in what it measured and the
/// client renders "N/A" for the rest. Replaced wholesale at the start of the
/// next run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeasurementResult {
    #[serde(default)]
    pub ping: Option<f64>,
    #[serde(default)]
    pub download_speed: Option<f64>,
    #[serde(default)]
    pub upload_speed: Option<f64>,
    /// Opaque display string; stamped locally if the backend omits it.
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub isp_info: Option<IspInfo>,
    #[serde(default)]
    pub quality_assessment: Option<QualityAssessment>,
}

/// Backend-computed classification of connection health.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityAssessment {
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub should_contact_support: bool,
}

/// Provider reference record with support contact channels.
///
/// Read-only once received; shared between the latest-result panel and the
/// support workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IspInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub support_phone: Option<String>,
    #[serde(default)]
    pub support_email: Option<String>,
    #[serde(default)]
    pub whatsapp: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub live_chat: Option<String>,
    #[serde(default)]
    pub social_media: Option<SocialMedia>,
}

impl IspInfo {
    /// A provider record counts as detected only when it names a real ISP.
    /// The backend sends "Unknown ISP" as a placeholder when lookup failed.
    pub fn is_detected(&self) -> bool {
        !self.name.is_empty() && self.name != "Unknown ISP"
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SocialMedia {
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub facebook: Option<String>,
}

/// One row of the server-side test history. Unknown fields (e.g. the
/// database id) are ignored; the sequence order is server-determined.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub ping: Option<f64>,
    #[serde(default)]
    pub download_speed: Option<f64>,
    #[serde(default)]
    pub upload_speed: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Named phase of the synthetic progress simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestPhase {
    #[default]
    None,
    Ping,
    Download,
    Upload,
}

impl TestPhase {
    pub fn label(self) -> &'static str {
        match self {
            TestPhase::None => "",
            TestPhase::Ping => "ping",
            TestPhase::Download => "download",
            TestPhase::Upload => "upload",
        }
    }
}

/// Synthetic progress snapshot published by the simulator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    /// 0..=100, monotonically non-decreasing within a run.
    pub percent: u8,
    pub phase: TestPhase,
}

/// Events flowing from the background tasks (simulator, measurement fetch)
/// to whichever loop owns the controller.
#[derive(Debug)]
pub enum ControllerEvent {
    /// Synthetic progress tick from the simulator task.
    Progress { state: ProgressState },
    /// The outstanding measurement request resolved, one way or the other.
    MeasurementOutcome {
        outcome: Result<serde_json::Value, BackendError>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measurement_result_tolerates_partial_payload() {
        let r: MeasurementResult = serde_json::from_value(serde_json::json!({
            "ping": 12.0,
            "download_speed": 45.67
        }))
        .unwrap();
        assert_eq!(r.ping, Some(12.0));
        assert_eq!(r.download_speed, Some(45.67));
        assert!(r.upload_speed.is_none());
        assert!(r.quality_assessment.is_none());
    }

    #[test]
    fn history_entry_ignores_server_side_fields() {
        let e: HistoryEntry = serde_json::from_value(serde_json::json!({
            "id": 7,
            "ping": 20.0,
            "download_speed": 10.0,
            "upload_speed": 5.0,
            "timestamp": "2024-01-01 10:00:00"
        }))
        .unwrap();
        assert_eq!(e.ping, Some(20.0));
        assert_eq!(e.timestamp.as_deref(), Some("2024-01-01 10:00:00"));
    }

    #[test]
    fn unknown_isp_placeholder_is_not_detected() {
        let isp = IspInfo {
            name: "Unknown ISP".into(),
            ..Default::default()
        };
        assert!(!isp.is_detected());
        assert!(!IspInfo::default().is_detected());

        let isp = IspInfo {
            name: "Afrihost".into(),
            ..Default::default()
        };
        assert!(isp.is_detected());
    }
}
