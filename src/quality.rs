//! Pure decision logic mapping the backend's quality classification to a
//! presentation affordance and to the support-escalation signal. No state,
//! no side effects.

use crate::model::QualityAssessment;

/// Recognized quality levels. Anything the backend sends outside the three
/// known labels collapses to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Good,
    Fair,
    Poor,
    Unknown,
}

impl Quality {
    /// Case-insensitive parse; absent or unrecognized labels map to `Unknown`.
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(|s| s.to_ascii_lowercase()).as_deref() {
            Some("good") => Quality::Good,
            Some("fair") => Quality::Fair,
            Some("poor") => Quality::Poor,
            _ => Quality::Unknown,
        }
    }
}

/// Badge styling pair for a quality level. Tokens are presentation-agnostic
/// names; the TUI maps them onto terminal colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadgeStyle {
    pub color: &'static str,
    pub background: &'static str,
}

/// Deterministic quality → badge pairing. Unknown and absent values always
/// get the neutral pairing.
pub fn classify(quality: Option<&str>) -> BadgeStyle {
    match Quality::from_label(quality) {
        Quality::Good => BadgeStyle {
            color: "green",
            background: "green-dim",
        },
        Quality::Fair => BadgeStyle {
            color: "yellow",
            background: "yellow-dim",
        },
        Quality::Poor => BadgeStyle {
            color: "red",
            background: "red-dim",
        },
        Quality::Unknown => BadgeStyle {
            color: "gray",
            background: "gray-dim",
        },
    }
}

/// Whether an assessment asks for the support-contact workflow.
pub fn should_escalate(assessment: Option<&QualityAssessment>) -> bool {
    assessment.map(|a| a.should_contact_support).unwrap_or(false)
}
