//! Best-effort provider detection.
//!
//! This is non-critical enrichment: unlike the test and history paths, any
//! failure here is logged and otherwise invisible to the user. The provider
//! reference simply stays unset, and a later successful measurement can
//! still populate it from its own payload.

use crate::backend::BackendClient;
use crate::model::IspInfo;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct DetectIspResponse {
    #[serde(default)]
    isp_info: Option<IspInfo>,
}

/// Look up the current network provider. Returns `None` on any failure,
/// transport or shape alike.
pub async fn detect(client: &BackendClient) -> Option<IspInfo> {
    let value = match client.detect_isp().await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "ISP detection failed; continuing without provider info");
            return None;
        }
    };

    match serde_json::from_value::<DetectIspResponse>(value) {
        Ok(resp) => resp.isp_info.filter(|isp| isp.is_detected()),
        Err(e) => {
            tracing::warn!(error = %e, "ISP detection payload malformed; ignoring");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_shape_extracts_provider() {
        let resp: DetectIspResponse = serde_json::from_value(serde_json::json!({
            "isp_info": {"name": "Telkom", "support_phone": "10210"}
        }))
        .unwrap();
        let isp = resp.isp_info.unwrap();
        assert_eq!(isp.name, "Telkom");
        assert_eq!(isp.support_phone.as_deref(), Some("10210"));
    }

    #[test]
    fn missing_provider_field_is_tolerated() {
        let resp: DetectIspResponse =
            serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(resp.isp_info.is_none());
    }
}
