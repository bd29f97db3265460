use crate::model::ControllerConfig;
use anyhow::{Context, Result};
use reqwest::{StatusCode, Url};
use std::time::Duration;
use thiserror::Error;

/// Failure taxonomy for backend calls. How a given error is surfaced depends
/// on the caller: the test path shows both variants to the user, the history
/// path coerces shape errors to an empty list, and ISP detection swallows
/// everything.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Non-success HTTP outcome.
    #[error("HTTP error! status: {status}")]
    Status { status: StatusCode },
    /// The request never produced a response (refused, timed out, ...).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The response arrived but its payload does not match the expected
    /// structure.
    #[error("invalid response data: {0}")]
    Shape(String),
}

impl BackendError {
    pub fn is_shape(&self) -> bool {
        matches!(self, BackendError::Shape(_))
    }
}

/// Thin HTTP client for the measurement backend.
#[derive(Clone)]
pub struct BackendClient {
    base_url: Url,
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new(cfg: &ControllerConfig) -> Result<Self> {
        let base_url = Url::parse(&cfg.base_url).context("invalid base_url")?;

        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.request_timeout)
            .tcp_keepalive(Duration::from_secs(15))
            .build()
            .context("failed to build http client")?;

        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value, BackendError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| BackendError::Shape(format!("bad endpoint path {path}: {e}")))?;

        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(BackendError::Status { status });
        }

        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| BackendError::Shape(format!("payload is not valid JSON: {e}")))
    }

    /// Trigger one measurement on the backend and return its raw payload.
    /// This call blocks server-side for the duration of the real measurement.
    pub async fn fetch_measurement(&self) -> Result<serde_json::Value, BackendError> {
        self.get_json("/speedtest").await
    }

    pub async fn fetch_history(&self) -> Result<serde_json::Value, BackendError> {
        self.get_json("/history").await
    }

    pub async fn detect_isp(&self) -> Result<serde_json::Value, BackendError> {
        self.get_json("/detect-isp").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config(base_url: &str) -> ControllerConfig {
        ControllerConfig {
            base_url: base_url.to_string(),
            tick_interval: Duration::from_millis(50),
            request_timeout: Duration::from_secs(5),
            user_agent: "speedtest-dashboard-cli/test".into(),
        }
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(BackendClient::new(&test_config("not a url")).is_err());
    }

    #[test]
    fn base_url_is_normalized_for_display() {
        let client = BackendClient::new(&test_config("http://127.0.0.1:5000")).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:5000");
    }
}
