//! Server-side test history, fetched and replaced wholesale on demand.

use crate::backend::BackendClient;
use crate::model::HistoryEntry;

/// Local mirror of the backend's history list.
///
/// The list is never merged or appended locally: every successful fetch
/// replaces it in full, and a transport failure resets it to empty rather
/// than leaving stale rows on screen.
#[derive(Debug, Default)]
pub struct HistoryStore {
    entries: Vec<HistoryEntry>,
    visible: bool,
    error: Option<String>,
}

impl HistoryStore {
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Fetch the full list and replace the local copy.
    ///
    /// A response that is not a sequence is treated as empty with a logged
    /// warning and no user-visible error; a transport failure is surfaced
    /// and clears the list.
    pub async fn fetch(&mut self, client: &BackendClient) {
        tracing::debug!("fetching speed test history");
        match client.fetch_history().await {
            Ok(value) => self.replace_from(value),
            Err(e) => {
                tracing::error!(error = %e, "history fetch failed");
                self.entries.clear();
                self.error = Some(format!(
                    "Failed to load history: {e}. Please check if the backend is running on {}",
                    client.base_url()
                ));
            }
        }
    }

    /// Apply a raw history payload, replacing the stored list wholesale.
    pub fn replace_from(&mut self, value: serde_json::Value) {
        match serde_json::from_value::<Vec<HistoryEntry>>(value) {
            Ok(entries) => {
                tracing::debug!(count = entries.len(), "history loaded");
                self.entries = entries;
                self.error = None;
            }
            Err(e) => {
                // Recoverable: an unexpected payload shape just means an
                // empty list, not a user-visible failure.
                tracing::warn!(error = %e, "history payload is not a sequence");
                self.entries.clear();
                self.error = None;
            }
        }
    }

    /// View-level toggle: fetch only on the hidden -> visible transition.
    pub async fn toggle(&mut self, client: &BackendClient) {
        if !self.visible {
            self.fetch(client).await;
        }
        self.visible = !self.visible;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn successful_fetch_replaces_not_appends() {
        let mut store = HistoryStore::default();
        store.replace_from(json!([
            {"ping": 10.0, "download_speed": 50.0, "upload_speed": 20.0, "timestamp": "a"},
            {"ping": 12.0, "download_speed": 48.0, "upload_speed": 18.0, "timestamp": "b"},
        ]));
        assert_eq!(store.entries().len(), 2);

        store.replace_from(json!([
            {"ping": 9.0, "download_speed": 55.0, "upload_speed": 21.0, "timestamp": "c"},
        ]));
        assert_eq!(store.entries().len(), 1);
        assert_eq!(store.entries()[0].timestamp.as_deref(), Some("c"));
    }

    #[test]
    fn non_sequence_payload_yields_empty_without_error() {
        let mut store = HistoryStore::default();
        store.replace_from(json!([{"ping": 10.0}]));
        assert_eq!(store.entries().len(), 1);

        store.replace_from(json!({"error": "boom"}));
        assert!(store.entries().is_empty());
        assert!(store.error().is_none());

        store.replace_from(json!("nope"));
        assert!(store.entries().is_empty());
        assert!(store.error().is_none());
    }

    #[test]
    fn order_is_preserved_as_sent() {
        let mut store = HistoryStore::default();
        store.replace_from(json!([
            {"timestamp": "newest"},
            {"timestamp": "older"},
            {"timestamp": "oldest"},
        ]));
        let ts: Vec<_> = store
            .entries()
            .iter()
            .map(|e| e.timestamp.as_deref().unwrap())
            .collect();
        assert_eq!(ts, vec!["newest", "older", "oldest"]);
    }
}
