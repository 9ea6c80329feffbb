//! Upload status snapshots returned by `POST /uploads` and `GET /uploads/{id}`.

use serde::Deserialize;

/// Marker in the status text once processing has finished
/// ("Your activity is ready."). Compared case-insensitively.
pub const READY_MARKER: &str = "ready";

/// One snapshot of an upload's processing state.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct UploadStatus {
    #[serde(rename = "id")]
    pub tracking_id: u64,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, rename = "status")]
    pub lifecycle_state: Option<String>,
    #[serde(default)]
    pub activity_id: Option<u64>,
}

impl UploadStatus {
    /// Error text, if the platform reported a non-empty one.
    pub fn error_message(&self) -> Option<&str> {
        self.error
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }

    /// Processing is finished: an activity id is assigned or the status says ready.
    pub fn is_complete(&self) -> bool {
        self.activity_id.is_some()
            || self
                .lifecycle_state
                .as_deref()
                .is_some_and(|s| s.to_lowercase().contains(READY_MARKER))
    }

    pub fn status_text(&self) -> &str {
        self.lifecycle_state.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> UploadStatus {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_processing_snapshot() {
        let status = parse(
            r#"{"id":16486788,"id_str":"16486788","external_id":"a.tcx","error":null,"status":"Your activity is still being processed.","activity_id":null}"#,
        );
        assert_eq!(status.tracking_id, 16486788);
        assert!(!status.is_complete());
        assert!(status.error_message().is_none());
    }

    #[test]
    fn test_complete_by_activity_id() {
        let status = parse(r#"{"id":1,"status":"Your activity is still being processed.","activity_id":99}"#);
        assert!(status.is_complete());
    }

    #[test]
    fn test_complete_by_ready_text_case_insensitive() {
        assert!(parse(r#"{"id":1,"status":"YOUR ACTIVITY IS READY."}"#).is_complete());
        assert!(parse(r#"{"id":1,"status":"Your activity is ready."}"#).is_complete());
    }

    #[test]
    fn test_error_message_ignores_blank() {
        assert!(parse(r#"{"id":1,"error":"  "}"#).error_message().is_none());
        assert_eq!(
            parse(r#"{"id":1,"error":"a.tcx duplicate of activity 5"}"#).error_message(),
            Some("a.tcx duplicate of activity 5")
        );
    }
}
