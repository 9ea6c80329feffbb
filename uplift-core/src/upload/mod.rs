//! Upload pipeline: task building, submission, status polling and rate-limit backoff.

mod backoff;
mod status;
mod task;
mod uploader;

pub use backoff::{RateLimitBackoff, DEFAULT_TICK, DEFAULT_TICKS};
pub use status::{UploadStatus, READY_MARKER};
pub use task::{
    activity_type_for, display_name_for, TaskError, UploadTask, DEFAULT_DATA_TYPE,
    FALLBACK_ACTIVITY_TYPE,
};
pub use uploader::{
    CompletedUpload, UploadPolicy, Uploader, DEFAULT_MAX_POLLS, DEFAULT_POLL_INTERVAL,
};

/// Result of handling one file in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Processed by the platform.
    Uploaded { activity_id: Option<u64> },
    /// Not sent (dry run).
    Skipped,
    Failed { reason: String },
}

impl UploadOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl std::fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uploaded {
                activity_id: Some(id),
            } => write!(f, "uploaded as activity {id}"),
            Self::Uploaded { activity_id: None } => write!(f, "uploaded"),
            Self::Skipped => write!(f, "skipped"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_display() {
        assert_eq!(
            UploadOutcome::Uploaded {
                activity_id: Some(7)
            }
            .to_string(),
            "uploaded as activity 7"
        );
        assert_eq!(UploadOutcome::Skipped.to_string(), "skipped");
        assert!(UploadOutcome::Failed {
            reason: "x".into()
        }
        .is_failure());
    }
}
