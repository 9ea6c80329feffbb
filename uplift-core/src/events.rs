//! Progress events for the front-end.
//!
//! The library reports what it is doing as [`UploadEvent`] values over an
//! unbounded channel; the front-end decides how to render them.

use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::upload::UploadOutcome;

// =============================================================================
// Events
// =============================================================================

/// Human-facing progress and error messages.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// Interactive authorization started; the URL is opened in the browser.
    AuthorizationStarted { url: String },

    /// The browser could not be launched; the user must open the URL manually.
    BrowserUnavailable { url: String },

    /// Access token acquired through the browser prompt.
    Authorized,

    /// Access token renewed with the refresh token.
    TokenRefreshed,

    /// Authentication failed; the current operation is aborted.
    AuthFailed { reason: String },

    /// Work on a file has started.
    FileStarted {
        index: usize,
        total: usize,
        path: PathBuf,
    },

    /// The platform accepted the file for processing.
    Submitted { tracking_id: u64 },

    /// A status poll returned without a final result.
    Polling { attempt: u32, status: String },

    /// The platform rate-limited a request; a pause follows.
    RateLimited { pause_minutes: u32 },

    /// One minute of the rate-limit pause has elapsed.
    BackoffTick { remaining_minutes: u32 },

    /// Work on a file has finished.
    FileFinished {
        path: PathBuf,
        outcome: UploadOutcome,
    },

    /// Cancellation was observed; the run stops.
    Cancelled,
}

// =============================================================================
// Channel Types
// =============================================================================

/// Sender for upload events.
pub type EventSender = mpsc::UnboundedSender<UploadEvent>;

/// Receiver for upload events.
pub type EventReceiver = mpsc::UnboundedReceiver<UploadEvent>;

/// Create an event channel for streaming upload events.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Send an event if a sender is attached. A closed receiver is not an error.
pub(crate) fn emit(events: Option<&EventSender>, event: UploadEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}
