//! Pause after a rate-limited response.
//!
//! The pause runs as a countdown of fixed ticks so cancellation is observed
//! within one tick and the user sees how long is left.

use crate::api::ApiError;
use crate::cancel::sleep_or_cancelled;
use crate::events::{emit, EventSender, UploadEvent};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Length of one countdown tick.
pub const DEFAULT_TICK: Duration = Duration::from_secs(60);

/// Number of ticks in one pause (the 15-minute rate window plus a margin).
pub const DEFAULT_TICKS: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitBackoff {
    pub tick: Duration,
    pub ticks: u32,
}

impl Default for RateLimitBackoff {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            ticks: DEFAULT_TICKS,
        }
    }
}

impl RateLimitBackoff {
    /// Wait out the full countdown, or fail with [`ApiError::Cancelled`].
    pub async fn pause(
        &self,
        endpoint: &str,
        cancel: &CancellationToken,
        events: Option<&EventSender>,
    ) -> Result<(), ApiError> {
        warn!(
            %endpoint,
            ticks = self.ticks,
            tick_secs = self.tick.as_secs(),
            "Rate limit reached, pausing before retrying"
        );
        emit(
            events,
            UploadEvent::RateLimited {
                pause_minutes: self.ticks,
            },
        );

        for elapsed in 1..=self.ticks {
            if !sleep_or_cancelled(cancel, self.tick).await {
                info!("Rate-limit pause cancelled");
                return Err(ApiError::Cancelled);
            }
            let remaining = self.ticks - elapsed;
            info!(remaining, "Rate-limit pause");
            emit(
                events,
                UploadEvent::BackoffTick {
                    remaining_minutes: remaining,
                },
            );
        }
        Ok(())
    }
}
