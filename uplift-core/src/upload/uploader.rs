//! Submit a workout file and poll until the platform has processed it.

use super::backoff::RateLimitBackoff;
use super::status::UploadStatus;
use super::task::UploadTask;
use crate::api::{ApiError, ApiReply, StravaClient, UploadForm};
use crate::auth::Authenticator;
use crate::cancel::{or_cancelled, sleep_or_cancelled};
use crate::events::{emit, EventSender, UploadEvent};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Strava recommends polling no more than once a second; mean processing
/// time is around 8 seconds.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub const DEFAULT_MAX_POLLS: u32 = 30;

/// Timing knobs of the upload state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub backoff: RateLimitBackoff,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
            backoff: RateLimitBackoff::default(),
        }
    }
}

/// A processed upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedUpload {
    pub tracking_id: u64,
    /// Absent when completion was detected from the status text alone.
    pub activity_id: Option<u64>,
}

/// Runs uploads one at a time against the API.
pub struct Uploader {
    client: StravaClient,
    auth: Authenticator,
    policy: UploadPolicy,
    events: Option<EventSender>,
}

impl Uploader {
    pub fn new(client: StravaClient, auth: Authenticator) -> Self {
        Self {
            client,
            auth,
            policy: UploadPolicy::default(),
            events: None,
        }
    }

    pub fn with_policy(mut self, policy: UploadPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Report progress on `events`.
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    pub fn authenticator(&mut self) -> &mut Authenticator {
        &mut self.auth
    }

    /// Submit and then poll until done.
    pub async fn upload(
        &mut self,
        task: &UploadTask,
        cancel: &CancellationToken,
    ) -> Result<CompletedUpload, ApiError> {
        let tracking_id = self.submit(task, cancel).await?;
        self.poll_until_done(tracking_id, cancel).await
    }

    /// Post the file and return the tracking id.
    ///
    /// A rate-limited response is retried once after the backoff pause; a
    /// second rate-limited response fails the task.
    pub async fn submit(
        &mut self,
        task: &UploadTask,
        cancel: &CancellationToken,
    ) -> Result<u64, ApiError> {
        let token = self.auth.access_token(cancel).await.ok_or_else(|| {
            warn!("Could not get access token, the operation is cancelled");
            ApiError::NoAuth
        })?;

        let path = task.file_path();
        let payload = tokio::fs::read(path).await.map_err(|source| ApiError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = task.file_name();
        let form = UploadForm {
            activity_type: task.activity_kind(),
            name: task.display_name(),
            data_type: task.data_type(),
            file_name: &file_name,
            payload: &payload,
        };

        info!(
            file = %path.display(),
            activity_type = task.activity_kind(),
            bytes = payload.len(),
            "Submitting upload"
        );
        let endpoint = self.client.uploads_url();
        let reply = self
            .send_with_backoff(&endpoint, cancel, || self.client.post_upload(&token, &form))
            .await?
            .ensure_success()?;

        let status: UploadStatus = reply.json()?;
        if let Some(message) = status.error_message() {
            error!(%message, "The API returned an error");
            return Err(ApiError::Remote {
                message: message.to_string(),
            });
        }

        info!(tracking_id = status.tracking_id, "Upload accepted");
        emit(
            self.events.as_ref(),
            UploadEvent::Submitted {
                tracking_id: status.tracking_id,
            },
        );
        Ok(status.tracking_id)
    }

    /// Poll the upload until it is processed, fails, or the attempt budget runs out.
    ///
    /// Uses the token from submission without refreshing it.
    pub async fn poll_until_done(
        &self,
        tracking_id: u64,
        cancel: &CancellationToken,
    ) -> Result<CompletedUpload, ApiError> {
        let token = self.auth.cached_token().ok_or(ApiError::NoAuth)?;
        let endpoint = self.client.upload_url(tracking_id);
        let mut last: Option<UploadStatus> = None;

        for attempt in 1..=self.policy.max_polls {
            let reply = self
                .send_with_backoff(&endpoint, cancel, || {
                    self.client.get_upload(token, tracking_id)
                })
                .await?
                .ensure_success()?;
            let status: UploadStatus = reply.json()?;

            if let Some(message) = status.error_message() {
                error!(tracking_id, %message, "The API returned an error");
                return Err(ApiError::Remote {
                    message: message.to_string(),
                });
            }

            if status.is_complete() {
                info!(
                    tracking_id,
                    activity_id = ?status.activity_id,
                    attempt,
                    "Activity is ready"
                );
                return Ok(CompletedUpload {
                    tracking_id,
                    activity_id: status.activity_id,
                });
            }

            debug!(tracking_id, attempt, status = status.status_text(), "Still processing");
            emit(
                self.events.as_ref(),
                UploadEvent::Polling {
                    attempt,
                    status: status.status_text().to_string(),
                },
            );
            last = Some(status);

            if attempt < self.policy.max_polls
                && !sleep_or_cancelled(cancel, self.policy.poll_interval).await
            {
                return Err(ApiError::Cancelled);
            }
        }

        let last_status = last.as_ref().map(|s| s.status_text().to_string());
        let last_error = last.and_then(|s| s.error);
        error!(
            tracking_id,
            ?last_status,
            ?last_error,
            "The API did not return success status for the activity"
        );
        Err(ApiError::Timeout {
            tracking_id,
            attempts: self.policy.max_polls,
            last_status,
            last_error,
        })
    }

    /// Send a request; on a rate-limited reply, pause and send it exactly once more.
    async fn send_with_backoff<F, Fut>(
        &self,
        endpoint: &str,
        cancel: &CancellationToken,
        send: F,
    ) -> Result<ApiReply, ApiError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<ApiReply, ApiError>>,
    {
        let reply = or_cancelled(cancel, send())
            .await
            .ok_or(ApiError::Cancelled)??;
        if !reply.is_rate_limited() {
            return Ok(reply);
        }

        self.policy
            .backoff
            .pause(endpoint, cancel, self.events.as_ref())
            .await?;

        let retry = or_cancelled(cancel, send())
            .await
            .ok_or(ApiError::Cancelled)??;
        if retry.is_rate_limited() {
            error!(%endpoint, "Still rate limited after the pause");
            return Err(ApiError::RateLimited {
                endpoint: endpoint.to_string(),
            });
        }
        Ok(retry)
    }
}
