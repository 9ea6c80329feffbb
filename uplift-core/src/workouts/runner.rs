use crate::api::ApiError;
use crate::events::{emit, EventSender, UploadEvent};
use crate::upload::{UploadOutcome, UploadTask, Uploader, DEFAULT_DATA_TYPE};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Build and validate tasks without sending anything.
    pub dry_run: bool,
    pub data_type: String,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            data_type: DEFAULT_DATA_TYPE.to_string(),
        }
    }
}

/// Outcome of every file that was attempted, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub outcomes: Vec<(PathBuf, UploadOutcome)>,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn uploaded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, UploadOutcome::Uploaded { .. }))
            .count()
    }

    pub fn failed(&self) -> bool {
        self.outcomes.iter().any(|(_, o)| o.is_failure())
    }
}

/// Upload `files` one after another.
///
/// The batch stops at the first failed file and when `cancel` fires. Files
/// after the stopping point have no outcome.
pub async fn run_batch(
    uploader: &mut Uploader,
    files: &[PathBuf],
    options: &BatchOptions,
    cancel: &CancellationToken,
    events: Option<&EventSender>,
) -> BatchReport {
    run_batch_with(uploader, files, options, cancel, events, |_, _| {}).await
}

/// Like [`run_batch`], calling `on_finished` as soon as each file has an
/// outcome, before the next file starts.
pub async fn run_batch_with<F>(
    uploader: &mut Uploader,
    files: &[PathBuf],
    options: &BatchOptions,
    cancel: &CancellationToken,
    events: Option<&EventSender>,
    mut on_finished: F,
) -> BatchReport
where
    F: FnMut(&Path, &UploadOutcome),
{
    let mut report = BatchReport::default();
    let total = files.len();
    info!(total, dry_run = options.dry_run, "Starting batch");

    for (index, path) in files.iter().enumerate() {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }

        emit(
            events,
            UploadEvent::FileStarted {
                index: index + 1,
                total,
                path: path.clone(),
            },
        );

        let outcome = match process_file(uploader, path, options, cancel).await {
            Ok(outcome) => outcome,
            Err(ApiError::Cancelled) => {
                report.cancelled = true;
                break;
            }
            Err(e) => {
                error!(file = %path.display(), error = %e, "Upload failed");
                UploadOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        let stop = outcome.is_failure();
        on_finished(path, &outcome);
        emit(
            events,
            UploadEvent::FileFinished {
                path: path.clone(),
                outcome: outcome.clone(),
            },
        );
        report.outcomes.push((path.clone(), outcome));

        if stop {
            warn!("Stopping batch after failure, investigate and restart");
            break;
        }
    }

    if report.cancelled {
        info!(done = report.outcomes.len(), total, "Batch cancelled");
        emit(events, UploadEvent::Cancelled);
    } else {
        info!(
            done = report.outcomes.len(),
            uploaded = report.uploaded(),
            total,
            "Batch finished"
        );
    }
    report
}

async fn process_file(
    uploader: &mut Uploader,
    path: &Path,
    options: &BatchOptions,
    cancel: &CancellationToken,
) -> Result<UploadOutcome, ApiError> {
    let task = match UploadTask::from_file(path, &options.data_type, options.dry_run) {
        Ok(task) => task,
        Err(e) => {
            return Ok(UploadOutcome::Failed {
                reason: e.to_string(),
            })
        }
    };

    if options.dry_run {
        info!(
            file = %path.display(),
            activity_type = task.activity_kind(),
            name = task.display_name(),
            "Dry run, not uploading"
        );
        return Ok(UploadOutcome::Skipped);
    }

    let done = uploader.upload(&task, cancel).await?;
    Ok(UploadOutcome::Uploaded {
        activity_id: done.activity_id,
    })
}
