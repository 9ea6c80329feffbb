use super::{cancel_on_ctrl_c, spawn_event_printer, Session};
use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uplift_core::workouts::PROCESSED_SUFFIX;
use uplift_core::{
    discover_workouts, event_channel, run_batch_with, Database, UploadOutcome, Uploader,
};

/// Run the `upload` command: upload every pending workout, one at a time.
pub async fn run(db: &Database, dry_run: bool, dir: Option<PathBuf>) -> anyhow::Result<()> {
    let (tx, rx) = event_channel();
    let printer = spawn_event_printer(rx);
    let cancel = cancel_on_ctrl_c();

    let session = Session::load(db, &tx, !dry_run)?;
    let root = dir
        .or_else(|| session.settings.workouts_dir.as_ref().map(PathBuf::from))
        .context("No workouts directory; pass --dir or run `uplift configure --workouts-dir ..`")?;

    let files = discover_workouts(&root)?;
    if files.is_empty() {
        println!("Nothing to upload in {}", root.display());
        return Ok(());
    }
    info!(count = files.len(), root = %root.display(), "Found workouts");

    let options = session.settings.batch_options(dry_run);
    let mut uploader = Uploader::new(session.client, session.auth)
        .with_policy(session.settings.upload_policy())
        .with_events(tx.clone());

    let report = run_batch_with(
        &mut uploader,
        &files,
        &options,
        &cancel,
        Some(&tx),
        |path, outcome| record_outcome(db, path, outcome),
    )
    .await;

    drop(uploader);
    drop(tx);
    let _ = printer.await;

    println!();
    println!(
        "{} of {} files handled, {} uploaded",
        report.outcomes.len(),
        files.len(),
        report.uploaded()
    );

    if report.cancelled {
        anyhow::bail!("Upload cancelled");
    }
    if report.failed() {
        anyhow::bail!("Upload stopped after a failure; fix the problem and run again");
    }
    Ok(())
}

/// Record one outcome and, once uploaded, mark the file so a rerun skips it.
///
/// Neither step aborts the batch; failures are logged.
fn record_outcome(db: &Database, path: &Path, outcome: &UploadOutcome) {
    if let Err(e) = db.record_upload(path, outcome) {
        warn!(file = %path.display(), error = %e, "Failed to record upload history");
    }
    if matches!(outcome, UploadOutcome::Uploaded { .. }) {
        if let Err(e) = mark_processed(path) {
            warn!(file = %path.display(), error = %e, "Failed to mark file as processed");
        }
    }
}

/// Rename `path` to `<path>.processed`.
fn mark_processed(path: &Path) -> std::io::Result<PathBuf> {
    let mut target = path.as_os_str().to_owned();
    target.push(".");
    target.push(PROCESSED_SUFFIX);
    let target = PathBuf::from(target);
    std::fs::rename(path, &target)?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "<TrainingCenterDatabase/>").unwrap();
        path
    }

    #[test]
    fn test_mark_processed_hides_file_from_discovery() {
        let temp = TempDir::new().unwrap();
        let file = touch(temp.path(), "RUNNING/a.tcx");

        let renamed = mark_processed(&file).unwrap();

        assert!(!file.exists());
        assert!(renamed.ends_with("RUNNING/a.tcx.processed"));
        assert!(discover_workouts(temp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_record_outcome_only_renames_uploaded_files() {
        let temp = TempDir::new().unwrap();
        let db = Database::open_at(temp.path().join("uplift.db")).unwrap();
        db.migrate().unwrap();
        let uploaded = touch(temp.path(), "w/RUNNING/a.tcx");
        let failed = touch(temp.path(), "w/RUNNING/b.tcx");

        record_outcome(
            &db,
            &uploaded,
            &UploadOutcome::Uploaded {
                activity_id: Some(3),
            },
        );
        record_outcome(
            &db,
            &failed,
            &UploadOutcome::Failed {
                reason: "duplicate".into(),
            },
        );

        assert!(!uploaded.exists());
        assert!(failed.exists());
        assert_eq!(db.list_uploads(10).unwrap().len(), 2);
    }

    #[test]
    fn test_record_outcome_renames_even_when_history_fails() {
        let temp = TempDir::new().unwrap();
        // Not migrated, so the history insert fails.
        let db = Database::open_at(temp.path().join("uplift.db")).unwrap();
        let uploaded = touch(temp.path(), "w/RUNNING/a.tcx");

        record_outcome(&db, &uploaded, &UploadOutcome::Uploaded { activity_id: None });

        assert!(!uploaded.exists());
        assert!(temp.path().join("w/RUNNING/a.tcx.processed").exists());
    }

    #[tokio::test]
    async fn test_dry_run_without_credentials() {
        let temp = TempDir::new().unwrap();
        let db = Database::open_at(temp.path().join("uplift.db")).unwrap();
        db.migrate().unwrap();
        let root = temp.path().join("w");
        let file = touch(&root, "WALKING/a.tcx");

        run(&db, true, Some(root)).await.unwrap();

        assert!(file.exists());
        let records = db.list_uploads(10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, UploadOutcome::Skipped);
    }
}
