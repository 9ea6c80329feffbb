use uplift_core::{Database, UploadOutcome};

/// Run the `history` command: list the most recent uploads.
pub fn run(db: &Database, limit: usize) -> anyhow::Result<()> {
    let records = db.list_uploads(limit)?;
    if records.is_empty() {
        println!("No uploads recorded.");
        return Ok(());
    }

    println!("Recent Uploads");
    println!("==============");
    for record in records {
        let detail = match &record.outcome {
            UploadOutcome::Uploaded {
                activity_id: Some(id),
            } => format!("uploaded  https://www.strava.com/activities/{id}"),
            outcome => outcome.to_string(),
        };
        println!(
            "{}  {}  {}",
            record.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            record.file_path,
            detail
        );
    }

    Ok(())
}
