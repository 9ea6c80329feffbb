use std::path::PathBuf;
use tracing::{info, warn};
use uplift_core::config::CLIENT_SECRET_KEY;
use uplift_core::security::mask_token;
use uplift_core::{Database, Settings};

/// Run the `configure` command: store credentials and the workouts directory.
///
/// Options left out keep their stored values.
pub fn run(
    db: &Database,
    client_id: Option<String>,
    client_secret: Option<String>,
    workouts_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut settings = Settings::load(db);

    if let Some(client_id) = client_id {
        let client_id = client_id.trim();
        if client_id.is_empty() || !client_id.chars().all(|c| c.is_ascii_digit()) {
            anyhow::bail!("Client id must be the numeric id shown on the API settings page");
        }
        settings.client_id = client_id.to_string();
    }

    if let Some(secret) = client_secret {
        let secret = secret.trim();
        if secret.is_empty() {
            anyhow::bail!("Client secret must not be empty");
        }
        db.save_api_key(CLIENT_SECRET_KEY, secret)?;
        info!(secret = %mask_token(secret), "Stored client secret");
    }

    if let Some(dir) = workouts_dir {
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "Workouts directory does not exist yet");
        }
        settings.workouts_dir = Some(dir.to_string_lossy().into_owned());
    }

    settings.validate();
    settings.save(db)?;

    let secret = db.get_api_key(CLIENT_SECRET_KEY)?;
    println!("Uplift Configuration");
    println!("====================");
    println!(
        "Client id:     {}",
        if settings.client_id.is_empty() {
            "(not set)"
        } else {
            settings.client_id.as_str()
        }
    );
    println!(
        "Client secret: {}",
        secret
            .as_deref()
            .map(mask_token)
            .unwrap_or_else(|| "(not set)".to_string())
    );
    println!(
        "Workouts:      {}",
        settings.workouts_dir.as_deref().unwrap_or("(not set)")
    );
    println!("Database:      {}", db.path().display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_db() -> (TempDir, Database) {
        let temp = TempDir::new().unwrap();
        let db = Database::open_at(temp.path().join("uplift.db")).unwrap();
        db.migrate().unwrap();
        (temp, db)
    }

    #[test]
    fn test_configure_stores_values() {
        let (temp, db) = setup_test_db();

        run(
            &db,
            Some("12345".into()),
            Some("s3cret".into()),
            Some(temp.path().to_path_buf()),
        )
        .unwrap();

        let settings = Settings::load(&db);
        assert_eq!(settings.client_id, "12345");
        assert_eq!(
            settings.workouts_dir.as_deref(),
            Some(temp.path().to_string_lossy().as_ref())
        );
        assert_eq!(
            db.get_api_key(CLIENT_SECRET_KEY).unwrap().as_deref(),
            Some("s3cret")
        );
    }

    #[test]
    fn test_configure_keeps_omitted_values() {
        let (_temp, db) = setup_test_db();

        run(&db, Some("12345".into()), Some("s3cret".into()), None).unwrap();
        run(&db, None, None, None).unwrap();

        assert_eq!(Settings::load(&db).client_id, "12345");
        assert!(db.has_api_key(CLIENT_SECRET_KEY));
    }

    #[test]
    fn test_configure_rejects_non_numeric_client_id() {
        let (_temp, db) = setup_test_db();

        assert!(run(&db, Some("abc".into()), None, None).is_err());
        assert!(Settings::load(&db).client_id.is_empty());
    }
}
