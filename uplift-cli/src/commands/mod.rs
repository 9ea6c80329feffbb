//! Subcommands and the plumbing they share.

pub mod configure;
pub mod history;
pub mod profile;
pub mod upload;

use anyhow::Context;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use uplift_core::{
    AuthSession, Authenticator, CancellationToken, ClientCredentials, Database, EnvOverrides,
    EventReceiver, EventSender, Settings, StravaClient, TokenClient, UploadEvent,
};

/// Open (and migrate) the database at `path`, or at the default location.
pub fn open_database(path: Option<PathBuf>) -> anyhow::Result<Database> {
    let db = match path {
        Some(path) => Database::open_at(path),
        None => Database::open(),
    }
    .context("Failed to open database")?;
    db.migrate().context("Failed to migrate database")?;
    tracing::debug!(path = %db.path().display(), "Database ready");
    Ok(db)
}

/// Settings and credentials resolved for one run.
pub struct Session {
    pub settings: Settings,
    pub client: StravaClient,
    pub auth: Authenticator,
}

impl Session {
    /// Build the API client and authenticator from stored settings and the
    /// environment.
    ///
    /// With `require_credentials` unset, missing credentials are tolerated
    /// (dry runs never reach the network).
    pub fn load(
        db: &Database,
        events: &EventSender,
        require_credentials: bool,
    ) -> anyhow::Result<Self> {
        let overrides = EnvOverrides::from_env();
        let mut settings = Settings::load(db);
        settings.apply_overrides(&overrides);

        let secret = Settings::client_secret(db, &overrides)?;
        if require_credentials && (settings.client_id.is_empty() || secret.is_none()) {
            anyhow::bail!(
                "Client id and secret are not configured; run `uplift configure --client-id .. --client-secret ..`"
            );
        }

        let endpoint = TokenClient::new(ClientCredentials {
            client_id: settings.client_id.clone(),
            client_secret: secret.unwrap_or_default(),
        })
        .with_token_url(&settings.token_url());

        let session = match &overrides.refresh_token {
            Some(token) => {
                tracing::info!("Using refresh token from the environment");
                AuthSession::from_refresh_token(token.clone())
            }
            None => AuthSession::empty(),
        };

        let auth = Authenticator::new(settings.auth_config(true), Box::new(endpoint))
            .with_session(session)
            .with_events(events.clone());
        let client = StravaClient::new().with_base_url(&settings.api_base);

        Ok(Self {
            settings,
            client,
            auth,
        })
    }
}

/// Cancellation token fired by Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            trigger.cancel();
        }
    });
    cancel
}

/// Print events until every sender is dropped.
pub fn spawn_event_printer(mut rx: EventReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            println!("{}", describe(&event));
        }
    })
}

/// One line of user-facing text for `event`.
pub fn describe(event: &UploadEvent) -> String {
    match event {
        UploadEvent::AuthorizationStarted { url } => {
            format!("Opening the browser to authorize Uplift: {url}")
        }
        UploadEvent::BrowserUnavailable { url } => {
            format!("Could not open a browser. Open this URL to continue:\n  {url}")
        }
        UploadEvent::Authorized => "Authorized.".to_string(),
        UploadEvent::TokenRefreshed => "Access token refreshed.".to_string(),
        UploadEvent::AuthFailed { reason } => format!("Authorization failed: {reason}"),
        UploadEvent::FileStarted { index, total, path } => {
            format!("[{index}/{total}] {}", path.display())
        }
        UploadEvent::Submitted { tracking_id } => format!("  submitted, upload id {tracking_id}"),
        UploadEvent::Polling { attempt, status } => format!("  waiting ({attempt}): {status}"),
        UploadEvent::RateLimited { pause_minutes } => {
            format!("  rate limit reached, pausing for {pause_minutes} minutes")
        }
        UploadEvent::BackoffTick { remaining_minutes } => {
            format!("  {remaining_minutes} minutes remaining")
        }
        UploadEvent::FileFinished { outcome, .. } => format!("  {outcome}"),
        UploadEvent::Cancelled => "Cancelled.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use uplift_core::{event_channel, UploadOutcome};

    #[test]
    fn test_describe_progress_lines() {
        let started = UploadEvent::FileStarted {
            index: 2,
            total: 5,
            path: PathBuf::from("RUNNING/a.tcx"),
        };
        assert_eq!(describe(&started), "[2/5] RUNNING/a.tcx");

        let finished = UploadEvent::FileFinished {
            path: PathBuf::from("RUNNING/a.tcx"),
            outcome: UploadOutcome::Uploaded {
                activity_id: Some(9),
            },
        };
        assert_eq!(describe(&finished), "  uploaded as activity 9");

        let paused = UploadEvent::RateLimited { pause_minutes: 16 };
        assert!(describe(&paused).contains("16 minutes"));
    }

    #[test]
    fn test_open_database_at_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("uplift.db");
        let db = open_database(Some(path.clone())).unwrap();
        assert_eq!(db.path(), path.as_path());
    }

    #[tokio::test]
    async fn test_session_requires_credentials_unless_dry_run() {
        let temp = TempDir::new().unwrap();
        let db = open_database(Some(temp.path().join("uplift.db"))).unwrap();
        let (tx, _rx) = event_channel();

        if std::env::var("UPLIFT_CLIENT_ID").is_err() {
            assert!(Session::load(&db, &tx, true).is_err());
        }
        assert!(Session::load(&db, &tx, false).is_ok());
    }
}
