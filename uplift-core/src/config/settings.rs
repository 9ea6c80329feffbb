//! Application settings for Uplift.
//!
//! Settings are persisted to the SQLite database as JSON.

use crate::api::API_BASE;
use crate::auth::{AuthConfig, DEFAULT_SCOPE};
use crate::upload::{RateLimitBackoff, UploadPolicy, DEFAULT_DATA_TYPE, DEFAULT_TICK};
use crate::workouts::BatchOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Name of the client secret in the `api_keys` table.
pub const CLIENT_SECRET_KEY: &str = "STRAVA_CLIENT_SECRET";

/// Key of the settings JSON in the `settings` table.
const SETTINGS_KEY: &str = "settings";

// =============================================================================
// Environment Overrides
// =============================================================================

pub const ENV_CLIENT_ID: &str = "UPLIFT_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "UPLIFT_CLIENT_SECRET";
pub const ENV_REFRESH_TOKEN: &str = "UPLIFT_REFRESH_TOKEN";

/// Values supplied through the environment. Blank values count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Externally supplied refresh token; seeds the session so the first
    /// request refreshes silently.
    pub refresh_token: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            client_id: get(ENV_CLIENT_ID),
            client_secret: get(ENV_CLIENT_SECRET),
            refresh_token: get(ENV_REFRESH_TOKEN),
        }
    }
}

// =============================================================================
// Application Settings
// =============================================================================

/// Application settings - persisted to database as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Application id from the Strava API settings page.
    pub client_id: String,

    /// Directory holding the extracted workouts, one subdirectory per sport.
    pub workouts_dir: Option<String>,

    /// Requested OAuth scope.
    pub scope: String,

    /// `auto` or `force`.
    pub approval_prompt: String,

    /// Host of the API and OAuth endpoints.
    pub api_base: String,

    /// Payload format of the workout files.
    pub data_type: String,

    /// Seconds between status polls; never below 2.
    pub poll_interval_secs: u64,

    pub max_polls: u32,

    /// Length of the rate-limit pause.
    pub backoff_minutes: u32,

    /// How long to wait for the browser redirect.
    pub redirect_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            workouts_dir: None,
            scope: DEFAULT_SCOPE.to_string(),
            approval_prompt: "auto".to_string(),
            api_base: API_BASE.to_string(),
            data_type: DEFAULT_DATA_TYPE.to_string(),
            poll_interval_secs: 2,
            max_polls: 30,
            backoff_minutes: 16,
            redirect_timeout_secs: 300,
        }
    }
}

impl Settings {
    /// Load settings from database, using defaults for missing values.
    ///
    /// If settings don't exist or can't be parsed, returns defaults.
    pub fn load(db: &crate::db::Database) -> Self {
        let mut settings = Self::default();

        if let Ok(Some(json)) = db.get_setting(SETTINGS_KEY) {
            match serde_json::from_str::<Settings>(&json) {
                Ok(loaded) => settings = loaded,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to parse settings, using defaults");
                }
            }
        }

        settings.validate();
        settings
    }

    /// Save settings to database.
    pub fn save(&self, db: &crate::db::Database) -> anyhow::Result<()> {
        let json = serde_json::to_string(self)?;
        db.set_setting(SETTINGS_KEY, &json)?;
        Ok(())
    }

    /// Validate and clamp settings to valid ranges.
    pub fn validate(&mut self) {
        self.poll_interval_secs = self.poll_interval_secs.clamp(2, 60);
        self.max_polls = self.max_polls.clamp(1, 1000);
        self.backoff_minutes = self.backoff_minutes.clamp(1, 60);
        self.redirect_timeout_secs = self.redirect_timeout_secs.clamp(30, 3600);

        if self.scope.trim().is_empty() {
            self.scope = DEFAULT_SCOPE.to_string();
        }
        if !matches!(self.approval_prompt.as_str(), "auto" | "force") {
            self.approval_prompt = "auto".to_string();
        }
        if self.data_type.trim().is_empty() {
            self.data_type = DEFAULT_DATA_TYPE.to_string();
        }

        let base = self.api_base.trim().trim_end_matches('/');
        self.api_base = if base.is_empty() {
            API_BASE.to_string()
        } else {
            base.to_string()
        };
    }

    /// Apply environment overrides on top of the stored values.
    pub fn apply_overrides(&mut self, overrides: &EnvOverrides) {
        if let Some(client_id) = &overrides.client_id {
            self.client_id = client_id.clone();
        }
    }

    /// Client secret from the environment, else from the database.
    pub fn client_secret(
        db: &crate::db::Database,
        overrides: &EnvOverrides,
    ) -> anyhow::Result<Option<String>> {
        if let Some(secret) = &overrides.client_secret {
            return Ok(Some(secret.clone()));
        }
        Ok(db.get_api_key(CLIENT_SECRET_KEY)?)
    }

    pub fn authorize_url(&self) -> String {
        format!("{}/oauth/authorize", self.api_base)
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth/token", self.api_base)
    }

    pub fn auth_config(&self, allow_interactive: bool) -> AuthConfig {
        let mut config = AuthConfig::new(self.client_id.clone());
        config.authorize_url = self.authorize_url();
        config.scope = self.scope.clone();
        config.approval_prompt = self.approval_prompt.clone();
        config.redirect_timeout = Duration::from_secs(self.redirect_timeout_secs);
        config.allow_interactive = allow_interactive;
        config
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_polls: self.max_polls,
            backoff: RateLimitBackoff {
                tick: DEFAULT_TICK,
                ticks: self.backoff_minutes,
            },
        }
    }

    pub fn batch_options(&self, dry_run: bool) -> BatchOptions {
        BatchOptions {
            dry_run,
            data_type: self.data_type.clone(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_db() -> (TempDir, crate::db::Database) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = crate::db::Database::open_at(db_path).unwrap();
        db.migrate().unwrap();
        (temp_dir, db)
    }

    // -------------------------------------------------------------------------
    // Settings Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert!(settings.client_id.is_empty());
        assert!(settings.workouts_dir.is_none());
        assert_eq!(settings.scope, "read,activity:write");
        assert_eq!(settings.approval_prompt, "auto");
        assert_eq!(settings.api_base, "https://www.strava.com");
        assert_eq!(settings.data_type, "tcx");
        assert_eq!(settings.poll_interval_secs, 2);
        assert_eq!(settings.max_polls, 30);
        assert_eq!(settings.backoff_minutes, 16);
        assert_eq!(settings.redirect_timeout_secs, 300);
    }

    #[test]
    fn test_settings_save_and_load_roundtrip() {
        let (_temp, db) = setup_test_db();

        let mut original = Settings::default();
        original.client_id = "12345".to_string();
        original.workouts_dir = Some("/home/user/workouts".to_string());
        original.approval_prompt = "force".to_string();
        original.save(&db).unwrap();

        let loaded = Settings::load(&db);
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_settings_load_returns_defaults_when_missing() {
        let (_temp, db) = setup_test_db();

        assert_eq!(Settings::load(&db), Settings::default());
    }

    #[test]
    fn test_settings_load_returns_defaults_on_invalid_json() {
        let (_temp, db) = setup_test_db();

        db.set_setting("settings", "not valid json {{").unwrap();

        assert_eq!(Settings::load(&db), Settings::default());
    }

    #[test]
    fn test_settings_load_fills_missing_fields() {
        let (_temp, db) = setup_test_db();

        db.set_setting("settings", r#"{"client_id":"777"}"#).unwrap();

        let settings = Settings::load(&db);
        assert_eq!(settings.client_id, "777");
        assert_eq!(settings.max_polls, 30);
    }

    #[test]
    fn test_settings_validate_clamps_timing() {
        let mut settings = Settings {
            poll_interval_secs: 0,
            max_polls: 0,
            backoff_minutes: 500,
            redirect_timeout_secs: 1,
            ..Settings::default()
        };
        settings.validate();

        assert_eq!(settings.poll_interval_secs, 2);
        assert_eq!(settings.max_polls, 1);
        assert_eq!(settings.backoff_minutes, 60);
        assert_eq!(settings.redirect_timeout_secs, 30);
    }

    #[test]
    fn test_poll_interval_never_below_two_seconds() {
        let mut settings = Settings {
            poll_interval_secs: 1,
            ..Settings::default()
        };
        settings.validate();

        assert_eq!(settings.poll_interval_secs, 2);
        assert_eq!(settings.upload_policy().poll_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_settings_validate_normalizes_strings() {
        let mut settings = Settings {
            scope: " ".to_string(),
            approval_prompt: "always".to_string(),
            api_base: "http://localhost:9000/".to_string(),
            data_type: String::new(),
            ..Settings::default()
        };
        settings.validate();

        assert_eq!(settings.scope, DEFAULT_SCOPE);
        assert_eq!(settings.approval_prompt, "auto");
        assert_eq!(settings.api_base, "http://localhost:9000");
        assert_eq!(settings.data_type, "tcx");
    }

    // -------------------------------------------------------------------------
    // Override and Derived Config Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_env_overrides_ignore_blank_values() {
        let overrides = EnvOverrides::from_lookup(|name| match name {
            ENV_CLIENT_ID => Some(" 42 ".to_string()),
            ENV_CLIENT_SECRET => Some("   ".to_string()),
            _ => None,
        });

        assert_eq!(overrides.client_id.as_deref(), Some("42"));
        assert!(overrides.client_secret.is_none());
        assert!(overrides.refresh_token.is_none());

        let mut settings = Settings::default();
        settings.apply_overrides(&overrides);
        assert_eq!(settings.client_id, "42");
    }

    #[test]
    fn test_client_secret_prefers_environment() {
        let (_temp, db) = setup_test_db();
        db.save_api_key(CLIENT_SECRET_KEY, "stored").unwrap();

        let none = EnvOverrides::default();
        assert_eq!(
            Settings::client_secret(&db, &none).unwrap().as_deref(),
            Some("stored")
        );

        let env = EnvOverrides {
            client_secret: Some("from-env".to_string()),
            ..EnvOverrides::default()
        };
        assert_eq!(
            Settings::client_secret(&db, &env).unwrap().as_deref(),
            Some("from-env")
        );
    }

    #[test]
    fn test_derived_configs() {
        let settings = Settings {
            client_id: "12345".to_string(),
            api_base: "http://localhost:9000".to_string(),
            backoff_minutes: 3,
            ..Settings::default()
        };

        let auth = settings.auth_config(false);
        assert_eq!(auth.client_id, "12345");
        assert_eq!(auth.authorize_url, "http://localhost:9000/oauth/authorize");
        assert!(!auth.allow_interactive);
        assert_eq!(auth.redirect_timeout, Duration::from_secs(300));
        assert_eq!(settings.token_url(), "http://localhost:9000/oauth/token");

        let policy = settings.upload_policy();
        assert_eq!(policy.poll_interval, Duration::from_secs(2));
        assert_eq!(policy.backoff.ticks, 3);
        assert_eq!(policy.backoff.tick, Duration::from_secs(60));

        let batch = settings.batch_options(true);
        assert!(batch.dry_run);
        assert_eq!(batch.data_type, "tcx");
    }
}
