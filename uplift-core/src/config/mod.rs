//! Configuration module for Uplift.
//!
//! Manages application settings stored in SQLite, with environment overrides.

mod settings;

pub use settings::{
    EnvOverrides, Settings, CLIENT_SECRET_KEY, ENV_CLIENT_ID, ENV_CLIENT_SECRET,
    ENV_REFRESH_TOKEN,
};
