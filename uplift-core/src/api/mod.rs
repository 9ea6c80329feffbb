//! Strava REST API access: HTTP client, errors and the athlete profile.

pub mod athlete;
pub mod client;
pub mod error;

pub use athlete::{fetch_athlete, Athlete};
pub use client::{ApiReply, StravaClient, UploadForm, API_BASE};
pub use error::ApiError;
