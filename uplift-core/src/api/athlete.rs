//! Authenticated athlete profile.

use super::client::StravaClient;
use super::error::ApiError;
use crate::auth::Authenticator;
use crate::cancel::or_cancelled;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Subset of the athlete profile shown to the user.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Athlete {
    pub id: u64,
    #[serde(default, rename = "firstname")]
    pub first_name: Option<String>,
    #[serde(default, rename = "lastname")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl Athlete {
    pub fn display_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Fetch the profile of the athlete who authorized the app.
pub async fn fetch_athlete(
    client: &StravaClient,
    auth: &mut Authenticator,
    cancel: &CancellationToken,
) -> Result<Athlete, ApiError> {
    let token = auth.access_token(cancel).await.ok_or(ApiError::NoAuth)?;

    let reply = or_cancelled(cancel, client.get_athlete(&token))
        .await
        .ok_or(ApiError::Cancelled)??
        .ensure_success()?;
    let athlete: Athlete = reply.json()?;
    info!(athlete_id = athlete.id, "Fetched athlete profile");
    Ok(athlete)
}
