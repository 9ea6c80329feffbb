//! Typed reqwest wrapper for the Strava REST API.

use super::error::ApiError;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

/// Strava API host.
pub const API_BASE: &str = "https://www.strava.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Raw status and body of an API response.
///
/// Status interpretation (rate limiting, errors) is left to the caller.
#[derive(Debug, Clone)]
pub struct ApiReply {
    pub endpoint: String,
    pub status: StatusCode,
    pub body: String,
}

impl ApiReply {
    pub fn is_rate_limited(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS
    }

    /// Fail with [`ApiError::Http`] unless the status is 2xx.
    pub fn ensure_success(self) -> Result<Self, ApiError> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(ApiError::Http {
                endpoint: self.endpoint,
                status: self.status.as_u16(),
                body: self.body,
            })
        }
    }

    /// Deserialize the JSON body.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| {
            ApiError::transport(&self.endpoint, format!("malformed response body: {e}"))
        })
    }
}

/// Multipart fields of an upload request.
#[derive(Debug, Clone)]
pub struct UploadForm<'a> {
    pub activity_type: &'a str,
    pub name: &'a str,
    pub data_type: &'a str,
    pub file_name: &'a str,
    pub payload: &'a [u8],
}

/// HTTP client for the Strava API.
#[derive(Debug, Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for StravaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl StravaClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: API_BASE.to_string(),
        }
    }

    /// Override the base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn uploads_url(&self) -> String {
        format!("{}/api/v3/uploads", self.base_url)
    }

    pub fn upload_url(&self, tracking_id: u64) -> String {
        format!("{}/api/v3/uploads/{}", self.base_url, tracking_id)
    }

    pub fn athlete_url(&self) -> String {
        format!("{}/api/v3/athlete", self.base_url)
    }

    /// `POST /api/v3/uploads` with a multipart body.
    pub async fn post_upload(
        &self,
        access_token: &str,
        form: &UploadForm<'_>,
    ) -> Result<ApiReply, ApiError> {
        let url = self.uploads_url();
        let file = Part::bytes(form.payload.to_vec()).file_name(form.file_name.to_string());
        let body = Form::new()
            .text("activity_type", form.activity_type.to_string())
            .text("name", form.name.to_string())
            .text("data_type", form.data_type.to_string())
            .part("file", file);

        let request = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .multipart(body);
        self.send(url, request).await
    }

    /// `GET /api/v3/uploads/{id}`.
    pub async fn get_upload(&self, access_token: &str, tracking_id: u64) -> Result<ApiReply, ApiError> {
        let url = self.upload_url(tracking_id);
        let request = self.http.get(&url).bearer_auth(access_token);
        self.send(url, request).await
    }

    /// `GET /api/v3/athlete`.
    pub async fn get_athlete(&self, access_token: &str) -> Result<ApiReply, ApiError> {
        let url = self.athlete_url();
        let request = self.http.get(&url).bearer_auth(access_token);
        self.send(url, request).await
    }

    async fn send(
        &self,
        endpoint: String,
        request: reqwest::RequestBuilder,
    ) -> Result<ApiReply, ApiError> {
        let response = request
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| ApiError::transport(&endpoint, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::transport(&endpoint, format!("reading body: {e}")))?;
        debug!(%endpoint, status = status.as_u16(), "API response");

        Ok(ApiReply {
            endpoint,
            status,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{bearer_token, body_string_contains, header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, StravaClient) {
        let server = MockServer::start().await;
        let client = StravaClient::new().with_base_url(&server.uri());
        (server, client)
    }

    #[test]
    fn test_urls() {
        let client = StravaClient::new().with_base_url("http://localhost:9000/");
        assert_eq!(client.uploads_url(), "http://localhost:9000/api/v3/uploads");
        assert_eq!(client.upload_url(42), "http://localhost:9000/api/v3/uploads/42");
        assert_eq!(client.athlete_url(), "http://localhost:9000/api/v3/athlete");
    }

    #[test]
    fn test_ensure_success_keeps_body_for_diagnostics() {
        let reply = ApiReply {
            endpoint: "x".into(),
            status: StatusCode::BAD_GATEWAY,
            body: "upstream down".into(),
        };
        match reply.ensure_success().unwrap_err() {
            ApiError::Http { status, body, .. } => {
                assert_eq!(status, 502);
                assert_eq!(body, "upstream down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_post_upload_sends_multipart_fields() {
        let (server, client) = setup().await;
        Mock::given(method("POST"))
            .and(path("/api/v3/uploads"))
            .and(bearer_token("tok"))
            .and(header_regex("content-type", "^multipart/form-data"))
            .and(body_string_contains("name=\"activity_type\""))
            .and(body_string_contains("name=\"data_type\""))
            .and(body_string_contains("filename=\"morning.tcx\""))
            .and(body_string_contains("<TrainingCenterDatabase/>"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": 7, "error": null, "status": "Your activity is still being processed."
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client
            .post_upload(
                "tok",
                &UploadForm {
                    activity_type: "run",
                    name: "Running",
                    data_type: "tcx",
                    file_name: "morning.tcx",
                    payload: b"<TrainingCenterDatabase/>",
                },
            )
            .await
            .unwrap();
        assert_eq!(reply.status, StatusCode::CREATED);
        assert!(reply.body.contains("still being processed"));
    }

    #[tokio::test]
    async fn test_get_upload_returns_raw_reply() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/uploads/7"))
            .and(bearer_token("tok"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Rate Limit Exceeded"))
            .mount(&server)
            .await;

        let reply = client.get_upload("tok", 7).await.unwrap();
        assert!(reply.is_rate_limited());
        assert_eq!(reply.body, "Rate Limit Exceeded");
    }

    #[tokio::test]
    async fn test_send_reports_transport_failure() {
        let client = StravaClient::new().with_base_url("http://127.0.0.1:1");
        let err = client.get_athlete("tok").await.unwrap_err();
        assert!(matches!(err, ApiError::Transport { .. }));
    }
}
