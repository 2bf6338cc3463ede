//! Client for the Handoff API.
//!
//! [`ApiClient`] wraps every request in a small retry policy: network errors
//! and 5xx responses are retried with escalating delays, any other non-2xx
//! response becomes an [`ApiError`]. Sessions created through
//! [`SessionBuilder`] deliver their lifecycle events over a WebSocket and fall
//! back to polling when the socket cannot be kept up.

pub mod api;
pub mod delivery;
pub mod error;
pub mod session;

use std::time::Duration;

use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

pub use api::{Download, SessionRecord};
pub use delivery::{Completion, DeliverySettings, EventListener, EventTransport, ResultSource};
pub use error::{ApiError, ApiErrorKind, ClientError};
pub use session::{SessionBuilder, SessionHandle};

/// API version prefix served by the Handoff server.
pub const API_PREFIX: &str = "/api/v1";

const API_KEY_HEADER: &str = "X-API-Key";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_millis(500),
    Duration::from_secs(1),
    Duration::from_secs(2),
];

/// HTTP client for the Handoff API, authenticated with an API key.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: String,
    retry_delays: Vec<Duration>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            retry_delays: RETRY_DELAYS.to_vec(),
        })
    }

    /// Create client from environment: HANDOFF_URL (default http://localhost:8080), HANDOFF_API_KEY.
    pub fn from_env() -> Result<Self, ClientError> {
        let base_url =
            std::env::var("HANDOFF_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
        let api_key = std::env::var("HANDOFF_API_KEY").map_err(|_| {
            ClientError::InvalidRequest("missing API key; set HANDOFF_API_KEY".to_string())
        })?;
        Self::new(base_url, api_key)
    }

    /// Replaces the delays between retries; the number of delays is the retry budget.
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Starts building a new session.
    pub fn new_session(&self) -> SessionBuilder {
        SessionBuilder::new(self.clone())
    }

    /// Real-time endpoint for a session, with the API key in the query.
    pub fn ws_url(&self, session_id: Uuid) -> Result<String, ClientError> {
        let base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.base_url.clone()
        };
        let mut url = reqwest::Url::parse(&format!(
            "{}{}/sessions/{}/ws",
            base, API_PREFIX, session_id
        ))
        .map_err(|e| ClientError::InvalidRequest(format!("invalid base URL: {}", e)))?;
        url.query_pairs_mut().append_pair("api_key", &self.api_key);
        Ok(url.to_string())
    }

    /// Sends one request under the retry policy and returns the 2xx response.
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ClientError> {
        let url = self.build_url(path);
        let retries = self.retry_delays.len();
        let mut last_error = None;

        for attempt in 0..=retries {
            if attempt > 0 {
                let delay = self.retry_delays[attempt - 1];
                tracing::debug!(url = %url, attempt, delay = ?delay, "client: retrying request");
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .request(method.clone(), &url)
                .header(API_KEY_HEADER, self.api_key.as_str());
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                    tracing::warn!(url = %url, attempt, error = %e, "client: network error");
                    last_error = Some(ClientError::from(e));
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();
            if status.is_server_error() && attempt < retries {
                tracing::warn!(url = %url, attempt, status = status.as_u16(), "client: server error");
                last_error = Some(ClientError::Transport(format!("server error {}", status)));
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ApiError::from_body(status.as_u16(), &body).into());
            }

            return Ok(response);
        }

        Err(last_error
            .unwrap_or_else(|| ClientError::Transport("request failed after retries".to_string())))
    }

    /// GET request. Deserializes JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.send::<()>(Method::GET, path, None).await?;
        Ok(response.json().await?)
    }

    /// POST JSON body and deserialize response.
    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self.send(Method::POST, path, Some(body)).await?;
        Ok(response.json().await?)
    }

    /// DELETE request. Returns Ok(()) on success.
    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.send::<()>(Method::DELETE, path, None).await?;
        Ok(())
    }

    /// GET request returning the raw response, for non-JSON bodies.
    pub(crate) async fn get_raw(&self, path: &str) -> Result<Response, ClientError> {
        self.send::<()>(Method::GET, path, None).await
    }
}
