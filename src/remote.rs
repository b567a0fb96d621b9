//! Remote graph API client
//!
//! [`RemoteApi`] is the seam the gateway talks through; [`HttpApi`] is the
//! reqwest implementation. Failures are classified here so the gateway can
//! decide between falling back to local state and surfacing the error.

use crate::model::{GraphPayload, ImportSummary, NewRelation, NewView, RelationUpdate, Stats, ViewUpdate};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// No response at all: refused connection, DNS, timeout
    #[error("network error: {0}")]
    Network(String),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The server answered 2xx with a body we could not read
    #[error("invalid response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// True when the backend is unreachable or broken, as opposed to
    /// rejecting the request. Mutations never read the response body, so a
    /// `Decode` can only come from a fetch. The one fetch with side effects
    /// is `import_sql`, and the gateway treats its `Decode` as committed.
    pub fn is_availability_failure(&self) -> bool {
        match self {
            RemoteError::Network(_) | RemoteError::Decode(_) => true,
            RemoteError::Status { status, .. } => *status >= 500,
        }
    }

    /// Message to show the user
    pub fn user_message(&self) -> String {
        match self {
            RemoteError::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::Decode(err.to_string())
        } else {
            match err.status() {
                Some(status) => RemoteError::Status {
                    status: status.as_u16(),
                    message: err.to_string(),
                },
                None => RemoteError::Network(err.to_string()),
            }
        }
    }
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// The backend contract. Mutations return nothing useful; callers re-read
/// `/graph-data` afterwards.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn graph_data(&self) -> RemoteResult<GraphPayload>;
    async fn stats(&self) -> RemoteResult<Stats>;
    async fn import_sql(&self, sql: &str) -> RemoteResult<ImportSummary>;
    async fn create_view(&self, view: &NewView) -> RemoteResult<()>;
    async fn update_view(&self, view_id: i64, update: &ViewUpdate) -> RemoteResult<()>;
    async fn delete_view(&self, view_id: i64) -> RemoteResult<()>;
    async fn create_relation(&self, relation: &NewRelation) -> RemoteResult<()>;
    async fn update_relation(&self, id: &str, update: &RelationUpdate) -> RemoteResult<()>;
    async fn delete_relation(&self, id: &str) -> RemoteResult<()>;
    async fn clear_all(&self) -> RemoteResult<()>;
}

/// HTTP client for the graph API
pub struct HttpApi {
    http: Client,
    api_root: String,
}

/// FastAPI-style error body
#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

impl HttpApi {
    /// `api_root` is the full prefix, e.g. "http://localhost:8001/api"
    pub fn new(api_root: impl Into<String>, timeout: Duration) -> RemoteResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_root: api_root.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.api_root, path);
        self.http.request(method, url).header("Accept", "application/json")
    }

    /// Send and turn non-2xx answers into `RemoteError::Status`
    async fn send(&self, request: RequestBuilder) -> RemoteResult<reqwest::Response> {
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }
        Ok(response)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> RemoteResult<T> {
        let response = self.send(request).await?;
        response.json().await.map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn execute(&self, request: RequestBuilder) -> RemoteResult<()> {
        self.send(request).await.map(|_| ())
    }
}

/// Prefer the server's `detail`, then the raw body, then the status text
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return match parsed.detail {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
    }
    let body = body.trim();
    if body.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        body.chars().take(200).collect()
    }
}

#[async_trait]
impl RemoteApi for HttpApi {
    async fn graph_data(&self) -> RemoteResult<GraphPayload> {
        self.fetch(self.request(Method::GET, "/graph-data")).await
    }

    async fn stats(&self) -> RemoteResult<Stats> {
        self.fetch(self.request(Method::GET, "/stats")).await
    }

    async fn import_sql(&self, sql: &str) -> RemoteResult<ImportSummary> {
        let body = serde_json::json!({ "sql": sql });
        self.fetch(self.request(Method::POST, "/import-sql").json(&body)).await
    }

    async fn create_view(&self, view: &NewView) -> RemoteResult<()> {
        self.execute(self.request(Method::POST, "/views").json(view)).await
    }

    async fn update_view(&self, view_id: i64, update: &ViewUpdate) -> RemoteResult<()> {
        let path = format!("/views/{}", view_id);
        self.execute(self.request(Method::PUT, &path).json(update)).await
    }

    async fn delete_view(&self, view_id: i64) -> RemoteResult<()> {
        let path = format!("/views/{}", view_id);
        self.execute(self.request(Method::DELETE, &path)).await
    }

    async fn create_relation(&self, relation: &NewRelation) -> RemoteResult<()> {
        self.execute(self.request(Method::POST, "/relations").json(relation)).await
    }

    async fn update_relation(&self, id: &str, update: &RelationUpdate) -> RemoteResult<()> {
        let path = format!("/relations/{}", id);
        self.execute(self.request(Method::PUT, &path).json(update)).await
    }

    async fn delete_relation(&self, id: &str) -> RemoteResult<()> {
        let path = format!("/relations/{}", id);
        self.execute(self.request(Method::DELETE, &path)).await
    }

    async fn clear_all(&self) -> RemoteResult<()> {
        self.execute(self.request(Method::DELETE, "/clear-all")).await
    }
}
