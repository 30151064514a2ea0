//! reqwest-backed [`Transport`].

use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use sqldata_query::{BoxFuture, ClientConfig, PostRequest, QueryResult, Transport};
use std::time::Duration;
use tracing::debug;

use crate::error::{HttpError, HttpResult};

/// JSON-over-HTTP transport.
///
/// Every request carries `Content-Type: application/json`, and the bearer
/// token when one is given. The configured timeout applies per request.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Build a transport with the timeout from `config`.
    pub fn new(config: &ClientConfig) -> HttpResult<Self> {
        Self::with_timeout(config.timeout)
    }

    /// Build a transport with an explicit timeout.
    pub fn with_timeout(timeout: Duration) -> HttpResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HttpError::config(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    /// Wrap an existing reqwest client.
    pub fn from_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn classify(&self, err: reqwest::Error) -> HttpError {
        if err.is_timeout() {
            HttpError::Timeout(self.timeout.as_millis() as u64)
        } else if err.is_connect() {
            HttpError::connection(err.to_string())
        } else {
            HttpError::Request(err)
        }
    }

    /// Send one request and parse the JSON response.
    pub async fn send(&self, request: PostRequest) -> HttpResult<Value> {
        let mut builder = self
            .client
            .post(&request.url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(serde_json::to_vec(&request.body)?);

        if let Some(token) = request.bearer_token.as_deref() {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = %status, "Request rejected");
            return Err(HttpError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await.map_err(|e| self.classify(e))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

impl Transport for HttpTransport {
    fn post(&self, request: PostRequest) -> BoxFuture<'_, QueryResult<Value>> {
        Box::pin(async move { self.send(request).await.map_err(Into::into) })
    }
}
