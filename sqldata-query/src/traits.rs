//! Transport seam between the client and the network.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::QueryResult;

pub use futures::future::BoxFuture;

/// One JSON POST to the data service.
#[derive(Clone, PartialEq)]
pub struct PostRequest {
    /// Full URL, including any `$accessToken` query parameter.
    pub url: String,
    /// JSON request body.
    pub body: Value,
    /// Token sent as `Authorization: Bearer <token>`.
    pub bearer_token: Option<String>,
}

impl PostRequest {
    /// Create a request without a bearer token.
    pub fn new(url: impl Into<String>, body: Value) -> Self {
        Self {
            url: url.into(),
            body,
            bearer_token: None,
        }
    }

    /// Attach a bearer token.
    pub fn bearer(mut self, token: Option<String>) -> Self {
        self.bearer_token = token;
        self
    }
}

impl fmt::Debug for PostRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostRequest")
            .field("url", &self.url)
            .field("body", &self.body)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Sends JSON POST requests and returns the parsed JSON response.
///
/// Implementations map network failures, timeouts and non-success statuses
/// to transport errors carrying the response body when one was received.
pub trait Transport: Send + Sync {
    /// Send one request.
    fn post(&self, request: PostRequest) -> BoxFuture<'_, QueryResult<Value>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn post(&self, request: PostRequest) -> BoxFuture<'_, QueryResult<Value>> {
        (**self).post(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn post(&self, request: PostRequest) -> BoxFuture<'_, QueryResult<Value>> {
        (**self).post(request)
    }
}
