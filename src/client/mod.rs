//! Typed HTTP client for the `/api/v1` surface.
//!
//! Besides plain request helpers this module carries the stateful client behaviour the
//! storefront and back office rely on: delivery tracking by polling, sequential bulk
//! order updates, and optimistic local edits that are undone when the server refuses them.

use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::api::envelope::ApiResponse;

pub mod admin;
pub mod cart;
pub mod optimistic;
pub mod tracking;

pub use admin::{AdminClient, BulkFailure, BulkSummary, RiderBoard, Severity};
pub use cart::CartStore;
pub use tracking::{Notification, StopReason, TrackingHandle, TrackingPoller, TrackingSession, TrackingUpdate};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("please sign in again")]
    Unauthorized,
    #[error("you do not have access to this")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("request failed ({status}): {message}")]
    Status { status: u16, message: String },
    #[error("server sent no data")]
    EmptyResponse,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// `base_url` points at the API root, e.g. `http://localhost:8083/api/v1`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.into().trim_end_matches('/').to_string(), token: None }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(Method::GET, path, None::<&()>).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ClientError> {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ClientError> {
        self.send(Method::PATCH, path, Some(body)).await
    }

    async fn send<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method.clone(), &url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status();
        tracing::debug!(%method, %url, %status, "api call");

        match status {
            StatusCode::UNAUTHORIZED => return Err(ClientError::Unauthorized),
            StatusCode::FORBIDDEN => return Err(ClientError::Forbidden),
            StatusCode::NOT_FOUND => return Err(ClientError::NotFound),
            _ => {}
        }
        if !status.is_success() {
            let message = response
                .json::<ApiResponse<serde_json::Value>>()
                .await
                .ok()
                .and_then(|envelope| envelope.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unexpected response").to_string());
            return Err(ClientError::Status { status: status.as_u16(), message });
        }
        response.json::<ApiResponse<T>>().await?.data.ok_or(ClientError::EmptyResponse)
    }
}
