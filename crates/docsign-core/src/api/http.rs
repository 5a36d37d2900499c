//! HTTP implementation of the persistence API

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use reqwest::Url;
use shared_types::Document;
use tracing::debug;

use super::{
    ApiError, ApproveRequest, AssignReviewerRequest, DocumentApi, DocumentUpdate, RejectRequest,
};
use crate::config::ClientConfig;

/// Persistence API client carrying a bearer credential on every call
#[derive(Debug, Clone)]
pub struct HttpDocumentApi {
    client: reqwest::Client,
    base_url: Url,
    token: String,
}

impl HttpDocumentApi {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ApiError::Transport(format!("invalid API base URL {:?}", base_url)))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            token: token.to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::new(
            &config.api_base_url,
            &config.token,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// `{base}/documents/{id}[/{action}]`, with `id` escaped as one segment
    fn url(&self, id: &str, action: Option<&str>) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Transport(format!("invalid API base URL {}", self.base_url)))?
            .pop_if_empty()
            .push("documents")
            .push(id)
            .extend(action);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "persistence API response");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status.as_u16(), &body))
    }

    async fn json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn post<B: Serialize + Sync>(
        &self,
        id: &str,
        action: &str,
        body: &B,
    ) -> Result<Document, ApiError> {
        let url = self.url(id, Some(action))?;
        self.json(self.client.post(url).json(body)).await
    }
}

#[async_trait]
impl DocumentApi for HttpDocumentApi {
    async fn get_document(&self, id: &str) -> Result<Document, ApiError> {
        let url = self.url(id, None)?;
        self.json(self.client.get(url)).await
    }

    async fn update_document(
        &self,
        id: &str,
        update: &DocumentUpdate,
    ) -> Result<Document, ApiError> {
        let url = self.url(id, None)?;
        self.json(self.client.put(url).json(update)).await
    }

    async fn approve(&self, id: &str, request: &ApproveRequest) -> Result<Document, ApiError> {
        self.post(id, "approve", request).await
    }

    async fn reject(&self, id: &str, request: &RejectRequest) -> Result<Document, ApiError> {
        self.post(id, "reject", request).await
    }

    async fn assign_reviewer(
        &self,
        id: &str,
        request: &AssignReviewerRequest,
    ) -> Result<Document, ApiError> {
        self.post(id, "assign-reviewer", request).await
    }

    async fn mark_viewed(&self, id: &str) -> Result<(), ApiError> {
        let url = self.url(id, Some("mark-viewed"))?;
        self.send(self.client.post(url)).await.map(|_| ())
    }
}
