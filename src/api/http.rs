//! HTTP client for the whiteboard procedures.
//!
//! ERROR HANDLING
//! ==============
//! Non-2xx responses become [`ApiError::Status`] carrying the server's
//! `error` message when the body has one, so notifications can show it.

use reqwest::{Client, Response, Url};

use super::{ApiError, WhiteboardApi};
use crate::model::{ContentInput, CreateWhiteboardBody, ErrorBody, UpdateWhiteboardBody, WhiteboardRecord};

#[derive(Clone)]
pub struct HttpWhiteboardClient {
    client: Client,
    base_url: Url,
}

impl HttpWhiteboardClient {
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidBaseUrl`] if `base_url` is not an http(s)-style URL.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_client(Client::new(), base_url)
    }

    /// # Errors
    ///
    /// See [`HttpWhiteboardClient::new`].
    pub fn with_client(client: Client, base_url: &str) -> Result<Self, ApiError> {
        let invalid = || ApiError::InvalidBaseUrl(base_url.to_owned());
        let parsed = Url::parse(base_url).map_err(|_| invalid())?;
        if parsed.cannot_be_a_base() {
            return Err(invalid());
        }
        Ok(Self { client, base_url: parsed })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL with `segments` appended, each one percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn whiteboard_url(&self, id: &str) -> Result<Url, ApiError> {
        self.endpoint(&["api", "whiteboard", id])
    }

    /// `GET /healthz`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unreachable or unhealthy.
    pub async fn health(&self) -> Result<(), ApiError> {
        let response = self.client.get(self.endpoint(&["healthz"])?).send().await?;
        check_status(response).await.map(drop)
    }
}

#[async_trait::async_trait]
impl WhiteboardApi for HttpWhiteboardClient {
    async fn get_by_id(&self, id: &str) -> Result<Option<WhiteboardRecord>, ApiError> {
        let response = self.client.get(self.whiteboard_url(id)?).send().await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn create(&self, id: &str, content: ContentInput) -> Result<WhiteboardRecord, ApiError> {
        let body = CreateWhiteboardBody { id: id.to_owned(), content };
        let response = self
            .client
            .post(self.endpoint(&["api", "whiteboard"])?)
            .json(&body)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn update(&self, id: &str, content: ContentInput) -> Result<WhiteboardRecord, ApiError> {
        let body = UpdateWhiteboardBody { content };
        let response = self.client.put(self.whiteboard_url(id)?).json(&body).send().await?;
        Ok(check_status(response).await?.json().await?)
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.canonical_reason().unwrap_or("request failed").to_owned(),
    };
    Err(ApiError::Status { status: status.as_u16(), message })
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
