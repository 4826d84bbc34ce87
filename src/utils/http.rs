//! HTTP client utilities.
//!
//! Every adapter goes through [`HttpClient`], which applies the configured
//! timeouts and maps transport errors and upstream statuses onto
//! [`SourceError`] in one place.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::config::HttpConfig;
use crate::sources::SourceError;

/// Longest upstream error body echoed back in an error detail
const MAX_ERROR_BODY: usize = 300;

/// Shared HTTP client configured from [`HttpConfig`]
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a new HTTP client with the configured timeouts and user agent
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Send a request and check its status
    ///
    /// Transport errors and non-success statuses become
    /// [`SourceError::Unavailable`]; 401 and 403 become
    /// [`SourceError::Authentication`].
    pub async fn send(&self, adapter: &str, request: RequestBuilder) -> Result<Response, SourceError> {
        let response = request.send().await.map_err(|e| {
            let detail = if e.is_timeout() {
                format!("request timed out: {}", e)
            } else {
                e.to_string()
            };
            SourceError::unavailable(adapter, None, detail)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(adapter, status, &body))
    }

    /// GET a URL and return the body as text
    pub async fn get_text(
        &self,
        adapter: &str,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<String, SourceError> {
        let response = self
            .send(adapter, self.client.get(url).query(params))
            .await?;
        read_text(adapter, response).await
    }

    /// GET a URL and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        adapter: &str,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(params);
        let response = self.send(adapter, request).await?;
        decode_json(adapter, &read_text(adapter, response).await?)
    }

    /// POST a JSON body with a bearer token and decode the JSON response
    pub async fn post_json<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        adapter: &str,
        url: &str,
        bearer: &str,
        body: &B,
    ) -> Result<T, SourceError> {
        let request = self.client.post(url).bearer_auth(bearer).json(body);
        let response = self.send(adapter, request).await?;
        decode_json(adapter, &read_text(adapter, response).await?)
    }
}

/// Map a non-success status onto the matching error kind
pub fn status_error(adapter: &str, status: StatusCode, body: &str) -> SourceError {
    let reason = status.canonical_reason().unwrap_or("unexpected status");
    let body = body.trim();
    let detail = if body.is_empty() {
        reason.to_string()
    } else {
        format!("{}: {}", reason, truncate(body, MAX_ERROR_BODY))
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SourceError::authentication(adapter, detail)
        }
        _ => SourceError::unavailable(adapter, Some(status.as_u16()), detail),
    }
}

async fn read_text(adapter: &str, response: Response) -> Result<String, SourceError> {
    response
        .text()
        .await
        .map_err(|e| SourceError::unavailable(adapter, None, format!("failed to read response: {}", e)))
}

fn decode_json<T: DeserializeOwned>(adapter: &str, body: &str) -> Result<T, SourceError> {
    serde_json::from_str(body).map_err(|e| SourceError::malformed(adapter, format!("JSON: {}", e)))
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
