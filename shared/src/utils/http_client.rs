use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Service tidak tersedia: {0}")]
    ServiceUnavailable(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl HttpClientError {
    /// Error yang layak di-retry (network, timeout, 5xx)
    pub fn is_transient(&self) -> bool {
        matches!(self, HttpClientError::ServiceUnavailable(_))
    }
}

/// Client untuk komunikasi antar service internal
#[derive(Clone)]
pub struct ServiceClient {
    client: Client,
    base_url: String,
}

impl ServiceClient {
    // Buat client untuk service dengan base URL tertentu
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, HttpClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HttpClientError::RequestFailed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    // POST request yang tidak butuh body response (201/202/204)
    pub async fn post_ack<B: serde::Serialize>(
        &self,
        endpoint: &str,
        body: &B,
        token: Option<&str>,
    ) -> Result<(), HttpClientError> {
        let mut request = self.client.post(self.url(endpoint)).json(body);

        if let Some(t) = token {
            request = request.header("Authorization", format!("Bearer {}", t));
        }

        let response = request.send().await.map_err(map_send_error)?;
        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        Err(error_from_status(status, response).await)
    }
}

fn map_send_error(err: reqwest::Error) -> HttpClientError {
    if err.is_timeout() || err.is_connect() {
        HttpClientError::ServiceUnavailable(err.to_string())
    } else {
        HttpClientError::RequestFailed(err.to_string())
    }
}

async fn error_from_status(status: StatusCode, response: Response) -> HttpClientError {
    if status == StatusCode::UNAUTHORIZED {
        return HttpClientError::Unauthorized("Token invalid".to_string());
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    if status.is_server_error() {
        HttpClientError::ServiceUnavailable(format!("Status {}: {}", status, error_text))
    } else {
        HttpClientError::RequestFailed(format!("Status {}: {}", status, error_text))
    }
}
