// External collaborators. Each one sits behind a trait so handlers and the
// ingestion pipeline only ever see `Arc<dyn Trait>` from `AppState`.

pub mod background;
pub mod blob;
pub mod geocode;
pub mod places;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned status {status}: {message}")]
    Status {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Unexpected response from {service}: {detail}")]
    InvalidResponse {
        service: &'static str,
        detail: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl ServiceError {
    pub(crate) fn invalid(service: &'static str, detail: impl Into<String>) -> Self {
        ServiceError::InvalidResponse {
            service,
            detail: detail.into(),
        }
    }
}

/// Turns a non-success response into `ServiceError::Status`, keeping a bounded
/// slice of the body for the log line.
pub(crate) async fn check_status(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message: String = body.chars().take(300).collect();
    Err(ServiceError::Status {
        service,
        status: status.as_u16(),
        message,
    })
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, ServiceError> {
    Ok(reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}
