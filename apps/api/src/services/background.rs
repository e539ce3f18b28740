//! Background removal (remove.bg compatible API).
//!
//! Best effort only: callers get `None` back when every mode failed and
//! keep using the original photo.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{multipart, Client};
use tracing::{debug, warn};

use crate::services::{check_status, http_client, ServiceError};

const REMOVE_BG_BASE_URL: &str = "https://api.remove.bg";
const SERVICE: &str = "background-removal";

/// Request variants tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalMode {
    Primary,
    Secondary,
}

impl RemovalMode {
    pub const ORDER: [RemovalMode; 2] = [RemovalMode::Primary, RemovalMode::Secondary];

    pub fn size(self) -> &'static str {
        match self {
            RemovalMode::Primary => "auto",
            RemovalMode::Secondary => "preview",
        }
    }

    /// Foreground-type hint. Plated food is closest to "product".
    pub fn foreground_type(self) -> &'static str {
        match self {
            RemovalMode::Primary => "product",
            RemovalMode::Secondary => "auto",
        }
    }
}

#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    /// Returns PNG bytes with the background removed.
    async fn remove(&self, image: &Bytes, mode: RemovalMode) -> Result<Bytes, ServiceError>;
}

/// Tries each mode once, in order. `None` means use the original.
pub async fn remove_background(remover: &dyn BackgroundRemover, image: &Bytes) -> Option<Bytes> {
    for mode in RemovalMode::ORDER {
        match remover.remove(image, mode).await {
            Ok(processed) => {
                debug!(
                    "Background removed ({:?}): {} -> {} bytes",
                    mode,
                    image.len(),
                    processed.len()
                );
                return Some(processed);
            }
            Err(e) => warn!("Background removal failed ({:?}): {e}", mode),
        }
    }
    None
}

#[derive(Clone)]
pub struct RemoveBgClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl RemoveBgClient {
    pub fn new(api_key: String, timeout_secs: u64) -> Result<Self, ServiceError> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            api_key,
            base_url: REMOVE_BG_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl BackgroundRemover for RemoveBgClient {
    async fn remove(&self, image: &Bytes, mode: RemovalMode) -> Result<Bytes, ServiceError> {
        let form = multipart::Form::new()
            .part(
                "image_file",
                multipart::Part::bytes(image.to_vec()).file_name("photo"),
            )
            .text("size", mode.size())
            .text("type", mode.foreground_type())
            .text("format", "png");

        let response = self
            .client
            .post(format!("{}/v1.0/removebg", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .multipart(form)
            .send()
            .await?;
        let response = check_status(SERVICE, response).await?;

        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(ServiceError::invalid(SERVICE, "empty image body"));
        }
        Ok(body)
    }
}
