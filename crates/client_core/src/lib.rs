use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Entity, EntityId},
    error::{ApiError, ErrorCode},
};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub mod csv_codec;
pub use csv_codec::{CsvCodec, CsvFileCodec, FormatError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("entity service request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("entity service rejected request with status {status}: {message}")]
    Status {
        status: u16,
        code: ErrorCode,
        message: String,
    },
    #[error("invalid entity service url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("entity service unavailable: {0}")]
    Unavailable(String),
}

impl ServiceError {
    /// Whether repeating the same request later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Transport(_) | ServiceError::Unavailable(_) => true,
            ServiceError::Status { status, .. } => *status >= 500 || *status == 429,
            ServiceError::InvalidUrl { .. } => false,
        }
    }
}

/// Remote collection of entities the admin page manages.
#[async_trait]
pub trait EntityService: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<Entity>, ServiceError>;
    async fn create(&self, entity: Entity) -> Result<Entity, ServiceError>;
    async fn update(&self, id: &EntityId, entity: Entity) -> Result<Entity, ServiceError>;
}

#[async_trait]
impl<T> EntityService for Arc<T>
where
    T: EntityService + ?Sized,
{
    async fn fetch_all(&self) -> Result<Vec<Entity>, ServiceError> {
        (**self).fetch_all().await
    }

    async fn create(&self, entity: Entity) -> Result<Entity, ServiceError> {
        (**self).create(entity).await
    }

    async fn update(&self, id: &EntityId, entity: Entity) -> Result<Entity, ServiceError> {
        (**self).update(id, entity).await
    }
}

pub struct MissingEntityService;

#[async_trait]
impl EntityService for MissingEntityService {
    async fn fetch_all(&self) -> Result<Vec<Entity>, ServiceError> {
        Err(ServiceError::Unavailable(
            "no entity service configured".to_string(),
        ))
    }

    async fn create(&self, entity: Entity) -> Result<Entity, ServiceError> {
        Err(ServiceError::Unavailable(format!(
            "cannot create '{}': no entity service configured",
            entity.display_label()
        )))
    }

    async fn update(&self, id: &EntityId, _entity: Entity) -> Result<Entity, ServiceError> {
        Err(ServiceError::Unavailable(format!(
            "cannot update entity {id}: no entity service configured"
        )))
    }
}

/// JSON-over-HTTP entity service rooted at `{service_url}/{resource}`.
pub struct HttpEntityService {
    http: Client,
    collection_url: Url,
}

impl HttpEntityService {
    pub fn new(service_url: &str, resource: &str) -> Result<Self, ServiceError> {
        Self::with_client(Client::new(), service_url, resource)
    }

    pub fn with_client(
        http: Client,
        service_url: &str,
        resource: &str,
    ) -> Result<Self, ServiceError> {
        let invalid = |reason: String| ServiceError::InvalidUrl {
            url: service_url.to_string(),
            reason,
        };

        let mut collection_url =
            Url::parse(service_url.trim()).map_err(|err| invalid(err.to_string()))?;
        if !matches!(collection_url.scheme(), "http" | "https") {
            return Err(invalid(format!(
                "unsupported scheme '{}'",
                collection_url.scheme()
            )));
        }
        {
            let mut segments = collection_url
                .path_segments_mut()
                .map_err(|()| invalid("url cannot be used as a base".to_string()))?;
            segments.pop_if_empty();
            for part in resource.split('/').filter(|part| !part.is_empty()) {
                segments.push(part);
            }
        }

        Ok(Self {
            http,
            collection_url,
        })
    }

    pub fn collection_url(&self) -> &Url {
        &self.collection_url
    }

    fn item_url(&self, id: &EntityId) -> Url {
        let mut url = self.collection_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(id.as_str());
        }
        url
    }
}

#[async_trait]
impl EntityService for HttpEntityService {
    async fn fetch_all(&self) -> Result<Vec<Entity>, ServiceError> {
        debug!(url = %self.collection_url, "fetching entity list");
        let response = self.http.get(self.collection_url.clone()).send().await?;
        decode_response(response).await
    }

    async fn create(&self, entity: Entity) -> Result<Entity, ServiceError> {
        debug!(url = %self.collection_url, entity = %entity.display_label(), "creating entity");
        let response = self
            .http
            .post(self.collection_url.clone())
            .json(&entity)
            .send()
            .await?;
        decode_response(response).await
    }

    async fn update(&self, id: &EntityId, entity: Entity) -> Result<Entity, ServiceError> {
        let url = self.item_url(id);
        debug!(url = %url, "updating entity");
        let response = self.http.put(url).json(&entity).send().await?;
        decode_response(response).await
    }
}

async fn decode_response<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let body = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ApiError>(&body) {
        Ok(api_error) => (api_error.code, api_error.message),
        Err(_) => {
            let message = if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                body.trim().to_string()
            };
            (ApiError::code_for_status(status.as_u16()), message)
        }
    };
    warn!(status = status.as_u16(), ?code, %message, "entity service returned an error");

    Err(ServiceError::Status {
        status: status.as_u16(),
        code,
        message,
    })
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
