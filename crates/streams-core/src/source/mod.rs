mod http;

pub use http::HttpSource;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Manifest, StreamId, StreamMetadata};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Invalid server URL {url}: {reason}")]
    InvalidBase { url: String, reason: String },
    #[error("HTTP error {status} fetching {url}: {message}")]
    Http {
        url: String,
        status: u16,
        message: String,
        is_last_retry: bool,
    },
    #[error("Network error fetching {url}: {reason}")]
    Network {
        url: String,
        reason: String,
        is_last_retry: bool,
    },
    #[error("Timeout fetching {url}")]
    Timeout { url: String, is_last_retry: bool },
    #[error("Decode error for {url}: {message}")]
    Decode { url: String, message: String },
}

impl SourceError {
    pub fn is_last_retry(&self) -> bool {
        match self {
            Self::Http { is_last_retry, .. } => *is_last_retry,
            Self::Network { is_last_retry, .. } => *is_last_retry,
            Self::Timeout { is_last_retry, .. } => *is_last_retry,
            Self::InvalidBase { .. } | Self::Decode { .. } => true,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Read access to a peershare stream server.
///
/// `metadata` must only look at response headers; `manifest` is called for
/// streams classified as manifests and decodes their body.
#[async_trait]
pub trait StreamSource: Send + Sync {
    async fn list(&self) -> Result<Vec<StreamId>, SourceError>;

    async fn metadata(&self, id: &StreamId) -> Result<StreamMetadata, SourceError>;

    async fn manifest(&self, id: &StreamId) -> Result<Manifest, SourceError>;
}
