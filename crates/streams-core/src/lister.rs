use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{FailurePolicy, ListerConfig};
use crate::model::StreamId;
use crate::resolve::{LinkBuilder, Resolution, ResolveError, Resolver};
use crate::source::{SourceError, StreamSource};

/// Failure of the collection request. No rows exist in this case.
#[derive(Debug, Error)]
pub enum ListError {
    #[error("Failed to fetch stream list: {0}")]
    Source(#[from] SourceError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowOutcome {
    Resolved(Resolution),
    Failed { reason: String },
}

/// One rendered table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamRow {
    pub id: StreamId,
    pub mime: Option<String>,
    pub length: Option<u64>,
    #[serde(flatten)]
    pub outcome: RowOutcome,
}

impl StreamRow {
    pub fn url(&self) -> Option<&str> {
        match &self.outcome {
            RowOutcome::Resolved(resolution) => Some(&resolution.url),
            RowOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, RowOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub generated_at: DateTime<Utc>,
    pub streams: Vec<StreamRow>,
}

impl Listing {
    pub fn failed_count(&self) -> usize {
        self.streams.iter().filter(|r| r.is_failed()).count()
    }
}

/// Runs the fetch-list, resolve-metadata stages of a listing.
///
/// Rows come back in the order of the collection endpoint regardless of
/// which requests finish first.
#[derive(Clone)]
pub struct Lister {
    source: Arc<dyn StreamSource>,
    resolver: Resolver,
    config: ListerConfig,
}

impl Lister {
    pub fn new(source: Arc<dyn StreamSource>, config: ListerConfig) -> Self {
        let resolver = Resolver::new(
            Arc::clone(&source),
            LinkBuilder::new(config.link_prefix.clone()),
            config.max_indirection_depth,
        );
        Self {
            source,
            resolver,
            config,
        }
    }

    pub async fn fetch_ids(&self) -> Result<Vec<StreamId>, ListError> {
        Ok(self.source.list().await?)
    }

    /// Fetches headers and resolves the link of a single stream.
    ///
    /// Never fails: errors become a [`RowOutcome::Failed`] row.
    pub async fn resolve_one(&self, id: StreamId) -> StreamRow {
        let metadata = match self.source.metadata(&id).await {
            Ok(metadata) => metadata,
            Err(e) => {
                return StreamRow {
                    id,
                    mime: None,
                    length: None,
                    outcome: RowOutcome::Failed {
                        reason: e.to_string(),
                    },
                };
            }
        };

        let outcome = match self
            .resolver
            .resolve_url(&id, metadata.mime.as_deref())
            .await
        {
            Ok(resolution) => RowOutcome::Resolved(resolution),
            Err(e) => RowOutcome::Failed {
                reason: e.to_string(),
            },
        };

        StreamRow {
            id,
            mime: metadata.mime,
            length: metadata.length,
            outcome,
        }
    }

    /// Like [`Lister::resolve_one`], but returns the failure instead of a
    /// failed row.
    pub async fn lookup(&self, id: StreamId) -> Result<StreamRow, ResolveError> {
        let metadata = self.source.metadata(&id).await?;
        let resolution = self
            .resolver
            .resolve_url(&id, metadata.mime.as_deref())
            .await?;
        Ok(StreamRow {
            id,
            mime: metadata.mime,
            length: metadata.length,
            outcome: RowOutcome::Resolved(resolution),
        })
    }

    pub async fn resolve_all(&self, ids: Vec<StreamId>) -> Vec<StreamRow> {
        let concurrency = self.config.max_concurrent_fetches.max(1);
        let rows: Vec<StreamRow> = stream::iter(ids)
            .map(|id| self.resolve_one(id))
            .buffered(concurrency)
            .collect()
            .await;

        match self.config.failure_policy {
            FailurePolicy::Mark => rows,
            FailurePolicy::Skip => rows
                .into_iter()
                .filter(|row| match &row.outcome {
                    RowOutcome::Failed { reason } => {
                        warn!(stream_id = %row.id, reason = %reason, "Skipping stream");
                        false
                    }
                    RowOutcome::Resolved(_) => true,
                })
                .collect(),
        }
    }

    pub async fn list(&self) -> Result<Listing, ListError> {
        let ids = self.fetch_ids().await?;
        debug!(count = ids.len(), "Resolving streams");
        let streams = self.resolve_all(ids).await;
        let listing = Listing {
            generated_at: Utc::now(),
            streams,
        };
        info!(
            rows = listing.streams.len(),
            failed = listing.failed_count(),
            "Stream listing complete"
        );
        Ok(listing)
    }
}
