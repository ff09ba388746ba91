use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use url::form_urlencoded;

use crate::model::{StreamId, StreamKind};
use crate::source::{SourceError, StreamSource};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("Manifest cycle: {}", format_chain(.chain))]
    Cycle { chain: Vec<StreamId> },
    #[error("Manifest indirection deeper than {limit} starting at {id}")]
    DepthExceeded { id: StreamId, limit: usize },
}

fn format_chain(chain: &[StreamId]) -> String {
    chain
        .iter()
        .map(StreamId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Builds the links shown in the rendered table.
#[derive(Debug, Clone, Default)]
pub struct LinkBuilder {
    prefix: String,
}

impl LinkBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn stream(&self, id: &StreamId) -> String {
        let segment: String = form_urlencoded::byte_serialize(id.as_str().as_bytes()).collect();
        format!("{}/streams/{}", self.prefix, segment.replace('+', "%20"))
    }

    pub fn player(&self, id: &StreamId) -> String {
        let query: String = form_urlencoded::byte_serialize(id.as_str().as_bytes()).collect();
        format!("{}/player?stream={}", self.prefix, query)
    }
}

/// Outcome of resolving one stream to its display link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub url: String,
    /// Kind of the stream the link points at.
    pub kind: StreamKind,
    /// Stream the link points at after following manifests.
    pub target: StreamId,
    /// Manifests followed to get there, in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub via: Vec<StreamId>,
}

#[derive(Clone)]
pub struct Resolver {
    source: Arc<dyn StreamSource>,
    links: LinkBuilder,
    max_depth: usize,
}

impl Resolver {
    pub fn new(source: Arc<dyn StreamSource>, links: LinkBuilder, max_depth: usize) -> Self {
        Self {
            source,
            links,
            max_depth: max_depth.max(1),
        }
    }

    /// Resolves the display link of `id` given its MIME type.
    ///
    /// Only manifests cause I/O: the manifest body is decoded, the referenced
    /// stream's headers are fetched, and resolution continues from there.
    /// Revisiting a manifest fails with [`ResolveError::Cycle`].
    pub async fn resolve_url(
        &self,
        id: &StreamId,
        mime: Option<&str>,
    ) -> Result<Resolution, ResolveError> {
        let mut current = id.clone();
        let mut mime = mime.map(str::to_string);
        let mut via: Vec<StreamId> = Vec::new();

        loop {
            let kind = StreamKind::from_mime(mime.as_deref());
            let url = match kind {
                StreamKind::Dash => self.links.player(&current),
                StreamKind::Direct => self.links.stream(&current),
                StreamKind::Manifest => {
                    if via.contains(&current) {
                        via.push(current);
                        return Err(ResolveError::Cycle { chain: via });
                    }
                    if via.len() >= self.max_depth {
                        return Err(ResolveError::DepthExceeded {
                            id: id.clone(),
                            limit: self.max_depth,
                        });
                    }

                    let manifest = self.source.manifest(&current).await?;
                    debug!(stream_id = %current, target = %manifest.stream_id, "Following manifest");
                    let metadata = self.source.metadata(&manifest.stream_id).await?;
                    via.push(current);
                    current = manifest.stream_id;
                    mime = metadata.mime;
                    continue;
                }
            };

            return Ok(Resolution {
                url,
                kind,
                target: current,
                via,
            });
        }
    }
}
