use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use super::{SourceError, StreamSource};
use crate::config::ListerConfig;
use crate::model::{Manifest, StreamId, StreamMetadata};

/// reqwest-backed [`StreamSource`] with connection pooling, retries, and backoff.
#[derive(Debug, Clone)]
pub struct HttpSource {
    base: Url,
    client: Client,
    max_retries: u32,
    base_backoff: Duration,
}

impl HttpSource {
    pub fn new(
        base: &str,
        timeout: Duration,
        max_retries: u32,
        base_backoff: Duration,
    ) -> Result<Self, SourceError> {
        Self::with_client(base, Self::build_client(timeout), max_retries, base_backoff)
    }

    pub fn with_client(
        base: &str,
        client: Client,
        max_retries: u32,
        base_backoff: Duration,
    ) -> Result<Self, SourceError> {
        let base = parse_base(base)?;
        Ok(Self {
            base,
            client,
            max_retries,
            base_backoff,
        })
    }

    pub fn from_config(base: &str, config: &ListerConfig) -> Result<Self, SourceError> {
        Self::new(
            base,
            config.request_timeout,
            config.max_retries,
            config.retry_backoff,
        )
    }

    pub fn build_client(timeout: Duration) -> Client {
        Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .pool_max_idle_per_host(20)
            .gzip(true)
            .build()
            .expect("Failed to build HTTP client")
    }

    /// `{base}/streams` or `{base}/streams/{id}`, with the id encoded as one segment.
    pub fn endpoint(&self, id: Option<&StreamId>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("streams");
            if let Some(id) = id {
                segments.push(id.as_str());
            }
        }
        url
    }

    async fn fetch(&self, method: Method, url: &Url) -> Result<(HeaderMap, Vec<u8>), SourceError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            let is_last = attempt == self.max_retries;

            if attempt > 0 {
                let backoff = self.backoff(attempt);
                debug!(%url, attempt, backoff_ms = backoff.as_millis(), "Retrying stream request");
                tokio::time::sleep(backoff).await;
            }

            let response = match self.client.request(method.clone(), url.clone()).send().await {
                Ok(response) => response,
                Err(e) => {
                    last_error = Some(transport_error(url, &e, attempt, is_last));
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let message = status.canonical_reason().unwrap_or("Unknown").to_string();
                warn!(%url, status = status.as_u16(), attempt, "Stream request returned error status");
                let err = SourceError::Http {
                    url: url.to_string(),
                    status: status.as_u16(),
                    message,
                    is_last_retry: is_last,
                };
                if status.is_client_error() && status.as_u16() != 429 {
                    return Err(err);
                }
                last_error = Some(err);
                continue;
            }

            let headers = response.headers().clone();
            if method == Method::HEAD {
                return Ok((headers, Vec::new()));
            }
            match response.bytes().await {
                Ok(body) => return Ok((headers, body.to_vec())),
                Err(e) => last_error = Some(transport_error(url, &e, attempt, is_last)),
            }
        }

        Err(last_error.unwrap_or_else(|| SourceError::Network {
            url: url.to_string(),
            reason: "no request attempted".into(),
            is_last_retry: true,
        }))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_backoff * 2u32.saturating_pow(attempt - 1);
        let jitter_range = base.as_millis() as u64 / 4;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..=jitter_range)
        } else {
            0
        };
        base + Duration::from_millis(jitter)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, SourceError> {
        let (_, body) = self.fetch(Method::GET, url).await?;
        serde_json::from_slice(&body).map_err(|e| SourceError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl StreamSource for HttpSource {
    async fn list(&self) -> Result<Vec<StreamId>, SourceError> {
        let url = self.endpoint(None);
        let ids: Vec<StreamId> = self.get_json(&url).await?;
        debug!(%url, count = ids.len(), "Fetched stream list");
        Ok(ids)
    }

    async fn metadata(&self, id: &StreamId) -> Result<StreamMetadata, SourceError> {
        let url = self.endpoint(Some(id));
        let (headers, _) = self.fetch(Method::HEAD, &url).await?;
        Ok(StreamMetadata {
            id: id.clone(),
            mime: parse_mime(&headers),
            length: parse_length(&headers),
        })
    }

    async fn manifest(&self, id: &StreamId) -> Result<Manifest, SourceError> {
        let url = self.endpoint(Some(id));
        self.get_json(&url).await
    }
}

fn parse_base(base: &str) -> Result<Url, SourceError> {
    let url = Url::parse(base).map_err(|e| SourceError::InvalidBase {
        url: base.to_string(),
        reason: e.to_string(),
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(SourceError::InvalidBase {
            url: base.to_string(),
            reason: "scheme must be http or https".into(),
        });
    }
    Ok(url)
}

fn transport_error(url: &Url, e: &reqwest::Error, attempt: u32, is_last: bool) -> SourceError {
    if e.is_timeout() {
        warn!(%url, attempt, "Stream request timed out");
        SourceError::Timeout {
            url: url.to_string(),
            is_last_retry: is_last,
        }
    } else {
        warn!(%url, attempt, error = %e, "Stream request network error");
        SourceError::Network {
            url: url.to_string(),
            reason: e.to_string(),
            is_last_retry: is_last,
        }
    }
}

fn parse_mime(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer, retries: u32) -> HttpSource {
        HttpSource::new(
            &server.uri(),
            Duration::from_secs(5),
            retries,
            Duration::from_millis(10),
        )
        .unwrap()
    }

    #[test]
    fn endpoint_appends_streams_segment() {
        let s = HttpSource::new("http://localhost:3000", Duration::from_secs(1), 0, Duration::ZERO)
            .unwrap();
        assert_eq!(s.endpoint(None).as_str(), "http://localhost:3000/streams");
        assert_eq!(
            s.endpoint(Some(&StreamId::from("abc"))).as_str(),
            "http://localhost:3000/streams/abc"
        );
    }

    #[test]
    fn endpoint_keeps_base_path_and_encodes_id() {
        let s = HttpSource::new("http://host/share/", Duration::from_secs(1), 0, Duration::ZERO)
            .unwrap();
        assert_eq!(
            s.endpoint(Some(&StreamId::from("a/b c"))).as_str(),
            "http://host/share/streams/a%2Fb%20c"
        );
    }

    #[test]
    fn rejects_non_http_base() {
        let err = HttpSource::new("ftp://host/", Duration::from_secs(1), 0, Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidBase { .. }));
        assert!(HttpSource::new("not a url", Duration::from_secs(1), 0, Duration::ZERO).is_err());
    }

    #[test]
    fn headers_parse_mime_and_length() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("video/mp4"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("1000"));
        assert_eq!(parse_mime(&headers).as_deref(), Some("video/mp4"));
        assert_eq!(parse_length(&headers), Some(1000));
    }

    #[test]
    fn headers_missing_or_malformed_are_absent() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_mime(&headers), None);
        assert_eq!(parse_length(&headers), None);
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("lots"));
        assert_eq!(parse_length(&headers), None);
    }

    #[tokio::test]
    async fn list_decodes_id_array() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/streams"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"["a","b",3]"#))
            .mount(&server)
            .await;

        let ids = source(&server, 0).list().await.unwrap();
        assert_eq!(ids, vec!["a".into(), "b".into(), StreamId::from("3")]);
    }

    #[tokio::test]
    async fn list_rejects_non_array_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/streams"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        let err = source(&server, 3).list().await.unwrap_err();
        assert!(matches!(err, SourceError::Decode { .. }), "{err}");
    }

    #[tokio::test]
    async fn metadata_uses_head_request() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/streams/a"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8; 16], "video/mp4"))
            .expect(1)
            .mount(&server)
            .await;

        let meta = source(&server, 0).metadata(&"a".into()).await.unwrap();
        assert_eq!(meta.id.as_str(), "a");
        assert_eq!(meta.mime.as_deref(), Some("video/mp4"));
    }

    #[tokio::test]
    async fn manifest_decodes_stream_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/streams/m"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"streamId":"b","metadata":{},"content":""}"#,
                "application/x-peershare",
            ))
            .mount(&server)
            .await;

        let manifest = source(&server, 0).manifest(&"m".into()).await.unwrap();
        assert_eq!(manifest.stream_id.as_str(), "b");
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/streams/gone"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = source(&server, 3).metadata(&"gone".into()).await.unwrap_err();
        assert_eq!(err.status_code(), Some(404));
    }

    #[tokio::test]
    async fn retries_on_500_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/streams"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/streams"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"["x"]"#))
            .mount(&server)
            .await;

        let ids = source(&server, 3).list().await.unwrap();
        assert_eq!(ids, vec![StreamId::from("x")]);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/streams"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = source(&server, 2).list().await.unwrap_err();
        assert!(err.is_last_retry());
        assert_eq!(err.status_code(), Some(503));
    }
}
