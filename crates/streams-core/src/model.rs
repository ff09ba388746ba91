use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const MIME_PEERSHARE: &str = "application/x-peershare";
pub const MIME_DASH: &str = "application/dash+xml";

/// Opaque stream identifier as handed out by the server.
///
/// The collection endpoint may return ids as JSON strings or numbers; numbers
/// are kept as their decimal text so the id renders exactly as received.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(String);

impl StreamId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StreamId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Serialize for StreamId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for StreamId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => Self(s),
            RawId::Unsigned(n) => Self(n.to_string()),
            RawId::Signed(n) => Self(n.to_string()),
        })
    }
}

/// Headers returned by `HEAD /streams/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMetadata {
    pub id: StreamId,
    pub mime: Option<String>,
    pub length: Option<u64>,
}

impl StreamMetadata {
    pub fn kind(&self) -> StreamKind {
        StreamKind::from_mime(self.mime.as_deref())
    }
}

/// Indirection record stored under `application/x-peershare`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Stream the manifest points at.
    pub stream_id: StreamId,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// How a stream is linked, decided by its MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Manifest,
    Dash,
    Direct,
}

impl StreamKind {
    /// Classifies by MIME essence; parameters and ASCII case are ignored.
    pub fn from_mime(mime: Option<&str>) -> Self {
        let Some(mime) = mime else {
            return Self::Direct;
        };
        let essence = mime.split(';').next().unwrap_or_default().trim();
        if essence.eq_ignore_ascii_case(MIME_PEERSHARE) {
            Self::Manifest
        } else if essence.eq_ignore_ascii_case(MIME_DASH) {
            Self::Dash
        } else {
            Self::Direct
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manifest => write!(f, "manifest"),
            Self::Dash => write!(f, "dash"),
            Self::Direct => write!(f, "direct"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_decode_from_strings_and_numbers() {
        let ids: Vec<StreamId> = serde_json::from_str(r#"["a", 42, -7]"#).unwrap();
        assert_eq!(ids, vec![StreamId::from("a"), StreamId::from("42"), StreamId::from("-7")]);
    }

    #[test]
    fn ids_reject_other_json() {
        assert!(serde_json::from_str::<Vec<StreamId>>(r#"[{"id": "a"}]"#).is_err());
        assert!(serde_json::from_str::<Vec<StreamId>>(r#"{"a": 1}"#).is_err());
    }

    #[test]
    fn manifest_accepts_minimal_body() {
        let m: Manifest = serde_json::from_str(r#"{"streamId": "b"}"#).unwrap();
        assert_eq!(m.stream_id.as_str(), "b");
        assert!(m.metadata.is_empty());
        assert!(m.content.is_none());
    }

    #[test]
    fn manifest_carries_search_fields() {
        let m: Manifest = serde_json::from_str(
            r#"{"streamId": "b", "metadata": {"title": "Talk"}, "content": "transcript"}"#,
        )
        .unwrap();
        assert_eq!(m.metadata["title"], "Talk");
        assert_eq!(m.content.as_deref(), Some("transcript"));
    }

    #[test]
    fn kind_from_exact_mime() {
        assert_eq!(StreamKind::from_mime(Some(MIME_PEERSHARE)), StreamKind::Manifest);
        assert_eq!(StreamKind::from_mime(Some(MIME_DASH)), StreamKind::Dash);
        assert_eq!(StreamKind::from_mime(Some("video/mp4")), StreamKind::Direct);
    }

    #[test]
    fn kind_ignores_parameters_and_case() {
        assert_eq!(
            StreamKind::from_mime(Some("Application/DASH+XML; charset=utf-8")),
            StreamKind::Dash
        );
    }

    #[test]
    fn kind_defaults_to_direct_without_mime() {
        assert_eq!(StreamKind::from_mime(None), StreamKind::Direct);
        assert_eq!(StreamKind::from_mime(Some("")), StreamKind::Direct);
    }
}
