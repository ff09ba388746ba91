use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What to do with a stream whose metadata or link could not be resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep the row and render the failure in place of the link.
    #[default]
    Mark,
    /// Drop the row and log a warning.
    Skip,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mark => write!(f, "mark"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mark" => Ok(Self::Mark),
            "skip" => Ok(Self::Skip),
            other => Err(format!(
                "Invalid failure_policy '{}': must be 'mark' or 'skip'",
                other
            )),
        }
    }
}

/// Configuration for a stream listing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListerConfig {
    /// HTTP request timeout for every request to the stream server.
    pub request_timeout: Duration,
    /// Maximum number of retries for failed requests.
    pub max_retries: u32,
    /// Base backoff duration for retries (doubled each attempt).
    pub retry_backoff: Duration,
    /// Upper bound on streams resolved at the same time.
    pub max_concurrent_fetches: usize,
    /// Manifests followed before giving up on a stream.
    pub max_indirection_depth: usize,
    pub failure_policy: FailurePolicy,
    /// Prepended to every rendered link. Empty keeps links root-relative.
    pub link_prefix: String,
}

impl Default for ListerConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_retries: 2,
            retry_backoff: Duration::from_millis(100),
            max_concurrent_fetches: 8,
            max_indirection_depth: 8,
            failure_policy: FailurePolicy::Mark,
            link_prefix: String::new(),
        }
    }
}

impl ListerConfig {
    pub fn with_request_timeout(mut self, ms: u64) -> Self {
        self.request_timeout = Duration::from_millis(ms);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_backoff(mut self, ms: u64) -> Self {
        self.retry_backoff = Duration::from_millis(ms);
        self
    }

    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max.max(1);
        self
    }

    pub fn with_max_indirection_depth(mut self, depth: usize) -> Self {
        self.max_indirection_depth = depth.max(1);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_link_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.link_prefix = prefix.into().trim_end_matches('/').to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ListerConfig::default();
        assert_eq!(c.request_timeout.as_secs(), 10);
        assert_eq!(c.max_concurrent_fetches, 8);
        assert_eq!(c.failure_policy, FailurePolicy::Mark);
        assert!(c.link_prefix.is_empty());
    }

    #[test]
    fn builders_clamp_to_one() {
        let c = ListerConfig::default()
            .with_max_concurrent_fetches(0)
            .with_max_indirection_depth(0);
        assert_eq!(c.max_concurrent_fetches, 1);
        assert_eq!(c.max_indirection_depth, 1);
    }

    #[test]
    fn link_prefix_drops_trailing_slash() {
        let c = ListerConfig::default().with_link_prefix("https://share.example.com/");
        assert_eq!(c.link_prefix, "https://share.example.com");
    }

    #[test]
    fn failure_policy_parses() {
        assert_eq!("skip".parse::<FailurePolicy>().unwrap(), FailurePolicy::Skip);
        assert_eq!("mark".parse::<FailurePolicy>().unwrap(), FailurePolicy::Mark);
        let err = "abort".parse::<FailurePolicy>().unwrap_err();
        assert!(err.contains("Invalid failure_policy"), "{}", err);
    }
}
