//! TOML configuration file schema and parsing.
//!
//! Example config file:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8080"
//! log_format = "json"
//!
//! [lister]
//! server_url = "http://localhost:3000/"
//! request_timeout_ms = 10000
//! max_concurrent_fetches = 8
//! failure_policy = "skip"
//! ```

use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;

use streams_core::{FailurePolicy, ListerConfig};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub lister: ListerSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log_format: default_log_format(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_log_format() -> String {
    "pretty".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListerSection {
    #[serde(default = "default_server_url")]
    pub server_url: String,

    #[serde(default)]
    pub request_timeout_ms: Option<u64>,

    #[serde(default)]
    pub max_retries: Option<u32>,

    #[serde(default)]
    pub retry_backoff_ms: Option<u64>,

    #[serde(default)]
    pub max_concurrent_fetches: Option<usize>,

    #[serde(default)]
    pub max_indirection_depth: Option<usize>,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    #[serde(default)]
    pub link_prefix: Option<String>,
}

impl Default for ListerSection {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            request_timeout_ms: None,
            max_retries: None,
            retry_backoff_ms: None,
            max_concurrent_fetches: None,
            max_indirection_depth: None,
            failure_policy: FailurePolicy::default(),
            link_prefix: None,
        }
    }
}

fn default_server_url() -> String {
    "http://localhost:3000/".into()
}

impl ListerSection {
    pub fn to_lister_config(&self) -> ListerConfig {
        let mut c = ListerConfig::default().with_failure_policy(self.failure_policy);
        if let Some(v) = self.request_timeout_ms {
            c = c.with_request_timeout(v);
        }
        if let Some(v) = self.max_retries {
            c = c.with_max_retries(v);
        }
        if let Some(v) = self.retry_backoff_ms {
            c = c.with_retry_backoff(v);
        }
        if let Some(v) = self.max_concurrent_fetches {
            c = c.with_max_concurrent_fetches(v);
        }
        if let Some(v) = self.max_indirection_depth {
            c = c.with_max_indirection_depth(v);
        }
        if let Some(ref v) = self.link_prefix {
            c = c.with_link_prefix(v.as_str());
        }
        c
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        validate_server_url(&self.lister.server_url)?;

        if self.lister.max_concurrent_fetches == Some(0) {
            return Err("max_concurrent_fetches must be at least 1".into());
        }
        if self.lister.max_indirection_depth == Some(0) {
            return Err("max_indirection_depth must be at least 1".into());
        }

        match self.server.log_format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(format!(
                    "Invalid log_format '{}': must be 'pretty' or 'json'",
                    other
                ));
            }
        }

        Ok(())
    }
}

pub fn validate_server_url(server_url: &str) -> Result<(), String> {
    let parsed = url::Url::parse(server_url)
        .map_err(|e| format!("Invalid server URL: {} ({})", server_url, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(format!("Server URL must use http or https: {}", server_url));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        config.validate().unwrap();
        assert_eq!(config.server.listen.port(), 8080);
        assert_eq!(config.server.log_format, "pretty");
        assert_eq!(config.lister.server_url, "http://localhost:3000/");
        assert_eq!(config.lister.failure_policy, FailurePolicy::Mark);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[server]
listen = "127.0.0.1:9090"
log_format = "json"

[lister]
server_url = "https://share.example.com/"
request_timeout_ms = 2500
max_retries = 0
retry_backoff_ms = 50
max_concurrent_fetches = 3
max_indirection_depth = 2
failure_policy = "skip"
link_prefix = "https://share.example.com/"
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.server.listen.port(), 9090);
        assert_eq!(config.server.log_format, "json");

        let c = config.lister.to_lister_config();
        assert_eq!(c.request_timeout.as_millis(), 2500);
        assert_eq!(c.max_retries, 0);
        assert_eq!(c.retry_backoff.as_millis(), 50);
        assert_eq!(c.max_concurrent_fetches, 3);
        assert_eq!(c.max_indirection_depth, 2);
        assert_eq!(c.failure_policy, FailurePolicy::Skip);
        assert_eq!(c.link_prefix, "https://share.example.com");
    }

    #[test]
    fn validate_rejects_invalid_server_url() {
        let config: AppConfig = toml::from_str("[lister]\nserver_url = \"not-a-url\"").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("Invalid server URL"), "{}", err);

        let config: AppConfig =
            toml::from_str("[lister]\nserver_url = \"file:///tmp/streams\"").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("http or https"), "{}", err);
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let config: AppConfig = toml::from_str("[lister]\nmax_concurrent_fetches = 0").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("max_concurrent_fetches"), "{}", err);
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let config: AppConfig = toml::from_str("[server]\nlog_format = \"xml\"").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("Invalid log_format"), "{}", err);
    }

    #[test]
    fn parse_rejects_unknown_failure_policy() {
        assert!(toml::from_str::<AppConfig>("[lister]\nfailure_policy = \"abort\"").is_err());
    }
}
