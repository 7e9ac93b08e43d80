//! Connection and display settings for a replica.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::DateStyle;

pub const ENV_ENDPOINT: &str = "CASE_REPLICA_ENDPOINT";
pub const ENV_APP_ID: &str = "CASE_REPLICA_APP_ID";
pub const ENV_TOKEN: &str = "CASE_REPLICA_TOKEN";

/// Errors returned while loading config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    ReadFailed(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings handed to the store adapter when it is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicaConfig {
    /// `host:port`, or a full `http(s)://` URI.
    pub endpoint: String,
    /// Namespaces the shared collection.
    pub app_id: String,
    /// Sent as a bearer token when set.
    pub auth_token: Option<String>,
    pub connect_timeout_ms: u64,
    /// Applies to creates and deletes, not to the subscription.
    pub request_timeout_ms: u64,
    pub date_style: DateStyle,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            endpoint: "127.0.0.1:50051".to_string(),
            app_id: "drshams-elite-cloud".to_string(),
            auth_token: None,
            connect_timeout_ms: 5_000,
            request_timeout_ms: 10_000,
            date_style: DateStyle::default(),
        }
    }
}

impl ReplicaConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Overrides fields from the process environment.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_lookup(|key| std::env::var(key).ok())
    }

    /// Overrides fields from `lookup`, keyed by the `CASE_REPLICA_*` names.
    pub fn with_lookup(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            self.endpoint = endpoint;
        }
        if let Some(app_id) = lookup(ENV_APP_ID) {
            self.app_id = app_id;
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|t| !t.is_empty()) {
            self.auth_token = Some(token);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint must not be empty".to_string()));
        }
        if self.app_id.is_empty() || self.app_id.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "app_id {:?} must be non-empty and contain no '/'",
                self.app_id
            )));
        }
        if !self.date_style.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "date pattern {:?} is not a valid strftime pattern",
                self.date_style.pattern
            )));
        }
        Ok(())
    }

    pub fn endpoint_uri(&self) -> String {
        if self.endpoint.contains("://") {
            self.endpoint.clone()
        } else {
            format!("http://{}", self.endpoint)
        }
    }

    pub fn collection_path(&self) -> String {
        format!("artifacts/{}/public/data/patients", self.app_id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = ReplicaConfig::from_json_str(r#"{ "app_id": "clinic" }"#).unwrap();
        assert_eq!(config.app_id, "clinic");
        assert_eq!(config.endpoint, "127.0.0.1:50051");
        assert_eq!(config.date_style, DateStyle::default());
    }

    #[test]
    fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replica.json");
        std::fs::write(
            &path,
            r#"{ "endpoint": "https://cases.example:443", "auth_token": "t0k",
                 "date_style": { "pattern": "%Y", "eastern_arabic_digits": false } }"#,
        )
        .unwrap();

        let config = ReplicaConfig::from_path(&path).unwrap();

        assert_eq!(config.endpoint_uri(), "https://cases.example:443");
        assert_eq!(config.auth_token.as_deref(), Some("t0k"));
        assert!(!config.date_style.eastern_arabic_digits);
    }

    #[test]
    fn lookup_overrides_fields() {
        let env: HashMap<&str, &str> = [(ENV_ENDPOINT, "10.0.0.2:7000"), (ENV_TOKEN, "secret")]
            .into_iter()
            .collect();

        let config = ReplicaConfig::default()
            .with_lookup(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.endpoint_uri(), "http://10.0.0.2:7000");
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.collection_path(), "artifacts/drshams-elite-cloud/public/data/patients");
    }

    #[test]
    fn rejects_bad_app_id() {
        let err = ReplicaConfig::from_json_str(r#"{ "app_id": "a/b" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_bad_date_pattern() {
        let err =
            ReplicaConfig::from_json_str(r#"{ "date_style": { "pattern": "%Q" } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = ReplicaConfig::from_json_str("{").unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed(_)));
    }
}
