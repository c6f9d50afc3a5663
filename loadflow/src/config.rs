//! Configuration for the loading service.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::errors::{LoadflowError, Result};
use crate::stages::ArtifactKind;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadflowConfig {
    /// Artifact storage settings.
    #[serde(default)]
    pub artifacts: ArtifactConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LoadflowConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the artifact settings.
    #[must_use]
    pub fn with_artifacts(mut self, artifacts: ArtifactConfig) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Replaces the logging settings.
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| LoadflowError::Config(format!("invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| LoadflowError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        self.artifacts.validate()?;
        self.logging.validate()
    }
}

/// Artifact storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Bucket for stage photos.
    #[serde(default = "default_photo_bucket")]
    pub photo_bucket: String,
    /// Bucket for fiscal documents.
    #[serde(default = "default_document_bucket")]
    pub document_bucket: String,
    /// Public base URL objects are served from.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// First segment of every object key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Largest accepted artifact, in bytes.
    #[serde(default = "default_max_artifact_bytes")]
    pub max_artifact_bytes: usize,
    /// Timeout for remote store requests.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: f64,
}

fn default_photo_bucket() -> String {
    "fotos-carregamento".to_string()
}

fn default_document_bucket() -> String {
    "documentos-carregamento".to_string()
}

fn default_base_url() -> String {
    "memory://artifacts".to_string()
}

fn default_key_prefix() -> String {
    "carregamentos".to_string()
}

fn default_max_artifact_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_request_timeout() -> f64 {
    30.0
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            photo_bucket: default_photo_bucket(),
            document_bucket: default_document_bucket(),
            base_url: default_base_url(),
            key_prefix: default_key_prefix(),
            max_artifact_bytes: default_max_artifact_bytes(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl ArtifactConfig {
    /// Sets the photo bucket.
    #[must_use]
    pub fn with_photo_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.photo_bucket = bucket.into();
        self
    }

    /// Sets the document bucket.
    #[must_use]
    pub fn with_document_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.document_bucket = bucket.into();
        self
    }

    /// Sets the public base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the size limit.
    #[must_use]
    pub fn with_max_artifact_bytes(mut self, bytes: usize) -> Self {
        self.max_artifact_bytes = bytes;
        self
    }

    /// Bucket for an artifact kind.
    #[must_use]
    pub fn bucket_for(&self, kind: ArtifactKind) -> &str {
        match kind {
            ArtifactKind::Photo => &self.photo_bucket,
            ArtifactKind::Document => &self.document_bucket,
        }
    }

    /// Remote request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout_seconds)
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("photo_bucket", &self.photo_bucket),
            ("document_bucket", &self.document_bucket),
            ("base_url", &self.base_url),
            ("key_prefix", &self.key_prefix),
        ] {
            if value.trim().is_empty() {
                return Err(LoadflowError::Config(format!("artifacts.{name} must not be empty")));
            }
        }
        if self.photo_bucket == self.document_bucket {
            return Err(LoadflowError::Config(
                "artifacts.photo_bucket and artifacts.document_bucket must differ".to_string(),
            ));
        }
        if self.max_artifact_bytes == 0 {
            return Err(LoadflowError::Config("artifacts.max_artifact_bytes must be positive".to_string()));
        }
        if !self.request_timeout_seconds.is_finite() || self.request_timeout_seconds <= 0.0 {
            return Err(LoadflowError::Config(
                "artifacts.request_timeout_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` overrides it.
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Sets the filter directive.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Enables JSON output.
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.level.trim().is_empty() {
            return Err(LoadflowError::Config("logging.level must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = LoadflowConfig::default();
        assert_eq!(config.artifacts.photo_bucket, "fotos-carregamento");
        assert_eq!(config.artifacts.document_bucket, "documentos-carregamento");
        assert_eq!(config.artifacts.max_artifact_bytes, 20 * 1024 * 1024);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = LoadflowConfig::from_json_str(r#"{"artifacts":{"photo_bucket":"fotos"},"logging":{"json":true}}"#)
            .unwrap();
        assert_eq!(config.artifacts.photo_bucket, "fotos");
        assert_eq!(config.artifacts.key_prefix, "carregamentos");
        assert!(config.logging.json);
    }

    #[test]
    fn test_bucket_for_kind() {
        let artifacts = ArtifactConfig::default();
        assert_eq!(artifacts.bucket_for(ArtifactKind::Photo), "fotos-carregamento");
        assert_eq!(artifacts.bucket_for(ArtifactKind::Document), "documentos-carregamento");
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let err = LoadflowConfig::from_json_str(r#"{"artifacts":{"max_artifact_bytes":0}}"#).unwrap_err();
        assert_eq!(err.code(), "LOADING-CONFIG");

        let err = LoadflowConfig::from_json_str(r#"{"artifacts":{"document_bucket":"fotos-carregamento"}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("must differ"));

        assert!(LoadflowConfig::from_json_str("{not json").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"logging":{{"level":"loadflow=debug"}}}}"#).unwrap();

        let config = LoadflowConfig::from_file(file.path()).unwrap();
        assert_eq!(config.logging.level, "loadflow=debug");
        assert_eq!(config.artifacts, ArtifactConfig::default());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LoadflowConfig::from_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, LoadflowError::Config(_)));
    }
}
