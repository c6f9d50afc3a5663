//! Artifact bytes and the keys they are stored under.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use md5::{Digest as _, Md5};
use sha2::Sha256;
use std::fmt;
use uuid::Uuid;

use crate::stages::{ArtifactKind, StageId};

/// A file supplied with a stage advance.
#[derive(Clone, PartialEq, Eq)]
pub struct ArtifactPayload {
    bytes: Vec<u8>,
    content_type: String,
    file_name: Option<String>,
}

impl fmt::Debug for ArtifactPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactPayload")
            .field("len", &self.bytes.len())
            .field("content_type", &self.content_type)
            .field("file_name", &self.file_name)
            .finish()
    }
}

impl ArtifactPayload {
    /// Creates a payload.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
            file_name: None,
        }
    }

    /// A JPEG photo.
    #[must_use]
    pub fn jpeg(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(bytes, "image/jpeg")
    }

    /// An invoice PDF.
    #[must_use]
    pub fn pdf(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(bytes, "application/pdf")
    }

    /// An invoice XML.
    #[must_use]
    pub fn xml(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(bytes, "application/xml")
    }

    /// Sets the original file name.
    #[must_use]
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Raw bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true for an empty file.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// MIME type.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Original file name, if known.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// File extension derived from the MIME type, then the file name.
    #[must_use]
    pub fn extension(&self) -> String {
        let mime = self
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        let from_mime = match mime.as_str() {
            "image/jpeg" | "image/jpg" => Some("jpg"),
            "image/png" => Some("png"),
            "image/webp" => Some("webp"),
            "image/heic" => Some("heic"),
            "application/pdf" => Some("pdf"),
            "application/xml" | "text/xml" => Some("xml"),
            _ => None,
        };
        if let Some(ext) = from_mime {
            return ext.to_string();
        }

        self.file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(|| "bin".to_string())
    }

    /// Base64 MD5 of the bytes, as sent in `Content-MD5`.
    #[must_use]
    pub fn content_md5(&self) -> String {
        STANDARD.encode(Md5::digest(&self.bytes))
    }

    /// Hex SHA-256 of the bytes.
    #[must_use]
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

/// Object key for an artifact.
///
/// `{prefix}/{record_id}/etapa-{n}/{kind}-{sha256[..16]}-{attempt}.{ext}`.
/// `attempt` is unique per advance, so two advances racing on the same
/// record never share a key even when they upload identical bytes.
#[must_use]
pub fn artifact_key(
    prefix: &str,
    record_id: Uuid,
    stage: StageId,
    kind: ArtifactKind,
    attempt: Uuid,
    payload: &ArtifactPayload,
) -> String {
    let digest = payload.digest();
    format!(
        "{}/{record_id}/etapa-{stage}/{kind}-{}-{}.{}",
        prefix.trim_end_matches('/'),
        &digest[..16],
        attempt.simple(),
        payload.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_from_mime_and_name() {
        assert_eq!(ArtifactPayload::jpeg(vec![1]).extension(), "jpg");
        assert_eq!(ArtifactPayload::new(vec![1], "text/xml; charset=utf-8").extension(), "xml");
        assert_eq!(
            ArtifactPayload::new(vec![1], "application/octet-stream")
                .with_file_name("NF-123.PDF")
                .extension(),
            "pdf"
        );
        assert_eq!(ArtifactPayload::new(vec![1], "application/octet-stream").extension(), "bin");
    }

    #[test]
    fn test_content_md5_is_base64() {
        // md5("") = d41d8cd98f00b204e9800998ecf8427e
        assert_eq!(ArtifactPayload::pdf(Vec::new()).content_md5(), "1B2M2Y8AsgTpgAmY7PhCfg==");
    }

    #[test]
    fn test_key_layout() {
        let record_id = Uuid::nil();
        let attempt = Uuid::now_v7();
        let payload = ArtifactPayload::jpeg(b"foto".to_vec());
        let key = artifact_key(
            "carregamentos/",
            record_id,
            StageId::ARRIVAL,
            ArtifactKind::Photo,
            attempt,
            &payload,
        );

        let expected_prefix = format!("carregamentos/{record_id}/etapa-1/photo-");
        assert!(key.starts_with(&expected_prefix));
        assert!(key.ends_with(&format!("-{}.jpg", attempt.simple())));
        assert_eq!(key.len(), expected_prefix.len() + 16 + 1 + 32 + ".jpg".len());
    }

    #[test]
    fn test_key_differs_per_attempt() {
        let payload = ArtifactPayload::jpeg(b"foto".to_vec());
        let key = |attempt| artifact_key("c", Uuid::nil(), StageId::ARRIVAL, ArtifactKind::Photo, attempt, &payload);
        assert_ne!(key(Uuid::now_v7()), key(Uuid::now_v7()));
    }

    #[test]
    fn test_debug_hides_bytes() {
        let debug = format!("{:?}", ArtifactPayload::jpeg(vec![0xff; 64]));
        assert!(debug.contains("len: 64"));
        assert!(!debug.contains("255"));
    }
}
