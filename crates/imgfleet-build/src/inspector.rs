//! Manifest inspection
//!
//! Turns the raw response for `image:tag` into a [`ManifestSnapshot`].

use crate::error::{BuildError, Result};
use crate::manifest::{ManifestSnapshot, decode_manifest};
use crate::registry::{RawManifestResponse, RegistryClient};

/// Reads the manifest a tag currently points at.
pub struct ManifestInspector<'a> {
    registry: &'a dyn RegistryClient,
}

impl<'a> ManifestInspector<'a> {
    pub fn new(registry: &'a dyn RegistryClient) -> Self {
        Self { registry }
    }

    /// Snapshot of `image:probe_tag`.
    ///
    /// A missing tag is `ManifestSnapshot::Absent`. Every other failure,
    /// including a response that cannot be decoded, is a `RegistryQuery`
    /// error so that an outage is never mistaken for an empty tag.
    pub async fn inspect(&self, image: &str, probe_tag: &str) -> Result<ManifestSnapshot> {
        let reference = format!("{}:{}", image, probe_tag);

        let raw = match self.registry.inspect_raw(&reference).await? {
            RawManifestResponse::NotFound => {
                tracing::info!("{} does not exist yet, first publish", reference);
                return Ok(ManifestSnapshot::Absent);
            }
            RawManifestResponse::Found(raw) => raw,
        };

        let entries = decode_manifest(&raw).map_err(|e| BuildError::RegistryQuery {
            reference: reference.clone(),
            message: format!("unexpected manifest format: {}", e),
        })?;

        for entry in &entries {
            tracing::debug!("{}: {} {}", reference, entry.platform, entry.digest);
        }

        Ok(ManifestSnapshot::Present(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{Digest, ManifestEntry};
    use crate::platform::Platform;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedRegistry {
        response: Mutex<Option<Result<RawManifestResponse>>>,
        seen: Mutex<Vec<String>>,
    }

    impl CannedRegistry {
        fn new(response: Result<RawManifestResponse>) -> Self {
            Self {
                response: Mutex::new(Some(response)),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RegistryClient for CannedRegistry {
        async fn inspect_raw(&self, reference: &str) -> Result<RawManifestResponse> {
            self.seen.lock().unwrap().push(reference.to_string());
            self.response.lock().unwrap().take().unwrap()
        }

        async fn create_tags(&self, _tags: &[String], _sources: &[String]) -> Result<()> {
            unreachable!("inspector never publishes")
        }
    }

    #[tokio::test]
    async fn test_not_found_is_absent() {
        let registry = CannedRegistry::new(Ok(RawManifestResponse::NotFound));
        let inspector = ManifestInspector::new(&registry);

        let snapshot = inspector.inspect("hstreamdb/haskell", "rqlite").await.unwrap();

        assert_eq!(snapshot, ManifestSnapshot::Absent);
        assert_eq!(
            registry.seen.lock().unwrap().as_slice(),
            &["hstreamdb/haskell:rqlite".to_string()]
        );
    }

    #[tokio::test]
    async fn test_manifest_list_is_decoded() {
        let raw = br#"{"manifests": [
            {"digest": "sha256:aaa", "platform": {"os": "linux", "architecture": "amd64"}},
            {"digest": "sha256:bbb", "platform": {"os": "linux", "architecture": "arm64", "variant": "v8"}}
        ]}"#;
        let registry = CannedRegistry::new(Ok(RawManifestResponse::Found(raw.to_vec())));
        let inspector = ManifestInspector::new(&registry);

        let snapshot = inspector.inspect("hstreamdb/logdevice", "latest").await.unwrap();

        assert_eq!(
            snapshot,
            ManifestSnapshot::Present(vec![
                ManifestEntry::new(Platform::linux_amd64(), Digest::parse("sha256:aaa").unwrap()),
                ManifestEntry::new(Platform::linux_arm64(), Digest::parse("sha256:bbb").unwrap()),
            ])
        );
    }

    #[tokio::test]
    async fn test_registry_error_is_not_absence() {
        let registry = CannedRegistry::new(Err(BuildError::RegistryQuery {
            reference: "hstreamdb/haskell:latest".to_string(),
            message: "401 Unauthorized".to_string(),
        }));
        let inspector = ManifestInspector::new(&registry);

        let result = inspector.inspect("hstreamdb/haskell", "latest").await;
        assert!(matches!(result, Err(BuildError::RegistryQuery { .. })));
    }

    #[tokio::test]
    async fn test_garbage_response_is_query_error() {
        let registry = CannedRegistry::new(Ok(RawManifestResponse::Found(b"<html>".to_vec())));
        let inspector = ManifestInspector::new(&registry);

        let result = inspector.inspect("hstreamdb/haskell", "latest").await;
        match result {
            Err(BuildError::RegistryQuery { reference, message }) => {
                assert_eq!(reference, "hstreamdb/haskell:latest");
                assert!(message.contains("unexpected manifest format"));
            }
            other => panic!("expected RegistryQuery, got {:?}", other),
        }
    }
}
