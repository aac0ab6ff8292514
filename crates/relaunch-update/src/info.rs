//! Version-info endpoint client with an explicit in-process cache.
//!
//! The cache is a plain `{data, fetched_at}` pair owned by the client and
//! checked against the TTL on every call; an expired entry is only served
//! when a refresh fails.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use tracing::warn;

use relaunch_fetch::HttpClient;

use crate::error::UpdateError;
use crate::version::{ArchiveEndpoint, Branch};

pub const INFO_CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchInfo {
    pub newest:        u32,
    pub build_version: String,
}

/// Platform key (`{os}-{arch}`) -> branch name -> branch info.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionManifest(pub HashMap<String, HashMap<String, BranchInfo>>);

impl VersionManifest {
    pub fn branch_info(&self, platform_key: &str, branch: Branch) -> Option<&BranchInfo> {
        self.0.get(platform_key).and_then(|p| p.get(branch.as_str()))
    }
}

struct CacheEntry {
    manifest:   VersionManifest,
    fetched_at: Instant,
}

pub struct VersionInfoClient<C: HttpClient> {
    client: C,
    url:    String,
    ttl:    Duration,
    cache:  Mutex<Option<CacheEntry>>,
}

impl<C: HttpClient> VersionInfoClient<C> {
    pub fn new(client: C, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            ttl: INFO_CACHE_TTL,
            cache: Mutex::new(None),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Current manifest, served from cache while fresh. On a failed refresh an
    /// expired cache entry is reused if one exists; otherwise the failure
    /// propagates.
    pub async fn manifest(&self) -> Result<VersionManifest, UpdateError> {
        if let Some(entry) = self.cache_lock().as_ref()
            && entry.fetched_at.elapsed() < self.ttl
        {
            return Ok(entry.manifest.clone());
        }

        match self.fetch().await {
            Ok(manifest) => {
                *self.cache_lock() = Some(CacheEntry {
                    manifest: manifest.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(manifest)
            }
            Err(e) => {
                if let Some(entry) = self.cache_lock().as_ref() {
                    warn!(url = %self.url, error = %e, "version info refresh failed, reusing expired cache");
                    return Ok(entry.manifest.clone());
                }
                Err(e)
            }
        }
    }

    /// Newest build for one platform/branch pair.
    pub async fn newest(
        &self,
        endpoint: &ArchiveEndpoint,
        branch: Branch,
    ) -> Result<BranchInfo, UpdateError> {
        let manifest = self.manifest().await?;
        let platform = endpoint.platform_key();
        manifest
            .branch_info(&platform, branch)
            .cloned()
            .ok_or(UpdateError::NoPlatformEntry { platform, branch })
    }

    fn cache_lock(&self) -> std::sync::MutexGuard<'_, Option<CacheEntry>> {
        // The cache is plain data; a poisoned lock just means a previous
        // caller panicked mid-update, and stale data is still usable.
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn fetch(&self) -> Result<VersionManifest, UpdateError> {
        let mut stream = self
            .client
            .stream(&self.url)
            .await
            .map_err(|e| UpdateError::InfoFetch {
                url:     self.url.clone(),
                message: e.to_string(),
            })?;

        let mut body = Vec::new();
        while let Some(chunk) = stream.try_next().await.map_err(|e| UpdateError::InfoFetch {
            url:     self.url.clone(),
            message: e.to_string(),
        })? {
            body.extend_from_slice(&chunk);
        }

        serde_json::from_slice(&body).map_err(|source| UpdateError::InfoParse {
            url: self.url.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use relaunch_fetch::BoxStream;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MANIFEST_JSON: &str = r#"{
        "windows-x86_64": {
            "release": { "newest": 8, "buildVersion": "1.0.8" },
            "pre-release": { "newest": 9, "buildVersion": "1.1.0-rc1" }
        }
    }"#;

    #[derive(Debug, thiserror::Error)]
    #[error("unreachable endpoint")]
    struct MockError;

    struct MockClient {
        responses: Mutex<Vec<Result<String, MockError>>>,
        calls:     AtomicUsize,
    }

    impl MockClient {
        fn new(responses: Vec<Result<String, MockError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls:     AtomicUsize::new(0),
            }
        }
    }

    impl HttpClient for MockClient {
        type Error = MockError;

        async fn stream(
            &self,
            _url: &str,
        ) -> Result<BoxStream<'static, Result<Bytes, Self::Error>>, Self::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.responses.lock().unwrap().remove(0) {
                Ok(body) => Ok(Box::pin(futures_util::stream::iter(vec![Ok(Bytes::from(
                    body,
                ))]))),
                Err(e) => Err(e),
            }
        }

        async fn head(&self, _url: &str) -> Result<Option<u64>, Self::Error> { Ok(None) }

        fn transient(_err: &Self::Error) -> bool { false }
    }

    fn endpoint() -> ArchiveEndpoint {
        ArchiveEndpoint::new("https://cdn.example.net", "windows", "x86_64")
    }

    #[test]
    fn manifest_parses_wire_keys() {
        let manifest: VersionManifest = serde_json::from_str(MANIFEST_JSON).unwrap();
        let info = manifest
            .branch_info("windows-x86_64", Branch::Release)
            .unwrap();
        assert_eq!(info.newest, 8);
        assert_eq!(info.build_version, "1.0.8");
        assert_eq!(
            manifest
                .branch_info("windows-x86_64", Branch::PreRelease)
                .unwrap()
                .newest,
            9
        );
    }

    #[tokio::test]
    async fn fresh_cache_short_circuits() {
        let client = MockClient::new(vec![Ok(MANIFEST_JSON.to_string())]);
        let info_client = VersionInfoClient::new(client, "https://api/versions");

        info_client.manifest().await.unwrap();
        info_client.manifest().await.unwrap();
        assert_eq!(info_client.client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_cache_reused_on_failure() {
        let client = MockClient::new(vec![Ok(MANIFEST_JSON.to_string()), Err(MockError)]);
        let info_client =
            VersionInfoClient::new(client, "https://api/versions").with_ttl(Duration::ZERO);

        let first = info_client.manifest().await.unwrap();
        let second = info_client.manifest().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(info_client.client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failure_without_cache_propagates() {
        let client = MockClient::new(vec![Err(MockError)]);
        let info_client = VersionInfoClient::new(client, "https://api/versions");

        let err = info_client.manifest().await.unwrap_err();
        assert!(matches!(err, UpdateError::InfoFetch { .. }));
    }

    #[tokio::test]
    async fn newest_reports_missing_platform() {
        let client = MockClient::new(vec![Ok("{}".to_string())]);
        let info_client = VersionInfoClient::new(client, "https://api/versions");

        let err = info_client
            .newest(&endpoint(), Branch::Release)
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::NoPlatformEntry { .. }));
    }
}
