//! Effects layer: the HTTP seam and the acquisition workflow.

use bytes::Bytes;
use futures_util::Stream;
use futures_util::TryStreamExt;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use relaunch_verify::{Hasher, Sha256Hasher, verify_file};

use crate::data::{AcquireOptions, DownloadPhase, Progress};
use crate::error::FetchError;
use crate::retry::retry_delay;

pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

pub trait HttpClient: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn stream(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<BoxStream<'static, Result<Bytes, Self::Error>>, Self::Error>> + Send;

    fn head(&self, url: &str) -> impl Future<Output = Result<Option<u64>, Self::Error>> + Send;

    /// Whether a failure is worth retrying (connect refused, timeout, 5xx).
    fn transient(err: &Self::Error) -> bool;
}

pub struct Acquirer<C: HttpClient> {
    client: C,
}

enum StreamFailure<E> {
    Http(E),
    Io(PathBuf, io::Error),
}

impl<C: HttpClient> Acquirer<C> {
    pub fn new(client: C) -> Self { Self { client } }

    pub fn client(&self) -> &C { &self.client }

    /// Download `url` to `dest`, reusing a still-valid cache file when one is
    /// present. The returned path is always `dest`.
    ///
    /// Transient network failures are retried with exponential backoff (unless
    /// disabled); checksum mismatches delete the artifact and surface
    /// immediately.
    pub async fn acquire(
        &self,
        url: &str,
        dest: &Path,
        options: &AcquireOptions,
    ) -> Result<PathBuf, FetchError> {
        if self.try_reuse(url, dest, options).await? {
            emit(options, DownloadPhase::Completed, 0, None, 0);
            return Ok(dest.to_path_buf());
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::io(parent, e))?;
        }

        let total_bytes = self.client.head(url).await.ok().flatten();
        emit(options, DownloadPhase::Connecting, 0, total_bytes, 0);

        let part = part_path(dest);
        let mut retry_count = 0u32;

        let (digest, bytes_downloaded) = loop {
            match self
                .stream_to_part(url, &part, total_bytes, retry_count, options)
                .await
            {
                Ok(done) => break done,
                Err(StreamFailure::Http(e))
                    if options.retries && retry_count < options.max_retries && C::transient(&e) =>
                {
                    let delay = retry_delay(retry_count, options.retry_backoff);
                    warn!(url, retry = retry_count + 1, ?delay, error = %e, "transient download failure, retrying");
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(StreamFailure::Http(e)) => {
                    let _ = tokio::fs::remove_file(&part).await;
                    return Err(FetchError::Network {
                        url:      url.to_string(),
                        attempts: retry_count + 1,
                        message:  e.to_string(),
                    });
                }
                Err(StreamFailure::Io(path, e)) => {
                    let _ = tokio::fs::remove_file(&part).await;
                    return Err(FetchError::io(&path, e));
                }
            }
        };

        emit(
            options,
            DownloadPhase::Verifying,
            bytes_downloaded,
            total_bytes,
            retry_count,
        );

        if let Some(ref expected) = options.checksum {
            let actual = hex::encode(&digest);
            if actual != expected.as_str() {
                let _ = tokio::fs::remove_file(&part).await;
                warn!(url, path = %dest.display(), "checksum mismatch, corrupt download deleted");
                return Err(FetchError::ChecksumMismatch {
                    url:      url.to_string(),
                    path:     dest.to_path_buf(),
                    expected: expected.as_str().to_string(),
                    actual,
                });
            }
        }

        tokio::fs::rename(&part, dest)
            .await
            .map_err(|e| FetchError::io(dest, e))?;

        info!(url, path = %dest.display(), bytes = bytes_downloaded, "download complete");
        emit(
            options,
            DownloadPhase::Completed,
            bytes_downloaded,
            total_bytes,
            retry_count,
        );
        Ok(dest.to_path_buf())
    }

    /// Reuse an existing cache file when it is large enough to be a finished
    /// download and its digest (when one is expected) still matches. A corrupt
    /// entry is evicted so the caller falls through to a fresh download.
    async fn try_reuse(
        &self,
        url: &str,
        dest: &Path,
        options: &AcquireOptions,
    ) -> Result<bool, FetchError> {
        let len = match tokio::fs::metadata(dest).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => return Ok(false),
        };
        if len < options.min_reuse_size {
            return Ok(false);
        }

        match options.checksum {
            None => {
                debug!(path = %dest.display(), "reusing cached archive (no checksum supplied)");
                Ok(true)
            }
            Some(ref expected) => match verify_file(dest, expected) {
                Ok(()) => {
                    info!(path = %dest.display(), "reusing cached archive, checksum valid");
                    Ok(true)
                }
                Err(relaunch_verify::VerifyError::Mismatch { .. }) => {
                    warn!(url, path = %dest.display(), "cached archive corrupt, evicting");
                    tokio::fs::remove_file(dest)
                        .await
                        .map_err(|e| FetchError::io(dest, e))?;
                    Ok(false)
                }
                Err(relaunch_verify::VerifyError::Io { path, source }) => {
                    Err(FetchError::Io { path, source })
                }
            },
        }
    }

    async fn stream_to_part(
        &self,
        url: &str,
        part: &Path,
        total_bytes: Option<u64>,
        retry_count: u32,
        options: &AcquireOptions,
    ) -> Result<(Vec<u8>, u64), StreamFailure<C::Error>> {
        let mut stream = self.client.stream(url).await.map_err(StreamFailure::Http)?;
        let mut file = tokio::fs::File::create(part)
            .await
            .map_err(|e| StreamFailure::Io(part.to_path_buf(), e))?;

        let mut hasher = Sha256Hasher::new();
        let mut bytes_downloaded = 0u64;

        while let Some(chunk) = stream.try_next().await.map_err(StreamFailure::Http)? {
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(|e| StreamFailure::Io(part.to_path_buf(), e))?;
            bytes_downloaded += chunk.len() as u64;
            emit(
                options,
                DownloadPhase::Downloading,
                bytes_downloaded,
                total_bytes,
                retry_count,
            );
        }

        file.sync_all()
            .await
            .map_err(|e| StreamFailure::Io(part.to_path_buf(), e))?;

        Ok((hasher.finalize(), bytes_downloaded))
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

fn emit(
    options: &AcquireOptions,
    phase: DownloadPhase,
    bytes_downloaded: u64,
    total_bytes: Option<u64>,
    retry_count: u32,
) {
    if let Some(ref callback) = options.on_progress {
        callback(Progress {
            phase,
            bytes_downloaded,
            total_bytes,
            retry_count,
        });
    }
}

#[cfg(feature = "reqwest")]
mod reqwest_client {
    use super::*;
    use reqwest::Client;

    pub struct ReqwestClient {
        client: Client,
    }

    impl ReqwestClient {
        pub fn new() -> Result<Self, reqwest::Error> {
            let client = Client::builder().build()?;
            Ok(Self { client })
        }
    }

    impl HttpClient for ReqwestClient {
        type Error = reqwest::Error;

        async fn stream(
            &self,
            url: &str,
        ) -> Result<BoxStream<'static, Result<Bytes, Self::Error>>, Self::Error> {
            let response = self.client.get(url).send().await?.error_for_status()?;
            Ok(Box::pin(response.bytes_stream()))
        }

        async fn head(&self, url: &str) -> Result<Option<u64>, Self::Error> {
            let response = self.client.head(url).send().await?;
            Ok(response.content_length())
        }

        fn transient(err: &Self::Error) -> bool {
            err.is_timeout()
                || err.is_connect()
                || err.status().is_some_and(|s| s.is_server_error())
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_client::ReqwestClient;
