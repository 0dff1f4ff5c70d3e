// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Object store operations with timeout and retry, so a wedged backend
//! cannot hang a load or a commit indefinitely.

use bytes::Bytes;
use futures::StreamExt;
use object_store::path::Path;
use object_store::{ObjectMeta, ObjectStore};
use rdg_common::config::StoreConfig;
use rdg_common::{RdgError, Result};
use std::sync::Arc;

pub async fn get_bytes(
    store: &Arc<dyn ObjectStore>,
    path: &Path,
    config: &StoreConfig,
) -> Result<Bytes> {
    let mut last_err = RdgError::io("unknown object store error");
    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            tokio::time::sleep(config.retry_backoff * attempt).await;
        }
        match tokio::time::timeout(config.request_timeout, store.get(path)).await {
            Ok(Ok(result)) => match result.bytes().await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => last_err = e.into(),
            },
            Ok(Err(e @ object_store::Error::NotFound { .. })) => {
                // retrying cannot create the object
                return Err(e.into());
            }
            Ok(Err(e)) => last_err = e.into(),
            Err(_) => {
                last_err = RdgError::io(format!(
                    "get of {path} timed out after {:?}",
                    config.request_timeout
                ));
            }
        }
    }
    Err(last_err)
}

pub async fn put_bytes(
    store: &Arc<dyn ObjectStore>,
    path: &Path,
    bytes: Bytes,
    config: &StoreConfig,
) -> Result<()> {
    let mut last_err = RdgError::io("unknown object store error");
    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            tokio::time::sleep(config.retry_backoff * attempt).await;
        }
        match tokio::time::timeout(config.request_timeout, store.put(path, bytes.clone().into()))
            .await
        {
            Ok(Ok(_)) => return Ok(()),
            Ok(Err(e)) => last_err = e.into(),
            Err(_) => {
                last_err = RdgError::io(format!(
                    "put of {path} timed out after {:?}",
                    config.request_timeout
                ));
            }
        }
    }
    Err(last_err)
}

pub async fn list_all(
    store: &Arc<dyn ObjectStore>,
    prefix: Option<&Path>,
    config: &StoreConfig,
) -> Result<Vec<ObjectMeta>> {
    let mut stream = store.list(prefix);
    let mut results = Vec::new();
    let deadline = tokio::time::Instant::now() + config.request_timeout;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return Err(RdgError::io(format!(
                "list of {prefix:?} timed out after {:?}",
                config.request_timeout
            )));
        }
        match tokio::time::timeout(remaining, stream.next()).await {
            Ok(Some(Ok(meta))) => results.push(meta),
            Ok(Some(Err(e))) => return Err(e.into()),
            Ok(None) => break,
            Err(_) => {
                return Err(RdgError::io(format!(
                    "list of {prefix:?} timed out after {:?}",
                    config.request_timeout
                )));
            }
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::local::LocalFileSystem;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_put_get_list() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store: Arc<dyn ObjectStore> = Arc::new(LocalFileSystem::new_with_prefix(dir.path())?);
        let config = StoreConfig::default();

        let path = Path::from("blob.bin");
        put_bytes(&store, &path, Bytes::from_static(b"hello"), &config).await?;
        let back = get_bytes(&store, &path, &config).await?;
        assert_eq!(back, Bytes::from_static(b"hello"));

        let listed = list_all(&store, None, &config).await?;
        assert_eq!(listed.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_missing_is_error() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store: Arc<dyn ObjectStore> = Arc::new(LocalFileSystem::new_with_prefix(dir.path())?);
        let config = StoreConfig::default();
        let result = get_bytes(&store, &Path::from("missing"), &config).await;
        assert!(result.is_err());
        Ok(())
    }
}
