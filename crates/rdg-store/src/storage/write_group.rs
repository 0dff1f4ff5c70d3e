// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Batched-async I/O descriptors. A group fans writes (or reads) out as
//! spawned tasks; `finish()` is the barrier that surfaces the first
//! recorded error. Queued operations always run to completion so a failed
//! commit never leaves half-written interleavings in the file store.

use crate::storage::fault::{fault_point, FaultSensitivity};
use crate::storage::store_util;
use bytes::Bytes;
use fxhash::FxHashMap;
use object_store::path::Path;
use object_store::ObjectStore;
use rdg_common::config::StoreConfig;
use rdg_common::{RdgError, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Default)]
pub struct WriteGroup {
    tasks: Vec<(String, JoinHandle<Result<()>>)>,
}

impl WriteGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Queue one blob write. The buffer is owned by the task, so callers
    /// may drop their handle immediately.
    pub fn start_store(
        &mut self,
        store: Arc<dyn ObjectStore>,
        path: Path,
        bytes: Bytes,
        config: StoreConfig,
    ) {
        fault_point(FaultSensitivity::Normal);
        let label = path.to_string();
        let handle = tokio::spawn(async move {
            store_util::put_bytes(&store, &path, bytes, &config).await
        });
        self.tasks.push((label, handle));
    }

    /// Wait for every queued write. The first error is kept and returned;
    /// later tasks still run to completion.
    pub async fn finish(self) -> Result<()> {
        let mut first_err: Option<RdgError> = None;
        for (label, handle) in self.tasks {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(join_err) => Err(RdgError::assertion_failed(format!(
                    "async write of {label} panicked: {join_err}"
                ))),
            };
            if let Err(e) = outcome
                && first_err.is_none()
            {
                first_err = Some(e.with_context(format!("writing {label}")));
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct ReadGroup {
    tasks: Vec<(String, JoinHandle<Result<Bytes>>)>,
}

impl ReadGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one fetch under a caller-chosen key.
    pub fn start_fetch(
        &mut self,
        key: impl Into<String>,
        store: Arc<dyn ObjectStore>,
        path: Path,
        config: StoreConfig,
    ) {
        let key = key.into();
        let handle = tokio::spawn(async move {
            store_util::get_bytes(&store, &path, &config)
                .await
                .map_err(|e| e.with_context(format!("reading {path}")))
        });
        self.tasks.push((key, handle));
    }

    /// Wait for every queued fetch and hand back the payloads by key.
    pub async fn finish(self) -> Result<FxHashMap<String, Bytes>> {
        let mut results = FxHashMap::default();
        let mut first_err: Option<RdgError> = None;
        for (key, handle) in self.tasks {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(join_err) => Err(RdgError::assertion_failed(format!(
                    "async read of {key} panicked: {join_err}"
                ))),
            };
            match outcome {
                Ok(bytes) => {
                    results.insert(key, bytes);
                }
                Err(e) => {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(results),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::local::LocalFileSystem;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_then_read_group() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store: Arc<dyn ObjectStore> = Arc::new(LocalFileSystem::new_with_prefix(dir.path())?);
        let config = StoreConfig::default();

        let mut wg = WriteGroup::new();
        for i in 0..8 {
            wg.start_store(
                store.clone(),
                Path::from(format!("blob{i}")),
                Bytes::from(vec![i as u8; 16]),
                config,
            );
        }
        wg.finish().await?;

        let mut rg = ReadGroup::new();
        for i in 0..8 {
            rg.start_fetch(format!("blob{i}"), store.clone(), Path::from(format!("blob{i}")), config);
        }
        let results = rg.finish().await?;
        assert_eq!(results.len(), 8);
        assert_eq!(results["blob3"], Bytes::from(vec![3u8; 16]));
        Ok(())
    }

    #[tokio::test]
    async fn test_read_group_surfaces_first_error() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store: Arc<dyn ObjectStore> = Arc::new(LocalFileSystem::new_with_prefix(dir.path())?);
        let config = StoreConfig::default();

        let mut rg = ReadGroup::new();
        rg.start_fetch("missing", store.clone(), Path::from("missing"), config);
        assert!(rg.finish().await.is_err());
        Ok(())
    }
}
