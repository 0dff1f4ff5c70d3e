// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! The versioned graph manifest.
//!
//! A manifest is one small JSON file at a deterministic, version-encoding
//! path; writing it is the atomic commit point of a store. Readers that
//! resolve a directory always see a complete version: either the old
//! manifest or the new one, never a mixture.

use crate::storage::part_header::PartitionHeader;
use crate::storage::store_util;
use bytes::Bytes;
use object_store::path::Path;
use object_store::ObjectStore;
use rdg_common::config::StoreConfig;
use rdg_common::{Host, RdgError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

pub const RDG_MAGIC: u32 = 0x2914_4529;
pub const DEFAULT_VIEW_TYPE: &str = "default";

const VERSION_DIGITS: usize = 20;
const HOST_DIGITS: usize = 5;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RdgManifest {
    magic: u32,
    version: u64,
    previous_version: u64,
    num_hosts: Host,
    policy_id: u32,
    transposed: bool,
    lineage: Vec<String>,

    // Derived from the manifest's location, not stored in the JSON body.
    #[serde(skip)]
    viewtype: String,
    #[serde(skip, default = "Path::default")]
    dir: Path,
}

impl RdgManifest {
    /// A fresh, never-stored graph at version 0; the first commit with
    /// `NextVersion` publishes version 1.
    pub fn new(dir: Path, viewtype: impl Into<String>, num_hosts: Host) -> Self {
        Self {
            magic: RDG_MAGIC,
            version: 0,
            previous_version: 0,
            num_hosts,
            policy_id: 0,
            transposed: false,
            lineage: Vec::new(),
            viewtype: viewtype.into(),
            dir,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn previous_version(&self) -> u64 {
        self.previous_version
    }

    pub fn num_hosts(&self) -> Host {
        self.num_hosts
    }

    pub fn policy_id(&self) -> u32 {
        self.policy_id
    }

    pub fn transposed(&self) -> bool {
        self.transposed
    }

    pub fn lineage(&self) -> &[String] {
        &self.lineage
    }

    pub fn viewtype(&self) -> &str {
        &self.viewtype
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The successor manifest at `version + 1`.
    pub fn next_version(
        &self,
        num_hosts: Host,
        policy_id: u32,
        transposed: bool,
        lineage: Vec<String>,
    ) -> Self {
        Self {
            magic: RDG_MAGIC,
            version: self.version + 1,
            previous_version: self.version,
            num_hosts,
            policy_id,
            transposed,
            lineage,
            viewtype: self.viewtype.clone(),
            dir: self.dir.clone(),
        }
    }

    /// A re-stamp of the current version, used when a view shadow
    /// overwrites a graph in place.
    pub fn same_version(
        &self,
        num_hosts: Host,
        policy_id: u32,
        transposed: bool,
        lineage: Vec<String>,
    ) -> Self {
        Self {
            magic: RDG_MAGIC,
            version: self.version,
            previous_version: self.previous_version,
            num_hosts,
            policy_id,
            transposed,
            lineage,
            viewtype: self.viewtype.clone(),
            dir: self.dir.clone(),
        }
    }

    pub fn file_name(dir: &Path, viewtype: &str, version: u64) -> Path {
        dir.child(format!(
            "manifest_{viewtype}_{version:0width$}",
            width = VERSION_DIGITS
        ))
    }

    pub fn partition_file_name(dir: &Path, viewtype: &str, host: Host, version: u64) -> Path {
        dir.child(format!(
            "part_{version:0vw$}_{viewtype}_{host:0hw$}",
            vw = VERSION_DIGITS,
            hw = HOST_DIGITS
        ))
    }

    pub fn self_file_name(&self) -> Path {
        Self::file_name(&self.dir, &self.viewtype, self.version)
    }

    pub fn self_partition_file_name(&self, host: Host) -> Path {
        Self::partition_file_name(&self.dir, &self.viewtype, host, self.version)
    }

    pub fn is_manifest_key(name: &str) -> bool {
        parse_manifest_name(name).is_some()
    }

    pub fn parse_version_from_name(name: &str) -> Result<u64> {
        parse_manifest_name(name)
            .map(|(_, version)| version)
            .ok_or_else(|| {
                RdgError::invalid_argument(format!("'{name}' is not a manifest file name"))
            })
    }

    pub fn parse_viewtype_from_name(name: &str) -> Result<String> {
        parse_manifest_name(name)
            .map(|(viewtype, _)| viewtype.to_string())
            .ok_or_else(|| {
                RdgError::invalid_argument(format!("'{name}' is not a manifest file name"))
            })
    }

    /// POSIX text files end in a newline.
    pub fn to_json_string(&self) -> Result<String> {
        let mut s = serde_json::to_string(self)?;
        s.push('\n');
        Ok(s)
    }

    pub fn from_bytes(bytes: &[u8], dir: Path, viewtype: String) -> Result<Self> {
        let mut manifest: RdgManifest = serde_json::from_slice(bytes)
            .map_err(|e| RdgError::SchemaMismatch(format!("cannot parse manifest: {e}")))?;
        if manifest.magic != RDG_MAGIC {
            return Err(RdgError::SchemaMismatch(format!(
                "manifest magic number mismatch: {:#x}",
                manifest.magic
            )));
        }
        manifest.dir = dir;
        manifest.viewtype = viewtype;
        Ok(manifest)
    }

    pub async fn load(
        store: &Arc<dyn ObjectStore>,
        dir: &Path,
        viewtype: &str,
        version: u64,
        config: &StoreConfig,
    ) -> Result<Self> {
        let path = Self::file_name(dir, viewtype, version);
        let bytes = store_util::get_bytes(store, &path, config)
            .await
            .map_err(|e| e.with_context(format!("loading manifest {path}")))?;
        Self::from_bytes(&bytes, dir.clone(), viewtype.to_string())
    }

    /// Resolve the directory to its newest version for `viewtype`.
    pub async fn load_latest(
        store: &Arc<dyn ObjectStore>,
        dir: &Path,
        viewtype: &str,
        config: &StoreConfig,
    ) -> Result<Option<Self>> {
        let metas = store_util::list_all(store, Some(dir), config).await?;
        let mut newest: Option<u64> = None;
        for meta in metas {
            let Some(name) = meta.location.filename() else {
                continue;
            };
            if let Some((view, version)) = parse_manifest_name(name)
                && view == viewtype
            {
                newest = Some(newest.map_or(version, |v| v.max(version)));
            }
        }
        match newest {
            Some(version) => Ok(Some(Self::load(store, dir, viewtype, version, config).await?)),
            None => Ok(None),
        }
    }

    pub async fn save(
        &self,
        store: &Arc<dyn ObjectStore>,
        config: &StoreConfig,
    ) -> Result<()> {
        let path = self.self_file_name();
        let body = Bytes::from(self.to_json_string()?);
        store_util::put_bytes(store, &path, body, config)
            .await
            .map_err(|e| e.with_context(format!("committing manifest {path}")))
    }

    /// The set of file names referenced by this version across all
    /// partitions: the live set. Anything in the directory outside this set
    /// is a reclaimable orphan.
    pub async fn file_names(
        &self,
        store: &Arc<dyn ObjectStore>,
        config: &StoreConfig,
    ) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        if let Some(name) = self.self_file_name().filename() {
            names.insert(name.to_string());
        }
        for host in 0..self.num_hosts {
            let part_path = self.self_partition_file_name(host);
            if let Some(name) = part_path.filename() {
                names.insert(name.to_string());
            }
            let bytes = match store_util::get_bytes(store, &part_path, config).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(%part_path, host, error = %e, "unreadable partition header");
                    continue;
                }
            };
            let header = PartitionHeader::from_bytes(&bytes)?;
            names.extend(header.referenced_files());
        }
        Ok(names)
    }
}

fn parse_manifest_name(name: &str) -> Option<(&str, u64)> {
    let rest = name.strip_prefix("manifest_")?;
    let (viewtype, version) = rest.rsplit_once('_')?;
    if viewtype.is_empty() || version.len() != VERSION_DIGITS {
        return None;
    }
    let version: u64 = version.parse().ok()?;
    Some((viewtype, version))
}
