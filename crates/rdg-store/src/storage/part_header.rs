// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Per-partition metadata document: one JSON file per (version, host)
//! holding the property info lists, partition metadata, entity-type-id
//! array locations, the serialized entity type managers, and the stored
//! topology entries.

use crate::properties::storage_info::PropStorageInfo;
use crate::topology::tags::{EdgeSortKind, NodeSortKind, TopologyKind, TransposeKind};
use bytes::Bytes;
use rdg_common::{EntityTypeManager, RdgError, Result};
use serde::{Deserialize, Serialize};

/// Newest storage format this build writes. Older readable versions are
/// upgraded on the next commit; newer ones are refused.
pub const LATEST_STORAGE_FORMAT_VERSION: u32 = 3;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartitionMetadata {
    pub num_nodes: u64,
    pub num_edges: u64,
    pub num_owned: u64,
    pub policy_id: u32,
    pub transposed: bool,
}

/// Location plus tag tuple of one stored topology record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopologyEntry {
    pub path: String,
    pub kind: TopologyKind,
    pub transpose: TransposeKind,
    pub edge_sort: EdgeSortKind,
    pub node_sort: NodeSortKind,
    pub num_nodes: u64,
    pub num_edges: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PartitionHeader {
    storage_format_version: u32,
    #[serde(default)]
    unstable_storage_format: bool,
    pub metadata: PartitionMetadata,
    pub node_prop_info_list: Vec<PropStorageInfo>,
    pub edge_prop_info_list: Vec<PropStorageInfo>,
    pub part_prop_info_list: Vec<PropStorageInfo>,
    pub node_entity_type_id_array_path: String,
    pub edge_entity_type_id_array_path: String,
    pub node_entity_type_manager: EntityTypeManager,
    pub edge_entity_type_manager: EntityTypeManager,
    pub topology_entries: Vec<TopologyEntry>,
}

impl PartitionHeader {
    pub fn new(metadata: PartitionMetadata) -> Self {
        Self {
            storage_format_version: LATEST_STORAGE_FORMAT_VERSION,
            unstable_storage_format: false,
            metadata,
            node_prop_info_list: Vec::new(),
            edge_prop_info_list: Vec::new(),
            part_prop_info_list: Vec::new(),
            node_entity_type_id_array_path: String::new(),
            edge_entity_type_id_array_path: String::new(),
            node_entity_type_manager: EntityTypeManager::new(),
            edge_entity_type_manager: EntityTypeManager::new(),
            topology_entries: Vec::new(),
        }
    }

    pub fn storage_format_version(&self) -> u32 {
        self.storage_format_version
    }

    pub fn unstable_storage_format(&self) -> bool {
        self.unstable_storage_format
    }

    /// Stamp the header with the newest format before writing.
    pub fn update_storage_format_version(&mut self) {
        self.storage_format_version = LATEST_STORAGE_FORMAT_VERSION;
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header: PartitionHeader = serde_json::from_slice(bytes)
            .map_err(|e| RdgError::SchemaMismatch(format!("cannot parse partition header: {e}")))?;
        if header.storage_format_version > LATEST_STORAGE_FORMAT_VERSION {
            return Err(RdgError::SchemaMismatch(format!(
                "partition header has storage format {} but this build reads up to {}",
                header.storage_format_version, LATEST_STORAGE_FORMAT_VERSION
            )));
        }
        header.validate()?;
        Ok(header)
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn validate(&self) -> Result<()> {
        for info in self
            .node_prop_info_list
            .iter()
            .chain(&self.edge_prop_info_list)
            .chain(&self.part_prop_info_list)
        {
            if info.path().is_none() {
                return Err(RdgError::SchemaMismatch(format!(
                    "persisted property '{}' has no storage path",
                    info.name()
                )));
            }
        }
        if self.metadata.num_owned > self.metadata.num_nodes {
            return Err(RdgError::SchemaMismatch(
                "partition owns more nodes than it has".into(),
            ));
        }
        Ok(())
    }

    /// Every directory-local file this partition references.
    pub fn referenced_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self
            .node_prop_info_list
            .iter()
            .chain(&self.edge_prop_info_list)
            .chain(&self.part_prop_info_list)
            .filter_map(|info| info.path().map(str::to_string))
            .collect();
        if !self.node_entity_type_id_array_path.is_empty() {
            files.push(self.node_entity_type_id_array_path.clone());
        }
        if !self.edge_entity_type_id_array_path.is_empty() {
            files.push(self.edge_entity_type_id_array_path.clone());
        }
        files.extend(self.topology_entries.iter().map(|e| e.path.clone()));
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PartitionHeader {
        let mut header = PartitionHeader::new(PartitionMetadata {
            num_nodes: 4,
            num_edges: 4,
            num_owned: 4,
            policy_id: 0,
            transposed: false,
        });
        header
            .node_prop_info_list
            .push(PropStorageInfo::new_absent("w", "w.abc.parquet"));
        header.node_entity_type_id_array_path = "node_types.bin".into();
        header.topology_entries.push(TopologyEntry {
            path: "topology.abc".into(),
            kind: TopologyKind::Csr,
            transpose: TransposeKind::No,
            edge_sort: EdgeSortKind::Any,
            node_sort: NodeSortKind::Any,
            num_nodes: 4,
            num_edges: 4,
        });
        header
    }

    #[test]
    fn test_round_trip() {
        let header = sample();
        let bytes = header.to_bytes().unwrap();
        let back = PartitionHeader::from_bytes(&bytes).unwrap();
        assert_eq!(back.metadata, header.metadata);
        assert_eq!(back.node_prop_info_list.len(), 1);
        assert!(back.node_prop_info_list[0].is_absent());
        assert_eq!(back.topology_entries.len(), 1);
    }

    #[test]
    fn test_newer_format_refused() {
        let mut header = sample();
        header.storage_format_version = LATEST_STORAGE_FORMAT_VERSION + 1;
        let bytes = header.to_bytes().unwrap();
        assert!(matches!(
            PartitionHeader::from_bytes(&bytes),
            Err(RdgError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_referenced_files_form_live_set() {
        let files = sample().referenced_files();
        assert!(files.contains(&"w.abc.parquet".to_string()));
        assert!(files.contains(&"node_types.bin".to_string()));
        assert!(files.contains(&"topology.abc".to_string()));
    }

    #[test]
    fn test_validate_rejects_pathless_persisted_property() {
        let mut header = sample();
        // A dirty, never-written column must not appear in a header.
        header
            .edge_prop_info_list
            .push(PropStorageInfo::new_dirty("fresh"));
        assert!(header.validate().is_err());
    }
}
