// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! The resident data graph: canonical topology plus its derived-view cache,
//! the per-scope property tables, the entity-type-id arrays, and the
//! versioned persistence protocol that moves all of it to and from a flat
//! object store.

use crate::cache::{CacheKey, CachePolicy, PropertyCache, PropertyScope};
use crate::properties::storage_info::{PropState, PropStorageInfo};
use crate::properties::table::{PropertyColumn, PropertyTable};
use crate::storage::columnar;
use crate::storage::comm::CommBackend;
use crate::storage::fault::{fault_point, FaultSensitivity};
use crate::storage::manifest::{RdgManifest, DEFAULT_VIEW_TYPE};
use crate::storage::part_header::{PartitionHeader, PartitionMetadata, TopologyEntry};
use crate::storage::store_util;
use crate::storage::topologies::TopologyManager;
use crate::storage::topology_record::RdgTopology;
use crate::storage::write_group::{ReadGroup, WriteGroup};
use crate::topology::csr::CsrTopology;
use crate::topology::edge_shuffle::EdgeShuffleTopology;
use crate::topology::edge_type_aware::EdgeTypeAwareTopology;
use crate::topology::shuffle::ShuffleTopology;
use crate::topology::tags::{EdgeSortKind, NodeSortKind, TopologyKind, TransposeKind};
use crate::topology::view_cache::{GraphView, PgViewCache};
use object_store::path::Path;
use object_store::ObjectStore;
use rdg_common::config::CacheConfig;
use rdg_common::{
    EntityTypeId, EntityTypeManager, Host, RdgConfig, RdgError, Result, UNKNOWN_ENTITY_TYPE,
};
use std::sync::Arc;
use tracing::{debug, instrument};

/// How a commit assigns the published version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RdgVersioningPolicy {
    /// Overwrite the current version in place (view-type shadows).
    RetainVersion,
    /// Publish the strictly next version.
    NextVersion,
}

#[derive(Clone, Debug, Default)]
pub struct RdgLoadOptions {
    /// Partition to load; defaults to the comm backend's rank.
    pub partition: Option<Host>,
    /// Node columns to load eagerly; `None` loads all.
    pub node_properties: Option<Vec<String>>,
    /// Edge columns to load eagerly; `None` loads all.
    pub edge_properties: Option<Vec<String>>,
}

const MASTER_NODES_PREFIX: &str = "master_nodes_";
const MIRROR_NODES_PREFIX: &str = "mirror_nodes_";
const HOST_TO_OWNED_GLOBAL_NODE_IDS: &str = "host_to_owned_global_node_ids";
const HOST_TO_OWNED_GLOBAL_EDGE_IDS: &str = "host_to_owned_global_edge_ids";
const LOCAL_TO_USER_ID: &str = "local_to_user_id";
const LOCAL_TO_GLOBAL_ID: &str = "local_to_global_id";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scope {
    Node,
    Edge,
    Partition,
}

impl Scope {
    fn cache_scope(self) -> Option<PropertyScope> {
        match self {
            Scope::Node => Some(PropertyScope::Node),
            Scope::Edge => Some(PropertyScope::Edge),
            Scope::Partition => None,
        }
    }
}

pub struct Rdg {
    store: Arc<dyn ObjectStore>,
    dir: Path,
    comm: Arc<dyn CommBackend>,
    config: RdgConfig,
    manifest: RdgManifest,
    part_header: PartitionHeader,
    partition_id: Host,
    node_properties: PropertyTable,
    edge_properties: PropertyTable,
    part_properties: PropertyTable,
    node_type_ids: Vec<EntityTypeId>,
    edge_type_ids: Vec<EntityTypeId>,
    node_type_manager: EntityTypeManager,
    edge_type_manager: EntityTypeManager,
    topologies: TopologyManager,
    view_cache: PgViewCache,
    property_cache: Option<Arc<PropertyCache<PropertyColumn>>>,
    lineage: Vec<String>,
}

impl Rdg {
    /// Build a fresh in-memory graph at version 0. The first
    /// `NextVersion` store publishes version 1.
    pub fn create(
        store: Arc<dyn ObjectStore>,
        dir: Path,
        topology: CsrTopology,
        node_type_ids: Vec<EntityTypeId>,
        edge_type_ids: Vec<EntityTypeId>,
        comm: Arc<dyn CommBackend>,
        config: RdgConfig,
    ) -> Result<Self> {
        if node_type_ids.len() != topology.num_nodes() {
            return Err(RdgError::invalid_argument(format!(
                "{} node type ids for {} nodes",
                node_type_ids.len(),
                topology.num_nodes()
            )));
        }
        if edge_type_ids.len() != topology.num_edges() {
            return Err(RdgError::invalid_argument(format!(
                "{} edge type ids for {} edges",
                edge_type_ids.len(),
                topology.num_edges()
            )));
        }

        let metadata = PartitionMetadata {
            num_nodes: topology.num_nodes() as u64,
            num_edges: topology.num_edges() as u64,
            num_owned: topology.num_nodes() as u64,
            policy_id: 0,
            transposed: false,
        };
        let manifest = RdgManifest::new(dir.clone(), DEFAULT_VIEW_TYPE, comm.num_hosts());
        let property_cache = make_property_cache(&config);
        Ok(Self {
            store,
            dir,
            partition_id: comm.rank(),
            comm,
            config,
            manifest,
            part_header: PartitionHeader::new(metadata),
            node_properties: PropertyTable::new("node"),
            edge_properties: PropertyTable::new("edge"),
            part_properties: PropertyTable::new("partition"),
            node_type_ids,
            edge_type_ids,
            node_type_manager: EntityTypeManager::new(),
            edge_type_manager: EntityTypeManager::new(),
            topologies: TopologyManager::new(),
            view_cache: PgViewCache::new(Arc::new(topology)),
            property_cache,
            lineage: Vec::new(),
        })
    }

    /// Resolve the directory to its newest manifest and load it.
    pub async fn open(
        store: Arc<dyn ObjectStore>,
        dir: Path,
        opts: RdgLoadOptions,
        comm: Arc<dyn CommBackend>,
        config: RdgConfig,
    ) -> Result<Self> {
        let manifest =
            RdgManifest::load_latest(&store, &dir, DEFAULT_VIEW_TYPE, &config.store)
                .await?
                .ok_or_else(|| {
                    RdgError::invalid_argument(format!("no manifest found under {dir}"))
                })?;
        Self::make(store, manifest, opts, comm, config).await
    }

    /// Load one partition of the graph a manifest describes: read the part
    /// header, then fan property, topology, and type-array fetches out in
    /// one read group.
    #[instrument(skip_all, fields(version = manifest.version()))]
    pub async fn make(
        store: Arc<dyn ObjectStore>,
        manifest: RdgManifest,
        opts: RdgLoadOptions,
        comm: Arc<dyn CommBackend>,
        config: RdgConfig,
    ) -> Result<Self> {
        let partition_id = opts.partition.unwrap_or_else(|| comm.rank());
        let dir = manifest.dir().clone();

        let header_path = manifest.self_partition_file_name(partition_id);
        let header_bytes = store_util::get_bytes(&store, &header_path, &config.store)
            .await
            .map_err(|e| e.with_context(format!("reading partition header {header_path}")))?;
        let part_header = PartitionHeader::from_bytes(&header_bytes)?;

        let node_properties =
            PropertyTable::from_info("node", part_header.node_prop_info_list.clone());
        let edge_properties =
            PropertyTable::from_info("edge", part_header.edge_prop_info_list.clone());
        let part_properties =
            PropertyTable::from_info("partition", part_header.part_prop_info_list.clone());

        let node_selected = select_properties(&node_properties, opts.node_properties.as_deref())?;
        let edge_selected = select_properties(&edge_properties, opts.edge_properties.as_deref())?;
        let part_selected = select_properties(&part_properties, None)?;

        let mut group = ReadGroup::new();
        for (prefix, names, table) in [
            ("node", &node_selected, &node_properties),
            ("edge", &edge_selected, &edge_properties),
            ("part", &part_selected, &part_properties),
        ] {
            for name in names {
                let info = table.info(name).ok_or_else(|| {
                    RdgError::property_not_found(name.clone(), table.scope())
                })?;
                let path = info.path().ok_or_else(|| {
                    RdgError::assertion_failed(format!("property '{name}' has no storage path"))
                })?;
                group.start_fetch(
                    format!("{prefix}:{name}"),
                    store.clone(),
                    dir.child(path),
                    config.store,
                );
            }
        }
        for (i, entry) in part_header.topology_entries.iter().enumerate() {
            group.start_fetch(
                format!("topo:{i}"),
                store.clone(),
                dir.child(entry.path.as_str()),
                config.store,
            );
        }
        if !part_header.node_entity_type_id_array_path.is_empty() {
            group.start_fetch(
                "ntypes",
                store.clone(),
                dir.child(part_header.node_entity_type_id_array_path.as_str()),
                config.store,
            );
        }
        if !part_header.edge_entity_type_id_array_path.is_empty() {
            group.start_fetch(
                "etypes",
                store.clone(),
                dir.child(part_header.edge_entity_type_id_array_path.as_str()),
                config.store,
            );
        }
        let mut payloads = group.finish().await?;

        let mut rdg = Self {
            store,
            dir,
            partition_id,
            comm,
            property_cache: make_property_cache(&config),
            config,
            lineage: manifest.lineage().to_vec(),
            manifest,
            part_header,
            node_properties,
            edge_properties,
            part_properties,
            node_type_ids: Vec::new(),
            edge_type_ids: Vec::new(),
            node_type_manager: EntityTypeManager::new(),
            edge_type_manager: EntityTypeManager::new(),
            topologies: TopologyManager::new(),
            view_cache: PgViewCache::default(),
        };
        rdg.node_type_manager = rdg.part_header.node_entity_type_manager.clone();
        rdg.edge_type_manager = rdg.part_header.edge_entity_type_manager.clone();

        for (prefix, names, scope) in [
            ("node", node_selected, Scope::Node),
            ("edge", edge_selected, Scope::Edge),
            ("part", part_selected, Scope::Partition),
        ] {
            for name in names {
                let bytes = payloads.remove(&format!("{prefix}:{name}")).ok_or_else(|| {
                    RdgError::assertion_failed(format!("missing payload for property '{name}'"))
                })?;
                let column = columnar::decode_column(&name, bytes)?;
                let table = rdg.table_mut(scope);
                table.attach(column, None)?;
                table
                    .info_mut(&name)
                    .ok_or_else(|| RdgError::property_not_found(name.clone(), "loaded"))?
                    .was_loaded()?;
            }
        }

        for i in 0..rdg.part_header.topology_entries.len() {
            let bytes = payloads.remove(&format!("topo:{i}")).ok_or_else(|| {
                RdgError::assertion_failed(format!("missing payload for topology entry {i}"))
            })?;
            rdg.topologies.upsert(RdgTopology::from_bytes(bytes)?);
        }

        let num_nodes = rdg.part_header.metadata.num_nodes as usize;
        let num_edges = rdg.part_header.metadata.num_edges as usize;
        rdg.node_type_ids = match payloads.remove("ntypes") {
            Some(bytes) => columnar::decode_type_id_array(bytes)?,
            None => vec![UNKNOWN_ENTITY_TYPE; num_nodes],
        };
        rdg.edge_type_ids = match payloads.remove("etypes") {
            Some(bytes) => columnar::decode_type_id_array(bytes)?,
            None => vec![UNKNOWN_ENTITY_TYPE; num_edges],
        };
        if rdg.node_type_ids.len() != num_nodes || rdg.edge_type_ids.len() != num_edges {
            return Err(RdgError::SchemaMismatch(
                "entity type id array length disagrees with partition metadata".into(),
            ));
        }

        // The stored set must contain the canonical view.
        let shadow = RdgTopology::shadow(
            TopologyKind::Csr,
            TransposeKind::Any,
            EdgeSortKind::Any,
            NodeSortKind::Any,
        );
        let csr_record = rdg.topologies.take(&shadow).ok_or_else(|| {
            RdgError::SchemaMismatch("stored graph is missing its csr topology".into())
        })?;
        let sort_state = csr_record.edge_sort();
        let (adj, dests, eidx, nidx, _) = csr_record.into_arrays();
        let canonical = CsrTopology::from_raw(
            adj,
            dests,
            eidx.unwrap_or_default(),
            nidx.unwrap_or_default(),
        )?;
        if canonical.num_nodes() != num_nodes || canonical.num_edges() != num_edges {
            return Err(RdgError::SchemaMismatch(
                "csr topology disagrees with partition metadata".into(),
            ));
        }
        rdg.view_cache = PgViewCache::new(Arc::new(canonical));
        if sort_state != EdgeSortKind::Any {
            let topo = rdg.view_cache.default_topology();
            rdg.view_cache.reseat_default(topo, sort_state);
        }

        debug!(
            nodes = num_nodes,
            edges = num_edges,
            topologies = rdg.topologies.len(),
            "graph loaded"
        );
        Ok(rdg)
    }

    /// Commit the graph: write dirty columns and live topologies, barrier
    /// all hosts, then let host zero publish the manifest. On failure the
    /// prior manifest stays installed; freshly written blobs are orphans
    /// outside every live set.
    #[instrument(skip_all, fields(policy = ?policy, version = self.manifest.version()))]
    pub async fn store(
        &mut self,
        command_line: &str,
        policy: RdgVersioningPolicy,
    ) -> Result<()> {
        self.store_with_type_updates(command_line, policy, None, None)
            .await
    }

    pub async fn store_with_type_updates(
        &mut self,
        command_line: &str,
        policy: RdgVersioningPolicy,
        node_type_ids_update: Option<Vec<EntityTypeId>>,
        edge_type_ids_update: Option<Vec<EntityTypeId>>,
    ) -> Result<()> {
        self.lineage.push(command_line.to_string());
        let metadata = self.part_header.metadata;
        let next_manifest = match policy {
            RdgVersioningPolicy::RetainVersion => self.manifest.same_version(
                self.comm.num_hosts(),
                metadata.policy_id,
                metadata.transposed,
                self.lineage.clone(),
            ),
            RdgVersioningPolicy::NextVersion => self.manifest.next_version(
                self.comm.num_hosts(),
                metadata.policy_id,
                metadata.transposed,
                self.lineage.clone(),
            ),
        };

        self.part_header.update_storage_format_version();

        let mut group = WriteGroup::new();
        for scope in [Scope::Node, Scope::Edge, Scope::Partition] {
            self.write_dirty_properties(scope, &mut group)?;
        }
        fault_point(FaultSensitivity::Normal);

        self.part_header.node_prop_info_list = self.node_properties.info_list().to_vec();
        self.part_header.edge_prop_info_list = self.edge_properties.info_list().to_vec();
        self.part_header.part_prop_info_list = self.part_properties.info_list().to_vec();

        self.write_topologies(&mut group);
        self.write_type_id_arrays(node_type_ids_update, edge_type_ids_update, &mut group)?;

        self.part_header.node_entity_type_manager = self.node_type_manager.clone();
        self.part_header.edge_entity_type_manager = self.edge_type_manager.clone();

        let header_path = next_manifest.self_partition_file_name(self.partition_id);
        group.start_store(
            self.store.clone(),
            header_path,
            self.part_header.to_bytes()?,
            self.config.store,
        );

        fault_point(FaultSensitivity::High);
        group
            .finish()
            .await
            .map_err(|e| e.with_context("at least one async write failed"))?;

        fault_point(FaultSensitivity::High);
        self.comm.barrier().await;

        fault_point(FaultSensitivity::High);
        let publish_result = if self.comm.is_host_zero() {
            next_manifest.save(&self.store, &self.config.store).await
        } else {
            Ok(())
        };
        // Every host leaves the commit together, with the manifest visible,
        // before the publish outcome is surfaced.
        self.comm.barrier().await;
        publish_result?;

        self.manifest = next_manifest;
        Ok(())
    }

    fn write_dirty_properties(&mut self, scope: Scope, group: &mut WriteGroup) -> Result<()> {
        let store = self.store.clone();
        let dir = self.dir.clone();
        let store_config = self.config.store;
        let table = self.table_mut(scope);
        for name in table.dirty_names() {
            let column = table.column(&name).ok_or_else(|| {
                RdgError::assertion_failed(format!("dirty property '{name}' has no loaded column"))
            })?;
            let bytes = columnar::encode_column(column)?;
            let file_name = columnar::rand_property_file_name(&name);
            group.start_store(store.clone(), dir.child(file_name.as_str()), bytes, store_config);
            table
                .info_mut(&name)
                .ok_or_else(|| RdgError::assertion_failed(format!("no info for '{name}'")))?
                .was_written(&file_name)?;
        }
        Ok(())
    }

    fn write_topologies(&mut self, group: &mut WriteGroup) {
        let canonical = self.view_cache.default_topology();
        let canonical_record = RdgTopology::new(
            TopologyKind::Csr,
            TransposeKind::No,
            self.view_cache.default_sort_state(),
            NodeSortKind::Any,
            canonical.num_nodes() as u64,
            canonical.num_edges() as u64,
            canonical.adj_indices().to_vec(),
            canonical.dests().to_vec(),
            (!canonical.edge_prop_indices().is_empty())
                .then(|| canonical.edge_prop_indices().to_vec()),
            (!canonical.node_prop_indices().is_empty())
                .then(|| canonical.node_prop_indices().to_vec()),
            None,
        );

        let mut entries = Vec::new();
        for record in std::iter::once(canonical_record).chain(self.view_cache.to_records()) {
            let file_name = columnar::rand_topology_file_name();
            entries.push(TopologyEntry {
                path: file_name.clone(),
                kind: record.kind(),
                transpose: record.transpose(),
                edge_sort: record.edge_sort(),
                node_sort: record.node_sort(),
                num_nodes: record.num_nodes(),
                num_edges: record.num_edges(),
            });
            group.start_store(
                self.store.clone(),
                self.dir.child(file_name.as_str()),
                record.to_bytes(),
                self.config.store,
            );
        }
        self.part_header.topology_entries = entries;
    }

    fn write_type_id_arrays(
        &mut self,
        node_update: Option<Vec<EntityTypeId>>,
        edge_update: Option<Vec<EntityTypeId>>,
        group: &mut WriteGroup,
    ) -> Result<()> {
        let node_updated = node_update.is_some();
        let edge_updated = edge_update.is_some();
        if let Some(update) = node_update {
            if update.len() != self.num_nodes() {
                return Err(RdgError::invalid_argument(
                    "node entity type id update has wrong length",
                ));
            }
            self.node_type_ids = update;
        }
        if let Some(update) = edge_update {
            if update.len() != self.num_edges() {
                return Err(RdgError::invalid_argument(
                    "edge entity type id update has wrong length",
                ));
            }
            self.edge_type_ids = update;
        }

        // A caller update or a never-persisted array writes a fresh file;
        // otherwise the existing reference is carried forward.
        if node_updated || self.part_header.node_entity_type_id_array_path.is_empty() {
            let file_name = columnar::rand_type_id_array_file_name("node");
            fault_point(FaultSensitivity::Normal);
            group.start_store(
                self.store.clone(),
                self.dir.child(file_name.as_str()),
                columnar::encode_type_id_array(&self.node_type_ids),
                self.config.store,
            );
            self.part_header.node_entity_type_id_array_path = file_name;
        }
        if edge_updated || self.part_header.edge_entity_type_id_array_path.is_empty() {
            let file_name = columnar::rand_type_id_array_file_name("edge");
            fault_point(FaultSensitivity::Normal);
            group.start_store(
                self.store.clone(),
                self.dir.child(file_name.as_str()),
                columnar::encode_type_id_array(&self.edge_type_ids),
                self.config.store,
            );
            self.part_header.edge_entity_type_id_array_path = file_name;
        }
        Ok(())
    }

    fn table(&self, scope: Scope) -> &PropertyTable {
        match scope {
            Scope::Node => &self.node_properties,
            Scope::Edge => &self.edge_properties,
            Scope::Partition => &self.part_properties,
        }
    }

    fn table_mut(&mut self, scope: Scope) -> &mut PropertyTable {
        match scope {
            Scope::Node => &mut self.node_properties,
            Scope::Edge => &mut self.edge_properties,
            Scope::Partition => &mut self.part_properties,
        }
    }

    async fn load_property(
        &mut self,
        scope: Scope,
        name: &str,
        at: Option<usize>,
    ) -> Result<()> {
        let (path, cached) = {
            let table = self.table(scope);
            let info = table
                .info(name)
                .ok_or_else(|| RdgError::property_not_found(name, table.scope()))?;
            if !info.is_absent() {
                return Err(RdgError::invalid_argument(format!(
                    "property '{name}' already loaded"
                )));
            }
            let cached = scope.cache_scope().and_then(|cache_scope| {
                self.property_cache
                    .as_ref()
                    .and_then(|cache| cache.get(&CacheKey::new(cache_scope, name)))
            });
            (info.path().map(str::to_string), cached)
        };

        let column = match cached {
            Some(column) => {
                debug!(name, "property served from cache");
                column
            }
            None => {
                let path = path.ok_or_else(|| {
                    RdgError::assertion_failed(format!(
                        "absent property '{name}' has no storage path"
                    ))
                })?;
                let bytes =
                    store_util::get_bytes(&self.store, &self.dir.child(path.as_str()), &self.config.store)
                        .await
                        .map_err(|e| e.with_context(format!("loading property '{name}'")))?;
                columnar::decode_column(name, bytes)?
            }
        };

        let table = self.table_mut(scope);
        table.attach(column, at)?;
        table
            .info_mut(name)
            .ok_or_else(|| RdgError::property_not_found(name, "loaded"))?
            .was_loaded()
    }

    async fn unload_property(&mut self, scope: Scope, name: &str) -> Result<()> {
        let state = {
            let table = self.table(scope);
            let Some(info) = table.info(name) else {
                return Err(RdgError::property_not_found(name, table.scope()));
            };
            info.state()
        };
        // Already absent: nothing to release.
        if state == PropState::Absent {
            return Ok(());
        }

        let column = self.table_mut(scope).detach(name)?;

        if state == PropState::Dirty {
            let bytes = columnar::encode_column(&column)?;
            let file_name = columnar::rand_property_file_name(name);
            store_util::put_bytes(
                &self.store,
                &self.dir.child(file_name.as_str()),
                bytes,
                &self.config.store,
            )
            .await
            .map_err(|e| e.with_context(format!("flushing property '{name}'")))?;
            self.table_mut(scope)
                .info_mut(name)
                .ok_or_else(|| RdgError::assertion_failed(format!("no info for '{name}'")))?
                .was_written(&file_name)?;
        }

        self.table_mut(scope)
            .info_mut(name)
            .ok_or_else(|| RdgError::assertion_failed(format!("no info for '{name}'")))?
            .was_unloaded()?;

        if let Some(cache_scope) = scope.cache_scope()
            && let Some(cache) = &self.property_cache
        {
            cache.insert(CacheKey::new(cache_scope, name), column);
        }
        Ok(())
    }

    fn storage_location(&self, scope: Scope, name: &str) -> Result<Path> {
        let table = self.table(scope);
        let info = table
            .info(name)
            .ok_or_else(|| RdgError::property_not_found(name, table.scope()))?;
        if info.is_dirty() {
            return Err(RdgError::assertion_failed(format!(
                "property '{name}' exists but is dirty"
            )));
        }
        let path = info.path().ok_or_else(|| {
            RdgError::assertion_failed(format!("property '{name}' was never persisted"))
        })?;
        Ok(self.dir.child(path))
    }

    // ---- node properties -------------------------------------------------

    pub fn add_node_property(&mut self, column: PropertyColumn) -> Result<()> {
        self.node_properties.add(column)
    }

    pub fn upsert_node_property(&mut self, column: PropertyColumn) -> Result<()> {
        self.node_properties.upsert(column)
    }

    pub fn remove_node_property(&mut self, name: &str) -> Result<()> {
        self.node_properties.remove(name)
    }

    pub async fn load_node_property(&mut self, name: &str, at: Option<usize>) -> Result<()> {
        self.load_property(Scope::Node, name, at).await
    }

    pub async fn unload_node_property(&mut self, name: &str) -> Result<()> {
        self.unload_property(Scope::Node, name).await
    }

    pub fn node_property(&self, name: &str) -> Option<&PropertyColumn> {
        self.node_properties.column(name)
    }

    pub fn node_property_info(&self, name: &str) -> Option<&PropStorageInfo> {
        self.node_properties.info(name)
    }

    pub fn node_property_storage_location(&self, name: &str) -> Result<Path> {
        self.storage_location(Scope::Node, name)
    }

    pub fn list_full_node_properties(&self) -> Vec<String> {
        self.node_properties.list_full()
    }

    pub fn list_loaded_node_properties(&self) -> Vec<String> {
        self.node_properties.list_loaded()
    }

    // ---- edge properties -------------------------------------------------

    pub fn add_edge_property(&mut self, column: PropertyColumn) -> Result<()> {
        self.edge_properties.add(column)
    }

    pub fn upsert_edge_property(&mut self, column: PropertyColumn) -> Result<()> {
        self.edge_properties.upsert(column)
    }

    pub fn remove_edge_property(&mut self, name: &str) -> Result<()> {
        self.edge_properties.remove(name)
    }

    pub async fn load_edge_property(&mut self, name: &str, at: Option<usize>) -> Result<()> {
        self.load_property(Scope::Edge, name, at).await
    }

    pub async fn unload_edge_property(&mut self, name: &str) -> Result<()> {
        self.unload_property(Scope::Edge, name).await
    }

    pub fn edge_property(&self, name: &str) -> Option<&PropertyColumn> {
        self.edge_properties.column(name)
    }

    pub fn edge_property_info(&self, name: &str) -> Option<&PropStorageInfo> {
        self.edge_properties.info(name)
    }

    pub fn edge_property_storage_location(&self, name: &str) -> Result<Path> {
        self.storage_location(Scope::Edge, name)
    }

    pub fn list_full_edge_properties(&self) -> Vec<String> {
        self.edge_properties.list_full()
    }

    pub fn list_loaded_edge_properties(&self) -> Vec<String> {
        self.edge_properties.list_loaded()
    }

    // ---- partition sidecar arrays ---------------------------------------

    pub fn upsert_partition_property(&mut self, column: PropertyColumn) -> Result<()> {
        self.part_properties.upsert(column)
    }

    pub fn partition_property(&self, name: &str) -> Option<&PropertyColumn> {
        self.part_properties.column(name)
    }

    pub fn list_full_partition_properties(&self) -> Vec<String> {
        self.part_properties.list_full()
    }

    /// Per-remote-host lists of nodes this partition masters.
    pub fn set_master_nodes(&mut self, columns: Vec<PropertyColumn>) -> Result<()> {
        self.set_indexed_sidecar(MASTER_NODES_PREFIX, columns)
    }

    pub fn master_nodes(&self) -> Vec<&PropertyColumn> {
        self.indexed_sidecar(MASTER_NODES_PREFIX)
    }

    /// Per-remote-host lists of nodes this partition mirrors.
    pub fn set_mirror_nodes(&mut self, columns: Vec<PropertyColumn>) -> Result<()> {
        self.set_indexed_sidecar(MIRROR_NODES_PREFIX, columns)
    }

    pub fn mirror_nodes(&self) -> Vec<&PropertyColumn> {
        self.indexed_sidecar(MIRROR_NODES_PREFIX)
    }

    pub fn set_host_to_owned_global_node_ids(&mut self, column: PropertyColumn) -> Result<()> {
        self.part_properties
            .upsert(column.renamed(HOST_TO_OWNED_GLOBAL_NODE_IDS))
    }

    pub fn host_to_owned_global_node_ids(&self) -> Option<&PropertyColumn> {
        self.part_properties.column(HOST_TO_OWNED_GLOBAL_NODE_IDS)
    }

    pub fn set_host_to_owned_global_edge_ids(&mut self, column: PropertyColumn) -> Result<()> {
        self.part_properties
            .upsert(column.renamed(HOST_TO_OWNED_GLOBAL_EDGE_IDS))
    }

    pub fn host_to_owned_global_edge_ids(&self) -> Option<&PropertyColumn> {
        self.part_properties.column(HOST_TO_OWNED_GLOBAL_EDGE_IDS)
    }

    pub fn set_local_to_user_id(&mut self, column: PropertyColumn) -> Result<()> {
        self.part_properties.upsert(column.renamed(LOCAL_TO_USER_ID))
    }

    pub fn local_to_user_id(&self) -> Option<&PropertyColumn> {
        self.part_properties.column(LOCAL_TO_USER_ID)
    }

    pub fn set_local_to_global_id(&mut self, column: PropertyColumn) -> Result<()> {
        self.part_properties.upsert(column.renamed(LOCAL_TO_GLOBAL_ID))
    }

    pub fn local_to_global_id(&self) -> Option<&PropertyColumn> {
        self.part_properties.column(LOCAL_TO_GLOBAL_ID)
    }

    fn set_indexed_sidecar(
        &mut self,
        prefix: &str,
        columns: Vec<PropertyColumn>,
    ) -> Result<()> {
        for (i, column) in columns.into_iter().enumerate() {
            self.part_properties
                .upsert(column.renamed(format!("{prefix}{i}")))?;
        }
        Ok(())
    }

    fn indexed_sidecar(&self, prefix: &str) -> Vec<&PropertyColumn> {
        // Reconstructs host order from the numeric suffix.
        let mut found: Vec<(usize, &PropertyColumn)> = self
            .part_properties
            .list_full()
            .into_iter()
            .filter_map(|name| {
                let idx: usize = name.strip_prefix(prefix)?.parse().ok()?;
                Some((idx, self.part_properties.column(&name)?))
            })
            .collect();
        found.sort_by_key(|(idx, _)| *idx);
        found.into_iter().map(|(_, column)| column).collect()
    }

    // ---- topology views --------------------------------------------------

    pub fn default_topology(&self) -> Arc<CsrTopology> {
        self.view_cache.default_topology()
    }

    pub fn view_cache(&self) -> &PgViewCache {
        &self.view_cache
    }

    pub fn reseat_default_topology(
        &mut self,
        topology: Arc<CsrTopology>,
        sort_state: EdgeSortKind,
    ) -> bool {
        self.view_cache.reseat_default(topology, sort_state)
    }

    pub fn edge_shuffle_view(
        &mut self,
        transpose: TransposeKind,
        edge_sort: EdgeSortKind,
    ) -> Result<Arc<EdgeShuffleTopology>> {
        let view = GraphView {
            node_type_ids: &self.node_type_ids,
            edge_type_ids: &self.edge_type_ids,
        };
        self.view_cache
            .build_or_get_edge_shuffle(&view, &mut self.topologies, transpose, edge_sort)
    }

    pub fn pop_edge_shuffle_view(
        &mut self,
        transpose: TransposeKind,
        edge_sort: EdgeSortKind,
    ) -> Result<Arc<EdgeShuffleTopology>> {
        let view = GraphView {
            node_type_ids: &self.node_type_ids,
            edge_type_ids: &self.edge_type_ids,
        };
        self.view_cache
            .pop_edge_shuffle(&view, &mut self.topologies, transpose, edge_sort)
    }

    pub fn shuffle_view(
        &mut self,
        transpose: TransposeKind,
        node_sort: NodeSortKind,
        edge_sort: EdgeSortKind,
    ) -> Result<Arc<ShuffleTopology>> {
        let view = GraphView {
            node_type_ids: &self.node_type_ids,
            edge_type_ids: &self.edge_type_ids,
        };
        self.view_cache.build_or_get_shuffle(
            &view,
            &mut self.topologies,
            transpose,
            node_sort,
            edge_sort,
        )
    }

    pub fn edge_type_aware_view(
        &mut self,
        transpose: TransposeKind,
    ) -> Result<Arc<EdgeTypeAwareTopology>> {
        let view = GraphView {
            node_type_ids: &self.node_type_ids,
            edge_type_ids: &self.edge_type_ids,
        };
        self.view_cache
            .build_or_get_edge_type_aware(&view, &mut self.topologies, transpose)
    }

    pub fn drop_all_topologies(&mut self) {
        self.view_cache.drop_all();
        self.topologies.clear();
    }

    // ---- misc accessors --------------------------------------------------

    pub fn num_nodes(&self) -> usize {
        self.view_cache.default_topology_ref().num_nodes()
    }

    pub fn num_edges(&self) -> usize {
        self.view_cache.default_topology_ref().num_edges()
    }

    pub fn current_version(&self) -> u64 {
        self.manifest.version()
    }

    pub fn manifest(&self) -> &RdgManifest {
        &self.manifest
    }

    pub fn lineage(&self) -> &[String] {
        &self.lineage
    }

    pub fn part_metadata(&self) -> &PartitionMetadata {
        &self.part_header.metadata
    }

    pub fn set_part_metadata(&mut self, metadata: PartitionMetadata) {
        self.part_header.metadata = metadata;
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn partition_id(&self) -> Host {
        self.partition_id
    }

    pub fn node_type_ids(&self) -> &[EntityTypeId] {
        &self.node_type_ids
    }

    pub fn edge_type_ids(&self) -> &[EntityTypeId] {
        &self.edge_type_ids
    }

    pub fn node_entity_type_manager(&self) -> &EntityTypeManager {
        &self.node_type_manager
    }

    pub fn edge_entity_type_manager(&self) -> &EntityTypeManager {
        &self.edge_type_manager
    }

    pub fn set_entity_type_managers(
        &mut self,
        node_manager: EntityTypeManager,
        edge_manager: EntityTypeManager,
    ) {
        self.node_type_manager = node_manager;
        self.edge_type_manager = edge_manager;
    }

    pub fn property_cache(&self) -> Option<&Arc<PropertyCache<PropertyColumn>>> {
        self.property_cache.as_ref()
    }
}

fn make_property_cache(config: &RdgConfig) -> Option<Arc<PropertyCache<PropertyColumn>>> {
    match config.property_cache {
        CacheConfig::Disabled => None,
        CacheConfig::Lru { max_entries } => Some(Arc::new(PropertyCache::new(CachePolicy::Lru {
            max_entries,
        }))),
        CacheConfig::SizeBudget { max_bytes } => {
            Some(Arc::new(PropertyCache::new(CachePolicy::SizeBudget {
                max_bytes,
                sizeof: Box::new(|column: &PropertyColumn| column.num_bytes()),
            })))
        }
    }
}

fn select_properties(table: &PropertyTable, requested: Option<&[String]>) -> Result<Vec<String>> {
    match requested {
        None => Ok(table.list_full()),
        Some(names) => {
            for name in names {
                if table.info(name).is_none() {
                    return Err(RdgError::property_not_found(name.clone(), table.scope()));
                }
            }
            Ok(names.to_vec())
        }
    }
}
