// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

pub mod cache;
pub mod properties;
pub mod storage;
pub mod topology;

pub use cache::{CacheKey, CachePolicy, PropertyCache, PropertyScope};
pub use properties::storage_info::{PropState, PropStorageInfo};
pub use properties::table::{PropertyColumn, PropertyTable};
pub use storage::comm::{CommBackend, LocalComm, SharedComm};
pub use storage::manifest::RdgManifest;
pub use storage::part_header::{PartitionHeader, PartitionMetadata};
pub use storage::rdg::{Rdg, RdgLoadOptions, RdgVersioningPolicy};
pub use storage::topologies::TopologyManager;
pub use storage::topology_record::RdgTopology;
pub use topology::csr::CsrTopology;
pub use topology::edge_shuffle::EdgeShuffleTopology;
pub use topology::edge_type_aware::EdgeTypeAwareTopology;
pub use topology::edge_type_index::EdgeTypeIndex;
pub use topology::shuffle::ShuffleTopology;
pub use topology::tags::{EdgeSortKind, NodeSortKind, TopologyKind, TransposeKind};
pub use topology::view_cache::{GraphView, PgViewCache};
