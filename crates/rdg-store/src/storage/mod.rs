// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

pub mod columnar;
pub mod comm;
pub mod fault;
pub mod manifest;
pub mod part_header;
pub mod rdg;
pub mod store_util;
pub mod topologies;
pub mod topology_record;
pub mod write_group;

pub use comm::{CommBackend, LocalComm, SharedComm};
pub use manifest::RdgManifest;
pub use part_header::{PartitionHeader, PartitionMetadata};
pub use rdg::{Rdg, RdgLoadOptions, RdgVersioningPolicy};
pub use topologies::TopologyManager;
pub use topology_record::RdgTopology;
pub use write_group::{ReadGroup, WriteGroup};
