// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

pub mod bitset;
pub mod config;
pub mod entity_type;
pub mod error;

// Re-exports for convenience
pub use bitset::{DynamicBitset, EMPTY_BITSET};
pub use config::RdgConfig;
pub use entity_type::{EntityTypeManager, TypeNameSet, UNKNOWN_ENTITY_TYPE};
pub use error::{RdgError, Result};

/// Topology-local node id.
pub type Node = u32;
/// Topology-local edge id (an index into the destination array).
pub type Edge = u64;
/// Index into a property column. Derived topologies rearrange edges and
/// nodes; the property index maps a topology position back to its column row.
pub type PropertyIndex = u64;
/// Entity type id assigned by an [`EntityTypeManager`].
pub type EntityTypeId = u16;
/// Host rank within the communication backend.
pub type Host = u32;
