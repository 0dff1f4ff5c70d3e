// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

use rdg_common::{RdgError, Result};
use serde::{Deserialize, Serialize};

/// Whether a derived topology reverses the canonical edge direction.
/// `Any` is a wildcard used when matching cached or stored views.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransposeKind {
    No,
    Yes,
    Any,
}

impl TransposeKind {
    pub fn matches(self, state: TransposeKind) -> bool {
        self == TransposeKind::Any || state == TransposeKind::Any || self == state
    }

    pub fn as_u8(self) -> u8 {
        match self {
            TransposeKind::No => 0,
            TransposeKind::Yes => 1,
            TransposeKind::Any => 2,
        }
    }

    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(TransposeKind::No),
            1 => Ok(TransposeKind::Yes),
            2 => Ok(TransposeKind::Any),
            _ => Err(RdgError::SchemaMismatch(format!(
                "unknown transpose kind {v}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeSortKind {
    Any,
    SortedByDestId,
    SortedByTypeThenDest,
}

impl EdgeSortKind {
    pub fn matches(self, state: EdgeSortKind) -> bool {
        self == EdgeSortKind::Any || self == state
    }

    pub fn as_u8(self) -> u8 {
        match self {
            EdgeSortKind::Any => 0,
            EdgeSortKind::SortedByDestId => 1,
            EdgeSortKind::SortedByTypeThenDest => 2,
        }
    }

    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(EdgeSortKind::Any),
            1 => Ok(EdgeSortKind::SortedByDestId),
            2 => Ok(EdgeSortKind::SortedByTypeThenDest),
            _ => Err(RdgError::SchemaMismatch(format!(
                "unknown edge sort kind {v}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeSortKind {
    Any,
    SortedByDegree,
    SortedByNodeType,
}

impl NodeSortKind {
    pub fn matches(self, state: NodeSortKind) -> bool {
        self == NodeSortKind::Any || self == state
    }

    pub fn as_u8(self) -> u8 {
        match self {
            NodeSortKind::Any => 0,
            NodeSortKind::SortedByDegree => 1,
            NodeSortKind::SortedByNodeType => 2,
        }
    }

    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(NodeSortKind::Any),
            1 => Ok(NodeSortKind::SortedByDegree),
            2 => Ok(NodeSortKind::SortedByNodeType),
            _ => Err(RdgError::SchemaMismatch(format!(
                "unknown node sort kind {v}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TopologyKind {
    Csr,
    EdgeShuffle,
    Shuffle,
    EdgeTypeAware,
}

impl TopologyKind {
    pub fn as_u8(self) -> u8 {
        match self {
            TopologyKind::Csr => 0,
            TopologyKind::EdgeShuffle => 1,
            TopologyKind::Shuffle => 2,
            TopologyKind::EdgeTypeAware => 3,
        }
    }

    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(TopologyKind::Csr),
            1 => Ok(TopologyKind::EdgeShuffle),
            2 => Ok(TopologyKind::Shuffle),
            3 => Ok(TopologyKind::EdgeTypeAware),
            _ => Err(RdgError::SchemaMismatch(format!(
                "unknown topology kind {v}"
            ))),
        }
    }
}
