// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! On-disk form of one derived topology: the tag tuple plus its arrays in a
//! little-endian binary layout. A *shadow* record carries only the tag
//! tuple and is used as a match key against stored records.

use crate::topology::tags::{EdgeSortKind, NodeSortKind, TopologyKind, TransposeKind};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use rdg_common::{Edge, EntityTypeId, Node, PropertyIndex, RdgError, Result};

const TOPOLOGY_MAGIC: u32 = 0x5244_4754; // "RDGT"
const TOPOLOGY_FORMAT_VERSION: u32 = 1;

const FLAG_EDGE_PROP_INDICES: u32 = 1 << 0;
const FLAG_NODE_PROP_INDICES: u32 = 1 << 1;
const FLAG_CONDENSED_TYPE_MAP: u32 = 1 << 2;

#[derive(Clone, Debug)]
pub struct RdgTopology {
    kind: TopologyKind,
    transpose: TransposeKind,
    edge_sort: EdgeSortKind,
    node_sort: NodeSortKind,
    num_nodes: u64,
    num_edges: u64,
    adj_indices: Vec<Edge>,
    dests: Vec<Node>,
    edge_prop_indices: Option<Vec<PropertyIndex>>,
    node_prop_indices: Option<Vec<PropertyIndex>>,
    condensed_type_map: Option<Vec<EntityTypeId>>,
}

impl RdgTopology {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: TopologyKind,
        transpose: TransposeKind,
        edge_sort: EdgeSortKind,
        node_sort: NodeSortKind,
        num_nodes: u64,
        num_edges: u64,
        adj_indices: Vec<Edge>,
        dests: Vec<Node>,
        edge_prop_indices: Option<Vec<PropertyIndex>>,
        node_prop_indices: Option<Vec<PropertyIndex>>,
        condensed_type_map: Option<Vec<EntityTypeId>>,
    ) -> Self {
        Self {
            kind,
            transpose,
            edge_sort,
            node_sort,
            num_nodes,
            num_edges,
            adj_indices,
            dests,
            edge_prop_indices,
            node_prop_indices,
            condensed_type_map,
        }
    }

    /// A data-less match key.
    pub fn shadow(
        kind: TopologyKind,
        transpose: TransposeKind,
        edge_sort: EdgeSortKind,
        node_sort: NodeSortKind,
    ) -> Self {
        Self::new(
            kind,
            transpose,
            edge_sort,
            node_sort,
            0,
            0,
            Vec::new(),
            Vec::new(),
            None,
            None,
            None,
        )
    }

    /// Whether this record satisfies the `shadow` request. The shadow's
    /// wildcard kinds match any state; concrete kinds must match exactly.
    pub fn matches(&self, shadow: &RdgTopology) -> bool {
        self.kind == shadow.kind
            && shadow.transpose.matches(self.transpose)
            && shadow.edge_sort.matches(self.edge_sort)
            && shadow.node_sort.matches(self.node_sort)
    }

    /// Whether two records describe the same view (exact tag equality).
    pub fn same_tag(&self, other: &RdgTopology) -> bool {
        self.kind == other.kind
            && self.transpose == other.transpose
            && self.edge_sort == other.edge_sort
            && self.node_sort == other.node_sort
    }

    pub fn kind(&self) -> TopologyKind {
        self.kind
    }

    pub fn transpose(&self) -> TransposeKind {
        self.transpose
    }

    pub fn edge_sort(&self) -> EdgeSortKind {
        self.edge_sort
    }

    pub fn node_sort(&self) -> NodeSortKind {
        self.node_sort
    }

    pub fn num_nodes(&self) -> u64 {
        self.num_nodes
    }

    pub fn num_edges(&self) -> u64 {
        self.num_edges
    }

    pub fn adj_indices(&self) -> &[Edge] {
        &self.adj_indices
    }

    pub fn dests(&self) -> &[Node] {
        &self.dests
    }

    pub fn condensed_type_map(&self) -> Option<&[EntityTypeId]> {
        self.condensed_type_map.as_deref()
    }

    /// Consume the record, releasing its arrays to the caller.
    #[allow(clippy::type_complexity)]
    pub fn into_arrays(
        self,
    ) -> (
        Vec<Edge>,
        Vec<Node>,
        Option<Vec<PropertyIndex>>,
        Option<Vec<PropertyIndex>>,
        Option<Vec<EntityTypeId>>,
    ) {
        (
            self.adj_indices,
            self.dests,
            self.edge_prop_indices,
            self.node_prop_indices,
            self.condensed_type_map,
        )
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(
            48 + self.adj_indices.len() * 8
                + self.dests.len() * 4
                + self.edge_prop_indices.as_ref().map_or(0, |v| v.len() * 8)
                + self.node_prop_indices.as_ref().map_or(0, |v| v.len() * 8)
                + self.condensed_type_map.as_ref().map_or(0, |v| v.len() * 2),
        );
        buf.put_u32_le(TOPOLOGY_MAGIC);
        buf.put_u32_le(TOPOLOGY_FORMAT_VERSION);
        buf.put_u8(self.kind.as_u8());
        buf.put_u8(self.transpose.as_u8());
        buf.put_u8(self.edge_sort.as_u8());
        buf.put_u8(self.node_sort.as_u8());
        let mut flags = 0u32;
        if self.edge_prop_indices.is_some() {
            flags |= FLAG_EDGE_PROP_INDICES;
        }
        if self.node_prop_indices.is_some() {
            flags |= FLAG_NODE_PROP_INDICES;
        }
        if self.condensed_type_map.is_some() {
            flags |= FLAG_CONDENSED_TYPE_MAP;
        }
        buf.put_u32_le(flags);
        buf.put_u64_le(self.num_nodes);
        buf.put_u64_le(self.num_edges);
        buf.put_u64_le(self.adj_indices.len() as u64);
        buf.put_u32_le(
            self.condensed_type_map
                .as_ref()
                .map_or(0, |map| map.len() as u32),
        );
        for &v in &self.adj_indices {
            buf.put_u64_le(v);
        }
        for &v in &self.dests {
            buf.put_u32_le(v);
        }
        if let Some(eidx) = &self.edge_prop_indices {
            for &v in eidx {
                buf.put_u64_le(v);
            }
        }
        if let Some(nidx) = &self.node_prop_indices {
            for &v in nidx {
                buf.put_u64_le(v);
            }
        }
        if let Some(map) = &self.condensed_type_map {
            for &v in map {
                buf.put_u16_le(v);
            }
        }
        buf.freeze()
    }

    pub fn from_bytes(mut bytes: Bytes) -> Result<Self> {
        // fixed header: magic, version, four tag bytes, flags, counts,
        // adj length, type map length
        const HEADER_BYTES: usize = 4 + 4 + 4 + 4 + 8 + 8 + 8 + 4;
        let truncated = || RdgError::SchemaMismatch("truncated topology record".into());
        if bytes.remaining() < HEADER_BYTES {
            return Err(truncated());
        }
        let magic = bytes.get_u32_le();
        if magic != TOPOLOGY_MAGIC {
            return Err(RdgError::SchemaMismatch(format!(
                "bad topology record magic {magic:#x}"
            )));
        }
        let version = bytes.get_u32_le();
        if version != TOPOLOGY_FORMAT_VERSION {
            return Err(RdgError::SchemaMismatch(format!(
                "unsupported topology record version {version}"
            )));
        }
        let kind = TopologyKind::from_u8(bytes.get_u8())?;
        let transpose = TransposeKind::from_u8(bytes.get_u8())?;
        let edge_sort = EdgeSortKind::from_u8(bytes.get_u8())?;
        let node_sort = NodeSortKind::from_u8(bytes.get_u8())?;
        let flags = bytes.get_u32_le();
        let num_nodes = bytes.get_u64_le();
        let num_edges = bytes.get_u64_le();
        let adj_len = bytes.get_u64_le() as usize;
        let type_map_len = bytes.get_u32_le() as usize;

        let mut expected = adj_len * 8 + num_edges as usize * 4;
        if flags & FLAG_EDGE_PROP_INDICES != 0 {
            expected += num_edges as usize * 8;
        }
        if flags & FLAG_NODE_PROP_INDICES != 0 {
            expected += num_nodes as usize * 8;
        }
        if flags & FLAG_CONDENSED_TYPE_MAP != 0 {
            expected += type_map_len * 2;
        }
        if bytes.remaining() < expected {
            return Err(truncated());
        }

        let adj_indices: Vec<Edge> = (0..adj_len).map(|_| bytes.get_u64_le()).collect();
        let dests: Vec<Node> = (0..num_edges).map(|_| bytes.get_u32_le()).collect();
        let edge_prop_indices = (flags & FLAG_EDGE_PROP_INDICES != 0)
            .then(|| (0..num_edges).map(|_| bytes.get_u64_le()).collect());
        let node_prop_indices = (flags & FLAG_NODE_PROP_INDICES != 0)
            .then(|| (0..num_nodes).map(|_| bytes.get_u64_le()).collect());
        let condensed_type_map = (flags & FLAG_CONDENSED_TYPE_MAP != 0)
            .then(|| (0..type_map_len).map(|_| bytes.get_u16_le()).collect());

        Ok(Self {
            kind,
            transpose,
            edge_sort,
            node_sort,
            num_nodes,
            num_edges,
            adj_indices,
            dests,
            edge_prop_indices,
            node_prop_indices,
            condensed_type_map,
        })
    }
}
