// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Topology with O(1) slicing of a node's edges by edge type.
//!
//! Requires a seed sorted by (type, dest). `per_type_adj` holds, for every
//! node, `K` entries where entry `t` is the end of the type-`t` slice; the
//! start of slice `t` is the previous entry (the row begin for `t == 0`).
//! The last entry of a node's block equals the row end, so the slices
//! partition the row.

use crate::storage::topology_record::RdgTopology;
use crate::topology::edge_shuffle::EdgeShuffleTopology;
use crate::topology::edge_type_index::EdgeTypeIndex;
use crate::topology::tags::{EdgeSortKind, NodeSortKind, TopologyKind, TransposeKind};
use rayon::prelude::*;
use rdg_common::{Edge, EntityTypeId, Node, PropertyIndex, RdgError, Result};
use std::ops::Range;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct EdgeTypeAwareTopology {
    base: EdgeShuffleTopology,
    edge_type_index: Arc<EdgeTypeIndex>,
    per_type_adj: Vec<Edge>,
}

impl EdgeTypeAwareTopology {
    /// Build the per-(node, type) adjacency index from a type-sorted seed.
    pub fn make_from(
        edge_type_index: Arc<EdgeTypeIndex>,
        base: EdgeShuffleTopology,
        edge_type_ids: &[EntityTypeId],
    ) -> Result<Self> {
        if !base.has_edges_sorted_by(EdgeSortKind::SortedByTypeThenDest) {
            return Err(RdgError::assertion_failed(
                "edge type aware topology requires a seed sorted by type then dest",
            ));
        }
        let per_type_adj =
            Self::create_per_type_adjacency(&edge_type_index, &base, edge_type_ids)?;
        Ok(Self {
            base,
            edge_type_index,
            per_type_adj,
        })
    }

    fn create_per_type_adjacency(
        edge_type_index: &EdgeTypeIndex,
        base: &EdgeShuffleTopology,
        edge_type_ids: &[EntityTypeId],
    ) -> Result<Vec<Edge>> {
        if base.is_topology_empty() {
            if base.num_edges() != 0 {
                return Err(RdgError::assertion_failed(
                    "found graph with edges but no nodes",
                ));
            }
            return Ok(Vec::new());
        }
        let num_types = edge_type_index.num_unique_types();
        if num_types == 0 {
            if base.num_edges() != 0 {
                return Err(RdgError::assertion_failed(
                    "found graph with edges but no edge types",
                ));
            }
            return Ok(Vec::new());
        }

        let mut per_type_adj = vec![0 as Edge; base.num_nodes() * num_types];
        per_type_adj
            .par_chunks_mut(num_types)
            .enumerate()
            .for_each(|(node, block)| {
                let mut index = 0usize;
                for e in base.out_edges(node as Node) {
                    // The seed rearranged edges, so the type lives at the
                    // edge's property row, not its topology position.
                    let ty = edge_type_ids[base.edge_property_index(e) as usize];
                    while ty != edge_type_index.type_of_dense(index as u32) {
                        block[index] = e;
                        index += 1;
                        debug_assert!(index < num_types);
                    }
                }
                let end = base.out_edges(node as Node).end;
                while index < num_types {
                    block[index] = end;
                    index += 1;
                }
            });

        Ok(per_type_adj)
    }

    /// Rehydrate from a stored record. The record is rejected if its
    /// condensed type map or its node/edge counts do not match the live
    /// state; a stale on-disk view must never be installed.
    pub fn from_record(
        record: RdgTopology,
        edge_type_index: Arc<EdgeTypeIndex>,
        base: EdgeShuffleTopology,
    ) -> Result<Self> {
        if record.kind() != TopologyKind::EdgeTypeAware {
            return Err(RdgError::invalid_argument(format!(
                "expected an edge type aware record, found {:?}",
                record.kind()
            )));
        }
        if record.edge_sort() != EdgeSortKind::SortedByTypeThenDest {
            return Err(RdgError::assertion_failed(
                "stored edge type aware topology is not type sorted",
            ));
        }
        if !base.has_edges_sorted_by(EdgeSortKind::SortedByTypeThenDest) {
            return Err(RdgError::assertion_failed(
                "edge type aware topology requires a seed sorted by type then dest",
            ));
        }
        let stale = record.num_nodes() as usize != base.num_nodes()
            || record.num_edges() as usize != base.num_edges()
            || !record
                .condensed_type_map()
                .is_some_and(|map| edge_type_index.matches(map));
        if stale {
            return Err(RdgError::SchemaMismatch(
                "stored edge type aware topology is out of date; on-disk \
                 topologies must be invalidated when updates occur"
                    .into(),
            ));
        }
        let (per_type_adj, ..) = record.into_arrays();
        Ok(Self {
            base,
            edge_type_index,
            per_type_adj,
        })
    }

    pub fn to_record(&self) -> RdgTopology {
        RdgTopology::new(
            TopologyKind::EdgeTypeAware,
            self.base.transpose_state(),
            self.base.edge_sort_state(),
            NodeSortKind::Any,
            self.base.num_nodes() as u64,
            self.base.num_edges() as u64,
            self.per_type_adj.clone(),
            self.base.csr().dests().to_vec(),
            Some(self.base.csr().edge_prop_indices().to_vec()),
            None,
            Some(self.edge_type_index.index_to_type_map().to_vec()),
        )
    }

    /// The contiguous slice of `node`'s edges carrying entity type `ty`.
    /// Empty when the type is absent from the graph or the row.
    pub fn out_edges_for_type(&self, node: Node, ty: EntityTypeId) -> Range<Edge> {
        let row = self.base.out_edges(node);
        let Some(dense) = self.edge_type_index.dense_index(ty) else {
            return row.end..row.end;
        };
        let num_types = self.edge_type_index.num_unique_types();
        let block = node as usize * num_types;
        let start = if dense == 0 {
            row.start
        } else {
            self.per_type_adj[block + dense as usize - 1]
        };
        let end = self.per_type_adj[block + dense as usize];
        start..end
    }

    pub fn out_degree_for_type(&self, node: Node, ty: EntityTypeId) -> usize {
        let range = self.out_edges_for_type(node, ty);
        (range.end - range.start) as usize
    }

    pub fn edge_type_index(&self) -> &Arc<EdgeTypeIndex> {
        &self.edge_type_index
    }

    pub fn base(&self) -> &EdgeShuffleTopology {
        &self.base
    }

    pub fn per_type_adj(&self) -> &[Edge] {
        &self.per_type_adj
    }

    pub fn has_transpose_state(&self, kind: TransposeKind) -> bool {
        self.base.has_transpose_state(kind)
    }

    pub fn has_edges_sorted_by(&self, kind: EdgeSortKind) -> bool {
        self.base.has_edges_sorted_by(kind)
    }

    pub fn is_valid(&self) -> bool {
        self.base.is_valid()
    }

    pub fn num_nodes(&self) -> usize {
        self.base.num_nodes()
    }

    pub fn num_edges(&self) -> usize {
        self.base.num_edges()
    }

    pub fn nodes(&self) -> Range<Node> {
        self.base.nodes()
    }

    pub fn out_edges(&self, node: Node) -> Range<Edge> {
        self.base.out_edges(node)
    }

    pub fn out_edge_dst(&self, edge: Edge) -> Node {
        self.base.out_edge_dst(edge)
    }

    pub fn edge_property_index(&self, edge: Edge) -> PropertyIndex {
        self.base.edge_property_index(edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::csr::CsrTopology;

    /// Edges with types {A: 0->1, B: 0->1, A: 0->2} where A=1, B=2.
    fn two_type_seed() -> (EdgeShuffleTopology, Vec<EntityTypeId>, Arc<EdgeTypeIndex>) {
        let csr =
            CsrTopology::from_raw(vec![0, 3, 3, 3], vec![1, 1, 2], vec![], vec![]).unwrap();
        let edge_types: Vec<EntityTypeId> = vec![1, 2, 1];
        let mut seed = EdgeShuffleTopology::make_original_copy(&csr);
        seed.sort_edges_by_type_then_dest(&edge_types);
        let index = Arc::new(EdgeTypeIndex::from_edge_types(&edge_types));
        (seed, edge_types, index)
    }

    #[test]
    fn test_per_type_slices() {
        let (seed, edge_types, index) = two_type_seed();
        assert_eq!(seed.csr().dests(), &[1, 2, 1]);
        let topo = EdgeTypeAwareTopology::make_from(index, seed, &edge_types).unwrap();
        assert_eq!(topo.per_type_adj(), &[2, 3, 3, 3, 3, 3]);
        assert_eq!(topo.out_edges_for_type(0, 1), 0..2);
        assert_eq!(topo.out_edges_for_type(0, 2), 2..3);
        assert!(topo.out_edges_for_type(1, 1).is_empty());
        assert!(topo.out_edges_for_type(0, 9).is_empty());
    }

    #[test]
    fn test_slices_partition_each_row() {
        let (seed, edge_types, index) = two_type_seed();
        let topo = EdgeTypeAwareTopology::make_from(index.clone(), seed, &edge_types).unwrap();
        for n in topo.nodes() {
            let mut covered: Vec<Edge> = Vec::new();
            for dense in 0..index.num_unique_types() as u32 {
                let ty = index.type_of_dense(dense);
                covered.extend(topo.out_edges_for_type(n, ty));
            }
            let whole: Vec<Edge> = topo.out_edges(n).collect();
            assert_eq!(covered, whole);
        }
    }

    #[test]
    fn test_unsorted_seed_rejected() {
        let csr =
            CsrTopology::from_raw(vec![0, 3, 3, 3], vec![1, 1, 2], vec![], vec![]).unwrap();
        let edge_types: Vec<EntityTypeId> = vec![1, 2, 1];
        let seed = EdgeShuffleTopology::make_original_copy(&csr);
        let index = Arc::new(EdgeTypeIndex::from_edge_types(&edge_types));
        assert!(EdgeTypeAwareTopology::make_from(index, seed, &edge_types).is_err());
    }

    #[test]
    fn test_record_round_trip_and_staleness() {
        let (seed, edge_types, index) = two_type_seed();
        let topo =
            EdgeTypeAwareTopology::make_from(index.clone(), seed.clone(), &edge_types).unwrap();
        let record = topo.to_record();
        let restored =
            EdgeTypeAwareTopology::from_record(record, index, seed.clone()).unwrap();
        assert_eq!(restored.per_type_adj(), topo.per_type_adj());

        // A record whose condensed map disagrees with the live index is
        // rejected as stale.
        let stale_index = Arc::new(EdgeTypeIndex::from_edge_types(&[1]));
        let record = topo.to_record();
        assert!(matches!(
            EdgeTypeAwareTopology::from_record(record, stale_index, seed),
            Err(RdgError::SchemaMismatch(_))
        ));
    }
}
