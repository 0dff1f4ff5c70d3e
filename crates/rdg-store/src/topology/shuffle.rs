// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Node-permuted topology views. A node shuffle gathers rows in permutation
//! order and remaps destinations through the inverse permutation, so any
//! prior edge order is lost and must be re-established afterwards.

use crate::storage::topology_record::RdgTopology;
use crate::topology::csr::{row_slices_mut, CsrTopology};
use crate::topology::edge_shuffle::{
    sort_rows_by_dest, sort_rows_by_type_then_dest, EdgeShuffleTopology,
};
use crate::topology::tags::{EdgeSortKind, NodeSortKind, TopologyKind, TransposeKind};
use rayon::prelude::*;
use rdg_common::{Edge, EntityTypeId, Node, PropertyIndex, RdgError, Result};
use std::cmp::Reverse;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct ShuffleTopology {
    csr: CsrTopology,
    transpose_state: TransposeKind,
    edge_sort_state: EdgeSortKind,
    node_sort_state: NodeSortKind,
    valid: AtomicBool,
}

impl Clone for ShuffleTopology {
    fn clone(&self) -> Self {
        Self {
            csr: self.csr.clone(),
            transpose_state: self.transpose_state,
            edge_sort_state: self.edge_sort_state,
            node_sort_state: self.node_sort_state,
            valid: AtomicBool::new(self.valid.load(Ordering::Relaxed)),
        }
    }
}

impl PartialEq for ShuffleTopology {
    fn eq(&self, other: &Self) -> bool {
        self.csr == other.csr
            && self.transpose_state == other.transpose_state
            && self.edge_sort_state == other.edge_sort_state
            && self.node_sort_state == other.node_sort_state
    }
}

impl ShuffleTopology {
    /// Nodes ordered by descending out-degree (ties by node id, so the
    /// permutation is deterministic).
    pub fn make_sorted_by_degree(
        seed: &EdgeShuffleTopology,
        edge_sort_todo: EdgeSortKind,
        edge_type_ids: &[EntityTypeId],
    ) -> Result<Self> {
        Self::make_node_sorted(
            seed,
            |n| (Reverse(seed.out_degree(n)), n),
            NodeSortKind::SortedByDegree,
            edge_sort_todo,
            edge_type_ids,
        )
    }

    /// Nodes ordered by (entity type at the node's property row, node id).
    pub fn make_sorted_by_node_type(
        seed: &EdgeShuffleTopology,
        node_type_ids: &[EntityTypeId],
        edge_sort_todo: EdgeSortKind,
        edge_type_ids: &[EntityTypeId],
    ) -> Result<Self> {
        Self::make_node_sorted(
            seed,
            |n| (node_type_ids[seed.node_property_index(n) as usize], n),
            NodeSortKind::SortedByNodeType,
            edge_sort_todo,
            edge_type_ids,
        )
    }

    /// Reshuffling an already node-shuffled topology is not supported; no
    /// consumer needs it.
    pub fn make_from(_seed: &ShuffleTopology) -> Result<Self> {
        Err(RdgError::NotImplemented(
            "building a shuffle topology from another shuffle topology",
        ))
    }

    fn make_node_sorted<K, F>(
        seed: &EdgeShuffleTopology,
        key: F,
        node_sort_state: NodeSortKind,
        edge_sort_todo: EdgeSortKind,
        edge_type_ids: &[EntityTypeId],
    ) -> Result<Self>
    where
        K: Ord + Send,
        F: Fn(Node) -> K + Sync,
    {
        let num_nodes = seed.num_nodes();
        let num_edges = seed.num_edges();

        let mut perm: Vec<Node> = seed.nodes().collect();
        perm.par_sort_by_key(|&n| key(n));

        let mut inverse = vec![0 as Node; num_nodes];
        for (new_id, &old_id) in perm.iter().enumerate() {
            inverse[old_id as usize] = new_id as Node;
        }

        let mut adj = vec![0 as Edge; num_nodes + 1];
        for (new_id, &old_id) in perm.iter().enumerate() {
            adj[new_id + 1] = adj[new_id] + seed.out_degree(old_id) as Edge;
        }

        let mut dests = vec![0 as Node; num_edges];
        let mut eidx = vec![0 as PropertyIndex; num_edges];
        row_slices_mut(&adj, &mut dests, &mut eidx)
            .into_par_iter()
            .enumerate()
            .for_each(|(new_id, (d_row, e_row))| {
                let old_id = perm[new_id];
                for (k, edge) in seed.out_edges(old_id).enumerate() {
                    d_row[k] = inverse[seed.out_edge_dst(edge) as usize];
                    e_row[k] = seed.edge_property_index(edge);
                }
            });

        let nidx: Vec<PropertyIndex> = perm
            .par_iter()
            .map(|&old_id| seed.node_property_index(old_id))
            .collect();

        // The reshuffle scrambled destinations, so the requested edge order
        // is established from scratch.
        let edge_sort_state = match edge_sort_todo {
            EdgeSortKind::Any => EdgeSortKind::Any,
            EdgeSortKind::SortedByDestId => {
                sort_rows_by_dest(&adj, &mut dests, &mut eidx);
                EdgeSortKind::SortedByDestId
            }
            EdgeSortKind::SortedByTypeThenDest => {
                sort_rows_by_type_then_dest(&adj, &mut dests, &mut eidx, edge_type_ids);
                EdgeSortKind::SortedByTypeThenDest
            }
        };

        Ok(Self {
            csr: CsrTopology::from_parts(adj, dests, eidx, nidx),
            transpose_state: seed.transpose_state(),
            edge_sort_state,
            node_sort_state,
            valid: AtomicBool::new(true),
        })
    }

    pub fn from_record(record: RdgTopology) -> Result<Self> {
        if record.kind() != TopologyKind::Shuffle {
            return Err(RdgError::invalid_argument(format!(
                "expected a shuffle record, found {:?}",
                record.kind()
            )));
        }
        let transpose = record.transpose();
        let edge_sort = record.edge_sort();
        let node_sort = record.node_sort();
        let (adj, dests, eidx, nidx, _) = record.into_arrays();
        let num_edges = dests.len();
        let csr = CsrTopology::from_raw(
            adj,
            dests,
            eidx.unwrap_or_else(|| (0..num_edges as PropertyIndex).collect()),
            nidx.unwrap_or_default(),
        )?;
        Ok(Self {
            csr,
            transpose_state: transpose,
            edge_sort_state: edge_sort,
            node_sort_state: node_sort,
            valid: AtomicBool::new(true),
        })
    }

    pub fn to_record(&self) -> RdgTopology {
        RdgTopology::new(
            TopologyKind::Shuffle,
            self.transpose_state,
            self.edge_sort_state,
            self.node_sort_state,
            self.csr.num_nodes() as u64,
            self.csr.num_edges() as u64,
            self.csr.adj_indices().to_vec(),
            self.csr.dests().to_vec(),
            Some(self.csr.edge_prop_indices().to_vec()),
            Some(self.csr.node_prop_indices().to_vec()),
            None,
        )
    }

    pub fn csr(&self) -> &CsrTopology {
        &self.csr
    }

    pub fn transpose_state(&self) -> TransposeKind {
        self.transpose_state
    }

    pub fn edge_sort_state(&self) -> EdgeSortKind {
        self.edge_sort_state
    }

    pub fn node_sort_state(&self) -> NodeSortKind {
        self.node_sort_state
    }

    pub fn has_transpose_state(&self, kind: TransposeKind) -> bool {
        kind.matches(self.transpose_state)
    }

    pub fn has_edges_sorted_by(&self, kind: EdgeSortKind) -> bool {
        kind.matches(self.edge_sort_state)
    }

    pub fn has_nodes_sorted_by(&self, kind: NodeSortKind) -> bool {
        kind.matches(self.node_sort_state)
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }

    pub fn num_nodes(&self) -> usize {
        self.csr.num_nodes()
    }

    pub fn num_edges(&self) -> usize {
        self.csr.num_edges()
    }

    pub fn nodes(&self) -> Range<Node> {
        self.csr.nodes()
    }

    pub fn out_edges(&self, node: Node) -> Range<Edge> {
        self.csr.out_edges(node)
    }

    pub fn out_degree(&self, node: Node) -> usize {
        self.csr.out_degree(node)
    }

    pub fn out_edge_dst(&self, edge: Edge) -> Node {
        self.csr.out_edge_dst(edge)
    }

    pub fn edge_property_index(&self, edge: Edge) -> PropertyIndex {
        self.csr.edge_property_index(edge)
    }

    pub fn node_property_index(&self, node: Node) -> PropertyIndex {
        self.csr.node_property_index(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> EdgeShuffleTopology {
        let csr =
            CsrTopology::from_raw(vec![0, 2, 3, 4, 4], vec![1, 2, 2, 3], vec![], vec![]).unwrap();
        EdgeShuffleTopology::make_original_copy(&csr)
    }

    #[test]
    fn test_sorted_by_degree_descending() {
        let seed = diamond();
        let shuffled =
            ShuffleTopology::make_sorted_by_degree(&seed, EdgeSortKind::SortedByDestId, &[])
                .unwrap();

        // degrees: node0=2, node1=1, node2=1, node3=0 -> perm [0,1,2,3]
        assert_eq!(shuffled.node_sort_state(), NodeSortKind::SortedByDegree);
        let degrees: Vec<usize> = shuffled.nodes().map(|n| shuffled.out_degree(n)).collect();
        assert!(degrees.windows(2).all(|w| w[0] >= w[1]));
        // same edge multiset under the permutation: every original u->v maps
        // to pi(u)->pi(v)
        assert_eq!(shuffled.num_edges(), 4);
        assert_eq!(shuffled.find_node_row(0), vec![1, 2]);
    }

    #[test]
    fn test_sorted_by_node_type_groups_types() {
        let seed = diamond();
        // node types: [B, A, B, A] -> type order puts nodes 1,3 first
        let node_types: Vec<EntityTypeId> = vec![2, 1, 2, 1];
        let shuffled = ShuffleTopology::make_sorted_by_node_type(
            &seed,
            &node_types,
            EdgeSortKind::Any,
            &[],
        )
        .unwrap();
        let reordered: Vec<EntityTypeId> = shuffled
            .nodes()
            .map(|n| node_types[shuffled.node_property_index(n) as usize])
            .collect();
        assert!(reordered.is_sorted());
        assert_eq!(shuffled.node_property_index(0), 1);
        assert_eq!(shuffled.node_property_index(1), 3);
    }

    #[test]
    fn test_make_from_shuffle_is_unimplemented() {
        let seed = diamond();
        let shuffled =
            ShuffleTopology::make_sorted_by_degree(&seed, EdgeSortKind::Any, &[]).unwrap();
        assert!(matches!(
            ShuffleTopology::make_from(&shuffled),
            Err(RdgError::NotImplemented(_))
        ));
    }

    impl ShuffleTopology {
        fn find_node_row(&self, node: Node) -> Vec<Node> {
            self.out_edges(node).map(|e| self.out_edge_dst(e)).collect()
        }
    }
}
