// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Canonical compressed-sparse-row topology.
//!
//! `adj_indices` has `N + 1` entries with `adj_indices[0] == 0` and
//! `adj_indices[N] == E`; the outgoing edges of node `n` occupy
//! `dests[adj_indices[n] .. adj_indices[n + 1])`. The optional property
//! index arrays translate a topology position to the row of its property
//! column; derived views fill them in when they rearrange edges or nodes,
//! the canonical view leaves them empty (identity).

use rdg_common::{Edge, Node, PropertyIndex, RdgError, Result};
use std::ops::Range;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsrTopology {
    adj_indices: Vec<Edge>,
    dests: Vec<Node>,
    edge_prop_indices: Vec<PropertyIndex>,
    node_prop_indices: Vec<PropertyIndex>,
}

impl Default for CsrTopology {
    fn default() -> Self {
        Self {
            adj_indices: vec![0],
            dests: Vec::new(),
            edge_prop_indices: Vec::new(),
            node_prop_indices: Vec::new(),
        }
    }
}

impl CsrTopology {
    /// Build from raw arrays, validating the structural invariants.
    pub fn from_raw(
        adj_indices: Vec<Edge>,
        dests: Vec<Node>,
        edge_prop_indices: Vec<PropertyIndex>,
        node_prop_indices: Vec<PropertyIndex>,
    ) -> Result<Self> {
        if adj_indices.is_empty() || adj_indices[0] != 0 {
            return Err(RdgError::invalid_argument(
                "adjacency index must start with 0",
            ));
        }
        if adj_indices.windows(2).any(|w| w[0] > w[1]) {
            return Err(RdgError::invalid_argument(
                "adjacency index must be non-decreasing",
            ));
        }
        let num_nodes = adj_indices.len() - 1;
        let num_edges = dests.len();
        if *adj_indices.last().unwrap_or(&0) != num_edges as Edge {
            return Err(RdgError::invalid_argument(format!(
                "adjacency index ends at {} but there are {} edges",
                adj_indices.last().unwrap_or(&0),
                num_edges
            )));
        }
        if dests.iter().any(|&d| (d as usize) >= num_nodes) {
            return Err(RdgError::invalid_argument(
                "edge destination out of node range",
            ));
        }
        if !edge_prop_indices.is_empty() && edge_prop_indices.len() != num_edges {
            return Err(RdgError::invalid_argument(
                "edge property index length does not match edge count",
            ));
        }
        if !node_prop_indices.is_empty() && node_prop_indices.len() != num_nodes {
            return Err(RdgError::invalid_argument(
                "node property index length does not match node count",
            ));
        }
        Ok(Self {
            adj_indices,
            dests,
            edge_prop_indices,
            node_prop_indices,
        })
    }

    /// Construction path for derived builders that established the
    /// invariants themselves.
    pub(crate) fn from_parts(
        adj_indices: Vec<Edge>,
        dests: Vec<Node>,
        edge_prop_indices: Vec<PropertyIndex>,
        node_prop_indices: Vec<PropertyIndex>,
    ) -> Self {
        debug_assert_eq!(
            *adj_indices.last().unwrap_or(&0) as usize,
            dests.len(),
            "adjacency index inconsistent with destination array"
        );
        Self {
            adj_indices,
            dests,
            edge_prop_indices,
            node_prop_indices,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.adj_indices.len() - 1
    }

    pub fn num_edges(&self) -> usize {
        self.dests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_nodes() == 0
    }

    pub fn nodes(&self) -> Range<Node> {
        0..self.num_nodes() as Node
    }

    pub fn out_edges_range(&self) -> Range<Edge> {
        0..self.num_edges() as Edge
    }

    pub fn out_edges(&self, node: Node) -> Range<Edge> {
        let n = node as usize;
        self.adj_indices[n]..self.adj_indices[n + 1]
    }

    pub fn out_degree(&self, node: Node) -> usize {
        let n = node as usize;
        (self.adj_indices[n + 1] - self.adj_indices[n]) as usize
    }

    pub fn out_edge_dst(&self, edge: Edge) -> Node {
        self.dests[edge as usize]
    }

    /// Property row of an outgoing edge; identity when the view never
    /// rearranged edges.
    pub fn edge_property_index(&self, edge: Edge) -> PropertyIndex {
        debug_assert!((edge as usize) < self.num_edges());
        if self.edge_prop_indices.is_empty() {
            edge
        } else {
            self.edge_prop_indices[edge as usize]
        }
    }

    /// Property row of a node; identity when nodes are in canonical order.
    pub fn node_property_index(&self, node: Node) -> PropertyIndex {
        debug_assert!((node as usize) < self.num_nodes() || self.num_nodes() == 0);
        if self.node_prop_indices.is_empty() {
            node as PropertyIndex
        } else {
            self.node_prop_indices[node as usize]
        }
    }

    pub fn adj_indices(&self) -> &[Edge] {
        &self.adj_indices
    }

    pub fn dests(&self) -> &[Node] {
        &self.dests
    }

    pub fn edge_prop_indices(&self) -> &[PropertyIndex] {
        &self.edge_prop_indices
    }

    pub fn node_prop_indices(&self) -> &[PropertyIndex] {
        &self.node_prop_indices
    }

    pub(crate) fn into_parts(self) -> (Vec<Edge>, Vec<Node>, Vec<PropertyIndex>, Vec<PropertyIndex>) {
        (
            self.adj_indices,
            self.dests,
            self.edge_prop_indices,
            self.node_prop_indices,
        )
    }

    pub(crate) fn dests_mut_with_eidx(
        &mut self,
    ) -> (&[Edge], &mut [Node], &mut [PropertyIndex]) {
        (
            &self.adj_indices,
            &mut self.dests,
            &mut self.edge_prop_indices,
        )
    }
}

/// Split `dests` and `eidx` into per-row mutable slices following `adj`, so
/// rows can be sorted in parallel. `eidx` must have one entry per edge.
pub(crate) fn row_slices_mut<'a>(
    adj: &[Edge],
    mut dests: &'a mut [Node],
    mut eidx: &'a mut [PropertyIndex],
) -> Vec<(&'a mut [Node], &'a mut [PropertyIndex])> {
    let mut rows = Vec::with_capacity(adj.len().saturating_sub(1));
    let mut prev = 0usize;
    for &end in &adj[1..] {
        let len = end as usize - prev;
        let (d_head, d_tail) = std::mem::take(&mut dests).split_at_mut(len);
        let (e_head, e_tail) = std::mem::take(&mut eidx).split_at_mut(len);
        rows.push((d_head, e_head));
        dests = d_tail;
        eidx = e_tail;
        prev = end as usize;
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> CsrTopology {
        // 0 -> {1, 2}, 1 -> {2}, 2 -> {3}, 3 -> {}
        CsrTopology::from_raw(vec![0, 2, 3, 4, 4], vec![1, 2, 2, 3], vec![], vec![]).unwrap()
    }

    #[test]
    fn test_accessors() {
        let topo = diamond();
        assert_eq!(topo.num_nodes(), 4);
        assert_eq!(topo.num_edges(), 4);
        assert_eq!(topo.out_edges(0), 0..2);
        assert_eq!(topo.out_degree(0), 2);
        assert_eq!(topo.out_degree(3), 0);
        assert_eq!(topo.out_edge_dst(3), 3);
        // identity property maps
        assert_eq!(topo.edge_property_index(2), 2);
        assert_eq!(topo.node_property_index(1), 1);
    }

    #[test]
    fn test_from_raw_rejects_bad_shapes() {
        assert!(CsrTopology::from_raw(vec![], vec![], vec![], vec![]).is_err());
        assert!(CsrTopology::from_raw(vec![1, 2], vec![0], vec![], vec![]).is_err());
        assert!(CsrTopology::from_raw(vec![0, 2, 1], vec![0, 0], vec![], vec![]).is_err());
        assert!(CsrTopology::from_raw(vec![0, 1], vec![5], vec![], vec![]).is_err());
        assert!(CsrTopology::from_raw(vec![0, 2], vec![0, 0], vec![7], vec![]).is_err());
    }

    #[test]
    fn test_copy_preserves_both_permutations() {
        let topo = CsrTopology::from_raw(
            vec![0, 1, 2],
            vec![1, 0],
            vec![1, 0],
            vec![9, 8],
        )
        .unwrap();
        let copy = topo.clone();
        assert_eq!(copy, topo);
        // The node permutation must come from the node array, not the edge
        // array.
        assert_eq!(copy.node_property_index(0), 9);
        assert_eq!(copy.edge_property_index(0), 1);
    }

    #[test]
    fn test_row_slices_cover_rows() {
        let topo = diamond();
        let mut dests = topo.dests().to_vec();
        let mut eidx: Vec<u64> = (0..4).collect();
        let rows = row_slices_mut(topo.adj_indices(), &mut dests, &mut eidx);
        let lens: Vec<usize> = rows.iter().map(|(d, _)| d.len()).collect();
        assert_eq!(lens, vec![2, 1, 1, 0]);
    }
}
