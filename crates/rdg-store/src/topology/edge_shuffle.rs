// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Edge-reordered topology views: the canonical copy, the transpose, and
//! per-row edge sorts. The `(transpose, edge_sort)` tag identifies the view
//! in the cache and in storage.

use crate::storage::topology_record::RdgTopology;
use crate::topology::csr::{row_slices_mut, CsrTopology};
use crate::topology::tags::{EdgeSortKind, NodeSortKind, TopologyKind, TransposeKind};
use rayon::prelude::*;
use rdg_common::{Edge, EntityTypeId, Node, PropertyIndex, RdgError, Result};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Once;

/// Rows at or below this length are scanned linearly in `find_edge`.
const BINARY_SEARCH_THRESHOLD: usize = 64;

#[derive(Debug)]
pub struct EdgeShuffleTopology {
    csr: CsrTopology,
    transpose_state: TransposeKind,
    edge_sort_state: EdgeSortKind,
    valid: AtomicBool,
}

impl Clone for EdgeShuffleTopology {
    fn clone(&self) -> Self {
        Self {
            csr: self.csr.clone(),
            transpose_state: self.transpose_state,
            edge_sort_state: self.edge_sort_state,
            valid: AtomicBool::new(self.valid.load(Ordering::Relaxed)),
        }
    }
}

impl PartialEq for EdgeShuffleTopology {
    fn eq(&self, other: &Self) -> bool {
        self.csr == other.csr
            && self.transpose_state == other.transpose_state
            && self.edge_sort_state == other.edge_sort_state
    }
}

impl EdgeShuffleTopology {
    pub(crate) fn new(
        csr: CsrTopology,
        transpose_state: TransposeKind,
        edge_sort_state: EdgeSortKind,
    ) -> Self {
        Self {
            csr,
            transpose_state,
            edge_sort_state,
            valid: AtomicBool::new(true),
        }
    }

    /// An untransposed copy of the canonical topology. The edge property
    /// index is materialized (identity if the source had none) because every
    /// later sort permutes it.
    pub fn make_original_copy(csr: &CsrTopology) -> Self {
        let mut copy = csr.clone();
        if copy.edge_prop_indices().is_empty() {
            let iota: Vec<PropertyIndex> = (0..copy.num_edges() as PropertyIndex).collect();
            let (adj, dests, _, nidx) = copy.into_parts();
            copy = CsrTopology::from_parts(adj, dests, iota, nidx);
        }
        Self::new(copy, TransposeKind::No, EdgeSortKind::Any)
    }

    /// Transpose of the canonical topology in three parallel passes: count
    /// in-degrees, prefix-sum them into the new adjacency index, then
    /// scatter each edge through an atomic per-destination cursor. The
    /// original edge id travels along as the edge property index. Row order
    /// within a transposed row is whatever the cursor race produced; callers
    /// that need an order must sort afterwards.
    pub fn make_transpose_copy(csr: &CsrTopology) -> Self {
        if csr.is_empty() {
            return Self::new(CsrTopology::default(), TransposeKind::Yes, EdgeSortKind::Any);
        }

        let num_nodes = csr.num_nodes();
        let num_edges = csr.num_edges();

        let counts: Vec<AtomicU64> = (0..num_nodes).map(|_| AtomicU64::new(0)).collect();
        (0..num_edges as Edge).into_par_iter().for_each(|e| {
            counts[csr.out_edge_dst(e) as usize].fetch_add(1, Ordering::Relaxed);
        });

        let mut adj = vec![0 as Edge; num_nodes + 1];
        for n in 0..num_nodes {
            adj[n + 1] = adj[n] + counts[n].load(Ordering::Relaxed);
        }

        let cursors: Vec<AtomicU64> = adj[..num_nodes]
            .iter()
            .map(|&start| AtomicU64::new(start))
            .collect();

        let dests: Vec<AtomicU32> = (0..num_edges).map(|_| AtomicU32::new(0)).collect();
        let eidx: Vec<AtomicU64> = (0..num_edges).map(|_| AtomicU64::new(0)).collect();

        csr.nodes().into_par_iter().for_each(|src| {
            for e in csr.out_edges(src) {
                let dst = csr.out_edge_dst(e) as usize;
                let slot = cursors[dst].fetch_add(1, Ordering::Relaxed) as usize;
                dests[slot].store(src, Ordering::Relaxed);
                eidx[slot].store(csr.edge_property_index(e), Ordering::Relaxed);
            }
        });

        let dests: Vec<Node> = dests.into_iter().map(AtomicU32::into_inner).collect();
        let eidx: Vec<PropertyIndex> = eidx.into_iter().map(AtomicU64::into_inner).collect();

        Self::new(
            CsrTopology::from_parts(adj, dests, eidx, Vec::new()),
            TransposeKind::Yes,
            EdgeSortKind::Any,
        )
    }

    /// Rehydrate from a stored topology record, releasing the record's
    /// backing bytes.
    pub fn from_record(record: RdgTopology) -> Result<Self> {
        if record.kind() != TopologyKind::EdgeShuffle {
            return Err(RdgError::invalid_argument(format!(
                "expected an edge shuffle record, found {:?}",
                record.kind()
            )));
        }
        let transpose = record.transpose();
        let edge_sort = record.edge_sort();
        let (adj, dests, eidx, nidx, _) = record.into_arrays();
        let eidx = match eidx {
            Some(eidx) => eidx,
            None => (0..dests.len() as PropertyIndex).collect(),
        };
        let csr = CsrTopology::from_raw(adj, dests, eidx, nidx.unwrap_or_default())?;
        Ok(Self::new(csr, transpose, edge_sort))
    }

    pub fn to_record(&self) -> RdgTopology {
        RdgTopology::new(
            TopologyKind::EdgeShuffle,
            self.transpose_state,
            self.edge_sort_state,
            NodeSortKind::Any,
            self.csr.num_nodes() as u64,
            self.csr.num_edges() as u64,
            self.csr.adj_indices().to_vec(),
            self.csr.dests().to_vec(),
            Some(self.csr.edge_prop_indices().to_vec()),
            non_empty(self.csr.node_prop_indices()),
            None,
        )
    }

    /// Sort every row by destination id, in parallel across rows.
    pub fn sort_edges_by_dest(&mut self) {
        let (adj, dests, eidx) = self.csr.dests_mut_with_eidx();
        sort_rows_by_dest(adj, dests, eidx);
        self.edge_sort_state = EdgeSortKind::SortedByDestId;
    }

    /// Sort every row by (entity type of the edge's property row, dest id).
    pub fn sort_edges_by_type_then_dest(&mut self, edge_type_ids: &[EntityTypeId]) {
        let (adj, dests, eidx) = self.csr.dests_mut_with_eidx();
        sort_rows_by_type_then_dest(adj, dests, eidx, edge_type_ids);
        self.edge_sort_state = EdgeSortKind::SortedByTypeThenDest;
    }

    pub fn sort_edges_by_dest_type(
        &mut self,
        _node_type_ids: &[EntityTypeId],
    ) -> Result<()> {
        Err(RdgError::NotImplemented(
            "sorting edges by destination node type",
        ))
    }

    /// The edge from `src` to `dst`, if any. Short or unsorted rows are
    /// scanned linearly; long sorted rows are binary searched.
    pub fn find_edge(&self, src: Node, dst: Node) -> Option<Edge> {
        let range = self.out_edges(src);
        let len = (range.end - range.start) as usize;
        let sorted = self.edge_sort_state == EdgeSortKind::SortedByDestId;

        if len > BINARY_SEARCH_THRESHOLD && !sorted {
            static WARN_ONCE: Once = Once::new();
            WARN_ONCE.call_once(|| {
                tracing::warn!(
                    "find_edge: expect poor performance, edges not sorted by dest id"
                );
            });
        }

        if len <= BINARY_SEARCH_THRESHOLD || !sorted {
            return range.clone().find(|&e| self.out_edge_dst(e) == dst);
        }

        let row = &self.csr.dests()[range.start as usize..range.end as usize];
        let at = row.partition_point(|&d| d < dst);
        if at < row.len() && row[at] == dst {
            Some(range.start + at as Edge)
        } else {
            None
        }
    }

    /// All edges from `src` to `dst` as one contiguous range. The row must
    /// be sorted by destination.
    pub fn find_all_edges(&self, src: Node, dst: Node) -> Result<Range<Edge>> {
        if self.edge_sort_state != EdgeSortKind::SortedByDestId {
            return Err(RdgError::assertion_failed(
                "find_all_edges requires edges sorted by dest id",
            ));
        }
        let range = self.out_edges(src);
        let row = &self.csr.dests()[range.start as usize..range.end as usize];
        let lo = row.partition_point(|&d| d < dst);
        let hi = row.partition_point(|&d| d <= dst);
        Ok(range.start + lo as Edge..range.start + hi as Edge)
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

    pub fn has_transpose_state(&self, kind: TransposeKind) -> bool {
        kind.matches(self.transpose_state)
    }

    pub fn has_edges_sorted_by(&self, kind: EdgeSortKind) -> bool {
        kind.matches(self.edge_sort_state)
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

    pub fn is_topology_empty(&self) -> bool {
        self.csr.is_empty()
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

fn non_empty(slice: &[PropertyIndex]) -> Option<Vec<PropertyIndex>> {
    if slice.is_empty() {
        None
    } else {
        Some(slice.to_vec())
    }
}

/// Sort each row's zipped `(edge_prop_index, dest)` pairs by dest.
pub(crate) fn sort_rows_by_dest(adj: &[Edge], dests: &mut [Node], eidx: &mut [PropertyIndex]) {
    row_slices_mut(adj, dests, eidx)
        .into_par_iter()
        .for_each(|(d, e)| {
            let mut pairs: Vec<(PropertyIndex, Node)> =
                e.iter().copied().zip(d.iter().copied()).collect();
            pairs.sort_by_key(|&(_, dst)| dst);
            for (i, (pe, pd)) in pairs.into_iter().enumerate() {
                e[i] = pe;
                d[i] = pd;
            }
            debug_assert!(d.is_sorted());
        });
}

/// Sort each row by (entity type at the edge's property row, dest).
pub(crate) fn sort_rows_by_type_then_dest(
    adj: &[Edge],
    dests: &mut [Node],
    eidx: &mut [PropertyIndex],
    edge_type_ids: &[EntityTypeId],
) {
    row_slices_mut(adj, dests, eidx)
        .into_par_iter()
        .for_each(|(d, e)| {
            let mut pairs: Vec<(PropertyIndex, Node)> =
                e.iter().copied().zip(d.iter().copied()).collect();
            pairs.sort_by_key(|&(prop, dst)| (edge_type_ids[prop as usize], dst));
            for (i, (pe, pd)) in pairs.into_iter().enumerate() {
                e[i] = pe;
                d[i] = pd;
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> CsrTopology {
        CsrTopology::from_raw(vec![0, 2, 3, 4, 4], vec![1, 2, 2, 3], vec![], vec![]).unwrap()
    }

    #[test]
    fn test_original_copy_materializes_identity_eidx() {
        let topo = EdgeShuffleTopology::make_original_copy(&diamond());
        assert_eq!(topo.transpose_state(), TransposeKind::No);
        assert_eq!(topo.edge_sort_state(), EdgeSortKind::Any);
        assert_eq!(topo.csr().edge_prop_indices(), &[0, 1, 2, 3]);
    }

    #[test]
    fn test_transpose_expected_arrays() {
        let mut topo = EdgeShuffleTopology::make_transpose_copy(&diamond());
        assert_eq!(topo.csr().adj_indices(), &[0, 0, 1, 3, 4]);
        topo.sort_edges_by_dest();
        assert_eq!(topo.csr().dests(), &[0, 0, 1, 2]);
        // property indices point back at the original edge ids
        assert_eq!(topo.edge_property_index(0), 0); // 0->1
        assert_eq!(topo.find_edge(2, 0), Some(1));
    }

    #[test]
    fn test_transpose_is_involutive_on_structure() {
        let original = diamond();
        let once = EdgeShuffleTopology::make_transpose_copy(&original);
        let mut twice = EdgeShuffleTopology::make_transpose_copy(once.csr());
        twice.sort_edges_by_dest();
        assert_eq!(twice.csr().adj_indices(), original.adj_indices());
        assert_eq!(twice.csr().dests(), original.dests());
    }

    #[test]
    fn test_sort_by_dest_is_idempotent() {
        let mut topo = EdgeShuffleTopology::make_transpose_copy(&diamond());
        topo.sort_edges_by_dest();
        let first = topo.clone();
        topo.sort_edges_by_dest();
        assert_eq!(topo, first);
        for n in topo.nodes() {
            let row = &topo.csr().dests()[topo.out_edges(n).start as usize
                ..topo.out_edges(n).end as usize];
            assert!(row.is_sorted());
        }
    }

    #[test]
    fn test_find_edge_linear_and_binary_agree() {
        // One fat row so the binary-search path is exercised.
        let n = 200u32;
        let adj = vec![0u64]
            .into_iter()
            .chain(std::iter::once(n as u64 - 1))
            .chain(std::iter::repeat_n(n as u64 - 1, n as usize - 1))
            .collect::<Vec<_>>();
        let dests: Vec<Node> = (1..n).collect();
        let csr = CsrTopology::from_raw(adj, dests, vec![], vec![]).unwrap();

        let unsorted = EdgeShuffleTopology::make_original_copy(&csr);
        let mut sorted = EdgeShuffleTopology::make_original_copy(&csr);
        sorted.sort_edges_by_dest();

        for dst in [1u32, 77, 199, 0] {
            assert_eq!(unsorted.find_edge(0, dst), sorted.find_edge(0, dst));
        }
    }

    #[test]
    fn test_find_all_edges_equal_range() {
        // parallel edges 0->1, 0->1, 0->2
        let csr =
            CsrTopology::from_raw(vec![0, 3, 3, 3], vec![1, 1, 2], vec![], vec![]).unwrap();
        let mut topo = EdgeShuffleTopology::make_original_copy(&csr);
        assert!(topo.find_all_edges(0, 1).is_err());
        topo.sort_edges_by_dest();
        assert_eq!(topo.find_all_edges(0, 1).unwrap(), 0..2);
        assert_eq!(topo.find_all_edges(0, 2).unwrap(), 2..3);
        assert!(topo.find_all_edges(0, 3).unwrap().is_empty());
    }

    #[test]
    fn test_sort_by_type_then_dest() {
        // edges of node 0: types [A, B, A] with dests [1, 1, 2]
        let csr =
            CsrTopology::from_raw(vec![0, 3, 3, 3], vec![1, 1, 2], vec![], vec![]).unwrap();
        let mut topo = EdgeShuffleTopology::make_original_copy(&csr);
        let edge_types: Vec<EntityTypeId> = vec![1, 2, 1];
        topo.sort_edges_by_type_then_dest(&edge_types);
        assert_eq!(topo.csr().dests(), &[1, 2, 1]);
        assert_eq!(topo.csr().edge_prop_indices(), &[0, 2, 1]);
        assert_eq!(topo.edge_sort_state(), EdgeSortKind::SortedByTypeThenDest);
    }

    #[test]
    fn test_transpose_empty_graph() {
        let topo = EdgeShuffleTopology::make_transpose_copy(&CsrTopology::default());
        assert!(topo.is_topology_empty());
        assert_eq!(topo.transpose_state(), TransposeKind::Yes);
    }
}
