// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Per-graph registry of derived topologies, keyed by their
//! `(transpose, edge_sort, node_sort)` tag. A requested view is served from
//! the cache, loaded from a stored topology record, or built from the
//! canonical view, in that order.
//!
//! Mutating operations are expected to run on the controlling thread
//! between parallel phases; handed-out views are immutable and freely
//! shareable.

use crate::storage::topologies::TopologyManager;
use crate::storage::topology_record::RdgTopology;
use crate::topology::csr::CsrTopology;
use crate::topology::edge_shuffle::EdgeShuffleTopology;
use crate::topology::edge_type_aware::EdgeTypeAwareTopology;
use crate::topology::edge_type_index::EdgeTypeIndex;
use crate::topology::shuffle::ShuffleTopology;
use crate::topology::tags::{EdgeSortKind, NodeSortKind, TopologyKind, TransposeKind};
use rdg_common::{EntityTypeId, RdgError, Result};
use std::sync::Arc;
use tracing::debug;

/// The per-scope entity-type arrays a build may need: sorts and the type
/// index look types up by property index.
#[derive(Clone, Copy, Debug)]
pub struct GraphView<'a> {
    pub node_type_ids: &'a [EntityTypeId],
    pub edge_type_ids: &'a [EntityTypeId],
}

#[derive(Debug)]
pub struct PgViewCache {
    default_topo: Arc<CsrTopology>,
    default_sort_state: EdgeSortKind,
    edge_shuffle_topos: Vec<Arc<EdgeShuffleTopology>>,
    shuffle_topos: Vec<Arc<ShuffleTopology>>,
    edge_type_aware_topos: Vec<Arc<EdgeTypeAwareTopology>>,
    edge_type_index: Option<Arc<EdgeTypeIndex>>,
}

impl Default for PgViewCache {
    fn default() -> Self {
        Self::new(Arc::new(CsrTopology::default()))
    }
}

impl PgViewCache {
    pub fn new(default_topo: Arc<CsrTopology>) -> Self {
        Self {
            default_topo,
            default_sort_state: EdgeSortKind::Any,
            edge_shuffle_topos: Vec::new(),
            shuffle_topos: Vec::new(),
            edge_type_aware_topos: Vec::new(),
            edge_type_index: None,
        }
    }

    /// Shared handle to the canonical topology.
    pub fn default_topology(&self) -> Arc<CsrTopology> {
        self.default_topo.clone()
    }

    pub fn default_topology_ref(&self) -> &CsrTopology {
        &self.default_topo
    }

    /// Edge sort state of the canonical view (`Any` until a sorted view has
    /// been reseated over it).
    pub fn default_sort_state(&self) -> EdgeSortKind {
        self.default_sort_state
    }

    /// Replace the canonical view, but only while it is still unsorted;
    /// once a sorted view has been seated, later cached views must not
    /// displace it.
    pub fn reseat_default(
        &mut self,
        other: Arc<CsrTopology>,
        sort_state: EdgeSortKind,
    ) -> bool {
        if self.default_sort_state != EdgeSortKind::Any {
            return false;
        }
        self.default_topo = other;
        self.default_sort_state = sort_state;
        true
    }

    /// Reset the canonical view to empty and drop every derived collection
    /// and the type index.
    pub fn drop_all(&mut self) {
        self.default_topo = Arc::new(CsrTopology::default());
        self.default_sort_state = EdgeSortKind::Any;
        self.edge_shuffle_topos.clear();
        self.shuffle_topos.clear();
        self.edge_type_aware_topos.clear();
        self.edge_type_index = None;
    }

    pub fn build_or_get_edge_type_index(&mut self, view: &GraphView<'_>) -> Arc<EdgeTypeIndex> {
        if let Some(index) = &self.edge_type_index
            && index.is_valid()
        {
            return index.clone();
        }
        let index = Arc::new(EdgeTypeIndex::from_edge_types(view.edge_type_ids));
        self.edge_type_index = Some(index.clone());
        index
    }

    pub fn build_or_get_edge_shuffle(
        &mut self,
        view: &GraphView<'_>,
        topologies: &mut TopologyManager,
        transpose: TransposeKind,
        edge_sort: EdgeSortKind,
    ) -> Result<Arc<EdgeShuffleTopology>> {
        self.edge_shuffle_impl(view, topologies, transpose, edge_sort, false)
    }

    /// Like `build_or_get_edge_shuffle`, but the returned view is removed
    /// from (or never enters) the cache. Used when a view is consumed to
    /// seed a further derivative, so it is not cached twice.
    pub fn pop_edge_shuffle(
        &mut self,
        view: &GraphView<'_>,
        topologies: &mut TopologyManager,
        transpose: TransposeKind,
        edge_sort: EdgeSortKind,
    ) -> Result<Arc<EdgeShuffleTopology>> {
        self.edge_shuffle_impl(view, topologies, transpose, edge_sort, true)
    }

    fn edge_shuffle_impl(
        &mut self,
        view: &GraphView<'_>,
        topologies: &mut TopologyManager,
        transpose: TransposeKind,
        edge_sort: EdgeSortKind,
        pop: bool,
    ) -> Result<Arc<EdgeShuffleTopology>> {
        let hit = self.edge_shuffle_topos.iter().position(|t| {
            t.is_valid() && t.has_transpose_state(transpose) && t.has_edges_sorted_by(edge_sort)
        });
        if let Some(at) = hit {
            debug_assert!(self.check_counts(
                self.edge_shuffle_topos[at].num_nodes(),
                self.edge_shuffle_topos[at].num_edges()
            ));
            return Ok(if pop {
                self.edge_shuffle_topos.swap_remove(at)
            } else {
                self.edge_shuffle_topos[at].clone()
            });
        }

        let shadow = RdgTopology::shadow(
            TopologyKind::EdgeShuffle,
            transpose,
            edge_sort,
            NodeSortKind::Any,
        );
        let new_topo = match topologies.take(&shadow) {
            Some(record) => {
                debug!(?transpose, ?edge_sort, "edge shuffle topology loaded from storage");
                let topo = EdgeShuffleTopology::from_record(record)?;
                self.validate_loaded(topo.num_nodes(), topo.num_edges())?;
                topo
            }
            None => {
                debug!(?transpose, ?edge_sort, "building edge shuffle topology");
                self.make_edge_shuffle(view, transpose, edge_sort)
            }
        };

        let arc = Arc::new(new_topo);
        if !pop {
            self.edge_shuffle_topos.push(arc.clone());
        }
        Ok(arc)
    }

    fn make_edge_shuffle(
        &self,
        view: &GraphView<'_>,
        transpose: TransposeKind,
        edge_sort: EdgeSortKind,
    ) -> EdgeShuffleTopology {
        let mut topo = match transpose {
            TransposeKind::Yes => EdgeShuffleTopology::make_transpose_copy(&self.default_topo),
            TransposeKind::No | TransposeKind::Any => {
                EdgeShuffleTopology::make_original_copy(&self.default_topo)
            }
        };
        match edge_sort {
            EdgeSortKind::Any => {}
            EdgeSortKind::SortedByDestId => topo.sort_edges_by_dest(),
            EdgeSortKind::SortedByTypeThenDest => {
                topo.sort_edges_by_type_then_dest(view.edge_type_ids)
            }
        }
        topo
    }

    pub fn build_or_get_shuffle(
        &mut self,
        view: &GraphView<'_>,
        topologies: &mut TopologyManager,
        transpose: TransposeKind,
        node_sort: NodeSortKind,
        edge_sort: EdgeSortKind,
    ) -> Result<Arc<ShuffleTopology>> {
        let hit = self.shuffle_topos.iter().find(|t| {
            t.is_valid()
                && t.has_transpose_state(transpose)
                && t.has_edges_sorted_by(edge_sort)
                && t.has_nodes_sorted_by(node_sort)
        });
        if let Some(topo) = hit {
            debug_assert!(self.check_counts(topo.num_nodes(), topo.num_edges()));
            return Ok(topo.clone());
        }

        let shadow = RdgTopology::shadow(TopologyKind::Shuffle, transpose, edge_sort, node_sort);
        let new_topo = match topologies.take(&shadow) {
            Some(record) => {
                debug!(?transpose, ?node_sort, ?edge_sort, "shuffle topology loaded from storage");
                let topo = ShuffleTopology::from_record(record)?;
                self.validate_loaded(topo.num_nodes(), topo.num_edges())?;
                topo
            }
            None => {
                // The seed only needs the right transpose state; node
                // reshuffling scrambles any existing edge order, so an
                // unsorted seed loses nothing.
                let seed = self.edge_shuffle_impl(
                    view,
                    topologies,
                    transpose,
                    EdgeSortKind::Any,
                    false,
                )?;
                debug_assert!(seed.has_transpose_state(transpose));
                match node_sort {
                    NodeSortKind::SortedByDegree => {
                        ShuffleTopology::make_sorted_by_degree(&seed, edge_sort, view.edge_type_ids)?
                    }
                    NodeSortKind::SortedByNodeType => ShuffleTopology::make_sorted_by_node_type(
                        &seed,
                        view.node_type_ids,
                        edge_sort,
                        view.edge_type_ids,
                    )?,
                    NodeSortKind::Any => {
                        return Err(RdgError::invalid_argument(
                            "building a shuffle topology requires a concrete node sort kind",
                        ));
                    }
                }
            }
        };

        let arc = Arc::new(new_topo);
        self.shuffle_topos.push(arc.clone());
        Ok(arc)
    }

    pub fn build_or_get_edge_type_aware(
        &mut self,
        view: &GraphView<'_>,
        topologies: &mut TopologyManager,
        transpose: TransposeKind,
    ) -> Result<Arc<EdgeTypeAwareTopology>> {
        let hit = self
            .edge_type_aware_topos
            .iter()
            .find(|t| t.is_valid() && t.has_transpose_state(transpose));
        if let Some(topo) = hit {
            debug_assert!(self.check_counts(topo.num_nodes(), topo.num_edges()));
            return Ok(topo.clone());
        }

        let shadow = RdgTopology::shadow(
            TopologyKind::EdgeTypeAware,
            transpose,
            EdgeSortKind::SortedByTypeThenDest,
            NodeSortKind::Any,
        );
        let record = topologies.take(&shadow);

        // Whether loading or generating, the per-type index hangs off a
        // type-sorted edge shuffle seed. The seed is popped, not cached.
        let seed = self.pop_edge_shuffle(
            view,
            topologies,
            transpose,
            EdgeSortKind::SortedByTypeThenDest,
        )?;
        let seed = Arc::try_unwrap(seed).unwrap_or_else(|arc| (*arc).clone());

        // Generating needs the type index; loading needs it to confirm the
        // stored condensed map is not out of date.
        let edge_type_index = self.build_or_get_edge_type_index(view);

        let new_topo = match record {
            Some(record) => {
                debug!(?transpose, "edge type aware topology loaded from storage");
                EdgeTypeAwareTopology::from_record(record, edge_type_index, seed)?
            }
            None => {
                debug!(?transpose, "building edge type aware topology");
                EdgeTypeAwareTopology::make_from(edge_type_index, seed, view.edge_type_ids)?
            }
        };

        let arc = Arc::new(new_topo);
        self.edge_type_aware_topos.push(arc.clone());
        Ok(arc)
    }

    /// Serialize every live derived view for storage.
    pub fn to_records(&self) -> Vec<RdgTopology> {
        let mut records = Vec::with_capacity(
            self.edge_shuffle_topos.len()
                + self.shuffle_topos.len()
                + self.edge_type_aware_topos.len(),
        );
        for topo in &self.edge_shuffle_topos {
            records.push(topo.to_record());
        }
        for topo in &self.shuffle_topos {
            records.push(topo.to_record());
        }
        for topo in &self.edge_type_aware_topos {
            records.push(topo.to_record());
        }
        records
    }

    fn check_counts(&self, num_nodes: usize, num_edges: usize) -> bool {
        num_nodes == self.default_topo.num_nodes() && num_edges == self.default_topo.num_edges()
    }

    fn validate_loaded(&self, num_nodes: usize, num_edges: usize) -> Result<()> {
        if !self.check_counts(num_nodes, num_edges) {
            return Err(RdgError::SchemaMismatch(format!(
                "stored topology has {num_nodes} nodes / {num_edges} edges but the canonical \
                 view has {} / {}",
                self.default_topo.num_nodes(),
                self.default_topo.num_edges()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond_cache() -> (PgViewCache, Vec<EntityTypeId>, Vec<EntityTypeId>) {
        let csr =
            CsrTopology::from_raw(vec![0, 2, 3, 4, 4], vec![1, 2, 2, 3], vec![], vec![]).unwrap();
        let node_types = vec![1, 1, 1, 1];
        let edge_types = vec![1, 2, 1, 2];
        (PgViewCache::new(Arc::new(csr)), node_types, edge_types)
    }

    #[test]
    fn test_build_or_get_returns_same_handle() {
        let (mut cache, node_types, edge_types) = diamond_cache();
        let view = GraphView {
            node_type_ids: &node_types,
            edge_type_ids: &edge_types,
        };
        let mut topologies = TopologyManager::new();

        let a = cache
            .build_or_get_edge_shuffle(
                &view,
                &mut topologies,
                TransposeKind::Yes,
                EdgeSortKind::SortedByDestId,
            )
            .unwrap();
        let b = cache
            .build_or_get_edge_shuffle(
                &view,
                &mut topologies,
                TransposeKind::Yes,
                EdgeSortKind::SortedByDestId,
            )
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_pop_forces_rebuild() {
        let (mut cache, node_types, edge_types) = diamond_cache();
        let view = GraphView {
            node_type_ids: &node_types,
            edge_type_ids: &edge_types,
        };
        let mut topologies = TopologyManager::new();

        let a = cache
            .pop_edge_shuffle(
                &view,
                &mut topologies,
                TransposeKind::Yes,
                EdgeSortKind::SortedByDestId,
            )
            .unwrap();
        let b = cache
            .build_or_get_edge_shuffle(
                &view,
                &mut topologies,
                TransposeKind::Yes,
                EdgeSortKind::SortedByDestId,
            )
            .unwrap();
        // popped handle never entered the cache, so the second call rebuilt
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(*a, *b);
    }

    #[test]
    fn test_reseat_only_when_unsorted() {
        let (mut cache, _, _) = diamond_cache();
        let other = Arc::new(CsrTopology::default());
        assert!(cache.reseat_default(other.clone(), EdgeSortKind::SortedByDestId));
        // now the canonical view is sorted, further reseats are refused
        assert!(!cache.reseat_default(other, EdgeSortKind::SortedByDestId));
    }

    #[test]
    fn test_drop_all_clears_everything() {
        let (mut cache, node_types, edge_types) = diamond_cache();
        let view = GraphView {
            node_type_ids: &node_types,
            edge_type_ids: &edge_types,
        };
        let mut topologies = TopologyManager::new();
        cache
            .build_or_get_edge_type_aware(&view, &mut topologies, TransposeKind::No)
            .unwrap();
        assert!(!cache.to_records().is_empty());
        cache.drop_all();
        assert!(cache.to_records().is_empty());
        assert!(cache.default_topology_ref().is_empty());
    }

    #[test]
    fn test_shuffle_requires_concrete_node_sort() {
        let (mut cache, node_types, edge_types) = diamond_cache();
        let view = GraphView {
            node_type_ids: &node_types,
            edge_type_ids: &edge_types,
        };
        let mut topologies = TopologyManager::new();
        assert!(matches!(
            cache.build_or_get_shuffle(
                &view,
                &mut topologies,
                TransposeKind::No,
                NodeSortKind::Any,
                EdgeSortKind::Any,
            ),
            Err(RdgError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_stored_record_is_consumed_on_load() {
        let (mut cache, node_types, edge_types) = diamond_cache();
        let view = GraphView {
            node_type_ids: &node_types,
            edge_type_ids: &edge_types,
        };

        // Seed the stored set with a dest-sorted transpose record.
        let mut builder = PgViewCache::new(cache.default_topology());
        let mut empty = TopologyManager::new();
        let stored = builder
            .build_or_get_edge_shuffle(
                &view,
                &mut empty,
                TransposeKind::Yes,
                EdgeSortKind::SortedByDestId,
            )
            .unwrap();
        let mut topologies = TopologyManager::new();
        topologies.upsert(stored.to_record());

        let loaded = cache
            .build_or_get_edge_shuffle(
                &view,
                &mut topologies,
                TransposeKind::Yes,
                EdgeSortKind::SortedByDestId,
            )
            .unwrap();
        assert!(topologies.is_empty());
        assert_eq!(*loaded, *stored);
    }
}
