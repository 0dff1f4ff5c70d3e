// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Dense bijection between the edge entity types present in a graph and
//! indices `[0, K)`. Dense ids are assigned in ascending type-id order, so
//! the index is stable for a given graph version.

use fxhash::FxHashMap;
use rayon::prelude::*;
use rdg_common::EntityTypeId;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct EdgeTypeIndex {
    type_to_index: FxHashMap<EntityTypeId, u32>,
    index_to_type: Vec<EntityTypeId>,
    valid: AtomicBool,
}

impl PartialEq for EdgeTypeIndex {
    fn eq(&self, other: &Self) -> bool {
        self.index_to_type == other.index_to_type
    }
}

impl EdgeTypeIndex {
    /// Scan the per-edge entity types and condense the distinct ones.
    /// Per-chunk sets are folded in parallel and merged through an ordered
    /// set before dense ids are handed out.
    pub fn from_edge_types(edge_type_ids: &[EntityTypeId]) -> Self {
        let merged: BTreeSet<EntityTypeId> = edge_type_ids
            .par_iter()
            .fold(BTreeSet::new, |mut set, &ty| {
                set.insert(ty);
                set
            })
            .reduce(BTreeSet::new, |mut a, b| {
                a.extend(b);
                a
            });

        let mut type_to_index = FxHashMap::default();
        let mut index_to_type = Vec::with_capacity(merged.len());
        for (dense, ty) in merged.into_iter().enumerate() {
            type_to_index.insert(ty, dense as u32);
            index_to_type.push(ty);
        }

        Self {
            type_to_index,
            index_to_type,
            valid: AtomicBool::new(true),
        }
    }

    pub fn num_unique_types(&self) -> usize {
        self.index_to_type.len()
    }

    pub fn dense_index(&self, ty: EntityTypeId) -> Option<u32> {
        self.type_to_index.get(&ty).copied()
    }

    pub fn type_of_dense(&self, dense: u32) -> EntityTypeId {
        self.index_to_type[dense as usize]
    }

    pub fn index_to_type_map(&self) -> &[EntityTypeId] {
        &self.index_to_type
    }

    /// Fingerprint check against a stored condensed map: a stored
    /// edge-type-aware topology is only usable if its dense ordering is
    /// byte-identical to the live one.
    pub fn matches(&self, stored: &[EntityTypeId]) -> bool {
        self.index_to_type == stored
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_ids_follow_type_order() {
        let index = EdgeTypeIndex::from_edge_types(&[7, 3, 7, 3, 12, 3]);
        assert_eq!(index.num_unique_types(), 3);
        assert_eq!(index.dense_index(3), Some(0));
        assert_eq!(index.dense_index(7), Some(1));
        assert_eq!(index.dense_index(12), Some(2));
        assert_eq!(index.type_of_dense(2), 12);
        assert_eq!(index.dense_index(4), None);
    }

    #[test]
    fn test_matches_fingerprint() {
        let index = EdgeTypeIndex::from_edge_types(&[2, 1]);
        assert!(index.matches(&[1, 2]));
        assert!(!index.matches(&[2, 1]));
        assert!(!index.matches(&[1]));
    }

    #[test]
    fn test_empty_edge_set() {
        let index = EdgeTypeIndex::from_edge_types(&[]);
        assert_eq!(index.num_unique_types(), 0);
    }
}
