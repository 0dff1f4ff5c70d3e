// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Registry of stored topology records for one graph version. The view
//! cache probes it with shadow keys before rebuilding a derived view; a
//! consumed record is taken out so its arrays move into the in-memory
//! topology instead of being copied.

use crate::storage::topology_record::RdgTopology;

#[derive(Debug, Default)]
pub struct TopologyManager {
    records: Vec<RdgTopology>,
}

impl TopologyManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, shadow: &RdgTopology) -> Option<&RdgTopology> {
        self.records.iter().find(|r| r.matches(shadow))
    }

    /// Remove and return the first record satisfying `shadow`.
    pub fn take(&mut self, shadow: &RdgTopology) -> Option<RdgTopology> {
        let at = self.records.iter().position(|r| r.matches(shadow))?;
        Some(self.records.swap_remove(at))
    }

    /// Install a record, replacing any existing record with the same tag.
    pub fn upsert(&mut self, record: RdgTopology) {
        if let Some(existing) = self.records.iter_mut().find(|r| r.same_tag(&record)) {
            *existing = record;
        } else {
            self.records.push(record);
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &RdgTopology> {
        self.records.iter()
    }
}
