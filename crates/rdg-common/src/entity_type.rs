// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Bijection between entity type ids and sets of atomic type names.
//!
//! Every node and edge carries an [`EntityTypeId`]; the manager maps that id
//! to the set of atomic type names it represents. Id `0` is reserved for the
//! unknown (untyped) entity. Adding a compound set registers each atomic
//! name as its own type first, so atomic ids are always present.

use crate::error::{RdgError, Result};
use crate::EntityTypeId;
use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type TypeNameSet = BTreeSet<String>;

pub const UNKNOWN_ENTITY_TYPE: EntityTypeId = 0;
pub const UNKNOWN_ENTITY_TYPE_NAME: &str = "kUnknownName";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "Vec<TypeNameSet>", into = "Vec<TypeNameSet>")]
pub struct EntityTypeManager {
    sets: Vec<TypeNameSet>,
    ids: FxHashMap<TypeNameSet, EntityTypeId>,
}

impl Default for EntityTypeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityTypeManager {
    pub fn new() -> Self {
        let unknown = TypeNameSet::new();
        let mut ids = FxHashMap::default();
        ids.insert(unknown.clone(), UNKNOWN_ENTITY_TYPE);
        Self {
            sets: vec![unknown],
            ids,
        }
    }

    pub fn num_types(&self) -> usize {
        self.sets.len()
    }

    /// The id for `names`, registering it (and each atomic member) if new.
    pub fn get_or_add_type(&mut self, names: TypeNameSet) -> Result<EntityTypeId> {
        if names.is_empty() {
            return Err(RdgError::invalid_argument(
                "entity type name set must not be empty",
            ));
        }
        if names.len() > 1 {
            for name in &names {
                let singleton: TypeNameSet = std::iter::once(name.clone()).collect();
                self.intern(singleton)?;
            }
        }
        self.intern(names)
    }

    fn intern(&mut self, names: TypeNameSet) -> Result<EntityTypeId> {
        if let Some(&id) = self.ids.get(&names) {
            return Ok(id);
        }
        let id = EntityTypeId::try_from(self.sets.len()).map_err(|_| {
            RdgError::invalid_argument(format!(
                "entity type id space exhausted ({} types)",
                self.sets.len()
            ))
        })?;
        self.ids.insert(names.clone(), id);
        self.sets.push(names);
        Ok(id)
    }

    pub fn id_of(&self, names: &TypeNameSet) -> Option<EntityTypeId> {
        if names.is_empty() {
            return None;
        }
        self.ids.get(names).copied()
    }

    pub fn type_names(&self, id: EntityTypeId) -> Option<&TypeNameSet> {
        self.sets.get(id as usize)
    }

    pub fn contains_id(&self, id: EntityTypeId) -> bool {
        (id as usize) < self.sets.len()
    }
}

impl From<EntityTypeManager> for Vec<TypeNameSet> {
    fn from(manager: EntityTypeManager) -> Self {
        manager.sets
    }
}

impl TryFrom<Vec<TypeNameSet>> for EntityTypeManager {
    type Error = RdgError;

    fn try_from(sets: Vec<TypeNameSet>) -> Result<Self> {
        if sets.first().is_none_or(|first| !first.is_empty()) {
            return Err(RdgError::SchemaMismatch(
                "entity type table must start with the unknown type".into(),
            ));
        }
        let mut ids = FxHashMap::default();
        for (i, set) in sets.iter().enumerate() {
            let id = EntityTypeId::try_from(i)
                .map_err(|_| RdgError::SchemaMismatch("entity type table too large".into()))?;
            if ids.insert(set.clone(), id).is_some() {
                return Err(RdgError::SchemaMismatch(format!(
                    "duplicate entity type name set at id {i}"
                )));
            }
        }
        Ok(Self { sets, ids })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> TypeNameSet {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_compound_type_registers_atoms() {
        let mut mgr = EntityTypeManager::new();
        for names in [
            set(&["alice"]),
            set(&["baker"]),
            set(&["alice", "baker"]),
            set(&["charlie"]),
            set(&["david", "eleanor"]),
        ] {
            mgr.get_or_add_type(names).unwrap();
        }

        let expect = [
            TypeNameSet::new(),
            set(&["alice"]),
            set(&["baker"]),
            set(&["alice", "baker"]),
            set(&["charlie"]),
            set(&["david"]),
            set(&["eleanor"]),
            set(&["david", "eleanor"]),
        ];
        assert_eq!(mgr.num_types(), expect.len());
        for (i, names) in expect.iter().enumerate() {
            assert_eq!(mgr.type_names(i as EntityTypeId), Some(names));
        }
    }

    #[test]
    fn test_empty_set_rejected() {
        let mut mgr = EntityTypeManager::new();
        assert!(mgr.get_or_add_type(TypeNameSet::new()).is_err());
        assert_eq!(mgr.id_of(&TypeNameSet::new()), None);
    }

    #[test]
    fn test_get_or_add_is_idempotent() {
        let mut mgr = EntityTypeManager::new();
        let a = mgr.get_or_add_type(set(&["person"])).unwrap();
        let b = mgr.get_or_add_type(set(&["person"])).unwrap();
        assert_eq!(a, b);
        assert_eq!(mgr.id_of(&set(&["person"])), Some(a));
    }

    #[test]
    fn test_serde_round_trip() {
        let mut mgr = EntityTypeManager::new();
        mgr.get_or_add_type(set(&["a", "b"])).unwrap();
        let json = serde_json::to_string(&mgr).unwrap();
        let back: EntityTypeManager = serde_json::from_str(&json).unwrap();
        assert_eq!(back.num_types(), mgr.num_types());
        assert_eq!(back.id_of(&set(&["a", "b"])), mgr.id_of(&set(&["a", "b"])));
    }
}
