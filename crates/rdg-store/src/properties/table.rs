// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Columnar property bag for one scope (node / edge / partition).
//!
//! The table tracks every known column through a [`PropStorageInfo`] and
//! holds the decoded chunks of the loaded ones. Names are unique within the
//! scope. Load/unload I/O is driven by the owning graph; the table exposes
//! `detach`/`attach` so the state machine stays in one place.

use crate::properties::storage_info::PropStorageInfo;
use arrow_array::{Array, ArrayRef};
use arrow_schema::{DataType, Field, FieldRef};
use rdg_common::{RdgError, Result};
use std::sync::Arc;

/// One named column as a chunked value sequence.
#[derive(Clone, Debug)]
pub struct PropertyColumn {
    field: FieldRef,
    chunks: Vec<ArrayRef>,
}

impl PropertyColumn {
    pub fn new(name: impl Into<String>, chunks: Vec<ArrayRef>) -> Result<Self> {
        let name = name.into();
        let data_type = match chunks.first() {
            Some(chunk) => chunk.data_type().clone(),
            None => {
                return Err(RdgError::invalid_argument(format!(
                    "property column '{name}' must have at least one chunk"
                )));
            }
        };
        if chunks.iter().any(|c| c.data_type() != &data_type) {
            return Err(RdgError::invalid_argument(format!(
                "property column '{name}' has chunks of differing types"
            )));
        }
        Ok(Self {
            field: Arc::new(Field::new(name, data_type, true)),
            chunks,
        })
    }

    pub fn from_field(field: FieldRef, chunks: Vec<ArrayRef>) -> Self {
        Self { field, chunks }
    }

    pub fn name(&self) -> &str {
        self.field.name()
    }

    pub fn field(&self) -> &FieldRef {
        &self.field
    }

    pub fn data_type(&self) -> &DataType {
        self.field.data_type()
    }

    pub fn chunks(&self) -> &[ArrayRef] {
        &self.chunks
    }

    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn len(&self) -> usize {
        self.chunks.iter().map(|c| c.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decoded in-memory footprint, used by the byte-budget cache policy.
    pub fn num_bytes(&self) -> usize {
        self.chunks.iter().map(|c| c.get_array_memory_size()).sum()
    }

    /// The same chunks under a different name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            field: Arc::new(Field::new(name, self.data_type().clone(), true)),
            chunks: self.chunks.clone(),
        }
    }

    /// Value equality, ignoring chunk boundaries. Columns survive store or
    /// cache round trips re-chunked, so comparisons flatten first.
    pub fn logical_eq(&self, other: &PropertyColumn) -> bool {
        if self.data_type() != other.data_type() || self.len() != other.len() {
            return false;
        }
        let flatten = |col: &PropertyColumn| -> Option<ArrayRef> {
            let refs: Vec<&dyn Array> = col.chunks.iter().map(|c| c.as_ref()).collect();
            arrow_select::concat::concat(&refs).ok()
        };
        match (flatten(self), flatten(other)) {
            (Some(a), Some(b)) => a.to_data() == b.to_data(),
            _ => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct PropertyTable {
    scope: &'static str,
    columns: Vec<PropertyColumn>,
    info: Vec<PropStorageInfo>,
}

impl PropertyTable {
    pub fn new(scope: &'static str) -> Self {
        Self {
            scope,
            columns: Vec::new(),
            info: Vec::new(),
        }
    }

    /// Rebuild from a partition header's info list; nothing is loaded yet.
    pub fn from_info(scope: &'static str, info: Vec<PropStorageInfo>) -> Self {
        Self {
            scope,
            columns: Vec::new(),
            info,
        }
    }

    pub fn scope(&self) -> &'static str {
        self.scope
    }

    /// Append a new column. Fails on a name collision.
    pub fn add(&mut self, column: PropertyColumn) -> Result<()> {
        if self.info.iter().any(|i| i.name() == column.name()) {
            return Err(RdgError::invalid_argument(format!(
                "{} property '{}' already exists",
                self.scope,
                column.name()
            )));
        }
        self.info.push(PropStorageInfo::new_dirty(column.name()));
        self.columns.push(column);
        Ok(())
    }

    /// Overwrite an existing column or append a new one; either way the
    /// column is dirty afterwards.
    pub fn upsert(&mut self, column: PropertyColumn) -> Result<()> {
        let Some(info) = self.info.iter_mut().find(|i| i.name() == column.name()) else {
            return self.add(column);
        };
        info.upserted();
        if let Some(existing) = self
            .columns
            .iter_mut()
            .find(|c| c.name() == column.name())
        {
            *existing = column;
        } else {
            self.columns.push(column);
        }
        Ok(())
    }

    /// Drop the column and its metadata. The on-disk file, if any, simply
    /// stops being referenced at the next commit.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        let at = self
            .info
            .iter()
            .position(|i| i.name() == name)
            .ok_or_else(|| RdgError::property_not_found(name, self.scope))?;
        self.info.remove(at);
        self.columns.retain(|c| c.name() != name);
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&PropertyColumn> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn info(&self, name: &str) -> Option<&PropStorageInfo> {
        self.info.iter().find(|i| i.name() == name)
    }

    pub fn info_mut(&mut self, name: &str) -> Option<&mut PropStorageInfo> {
        self.info.iter_mut().find(|i| i.name() == name)
    }

    /// Take the loaded column out, leaving the metadata in place. The
    /// caller drives the state transition.
    pub fn detach(&mut self, name: &str) -> Result<PropertyColumn> {
        let at = self
            .columns
            .iter()
            .position(|c| c.name() == name)
            .ok_or_else(|| {
                RdgError::assertion_failed(format!(
                    "{} property '{name}' has no loaded column",
                    self.scope
                ))
            })?;
        Ok(self.columns.remove(at))
    }

    /// Re-insert a loaded column at `at` (clamped; end when `None`).
    pub fn attach(&mut self, column: PropertyColumn, at: Option<usize>) -> Result<()> {
        if self.columns.iter().any(|c| c.name() == column.name()) {
            return Err(RdgError::assertion_failed(format!(
                "{} property '{}' is already loaded",
                self.scope,
                column.name()
            )));
        }
        let at = at.unwrap_or(self.columns.len()).min(self.columns.len());
        self.columns.insert(at, column);
        Ok(())
    }

    /// Every known column name, loaded or not.
    pub fn list_full(&self) -> Vec<String> {
        self.info.iter().map(|i| i.name().to_string()).collect()
    }

    /// Only the names with a loaded column.
    pub fn list_loaded(&self) -> Vec<String> {
        self.info
            .iter()
            .filter(|i| !i.is_absent())
            .map(|i| i.name().to_string())
            .collect()
    }

    pub fn dirty_names(&self) -> Vec<String> {
        self.info
            .iter()
            .filter(|i| i.is_dirty())
            .map(|i| i.name().to_string())
            .collect()
    }

    pub fn iter_info(&self) -> impl Iterator<Item = &PropStorageInfo> {
        self.info.iter()
    }

    pub fn info_list(&self) -> &[PropStorageInfo] {
        &self.info
    }

    pub fn num_loaded(&self) -> usize {
        self.columns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::Int64Array;

    fn column(name: &str, values: &[i64]) -> PropertyColumn {
        PropertyColumn::new(name, vec![Arc::new(Int64Array::from(values.to_vec())) as ArrayRef])
            .unwrap()
    }

    #[test]
    fn test_add_rejects_collision() {
        let mut table = PropertyTable::new("node");
        table.add(column("w", &[1, 2, 3])).unwrap();
        assert!(matches!(
            table.add(column("w", &[4])),
            Err(RdgError::InvalidArgument(_))
        ));
        assert_eq!(table.list_full(), vec!["w"]);
    }

    #[test]
    fn test_upsert_overwrites_and_appends() {
        let mut table = PropertyTable::new("node");
        table.upsert(column("w", &[1])).unwrap();
        table.upsert(column("w", &[2])).unwrap();
        table.upsert(column("x", &[3])).unwrap();
        assert_eq!(table.list_full(), vec!["w", "x"]);
        assert!(table.info("w").unwrap().is_dirty());
        assert!(table.column("w").unwrap().logical_eq(&column("w", &[2])));
    }

    #[test]
    fn test_remove_unknown_is_not_found() {
        let mut table = PropertyTable::new("edge");
        assert!(matches!(
            table.remove("ghost"),
            Err(RdgError::PropertyNotFound { .. })
        ));
    }

    #[test]
    fn test_list_loaded_skips_absent() {
        let mut table = PropertyTable::from_info(
            "node",
            vec![PropStorageInfo::new_absent("cold", "cold.parquet")],
        );
        table.add(column("hot", &[1])).unwrap();
        assert_eq!(table.list_full(), vec!["cold", "hot"]);
        assert_eq!(table.list_loaded(), vec!["hot"]);
        assert_eq!(table.dirty_names(), vec!["hot"]);
    }

    #[test]
    fn test_logical_eq_ignores_chunking() {
        let one = column("w", &[1, 2, 3]);
        let split = PropertyColumn::new(
            "w",
            vec![
                Arc::new(Int64Array::from(vec![1])) as ArrayRef,
                Arc::new(Int64Array::from(vec![2, 3])) as ArrayRef,
            ],
        )
        .unwrap();
        assert!(one.logical_eq(&split));
        assert!(!one.logical_eq(&column("w", &[1, 2, 4])));
    }

    #[test]
    fn test_detach_attach() {
        let mut table = PropertyTable::new("node");
        table.add(column("w", &[1])).unwrap();
        let col = table.detach("w").unwrap();
        assert!(table.column("w").is_none());
        assert!(table.detach("w").is_err());
        table.attach(col, Some(99)).unwrap();
        assert!(table.column("w").is_some());
    }
}
