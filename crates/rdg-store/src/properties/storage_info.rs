// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Per-column lifecycle record.
//!
//! A column is in exactly one of three states:
//! - `Absent`  — metadata only; the values live at `path` on disk,
//! - `Clean`   — loaded and identical to the on-disk contents at `path`,
//! - `Dirty`   — loaded and modified since the last write.
//!
//! The header serializes only `{name, path}`; every persisted column reads
//! back as `Absent`.

use rdg_common::{RdgError, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PropState {
    #[default]
    Absent,
    Clean,
    Dirty,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PropStorageInfo {
    name: String,
    path: Option<String>,
    #[serde(skip, default)]
    state: PropState,
}

impl PropStorageInfo {
    /// A freshly produced in-memory column: no on-disk home yet.
    pub fn new_dirty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            state: PropState::Dirty,
        }
    }

    /// A column known only by its on-disk location.
    pub fn new_absent(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: Some(path.into()),
            state: PropState::Absent,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Relative file name of the persisted column, if it has one.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn state(&self) -> PropState {
        self.state
    }

    pub fn is_absent(&self) -> bool {
        self.state == PropState::Absent
    }

    pub fn is_clean(&self) -> bool {
        self.state == PropState::Clean
    }

    pub fn is_dirty(&self) -> bool {
        self.state == PropState::Dirty
    }

    /// Dirty -> Clean, recording the fresh content-addressed file.
    pub fn was_written(&mut self, path: impl Into<String>) -> Result<()> {
        if !self.is_dirty() {
            return Err(RdgError::assertion_failed(format!(
                "property '{}' written while not dirty",
                self.name
            )));
        }
        self.path = Some(path.into());
        self.state = PropState::Clean;
        Ok(())
    }

    /// Clean -> Absent. The in-memory column is gone; `path` still holds
    /// the values.
    pub fn was_unloaded(&mut self) -> Result<()> {
        if !self.is_clean() {
            return Err(RdgError::assertion_failed(format!(
                "property '{}' unloaded while not clean",
                self.name
            )));
        }
        self.state = PropState::Absent;
        Ok(())
    }

    /// Absent -> Clean, after the column was read back from `path`.
    pub fn was_loaded(&mut self) -> Result<()> {
        if !self.is_absent() {
            return Err(RdgError::assertion_failed(format!(
                "property '{}' loaded while not absent",
                self.name
            )));
        }
        self.state = PropState::Clean;
        Ok(())
    }

    /// Upsert replaces the column contents wholesale: any state -> Dirty.
    /// The stale on-disk path stays until the next commit rewrites it.
    pub(crate) fn upserted(&mut self) {
        self.state = PropState::Dirty;
    }

    /// Any loaded state -> Dirty.
    pub fn was_modified(&mut self) -> Result<()> {
        if self.is_absent() {
            return Err(RdgError::assertion_failed(format!(
                "property '{}' modified while absent",
                self.name
            )));
        }
        self.state = PropState::Dirty;
        Ok(())
    }
}
