// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

pub mod storage_info;
pub mod table;

pub use storage_info::{PropState, PropStorageInfo};
pub use table::{PropertyColumn, PropertyTable};
