// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

pub mod csr;
pub mod edge_shuffle;
pub mod edge_type_aware;
pub mod edge_type_index;
pub mod shuffle;
pub mod tags;
pub mod view_cache;

pub use csr::CsrTopology;
pub use edge_shuffle::EdgeShuffleTopology;
pub use edge_type_aware::EdgeTypeAwareTopology;
pub use edge_type_index::EdgeTypeIndex;
pub use shuffle::ShuffleTopology;
pub use tags::{EdgeSortKind, NodeSortKind, TopologyKind, TransposeKind};
pub use view_cache::{GraphView, PgViewCache};
