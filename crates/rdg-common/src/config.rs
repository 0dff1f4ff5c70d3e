// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

use std::time::Duration;

/// Object store resilience knobs.
#[derive(Clone, Copy, Debug)]
pub struct StoreConfig {
    /// Per-request timeout (default: 30s)
    pub request_timeout: Duration,

    /// Retries for transient failures (default: 3)
    pub max_retries: u32,

    /// Delay between retry attempts (default: 100ms, scaled by attempt)
    pub retry_backoff: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_backoff: Duration::from_millis(100),
        }
    }
}

/// Replacement policy for the decoded-column cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CacheConfig {
    /// No column recycling.
    #[default]
    Disabled,

    /// Keep at most this many columns, evicting least-recently-used.
    Lru { max_entries: usize },

    /// Keep columns until their combined decoded size exceeds the budget.
    SizeBudget { max_bytes: usize },
}

#[derive(Clone, Debug, Default)]
pub struct RdgConfig {
    pub store: StoreConfig,

    /// Policy for recycling decoded property columns across unload/load.
    pub property_cache: CacheConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RdgConfig::default();
        assert_eq!(config.store.max_retries, 3);
        assert_eq!(config.store.request_timeout, Duration::from_secs(30));
        assert_eq!(config.property_cache, CacheConfig::Disabled);
    }
}
