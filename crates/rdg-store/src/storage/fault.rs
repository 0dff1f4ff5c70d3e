// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Crash-injection markers around commit-critical regions.
//!
//! When `RDG_FAULT_AT=<n>` is set, the process aborts at the n-th fault
//! point it passes, letting fuzz harnesses probe every intermediate commit
//! state. `RDG_FAULT_SENSITIVITY=high` restricts counting to the points
//! inside the commit protocol itself. Without the env toggle the markers
//! compile down to one relaxed atomic increment.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultSensitivity {
    Normal,
    High,
}

static COUNTER: AtomicU64 = AtomicU64::new(0);
static FAULT_AT: OnceLock<Option<(i64, FaultSensitivity)>> = OnceLock::new();

fn fault_config() -> Option<(i64, FaultSensitivity)> {
    *FAULT_AT.get_or_init(|| {
        let at: i64 = std::env::var("RDG_FAULT_AT").ok()?.parse().ok()?;
        let sensitivity = match std::env::var("RDG_FAULT_SENSITIVITY").as_deref() {
            Ok("high") => FaultSensitivity::High,
            _ => FaultSensitivity::Normal,
        };
        Some((at, sensitivity))
    })
}

pub fn fault_point(sensitivity: FaultSensitivity) {
    let Some((at, min_sensitivity)) = fault_config() else {
        return;
    };
    if min_sensitivity == FaultSensitivity::High && sensitivity != FaultSensitivity::High {
        return;
    }
    let seen = COUNTER.fetch_add(1, Ordering::Relaxed) as i64;
    if seen == at {
        tracing::error!(fault_point = seen, "injected fault, aborting");
        std::process::abort();
    }
}
