// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Communication backend for multi-host commits. The engine only needs
//! rank/size, a barrier, and the "host zero publishes the manifest" rule.

use async_trait::async_trait;
use rdg_common::Host;
use std::sync::Arc;
use tokio::sync::Barrier;

#[async_trait]
pub trait CommBackend: Send + Sync {
    fn rank(&self) -> Host;

    fn num_hosts(&self) -> Host;

    /// Block until every host has arrived.
    async fn barrier(&self);

    /// The designated manifest writer.
    fn is_host_zero(&self) -> bool {
        self.rank() == 0
    }
}

/// Single-host backend; the barrier is a no-op.
#[derive(Debug, Default)]
pub struct LocalComm;

#[async_trait]
impl CommBackend for LocalComm {
    fn rank(&self) -> Host {
        0
    }

    fn num_hosts(&self) -> Host {
        1
    }

    async fn barrier(&self) {}
}

/// In-process multi-host backend: every "host" shares one barrier. Used to
/// exercise commit coordination without a real transport.
#[derive(Debug)]
pub struct SharedComm {
    rank: Host,
    num_hosts: Host,
    barrier: Arc<Barrier>,
}

impl SharedComm {
    /// One backend per host, all joined on the same barrier.
    pub fn group(num_hosts: Host) -> Vec<Arc<Self>> {
        let barrier = Arc::new(Barrier::new(num_hosts as usize));
        (0..num_hosts)
            .map(|rank| {
                Arc::new(Self {
                    rank,
                    num_hosts,
                    barrier: barrier.clone(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl CommBackend for SharedComm {
    fn rank(&self) -> Host {
        self.rank
    }

    fn num_hosts(&self) -> Host {
        self.num_hosts
    }

    async fn barrier(&self) {
        self.barrier.wait().await;
    }
}
