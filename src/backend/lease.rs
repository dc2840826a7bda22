//! # Statement Lease Set
//!
//! Every connection leased for one client statement, grouped by target. The set
//! is released as a whole, exactly once, whichever way the statement ends.

use crate::backend::pool::{ConnectionLease, PoolRegistry};
use crate::backend::session::ConnectionSessionManager;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct LeaseSet {
    by_target: BTreeMap<String, Vec<ConnectionLease>>,
    released: bool,
}

impl LeaseSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, lease: ConnectionLease) {
        self.by_target
            .entry(lease.target().to_string())
            .or_default()
            .push(lease);
    }

    pub fn len(&self) -> usize {
        self.by_target.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Leased connection count for one target
    pub fn leases_for(&self, target: &str) -> usize {
        self.by_target.get(target).map_or(0, Vec::len)
    }

    /// Return every lease to its pool and unbind its connection
    ///
    /// Only the first call does anything; the number of returned leases is
    /// reported so callers can log it.
    pub fn release_all(
        &mut self,
        pools: &PoolRegistry,
        sessions: &ConnectionSessionManager,
    ) -> usize {
        if self.released {
            return 0;
        }
        self.released = true;

        let mut returned = 0;
        for (target, leases) in std::mem::take(&mut self.by_target) {
            debug!(backend = %target, count = leases.len(), "Returning leases to pool");
            for lease in leases {
                sessions.clear(lease.connection_id());
                pools.release(lease);
                returned += 1;
            }
        }
        returned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::collector::ResponseCollector;
    use crate::backend::packet::StatementPacket;
    use crate::backend::pool::{BackendConnection, FixedConnectionPool};
    use async_trait::async_trait;
    use std::io;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug)]
    struct NullConnection(String);

    #[async_trait]
    impl BackendConnection for NullConnection {
        fn id(&self) -> &str {
            &self.0
        }

        async fn transmit(&self, _packet: StatementPacket) -> io::Result<()> {
            Ok(())
        }
    }

    fn pool(target: &str, size: usize) -> Arc<FixedConnectionPool> {
        let connections = (0..size)
            .map(|i| {
                Arc::new(NullConnection(format!("{target}-{i}"))) as Arc<dyn BackendConnection>
            })
            .collect();
        Arc::new(FixedConnectionPool::new(target, connections))
    }

    #[tokio::test]
    async fn test_release_all_returns_every_lease_once() {
        let ds0 = pool("ds_0", 2);
        let ds1 = pool("ds_1", 1);
        let mut pools = PoolRegistry::new();
        pools.register("ds_0", ds0.clone());
        pools.register("ds_1", ds1.clone());
        let sessions = ConnectionSessionManager::new();
        let mut collector = ResponseCollector::new(3);

        let mut leases = LeaseSet::new();
        for (index, target) in ["ds_0", "ds_1", "ds_0"].iter().enumerate() {
            let lease = pools
                .lease(target, Duration::from_millis(50))
                .await
                .unwrap();
            sessions.register(
                lease.connection_id(),
                9,
                collector.sender(index, target).unwrap(),
            );
            leases.push(lease);
        }
        assert_eq!(leases.len(), 3);
        assert_eq!(leases.leases_for("ds_0"), 2);
        assert_eq!(ds0.idle_count(), 0);

        assert_eq!(leases.release_all(&pools, &sessions), 3);
        assert_eq!(ds0.idle_count(), 2);
        assert_eq!(ds1.idle_count(), 1);
        assert!(sessions.is_empty());

        // second release is a no-op
        assert_eq!(leases.release_all(&pools, &sessions), 0);
        assert_eq!(ds0.idle_count(), 2);
        assert!(leases.is_released());
    }
}
