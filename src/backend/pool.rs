//! # Connection Leasing
//!
//! Named per-target connection pools and the timeout-bounded lease operation.
//! A [`ConnectionLease`] is exclusive: the connection it wraps serves exactly one
//! statement until the lease is handed back through [`PoolRegistry::release`].

use crate::backend::packet::StatementPacket;
use crate::error::{ProxyError, ProxyResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

/// A live connection to one backend target
#[async_trait]
pub trait BackendConnection: Send + Sync + Debug {
    /// Transient identifier replies are attributed by
    fn id(&self) -> &str;

    /// Write a statement; the reply arrives later through the session manager
    async fn transmit(&self, packet: StatementPacket) -> io::Result<()>;
}

/// Opens new connections to a target
#[async_trait]
pub trait BackendConnector: Send + Sync {
    async fn connect(&self, target: &str) -> io::Result<Arc<dyn BackendConnection>>;
}

/// Source of connections for one target
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    /// Wait for an idle connection; callers bound the wait
    async fn acquire(&self) -> ProxyResult<Arc<dyn BackendConnection>>;

    /// Return a previously acquired connection
    fn release(&self, connection: Arc<dyn BackendConnection>);
}

/// Exclusive use of one pooled connection
#[derive(Debug)]
pub struct ConnectionLease {
    target: String,
    connection: Arc<dyn BackendConnection>,
}

impl ConnectionLease {
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn connection(&self) -> &Arc<dyn BackendConnection> {
        &self.connection
    }

    pub fn connection_id(&self) -> &str {
        self.connection.id()
    }
}

/// Fixed-capacity pool over a set of pre-opened connections
pub struct FixedConnectionPool {
    target: String,
    idle: Mutex<Vec<Arc<dyn BackendConnection>>>,
    available: Semaphore,
}

impl FixedConnectionPool {
    pub fn new(target: impl Into<String>, connections: Vec<Arc<dyn BackendConnection>>) -> Self {
        let available = Semaphore::new(connections.len());
        Self {
            target: target.into(),
            idle: Mutex::new(connections),
            available,
        }
    }

    /// Open `size` connections through `connector` and pool them
    pub async fn connect_with(
        connector: &dyn BackendConnector,
        target: &str,
        size: usize,
    ) -> io::Result<Self> {
        let mut connections = Vec::with_capacity(size);
        for _ in 0..size {
            connections.push(connector.connect(target).await?);
        }
        info!(backend = %target, size = size, "🏊 POOL: Opened backend connections");
        Ok(Self::new(target, connections))
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }
}

#[async_trait]
impl ConnectionPool for FixedConnectionPool {
    async fn acquire(&self) -> ProxyResult<Arc<dyn BackendConnection>> {
        let permit = self
            .available
            .acquire()
            .await
            .map_err(|_| ProxyError::PoolUnavailable {
                target: self.target.clone(),
            })?;
        permit.forget();

        match self.idle.lock().pop() {
            Some(connection) => Ok(connection),
            None => {
                self.available.add_permits(1);
                Err(ProxyError::PoolUnavailable {
                    target: self.target.clone(),
                })
            }
        }
    }

    fn release(&self, connection: Arc<dyn BackendConnection>) {
        self.idle.lock().push(connection);
        self.available.add_permits(1);
    }
}

/// Whole milliseconds of `duration`, saturating at `u64::MAX`
pub(crate) fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// All backend pools, keyed by target name
#[derive(Default)]
pub struct PoolRegistry {
    pools: HashMap<String, Arc<dyn ConnectionPool>>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, target: impl Into<String>, pool: Arc<dyn ConnectionPool>) {
        let target = target.into();
        if self.pools.insert(target.clone(), pool).is_some() {
            warn!(backend = %target, "Replacing existing connection pool");
        }
    }

    pub fn contains(&self, target: &str) -> bool {
        self.pools.contains_key(target)
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.pools.keys().map(String::as_str)
    }

    /// Lease a connection for `target`, waiting at most `timeout`
    #[instrument(skip(self, target, timeout), fields(backend = %target, timeout_ms = duration_millis(timeout)))]
    pub async fn lease(&self, target: &str, timeout: Duration) -> ProxyResult<ConnectionLease> {
        let pool = self
            .pools
            .get(target)
            .ok_or_else(|| ProxyError::PoolUnavailable {
                target: target.to_string(),
            })?;

        let connection = tokio::time::timeout(timeout, pool.acquire())
            .await
            .map_err(|_| ProxyError::PoolTimeout {
                target: target.to_string(),
                timeout_ms: duration_millis(timeout),
            })??;

        debug!(connection_id = %connection.id(), "Connection leased");
        Ok(ConnectionLease {
            target: target.to_string(),
            connection,
        })
    }

    /// Hand a lease back to the pool it came from
    pub fn release(&self, lease: ConnectionLease) {
        match self.pools.get(&lease.target) {
            Some(pool) => {
                debug!(
                    backend = %lease.target,
                    connection_id = %lease.connection.id(),
                    "Connection released"
                );
                pool.release(lease.connection);
            }
            None => warn!(
                backend = %lease.target,
                "Pool disappeared before lease could be released"
            ),
        }
    }
}
