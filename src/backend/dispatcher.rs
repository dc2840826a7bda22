//! # Statement Dispatcher
//!
//! Fans one statement's execution units out to their targets: lease a
//! connection, bind it to the client session so its reply reaches this
//! statement's collector, and transmit. Completion is only observed through the
//! returned [`ResponseCollector`].

use crate::backend::collector::ResponseCollector;
use crate::backend::lease::LeaseSet;
use crate::backend::packet::StatementPacket;
use crate::backend::pool::PoolRegistry;
use crate::backend::session::{ClientSession, ConnectionSessionManager};
use crate::error::{ProxyError, ProxyResult};
use crate::routing::ExecutionUnit;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

pub struct Dispatcher<'a> {
    pools: &'a PoolRegistry,
    sessions: &'a ConnectionSessionManager,
    lease_timeout: Duration,
    show_sql: bool,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        pools: &'a PoolRegistry,
        sessions: &'a ConnectionSessionManager,
        lease_timeout: Duration,
    ) -> Self {
        Self {
            pools,
            sessions,
            lease_timeout,
            show_sql: false,
        }
    }

    pub fn with_show_sql(mut self, show_sql: bool) -> Self {
        self.show_sql = show_sql;
        self
    }

    /// Lease, bind and transmit every unit
    ///
    /// Every lease taken is pushed into `leases` before its transmission, so on
    /// failure the caller still holds (and must release) all of them.
    #[instrument(skip_all, fields(session_id = session.session_id, units = units.len()))]
    pub async fn dispatch(
        &self,
        session: &ClientSession,
        units: &[ExecutionUnit],
        leases: &mut LeaseSet,
    ) -> ProxyResult<ResponseCollector> {
        let mut collector = ResponseCollector::new(units.len());

        for (unit_index, unit) in units.iter().enumerate() {
            let lease = self.pools.lease(&unit.target, self.lease_timeout).await?;
            let connection = lease.connection().clone();
            leases.push(lease);

            self.sessions.register(
                connection.id(),
                session.session_id,
                collector.sender(unit_index, &unit.target)?,
            );

            if self.show_sql {
                info!(backend = %unit.target, sql = %unit.sql, "📤 SQL");
            }

            let packet = StatementPacket {
                sequence_id: session.sequence_id,
                session_id: session.session_id,
                sql: unit.sql.clone(),
            };
            if let Err(e) = connection.transmit(packet).await {
                error!(
                    backend = %unit.target,
                    connection_id = %connection.id(),
                    error = %e,
                    "Statement transmission failed"
                );
                return Err(ProxyError::Transmit {
                    target: unit.target.clone(),
                    reason: e.to_string(),
                });
            }
            debug!(
                unit_index = unit_index,
                backend = %unit.target,
                connection_id = %connection.id(),
                "Execution unit transmitted"
            );
        }

        Ok(collector)
    }
}
