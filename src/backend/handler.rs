//! # Backend Handler
//!
//! Executes one client statement end to end: route, dispatch to every target,
//! wait for all replies under the execution timeout, merge, then stream rows
//! to the client through [`BackendHandler::advance`] and
//! [`BackendHandler::fetch_row`]. Every connection leased for the statement is
//! returned exactly once, when the cursor is exhausted, when execution fails,
//! or at the latest when the handler is dropped.

use crate::backend::cursor::{ResultCursor, ResultRow};
use crate::backend::dispatcher::Dispatcher;
use crate::backend::lease::LeaseSet;
use crate::backend::merger::{MergeDecision, MergedOutcome, ResponseMerger};
use crate::backend::packet::{OkAck, PendingResult};
use crate::backend::session::ClientSession;
use crate::constants::{protocol, StatementKind};
use crate::error::{ProxyError, ProxyResult};
use crate::logging::{log_lease_operation, log_statement_operation};
use crate::merge::MergeContext;
use crate::routing::{ExecutionUnit, RouteResult};
use crate::runtime::ProxyRuntime;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub struct BackendHandler {
    runtime: Arc<ProxyRuntime>,
    session: ClientSession,
    sql: String,
    leases: LeaseSet,
    cursor: ResultCursor,
    executed: bool,
}

impl BackendHandler {
    pub fn new(runtime: Arc<ProxyRuntime>, session: ClientSession, sql: impl Into<String>) -> Self {
        Self {
            runtime,
            session,
            sql: sql.into(),
            leases: LeaseSet::new(),
            cursor: ResultCursor::new(),
            executed: false,
        }
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn cursor(&self) -> &ResultCursor {
        &self.cursor
    }

    /// Number of connections currently leased for this statement
    pub fn leased_connections(&self) -> usize {
        self.leases.len()
    }

    /// Execute the statement once and produce its merged outcome
    ///
    /// Infrastructure faults (leasing, collection timeout, transmission,
    /// routing) are returned as `Err` after every lease has been released; the
    /// transport reports them with
    /// [`ErrorResponse::from_fault`](crate::backend::packet::ErrorResponse::from_fault).
    #[instrument(skip(self), fields(session_id = self.session.session_id))]
    pub async fn execute(&mut self) -> ProxyResult<MergedOutcome> {
        if self.executed {
            return Err(ProxyError::Usage(
                "statement already executed on this handler".to_string(),
            ));
        }
        self.executed = true;

        let result = if self.runtime.config().mode.is_single_target() {
            self.execute_for_master_slave().await
        } else {
            self.execute_for_sharding().await
        };

        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                log_statement_operation(
                    "execute",
                    self.session.session_id,
                    None,
                    self.leases.len(),
                    "failed",
                    Some(&e.to_string()),
                );
                self.release_leases();
                Err(e)
            }
        }
    }

    async fn execute_for_master_slave(&mut self) -> ProxyResult<MergedOutcome> {
        let target = self.runtime.master_slave_router()?.route(&self.sql)?;
        let kind = self.runtime.classifier().classify(&self.sql)?;
        let units = vec![ExecutionUnit::new(target, self.sql.clone())];

        let results = self.dispatch_and_collect(&units).await?;
        Ok(self.merge(kind, &[], results))
    }

    async fn execute_for_sharding(&mut self) -> ProxyResult<MergedOutcome> {
        let RouteResult {
            units,
            statement_kind,
            tables,
        } = self.runtime.router()?.route(&self.sql)?;

        if units.is_empty() {
            debug!("Statement routed to no targets");
            return Ok(MergedOutcome::Ack(OkAck::new(
                protocol::SYNTHETIC_SEQUENCE_ID,
                0,
                0,
            )));
        }

        let results = self.dispatch_and_collect(&units).await?;
        let outcome = self.merge(statement_kind, &tables, results);

        if statement_kind.is_schema_changing() && !outcome.is_error() {
            if let Some(table) = tables.first() {
                Self::refresh_metadata(&self.runtime, table).await;
            }
        }
        Ok(outcome)
    }

    async fn dispatch_and_collect(
        &mut self,
        units: &[ExecutionUnit],
    ) -> ProxyResult<Vec<PendingResult>> {
        let runtime = Arc::clone(&self.runtime);
        let config = runtime.config();

        let collector = Dispatcher::new(
            runtime.pools(),
            runtime.sessions(),
            config.backend.connection_timeout(),
        )
        .with_show_sql(config.show_sql)
        .dispatch(&self.session, units, &mut self.leases)
        .await?;
        log_lease_operation("dispatch", self.session.session_id, self.leases.len(), "leased");

        collector
            .collect(config.backend.execution_timeout())
            .await
    }

    fn merge(
        &mut self,
        statement_kind: StatementKind,
        tables: &[String],
        mut results: Vec<PendingResult>,
    ) -> MergedOutcome {
        results.sort_by_key(|r| r.unit_index);
        self.frame_cursor(&results);

        let unit_count = results.len();
        let context = MergeContext {
            sql: &self.sql,
            statement_kind,
            tables,
        };
        let MergeDecision { outcome, merged } =
            ResponseMerger::new(self.runtime.merge_factory(), self.runtime.catalog())
                .merge(&context, results);

        if let Some(merged) = merged {
            if let Err(e) = self.cursor.install(merged) {
                warn!(error = %e, "Merged result could not be installed");
            }
        }

        let kind = statement_kind.to_string();
        log_statement_operation(
            "execute",
            self.session.session_id,
            Some(&kind),
            unit_count,
            if outcome.is_error() { "error" } else { "ok" },
            None,
        );
        outcome
    }

    /// First non-zero sequence id and column count, in submission order
    fn frame_cursor(&mut self, results: &[PendingResult]) {
        let sequence_id = results
            .iter()
            .map(|r| r.response.sequence_id())
            .find(|id| *id != 0)
            .unwrap_or(0);
        let column_count = results
            .iter()
            .map(|r| r.response.column_count())
            .find(|count| *count != 0)
            .unwrap_or(0);
        self.cursor.frame(column_count, sequence_id);
    }

    async fn refresh_metadata(runtime: &ProxyRuntime, table: &str) {
        if !runtime.config().refresh_metadata_on_ddl {
            return;
        }
        let Some(loader) = runtime.metadata_loader() else {
            debug!(table = %table, "No metadata loader configured, skipping refresh");
            return;
        };

        match loader.load(table).await {
            Ok(metadata) => runtime.catalog().install(metadata),
            Err(e) => warn!(table = %table, error = %e, "Metadata refresh failed"),
        }
    }

    /// Move to the next row; leases go back to their pools on exhaustion
    pub fn advance(&mut self) -> ProxyResult<bool> {
        match self.cursor.advance() {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.release_leases();
                Ok(false)
            }
            Err(e) => {
                self.release_leases();
                Err(e)
            }
        }
    }

    pub fn fetch_row(&mut self) -> ProxyResult<ResultRow> {
        self.cursor.fetch_row()
    }

    fn release_leases(&mut self) {
        let returned = self
            .leases
            .release_all(self.runtime.pools(), self.runtime.sessions());
        if returned > 0 {
            log_lease_operation("release", self.session.session_id, returned, "returned");
        }
    }
}

impl Drop for BackendHandler {
    fn drop(&mut self) {
        if !self.leases.is_released() && !self.leases.is_empty() {
            warn!(
                session_id = self.session.session_id,
                leases = self.leases.len(),
                "Handler dropped before cursor exhaustion, releasing leases"
            );
        }
        self.release_leases();
    }
}
