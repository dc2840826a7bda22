//! # Response Merger
//!
//! Turns the full set of per-target responses into the single outcome the
//! client sees. Decisions are made only once every target has answered and are
//! always resolved in submission order, never arrival order:
//!
//! 1. the first error head (by unit index) wins and discards every payload;
//! 2. data-modifying statements sum affected rows, keeping the generated id of
//!    the last acknowledgement;
//! 3. queries and diagnostic statements are handed to the read-merge strategy;
//! 4. anything else passes the first response through untouched.

use crate::backend::packet::{
    BackendResponse, ColumnDefinition, ErrorResponse, HeadOutcome, OkAck, PendingResult,
};
use crate::constants::protocol;
use crate::merge::{MergeContext, MergeStrategyFactory, MergedResult};
use crate::metadata::MetadataCatalog;
use tracing::{debug, warn};

/// Header of a merged read result; its rows stream through the cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryHeader {
    pub columns: Vec<ColumnDefinition>,
    pub column_count: usize,
    pub sequence_id: u32,
}

/// The client-visible result of one statement
#[derive(Debug, Clone, PartialEq)]
pub enum MergedOutcome {
    Error(ErrorResponse),
    Ack(OkAck),
    Query(QueryHeader),
    /// First target's response, forwarded without merging
    Passthrough(BackendResponse),
}

impl MergedOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, MergedOutcome::Error(_))
    }
}

/// Merge result plus the row stream backing a query outcome
pub struct MergeDecision {
    pub outcome: MergedOutcome,
    pub merged: Option<Box<dyn MergedResult>>,
}

impl MergeDecision {
    fn outcome(outcome: MergedOutcome) -> Self {
        Self {
            outcome,
            merged: None,
        }
    }
}

pub struct ResponseMerger<'a> {
    factory: &'a dyn MergeStrategyFactory,
    catalog: &'a MetadataCatalog,
}

impl<'a> ResponseMerger<'a> {
    pub fn new(factory: &'a dyn MergeStrategyFactory, catalog: &'a MetadataCatalog) -> Self {
        Self { factory, catalog }
    }

    pub fn merge(
        &self,
        context: &MergeContext<'_>,
        mut results: Vec<PendingResult>,
    ) -> MergeDecision {
        results.sort_by_key(|r| r.unit_index);

        if let Some(error) = first_error(&results) {
            debug!(
                error_code = error.error_code,
                message = %error.message,
                "Backend error wins merge"
            );
            return MergeDecision::outcome(MergedOutcome::Error(error.clone()));
        }

        if results.is_empty() {
            return MergeDecision::outcome(MergedOutcome::Ack(OkAck::new(
                protocol::SYNTHETIC_SEQUENCE_ID,
                0,
                0,
            )));
        }

        let kind = context.statement_kind;
        if kind.is_data_modifying() {
            return MergeDecision::outcome(MergedOutcome::Ack(merge_acks(&results)));
        }
        if kind.is_read_merged() {
            return self.merge_reads(context, results);
        }

        let first = results.swap_remove(0);
        MergeDecision::outcome(MergedOutcome::Passthrough(first.response))
    }

    fn merge_reads(&self, context: &MergeContext<'_>, results: Vec<PendingResult>) -> MergeDecision {
        // Statements like SET or USE acknowledge instead of returning rows
        let (header, passthrough) = match results.first().map(|first| &first.response) {
            Some(BackendResponse::ResultSet(rs)) => (
                QueryHeader {
                    columns: rs.columns.clone(),
                    column_count: rs.column_count(),
                    sequence_id: rs.sequence_id,
                },
                None,
            ),
            first => (
                QueryHeader {
                    columns: Vec::new(),
                    column_count: 0,
                    sequence_id: protocol::SYNTHETIC_SEQUENCE_ID,
                },
                first.cloned(),
            ),
        };

        match (self.factory.build(context, results, self.catalog), passthrough) {
            (Ok(_), Some(response)) => {
                debug!(statement_kind = %context.statement_kind, "Read merge produced no result set");
                MergeDecision::outcome(MergedOutcome::Passthrough(response))
            }
            (Ok(merged), None) => MergeDecision {
                outcome: MergedOutcome::Query(header),
                merged: Some(merged),
            },
            (Err(e), _) => {
                warn!(error = %e, statement_kind = %context.statement_kind, "Read merge failed");
                MergeDecision::outcome(MergedOutcome::Error(ErrorResponse::new(
                    protocol::SYNTHETIC_SEQUENCE_ID,
                    protocol::GENERIC_ERROR_CODE,
                    protocol::GENERIC_SQL_STATE,
                    e.to_string(),
                )))
            }
        }
    }
}

fn first_error(results: &[PendingResult]) -> Option<&ErrorResponse> {
    results.iter().find_map(|r| match r.response.head() {
        HeadOutcome::Error(error) => Some(error),
        _ => None,
    })
}

/// Sum affected rows; the generated id of the last acknowledgement survives
fn merge_acks(results: &[PendingResult]) -> OkAck {
    let mut affected_rows = 0u64;
    let mut last_insert_id = 0u64;
    for result in results {
        if let HeadOutcome::Ack(ack) = result.response.head() {
            affected_rows = affected_rows.saturating_add(ack.affected_rows);
            last_insert_id = ack.last_insert_id;
        }
    }
    OkAck::new(
        protocol::SYNTHETIC_SEQUENCE_ID,
        affected_rows,
        last_insert_id,
    )
}
