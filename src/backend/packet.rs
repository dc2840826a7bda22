//! # Response Packets
//!
//! Structural contract of what a backend target sends back for one statement
//! and of what the proxy sends to a target. Byte layout is the codec's concern;
//! only the fields the orchestrator inspects are modelled here.

use crate::constants::protocol;
use crate::error::ProxyError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Write acknowledgement from a target (or the merged one sent to the client)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OkAck {
    pub sequence_id: u32,
    pub affected_rows: u64,
    pub last_insert_id: u64,
}

impl OkAck {
    pub fn new(sequence_id: u32, affected_rows: u64, last_insert_id: u64) -> Self {
        Self {
            sequence_id,
            affected_rows,
            last_insert_id,
        }
    }
}

/// Error reported by a target, or synthesized by the proxy for a fault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub sequence_id: u32,
    pub error_code: u16,
    pub sql_state: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(
        sequence_id: u32,
        error_code: u16,
        sql_state: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            sequence_id,
            error_code,
            sql_state: sql_state.into(),
            message: message.into(),
        }
    }

    /// Client-facing error for an infrastructure fault
    pub fn from_fault(fault: &ProxyError) -> Self {
        Self::new(
            protocol::SYNTHETIC_SEQUENCE_ID,
            protocol::GENERIC_ERROR_CODE,
            protocol::GENERIC_SQL_STATE,
            fault.to_string(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub table: Option<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
        }
    }
}

/// A readable result set: column header plus the rows behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSetResponse {
    pub columns: Vec<ColumnDefinition>,
    pub rows: Vec<Vec<Value>>,
    /// Sequence id of the last header packet; row packets continue from here
    pub sequence_id: u32,
}

impl ResultSetResponse {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Everything one target can answer with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BackendResponse {
    Error(ErrorResponse),
    Ack(OkAck),
    ResultSet(ResultSetResponse),
}

/// Success/error summary of a response, independent of its row payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeadOutcome<'a> {
    Error(&'a ErrorResponse),
    Ack(&'a OkAck),
    ResultSet,
}

impl BackendResponse {
    pub fn head(&self) -> HeadOutcome<'_> {
        match self {
            BackendResponse::Error(err) => HeadOutcome::Error(err),
            BackendResponse::Ack(ack) => HeadOutcome::Ack(ack),
            BackendResponse::ResultSet(_) => HeadOutcome::ResultSet,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, BackendResponse::Error(_))
    }

    /// Column count; zero for anything but a result set
    pub fn column_count(&self) -> usize {
        match self {
            BackendResponse::ResultSet(rs) => rs.column_count(),
            _ => 0,
        }
    }

    pub fn sequence_id(&self) -> u32 {
        match self {
            BackendResponse::Error(err) => err.sequence_id,
            BackendResponse::Ack(ack) => ack.sequence_id,
            BackendResponse::ResultSet(rs) => rs.sequence_id,
        }
    }
}

/// One target's response, tagged with the index of the unit that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct PendingResult {
    pub unit_index: usize,
    pub target: String,
    pub response: BackendResponse,
}

/// Statement rebuilt for one target connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementPacket {
    /// Command sequence id of the client packet being forwarded
    pub sequence_id: u32,
    /// Client session the statement belongs to
    pub session_id: u32,
    pub sql: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_outcome_ignores_payload() {
        let rs = BackendResponse::ResultSet(ResultSetResponse {
            columns: vec![ColumnDefinition::new("id"), ColumnDefinition::new("name")],
            rows: vec![vec![Value::from(1), Value::from("a")]],
            sequence_id: 4,
        });
        assert_eq!(rs.head(), HeadOutcome::ResultSet);
        assert_eq!(rs.column_count(), 2);
        assert_eq!(rs.sequence_id(), 4);

        let ack = BackendResponse::Ack(OkAck::new(1, 3, 0));
        assert_eq!(ack.column_count(), 0);
        assert!(matches!(ack.head(), HeadOutcome::Ack(a) if a.affected_rows == 3));
    }

    #[test]
    fn test_fault_becomes_generic_error() {
        let err = ErrorResponse::from_fault(&ProxyError::ExecutionTimeout {
            expected: 3,
            received: 2,
        });
        assert_eq!(err.sequence_id, 1);
        assert_eq!(err.error_code, 1);
        assert_eq!(err.sql_state, "HY000");
        assert!(err.message.contains("2 of 3"));
    }
}
