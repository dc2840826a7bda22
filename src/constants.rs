//! # Proxy Constants
//!
//! Statement classes, execution modes and the protocol framing values the
//! orchestrator stamps onto synthetic responses.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol framing values used for responses the proxy synthesizes itself
pub mod protocol {
    /// Sequence id carried by a merged write acknowledgement or synthetic error
    pub const SYNTHETIC_SEQUENCE_ID: u32 = 1;

    /// Generic error code used when an infrastructure fault is reported to the client
    pub const GENERIC_ERROR_CODE: u16 = 1;

    /// SQL state used for infrastructure faults
    pub const GENERIC_SQL_STATE: &str = "HY000";
}

/// Statement classes the orchestrator distinguishes when merging responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    /// Data query (SELECT)
    Dql,
    /// Data modification (INSERT, UPDATE, DELETE, REPLACE)
    Dml,
    /// Data definition (CREATE, ALTER, DROP, TRUNCATE)
    Ddl,
    /// Administrative / diagnostic (SHOW, DESCRIBE, EXPLAIN, USE, SET)
    Dal,
    /// Access control (GRANT, REVOKE)
    Dcl,
    /// Transaction control (BEGIN, COMMIT, ROLLBACK)
    Tcl,
}

impl StatementKind {
    /// Statements whose per-target acknowledgements are summed into one
    pub fn is_data_modifying(self) -> bool {
        matches!(self, StatementKind::Dml)
    }

    /// Statements whose result sets are handed to a read-merge strategy
    pub fn is_read_merged(self) -> bool {
        matches!(self, StatementKind::Dql | StatementKind::Dal)
    }

    pub fn is_schema_changing(self) -> bool {
        matches!(self, StatementKind::Ddl)
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatementKind::Dql => "DQL",
            StatementKind::Dml => "DML",
            StatementKind::Ddl => "DDL",
            StatementKind::Dal => "DAL",
            StatementKind::Dcl => "DCL",
            StatementKind::Tcl => "TCL",
        };
        f.write_str(name)
    }
}

/// How statements are mapped onto backend targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Full sharding routing: a statement may fan out to many targets
    #[default]
    Sharding,
    /// Master-slave routing only: every statement goes to exactly one target
    MasterSlaveOnly,
}

impl ExecutionMode {
    pub fn is_single_target(self) -> bool {
        matches!(self, ExecutionMode::MasterSlaveOnly)
    }
}
