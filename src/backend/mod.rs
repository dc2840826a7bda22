//! # Backend Execution
//!
//! The orchestrator between the client transport and the backend targets.
//!
//! ## Flow
//!
//! 1. [`Dispatcher`] leases one connection per execution unit, binds it to the
//!    client session and transmits the rebuilt statement.
//! 2. Backend I/O paths push each reply through the [`ConnectionSessionManager`]
//!    into the statement's [`ResponseCollector`].
//! 3. The handler waits for all replies under the execution timeout.
//! 4. [`ResponseMerger`] turns the replies into one [`MergedOutcome`].
//! 5. [`ResultCursor`] streams merged rows; exhaustion returns every lease.

pub mod collector;
pub mod cursor;
pub mod dispatcher;
pub mod handler;
pub mod lease;
pub mod merger;
pub mod packet;
pub mod pool;
pub mod session;

pub use collector::{ResponseCollector, ResultSender};
pub use cursor::{CursorState, ResultCursor, ResultRow};
pub use dispatcher::Dispatcher;
pub use handler::BackendHandler;
pub use lease::LeaseSet;
pub use merger::{MergeDecision, MergedOutcome, QueryHeader, ResponseMerger};
pub use packet::{
    BackendResponse, ColumnDefinition, ErrorResponse, HeadOutcome, OkAck, PendingResult,
    ResultSetResponse, StatementPacket,
};
pub use pool::{
    BackendConnection, BackendConnector, ConnectionLease, ConnectionPool, FixedConnectionPool,
    PoolRegistry,
};
pub use session::{ClientSession, ConnectionSessionManager};
