#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Shard Proxy Core
//!
//! Execution orchestrator of a database sharding proxy.
//!
//! ## Overview
//!
//! Given a client statement, the orchestrator routes it to one or more physical
//! backend targets, dispatches each unit over a pooled connection, waits for
//! every target to answer under a bounded deadline, merges the answers into a
//! single client-facing outcome and streams the merged rows back through a
//! pull-based cursor.
//!
//! ## Module Organization
//!
//! - [`backend`] - dispatch, collection, merge and row streaming
//! - [`routing`] - routing and statement classification contracts
//! - [`merge`] - read-merge strategy contracts and the default strategy
//! - [`metadata`] - table metadata catalog and loader contract
//! - [`runtime`] - shared collaborators handed to each statement
//! - [`config`] - layered configuration
//! - [`error`] - infrastructure fault taxonomy
//! - [`logging`] - structured logging bootstrap
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shard_proxy::backend::{BackendHandler, ClientSession, MergedOutcome};
//! use shard_proxy::runtime::ProxyRuntime;
//! use std::sync::Arc;
//!
//! # async fn example(runtime: Arc<ProxyRuntime>) -> shard_proxy::ProxyResult<()> {
//! let mut handler = BackendHandler::new(runtime, ClientSession::new(1, 0), "SELECT * FROM t_order");
//! if let MergedOutcome::Query(header) = handler.execute().await? {
//!     println!("{} columns", header.column_count);
//!     while handler.advance()? {
//!         let row = handler.fetch_row()?;
//!         println!("#{} {:?}", row.sequence_id, row.values);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod merge;
pub mod metadata;
pub mod routing;
pub mod runtime;

pub use config::{BackendConfig, ProxyConfig};
pub use constants::{ExecutionMode, StatementKind};
pub use error::{ProxyError, ProxyResult};
pub use runtime::{ProxyRuntime, ProxyRuntimeBuilder};
