//! In-memory backend harness for end-to-end handler tests.
//!
//! Each target gets a small pool of scripted connections. Transmitting on a
//! scripted connection spawns a task that, after the scripted delay, pushes the
//! scripted response through the shared session manager exactly like a real
//! backend I/O path would.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use shard_proxy::backend::{
    BackendConnection, BackendResponse, ColumnDefinition, ConnectionPool,
    ConnectionSessionManager, ErrorResponse, FixedConnectionPool, OkAck, ResultSetResponse,
    StatementPacket,
};
use shard_proxy::routing::{ExecutionUnit, MasterSlaveRouter, RouteResult, StatementRouter};
use shard_proxy::{ProxyConfig, ProxyResult, ProxyRuntime, StatementKind};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What a target answers, and when
#[derive(Debug, Clone)]
pub struct Reply {
    pub response: Option<BackendResponse>,
    pub delay: Duration,
    pub fail_transmit: bool,
}

impl Reply {
    pub fn now(response: BackendResponse) -> Self {
        Self::after(0, response)
    }

    pub fn after(delay_ms: u64, response: BackendResponse) -> Self {
        Self {
            response: Some(response),
            delay: Duration::from_millis(delay_ms),
            fail_transmit: false,
        }
    }

    /// Never answers
    pub fn silent() -> Self {
        Self {
            response: None,
            delay: Duration::ZERO,
            fail_transmit: false,
        }
    }

    /// Transmission itself fails, as on a closed socket
    pub fn broken() -> Self {
        Self {
            fail_transmit: true,
            ..Self::silent()
        }
    }
}

type Script = Arc<Mutex<HashMap<String, Reply>>>;

#[derive(Debug)]
pub struct ScriptedConnection {
    id: String,
    target: String,
    sessions: Arc<ConnectionSessionManager>,
    script: Script,
    transmitted: Arc<Mutex<Vec<StatementPacket>>>,
}

#[async_trait]
impl BackendConnection for ScriptedConnection {
    fn id(&self) -> &str {
        &self.id
    }

    async fn transmit(&self, packet: StatementPacket) -> io::Result<()> {
        let reply = self
            .script
            .lock()
            .get(&self.target)
            .cloned()
            .unwrap_or_else(Reply::silent);
        if reply.fail_transmit {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "connection reset by peer"));
        }
        self.transmitted.lock().push(packet);

        if let Some(response) = reply.response {
            let sessions = Arc::clone(&self.sessions);
            let connection_id = self.id.clone();
            tokio::spawn(async move {
                if !reply.delay.is_zero() {
                    tokio::time::sleep(reply.delay).await;
                }
                sessions.deliver(&connection_id, response);
            });
        }
        Ok(())
    }
}

/// Pool wrapper counting successful leases and releases
pub struct CountingPool {
    inner: FixedConnectionPool,
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
}

impl CountingPool {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn idle(&self) -> usize {
        self.inner.idle_count()
    }
}

#[async_trait]
impl ConnectionPool for CountingPool {
    async fn acquire(&self) -> ProxyResult<Arc<dyn BackendConnection>> {
        let connection = self.inner.acquire().await?;
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(connection)
    }

    fn release(&self, connection: Arc<dyn BackendConnection>) {
        self.released.fetch_add(1, Ordering::SeqCst);
        self.inner.release(connection);
    }
}

pub struct Harness {
    pub sessions: Arc<ConnectionSessionManager>,
    pub pools: HashMap<String, Arc<CountingPool>>,
    pub transmitted: Arc<Mutex<Vec<StatementPacket>>>,
    script: Script,
}

impl Harness {
    /// Targets `ds_0..ds_{targets-1}` with `per_target` connections each
    pub fn new(targets: usize, per_target: usize) -> Self {
        shard_proxy::logging::init_structured_logging();

        let sessions = Arc::new(ConnectionSessionManager::new());
        let script: Script = Arc::new(Mutex::new(HashMap::new()));
        let transmitted = Arc::new(Mutex::new(Vec::new()));

        let mut pools = HashMap::new();
        for t in 0..targets {
            let target = format!("ds_{t}");
            let connections = (0..per_target)
                .map(|c| {
                    Arc::new(ScriptedConnection {
                        id: format!("{target}-conn-{c}"),
                        target: target.clone(),
                        sessions: Arc::clone(&sessions),
                        script: Arc::clone(&script),
                        transmitted: Arc::clone(&transmitted),
                    }) as Arc<dyn BackendConnection>
                })
                .collect();
            let pool = Arc::new(CountingPool {
                inner: FixedConnectionPool::new(target.clone(), connections),
                acquired: AtomicUsize::new(0),
                released: AtomicUsize::new(0),
            });
            pools.insert(target, pool);
        }

        Self {
            sessions,
            pools,
            transmitted,
            script,
        }
    }

    pub fn script(&self, target: &str, reply: Reply) -> &Self {
        self.script.lock().insert(target.to_string(), reply);
        self
    }

    pub fn pool(&self, target: &str) -> &CountingPool {
        &self.pools[target]
    }

    pub fn total_acquired(&self) -> usize {
        self.pools.values().map(|p| p.acquired()).sum()
    }

    pub fn total_released(&self) -> usize {
        self.pools.values().map(|p| p.released()).sum()
    }

    pub fn config() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.backend.connection_timeout_ms = 200;
        config.backend.execution_timeout_ms = 500;
        config
    }

    pub fn runtime(&self, config: ProxyConfig, router: Arc<dyn StatementRouter>) -> Arc<ProxyRuntime> {
        self.builder(config)
            .router(router)
            .build()
            .expect("runtime should build")
    }

    pub fn builder(&self, config: ProxyConfig) -> shard_proxy::ProxyRuntimeBuilder {
        let mut builder = ProxyRuntime::builder(config).sessions(Arc::clone(&self.sessions));
        for (target, pool) in &self.pools {
            builder = builder.pool(target.clone(), Arc::clone(pool) as Arc<dyn ConnectionPool>);
        }
        builder
    }
}

/// Router returning the same route for every statement
pub struct FixedRouter {
    pub route: RouteResult,
}

impl FixedRouter {
    pub fn new(kind: StatementKind, targets: &[&str], sql: &str) -> Arc<Self> {
        Self::with_tables(kind, targets, sql, &[])
    }

    pub fn with_tables(
        kind: StatementKind,
        targets: &[&str],
        sql: &str,
        tables: &[&str],
    ) -> Arc<Self> {
        Arc::new(Self {
            route: RouteResult {
                units: targets
                    .iter()
                    .map(|t| ExecutionUnit::new(*t, sql))
                    .collect(),
                statement_kind: kind,
                tables: tables.iter().map(|t| t.to_string()).collect(),
            },
        })
    }
}

impl StatementRouter for FixedRouter {
    fn route(&self, _sql: &str) -> ProxyResult<RouteResult> {
        Ok(self.route.clone())
    }
}

pub struct SingleTargetRouter(pub String);

impl MasterSlaveRouter for SingleTargetRouter {
    fn route(&self, _sql: &str) -> ProxyResult<String> {
        Ok(self.0.clone())
    }
}

pub fn ack(affected_rows: u64, last_insert_id: u64) -> BackendResponse {
    BackendResponse::Ack(OkAck::new(1, affected_rows, last_insert_id))
}

pub fn error(code: u16, message: &str) -> BackendResponse {
    BackendResponse::Error(ErrorResponse::new(1, code, "42S02", message))
}

/// Single `id` column result set; header packets end at sequence id 3
pub fn id_rows(ids: &[i64]) -> BackendResponse {
    BackendResponse::ResultSet(ResultSetResponse {
        columns: vec![ColumnDefinition::new("id"), ColumnDefinition::new("status")],
        rows: ids
            .iter()
            .map(|id| vec![Value::from(*id), Value::from("OK")])
            .collect(),
        sequence_id: 3,
    })
}
