//! # Proxy Runtime
//!
//! Long-lived collaborators shared by every client statement: configuration,
//! connection pools, the connection-to-session map, the metadata catalog and
//! the routing/merge/metadata plug-ins. One [`ProxyRuntime`] is built at
//! startup and handed to each [`BackendHandler`](crate::backend::BackendHandler).

use crate::backend::pool::{BackendConnector, ConnectionPool, FixedConnectionPool, PoolRegistry};
use crate::backend::session::ConnectionSessionManager;
use crate::config::ProxyConfig;
use crate::constants::ExecutionMode;
use crate::error::{ProxyError, ProxyResult};
use crate::merge::{IteratorMergeFactory, MergeStrategyFactory};
use crate::metadata::{MetadataCatalog, MetadataLoader};
use crate::routing::{KeywordClassifier, MasterSlaveRouter, StatementClassifier, StatementRouter};
use std::sync::Arc;
use tracing::info;

pub struct ProxyRuntime {
    config: ProxyConfig,
    pools: PoolRegistry,
    sessions: Arc<ConnectionSessionManager>,
    catalog: Arc<MetadataCatalog>,
    router: Option<Arc<dyn StatementRouter>>,
    master_slave_router: Option<Arc<dyn MasterSlaveRouter>>,
    classifier: Arc<dyn StatementClassifier>,
    merge_factory: Arc<dyn MergeStrategyFactory>,
    metadata_loader: Option<Arc<dyn MetadataLoader>>,
}

impl ProxyRuntime {
    pub fn builder(config: ProxyConfig) -> ProxyRuntimeBuilder {
        ProxyRuntimeBuilder::new(config)
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn pools(&self) -> &PoolRegistry {
        &self.pools
    }

    pub fn sessions(&self) -> &Arc<ConnectionSessionManager> {
        &self.sessions
    }

    pub fn catalog(&self) -> &Arc<MetadataCatalog> {
        &self.catalog
    }

    pub fn classifier(&self) -> &dyn StatementClassifier {
        self.classifier.as_ref()
    }

    pub fn merge_factory(&self) -> &dyn MergeStrategyFactory {
        self.merge_factory.as_ref()
    }

    pub fn metadata_loader(&self) -> Option<&dyn MetadataLoader> {
        self.metadata_loader.as_deref()
    }

    /// Sharding router; present whenever the runtime runs in sharding mode
    pub fn router(&self) -> ProxyResult<&dyn StatementRouter> {
        self.router
            .as_deref()
            .ok_or_else(|| ProxyError::Configuration("no statement router configured".to_string()))
    }

    /// Master-slave router; present whenever the runtime runs in single-target mode
    pub fn master_slave_router(&self) -> ProxyResult<&dyn MasterSlaveRouter> {
        self.master_slave_router.as_deref().ok_or_else(|| {
            ProxyError::Configuration("no master-slave router configured".to_string())
        })
    }
}

pub struct ProxyRuntimeBuilder {
    config: ProxyConfig,
    pools: PoolRegistry,
    sessions: Option<Arc<ConnectionSessionManager>>,
    catalog: Option<Arc<MetadataCatalog>>,
    router: Option<Arc<dyn StatementRouter>>,
    master_slave_router: Option<Arc<dyn MasterSlaveRouter>>,
    classifier: Option<Arc<dyn StatementClassifier>>,
    merge_factory: Option<Arc<dyn MergeStrategyFactory>>,
    metadata_loader: Option<Arc<dyn MetadataLoader>>,
}

impl ProxyRuntimeBuilder {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config,
            pools: PoolRegistry::new(),
            sessions: None,
            catalog: None,
            router: None,
            master_slave_router: None,
            classifier: None,
            merge_factory: None,
            metadata_loader: None,
        }
    }

    pub fn pool(mut self, target: impl Into<String>, pool: Arc<dyn ConnectionPool>) -> Self {
        self.pools.register(target, pool);
        self
    }

    /// Open a `backend.max_connections_per_target` sized pool for `target`
    pub async fn connect_pool(
        self,
        connector: &dyn BackendConnector,
        target: impl Into<String>,
    ) -> ProxyResult<Self> {
        let target = target.into();
        let size = self.config.backend.max_connections_per_target;
        let pool = FixedConnectionPool::connect_with(connector, &target, size)
            .await
            .map_err(|e| ProxyError::Connect {
                target: target.clone(),
                reason: e.to_string(),
            })?;
        Ok(self.pool(target, Arc::new(pool)))
    }

    /// Share a session manager with the backend I/O layer
    pub fn sessions(mut self, sessions: Arc<ConnectionSessionManager>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn catalog(mut self, catalog: Arc<MetadataCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn router(mut self, router: Arc<dyn StatementRouter>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn master_slave_router(mut self, router: Arc<dyn MasterSlaveRouter>) -> Self {
        self.master_slave_router = Some(router);
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn StatementClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn merge_factory(mut self, factory: Arc<dyn MergeStrategyFactory>) -> Self {
        self.merge_factory = Some(factory);
        self
    }

    pub fn metadata_loader(mut self, loader: Arc<dyn MetadataLoader>) -> Self {
        self.metadata_loader = Some(loader);
        self
    }

    pub fn build(self) -> ProxyResult<Arc<ProxyRuntime>> {
        self.config.validate()?;

        match self.config.mode {
            ExecutionMode::Sharding if self.router.is_none() => {
                return Err(ProxyError::Configuration(
                    "sharding mode requires a statement router".to_string(),
                ));
            }
            ExecutionMode::MasterSlaveOnly if self.master_slave_router.is_none() => {
                return Err(ProxyError::Configuration(
                    "master-slave mode requires a master-slave router".to_string(),
                ));
            }
            _ => {}
        }

        info!(
            mode = ?self.config.mode,
            targets = self.pools.targets().count(),
            show_sql = self.config.show_sql,
            "🚀 RUNTIME: Proxy runtime assembled"
        );

        Ok(Arc::new(ProxyRuntime {
            config: self.config,
            pools: self.pools,
            sessions: self.sessions.unwrap_or_default(),
            catalog: self.catalog.unwrap_or_default(),
            router: self.router,
            master_slave_router: self.master_slave_router,
            classifier: self
                .classifier
                .unwrap_or_else(|| Arc::new(KeywordClassifier)),
            merge_factory: self
                .merge_factory
                .unwrap_or_else(|| Arc::new(IteratorMergeFactory)),
            metadata_loader: self.metadata_loader,
        }))
    }
}
