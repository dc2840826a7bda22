//! # Table Metadata
//!
//! Process-wide catalog of logical table metadata consulted by read-merge
//! strategies, and the loader contract used to refresh an entry after a
//! schema-changing statement.

use crate::error::ProxyResult;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    pub data_type: String,
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub table: String,
    pub columns: Vec<ColumnMetadata>,
}

impl TableMetadata {
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Loads the current metadata of one logical table from its backends
#[async_trait]
pub trait MetadataLoader: Send + Sync {
    async fn load(&self, table: &str) -> ProxyResult<TableMetadata>;
}

#[derive(Debug, Default)]
pub struct MetadataCatalog {
    tables: RwLock<HashMap<String, Arc<TableMetadata>>>,
}

impl MetadataCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, table: &str) -> Option<Arc<TableMetadata>> {
        self.tables.read().get(table).cloned()
    }

    /// Install metadata for its table, replacing whatever was there
    pub fn install(&self, metadata: TableMetadata) {
        let table = metadata.table.clone();
        let columns = metadata.columns.len();
        self.tables.write().insert(table.clone(), Arc::new(metadata));
        info!(table = %table, columns = columns, "📚 METADATA: Table metadata installed");
    }

    pub fn tables(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, columns: &[&str]) -> TableMetadata {
        TableMetadata {
            table: name.to_string(),
            columns: columns
                .iter()
                .map(|c| ColumnMetadata {
                    name: c.to_string(),
                    data_type: "INT".to_string(),
                    primary_key: false,
                })
                .collect(),
        }
    }

    #[test]
    fn test_install_replaces_entry() {
        let catalog = MetadataCatalog::new();
        catalog.install(table("t_order", &["order_id"]));
        catalog.install(table("t_order", &["order_id", "user_id"]));

        assert_eq!(catalog.len(), 1);
        let installed = catalog.get("t_order").unwrap();
        assert_eq!(
            installed.column_names().collect::<Vec<_>>(),
            vec!["order_id", "user_id"]
        );
        assert!(catalog.get("t_missing").is_none());
    }
}
