//! # Routing Interfaces
//!
//! Contracts of the routing collaborators the orchestrator consumes. Deciding
//! which physical targets a statement maps to lives outside this crate; only
//! the statement classifier has a default implementation here.

use crate::constants::StatementKind;
use crate::error::{ProxyError, ProxyResult};
use serde::{Deserialize, Serialize};

/// One (target, statement text) pair produced by routing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionUnit {
    pub target: String,
    pub sql: String,
}

impl ExecutionUnit {
    pub fn new(target: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            sql: sql.into(),
        }
    }
}

/// Outcome of sharding routing for one logical statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteResult {
    pub units: Vec<ExecutionUnit>,
    pub statement_kind: StatementKind,
    /// Logical tables the statement touches
    pub tables: Vec<String>,
}

/// Sharding routing: one logical statement to many units
pub trait StatementRouter: Send + Sync {
    fn route(&self, sql: &str) -> ProxyResult<RouteResult>;
}

/// Master-slave routing: one logical statement to exactly one target
pub trait MasterSlaveRouter: Send + Sync {
    fn route(&self, sql: &str) -> ProxyResult<String>;
}

pub trait StatementClassifier: Send + Sync {
    fn classify(&self, sql: &str) -> ProxyResult<StatementKind>;
}

/// Classifies a statement by its leading keyword
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    fn leading_keyword(sql: &str) -> Option<String> {
        let mut rest = sql.trim_start();
        loop {
            if let Some(stripped) = rest.strip_prefix("/*") {
                rest = stripped.split_once("*/").map_or("", |(_, tail)| tail);
            } else if rest.starts_with("--") || rest.starts_with('#') {
                rest = rest.split_once('\n').map_or("", |(_, tail)| tail);
            } else if let Some(stripped) = rest.strip_prefix('(') {
                rest = stripped;
            } else {
                break;
            }
            rest = rest.trim_start();
        }

        let keyword: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        (!keyword.is_empty()).then(|| keyword.to_ascii_uppercase())
    }
}

impl StatementClassifier for KeywordClassifier {
    fn classify(&self, sql: &str) -> ProxyResult<StatementKind> {
        let keyword = Self::leading_keyword(sql)
            .ok_or_else(|| ProxyError::Routing("empty statement".to_string()))?;

        let kind = match keyword.as_str() {
            "SELECT" | "WITH" => StatementKind::Dql,
            "INSERT" | "UPDATE" | "DELETE" | "REPLACE" => StatementKind::Dml,
            "CREATE" | "ALTER" | "DROP" | "TRUNCATE" | "RENAME" => StatementKind::Ddl,
            "SHOW" | "DESC" | "DESCRIBE" | "EXPLAIN" | "USE" | "SET" => StatementKind::Dal,
            "GRANT" | "REVOKE" => StatementKind::Dcl,
            "BEGIN" | "START" | "COMMIT" | "ROLLBACK" | "SAVEPOINT" => StatementKind::Tcl,
            other => {
                return Err(ProxyError::Routing(format!(
                    "unsupported statement type '{other}'"
                )))
            }
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifies_leading_keyword() {
        let classifier = KeywordClassifier;
        assert_eq!(
            classifier.classify("select * from t_order").unwrap(),
            StatementKind::Dql
        );
        assert_eq!(
            classifier.classify("  INSERT INTO t_order VALUES (1)").unwrap(),
            StatementKind::Dml
        );
        assert_eq!(
            classifier.classify("ALTER TABLE t_order ADD c INT").unwrap(),
            StatementKind::Ddl
        );
        assert_eq!(classifier.classify("show tables").unwrap(), StatementKind::Dal);
        assert_eq!(classifier.classify("commit").unwrap(), StatementKind::Tcl);
    }

    #[test]
    fn test_skips_comments_and_parentheses() {
        let classifier = KeywordClassifier;
        assert_eq!(
            classifier
                .classify("/* hint */ -- note\n (SELECT 1) UNION (SELECT 2)")
                .unwrap(),
            StatementKind::Dql
        );
    }

    #[test]
    fn test_rejects_unknown_and_empty() {
        let classifier = KeywordClassifier;
        assert!(matches!(
            classifier.classify("VACUUM"),
            Err(ProxyError::Routing(_))
        ));
        assert!(matches!(
            classifier.classify("   "),
            Err(ProxyError::Routing(_))
        ));
    }
}
