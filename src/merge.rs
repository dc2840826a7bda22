//! # Read-Merge Strategies
//!
//! Contract between the response merger and the algorithms that combine
//! several targets' result sets into one row stream. Sorting, grouping and
//! pagination merges plug in through [`MergeStrategyFactory`]; the built-in
//! [`IteratorMergeFactory`] streams the targets' rows one after another in
//! submission order.

use crate::backend::packet::{BackendResponse, PendingResult};
use crate::constants::StatementKind;
use crate::error::{ProxyError, ProxyResult};
use crate::metadata::MetadataCatalog;
use serde_json::Value;
use std::collections::VecDeque;

/// The statement a read-merge is built for
#[derive(Debug, Clone, Copy)]
pub struct MergeContext<'a> {
    pub sql: &'a str,
    pub statement_kind: StatementKind,
    pub tables: &'a [String],
}

/// Pull-based stream of merged rows
pub trait MergedResult: Send {
    /// Move to the next row; false once the stream is exhausted
    fn next(&mut self) -> ProxyResult<bool>;

    /// Value of a column (1-based) in the current row
    fn value(&self, column_index: usize) -> ProxyResult<Value>;
}

pub trait MergeStrategyFactory: Send + Sync {
    /// Build the merged stream; fails on inputs that cannot be merged
    fn build(
        &self,
        context: &MergeContext<'_>,
        results: Vec<PendingResult>,
        catalog: &MetadataCatalog,
    ) -> ProxyResult<Box<dyn MergedResult>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IteratorMergeFactory;

impl MergeStrategyFactory for IteratorMergeFactory {
    fn build(
        &self,
        _context: &MergeContext<'_>,
        mut results: Vec<PendingResult>,
        _catalog: &MetadataCatalog,
    ) -> ProxyResult<Box<dyn MergedResult>> {
        results.sort_by_key(|r| r.unit_index);

        // Acknowledgement-only answers (SET, USE) merge into an empty stream
        if results
            .iter()
            .all(|r| matches!(r.response, BackendResponse::Ack(_)))
        {
            return Ok(Box::new(IteratorMergedResult {
                rows: VecDeque::new(),
                current: None,
            }));
        }

        let mut header: Option<Vec<String>> = None;
        let mut rows = VecDeque::new();
        for result in results {
            let BackendResponse::ResultSet(result_set) = result.response else {
                return Err(ProxyError::MergeStrategy(format!(
                    "target '{}' did not return a result set",
                    result.target
                )));
            };

            let names: Vec<String> = result_set.columns.iter().map(|c| c.name.clone()).collect();
            match &header {
                None => header = Some(names),
                Some(expected) if *expected != names => {
                    return Err(ProxyError::MergeStrategy(format!(
                        "target '{}' returned columns {:?}, expected {:?}",
                        result.target, names, expected
                    )));
                }
                Some(_) => {}
            }
            rows.extend(result_set.rows);
        }

        Ok(Box::new(IteratorMergedResult {
            rows,
            current: None,
        }))
    }
}

struct IteratorMergedResult {
    rows: VecDeque<Vec<Value>>,
    current: Option<Vec<Value>>,
}

impl MergedResult for IteratorMergedResult {
    fn next(&mut self) -> ProxyResult<bool> {
        self.current = self.rows.pop_front();
        Ok(self.current.is_some())
    }

    fn value(&self, column_index: usize) -> ProxyResult<Value> {
        let row = self
            .current
            .as_ref()
            .ok_or_else(|| ProxyError::Usage("no current row".to_string()))?;
        column_index
            .checked_sub(1)
            .and_then(|i| row.get(i))
            .cloned()
            .ok_or_else(|| {
                ProxyError::Usage(format!(
                    "column index {column_index} out of range for {} columns",
                    row.len()
                ))
            })
    }
}
