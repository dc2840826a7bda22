//! # Result Cursor
//!
//! Pull-based row iterator the client transport drives after a statement
//! executed. `advance` then `fetch_row`, repeated until `advance` reports
//! exhaustion. Each fetched row carries the next protocol sequence id.

use crate::error::{ProxyError, ProxyResult};
use crate::merge::MergedResult;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// No merged read stream: write ack, error or passthrough outcome
    Unset,
    Streaming,
    Exhausted,
}

/// One row ready for the client transport
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub sequence_id: u32,
    pub values: Vec<Value>,
    pub column_count: usize,
}

pub struct ResultCursor {
    state: CursorState,
    merged: Option<Box<dyn MergedResult>>,
    column_count: usize,
    sequence_id: u32,
    framed: bool,
    row_ready: bool,
}

impl fmt::Debug for ResultCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCursor")
            .field("state", &self.state)
            .field("column_count", &self.column_count)
            .field("sequence_id", &self.sequence_id)
            .field("row_ready", &self.row_ready)
            .finish()
    }
}

impl Default for ResultCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultCursor {
    pub fn new() -> Self {
        Self {
            state: CursorState::Unset,
            merged: None,
            column_count: 0,
            sequence_id: 0,
            framed: false,
            row_ready: false,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }

    pub fn sequence_id(&self) -> u32 {
        self.sequence_id
    }

    /// Fix column count and starting sequence id; later calls are ignored
    pub fn frame(&mut self, column_count: usize, sequence_id: u32) {
        if self.framed {
            return;
        }
        self.framed = true;
        self.column_count = column_count;
        self.sequence_id = sequence_id;
    }

    /// Attach the merged read stream; only valid before streaming starts
    pub fn install(&mut self, merged: Box<dyn MergedResult>) -> ProxyResult<()> {
        if self.state != CursorState::Unset {
            return Err(ProxyError::Usage(format!(
                "cannot install a merged result in state {:?}",
                self.state
            )));
        }
        self.merged = Some(merged);
        self.state = CursorState::Streaming;
        Ok(())
    }

    /// Move to the next row; false once exhausted, and false forever after
    pub fn advance(&mut self) -> ProxyResult<bool> {
        self.row_ready = false;
        if self.state != CursorState::Streaming {
            self.exhaust();
            return Ok(false);
        }

        let has_row = match self.merged.as_mut() {
            Some(merged) => merged.next(),
            None => Ok(false),
        };
        match has_row {
            Ok(true) => {
                self.row_ready = true;
                Ok(true)
            }
            Ok(false) => {
                self.exhaust();
                Ok(false)
            }
            Err(e) => {
                self.exhaust();
                Err(e)
            }
        }
    }

    /// Read the current row; only valid right after `advance` returned true
    pub fn fetch_row(&mut self) -> ProxyResult<ResultRow> {
        if self.state != CursorState::Streaming || !self.row_ready {
            return Err(ProxyError::Usage(format!(
                "fetch_row called without a current row (state {:?})",
                self.state
            )));
        }
        let merged = self
            .merged
            .as_ref()
            .ok_or_else(|| ProxyError::Usage("no merged result installed".to_string()))?;

        let mut values = Vec::with_capacity(self.column_count);
        for column_index in 1..=self.column_count {
            values.push(merged.value(column_index)?);
        }

        self.row_ready = false;
        self.sequence_id += 1;
        Ok(ResultRow {
            sequence_id: self.sequence_id,
            values,
            column_count: self.column_count,
        })
    }

    fn exhaust(&mut self) {
        self.state = CursorState::Exhausted;
        self.merged = None;
    }
}
