use crate::backend::Cursor;
use crate::errors::{DbError, Result};
use crate::types::Document;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Batched cursor over a materialized result set.
///
/// Counts itself in the backend's open-cursor gauge until `close` is called.
/// Dropping without closing leaks the slot on purpose, mirroring a
/// server-side cursor that was never killed.
pub struct MemoryCursor {
    docs: VecDeque<Document>,
    batch_size: usize,
    open: Arc<AtomicUsize>,
    closed: bool,
    /// Fail after this many documents have been served.
    fault: Option<(usize, String)>,
    served: usize,
}

impl MemoryCursor {
    pub(crate) fn new(
        docs: Vec<Document>,
        batch_size: usize,
        open: Arc<AtomicUsize>,
        fault: Option<(usize, String)>,
    ) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self { docs: docs.into(), batch_size: batch_size.max(1), open, closed: false, fault, served: 0 }
    }
}

#[async_trait]
impl Cursor for MemoryCursor {
    async fn next_batch(&mut self) -> Result<Option<Vec<Document>>> {
        if self.closed {
            return Err(DbError::Backend("cursor already closed".into()));
        }
        let mut take = self.batch_size.min(self.docs.len());
        if let Some((after, message)) = &self.fault {
            if self.served >= *after {
                return Err(DbError::Backend(message.clone()));
            }
            take = take.min(after - self.served);
        }
        if take == 0 && self.docs.is_empty() {
            return Ok(None);
        }
        self.served += take;
        Ok(Some(self.docs.drain(..take).collect()))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.docs.clear();
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
