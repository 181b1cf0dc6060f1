//! Streaming bridge from a backend cursor to a pull-driven document stream.
//!
//! The cursor is opened on first poll, batches are fetched only when the
//! buffered ones run out, and the cursor is closed on exhaustion, on error,
//! and when the stream is dropped early.

use crate::backend::Cursor;
use crate::errors::{DbError, Result};
use crate::exec::Executor;
use crate::query::QueryState;
use crate::types::Document;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use std::collections::VecDeque;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

const TARGET: &str = "docquery::stream";

/// Closes the wrapped cursor when dropped.
struct CursorGuard(Box<dyn Cursor>);

impl Deref for CursorGuard {
    type Target = Box<dyn Cursor>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for CursorGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}

enum Feed {
    Opening { executor: Executor, state: Box<QueryState> },
    Reading { cursor: CursorGuard, pending: VecDeque<Document> },
    Finished,
}

/// Single-pass stream of query results.
pub struct DocumentStream {
    inner: BoxStream<'static, Result<Document>>,
    buffer: usize,
}

impl DocumentStream {
    pub(crate) fn open(executor: Executor, state: QueryState, buffer: usize) -> Self {
        let feed = Feed::Opening { executor, state: Box::new(state) };
        let inner = stream::unfold(feed, |mut feed| async move {
            loop {
                match feed {
                    Feed::Opening { executor, state } => match executor.open_cursor(&state).await {
                        Ok(cursor) => {
                            feed = Feed::Reading { cursor: CursorGuard(cursor), pending: VecDeque::new() };
                        }
                        Err(e) => return Some((Err(e), Feed::Finished)),
                    },
                    Feed::Reading { mut cursor, mut pending } => {
                        if let Some(doc) = pending.pop_front() {
                            return Some((Ok(doc), Feed::Reading { cursor, pending }));
                        }
                        match cursor.next_batch().await {
                            Ok(Some(batch)) => {
                                pending.extend(batch);
                                feed = Feed::Reading { cursor, pending };
                            }
                            Ok(None) => {
                                log::trace!(target: TARGET, "cursor exhausted");
                                return None;
                            }
                            Err(e) => {
                                log::debug!(target: TARGET, "cursor failed: {e}");
                                return Some((Err(cursor_error(e)), Feed::Finished));
                            }
                        }
                    }
                    Feed::Finished => return None,
                }
            }
        });
        Self { inner: inner.boxed(), buffer: buffer.max(1) }
    }

    /// A stream that yields `err` once and ends.
    #[must_use]
    pub fn failed(err: DbError) -> Self {
        Self { inner: stream::once(async move { Err(err) }).boxed(), buffer: 1 }
    }

    /// Feeds each document to `f` in cursor order, waiting for the returned
    /// future before pulling the next one. The first error, from the stream
    /// or from `f`, stops consumption and is returned.
    ///
    /// # Errors
    /// The stream's error or the callback's error, whichever comes first.
    pub async fn for_each<F, Fut>(mut self, mut f: F) -> Result<()>
    where
        F: FnMut(Document) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        while let Some(item) = self.inner.next().await {
            f(item?).await?;
        }
        Ok(())
    }

    /// # Errors
    /// The first stream error.
    pub async fn collect_all(mut self) -> Result<Vec<Document>> {
        let mut out = Vec::new();
        while let Some(item) = self.inner.next().await {
            out.push(item?);
        }
        Ok(out)
    }

    /// Pushes every item into `tx`, the terminating error included.
    /// Stops early when the receiver goes away. Returns how many documents
    /// were delivered.
    pub async fn pipe(mut self, tx: mpsc::Sender<Result<Document>>) -> usize {
        let mut delivered = 0;
        while let Some(item) = self.inner.next().await {
            let failed = item.is_err();
            if tx.send(item).await.is_err() {
                log::debug!(target: TARGET, "receiver dropped after {delivered} documents");
                break;
            }
            if failed {
                break;
            }
            delivered += 1;
        }
        delivered
    }

    /// Spawns a task piping the stream into a bounded channel.
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn into_receiver(self) -> mpsc::Receiver<Result<Document>> {
        let (tx, rx) = mpsc::channel(self.buffer);
        tokio::spawn(self.pipe(tx));
        rx
    }
}

impl Stream for DocumentStream {
    type Item = Result<Document>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

fn cursor_error(e: DbError) -> DbError {
    match e {
        DbError::Backend(message) => DbError::Stream(message),
        other => other,
    }
}
