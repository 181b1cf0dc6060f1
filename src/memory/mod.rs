//! In-memory reference backend.
//!
//! Interprets Mongo-shaped filters, update payloads and projections over
//! per-collection document vectors. Every primitive call is journaled so the
//! exact arguments the executor produced can be inspected, and faults can be
//! armed per operation.

mod aggregate;
mod collection;
mod cursor;
pub mod eval;
pub mod update;

pub use collection::MemoryCollection;
pub use cursor::MemoryCursor;

use crate::backend::{CollectionHandle, Connection, FindAndModifyOptions, FindOptions, UpdateOptions};
use crate::errors::{DbError, Result};
use crate::types::{CollectionName, Document};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const DEFAULT_BATCH_SIZE: usize = 101;

/// Primitive operations, used to arm faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Collection,
    Names,
    Find,
    Count,
    Insert,
    Update,
    FindAndModify,
    Remove,
    Drop,
    Aggregate,
}

/// One journaled primitive call with the arguments it received.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Collection(CollectionName),
    Names,
    Find { collection: CollectionName, filter: Document, projection: Option<Document>, options: FindOptions },
    Count { collection: CollectionName, filter: Document },
    Insert { collection: CollectionName, docs: Vec<Document>, options: Document },
    Update { collection: CollectionName, filter: Document, changes: Document, options: UpdateOptions },
    FindAndModify {
        collection: CollectionName,
        filter: Document,
        sort: Option<Document>,
        changes: Document,
        options: FindAndModifyOptions,
    },
    Remove { collection: CollectionName, filter: Document, options: Document },
    Drop { collection: CollectionName },
    Aggregate { collection: CollectionName, pipeline: Vec<Document> },
}

pub(crate) struct Shared {
    db_name: String,
    batch_size: usize,
    pub(crate) collections: RwLock<BTreeMap<CollectionName, Vec<Document>>>,
    journal: Mutex<Vec<Call>>,
    faults: Mutex<HashMap<Op, String>>,
    cursor_fault: Mutex<Option<(usize, String)>>,
    pub(crate) open_cursors: Arc<AtomicUsize>,
}

impl Shared {
    pub(crate) fn record(&self, call: Call) {
        self.journal.lock().push(call);
    }

    /// Consumes an armed fault for `op`, if any.
    pub(crate) fn check(&self, op: Op) -> Result<()> {
        match self.faults.lock().remove(&op) {
            Some(message) => Err(DbError::Backend(message)),
            None => Ok(()),
        }
    }

    pub(crate) fn take_cursor_fault(&self) -> Option<(usize, String)> {
        self.cursor_fault.lock().take()
    }

    pub(crate) const fn batch_size(&self) -> usize {
        self.batch_size
    }
}

/// Process-local document store implementing [`Connection`].
#[derive(Clone)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new("test")
    }
}

impl MemoryBackend {
    /// `db_name` namespaces the names reported by `collection_names`.
    #[must_use]
    pub fn new(db_name: &str) -> Self {
        Self::with_batch_size(db_name, DEFAULT_BATCH_SIZE)
    }

    #[must_use]
    pub fn with_batch_size(db_name: &str, batch_size: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                db_name: db_name.to_string(),
                batch_size: batch_size.max(1),
                collections: RwLock::new(BTreeMap::new()),
                journal: Mutex::new(Vec::new()),
                faults: Mutex::new(HashMap::new()),
                cursor_fault: Mutex::new(None),
                open_cursors: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }

    /// Loads documents directly, bypassing the journal.
    pub fn seed(&self, collection: &str, docs: impl IntoIterator<Item = Document>) {
        let mut cols = self.shared.collections.write();
        let entry = cols.entry(collection.to_string()).or_default();
        for mut d in docs {
            if !d.contains_key(crate::types::ID_FIELD) {
                d.insert(crate::types::ID_FIELD, crate::oid::generate());
            }
            entry.push(d);
        }
    }

    /// Current contents of a collection, in storage order.
    #[must_use]
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.shared.collections.read().get(collection).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn journal(&self) -> Vec<Call> {
        self.shared.journal.lock().clone()
    }

    pub fn clear_journal(&self) {
        self.shared.journal.lock().clear();
    }

    /// Makes the next call of kind `op` fail with a backend error.
    pub fn fail_next(&self, op: Op, message: &str) {
        self.shared.faults.lock().insert(op, message.to_string());
    }

    /// Makes the next cursor fail once it has served `after` documents.
    pub fn fail_cursor_after(&self, after: usize, message: &str) {
        *self.shared.cursor_fault.lock() = Some((after, message.to_string()));
    }

    /// Cursors opened but not yet closed.
    #[must_use]
    pub fn open_cursors(&self) -> usize {
        self.shared.open_cursors.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for MemoryBackend {
    async fn collection(&self, name: &str) -> Result<Arc<dyn CollectionHandle>> {
        self.shared.record(Call::Collection(name.to_string()));
        self.shared.check(Op::Collection)?;
        Ok(Arc::new(MemoryCollection::new(name.to_string(), Arc::clone(&self.shared))))
    }

    async fn collection_names(&self) -> Result<Vec<String>> {
        self.shared.record(Call::Names);
        self.shared.check(Op::Names)?;
        let cols = self.shared.collections.read();
        Ok(cols.keys().map(|n| format!("{}.{n}", self.shared.db_name)).collect())
    }
}
