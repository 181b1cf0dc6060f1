//! Storage collaborator seam.
//!
//! The executor only ever talks to a backend through these traits. A
//! connection hands out collection handles by name; handles expose exactly
//! the primitive calls the command table needs.

use crate::errors::Result;
use crate::types::Document;
use async_trait::async_trait;
use bson::Bson;
use std::sync::Arc;

/// Options of a cursor-opening `find`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Option<Document>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
    /// Free-form backend flags carried by the query.
    pub extra: Document,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOptions {
    pub upsert: bool,
    pub return_new: bool,
    pub extra: Document,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindAndModifyOptions {
    pub return_new: bool,
    pub upsert: bool,
    pub remove: bool,
    pub extra: Document,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct UpdateReport {
    pub matched: u64,
    pub modified: u64,
    pub upserted_id: Option<Bson>,
}

/// Resolves collection handles; may need to wait for the connection to be ready.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn collection(&self, name: &str) -> Result<Arc<dyn CollectionHandle>>;

    /// Raw collection names as the backend reports them (possibly namespaced).
    async fn collection_names(&self) -> Result<Vec<String>>;
}

#[async_trait]
pub trait CollectionHandle: Send + Sync {
    fn name(&self) -> &str;

    async fn find(
        &self,
        filter: &Document,
        projection: Option<&Document>,
        options: &FindOptions,
    ) -> Result<Box<dyn Cursor>>;

    async fn count(&self, filter: &Document) -> Result<u64>;

    /// Returns the stored documents, identifiers included.
    async fn insert(&self, docs: Vec<Document>, options: &Document) -> Result<Vec<Document>>;

    async fn update(
        &self,
        filter: &Document,
        changes: &Document,
        options: &UpdateOptions,
    ) -> Result<UpdateReport>;

    async fn find_and_modify(
        &self,
        filter: &Document,
        sort: Option<&Document>,
        changes: &Document,
        options: &FindAndModifyOptions,
    ) -> Result<Option<Document>>;

    /// Returns the number of removed documents.
    async fn remove(&self, filter: &Document, options: &Document) -> Result<u64>;

    async fn drop_collection(&self) -> Result<bool>;

    async fn aggregate(&self, pipeline: &[Document], options: &Document) -> Result<Vec<Document>>;
}

/// Server-side result handle. Batches are pulled on demand; `close` releases
/// the server resources and must be safe to call more than once.
#[async_trait]
pub trait Cursor: Send {
    /// `Ok(None)` once the cursor is exhausted.
    async fn next_batch(&mut self) -> Result<Option<Vec<Document>>>;

    fn close(&mut self);

    /// Drains the cursor into memory and releases it.
    async fn to_vec(&mut self) -> Result<Vec<Document>> {
        let mut out = Vec::new();
        loop {
            match self.next_batch().await {
                Ok(Some(batch)) => out.extend(batch),
                Ok(None) => break,
                Err(e) => {
                    self.close();
                    return Err(e);
                }
            }
        }
        self.close();
        Ok(out)
    }
}
