use crate::backend::{
    CollectionHandle, Cursor, FindAndModifyOptions, FindOptions, UpdateOptions, UpdateReport,
};
use crate::errors::{DbError, Result};
use crate::query::has_operators;
use crate::types::{Document, ID_FIELD};
use async_trait::async_trait;
use bson::Bson;
use std::sync::Arc;

use super::cursor::MemoryCursor;
use super::eval::{bson_equal, matches, project, sort_docs, truthy};
use super::{Call, Op, Shared, aggregate, update};

pub struct MemoryCollection {
    name: String,
    shared: Arc<Shared>,
}

impl MemoryCollection {
    pub(crate) const fn new(name: String, shared: Arc<Shared>) -> Self {
        Self { name, shared }
    }

    fn snapshot(&self) -> Vec<Document> {
        self.shared.collections.read().get(&self.name).cloned().unwrap_or_default()
    }

    /// Position of the first document matching `filter` under `sort`.
    fn select_one(docs: &[Document], filter: &Document, sort: Option<&Document>) -> Option<usize> {
        let mut candidates: Vec<(usize, Document)> = docs
            .iter()
            .enumerate()
            .filter(|(_, d)| matches(d, filter))
            .map(|(i, d)| (i, d.clone()))
            .collect();
        if let Some(sort) = sort
            && !sort.is_empty()
        {
            let specs = crate::query::SortSpec::from_document(sort);
            candidates.sort_by(|a, b| super::eval::compare_docs(&a.1, &b.1, &specs));
        }
        candidates.first().map(|(i, _)| *i)
    }

    fn assign_id(doc: &mut Document) -> Bson {
        if let Some(id) = doc.get(ID_FIELD) {
            return id.clone();
        }
        let id = crate::oid::generate();
        doc.insert(ID_FIELD, id.clone());
        id
    }

    fn insert_upserted(docs: &mut Vec<Document>, filter: &Document, changes: &Document) -> Result<Document> {
        let mut fresh = update::upsert_seed(filter);
        if has_operators(changes) {
            update::apply(&mut fresh, changes, true)?;
        } else {
            let filter_id = fresh.get(ID_FIELD).cloned();
            fresh = changes.clone();
            if let Some(id) = filter_id
                && !fresh.contains_key(ID_FIELD)
            {
                fresh.insert(ID_FIELD, id);
            }
        }
        let id = Self::assign_id(&mut fresh);
        if docs.iter().any(|x| x.get(ID_FIELD).is_some_and(|v| bson_equal(v, &id))) {
            return Err(DbError::Backend(format!("duplicate key {ID_FIELD}: {id}")));
        }
        docs.push(fresh.clone());
        Ok(fresh)
    }
}

#[async_trait]
impl CollectionHandle for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(
        &self,
        filter: &Document,
        projection: Option<&Document>,
        options: &FindOptions,
    ) -> Result<Box<dyn Cursor>> {
        self.shared.record(Call::Find {
            collection: self.name.clone(),
            filter: filter.clone(),
            projection: projection.cloned(),
            options: options.clone(),
        });
        self.shared.check(Op::Find)?;

        let mut docs: Vec<Document> = self.snapshot().into_iter().filter(|d| matches(d, filter)).collect();
        if let Some(sort) = &options.sort {
            sort_docs(&mut docs, sort);
        }
        let skip = options.skip.unwrap_or(0);
        let limit = options.limit.filter(|n| *n > 0).unwrap_or(usize::MAX);
        let mut docs: Vec<Document> = docs.into_iter().skip(skip).take(limit).collect();
        if let Some(p) = projection
            && !p.is_empty()
        {
            docs = docs.iter().map(|d| project(d, p)).collect();
        }
        log::trace!(target: "docquery::memory", "find on {} matched {}", self.name, docs.len());
        Ok(Box::new(MemoryCursor::new(
            docs,
            self.shared.batch_size(),
            Arc::clone(&self.shared.open_cursors),
            self.shared.take_cursor_fault(),
        )))
    }

    async fn count(&self, filter: &Document) -> Result<u64> {
        self.shared.record(Call::Count { collection: self.name.clone(), filter: filter.clone() });
        self.shared.check(Op::Count)?;
        let cols = self.shared.collections.read();
        let n = cols.get(&self.name).map_or(0, |docs| docs.iter().filter(|d| matches(d, filter)).count());
        Ok(n as u64)
    }

    async fn insert(&self, docs: Vec<Document>, options: &Document) -> Result<Vec<Document>> {
        self.shared.record(Call::Insert {
            collection: self.name.clone(),
            docs: docs.clone(),
            options: options.clone(),
        });
        self.shared.check(Op::Insert)?;
        let mut cols = self.shared.collections.write();
        let stored = cols.entry(self.name.clone()).or_default();
        let mut out = Vec::with_capacity(docs.len());
        for mut d in docs {
            let id = Self::assign_id(&mut d);
            let duplicate = stored
                .iter()
                .chain(out.iter())
                .any(|x| x.get(ID_FIELD).is_some_and(|v| bson_equal(v, &id)));
            if duplicate {
                return Err(DbError::Backend(format!("duplicate key {ID_FIELD}: {id}")));
            }
            out.push(d);
        }
        stored.extend(out.iter().cloned());
        Ok(out)
    }

    async fn update(
        &self,
        filter: &Document,
        changes: &Document,
        options: &UpdateOptions,
    ) -> Result<UpdateReport> {
        self.shared.record(Call::Update {
            collection: self.name.clone(),
            filter: filter.clone(),
            changes: changes.clone(),
            options: options.clone(),
        });
        self.shared.check(Op::Update)?;
        let multi = options.extra.get("multi").is_some_and(truthy);
        let mut cols = self.shared.collections.write();
        let docs = cols.entry(self.name.clone()).or_default();

        let mut report = UpdateReport::default();
        for d in docs.iter_mut().filter(|d| matches(d, filter)) {
            report.matched += 1;
            if update::apply(d, changes, false)? {
                report.modified += 1;
            }
            if !multi {
                break;
            }
        }
        if report.matched == 0 && options.upsert {
            let fresh = Self::insert_upserted(docs, filter, changes)?;
            report.upserted_id = fresh.get(ID_FIELD).cloned();
        }
        Ok(report)
    }

    async fn find_and_modify(
        &self,
        filter: &Document,
        sort: Option<&Document>,
        changes: &Document,
        options: &FindAndModifyOptions,
    ) -> Result<Option<Document>> {
        self.shared.record(Call::FindAndModify {
            collection: self.name.clone(),
            filter: filter.clone(),
            sort: sort.cloned(),
            changes: changes.clone(),
            options: options.clone(),
        });
        self.shared.check(Op::FindAndModify)?;
        let mut cols = self.shared.collections.write();
        let docs = cols.entry(self.name.clone()).or_default();

        let Some(pos) = Self::select_one(docs, filter, sort) else {
            if options.upsert && !options.remove {
                let fresh = Self::insert_upserted(docs, filter, changes)?;
                return Ok(options.return_new.then_some(fresh));
            }
            return Ok(None);
        };
        if options.remove {
            return Ok(Some(docs.remove(pos)));
        }
        let before = docs[pos].clone();
        update::apply(&mut docs[pos], changes, false)?;
        Ok(Some(if options.return_new { docs[pos].clone() } else { before }))
    }

    async fn remove(&self, filter: &Document, options: &Document) -> Result<u64> {
        self.shared.record(Call::Remove {
            collection: self.name.clone(),
            filter: filter.clone(),
            options: options.clone(),
        });
        self.shared.check(Op::Remove)?;
        let mut cols = self.shared.collections.write();
        let Some(docs) = cols.get_mut(&self.name) else { return Ok(0) };
        let before = docs.len();
        docs.retain(|d| !matches(d, filter));
        Ok((before - docs.len()) as u64)
    }

    async fn drop_collection(&self) -> Result<bool> {
        self.shared.record(Call::Drop { collection: self.name.clone() });
        self.shared.check(Op::Drop)?;
        Ok(self.shared.collections.write().remove(&self.name).is_some())
    }

    async fn aggregate(&self, pipeline: &[Document], _options: &Document) -> Result<Vec<Document>> {
        self.shared.record(Call::Aggregate { collection: self.name.clone(), pipeline: pipeline.to_vec() });
        self.shared.check(Op::Aggregate)?;
        aggregate::run(self.snapshot(), pipeline)
    }
}
