//! Execution adapter: turns a finished [`QueryState`] into backend calls.

mod outcome;

pub use outcome::Outcome;

use crate::backend::{CollectionHandle, Cursor, FindAndModifyOptions, FindOptions, UpdateOptions};
use crate::context::Context;
use crate::errors::{DbError, Result};
use crate::oid;
use crate::query::{Command, QueryState, has_operators};
use crate::types::{Document, ID_FIELD};
use std::sync::Arc;

const TARGET: &str = "docquery::exec";

#[derive(Clone, Debug)]
pub struct Executor {
    ctx: Context,
}

impl Executor {
    #[must_use]
    pub const fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Dispatches the pending command, then applies the cardinality
    /// expectation and the registered assertion.
    ///
    /// # Errors
    /// Any recorded construction error, a missing target, the remove guard,
    /// backend failures, and failed post-conditions.
    pub async fn run(&self, state: &QueryState) -> Result<Outcome> {
        let mut outcome = self.dispatch(state).await?;
        if let Some(expected) = state.expected {
            let actual = outcome.cardinality().ok_or_else(|| {
                DbError::Configuration(format!("expect() does not apply to {}", state.command.kind()))
            })?;
            if actual != expected {
                return Err(DbError::Cardinality { expected, actual });
            }
        }
        if state.first
            && let Outcome::Document(found) = &mut outcome
            && found.is_none()
        {
            found.clone_from(&state.default);
        }
        if let Some(assertion) = &state.assertion
            && !(assertion.predicate)(&outcome)
        {
            let message = assertion.message.clone().unwrap_or_else(|| "predicate rejected the result".into());
            return Err(DbError::Assertion(message));
        }
        Ok(outcome)
    }

    /// Opens a cursor for a read query without materializing it.
    ///
    /// # Errors
    /// Fails on a recorded construction error, a non-read command, a missing
    /// target, or when the backend refuses the find.
    pub async fn open_cursor(&self, state: &QueryState) -> Result<Box<dyn Cursor>> {
        if let Some(err) = &state.error {
            return Err(err.clone());
        }
        if state.command != Command::Read {
            return Err(DbError::Stream(format!(
                "streaming requires a read query, found {}",
                state.command.kind()
            )));
        }
        let target = target(state)?;
        log::log!(target: "docquery::stream", self.ctx.config().dispatch_level(), "streaming {target} where {}", state.filter);
        let coll = self.resolve(target).await?;
        coll.find(&state.filter, state.projection.as_ref(), &find_options(state)).await
    }

    async fn resolve(&self, name: &str) -> Result<Arc<dyn CollectionHandle>> {
        self.ctx.connection().collection(name).await
    }

    async fn dispatch(&self, state: &QueryState) -> Result<Outcome> {
        if let Some(err) = &state.error {
            return Err(err.clone());
        }
        let target = target(state)?;
        if state.command == Command::Remove && state.filter.is_empty() {
            return Err(DbError::Guard(
                "no `where` query specified; use remove_all to remove every document".into(),
            ));
        }
        log::log!(
            target: TARGET,
            self.ctx.config().dispatch_level(),
            "{} on {target} where {}",
            state.command.kind(),
            state.filter
        );
        let coll = self.resolve(target).await?;
        let options = &state.options;

        Ok(match &state.command {
            Command::Read => {
                let mut cursor =
                    coll.find(&state.filter, state.projection.as_ref(), &find_options(state)).await?;
                let docs = cursor.to_vec().await?;
                if state.first {
                    Outcome::Document(docs.into_iter().next())
                } else {
                    Outcome::Documents(docs)
                }
            }
            Command::Count => Outcome::Count(coll.count(&state.filter).await?),
            Command::Exists => Outcome::Exists(coll.count(&state.filter).await? > 0),
            Command::Insert(docs) => Outcome::Inserted(coll.insert(docs.clone(), options).await?),
            Command::Update(payload) => {
                let (filter, changes) = relocate_id(&state.filter, payload, true);
                let opts = UpdateOptions { upsert: false, return_new: true, extra: options.clone() };
                Outcome::Updated(coll.update(&filter, &changes, &opts).await?)
            }
            Command::Upsert(payload) => {
                let (filter, changes) = relocate_id(&state.filter, payload, has_operators(payload));
                let opts = UpdateOptions { upsert: true, return_new: false, extra: options.clone() };
                Outcome::Updated(coll.update(&filter, &changes, &opts).await?)
            }
            Command::FindAndModify(changes) | Command::ModifyAndFind(changes) => {
                let mut sort = Document::new();
                sort.insert(ID_FIELD, 1);
                let sort = state.sort.clone().unwrap_or(sort);
                let opts = FindAndModifyOptions {
                    return_new: matches!(state.command, Command::ModifyAndFind(_)),
                    upsert: false,
                    remove: false,
                    extra: options.clone(),
                };
                Outcome::Document(coll.find_and_modify(&state.filter, Some(&sort), changes, &opts).await?)
            }
            Command::Pull => {
                let opts = FindAndModifyOptions { remove: true, extra: options.clone(), ..Default::default() };
                let found =
                    coll.find_and_modify(&state.filter, state.sort.as_ref(), &Document::new(), &opts).await?;
                Outcome::Document(found)
            }
            Command::Remove => Outcome::Removed(coll.remove(&state.filter, options).await?),
            Command::RemoveAll => Outcome::Removed(coll.remove(&Document::new(), options).await?),
            Command::Drop(_) => Outcome::Dropped(coll.drop_collection().await?),
            Command::Aggregate(pipeline) => Outcome::Documents(coll.aggregate(pipeline, options).await?),
        })
    }
}

fn target(state: &QueryState) -> Result<&str> {
    if let Command::Drop(Some(name)) = &state.command {
        return Ok(name);
    }
    state
        .collection
        .as_deref()
        .ok_or_else(|| DbError::Configuration("collection must be specified".into()))
}

fn find_options(state: &QueryState) -> FindOptions {
    FindOptions {
        sort: state.sort.clone(),
        limit: state.limit,
        skip: state.skip,
        extra: state.options.clone(),
    }
}

/// Copies the payload's identifier into the filter, normalized. With `strip`
/// it is also taken out of the payload handed to the backend. The caller's
/// payload is never touched.
fn relocate_id(filter: &Document, payload: &Document, strip: bool) -> (Document, Document) {
    let mut filter = filter.clone();
    let mut changes = payload.clone();
    if let Some(id) = payload.get(ID_FIELD) {
        let id = oid::object_id(id.clone());
        if strip {
            changes.remove(ID_FIELD);
        } else {
            changes.insert(ID_FIELD, id.clone());
        }
        filter.insert(ID_FIELD, id);
    }
    (filter, changes)
}
