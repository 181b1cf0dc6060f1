use crate::context::Context;
use crate::errors::{DbError, Result};
use crate::exec::{Executor, Outcome};
use crate::oid;
use crate::stream::DocumentStream;
use crate::types::{Document, ID_FIELD};
use bson::Bson;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

use super::command::Command;
use super::types::{Assertion, QueryState, Selection};

/// Chainable description of a database operation.
///
/// Builder methods consume and return the query; nothing touches the
/// backend until [`Query::execute`], [`Query::stream`] or one of the
/// finalizers is awaited.
pub struct Query {
    ctx: Context,
    state: QueryState,
}

/// Produces a replayable template: target, filter, projection, sort,
/// paging, options and any recorded error are copied; the pending command
/// and expectations are not.
impl Clone for Query {
    fn clone(&self) -> Self {
        Self { ctx: self.ctx.clone(), state: self.state.template() }
    }
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query").field("state", &self.state).finish_non_exhaustive()
    }
}

impl Query {
    #[must_use]
    pub fn new(ctx: Context, collection: Option<String>) -> Self {
        let options = ctx.config().base_options();
        Self { state: QueryState::new(collection, options), ctx }
    }

    /// Starts a fresh query on `name` sharing this query's context.
    #[must_use]
    pub fn collection(&self, name: &str) -> Self {
        Self::new(self.ctx.clone(), Some(name.to_string()))
    }

    /// Alias of [`Query::collection`].
    #[must_use]
    pub fn from(&self, name: &str) -> Self {
        self.collection(name)
    }

    #[must_use]
    pub const fn state(&self) -> &QueryState {
        &self.state
    }

    #[must_use]
    pub const fn context(&self) -> &Context {
        &self.ctx
    }

    // ----- filter / options -----

    /// Merges `fragment` into the filter; later keys overwrite earlier ones.
    #[must_use]
    pub fn filter(mut self, fragment: Document) -> Self {
        for (k, v) in fragment {
            self.state.filter.insert(k, v);
        }
        self
    }

    /// Same as [`Query::filter`] with the fragment given as JSON text.
    /// Malformed text is recorded and reported when the query runs.
    #[must_use]
    pub fn filter_json(mut self, text: &str) -> Self {
        match super::parse::fragment(text) {
            Ok(fragment) => self.filter(fragment),
            Err(e) => {
                self.state.fail(e);
                self
            }
        }
    }

    /// Matches documents where `field` is false, null, undefined, 0 or absent.
    #[must_use]
    pub fn not(self, field: &str) -> Self {
        let falsy = vec![Bson::Boolean(false), Bson::Null, Bson::Undefined, Bson::Int32(0)];
        let mut cond = Document::new();
        cond.insert("$in", falsy);
        let mut fragment = Document::new();
        fragment.insert(field, cond);
        self.filter(fragment)
    }

    #[must_use]
    pub fn select(mut self, projection: impl Into<Selection>) -> Self {
        self.state.projection = Some(projection.into().into_projection());
        self
    }

    #[must_use]
    pub fn sort(mut self, spec: Document) -> Self {
        self.state.sort = Some(spec);
        self
    }

    #[must_use]
    pub fn order_by(self, spec: Document) -> Self {
        self.sort(spec)
    }

    #[must_use]
    pub fn limit(mut self, n: usize) -> Self {
        self.state.limit = Some(n);
        self
    }

    #[must_use]
    pub fn take(self, n: usize) -> Self {
        self.limit(n)
    }

    #[must_use]
    pub fn skip(mut self, n: usize) -> Self {
        self.state.skip = Some(n);
        self
    }

    /// Merges backend flags into the options.
    #[must_use]
    pub fn options(mut self, extra: Document) -> Self {
        for (k, v) in extra {
            self.state.options.insert(k, v);
        }
        self
    }

    /// Requires the resolved result to stand for exactly `n` documents.
    /// A value that is not a finite non-negative whole number is recorded
    /// as an error and reported on resolution.
    #[must_use]
    pub fn expect(mut self, n: impl Into<Bson>) -> Self {
        match expected_count(&n.into()) {
            Some(n) => self.state.expected = Some(n),
            None => self
                .state
                .fail(DbError::InvalidArgument("expect requires a finite, non-negative whole number".into())),
        }
        self
    }

    /// Registers a check run against the resolved outcome.
    #[must_use]
    pub fn assert<F>(mut self, predicate: F, message: Option<&str>) -> Self
    where
        F: Fn(&Outcome) -> bool + Send + Sync + 'static,
    {
        self.state.assertion =
            Some(Assertion { predicate: Arc::new(predicate), message: message.map(str::to_string) });
        self
    }

    /// Filters on one normalized identifier and switches to single-result mode.
    #[must_use]
    pub fn by_id(mut self, id: impl Into<Bson>) -> Self {
        let id = id.into();
        if oid::is_blank(&id) {
            self.state.fail(DbError::InvalidArgument("id must not be blank".into()));
            return self;
        }
        self.state.filter.insert(ID_FIELD, oid::object_id(id));
        self.state.limit = Some(1);
        self.state.first = true;
        self
    }

    /// Filters on a list of normalized identifiers and caps the limit at
    /// their count. Anything but an array is recorded as an error.
    #[must_use]
    pub fn by_ids(mut self, ids: impl Into<Bson>) -> Self {
        let Bson::Array(items) = ids.into() else {
            self.state.fail(DbError::InvalidArgument("ids must be an Array".into()));
            return self;
        };
        self.state.limit = Some(items.len());
        let ids: Vec<Bson> = items.into_iter().map(oid::object_id).collect();
        let mut cond = Document::new();
        cond.insert("$in", ids);
        self.state.filter.insert(ID_FIELD, cond);
        self
    }

    /// Single-result read: resolves to the first match or nothing.
    #[must_use]
    pub fn first(mut self) -> Self {
        self.state.first = true;
        self.state.limit = Some(1);
        self
    }

    /// Like [`Query::first`], resolving to `default` when nothing matched.
    #[must_use]
    pub fn first_or_default(mut self, default: Document) -> Self {
        self.state.default = Some(default);
        self.first()
    }

    // ----- commands -----

    fn command(mut self, command: Command) -> Self {
        self.state.command = command;
        self
    }

    #[must_use]
    pub fn insert(self, doc: Document) -> Self {
        self.command(Command::Insert(vec![doc]))
    }

    #[must_use]
    pub fn insert_many(self, docs: Vec<Document>) -> Self {
        self.command(Command::Insert(docs))
    }

    #[must_use]
    pub fn update(self, changes: Document) -> Self {
        self.command(Command::Update(changes))
    }

    #[must_use]
    pub fn upsert(self, changes: Document) -> Self {
        self.command(Command::Upsert(changes))
    }

    /// Resolves to the matched document as it was before `changes`.
    #[must_use]
    pub fn find_and_modify(self, changes: Document) -> Self {
        self.command(Command::FindAndModify(changes))
    }

    /// Resolves to the matched document after `changes`.
    #[must_use]
    pub fn modify_and_find(self, changes: Document) -> Self {
        self.command(Command::ModifyAndFind(changes))
    }

    /// Atomically removes and returns one matching document.
    #[must_use]
    pub fn pull(self) -> Self {
        self.command(Command::Pull)
    }

    /// Removes the matching documents; refuses to run with an empty filter.
    #[must_use]
    pub fn remove(self) -> Self {
        self.command(Command::Remove)
    }

    #[must_use]
    pub fn remove_all(self) -> Self {
        self.command(Command::RemoveAll)
    }

    #[must_use]
    pub fn count(self) -> Self {
        self.command(Command::Count)
    }

    #[must_use]
    pub fn exists(self) -> Self {
        self.command(Command::Exists)
    }

    #[must_use]
    pub fn aggregate(self, pipeline: Vec<Document>) -> Self {
        self.command(Command::Aggregate(pipeline))
    }

    /// Drops the whole collection, retargeting the query to `name` first.
    #[must_use]
    pub fn drop_collection(mut self, name: Option<&str>) -> Self {
        if let Some(name) = name {
            self.state.collection = Some(name.to_string());
        }
        self.command(Command::Drop(name.map(str::to_string)))
    }

    /// Sets the command by name. An unknown name or an ill-shaped argument
    /// is recorded and reported on resolution.
    #[must_use]
    pub fn command_named(mut self, name: &str, arg: Option<Bson>) -> Self {
        match Command::from_parts(name, arg) {
            Ok(Command::Drop(target)) => self.drop_collection(target.as_deref()),
            Ok(command) => self.command(command),
            Err(e) => {
                self.state.fail(e);
                self
            }
        }
    }

    // ----- resolution -----

    fn executor(&self) -> Executor {
        Executor::new(self.ctx.clone())
    }

    /// Dispatches the pending command and returns its normalized result.
    ///
    /// # Errors
    /// See [`Executor::run`].
    pub async fn execute(&self) -> Result<Outcome> {
        self.executor().run(&self.state).await
    }

    /// Lazily streams the results of a read query.
    #[must_use]
    pub fn stream(&self) -> DocumentStream {
        DocumentStream::open(self.executor(), self.state.clone(), self.ctx.config().stream_buffer)
    }

    /// Streams the results into `f` one at a time; see [`DocumentStream::for_each`].
    ///
    /// # Errors
    /// The first stream or callback error.
    pub async fn for_each<F, Fut>(&self, f: F) -> Result<()>
    where
        F: FnMut(Document) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.stream().for_each(f).await
    }

    /// Reads every match, whatever command is pending.
    ///
    /// # Errors
    /// Recorded construction errors, backend errors and failed post-conditions.
    pub async fn to_array(&self) -> Result<Vec<Document>> {
        let mut state = self.state.clone();
        state.command = Command::Read;
        state.first = false;
        Ok(self.executor().run(&state).await?.into_documents().unwrap_or_default())
    }

    /// Reads the first match.
    ///
    /// # Errors
    /// As [`Query::to_array`].
    pub async fn one(&self) -> Result<Option<Document>> {
        let mut state = self.state.clone();
        state.command = Command::Read;
        state.first = true;
        state.limit = Some(1);
        Ok(self.executor().run(&state).await?.into_document())
    }

    async fn matched(&self) -> Result<u64> {
        let mut state = self.state.clone();
        state.command = Command::Count;
        state.expected = None;
        state.assertion = None;
        Ok(self.executor().run(&state).await?.count().unwrap_or(0))
    }

    /// True when exactly `expected` documents match (one when `None`).
    ///
    /// # Errors
    /// Recorded construction errors and backend errors.
    pub async fn check_exists(&self, expected: Option<u64>) -> Result<bool> {
        Ok(self.matched().await? == expected.unwrap_or(1))
    }

    /// Fails with a cardinality error unless exactly `expected` documents
    /// match (one when `None`).
    ///
    /// # Errors
    /// `Cardinality` on a mismatch, plus everything [`Query::check_exists`] reports.
    pub async fn assert_exists(&self, expected: Option<u64>) -> Result<()> {
        let expected = expected.unwrap_or(1);
        let actual = self.matched().await?;
        if actual == expected { Ok(()) } else { Err(DbError::Cardinality { expected, actual }) }
    }

    /// Captures the query, pending command included, as a thunk that runs it
    /// each time it is called.
    #[must_use]
    pub fn defer(&self) -> impl Fn() -> BoxFuture<'static, Result<Outcome>> + Send + Sync + 'static {
        let executor = self.executor();
        let state = self.state.clone();
        move || {
            let executor = executor.clone();
            let state = state.clone();
            async move { executor.run(&state).await }.boxed()
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn expected_count(v: &Bson) -> Option<u64> {
    match v {
        Bson::Int32(i) => u64::try_from(*i).ok(),
        Bson::Int64(i) => u64::try_from(*i).ok(),
        Bson::Double(f) if f.is_finite() && *f >= 0.0 && f.fract() == 0.0 => Some(*f as u64),
        _ => None,
    }
}
