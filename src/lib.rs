//! Declarative query specifications for document stores.
//!
//! A [`Query`] accumulates a filter, projection, sort, paging, options and a
//! pending command. Awaiting [`Query::execute`] hands the finished state to
//! the [`Executor`], which maps the command to backend calls through the
//! [`backend`] traits; [`Query::stream`] reads the results through a cursor
//! instead.
//!
//! ```no_run
//! # async fn demo() -> docquery::Result<()> {
//! use bson::doc;
//! use docquery::{Context, MemoryBackend};
//!
//! let ctx = Context::new(MemoryBackend::default());
//! ctx.collection("users").insert(doc! { "name": "ada" }).execute().await?;
//! let found = ctx.collection("users").filter(doc! { "name": "ada" }).one().await?;
//! assert!(found.is_some());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod catalog;
pub mod config;
pub mod context;
pub mod errors;
pub mod exec;
pub mod logger;
pub mod memory;
pub mod oid;
pub mod query;
pub mod stream;
pub mod types;

pub use catalog::Catalog;
pub use config::QueryConfig;
pub use context::Context;
pub use errors::{DbError, ErrorKind, Result};
pub use exec::{Executor, Outcome};
pub use memory::MemoryBackend;
pub use query::{Command, CommandKind, Query, Selection};
pub use stream::DocumentStream;

/// Initializes logging from `log4rs.yaml` in the working directory.
///
/// # Errors
/// See [`logger::init`].
pub fn init() -> Result<()> {
    logger::init()
}
