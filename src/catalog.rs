use crate::context::Context;
use crate::errors::{DbError, Result};
use crate::query::Query;

/// Snapshot of the collections a connection reported, handing out queries
/// by name.
#[derive(Debug, Clone)]
pub struct Catalog {
    ctx: Context,
    names: Vec<String>,
}

impl Catalog {
    /// Lists the backend's collections once and keeps the names.
    ///
    /// # Errors
    /// Propagates the backend's failure to list collections.
    pub async fn connect(ctx: Context) -> Result<Self> {
        let raw = ctx.connection().collection_names().await?;
        let names = raw.iter().map(|n| strip_namespace(n).to_string()).collect();
        log::debug!(target: "docquery::exec", "catalog loaded: {raw:?}");
        Ok(Self { ctx, names })
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// A query targeting `name`.
    ///
    /// # Errors
    /// `Configuration` when the collection was not listed.
    pub fn get(&self, name: &str) -> Result<Query> {
        if self.contains(name) {
            Ok(self.ctx.collection(name))
        } else {
            Err(DbError::Configuration(format!("unknown collection {name}")))
        }
    }

    /// A query with no target.
    #[must_use]
    pub fn query(&self) -> Query {
        self.ctx.query()
    }

    #[must_use]
    pub const fn context(&self) -> &Context {
        &self.ctx
    }
}

/// Removes a leading `<word>.` namespace, if any.
fn strip_namespace(name: &str) -> &str {
    match name.split_once('.') {
        Some((prefix, rest))
            if prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') =>
        {
            rest
        }
        _ => name,
    }
}
