use crate::errors::DbError;
use crate::exec::Outcome;
use crate::types::{CollectionName, Document};
use bson::Bson;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::command::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    /// Mongo-style direction value (`1` / `-1`).
    #[must_use]
    pub const fn direction(self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }

    /// Reads a direction value; anything negative is descending.
    #[must_use]
    pub fn from_bson(v: &Bson) -> Self {
        let negative = match v {
            Bson::Int32(i) => *i < 0,
            Bson::Int64(i) => *i < 0,
            Bson::Double(f) => *f < 0.0,
            Bson::String(s) => s.eq_ignore_ascii_case("desc") || s == "-1",
            _ => false,
        };
        if negative { Self::Desc } else { Self::Asc }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

impl SortSpec {
    /// Expands a `{field: direction}` document, keeping key order.
    #[must_use]
    pub fn from_document(sort: &Document) -> Vec<Self> {
        sort.iter()
            .map(|(field, dir)| Self { field: field.to_string(), order: Order::from_bson(dir) })
            .collect()
    }
}

/// Argument accepted by `Query::select`: an explicit projection document or
/// an ordered list of field names to include.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Spec(Document),
    Fields(Vec<String>),
}

impl Selection {
    #[must_use]
    pub fn into_projection(self) -> Document {
        match self {
            Self::Spec(d) => d,
            Self::Fields(fields) => {
                let mut out = Document::new();
                for f in fields {
                    out.insert(f, true);
                }
                out
            }
        }
    }
}

impl From<Document> for Selection {
    fn from(d: Document) -> Self {
        Self::Spec(d)
    }
}

impl From<Vec<String>> for Selection {
    fn from(v: Vec<String>) -> Self {
        Self::Fields(v)
    }
}

impl From<Vec<&str>> for Selection {
    fn from(v: Vec<&str>) -> Self {
        Self::Fields(v.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for Selection {
    fn from(v: &[&str]) -> Self {
        Self::Fields(v.iter().map(|s| (*s).to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Selection {
    fn from(v: [&str; N]) -> Self {
        Self::Fields(v.iter().map(|s| (*s).to_string()).collect())
    }
}

pub type Predicate = Arc<dyn Fn(&Outcome) -> bool + Send + Sync>;

/// Post-resolution check registered with `Query::assert`.
#[derive(Clone)]
pub struct Assertion {
    pub predicate: Predicate,
    pub message: Option<String>,
}

impl fmt::Debug for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assertion").field("message", &self.message).finish_non_exhaustive()
    }
}

/// Everything a query has accumulated; this is what the executor receives.
#[derive(Debug, Clone)]
pub struct QueryState {
    pub collection: Option<CollectionName>,
    pub filter: Document,
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
    pub options: Document,
    pub command: Command,
    pub expected: Option<u64>,
    pub assertion: Option<Assertion>,
    /// Single-document retrieval mode (`first`, `by_id`).
    pub first: bool,
    /// Returned by a single-document read that matched nothing.
    pub default: Option<Document>,
    pub error: Option<DbError>,
}

impl QueryState {
    #[must_use]
    pub fn new(collection: Option<CollectionName>, options: Document) -> Self {
        Self {
            collection,
            filter: Document::new(),
            projection: None,
            sort: None,
            limit: None,
            skip: None,
            options,
            command: Command::Read,
            expected: None,
            assertion: None,
            first: false,
            default: None,
            error: None,
        }
    }

    /// Copy of the template parts: target, filter, projection, sort, paging and options.
    /// A recorded error is carried over; the command and expectations are not.
    #[must_use]
    pub fn template(&self) -> Self {
        let mut out = Self::new(self.collection.clone(), self.options.clone());
        out.error.clone_from(&self.error);
        out.filter = self.filter.clone();
        out.projection = self.projection.clone();
        out.sort = self.sort.clone();
        out.limit = self.limit;
        out.skip = self.skip;
        out
    }

    /// Records a construction error; the first one recorded wins.
    pub fn fail(&mut self, err: DbError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn field_list_becomes_inclusion_projection() {
        let p = Selection::from(vec!["a", "b.c"]).into_projection();
        assert_eq!(p, doc! { "a": true, "b.c": true });
    }

    #[test]
    fn sort_document_keeps_key_order() {
        let specs = SortSpec::from_document(&doc! { "b": -1, "a": 1 });
        assert_eq!(specs[0], SortSpec { field: "b".into(), order: Order::Desc });
        assert_eq!(specs[1], SortSpec { field: "a".into(), order: Order::Asc });
    }
}
