use crate::backend::UpdateReport;
use crate::types::Document;

/// Result of resolving a query. The variant follows from the command, not
/// from anything the caller asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// `read` and `aggregate`.
    Documents(Vec<Document>),
    /// Single-result reads and the find-and-modify family.
    Document(Option<Document>),
    Count(u64),
    Exists(bool),
    Inserted(Vec<Document>),
    Updated(UpdateReport),
    Removed(u64),
    Dropped(bool),
}

impl Outcome {
    /// Number of documents the result stands for, when that is meaningful.
    #[must_use]
    pub fn cardinality(&self) -> Option<u64> {
        match self {
            Self::Documents(d) | Self::Inserted(d) => Some(d.len() as u64),
            Self::Document(d) => Some(u64::from(d.is_some())),
            Self::Exists(b) => Some(u64::from(*b)),
            Self::Count(n) | Self::Removed(n) => Some(*n),
            Self::Updated(r) => Some(r.matched),
            Self::Dropped(_) => None,
        }
    }

    #[must_use]
    pub fn documents(&self) -> Option<&[Document]> {
        match self {
            Self::Documents(d) | Self::Inserted(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_documents(self) -> Option<Vec<Document>> {
        match self {
            Self::Documents(d) | Self::Inserted(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn document(&self) -> Option<&Document> {
        match self {
            Self::Document(d) => d.as_ref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_document(self) -> Option<Document> {
        match self {
            Self::Document(d) => d,
            _ => None,
        }
    }

    /// Scalar counts: `count` and `remove`.
    #[must_use]
    pub const fn count(&self) -> Option<u64> {
        match self {
            Self::Count(n) | Self::Removed(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub const fn exists(&self) -> Option<bool> {
        match self {
            Self::Exists(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub const fn report(&self) -> Option<&UpdateReport> {
        match self {
            Self::Updated(r) => Some(r),
            _ => None,
        }
    }
}
