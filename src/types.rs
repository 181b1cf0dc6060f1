pub type CollectionName = String;

/// Dot-separated path into a document, e.g. `"address.city"`.
pub type FieldPath = String;

/// Documents travel through this crate as plain BSON documents.
pub type Document = bson::Document;

/// Reserved identifier field of every stored document.
pub const ID_FIELD: &str = "_id";
