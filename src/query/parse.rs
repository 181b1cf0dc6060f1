use crate::errors::{DbError, Result};
use crate::types::Document;

/// Parses a JSON object into a query fragment.
///
/// Keys are kept verbatim, so operator documents (`{"$gt": 1}`) and
/// canonical identifiers (`{"$oid": "a1"}`) pass through untouched.
/// JSON integers become 64-bit integers.
pub fn fragment(text: &str) -> Result<Document> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(DbError::InvalidArgument("query fragment must be a JSON object".into()));
    }
    bson::serialize_to_document(&value).map_err(|e| DbError::InvalidArgument(format!("query fragment: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use bson::doc;

    #[test]
    fn operators_and_ids_stay_literal() {
        let d = fragment(r#"{"age": {"$gte": 18}, "_id": {"$oid": "a1"}, "tags": ["x", null]}"#).unwrap();
        assert_eq!(
            d,
            doc! { "age": { "$gte": 18_i64 }, "_id": { "$oid": "a1" }, "tags": ["x", null] }
        );
    }

    #[test]
    fn rejects_non_objects_and_bad_text() {
        assert_eq!(fragment("[1, 2]").unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(fragment("{\"a\": ").unwrap_err().kind(), ErrorKind::InvalidArgument);
    }
}
