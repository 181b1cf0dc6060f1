//! Identifier normalization.
//!
//! Canonical identifiers take the extended-JSON shape `{ "$oid": <string> }`.
//! Native `ObjectId` values are also recognised by backends and pass through.

use bson::Bson;

pub const OID_KEY: &str = "$oid";

/// True when `value` already has a backend-recognisable identifier shape.
#[must_use]
pub fn is_canonical(value: &Bson) -> bool {
    match value {
        Bson::ObjectId(_) => true,
        Bson::Document(d) => is_canonical_doc(d),
        _ => false,
    }
}

/// Document form of [`is_canonical`]: exactly one `$oid` string entry.
#[must_use]
pub fn is_canonical_doc(d: &bson::Document) -> bool {
    d.len() == 1 && matches!(d.get(OID_KEY), Some(Bson::String(_)))
}

/// Normalize an arbitrary value into a canonical identifier.
///
/// Canonical inputs are returned unchanged, strings are wrapped, and any
/// other value is wrapped by its plain string rendering.
#[must_use]
pub fn object_id(value: Bson) -> Bson {
    if is_canonical(&value) {
        return value;
    }
    let text = match value {
        Bson::String(s) => s,
        other => plain_string(&other),
    };
    wrap(text)
}

fn wrap(text: String) -> Bson {
    let mut d = bson::Document::new();
    d.insert(OID_KEY, text);
    Bson::Document(d)
}

/// String rendering without the JSON quoting `Display` applies to strings.
#[must_use]
pub fn plain_string(value: &Bson) -> String {
    match value {
        Bson::String(s) | Bson::Symbol(s) => s.clone(),
        Bson::Int32(i) => i.to_string(),
        Bson::Int64(i) => i.to_string(),
        Bson::Double(f) => f.to_string(),
        Bson::Boolean(b) => b.to_string(),
        Bson::ObjectId(o) => o.to_hex(),
        Bson::Null | Bson::Undefined => String::new(),
        other => other.to_string(),
    }
}

/// Values treated as "no id given" by `by_id`.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn is_blank(value: &Bson) -> bool {
    match value {
        Bson::Null | Bson::Undefined | Bson::Boolean(false) => true,
        Bson::String(s) => s.is_empty(),
        Bson::Int32(i) => *i == 0,
        Bson::Int64(i) => *i == 0,
        Bson::Double(f) => *f == 0.0 || f.is_nan(),
        _ => false,
    }
}

/// Fresh canonical identifier for documents inserted without one.
#[must_use]
pub fn generate() -> Bson {
    wrap(uuid::Uuid::new_v4().simple().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn wraps_strings() {
        assert_eq!(object_id(Bson::String("abc".into())), Bson::Document(doc! { "$oid": "abc" }));
    }

    #[test]
    fn canonical_passes_through() {
        let oid = Bson::Document(doc! { "$oid": "b33f" });
        assert_eq!(object_id(oid.clone()), oid);
        let native = Bson::ObjectId(bson::oid::ObjectId::new());
        assert_eq!(object_id(native.clone()), native);
    }

    #[test]
    fn other_values_use_string_form() {
        assert_eq!(object_id(Bson::Int32(23)), Bson::Document(doc! { "$oid": "23" }));
        let nested = Bson::Document(doc! { "$oid": "x", "extra": 1 });
        assert!(!is_canonical(&nested));
        assert!(object_id(nested).as_document().is_some_and(|d| d.contains_key("$oid")));
    }

    #[test]
    fn blank_values() {
        assert!(is_blank(&Bson::Null));
        assert!(is_blank(&Bson::String(String::new())));
        assert!(is_blank(&Bson::Int32(0)));
        assert!(!is_blank(&Bson::Int32(7)));
        assert!(!is_blank(&Bson::String("a".into())));
    }

    #[test]
    fn generated_ids_are_canonical_and_distinct() {
        let a = generate();
        let b = generate();
        assert!(is_canonical(&a));
        assert_ne!(a, b);
    }
}
