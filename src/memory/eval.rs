use crate::oid;
use crate::query::{Order, SortSpec};
use crate::types::{Document, ID_FIELD};
use bson::Bson;
use std::cmp::Ordering;

use super::update::set_path;

// Safety limits to prevent resource abuse
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_IN_SET: usize = 1000;
pub(crate) const MAX_SORT_FIELDS: usize = 8;

/// Evaluates a Mongo-shaped filter document against `doc`.
/// An empty filter matches everything.
#[must_use]
pub fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, cond)| match key.as_str() {
        "$and" => sub_filters(cond).all(|f| matches(doc, f)),
        "$or" => sub_filters(cond).any(|f| matches(doc, f)),
        "$nor" => !sub_filters(cond).any(|f| matches(doc, f)),
        path => match_field(doc, path, cond),
    })
}

fn sub_filters(cond: &Bson) -> impl Iterator<Item = &Document> {
    cond.as_array().into_iter().flatten().filter_map(Bson::as_document)
}

/// A condition document is an operator expression when every key is a `$`
/// operator. Canonical `{$oid: ..}` identifiers are literals.
fn is_operator_doc(d: &Document) -> bool {
    !d.is_empty() && !oid::is_canonical_doc(d) && d.keys().all(|k| k.starts_with('$'))
}

fn match_field(doc: &Document, path: &str, cond: &Bson) -> bool {
    let value = get_path(doc, path);
    match cond {
        Bson::Document(ops) if is_operator_doc(ops) => {
            ops.iter().all(|(op, arg)| eval_op(value, op, arg, ops))
        }
        literal => matches_literal(value, literal),
    }
}

fn matches_literal(value: Option<&Bson>, literal: &Bson) -> bool {
    match value {
        None => matches!(literal, Bson::Null | Bson::Undefined),
        Some(Bson::Array(items)) if !matches!(literal, Bson::Array(_)) => {
            items.iter().any(|v| bson_equal(v, literal))
        }
        Some(v) => bson_equal(v, literal),
    }
}

#[cfg_attr(not(feature = "regex"), allow(unused_variables))]
fn eval_op(value: Option<&Bson>, op: &str, arg: &Bson, siblings: &Document) -> bool {
    match op {
        "$eq" => matches_literal(value, arg),
        "$ne" => !matches_literal(value, arg),
        "$gt" => cmp_op(value, arg, |o| o == Ordering::Greater),
        "$gte" => cmp_op(value, arg, |o| o != Ordering::Less),
        "$lt" => cmp_op(value, arg, |o| o == Ordering::Less),
        "$lte" => cmp_op(value, arg, |o| o != Ordering::Greater),
        "$in" => in_set(value, arg),
        "$nin" => !in_set(value, arg),
        "$exists" => value.is_some() == truthy(arg),
        "$size" => match (value, arg) {
            (Some(Bson::Array(items)), n) => as_i64(n).is_some_and(|n| items.len() as i64 == n),
            _ => false,
        },
        "$not" => match arg {
            Bson::Document(inner) => !inner.iter().all(|(op, a)| eval_op(value, op, a, inner)),
            other => !matches_literal(value, other),
        },
        #[cfg(feature = "regex")]
        "$regex" => {
            let options = siblings.get("$options").and_then(Bson::as_str).unwrap_or("");
            arg.as_str().is_some_and(|p| regex_match(value, p, options))
        }
        "$options" => true,
        other => {
            log::warn!(target: "docquery::memory", "unsupported query operator {other}");
            false
        }
    }
}

#[cfg(feature = "regex")]
fn regex_match(value: Option<&Bson>, pattern: &str, options: &str) -> bool {
    let Some(Bson::String(s)) = value else { return false };
    if pattern.len() > 512 {
        return false;
    }
    let mut re = regex::RegexBuilder::new(pattern);
    re.case_insensitive(options.contains('i'));
    re.multi_line(options.contains('m'));
    re.build().is_ok_and(|r| r.is_match(s))
}

fn cmp_op(value: Option<&Bson>, arg: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    value.and_then(|v| bson_cmp(v, arg)).is_some_and(accept)
}

fn in_set(value: Option<&Bson>, arg: &Bson) -> bool {
    let Some(set) = arg.as_array() else { return false };
    set.iter().take(MAX_IN_SET).any(|x| matches_literal(value, x))
}

/// Mongo truthiness used by `$exists` and projections.
#[must_use]
pub fn truthy(v: &Bson) -> bool {
    match v {
        Bson::Boolean(b) => *b,
        Bson::Int32(i) => *i != 0,
        Bson::Int64(i) => *i != 0,
        Bson::Double(f) => *f != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn as_i64(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        Bson::Double(f) if f.fract() == 0.0 => Some(*f as i64),
        _ => None,
    }
}

#[must_use]
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut iter = path.split('.');
    let first = iter.next()?;
    let mut depth = 1usize;
    let mut cur: Option<&Bson> = doc.get(first);
    for part in iter {
        depth += 1;
        if depth > MAX_PATH_DEPTH {
            return None;
        }
        match cur {
            Some(Bson::Document(d)) => cur = d.get(part),
            _ => return None,
        }
    }
    cur
}

#[allow(clippy::cast_precision_loss)]
fn to_f64(b: &Bson) -> Option<f64> {
    match b {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

#[allow(clippy::float_cmp, clippy::cast_precision_loss)]
#[must_use]
pub fn bson_equal(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::Int32(x), Bson::Int64(y)) => i64::from(*x) == *y,
        (Bson::Int64(x), Bson::Int32(y)) => *x == i64::from(*y),
        (Bson::Int32(x), Bson::Double(y)) => f64::from(*x) == *y,
        (Bson::Double(x), Bson::Int32(y)) => *x == f64::from(*y),
        (Bson::Int64(x), Bson::Double(y)) => (*x as f64) == *y,
        (Bson::Double(x), Bson::Int64(y)) => *x == (*y as f64),
        _ => a == b,
    }
}

/// Same-bracket comparison; `None` when the values are not comparable.
fn bson_cmp(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(af), Some(bf)) = (to_f64(a), to_f64(b)) {
        return af.partial_cmp(&bf);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.bytes().cmp(&y.bytes())),
        (Bson::Document(x), Bson::Document(y)) if oid::is_canonical_doc(x) && oid::is_canonical_doc(y) => {
            Some(x.get_str(oid::OID_KEY).ok()?.cmp(y.get_str(oid::OID_KEY).ok()?))
        }
        _ => None,
    }
}

/// Total order used for sorting: comparable values by value, otherwise by type rank.
#[must_use]
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    bson_cmp(a, b).unwrap_or_else(|| type_rank(a).cmp(&type_rank(b)))
}

const fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::DbPointer(_) | Bson::JavaScriptCode(_) | Bson::JavaScriptCodeWithScope(_) => 12,
        Bson::MaxKey => 255,
    }
}

#[must_use]
pub fn compare_docs(a: &Document, b: &Document, specs: &[SortSpec]) -> Ordering {
    for s in specs.iter().take(MAX_SORT_FIELDS) {
        let ord = match (get_path(a, &s.field), get_path(b, &s.field)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => compare_bson(x, y),
        };
        if ord != Ordering::Equal {
            return if s.order == Order::Asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

pub fn sort_docs(docs: &mut [Document], sort: &Document) {
    let specs = SortSpec::from_document(sort);
    if specs.len() > MAX_SORT_FIELDS {
        log::warn!(target: "docquery::memory", "sort spec too long: {}", specs.len());
    }
    docs.sort_by(|a, b| compare_docs(a, b, &specs));
}

/// Applies a Mongo projection: inclusion mode when any non-`_id` field is
/// truthy, exclusion mode otherwise. `_id` is kept unless excluded explicitly.
#[must_use]
pub fn project(doc: &Document, projection: &Document) -> Document {
    let keep_id = projection.get(ID_FIELD).is_none_or(truthy);
    let includes: Vec<&str> = projection
        .iter()
        .filter(|(k, v)| k.as_str() != ID_FIELD && truthy(v))
        .map(|(k, _)| k.as_str())
        .collect();

    if includes.is_empty() {
        let mut out = doc.clone();
        for (k, v) in projection {
            if !truthy(v) {
                super::update::unset_path(&mut out, k);
            }
        }
        return out;
    }

    let mut out = Document::new();
    if keep_id && let Some(id) = doc.get(ID_FIELD) {
        out.insert(ID_FIELD, id.clone());
    }
    for path in includes {
        if let Some(v) = get_path(doc, path) {
            set_path(&mut out, path, v.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn literal_and_operator_conditions() {
        let d = doc! { "age": 30, "name": "alice", "tags": ["a", "b"] };
        assert!(matches(&d, &doc! {}));
        assert!(matches(&d, &doc! { "age": 30_i64 }));
        assert!(matches(&d, &doc! { "age": { "$gt": 20, "$lte": 30 } }));
        assert!(!matches(&d, &doc! { "age": { "$lt": 30 } }));
        assert!(matches(&d, &doc! { "tags": "b" }));
        assert!(matches(&d, &doc! { "$or": [{ "age": 1 }, { "name": "alice" }] }));
        assert!(!matches(&d, &doc! { "$nor": [{ "name": "alice" }] }));
    }

    #[test]
    fn null_in_set_matches_missing_field() {
        let d = doc! { "a": 1 };
        let falsy = doc! { "flag": { "$in": [false, Bson::Null, Bson::Undefined, 0] } };
        assert!(matches(&d, &falsy));
        assert!(matches(&doc! { "flag": false }, &falsy));
        assert!(!matches(&doc! { "flag": true }, &falsy));
    }

    #[test]
    fn canonical_ids_compare_as_literals() {
        let d = doc! { "_id": { "$oid": "23" } };
        assert!(matches(&d, &doc! { "_id": { "$oid": "23" } }));
        assert!(matches(&d, &doc! { "_id": { "$in": [{ "$oid": "1" }, { "$oid": "23" }] } }));
        assert!(!matches(&d, &doc! { "_id": { "$oid": "24" } }));
    }

    #[test]
    fn nested_paths() {
        let d = doc! { "info": { "visits": 3 } };
        assert!(matches(&d, &doc! { "info.visits": { "$gte": 3 } }));
        assert!(matches(&d, &doc! { "info.missing": { "$exists": false } }));
    }

    #[test]
    fn projection_modes() {
        let d = doc! { "_id": 1, "a": 1, "b": { "c": 2, "d": 3 } };
        assert_eq!(project(&d, &doc! { "a": true }), doc! { "_id": 1, "a": 1 });
        assert_eq!(project(&d, &doc! { "b.c": 1, "_id": 0 }), doc! { "b": { "c": 2 } });
        assert_eq!(project(&d, &doc! { "b": false }), doc! { "_id": 1, "a": 1 });
    }

    #[test]
    fn sort_multiple_keys() {
        let mut docs = vec![doc! { "a": 2, "b": 1 }, doc! { "a": 1, "b": 2 }, doc! { "a": 1, "b": 1 }];
        sort_docs(&mut docs, &doc! { "a": 1, "b": -1 });
        assert_eq!(docs[0], doc! { "a": 1, "b": 2 });
        assert_eq!(docs[1], doc! { "a": 1, "b": 1 });
        assert_eq!(docs[2], doc! { "a": 2, "b": 1 });
    }

    #[test]
    fn canonical_ids_sort_by_hex() {
        let mut docs = vec![doc! { "_id": { "$oid": "b" } }, doc! { "_id": { "$oid": "a" } }];
        sort_docs(&mut docs, &doc! { "_id": 1 });
        assert_eq!(docs[0], doc! { "_id": { "$oid": "a" } });
    }
}
