use crate::errors::{DbError, Result};
use crate::query::has_operators;
use crate::types::{Document, ID_FIELD};
use bson::Bson;

use super::eval::{bson_equal, get_path, matches};

// Caps on entries per operator to bound work
const MAX_UPDATE_FIELDS: usize = 128;

/// Applies an update payload to `doc`: operator documents modify in place,
/// anything else replaces the document body while keeping its `_id`.
/// `inserting` enables `$setOnInsert`.
///
/// # Errors
/// Fails on unsupported operators or type mismatches (`$inc` on a string, ...).
pub fn apply(doc: &mut Document, changes: &Document, inserting: bool) -> Result<bool> {
    if !has_operators(changes) {
        return Ok(replace(doc, changes));
    }
    let mut modified = false;
    for (op, arg) in changes {
        let Bson::Document(fields) = arg else {
            return Err(DbError::Backend(format!("{op} requires a document argument")));
        };
        for (path, val) in fields.iter().take(MAX_UPDATE_FIELDS) {
            modified |= match op.as_str() {
                "$set" => set_path(doc, path, val.clone()),
                "$setOnInsert" => inserting && set_path(doc, path, val.clone()),
                "$unset" => unset_path(doc, path),
                "$inc" => inc_path(doc, path, val)?,
                "$push" => push_path(doc, path, val, false)?,
                "$addToSet" => push_path(doc, path, val, true)?,
                "$pushAll" => push_all(doc, path, val)?,
                "$pull" => pull_path(doc, path, |item| pull_matches(item, val)),
                "$pullAll" => {
                    let set = val.as_array().cloned().unwrap_or_default();
                    pull_path(doc, path, |item| set.iter().any(|x| bson_equal(item, x)))
                }
                "$pop" => pop_path(doc, path, val),
                "$rename" => rename_path(doc, path, val)?,
                other => return Err(DbError::Backend(format!("unsupported update operator {other}"))),
            };
        }
    }
    Ok(modified)
}

fn replace(doc: &mut Document, replacement: &Document) -> bool {
    let id = doc.get(ID_FIELD).cloned();
    let mut next = replacement.clone();
    if let Some(id) = id {
        next.insert(ID_FIELD, id);
    }
    let changed = next != *doc;
    *doc = next;
    changed
}

/// Seed document for an upsert insert: the plain equality conditions of the filter.
#[must_use]
pub fn upsert_seed(filter: &Document) -> Document {
    let mut seed = Document::new();
    for (k, v) in filter {
        if k.starts_with('$') {
            continue;
        }
        let is_expr = matches!(v, Bson::Document(d)
            if !crate::oid::is_canonical_doc(d) && d.keys().any(|key| key.starts_with('$')));
        if !is_expr {
            set_path(&mut seed, k, v.clone());
        }
    }
    seed
}

pub fn set_path(doc: &mut Document, path: &str, val: Bson) -> bool {
    let parts: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = parts.split_last() else { return false };
    let mut cur = doc;
    for key in parents {
        if !matches!(cur.get(*key), Some(Bson::Document(_))) {
            cur.insert((*key).to_string(), Bson::Document(Document::new()));
        }
        match cur.get_mut(*key) {
            Some(Bson::Document(d)) => cur = d,
            _ => return false,
        }
    }
    let changed = cur.get(*last).is_none_or(|prev| !bson_equal(prev, &val));
    cur.insert((*last).to_string(), val);
    changed
}

pub fn unset_path(doc: &mut Document, path: &str) -> bool {
    let parts: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = parts.split_last() else { return false };
    let mut cur = doc;
    for key in parents {
        match cur.get_mut(*key) {
            Some(Bson::Document(d)) => cur = d,
            _ => return false,
        }
    }
    cur.remove(*last).is_some()
}

fn inc_path(doc: &mut Document, path: &str, delta: &Bson) -> Result<bool> {
    let next = match (get_path(doc, path), delta) {
        (None, d) => d.clone(),
        (Some(Bson::Int32(a)), Bson::Int32(b)) => {
            a.checked_add(*b).map_or_else(|| Bson::Int64(i64::from(*a) + i64::from(*b)), Bson::Int32)
        }
        (Some(Bson::Int32(a)), Bson::Int64(b)) => Bson::Int64(i64::from(*a) + b),
        (Some(Bson::Int64(a)), Bson::Int32(b)) => Bson::Int64(a + i64::from(*b)),
        (Some(Bson::Int64(a)), Bson::Int64(b)) => Bson::Int64(a + b),
        (Some(a), b) => match (to_f64(a), to_f64(b)) {
            (Some(x), Some(y)) => Bson::Double(x + y),
            _ => return Err(DbError::Backend(format!("$inc requires numeric values at {path}"))),
        },
    };
    Ok(set_path(doc, path, next))
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

fn array_at<'a>(doc: &'a mut Document, path: &str) -> Result<&'a mut Vec<Bson>> {
    if get_path(doc, path).is_none() {
        set_path(doc, path, Bson::Array(Vec::new()));
    }
    let parts: Vec<&str> = path.split('.').collect();
    let mut cur = doc;
    let (last, parents) = parts.split_last().ok_or_else(|| DbError::Backend("empty path".into()))?;
    for key in parents {
        match cur.get_mut(*key) {
            Some(Bson::Document(d)) => cur = d,
            _ => return Err(DbError::Backend(format!("{path} is not an array"))),
        }
    }
    match cur.get_mut(*last) {
        Some(Bson::Array(items)) => Ok(items),
        _ => Err(DbError::Backend(format!("{path} is not an array"))),
    }
}

fn push_path(doc: &mut Document, path: &str, val: &Bson, unique: bool) -> Result<bool> {
    let values: Vec<Bson> = match val {
        Bson::Document(d) if d.contains_key("$each") => {
            d.get("$each").and_then(Bson::as_array).cloned().unwrap_or_default()
        }
        v => vec![v.clone()],
    };
    let items = array_at(doc, path)?;
    let mut changed = false;
    for v in values {
        if unique && items.iter().any(|x| bson_equal(x, &v)) {
            continue;
        }
        items.push(v);
        changed = true;
    }
    Ok(changed)
}

fn push_all(doc: &mut Document, path: &str, val: &Bson) -> Result<bool> {
    let Some(values) = val.as_array() else {
        return Err(DbError::Backend("$pushAll requires an array".into()));
    };
    let items = array_at(doc, path)?;
    items.extend(values.iter().cloned());
    Ok(!values.is_empty())
}

fn pull_matches(item: &Bson, cond: &Bson) -> bool {
    match (item, cond) {
        (Bson::Document(d), Bson::Document(c)) => matches(d, c),
        (v, Bson::Document(c)) => {
            let mut probe = Document::new();
            probe.insert("v", v.clone());
            let mut wrapped = Document::new();
            wrapped.insert("v", Bson::Document(c.clone()));
            matches(&probe, &wrapped)
        }
        (v, c) => bson_equal(v, c),
    }
}

fn pull_path(doc: &mut Document, path: &str, remove: impl Fn(&Bson) -> bool) -> bool {
    if !matches!(get_path(doc, path), Some(Bson::Array(_))) {
        return false;
    }
    let Ok(items) = array_at(doc, path) else { return false };
    let before = items.len();
    items.retain(|x| !remove(x));
    items.len() != before
}

fn pop_path(doc: &mut Document, path: &str, dir: &Bson) -> bool {
    if !matches!(get_path(doc, path), Some(Bson::Array(_))) {
        return false;
    }
    let Ok(items) = array_at(doc, path) else { return false };
    if items.is_empty() {
        return false;
    }
    let from_front = matches!(dir, Bson::Int32(i) if *i < 0) || matches!(dir, Bson::Int64(i) if *i < 0);
    if from_front {
        items.remove(0);
    } else {
        items.pop();
    }
    true
}

fn rename_path(doc: &mut Document, path: &str, to: &Bson) -> Result<bool> {
    let Some(target) = to.as_str() else {
        return Err(DbError::Backend("$rename requires a string target".into()));
    };
    let Some(val) = get_path(doc, path).cloned() else { return Ok(false) };
    unset_path(doc, path);
    set_path(doc, target, val);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn set_inc_unset() {
        let mut d = doc! { "_id": 1, "age": 30, "info": { "visits": 1 }, "unused": true };
        let changed = apply(
            &mut d,
            &doc! {
                "$set": { "name": "alice" },
                "$inc": { "age": 1, "info.visits": 2 },
                "$unset": { "unused": "" },
            },
            false,
        )
        .unwrap();
        assert!(changed);
        assert_eq!(d, doc! { "_id": 1, "age": 31, "info": { "visits": 3 }, "name": "alice" });
    }

    #[test]
    fn replacement_keeps_id() {
        let mut d = doc! { "_id": 7, "a": 1 };
        assert!(apply(&mut d, &doc! { "b": 2 }, false).unwrap());
        assert_eq!(d, doc! { "_id": 7, "b": 2 });
    }

    #[test]
    fn array_operators() {
        let mut d = doc! { "tags": ["a"] };
        apply(&mut d, &doc! { "$push": { "tags": "b" } }, false).unwrap();
        apply(&mut d, &doc! { "$addToSet": { "tags": { "$each": ["a", "c"] } } }, false).unwrap();
        assert_eq!(d, doc! { "tags": ["a", "b", "c"] });
        apply(&mut d, &doc! { "$pull": { "tags": "b" } }, false).unwrap();
        apply(&mut d, &doc! { "$pop": { "tags": -1 } }, false).unwrap();
        assert_eq!(d, doc! { "tags": ["c"] });
    }

    #[test]
    fn set_on_insert_only_when_inserting() {
        let mut d = doc! {};
        let changes = doc! { "$setOnInsert": { "created": true } };
        assert!(!apply(&mut d, &changes, false).unwrap());
        assert!(apply(&mut d, &changes, true).unwrap());
        assert_eq!(d, doc! { "created": true });
    }

    #[test]
    fn inc_rejects_strings() {
        let mut d = doc! { "n": "x" };
        assert!(apply(&mut d, &doc! { "$inc": { "n": 1 } }, false).is_err());
    }

    #[test]
    fn seed_takes_equality_conditions() {
        let seed = upsert_seed(&doc! { "_id": { "$oid": "1" }, "a": 1, "b": { "$gt": 2 }, "$or": [] });
        assert_eq!(seed, doc! { "_id": { "$oid": "1" }, "a": 1 });
    }
}
