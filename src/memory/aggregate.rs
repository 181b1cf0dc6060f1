use crate::errors::{DbError, Result};
use crate::types::Document;
use bson::Bson;

use super::eval::{matches, project, sort_docs};

/// Runs the supported subset of aggregation stages over `docs`.
///
/// # Errors
/// Unsupported or malformed stages are reported as backend errors.
pub fn run(mut docs: Vec<Document>, pipeline: &[Document]) -> Result<Vec<Document>> {
    for stage in pipeline {
        let mut entries = stage.iter();
        let (Some((name, arg)), None) = (entries.next(), entries.next()) else {
            return Err(DbError::Backend("pipeline stage must have exactly one key".into()));
        };
        docs = match (name.as_str(), arg) {
            ("$match", Bson::Document(filter)) => {
                docs.into_iter().filter(|d| matches(d, filter)).collect()
            }
            ("$sort", Bson::Document(sort)) => {
                sort_docs(&mut docs, sort);
                docs
            }
            ("$skip", n) => docs.into_iter().skip(as_count(n)?).collect(),
            ("$limit", n) => docs.into_iter().take(as_count(n)?).collect(),
            ("$project", Bson::Document(p)) => docs.iter().map(|d| project(d, p)).collect(),
            ("$count", Bson::String(field)) => {
                let mut out = Document::new();
                out.insert(field.clone(), i64::try_from(docs.len()).unwrap_or(i64::MAX));
                vec![out]
            }
            (other, _) => return Err(DbError::Backend(format!("unsupported aggregation stage {other}"))),
        };
    }
    Ok(docs)
}

fn as_count(v: &Bson) -> Result<usize> {
    let n = match v {
        Bson::Int32(i) => i64::from(*i),
        Bson::Int64(i) => *i,
        _ => return Err(DbError::Backend("stage argument must be an integer".into())),
    };
    usize::try_from(n).map_err(|_| DbError::Backend("stage argument must be non-negative".into()))
}
