use crate::errors::DbError;
use crate::types::Document;
use bson::Bson;
use std::fmt;
use std::str::FromStr;

/// Update operators; a payload holding any of these is a modification
/// rather than a replacement document.
pub const UPDATE_OPERATORS: &[&str] = &[
    "$addToSet",
    "$inc",
    "$pop",
    "$pull",
    "$pullAll",
    "$push",
    "$pushAll",
    "$rename",
    "$set",
    "$setOnInsert",
    "$unset",
];

#[must_use]
pub fn has_operators(changes: &Document) -> bool {
    UPDATE_OPERATORS.iter().any(|op| changes.contains_key(op))
}

/// The pending operation of a query, with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Read,
    Count,
    Exists,
    Insert(Vec<Document>),
    Update(Document),
    Upsert(Document),
    FindAndModify(Document),
    ModifyAndFind(Document),
    Pull,
    Remove,
    RemoveAll,
    Drop(Option<String>),
    Aggregate(Vec<Document>),
}

/// Payload-free tag of a [`Command`], parseable from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Read,
    Count,
    Exists,
    Insert,
    Update,
    Upsert,
    FindAndModify,
    ModifyAndFind,
    Pull,
    Remove,
    RemoveAll,
    Drop,
    Aggregate,
}

impl CommandKind {
    pub const ALL: [Self; 13] = [
        Self::Read,
        Self::Count,
        Self::Exists,
        Self::Insert,
        Self::Update,
        Self::Upsert,
        Self::FindAndModify,
        Self::ModifyAndFind,
        Self::Pull,
        Self::Remove,
        Self::RemoveAll,
        Self::Drop,
        Self::Aggregate,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Count => "count",
            Self::Exists => "exists",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Upsert => "upsert",
            Self::FindAndModify => "findAndModify",
            Self::ModifyAndFind => "modifyAndFind",
            Self::Pull => "pull",
            Self::Remove => "remove",
            Self::RemoveAll => "removeAll",
            Self::Drop => "drop",
            Self::Aggregate => "aggregate",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CommandKind {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s || k.name().eq_ignore_ascii_case(&s.replace('_', "")))
            .ok_or_else(|| DbError::UnknownCommand(s.to_string()))
    }
}

impl Command {
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::Read => CommandKind::Read,
            Self::Count => CommandKind::Count,
            Self::Exists => CommandKind::Exists,
            Self::Insert(_) => CommandKind::Insert,
            Self::Update(_) => CommandKind::Update,
            Self::Upsert(_) => CommandKind::Upsert,
            Self::FindAndModify(_) => CommandKind::FindAndModify,
            Self::ModifyAndFind(_) => CommandKind::ModifyAndFind,
            Self::Pull => CommandKind::Pull,
            Self::Remove => CommandKind::Remove,
            Self::RemoveAll => CommandKind::RemoveAll,
            Self::Drop(_) => CommandKind::Drop,
            Self::Aggregate(_) => CommandKind::Aggregate,
        }
    }

    /// Builds a command from its name and a loosely typed argument.
    ///
    /// # Errors
    /// `UnknownCommand` for an unrecognised name, `InvalidArgument` when the
    /// argument shape does not fit the command.
    pub fn from_parts(name: &str, arg: Option<Bson>) -> Result<Self, DbError> {
        let kind: CommandKind = name.parse()?;
        Ok(match kind {
            CommandKind::Read => Self::Read,
            CommandKind::Count => Self::Count,
            CommandKind::Exists => Self::Exists,
            CommandKind::Pull => Self::Pull,
            CommandKind::Remove => Self::Remove,
            CommandKind::RemoveAll => Self::RemoveAll,
            CommandKind::Insert => Self::Insert(documents_arg(kind, arg)?),
            CommandKind::Aggregate => Self::Aggregate(documents_arg(kind, arg)?),
            CommandKind::Update => Self::Update(document_arg(kind, arg)?),
            CommandKind::Upsert => Self::Upsert(document_arg(kind, arg)?),
            CommandKind::FindAndModify => Self::FindAndModify(document_arg(kind, arg)?),
            CommandKind::ModifyAndFind => Self::ModifyAndFind(document_arg(kind, arg)?),
            CommandKind::Drop => match arg {
                None | Some(Bson::Null) => Self::Drop(None),
                Some(Bson::String(s)) => Self::Drop(Some(s)),
                Some(_) => {
                    return Err(DbError::InvalidArgument("drop takes a collection name".into()));
                }
            },
        })
    }
}

fn document_arg(kind: CommandKind, arg: Option<Bson>) -> Result<Document, DbError> {
    match arg {
        Some(Bson::Document(d)) => Ok(d),
        _ => Err(DbError::InvalidArgument(format!("{kind} requires a document argument"))),
    }
}

fn documents_arg(kind: CommandKind, arg: Option<Bson>) -> Result<Vec<Document>, DbError> {
    match arg {
        Some(Bson::Document(d)) => Ok(vec![d]),
        Some(Bson::Array(items)) => items
            .into_iter()
            .map(|b| match b {
                Bson::Document(d) => Ok(d),
                _ => Err(DbError::InvalidArgument(format!("{kind} requires documents"))),
            })
            .collect(),
        _ => Err(DbError::InvalidArgument(format!("{kind} requires documents"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn names_round_trip() {
        for k in CommandKind::ALL {
            assert_eq!(k.name().parse::<CommandKind>().unwrap(), k);
        }
        assert_eq!("find_and_modify".parse::<CommandKind>().unwrap(), CommandKind::FindAndModify);
    }

    #[test]
    fn unknown_name_is_distinct_error() {
        let err = "false command".parse::<CommandKind>().unwrap_err();
        assert!(matches!(err, DbError::UnknownCommand(_)));
    }

    #[test]
    fn operators_detected() {
        assert!(has_operators(&doc! { "$set": { "a": 1 } }));
        assert!(!has_operators(&doc! { "a": 1, "_id": 2 }));
    }

    #[test]
    fn from_parts_checks_argument_shape() {
        let c = Command::from_parts("update", Some(Bson::Document(doc! { "$set": { "a": 1 } })))
            .unwrap();
        assert_eq!(c.kind(), CommandKind::Update);
        assert!(matches!(Command::from_parts("update", None), Err(DbError::InvalidArgument(_))));
    }
}
