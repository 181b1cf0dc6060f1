// Submodules for separation of concerns
mod builder;
mod command;
pub mod parse;
mod types;

pub use builder::Query;
pub use command::{Command, CommandKind, UPDATE_OPERATORS, has_operators};
pub use types::{Assertion, Order, Predicate, QueryState, Selection, SortSpec};
