//! Rendered statements.

use crate::qb::param::Bindings;
use std::fmt;

/// Statement kind, used for logging and by connections that treat inserts specially.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StatementKind::Select => "select",
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
        })
    }
}

/// SQL text with `:name` placeholders plus the values bound to them.
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    kind: StatementKind,
    table: String,
    sql: String,
    bindings: Bindings,
}

impl Statement {
    pub fn new(
        kind: StatementKind,
        table: impl Into<String>,
        sql: impl Into<String>,
        bindings: Bindings,
    ) -> Self {
        Self {
            kind,
            table: table.into(),
            sql: sql.into(),
            bindings,
        }
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}
