//! Scripted in-memory connection for tests.

use crate::client::{Connection, Inserted};
use crate::error::{OrmError, OrmResult};
use crate::qb::Statement;
use crate::value::{Attributes, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

/// One scripted reply, consumed in order.
pub(crate) enum Reply {
    Rows(Vec<Attributes>),
    Affected(u64),
    Inserted(Inserted),
    Fail(OrmError),
}

/// Replies to each call with the next scripted [`Reply`] and records every statement.
///
/// Statements are checked the way a real connection checks them: every placeholder
/// must have a binding.
#[derive(Default)]
pub(crate) struct ScriptedClient {
    replies: Mutex<VecDeque<Reply>>,
    seen: Mutex<Vec<Statement>>,
}

impl ScriptedClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(self, reply: Reply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub(crate) fn rows(self, rows: Vec<Attributes>) -> Self {
        self.reply(Reply::Rows(rows))
    }

    pub(crate) fn affected(self, n: u64) -> Self {
        self.reply(Reply::Affected(n))
    }

    pub(crate) fn inserted(self, affected: u64, last_id: Option<Value>) -> Self {
        self.reply(Reply::Inserted(Inserted { affected, last_id }))
    }

    pub(crate) fn statements(&self) -> Vec<Statement> {
        self.seen.lock().unwrap().clone()
    }

    pub(crate) fn sql(&self) -> Vec<String> {
        self.statements().iter().map(|s| s.sql().to_string()).collect()
    }

    fn next(&self, stmt: &Statement) -> OrmResult<Reply> {
        stmt.bindings().to_positional(stmt.sql())?;
        self.seen.lock().unwrap().push(stmt.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| OrmError::validation(format!("unscripted statement: {}", stmt.sql())))
    }
}

impl Connection for ScriptedClient {
    async fn fetch_all(&self, stmt: &Statement) -> OrmResult<Vec<Attributes>> {
        match self.next(stmt)? {
            Reply::Rows(rows) => Ok(rows),
            Reply::Fail(err) => Err(err),
            _ => Err(OrmError::validation("scripted reply is not rows")),
        }
    }

    async fn execute(&self, stmt: &Statement) -> OrmResult<u64> {
        match self.next(stmt)? {
            Reply::Affected(n) => Ok(n),
            Reply::Fail(err) => Err(err),
            _ => Err(OrmError::validation("scripted reply is not a row count")),
        }
    }

    async fn insert(&self, stmt: &Statement, _identifier: &str) -> OrmResult<Inserted> {
        match self.next(stmt)? {
            Reply::Inserted(inserted) => Ok(inserted),
            Reply::Fail(err) => Err(err),
            _ => Err(OrmError::validation("scripted reply is not an insert result")),
        }
    }
}

/// Build an attribute map from `(column, value)` pairs.
pub(crate) fn attrs<const N: usize>(pairs: [(&str, Value); N]) -> Attributes {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
