//! Named parameter bindings.
//!
//! Rendered SQL refers to values through `:name` placeholders. A [`Bindings`] map holds
//! exactly one value per placeholder name; names are made unique per statement by a
//! render-time counter (WHERE clauses) or a random per-call tag (IN lists, UPDATE SET).

use crate::error::{OrmError, OrmResult};
use crate::value::Value;
use indexmap::IndexMap;
use tokio_postgres::types::ToSql;

/// Placeholder name → bound value, in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bindings {
    values: IndexMap<String, Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` under `name` (without the leading `:`).
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge another binding map into this one.
    pub fn extend(&mut self, other: &Bindings) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), value.clone());
        }
    }

    /// Rewrite `:name` placeholders into positional `$n` parameters.
    ///
    /// Names are numbered in order of first appearance; repeated names reuse their
    /// position. `::` casts and quoted text are copied through untouched.
    pub fn to_positional(&self, sql: &str) -> OrmResult<(String, Vec<&Value>)> {
        let mut out = String::with_capacity(sql.len());
        let mut order: Vec<&str> = Vec::new();
        let bytes = sql.as_bytes();
        let mut i = 0;

        while i < bytes.len() {
            let c = bytes[i];
            match c {
                b'\'' | b'"' => {
                    let end = sql[i + 1..]
                        .find(c as char)
                        .map(|p| i + 1 + p + 1)
                        .unwrap_or(bytes.len());
                    out.push_str(&sql[i..end]);
                    i = end;
                }
                b':' if bytes.get(i + 1) == Some(&b':') => {
                    out.push_str("::");
                    i += 2;
                }
                b':' if bytes.get(i + 1).is_some_and(|b| is_name_byte(*b)) => {
                    let start = i + 1;
                    let mut end = start;
                    while end < bytes.len() && is_name_byte(bytes[end]) {
                        end += 1;
                    }
                    let name = &sql[start..end];
                    let (key, _) = self.values.get_key_value(name).ok_or_else(|| {
                        OrmError::validation(format!("placeholder :{name} has no bound value"))
                    })?;
                    let position = match order.iter().position(|n| *n == name) {
                        Some(p) => p + 1,
                        None => {
                            order.push(key.as_str());
                            order.len()
                        }
                    };
                    out.push('$');
                    out.push_str(&position.to_string());
                    i = end;
                }
                _ => {
                    let ch = sql[i..].chars().next().unwrap_or_default();
                    out.push(ch);
                    i += ch.len_utf8().max(1);
                }
            }
        }

        let params = order.iter().filter_map(|name| self.values.get(*name)).collect();
        Ok((out, params))
    }
}

/// Borrow positional values as tokio-postgres parameters.
pub(crate) fn as_params<'a>(values: &[&'a Value]) -> Vec<&'a (dyn ToSql + Sync)> {
    values.iter().map(|v| *v as &(dyn ToSql + Sync)).collect()
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Reduce a column expression to a placeholder-safe stem (`users.id` → `users_id`).
pub fn placeholder_stem(column: &str) -> String {
    let stem: String = column
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() { "p".to_string() } else { stem }
}

/// A random tag that keeps call-time placeholder names apart from every other name
/// in the same statement.
pub fn random_tag() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
