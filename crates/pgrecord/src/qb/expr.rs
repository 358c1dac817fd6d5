//! The WHERE tree and its renderer.
//!
//! A [`WhereTree`] keeps three independent collections, each entry tagged with the
//! [`Connector`] that attaches it to what precedes it:
//!
//! - flat groups: one or more [`Clause`]s AND-ed together, `and (a = :a_0 and b = :b_1)`
//! - nested groups: a sub-tree built through a callback, `or ( 1 = 1 and (c = :c_2))`
//! - sub-expressions: pre-rendered fragments such as `IN (...)` lists that carry their
//!   own bindings
//!
//! Rendering walks them in that fixed order on top of the `1 = 1` base predicate, so
//! the output is always a valid WHERE clause, and numbers clause placeholders with a
//! single counter shared across the whole tree.

use crate::qb::param::{Bindings, placeholder_stem};
use crate::value::Value;
use std::fmt;

/// Boolean joiner between a group and the conditions before it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Connector {
    #[default]
    And,
    Or,
}

impl Connector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Connector::And => "and",
            Connector::Or => "or",
        }
    }
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `column operator value` condition.
#[derive(Clone, Debug, PartialEq)]
pub struct Clause {
    pub column: String,
    pub operator: String,
    pub value: Value,
}

impl Clause {
    /// Create a clause. The operator is trimmed and otherwise passed through verbatim.
    pub fn new(column: impl Into<String>, operator: &str, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            operator: operator.trim().to_string(),
            value: value.into(),
        }
    }

    /// `column = value`
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, "=", value)
    }

    /// `column is null`
    pub fn is_null(column: impl Into<String>) -> Self {
        Self::new(column, "is", Value::Null)
    }

    /// `column is not null`
    pub fn is_not_null(column: impl Into<String>) -> Self {
        Self::new(column, "is not", Value::Null)
    }

    /// `is` / `is not` against NULL cannot take a bound parameter in Postgres.
    fn null_check(&self) -> Option<&'static str> {
        if !self.value.is_null() {
            return None;
        }
        let words: Vec<String> = self
            .operator
            .split_whitespace()
            .map(str::to_ascii_lowercase)
            .collect();
        match words.as_slice() {
            [is] if is == "is" => Some("is"),
            [is, not] if is == "is" && not == "not" => Some("is not"),
            _ => None,
        }
    }

    fn render(&self, out: &mut String, counter: &mut usize, bindings: &mut Bindings) {
        if let Some(keyword) = self.null_check() {
            out.push_str(&format!("{} {} null", self.column, keyword));
            return;
        }
        // The counter follows the last `_`, so distinct counters give distinct names.
        let name = format!("{}_{}", placeholder_stem(&self.column), counter);
        *counter += 1;
        out.push_str(&format!("{} {} :{}", self.column, self.operator, name));
        bindings.bind(name, self.value.clone());
    }
}

impl<C: Into<String>, V: Into<Value>> From<(C, V)> for Clause {
    fn from((column, value): (C, V)) -> Self {
        Clause::eq(column, value)
    }
}

impl<C: Into<String>, V: Into<Value>> From<(C, &str, V)> for Clause {
    fn from((column, operator, value): (C, &str, V)) -> Self {
        Clause::new(column, operator, value)
    }
}

/// Clauses AND-ed together, attached to the tree by `connector`.
#[derive(Clone, Debug, PartialEq)]
pub struct ClauseGroup {
    pub connector: Connector,
    pub clauses: Vec<Clause>,
}

/// A callback-built sub-tree rendered as one parenthesized block.
#[derive(Clone, Debug, PartialEq)]
pub struct NestedGroup {
    pub connector: Connector,
    pub tree: WhereTree,
}

/// Right-hand side of a sub-expression.
#[derive(Clone, Debug, PartialEq)]
pub enum SubPredicate {
    /// `column operator` followed by literal SQL text.
    Fragment {
        column: String,
        operator: String,
        literal: String,
    },
    /// A constant predicate (`1 = 1` or `1 = 0`), used for empty IN lists.
    Constant(bool),
}

/// A pre-rendered fragment whose placeholders were bound when it was created.
#[derive(Clone, Debug, PartialEq)]
pub struct SubExpression {
    pub connector: Connector,
    pub predicate: SubPredicate,
    pub bindings: Bindings,
}

impl SubExpression {
    /// Build an `IN` / `NOT IN` list, binding each value under `:inValue{tag}{n}`.
    pub fn in_list(
        connector: Connector,
        column: impl Into<String>,
        values: Vec<Value>,
        negate: bool,
        tag: &str,
    ) -> Self {
        if values.is_empty() {
            return Self {
                connector,
                predicate: SubPredicate::Constant(negate),
                bindings: Bindings::new(),
            };
        }

        let mut bindings = Bindings::new();
        let names: Vec<String> = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                let name = format!("inValue{}{}", tag, i + 1);
                let placeholder = format!(":{name}");
                bindings.bind(name, value);
                placeholder
            })
            .collect();

        Self {
            connector,
            predicate: SubPredicate::Fragment {
                column: column.into(),
                operator: if negate { "not in" } else { "in" }.to_string(),
                literal: format!("( {} )", names.join(", ")),
            },
            bindings,
        }
    }

    fn render(&self, out: &mut String, bindings: &mut Bindings) {
        out.push_str(&format!(" {} ( ", self.connector));
        match &self.predicate {
            SubPredicate::Fragment {
                column,
                operator,
                literal,
            } => out.push_str(&format!("{column} {operator} {literal}")),
            SubPredicate::Constant(true) => out.push_str("1 = 1"),
            SubPredicate::Constant(false) => out.push_str("1 = 0"),
        }
        out.push_str(" )");
        bindings.extend(&self.bindings);
    }
}

/// The full condition state of one builder.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WhereTree {
    pub groups: Vec<ClauseGroup>,
    pub nested: Vec<NestedGroup>,
    pub subs: Vec<SubExpression>,
}

impl WhereTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the tree has no conditions at any level.
    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|g| g.clauses.is_empty())
            && self.nested.iter().all(|n| n.tree.is_empty())
            && self.subs.is_empty()
    }

    pub fn push_group(&mut self, connector: Connector, clauses: Vec<Clause>) {
        if clauses.is_empty() {
            return;
        }
        self.groups.push(ClauseGroup { connector, clauses });
    }

    pub fn push_nested(&mut self, connector: Connector, tree: WhereTree) {
        self.nested.push(NestedGroup { connector, tree });
    }

    pub fn push_sub(&mut self, sub: SubExpression) {
        self.subs.push(sub);
    }

    /// Render ` where 1 = 1 ...` and collect every binding the text references.
    ///
    /// Rendering is a pure function of the tree: the same tree always yields the same
    /// text and the same bindings.
    pub fn render(&self) -> (String, Bindings) {
        let mut out = String::from(" where 1 = 1");
        let mut bindings = Bindings::new();
        let mut counter = 0;
        self.render_into(&mut out, &mut counter, &mut bindings);
        (out, bindings)
    }

    fn render_into(&self, out: &mut String, counter: &mut usize, bindings: &mut Bindings) {
        for group in &self.groups {
            out.push_str(&format!(" {} (", group.connector));
            for (i, clause) in group.clauses.iter().enumerate() {
                out.push_str(if i == 0 { " " } else { " and " });
                clause.render(out, counter, bindings);
            }
            out.push(')');
        }

        for nested in &self.nested {
            out.push_str(&format!(" {} ( 1 = 1", nested.connector));
            nested.tree.render_into(out, counter, bindings);
            out.push_str(" )");
        }

        for sub in &self.subs {
            sub.render(out, bindings);
        }
    }
}
