//! Query builder (QB) for single-table statements.
//!
//! Conditions accumulate in a [`WhereTree`] of flat groups, callback-built nested groups
//! and pre-rendered sub-expressions (IN lists). Rendering walks that tree into SQL text
//! with named `:placeholder`s plus a [`Bindings`] map; connections rewrite the names
//! into positional `$n` parameters when the statement runs.
//!
//! # Features
//!
//! - **Always-valid WHERE**: every predicate is appended to a `1 = 1` base
//! - **Collision-free placeholders**: a per-render counter for clauses, a random per-call
//!   tag for IN lists and UPDATE SET items
//! - **Deterministic rendering**: same state, same SQL, same bindings
//! - **Arbitrary nesting** through `where_group` / `or_where_group`
//!
//! # Usage
//!
//! ```ignore
//! use pgrecord::qb;
//!
//! // select * from users where 1 = 1 and ( status = :status_0) order by id asc limit 20
//! let users = qb::table("users")
//!     .where_eq("status", "active")
//!     .order_by("id")
//!     .limit(20)
//!     .get(&client)
//!     .await?;
//!
//! // delete from users where 1 = 1 and ( 1 = 1 and ( banned = :banned_0) or ( age < :age_1) )
//! qb::table("users")
//!     .where_group(|q| q.where_eq("banned", true).or_where("age", "<", 13))
//!     .delete(&client)
//!     .await?;
//! ```

mod builder;
pub(crate) mod expr;
pub(crate) mod param;
mod statement;

pub use builder::{Direction, QueryBuilder};
pub use expr::{Clause, ClauseGroup, Connector, NestedGroup, SubExpression, SubPredicate, WhereTree};
pub use param::Bindings;
pub use statement::{Statement, StatementKind};

/// Create a query builder for a bare table (identifier `id`).
///
/// # Example
/// ```ignore
/// let qb = pgrecord::qb::table("users").where_eq("id", 1);
/// ```
pub fn table(table: &str) -> QueryBuilder {
    QueryBuilder::table(table)
}

#[cfg(test)]
mod tests;
