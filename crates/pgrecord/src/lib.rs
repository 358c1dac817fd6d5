//! # pgrecord
//!
//! A small active-record layer for Postgres, built around a fluent single-table query
//! builder.
//!
//! ## Features
//!
//! - **Composable WHERE trees**: AND/OR groups, callback-built nested groups of any depth,
//!   IN / NOT IN lists, always rendered on top of a `1 = 1` base
//! - **Bound values only**: every value travels as a named placeholder, rewritten to
//!   `$n` parameters when the statement runs
//! - **Records**: attribute bags with fillable/hidden lists, computed accessors, write
//!   mutators and a read-only identifier
//! - **Explicit connections**: pass a client, transaction or pooled client to every
//!   execution call
//!
//! ## Query Builder (qb)
//!
//! ```ignore
//! use pgrecord::qb;
//!
//! // select id, name from users where 1 = 1 and ( age >= :age_0)
//! //   and ( 1 = 1 and ( role = :role_1) or ( role = :role_2) ) order by name asc limit 10
//! let users = qb::table("users")
//!     .select(["id", "name"])
//!     .r#where("age", ">=", 18)
//!     .where_group(|q| q.where_eq("role", "admin").or_where_eq("role", "owner"))
//!     .order_by("name")
//!     .limit(10)
//!     .get(&client)
//!     .await?;
//! ```
//!
//! ## Records
//!
//! ```ignore
//! use pgrecord::{Attributes, ModelDef, Repo};
//!
//! let users = Repo::new(&client, ModelDef::for_type("User").fillable(["name", "email"]));
//! let mut ann = users.find(1).await?.expect("user 1");
//! ann.set("name", "Ann")?;
//! ann.save(&client).await?;
//! users.destroy([2, 3]).await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod qb;
pub mod repo;
pub mod row;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{Connection, Inserted, row_to_attributes};
pub use config::{ConnectConfig, DEFAULT_PORT, connect};
pub use error::{OrmError, OrmResult};
pub use model::{Accessor, ModelDef, Mutator, Record};
pub use qb::{Clause, Connector, Direction, QueryBuilder, Statement, StatementKind};
pub use repo::Repo;
pub use row::{FromRow, FromValue, RowExt};
pub use value::{Attributes, Value};

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_manager_config};
