//! Connection trait for unified database access.
//!
//! Builders render [`Statement`]s with `:name` placeholders; a [`Connection`] turns them
//! into driver calls and hands rows back as ordered column → [`Value`] maps.

use crate::error::{OrmError, OrmResult};
use crate::qb::param::as_params;
use crate::qb::{Statement, StatementKind};
use crate::value::{Attributes, Value};
use tokio_postgres::Row;

/// Outcome of an INSERT.
#[derive(Clone, Debug, PartialEq)]
pub struct Inserted {
    /// Number of rows the statement inserted.
    pub affected: u64,
    /// Identifier generated for the (first) inserted row, if the database reported one.
    pub last_id: Option<Value>,
}

/// A trait that unifies database clients and transactions.
///
/// Implemented for `tokio_postgres::Client`, `tokio_postgres::Transaction` and, with the
/// `pool` feature, deadpool clients, so every builder and record verb accepts any of
/// them.
pub trait Connection: Send + Sync {
    /// Execute a query and return all rows.
    fn fetch_all(
        &self,
        stmt: &Statement,
    ) -> impl std::future::Future<Output = OrmResult<Vec<Attributes>>> + Send;

    /// Execute a query and return the first row, if any.
    ///
    /// Semantics:
    /// - 0 rows: returns `Ok(None)`
    /// - 1 or more rows: returns `Ok(Some(first_row))`
    fn fetch_opt(
        &self,
        stmt: &Statement,
    ) -> impl std::future::Future<Output = OrmResult<Option<Attributes>>> + Send {
        async move { Ok(self.fetch_all(stmt).await?.into_iter().next()) }
    }

    /// Execute a statement and return the number of affected rows.
    fn execute(&self, stmt: &Statement) -> impl std::future::Future<Output = OrmResult<u64>> + Send;

    /// Execute an INSERT and report the identifier the database generated for it.
    fn insert(
        &self,
        stmt: &Statement,
        identifier: &str,
    ) -> impl std::future::Future<Output = OrmResult<Inserted>> + Send;
}

/// Decode a driver row into an ordered attribute map.
pub fn row_to_attributes(row: &Row) -> OrmResult<Attributes> {
    let mut attrs = Attributes::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let value: Value = row
            .try_get(idx)
            .map_err(|e| OrmError::decode(column.name(), e.to_string()))?;
        attrs.insert(column.name().to_string(), value);
    }
    Ok(attrs)
}

async fn pg_query<G>(client: &G, sql: &str, stmt: &Statement) -> OrmResult<Vec<Row>>
where
    G: tokio_postgres::GenericClient + Sync,
{
    let (sql, values) = stmt.bindings().to_positional(sql)?;
    let params = as_params(&values);
    client
        .query(sql.as_str(), &params)
        .await
        .map_err(OrmError::from_db_error)
}

async fn pg_fetch_all<G>(client: &G, stmt: &Statement) -> OrmResult<Vec<Attributes>>
where
    G: tokio_postgres::GenericClient + Sync,
{
    let rows = pg_query(client, stmt.sql(), stmt).await?;
    rows.iter().map(row_to_attributes).collect()
}

async fn pg_execute<G>(client: &G, stmt: &Statement) -> OrmResult<u64>
where
    G: tokio_postgres::GenericClient + Sync,
{
    let (sql, values) = stmt.bindings().to_positional(stmt.sql())?;
    let params = as_params(&values);
    client
        .execute(sql.as_str(), &params)
        .await
        .map_err(OrmError::from_db_error)
}

/// Postgres has no connection-level "last insert id"; the identifier comes back
/// through `RETURNING`.
async fn pg_insert<G>(client: &G, stmt: &Statement, identifier: &str) -> OrmResult<Inserted>
where
    G: tokio_postgres::GenericClient + Sync,
{
    if stmt.kind() != StatementKind::Insert {
        return Err(OrmError::validation(format!(
            "expected an insert statement, got {}",
            stmt.kind()
        )));
    }
    let sql = format!("{} returning {}", stmt.sql(), identifier);
    let rows = pg_query(client, &sql, stmt).await?;
    let last_id = match rows.first() {
        Some(row) => Some(
            row.try_get::<_, Value>(0)
                .map_err(|e| OrmError::decode(identifier, e.to_string()))?,
        ),
        None => None,
    };
    Ok(Inserted {
        affected: rows.len() as u64,
        last_id,
    })
}

impl Connection for tokio_postgres::Client {
    async fn fetch_all(&self, stmt: &Statement) -> OrmResult<Vec<Attributes>> {
        pg_fetch_all(self, stmt).await
    }

    async fn execute(&self, stmt: &Statement) -> OrmResult<u64> {
        pg_execute(self, stmt).await
    }

    async fn insert(&self, stmt: &Statement, identifier: &str) -> OrmResult<Inserted> {
        pg_insert(self, stmt, identifier).await
    }
}

impl Connection for tokio_postgres::Transaction<'_> {
    async fn fetch_all(&self, stmt: &Statement) -> OrmResult<Vec<Attributes>> {
        pg_fetch_all(self, stmt).await
    }

    async fn execute(&self, stmt: &Statement) -> OrmResult<u64> {
        pg_execute(self, stmt).await
    }

    async fn insert(&self, stmt: &Statement, identifier: &str) -> OrmResult<Inserted> {
        pg_insert(self, stmt, identifier).await
    }
}

// ===== deadpool-postgres support =====

#[cfg(feature = "pool")]
impl Connection for deadpool_postgres::ClientWrapper {
    async fn fetch_all(&self, stmt: &Statement) -> OrmResult<Vec<Attributes>> {
        // Delegate to the deref target (tokio_postgres::Client).
        Connection::fetch_all(&**self, stmt).await
    }

    async fn execute(&self, stmt: &Statement) -> OrmResult<u64> {
        Connection::execute(&**self, stmt).await
    }

    async fn insert(&self, stmt: &Statement, identifier: &str) -> OrmResult<Inserted> {
        Connection::insert(&**self, stmt, identifier).await
    }
}

#[cfg(feature = "pool")]
impl Connection for deadpool_postgres::Client {
    async fn fetch_all(&self, stmt: &Statement) -> OrmResult<Vec<Attributes>> {
        Connection::fetch_all(&**self, stmt).await
    }

    async fn execute(&self, stmt: &Statement) -> OrmResult<u64> {
        Connection::execute(&**self, stmt).await
    }

    async fn insert(&self, stmt: &Statement, identifier: &str) -> OrmResult<Inserted> {
        Connection::insert(&**self, stmt, identifier).await
    }
}

#[cfg(feature = "pool")]
impl Connection for deadpool_postgres::Transaction<'_> {
    async fn fetch_all(&self, stmt: &Statement) -> OrmResult<Vec<Attributes>> {
        // Delegate to the deref target (tokio_postgres::Transaction).
        Connection::fetch_all(&**self, stmt).await
    }

    async fn execute(&self, stmt: &Statement) -> OrmResult<u64> {
        Connection::execute(&**self, stmt).await
    }

    async fn insert(&self, stmt: &Statement, identifier: &str) -> OrmResult<Inserted> {
        Connection::insert(&**self, stmt, identifier).await
    }
}

/// Emit the statement about to run on the `pgrecord.sql` target. Values are not logged.
#[cfg(feature = "tracing")]
pub(crate) fn log_statement(stmt: &Statement) {
    const MAX_SQL_LENGTH: usize = 200;
    let sql = stmt.sql();
    let shown = if sql.len() > MAX_SQL_LENGTH {
        format!("{}...", truncate_sql_bytes(sql, MAX_SQL_LENGTH))
    } else {
        sql.to_string()
    };
    tracing::debug!(
        target: "pgrecord.sql",
        kind = %stmt.kind(),
        table = stmt.table(),
        param_count = stmt.bindings().len(),
        sql = %shown,
    );
}

#[cfg(not(feature = "tracing"))]
pub(crate) fn log_statement(_stmt: &Statement) {}

#[cfg_attr(not(feature = "tracing"), allow(dead_code))]
pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
