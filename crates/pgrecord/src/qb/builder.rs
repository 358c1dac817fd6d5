//! The fluent query builder.

use crate::client::{Connection, log_statement};
use crate::error::{OrmError, OrmResult};
use crate::model::{ModelDef, Record};
use crate::qb::expr::{Clause, Connector, SubExpression, WhereTree};
use crate::qb::param::{Bindings, placeholder_stem, random_tag};
use crate::qb::statement::{Statement, StatementKind};
use crate::row::{FromRow, RowExt};
use crate::value::{Attributes, Value};
use std::fmt;
use std::sync::Arc;

/// Sort direction for `order by`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accumulates conditions, ordering, pagination and projection for one table.
///
/// Setters consume and return the builder so calls chain. Rendering borrows it and is
/// deterministic: rendering twice without further mutation yields identical SQL and
/// bindings. Execution methods take any [`Connection`] (client, transaction or pooled
/// client).
///
/// # Example
///
/// ```ignore
/// use pgrecord::QueryBuilder;
///
/// let adults = QueryBuilder::table("users")
///     .r#where("age", ">=", 18)
///     .where_group(|q| q.where_eq("role", "admin").or_where_eq("role", "owner"))
///     .order_by_desc("created_at")
///     .limit(20)
///     .get(&client)
///     .await?;
/// ```
#[derive(Clone, Debug)]
pub struct QueryBuilder {
    model: Arc<ModelDef>,
    tree: WhereTree,
    fields: Vec<String>,
    orders: Vec<(String, Direction)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl QueryBuilder {
    /// Create an empty builder for a model definition.
    pub fn new(model: impl Into<Arc<ModelDef>>) -> Self {
        Self {
            model: model.into(),
            tree: WhereTree::new(),
            fields: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Create a builder for a bare table with the default `id` identifier.
    pub fn table(table: &str) -> Self {
        Self::new(ModelDef::new(table))
    }

    /// A fresh builder for the same model, with no accumulated state.
    pub fn new_query(&self) -> Self {
        Self::new(Arc::clone(&self.model))
    }

    pub fn model(&self) -> &Arc<ModelDef> {
        &self.model
    }

    pub fn where_tree(&self) -> &WhereTree {
        &self.tree
    }

    // ==================== Conditions ====================

    /// `and column operator value`.
    ///
    /// The operator is passed through trimmed but otherwise verbatim. `is` / `is not` with
    /// [`Value::Null`] renders a null check.
    pub fn r#where(self, column: impl Into<String>, operator: &str, value: impl Into<Value>) -> Self {
        self.where_with(Connector::And, vec![Clause::new(column, operator, value)])
    }

    /// `and column = value`.
    pub fn where_eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.where_with(Connector::And, vec![Clause::eq(column, value)])
    }

    /// Several conditions AND-ed into one group, attached with `and`.
    ///
    /// Accepts anything convertible into a [`Clause`], including `(column, value)` and
    /// `(column, operator, value)` tuples.
    ///
    /// ```ignore
    /// qb.where_all([("status", "active")]).where_all([Clause::new("age", ">", 18)]);
    /// ```
    pub fn where_all<I>(self, clauses: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Clause>,
    {
        let clauses = clauses.into_iter().map(Into::into).collect();
        self.where_with(Connector::And, clauses)
    }

    /// A parenthesized group built on a fresh builder, attached with `and`.
    ///
    /// ```ignore
    /// // where 1 = 1 and ( a = :a_0) and ( 1 = 1 and ( b = :b_1) or ( c = :c_2) )
    /// qb.where_eq("a", 1).where_group(|q| q.where_eq("b", 2).or_where_eq("c", 3));
    /// ```
    pub fn where_group<F>(self, build: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.where_group_with(Connector::And, build)
    }

    pub fn where_null(self, column: impl Into<String>) -> Self {
        self.where_with(Connector::And, vec![Clause::is_null(column)])
    }

    pub fn where_not_null(self, column: impl Into<String>) -> Self {
        self.where_with(Connector::And, vec![Clause::is_not_null(column)])
    }

    pub fn or_where(self, column: impl Into<String>, operator: &str, value: impl Into<Value>) -> Self {
        self.where_with(Connector::Or, vec![Clause::new(column, operator, value)])
    }

    pub fn or_where_eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.where_with(Connector::Or, vec![Clause::eq(column, value)])
    }

    pub fn or_where_all<I>(self, clauses: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Clause>,
    {
        let clauses = clauses.into_iter().map(Into::into).collect();
        self.where_with(Connector::Or, clauses)
    }

    pub fn or_where_group<F>(self, build: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.where_group_with(Connector::Or, build)
    }

    /// Attach one group of clauses with an explicit connector. Empty groups are ignored.
    pub fn where_with(mut self, connector: Connector, clauses: Vec<Clause>) -> Self {
        self.tree.push_group(connector, clauses);
        self
    }

    /// Attach a callback-built group with an explicit connector.
    ///
    /// The callback's whole tree is kept, so groups nest to any depth.
    pub fn where_group_with<F>(mut self, connector: Connector, build: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        let sub = build(self.new_query());
        self.tree.push_nested(connector, sub.tree);
        self
    }

    /// `and column in (...)`. An empty list matches nothing.
    pub fn where_in<I>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.where_in_with(Connector::And, column, values, false)
    }

    /// `and column not in (...)`. An empty list matches everything.
    pub fn where_not_in<I>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.where_in_with(Connector::And, column, values, true)
    }

    pub fn or_where_in<I>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.where_in_with(Connector::Or, column, values, false)
    }

    pub fn or_where_not_in<I>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.where_in_with(Connector::Or, column, values, true)
    }

    /// General IN / NOT IN form.
    ///
    /// Every call binds its values under a fresh random tag, so repeated IN lists on the
    /// same column never share a placeholder name.
    pub fn where_in_with<I>(
        mut self,
        connector: Connector,
        column: impl Into<String>,
        values: I,
        negate: bool,
    ) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.tree.push_sub(SubExpression::in_list(
            connector,
            column,
            values,
            negate,
            &random_tag(),
        ));
        self
    }

    // ==================== Projection / ordering / paging ====================

    /// Output fields. An empty list selects `*`.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn skip(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Add an ascending sort column. Calls accumulate in order.
    pub fn order_by(self, column: impl Into<String>) -> Self {
        self.order_by_dir(column, Direction::Asc)
    }

    pub fn order_by_desc(self, column: impl Into<String>) -> Self {
        self.order_by_dir(column, Direction::Desc)
    }

    pub fn order_by_dir(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.orders.push((column.into(), direction));
        self
    }

    /// Pagination helper.
    ///
    /// `page` is 1-based (clamped to >= 1).
    /// `per_page` is clamped to >= 1.
    pub fn paginate(self, page: u64, per_page: u64) -> Self {
        let page = page.max(1);
        let size = per_page.max(1);
        self.limit(size).skip((page - 1) * size)
    }

    // ==================== Rendering ====================

    /// Render the WHERE clause (always starting with ` where 1 = 1`) and its bindings.
    pub fn render_where(&self) -> (String, Bindings) {
        self.tree.render()
    }

    /// The SELECT text this builder renders (for debugging and tests).
    pub fn to_sql(&self) -> String {
        self.build_select().sql().to_string()
    }

    fn field_list(&self) -> String {
        if self.fields.is_empty() {
            "*".to_string()
        } else {
            self.fields.join(", ")
        }
    }

    /// Render the SELECT statement: fields, WHERE, then order, limit and offset.
    pub fn build_select(&self) -> Statement {
        let (where_sql, bindings) = self.render_where();
        let mut sql = format!(
            "select {} from {}{}",
            self.field_list(),
            self.model.table_name(),
            where_sql
        );

        if !self.orders.is_empty() {
            let orders: Vec<String> = self
                .orders
                .iter()
                .map(|(column, direction)| format!("{column} {direction}"))
                .collect();
            sql.push_str(" order by ");
            sql.push_str(&orders.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" limit {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" offset {offset}"));
        }

        Statement::new(StatementKind::Select, self.model.table_name(), sql, bindings)
    }

    /// Render `select count(*)` over the accumulated WHERE. Order, limit and offset are
    /// ignored.
    pub fn build_count(&self) -> Statement {
        let (where_sql, bindings) = self.render_where();
        let sql = format!(
            "select count(*) as count from {}{}",
            self.model.table_name(),
            where_sql
        );
        Statement::new(StatementKind::Select, self.model.table_name(), sql, bindings)
    }

    /// Render `insert into {table} (cols) values (:col_0, ...)`.
    pub fn build_insert(&self, attributes: &Attributes) -> OrmResult<Statement> {
        if attributes.is_empty() {
            return Err(OrmError::validation(format!(
                "insert into {} requires at least one attribute",
                self.model.table_name()
            )));
        }

        let mut bindings = Bindings::new();
        let mut columns = Vec::with_capacity(attributes.len());
        let mut holders = Vec::with_capacity(attributes.len());
        for (i, (column, value)) in attributes.iter().enumerate() {
            let name = format!("{}_{}", placeholder_stem(column), i);
            columns.push(column.as_str());
            holders.push(format!(":{name}"));
            bindings.bind(name, value.clone());
        }

        let sql = format!(
            "insert into {} ({}) values ({})",
            self.model.table_name(),
            columns.join(", "),
            holders.join(", ")
        );
        Ok(Statement::new(StatementKind::Insert, self.model.table_name(), sql, bindings))
    }

    /// Render `update {table} set ... where ...`.
    ///
    /// SET placeholders carry a fresh random tag so they never collide with WHERE
    /// placeholders on the same column.
    pub fn build_update(&self, attributes: &Attributes) -> OrmResult<Statement> {
        self.build_update_tagged(attributes, &random_tag())
    }

    pub(crate) fn build_update_tagged(&self, attributes: &Attributes, tag: &str) -> OrmResult<Statement> {
        if attributes.is_empty() {
            return Err(OrmError::validation(format!(
                "update {} requires at least one attribute",
                self.model.table_name()
            )));
        }

        let (where_sql, mut bindings) = self.render_where();
        let mut sets = Vec::with_capacity(attributes.len());
        for (i, (column, value)) in attributes.iter().enumerate() {
            let name = format!("{}_{}_{}", placeholder_stem(column), tag, i);
            sets.push(format!("{column} = :{name}"));
            bindings.bind(name, value.clone());
        }

        let sql = format!(
            "update {} set {}{}",
            self.model.table_name(),
            sets.join(", "),
            where_sql
        );
        Ok(Statement::new(StatementKind::Update, self.model.table_name(), sql, bindings))
    }

    /// Render `delete from {table} where ...`.
    pub fn build_delete(&self) -> Statement {
        let (where_sql, bindings) = self.render_where();
        let sql = format!("delete from {}{}", self.model.table_name(), where_sql);
        Statement::new(StatementKind::Delete, self.model.table_name(), sql, bindings)
    }

    // ==================== Execution ====================

    fn to_record(&self, attributes: Attributes) -> Record {
        Record::from_row(Arc::clone(&self.model), attributes, true)
    }

    /// Run the SELECT and decode every row into an existing [`Record`], in row order.
    pub async fn get(&self, conn: &impl Connection) -> OrmResult<Vec<Record>> {
        let stmt = self.build_select();
        log_statement(&stmt);
        let rows = conn.fetch_all(&stmt).await?;
        Ok(rows.into_iter().map(|row| self.to_record(row)).collect())
    }

    /// Run the SELECT and decode every row with [`FromRow`].
    pub async fn get_as<T: FromRow>(&self, conn: &impl Connection) -> OrmResult<Vec<T>> {
        let stmt = self.build_select();
        log_statement(&stmt);
        let rows = conn.fetch_all(&stmt).await?;
        rows.iter().map(T::from_row).collect()
    }

    fn build_first(&self) -> Statement {
        let mut single = self.clone();
        single.limit = Some(self.limit.map_or(1, |n| n.min(1)));
        single.build_select()
    }

    /// Fetch at most one row. No match is `Ok(None)`, never an error.
    pub async fn first(&self, conn: &impl Connection) -> OrmResult<Option<Record>> {
        let stmt = self.build_first();
        log_statement(&stmt);
        let row = conn.fetch_opt(&stmt).await?;
        Ok(row.map(|row| self.to_record(row)))
    }

    pub async fn first_as<T: FromRow>(&self, conn: &impl Connection) -> OrmResult<Option<T>> {
        let stmt = self.build_first();
        log_statement(&stmt);
        conn.fetch_opt(&stmt).await?.as_ref().map(T::from_row).transpose()
    }

    /// Count rows matching the accumulated WHERE.
    pub async fn count(&self, conn: &impl Connection) -> OrmResult<i64> {
        let stmt = self.build_count();
        log_statement(&stmt);
        match conn.fetch_opt(&stmt).await? {
            Some(row) => row.try_get_column("count"),
            None => Ok(0),
        }
    }

    /// Insert `attributes` and reload the new row by its generated identifier.
    ///
    /// Returns `Ok(None)` when the insert affected no rows. Driver failures (constraint
    /// violations included) are returned as errors.
    pub async fn create(&self, conn: &impl Connection, attributes: &Attributes) -> OrmResult<Option<Record>> {
        let stmt = self.build_insert(attributes)?;
        log_statement(&stmt);
        let identifier = self.model.identifier_name();
        let inserted = conn.insert(&stmt, identifier).await?;
        if inserted.affected == 0 {
            return Ok(None);
        }
        let Some(last_id) = inserted.last_id else {
            return Ok(None);
        };
        self.new_query().where_eq(identifier, last_id).first(conn).await
    }

    /// Update the rows matched by the accumulated WHERE; returns the affected row count.
    pub async fn update(&self, conn: &impl Connection, attributes: &Attributes) -> OrmResult<u64> {
        let stmt = self.build_update(attributes)?;
        log_statement(&stmt);
        conn.execute(&stmt).await
    }

    /// Merge `condition` into the WHERE as one group, then update.
    ///
    /// ```ignore
    /// // update users set name = :name_{tag}_0 where 1 = 1 and ( id = :id_0)
    /// qb.update_where(&client, &attrs, [("id", 5)]).await?;
    /// ```
    pub async fn update_where<I>(
        &self,
        conn: &impl Connection,
        attributes: &Attributes,
        condition: I,
    ) -> OrmResult<u64>
    where
        I: IntoIterator,
        I::Item: Into<Clause>,
    {
        let scoped = self.clone().where_all(condition);
        scoped.update(conn, attributes).await
    }

    /// Delete the rows matched by the accumulated WHERE; returns the affected row count.
    pub async fn delete(&self, conn: &impl Connection) -> OrmResult<u64> {
        let stmt = self.build_delete();
        log_statement(&stmt);
        conn.execute(&stmt).await
    }
}
