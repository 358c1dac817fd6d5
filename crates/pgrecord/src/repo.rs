//! Model-level verbs bound to one connection.

use crate::client::Connection;
use crate::error::OrmResult;
use crate::model::{ModelDef, Record};
use crate::qb::QueryBuilder;
use crate::value::{Attributes, Value};
use std::sync::Arc;

/// A model definition paired with the connection its verbs run on.
///
/// Every verb starts from a fresh [`QueryBuilder`], so calls never see each other's
/// conditions.
///
/// # Example
///
/// ```ignore
/// use pgrecord::{ModelDef, Repo};
///
/// let users = Repo::new(&client, ModelDef::for_type("User").fillable(["name"]));
/// let ann = users.create(&attrs, true).await?;
/// let found = users.find(1).await?;
/// let removed = users.destroy([1, 2, 3]).await?;
/// ```
pub struct Repo<'c, C: Connection> {
    conn: &'c C,
    model: Arc<ModelDef>,
}

impl<'c, C: Connection> Repo<'c, C> {
    pub fn new(conn: &'c C, model: impl Into<Arc<ModelDef>>) -> Self {
        Self {
            conn,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &Arc<ModelDef> {
        &self.model
    }

    pub fn connection(&self) -> &'c C {
        self.conn
    }

    /// A fresh builder for this model. Execute it with [`Repo::connection`].
    pub fn query(&self) -> QueryBuilder {
        QueryBuilder::new(Arc::clone(&self.model))
    }

    /// A new, unsaved record. Assigning the identifier fails with `ReadOnlyAttribute`.
    pub fn make(&self, attributes: Attributes) -> OrmResult<Record> {
        let mut record = Record::new(Arc::clone(&self.model));
        for (name, value) in attributes {
            record.set(&name, value)?;
        }
        Ok(record)
    }

    /// Load the record whose identifier equals `id`.
    pub async fn find(&self, id: impl Into<Value>) -> OrmResult<Option<Record>> {
        self.query()
            .where_eq(self.model.identifier_name(), id)
            .first(self.conn)
            .await
    }

    pub async fn all(&self) -> OrmResult<Vec<Record>> {
        self.query().get(self.conn).await
    }

    /// Insert a row and return it as reloaded from the database.
    ///
    /// With `fillable`, attributes outside the model's fillable list are dropped first.
    pub async fn create(&self, attributes: &Attributes, fillable: bool) -> OrmResult<Option<Record>> {
        if fillable {
            let attributes = self.model.only_fillable(attributes);
            self.query().create(self.conn, &attributes).await
        } else {
            self.query().create(self.conn, attributes).await
        }
    }

    /// Create each row in turn (fillable-filtered). Stops at the first driver error.
    pub async fn create_many<I>(&self, rows: I) -> OrmResult<Vec<Option<Record>>>
    where
        I: IntoIterator<Item = Attributes>,
    {
        let mut created = Vec::new();
        for row in rows {
            created.push(self.create(&row, true).await?);
        }
        Ok(created)
    }

    /// Delete by identifier, one statement per id. Returns how many ids matched a row.
    ///
    /// A single id is passed as `[id]`.
    pub async fn destroy<I>(&self, ids: I) -> OrmResult<u64>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let mut count = 0;
        for id in ids {
            let affected = self
                .query()
                .where_eq(self.model.identifier_name(), id)
                .delete(self.conn)
                .await?;
            if affected > 0 {
                count += 1;
            }
        }
        Ok(count)
    }
}

impl<C: Connection> Clone for Repo<'_, C> {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn,
            model: Arc::clone(&self.model),
        }
    }
}
