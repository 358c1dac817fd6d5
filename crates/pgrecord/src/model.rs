//! Model definitions and records.
//!
//! A [`ModelDef`] describes one table: its name, identifier column, the fillable and
//! hidden attribute lists, and a registry of computed accessors and write mutators.
//! A [`Record`] is one row's attribute bag tied to its definition, with the persistence
//! verbs `save`, `update` and `delete`.

use crate::client::Connection;
use crate::error::{OrmError, OrmResult};
use crate::qb::QueryBuilder;
use crate::row::FromValue;
use crate::value::{Attributes, Value};
use heck::ToSnakeCase;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Computed read of an attribute from the full attribute bag.
pub type Accessor = Arc<dyn Fn(&Attributes) -> Value + Send + Sync>;

/// Transformation applied to a value before it is stored.
pub type Mutator = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Table-level metadata shared by every record and builder of one model.
///
/// # Example
///
/// ```ignore
/// use pgrecord::{ModelDef, Value};
///
/// let users = ModelDef::for_type("User")
///     .fillable(["name", "email"])
///     .hidden(["password"])
///     .mutator("email", |v| match v {
///         Value::Text(s) => Value::Text(s.to_lowercase()),
///         other => other,
///     });
/// assert_eq!(users.table_name(), "users");
/// ```
#[derive(Clone)]
pub struct ModelDef {
    table: String,
    identifier: String,
    fillable: Vec<String>,
    hidden: Vec<String>,
    accessors: HashMap<String, Accessor>,
    mutators: HashMap<String, Mutator>,
}

impl ModelDef {
    /// Define a model over `table` with identifier column `id`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            identifier: "id".to_string(),
            fillable: Vec::new(),
            hidden: Vec::new(),
            accessors: HashMap::new(),
            mutators: HashMap::new(),
        }
    }

    /// Derive the table name from a type name: `BlogPost` → `blog_posts`.
    ///
    /// A leading module path (`app::models::User`) is ignored.
    pub fn for_type(type_name: &str) -> Self {
        let base = type_name.rsplit("::").next().unwrap_or(type_name);
        Self::new(pluralize(&base.to_snake_case()))
    }

    pub fn identifier(mut self, column: impl Into<String>) -> Self {
        self.identifier = column.into();
        self
    }

    /// Attributes accepted by mass assignment (`fill`, `Repo::create`, `update`).
    pub fn fillable<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fillable = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Attributes left out of `to_map` / `to_json`.
    pub fn hidden<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hidden = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Register a computed accessor consulted by [`Record::get`].
    pub fn accessor<F>(mut self, field: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Attributes) -> Value + Send + Sync + 'static,
    {
        self.accessors.insert(field.into(), Arc::new(f));
        self
    }

    /// Register a mutator applied by [`Record::set`].
    pub fn mutator<F>(mut self, field: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.mutators.insert(field.into(), Arc::new(f));
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn identifier_name(&self) -> &str {
        &self.identifier
    }

    pub fn is_fillable(&self, column: &str) -> bool {
        self.fillable.iter().any(|c| c == column)
    }

    pub fn is_hidden(&self, column: &str) -> bool {
        self.hidden.iter().any(|c| c == column)
    }

    /// Keep only the fillable entries of `attributes`, preserving order.
    pub fn only_fillable(&self, attributes: &Attributes) -> Attributes {
        attributes
            .iter()
            .filter(|(k, _)| self.is_fillable(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl fmt::Debug for ModelDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut accessors: Vec<&String> = self.accessors.keys().collect();
        accessors.sort();
        let mut mutators: Vec<&String> = self.mutators.keys().collect();
        mutators.sort();
        f.debug_struct("ModelDef")
            .field("table", &self.table)
            .field("identifier", &self.identifier)
            .field("fillable", &self.fillable)
            .field("hidden", &self.hidden)
            .field("accessors", &accessors)
            .field("mutators", &mutators)
            .finish()
    }
}

fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    if let Some(stem) = word.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{stem}ies");
        }
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        return format!("{word}es");
    }
    format!("{word}s")
}

#[cfg(feature = "tracing")]
fn log_verb(model: &ModelDef, verb: &'static str) {
    tracing::trace!(target: "pgrecord.model", table = model.table_name(), verb);
}

#[cfg(not(feature = "tracing"))]
fn log_verb(_model: &ModelDef, _verb: &'static str) {}

/// One row of a model.
///
/// Attribute order follows the row (or the order of assignment). `exists` marks whether
/// the record is backed by a stored row.
#[derive(Clone, Debug)]
pub struct Record {
    model: Arc<ModelDef>,
    attributes: Attributes,
    exists: bool,
}

impl Record {
    /// An empty record that has not been persisted.
    pub fn new(model: Arc<ModelDef>) -> Self {
        Self::from_row(model, Attributes::new(), false)
    }

    /// Build a record from raw attributes without running mutators or the read-only
    /// check.
    pub fn from_row(model: Arc<ModelDef>, attributes: Attributes, exists: bool) -> Self {
        Self {
            model,
            attributes,
            exists,
        }
    }

    pub fn model(&self) -> &Arc<ModelDef> {
        &self.model
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn into_attributes(self) -> Attributes {
        self.attributes
    }

    /// The identifier value, if loaded.
    pub fn id(&self) -> Option<&Value> {
        self.attributes
            .get(self.model.identifier_name())
            .filter(|v| !v.is_null())
    }

    pub fn has(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Read an attribute through its accessor, if one is registered.
    pub fn get(&self, name: &str) -> Option<Value> {
        match self.model.accessors.get(name) {
            Some(accessor) => Some(accessor(&self.attributes)),
            None => self.attributes.get(name).cloned(),
        }
    }

    /// Read the stored value, bypassing accessors.
    pub fn get_raw(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Read an attribute (through its accessor) as a typed value.
    pub fn get_as<T: FromValue>(&self, name: &str) -> OrmResult<T> {
        let value = self.get(name).unwrap_or(Value::Null);
        T::from_value(&value).map_err(|message| OrmError::decode(name, message))
    }

    /// Assign an attribute through its mutator.
    ///
    /// The identifier is read-only: assigning it fails before anything else happens.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> OrmResult<()> {
        if name == self.model.identifier_name() {
            return Err(OrmError::ReadOnlyAttribute(name.to_string()));
        }
        let value = value.into();
        let value = match self.model.mutators.get(name) {
            Some(mutator) => mutator(value),
            None => value,
        };
        self.attributes.insert(name.to_string(), value);
        Ok(())
    }

    /// Assign every fillable entry of `attributes`; the rest are ignored.
    pub fn fill(&mut self, attributes: Attributes) -> OrmResult<()> {
        for (name, value) in attributes {
            if self.model.is_fillable(&name) {
                self.set(&name, value)?;
            }
        }
        Ok(())
    }

    /// Unset an attribute.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.attributes.shift_remove(name)
    }

    /// Attributes without the hidden ones.
    pub fn to_map(&self) -> Attributes {
        self.attributes
            .iter()
            .filter(|(k, _)| !self.model.is_hidden(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.to_map()
                .into_iter()
                .map(|(k, v)| (k, v.to_json()))
                .collect(),
        )
    }

    fn query(&self) -> QueryBuilder {
        QueryBuilder::new(Arc::clone(&self.model))
    }

    fn key(&self) -> OrmResult<Value> {
        self.id().cloned().ok_or_else(|| {
            OrmError::validation(format!(
                "{} record has no {} value",
                self.model.table_name(),
                self.model.identifier_name()
            ))
        })
    }

    /// Persist the record.
    ///
    /// A new record is inserted with all its attributes (no fillable filter) and then
    /// reloaded, picking up the generated identifier and column defaults. An existing
    /// record overwrites every attribute except the identifier, keyed by identifier.
    ///
    /// Returns `false` if the insert or update touched no row.
    pub async fn save(&mut self, conn: &impl Connection) -> OrmResult<bool> {
        log_verb(&self.model, "save");
        if !self.exists {
            let created = self.query().create(conn, &self.attributes).await?;
            return match created {
                Some(stored) => {
                    self.attributes = stored.attributes;
                    self.exists = true;
                    Ok(true)
                }
                None => Ok(false),
            };
        }

        let key = self.key()?;
        let identifier = self.model.identifier_name();
        let mut attributes = self.attributes.clone();
        attributes.shift_remove(identifier);
        if attributes.is_empty() {
            return Ok(true);
        }
        let affected = self
            .query()
            .update_where(conn, &attributes, [(identifier, key)])
            .await?;
        Ok(affected > 0)
    }

    /// Persist only the entries of `attributes` that differ from the in-memory state.
    ///
    /// With `fillable`, entries outside the model's fillable list are dropped first.
    /// The identifier is never written. Nothing to change is a trivial success. On success the persisted entries are
    /// merged into the record.
    pub async fn update(
        &mut self,
        conn: &impl Connection,
        attributes: Attributes,
        fillable: bool,
    ) -> OrmResult<bool> {
        log_verb(&self.model, "update");
        let identifier = self.model.identifier_name();
        let mut changed: Attributes = attributes
            .into_iter()
            .filter(|(k, v)| k != identifier && self.attributes.get(k) != Some(v))
            .collect();
        if fillable {
            changed = self.model.only_fillable(&changed);
        }
        if changed.is_empty() {
            return Ok(true);
        }

        let key = self.key()?;
        let affected = self
            .query()
            .update_where(conn, &changed, [(identifier, key)])
            .await?;
        if affected == 0 {
            return Ok(false);
        }
        self.attributes.extend(changed);
        Ok(true)
    }

    /// Delete the stored row. A record that does not exist deletes nothing.
    pub async fn delete(&mut self, conn: &impl Connection) -> OrmResult<u64> {
        log_verb(&self.model, "delete");
        if !self.exists {
            return Ok(0);
        }
        let key = self.key()?;
        let affected = self
            .query()
            .where_eq(self.model.identifier_name(), key)
            .delete(conn)
            .await?;
        if affected > 0 {
            self.exists = false;
        }
        Ok(affected)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.model.table_name() == other.model.table_name()
            && self.exists == other.exists
            && self.attributes == other.attributes
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}
