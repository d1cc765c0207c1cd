//! Entity CRUD on top of the catalog's statement templates.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::orm::db::{Db, OrmError};
use crate::orm::query::Query;
use crate::orm::schema::{quoted, Catalog, Entity, Schema};

/// Executes catalog templates against the database. Cheap to clone; handlers
/// receive it through application state rather than a process-wide global.
#[derive(Clone)]
pub struct Store {
    db: Db,
    catalog: Arc<Catalog>,
}

impl Store {
    pub fn new(db: Db, catalog: Arc<Catalog>) -> Store {
        Store { db, catalog }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn schema<E: Entity>(&self) -> Result<&Schema, OrmError> {
        self.catalog
            .get(E::NAME)
            .ok_or(OrmError::Unregistered(E::NAME))
    }

    /// Issue the entity's create-table statement (a no-op when the table
    /// already exists).
    pub async fn create_table<E: Entity>(&self) -> Result<(), OrmError> {
        let schema = self.schema::<E>()?;
        tracing::info!(table = schema.table, "ensuring table");
        self.db.execute(&schema.create, &[]).await?;
        Ok(())
    }

    /// Create every registered entity's table.
    pub async fn create_all_tables(&self) -> Result<(), OrmError> {
        for schema in self.catalog.iter() {
            tracing::info!(table = schema.table, "ensuring table");
            self.db.execute(&schema.create, &[]).await?;
        }
        Ok(())
    }

    /// Fetch one entity by primary key.
    pub async fn find<E: Entity>(&self, pk: impl Into<Value>) -> Result<Option<E>, OrmError> {
        let schema = self.schema::<E>()?;
        let sql = format!("{} where {}=?", schema.select, schema.pk_column);
        let rows = self.db.select(&sql, &[pk.into()], Some(1)).await?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Fetch every entity matching the query, in query order.
    pub async fn find_all<E: Entity>(&self, query: Query<'_>) -> Result<Vec<E>, OrmError> {
        let schema = self.schema::<E>()?;
        let mut sql = schema.select.clone();
        let mut args: Vec<Value> = Vec::new();
        query.append_to(&mut sql, &mut args);
        let rows = self.db.select(&sql, &args, None).await?;
        rows.into_iter().map(from_row).collect()
    }

    /// Evaluate an aggregate expression, e.g. `count(id)`, over the entity's
    /// table. Returns `None` when the select produces no row.
    pub async fn find_number<E: Entity>(
        &self,
        select_field: &str,
        where_clause: Option<&str>,
        args: &[Value],
    ) -> Result<Option<Value>, OrmError> {
        let schema = self.schema::<E>()?;
        let mut sql = format!(
            "select {} as _num_ from {}",
            select_field,
            quoted(schema.table)
        );
        if let Some(w) = where_clause.filter(|w| !w.is_empty()) {
            sql.push_str(" where ");
            sql.push_str(w);
        }
        let mut rows = self.db.select(&sql, args, Some(1)).await?;
        Ok(rows.first_mut().and_then(|row| row.remove("_num_")))
    }

    /// Insert the entity. Unset columns take their declared defaults, which
    /// are also written back onto the entity so the caller sees the stored
    /// values. Returns the affected-row count.
    pub async fn save<E: Entity>(&self, entity: &mut E) -> Result<u64, OrmError> {
        let schema = self.schema::<E>()?;
        let mut row = to_row(entity)?;
        fill_defaults(schema, &mut row);
        let mut args = arg_values(&row, &schema.attrs);
        args.push(row.get(schema.pk).cloned().unwrap_or(Value::Null));
        *entity = from_row(row)?;
        let affected = self.db.execute(&schema.insert, &args).await?;
        if affected != 1 {
            tracing::warn!(affected, "failed to insert record");
        }
        Ok(affected)
    }

    /// Update all non-key columns by primary key. Unset columns are written
    /// as null; no defaults apply here.
    pub async fn update<E: Entity>(&self, entity: &E) -> Result<u64, OrmError> {
        let schema = self.schema::<E>()?;
        let row = to_row(entity)?;
        let mut args = arg_values(&row, &schema.attrs);
        args.push(row.get(schema.pk).cloned().unwrap_or(Value::Null));
        let affected = self.db.execute(&schema.update, &args).await?;
        if affected != 1 {
            tracing::warn!(affected, "failed to update by primary key");
        }
        Ok(affected)
    }

    /// Delete by primary key. Returns the affected-row count.
    pub async fn remove<E: Entity>(&self, entity: &E) -> Result<u64, OrmError> {
        let schema = self.schema::<E>()?;
        let row = to_row(entity)?;
        let args = vec![row.get(schema.pk).cloned().unwrap_or(Value::Null)];
        let affected = self.db.execute(&schema.delete, &args).await?;
        if affected != 1 {
            tracing::warn!(affected, "failed to remove by primary key");
        }
        Ok(affected)
    }
}

fn to_row<E: Entity>(entity: &E) -> Result<Map<String, Value>, OrmError> {
    match serde_json::to_value(entity)? {
        Value::Object(map) => Ok(map),
        _ => Err(OrmError::NonObject(E::NAME)),
    }
}

fn from_row<E: Entity>(row: Map<String, Value>) -> Result<E, OrmError> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

/// Replace absent or null attribute values with their declared defaults.
fn fill_defaults(schema: &Schema, row: &mut Map<String, Value>) {
    for (attr, field) in &schema.fields {
        let unset = matches!(row.get(*attr), None | Some(Value::Null));
        if unset {
            if let Some(value) = field.default.produce() {
                tracing::debug!(attr = *attr, value = %value, "using default for unset column");
                row.insert((*attr).to_string(), value);
            }
        }
    }
}

/// Attribute values in the given order; absent entries bind as null.
fn arg_values(row: &Map<String, Value>, attrs: &[&'static str]) -> Vec<Value> {
    attrs
        .iter()
        .map(|a| row.get(*a).cloned().unwrap_or(Value::Null))
        .collect()
}
