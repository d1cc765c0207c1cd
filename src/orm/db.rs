//! MySQL access: a bounded pool plus select/execute with JSON-valued rows.

use serde_json::{Map, Value};
use sqlx::encode::{Encode, IsNull};
use sqlx::mysql::{MySql, MySqlConnectOptions, MySqlPoolOptions, MySqlRow, MySqlTypeInfo};
use sqlx::{Database, MySqlPool};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrmError {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("entity conversion: {0}")]
    Convert(#[from] serde_json::Error),
    #[error("entity '{0}' is not registered in the catalog")]
    Unregistered(&'static str),
    #[error("entity '{0}' must serialize to an object")]
    NonObject(&'static str),
}

/// Connection settings; defaults mirror a local development MySQL.
#[derive(Clone, Debug)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub charset: String,
    pub pool_min: u32,
    pub pool_max: u32,
}

impl Default for DbConfig {
    fn default() -> DbConfig {
        DbConfig {
            host: "localhost".into(),
            port: 3306,
            user: "root".into(),
            password: String::new(),
            database: "weblog".into(),
            charset: "utf8".into(),
            pool_min: 1,
            pool_max: 10,
        }
    }
}

/// Cloneable pool handle. Created once at startup and passed to whatever
/// queries; connections are borrowed per operation and always returned,
/// including on error paths.
#[derive(Clone)]
pub struct Db {
    pool: MySqlPool,
}

impl Db {
    pub async fn connect(config: &DbConfig) -> Result<Db, OrmError> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database)
            .charset(&config.charset);
        let pool = MySqlPoolOptions::new()
            .min_connections(config.pool_min)
            .max_connections(config.pool_max)
            .connect_with(options)
            .await?;
        tracing::info!(
            host = %config.host,
            database = %config.database,
            "database pool created"
        );
        Ok(Db { pool })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Run a select, returning rows as column-ordered JSON maps. `limit`
    /// truncates client-side, like a sized cursor fetch.
    pub async fn select(
        &self,
        sql: &str,
        args: &[Value],
        limit: Option<usize>,
    ) -> Result<Vec<Map<String, Value>>, OrmError> {
        tracing::debug!(sql = %sql, args = ?args, "select");
        let mut query = sqlx::query(sql);
        for a in args {
            query = query.bind(SqlParam::from_json(a));
        }
        let rows = query.fetch_all(&self.pool).await?;
        let mut out: Vec<Map<String, Value>> = rows.iter().map(row_to_map).collect();
        if let Some(n) = limit {
            out.truncate(n);
        }
        tracing::debug!(rows = out.len(), "rows returned");
        Ok(out)
    }

    /// Run a statement in autocommit mode; returns the affected-row count.
    pub async fn execute(&self, sql: &str, args: &[Value]) -> Result<u64, OrmError> {
        tracing::debug!(sql = %sql, args = ?args, "execute");
        let mut query = sqlx::query(sql);
        for a in args {
            query = query.bind(SqlParam::from_json(a));
        }
        let done = query.execute(&self.pool).await?;
        Ok(done.rows_affected())
    }

    /// Run a statement inside an explicit transaction, committed on success.
    /// On error the transaction rolls back as it drops.
    pub async fn execute_tx(&self, sql: &str, args: &[Value]) -> Result<u64, OrmError> {
        tracing::debug!(sql = %sql, args = ?args, "execute (tx)");
        let mut tx = self.pool.begin().await?;
        let mut query = sqlx::query(sql);
        for a in args {
            query = query.bind(SqlParam::from_json(a));
        }
        let done = query.execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(done.rows_affected())
    }
}

/// A value bindable to a MySQL query. Converts from `serde_json::Value`;
/// arrays and objects bind as their JSON text.
#[derive(Clone, Debug)]
pub enum SqlParam {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(String),
}

impl SqlParam {
    pub fn from_json(v: &Value) -> SqlParam {
        match v {
            Value::Null => SqlParam::Null,
            Value::Bool(b) => SqlParam::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlParam::Int(i)
                } else if let Some(u) = n.as_u64() {
                    SqlParam::Uint(u)
                } else {
                    SqlParam::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => SqlParam::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => SqlParam::Text(v.to_string()),
        }
    }
}

impl<'q> Encode<'q, MySql> for SqlParam {
    fn encode_by_ref(
        &self,
        buf: &mut <MySql as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            SqlParam::Null => <Option<i64> as Encode<MySql>>::encode_by_ref(&None, buf)?,
            SqlParam::Bool(b) => <bool as Encode<MySql>>::encode_by_ref(b, buf)?,
            SqlParam::Int(n) => <i64 as Encode<MySql>>::encode_by_ref(n, buf)?,
            SqlParam::Uint(n) => <u64 as Encode<MySql>>::encode_by_ref(n, buf)?,
            SqlParam::Float(n) => <f64 as Encode<MySql>>::encode_by_ref(n, buf)?,
            SqlParam::Text(s) => {
                let s_ref: &str = s.as_str();
                <&str as Encode<MySql>>::encode_by_ref(&s_ref, buf)?
            }
        })
    }

    fn produces(&self) -> Option<MySqlTypeInfo> {
        Some(match self {
            SqlParam::Null | SqlParam::Text(_) => <str as sqlx::Type<MySql>>::type_info(),
            SqlParam::Bool(_) => <bool as sqlx::Type<MySql>>::type_info(),
            SqlParam::Int(_) => <i64 as sqlx::Type<MySql>>::type_info(),
            SqlParam::Uint(_) => <u64 as sqlx::Type<MySql>>::type_info(),
            SqlParam::Float(_) => <f64 as sqlx::Type<MySql>>::type_info(),
        })
    }
}

impl sqlx::Type<MySql> for SqlParam {
    fn type_info() -> MySqlTypeInfo {
        <str as sqlx::Type<MySql>>::type_info()
    }
}

fn row_to_map(row: &MySqlRow) -> Map<String, Value> {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

fn cell_to_value(row: &MySqlRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(v) = row.try_get::<Option<bool>, _>(name) {
        if let Some(b) = v {
            return Value::Bool(b);
        }
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(name) {
        if let Some(n) = v {
            return Value::Number(n.into());
        }
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(name) {
        if let Some(n) = v {
            return Value::Number(n.into());
        }
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = v {
            if let Some(n) = serde_json::Number::from_f64(n as f64) {
                return Value::Number(n);
            }
        }
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = v {
            if let Some(n) = serde_json::Number::from_f64(n) {
                return Value::Number(n);
            }
        }
    }
    if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        if let Some(d) = v {
            return Value::String(d.to_rfc3339());
        }
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        if let Some(d) = v {
            return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
        }
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        if let Some(d) = v {
            return Value::String(d.format("%Y-%m-%d").to_string());
        }
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(name) {
        if let Some(s) = v {
            return Value::String(s);
        }
    }
    if let Ok(v) = row.try_get::<Option<Value>, _>(name) {
        if let Some(j) = v {
            return j;
        }
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_convert_from_json_scalars() {
        assert!(matches!(SqlParam::from_json(&Value::Null), SqlParam::Null));
        assert!(matches!(
            SqlParam::from_json(&Value::Bool(true)),
            SqlParam::Bool(true)
        ));
        assert!(matches!(
            SqlParam::from_json(&Value::from(-7i64)),
            SqlParam::Int(-7)
        ));
        assert!(matches!(
            SqlParam::from_json(&Value::from(u64::MAX)),
            SqlParam::Uint(u64::MAX)
        ));
        assert!(matches!(
            SqlParam::from_json(&Value::from(1.5f64)),
            SqlParam::Float(f) if f == 1.5
        ));
    }

    #[test]
    fn structured_params_bind_as_json_text() {
        let v = serde_json::json!({"a": 1});
        match SqlParam::from_json(&v) {
            SqlParam::Text(s) => assert_eq!(s, "{\"a\":1}"),
            other => panic!("expected Text, got {:?}", other),
        }
    }
}
