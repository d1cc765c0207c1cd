//! Schema-driven MySQL persistence. Field declarations compile into the
//! statement templates a [`Store`] executes over a shared pool.

pub mod db;
pub mod field;
pub mod query;
pub mod schema;
pub mod store;

pub use db::{Db, DbConfig, OrmError, SqlParam};
pub use field::{Field, FieldDefault};
pub use query::{Limit, Query};
pub use schema::{Catalog, CatalogBuilder, Entity, Schema, SchemaError, TableDecl};
pub use store::Store;
