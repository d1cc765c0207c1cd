//! Entity schemas: field declarations compiled to SQL statement templates.

use crate::orm::field::Field;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("entity {entity}: no primary key declared")]
    MissingPrimaryKey { entity: &'static str },
    #[error("entity {entity}: duplicate primary key on '{attr}'")]
    DuplicatePrimaryKey { entity: &'static str, attr: &'static str },
    #[error("entity {entity}: duplicate attribute '{attr}'")]
    DuplicateAttribute { entity: &'static str, attr: &'static str },
    #[error("entity {0} registered twice")]
    DuplicateEntity(&'static str),
}

/// A declared record type that maps onto one table.
///
/// Records serialize to and from JSON objects keyed by attribute name; the
/// store uses that boundary for row assembly and nothing else.
pub trait Entity: Serialize + DeserializeOwned + Send {
    /// Catalog key.
    const NAME: &'static str;
    /// Table name plus ordered field declarations.
    fn declaration() -> TableDecl;
}

/// Ordered field declarations for one table.
pub struct TableDecl {
    pub table: &'static str,
    pub fields: Vec<(&'static str, Field)>,
}

impl TableDecl {
    pub fn new(table: &'static str) -> TableDecl {
        TableDecl {
            table,
            fields: Vec::new(),
        }
    }

    /// Append one attribute in declaration order.
    pub fn field(mut self, attr: &'static str, field: Field) -> TableDecl {
        self.fields.push((attr, field));
        self
    }
}

/// Quote an identifier for MySQL.
pub(crate) fn quoted(s: &str) -> String {
    format!("`{}`", s.replace('`', "``"))
}

/// `?, ?, ...` for `n` arguments.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Immutable compilation of one entity declaration: resolved names plus the
/// five statement templates every store operation is built from.
#[derive(Debug)]
pub struct Schema {
    pub entity: &'static str,
    pub table: &'static str,
    /// Primary-key attribute name.
    pub pk: &'static str,
    /// Primary-key column name (override-aware).
    pub pk_column: String,
    /// Non-key attribute names in declaration order.
    pub attrs: Vec<&'static str>,
    /// All declared fields in declaration order.
    pub fields: Vec<(&'static str, Field)>,
    pub select: String,
    pub insert: String,
    pub update: String,
    pub delete: String,
    pub create: String,
}

impl Schema {
    /// Compile a declaration. Exactly one primary key and unique attribute
    /// names are required; violations abort startup.
    pub fn derive(entity: &'static str, decl: TableDecl) -> Result<Schema, SchemaError> {
        let TableDecl { table, fields } = decl;

        let mut seen: Vec<&str> = Vec::with_capacity(fields.len());
        for (attr, _) in &fields {
            if seen.contains(attr) {
                return Err(SchemaError::DuplicateAttribute { entity, attr });
            }
            seen.push(attr);
        }

        let mut pk: Option<&'static str> = None;
        let mut attrs: Vec<&'static str> = Vec::new();
        for (attr, field) in &fields {
            if field.primary_key {
                if pk.is_some() {
                    return Err(SchemaError::DuplicatePrimaryKey { entity, attr });
                }
                pk = Some(attr);
            } else {
                attrs.push(attr);
            }
        }
        let pk = pk.ok_or(SchemaError::MissingPrimaryKey { entity })?;

        let column_of = |attr: &str| -> String {
            let field = fields
                .iter()
                .find(|(a, _)| *a == attr)
                .map(|(_, f)| f);
            let name = field.and_then(|f| f.column).unwrap_or(attr);
            quoted(name)
        };

        let pk_column = column_of(pk);
        let escaped: Vec<String> = attrs.iter().map(|a| column_of(a)).collect();
        let qtable = quoted(table);

        let select = format!("select {}, {} from {}", pk_column, escaped.join(", "), qtable);
        let insert = format!(
            "insert into {} ({}, {}) values ({})",
            qtable,
            escaped.join(", "),
            pk_column,
            placeholders(attrs.len() + 1)
        );
        let update = format!(
            "update {} set {} where {}=?",
            qtable,
            escaped
                .iter()
                .map(|c| format!("{}=?", c))
                .collect::<Vec<_>>()
                .join(", "),
            pk_column
        );
        let delete = format!("delete from {} where {}=?", qtable, pk_column);

        let mut columns: Vec<String> = Vec::with_capacity(fields.len());
        for (attr, field) in &fields {
            let mut clause = format!("{} {}", column_of(attr), field.column_type);
            if !field.nullable {
                clause.push_str(" not null");
            }
            columns.push(clause);
        }
        let create = format!(
            "create table if not exists {} ({}, primary key ({})) engine=InnoDB default charset=utf8",
            qtable,
            columns.join(", "),
            pk_column
        );

        Ok(Schema {
            entity,
            table,
            pk,
            pk_column,
            attrs,
            fields,
            select,
            insert,
            update,
            delete,
            create,
        })
    }

    /// Field declared for `attr`, if any.
    pub fn field(&self, attr: &str) -> Option<&Field> {
        self.fields.iter().find(|(a, _)| *a == attr).map(|(_, f)| f)
    }
}

/// Registry of compiled schemas keyed by entity name. Built once at startup,
/// never mutated afterwards.
#[derive(Debug)]
pub struct Catalog {
    schemas: Vec<Schema>,
}

impl Catalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder {
            schemas: Vec::new(),
        }
    }

    pub fn get(&self, entity: &str) -> Option<&Schema> {
        self.schemas.iter().find(|s| s.entity == entity)
    }

    /// Schemas in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Schema> {
        self.schemas.iter()
    }
}

pub struct CatalogBuilder {
    schemas: Vec<Schema>,
}

impl CatalogBuilder {
    /// Register an entity type, compiling its declaration.
    pub fn entity<E: Entity>(self) -> Result<CatalogBuilder, SchemaError> {
        self.register(E::NAME, E::declaration())
    }

    /// Register a declaration under an explicit name.
    pub fn register(
        mut self,
        entity: &'static str,
        decl: TableDecl,
    ) -> Result<CatalogBuilder, SchemaError> {
        if self.schemas.iter().any(|s| s.entity == entity) {
            return Err(SchemaError::DuplicateEntity(entity));
        }
        let schema = Schema::derive(entity, decl)?;
        tracing::debug!(entity, table = schema.table, "registered schema");
        self.schemas.push(schema);
        Ok(self)
    }

    pub fn finish(self) -> Catalog {
        Catalog {
            schemas: self.schemas,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn note_decl() -> TableDecl {
        TableDecl::new("notes")
            .field("id", Field::string("varchar(50)").primary_key())
            .field("title", Field::string("varchar(50)"))
            .field("starred", Field::boolean())
            .field("body", Field::text())
    }

    #[test]
    fn derive_builds_select_with_pk_first() {
        let s = Schema::derive("Note", note_decl()).unwrap();
        assert_eq!(s.select, "select `id`, `title`, `starred`, `body` from `notes`");
    }

    #[test]
    fn derive_builds_insert_with_pk_last() {
        let s = Schema::derive("Note", note_decl()).unwrap();
        assert_eq!(
            s.insert,
            "insert into `notes` (`title`, `starred`, `body`, `id`) values (?, ?, ?, ?)"
        );
    }

    #[test]
    fn derive_builds_update_and_delete_keyed_by_pk() {
        let s = Schema::derive("Note", note_decl()).unwrap();
        assert_eq!(
            s.update,
            "update `notes` set `title`=?, `starred`=?, `body`=? where `id`=?"
        );
        assert_eq!(s.delete, "delete from `notes` where `id`=?");
    }

    #[test]
    fn derive_builds_create_table_with_not_null_and_defaults() {
        let s = Schema::derive("Note", note_decl()).unwrap();
        assert_eq!(
            s.create,
            "create table if not exists `notes` (`id` varchar(50), `title` varchar(50), \
             `starred` boolean not null, `body` text, primary key (`id`)) \
             engine=InnoDB default charset=utf8"
        );
    }

    #[test]
    fn column_override_is_used_in_every_template() {
        let decl = TableDecl::new("notes")
            .field("id", Field::string("varchar(50)").primary_key())
            .field("title", Field::string("varchar(50)").column("note_title"));
        let s = Schema::derive("Note", decl).unwrap();
        assert!(s.select.contains("`note_title`"));
        assert!(s.insert.contains("`note_title`"));
        assert!(s.update.contains("`note_title`=?"));
        assert!(s.create.contains("`note_title` varchar(50)"));
    }

    #[test]
    fn missing_primary_key_is_rejected() {
        let decl = TableDecl::new("notes").field("title", Field::string("varchar(50)"));
        match Schema::derive("Note", decl) {
            Err(SchemaError::MissingPrimaryKey { entity }) => assert_eq!(entity, "Note"),
            other => panic!("expected MissingPrimaryKey, got {:?}", other.map(|s| s.select)),
        }
    }

    #[test]
    fn second_primary_key_is_rejected() {
        let decl = TableDecl::new("notes")
            .field("id", Field::string("varchar(50)").primary_key())
            .field("alt", Field::string("varchar(50)").primary_key());
        match Schema::derive("Note", decl) {
            Err(SchemaError::DuplicatePrimaryKey { attr, .. }) => assert_eq!(attr, "alt"),
            other => panic!("expected DuplicatePrimaryKey, got {:?}", other.map(|s| s.select)),
        }
    }

    #[test]
    fn duplicate_attribute_is_rejected() {
        let decl = TableDecl::new("notes")
            .field("id", Field::string("varchar(50)").primary_key())
            .field("title", Field::string("varchar(50)"))
            .field("title", Field::text());
        assert!(matches!(
            Schema::derive("Note", decl),
            Err(SchemaError::DuplicateAttribute { attr: "title", .. })
        ));
    }

    #[test]
    fn catalog_rejects_double_registration() {
        let result = Catalog::builder()
            .register("Note", note_decl())
            .unwrap()
            .register("Note", note_decl());
        assert!(matches!(result, Err(SchemaError::DuplicateEntity("Note"))));
    }

    #[test]
    fn catalog_lookup_by_entity_name() {
        let catalog = Catalog::builder()
            .register("Note", note_decl())
            .unwrap()
            .finish();
        assert_eq!(catalog.get("Note").unwrap().table, "notes");
        assert!(catalog.get("Missing").is_none());
    }
}
