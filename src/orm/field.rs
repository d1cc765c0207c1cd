//! Column descriptors for entity declarations.

use serde_json::Value;

/// Default applied by `save` when an attribute is unset.
#[derive(Clone, Debug)]
pub enum FieldDefault {
    /// No default: an unset attribute binds SQL NULL.
    None,
    /// Constant value.
    Value(Value),
    /// Generator invoked at save time (ids, timestamps).
    Generated(fn() -> Value),
}

impl FieldDefault {
    /// Value to substitute for an unset attribute, if any.
    pub fn produce(&self) -> Option<Value> {
        match self {
            FieldDefault::None => None,
            FieldDefault::Value(v) => Some(v.clone()),
            FieldDefault::Generated(f) => Some(f()),
        }
    }
}

/// One column: type, key role, nullability, default. The column name is the
/// declared attribute name unless overridden with [`Field::column`].
#[derive(Clone, Debug)]
pub struct Field {
    pub column: Option<&'static str>,
    pub column_type: &'static str,
    pub primary_key: bool,
    pub nullable: bool,
    pub default: FieldDefault,
}

impl Field {
    fn new(column_type: &'static str, nullable: bool, default: FieldDefault) -> Field {
        Field {
            column: None,
            column_type,
            primary_key: false,
            nullable,
            default,
        }
    }

    /// String column with an explicit type, e.g. `varchar(50)`.
    pub fn string(column_type: &'static str) -> Field {
        Field::new(column_type, true, FieldDefault::None)
    }

    /// `boolean` column; NOT NULL, defaults to `false`.
    pub fn boolean() -> Field {
        Field::new("boolean", false, FieldDefault::Value(Value::Bool(false)))
    }

    /// `bigint` column, defaults to `0`.
    pub fn integer() -> Field {
        Field::new("bigint", true, FieldDefault::Value(Value::from(0i64)))
    }

    /// `real` column, defaults to `0.0`.
    pub fn float() -> Field {
        Field::new("real", true, FieldDefault::Value(Value::from(0.0f64)))
    }

    /// `text` column, no default.
    pub fn text() -> Field {
        Field::new("text", true, FieldDefault::None)
    }

    /// Mark as the primary key.
    pub fn primary_key(mut self) -> Field {
        self.primary_key = true;
        self
    }

    /// Emit `not null` in the create-table clause.
    pub fn not_null(mut self) -> Field {
        self.nullable = false;
        self
    }

    /// Override the column name (the attribute name is used otherwise).
    pub fn column(mut self, name: &'static str) -> Field {
        self.column = Some(name);
        self
    }

    /// Constant default.
    pub fn default_value(mut self, v: impl Into<Value>) -> Field {
        self.default = FieldDefault::Value(v.into());
        self
    }

    /// Generated default, evaluated each time `save` fills the attribute.
    pub fn default_fn(mut self, f: fn() -> Value) -> Field {
        self.default = FieldDefault::Generated(f);
        self
    }
}
