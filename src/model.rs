//! Runtime model declarations and field introspection.
//!
//! A [`Model`] describes one table: its columns (with the sea-orm [`ColumnType`] they are
//! stored as) and its JSON-backed [`Property`] values, which live inside a JSON column and
//! shadow it. Everything the schema synthesizer and the query pipeline know about a model
//! comes from [`model_fields`].

use indexmap::IndexMap;
use sea_orm::ColumnType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared type of a field, as seen by schemas, filters and the OpenAPI renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Integer,
    Float,
    String,
    Boolean,
    DateTime,
    Date,
    Uuid,
    Object,
    List,
}

impl FieldType {
    /// Object and list targets use containment instead of `IN` when filtered with a list.
    pub const fn is_composite(self) -> bool {
        matches!(self, Self::Object | Self::List)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::DateTime => "datetime",
            Self::Date => "date",
            Self::Uuid => "uuid",
            Self::Object => "object",
            Self::List => "list",
        }
    }

    /// Unmapped column types (custom, enum, network, binary, ...) read as strings.
    pub fn from_column_type(column_type: &ColumnType) -> Self {
        match column_type {
            ColumnType::TinyInteger
            | ColumnType::SmallInteger
            | ColumnType::Integer
            | ColumnType::BigInteger
            | ColumnType::TinyUnsigned
            | ColumnType::SmallUnsigned
            | ColumnType::Unsigned
            | ColumnType::BigUnsigned
            | ColumnType::Year => Self::Integer,
            ColumnType::Float | ColumnType::Double | ColumnType::Decimal(_) | ColumnType::Money(_) => {
                Self::Float
            }
            ColumnType::Boolean => Self::Boolean,
            ColumnType::DateTime | ColumnType::Timestamp | ColumnType::TimestampWithTimeZone => {
                Self::DateTime
            }
            ColumnType::Date => Self::Date,
            ColumnType::Uuid => Self::Uuid,
            ColumnType::Json | ColumnType::JsonBinary => Self::Object,
            ColumnType::Array(_) => Self::List,
            _ => Self::String,
        }
    }
}

/// Client-side default of a column or property.
#[derive(Clone, Debug)]
pub enum ColumnDefault {
    Value(Value),
    /// Evaluated once per insert, e.g. a random nickname.
    With(fn() -> Value),
}

impl ColumnDefault {
    pub fn resolve(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::With(f) => f(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Column {
    name: String,
    db_name: String,
    column_type: ColumnType,
    nullable: bool,
    default: Option<ColumnDefault>,
    server_default: Option<String>,
    primary_key: bool,
    foreign_key: Option<String>,
}

impl Column {
    /// A nullable column stored under its own name.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        let name = name.into();
        Self {
            db_name: name.clone(),
            name,
            column_type,
            nullable: true,
            default: None,
            server_default: None,
            primary_key: false,
            foreign_key: None,
        }
    }

    /// Stored under a different column name than the attribute name.
    #[must_use]
    pub fn db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = db_name.into();
        self
    }

    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(ColumnDefault::Value(value.into()));
        self
    }

    #[must_use]
    pub fn default_with(mut self, f: fn() -> Value) -> Self {
        self.default = Some(ColumnDefault::With(f));
        self
    }

    #[must_use]
    pub fn server_default(mut self, sql: impl Into<String>) -> Self {
        self.server_default = Some(sql.into());
        self
    }

    /// `target` is informational, e.g. `teams.id`.
    #[must_use]
    pub fn foreign_key(mut self, target: impl Into<String>) -> Self {
        self.foreign_key = Some(target.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage_name(&self) -> &str {
        &self.db_name
    }

    pub fn column_type(&self) -> &ColumnType {
        &self.column_type
    }

    pub fn field_type(&self) -> FieldType {
        FieldType::from_column_type(&self.column_type)
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn default_value(&self) -> Option<&ColumnDefault> {
        self.default.as_ref()
    }

    pub fn server_default_sql(&self) -> Option<&str> {
        self.server_default.as_deref()
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn foreign_key_target(&self) -> Option<&str> {
        self.foreign_key.as_deref()
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.column_type, ColumnType::Enum { .. })
    }
}

/// Kind of a JSON-backed property. `Other` reads as a generic object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Array,
    String,
    Integer,
    Boolean,
    DateTime,
    Object,
    Other,
}

impl PropertyKind {
    pub const fn field_type(self) -> FieldType {
        match self {
            Self::Array => FieldType::List,
            Self::String => FieldType::String,
            Self::Integer => FieldType::Integer,
            Self::Boolean => FieldType::Boolean,
            Self::DateTime => FieldType::DateTime,
            Self::Object | Self::Other => FieldType::Object,
        }
    }
}

pub const DEFAULT_PROPERTY_STORAGE: &str = "profile";

/// A value kept under `name` inside the JSON column `storage`.
#[derive(Clone, Debug)]
pub struct Property {
    name: String,
    kind: PropertyKind,
    storage: String,
    default: Option<ColumnDefault>,
}

impl Property {
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            storage: DEFAULT_PROPERTY_STORAGE.to_string(),
            default: None,
        }
    }

    /// Attribute name of the JSON column holding the value.
    #[must_use]
    pub fn storage(mut self, column: impl Into<String>) -> Self {
        self.storage = column.into();
        self
    }

    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(ColumnDefault::Value(value.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    pub fn storage_column(&self) -> &str {
        &self.storage
    }

    pub fn default_value(&self) -> Option<&ColumnDefault> {
        self.default.as_ref()
    }
}

#[derive(Clone, Debug)]
pub struct Model {
    name: String,
    table: String,
    columns: Vec<Column>,
    properties: Vec<Property>,
}

impl Model {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns: Vec::new(),
            properties: Vec::new(),
        }
    }

    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    #[must_use]
    pub fn property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn find_property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.primary_key)
    }

    /// The column a property is stored in, if the model declares it.
    pub fn storage_of(&self, property: &Property) -> Option<&Column> {
        self.find_column(&property.storage)
    }

    /// Whether some property keeps its values in `column`.
    pub fn is_storage_column(&self, column: &Column) -> bool {
        self.properties.iter().any(|p| p.storage == column.name)
    }

    /// Resolves a field by attribute name, falling back to a column's storage name.
    pub fn lookup(&self, name: &str) -> Option<(FieldHandle<'_>, FieldType)> {
        let fields = model_fields(self);
        if let Some((handle, field_type)) = fields.get(name) {
            return Some((*handle, *field_type));
        }
        fields
            .values()
            .find(|(handle, _)| handle.storage_name() == Some(name))
            .copied()
    }
}

/// A model field: either a real column or a JSON-backed property.
#[derive(Clone, Copy, Debug)]
pub enum FieldHandle<'a> {
    Column(&'a Column),
    Property(&'a Property),
}

impl FieldHandle<'_> {
    pub fn name(&self) -> &str {
        match self {
            Self::Column(c) => c.name(),
            Self::Property(p) => p.name(),
        }
    }

    /// Storage name for columns; properties have none.
    pub fn storage_name(&self) -> Option<&str> {
        match self {
            Self::Column(c) => Some(c.storage_name()),
            Self::Property(_) => None,
        }
    }

    /// Columns are required unless nullable or defaulted. Properties never are.
    pub fn is_required(&self) -> bool {
        match self {
            Self::Column(c) => {
                !c.is_nullable() && c.default_value().is_none() && c.server_default_sql().is_none()
            }
            Self::Property(_) => false,
        }
    }

    pub fn is_primary_or_foreign_key(&self) -> bool {
        match self {
            Self::Column(c) => c.is_primary_key() || c.foreign_key_target().is_some(),
            Self::Property(_) => false,
        }
    }

    pub fn describe(&self, name: &str, declared_type: FieldType) -> FieldDescriptor {
        FieldDescriptor {
            name: name.to_string(),
            declared_type,
            is_required: self.is_required(),
            is_list: declared_type == FieldType::List,
            is_primary_or_foreign_key: self.is_primary_or_foreign_key(),
        }
    }
}

/// Per-field facts the schema synthesizer works from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub declared_type: FieldType,
    pub is_required: bool,
    pub is_list: bool,
    pub is_primary_or_foreign_key: bool,
}

/// Every field of `model` keyed by attribute name, columns first.
///
/// A property's storage column is dropped from the result: the property values are the
/// public face of that JSON column.
pub fn model_fields(model: &Model) -> IndexMap<String, (FieldHandle<'_>, FieldType)> {
    let mut fields: IndexMap<String, (FieldHandle<'_>, FieldType)> = model
        .columns
        .iter()
        .map(|c| (c.name.clone(), (FieldHandle::Column(c), c.field_type())))
        .collect();

    for property in &model.properties {
        fields.shift_remove(&property.storage);
        fields.insert(
            property.name.clone(),
            (FieldHandle::Property(property), property.kind.field_type()),
        );
    }

    fields
}

/// Descriptors for every field of `model`, recomputed on each call.
pub fn describe_fields(model: &Model) -> Vec<FieldDescriptor> {
    model_fields(model)
        .iter()
        .map(|(name, (handle, field_type))| handle.describe(name, *field_type))
        .collect()
}
