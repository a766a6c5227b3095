//! Builds a [`Schema`] from a model, a [`Meta`] and any extra declared fields.
//!
//! Per model field, in order:
//!
//! 1. with `use_db_names`, a column is named by its storage name;
//! 2. excluded names are skipped ([`Meta::is_excluded`]);
//! 3. requiredness comes from the explicit `required` set, else from the column;
//! 4. the shape is chosen:
//!    - list-typed fields become an optional list of strings,
//!    - key fields under `list_pk` and names in `as_list_fields` become an optional list of
//!      their scalar type,
//!    - fields with operators explode into one optional `{field}__{op}` per operator,
//!    - everything else stays a scalar.
//!
//! Extra fields are merged on top. Record ("dataclass") schemas then order required fields
//! before defaulted ones; model schemas inherit the base schema's fields first.

use super::meta::Meta;
use super::types::{FieldDefault, FieldShape, Schema, SchemaKind};
use crate::errors::ConfigError;
use crate::filtering::operators::OPERATOR_SEPARATOR;
use crate::model::{FieldType, model_fields};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

type SynthesizedFields = IndexMap<String, (FieldShape, FieldDefault)>;

#[derive(Clone, Debug)]
struct ExtraField {
    name: String,
    shape: FieldShape,
    default: FieldDefault,
}

#[derive(Clone, Debug)]
pub struct SchemaBuilder {
    name: String,
    base: Option<Arc<Schema>>,
    meta: Option<Meta>,
    extras: Vec<ExtraField>,
    orm_mode: bool,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: None,
            meta: None,
            extras: Vec::new(),
            orm_mode: false,
        }
    }

    #[must_use]
    pub fn base(mut self, base: Arc<Schema>) -> Self {
        self.base = Some(base);
        self
    }

    #[must_use]
    pub fn meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// A required extra field.
    #[must_use]
    pub fn field(self, name: impl Into<String>, shape: FieldShape) -> Self {
        self.extra(name, shape, FieldDefault::Required)
    }

    /// An optional extra field defaulting to null.
    #[must_use]
    pub fn optional_field(self, name: impl Into<String>, shape: FieldShape) -> Self {
        self.extra(name, shape, FieldDefault::none())
    }

    #[must_use]
    pub fn field_with_default(self, name: impl Into<String>, shape: FieldShape, default: Value) -> Self {
        self.extra(name, shape, FieldDefault::Value(default))
    }

    fn extra(mut self, name: impl Into<String>, shape: FieldShape, default: FieldDefault) -> Self {
        self.extras.push(ExtraField {
            name: name.into(),
            shape,
            default,
        });
        self
    }

    #[must_use]
    pub fn orm_mode(mut self, orm_mode: bool) -> Self {
        self.orm_mode = orm_mode;
        self
    }

    /// # Errors
    /// See [`Meta::check`].
    pub fn build(self) -> Result<Arc<Schema>, ConfigError> {
        let mut fields = match &self.meta {
            Some(meta) => synthesize_fields(&self.name, meta)?,
            None => SynthesizedFields::new(),
        };
        for extra in self.extras {
            fields.insert(extra.name, (extra.shape, extra.default));
        }

        let dataclass = self.meta.as_ref().is_some_and(Meta::is_dataclass);
        let schema = if dataclass {
            let mut ordered: Vec<_> = fields.into_iter().collect();
            ordered.sort_by_key(|(_, (_, default))| !default.is_required());
            let mut schema = Schema::new(&self.name, SchemaKind::Record);
            for (name, (shape, default)) in ordered {
                schema.insert(name, shape, default);
            }
            schema
        } else {
            let mut schema = Schema::new(&self.name, SchemaKind::Model);
            if let Some(base) = &self.base {
                for field in base.fields() {
                    schema.insert(field.name.clone(), field.shape.clone(), field.default.clone());
                }
            }
            for (name, (shape, default)) in fields {
                schema.insert(name, shape, default);
            }
            schema.orm_mode(self.orm_mode || self.base.as_ref().is_some_and(|b| b.is_orm_mode()))
        };

        tracing::debug!(
            schema = %schema.name(),
            fields = schema.field_names().len(),
            dataclass,
            "Synthesized schema"
        );
        Ok(Arc::new(schema))
    }
}

/// Steps 1 to 4 for every field of the configured model.
///
/// # Errors
/// See [`Meta::check`].
pub fn synthesize_fields(schema: &str, meta: &Meta) -> Result<SynthesizedFields, ConfigError> {
    let model = meta.check(schema)?;
    let mut fields = SynthesizedFields::new();

    for (attribute, (handle, field_type)) in model_fields(model) {
        let name = match handle.storage_name() {
            Some(storage) if meta.uses_db_names() => storage.to_string(),
            _ => attribute,
        };
        if meta.is_excluded(&name) {
            continue;
        }

        let descriptor = handle.describe(&name, field_type);
        let required = meta.is_required(&name).unwrap_or(descriptor.is_required);

        if descriptor.is_list {
            fields.insert(name, (FieldShape::Many(FieldType::String), FieldDefault::none()));
        } else if (meta.is_list_pk() && descriptor.is_primary_or_foreign_key) || meta.is_list_field(&name) {
            fields.insert(name, (FieldShape::Many(field_type), FieldDefault::none()));
        } else if let Some(operators) = meta.methods_for(&name, field_type) {
            for operator in operators.iter() {
                fields.insert(
                    format!("{name}{OPERATOR_SEPARATOR}{}", operator.suffix()),
                    (FieldShape::Scalar(field_type), FieldDefault::none()),
                );
            }
        } else {
            let default = if required {
                FieldDefault::Required
            } else {
                FieldDefault::none()
            };
            fields.insert(name, (FieldShape::Scalar(field_type), default));
        }
    }

    Ok(fields)
}
