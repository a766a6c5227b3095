//! Synthesis configuration.

use crate::errors::ConfigError;
use crate::filtering::operators::{Operator, default_operators_for};
use crate::model::{FieldType, Model};
use serde::Deserialize;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

/// The `fields` option. Only a list is meaningful; a bare string is accepted by the
/// deserializer and rejected when a schema is synthesized.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FieldSelection {
    Bare(String),
    List(Vec<String>),
}

impl From<&str> for FieldSelection {
    fn from(value: &str) -> Self {
        Self::Bare(value.to_string())
    }
}

impl From<String> for FieldSelection {
    fn from(value: String) -> Self {
        Self::Bare(value)
    }
}

impl From<Vec<String>> for FieldSelection {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<Vec<&str>> for FieldSelection {
    fn from(value: Vec<&str>) -> Self {
        Self::List(value.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for FieldSelection {
    fn from(value: [&str; N]) -> Self {
        Self::List(value.into_iter().map(str::to_string).collect())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FieldMethodsConfig {
    Flag(bool),
    ByType(HashMap<FieldType, Vec<Operator>>),
}

/// Which operator fields a type explodes into.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "FieldMethodsConfig")]
pub enum FieldMethods {
    #[default]
    Disabled,
    /// Integers and floats get `le` and `ge`.
    Default,
    ByType(HashMap<FieldType, Vec<Operator>>),
}

impl From<FieldMethodsConfig> for FieldMethods {
    fn from(config: FieldMethodsConfig) -> Self {
        match config {
            FieldMethodsConfig::Flag(true) => Self::Default,
            FieldMethodsConfig::Flag(false) => Self::Disabled,
            FieldMethodsConfig::ByType(table) => Self::ByType(table),
        }
    }
}

impl FieldMethods {
    fn for_type(&self, field_type: FieldType) -> Option<Cow<'_, [Operator]>> {
        match self {
            Self::Disabled => None,
            Self::Default => default_operators_for(field_type).map(Cow::Borrowed),
            Self::ByType(table) => table.get(&field_type).map(|ops| Cow::Borrowed(ops.as_slice())),
        }
    }
}

/// Options steering how a model's fields become schema fields.
///
/// Everything except the model can come from configuration; bind the model afterwards with
/// [`Meta::with_model`].
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Meta {
    #[serde(skip)]
    model: Option<Arc<Model>>,
    required: Option<Vec<String>>,
    fields: Option<FieldSelection>,
    exclude: Option<Vec<String>>,
    use_db_names: bool,
    list_pk: bool,
    as_list_fields: Option<Vec<String>>,
    as_dataclass: bool,
    field_methods: FieldMethods,
    field_methods_by_name: Option<HashMap<String, Vec<Operator>>>,
}

fn owned<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(Into::into).collect()
}

impl Meta {
    pub fn new(model: Arc<Model>) -> Self {
        Self::default().with_model(model)
    }

    #[must_use]
    pub fn with_model(mut self, model: Arc<Model>) -> Self {
        self.model = Some(model);
        self
    }

    /// Replaces the model-derived requiredness. An empty set makes every field optional.
    #[must_use]
    pub fn required<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required = Some(owned(names));
        self
    }

    #[must_use]
    pub fn fields(mut self, fields: impl Into<FieldSelection>) -> Self {
        self.fields = Some(fields.into());
        self
    }

    #[must_use]
    pub fn exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = Some(owned(names));
        self
    }

    #[must_use]
    pub fn use_db_names(mut self, enabled: bool) -> Self {
        self.use_db_names = enabled;
        self
    }

    #[must_use]
    pub fn list_pk(mut self, enabled: bool) -> Self {
        self.list_pk = enabled;
        self
    }

    #[must_use]
    pub fn as_list_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.as_list_fields = Some(owned(names));
        self
    }

    #[must_use]
    pub fn as_dataclass(mut self, enabled: bool) -> Self {
        self.as_dataclass = enabled;
        self
    }

    #[must_use]
    pub fn field_methods(mut self, methods: FieldMethods) -> Self {
        self.field_methods = methods;
        self
    }

    #[must_use]
    pub fn field_methods_by_name<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<Operator>)>,
        S: Into<String>,
    {
        self.field_methods_by_name = Some(
            methods
                .into_iter()
                .map(|(name, ops)| (name.into(), ops))
                .collect(),
        );
        self
    }

    pub fn model(&self) -> Option<&Arc<Model>> {
        self.model.as_ref()
    }

    pub fn uses_db_names(&self) -> bool {
        self.use_db_names
    }

    pub fn is_list_pk(&self) -> bool {
        self.list_pk
    }

    pub fn is_dataclass(&self) -> bool {
        self.as_dataclass
    }

    /// Checks the options that can only be rejected once a schema is being built.
    ///
    /// # Errors
    /// [`ConfigError::MissingModel`] and [`ConfigError::FieldsIsString`].
    pub fn check(&self, schema: &str) -> Result<&Arc<Model>, ConfigError> {
        let model = self.model.as_ref().ok_or_else(|| ConfigError::MissingModel {
            schema: schema.to_string(),
        })?;
        if let Some(FieldSelection::Bare(value)) = &self.fields {
            return Err(ConfigError::FieldsIsString {
                schema: schema.to_string(),
                value: value.clone(),
            });
        }
        Ok(model)
    }

    /// `fields` wins over `exclude`. Call [`Meta::check`] first: a bare-string selection
    /// excludes nothing here.
    pub fn is_excluded(&self, name: &str) -> bool {
        match (&self.fields, &self.exclude) {
            (Some(FieldSelection::List(fields)), _) => !fields.iter().any(|f| f == name),
            (Some(FieldSelection::Bare(_)), _) | (None, None) => false,
            (None, Some(exclude)) => exclude.iter().any(|f| f == name),
        }
    }

    /// The explicit requiredness of `name`, if a `required` set was configured.
    pub fn is_required(&self, name: &str) -> Option<bool> {
        self.required
            .as_ref()
            .map(|required| required.iter().any(|r| r == name))
    }

    pub fn is_list_field(&self, name: &str) -> bool {
        self.as_list_fields
            .as_ref()
            .is_some_and(|fields| fields.iter().any(|f| f == name))
    }

    /// Operators for a field. Once a by-name table is configured it is the only source; the
    /// by-type table applies otherwise.
    pub fn methods_for(&self, name: &str, field_type: FieldType) -> Option<Cow<'_, [Operator]>> {
        match &self.field_methods_by_name {
            Some(by_name) => by_name.get(name).map(|ops| Cow::Borrowed(ops.as_slice())),
            None => self.field_methods.for_type(field_type),
        }
    }
}
