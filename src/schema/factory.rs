use super::base::WrapperSchema;
use super::meta::{FieldMethods, Meta};
use super::registry::NameRegistry;
use super::synth::SchemaBuilder;
use super::types::{FieldShape, Schema};
use crate::errors::ConfigError;
use crate::model::{FieldType, Model};
use heck::ToUpperCamelCase;
use std::sync::Arc;

/// Fields the server fills in on create.
pub const INPUT_EXCLUDE: [&str; 3] = ["id", "created_at", "updated_at"];

/// Derives the standard schema family of a model. Unnamed schemas get
/// `{Model}{Flavor}Schema`, made unique through the registry.
#[derive(Clone, Debug)]
pub struct SchemaFactory {
    registry: Arc<NameRegistry>,
}

impl Default for SchemaFactory {
    fn default() -> Self {
        Self::new(NameRegistry::global())
    }
}

impl SchemaFactory {
    pub fn new(registry: Arc<NameRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<NameRegistry> {
        &self.registry
    }

    fn name_for(&self, name: Option<&str>, model: &str, flavor: &str) -> String {
        name.map_or_else(
            || {
                self.registry
                    .register(&format!("{}{flavor}Schema", model.to_upper_camel_case()))
            },
            ToString::to_string,
        )
    }

    /// Create payloads: every field except [`INPUT_EXCLUDE`].
    ///
    /// # Errors
    /// Propagates synthesis errors.
    pub fn input_schema(
        &self,
        model: &Arc<Model>,
        base: &Arc<Schema>,
        name: Option<&str>,
    ) -> Result<Arc<Schema>, ConfigError> {
        let meta = Meta::new(Arc::clone(model)).exclude(INPUT_EXCLUDE);
        self.input_schema_with(model, base, name, meta)
    }

    /// Create payloads with a caller-supplied configuration.
    ///
    /// # Errors
    /// Propagates synthesis errors.
    pub fn input_schema_with(
        &self,
        model: &Model,
        base: &Arc<Schema>,
        name: Option<&str>,
        meta: Meta,
    ) -> Result<Arc<Schema>, ConfigError> {
        SchemaBuilder::new(self.name_for(name, model.name(), "Input"))
            .base(Arc::clone(base))
            .meta(meta)
            .build()
    }

    /// Responses: every field, projectable from an entity.
    ///
    /// # Errors
    /// Propagates synthesis errors.
    pub fn output_schema(
        &self,
        model: &Arc<Model>,
        base: &Arc<Schema>,
        name: Option<&str>,
    ) -> Result<Arc<Schema>, ConfigError> {
        SchemaBuilder::new(self.name_for(name, model.name(), "Output"))
            .base(Arc::clone(base))
            .meta(Meta::new(Arc::clone(model)))
            .orm_mode(true)
            .build()
    }

    /// Full updates: every field except `id`, with the model's requiredness.
    ///
    /// # Errors
    /// Propagates synthesis errors.
    pub fn put_schema(
        &self,
        model: &Arc<Model>,
        base: &Arc<Schema>,
        name: Option<&str>,
    ) -> Result<Arc<Schema>, ConfigError> {
        SchemaBuilder::new(self.name_for(name, model.name(), "Put"))
            .base(Arc::clone(base))
            .meta(Meta::new(Arc::clone(model)).exclude(["id"]))
            .build()
    }

    /// Partial updates: every field except `id`, none of them required.
    ///
    /// # Errors
    /// Propagates synthesis errors.
    pub fn patch_schema(
        &self,
        model: &Arc<Model>,
        base: &Arc<Schema>,
        name: Option<&str>,
    ) -> Result<Arc<Schema>, ConfigError> {
        let meta = Meta::new(Arc::clone(model))
            .exclude(["id"])
            .required(Vec::<String>::new());
        SchemaBuilder::new(self.name_for(name, model.name(), "Patch"))
            .base(Arc::clone(base))
            .meta(meta)
            .build()
    }

    /// Query-string filters: a plain record, key fields as lists, numeric fields exploded into
    /// `__le`/`__ge`, nothing required.
    ///
    /// # Errors
    /// Propagates synthesis errors.
    pub fn filter_schema(&self, model: &Arc<Model>, name: Option<&str>) -> Result<Arc<Schema>, ConfigError> {
        let meta = Meta::new(Arc::clone(model))
            .as_dataclass(true)
            .list_pk(true)
            .field_methods(FieldMethods::Default)
            .required(Vec::<String>::new());
        SchemaBuilder::new(self.name_for(name, model.name(), "Filter"))
            .meta(meta)
            .build()
    }

    /// The paginated envelope with `data` narrowed to a list of `output`.
    pub fn list_schema(
        &self,
        model: &Model,
        output: &Arc<Schema>,
        base_list: &Arc<Schema>,
        name: Option<&str>,
    ) -> Arc<Schema> {
        let mut schema = (**base_list).clone();
        schema.rename(self.name_for(name, model.name(), "List"));
        Arc::new(schema.required("data", FieldShape::ManyNested(Arc::clone(output))))
    }

    /// `{key_name: key}` as returned by delete, wrapped when the view has a wrapper.
    pub fn delete_schema(
        &self,
        model: &Model,
        key_name: &str,
        key_type: FieldType,
        wrapper: Option<&WrapperSchema>,
    ) -> Arc<Schema> {
        let schema = Arc::new(
            Schema::model(self.name_for(None, model.name(), "Delete"))
                .required(key_name, FieldShape::Scalar(key_type)),
        );
        match wrapper {
            Some(wrapper) => self.wrap_schema(&schema, wrapper),
            None => schema,
        }
    }

    /// Re-projects `inner` under the wrapper key, next to the wrapper's own fields.
    pub fn wrap_schema(&self, inner: &Arc<Schema>, wrapper: &WrapperSchema) -> Arc<Schema> {
        let name = self.registry.register(&format!("Wrapped{}", inner.name()));
        let mut schema = (**wrapper.base()).clone();
        schema.rename(name);
        Arc::new(
            schema
                .required(wrapper.key(), FieldShape::Nested(Arc::clone(inner)))
                .wrapper_key(wrapper.key()),
        )
    }
}
