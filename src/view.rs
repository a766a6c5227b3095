//! View composition.
//!
//! A [`ViewSet`] is one model (or none, for aggregate views) plus the capabilities it exposes,
//! the schemas those capabilities use and the handlers serving them. Views are assembled with
//! [`ViewSetBuilder`]; every schema that was not given explicitly is derived in
//! [`ViewSetBuilder::build`], so configuration errors surface at startup.
//!
//! ```rust,ignore
//! let users = ViewSet::viewset(user_model.clone())
//!     .wrapper(WrapperSchema::new("data"))
//!     .build()?;
//!
//! let stats = ViewSet::aggregate("UserStats")
//!     .query_source(Arc::new(|_: &ViewSet| BaseQuery::raw(sum_query(), ["sum"])))
//!     .output_schema(stats_schema)
//!     .build()?;
//! ```

use crate::errors::{ApiError, ConfigError};
use crate::methods::{HandlerRequest, MethodFactory, ViewHandler};
use crate::model::{FieldType, Model};
use crate::router::RouteOptions;
use crate::schema::{
    Schema, SchemaFactory, WrapperSchema, base_model_schema, base_record_schema, paginated_list_schema,
};
use crate::store::{self, BaseQuery, StoredRow};
use async_trait::async_trait;
use indexmap::{IndexMap, IndexSet};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    RetrieveList,
    Retrieve,
    RetrieveSingleObjectData,
    Create,
    Update,
    UpdatePartial,
    Delete,
}

impl Capability {
    pub const fn name(self) -> &'static str {
        match self {
            Self::RetrieveList => "retrieve_list",
            Self::Retrieve => "retrieve",
            Self::RetrieveSingleObjectData => "retrieve_single_object_data",
            Self::Create => "create",
            Self::Update => "update",
            Self::UpdatePartial => "update_partial",
            Self::Delete => "delete",
        }
    }

    /// Whether the route carries the key path segment.
    pub const fn is_single_object(self) -> bool {
        matches!(self, Self::Retrieve | Self::Update | Self::UpdatePartial | Self::Delete)
    }

    /// List and aggregate views can run on a query source alone.
    const fn needs_model(self) -> bool {
        !matches!(self, Self::RetrieveList | Self::RetrieveSingleObjectData)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type of the key path segment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    #[default]
    Integer,
    String,
    Uuid,
}

impl KeyType {
    pub const fn field_type(self) -> FieldType {
        match self {
            Self::Integer => FieldType::Integer,
            Self::String => FieldType::String,
            Self::Uuid => FieldType::Uuid,
        }
    }

    /// Route-table label, as in `/user/{id:int}`.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Integer => "int",
            Self::String => "str",
            Self::Uuid => "uuid",
        }
    }

    /// `None` when the segment does not parse; such a request matches no object.
    pub fn parse(self, raw: &str) -> Option<Value> {
        match self {
            Self::Integer => raw.parse::<i64>().ok().map(Value::from),
            Self::String => Some(Value::String(raw.to_string())),
            Self::Uuid => uuid::Uuid::parse_str(raw)
                .ok()
                .map(|id| Value::String(id.hyphenated().to_string())),
        }
    }
}

/// Produces the base query of list and aggregate views.
#[async_trait]
pub trait QuerySource: Send + Sync {
    async fn base_query(&self, view: &ViewSet, db: &DatabaseConnection) -> Result<BaseQuery, ApiError>;
}

#[async_trait]
impl<F> QuerySource for F
where
    F: Fn(&ViewSet) -> BaseQuery + Send + Sync,
{
    async fn base_query(&self, view: &ViewSet, _db: &DatabaseConnection) -> Result<BaseQuery, ApiError> {
        Ok(self(view))
    }
}

pub const DEFAULT_KEY_NAME: &str = "id";

pub struct ViewSet {
    name: String,
    model: Option<Arc<Model>>,
    input_schema: Option<Arc<Schema>>,
    output_schema: Option<Arc<Schema>>,
    list_schema: Option<Arc<Schema>>,
    filter_schema: Option<Arc<Schema>>,
    put_schema: Option<Arc<Schema>>,
    patch_schema: Option<Arc<Schema>>,
    delete_schema: Option<Arc<Schema>>,
    wrapper_key: Option<String>,
    key_name: String,
    key_type: KeyType,
    params: HashMap<Capability, RouteOptions>,
    handlers: IndexMap<Capability, Arc<dyn ViewHandler>>,
    query_source: Option<Arc<dyn QuerySource>>,
}

impl fmt::Debug for ViewSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewSet")
            .field("name", &self.name)
            .field("model", &self.model.as_ref().map(|m| m.name()))
            .field("capabilities", &self.handlers.keys().collect::<Vec<_>>())
            .field("key_name", &self.key_name)
            .field("key_type", &self.key_type)
            .field("wrapper_key", &self.wrapper_key)
            .finish_non_exhaustive()
    }
}

impl ViewSet {
    pub fn builder(name: impl Into<String>) -> ViewSetBuilder {
        ViewSetBuilder::new(name)
    }

    /// List, retrieve, create, update, partial update and delete.
    pub fn viewset(model: Arc<Model>) -> ViewSetBuilder {
        ViewSetBuilder::new(format!("{}ViewSet", model.name()))
            .model(model)
            .capabilities([
                Capability::RetrieveList,
                Capability::Retrieve,
                Capability::Create,
                Capability::Update,
                Capability::UpdatePartial,
                Capability::Delete,
            ])
    }

    /// List and retrieve.
    pub fn read_only(model: Arc<Model>) -> ViewSetBuilder {
        ViewSetBuilder::new(format!("{}ReadOnlyViewSet", model.name()))
            .model(model)
            .capabilities([Capability::RetrieveList, Capability::Retrieve])
    }

    /// A single computed object, e.g. sums over a table.
    pub fn aggregate(name: impl Into<String>) -> ViewSetBuilder {
        ViewSetBuilder::new(name).capability(Capability::RetrieveSingleObjectData)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> Option<&Arc<Model>> {
        self.model.as_ref()
    }

    pub fn input_schema(&self) -> Option<&Arc<Schema>> {
        self.input_schema.as_ref()
    }

    pub fn output_schema(&self) -> Option<&Arc<Schema>> {
        self.output_schema.as_ref()
    }

    pub fn list_schema(&self) -> Option<&Arc<Schema>> {
        self.list_schema.as_ref()
    }

    pub fn filter_schema(&self) -> Option<&Arc<Schema>> {
        self.filter_schema.as_ref()
    }

    /// Falls back to the input schema.
    pub fn put_schema(&self) -> Option<&Arc<Schema>> {
        self.put_schema.as_ref().or(self.input_schema.as_ref())
    }

    pub fn patch_schema(&self) -> Option<&Arc<Schema>> {
        self.patch_schema.as_ref()
    }

    pub fn delete_schema(&self) -> Option<&Arc<Schema>> {
        self.delete_schema.as_ref()
    }

    pub fn wrapper_key(&self) -> Option<&str> {
        self.wrapper_key.as_deref()
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn params(&self, capability: Capability) -> RouteOptions {
        self.params.get(&capability).cloned().unwrap_or_default()
    }

    /// Installed capabilities in declaration order.
    pub fn capabilities(&self) -> impl Iterator<Item = Capability> + '_ {
        self.handlers.keys().copied()
    }

    pub fn handler(&self, capability: Capability) -> Option<&Arc<dyn ViewHandler>> {
        self.handlers.get(&capability)
    }

    /// Body schema of a capability, if it takes one.
    pub fn request_schema(&self, capability: Capability) -> Option<&Arc<Schema>> {
        match capability {
            Capability::Create => self.input_schema(),
            Capability::Update => self.put_schema(),
            Capability::UpdatePartial => self.patch_schema(),
            _ => None,
        }
    }

    /// Schema responses of a capability are projected through.
    pub fn response_schema(&self, capability: Capability) -> Option<&Arc<Schema>> {
        match capability {
            Capability::RetrieveList => self.list_schema(),
            Capability::Delete => self.delete_schema(),
            _ => self.output_schema(),
        }
    }

    /// Runs the handler installed for `capability`.
    ///
    /// # Errors
    /// Whatever the handler returns; 404 when the capability is not installed.
    pub async fn call(&self, capability: Capability, request: HandlerRequest) -> Result<Value, ApiError> {
        let handler = self
            .handlers
            .get(&capability)
            .ok_or_else(|| ApiError::not_found(self.name.clone(), None))?;
        handler.handle(self, request).await
    }

    pub(crate) fn require_model(&self) -> Result<&Model, ApiError> {
        self.model
            .as_deref()
            .ok_or_else(|| ApiError::internal("View has no model", Some(self.name.clone())))
    }

    pub(crate) fn require_schema(&self, capability: Capability) -> Result<&Arc<Schema>, ApiError> {
        self.request_schema(capability).ok_or_else(|| {
            ApiError::internal(
                "View has no request schema",
                Some(format!("{}: {capability}", self.name)),
            )
        })
    }

    /// The configured query source, else `SELECT * FROM <table>`.
    ///
    /// # Errors
    /// Errors of the query source.
    pub async fn base_query(&self, db: &DatabaseConnection) -> Result<BaseQuery, ApiError> {
        match (&self.query_source, self.model.as_deref()) {
            (Some(source), _) => source.base_query(self, db).await,
            (None, Some(model)) => Ok(BaseQuery::for_model(model)),
            (None, None) => Err(ApiError::internal(
                "View has no query source",
                Some(self.name.clone()),
            )),
        }
    }

    pub(crate) async fn lookup(&self, request: &HandlerRequest) -> Result<StoredRow, ApiError> {
        let model = self.require_model()?;
        let key = request
            .key
            .as_ref()
            .ok_or_else(|| ApiError::not_found(model.name(), None))?;
        store::get_object_or_404(&request.db, model, &self.key_name, key).await
    }
}

/// Assembles a [`ViewSet`]. Explicit schemas and handlers win over derived ones.
pub struct ViewSetBuilder {
    name: String,
    model: Option<Arc<Model>>,
    base_schema: Option<Arc<Schema>>,
    base_list_schema: Arc<Schema>,
    input_schema: Option<Arc<Schema>>,
    output_schema: Option<Arc<Schema>>,
    list_schema: Option<Arc<Schema>>,
    filter_schema: Option<Arc<Schema>>,
    put_schema: Option<Arc<Schema>>,
    patch_schema: Option<Arc<Schema>>,
    delete_schema: Option<Arc<Schema>>,
    wrapper: Option<WrapperSchema>,
    key_name: String,
    key_type: KeyType,
    params: HashMap<Capability, RouteOptions>,
    capabilities: IndexSet<Capability>,
    handlers: HashMap<Capability, Arc<dyn ViewHandler>>,
    query_source: Option<Arc<dyn QuerySource>>,
    factory: SchemaFactory,
}

impl ViewSetBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: None,
            base_schema: Some(base_model_schema()),
            base_list_schema: paginated_list_schema(),
            input_schema: None,
            output_schema: None,
            list_schema: None,
            filter_schema: None,
            put_schema: None,
            patch_schema: None,
            delete_schema: None,
            wrapper: None,
            key_name: DEFAULT_KEY_NAME.to_string(),
            key_type: KeyType::default(),
            params: HashMap::new(),
            capabilities: IndexSet::new(),
            handlers: HashMap::new(),
            query_source: None,
            factory: SchemaFactory::default(),
        }
    }

    #[must_use]
    pub fn model(mut self, model: Arc<Model>) -> Self {
        self.model = Some(model);
        self
    }

    #[must_use]
    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    #[must_use]
    pub fn capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities.extend(capabilities);
        self
    }

    #[must_use]
    pub fn base_schema(mut self, schema: Arc<Schema>) -> Self {
        self.base_schema = Some(schema);
        self
    }

    /// Drops the base schema; building a view with a model then fails.
    #[must_use]
    pub fn without_base_schema(mut self) -> Self {
        self.base_schema = None;
        self
    }

    #[must_use]
    pub fn base_list_schema(mut self, schema: Arc<Schema>) -> Self {
        self.base_list_schema = schema;
        self
    }

    #[must_use]
    pub fn input_schema(mut self, schema: Arc<Schema>) -> Self {
        self.input_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn output_schema(mut self, schema: Arc<Schema>) -> Self {
        self.output_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn list_schema(mut self, schema: Arc<Schema>) -> Self {
        self.list_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn filter_schema(mut self, schema: Arc<Schema>) -> Self {
        self.filter_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn put_schema(mut self, schema: Arc<Schema>) -> Self {
        self.put_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn patch_schema(mut self, schema: Arc<Schema>) -> Self {
        self.patch_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn delete_schema(mut self, schema: Arc<Schema>) -> Self {
        self.delete_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn wrapper(mut self, wrapper: WrapperSchema) -> Self {
        self.wrapper = Some(wrapper);
        self
    }

    #[must_use]
    pub fn key(mut self, name: impl Into<String>, key_type: KeyType) -> Self {
        self.key_name = name.into();
        self.key_type = key_type;
        self
    }

    #[must_use]
    pub fn params(mut self, capability: Capability, options: RouteOptions) -> Self {
        self.params.insert(capability, options);
        self
    }

    /// Serves `capability` with a custom handler; installs the capability if needed.
    #[must_use]
    pub fn handler(mut self, capability: Capability, handler: Arc<dyn ViewHandler>) -> Self {
        self.capabilities.insert(capability);
        self.handlers.insert(capability, handler);
        self
    }

    #[must_use]
    pub fn query_source(mut self, source: Arc<dyn QuerySource>) -> Self {
        self.query_source = Some(source);
        self
    }

    #[must_use]
    pub fn schema_factory(mut self, factory: SchemaFactory) -> Self {
        self.factory = factory;
        self
    }

    fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Derives the missing schemas and installs the handlers.
    ///
    /// # Errors
    /// - [`ConfigError::MissingBaseSchema`]: a model without a base schema;
    /// - [`ConfigError::UnknownKeyField`]: `key_name` is not a model field;
    /// - [`ConfigError::MissingQuerySource`]: an aggregate view with neither model nor source;
    /// - [`ConfigError::MissingModelForCapability`]: a model capability without a model or a
    ///   custom handler;
    /// - synthesis errors of derived schemas.
    pub fn build(mut self) -> Result<Arc<ViewSet>, ConfigError> {
        let wrapper_key = self.wrapper.as_ref().map(|w| w.key().to_string());

        match self.model.clone() {
            Some(model) => self.derive_schemas(&model)?,
            None => self.check_modelless()?,
        }

        if let Some(wrapper) = &self.wrapper {
            self.output_schema = self
                .output_schema
                .take()
                .map(|schema| self.factory.wrap_schema(&schema, wrapper));
            self.list_schema = self
                .list_schema
                .take()
                .map(|schema| self.factory.wrap_schema(&schema, wrapper));
        }

        let mut handlers = IndexMap::new();
        for capability in &self.capabilities {
            let handler = self
                .handlers
                .remove(capability)
                .unwrap_or_else(|| MethodFactory::make(*capability, wrapper_key.as_deref()));
            handlers.insert(*capability, handler);
        }

        tracing::debug!(
            view = %self.name,
            capabilities = ?self.capabilities,
            "Built view"
        );

        Ok(Arc::new(ViewSet {
            name: self.name,
            model: self.model,
            input_schema: self.input_schema,
            output_schema: self.output_schema,
            list_schema: self.list_schema,
            filter_schema: self.filter_schema,
            put_schema: self.put_schema,
            patch_schema: self.patch_schema,
            delete_schema: self.delete_schema,
            wrapper_key,
            key_name: self.key_name,
            key_type: self.key_type,
            params: self.params,
            handlers,
            query_source: self.query_source,
        }))
    }

    fn derive_schemas(&mut self, model: &Arc<Model>) -> Result<(), ConfigError> {
        let base = self.base_schema.clone().ok_or_else(|| ConfigError::MissingBaseSchema {
            view: self.name.clone(),
        })?;
        if model.lookup(&self.key_name).is_none() {
            return Err(ConfigError::UnknownKeyField {
                view: self.name.clone(),
                key: self.key_name.clone(),
            });
        }

        if self.input_schema.is_none() {
            self.input_schema = Some(self.factory.input_schema(model, &base, None)?);
        }
        if self.output_schema.is_none() {
            self.output_schema = Some(self.factory.output_schema(model, &base, None)?);
        }
        if self.has(Capability::Update) && self.put_schema.is_none() {
            self.put_schema = Some(self.factory.put_schema(model, &base, None)?);
        }
        if self.has(Capability::UpdatePartial) && self.patch_schema.is_none() {
            self.patch_schema = Some(self.factory.patch_schema(model, &base, None)?);
        }
        if self.filter_schema.is_none() {
            self.filter_schema = Some(if self.has(Capability::RetrieveList) {
                self.factory.filter_schema(model, None)?
            } else {
                base_record_schema()
            });
        }
        if self.has(Capability::RetrieveList) && self.list_schema.is_none() {
            if let Some(output) = &self.output_schema {
                self.list_schema = Some(
                    self.factory
                        .list_schema(model, output, &self.base_list_schema, None),
                );
            }
        }
        if self.has(Capability::Delete) && self.delete_schema.is_none() {
            self.delete_schema = Some(self.factory.delete_schema(
                model,
                &self.key_name,
                self.key_type.field_type(),
                self.wrapper.as_ref(),
            ));
        }
        Ok(())
    }

    fn check_modelless(&mut self) -> Result<(), ConfigError> {
        let reads_source = [Capability::RetrieveList, Capability::RetrieveSingleObjectData]
            .iter()
            .any(|c| self.has(*c) && !self.handlers.contains_key(c));
        if reads_source && self.query_source.is_none() {
            return Err(ConfigError::MissingQuerySource {
                view: self.name.clone(),
            });
        }
        if let Some(capability) = self
            .capabilities
            .iter()
            .find(|c| c.needs_model() && !self.handlers.contains_key(*c))
        {
            return Err(ConfigError::MissingModelForCapability {
                view: self.name.clone(),
                capability: capability.to_string(),
            });
        }
        if self.filter_schema.is_none() {
            self.filter_schema = Some(base_record_schema());
        }
        Ok(())
    }
}
