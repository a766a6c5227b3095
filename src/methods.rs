//! Generated request handlers.
//!
//! A handler is a [`ViewHandler`]: it receives the view it is mounted on at call time, so one
//! generated handler serves any view. [`MethodFactory`] builds the stock handler for each
//! capability and wraps it under the view's wrapper key when one is configured.

use crate::errors::ApiError;
use crate::filtering::pagination::{LIMIT_PARAM, OFFSET_PARAM};
use crate::filtering::sort::SORT_PARAM;
use crate::filtering::{Pagination, filter_condition, paginate, parse_pagination, prepare_response, sort_query};
use crate::schema::Payload;
use crate::store::{self, BaseQuery};
use crate::view::{Capability, ViewSet};
use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Query parameters that never reach the filter schema.
pub const RESERVED_PARAMS: [&str; 3] = [OFFSET_PARAM, LIMIT_PARAM, SORT_PARAM];

/// Everything a handler gets from the transport.
#[derive(Clone, Debug)]
pub struct HandlerRequest {
    pub db: DatabaseConnection,
    /// Parsed key path segment, for single-object routes.
    pub key: Option<Value>,
    /// Raw query pairs in request order; repeated keys are kept.
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HandlerRequest {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            key: None,
            query: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn key(mut self, key: Value) -> Self {
        self.key = Some(key);
        self
    }

    #[must_use]
    pub fn query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    fn sort_tokens(&self) -> Vec<String> {
        self.query
            .iter()
            .filter(|(key, _)| key == SORT_PARAM)
            .map(|(_, value)| value.clone())
            .collect()
    }

    fn filter_pairs(&self) -> Vec<(String, String)> {
        self.query
            .iter()
            .filter(|(key, _)| !RESERVED_PARAMS.contains(&key.as_str()))
            .cloned()
            .collect()
    }
}

#[async_trait]
pub trait ViewHandler: Send + Sync {
    async fn handle(&self, view: &ViewSet, request: HandlerRequest) -> Result<Value, ApiError>;
}

/// Binds the filter schema, runs the base query and applies the populated filters.
async fn filtered_query(view: &ViewSet, request: &HandlerRequest) -> Result<BaseQuery, ApiError> {
    let filters = match view.filter_schema() {
        Some(schema) => schema.bind_query(&request.filter_pairs())?,
        None => Payload::default(),
    };
    let mut query = view.base_query(&request.db).await?;
    if let Some(model) = view.model() {
        if filters.populated().next().is_some() {
            let backend = request.db.get_database_backend();
            query
                .statement
                .cond_where(filter_condition(model, filters.populated(), backend));
        }
    }
    Ok(query)
}

static NO_BODY: Value = Value::Null;

fn body_of(request: &HandlerRequest) -> &Value {
    request.body.as_ref().unwrap_or(&NO_BODY)
}

struct RetrieveList;

#[async_trait]
impl ViewHandler for RetrieveList {
    async fn handle(&self, view: &ViewSet, request: HandlerRequest) -> Result<Value, ApiError> {
        let (offset, limit) = parse_pagination(&request.query)?;
        let db = &request.db;
        let model = view.model().map(Arc::as_ref);

        let mut query = filtered_query(view, &request).await?;
        sort_query(&mut query, model, &request.sort_tokens(), db.get_database_backend());

        let total = store::count(db, &query.statement).await?;
        paginate(&mut query.statement, offset, limit);
        let data = store::fetch_all(db, model, &query).await?;

        Ok(prepare_response(data, Pagination { offset, limit, total }))
    }
}

struct RetrieveSingleObjectData;

#[async_trait]
impl ViewHandler for RetrieveSingleObjectData {
    async fn handle(&self, view: &ViewSet, request: HandlerRequest) -> Result<Value, ApiError> {
        let query = filtered_query(view, &request).await?;
        let row = store::fetch_first(&request.db, view.model().map(Arc::as_ref), &query).await?;
        Ok(row.unwrap_or(Value::Null))
    }
}

struct Retrieve;

#[async_trait]
impl ViewHandler for Retrieve {
    async fn handle(&self, view: &ViewSet, request: HandlerRequest) -> Result<Value, ApiError> {
        let model = view.require_model()?;
        let row = view.lookup(&request).await?;
        Ok(row.entity(model))
    }
}

struct Create;

#[async_trait]
impl ViewHandler for Create {
    async fn handle(&self, view: &ViewSet, request: HandlerRequest) -> Result<Value, ApiError> {
        let model = view.require_model()?;
        let payload = view.require_schema(Capability::Create)?.validate(body_of(&request))?;
        let row = store::insert(&request.db, model, &payload.dict()).await?;
        tracing::debug!(model = %model.name(), "Created object");
        Ok(row.entity(model))
    }
}

struct Update;

#[async_trait]
impl ViewHandler for Update {
    async fn handle(&self, view: &ViewSet, request: HandlerRequest) -> Result<Value, ApiError> {
        let model = view.require_model()?;
        let payload = view.require_schema(Capability::Update)?.validate(body_of(&request))?;
        let row = view.lookup(&request).await?;
        let row = store::update(&request.db, model, &row, &payload.dict_exclude_unset()).await?;
        Ok(row.entity(model))
    }
}

struct UpdatePartial;

#[async_trait]
impl ViewHandler for UpdatePartial {
    async fn handle(&self, view: &ViewSet, request: HandlerRequest) -> Result<Value, ApiError> {
        let model = view.require_model()?;
        let payload = view
            .require_schema(Capability::UpdatePartial)?
            .validate(body_of(&request))?;
        let row = view.lookup(&request).await?;
        let row = store::update(&request.db, model, &row, &payload.dict_exclude_defaults()).await?;
        Ok(row.entity(model))
    }
}

struct Delete;

#[async_trait]
impl ViewHandler for Delete {
    async fn handle(&self, view: &ViewSet, request: HandlerRequest) -> Result<Value, ApiError> {
        let model = view.require_model()?;
        let row = view.lookup(&request).await?;
        let key = row
            .entity(model)
            .get(view.key_name())
            .cloned()
            .unwrap_or(Value::Null);
        store::delete(&request.db, model, &row).await?;
        tracing::debug!(model = %model.name(), key = %key, "Deleted object");

        let mut deleted = Map::new();
        deleted.insert(view.key_name().to_string(), key);
        Ok(Value::Object(deleted))
    }
}

/// Returns `{key: <inner result>}`.
struct Wrapped {
    inner: Arc<dyn ViewHandler>,
    key: String,
}

#[async_trait]
impl ViewHandler for Wrapped {
    async fn handle(&self, view: &ViewSet, request: HandlerRequest) -> Result<Value, ApiError> {
        let value = self.inner.handle(view, request).await?;
        let mut wrapped = Map::new();
        wrapped.insert(self.key.clone(), value);
        Ok(Value::Object(wrapped))
    }
}

pub struct MethodFactory;

impl MethodFactory {
    /// The stock handler for `capability`.
    pub fn make(capability: Capability, wrapper_key: Option<&str>) -> Arc<dyn ViewHandler> {
        match capability {
            Capability::RetrieveList => Self::make_retrieve_list(wrapper_key),
            Capability::RetrieveSingleObjectData => Self::make_retrieve_single_object_data(wrapper_key),
            Capability::Retrieve => Self::make_retrieve(wrapper_key),
            Capability::Create => Self::make_create(wrapper_key),
            Capability::Update => Self::make_update(wrapper_key),
            Capability::UpdatePartial => Self::make_update_partial(wrapper_key),
            Capability::Delete => Self::make_delete(wrapper_key),
        }
    }

    pub fn make_retrieve_list(wrapper_key: Option<&str>) -> Arc<dyn ViewHandler> {
        Self::wrap_with(Arc::new(RetrieveList), wrapper_key)
    }

    pub fn make_retrieve_single_object_data(wrapper_key: Option<&str>) -> Arc<dyn ViewHandler> {
        Self::wrap_with(Arc::new(RetrieveSingleObjectData), wrapper_key)
    }

    pub fn make_retrieve(wrapper_key: Option<&str>) -> Arc<dyn ViewHandler> {
        Self::wrap_with(Arc::new(Retrieve), wrapper_key)
    }

    pub fn make_create(wrapper_key: Option<&str>) -> Arc<dyn ViewHandler> {
        Self::wrap_with(Arc::new(Create), wrapper_key)
    }

    pub fn make_update(wrapper_key: Option<&str>) -> Arc<dyn ViewHandler> {
        Self::wrap_with(Arc::new(Update), wrapper_key)
    }

    pub fn make_update_partial(wrapper_key: Option<&str>) -> Arc<dyn ViewHandler> {
        Self::wrap_with(Arc::new(UpdatePartial), wrapper_key)
    }

    pub fn make_delete(wrapper_key: Option<&str>) -> Arc<dyn ViewHandler> {
        Self::wrap_with(Arc::new(Delete), wrapper_key)
    }

    /// Wraps any handler, generated or custom, under `key`.
    pub fn wrap(handler: Arc<dyn ViewHandler>, key: &str) -> Arc<dyn ViewHandler> {
        Arc::new(Wrapped {
            inner: handler,
            key: key.to_string(),
        })
    }

    fn wrap_with(handler: Arc<dyn ViewHandler>, wrapper_key: Option<&str>) -> Arc<dyn ViewHandler> {
        match wrapper_key {
            Some(key) => Self::wrap(handler, key),
            None => handler,
        }
    }
}
