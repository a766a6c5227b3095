//! Stock base schemas every derived schema starts from.

use super::types::{FieldShape, Schema};
use crate::model::FieldType;
use std::sync::Arc;

pub const DEFAULT_WRAPPER_KEY: &str = "data";

/// Empty base for model-derived schemas. Entities can be projected through it.
pub fn base_model_schema() -> Arc<Schema> {
    Arc::new(Schema::model("BaseModelSchema").orm_mode(true))
}

/// Empty plain record, the filter schema of views without a model.
pub fn base_record_schema() -> Arc<Schema> {
    Arc::new(Schema::record("BaseSchema"))
}

pub fn pagination_schema() -> Arc<Schema> {
    Arc::new(
        Schema::model("PaginationSchema")
            .required("offset", FieldShape::Scalar(FieldType::Integer))
            .required("limit", FieldShape::Scalar(FieldType::Integer))
            .required("total", FieldShape::Scalar(FieldType::Integer)),
    )
}

/// `{data: [...], pagination: {offset, limit, total}}`; `data` is narrowed by derived list
/// schemas.
pub fn paginated_list_schema() -> Arc<Schema> {
    Arc::new(
        Schema::model("BasePaginatedListSchema")
            .required("data", FieldShape::Scalar(FieldType::List))
            .required("pagination", FieldShape::Nested(pagination_schema())),
    )
}

/// Wraps handler results as `{key: value}`. The base schema contributes any sibling fields.
#[derive(Clone, Debug)]
pub struct WrapperSchema {
    schema: Arc<Schema>,
    key: String,
}

impl Default for WrapperSchema {
    fn default() -> Self {
        Self {
            schema: Arc::new(Schema::model("BaseWrapperSchema")),
            key: DEFAULT_WRAPPER_KEY.to_string(),
        }
    }
}

impl WrapperSchema {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn schema(mut self, schema: Arc<Schema>) -> Self {
        self.schema = schema;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn base(&self) -> &Arc<Schema> {
        &self.schema
    }
}
