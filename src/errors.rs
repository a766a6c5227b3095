//! # Errors
//!
//! Two families of errors live here:
//!
//! - [`ConfigError`]: raised while synthesizing schemas or building a view. These happen at
//!   startup, never while serving a request.
//! - [`ApiError`]: returned by request handlers. Each variant maps to an HTTP status code and a
//!   sanitized body. Database failures are logged with `tracing` but never echoed to clients.
//!
//! Response bodies carry a `detail` message, plus a per-field `errors` list for validation
//! failures:
//!
//! ```json
//! {"detail": "User not found"}
//! {"detail": "Validation failed", "errors": [{"field": "age", "message": "value is not a valid integer"}]}
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use serde_with::skip_serializing_none;
use std::fmt;

/// Configuration problems detected while building schemas and views.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("schema `{schema}` declares a Meta without a model")]
    MissingModel { schema: String },

    #[error("schema `{schema}`: `fields` must be a list of names, got the bare string {value:?}")]
    FieldsIsString { schema: String, value: String },

    #[error("view `{view}` declares a model but has no base schema")]
    MissingBaseSchema { view: String },

    #[error("view `{view}` has neither a model nor a query source")]
    MissingQuerySource { view: String },

    #[error("view `{view}` needs a model for `{capability}`")]
    MissingModelForCapability { view: String, capability: String },

    #[error("view `{view}`: key field `{key}` is not a field of the model")]
    UnknownKeyField { view: String, key: String },
}

/// One failed field of a validated payload. `field` is a dotted path (`pagination.total`,
/// `email_list.1`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Every field error collected while validating one payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, thiserror::Error)]
#[error("validation failed: {}", self.summary())]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    /// Whether any error was reported for `field`.
    pub fn contains(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    fn summary(&self) -> String {
        self.0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// HTTP-facing error returned by view handlers.
#[derive(Debug)]
pub enum ApiError {
    /// 404, the keyed object or route target does not exist
    NotFound {
        resource: String,
        id: Option<String>,
    },

    /// 400
    BadRequest { message: String },

    /// 409, e.g. a unique constraint was violated
    Conflict { message: String },

    /// 422, the payload or query did not match the schema
    ValidationFailed { errors: Vec<FieldError> },

    /// 500, details logged and never sent
    Database { message: String, internal: DbErr },

    /// 500
    Internal {
        message: String,
        internal: Option<String>,
    },
}

impl ApiError {
    pub fn not_found(resource: impl Into<String>, id: Option<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Single-field validation failure, used for malformed reserved query parameters.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            errors: vec![FieldError::new(field, message)],
        }
    }

    pub fn database(err: DbErr) -> Self {
        Self::Database {
            message: "A database error occurred".to_string(),
            internal: err,
        }
    }

    pub fn internal(message: impl Into<String>, internal: Option<String>) -> Self {
        Self::Internal {
            message: message.into(),
            internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::ValidationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Database { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The sanitized message placed in the `detail` field.
    pub fn user_message(&self) -> String {
        match self {
            // The id is kept for logs only; clients see the model name.
            Self::NotFound { resource, .. } => format!("{resource} not found"),
            Self::ValidationFailed { .. } => "Validation failed".to_string(),
            Self::BadRequest { message }
            | Self::Conflict { message }
            | Self::Database { message, .. }
            | Self::Internal { message, .. } => message.clone(),
        }
    }

    fn log_internal(&self) {
        match self {
            Self::Database { internal, .. } => {
                tracing::error!(error = ?internal, "Database error occurred");
            }
            Self::Internal {
                internal: Some(details),
                ..
            } => {
                tracing::error!(details = %details, "Internal error occurred");
            }
            Self::NotFound { resource, id } => {
                tracing::debug!(resource = %resource, id = ?id, "Object not found");
            }
            _ => {
                tracing::debug!(
                    error = %self.user_message(),
                    status = %self.status_code(),
                    "API error"
                );
            }
        }
    }
}

#[skip_serializing_none]
#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    errors: Option<Vec<FieldError>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log_internal();

        let status = self.status_code();
        let detail = self.user_message();
        let errors = match self {
            Self::ValidationFailed { errors } => Some(errors),
            _ => None,
        };

        (status, Json(ErrorResponse { detail, errors })).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for ApiError {}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::ValidationFailed { errors: errors.0 }
    }
}

/// - `DbErr::RecordNotFound` → 404
/// - unique constraint violations → 409
/// - everything else → 500, logged
impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        if let DbErr::RecordNotFound(msg) = &err {
            let resource = msg.split_whitespace().next().unwrap_or("Resource");
            return Self::not_found(resource, None);
        }
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            tracing::debug!(detail = %detail, "Unique constraint violated");
            return Self::conflict("Object already exists");
        }
        Self::database(err)
    }
}

impl From<sea_orm::sea_query::error::Error> for ApiError {
    fn from(err: sea_orm::sea_query::error::Error) -> Self {
        Self::internal("Failed to build query", Some(err.to_string()))
    }
}
