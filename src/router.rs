//! Route binding.
//!
//! [`MainRouter`] collects the routes of every registered view as plain [`RouteSpec`] values,
//! then materialises them into an `axum::Router` carrying the database connection as state.
//! Collection operations (list, aggregate, create) live on the base path; keyed operations on
//! `{base}/{key_name}`.

use crate::errors::ApiError;
use crate::methods::HandlerRequest;
use crate::schema::Schema;
use crate::view::{Capability, KeyType, ViewSet};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{MethodFilter, MethodRouter},
};
use heck::ToSnakeCase;
use indexmap::IndexMap;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;
use std::collections::HashSet;
use std::sync::Arc;

/// Per-operation route settings.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouteOptions {
    /// Success status; 201 for create and 200 otherwise when unset.
    pub status: Option<u16>,
    pub tags: Option<Vec<String>>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub operation_id: Option<String>,
}

impl RouteOptions {
    /// Fills unset settings from `fallback`.
    #[must_use]
    pub fn or(self, fallback: Self) -> Self {
        Self {
            status: self.status.or(fallback.status),
            tags: self.tags.or(fallback.tags),
            summary: self.summary.or(fallback.summary),
            description: self.description.or(fallback.description),
            operation_id: self.operation_id.or(fallback.operation_id),
        }
    }
}

/// One bound operation.
#[derive(Clone, Debug)]
pub struct RouteSpec {
    pub method: Method,
    /// Path in axum syntax, e.g. `/user/{id}`.
    pub path: String,
    pub key: Option<(String, KeyType)>,
    pub capability: Capability,
    pub options: RouteOptions,
    view: Arc<ViewSet>,
}

impl RouteSpec {
    pub fn view(&self) -> &Arc<ViewSet> {
        &self.view
    }

    pub fn request_schema(&self) -> Option<&Arc<Schema>> {
        self.view.request_schema(self.capability)
    }

    pub fn response_schema(&self) -> Option<&Arc<Schema>> {
        self.view.response_schema(self.capability)
    }

    /// Filter schema of list and aggregate routes, rendered as query parameters.
    pub fn query_schema(&self) -> Option<&Arc<Schema>> {
        match self.capability {
            Capability::RetrieveList | Capability::RetrieveSingleObjectData => self.view.filter_schema(),
            _ => None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.options
            .status
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(match self.capability {
                Capability::Create => StatusCode::CREATED,
                _ => StatusCode::OK,
            })
    }

    /// `/user/{id:int}`, as shown in route listings.
    pub fn display_path(&self) -> String {
        match &self.key {
            Some((name, key_type)) => self
                .path
                .replace(&format!("{{{name}}}"), &format!("{{{name}:{}}}", key_type.label())),
            None => self.path.clone(),
        }
    }

    async fn serve(&self, request: HandlerRequest) -> Response {
        match self.view.call(self.capability, request).await {
            Ok(value) => {
                let body = match self.response_schema() {
                    Some(schema) => schema.project(&value),
                    None => value,
                };
                (self.status(), Json(body)).into_response()
            }
            Err(err) => err.into_response(),
        }
    }
}

fn method_of(capability: Capability) -> Method {
    match capability {
        Capability::RetrieveList | Capability::RetrieveSingleObjectData | Capability::Retrieve => Method::GET,
        Capability::Create => Method::POST,
        Capability::Update => Method::PUT,
        Capability::UpdatePartial => Method::PATCH,
        Capability::Delete => Method::DELETE,
    }
}

fn filter_of(capability: Capability) -> MethodFilter {
    match capability {
        Capability::RetrieveList | Capability::RetrieveSingleObjectData | Capability::Retrieve => MethodFilter::GET,
        Capability::Create => MethodFilter::POST,
        Capability::Update => MethodFilter::PUT,
        Capability::UpdatePartial => MethodFilter::PATCH,
        Capability::Delete => MethodFilter::DELETE,
    }
}

fn parse_body(bytes: &Bytes) -> Result<Option<Value>, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(bytes)
        .map(Some)
        .map_err(|err| ApiError::bad_request(format!("Invalid JSON body: {err}")))
}

fn collection_handler(route: Arc<RouteSpec>) -> MethodRouter<DatabaseConnection> {
    let filter = filter_of(route.capability);
    axum::routing::on(
        filter,
        move |State(db): State<DatabaseConnection>, Query(query): Query<Vec<(String, String)>>, bytes: Bytes| {
            let route = Arc::clone(&route);
            async move {
                let body = match parse_body(&bytes) {
                    Ok(body) => body,
                    Err(err) => return err.into_response(),
                };
                let mut request = HandlerRequest::new(db).query(query);
                request.body = body;
                route.serve(request).await
            }
        },
    )
}

fn keyed_handler(route: Arc<RouteSpec>, key_type: KeyType) -> MethodRouter<DatabaseConnection> {
    let filter = filter_of(route.capability);
    axum::routing::on(
        filter,
        move |State(db): State<DatabaseConnection>,
              Path(raw): Path<String>,
              Query(query): Query<Vec<(String, String)>>,
              bytes: Bytes| {
            let route = Arc::clone(&route);
            async move {
                let Some(key) = key_type.parse(&raw) else {
                    tracing::debug!(path = %route.path, key = %raw, "Key does not parse");
                    return StatusCode::NOT_FOUND.into_response();
                };
                let body = match parse_body(&bytes) {
                    Ok(body) => body,
                    Err(err) => return err.into_response(),
                };
                let mut request = HandlerRequest::new(db).key(key).query(query);
                request.body = body;
                route.serve(request).await
            }
        },
    )
}

/// The route table of an application.
#[derive(Clone, Debug, Default)]
pub struct MainRouter {
    routes: Vec<Arc<RouteSpec>>,
}

impl MainRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every capability of `view` under `base_path`. An empty base path becomes
    /// `/{snake_case(model)}`, which is also used as the default tag.
    #[must_use]
    pub fn add_view(mut self, base_path: &str, view: Arc<ViewSet>) -> Self {
        let default_name = view
            .model()
            .map_or_else(|| view.name().to_snake_case(), |m| m.name().to_snake_case());
        let base = match base_path.trim_end_matches('/') {
            "" => format!("/{default_name}"),
            path if path.starts_with('/') => path.to_string(),
            path => format!("/{path}"),
        };
        let tag = RouteOptions {
            tags: Some(vec![if base_path.is_empty() {
                default_name
            } else {
                base.trim_start_matches('/').to_string()
            }]),
            ..RouteOptions::default()
        };

        for capability in view.capabilities() {
            let (path, key) = if capability.is_single_object() {
                (
                    format!("{base}/{{{}}}", view.key_name()),
                    Some((view.key_name().to_string(), view.key_type())),
                )
            } else {
                (base.clone(), None)
            };
            let route = RouteSpec {
                method: method_of(capability),
                path,
                key,
                capability,
                options: view.params(capability).or(tag.clone()),
                view: Arc::clone(&view),
            };
            tracing::debug!(
                view = %view.name(),
                method = %route.method,
                path = %route.display_path(),
                "Registered route"
            );
            self.routes.push(Arc::new(route));
        }
        self
    }

    pub fn routes(&self) -> impl Iterator<Item = &RouteSpec> {
        self.routes.iter().map(Arc::as_ref)
    }

    /// Builds the axum router. A second registration of the same method on one path is
    /// skipped.
    pub fn router(&self, db: &DatabaseConnection) -> Router {
        let mut paths: IndexMap<&str, MethodRouter<DatabaseConnection>> = IndexMap::new();
        let mut seen = HashSet::new();

        for route in &self.routes {
            if !seen.insert((route.method.clone(), route.path.as_str())) {
                tracing::warn!(
                    method = %route.method,
                    path = %route.display_path(),
                    view = %route.view.name(),
                    "Duplicate route skipped"
                );
                continue;
            }
            let handler = match &route.key {
                Some((_, key_type)) => keyed_handler(Arc::clone(route), *key_type),
                None => collection_handler(Arc::clone(route)),
            };
            let entry = paths.shift_remove(route.path.as_str()).unwrap_or_default();
            paths.insert(route.path.as_str(), entry.merge(handler));
        }

        paths
            .into_iter()
            .fold(Router::new(), |router, (path, methods)| router.route(path, methods))
            .with_state(db.clone())
    }
}
