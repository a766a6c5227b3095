//! # viewcrate
//!
//! CRUD endpoints and validation schemas generated from model metadata, served by axum over
//! sea-orm.
//!
//! Describe a table as a [`Model`], build a [`ViewSet`] for it, and bind the view on a
//! [`MainRouter`]:
//!
//! ```rust,ignore
//! use viewcrate::{Column, MainRouter, Model, ViewSet};
//!
//! let user = Arc::new(
//!     Model::new("User", "users")
//!         .column(Column::new("id", ColumnType::Integer).primary_key())
//!         .column(Column::new("nickname", ColumnType::Text).not_null())
//!         .column(Column::new("age", ColumnType::Integer)),
//! );
//!
//! let app = MainRouter::new()
//!     .add_view("", ViewSet::viewset(user).build()?)
//!     .router(&db);
//! ```
//!
//! This serves:
//!
//! | Method | Path | Operation |
//! |---|---|---|
//! | GET | `/user` | list with filters, `sort`, `offset`, `limit` |
//! | POST | `/user` | create |
//! | GET | `/user/{id}` | retrieve |
//! | PUT | `/user/{id}` | full update |
//! | PATCH | `/user/{id}` | partial update |
//! | DELETE | `/user/{id}` | delete |
//!
//! Schemas are derived once, when the view is built; see [`schema`] for the derivation rules
//! and [`filtering`] for the query string grammar.

pub mod errors;
pub mod filtering;
pub mod methods;
pub mod model;
pub mod openapi;
pub mod router;
pub mod schema;
pub mod store;
pub mod values;
pub mod view;

pub use errors::{ApiError, ConfigError, FieldError, ValidationErrors};
pub use methods::{HandlerRequest, MethodFactory, ViewHandler};
pub use model::{Column, FieldType, Model, Property, PropertyKind};
pub use router::{MainRouter, RouteOptions, RouteSpec};
pub use schema::{Meta, Schema, SchemaBuilder, SchemaFactory, WrapperSchema};
pub use store::BaseQuery;
pub use view::{Capability, KeyType, QuerySource, ViewSet, ViewSetBuilder};
