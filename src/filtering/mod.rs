//! # Query pipeline
//!
//! Turns a bound filter payload, sort tokens and pagination parameters into clauses on a
//! sea-query [`SelectStatement`](sea_orm::sea_query::SelectStatement).
//!
//! ```rust,ignore
//! GET /user?id=1&id=2              // id IN (1, 2)
//! GET /user?age__le=30             // age <= 30
//! GET /user?email_list=a@x.io      // containment on a list field
//! GET /user?sort=type&sort=-age    // ORDER BY type ASC, age DESC
//! GET /user?limit=2&offset=1       // LIMIT 2 OFFSET 1; limit=0 means no limit
//! ```
//!
//! JSON-backed properties are addressed through backend-specific JSON accessors, so they can
//! be filtered and sorted like columns on SQLite, PostgreSQL and MySQL.

pub mod conditions;
pub mod fields;
pub mod operators;
pub mod pagination;
pub mod sort;

pub use conditions::filter_condition;
pub use fields::field_expr;
pub use operators::{Operator, split_operator};
pub use pagination::{Pagination, paginate, parse_pagination, prepare_response};
pub use sort::{parse_sort, sort_query};
