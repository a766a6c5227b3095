use super::fields::field_expr;
use crate::model::Model;
use crate::store::BaseQuery;
use sea_orm::{
    DatabaseBackend,
    sea_query::{Alias, Expr, Order},
};

/// Query parameter carrying sort tokens; repeat it for several keys.
pub const SORT_PARAM: &str = "sort";

/// `-age` sorts descending by `age`, `age` ascending.
pub fn parse_sort(token: &str) -> (&str, Order) {
    token
        .strip_prefix('-')
        .map_or((token, Order::Asc), |name| (name, Order::Desc))
}

/// Appends one ORDER BY term per token, in order.
///
/// A name is looked up among the query's projected columns first, then among the model's
/// fields. Names matching neither are skipped.
pub fn sort_query(query: &mut BaseQuery, model: Option<&Model>, sort: &[String], backend: DatabaseBackend) {
    for token in sort {
        let (name, order) = parse_sort(token);
        if name.is_empty() {
            continue;
        }
        if query.projects(name) {
            query.statement.order_by_expr(Expr::col(Alias::new(name)).into(), order);
            continue;
        }
        match model.and_then(|m| m.lookup(name).map(|(field, _)| (m, field))) {
            Some((model, field)) => {
                query
                    .statement
                    .order_by_expr(field_expr(model, field, backend), order);
            }
            None => tracing::debug!(sort = %token, "Skipping sort on unknown field"),
        }
    }
}
