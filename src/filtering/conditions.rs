use super::fields::{field_expr, property_document};
use super::operators::{Operator, split_operator};
use crate::model::{FieldHandle, FieldType, Model};
use crate::values::to_db_value;
use sea_orm::{
    Condition, DatabaseBackend,
    sea_query::{Alias, Expr, Func, Query, SimpleExpr},
};
use serde_json::Value;

/// AND-s one predicate per populated filter field.
///
/// - `field__op` applies the operator;
/// - a list value means containment for list/object fields and `IN` otherwise;
/// - null and booleans compare with `IS`;
/// - anything else is equality.
///
/// Names that do not resolve to a model field, and unknown operator suffixes, are skipped.
pub fn filter_condition<'a, I>(model: &Model, filters: I, backend: DatabaseBackend) -> Condition
where
    I: IntoIterator<Item = (&'a str, &'a Value)>,
{
    filters
        .into_iter()
        .filter_map(|(name, value)| field_predicate(model, name, value, backend))
        .fold(Condition::all(), Condition::add)
}

fn field_predicate(model: &Model, name: &str, value: &Value, backend: DatabaseBackend) -> Option<Condition> {
    let (field_name, suffix) = split_operator(name);
    let Some((field, field_type)) = model.lookup(field_name) else {
        tracing::debug!(filter = %name, model = %model.name(), "Skipping filter on unknown field");
        return None;
    };
    let target = field_expr(model, field, backend);

    if let Some(suffix) = suffix {
        let Some(operator) = Operator::from_suffix(suffix) else {
            tracing::debug!(filter = %name, "Skipping filter with unknown operator");
            return None;
        };
        if !comparable(field_type, value) {
            tracing::debug!(filter = %name, value = %value, "Filter value does not fit the field type");
            return Some(Condition::all().add(Expr::cust("FALSE")));
        }
        let predicate = operator.apply(target, to_db_value(field_type, value, backend));
        return Some(Condition::all().add(predicate));
    }

    let predicate = match value {
        Value::Array(items) if field_type.is_composite() => return Some(contains(model, field, items, backend)),
        Value::Array(items) => Expr::expr(target).is_in(
            items
                .iter()
                .map(|item| to_db_value(field_type, item, backend)),
        ),
        Value::Null => Expr::expr(target).is_null(),
        Value::Bool(flag) => Expr::expr(target).is(Expr::cust(if *flag { "TRUE" } else { "FALSE" })),
        other => Expr::expr(target).eq(to_db_value(field_type, other, backend)),
    };
    Some(Condition::all().add(predicate))
}

/// A value left uncoerced by query binding never satisfies a comparison on a numeric or
/// boolean field.
fn comparable(field_type: FieldType, value: &Value) -> bool {
    match field_type {
        FieldType::Integer | FieldType::Float => value.is_number(),
        FieldType::Boolean => value.is_boolean(),
        _ => true,
    }
}

/// Every item must be an element of the JSON array (or document) behind `field`.
fn contains(model: &Model, field: FieldHandle<'_>, items: &[Value], backend: DatabaseBackend) -> Condition {
    let document = match field {
        FieldHandle::Property(property) => property_document(model, property, backend),
        FieldHandle::Column(_) => field_expr(model, field, backend),
    };

    match backend {
        DatabaseBackend::Postgres => {
            let needle = to_db_value(FieldType::List, &Value::Array(items.to_vec()), backend);
            let predicate =
                Expr::cust_with_exprs("$1 @> $2", [document, Func::cast_as(needle, Alias::new("jsonb")).into()]);
            Condition::all().add(predicate)
        }
        DatabaseBackend::MySql => {
            let needle = Value::Array(items.to_vec()).to_string();
            let predicate: SimpleExpr = Func::cust(Alias::new("JSON_CONTAINS"))
                .arg(document)
                .arg(needle)
                .into();
            Condition::all().add(predicate)
        }
        _ => items
            .iter()
            .map(|item| {
                let element = Alias::new("element");
                let mut probe = Query::select();
                probe
                    .expr(Expr::val(1))
                    .from_function(Func::cust(Alias::new("json_each")).arg(document.clone()), element.clone())
                    .and_where(
                        Expr::col((element, Alias::new("value")))
                            .eq(to_db_value(FieldType::String, item, backend)),
                    );
                Expr::exists(probe)
            })
            .fold(Condition::all(), Condition::add),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Column, Property, PropertyKind};
    use sea_orm::ColumnType;
    use sea_orm::sea_query::{Asterisk, SqliteQueryBuilder};
    use serde_json::json;

    fn model() -> Model {
        Model::new("User", "users")
            .column(Column::new("id", ColumnType::BigInteger).primary_key())
            .column(Column::new("nickname", ColumnType::Text).db_name("name"))
            .column(Column::new("active", ColumnType::Boolean))
            .column(Column::new("profile", ColumnType::JsonBinary).db_name("props"))
            .property(Property::new("age", PropertyKind::Integer))
            .property(Property::new("email_list", PropertyKind::Array))
    }

    fn render(filters: &[(&str, Value)]) -> String {
        let model = model();
        let condition = filter_condition(
            &model,
            filters.iter().map(|(name, value)| (*name, value)),
            DatabaseBackend::Sqlite,
        );
        Query::select()
            .column(Asterisk)
            .from(Alias::new("users"))
            .cond_where(condition)
            .to_string(SqliteQueryBuilder)
    }

    #[test]
    fn test_operator_suffix() {
        let sql = render(&[("age__le", json!(30))]);
        assert!(sql.contains(r#"json_extract("users"."props", '$.age') <= 30"#));
    }

    #[test]
    fn test_uncoerced_comparison_matches_nothing() {
        let sql = render(&[("age__le", json!("abc")), ("id", json!(1))]);
        assert!(sql.contains("FALSE"));
        assert!(!sql.contains("'abc'"));
        assert!(sql.contains(r#""users"."id" = 1"#));
    }

    #[test]
    fn test_scalar_list_becomes_in() {
        let sql = render(&[("id", json!([1, 2]))]);
        assert!(sql.contains(r#""users"."id" IN (1, 2)"#));
    }

    #[test]
    fn test_list_field_uses_containment() {
        let sql = render(&[("email_list", json!(["a@x.io", "b@x.io"]))]);
        assert_eq!(sql.matches("EXISTS").count(), 2);
        assert!(sql.contains("json_each"));
        assert!(sql.contains("'a@x.io'"));
    }

    #[test]
    fn test_bool_and_null_use_is() {
        let sql = render(&[("active", json!(true)), ("nickname", Value::Null)]);
        assert!(sql.contains(r#""users"."active" IS TRUE"#));
        assert!(sql.contains(r#""users"."name" IS NULL"#));
        assert!(sql.contains(" AND "));
    }

    #[test]
    fn test_unknown_names_are_skipped() {
        let sql = render(&[("ignore_me", json!(true)), ("age__like", json!(3))]);
        assert!(!sql.contains("WHERE"));
    }

    #[test]
    fn test_storage_name_resolves() {
        let sql = render(&[("name", json!("Alex2"))]);
        assert!(sql.contains(r#""users"."name" = 'Alex2'"#));
    }
}
