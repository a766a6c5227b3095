use crate::model::{Column, FieldHandle, Model, Property, PropertyKind};
use sea_orm::DatabaseBackend;
use sea_orm::sea_query::{Alias, Expr, Func, SimpleExpr};

fn quote(backend: DatabaseBackend, ident: &str) -> String {
    match backend {
        DatabaseBackend::MySql => format!("`{}`", ident.replace('`', "``")),
        _ => format!("\"{}\"", ident.replace('"', "\"\"")),
    }
}

/// The SQL expression reading a field: the qualified column, or a JSON lookup into the
/// property's storage column. PostgreSQL enum columns are read as text.
pub fn field_expr(model: &Model, field: FieldHandle<'_>, backend: DatabaseBackend) -> SimpleExpr {
    match field {
        FieldHandle::Column(column) => column_expr(model, column, backend),
        FieldHandle::Property(property) => Expr::cust(property_sql(model, property, backend)),
    }
}

fn column_expr(model: &Model, column: &Column, backend: DatabaseBackend) -> SimpleExpr {
    let expr: SimpleExpr = Expr::col((Alias::new(model.table()), Alias::new(column.storage_name()))).into();
    if column.is_enum() && backend == DatabaseBackend::Postgres {
        Func::cast_as(expr, Alias::new("TEXT")).into()
    } else {
        expr
    }
}

/// The raw JSON document holding a property, used for containment checks.
pub fn property_document(model: &Model, property: &Property, backend: DatabaseBackend) -> SimpleExpr {
    let (column, key) = property_location(model, property, backend);
    match backend {
        DatabaseBackend::Postgres => Expr::cust(format!("({column} -> {key})")),
        DatabaseBackend::MySql => Expr::cust(format!("JSON_EXTRACT({column}, {key})")),
        _ => Expr::cust(format!("json_extract({column}, {key})")),
    }
}

fn property_location(model: &Model, property: &Property, backend: DatabaseBackend) -> (String, String) {
    let storage = model
        .storage_of(property)
        .map_or(property.storage_column(), Column::storage_name);
    let column = format!("{}.{}", quote(backend, model.table()), quote(backend, storage));
    let name = property.name().replace('\'', "''");
    let key = match backend {
        DatabaseBackend::Postgres => format!("'{name}'"),
        _ => format!("'$.{name}'"),
    };
    (column, key)
}

fn property_sql(model: &Model, property: &Property, backend: DatabaseBackend) -> String {
    let (column, key) = property_location(model, property, backend);
    match backend {
        DatabaseBackend::Postgres => match property.kind() {
            PropertyKind::Integer => format!("CAST({column} ->> {key} AS BIGINT)"),
            PropertyKind::Boolean => format!("CAST({column} ->> {key} AS BOOLEAN)"),
            PropertyKind::DateTime => format!("CAST({column} ->> {key} AS TIMESTAMP)"),
            PropertyKind::String => format!("({column} ->> {key})"),
            PropertyKind::Array | PropertyKind::Object | PropertyKind::Other => {
                format!("({column} -> {key})")
            }
        },
        DatabaseBackend::MySql => match property.kind() {
            PropertyKind::String | PropertyKind::DateTime => {
                format!("JSON_UNQUOTE(JSON_EXTRACT({column}, {key}))")
            }
            _ => format!("JSON_EXTRACT({column}, {key})"),
        },
        _ => format!("json_extract({column}, {key})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::ColumnType;
    use sea_orm::sea_query::{Asterisk, IntoIden, PostgresQueryBuilder, Query, SqliteQueryBuilder};

    fn model() -> Model {
        Model::new("User", "users")
            .column(Column::new("nickname", ColumnType::Text).db_name("name"))
            .column(Column::new(
                "type",
                ColumnType::Enum {
                    name: Alias::new("usertype").into_iden(),
                    variants: vec![],
                },
            ))
            .column(Column::new("profile", ColumnType::JsonBinary).db_name("props"))
            .property(Property::new("age", PropertyKind::Integer))
    }

    fn select(expr: SimpleExpr) -> sea_orm::sea_query::SelectStatement {
        Query::select().column(Asterisk).from(Alias::new("users")).and_where(expr).to_owned()
    }

    #[test]
    fn test_column_uses_storage_name() {
        let model = model();
        let (field, _) = model.lookup("nickname").unwrap();
        let sql = select(Expr::expr(field_expr(&model, field, DatabaseBackend::Sqlite)).eq("Alex"))
            .to_string(SqliteQueryBuilder);
        assert!(sql.contains(r#""users"."name" = 'Alex'"#));
    }

    #[test]
    fn test_property_paths() {
        let model = model();
        let (field, _) = model.lookup("age").unwrap();
        let sqlite = select(Expr::expr(field_expr(&model, field, DatabaseBackend::Sqlite)).lte(30))
            .to_string(SqliteQueryBuilder);
        assert!(sqlite.contains(r#"json_extract("users"."props", '$.age') <= 30"#));

        let postgres = select(Expr::expr(field_expr(&model, field, DatabaseBackend::Postgres)).lte(30))
            .to_string(PostgresQueryBuilder);
        assert!(postgres.contains(r#"CAST("users"."props" ->> 'age' AS BIGINT) <= 30"#));
    }

    #[test]
    fn test_postgres_enum_reads_as_text() {
        let model = model();
        let (field, _) = model.lookup("type").unwrap();
        let sql = select(Expr::expr(field_expr(&model, field, DatabaseBackend::Postgres)).eq("USER"))
            .to_string(PostgresQueryBuilder);
        assert!(sql.contains("CAST"));
        assert!(sql.contains("TEXT"));
    }
}
