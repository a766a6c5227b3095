//! Data access for generated handlers.
//!
//! Each function issues exactly one statement (plus a re-read after writes on backends
//! without `RETURNING`) and awaits it; nothing here runs concurrently.

use crate::errors::ApiError;
use crate::filtering::field_expr;
use crate::model::Model;
use crate::values::{assignments, decode_row, row_to_entity, to_db_value};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbErr, FromQueryResult, JsonValue,
    sea_query::{Alias, Asterisk, Expr, Query, SelectStatement, SimpleExpr},
};
use serde_json::{Map, Value};

/// How rows of a base query are turned into response values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowShape {
    /// Full model rows, mapped to entities.
    Entity,
    /// Projected or aggregated columns, returned as-is.
    Raw,
}

/// A select statement plus the names of the columns it projects.
#[derive(Clone, Debug)]
pub struct BaseQuery {
    pub statement: SelectStatement,
    pub projected: Vec<String>,
    pub rows: RowShape,
}

impl BaseQuery {
    /// `SELECT * FROM <table>`.
    pub fn for_model(model: &Model) -> Self {
        Self {
            statement: Query::select()
                .column(Asterisk)
                .from(Alias::new(model.table()))
                .to_owned(),
            projected: model.columns().iter().map(|c| c.storage_name().to_string()).collect(),
            rows: RowShape::Entity,
        }
    }

    /// A custom statement whose rows are returned as they come.
    pub fn raw<I, S>(statement: SelectStatement, projected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            statement,
            projected: projected.into_iter().map(Into::into).collect(),
            rows: RowShape::Raw,
        }
    }

    pub fn projects(&self, name: &str) -> bool {
        self.projected.iter().any(|p| p == name)
    }
}

fn into_object(value: JsonValue) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

async fn query_rows(db: &DatabaseConnection, statement: &SelectStatement) -> Result<Vec<Map<String, Value>>, DbErr> {
    let built = db.get_database_backend().build(statement);
    let rows = JsonValue::find_by_statement(built).all(db).await?;
    Ok(rows.into_iter().map(into_object).collect())
}

fn shape_row(model: Option<&Model>, rows: RowShape, row: Map<String, Value>) -> Value {
    match (model, rows) {
        (Some(model), RowShape::Entity) => row_to_entity(model, &decode_row(model, row)),
        _ => Value::Object(row),
    }
}

/// Every row of `query`.
///
/// # Errors
/// Database failures.
pub async fn fetch_all(db: &DatabaseConnection, model: Option<&Model>, query: &BaseQuery) -> Result<Vec<Value>, DbErr> {
    let rows = query_rows(db, &query.statement).await?;
    Ok(rows.into_iter().map(|row| shape_row(model, query.rows, row)).collect())
}

/// The first row of `query`, if any.
///
/// # Errors
/// Database failures.
pub async fn fetch_first(
    db: &DatabaseConnection,
    model: Option<&Model>,
    query: &BaseQuery,
) -> Result<Option<Value>, DbErr> {
    let mut statement = query.statement.clone();
    statement.limit(1);
    let row = query_rows(db, &statement).await?.into_iter().next();
    Ok(row.map(|row| shape_row(model, query.rows, row)))
}

/// `SELECT COUNT(*) FROM (<statement>) AS subquery`.
///
/// # Errors
/// Database failures.
pub async fn count(db: &DatabaseConnection, statement: &SelectStatement) -> Result<u64, DbErr> {
    let counting = Query::select()
        .expr_as(Expr::cust("COUNT(*)"), Alias::new("total"))
        .from_subquery(statement.clone(), Alias::new("subquery"))
        .to_owned();
    let built = db.get_database_backend().build(&counting);
    let total = match db.query_one(built).await? {
        Some(row) => row.try_get::<i64>("", "total")?,
        None => 0,
    };
    Ok(u64::try_from(total).unwrap_or_default())
}

/// A stored row located by one of the model's fields.
#[derive(Clone, Debug)]
pub struct StoredRow {
    raw: Map<String, Value>,
}

impl StoredRow {
    pub fn entity(&self, model: &Model) -> Value {
        row_to_entity(model, &self.raw)
    }

    /// `WHERE` predicate addressing this exact row: its primary key when the model has one,
    /// else every column value it was read with.
    fn identity(&self, model: &Model, backend: sea_orm::DatabaseBackend) -> Vec<SimpleExpr> {
        let columns: Vec<_> = match model.primary_key() {
            Some(pk) => vec![pk],
            None => model.columns().iter().collect(),
        };
        columns
            .into_iter()
            .filter_map(|column| {
                let value = self.raw.get(column.storage_name())?;
                let target = Expr::col(Alias::new(column.storage_name()));
                Some(if value.is_null() {
                    target.is_null()
                } else {
                    target.eq(to_db_value(column.field_type(), value, backend))
                })
            })
            .collect()
    }
}

/// Looks up the row whose `key_name` field equals `key`, or 404 naming the model.
///
/// # Errors
/// [`ApiError::NotFound`] when nothing matches; database failures.
pub async fn get_object_or_404(
    db: &DatabaseConnection,
    model: &Model,
    key_name: &str,
    key: &Value,
) -> Result<StoredRow, ApiError> {
    let not_found = || ApiError::not_found(model.name(), Some(key.to_string()));
    let (field, field_type) = model.lookup(key_name).ok_or_else(not_found)?;
    let backend = db.get_database_backend();

    let mut query = BaseQuery::for_model(model);
    query
        .statement
        .and_where(Expr::expr(field_expr(model, field, backend)).eq(to_db_value(field_type, key, backend)))
        .limit(1);
    let row = query_rows(db, &query.statement)
        .await?
        .into_iter()
        .next()
        .ok_or_else(not_found)?;
    Ok(StoredRow {
        raw: decode_row(model, row),
    })
}

async fn refetch(db: &DatabaseConnection, model: &Model, predicates: Vec<SimpleExpr>) -> Result<StoredRow, ApiError> {
    let mut query = BaseQuery::for_model(model);
    for predicate in predicates {
        query.statement.and_where(predicate);
    }
    query.statement.limit(1);
    let row = query_rows(db, &query.statement)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found(model.name(), None))?;
    Ok(StoredRow {
        raw: decode_row(model, row),
    })
}

/// Inserts `values` (keyed by attribute name) with client-side defaults applied.
///
/// # Errors
/// Constraint violations (409 for unique keys) and other database failures.
pub async fn insert(db: &DatabaseConnection, model: &Model, values: &Map<String, Value>) -> Result<StoredRow, ApiError> {
    let backend = db.get_database_backend();
    let assigned = assignments(model, values, None, true);

    let mut statement = Query::insert();
    statement.into_table(Alias::new(model.table()));
    if assigned.is_empty() {
        statement.or_default_values();
    } else {
        statement.columns(assigned.iter().map(|(column, _, _)| Alias::new(column)));
        statement.values(
            assigned
                .iter()
                .map(|(_, field_type, value)| SimpleExpr::from(to_db_value(*field_type, value, backend))),
        )?;
    }

    if db.support_returning() {
        statement.returning_all();
        let row = JsonValue::find_by_statement(backend.build(&statement))
            .one(db)
            .await?
            .ok_or_else(|| ApiError::internal("Insert returned no row", None))?;
        return Ok(StoredRow {
            raw: decode_row(model, into_object(row)),
        });
    }

    let result = db.execute(backend.build(&statement)).await?;
    let pk = model
        .primary_key()
        .ok_or_else(|| ApiError::internal("Cannot re-read a row without a primary key", None))?;
    let id = i64::try_from(result.last_insert_id()).unwrap_or_default();
    refetch(db, model, vec![Expr::col(Alias::new(pk.storage_name())).eq(id)]).await
}

/// Applies `changes` (keyed by attribute name) to `row` and returns the stored result.
///
/// # Errors
/// Constraint violations and other database failures.
pub async fn update(
    db: &DatabaseConnection,
    model: &Model,
    row: &StoredRow,
    changes: &Map<String, Value>,
) -> Result<StoredRow, ApiError> {
    let backend = db.get_database_backend();
    let assigned = assignments(model, changes, Some(&row.raw), false);
    let identity = row.identity(model, backend);
    if assigned.is_empty() {
        return Ok(row.clone());
    }

    let mut statement = Query::update();
    statement.table(Alias::new(model.table())).values(
        assigned
            .iter()
            .map(|(column, field_type, value)| (Alias::new(column), SimpleExpr::from(to_db_value(*field_type, value, backend)))),
    );
    for predicate in &identity {
        statement.and_where(predicate.clone());
    }
    db.execute(backend.build(&statement)).await?;

    // Assignments may have changed the primary key itself.
    let mut reread = row.clone();
    for (column, _, value) in &assigned {
        reread.raw.insert(column.clone(), value.clone());
    }
    refetch(db, model, reread.identity(model, backend)).await
}

/// Deletes `row`.
///
/// # Errors
/// Database failures.
pub async fn delete(db: &DatabaseConnection, model: &Model, row: &StoredRow) -> Result<(), ApiError> {
    let backend = db.get_database_backend();
    let mut statement = Query::delete();
    statement.from_table(Alias::new(model.table()));
    for predicate in row.identity(model, backend) {
        statement.and_where(predicate);
    }
    db.execute(backend.build(&statement)).await?;
    Ok(())
}
