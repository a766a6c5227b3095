//! Conversions between JSON values and database values.

use crate::model::{Column, FieldType, Model};
use crate::schema::types::parse_datetime;
use sea_orm::{DatabaseBackend, Value as DbValue};
use serde_json::{Map, Value};

/// Binds a JSON value as a parameter for a field of `field_type`.
///
/// JSON documents are bound natively on PostgreSQL and as text elsewhere. Timestamps and
/// UUIDs are parsed for PostgreSQL, which does not compare them against text.
pub fn to_db_value(field_type: FieldType, value: &Value, backend: DatabaseBackend) -> DbValue {
    match value {
        Value::Null => null_of(field_type, backend),
        Value::Bool(b) => DbValue::from(*b),
        Value::Number(n) if field_type == FieldType::Float || !(n.is_i64() || n.is_u64()) => {
            DbValue::from(n.as_f64().unwrap_or_default())
        }
        Value::Number(n) => n
            .as_i64()
            .map_or_else(|| DbValue::from(n.as_f64().unwrap_or_default()), DbValue::from),
        Value::String(s) if backend == DatabaseBackend::Postgres => match field_type {
            FieldType::DateTime => parse_datetime(s).map_or_else(|| DbValue::from(s.clone()), DbValue::from),
            FieldType::Uuid => uuid::Uuid::parse_str(s).map_or_else(|_| DbValue::from(s.clone()), DbValue::from),
            _ => DbValue::from(s.clone()),
        },
        Value::String(s) => DbValue::from(s.clone()),
        Value::Array(_) | Value::Object(_) => json_document(value, backend),
    }
}

fn json_document(value: &Value, backend: DatabaseBackend) -> DbValue {
    if backend == DatabaseBackend::Postgres {
        DbValue::from(value.clone())
    } else {
        DbValue::from(value.to_string())
    }
}

fn null_of(field_type: FieldType, backend: DatabaseBackend) -> DbValue {
    match field_type {
        FieldType::Integer => DbValue::BigInt(None),
        FieldType::Float => DbValue::Double(None),
        FieldType::Boolean => DbValue::Bool(None),
        FieldType::Object | FieldType::List if backend == DatabaseBackend::Postgres => DbValue::Json(None),
        _ => DbValue::String(None),
    }
}

/// Normalizes a raw row as returned by the driver: JSON stored as text is parsed and SQLite's
/// integer booleans become booleans.
pub fn decode_row(model: &Model, mut row: Map<String, Value>) -> Map<String, Value> {
    for column in model.columns() {
        let Some(value) = row.get_mut(column.storage_name()) else {
            continue;
        };
        match (column.field_type(), &*value) {
            (FieldType::Object | FieldType::List, Value::String(text)) => {
                if let Ok(parsed) = serde_json::from_str(text) {
                    *value = parsed;
                }
            }
            (FieldType::Boolean, Value::Number(n)) => {
                *value = Value::Bool(n.as_i64().is_some_and(|i| i != 0));
            }
            _ => {}
        }
    }
    row
}

/// Turns a decoded row into the entity seen by schemas: attribute names instead of storage
/// names, properties lifted out of their JSON column.
pub fn row_to_entity(model: &Model, row: &Map<String, Value>) -> Value {
    let mut entity = Map::new();
    for column in model.columns() {
        if model.is_storage_column(column) {
            continue;
        }
        let value = row.get(column.storage_name()).cloned().unwrap_or(Value::Null);
        entity.insert(column.name().to_string(), value);
    }
    for property in model.properties() {
        let storage = model
            .storage_of(property)
            .map_or(property.storage_column(), Column::storage_name);
        let value = row
            .get(storage)
            .and_then(|document| document.get(property.name()))
            .cloned()
            .unwrap_or(Value::Null);
        entity.insert(property.name().to_string(), value);
    }
    Value::Object(entity)
}

/// Column assignments for an insert or update, keyed by storage name.
///
/// `values` is keyed by attribute name. Properties are merged into `document` (the current
/// content of their storage column, empty on insert). With `apply_defaults`, missing or null
/// fields take their client-side default.
pub fn assignments(
    model: &Model,
    values: &Map<String, Value>,
    current: Option<&Map<String, Value>>,
    apply_defaults: bool,
) -> Vec<(String, FieldType, Value)> {
    let mut out = Vec::new();

    for column in model.columns() {
        if model.is_storage_column(column) {
            continue;
        }
        let value = match values.get(column.name()) {
            Some(Value::Null) | None if apply_defaults => column.default_value().map(|d| d.resolve()),
            None => None,
            Some(value) => Some(value.clone()),
        };
        if let Some(value) = value {
            out.push((column.storage_name().to_string(), column.field_type(), value));
        }
    }

    let mut documents: Vec<(&Column, Map<String, Value>)> = Vec::new();
    for property in model.properties() {
        let value = match values.get(property.name()) {
            Some(Value::Null) | None if apply_defaults => property.default_value().map(|d| d.resolve()),
            None => None,
            Some(value) => Some(value.clone()),
        };
        let (Some(value), Some(storage)) = (value, model.storage_of(property)) else {
            continue;
        };
        let index = match documents.iter().position(|(c, _)| c.name() == storage.name()) {
            Some(index) => index,
            None => {
                let existing = current
                    .and_then(|row| row.get(storage.storage_name()))
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                documents.push((storage, existing));
                documents.len() - 1
            }
        };
        documents[index].1.insert(property.name().to_string(), value);
    }
    for (storage, document) in documents {
        out.push((
            storage.storage_name().to_string(),
            FieldType::Object,
            Value::Object(document),
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Property, PropertyKind};
    use sea_orm::ColumnType;
    use serde_json::json;

    fn model() -> Model {
        Model::new("User", "users")
            .column(Column::new("id", ColumnType::BigInteger).primary_key())
            .column(Column::new("nickname", ColumnType::Text).db_name("name").default("anon"))
            .column(Column::new("active", ColumnType::Boolean))
            .column(Column::new("profile", ColumnType::JsonBinary).db_name("props"))
            .property(Property::new("age", PropertyKind::Integer).default(18))
            .property(Property::new("realname", PropertyKind::String))
    }

    #[test]
    fn test_decode_and_lift_properties() {
        let model = model();
        let raw = json!({"id": 1, "name": "Alex", "active": 1, "props": "{\"age\": 30}"});
        let row = decode_row(&model, raw.as_object().unwrap().clone());
        let entity = row_to_entity(&model, &row);
        assert_eq!(
            entity,
            json!({"id": 1, "nickname": "Alex", "active": true, "age": 30, "realname": null})
        );
    }

    #[test]
    fn test_insert_assignments_apply_defaults() {
        let model = model();
        let values = json!({"realname": "Alex", "nickname": null});
        let out = assignments(&model, values.as_object().unwrap(), None, true);
        assert_eq!(
            out,
            vec![
                ("name".to_string(), FieldType::String, json!("anon")),
                ("props".to_string(), FieldType::Object, json!({"age": 18, "realname": "Alex"})),
            ]
        );
    }

    #[test]
    fn test_update_merges_into_current_document() {
        let model = model();
        let current = json!({"id": 1, "props": {"age": 30, "realname": "Alex"}});
        let values = json!({"age": 31});
        let out = assignments(
            &model,
            values.as_object().unwrap(),
            current.as_object(),
            false,
        );
        assert_eq!(
            out,
            vec![("props".to_string(), FieldType::Object, json!({"age": 31, "realname": "Alex"}))]
        );
    }

    #[test]
    fn test_to_db_value_per_backend() {
        let doc = json!(["a"]);
        assert_eq!(
            to_db_value(FieldType::List, &doc, DatabaseBackend::Sqlite),
            DbValue::from("[\"a\"]".to_string())
        );
        assert_eq!(
            to_db_value(FieldType::Integer, &json!(3), DatabaseBackend::Sqlite),
            DbValue::from(3_i64)
        );
        assert_eq!(
            to_db_value(FieldType::Float, &json!(3), DatabaseBackend::Sqlite),
            DbValue::from(3.0_f64)
        );
    }
}
