//! The runtime schema type: ordered, typed fields with defaults, used to validate request
//! bodies, bind query strings and project stored entities onto responses.

use crate::errors::{FieldError, ValidationErrors};
use crate::model::FieldType;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};
use std::sync::Arc;

/// Value shape of one schema field.
#[derive(Clone, Debug)]
pub enum FieldShape {
    Scalar(FieldType),
    /// A homogeneous list of scalars.
    Many(FieldType),
    Nested(Arc<Schema>),
    ManyNested(Arc<Schema>),
    /// No constraint at all.
    Any,
}

impl FieldShape {
    /// The scalar type behind this shape, if any.
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            Self::Scalar(t) | Self::Many(t) => Some(*t),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldDefault {
    Required,
    Value(Value),
}

impl FieldDefault {
    pub fn none() -> Self {
        Self::Value(Value::Null)
    }

    pub fn is_required(&self) -> bool {
        matches!(self, Self::Required)
    }

    /// The default, `None` when the field is required.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Required => None,
            Self::Value(v) => Some(v),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SchemaField {
    pub name: String,
    pub shape: FieldShape,
    pub default: FieldDefault,
}

/// `Model` schemas validate types strictly. `Record` schemas are the permissive, plain-record
/// flavour used to bind filters from a query string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaKind {
    Model,
    Record,
}

#[derive(Clone, Debug)]
pub struct Schema {
    name: String,
    kind: SchemaKind,
    fields: IndexMap<String, SchemaField>,
    orm_mode: bool,
    wrapper_key: Option<String>,
}

impl Schema {
    pub fn model(name: impl Into<String>) -> Self {
        Self::new(name, SchemaKind::Model)
    }

    pub fn record(name: impl Into<String>) -> Self {
        Self::new(name, SchemaKind::Record)
    }

    pub fn new(name: impl Into<String>, kind: SchemaKind) -> Self {
        Self {
            name: name.into(),
            kind,
            fields: IndexMap::new(),
            orm_mode: false,
            wrapper_key: None,
        }
    }

    /// Adds or replaces a field. A replaced field keeps its position.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, shape: FieldShape, default: FieldDefault) -> Self {
        self.insert(name.into(), shape, default);
        self
    }

    #[must_use]
    pub fn required(self, name: impl Into<String>, shape: FieldShape) -> Self {
        self.field(name, shape, FieldDefault::Required)
    }

    #[must_use]
    pub fn optional(self, name: impl Into<String>, shape: FieldShape) -> Self {
        self.field(name, shape, FieldDefault::none())
    }

    #[must_use]
    pub fn orm_mode(mut self, orm_mode: bool) -> Self {
        self.orm_mode = orm_mode;
        self
    }

    #[must_use]
    pub fn wrapper_key(mut self, key: impl Into<String>) -> Self {
        self.wrapper_key = Some(key.into());
        self
    }

    pub(crate) fn insert(&mut self, name: String, shape: FieldShape, default: FieldDefault) {
        self.fields.insert(
            name.clone(),
            SchemaField {
                name,
                shape,
                default,
            },
        );
    }

    pub(crate) fn rename(&mut self, name: String) {
        self.name = name;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    pub fn is_orm_mode(&self) -> bool {
        self.orm_mode
    }

    pub fn get_wrapper_key(&self) -> Option<&str> {
        self.wrapper_key.as_deref()
    }

    pub fn fields(&self) -> impl Iterator<Item = &SchemaField> {
        self.fields.values()
    }

    pub fn get_field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.get(name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Validates a JSON payload against this schema.
    ///
    /// Unknown keys are dropped. Record schemas keep present values as given.
    ///
    /// # Errors
    /// Every missing required field, type mismatch and disallowed null is reported.
    pub fn validate(&self, input: &Value) -> Result<Payload, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let payload = self.validate_at(input, "", &mut errors);
        if errors.is_empty() {
            Ok(payload)
        } else {
            Err(errors)
        }
    }

    fn validate_at(&self, input: &Value, path: &str, errors: &mut ValidationErrors) -> Payload {
        let mut payload = Payload::default();
        let Some(object) = input.as_object() else {
            errors.push(FieldError::new(root_path(path), "value is not a valid dict"));
            return payload;
        };

        for field in self.fields.values() {
            let location = join_path(path, &field.name);
            let default = field.default.value().cloned();
            match object.get(&field.name) {
                Some(Value::Null) if field.default.is_required() && self.kind == SchemaKind::Model => {
                    errors.push(FieldError::new(location, "none is not an allowed value"));
                }
                Some(Value::Null) => payload.set(&field.name, Value::Null, default),
                Some(value) if self.kind == SchemaKind::Record => {
                    payload.set(&field.name, value.clone(), default);
                }
                Some(value) => {
                    if let Some(value) = check_shape(&field.shape, value, &location, errors) {
                        payload.set(&field.name, value, default);
                    }
                }
                None => match default {
                    Some(value) => payload.fill(&field.name, value),
                    None => errors.push(FieldError::new(location, "field required")),
                },
            }
        }
        payload
    }

    /// Binds repeated `key=value` query pairs onto this schema.
    ///
    /// Scalars take the last occurrence, lists collect every occurrence. Values are coerced on
    /// a best-effort basis; a record schema never rejects.
    ///
    /// # Errors
    /// Only `Model` schemas can fail, with the same report as [`Schema::validate`].
    pub fn bind_query(&self, pairs: &[(String, String)]) -> Result<Payload, ValidationErrors> {
        let mut object = Map::new();
        for field in self.fields.values() {
            let raw: Vec<&str> = pairs
                .iter()
                .filter(|(key, _)| *key == field.name)
                .map(|(_, value)| value.as_str())
                .collect();
            let Some(last) = raw.last() else { continue };

            let value = match &field.shape {
                FieldShape::Many(t) => Value::Array(raw.iter().map(|s| coerce(*t, s)).collect()),
                FieldShape::Scalar(t) => coerce(*t, last),
                _ => Value::String((*last).to_string()),
            };
            object.insert(field.name.clone(), value);
        }
        self.validate(&Value::Object(object))
    }

    /// Projects an entity onto this schema: declared fields only, missing ones filled from
    /// their defaults (or null).
    pub fn project(&self, entity: &Value) -> Value {
        let Some(object) = entity.as_object() else {
            return entity.clone();
        };
        let projected = self
            .fields
            .values()
            .map(|field| {
                let value = match object.get(&field.name) {
                    Some(value) => project_shape(&field.shape, value),
                    None => field.default.value().cloned().unwrap_or(Value::Null),
                };
                (field.name.clone(), value)
            })
            .collect();
        Value::Object(projected)
    }
}

fn root_path(path: &str) -> String {
    if path.is_empty() {
        "__root__".to_string()
    } else {
        path.to_string()
    }
}

fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

fn project_shape(shape: &FieldShape, value: &Value) -> Value {
    match (shape, value) {
        (FieldShape::Nested(schema), _) => schema.project(value),
        (FieldShape::ManyNested(schema), Value::Array(items)) => {
            Value::Array(items.iter().map(|item| schema.project(item)).collect())
        }
        _ => value.clone(),
    }
}

fn check_shape(
    shape: &FieldShape,
    value: &Value,
    location: &str,
    errors: &mut ValidationErrors,
) -> Option<Value> {
    match shape {
        FieldShape::Any => Some(value.clone()),
        FieldShape::Scalar(t) => match check_scalar(*t, value) {
            Ok(()) => Some(value.clone()),
            Err(message) => {
                errors.push(FieldError::new(location, message));
                None
            }
        },
        FieldShape::Many(t) => {
            let Some(items) = value.as_array() else {
                errors.push(FieldError::new(location, "value is not a valid list"));
                return None;
            };
            let before = errors.0.len();
            for (index, item) in items.iter().enumerate() {
                if let Err(message) = check_scalar(*t, item) {
                    errors.push(FieldError::new(format!("{location}.{index}"), message));
                }
            }
            (errors.0.len() == before).then(|| value.clone())
        }
        FieldShape::Nested(schema) => {
            let before = errors.0.len();
            let payload = schema.validate_at(value, location, errors);
            (errors.0.len() == before).then(|| payload.into_value())
        }
        FieldShape::ManyNested(schema) => {
            let Some(items) = value.as_array() else {
                errors.push(FieldError::new(location, "value is not a valid list"));
                return None;
            };
            let before = errors.0.len();
            let validated: Vec<Value> = items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    schema
                        .validate_at(item, &format!("{location}.{index}"), errors)
                        .into_value()
                })
                .collect();
            (errors.0.len() == before).then_some(Value::Array(validated))
        }
    }
}

fn check_scalar(field_type: FieldType, value: &Value) -> Result<(), &'static str> {
    let valid = match field_type {
        FieldType::Integer => value.is_i64() || value.is_u64(),
        FieldType::Float => value.is_number(),
        FieldType::String => value.is_string(),
        FieldType::Boolean => value.is_boolean(),
        FieldType::DateTime => value.as_str().is_some_and(is_datetime),
        FieldType::Date => value
            .as_str()
            .is_some_and(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()),
        FieldType::Uuid => value.as_str().is_some_and(|s| uuid::Uuid::parse_str(s).is_ok()),
        FieldType::Object => value.is_object(),
        FieldType::List => value.is_array(),
    };
    if valid {
        Ok(())
    } else {
        Err(match field_type {
            FieldType::Integer => "value is not a valid integer",
            FieldType::Float => "value is not a valid float",
            FieldType::String => "str type expected",
            FieldType::Boolean => "value could not be parsed to a boolean",
            FieldType::DateTime => "invalid datetime format",
            FieldType::Date => "invalid date format",
            FieldType::Uuid => "value is not a valid uuid",
            FieldType::Object => "value is not a valid dict",
            FieldType::List => "value is not a valid list",
        })
    }
}

pub(crate) fn is_datetime(s: &str) -> bool {
    parse_datetime(s).is_some()
}

/// Accepts RFC 3339 and naive `YYYY-MM-DD[T ]HH:MM:SS[.f]` timestamps.
pub(crate) fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
}

fn coerce(field_type: FieldType, raw: &str) -> Value {
    match field_type {
        FieldType::Integer => raw
            .parse::<i64>()
            .map_or_else(|_| Value::String(raw.to_string()), Value::from),
        FieldType::Float => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map_or_else(|| Value::String(raw.to_string()), Value::Number),
        FieldType::Boolean => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Value::Bool(true),
            "false" | "0" | "no" | "off" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        _ => Value::String(raw.to_string()),
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Entry {
    value: Value,
    set: bool,
    default: Option<Value>,
}

/// A validated payload. Remembers which fields were present in the input.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Payload {
    entries: IndexMap<String, Entry>,
}

impl Payload {
    fn set(&mut self, name: &str, value: Value, default: Option<Value>) {
        self.entries.insert(
            name.to_string(),
            Entry {
                value,
                set: true,
                default,
            },
        );
    }

    fn fill(&mut self, name: &str, default: Value) {
        self.entries.insert(
            name.to_string(),
            Entry {
                value: default.clone(),
                set: false,
                default: Some(default),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name).map(|e| &e.value)
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(|e| e.set)
    }

    /// Every field, defaults included.
    pub fn dict(&self) -> Map<String, Value> {
        self.collect(|_| true)
    }

    /// Only the fields present in the input.
    pub fn dict_exclude_unset(&self) -> Map<String, Value> {
        self.collect(|e| e.set)
    }

    /// Only the fields whose value differs from the field default.
    pub fn dict_exclude_defaults(&self) -> Map<String, Value> {
        self.collect(|e| e.default.as_ref() != Some(&e.value))
    }

    /// Fields carrying a value other than their default, as used for filtering.
    pub fn populated(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .filter(|(_, e)| e.default.as_ref() != Some(&e.value))
            .map(|(name, e)| (name.as_str(), &e.value))
    }

    pub fn into_value(self) -> Value {
        Value::Object(
            self.entries
                .into_iter()
                .map(|(name, e)| (name, e.value))
                .collect(),
        )
    }

    fn collect(&self, keep: impl Fn(&Entry) -> bool) -> Map<String, Value> {
        self.entries
            .iter()
            .filter(|(_, e)| keep(e))
            .map(|(name, e)| (name.clone(), e.value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pagination() -> Arc<Schema> {
        Arc::new(
            Schema::model("PaginationSchema")
                .required("offset", FieldShape::Scalar(FieldType::Integer))
                .required("total", FieldShape::Scalar(FieldType::Integer)),
        )
    }

    fn user() -> Schema {
        Schema::model("UserSchema")
            .required("required", FieldShape::Scalar(FieldType::String))
            .field(
                "age",
                FieldShape::Scalar(FieldType::Integer),
                FieldDefault::Value(json!(18)),
            )
            .optional("email_list", FieldShape::Many(FieldType::String))
            .optional("birthday", FieldShape::Scalar(FieldType::DateTime))
    }

    #[test]
    fn test_strict_types() {
        let errors = user()
            .validate(&json!({"required": "x", "age": "30", "email_list": ["a", 1]}))
            .unwrap_err();
        assert!(errors.contains("age"));
        assert!(errors.contains("email_list.1"));
        assert!(!errors.contains("required"));
    }

    #[test]
    fn test_missing_required_and_null_required() {
        let errors = user().validate(&json!({})).unwrap_err();
        assert_eq!(errors.0, vec![FieldError::new("required", "field required")]);

        let errors = user().validate(&json!({"required": null})).unwrap_err();
        assert_eq!(errors.0[0].message, "none is not an allowed value");
    }

    #[test]
    fn test_unknown_keys_are_dropped() {
        let payload = user().validate(&json!({"required": "x", "hello": 1})).unwrap();
        assert!(payload.get("hello").is_none());
        assert_eq!(payload.get("age"), Some(&json!(18)));
    }

    #[test]
    fn test_set_and_default_tracking() {
        let payload = user()
            .validate(&json!({"required": "x", "age": 18, "birthday": "2000-01-01T00:00:00"}))
            .unwrap();
        let unset = payload.dict_exclude_unset();
        assert_eq!(unset.len(), 3);
        assert!(unset.contains_key("age"));

        let non_default = payload.dict_exclude_defaults();
        assert!(!non_default.contains_key("age"));
        assert!(!non_default.contains_key("email_list"));
        assert!(non_default.contains_key("birthday"));
        assert_eq!(payload.dict().len(), 4);
    }

    #[test]
    fn test_nested_errors_carry_paths() {
        let schema = Schema::model("ListSchema").required("pagination", FieldShape::Nested(pagination()));
        let errors = schema
            .validate(&json!({"pagination": {"offset": 0, "total": "many"}}))
            .unwrap_err();
        assert!(errors.contains("pagination.total"));
    }

    #[test]
    fn test_bind_query_collects_lists_and_coerces() {
        let schema = Schema::record("UserFilterSchema")
            .optional("id", FieldShape::Many(FieldType::Integer))
            .optional("age__le", FieldShape::Scalar(FieldType::Integer))
            .optional("nickname", FieldShape::Scalar(FieldType::String));
        let pairs = vec![
            ("id".to_string(), "1".to_string()),
            ("id".to_string(), "2".to_string()),
            ("age__le".to_string(), "30".to_string()),
            ("ignore_me".to_string(), "true".to_string()),
        ];
        let payload = schema.bind_query(&pairs).unwrap();
        let populated: Vec<(&str, &Value)> = payload.populated().collect();
        assert_eq!(
            populated,
            vec![("id", &json!([1, 2])), ("age__le", &json!(30))]
        );
    }

    #[test]
    fn test_record_keeps_uncoercible_values() {
        let schema = Schema::record("F").optional("age", FieldShape::Scalar(FieldType::Integer));
        let payload = schema
            .bind_query(&[("age".to_string(), "old".to_string())])
            .unwrap();
        assert_eq!(payload.get("age"), Some(&json!("old")));
    }

    #[test]
    fn test_project_fills_defaults_and_drops_extras() {
        let schema = Schema::model("Out")
            .required("id", FieldShape::Scalar(FieldType::Integer))
            .field("age", FieldShape::Scalar(FieldType::Integer), FieldDefault::Value(json!(18)))
            .optional("realname", FieldShape::Scalar(FieldType::String));
        let projected = schema.project(&json!({"id": 1, "props": {}, "realname": "Alex"}));
        assert_eq!(projected, json!({"id": 1, "age": 18, "realname": "Alex"}));
    }

    #[test]
    fn test_datetime_formats() {
        assert!(is_datetime("2020-01-01T10:00:00"));
        assert!(is_datetime("2020-01-01 10:00:00.123"));
        assert!(is_datetime("2020-01-01T10:00:00+02:00"));
        assert!(!is_datetime("yesterday"));
    }
}
