use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;
use viewcrate::filtering::Operator;
use viewcrate::schema::{
    FieldMethods, FieldShape, SchemaKind, WrapperSchema, base_model_schema, paginated_list_schema,
};
use viewcrate::{ConfigError, FieldType, Meta, Schema, SchemaBuilder};

mod common;
use common::{factory, user_model};

fn test_dict() -> Value {
    json!({
        "id": 1,
        "realname": "John",
        "birthday": "2024-03-01T10:20:30",
        "team_id": 4,
        "nickname": "JonSnow",
        "type": "USER",
        "required": "test_string",
        "email_list": ["user@gmail.com", "user@yahoo.com"],
    })
}

fn only(keys: &[&str]) -> Value {
    let dict = test_dict();
    Value::Object(
        keys.iter()
            .map(|k| ((*k).to_string(), dict[*k].clone()))
            .collect(),
    )
}

fn field_set(schema: &Schema) -> BTreeSet<String> {
    schema.field_names().into_iter().map(str::to_string).collect()
}

fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn synthesize(meta: Meta) -> Arc<Schema> {
    SchemaBuilder::new("UserSchema")
        .base(base_model_schema())
        .meta(meta)
        .build()
        .unwrap()
}

#[test]
fn test_field_algebra() {
    let model = user_model();
    let all = names(&[
        "id", "required", "nickname", "team_id", "type", "realname", "age", "birthday", "email_list",
    ]);
    let cases = [
        (Meta::new(model.clone()), all.clone()),
        (
            Meta::new(model.clone()).exclude(["id", "required"]),
            names(&["nickname", "team_id", "type", "realname", "age", "birthday", "email_list"]),
        ),
        (
            Meta::new(model.clone()).fields(vec!["id", "required", "realname"]),
            names(&["id", "required", "realname"]),
        ),
        (
            Meta::new(model.clone()).use_db_names(true).fields(vec!["name"]),
            names(&["name"]),
        ),
        (
            Meta::new(model.clone())
                .field_methods(FieldMethods::Default)
                .fields(vec!["age"]),
            names(&["age__le", "age__ge"]),
        ),
        (
            Meta::new(model.clone())
                .field_methods_by_name([("id", vec![Operator::Le, Operator::Ge, Operator::Lt, Operator::Gt])])
                .fields(vec!["id"]),
            names(&["id__le", "id__ge", "id__lt", "id__gt"]),
        ),
        (
            Meta::new(model.clone())
                .field_methods(FieldMethods::Default)
                .field_methods_by_name([("id", vec![Operator::Ne])])
                .fields(vec!["id", "age"]),
            names(&["id__ne", "age"]),
        ),
        (Meta::new(model.clone()).fields(Vec::<String>::new()), BTreeSet::new()),
    ];
    for (meta, expected) in cases {
        assert_eq!(field_set(&synthesize(meta)), expected);
    }
}

#[test]
fn test_required_fields() {
    let model = user_model();
    let required = |schema: &Schema| -> BTreeSet<String> {
        schema
            .fields()
            .filter(|f| f.default.is_required())
            .map(|f| f.name.clone())
            .collect()
    };

    assert_eq!(required(&synthesize(Meta::new(model.clone()))), names(&["id", "required"]));
    assert!(required(&synthesize(Meta::new(model.clone()).required(Vec::<String>::new()))).is_empty());
    assert_eq!(
        required(&synthesize(
            Meta::new(model.clone()).required(["nickname", "realname", "required"])
        )),
        names(&["nickname", "realname", "required"])
    );
}

#[test]
fn test_db_names() {
    let schema = synthesize(Meta::new(user_model()).use_db_names(true));
    assert!(schema.get_field("name").is_some());
    assert!(schema.get_field("nickname").is_none());

    let schema = synthesize(Meta::new(user_model()));
    assert!(schema.get_field("nickname").is_some());
}

#[test]
fn test_list_fields() {
    let schema = synthesize(
        Meta::new(user_model())
            .list_pk(true)
            .as_list_fields(["nickname"]),
    );
    for name in ["id", "team_id", "nickname", "email_list"] {
        let field = schema.get_field(name).unwrap();
        assert!(matches!(field.shape, FieldShape::Many(_)), "{name}");
        assert!(!field.default.is_required(), "{name}");
    }
    assert!(matches!(
        schema.get_field("id").unwrap().shape,
        FieldShape::Many(FieldType::Integer)
    ));
}

#[test]
fn test_list_pk_validation() {
    let schema = synthesize(Meta::new(user_model()).list_pk(true));
    let with = |field: &str, value: Value| json!({"required": "r", field: value});

    assert!(schema.validate(&with("id", json!([1, 2, 3]))).is_ok());
    assert!(schema.validate(&with("team_id", json!([4]))).is_ok());
    for (field, value, location) in [
        ("id", json!("1"), "id"),
        ("id", json!(1), "id"),
        ("id", json!(["1", "2", "3"]), "id.0"),
        ("id", json!([1, "2"]), "id.1"),
        ("team_id", json!(["1", "2", "3"]), "team_id.0"),
    ] {
        let errors = schema.validate(&with(field, value.clone())).unwrap_err();
        assert!(errors.contains(location), "{field}={value}: {errors}");
    }
}

#[test]
fn test_as_list_fields_validation() {
    let schema = synthesize(Meta::new(user_model()).as_list_fields(["nickname", "age"]));
    let payload = schema
        .validate(&json!({"id": 1, "required": "r", "nickname": ["a", "b"], "age": [10, 20]}))
        .unwrap();
    assert_eq!(payload.get("age"), Some(&json!([10, 20])));

    for data in [
        json!({"id": 1, "required": "r", "nickname": "a"}),
        json!({"id": 1, "required": "r", "nickname": ["a", 2]}),
        json!({"id": 1, "required": "r", "age": ["10", "20"]}),
    ] {
        assert!(schema.validate(&data).is_err(), "{data}");
    }
}

#[test]
fn test_dataclass_schema_puts_required_first() {
    let schema = SchemaBuilder::new("UserRecord")
        .meta(Meta::new(user_model()).as_dataclass(true).fields(vec!["nickname", "required", "id"]))
        .build()
        .unwrap();
    assert_eq!(schema.kind(), SchemaKind::Record);
    assert_eq!(schema.field_names(), ["id", "required", "nickname"]);
}

#[test]
fn test_extra_fields_and_base_inheritance() {
    let base = Arc::new(
        Schema::model("Stamped")
            .optional("hello", FieldShape::Scalar(FieldType::String))
            .orm_mode(true),
    );
    let schema = SchemaBuilder::new("UserSchema")
        .base(base)
        .meta(Meta::new(user_model()).fields(vec!["id"]))
        .field_with_default("source", FieldShape::Scalar(FieldType::String), json!("api"))
        .optional_field("note", FieldShape::Scalar(FieldType::String))
        .build()
        .unwrap();
    assert_eq!(schema.field_names(), ["hello", "id", "source", "note"]);
    assert!(!schema.get_field("note").unwrap().default.is_required());
    assert!(schema.is_orm_mode());

    let payload = schema.validate(&json!({"id": 3})).unwrap();
    assert_eq!(payload.get("source"), Some(&json!("api")));
    assert!(!payload.is_set("source"));
}

#[test]
fn test_configuration_errors() {
    let err = SchemaBuilder::new("UserSchema")
        .meta(Meta::new(user_model()).fields("id"))
        .build()
        .unwrap_err();
    assert!(matches!(err, ConfigError::FieldsIsString { .. }));

    let err = SchemaBuilder::new("Orphan").meta(Meta::default()).build().unwrap_err();
    assert_eq!(
        err,
        ConfigError::MissingModel {
            schema: "Orphan".to_string()
        }
    );
}

#[test]
fn test_input_schema() {
    let factory = factory();
    let model = user_model();
    let input = factory.input_schema(&model, &base_model_schema(), None).unwrap();
    assert_eq!(input.name(), "UserInputSchema");
    assert!(input.get_field("id").is_none());

    let payload = input.validate(&test_dict()).unwrap();
    let mut expected = test_dict();
    expected.as_object_mut().unwrap().remove("id");
    assert_eq!(Value::Object(payload.dict_exclude_unset()), expected);

    let payload = input.validate(&only(&["required"])).unwrap();
    assert_eq!(Value::Object(payload.dict_exclude_unset()), only(&["required"]));

    let errors = input.validate(&only(&["realname"])).unwrap_err();
    assert!(errors.contains("required"));
}

#[test]
fn test_output_schema() {
    let factory = factory();
    let output = factory.output_schema(&user_model(), &base_model_schema(), None).unwrap();
    assert_eq!(output.name(), "UserOutputSchema");
    assert!(output.is_orm_mode());

    assert!(output.validate(&test_dict()).is_ok());
    assert!(output.validate(&only(&["id", "required"])).is_ok());
    for data in [only(&["realname"]), only(&["required"]), only(&["id"])] {
        assert!(output.validate(&data).is_err(), "{data}");
    }
}

#[test]
fn test_patch_schema_requires_nothing() {
    let factory = factory();
    let patch = factory.patch_schema(&user_model(), &base_model_schema(), None).unwrap();
    assert_eq!(patch.name(), "UserPatchSchema");
    assert!(patch.fields().all(|f| !f.default.is_required()));
    assert!(patch.get_field("id").is_none());

    let payload = patch.validate(&json!({})).unwrap();
    assert!(payload.dict_exclude_unset().is_empty());

    let payload = patch.validate(&json!({"age": 40, "nickname": null})).unwrap();
    assert_eq!(
        Value::Object(payload.dict_exclude_unset()),
        json!({"nickname": null, "age": 40})
    );
}

#[test]
fn test_put_schema_keeps_requiredness() {
    let put = factory().put_schema(&user_model(), &base_model_schema(), None).unwrap();
    assert_eq!(put.name(), "UserPutSchema");
    assert!(put.get_field("required").unwrap().default.is_required());
    assert!(put.get_field("id").is_none());
}

#[test]
fn test_filter_schema() {
    let filter = factory().filter_schema(&user_model(), None).unwrap();
    assert_eq!(filter.name(), "UserFilterSchema");
    assert_eq!(filter.kind(), SchemaKind::Record);
    assert!(filter.get_field("age").is_none());
    assert!(filter.get_field("age__le").is_some());
    assert!(matches!(
        filter.get_field("id").unwrap().shape,
        FieldShape::Many(FieldType::Integer)
    ));

    let pairs = vec![
        ("id".to_string(), "1".to_string()),
        ("id".to_string(), "2".to_string()),
        ("age__le".to_string(), "30".to_string()),
    ];
    let bound = filter.bind_query(&pairs).unwrap();
    let populated: Vec<_> = bound.populated().map(|(k, v)| (k.to_string(), v.clone())).collect();
    assert_eq!(
        populated,
        vec![
            ("id".to_string(), json!([1, 2])),
            ("age__le".to_string(), json!(30)),
        ]
    );
}

#[test]
fn test_names_are_unique_per_registry() {
    let factory = factory();
    let model = user_model();
    let base = base_model_schema();
    let first = factory.input_schema(&model, &base, None).unwrap();
    let second = factory.input_schema(&model, &base, None).unwrap();
    let named = factory.input_schema(&model, &base, Some("CustomInput")).unwrap();
    assert_eq!(first.name(), "UserInputSchema");
    assert_eq!(second.name(), "UserInputSchema1");
    assert_eq!(named.name(), "CustomInput");
}

#[test]
fn test_list_and_wrapped_schemas() {
    let factory = factory();
    let model = user_model();
    let output = factory.output_schema(&model, &base_model_schema(), None).unwrap();
    let list = factory.list_schema(&model, &output, &paginated_list_schema(), None);
    assert_eq!(list.name(), "UserListSchema");
    assert!(matches!(list.get_field("data").unwrap().shape, FieldShape::ManyNested(_)));

    let wrapped = factory.wrap_schema(&output, &WrapperSchema::default());
    assert_eq!(wrapped.name(), "WrappedUserOutputSchema");
    assert_eq!(wrapped.get_wrapper_key(), Some("data"));

    let entity = json!({"data": {"id": 1, "required": "r", "secret": "x"}});
    let projected = wrapped.project(&entity);
    assert_eq!(projected["data"]["id"], 1);
    assert!(projected["data"].get("secret").is_none());
    assert_eq!(projected["data"]["age"], Value::Null);
}

#[test]
fn test_delete_schema() {
    let factory = factory();
    let model = user_model();
    let plain = factory.delete_schema(&model, "id", FieldType::Integer, None);
    assert_eq!(plain.name(), "UserDeleteSchema");
    assert_eq!(plain.field_names(), ["id"]);

    let wrapped = factory.delete_schema(&model, "id", FieldType::Integer, Some(&WrapperSchema::new("result")));
    assert_eq!(wrapped.field_names(), ["result"]);
}
