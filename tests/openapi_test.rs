use serde_json::Value;
use viewcrate::{Capability, MainRouter, RouteOptions, ViewSet};

mod common;
use common::{factory, team_model, user_model};

fn document() -> Value {
    let users = ViewSet::viewset(user_model())
        .schema_factory(factory())
        .params(
            Capability::Create,
            RouteOptions {
                summary: Some("Register a user".to_string()),
                operation_id: Some("create_user".to_string()),
                ..RouteOptions::default()
            },
        )
        .build()
        .unwrap();
    let teams = ViewSet::read_only(team_model())
        .schema_factory(factory())
        .build()
        .unwrap();
    let router = MainRouter::new().add_view("", users).add_view("/teams", teams);
    serde_json::to_value(router.openapi("Viewsets", "1.0.0")).unwrap()
}

#[test]
fn test_paths_and_methods() {
    let doc = document();
    assert_eq!(doc["info"]["title"], "Viewsets");

    let collection = &doc["paths"]["/user"];
    assert!(collection["get"].is_object());
    assert!(collection["post"].is_object());
    assert!(collection["put"].is_null());

    let item = &doc["paths"]["/user/{id}"];
    for method in ["get", "put", "patch", "delete"] {
        assert!(item[method].is_object(), "{method}");
    }
    assert!(doc["paths"]["/teams/{id}"]["get"].is_object());
    assert!(doc["paths"]["/teams"]["post"].is_null());
}

#[test]
fn test_operation_details() {
    let doc = document();
    let create = &doc["paths"]["/user"]["post"];
    assert_eq!(create["summary"], "Register a user");
    assert_eq!(create["operationId"], "create_user");
    assert_eq!(create["tags"][0], "user");
    assert_eq!(
        create["requestBody"]["content"]["application/json"]["schema"]["$ref"],
        "#/components/schemas/UserInputSchema"
    );
    assert_eq!(
        create["responses"]["201"]["content"]["application/json"]["schema"]["$ref"],
        "#/components/schemas/UserOutputSchema"
    );

    let retrieve = &doc["paths"]["/user/{id}"]["get"];
    assert_eq!(retrieve["parameters"][0]["name"], "id");
    assert_eq!(retrieve["parameters"][0]["in"], "path");
    assert_eq!(retrieve["parameters"][0]["schema"]["type"], "integer");
    assert_eq!(doc["paths"]["/teams/{id}"]["get"]["tags"][0], "teams");

    let list = &doc["paths"]["/user"]["get"];
    let query: Vec<&str> = list["parameters"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert!(query.contains(&"age__le"));
    assert!(query.contains(&"email_list"));
    assert!(!query.contains(&"age"));
}

#[test]
fn test_components() {
    let doc = document();
    let schemas = doc["components"]["schemas"].as_object().unwrap();
    for name in [
        "UserInputSchema",
        "UserOutputSchema",
        "UserPutSchema",
        "UserPatchSchema",
        "UserListSchema",
        "UserDeleteSchema",
        "PaginationSchema",
        "TeamOutputSchema",
        "TeamListSchema",
    ] {
        assert!(schemas.contains_key(name), "{name}");
    }

    let input = &schemas["UserInputSchema"];
    assert_eq!(input["required"], serde_json::json!(["required"]));
    assert_eq!(input["properties"]["email_list"]["type"], "array");
    assert_eq!(
        schemas["UserListSchema"]["properties"]["data"]["items"]["$ref"],
        "#/components/schemas/UserOutputSchema"
    );
}
