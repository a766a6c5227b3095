#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use sea_orm::sea_query::{Alias, ColumnType, IntoIden};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use viewcrate::model::{Column, Model, Property, PropertyKind};
use viewcrate::schema::{NameRegistry, SchemaFactory};

fn random_name() -> Value {
    let id = uuid::Uuid::new_v4().simple().to_string();
    Value::String(id[..8].to_string())
}

pub fn team_model() -> Arc<Model> {
    Arc::new(
        Model::new("Team", "teams")
            .column(Column::new("id", ColumnType::BigInteger).primary_key())
            .column(Column::new("name", ColumnType::Text).default_with(random_name)),
    )
}

/// `users`: plain columns, a renamed column (`nickname` stored as `name`), an enum and
/// JSON-backed properties kept in `props`.
pub fn user_model() -> Arc<Model> {
    Arc::new(
        Model::new("User", "users")
            .column(Column::new("id", ColumnType::BigInteger).primary_key())
            .column(Column::new("required", ColumnType::Text).not_null())
            .column(
                Column::new("nickname", ColumnType::Text)
                    .db_name("name")
                    .default_with(random_name),
            )
            .column(Column::new("team_id", ColumnType::BigInteger).foreign_key("teams.id"))
            .column(
                Column::new("profile", ColumnType::JsonBinary)
                    .db_name("props")
                    .not_null()
                    .server_default("'{}'"),
            )
            .column(
                Column::new(
                    "type",
                    ColumnType::Enum {
                        name: Alias::new("usertype").into_iden(),
                        variants: vec![Alias::new("USER").into_iden(), Alias::new("ADMIN").into_iden()],
                    },
                )
                .not_null()
                .default("USER"),
            )
            .property(Property::new("realname", PropertyKind::String))
            .property(Property::new("age", PropertyKind::Integer).default(18))
            .property(Property::new("birthday", PropertyKind::DateTime))
            .property(Property::new("email_list", PropertyKind::Array)),
    )
}

/// A schema factory with its own registry, so names do not depend on test order.
pub fn factory() -> SchemaFactory {
    SchemaFactory::new(Arc::new(NameRegistry::new()))
}

pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect("sqlite::memory:").await?;

    db.execute_unprepared(
        "CREATE TABLE teams (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT
        )",
    )
    .await?;
    db.execute_unprepared(
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            required TEXT NOT NULL,
            name TEXT,
            team_id INTEGER REFERENCES teams (id),
            props TEXT NOT NULL DEFAULT '{}',
            type TEXT NOT NULL DEFAULT 'USER'
        )",
    )
    .await?;

    Ok(db)
}

/// One team and five users: ids 1..=5, ages 10..=50, nicknames `Alex1`..`Alex5`, types
/// alternating ADMIN and USER.
pub async fn create_users(db: &DatabaseConnection) -> Result<Vec<Value>, viewcrate::ApiError> {
    let team = viewcrate::store::insert(db, &team_model(), &Map::new()).await?;
    let team_id = team.entity(&team_model())["id"].clone();

    let users = user_model();
    let mut created = Vec::new();
    for n in 1..=5 {
        let values = json!({
            "team_id": team_id,
            "required": format!("required{n}"),
            "nickname": format!("Alex{n}"),
            "type": if n % 2 == 1 { "ADMIN" } else { "USER" },
            "realname": format!("Real{n}"),
            "age": n * 10,
            "email_list": [format!("user{n}@gmail.com"), format!("user{n}@yahoo.com")],
        });
        let Value::Object(values) = values else {
            unreachable!()
        };
        let row = viewcrate::store::insert(db, &users, &values).await?;
        created.push(row.entity(&users));
    }
    Ok(created)
}

pub fn test_data() -> Value {
    json!({
        "age": 18,
        "nickname": "Admin",
        "realname": "Alex",
        "required": "req",
        "type": "USER",
    })
}

/// Drops nulls, like comparing a response against the fields that were sent.
pub fn without_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}
