//! OpenAPI rendering of synthesized schemas and bound routes, through utoipa's builders.

use crate::model::FieldType;
use crate::router::{MainRouter, RouteSpec};
use crate::schema::{FieldShape, Schema, SchemaField};
use indexmap::IndexMap;
use std::sync::Arc;
use utoipa::openapi::{
    ComponentsBuilder, Content, HttpMethod, Info, OpenApi, OpenApiBuilder, PathItem, PathsBuilder, Ref, RefOr,
    Required, ResponseBuilder,
    path::{OperationBuilder, ParameterBuilder, ParameterIn},
    request_body::RequestBodyBuilder,
    schema::{ArrayBuilder, KnownFormat, ObjectBuilder, Schema as OpenApiSchema, SchemaFormat, SchemaType, Type},
};

const JSON: &str = "application/json";

fn scalar_builder(field_type: FieldType) -> ObjectBuilder {
    let (schema_type, format) = match field_type {
        FieldType::Integer => (Type::Integer, None),
        FieldType::Float => (Type::Number, None),
        FieldType::String => (Type::String, None),
        FieldType::Boolean => (Type::Boolean, None),
        FieldType::DateTime => (Type::String, Some(KnownFormat::DateTime)),
        FieldType::Date => (Type::String, Some(KnownFormat::Date)),
        FieldType::Uuid => (Type::String, Some(KnownFormat::Uuid)),
        FieldType::Object => (Type::Object, None),
        FieldType::List => (Type::Array, None),
    };
    ObjectBuilder::new()
        .schema_type(schema_type)
        .format(format.map(SchemaFormat::KnownFormat))
}

fn scalar(field_type: FieldType) -> RefOr<OpenApiSchema> {
    scalar_builder(field_type).into()
}

fn shape(field: &FieldShape) -> RefOr<OpenApiSchema> {
    match field {
        FieldShape::Scalar(t) => scalar(*t),
        FieldShape::Many(t) => ArrayBuilder::new().items(scalar(*t)).into(),
        FieldShape::Nested(schema) => Ref::from_schema_name(schema.name()).into(),
        FieldShape::ManyNested(schema) => ArrayBuilder::new()
            .items(Ref::from_schema_name(schema.name()))
            .into(),
        FieldShape::Any => ObjectBuilder::new().schema_type(SchemaType::AnyValue).into(),
    }
}

/// Scalars carry their non-null default.
fn property(field: &SchemaField) -> RefOr<OpenApiSchema> {
    match (&field.shape, field.default.value()) {
        (FieldShape::Scalar(t), Some(default)) if !default.is_null() => {
            scalar_builder(*t).default(Some(default.clone())).into()
        }
        (other, _) => shape(other),
    }
}

impl Schema {
    /// This schema as an OpenAPI object; nested schemas are `$ref`s to their components.
    pub fn to_openapi(&self) -> RefOr<OpenApiSchema> {
        let mut object = ObjectBuilder::new().schema_type(Type::Object).title(Some(self.name()));
        for field in self.fields() {
            object = object.property(field.name.clone(), property(field));
            if field.default.is_required() {
                object = object.required(field.name.clone());
            }
        }
        object.into()
    }

    /// This schema and every schema nested in it, keyed by name.
    pub fn components(self: &Arc<Self>) -> IndexMap<String, Arc<Schema>> {
        let mut found = IndexMap::new();
        collect(self, &mut found);
        found
    }
}

fn collect(schema: &Arc<Schema>, found: &mut IndexMap<String, Arc<Schema>>) {
    if found.contains_key(schema.name()) {
        return;
    }
    found.insert(schema.name().to_string(), Arc::clone(schema));
    for field in schema.fields() {
        if let FieldShape::Nested(nested) | FieldShape::ManyNested(nested) = &field.shape {
            collect(nested, found);
        }
    }
}

fn http_method(route: &RouteSpec) -> HttpMethod {
    match route.method.as_str() {
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "PATCH" => HttpMethod::Patch,
        "DELETE" => HttpMethod::Delete,
        _ => HttpMethod::Get,
    }
}

fn operation(route: &RouteSpec) -> utoipa::openapi::path::Operation {
    let options = &route.options;
    let operation_id = options
        .operation_id
        .clone()
        .unwrap_or_else(|| format!("{}_{}", route.capability, route.view().name()));

    let mut response = ResponseBuilder::new().description("Successful Response");
    if let Some(schema) = route.response_schema() {
        response = response.content(JSON, Content::new(Some(Ref::from_schema_name(schema.name()))));
    }

    let mut builder = OperationBuilder::new()
        .tags(options.tags.clone())
        .summary(options.summary.clone())
        .description(options.description.clone())
        .operation_id(Some(operation_id))
        .response(route.status().as_str(), response.build());

    if let Some((name, key_type)) = &route.key {
        builder = builder.parameter(
            ParameterBuilder::new()
                .name(name)
                .parameter_in(ParameterIn::Path)
                .required(Required::True)
                .schema(Some(scalar(key_type.field_type()))),
        );
    }
    if let Some(filters) = route.query_schema() {
        for field in filters.fields() {
            builder = builder.parameter(
                ParameterBuilder::new()
                    .name(&field.name)
                    .parameter_in(ParameterIn::Query)
                    .required(Required::False)
                    .schema(Some(shape(&field.shape))),
            );
        }
    }
    if let Some(schema) = route.request_schema() {
        builder = builder.request_body(Some(
            RequestBodyBuilder::new()
                .content(JSON, Content::new(Some(Ref::from_schema_name(schema.name()))))
                .required(Some(Required::True))
                .build(),
        ));
    }
    builder.build()
}

impl MainRouter {
    /// The OpenAPI document of every registered route and schema.
    pub fn openapi(&self, title: &str, version: &str) -> OpenApi {
        let mut schemas: IndexMap<String, Arc<Schema>> = IndexMap::new();
        let mut items: IndexMap<String, PathItem> = IndexMap::new();

        for route in self.routes() {
            for schema in [route.request_schema(), route.response_schema()].into_iter().flatten() {
                for (name, found) in schema.components() {
                    schemas.entry(name).or_insert(found);
                }
            }

            let method = http_method(route);
            let op = operation(route);
            match items.get_mut(&route.path) {
                Some(item) => {
                    let slot = match method {
                        HttpMethod::Post => &mut item.post,
                        HttpMethod::Put => &mut item.put,
                        HttpMethod::Patch => &mut item.patch,
                        HttpMethod::Delete => &mut item.delete,
                        _ => &mut item.get,
                    };
                    // First registration wins, as in the axum router.
                    slot.get_or_insert(op);
                }
                None => {
                    items.insert(route.path.clone(), PathItem::new(method, op));
                }
            }
        }

        let paths = items
            .into_iter()
            .fold(PathsBuilder::new(), |paths, (path, item)| paths.path(path, item));
        let components = schemas
            .iter()
            .fold(ComponentsBuilder::new(), |components, (name, schema)| {
                components.schema(name.clone(), schema.to_openapi())
            });

        OpenApiBuilder::new()
            .info(Info::new(title, version))
            .paths(paths)
            .components(Some(components.build()))
            .build()
    }
}
