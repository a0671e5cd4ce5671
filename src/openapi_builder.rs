use crate::config::PluginOptions;
use crate::diagnostics::Diagnostics;
use crate::http::{resolve_media_type, ResponseKey};
use crate::model::{HttpMethod, Literal, LocalReference, ParameterField, ParameterLocation};
use crate::route_graph::{ResolvedRoute, RouteCallLookup};
use crate::schema_generator::{Schema, SchemaGenerator};
use crate::type_resolver::TypeIndex;
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;

/// OpenAPI version written to every document
pub const OPENAPI_VERSION: &str = "3.1.0";

const DEFAULT_MEDIA_TYPE: &str = "application/json";

/// Constraint attributes whose values are emitted as numbers
const NUMERIC_CONSTRAINTS: &[&str] = &[
    "maxLength",
    "minLength",
    "maximum",
    "minimum",
    "exclusiveMaximum",
    "exclusiveMinimum",
    "maxItems",
    "minItems",
    "multipleOf",
    "maxProperties",
    "minProperties",
];

/// OpenAPI document builder
pub struct OpenApiBuilder {
    /// OpenAPI info section
    info: Info,
}

/// OpenAPI Info object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Info {
    /// API title
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// API description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "termsOfService", skip_serializing_if = "Option::is_none")]
    pub terms_of_service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
    /// API version
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contact {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct License {
    pub name: String,
}

/// OpenAPI PathItem object - represents all operations for a single path.
/// Fields are declared in lexicographic method order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
}

impl PathItem {
    pub fn operation(&self, method: HttpMethod) -> Option<&Operation> {
        match method {
            HttpMethod::Get => self.get.as_ref(),
            HttpMethod::Post => self.post.as_ref(),
            HttpMethod::Put => self.put.as_ref(),
            HttpMethod::Delete => self.delete.as_ref(),
            HttpMethod::Patch => self.patch.as_ref(),
            HttpMethod::Options => self.options.as_ref(),
            HttpMethod::Head => self.head.as_ref(),
        }
    }

    fn set(&mut self, method: HttpMethod, operation: Operation) {
        let slot = match method {
            HttpMethod::Get => &mut self.get,
            HttpMethod::Post => &mut self.post,
            HttpMethod::Put => &mut self.put,
            HttpMethod::Delete => &mut self.delete,
            HttpMethod::Patch => &mut self.patch,
            HttpMethod::Options => &mut self.options,
            HttpMethod::Head => &mut self.head,
        };
        *slot = Some(operation);
    }
}

/// OpenAPI Operation object - represents a single API operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operation {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Operation summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Operation description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Operation ID
    #[serde(rename = "operationId", skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    /// Parameters (path, query, header, cookie, or unspecified)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    /// Request body
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    /// Responses, status codes ascending and `default` last
    pub responses: BTreeMap<ResponseKey, Response>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
}

/// OpenAPI Parameter object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Parameter location; omitted when the source could not be determined
    #[serde(rename = "in", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Parameter description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the parameter is required
    pub required: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_json::Value>,
    /// Parameter schema
    pub schema: Schema,
}

/// OpenAPI RequestBody object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestBody {
    /// Request body description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Content types and their schemas
    pub content: BTreeMap<String, MediaType>,
    /// Whether the request body is required
    pub required: bool,
}

/// OpenAPI MediaType object
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaType {
    /// Schema for this media type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

/// OpenAPI Response object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    /// Response description
    pub description: String,
    /// Response content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<BTreeMap<String, MediaType>>,
}

/// OpenAPI Components object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Components {
    /// Schema definitions
    pub schemas: BTreeMap<String, Schema>,
}

/// Complete OpenAPI document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenApiDocument {
    /// OpenAPI version
    pub openapi: String,
    /// API info
    pub info: Info,
    /// API paths
    pub paths: BTreeMap<String, PathItem>,
    /// Components (schemas, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
}

/// Routes of one `(path template, method)` pair
struct OperationGroup {
    route: ResolvedRoute,
    handler: Option<String>,
}

impl OpenApiBuilder {
    /// Create a builder whose info section is taken from the options
    pub fn new(options: &PluginOptions) -> Self {
        debug!("Initializing OpenApiBuilder");
        Self {
            info: Info {
                title: options.title.clone(),
                summary: options.summary.clone(),
                description: options.description.clone(),
                terms_of_service: options.terms_of_service.clone(),
                contact: options.contact.clone().map(|name| Contact { name }),
                license: options.license.clone().map(|name| License { name }),
                version: options.version.clone(),
            },
        }
    }

    /// Assemble the document from a completed route graph
    pub fn build(
        &self,
        lookup: &RouteCallLookup,
        index: &TypeIndex,
        diagnostics: &dyn Diagnostics,
    ) -> OpenApiDocument {
        debug!("Building OpenAPI document from {} routes", lookup.len());

        // (path template, method) -> keys in key order
        let mut grouped: BTreeMap<(String, HttpMethod), Vec<_>> = BTreeMap::new();
        for key in lookup.keys() {
            let endpoint = lookup.resolve(key).and_then(|route| route.endpoint);
            let Some(endpoint) = endpoint else {
                diagnostics.debug(
                    "Route has no declared endpoint; skipping",
                    Some(&key.location()),
                );
                continue;
            };
            grouped
                .entry((convert_path_format(&endpoint.path), endpoint.method))
                .or_default()
                .push(key.clone());
        }

        let groups: BTreeMap<(String, HttpMethod), OperationGroup> = grouped
            .into_iter()
            .map(|(group_key, keys)| {
                let route = lookup.resolve_merged(&keys);
                let handler = route.endpoint.as_ref().and_then(|e| e.handler.clone());
                (group_key, OperationGroup { route, handler })
            })
            .collect();

        let mut handler_counts: BTreeMap<&str, usize> = BTreeMap::new();
        for group in groups.values() {
            if let Some(handler) = group.handler.as_deref() {
                *handler_counts.entry(handler).or_default() += 1;
            }
        }

        let mut schema_gen = SchemaGenerator::new(index);
        let mut paths: BTreeMap<String, PathItem> = BTreeMap::new();
        for ((path, method), group) in &groups {
            debug!("Adding operation: {} {}", method, path);
            let operation_id = group
                .handler
                .as_deref()
                .filter(|h| handler_counts.get(h) == Some(&1))
                .map(str::to_string);
            let operation = build_operation(
                path,
                &group.route,
                operation_id,
                &mut schema_gen,
                diagnostics,
            );
            paths.entry(path.clone()).or_default().set(*method, operation);
        }

        let schemas = schema_gen.into_schemas();
        OpenApiDocument {
            openapi: OPENAPI_VERSION.to_string(),
            info: self.info.clone(),
            paths,
            components: if schemas.is_empty() {
                None
            } else {
                Some(Components { schemas })
            },
        }
    }
}

fn build_operation(
    path: &str,
    route: &ResolvedRoute,
    operation_id: Option<String>,
    schema_gen: &mut SchemaGenerator<'_>,
    diagnostics: &dyn Diagnostics,
) -> Operation {
    let placeholders = path_placeholders(path);

    let mut parameters: Vec<(ParameterLocation, Parameter)> = Vec::new();
    for field in &route.parameters {
        let Some(name) = literal_name(&field.name) else {
            diagnostics.debug(
                &format!("Parameter name {} is not a literal; skipping it on {}", field.name, path),
                None,
            );
            continue;
        };
        let location = if field.location.is_unknown() && placeholders.contains(&name) {
            ParameterLocation::Path
        } else {
            field.location
        };
        if parameters.iter().any(|(l, p)| *l == location && p.name == name) {
            continue;
        }
        parameters.push((location, build_parameter(name, location, field, schema_gen)));
    }
    for placeholder in &placeholders {
        let declared = parameters
            .iter()
            .any(|(l, p)| *l == ParameterLocation::Path && &p.name == placeholder);
        if !declared {
            let field = ParameterField::new(
                ParameterLocation::Path,
                LocalReference::str(placeholder.clone()),
            );
            parameters.push((
                ParameterLocation::Path,
                build_parameter(placeholder.clone(), ParameterLocation::Path, &field, schema_gen),
            ));
        }
    }
    parameters.sort_by(|(la, a), (lb, b)| la.cmp(lb).then_with(|| a.name.cmp(&b.name)));

    let request_body = route.request_body.as_ref().map(|body| {
        let media_type = body
            .content_type
            .as_ref()
            .and_then(resolve_media_type)
            .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string());
        let schema = body.type_ref.as_ref().map(|t| schema_gen.schema_for(t));
        RequestBody {
            description: body.description.clone(),
            content: BTreeMap::from([(media_type, MediaType { schema })]),
            required: true,
        }
    });

    let mut responses = BTreeMap::new();
    for (key, field) in &route.responses {
        let media_type = field.content_type.as_ref().and_then(resolve_media_type);
        let schema = field.type_ref.as_ref().map(|t| schema_gen.schema_for(t));
        let content = if media_type.is_some() || schema.is_some() {
            let media_type = media_type.unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string());
            Some(BTreeMap::from([(media_type, MediaType { schema })]))
        } else {
            None
        };
        responses.insert(
            *key,
            Response {
                description: field
                    .description
                    .clone()
                    .unwrap_or_else(|| key.default_description()),
                content,
            },
        );
    }
    if responses.is_empty() {
        // Default response when nothing is known
        responses.insert(
            ResponseKey::Code(200),
            Response {
                description: "Successful response".to_string(),
                content: None,
            },
        );
    }

    Operation {
        tags: route.tags.clone(),
        summary: route.summary.clone(),
        description: route.description.clone(),
        operation_id,
        parameters: parameters.into_iter().map(|(_, p)| p).collect(),
        request_body,
        responses,
        deprecated: route.deprecated,
    }
}

fn build_parameter(
    name: String,
    location: ParameterLocation,
    field: &ParameterField,
    schema_gen: &mut SchemaGenerator<'_>,
) -> Parameter {
    let mut schema = match &field.type_ref {
        Some(type_ref) => schema_gen.schema_for(type_ref),
        None => Schema::of_type("string"),
    };

    let mut required = match location {
        ParameterLocation::Path => true,
        _ => field.type_ref.as_ref().is_some_and(|t| !t.is_optional()),
    };
    let mut deprecated = false;
    let mut example = None;
    for (attribute, value) in &field.attributes {
        match attribute.as_str() {
            "required" => {
                if location != ParameterLocation::Path {
                    required = value == "true";
                }
            }
            "deprecated" => deprecated = value == "true",
            "example" => example = Some(attribute_value(attribute, value)),
            _ => {
                schema
                    .constraints
                    .insert(attribute.clone(), attribute_value(attribute, value));
            }
        }
    }

    Parameter {
        name,
        location: location.openapi_name().map(str::to_string),
        description: field.description.clone(),
        required,
        deprecated,
        example,
        schema,
    }
}

/// Typed JSON value of an attribute: booleans for `true`/`false`, numbers for numeric
/// constraints, strings otherwise.
fn attribute_value(attribute: &str, value: &str) -> serde_json::Value {
    match value {
        "true" => return serde_json::Value::Bool(true),
        "false" => return serde_json::Value::Bool(false),
        _ => {}
    }
    if NUMERIC_CONSTRAINTS.contains(&attribute) || attribute == "example" {
        if let Ok(n) = value.parse::<i64>() {
            return serde_json::Value::from(n);
        }
        if let Some(n) = value.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
            return serde_json::Value::Number(n);
        }
    }
    serde_json::Value::String(value.to_string())
}

fn literal_name(name: &LocalReference) -> Option<String> {
    match name {
        LocalReference::Literal(Literal::Str(s)) => Some(s.clone()),
        LocalReference::Literal(Literal::Int(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Convert path format from `:param` / `*rest` to OpenAPI `{param}` format
pub fn convert_path_format(path: &str) -> String {
    path.split('/')
        .map(|part| {
            if let Some(name) = part.strip_prefix(':').or_else(|| part.strip_prefix('*')) {
                format!("{{{}}}", name)
            } else {
                part.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Placeholder names of an OpenAPI path template, in order
fn path_placeholders(path: &str) -> Vec<String> {
    path.split('/')
        .filter_map(|part| part.strip_prefix('{').and_then(|p| p.strip_suffix('}')))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnostics;
    use crate::model::{RequestBodyField, ResponseField, RouteField, RouteKey, Source};
    use crate::type_reference::TypeReference;
    use pretty_assertions::assert_eq;

    fn endpoint(method: HttpMethod, path: &str, handler: &str) -> RouteField {
        RouteField::Endpoint {
            method,
            path: path.to_string(),
            handler: Some(handler.to_string()),
        }
    }

    fn build(lookup: &RouteCallLookup) -> OpenApiDocument {
        let index = TypeIndex::default();
        let diagnostics = CollectingDiagnostics::new();
        OpenApiBuilder::new(&PluginOptions::default()).build(lookup, &index, &diagnostics)
    }

    #[test]
    fn test_convert_path_format() {
        assert_eq!(convert_path_format("/books/:id"), "/books/{id}");
        assert_eq!(convert_path_format("/files/*rest"), "/files/{rest}");
        assert_eq!(convert_path_format("/books/{id}/x"), "/books/{id}/x");
        assert_eq!(path_placeholders("/a/{b}/c/{d}"), vec!["b", "d"]);
    }

    #[test]
    fn test_default_response_and_path_placeholder() {
        let mut lookup = RouteCallLookup::new();
        lookup.record(
            RouteKey::new("crate", 3, 4),
            Source::Documentation,
            [endpoint(HttpMethod::Get, "/books/:id", "get_book")],
        );
        let document = build(&lookup);

        assert_eq!(document.openapi, "3.1.0");
        let operation = document.paths["/books/{id}"].get.as_ref().unwrap();
        assert_eq!(operation.operation_id.as_deref(), Some("get_book"));
        assert_eq!(operation.responses[&ResponseKey::Code(200)].description, "Successful response");
        assert_eq!(operation.parameters.len(), 1);
        assert_eq!(operation.parameters[0].name, "id");
        assert_eq!(operation.parameters[0].location.as_deref(), Some("path"));
        assert!(operation.parameters[0].required);
        assert!(document.components.is_none());
    }

    #[test]
    fn test_parameter_locations_and_attributes() {
        let mut unknown =
            ParameterField::new(ParameterLocation::Unknown, LocalReference::str("id"));
        unknown.type_ref = Some(TypeReference::primitive(
            crate::type_reference::PrimitiveType::I64,
        ));
        let mut author =
            ParameterField::new(ParameterLocation::Query, LocalReference::str("author"));
        author.type_ref = Some(TypeReference::string());
        author.attributes.insert("maxLength".to_string(), "100".to_string());
        author.attributes.insert("pattern".to_string(), "[a-zA-Z ]+".to_string());
        author.attributes.insert("required".to_string(), "false".to_string());
        let loose = ParameterField::new(ParameterLocation::Unknown, LocalReference::str("page"));
        let symbolic =
            ParameterField::new(ParameterLocation::Query, LocalReference::symbolic("NAME"));

        let mut lookup = RouteCallLookup::new();
        lookup.record(
            RouteKey::new("crate", 1, 1),
            Source::Documentation,
            [
                endpoint(HttpMethod::Get, "/books/:id", "get_book"),
                RouteField::Parameter(loose),
                RouteField::Parameter(author),
                RouteField::Parameter(symbolic),
                RouteField::Parameter(unknown),
            ],
        );
        let document = build(&lookup);
        let parameters = &document.paths["/books/{id}"].get.as_ref().unwrap().parameters;

        let names: Vec<(&str, Option<&str>)> = parameters
            .iter()
            .map(|p| (p.name.as_str(), p.location.as_deref()))
            .collect();
        assert_eq!(
            names,
            vec![("id", Some("path")), ("author", Some("query")), ("page", None)]
        );
        assert_eq!(parameters[0].schema.schema_type.as_deref(), Some("integer"));

        let author = &parameters[1];
        assert!(!author.required);
        assert_eq!(author.schema.constraints["maxLength"], serde_json::json!(100));
        assert_eq!(author.schema.constraints["pattern"], serde_json::json!("[a-zA-Z ]+"));
        assert!(!parameters[2].required);
    }

    #[test]
    fn test_responses_and_request_body() {
        let mut ok = ResponseField::new(LocalReference::int(200));
        ok.type_ref = Some(TypeReference::array(TypeReference::opaque("Book")));
        ok.content_type = Some(LocalReference::str("application/xml"));
        let missing = ResponseField::new(LocalReference::symbolic("StatusCode::NOT_FOUND"));
        let other = ResponseField::new(LocalReference::symbolic("status"));
        let body = RequestBodyField {
            type_ref: Some(TypeReference::string()),
            content_type: None,
            description: Some("New title".to_string()),
        };

        let mut lookup = RouteCallLookup::new();
        lookup.record(
            RouteKey::new("crate", 1, 1),
            Source::Inference,
            [
                endpoint(HttpMethod::Post, "/books", "create_book"),
                RouteField::Response(other),
                RouteField::Response(missing),
                RouteField::Response(ok),
                RouteField::RequestBody(body),
            ],
        );
        let document = build(&lookup);
        let operation = document.paths["/books"].post.as_ref().unwrap();

        let statuses: Vec<String> = operation.responses.keys().map(|k| k.to_string()).collect();
        assert_eq!(statuses, vec!["200", "404", "default"]);
        assert_eq!(operation.responses[&ResponseKey::Code(404)].description, "Not Found");
        let content = operation.responses[&ResponseKey::Code(200)].content.as_ref().unwrap();
        let schema = content["application/xml"].schema.as_ref().unwrap();
        assert_eq!(
            schema.items.as_ref().unwrap().reference.as_deref(),
            Some("#/components/schemas/Book")
        );

        let body = operation.request_body.as_ref().unwrap();
        assert_eq!(body.description.as_deref(), Some("New title"));
        assert!(body.content.contains_key("application/json"));
        assert!(document.components.unwrap().schemas.contains_key("Book"));
    }

    #[test]
    fn test_operation_id_requires_unique_handler() {
        let mut lookup = RouteCallLookup::new();
        lookup.record(
            RouteKey::new("crate", 1, 1),
            Source::Documentation,
            [endpoint(HttpMethod::Get, "/a", "shared")],
        );
        lookup.record(
            RouteKey::new("crate", 2, 1),
            Source::Documentation,
            [endpoint(HttpMethod::Get, "/b", "shared")],
        );
        lookup.record(
            RouteKey::new("crate", 3, 1),
            Source::Documentation,
            [endpoint(HttpMethod::Delete, "/b", "remove")],
        );
        let document = build(&lookup);

        assert!(document.paths["/a"].get.as_ref().unwrap().operation_id.is_none());
        assert!(document.paths["/b"].get.as_ref().unwrap().operation_id.is_none());
        assert_eq!(
            document.paths["/b"].operation(HttpMethod::Delete).unwrap().operation_id.as_deref(),
            Some("remove")
        );
    }

    #[test]
    fn test_keys_sharing_an_operation_are_merged() {
        let mut lookup = RouteCallLookup::new();
        lookup.record(
            RouteKey::new("crate", 1, 1),
            Source::Documentation,
            [
                endpoint(HttpMethod::Get, "/books", "list"),
                RouteField::Tags(vec!["books".to_string()]),
            ],
        );
        lookup.record(
            RouteKey::new("crate", 9, 1),
            Source::Documentation,
            [endpoint(HttpMethod::Get, "/books", "list_again"), RouteField::Deprecated],
        );
        lookup.record(RouteKey::new("crate", 12, 1), Source::Inference, [RouteField::Deprecated]);
        let document = build(&lookup);

        assert_eq!(document.paths.len(), 1);
        let operation = document.paths["/books"].get.as_ref().unwrap();
        assert_eq!(operation.tags, vec!["books".to_string()]);
        assert!(operation.deprecated);
    }

    #[test]
    fn test_info_from_options() {
        let options = PluginOptions::from_pairs([
            ("title", "Library"),
            ("version", "2.0"),
            ("contact", "Front desk"),
        ])
        .unwrap();
        let document = OpenApiBuilder::new(&options).build(
            &RouteCallLookup::new(),
            &TypeIndex::default(),
            &CollectingDiagnostics::new(),
        );
        let json = serde_json::to_value(&document).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "openapi": "3.1.0",
                "info": {
                    "title": "Library",
                    "contact": { "name": "Front desk" },
                    "version": "2.0"
                },
                "paths": {}
            })
        );
    }

    #[test]
    fn test_attribute_values() {
        assert_eq!(attribute_value("maxLength", "100"), serde_json::json!(100));
        assert_eq!(attribute_value("minimum", "0.5"), serde_json::json!(0.5));
        assert_eq!(attribute_value("pattern", "123"), serde_json::json!("123"));
        assert_eq!(attribute_value("nullable", "true"), serde_json::json!(true));
    }
}
