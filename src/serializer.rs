//! Serialization module for converting OpenAPI documents to JSON or YAML format.
//!
//! Every map in [`OpenApiDocument`] is ordered and every struct declares its fields in
//! OpenAPI order, so serializing the same route graph twice yields byte-identical
//! output.

use crate::error::{Error, Result};
use crate::openapi_builder::OpenApiDocument;
use log::debug;
use std::fs;
use std::path::Path;

/// Serializes an OpenAPI document to JSON with two-space indentation and a
/// trailing newline.
///
/// # Errors
///
/// Returns [`Error::SerializationError`] if serialization fails.
///
/// # Example
///
/// ```ignore
/// use openapi_inference::serializer::serialize_json;
///
/// let json = serialize_json(&document)?;
/// print!("{}", json);
/// ```
pub fn serialize_json(doc: &OpenApiDocument) -> Result<String> {
    debug!("Serializing OpenAPI document to JSON");
    let mut json = serde_json::to_string_pretty(doc)?;
    json.push('\n');
    Ok(json)
}

/// Serializes an OpenAPI document to YAML format.
///
/// # Errors
///
/// Returns [`Error::SerializationError`] if serialization fails.
pub fn serialize_yaml(doc: &OpenApiDocument) -> Result<String> {
    debug!("Serializing OpenAPI document to YAML");
    Ok(serde_yaml::to_string(doc)?)
}

/// Writes string content to a file, creating parent directories as needed.
///
/// An existing file is overwritten.
///
/// # Errors
///
/// Returns [`Error::IoError`] if a directory or the file cannot be written.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(Error::IoError)?;
    }
    fs::write(path, content)?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PluginOptions;
    use crate::diagnostics::CollectingDiagnostics;
    use crate::model::{HttpMethod, LocalReference, ResponseField, RouteField, RouteKey, Source};
    use crate::openapi_builder::OpenApiBuilder;
    use crate::route_graph::RouteCallLookup;
    use crate::type_reference::TypeReference;
    use crate::type_resolver::TypeIndex;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn create_test_document(lookup: &RouteCallLookup) -> OpenApiDocument {
        let options =
            PluginOptions::from_pairs([("title", "Library"), ("version", "1.2.0")]).unwrap();
        OpenApiBuilder::new(&options).build(
            lookup,
            &TypeIndex::default(),
            &CollectingDiagnostics::new(),
        )
    }

    fn endpoint(key: RouteKey, method: HttpMethod, path: &str) -> (RouteKey, RouteField) {
        (
            key,
            RouteField::Endpoint {
                method,
                path: path.to_string(),
                handler: None,
            },
        )
    }

    #[test]
    fn test_serialize_json_exact_output() {
        let mut lookup = RouteCallLookup::new();
        let (key, field) = endpoint(RouteKey::new("crate", 1, 1), HttpMethod::Get, "/health");
        lookup.record(
            key,
            Source::Documentation,
            [field, RouteField::Summary("Health".to_string())],
        );

        let json = serialize_json(&create_test_document(&lookup)).unwrap();
        let expected = r#"{
  "openapi": "3.1.0",
  "info": {
    "title": "Library",
    "version": "1.2.0"
  },
  "paths": {
    "/health": {
      "get": {
        "summary": "Health",
        "responses": {
          "200": {
            "description": "Successful response"
          }
        }
      }
    }
  }
}
"#;
        assert_eq!(json, expected);
    }

    #[test]
    fn test_serialization_ignores_insertion_order() {
        let mut response = ResponseField::new(LocalReference::int(404));
        response.type_ref = Some(TypeReference::string());
        let fields = |reverse: bool| {
            let mut routes = vec![
                endpoint(RouteKey::new("crate", 1, 1), HttpMethod::Post, "/books"),
                endpoint(RouteKey::new("crate", 2, 1), HttpMethod::Get, "/books"),
                endpoint(RouteKey::new("crate", 3, 1), HttpMethod::Get, "/authors"),
            ];
            if reverse {
                routes.reverse();
            }
            routes
        };

        let mut first = RouteCallLookup::new();
        for (key, field) in fields(false) {
            first.record(key.clone(), Source::Documentation, [field]);
            first.record(key, Source::Inference, [RouteField::Response(response.clone())]);
        }
        let mut second = RouteCallLookup::new();
        for (key, field) in fields(true) {
            second.record(key.clone(), Source::Inference, [RouteField::Response(response.clone())]);
            second.record(key, Source::Documentation, [field]);
        }

        let a = serialize_json(&create_test_document(&first)).unwrap();
        let b = serialize_json(&create_test_document(&second)).unwrap();
        assert_eq!(a, b);
        assert!(a.find("\"/authors\"").unwrap() < a.find("\"/books\"").unwrap());
        assert!(a.find("\"get\"").unwrap() < a.find("\"post\"").unwrap());
    }

    #[test]
    fn test_serialize_yaml() {
        let lookup = RouteCallLookup::new();
        let yaml = serialize_yaml(&create_test_document(&lookup)).unwrap();
        assert!(yaml.contains("openapi: 3.1.0"));
        assert!(yaml.contains("title: Library"));

        let value: serde_json::Value = serde_yaml::from_str(&yaml).unwrap();
        let from_json: serde_json::Value =
            serde_json::from_str(&serialize_json(&create_test_document(&lookup)).unwrap()).unwrap();
        assert_eq!(value, from_json);
    }

    #[test]
    fn test_write_to_file_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/dir/openapi.json");

        write_to_file("{}\n", &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}\n");

        write_to_file("{ }\n", &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ }\n");
    }
}
