//! openapi-inference - OpenAPI documents from route handler source code.
//!
//! Routes are discovered from `Router` declarations (`route`, `nest`, `merge`). Each
//! route is then described by two passes that write into one shared route graph:
//!
//! 1. [`analysis`] parses the handler's doc comment with the grammar in [`comment`]
//!    (summary, description, tags, parameters, request body, responses).
//! 2. [`inference`] walks the handler body and recognizes call shapes such as
//!    `call.parameters().get("id")` or `call.respond(StatusCode::CREATED, Json(book))`.
//!
//! [`route_graph`] merges both contributions per route, with documentation winning
//! wherever it is explicit. [`openapi_builder`] and [`schema_generator`] assemble the
//! document and [`serializer`] writes it. [`extension`] wires the whole compilation
//! together.
//!
//! # Example Usage
//!
//! ```no_run
//! use openapi_inference::{
//!     config::PluginOptions,
//!     diagnostics::LogDiagnostics,
//!     extension::OpenApiExtension,
//!     scanner::FileScanner,
//!     serializer::serialize_json,
//! };
//! use std::path::PathBuf;
//!
//! let scan = FileScanner::new(PathBuf::from("./library-service")).scan().unwrap();
//! let diagnostics = LogDiagnostics;
//! let mut extension = OpenApiExtension::new(PluginOptions::default(), &diagnostics);
//! extension.compile_sources(&scan.sources).unwrap();
//!
//! if let Some(document) = extension.finalize().unwrap() {
//!     print!("{}", serialize_json(&document).unwrap());
//! }
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod analysis;
pub mod cli;
pub mod comment;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extension;
pub mod http;
pub mod inference;
pub mod model;
pub mod openapi_builder;
pub mod parser;
pub mod route_graph;
pub mod routing;
pub mod scanner;
pub mod schema_generator;
pub mod serializer;
pub mod type_reference;
pub mod type_resolver;
