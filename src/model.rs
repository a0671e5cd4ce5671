//! Route graph data model shared by both passes and the assembler.

use crate::diagnostics::SourceLocation;
use crate::type_reference::TypeReference;
use std::collections::BTreeMap;
use std::fmt;

/// HTTP methods a route can be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
}

impl HttpMethod {
    /// Parses a method router name (`get`, `post`, ...), case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "get" => Some(HttpMethod::Get),
            "post" => Some(HttpMethod::Post),
            "put" => Some(HttpMethod::Put),
            "delete" => Some(HttpMethod::Delete),
            "patch" => Some(HttpMethod::Patch),
            "options" => Some(HttpMethod::Options),
            "head" => Some(HttpMethod::Head),
            _ => None,
        }
    }

    /// Lower-case name, as used for OpenAPI path item keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Delete => "delete",
            HttpMethod::Patch => "patch",
            HttpMethod::Options => "options",
            HttpMethod::Head => "head",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

/// Identity of one route declaration site, stable across both passes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouteKey {
    pub module: String,
    pub line: usize,
    pub column: usize,
}

impl RouteKey {
    pub fn new(module: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            module: module.into(),
            line,
            column,
        }
    }

    pub fn location(&self) -> SourceLocation {
        SourceLocation {
            module: self.module.clone(),
            line: self.line,
            column: self.column,
        }
    }
}

/// Where a parameter is read from. `Unknown` marks an ambiguous accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
    Unknown,
}

impl ParameterLocation {
    /// Parses the location word of a `- <Location> parameters:` header.
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_lowercase().as_str() {
            "path" => Some(ParameterLocation::Path),
            "query" => Some(ParameterLocation::Query),
            "header" => Some(ParameterLocation::Header),
            "cookie" | "cookies" => Some(ParameterLocation::Cookie),
            _ => None,
        }
    }

    /// The OpenAPI `in` value, `None` for `Unknown`.
    pub fn openapi_name(&self) -> Option<&'static str> {
        match self {
            ParameterLocation::Path => Some("path"),
            ParameterLocation::Query => Some("query"),
            ParameterLocation::Header => Some("header"),
            ParameterLocation::Cookie => Some("cookie"),
            ParameterLocation::Unknown => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, ParameterLocation::Unknown)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    Str(String),
    Int(i64),
}

/// A value known as a literal at analysis time, or only symbolically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LocalReference {
    Literal(Literal),
    Symbolic(String),
    Unknown,
}

impl LocalReference {
    pub fn str(value: impl Into<String>) -> Self {
        LocalReference::Literal(Literal::Str(value.into()))
    }

    pub fn int(value: i64) -> Self {
        LocalReference::Literal(Literal::Int(value))
    }

    pub fn symbolic(expr: impl Into<String>) -> Self {
        LocalReference::Symbolic(expr.into())
    }

    /// The string literal value, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            LocalReference::Literal(Literal::Str(s)) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for LocalReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalReference::Literal(Literal::Str(s)) => write!(f, "{}", s),
            LocalReference::Literal(Literal::Int(n)) => write!(f, "{}", n),
            LocalReference::Symbolic(s) => write!(f, "{}", s),
            LocalReference::Unknown => write!(f, "<unknown>"),
        }
    }
}

/// Constraint name -> literal value (`pattern`, `maxLength`, ...).
pub type SchemaAttributes = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterField {
    pub location: ParameterLocation,
    pub name: LocalReference,
    pub type_ref: Option<TypeReference>,
    pub description: Option<String>,
    pub attributes: SchemaAttributes,
}

impl ParameterField {
    pub fn new(location: ParameterLocation, name: LocalReference) -> Self {
        Self {
            location,
            name,
            type_ref: None,
            description: None,
            attributes: SchemaAttributes::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseField {
    pub status: LocalReference,
    pub content_type: Option<LocalReference>,
    pub type_ref: Option<TypeReference>,
    pub description: Option<String>,
}

impl ResponseField {
    pub fn new(status: LocalReference) -> Self {
        Self {
            status,
            content_type: None,
            type_ref: None,
            description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestBodyField {
    pub type_ref: Option<TypeReference>,
    pub content_type: Option<LocalReference>,
    pub description: Option<String>,
}

/// One atomic piece of OpenAPI-relevant information about a route.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteField {
    /// Declared method and path literal of the route.
    Endpoint {
        method: HttpMethod,
        path: String,
        handler: Option<String>,
    },
    Summary(String),
    Description(String),
    Tags(Vec<String>),
    Deprecated,
    Parameter(ParameterField),
    Response(ResponseField),
    RequestBody(RequestBodyField),
}

/// Which pass contributed a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Source {
    Documentation,
    Inference,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub source: Source,
    pub field: RouteField,
}
