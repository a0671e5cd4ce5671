//! Parser for the route documentation grammar found in handler doc comments.
//!
//! ```text
//! /// Get a list of books
//! /// - Response: 200 application/json [Book]+ A list of books
//! /// - Query parameters:
//! ///   - author [String] Filter by author
//! ///     pattern: [a-zA-Z ]+
//! ///     maxLength: 100
//! /// - Header: X-Request-Id Correlation id
//! ```
//!
//! Leading prose becomes the summary. Everything after it is a list of markers;
//! lines that fit none of them are reported as warnings and skipped.

use crate::diagnostics::{Diagnostics, SourceLocation};
use crate::model::{
    LocalReference, ParameterField, ParameterLocation, RequestBodyField, ResponseField, RouteField,
};
use crate::type_reference::{Resolution, TypeReference, TypeSyntax};
use crate::type_resolver::ModuleContext;
use regex::Regex;
use std::sync::LazyLock;

static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-\s*(.*)$").expect("valid list item regex"));

static RESPONSE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^response:\s*(.*)$").expect("valid response regex"));

static RESPONSES_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^responses:\s*$").expect("valid responses regex"));

static PARAMETERS_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(query|header|path|cookie)\s+)?parameters:\s*$")
        .expect("valid parameters regex")
});

static HEADER_SHORTHAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^header:\s*(\S+)\s*(.*)$").expect("valid header shorthand regex")
});

static BODY_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:request\s+)?body:\s*(.*)$").expect("valid body regex")
});

static TAGS_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^tags?:\s*(.+)$").expect("valid tags regex"));

static DEPRECATED_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^deprecated\.?\s*$").expect("valid deprecated regex"));

static DESCRIPTION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^description:\s*(.+)$").expect("valid description regex")
});

static ATTRIBUTE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*:\s*(.*)$").expect("valid attribute regex")
});

static CONTENT_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9!#$&^_.+-]*/[A-Za-z0-9*][A-Za-z0-9!#$&^_.+*-]*$")
        .expect("valid content type regex")
});

/// Extracts `///` and `#[doc = ".."]` lines, removing the single leading space
/// rustdoc inserts after the comment marker.
pub fn doc_lines(attrs: &[syn::Attribute]) -> Vec<String> {
    let mut lines = Vec::new();
    for attr in attrs {
        if !attr.path().is_ident("doc") {
            continue;
        }
        if let syn::Meta::NameValue(meta) = &attr.meta {
            if let syn::Expr::Lit(syn::ExprLit {
                lit: syn::Lit::Str(s),
                ..
            }) = &meta.value
            {
                for line in s.value().lines() {
                    lines.push(line.strip_prefix(' ').unwrap_or(line).to_string());
                }
            }
        }
    }
    lines
}

/// Block opened by a header marker; children must be indented deeper.
enum Block {
    None,
    Responses { indent: usize },
    Parameters { indent: usize, location: ParameterLocation },
}

/// Optional `[contentType] [schema]` tokens followed by free text.
struct Payload {
    content_type: Option<LocalReference>,
    type_ref: Option<TypeReference>,
    description: Option<String>,
}

pub struct CommentParser<'a> {
    ctx: ModuleContext<'a>,
    diagnostics: &'a dyn Diagnostics,
}

impl<'a> CommentParser<'a> {
    pub fn new(ctx: ModuleContext<'a>, diagnostics: &'a dyn Diagnostics) -> Self {
        Self { ctx, diagnostics }
    }

    /// Parses doc lines into route fields, in source order with the summary first.
    pub fn parse(&self, lines: &[String], location: Option<&SourceLocation>) -> Vec<RouteField> {
        let mut summary: Vec<&str> = Vec::new();
        let mut in_summary = true;
        let mut fields = Vec::new();
        let mut block = Block::None;
        // Open parameter entry and its indentation
        let mut entry: Option<(usize, ParameterField)> = None;

        for raw in lines {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            let indent = indentation(raw);
            let item = LIST_ITEM.captures(trimmed).and_then(|c| c.get(1));

            if in_summary {
                if item.is_none() {
                    summary.push(trimmed);
                    continue;
                }
                in_summary = false;
            }

            // Attribute lines of the open parameter entry
            if let Some((entry_indent, parameter)) = entry.as_mut() {
                if indent > *entry_indent {
                    let text = item.map(|m| m.as_str()).unwrap_or(trimmed);
                    match ATTRIBUTE_LINE.captures(text) {
                        Some(attr) => {
                            parameter
                                .attributes
                                .entry(attr[1].to_string())
                                .or_insert_with(|| unquote(attr[2].trim()).to_string());
                        }
                        None => self.unrecognized(trimmed, location),
                    }
                    continue;
                }
            }
            if let Some((_, parameter)) = entry.take() {
                fields.push(RouteField::Parameter(parameter));
            }

            let Some(content) = item.map(|m| m.as_str().trim()) else {
                self.unrecognized(trimmed, location);
                continue;
            };

            match block {
                Block::Responses { indent: header } if indent > header => {
                    if let Some(field) = self.response(content, location) {
                        fields.push(field);
                    }
                    continue;
                }
                Block::Parameters {
                    indent: header,
                    location: param_location,
                } if indent > header => {
                    match self.parameter_entry(param_location, content) {
                        Some(parameter) => entry = Some((indent, parameter)),
                        None => self.unrecognized(trimmed, location),
                    }
                    continue;
                }
                _ => block = Block::None,
            }

            if let Some(caps) = RESPONSE_MARKER.captures(content) {
                if let Some(field) = self.response(&caps[1], location) {
                    fields.push(field);
                }
            } else if RESPONSES_HEADER.is_match(content) {
                block = Block::Responses { indent };
            } else if let Some(caps) = PARAMETERS_HEADER.captures(content) {
                let param_location = caps
                    .get(1)
                    .and_then(|m| ParameterLocation::from_keyword(m.as_str()))
                    .unwrap_or(ParameterLocation::Unknown);
                block = Block::Parameters {
                    indent,
                    location: param_location,
                };
            } else if let Some(caps) = HEADER_SHORTHAND.captures(content) {
                let mut parameter =
                    ParameterField::new(ParameterLocation::Header, LocalReference::str(&caps[1]));
                parameter.description = non_empty(&caps[2]);
                fields.push(RouteField::Parameter(parameter));
            } else if let Some(caps) = BODY_MARKER.captures(content) {
                let payload = self.payload(&caps[1], location);
                fields.push(RouteField::RequestBody(RequestBodyField {
                    type_ref: payload.type_ref,
                    content_type: payload.content_type,
                    description: payload.description,
                }));
            } else if let Some(caps) = TAGS_MARKER.captures(content) {
                let tags: Vec<String> = caps[1]
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect();
                fields.push(RouteField::Tags(tags));
            } else if DEPRECATED_MARKER.is_match(content) {
                fields.push(RouteField::Deprecated);
            } else if let Some(caps) = DESCRIPTION_MARKER.captures(content) {
                fields.push(RouteField::Description(caps[1].trim().to_string()));
            } else {
                self.unrecognized(trimmed, location);
            }
        }

        if let Some((_, parameter)) = entry {
            fields.push(RouteField::Parameter(parameter));
        }
        if !summary.is_empty() {
            fields.insert(0, RouteField::Summary(summary.join(" ")));
        }
        fields
    }

    /// `<status> [<contentType>] [<schema>] <description>`
    fn response(&self, entry: &str, location: Option<&SourceLocation>) -> Option<RouteField> {
        let (status, rest) = next_token(entry);
        if status.is_empty() {
            self.diagnostics
                .warn("Response line without a status, skipped", location);
            return None;
        }
        let status = status.trim_end_matches(':');
        let status = match status.parse::<i64>() {
            Ok(code) => LocalReference::int(code),
            Err(_) => LocalReference::symbolic(status),
        };

        let payload = self.payload(rest, location);
        Some(RouteField::Response(ResponseField {
            status,
            content_type: payload.content_type,
            type_ref: payload.type_ref,
            description: payload.description,
        }))
    }

    /// `<name> [<type>] <description>`
    fn parameter_entry(&self, location: ParameterLocation, entry: &str) -> Option<ParameterField> {
        let (name, rest) = next_token(entry);
        let name = name.trim_end_matches(':');
        if name.is_empty() || name.contains(':') {
            return None;
        }
        let mut parameter = ParameterField::new(location, LocalReference::str(name));

        let (token, after) = next_token(rest);
        let description = match TypeSyntax::parse(token) {
            Some(syntax) => {
                parameter.type_ref = Some(self.resolve(&syntax, None));
                after
            }
            None => rest,
        };
        parameter.description = non_empty(description);
        Some(parameter)
    }

    fn payload(&self, entry: &str, location: Option<&SourceLocation>) -> Payload {
        let mut payload = Payload {
            content_type: None,
            type_ref: None,
            description: None,
        };
        let mut rest = entry.trim();
        // Both optional tokens are recognized by shape, in either order
        for _ in 0..2 {
            let (token, after) = next_token(rest);
            if payload.content_type.is_none() && CONTENT_TYPE.is_match(token) {
                payload.content_type = Some(LocalReference::str(token));
            } else if payload.type_ref.is_none() && token.starts_with('[') {
                match TypeSyntax::parse(token) {
                    Some(syntax) => payload.type_ref = Some(self.resolve(&syntax, location)),
                    None => break,
                }
            } else {
                break;
            }
            rest = after;
        }
        payload.description = non_empty(rest);
        payload
    }

    fn resolve(&self, syntax: &TypeSyntax, location: Option<&SourceLocation>) -> TypeReference {
        let resolved = self.ctx.resolve_name(&syntax.name);
        if let TypeReference::Named {
            resolution: Resolution::Opaque,
            ..
        } = &resolved
        {
            self.diagnostics.debug(
                &format!(
                    "Type {} could not be resolved from {}",
                    syntax.name,
                    self.ctx.module()
                ),
                location,
            );
        }
        syntax.to_reference(resolved)
    }

    fn unrecognized(&self, line: &str, location: Option<&SourceLocation>) {
        self.diagnostics.warn(
            &format!("Unrecognized documentation line skipped: {}", line),
            location,
        );
    }
}

fn indentation(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// Splits off the first whitespace-delimited token.
fn next_token(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(end) => (&text[..end], text[end..].trim_start()),
        None => (text, ""),
    }
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
