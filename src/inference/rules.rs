//! Inference rules.
//!
//! A rule is a predicate plus an extractor. The predicate is a cheap early exit on the
//! method name and receiver; the extractor returns `None` when the call does not
//! have the expected shape after all, and `Some(vec![])` when it does but yields no
//! field.

use super::{ArgShape, CallShape, TypeArg};
use crate::http;
use crate::model::{
    LocalReference, ParameterField, ParameterLocation, RequestBodyField, ResponseField, RouteField,
};
use crate::type_reference::{PrimitiveType, TypeReference};

pub struct Rule {
    pub name: &'static str,
    pub applies: fn(&CallShape) -> bool,
    pub extract: fn(&CallShape) -> Option<Vec<RouteField>>,
}

/// Registration order is evaluation order.
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule {
            name: "response",
            applies: response_applies,
            extract: extract_response,
        },
        Rule {
            name: "receive",
            applies: receive_applies,
            extract: extract_receive,
        },
        Rule {
            name: "header",
            applies: header_applies,
            extract: extract_header,
        },
        Rule {
            name: "parameter",
            applies: parameter_applies,
            extract: extract_parameter,
        },
    ]
}

const STATUS_TYPES: &[&str] = &["StatusCode", "HttpStatusCode"];

fn response_applies(shape: &CallShape) -> bool {
    shape.is_call_rooted() && shape.method.starts_with("respond")
}

fn extract_response(shape: &CallShape) -> Option<Vec<RouteField>> {
    let method = shape.method.as_str();

    let explicit = shape
        .args
        .iter()
        .enumerate()
        .find_map(|(i, a)| status_of(a).map(|status| (i, status)))
        .or_else(|| unresolved_status(shape).map(|status| (0, status)));
    let status_index = explicit.as_ref().map(|(i, _)| *i);
    let status = match explicit {
        Some((_, status)) => status,
        None if method == "respond_redirect" => {
            let permanent = shape.args.get(1) == Some(&ArgShape::Bool(true));
            LocalReference::int(if permanent { 301 } else { 302 })
        }
        None => LocalReference::int(200),
    };

    if method == "respond_redirect" {
        return Some(vec![RouteField::Response(ResponseField::new(status))]);
    }

    // Remaining arguments: the first is the body, media types may follow it
    let mut body: Option<&ArgShape> = None;
    let mut content_type: Option<LocalReference> = None;
    for (i, arg) in shape.args.iter().enumerate() {
        if Some(i) == status_index {
            continue;
        }
        match media_type_of(arg, body.is_some()) {
            Some(media) if content_type.is_none() => content_type = Some(media),
            Some(_) => {}
            None if body.is_none() => body = Some(arg),
            None => {}
        }
    }

    let explicit_schema = shape
        .type_args
        .iter()
        .filter(|t| !is_status_type(t))
        .find_map(|t| t.type_ref.clone());

    let (default_media, method_schema) = match method {
        "respond_text" => (Some("text/plain"), Some(TypeReference::string())),
        "respond_html" => (Some("text/html"), Some(TypeReference::string())),
        "respond_bytes" => (
            Some("application/octet-stream"),
            Some(TypeReference::primitive(PrimitiveType::Binary)),
        ),
        _ => match body {
            Some(ArgShape::Str(_)) => (Some("text/plain"), None),
            Some(_) => (Some("application/json"), None),
            None if explicit_schema.is_some() => (Some("application/json"), None),
            None => (None, None),
        },
    };

    let mut response = ResponseField::new(status);
    response.type_ref = explicit_schema
        .or(method_schema)
        .or_else(|| body.and_then(ArgShape::type_ref));
    response.content_type = content_type.or_else(|| default_media.map(LocalReference::str));
    Some(vec![RouteField::Response(response)])
}

fn is_status_type(type_arg: &TypeArg) -> bool {
    let last = type_arg.name.rsplit("::").next().unwrap_or(&type_arg.name);
    STATUS_TYPES.contains(&last)
}

/// `respond(status, body)` where the leading local could not be resolved to a status.
fn unresolved_status(shape: &CallShape) -> Option<LocalReference> {
    if shape.method == "respond_redirect" {
        return None;
    }
    match shape.args.as_slice() {
        [ArgShape::Path(name), rest @ ..]
            if !name.contains("::") && rest.iter().any(|a| media_type_of(a, true).is_none()) =>
        {
            Some(LocalReference::symbolic(name.clone()))
        }
        _ => None,
    }
}

/// Explicit status argument: `StatusCode::X`, `StatusCode::from_u16(n)` or a literal
/// in the status range.
pub fn status_of(arg: &ArgShape) -> Option<LocalReference> {
    match arg {
        ArgShape::Int(n) if (100..=599).contains(n) => Some(LocalReference::int(*n)),
        ArgShape::Path(path) => {
            let first = path.split("::").next().unwrap_or(path);
            if STATUS_TYPES.contains(&first)
                || (path.contains("::") && http::status_for_name(path).is_some())
            {
                Some(LocalReference::symbolic(path.clone()))
            } else {
                None
            }
        }
        ArgShape::Call { func, args } => {
            let owner = func.split("::").next().unwrap_or(func);
            match args.as_slice() {
                [ArgShape::Int(n)] if STATUS_TYPES.contains(&owner) => {
                    Some(LocalReference::int(*n))
                }
                _ => None,
            }
        }
        _ => None,
    }
}

/// A media type argument. String literals only count after the body, where they
/// cannot be the body itself.
fn media_type_of(arg: &ArgShape, after_body: bool) -> Option<LocalReference> {
    match arg {
        ArgShape::Path(path) if http::media_type_for_name(path).is_some() => {
            Some(LocalReference::symbolic(path.clone()))
        }
        ArgShape::Call { func, args } if func.ends_with("parse") => match args.as_slice() {
            [ArgShape::Str(s)] if looks_like_media_type(s) => Some(LocalReference::str(s.clone())),
            _ => None,
        },
        ArgShape::Str(s) if after_body && looks_like_media_type(s) => {
            Some(LocalReference::str(s.clone()))
        }
        _ => None,
    }
}

fn looks_like_media_type(s: &str) -> bool {
    match s.split_once('/') {
        Some((kind, sub)) => {
            !kind.is_empty()
                && !sub.is_empty()
                && !s.contains(char::is_whitespace)
                && kind.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        }
        None => false,
    }
}

fn receive_applies(shape: &CallShape) -> bool {
    shape.is_call_rooted() && shape.method.starts_with("receive")
}

fn extract_receive(shape: &CallShape) -> Option<Vec<RouteField>> {
    let mut body = received_body(&shape.method, shape.type_args.first())?;
    if body.type_ref.is_none() {
        body.type_ref = shape.expected.clone();
    }
    Some(vec![RouteField::RequestBody(body)])
}

/// Request body read by a `receive*` call.
pub fn received_body(method: &str, type_arg: Option<&TypeArg>) -> Option<RequestBodyField> {
    let declared = type_arg.and_then(|t| t.type_ref.clone());
    let (type_ref, media) = match method {
        "receive" | "receive_json" => (declared, None),
        "receive_text" => (Some(TypeReference::string()), Some("text/plain")),
        "receive_bytes" => (
            Some(TypeReference::primitive(PrimitiveType::Binary)),
            Some("application/octet-stream"),
        ),
        "receive_form" => (declared, Some("application/x-www-form-urlencoded")),
        "receive_multipart" => (None, Some("multipart/form-data")),
        _ => return None,
    };
    Some(RequestBodyField {
        type_ref,
        content_type: media.map(LocalReference::str),
        description: None,
    })
}

fn header_applies(shape: &CallShape) -> bool {
    shape.is_call_rooted() && shape.method == "header" && shape.last_accessor() == Some("request")
}

fn extract_header(shape: &CallShape) -> Option<Vec<RouteField>> {
    match shape.args.as_slice() {
        [arg] => {
            let name = arg.key()?;
            Some(vec![RouteField::Parameter(ParameterField::new(
                ParameterLocation::Header,
                name,
            ))])
        }
        _ => None,
    }
}

fn parameter_applies(shape: &CallShape) -> bool {
    shape.is_call_rooted() && shape.method == "get" && !shape.accessors.is_empty()
}

fn extract_parameter(shape: &CallShape) -> Option<Vec<RouteField>> {
    let [arg] = shape.args.as_slice() else {
        return None;
    };
    let name = arg.key()?;
    let location = match shape.last_accessor() {
        Some("headers") => ParameterLocation::Header,
        Some("path_parameters" | "path_params") => ParameterLocation::Path,
        Some("query_parameters" | "query_params") => ParameterLocation::Query,
        Some("cookies") => ParameterLocation::Cookie,
        _ => ParameterLocation::Unknown,
    };
    Some(vec![RouteField::Parameter(ParameterField::new(location, name))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{CollectingDiagnostics, Severity};
    use crate::inference::InferenceEngine;
    use pretty_assertions::assert_eq;

    fn infer(shape: &CallShape) -> Vec<RouteField> {
        InferenceEngine::default().infer(shape, &CollectingDiagnostics::new())
    }

    fn only_response(fields: Vec<RouteField>) -> ResponseField {
        match fields.as_slice() {
            [RouteField::Response(r)] => r.clone(),
            other => panic!("expected one response, got {:?}", other),
        }
    }

    fn book() -> TypeReference {
        TypeReference::crate_type("Book", "crate::Book")
    }

    #[test]
    fn test_rule_order() {
        assert_eq!(
            InferenceEngine::default().rule_names(),
            vec!["response", "receive", "header", "parameter"]
        );
    }

    #[test]
    fn test_respond_with_status_and_turbofish() {
        let shape = CallShape::on_call(
            &[],
            "respond",
            vec![ArgShape::Path("StatusCode::NOT_FOUND".into()), ArgShape::Other],
        )
        .with_type_arg("Book", Some(book()));
        let response = only_response(infer(&shape));
        assert_eq!(response.status, LocalReference::symbolic("StatusCode::NOT_FOUND"));
        assert_eq!(response.type_ref, Some(book()));
        assert_eq!(
            response.content_type,
            Some(LocalReference::str("application/json"))
        );
    }

    #[test]
    fn test_leading_unresolved_local_is_the_status() {
        let shape = CallShape::on_call(
            &[],
            "respond",
            vec![
                ArgShape::Path("status".into()),
                ArgShape::Wrapped {
                    wrapper: "Json".into(),
                    inner: Box::new(ArgShape::Typed(book())),
                },
            ],
        );
        let response = only_response(infer(&shape));
        assert_eq!(response.status, LocalReference::symbolic("status"));
        assert_eq!(response.type_ref, Some(book()));

        // A body followed by its media type keeps the local as the body
        let shape = CallShape::on_call(
            &[],
            "respond",
            vec![ArgShape::Path("page".into()), ArgShape::Str("text/html".into())],
        );
        let response = only_response(infer(&shape));
        assert_eq!(response.status, LocalReference::int(200));
        assert_eq!(response.content_type, Some(LocalReference::str("text/html")));
    }

    #[test]
    fn test_status_type_argument_is_skipped_for_schema() {
        let shape = CallShape::on_call(&[], "respond", vec![])
            .with_type_arg("HttpStatusCode", None)
            .with_type_arg("Book", Some(book()));
        let response = only_response(infer(&shape));
        assert_eq!(response.status, LocalReference::int(200));
        assert_eq!(response.type_ref, Some(book()));
    }

    #[test]
    fn test_respond_defaults_by_method() {
        let text = only_response(infer(&CallShape::on_call(
            &[],
            "respond_text",
            vec![ArgShape::Str("hello".into())],
        )));
        assert_eq!(text.status, LocalReference::int(200));
        assert_eq!(text.content_type, Some(LocalReference::str("text/plain")));
        assert_eq!(text.type_ref, Some(TypeReference::string()));

        let bytes = only_response(infer(&CallShape::on_call(
            &[],
            "respond_bytes",
            vec![ArgShape::Path("data".into())],
        )));
        assert_eq!(
            bytes.content_type,
            Some(LocalReference::str("application/octet-stream"))
        );
        assert_eq!(
            bytes.type_ref,
            Some(TypeReference::primitive(PrimitiveType::Binary))
        );

        let empty = only_response(infer(&CallShape::on_call(
            &[],
            "respond",
            vec![ArgShape::Int(204)],
        )));
        assert_eq!(empty.status, LocalReference::int(204));
        assert_eq!(empty.content_type, None);
        assert_eq!(empty.type_ref, None);
    }

    #[test]
    fn test_redirect_status() {
        let temporary = only_response(infer(&CallShape::on_call(
            &[],
            "respond_redirect",
            vec![ArgShape::Str("/login".into())],
        )));
        assert_eq!(temporary.status, LocalReference::int(302));

        let permanent = only_response(infer(&CallShape::on_call(
            &[],
            "respond_redirect",
            vec![ArgShape::Str("/new".into()), ArgShape::Bool(true)],
        )));
        assert_eq!(permanent.status, LocalReference::int(301));
        assert_eq!(permanent.content_type, None);
    }

    #[test]
    fn test_explicit_content_type_argument() {
        let response = only_response(infer(&CallShape::on_call(
            &[],
            "respond_text",
            vec![
                ArgShape::Str("<b>hi</b>".into()),
                ArgShape::Path("ContentType::Text::Html".into()),
                ArgShape::Call {
                    func: "StatusCode::from_u16".into(),
                    args: vec![ArgShape::Int(202)],
                },
            ],
        )));
        assert_eq!(response.status, LocalReference::int(202));
        assert_eq!(
            response.content_type,
            Some(LocalReference::symbolic("ContentType::Text::Html"))
        );

        let response = only_response(infer(&CallShape::on_call(
            &[],
            "respond_text",
            vec![ArgShape::Str("a,b".into()), ArgShape::Str("text/csv".into())],
        )));
        assert_eq!(response.content_type, Some(LocalReference::str("text/csv")));
    }

    #[test]
    fn test_body_shape_gives_schema() {
        let response = only_response(infer(&CallShape::on_call(
            &[],
            "respond",
            vec![ArgShape::Wrapped {
                wrapper: "Json".into(),
                inner: Box::new(ArgShape::StructLit(book())),
            }],
        )));
        assert_eq!(response.type_ref, Some(book()));
    }

    #[test]
    fn test_parameter_locations_by_accessor() {
        let cases = [
            (vec!["parameters"], ParameterLocation::Unknown),
            (vec!["request", "query_parameters"], ParameterLocation::Query),
            (vec!["request", "headers"], ParameterLocation::Header),
            (vec!["path_parameters"], ParameterLocation::Path),
            (vec!["request", "cookies"], ParameterLocation::Cookie),
            (vec!["request"], ParameterLocation::Unknown),
        ];
        for (accessors, location) in cases {
            let shape = CallShape::on_call(&accessors, "get", vec![ArgShape::Str("id".into())]);
            assert_eq!(
                infer(&shape),
                vec![RouteField::Parameter(ParameterField::new(
                    location,
                    LocalReference::str("id")
                ))],
                "accessors {:?}",
                accessors
            );
        }
    }

    #[test]
    fn test_parameter_requires_exactly_one_key() {
        let shape = CallShape::on_call(
            &["parameters"],
            "get",
            vec![ArgShape::Str("a".into()), ArgShape::Str("b".into())],
        );
        assert!(infer(&shape).is_empty());

        let shape = CallShape::on_call(&["parameters"], "get", vec![ArgShape::Int(1)]);
        assert!(infer(&shape).is_empty());

        // Symbolic keys are kept for the assembler to decide on
        let shape = CallShape::on_call(&["parameters"], "get", vec![ArgShape::Path("key".into())]);
        assert_eq!(infer(&shape).len(), 1);
    }

    #[test]
    fn test_header_on_request() {
        let shape =
            CallShape::on_call(&["request"], "header", vec![ArgShape::Str("X-Token".into())]);
        assert_eq!(
            infer(&shape),
            vec![RouteField::Parameter(ParameterField::new(
                ParameterLocation::Header,
                LocalReference::str("X-Token")
            ))]
        );

        let shape = CallShape::on_call(&["response"], "header", vec![ArgShape::Str("X".into())]);
        assert!(infer(&shape).is_empty());
    }

    #[test]
    fn test_receive_variants() {
        let shape = CallShape::on_call(&[], "receive", vec![]).with_type_arg("Book", Some(book()));
        assert_eq!(
            infer(&shape),
            vec![RouteField::RequestBody(RequestBodyField {
                type_ref: Some(book()),
                content_type: None,
                description: None,
            })]
        );

        let mut shape = CallShape::on_call(&[], "receive_form", vec![]);
        shape.expected = Some(book());
        let RouteField::RequestBody(body) = &infer(&shape)[0] else {
            panic!("expected request body");
        };
        assert_eq!(body.type_ref, Some(book()));
        assert_eq!(
            body.content_type,
            Some(LocalReference::str("application/x-www-form-urlencoded"))
        );

        assert!(infer(&CallShape::on_call(&[], "receive_channel", vec![])).is_empty());
    }

    #[test]
    fn test_unmatched_shape_reports_debug_only() {
        let diagnostics = CollectingDiagnostics::new();
        let shape = CallShape::on_call(&["application"], "environment", vec![]);
        let fields = InferenceEngine::default().infer(&shape, &diagnostics);
        assert!(fields.is_empty());
        assert_eq!(diagnostics.reports().len(), 1);
        assert!(diagnostics.at_least(Severity::Info).is_empty());
    }
}
