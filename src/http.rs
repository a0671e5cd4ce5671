//! Status code and media type tables used to resolve symbolic references.

use crate::model::{Literal, LocalReference};
use serde::{Serialize, Serializer};
use std::fmt;

const STATUS_CODES: &[(&str, u16, &str)] = &[
    ("CONTINUE", 100, "Continue"),
    ("SWITCHING_PROTOCOLS", 101, "Switching Protocols"),
    ("OK", 200, "OK"),
    ("CREATED", 201, "Created"),
    ("ACCEPTED", 202, "Accepted"),
    ("NON_AUTHORITATIVE_INFORMATION", 203, "Non-Authoritative Information"),
    ("NO_CONTENT", 204, "No Content"),
    ("RESET_CONTENT", 205, "Reset Content"),
    ("PARTIAL_CONTENT", 206, "Partial Content"),
    ("MULTIPLE_CHOICES", 300, "Multiple Choices"),
    ("MOVED_PERMANENTLY", 301, "Moved Permanently"),
    ("FOUND", 302, "Found"),
    ("SEE_OTHER", 303, "See Other"),
    ("NOT_MODIFIED", 304, "Not Modified"),
    ("TEMPORARY_REDIRECT", 307, "Temporary Redirect"),
    ("PERMANENT_REDIRECT", 308, "Permanent Redirect"),
    ("BAD_REQUEST", 400, "Bad Request"),
    ("UNAUTHORIZED", 401, "Unauthorized"),
    ("PAYMENT_REQUIRED", 402, "Payment Required"),
    ("FORBIDDEN", 403, "Forbidden"),
    ("NOT_FOUND", 404, "Not Found"),
    ("METHOD_NOT_ALLOWED", 405, "Method Not Allowed"),
    ("NOT_ACCEPTABLE", 406, "Not Acceptable"),
    ("REQUEST_TIMEOUT", 408, "Request Timeout"),
    ("CONFLICT", 409, "Conflict"),
    ("GONE", 410, "Gone"),
    ("LENGTH_REQUIRED", 411, "Length Required"),
    ("PRECONDITION_FAILED", 412, "Precondition Failed"),
    ("PAYLOAD_TOO_LARGE", 413, "Payload Too Large"),
    ("UNSUPPORTED_MEDIA_TYPE", 415, "Unsupported Media Type"),
    ("UNPROCESSABLE_ENTITY", 422, "Unprocessable Entity"),
    ("TOO_MANY_REQUESTS", 429, "Too Many Requests"),
    ("INTERNAL_SERVER_ERROR", 500, "Internal Server Error"),
    ("NOT_IMPLEMENTED", 501, "Not Implemented"),
    ("BAD_GATEWAY", 502, "Bad Gateway"),
    ("SERVICE_UNAVAILABLE", 503, "Service Unavailable"),
    ("GATEWAY_TIMEOUT", 504, "Gateway Timeout"),
];

const MEDIA_TYPES: &[(&str, &str)] = &[
    ("APPLICATION_JSON", "application/json"),
    ("APPLICATION_XML", "application/xml"),
    ("APPLICATION_OCTET_STREAM", "application/octet-stream"),
    ("APPLICATION_WWW_FORM_URLENCODED", "application/x-www-form-urlencoded"),
    ("APPLICATION_PDF", "application/pdf"),
    ("MULTIPART_FORM_DATA", "multipart/form-data"),
    ("TEXT_PLAIN", "text/plain"),
    ("TEXT_PLAIN_UTF_8", "text/plain"),
    ("TEXT_HTML", "text/html"),
    ("TEXT_HTML_UTF_8", "text/html"),
    ("TEXT_CSV", "text/csv"),
    ("TEXT_EVENT_STREAM", "text/event-stream"),
    ("IMAGE_PNG", "image/png"),
    ("IMAGE_JPEG", "image/jpeg"),
];

/// Converts `NotFound` / `notFound` / `NOT_FOUND` to `NOT_FOUND`.
fn constant_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch == '_' {
            out.push('_');
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower {
            out.push('_');
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        out.extend(ch.to_uppercase());
    }
    out
}

/// Looks up a status constant by its name or path (`StatusCode::NOT_FOUND`,
/// `HttpStatusCode::NotFound`).
pub fn status_for_name(name: &str) -> Option<u16> {
    let last = name.rsplit("::").next().unwrap_or(name).trim();
    let key = constant_case(last);
    STATUS_CODES
        .iter()
        .find(|(constant, _, _)| *constant == key)
        .map(|(_, code, _)| *code)
}

/// Reason phrase for a known status code.
pub fn reason_phrase(code: u16) -> Option<&'static str> {
    STATUS_CODES
        .iter()
        .find(|(_, c, _)| *c == code)
        .map(|(_, _, phrase)| *phrase)
}

/// Looks up a media type constant (`mime::APPLICATION_JSON`,
/// `ContentType::Application::Json`).
pub fn media_type_for_name(name: &str) -> Option<&'static str> {
    let segments: Vec<&str> = name.split("::").map(str::trim).collect();
    let last = segments.last().copied().unwrap_or(name);
    let key = constant_case(last);
    if let Some((_, media)) = MEDIA_TYPES.iter().find(|(c, _)| *c == key) {
        return Some(media);
    }
    // `ContentType::Application::Json` style: join the last two segments
    if segments.len() >= 2 {
        let joined = format!(
            "{}_{}",
            constant_case(segments[segments.len() - 2]),
            key
        );
        return MEDIA_TYPES
            .iter()
            .find(|(c, _)| *c == joined)
            .map(|(_, media)| *media);
    }
    None
}

/// Resolves a content type reference to a media type string.
pub fn resolve_media_type(reference: &LocalReference) -> Option<String> {
    match reference {
        LocalReference::Literal(Literal::Str(s)) if s.contains('/') => Some(s.clone()),
        LocalReference::Symbolic(name) => media_type_for_name(name).map(str::to_string),
        _ => None,
    }
}

/// Status key of a response; codes sort ascending, `default` last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResponseKey {
    Code(u16),
    Default,
}

impl ResponseKey {
    /// Resolves a status reference; anything that cannot be resolved is `default`.
    pub fn resolve(reference: &LocalReference) -> Self {
        match reference {
            LocalReference::Literal(Literal::Int(n)) if (100..=599).contains(n) => {
                ResponseKey::Code(*n as u16)
            }
            LocalReference::Literal(Literal::Str(s)) => match s.trim().parse::<u16>() {
                Ok(code) if (100..=599).contains(&code) => ResponseKey::Code(code),
                _ => status_for_name(s)
                    .map(ResponseKey::Code)
                    .unwrap_or(ResponseKey::Default),
            },
            LocalReference::Symbolic(name) => status_for_name(name)
                .map(ResponseKey::Code)
                .unwrap_or(ResponseKey::Default),
            _ => ResponseKey::Default,
        }
    }

    /// Fallback response description.
    pub fn default_description(&self) -> String {
        match self {
            ResponseKey::Code(code) => reason_phrase(*code)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Status {}", code)),
            ResponseKey::Default => "Other responses".to_string(),
        }
    }
}

impl fmt::Display for ResponseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseKey::Code(code) => write!(f, "{}", code),
            ResponseKey::Default => write!(f, "default"),
        }
    }
}

impl Serialize for ResponseKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
