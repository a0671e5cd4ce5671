//! Normalized schema shapes and the `[Name]`, `[Name]+`, `[Name]?` reference syntax.
//!
//! A [`TypeReference`] is produced both from documentation comments and from code
//! types; where it came from does not matter once it is built. Resolution of names
//! against a module lives in [`crate::type_resolver`].

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Schema reference syntax used in documentation comments.
static TYPE_SYNTAX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[([A-Za-z_][A-Za-z0-9_]*(?:::[A-Za-z_][A-Za-z0-9_]*)*)\]([+?])?$")
        .expect("valid type syntax regex")
});

/// Primitive types with a direct OpenAPI representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    String,
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    F32,
    F64,
    Bool,
    Char,
    Binary,
    Uuid,
    DateTime,
    Date,
}

impl PrimitiveType {
    /// Parses a primitive type name. Besides Rust names, a few spellings common in
    /// prose documentation are accepted.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "String" | "str" | "Str" | "string" => Some(PrimitiveType::String),
            "i8" => Some(PrimitiveType::I8),
            "i16" => Some(PrimitiveType::I16),
            "i32" | "Int" | "Integer" | "integer" => Some(PrimitiveType::I32),
            "i64" | "Long" | "isize" => Some(PrimitiveType::I64),
            "i128" => Some(PrimitiveType::I128),
            "u8" => Some(PrimitiveType::U8),
            "u16" => Some(PrimitiveType::U16),
            "u32" => Some(PrimitiveType::U32),
            "u64" | "usize" => Some(PrimitiveType::U64),
            "u128" => Some(PrimitiveType::U128),
            "f32" | "Float" => Some(PrimitiveType::F32),
            "f64" | "Double" | "Number" | "number" => Some(PrimitiveType::F64),
            "bool" | "Boolean" | "boolean" => Some(PrimitiveType::Bool),
            "char" => Some(PrimitiveType::Char),
            "Bytes" | "ByteArray" | "Binary" => Some(PrimitiveType::Binary),
            "Uuid" | "UUID" => Some(PrimitiveType::Uuid),
            "DateTime" | "OffsetDateTime" | "NaiveDateTime" | "Instant" => {
                Some(PrimitiveType::DateTime)
            }
            "NaiveDate" | "Date" | "LocalDate" => Some(PrimitiveType::Date),
            _ => None,
        }
    }

    /// OpenAPI `(type, format)` pair.
    pub fn openapi_type(&self) -> (&'static str, Option<&'static str>) {
        match self {
            PrimitiveType::String | PrimitiveType::Char => ("string", None),
            PrimitiveType::I8 | PrimitiveType::I16 | PrimitiveType::I32 => {
                ("integer", Some("int32"))
            }
            PrimitiveType::I64 | PrimitiveType::I128 => ("integer", Some("int64")),
            PrimitiveType::U8 | PrimitiveType::U16 | PrimitiveType::U32 => {
                ("integer", Some("int32"))
            }
            PrimitiveType::U64 | PrimitiveType::U128 => ("integer", Some("int64")),
            PrimitiveType::F32 => ("number", Some("float")),
            PrimitiveType::F64 => ("number", Some("double")),
            PrimitiveType::Bool => ("boolean", None),
            PrimitiveType::Binary => ("string", Some("binary")),
            PrimitiveType::Uuid => ("string", Some("uuid")),
            PrimitiveType::DateTime => ("string", Some("date-time")),
            PrimitiveType::Date => ("string", Some("date")),
        }
    }
}

/// How a named reference was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resolution {
    Primitive(PrimitiveType),
    /// A struct or enum of the analysed crate, by qualified path.
    Crate(String),
    /// Unresolvable; kept by name only.
    Opaque,
}

/// Normalized schema shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeReference {
    Named { name: String, resolution: Resolution },
    Array(Box<TypeReference>),
    Optional(Box<TypeReference>),
    Union(Vec<TypeReference>),
}

impl TypeReference {
    pub fn primitive(primitive: PrimitiveType) -> Self {
        let name = match primitive {
            PrimitiveType::Binary => "Bytes".to_string(),
            other => format!("{:?}", other),
        };
        TypeReference::Named {
            name,
            resolution: Resolution::Primitive(primitive),
        }
    }

    pub fn string() -> Self {
        Self::primitive(PrimitiveType::String)
    }

    pub fn crate_type(name: impl Into<String>, qualified: impl Into<String>) -> Self {
        TypeReference::Named {
            name: name.into(),
            resolution: Resolution::Crate(qualified.into()),
        }
    }

    pub fn opaque(name: impl Into<String>) -> Self {
        TypeReference::Named {
            name: name.into(),
            resolution: Resolution::Opaque,
        }
    }

    pub fn array(inner: TypeReference) -> Self {
        TypeReference::Array(Box::new(inner))
    }

    pub fn optional(inner: TypeReference) -> Self {
        TypeReference::Optional(Box::new(inner))
    }

    /// Builds a union, flattening nested unions and dropping duplicates.
    pub fn union(members: Vec<TypeReference>) -> Self {
        let mut flat: Vec<TypeReference> = Vec::new();
        for member in members {
            let parts = match member {
                TypeReference::Union(inner) => inner,
                other => vec![other],
            };
            for part in parts {
                if !flat.contains(&part) {
                    flat.push(part);
                }
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            TypeReference::Union(flat)
        }
    }

    /// Whether the outermost shape is optional.
    pub fn is_optional(&self) -> bool {
        matches!(self, TypeReference::Optional(_))
    }
}

impl fmt::Display for TypeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeReference::Named { name, .. } => write!(f, "{}", name),
            TypeReference::Array(inner) => write!(f, "[{}]", inner),
            TypeReference::Optional(inner) => write!(f, "{}?", inner),
            TypeReference::Union(members) => {
                let parts: Vec<String> = members.iter().map(|m| m.to_string()).collect();
                write!(f, "{}", parts.join(" | "))
            }
        }
    }
}

/// A parsed `[Name]`, `[Name]+` or `[Name]?` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSyntax {
    pub name: String,
    pub array: bool,
    pub optional: bool,
}

impl TypeSyntax {
    /// Parses one token. Anything other than the three accepted shapes is `None`.
    pub fn parse(token: &str) -> Option<Self> {
        let captures = TYPE_SYNTAX_PATTERN.captures(token.trim())?;
        let name = captures.get(1)?.as_str().to_string();
        let suffix = captures.get(2).map(|m| m.as_str());
        Some(Self {
            name,
            array: suffix == Some("+"),
            optional: suffix == Some("?"),
        })
    }

    /// Wraps the resolved name according to the suffix.
    pub fn to_reference(&self, resolved: TypeReference) -> TypeReference {
        if self.array {
            TypeReference::array(resolved)
        } else if self.optional {
            TypeReference::optional(resolved)
        } else {
            resolved
        }
    }
}
