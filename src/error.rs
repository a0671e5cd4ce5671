use std::path::PathBuf;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error types surfaced by the library.
///
/// Comment parse failures, inference misses and unresolvable type names are not
/// errors: they are reported through [`crate::diagnostics::Diagnostics`] and the
/// pipeline keeps going. Only the cases below can stop a compilation or the final
/// document write.
#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),
    /// A source module failed to parse; the compilation is aborted.
    SourceParse { file: PathBuf, message: String },
    /// A required option is missing or malformed.
    Configuration(String),
    SerializationError(String),
    /// Finalization was requested for a compilation that did not complete.
    Aborted,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "IO error: {}", e),
            Error::SourceParse { file, message } => {
                write!(f, "failed to parse {}: {}", file.display(), message)
            }
            Error::Configuration(msg) => write!(f, "configuration error: {}", msg),
            Error::SerializationError(msg) => write!(f, "serialization error: {}", msg),
            Error::Aborted => write!(f, "compilation was aborted before finalization"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(format!("JSON: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::SerializationError(format!("YAML: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_source_parse_display_names_file() {
        let err = Error::SourceParse {
            file: PathBuf::from("src/routes.rs"),
            message: "expected `;`".to_string(),
        };
        assert_eq!(err.to_string(), "failed to parse src/routes.rs: expected `;`");
    }

    #[test]
    fn test_io_error_keeps_source() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.source().is_some());
        assert!(Error::Aborted.source().is_none());
    }
}
