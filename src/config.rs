//! Plugin options.
//!
//! Options arrive as opaque `key=value` pairs (`-O codeInference=false`) and are
//! deserialized into [`PluginOptions`]. Only the literals `true` and `false` are
//! treated as booleans; every other value is a string.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct PluginOptions {
    /// Disables the whole extension when false
    pub enabled: bool,
    pub debug: bool,
    /// Runs call-site inference in addition to documentation analysis
    pub code_inference: bool,
    /// Only routes whose handler carries a doc comment are analysed
    pub only_commented: bool,
    pub log_dir: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub title: String,
    pub version: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub terms_of_service: Option<String>,
    pub contact: Option<String>,
    pub license: Option<String>,
}

impl Default for PluginOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            debug: false,
            code_inference: true,
            only_commented: false,
            log_dir: None,
            output: None,
            title: "API".to_string(),
            version: "1.0.0".to_string(),
            summary: None,
            description: None,
            terms_of_service: None,
            contact: None,
            license: None,
        }
    }
}

impl PluginOptions {
    /// Builds options from `key=value` pairs; later pairs override earlier ones.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for unknown keys or values of the wrong kind.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut map = serde_json::Map::new();
        for (key, value) in pairs {
            let value = match value.as_ref() {
                "true" => serde_json::Value::Bool(true),
                "false" => serde_json::Value::Bool(false),
                other => serde_json::Value::String(other.to_string()),
            };
            map.insert(key.into(), value);
        }
        serde_json::from_value(serde_json::Value::Object(map))
            .map_err(|e| Error::Configuration(format!("invalid plugin option: {}", e)))
    }

    /// Output path, required when the document is written.
    pub fn output_path(&self) -> Result<&PathBuf> {
        self.output
            .as_ref()
            .ok_or_else(|| Error::Configuration("no output path configured".to_string()))
    }
}

/// Parses one `key=value` argument.
pub fn parse_pair(arg: &str) -> std::result::Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got {:?}", arg)),
    }
}
