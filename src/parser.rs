use crate::error::{Error, Result};
use crate::scanner::SourceFile;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// AST (Abstract Syntax Tree) parser for Rust source files.
///
/// The `AstParser` uses the `syn` crate to parse each module of the analysed project. Spans keep
/// their line/column positions, which is what route keys are built from.
///
/// # Example
///
/// ```no_run
/// use openapi_inference::parser::AstParser;
/// use openapi_inference::scanner::SourceFile;
/// use std::path::PathBuf;
///
/// let source = SourceFile { path: PathBuf::from("src/main.rs"), module: "crate".into() };
/// let parsed = AstParser::parse_file(&source).unwrap();
/// println!("Parsed {} items", parsed.syntax_tree.items.len());
/// ```
pub struct AstParser;

/// A successfully parsed module with its abstract syntax tree.
#[derive(Debug)]
pub struct ParsedModule {
    /// Path to the source file
    pub path: PathBuf,
    /// Module path of the file (e.g. `crate::routes`)
    pub module: String,
    /// The parsed abstract syntax tree
    pub syntax_tree: syn::File,
}

impl ParsedModule {
    /// Parses in-memory source text as a module.
    pub fn from_source(module: &str, path: &Path, content: &str) -> Result<Self> {
        let syntax_tree = syn::parse_file(content).map_err(|e| {
            let start = e.span().start();
            Error::SourceParse {
                file: path.to_path_buf(),
                message: format!("{} (line {}, column {})", e, start.line, start.column),
            }
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            module: module.to_string(),
            syntax_tree,
        })
    }
}

impl AstParser {
    /// Reads and parses a single source file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IoError`] if the file cannot be read and [`Error::SourceParse`] if it
    /// contains invalid Rust syntax.
    pub fn parse_file(source: &SourceFile) -> Result<ParsedModule> {
        debug!("Parsing file: {}", source.path.display());

        let content = fs::read_to_string(&source.path)?;
        let parsed = ParsedModule::from_source(&source.module, &source.path, &content)?;

        debug!(
            "Successfully parsed {} as {}",
            source.path.display(),
            source.module
        );
        Ok(parsed)
    }

    /// Parses every source file, stopping at the first failure.
    ///
    /// A module that does not parse is an upstream compilation error: nothing must be
    /// generated from a partially parsed project, so the error is returned as-is.
    pub fn parse_all(sources: &[SourceFile]) -> Result<Vec<ParsedModule>> {
        debug!("Parsing {} files", sources.len());

        let mut modules = Vec::with_capacity(sources.len());
        for source in sources {
            match Self::parse_file(source) {
                Ok(parsed) => modules.push(parsed),
                Err(e) => {
                    warn!("Failed to parse {}: {}", source.path.display(), e);
                    return Err(e);
                }
            }
        }
        Ok(modules)
    }
}
