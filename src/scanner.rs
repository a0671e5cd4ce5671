use anyhow::Result;
use log::warn;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// File scanner for traversing project directories.
///
/// The `FileScanner` recursively walks through a project directory to find all Rust source files
/// and assigns each of them the module path it compiles to. It skips the `target` directory and
/// hidden directories (those starting with `.`).
///
/// # Example
///
/// ```no_run
/// use openapi_inference::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let scanner = FileScanner::new(PathBuf::from("./my-project"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} Rust files", result.sources.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
}

/// A discovered source file and its module path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Module path such as `crate::routes::books`
    pub module: String,
}

/// Result of directory scanning operation.
pub struct ScanResult {
    /// Discovered `.rs` files, sorted by path
    pub sources: Vec<SourceFile>,
    /// Warning messages for any issues encountered (e.g., inaccessible directories)
    pub warnings: Vec<String>,
}

impl FileScanner {
    /// Creates a new `FileScanner` for the specified root directory.
    pub fn new(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Scans the directory tree and collects all `.rs` files.
    ///
    /// Inaccessible entries are recorded as warnings and scanning continues. The result is
    /// sorted by path so that later passes see modules in a stable order.
    pub fn scan(&self) -> Result<ScanResult> {
        let mut sources = Vec::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(&self.root_path)
            .into_iter()
            .filter_entry(|e| {
                if e.path() == self.root_path {
                    return true;
                }
                let file_name = e.file_name().to_string_lossy();
                !file_name.starts_with('.') && file_name != "target"
            })
        {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("rs")
                    {
                        let relative = path.strip_prefix(&self.root_path).unwrap_or(path);
                        sources.push(SourceFile {
                            path: path.to_path_buf(),
                            module: module_path_for(relative),
                        });
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        sources.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(ScanResult { sources, warnings })
    }
}

/// Derives the module path of a file from its path relative to the project root.
///
/// `src/lib.rs` and `src/main.rs` are the crate root, `src/a/mod.rs` is `crate::a`,
/// `src/a/b.rs` is `crate::a::b`. Files outside `src` keep their directory names
/// (`tests/api.rs` becomes `tests::api`).
pub fn module_path_for(relative: &Path) -> String {
    let mut segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();

    if let Some(last) = segments.last_mut() {
        if let Some(stem) = last.strip_suffix(".rs") {
            *last = stem.to_string();
        }
    }

    let in_src = segments.first().map(|s| s == "src").unwrap_or(false);
    if in_src {
        segments.remove(0);
        if segments.len() == 1 && (segments[0] == "lib" || segments[0] == "main") {
            segments.clear();
        }
    }
    if segments.last().map(|s| s == "mod").unwrap_or(false) {
        segments.pop();
    }

    if in_src {
        let mut module = vec!["crate".to_string()];
        module.extend(segments);
        module.join("::")
    } else {
        segments.join("::")
    }
}
