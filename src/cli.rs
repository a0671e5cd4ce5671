use crate::config::{parse_pair, PluginOptions};
use crate::diagnostics::LogDiagnostics;
use crate::extension::OpenApiExtension;
use crate::scanner::FileScanner;
use crate::serializer::{serialize_json, serialize_yaml, write_to_file};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};

/// Infers an OpenAPI document from route declarations, handler doc comments and
/// handler call sites
#[derive(Parser, Debug)]
#[command(name = "openapi-inference")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the Rust project directory
    #[arg(value_name = "PROJECT_PATH")]
    pub project_path: PathBuf,

    /// Output format (json or yaml)
    #[arg(short = 'f', long = "format", value_enum, default_value = "json")]
    pub output_format: OutputFormat,

    /// Output file path, `-` for stdout; overrides the `output` option
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Plugin option as key=value (e.g. codeInference=false); repeatable
    #[arg(short = 'O', long = "option", value_name = "KEY=VALUE", value_parser = parse_pair)]
    pub options: Vec<(String, String)>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

impl CliArgs {
    /// Plugin options from `-O` pairs, with `-o` taking precedence over `output`.
    pub fn plugin_options(&self) -> Result<PluginOptions> {
        let mut options = PluginOptions::from_pairs(self.options.iter().cloned())
            .context("Invalid plugin options")?;
        if let Some(output) = &self.output_path {
            options.output = Some(output.clone());
        }
        Ok(options)
    }
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    // Validate project path exists
    if !args.project_path.exists() {
        anyhow::bail!(
            "Project path does not exist: {}",
            args.project_path.display()
        );
    }

    // Validate project path is a directory
    if !args.project_path.is_dir() {
        anyhow::bail!(
            "Project path is not a directory: {}",
            args.project_path.display()
        );
    }

    info!("Project path: {}", args.project_path.display());
    info!("Output format: {:?}", args.output_format);
    Ok(args)
}

/// Run the main workflow
pub fn run(args: &CliArgs, options: PluginOptions) -> Result<()> {
    info!("Starting OpenAPI inference for {}", args.project_path.display());

    let scanner = FileScanner::new(args.project_path.clone());
    let scan_result = scanner.scan()?;
    info!("Found {} Rust files", scan_result.sources.len());
    for warning in &scan_result.warnings {
        warn!("{}", warning);
    }
    if scan_result.sources.is_empty() {
        anyhow::bail!("No Rust files found in the project directory");
    }

    let diagnostics = LogDiagnostics;
    let mut extension = OpenApiExtension::new(options, &diagnostics);
    extension
        .compile_sources(&scan_result.sources)
        .context("Compilation aborted")?;

    let Some(document) = extension.finalize()? else {
        info!("Extension disabled; no document generated");
        return Ok(());
    };
    info!(
        "Assembled {} paths from {} routes",
        document.paths.len(),
        extension.lookup().len()
    );

    let output = match extension.options().output_path() {
        Ok(path) => path.clone(),
        Err(e) => {
            // Not fatal: the analysis ran, only the write is skipped
            error!("{}; the OpenAPI document was not written", e);
            return Ok(());
        }
    };

    let content = match args.output_format {
        OutputFormat::Json => serialize_json(&document)?,
        OutputFormat::Yaml => serialize_yaml(&document)?,
    };
    if output == Path::new("-") {
        print!("{}", content);
    } else {
        write_to_file(&content, &output)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        info!("Wrote OpenAPI document to {}", output.display());
    }
    Ok(())
}
