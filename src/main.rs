//! openapi-inference - command-line front end.
//!
//! Scans a Rust project, runs documentation analysis and call-site inference over its
//! route handlers and writes the resulting OpenAPI 3.1 document.
//!
//! # Usage
//!
//! ```bash
//! openapi-inference [OPTIONS] <PROJECT_PATH>
//! ```
//!
//! # Examples
//!
//! Write JSON to a file:
//! ```bash
//! openapi-inference ./library-service -o openapi.json
//! ```
//!
//! YAML on stdout, documentation only:
//! ```bash
//! openapi-inference ./library-service -f yaml -o - -O codeInference=false
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use openapi_inference::cli;
use openapi_inference::config::PluginOptions;
use std::fs;

/// Log file name inside `logDir`
const LOG_FILE_NAME: &str = "openapi-inference.log";

fn main() -> Result<()> {
    let args = cli::CliArgs::parse();
    let options = args.plugin_options()?;
    init_logger(args.verbose, &options)?;

    info!("openapi-inference starting...");

    let args = cli::parse_args_from_parsed(args)?;
    cli::run(&args, options)?;

    info!("OpenAPI inference completed");
    Ok(())
}

fn init_logger(verbose: bool, options: &PluginOptions) -> Result<()> {
    let log_level = if verbose || options.debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(log_level);
    if let Some(log_dir) = &options.log_dir {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
        let path = log_dir.join(LOG_FILE_NAME);
        let file = fs::File::create(&path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}
