//! Orchestrates one compilation: both passes over a shared route graph, then
//! assembly of the document.

use crate::analysis::AnalysisPass;
use crate::config::PluginOptions;
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::inference::InferencePass;
use crate::openapi_builder::{OpenApiBuilder, OpenApiDocument};
use crate::parser::{AstParser, ParsedModule};
use crate::route_graph::RouteCallLookup;
use crate::routing::discover;
use crate::scanner::SourceFile;
use crate::type_resolver::TypeIndex;
use log::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompilationState {
    Pending,
    Completed,
    Aborted,
}

/// Owns the route graph of one compilation and hands it to each pass in turn.
pub struct OpenApiExtension<'d> {
    options: PluginOptions,
    diagnostics: &'d dyn Diagnostics,
    lookup: RouteCallLookup,
    index: TypeIndex,
    state: CompilationState,
}

impl<'d> OpenApiExtension<'d> {
    pub fn new(options: PluginOptions, diagnostics: &'d dyn Diagnostics) -> Self {
        Self {
            options,
            diagnostics,
            lookup: RouteCallLookup::new(),
            index: TypeIndex::default(),
            state: CompilationState::Pending,
        }
    }

    pub fn options(&self) -> &PluginOptions {
        &self.options
    }

    /// Route graph collected so far.
    pub fn lookup(&self) -> &RouteCallLookup {
        &self.lookup
    }

    /// Parses and compiles source files. A file that fails to parse aborts the
    /// compilation and its error is returned.
    pub fn compile_sources(&mut self, sources: &[SourceFile]) -> Result<()> {
        if !self.options.enabled {
            return Ok(());
        }
        match AstParser::parse_all(sources) {
            Ok(modules) => {
                self.compile(&modules);
                Ok(())
            }
            Err(e) => {
                self.abort();
                Err(e)
            }
        }
    }

    /// Runs the documentation pass and, unless disabled, the inference pass.
    pub fn compile(&mut self, modules: &[ParsedModule]) {
        if !self.options.enabled {
            debug!("Extension disabled; skipping compilation");
            return;
        }
        if self.state == CompilationState::Aborted {
            return;
        }

        self.index = TypeIndex::build(modules);
        let tree = discover(modules, &self.index, self.diagnostics);
        info!("Discovered {} routes", tree.routes.len());

        AnalysisPass::new(&self.index, self.diagnostics, self.options.only_commented)
            .run(&tree, &mut self.lookup);
        if self.options.code_inference {
            InferencePass::new(&self.index, self.diagnostics).run(&tree, &mut self.lookup);
        } else {
            debug!("Code inference disabled");
        }
        self.state = CompilationState::Completed;
    }

    /// Discards the route graph; a later `finalize` fails.
    pub fn abort(&mut self) {
        debug!("Compilation aborted; discarding {} routes", self.lookup.len());
        self.lookup = RouteCallLookup::new();
        self.state = CompilationState::Aborted;
    }

    /// Assembles the document. `None` when the extension is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Aborted`] unless a compilation completed.
    pub fn finalize(&self) -> Result<Option<OpenApiDocument>> {
        if !self.options.enabled {
            return Ok(None);
        }
        if self.state != CompilationState::Completed {
            return Err(Error::Aborted);
        }
        let builder = OpenApiBuilder::new(&self.options);
        Ok(Some(builder.build(&self.lookup, &self.index, self.diagnostics)))
    }
}
