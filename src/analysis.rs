//! Pass 1: route declarations and handler documentation.

use crate::comment::{doc_lines, CommentParser};
use crate::diagnostics::Diagnostics;
use crate::model::{RouteField, Source};
use crate::route_graph::RouteCallLookup;
use crate::routing::RouteTree;
use crate::type_resolver::TypeIndex;
use log::debug;

/// Records an endpoint plus the documented fields of every declared route.
pub struct AnalysisPass<'a> {
    index: &'a TypeIndex,
    diagnostics: &'a dyn Diagnostics,
    only_commented: bool,
}

impl<'a> AnalysisPass<'a> {
    pub fn new(
        index: &'a TypeIndex,
        diagnostics: &'a dyn Diagnostics,
        only_commented: bool,
    ) -> Self {
        Self {
            index,
            diagnostics,
            only_commented,
        }
    }

    /// Runs the pass and returns the number of routes recorded.
    pub fn run(&self, tree: &RouteTree<'_>, lookup: &mut RouteCallLookup) -> usize {
        let mut recorded = 0;
        for route in &tree.routes {
            let lines = doc_lines(route.handler.attrs());
            let documented = lines.iter().any(|l| !l.trim().is_empty());
            if self.only_commented && !documented {
                debug!(
                    "Skipping undocumented route {} {} at {}",
                    route.method,
                    route.path,
                    route.key.location()
                );
                continue;
            }

            let mut fields = vec![RouteField::Endpoint {
                method: route.method,
                path: route.path.clone(),
                handler: route.handler.name().map(str::to_string),
            }];
            if documented {
                let module = route.handler.module().unwrap_or(&route.key.module);
                let parser =
                    CommentParser::new(self.index.module_context(module), self.diagnostics);
                fields.extend(parser.parse(&lines, Some(&route.key.location())));
            }

            lookup.record(route.key.clone(), Source::Documentation, fields);
            recorded += 1;
        }
        debug!("Documentation pass recorded {} routes", recorded);
        recorded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnostics;
    use crate::http::ResponseKey;
    use crate::parser::ParsedModule;
    use crate::routing::discover;
    use crate::type_reference::TypeReference;
    use std::path::Path;

    const SOURCE: &str = r#"
        pub struct Book { pub title: String }

        fn app() -> Router {
            Router::new()
                .route("/books", get(list_books).post(create_book))
        }

        /// List every book
        /// - Response: 200 [Book]+ All books
        async fn list_books(call: &mut ApplicationCall) {}

        async fn create_book(call: &mut ApplicationCall) {}
    "#;

    fn run(only_commented: bool) -> RouteCallLookup {
        let modules =
            vec![ParsedModule::from_source("crate", Path::new("lib.rs"), SOURCE).unwrap()];
        let index = TypeIndex::build(&modules);
        let diagnostics = CollectingDiagnostics::new();
        let tree = discover(&modules, &index, &diagnostics);
        let mut lookup = RouteCallLookup::new();
        AnalysisPass::new(&index, &diagnostics, only_commented).run(&tree, &mut lookup);
        lookup
    }

    #[test]
    fn test_documented_and_undocumented_routes() {
        let lookup = run(false);
        assert_eq!(lookup.len(), 2);

        let routes: Vec<_> = lookup.keys().filter_map(|k| lookup.resolve(k)).collect();
        let list = routes
            .iter()
            .find(|r| r.summary.is_some())
            .expect("documented route");
        assert_eq!(list.summary.as_deref(), Some("List every book"));
        assert_eq!(
            list.responses[&ResponseKey::Code(200)].type_ref,
            Some(TypeReference::array(TypeReference::crate_type(
                "Book",
                "crate::Book"
            )))
        );
        assert!(routes
            .iter()
            .all(|r| r.endpoint.as_ref().map(|e| e.path.as_str()) == Some("/books")));
    }

    #[test]
    fn test_only_commented_skips_undocumented_handlers() {
        let lookup = run(true);
        assert_eq!(lookup.len(), 1);
        let key = lookup.keys().next().unwrap();
        let endpoint = lookup.resolve(key).unwrap().endpoint.unwrap();
        assert_eq!(endpoint.handler.as_deref(), Some("list_books"));
    }
}
