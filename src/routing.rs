//! Route declaration discovery.
//!
//! Finds every method router registered on a router builder:
//!
//! ```ignore
//! Router::new()
//!     .route("/books", get(list_books).post(create_book))
//!     .nest("/authors", authors::router())
//!     .merge(admin::router())
//! ```
//!
//! Each `get(..)` / `.post(..)` call is one route declaration, keyed by its module and
//! source position. Routers returned from functions and mounted with `nest`/`merge`
//! contribute their routes under the mount prefix. Both compiler passes go through
//! [`discover`], so they always agree on the keys.

use crate::diagnostics::Diagnostics;
use crate::model::{HttpMethod, RouteKey};
use crate::parser::ParsedModule;
use crate::type_resolver::{ModuleContext, TypeIndex};
use log::debug;
use std::collections::{BTreeMap, HashMap};
use syn::visit::Visit;
use syn::{Expr, ExprMethodCall, Lit};

/// A free function of the analysed crate.
#[derive(Debug, Clone)]
pub struct FunctionEntry<'ast> {
    pub item: &'ast syn::ItemFn,
    pub module: String,
}

/// The code handling a route.
#[derive(Debug, Clone)]
pub enum Handler<'ast> {
    Function {
        name: String,
        module: String,
        item: &'ast syn::ItemFn,
    },
    Closure {
        module: String,
        closure: &'ast syn::ExprClosure,
    },
    /// A handler expression that could not be traced to code
    Unresolved(String),
}

impl<'ast> Handler<'ast> {
    /// Function name of a named handler.
    pub fn name(&self) -> Option<&str> {
        match self {
            Handler::Function { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Module the handler code lives in.
    pub fn module(&self) -> Option<&str> {
        match self {
            Handler::Function { module, .. } | Handler::Closure { module, .. } => Some(module),
            Handler::Unresolved(_) => None,
        }
    }

    /// Attributes carrying the handler's documentation.
    pub fn attrs(&self) -> &'ast [syn::Attribute] {
        match self {
            Handler::Function { item, .. } => {
                let item: &'ast syn::ItemFn = item;
                &item.attrs
            }
            Handler::Closure { closure, .. } => {
                let closure: &'ast syn::ExprClosure = closure;
                &closure.attrs
            }
            Handler::Unresolved(_) => &[],
        }
    }
}

/// One method router registration.
#[derive(Debug, Clone)]
pub struct RouteDeclaration<'ast> {
    pub key: RouteKey,
    pub method: HttpMethod,
    /// Full path, with mount prefixes applied (`/authors/:id`)
    pub path: String,
    pub handler: Handler<'ast>,
}

/// All routes declared in a crate.
#[derive(Debug, Default)]
pub struct RouteTree<'ast> {
    pub routes: Vec<RouteDeclaration<'ast>>,
}

/// Collects every free function by qualified path, including those of inline modules.
pub fn collect_functions(modules: &[ParsedModule]) -> BTreeMap<String, FunctionEntry<'_>> {
    fn walk<'ast>(
        module: &str,
        items: &'ast [syn::Item],
        functions: &mut BTreeMap<String, FunctionEntry<'ast>>,
    ) {
        for item in items {
            match item {
                syn::Item::Fn(item_fn) => {
                    functions.insert(
                        format!("{}::{}", module, item_fn.sig.ident),
                        FunctionEntry {
                            item: item_fn,
                            module: module.to_string(),
                        },
                    );
                }
                syn::Item::Mod(item_mod) => {
                    if let Some((_, content)) = &item_mod.content {
                        walk(&format!("{}::{}", module, item_mod.ident), content, functions);
                    }
                }
                _ => {}
            }
        }
    }

    let mut functions = BTreeMap::new();
    for module in modules {
        walk(&module.module, &module.syntax_tree.items, &mut functions);
    }
    functions
}

/// A `nest`/`merge` of a router returned by a function.
#[derive(Debug)]
struct Mount {
    /// Function whose body performs the mount
    owner: Option<String>,
    /// Prefix relative to the owner's own prefix
    prefix: String,
    target: String,
}

/// A route before mount prefixes are known.
struct PendingRoute<'ast> {
    key: RouteKey,
    method: HttpMethod,
    owner: Option<String>,
    relative_path: String,
    handler: HandlerExpr<'ast>,
    module: String,
}

enum HandlerExpr<'ast> {
    Path(String),
    Closure(&'ast syn::ExprClosure),
    Other,
}

/// Discovers every route declaration of the crate.
pub fn discover<'ast>(
    modules: &'ast [ParsedModule],
    index: &TypeIndex,
    diagnostics: &dyn Diagnostics,
) -> RouteTree<'ast> {
    let functions = collect_functions(modules);

    let mut pending = Vec::new();
    let mut mounts = Vec::new();
    for module in modules {
        let mut visitor = RouterVisitor {
            index,
            functions: &functions,
            module: module.module.clone(),
            owner: None,
            prefix: String::new(),
            routes: &mut pending,
            mounts: &mut mounts,
        };
        visitor.visit_file(&module.syntax_tree);
    }

    let prefixes = resolve_mount_prefixes(&mounts, diagnostics);

    let mut routes = Vec::with_capacity(pending.len());
    for route in pending {
        let base = route
            .owner
            .as_ref()
            .and_then(|owner| prefixes.get(owner))
            .map(String::as_str)
            .unwrap_or("");
        let path = join_paths(base, &route.relative_path);
        let handler = match route.handler {
            HandlerExpr::Path(name) => {
                let ctx = index.module_context(&route.module);
                match ctx
                    .resolve_path(&name, |q| functions.contains_key(q), functions.keys())
                    .and_then(|q| functions.get(&q))
                {
                    Some(entry) => Handler::Function {
                        name: entry.item.sig.ident.to_string(),
                        module: entry.module.clone(),
                        item: entry.item,
                    },
                    None => {
                        diagnostics.debug(
                            &format!("Handler {} is not a function of this crate", name),
                            Some(&route.key.location()),
                        );
                        Handler::Unresolved(name)
                    }
                }
            }
            HandlerExpr::Closure(closure) => Handler::Closure {
                module: route.module.clone(),
                closure,
            },
            HandlerExpr::Other => Handler::Unresolved("<expression>".to_string()),
        };
        debug!("Found route: {} {} at {}", route.method, path, route.key.location());
        routes.push(RouteDeclaration {
            key: route.key,
            method: route.method,
            path,
            handler,
        });
    }
    routes.sort_by(|a, b| a.key.cmp(&b.key));

    RouteTree { routes }
}

/// Computes the full prefix of every mounted router function.
fn resolve_mount_prefixes(
    mounts: &[Mount],
    diagnostics: &dyn Diagnostics,
) -> HashMap<String, String> {
    let mut first_mount: HashMap<&str, &Mount> = HashMap::new();
    for mount in mounts {
        match first_mount.get(mount.target.as_str()) {
            Some(existing) if existing.prefix != mount.prefix || existing.owner != mount.owner => {
                diagnostics.warn(
                    &format!(
                        "Router {} is mounted more than once; using prefix {:?}",
                        mount.target, existing.prefix
                    ),
                    None,
                );
            }
            Some(_) => {}
            None => {
                first_mount.insert(&mount.target, mount);
            }
        }
    }

    fn full_prefix(
        target: &str,
        first_mount: &HashMap<&str, &Mount>,
        visiting: &mut Vec<String>,
        diagnostics: &dyn Diagnostics,
    ) -> String {
        let Some(mount) = first_mount.get(target) else {
            return String::new();
        };
        if visiting.iter().any(|v| v == target) {
            diagnostics.warn(
                &format!("Router {} is mounted inside itself; prefix ignored", target),
                None,
            );
            return String::new();
        }
        visiting.push(target.to_string());
        let parent = match &mount.owner {
            Some(owner) => full_prefix(owner, first_mount, visiting, diagnostics),
            None => String::new(),
        };
        visiting.pop();
        join_paths(&parent, &mount.prefix)
    }

    first_mount
        .keys()
        .map(|target| {
            let prefix = full_prefix(target, &first_mount, &mut Vec::new(), diagnostics);
            (target.to_string(), prefix)
        })
        .collect()
}

/// Visitor for traversing one module and finding router registrations
struct RouterVisitor<'v, 'ast> {
    index: &'v TypeIndex,
    functions: &'v BTreeMap<String, FunctionEntry<'ast>>,
    module: String,
    /// Qualified name of the enclosing function
    owner: Option<String>,
    /// Prefix of enclosing inline `nest` calls
    prefix: String,
    routes: &'v mut Vec<PendingRoute<'ast>>,
    mounts: &'v mut Vec<Mount>,
}

impl<'v, 'ast> RouterVisitor<'v, 'ast> {
    fn ctx(&self) -> ModuleContext<'_> {
        self.index.module_context(&self.module)
    }

    /// A path argument: string literal or string constant.
    fn path_argument(&self, expr: &Expr) -> Option<String> {
        match expr {
            Expr::Lit(expr_lit) => match &expr_lit.lit {
                Lit::Str(lit_str) => Some(lit_str.value()),
                _ => None,
            },
            Expr::Path(expr_path) => {
                let name = path_to_string(&expr_path.path);
                self.ctx()
                    .resolve_constant(&name)
                    .and_then(|r| r.as_str().map(str::to_string))
            }
            Expr::Reference(reference) => self.path_argument(&reference.expr),
            _ => None,
        }
    }

    /// Parses a `.route(path, method_router)` call
    fn parse_route(&mut self, expr: &'ast ExprMethodCall) {
        if expr.args.len() < 2 {
            return;
        }
        let Some(path) = self.path_argument(&expr.args[0]) else {
            debug!("Skipping route with a non-literal path in {}", self.module);
            return;
        };
        let relative_path = join_paths(&self.prefix, &path);
        self.collect_method_router(&expr.args[1], &relative_path);
    }

    /// Walks `get(a).post(b)` chains, registering one route per method.
    fn collect_method_router(&mut self, expr: &'ast Expr, path: &str) {
        match expr {
            Expr::Call(call) => {
                if let Expr::Path(func) = &*call.func {
                    if let Some(segment) = func.path.segments.last() {
                        if let Some(method) = HttpMethod::from_name(&segment.ident.to_string()) {
                            if let Some(arg) = call.args.first() {
                                let start = segment.ident.span().start();
                                self.push_pending(method, start.line, start.column, path, arg);
                            }
                        }
                    }
                }
            }
            Expr::MethodCall(method_call) => {
                let name = method_call.method.to_string();
                if let Some(method) = HttpMethod::from_name(&name) {
                    if let Some(arg) = method_call.args.first() {
                        let start = method_call.method.span().start();
                        self.push_pending(method, start.line, start.column, path, arg);
                    }
                }
                self.collect_method_router(&method_call.receiver, path);
            }
            Expr::Paren(paren) => self.collect_method_router(&paren.expr, path),
            _ => {}
        }
    }

    fn push_pending(
        &mut self,
        method: HttpMethod,
        line: usize,
        column: usize,
        path: &str,
        handler: &'ast Expr,
    ) {
        let handler = match strip_wrappers(handler) {
            Expr::Path(expr_path) => HandlerExpr::Path(path_to_string(&expr_path.path)),
            Expr::Closure(closure) => HandlerExpr::Closure(closure),
            _ => HandlerExpr::Other,
        };
        self.routes.push(PendingRoute {
            key: RouteKey::new(self.module.clone(), line, column),
            method,
            owner: self.owner.clone(),
            relative_path: path.to_string(),
            handler,
            module: self.module.clone(),
        });
    }

    /// Handles `nest(prefix, router)` and `merge(router)`.
    fn parse_mount(&mut self, expr: &'ast ExprMethodCall, nested: bool) {
        let (path, target) = if nested {
            let Some(path) = expr.args.first().and_then(|a| self.path_argument(a)) else {
                return;
            };
            match expr.args.iter().nth(1) {
                Some(target) => (path, target),
                None => return,
            }
        } else {
            match expr.args.first() {
                Some(target) => (String::new(), target),
                None => return,
            }
        };

        if let Some(function) = self.router_function(target) {
            debug!("Mounting router {} at {:?}", function, path);
            self.mounts.push(Mount {
                owner: self.owner.clone(),
                prefix: join_paths(&self.prefix, &path),
                target: function,
            });
            return;
        }

        // Inline router expression
        let saved = self.prefix.clone();
        self.prefix = join_paths(&saved, &path);
        self.visit_expr(target);
        self.prefix = saved;
    }

    /// Qualified name of the crate function called to build a router, if any.
    fn router_function(&self, expr: &Expr) -> Option<String> {
        let Expr::Call(call) = strip_wrappers(expr) else {
            return None;
        };
        let Expr::Path(func) = &*call.func else {
            return None;
        };
        let name = path_to_string(&func.path);
        self.ctx()
            .resolve_path(&name, |q| self.functions.contains_key(q), self.functions.keys())
    }
}

impl<'v, 'ast> Visit<'ast> for RouterVisitor<'v, 'ast> {
    fn visit_expr_method_call(&mut self, node: &'ast ExprMethodCall) {
        match node.method.to_string().as_str() {
            "route" => {
                self.visit_expr(&node.receiver);
                self.parse_route(node);
            }
            "nest" => {
                self.visit_expr(&node.receiver);
                self.parse_mount(node, true);
            }
            "merge" => {
                self.visit_expr(&node.receiver);
                self.parse_mount(node, false);
            }
            _ => syn::visit::visit_expr_method_call(self, node),
        }
    }

    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        let saved = self
            .owner
            .replace(format!("{}::{}", self.module, node.sig.ident));
        syn::visit::visit_item_fn(self, node);
        self.owner = saved;
    }

    fn visit_item_mod(&mut self, node: &'ast syn::ItemMod) {
        if node.content.is_none() {
            return;
        }
        let saved = self.module.clone();
        self.module = format!("{}::{}", saved, node.ident);
        syn::visit::visit_item_mod(self, node);
        self.module = saved;
    }
}

/// `&handler`, `(handler)` and `handler.clone()` all name the same handler.
fn strip_wrappers(expr: &Expr) -> &Expr {
    match expr {
        Expr::Reference(r) => strip_wrappers(&r.expr),
        Expr::Paren(p) => strip_wrappers(&p.expr),
        Expr::Group(g) => strip_wrappers(&g.expr),
        Expr::MethodCall(m) if m.method == "clone" && m.args.is_empty() => {
            strip_wrappers(&m.receiver)
        }
        other => other,
    }
}

pub fn path_to_string(path: &syn::Path) -> String {
    path.segments
        .iter()
        .map(|s| s.ident.to_string())
        .collect::<Vec<_>>()
        .join("::")
}

/// Combine a prefix and path, handling slashes correctly
pub fn join_paths(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        return path.to_string();
    }

    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    if path.is_empty() {
        if prefix.is_empty() {
            "/".to_string()
        } else {
            prefix.to_string()
        }
    } else {
        format!("{}/{}", prefix, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{CollectingDiagnostics, Severity};
    use std::path::Path;

    fn parse_modules(modules: &[(&str, &str)]) -> Vec<ParsedModule> {
        modules
            .iter()
            .map(|(module, code)| {
                ParsedModule::from_source(module, Path::new("test.rs"), code)
                    .expect("Failed to parse test code")
            })
            .collect()
    }

    fn routes_of(modules: &[ParsedModule]) -> Vec<(HttpMethod, String, Option<String>)> {
        let index = TypeIndex::build(modules);
        let diagnostics = CollectingDiagnostics::new();
        discover(modules, &index, &diagnostics)
            .routes
            .into_iter()
            .map(|r| (r.method, r.path, r.handler.name().map(str::to_string)))
            .collect()
    }

    #[test]
    fn test_simple_route_extraction() {
        let modules = parse_modules(&[(
            "crate",
            r#"
                async fn handler(call: &mut ApplicationCall) {}

                fn app() -> Router {
                    Router::new().route("/hello", get(handler))
                }
            "#,
        )]);
        assert_eq!(
            routes_of(&modules),
            vec![(HttpMethod::Get, "/hello".to_string(), Some("handler".to_string()))]
        );
    }

    #[test]
    fn test_chained_method_routers_get_distinct_keys() {
        let modules = parse_modules(&[(
            "crate",
            "fn app() -> Router {\n    Router::new().route(\"/users\", get(list).post(create))\n}\nasync fn list() {}\nasync fn create() {}\n",
        )]);
        let index = TypeIndex::build(&modules);
        let tree = discover(&modules, &index, &CollectingDiagnostics::new());

        assert_eq!(tree.routes.len(), 2);
        let get = tree.routes.iter().find(|r| r.method == HttpMethod::Get).unwrap();
        let post = tree.routes.iter().find(|r| r.method == HttpMethod::Post).unwrap();
        assert_eq!(get.key, RouteKey::new("crate", 2, 34));
        assert_eq!(post.key, RouteKey::new("crate", 2, 44));
        assert_eq!(post.handler.name(), Some("create"));
    }

    #[test]
    fn test_nested_router_functions_across_modules() {
        let modules = parse_modules(&[
            (
                "crate",
                r#"
                    mod routes;
                    fn app() -> Router {
                        Router::new().nest("/api", routes::router())
                    }
                "#,
            ),
            (
                "crate::routes",
                r#"
                    pub fn router() -> Router {
                        Router::new()
                            .route("/", get(index))
                            .nest("/authors", authors::router())
                    }
                    async fn index() {}
                "#,
            ),
            (
                "crate::routes::authors",
                r#"
                    pub fn router() -> Router {
                        Router::new().route("/:id", get(get_author).delete(remove))
                    }
                    async fn get_author() {}
                    async fn remove() {}
                "#,
            ),
        ]);
        let mut routes = routes_of(&modules);
        routes.sort();
        assert_eq!(
            routes,
            vec![
                (HttpMethod::Get, "/api".to_string(), Some("index".to_string())),
                (
                    HttpMethod::Get,
                    "/api/authors/:id".to_string(),
                    Some("get_author".to_string())
                ),
                (
                    HttpMethod::Delete,
                    "/api/authors/:id".to_string(),
                    Some("remove".to_string())
                ),
            ]
        );
    }

    #[test]
    fn test_inline_nest_and_merge() {
        let modules = parse_modules(&[(
            "crate",
            r#"
                const BOOKS: &str = "/books";
                fn app() -> Router {
                    Router::new()
                        .nest("/v1", Router::new().route(BOOKS, get(list)))
                        .merge(admin())
                }
                fn admin() -> Router {
                    Router::new().route("/admin", post(|call| async move {}))
                }
                async fn list() {}
            "#,
        )]);
        let index = TypeIndex::build(&modules);
        let tree = discover(&modules, &index, &CollectingDiagnostics::new());
        let paths: Vec<&str> = tree.routes.iter().map(|r| r.path.as_str()).collect();
        assert!(paths.contains(&"/v1/books"));
        assert!(paths.contains(&"/admin"));
        let admin = tree.routes.iter().find(|r| r.path == "/admin").unwrap();
        assert!(matches!(admin.handler, Handler::Closure { .. }));
    }

    #[test]
    fn test_unknown_handler_is_unresolved() {
        let modules = parse_modules(&[(
            "crate",
            r#"fn app() -> Router { Router::new().route("/x", get(other_crate::handler)) }"#,
        )]);
        let index = TypeIndex::build(&modules);
        let diagnostics = CollectingDiagnostics::new();
        let tree = discover(&modules, &index, &diagnostics);
        assert!(matches!(tree.routes[0].handler, Handler::Unresolved(_)));
        assert!(diagnostics.at_least(Severity::Warning).is_empty());
    }

    #[test]
    fn test_router_mounted_twice_warns() {
        let modules = parse_modules(&[(
            "crate",
            r#"
                fn app() -> Router {
                    Router::new().nest("/a", shared()).nest("/b", shared())
                }
                fn shared() -> Router { Router::new().route("/x", get(handler)) }
                async fn handler() {}
            "#,
        )]);
        let index = TypeIndex::build(&modules);
        let diagnostics = CollectingDiagnostics::new();
        let tree = discover(&modules, &index, &diagnostics);
        assert_eq!(tree.routes[0].path, "/a/x");
        assert_eq!(diagnostics.at_least(Severity::Warning).len(), 1);
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("", "/books"), "/books");
        assert_eq!(join_paths("/api/", "/books"), "/api/books");
        assert_eq!(join_paths("/api", "/"), "/api");
    }
}
