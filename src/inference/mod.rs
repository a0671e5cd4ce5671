//! Pass 2: call-site inference over handler bodies.
//!
//! Every method call (and index expression) in a handler body is reduced to a
//! [`CallShape`]: which binding the receiver chain starts from, the accessors in
//! between, the method name, turbofish types and a coarse classification of each
//! argument. The [`InferenceEngine`] then scans its rule list in order and keeps the
//! fields of the first rule that applies.

pub mod rules;

use crate::diagnostics::{Diagnostics, SourceLocation};
use crate::model::{Literal, LocalReference, RouteField, Source};
use crate::route_graph::RouteCallLookup;
use crate::routing::{path_to_string, Handler, RouteTree};
use crate::type_reference::TypeReference;
use crate::type_resolver::{ModuleContext, TypeIndex};
use log::debug;
use proc_macro2::LineColumn;
use std::collections::HashMap;
use syn::visit::Visit;
use syn::{Expr, Lit, Pat};

pub use rules::Rule;

/// Types a handler parameter may have to be treated as the framework call object.
const CALL_TYPES: &[&str] = &["ApplicationCall", "RoutingCall", "Call"];

/// Methods that hand back their receiver unchanged for inference purposes.
const TRANSPARENT_METHODS: &[&str] = &["clone", "as_ref", "borrow", "to_owned"];

/// What the receiver chain of a call starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Root {
    /// The framework call object
    Call,
    Other,
}

/// Coarse classification of one argument expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgShape {
    Str(String),
    Int(i64),
    Bool(bool),
    /// A path or identifier that is not a known constant (`StatusCode::OK`, `status`)
    Path(String),
    /// A function call (`StatusCode::from_u16(404)`)
    Call { func: String, args: Vec<ArgShape> },
    /// A struct literal or constructor of a known type
    StructLit(TypeReference),
    /// A single-argument tuple wrapper (`Json(book)`, `Html(page)`)
    Wrapped { wrapper: String, inner: Box<ArgShape> },
    /// A value whose type is known from its binding
    Typed(TypeReference),
    Other,
}

impl ArgShape {
    /// Schema of the value, when it can be told from the shape alone.
    pub fn type_ref(&self) -> Option<TypeReference> {
        match self {
            ArgShape::Str(_) => Some(TypeReference::string()),
            ArgShape::StructLit(t) | ArgShape::Typed(t) => Some(t.clone()),
            ArgShape::Wrapped { inner, .. } => inner.type_ref(),
            _ => None,
        }
    }

    /// String key of a parameter accessor: a literal, or a symbolic identifier.
    pub fn key(&self) -> Option<LocalReference> {
        match self {
            ArgShape::Str(s) => Some(LocalReference::str(s.clone())),
            ArgShape::Path(p) => Some(LocalReference::symbolic(p.clone())),
            _ => None,
        }
    }
}

/// A turbofish type argument as written, with its resolved schema.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeArg {
    pub name: String,
    pub type_ref: Option<TypeReference>,
}

/// Framework-neutral view of one call expression.
#[derive(Debug, Clone, PartialEq)]
pub struct CallShape {
    pub root: Root,
    /// Accessors between the root and the call (`["request", "headers"]`)
    pub accessors: Vec<String>,
    pub method: String,
    pub type_args: Vec<TypeArg>,
    pub args: Vec<ArgShape>,
    /// Type the result is bound to (`let b: Book = call.receive().await?`)
    pub expected: Option<TypeReference>,
    pub location: SourceLocation,
}

impl CallShape {
    /// A shape rooted at the call object, mostly for tests and embedders.
    pub fn on_call(accessors: &[&str], method: &str, args: Vec<ArgShape>) -> Self {
        Self {
            root: Root::Call,
            accessors: accessors.iter().map(|a| a.to_string()).collect(),
            method: method.to_string(),
            type_args: Vec::new(),
            args,
            expected: None,
            location: SourceLocation {
                module: "crate".to_string(),
                line: 1,
                column: 0,
            },
        }
    }

    pub fn with_type_arg(mut self, name: &str, type_ref: Option<TypeReference>) -> Self {
        self.type_args.push(TypeArg {
            name: name.to_string(),
            type_ref,
        });
        self
    }

    pub fn last_accessor(&self) -> Option<&str> {
        self.accessors.last().map(String::as_str)
    }

    pub fn is_call_rooted(&self) -> bool {
        self.root == Root::Call
    }
}

/// Ordered rule registry.
pub struct InferenceEngine {
    rules: Vec<Rule>,
}

impl Default for InferenceEngine {
    fn default() -> Self {
        Self::new(rules::default_rules())
    }
}

impl InferenceEngine {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }

    /// Fields of the first rule that applies; empty when none does.
    pub fn infer(&self, shape: &CallShape, diagnostics: &dyn Diagnostics) -> Vec<RouteField> {
        for rule in &self.rules {
            if !(rule.applies)(shape) {
                continue;
            }
            if let Some(fields) = (rule.extract)(shape) {
                debug!(
                    "Rule {} matched {} at {} with {} fields",
                    rule.name,
                    shape.method,
                    shape.location,
                    fields.len()
                );
                return fields;
            }
        }
        if shape.is_call_rooted() {
            diagnostics.debug(
                &format!("No inference rule for call `{}`", shape.method),
                Some(&shape.location),
            );
        }
        Vec::new()
    }
}

/// Walks the handler of every recorded route and records inferred fields.
pub struct InferencePass<'a> {
    index: &'a TypeIndex,
    diagnostics: &'a dyn Diagnostics,
    engine: InferenceEngine,
}

impl<'a> InferencePass<'a> {
    pub fn new(index: &'a TypeIndex, diagnostics: &'a dyn Diagnostics) -> Self {
        Self {
            index,
            diagnostics,
            engine: InferenceEngine::default(),
        }
    }

    /// Runs the pass over routes already present in `lookup`; returns the number of
    /// inferred fields.
    pub fn run(&self, tree: &RouteTree<'_>, lookup: &mut RouteCallLookup) -> usize {
        let mut total = 0;
        for route in &tree.routes {
            if !lookup.contains(&route.key) {
                continue;
            }
            let fields = match &route.handler {
                Handler::Function { module, item, .. } => {
                    let mut walker = self.walker(module);
                    for arg in &item.sig.inputs {
                        if let syn::FnArg::Typed(pat_type) = arg {
                            walker.bind_input(&pat_type.pat, Some(&pat_type.ty), false);
                        }
                    }
                    walker.visit_block(&item.block);
                    walker.fields
                }
                Handler::Closure { module, closure } => {
                    let mut walker = self.walker(module);
                    for pat in &closure.inputs {
                        match pat {
                            Pat::Type(pat_type) => {
                                walker.bind_input(&pat_type.pat, Some(&pat_type.ty), true);
                            }
                            other => walker.bind_input(other, None, true),
                        }
                    }
                    walker.visit_expr(&closure.body);
                    walker.fields
                }
                Handler::Unresolved(name) => {
                    debug!("No code to infer from for handler {}", name);
                    continue;
                }
            };
            total += fields.len();
            lookup.record(route.key.clone(), Source::Inference, fields);
        }
        debug!("Inference pass recorded {} fields", total);
        total
    }

    fn walker<'m>(&'m self, module: &'m str) -> HandlerWalker<'m> {
        HandlerWalker {
            ctx: self.index.module_context(module),
            engine: &self.engine,
            diagnostics: self.diagnostics,
            bindings: HashMap::new(),
            expected: None,
            fields: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
enum Binding {
    /// Accessor chain from the call object; empty for the call object itself
    Chain(Vec<String>),
    Typed(TypeReference),
    /// A status value (`let status = StatusCode::CREATED`)
    Status(ArgShape),
}

/// Visitor over one handler body.
struct HandlerWalker<'a> {
    ctx: ModuleContext<'a>,
    engine: &'a InferenceEngine,
    diagnostics: &'a dyn Diagnostics,
    bindings: HashMap<String, Binding>,
    /// Declared type of the `let` currently being initialised, keyed by the start of
    /// its call's method name
    expected: Option<(LineColumn, TypeReference)>,
    fields: Vec<RouteField>,
}

impl<'a> HandlerWalker<'a> {
    /// Binds a handler parameter typed as the call object. Untyped closure parameters
    /// are taken to be the call object as well.
    fn bind_input(&mut self, pat: &Pat, ty: Option<&syn::Type>, untyped_is_call: bool) {
        let is_call = match ty {
            Some(ty) => is_call_type(ty),
            None => untyped_is_call,
        };
        if let (true, Some(name)) = (is_call, pat_ident(pat)) {
            self.bindings.insert(name, Binding::Chain(Vec::new()));
        }
    }

    /// Accessors from the call object to `expr`, if `expr` is rooted at it.
    fn chain_of(&self, expr: &Expr) -> Option<Vec<String>> {
        match expr {
            Expr::Path(expr_path) => {
                let ident = expr_path.path.get_ident()?.to_string();
                match self.bindings.get(&ident) {
                    Some(Binding::Chain(accessors)) => Some(accessors.clone()),
                    _ => None,
                }
            }
            Expr::MethodCall(method_call) if method_call.args.is_empty() => {
                let mut accessors = self.chain_of(&method_call.receiver)?;
                let method = method_call.method.to_string();
                if !TRANSPARENT_METHODS.contains(&method.as_str()) {
                    accessors.push(method);
                }
                Some(accessors)
            }
            Expr::Field(field) => {
                let mut accessors = self.chain_of(&field.base)?;
                if let syn::Member::Named(ident) = &field.member {
                    accessors.push(ident.to_string());
                }
                Some(accessors)
            }
            Expr::Await(await_expr) => self.chain_of(&await_expr.base),
            Expr::Try(try_expr) => self.chain_of(&try_expr.expr),
            Expr::Paren(paren) => self.chain_of(&paren.expr),
            Expr::Reference(reference) => self.chain_of(&reference.expr),
            _ => None,
        }
    }

    fn arg_shape(&self, expr: &Expr) -> ArgShape {
        match expr {
            Expr::Lit(expr_lit) => match &expr_lit.lit {
                Lit::Str(s) => ArgShape::Str(s.value()),
                Lit::Int(i) => i
                    .base10_parse::<i64>()
                    .map(ArgShape::Int)
                    .unwrap_or(ArgShape::Other),
                Lit::Bool(b) => ArgShape::Bool(b.value),
                _ => ArgShape::Other,
            },
            Expr::Reference(r) => self.arg_shape(&r.expr),
            Expr::Paren(p) => self.arg_shape(&p.expr),
            Expr::Group(g) => self.arg_shape(&g.expr),
            Expr::Await(a) => self.arg_shape(&a.base),
            Expr::Try(t) => self.arg_shape(&t.expr),
            Expr::Path(expr_path) => {
                let name = path_to_string(&expr_path.path);
                match self.bindings.get(&name) {
                    Some(Binding::Typed(type_ref)) => return ArgShape::Typed(type_ref.clone()),
                    Some(Binding::Status(status)) => return status.clone(),
                    _ => {}
                }
                match self.ctx.resolve_constant(&name) {
                    Some(LocalReference::Literal(Literal::Str(s))) => ArgShape::Str(s),
                    Some(LocalReference::Literal(Literal::Int(n))) => ArgShape::Int(n),
                    _ => ArgShape::Path(name),
                }
            }
            Expr::Struct(expr_struct) => {
                ArgShape::StructLit(self.ctx.resolve_name(&path_to_string(&expr_struct.path)))
            }
            Expr::Call(call) => {
                let Expr::Path(func) = &*call.func else {
                    return ArgShape::Other;
                };
                let segments: Vec<String> = func
                    .path
                    .segments
                    .iter()
                    .map(|s| s.ident.to_string())
                    .collect();
                let args: Vec<ArgShape> = call.args.iter().map(|a| self.arg_shape(a)).collect();
                if segments.len() == 1 && args.len() == 1 && starts_uppercase(&segments[0]) {
                    return ArgShape::Wrapped {
                        wrapper: segments[0].clone(),
                        inner: Box::new(args.into_iter().next().unwrap_or(ArgShape::Other)),
                    };
                }
                if segments.len() >= 2 && starts_uppercase(&segments[segments.len() - 2]) {
                    // Associated constructor of a crate type (`Book::new(..)`)
                    let owner = segments[..segments.len() - 1].join("::");
                    if let TypeReference::Named {
                        resolution: crate::type_reference::Resolution::Crate(_),
                        ..
                    } = self.ctx.resolve_name(&owner)
                    {
                        return ArgShape::StructLit(self.ctx.resolve_name(&owner));
                    }
                }
                ArgShape::Call {
                    func: segments.join("::"),
                    args,
                }
            }
            Expr::MethodCall(method_call) => {
                let method = method_call.method.to_string();
                if TRANSPARENT_METHODS.contains(&method.as_str()) {
                    return self.arg_shape(&method_call.receiver);
                }
                if method == "to_string" {
                    return ArgShape::Typed(TypeReference::string());
                }
                if self.chain_of(&method_call.receiver).is_some() && method.starts_with("receive") {
                    let body = rules::received_body(&method, self.turbofish(method_call).first());
                    if let Some(type_ref) = body.and_then(|b| b.type_ref) {
                        return ArgShape::Typed(type_ref);
                    }
                }
                ArgShape::Other
            }
            Expr::Macro(expr_macro) if expr_macro.mac.path.is_ident("format") => {
                ArgShape::Typed(TypeReference::string())
            }
            _ => ArgShape::Other,
        }
    }

    fn turbofish(&self, method_call: &syn::ExprMethodCall) -> Vec<TypeArg> {
        let Some(turbofish) = &method_call.turbofish else {
            return Vec::new();
        };
        turbofish
            .args
            .iter()
            .filter_map(|arg| match arg {
                syn::GenericArgument::Type(ty) => Some(TypeArg {
                    name: type_name(ty),
                    type_ref: self.ctx.resolve_type(ty),
                }),
                _ => None,
            })
            .collect()
    }

    fn location(&self, span: proc_macro2::Span) -> SourceLocation {
        let start = span.start();
        SourceLocation {
            module: self.ctx.module().to_string(),
            line: start.line,
            column: start.column,
        }
    }

    fn infer(&mut self, shape: CallShape) {
        let fields = self.engine.infer(&shape, self.diagnostics);
        self.fields.extend(fields);
    }
}

impl<'a, 'ast> Visit<'ast> for HandlerWalker<'a> {
    fn visit_expr_method_call(&mut self, node: &'ast syn::ExprMethodCall) {
        if let Some(accessors) = self.chain_of(&node.receiver) {
            let start = node.method.span().start();
            let expected = match &self.expected {
                Some((at, type_ref)) if *at == start => Some(type_ref.clone()),
                _ => None,
            };
            let shape = CallShape {
                root: Root::Call,
                accessors,
                method: node.method.to_string(),
                type_args: self.turbofish(node),
                args: node.args.iter().map(|a| self.arg_shape(a)).collect(),
                expected,
                location: self.location(node.method.span()),
            };
            self.infer(shape);
        }
        syn::visit::visit_expr_method_call(self, node);
    }

    fn visit_expr_index(&mut self, node: &'ast syn::ExprIndex) {
        // `params["id"]` reads like `params.get("id")`
        if let Some(accessors) = self.chain_of(&node.expr) {
            let key = self.arg_shape(&node.index);
            if matches!(key, ArgShape::Str(_)) {
                let shape = CallShape {
                    root: Root::Call,
                    accessors,
                    method: "get".to_string(),
                    type_args: Vec::new(),
                    args: vec![key],
                    expected: None,
                    location: self.location(node.bracket_token.span.open()),
                };
                self.infer(shape);
            }
        }
        syn::visit::visit_expr_index(self, node);
    }

    fn visit_local(&mut self, node: &'ast syn::Local) {
        let (name, declared) = match &node.pat {
            Pat::Ident(ident) => (Some(ident.ident.to_string()), None),
            Pat::Type(pat_type) => {
                (pat_ident(&pat_type.pat), self.ctx.resolve_type(&pat_type.ty))
            }
            _ => (None, None),
        };

        if let Some(init) = &node.init {
            let saved = self.expected.take();
            if let (Some(type_ref), Expr::MethodCall(call)) =
                (&declared, strip_await(&init.expr))
            {
                self.expected = Some((call.method.span().start(), type_ref.clone()));
            }
            self.visit_expr(&init.expr);
            if let Some((_, diverge)) = &init.diverge {
                self.visit_expr(diverge);
            }
            self.expected = saved;
        }

        let Some(name) = name else {
            return;
        };
        let binding = match (&node.init, declared) {
            (Some(init), declared) => {
                let accessors = self.chain_of(&init.expr).filter(|_| !is_receive(&init.expr));
                match accessors {
                    Some(accessors) => Some(Binding::Chain(accessors)),
                    None => {
                        let shape = self.arg_shape(&init.expr);
                        if rules::status_of(&shape).is_some() {
                            Some(Binding::Status(shape))
                        } else {
                            declared.or_else(|| shape.type_ref()).map(Binding::Typed)
                        }
                    }
                }
            }
            (None, declared) => declared.map(Binding::Typed),
        };
        match binding {
            Some(binding) => {
                self.bindings.insert(name, binding);
            }
            None => {
                self.bindings.remove(&name);
            }
        }
    }

    fn visit_expr_closure(&mut self, node: &'ast syn::ExprClosure) {
        // Closure parameters shadow outer bindings
        let shadowed: Vec<(String, Option<Binding>)> = node
            .inputs
            .iter()
            .filter_map(|pat| match pat {
                Pat::Type(pat_type) => pat_ident(&pat_type.pat),
                other => pat_ident(other),
            })
            .map(|name| {
                let previous = self.bindings.remove(&name);
                (name, previous)
            })
            .collect();
        syn::visit::visit_expr_closure(self, node);
        for (name, previous) in shadowed {
            if let Some(previous) = previous {
                self.bindings.insert(name, previous);
            }
        }
    }

    fn visit_item(&mut self, _node: &'ast syn::Item) {
        // Nested items are not part of the handler
    }
}

fn is_call_type(ty: &syn::Type) -> bool {
    match ty {
        syn::Type::Reference(reference) => is_call_type(&reference.elem),
        syn::Type::Paren(paren) => is_call_type(&paren.elem),
        syn::Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|s| CALL_TYPES.contains(&s.ident.to_string().as_str()))
            .unwrap_or(false),
        _ => false,
    }
}

fn pat_ident(pat: &Pat) -> Option<String> {
    match pat {
        Pat::Ident(ident) => Some(ident.ident.to_string()),
        Pat::Type(pat_type) => pat_ident(&pat_type.pat),
        _ => None,
    }
}

fn strip_await(expr: &Expr) -> &Expr {
    match expr {
        Expr::Await(a) => strip_await(&a.base),
        Expr::Try(t) => strip_await(&t.expr),
        Expr::Paren(p) => strip_await(&p.expr),
        other => other,
    }
}

/// Whether `expr` reads the request body; its value is data, not an accessor.
fn is_receive(expr: &Expr) -> bool {
    matches!(strip_await(expr), Expr::MethodCall(m) if m.method.to_string().starts_with("receive"))
}

fn type_name(ty: &syn::Type) -> String {
    match ty {
        syn::Type::Path(type_path) => path_to_string(&type_path.path),
        syn::Type::Reference(reference) => type_name(&reference.elem),
        _ => String::new(),
    }
}

fn starts_uppercase(name: &str) -> bool {
    name.chars().next().map(char::is_uppercase).unwrap_or(false)
}
