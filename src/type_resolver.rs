//! Crate-wide index of type definitions, imports and constants.
//!
//! [`TypeIndex`] is built once per compilation from every parsed module. A
//! [`ModuleContext`] borrows it to resolve short type names, code types and symbolic
//! constants the way they would be resolved inside one particular module.

use crate::comment::doc_lines;
use crate::model::{Literal, LocalReference};
use crate::parser::ParsedModule;
use crate::type_reference::{PrimitiveType, TypeReference};
use log::debug;
use std::collections::{BTreeMap, HashMap};

/// Index of struct/enum definitions, `use` imports and constants of a crate.
#[derive(Debug, Default)]
pub struct TypeIndex {
    /// Qualified path -> definition
    types: BTreeMap<String, TypeDefinition>,
    /// Short name -> qualified paths
    by_short_name: HashMap<String, Vec<String>>,
    /// Module path -> imports declared in it
    imports: HashMap<String, ModuleImports>,
    /// Qualified path -> constant value
    constants: BTreeMap<String, Literal>,
}

/// A struct or enum definition.
#[derive(Debug, Clone)]
pub struct TypeDefinition {
    pub name: String,
    pub qualified: String,
    /// Module the type is defined in; field types resolve against it
    pub module: String,
    pub description: Option<String>,
    pub kind: TypeKind,
}

/// Type kind - represents the categories of definitions the schema generator understands
#[derive(Debug, Clone)]
pub enum TypeKind {
    /// A struct type with named fields
    Struct(StructDef),
    /// An enum; unit variants become string values
    Enum(EnumDef),
}

/// Struct definition with fields
#[derive(Debug, Clone)]
pub struct StructDef {
    pub fields: Vec<FieldDef>,
}

/// Field definition in a struct
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Serialized field name (after `rename` / `rename_all`)
    pub name: String,
    pub ty: syn::Type,
    pub description: Option<String>,
    pub serde_attrs: SerdeAttributes,
}

/// Enum definition with serialized variant names
#[derive(Debug, Clone)]
pub struct EnumDef {
    pub variants: Vec<String>,
}

/// Serde attributes for a field or container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerdeAttributes {
    pub rename: Option<String>,
    pub rename_all: Option<String>,
    pub skip: bool,
    pub flatten: bool,
    pub default: bool,
}

#[derive(Debug, Clone, Default)]
struct ModuleImports {
    /// Local alias -> full path
    named: HashMap<String, String>,
    /// Prefixes imported with `*`
    globs: Vec<String>,
}

impl TypeIndex {
    /// Indexes every module, including inline `mod` blocks.
    pub fn build(modules: &[ParsedModule]) -> Self {
        let mut index = TypeIndex::default();
        for module in modules {
            index.index_items(&module.module, &module.syntax_tree.items);
        }
        debug!(
            "Indexed {} types and {} constants across {} modules",
            index.types.len(),
            index.constants.len(),
            modules.len()
        );
        index
    }

    fn index_items(&mut self, module: &str, items: &[syn::Item]) {
        for item in items {
            match item {
                syn::Item::Struct(item_struct) => {
                    let definition = parse_struct_definition(module, item_struct);
                    self.insert_type(definition);
                }
                syn::Item::Enum(item_enum) => {
                    let definition = parse_enum_definition(module, item_enum);
                    self.insert_type(definition);
                }
                syn::Item::Use(item_use) => {
                    let imports = self.imports.entry(module.to_string()).or_default();
                    collect_use_tree(module, &item_use.tree, Vec::new(), imports);
                }
                syn::Item::Const(item_const) => {
                    if let Some(value) = literal_of(&item_const.expr) {
                        self.constants
                            .insert(format!("{}::{}", module, item_const.ident), value);
                    }
                }
                syn::Item::Mod(item_mod) => {
                    if let Some((_, content)) = &item_mod.content {
                        let nested = format!("{}::{}", module, item_mod.ident);
                        self.index_items(&nested, content);
                    }
                }
                _ => {}
            }
        }
    }

    fn insert_type(&mut self, definition: TypeDefinition) {
        self.by_short_name
            .entry(definition.name.clone())
            .or_default()
            .push(definition.qualified.clone());
        self.types.insert(definition.qualified.clone(), definition);
    }

    /// Looks up a definition by qualified path.
    pub fn definition(&self, qualified: &str) -> Option<&TypeDefinition> {
        self.types.get(qualified)
    }

    /// Number of indexed types sharing a short name.
    pub fn short_name_count(&self, name: &str) -> usize {
        self.by_short_name.get(name).map(Vec::len).unwrap_or(0)
    }

    /// Resolution context for one module.
    pub fn module_context<'a>(&'a self, module: &'a str) -> ModuleContext<'a> {
        ModuleContext {
            index: self,
            module,
        }
    }
}

/// Name resolution scoped to one module.
#[derive(Clone, Copy)]
pub struct ModuleContext<'a> {
    index: &'a TypeIndex,
    module: &'a str,
}

impl<'a> ModuleContext<'a> {
    pub fn module(&self) -> &str {
        self.module
    }

    pub fn index(&self) -> &'a TypeIndex {
        self.index
    }

    /// Resolves a textual type name. Unresolvable names become opaque references.
    pub fn resolve_name(&self, name: &str) -> TypeReference {
        let name = name.trim();
        if let Some(primitive) = PrimitiveType::from_name(name) {
            return TypeReference::primitive(primitive);
        }
        let short = name.rsplit("::").next().unwrap_or(name);
        let known = self.index.by_short_name.get(short).into_iter().flatten();
        match self.resolve_path(name, |q| self.index.types.contains_key(q), known) {
            Some(qualified) => {
                let type_name = qualified.rsplit("::").next().unwrap_or(short).to_string();
                TypeReference::crate_type(type_name, qualified)
            }
            None => {
                if let Some(primitive) = PrimitiveType::from_name(short) {
                    return TypeReference::primitive(primitive);
                }
                debug!(
                    "Type {} is not resolvable from {}; keeping it as an opaque name",
                    name, self.module
                );
                TypeReference::opaque(short)
            }
        }
    }

    /// Resolves a code type to a schema shape. `None` for types without a schema
    /// (unit, trait objects, maps, ...).
    pub fn resolve_type(&self, ty: &syn::Type) -> Option<TypeReference> {
        match ty {
            syn::Type::Reference(reference) => self.resolve_type(&reference.elem),
            syn::Type::Paren(paren) => self.resolve_type(&paren.elem),
            syn::Type::Group(group) => self.resolve_type(&group.elem),
            syn::Type::Slice(slice) => Some(self.sequence_of(&slice.elem)),
            syn::Type::Array(array) => Some(self.sequence_of(&array.elem)),
            syn::Type::Path(type_path) => {
                let segment = type_path.path.segments.last()?;
                let ident = segment.ident.to_string();
                let first_arg = first_type_argument(segment);
                match ident.as_str() {
                    "Option" => Some(TypeReference::optional(self.resolve_type(first_arg?)?)),
                    "Vec" | "VecDeque" | "HashSet" | "BTreeSet" | "LinkedList" => {
                        Some(self.sequence_of(first_arg?))
                    }
                    "Json" | "Box" | "Arc" | "Rc" | "Cow" | "Form" | "Query" | "Path" => {
                        self.resolve_type(first_arg?)
                    }
                    "HashMap" | "BTreeMap" | "Value" => None,
                    _ => {
                        let path: Vec<String> = type_path
                            .path
                            .segments
                            .iter()
                            .map(|s| s.ident.to_string())
                            .collect();
                        Some(self.resolve_name(&path.join("::")))
                    }
                }
            }
            _ => None,
        }
    }

    fn sequence_of(&self, elem: &syn::Type) -> TypeReference {
        if is_byte(elem) {
            return TypeReference::primitive(PrimitiveType::Binary);
        }
        match self.resolve_type(elem) {
            Some(inner) => TypeReference::array(inner),
            None => TypeReference::array(TypeReference::opaque("Value")),
        }
    }

    /// Resolves an identifier naming a crate constant to its literal value.
    pub fn resolve_constant(&self, name: &str) -> Option<LocalReference> {
        let qualified = self.resolve_path(
            name,
            |q| self.index.constants.contains_key(q),
            self.index.constants.keys(),
        )?;
        self.index
            .constants
            .get(&qualified)
            .cloned()
            .map(LocalReference::Literal)
    }

    /// Finds the qualified path `name` refers to in this module, accepting only paths
    /// for which `exists` holds. `known` lists every existing path of the kind looked
    /// up and backs the unique-suffix fallback.
    pub fn resolve_path<'k>(
        &self,
        name: &str,
        exists: impl Fn(&str) -> bool,
        known: impl Iterator<Item = &'k String>,
    ) -> Option<String> {
        let segments: Vec<&str> = name.split("::").collect();
        let first = segments[0];
        let imports = self.index.imports.get(self.module);

        let mut candidates: Vec<String> = Vec::new();
        if segments.len() > 1 {
            candidates.push(normalize_path(self.module, &segments));
            candidates.push(format!("{}::{}", self.module, name));
            candidates.push(format!("crate::{}", name));
            if let Some(full) = imports.and_then(|i| i.named.get(first)) {
                candidates.push(format!("{}::{}", full, segments[1..].join("::")));
            }
        } else {
            if let Some(full) = imports.and_then(|i| i.named.get(name)) {
                candidates.push(full.clone());
            }
            if let Some(imports) = imports {
                for glob in &imports.globs {
                    candidates.push(format!("{}::{}", glob, name));
                }
            }
            candidates.push(format!("{}::{}", self.module, name));
        }

        if let Some(found) = candidates.into_iter().find(|c| exists(c)) {
            return Some(found);
        }

        // Fall back to a unique crate-wide match
        let suffix = format!("::{}", name.trim_start_matches("crate::"));
        let matches: Vec<&String> = known.filter(|q| q.ends_with(&suffix)).collect();
        match matches.as_slice() {
            [only] => Some((*only).clone()),
            _ => None,
        }
    }
}

/// The first generic type argument of a path segment.
pub fn first_type_argument(segment: &syn::PathSegment) -> Option<&syn::Type> {
    if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
        for arg in &args.args {
            if let syn::GenericArgument::Type(ty) = arg {
                return Some(ty);
            }
        }
    }
    None
}

fn is_byte(ty: &syn::Type) -> bool {
    matches!(ty, syn::Type::Path(p) if p.path.is_ident("u8"))
}

/// Resolves `self`, `super` and `crate` prefixes relative to `module`.
fn normalize_path(module: &str, segments: &[&str]) -> String {
    let mut base: Vec<String> = Vec::new();
    let mut rest = segments;
    loop {
        match rest.first() {
            Some(&"crate") => {
                base = vec!["crate".to_string()];
                rest = &rest[1..];
            }
            Some(&"self") => {
                if base.is_empty() {
                    base = module.split("::").map(str::to_string).collect();
                }
                rest = &rest[1..];
            }
            Some(&"super") => {
                if base.is_empty() {
                    base = module.split("::").map(str::to_string).collect();
                }
                base.pop();
                rest = &rest[1..];
            }
            _ => break,
        }
    }
    base.extend(rest.iter().map(|s| s.to_string()));
    base.join("::")
}

fn collect_use_tree(
    module: &str,
    tree: &syn::UseTree,
    prefix: Vec<String>,
    imports: &mut ModuleImports,
) {
    match tree {
        syn::UseTree::Path(path) => {
            let mut prefix = prefix;
            prefix.push(path.ident.to_string());
            collect_use_tree(module, &path.tree, prefix, imports);
        }
        syn::UseTree::Name(name) => {
            let ident = name.ident.to_string();
            if ident == "self" {
                if let Some(last) = prefix.last().cloned() {
                    imports.named.insert(last, full_path(module, &prefix));
                }
                return;
            }
            let mut path = prefix;
            path.push(ident.clone());
            imports.named.insert(ident, full_path(module, &path));
        }
        syn::UseTree::Rename(rename) => {
            let mut path = prefix;
            path.push(rename.ident.to_string());
            imports
                .named
                .insert(rename.rename.to_string(), full_path(module, &path));
        }
        syn::UseTree::Glob(_) => {
            imports.globs.push(full_path(module, &prefix));
        }
        syn::UseTree::Group(group) => {
            for item in &group.items {
                collect_use_tree(module, item, prefix.clone(), imports);
            }
        }
    }
}

fn full_path(module: &str, segments: &[String]) -> String {
    let refs: Vec<&str> = segments.iter().map(String::as_str).collect();
    normalize_path(module, &refs)
}

/// Literal value of a constant initializer.
fn literal_of(expr: &syn::Expr) -> Option<Literal> {
    match expr {
        syn::Expr::Lit(expr_lit) => match &expr_lit.lit {
            syn::Lit::Str(s) => Some(Literal::Str(s.value())),
            syn::Lit::Int(i) => i.base10_parse::<i64>().ok().map(Literal::Int),
            _ => None,
        },
        syn::Expr::Group(group) => literal_of(&group.expr),
        syn::Expr::Paren(paren) => literal_of(&paren.expr),
        _ => None,
    }
}

fn parse_struct_definition(module: &str, item_struct: &syn::ItemStruct) -> TypeDefinition {
    let name = item_struct.ident.to_string();
    debug!("Parsing struct definition: {}::{}", module, name);

    let container = parse_serde_attributes(&item_struct.attrs);
    let mut fields = Vec::new();
    if let syn::Fields::Named(named_fields) = &item_struct.fields {
        for field in &named_fields.named {
            let Some(ident) = field.ident.as_ref() else {
                continue;
            };
            let serde_attrs = parse_serde_attributes(&field.attrs);
            let raw = ident.to_string();
            let raw = raw.strip_prefix("r#").unwrap_or(&raw).to_string();
            let field_name = match (&serde_attrs.rename, &container.rename_all) {
                (Some(rename), _) => rename.clone(),
                (None, Some(rule)) => apply_rename_rule(&raw, rule),
                (None, None) => raw,
            };
            fields.push(FieldDef {
                name: field_name,
                ty: field.ty.clone(),
                description: doc_text(&field.attrs),
                serde_attrs,
            });
        }
    }

    TypeDefinition {
        qualified: format!("{}::{}", module, name),
        name,
        module: module.to_string(),
        description: doc_text(&item_struct.attrs),
        kind: TypeKind::Struct(StructDef { fields }),
    }
}

fn parse_enum_definition(module: &str, item_enum: &syn::ItemEnum) -> TypeDefinition {
    let name = item_enum.ident.to_string();
    debug!("Parsing enum definition: {}::{}", module, name);

    let container = parse_serde_attributes(&item_enum.attrs);
    let variants = item_enum
        .variants
        .iter()
        .filter_map(|variant| {
            let attrs = parse_serde_attributes(&variant.attrs);
            if attrs.skip {
                return None;
            }
            let raw = variant.ident.to_string();
            Some(match (attrs.rename, &container.rename_all) {
                (Some(rename), _) => rename,
                (None, Some(rule)) => apply_rename_rule(&raw, rule),
                (None, None) => raw,
            })
        })
        .collect();

    TypeDefinition {
        qualified: format!("{}::{}", module, name),
        name,
        module: module.to_string(),
        description: doc_text(&item_enum.attrs),
        kind: TypeKind::Enum(EnumDef { variants }),
    }
}

fn doc_text(attrs: &[syn::Attribute]) -> Option<String> {
    let text = doc_lines(attrs)
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Parses `#[serde(...)]` attributes.
pub fn parse_serde_attributes(attrs: &[syn::Attribute]) -> SerdeAttributes {
    let mut serde_attrs = SerdeAttributes::default();

    for attr in attrs {
        if !attr.path().is_ident("serde") {
            continue;
        }
        // Errors only mean an unsupported nested form; what was read so far is kept
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let value: syn::LitStr = meta.value()?.parse()?;
                serde_attrs.rename = Some(value.value());
            } else if meta.path.is_ident("rename_all") {
                let value: syn::LitStr = meta.value()?.parse()?;
                serde_attrs.rename_all = Some(value.value());
            } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_serializing") {
                serde_attrs.skip = true;
            } else if meta.path.is_ident("flatten") {
                serde_attrs.flatten = true;
            } else if meta.path.is_ident("default") {
                serde_attrs.default = true;
                if meta.input.peek(syn::Token![=]) {
                    let _: syn::Expr = meta.value()?.parse()?;
                }
            } else if meta.input.peek(syn::Token![=]) {
                let _: syn::Expr = meta.value()?.parse()?;
            }
            Ok(())
        });
    }

    serde_attrs
}

/// Applies a serde `rename_all` rule to a field or variant name.
pub fn apply_rename_rule(name: &str, rule: &str) -> String {
    let words = split_words(name);
    let capitalize = |w: &str| {
        let mut chars = w.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        }
    };
    match rule {
        "lowercase" => words.concat(),
        "UPPERCASE" => words.concat().to_uppercase(),
        "snake_case" => words.join("_"),
        "SCREAMING_SNAKE_CASE" => words.join("_").to_uppercase(),
        "kebab-case" => words.join("-"),
        "SCREAMING-KEBAB-CASE" => words.join("-").to_uppercase(),
        "PascalCase" => words.iter().map(|w| capitalize(w)).collect(),
        "camelCase" => words
            .iter()
            .enumerate()
            .map(|(i, w)| if i == 0 { w.clone() } else { capitalize(w) })
            .collect(),
        _ => name.to_string(),
    }
}

/// Splits `snake_case` and `PascalCase` names into lower-case words.
fn split_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch == '_' || ch == '-' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}
