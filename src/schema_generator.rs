use crate::type_reference::{PrimitiveType, Resolution, TypeReference};
use crate::type_resolver::{StructDef, TypeDefinition, TypeIndex, TypeKind};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Nesting limit for `#[serde(flatten)]` chains
const MAX_FLATTEN_DEPTH: usize = 8;

/// Schema generator - converts type references to OpenAPI schemas and hoists named
/// crate types into `components.schemas`
pub struct SchemaGenerator<'a> {
    index: &'a TypeIndex,
    /// Component name -> schema
    schemas: BTreeMap<String, Schema>,
    /// Component names currently being generated (recursive types)
    in_progress: BTreeSet<String>,
}

/// OpenAPI Schema definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Reference to another schema
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// The type of the schema (string, integer, object, array, etc.)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    /// Format for primitive types (e.g., "int32", "int64", "float", "double")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Items schema for array types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    /// Properties for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Schema>>,
    /// Required field names for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Enum values for enum types
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(rename = "oneOf", skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Schema>>,
    /// Constraint keywords (`pattern`, `maxLength`, ...)
    #[serde(flatten)]
    pub constraints: BTreeMap<String, serde_json::Value>,
}

impl Schema {
    pub fn of_type(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Default::default()
        }
    }

    pub fn reference(component: &str) -> Self {
        Self {
            reference: Some(format!("#/components/schemas/{}", component)),
            ..Default::default()
        }
    }

    pub fn array_of(items: Schema) -> Self {
        Self {
            schema_type: Some("array".to_string()),
            items: Some(Box::new(items)),
            ..Default::default()
        }
    }
}

impl<'a> SchemaGenerator<'a> {
    pub fn new(index: &'a TypeIndex) -> Self {
        debug!("Initializing SchemaGenerator");
        Self {
            index,
            schemas: BTreeMap::new(),
            in_progress: BTreeSet::new(),
        }
    }

    /// Generate a schema for a type reference. Named crate and opaque types are
    /// referenced through `$ref` and registered as components.
    pub fn schema_for(&mut self, type_ref: &TypeReference) -> Schema {
        match type_ref {
            TypeReference::Named { name, resolution } => match resolution {
                Resolution::Primitive(primitive) => primitive_to_schema(*primitive),
                Resolution::Crate(qualified) => {
                    let component = self.component_name(name, qualified);
                    match self.index.definition(qualified) {
                        Some(definition) => {
                            self.generate_component(&component, definition);
                        }
                        None => {
                            debug!("No definition for {}, using placeholder", qualified);
                            self.placeholder(&component);
                        }
                    }
                    Schema::reference(&component)
                }
                Resolution::Opaque => {
                    self.placeholder(name);
                    Schema::reference(name)
                }
            },
            TypeReference::Array(inner) => Schema::array_of(self.schema_for(inner)),
            // Optionality is carried by `required` on the parent
            TypeReference::Optional(inner) => self.schema_for(inner),
            TypeReference::Union(members) => Schema {
                one_of: Some(members.iter().map(|m| self.schema_for(m)).collect()),
                ..Default::default()
            },
        }
    }

    /// Short type name unless another indexed type shares it.
    fn component_name(&self, name: &str, qualified: &str) -> String {
        if self.index.short_name_count(name) > 1 {
            qualified.trim_start_matches("crate::").replace("::", ".")
        } else {
            name.to_string()
        }
    }

    fn placeholder(&mut self, component: &str) {
        if !self.schemas.contains_key(component) {
            debug!("Registering placeholder schema for unresolved type {}", component);
            self.schemas
                .insert(component.to_string(), Schema::of_type("object"));
        }
    }

    fn generate_component(&mut self, component: &str, definition: &TypeDefinition) {
        if self.schemas.contains_key(component) || self.in_progress.contains(component) {
            return;
        }
        debug!("Generating component schema {} for {}", component, definition.qualified);
        self.in_progress.insert(component.to_string());

        let mut schema = match &definition.kind {
            TypeKind::Struct(struct_def) => self.generate_struct_schema(definition, struct_def),
            TypeKind::Enum(enum_def) => Schema {
                schema_type: Some("string".to_string()),
                enum_values: Some(enum_def.variants.clone()),
                ..Default::default()
            },
        };
        schema.description = definition.description.clone();

        self.in_progress.remove(component);
        self.schemas.insert(component.to_string(), schema);
    }

    fn generate_struct_schema(
        &mut self,
        definition: &TypeDefinition,
        struct_def: &StructDef,
    ) -> Schema {
        let mut properties = BTreeMap::new();
        let mut required = Vec::new();
        self.collect_fields(definition, struct_def, &mut properties, &mut required, 0);

        Schema {
            schema_type: Some("object".to_string()),
            properties: Some(properties),
            required: if required.is_empty() {
                None
            } else {
                Some(required)
            },
            ..Default::default()
        }
    }

    fn collect_fields(
        &mut self,
        definition: &TypeDefinition,
        struct_def: &StructDef,
        properties: &mut BTreeMap<String, Schema>,
        required: &mut Vec<String>,
        depth: usize,
    ) {
        let index = self.index;
        let context = index.module_context(&definition.module);
        for field in &struct_def.fields {
            // Skip fields marked with #[serde(skip)]
            if field.serde_attrs.skip {
                continue;
            }
            let type_ref = context.resolve_type(&field.ty);

            if field.serde_attrs.flatten {
                if let Some(TypeReference::Named {
                    resolution: Resolution::Crate(qualified),
                    ..
                }) = type_ref.as_ref()
                {
                    if let Some(inner) = index.definition(qualified) {
                        if let TypeKind::Struct(inner_struct) = &inner.kind {
                            if depth < MAX_FLATTEN_DEPTH {
                                self.collect_fields(
                                    inner,
                                    inner_struct,
                                    properties,
                                    required,
                                    depth + 1,
                                );
                            }
                            continue;
                        }
                    }
                }
                debug!(
                    "Flattened field {} of {} is not a struct; keeping it as a property",
                    field.name, definition.qualified
                );
            }

            let mut property = match &type_ref {
                Some(type_ref) => self.schema_for(type_ref),
                None => Schema::of_type("object"),
            };
            property.description = field.description.clone();
            properties.insert(field.name.clone(), property);

            let optional = match &type_ref {
                Some(type_ref) => type_ref.is_optional(),
                None => is_option_type(&field.ty),
            };
            if !optional && !field.serde_attrs.default && !required.contains(&field.name) {
                required.push(field.name.clone());
            }
        }
    }

    /// Get all generated schemas
    pub fn schemas(&self) -> &BTreeMap<String, Schema> {
        &self.schemas
    }

    pub fn into_schemas(self) -> BTreeMap<String, Schema> {
        self.schemas
    }
}

/// Convert a primitive type to an OpenAPI schema
pub fn primitive_to_schema(primitive: PrimitiveType) -> Schema {
    let (schema_type, format) = primitive.openapi_type();
    Schema {
        schema_type: Some(schema_type.to_string()),
        format: format.map(str::to_string),
        ..Default::default()
    }
}

fn is_option_type(ty: &syn::Type) -> bool {
    match ty {
        syn::Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .is_some_and(|s| s.ident == "Option"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParsedModule;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    /// Helper function to build an index from (module, source) pairs
    fn index_of(modules: &[(&str, &str)]) -> TypeIndex {
        let parsed: Vec<ParsedModule> = modules
            .iter()
            .map(|(module, code)| {
                ParsedModule::from_source(module, Path::new("test.rs"), code).unwrap()
            })
            .collect();
        TypeIndex::build(&parsed)
    }

    fn book() -> TypeReference {
        TypeReference::crate_type("Book", "crate::Book")
    }

    #[test]
    fn test_primitive_schemas() {
        let index = TypeIndex::default();
        let mut generator = SchemaGenerator::new(&index);

        let schema = generator.schema_for(&TypeReference::primitive(PrimitiveType::I64));
        assert_eq!(schema.schema_type.as_deref(), Some("integer"));
        assert_eq!(schema.format.as_deref(), Some("int64"));

        let schema = generator.schema_for(&TypeReference::primitive(PrimitiveType::Binary));
        assert_eq!(schema.schema_type.as_deref(), Some("string"));
        assert_eq!(schema.format.as_deref(), Some("binary"));
        assert!(generator.schemas().is_empty());
    }

    #[test]
    fn test_struct_component_and_reference() {
        let index = index_of(&[(
            "crate",
            r#"
            /// A book on the shelf
            pub struct Book {
                /// Title as printed
                pub title: String,
                pub pages: u32,
                pub subtitle: Option<String>,
            }
            "#,
        )]);
        let mut generator = SchemaGenerator::new(&index);
        let schema = generator.schema_for(&TypeReference::array(book()));

        assert_eq!(schema.schema_type.as_deref(), Some("array"));
        assert_eq!(
            schema.items.unwrap().reference.as_deref(),
            Some("#/components/schemas/Book")
        );

        let component = &generator.schemas()["Book"];
        assert_eq!(component.description.as_deref(), Some("A book on the shelf"));
        let properties = component.properties.as_ref().unwrap();
        assert_eq!(
            properties.keys().collect::<Vec<_>>(),
            vec!["pages", "subtitle", "title"]
        );
        assert_eq!(properties["title"].description.as_deref(), Some("Title as printed"));
        assert_eq!(
            component.required,
            Some(vec!["title".to_string(), "pages".to_string()])
        );
    }

    #[test]
    fn test_serde_attributes_shape_properties() {
        let index = index_of(&[(
            "crate",
            r#"
            pub struct Audit { pub created_by: String }

            #[serde(rename_all = "camelCase")]
            pub struct Book {
                pub page_count: u32,
                #[serde(rename = "isbn13")]
                pub isbn: String,
                #[serde(skip)]
                pub internal: bool,
                #[serde(default)]
                pub rating: u8,
                #[serde(flatten)]
                pub audit: Audit,
            }
            "#,
        )]);
        let mut generator = SchemaGenerator::new(&index);
        generator.schema_for(&book());

        let component = &generator.schemas()["Book"];
        let properties = component.properties.as_ref().unwrap();
        assert_eq!(
            properties.keys().collect::<Vec<_>>(),
            vec!["created_by", "isbn13", "pageCount", "rating"]
        );
        assert_eq!(
            component.required,
            Some(vec![
                "pageCount".to_string(),
                "isbn13".to_string(),
                "created_by".to_string()
            ])
        );
        // Flattened struct is not referenced on its own
        assert!(!generator.schemas().contains_key("Audit"));
    }

    #[test]
    fn test_enum_component() {
        let index = index_of(&[(
            "crate",
            r#"
            #[serde(rename_all = "snake_case")]
            pub enum Genre { Fiction, NonFiction }
            "#,
        )]);
        let mut generator = SchemaGenerator::new(&index);
        let schema = generator.schema_for(&TypeReference::crate_type("Genre", "crate::Genre"));
        assert_eq!(schema.reference.as_deref(), Some("#/components/schemas/Genre"));

        let component = &generator.schemas()["Genre"];
        assert_eq!(component.schema_type.as_deref(), Some("string"));
        assert_eq!(
            component.enum_values,
            Some(vec!["fiction".to_string(), "non_fiction".to_string()])
        );
    }

    #[test]
    fn test_nested_and_recursive_types() {
        let index = index_of(&[(
            "crate",
            r#"
            pub struct Author { pub name: String, pub books: Vec<Book> }
            pub struct Book { pub title: String, pub author: Option<Box<Author>> }
            "#,
        )]);
        let mut generator = SchemaGenerator::new(&index);
        generator.schema_for(&book());

        let schemas = generator.into_schemas();
        assert_eq!(schemas.keys().collect::<Vec<_>>(), vec!["Author", "Book"]);
        let author = &schemas["Book"].properties.as_ref().unwrap()["author"];
        assert_eq!(author.reference.as_deref(), Some("#/components/schemas/Author"));
        let books = &schemas["Author"].properties.as_ref().unwrap()["books"];
        assert_eq!(
            books.items.as_ref().unwrap().reference.as_deref(),
            Some("#/components/schemas/Book")
        );
    }

    #[test]
    fn test_colliding_short_names_use_qualified_names() {
        let index = index_of(&[
            ("crate::a", "pub struct Item { pub id: u32 }"),
            ("crate::b", "pub struct Item { pub code: String }"),
        ]);
        let mut generator = SchemaGenerator::new(&index);
        let a = generator.schema_for(&TypeReference::crate_type("Item", "crate::a::Item"));
        let b = generator.schema_for(&TypeReference::crate_type("Item", "crate::b::Item"));

        assert_eq!(a.reference.as_deref(), Some("#/components/schemas/a.Item"));
        assert_eq!(b.reference.as_deref(), Some("#/components/schemas/b.Item"));
        assert_eq!(generator.schemas().len(), 2);
    }

    #[test]
    fn test_opaque_type_gets_placeholder_component() {
        let index = TypeIndex::default();
        let mut generator = SchemaGenerator::new(&index);
        let schema = generator.schema_for(&TypeReference::opaque("Receipt"));

        assert_eq!(schema.reference.as_deref(), Some("#/components/schemas/Receipt"));
        assert_eq!(generator.schemas()["Receipt"], Schema::of_type("object"));
    }

    #[test]
    fn test_union_and_optional() {
        let index = TypeIndex::default();
        let mut generator = SchemaGenerator::new(&index);

        let optional = generator.schema_for(&TypeReference::optional(TypeReference::string()));
        assert_eq!(optional, Schema::of_type("string"));

        let union = generator.schema_for(&TypeReference::union(vec![
            TypeReference::string(),
            TypeReference::primitive(PrimitiveType::Bool),
        ]));
        assert_eq!(
            union.one_of,
            Some(vec![Schema::of_type("string"), Schema::of_type("boolean")])
        );
    }

    #[test]
    fn test_schema_serializes_in_openapi_field_order() {
        let mut schema = Schema::of_type("string");
        schema.constraints.insert("maxLength".to_string(), serde_json::json!(100));
        schema.description = Some("Author name".to_string());
        let json = serde_json::to_string(&schema).unwrap();
        assert_eq!(
            json,
            r#"{"type":"string","description":"Author name","maxLength":100}"#
        );
    }
}
