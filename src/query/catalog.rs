//! Named tree-sitter queries per language.
//!
//! Built-in queries capture whole definitions (one capture per node) so
//! their text can be fed straight into the result filter. Configuration can
//! add queries or override built-ins.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// (name, description, query source)
type QuerySpec = (&'static str, &'static str, &'static str);

const PYTHON_QUERIES: &[QuerySpec] = &[
    (
        "functions",
        "Function definitions, including methods",
        "(function_definition) @function",
    ),
    ("classes", "Class definitions", "(class_definition) @class"),
    (
        "methods",
        "Functions defined directly in a class body",
        "(class_definition body: (block (function_definition) @method))",
    ),
    (
        "imports",
        "import and from-import statements",
        "(import_statement) @import\n(import_from_statement) @import",
    ),
    (
        "variables",
        "Assignments to plain names",
        "(assignment left: (identifier)) @variable",
    ),
    ("decorators", "Decorators", "(decorator) @decorator"),
    ("comments", "Comments", "(comment) @comment"),
];

const JAVA_QUERIES: &[QuerySpec] = &[
    (
        "methods",
        "Method and constructor declarations",
        "(method_declaration) @method\n(constructor_declaration) @constructor",
    ),
    ("functions", "Method declarations", "(method_declaration) @method"),
    (
        "classes",
        "Class, interface, enum and record declarations",
        "(class_declaration) @class\n(interface_declaration) @interface\n(enum_declaration) @enum\n(record_declaration) @record",
    ),
    ("fields", "Field declarations", "(field_declaration) @field"),
    (
        "variables",
        "Field and local variable declarations",
        "(field_declaration) @field\n(local_variable_declaration) @variable",
    ),
    ("imports", "Import declarations", "(import_declaration) @import"),
    ("package", "Package declaration", "(package_declaration) @package"),
    (
        "annotations",
        "Annotations",
        "(annotation) @annotation\n(marker_annotation) @annotation",
    ),
    (
        "comments",
        "Line and block comments",
        "(line_comment) @comment\n(block_comment) @comment",
    ),
];

const JAVASCRIPT_QUERIES: &[QuerySpec] = &[
    (
        "functions",
        "Function declarations and function-valued variables",
        "(function_declaration) @function\n(generator_function_declaration) @function\n(variable_declarator value: [(arrow_function) (function_expression)]) @function",
    ),
    ("classes", "Class declarations", "(class_declaration) @class"),
    ("methods", "Method definitions", "(method_definition) @method"),
    ("imports", "Import statements", "(import_statement) @import"),
    ("exports", "Export statements", "(export_statement) @export"),
    (
        "variables",
        "let/const/var declarations",
        "(lexical_declaration) @variable\n(variable_declaration) @variable",
    ),
    ("comments", "Comments", "(comment) @comment"),
];

const TYPESCRIPT_QUERIES: &[QuerySpec] = &[
    (
        "functions",
        "Function declarations and function-valued variables",
        "(function_declaration) @function\n(generator_function_declaration) @function\n(variable_declarator value: [(arrow_function) (function_expression)]) @function",
    ),
    (
        "classes",
        "Class declarations, abstract included",
        "(class_declaration) @class\n(abstract_class_declaration) @class",
    ),
    ("methods", "Method definitions", "(method_definition) @method"),
    (
        "interfaces",
        "Interface declarations",
        "(interface_declaration) @interface",
    ),
    (
        "types",
        "Type aliases and enums",
        "(type_alias_declaration) @type_alias\n(enum_declaration) @enum",
    ),
    ("imports", "Import statements", "(import_statement) @import"),
    ("exports", "Export statements", "(export_statement) @export"),
    (
        "variables",
        "let/const/var declarations",
        "(lexical_declaration) @variable\n(variable_declaration) @variable",
    ),
    ("comments", "Comments", "(comment) @comment"),
];

const GO_QUERIES: &[QuerySpec] = &[
    ("functions", "Function declarations", "(function_declaration) @function"),
    ("methods", "Method declarations", "(method_declaration) @method"),
    ("types", "Type declarations", "(type_declaration) @type"),
    (
        "structs",
        "Struct type specs",
        "(type_spec type: (struct_type)) @struct",
    ),
    (
        "interfaces",
        "Interface type specs",
        "(type_spec type: (interface_type)) @interface",
    ),
    ("imports", "Import declarations", "(import_declaration) @import"),
    (
        "variables",
        "var and const declarations",
        "(var_declaration) @variable\n(const_declaration) @constant",
    ),
    ("package", "Package clause", "(package_clause) @package"),
    ("comments", "Comments", "(comment) @comment"),
];

const RUST_QUERIES: &[QuerySpec] = &[
    ("functions", "Function items, impl methods included", "(function_item) @function"),
    (
        "classes",
        "Structs, enums and traits",
        "[(struct_item) (enum_item) (trait_item)] @class",
    ),
    ("structs", "Struct items", "(struct_item) @struct"),
    ("enums", "Enum items", "(enum_item) @enum"),
    ("traits", "Trait items", "(trait_item) @trait"),
    ("impls", "Impl blocks", "(impl_item) @impl"),
    ("imports", "use declarations", "(use_declaration) @import"),
    (
        "variables",
        "let bindings, consts and statics",
        "(let_declaration) @variable\n(const_item) @constant\n(static_item) @static",
    ),
    ("macros", "macro_rules! definitions", "(macro_definition) @macro"),
    (
        "comments",
        "Line and block comments",
        "(line_comment) @comment\n(block_comment) @comment",
    ),
];

const C_QUERIES: &[QuerySpec] = &[
    ("functions", "Function definitions", "(function_definition) @function"),
    ("structs", "Struct specifiers", "(struct_specifier) @struct"),
    ("imports", "#include directives", "(preproc_include) @include"),
    ("variables", "Declarations", "(declaration) @variable"),
    ("comments", "Comments", "(comment) @comment"),
];

const CPP_QUERIES: &[QuerySpec] = &[
    ("functions", "Function definitions", "(function_definition) @function"),
    (
        "classes",
        "Class and struct specifiers",
        "(class_specifier) @class\n(struct_specifier) @struct",
    ),
    (
        "namespaces",
        "Namespace definitions",
        "(namespace_definition) @namespace",
    ),
    ("imports", "#include directives", "(preproc_include) @include"),
    ("comments", "Comments", "(comment) @comment"),
];

fn builtin_specs(language: &str) -> &'static [QuerySpec] {
    match language {
        "python" => PYTHON_QUERIES,
        "java" => JAVA_QUERIES,
        "javascript" => JAVASCRIPT_QUERIES,
        "typescript" | "tsx" => TYPESCRIPT_QUERIES,
        "go" => GO_QUERIES,
        "rust" => RUST_QUERIES,
        "c" => C_QUERIES,
        "cpp" => CPP_QUERIES,
        _ => &[],
    }
}

const BUILTIN_LANGUAGES: &[&str] = &[
    "c",
    "cpp",
    "go",
    "java",
    "javascript",
    "python",
    "rust",
    "tsx",
    "typescript",
];

/// A named query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryDefinition {
    pub name: String,
    pub description: String,
    pub source: String,
}

/// Language + name → query source.
#[derive(Debug)]
pub struct QueryCatalog {
    entries: RwLock<BTreeMap<String, BTreeMap<String, QueryDefinition>>>,
}

impl QueryCatalog {
    /// Catalog pre-loaded with the built-in queries.
    pub fn new() -> Self {
        let mut entries: BTreeMap<String, BTreeMap<String, QueryDefinition>> = BTreeMap::new();
        for language in BUILTIN_LANGUAGES {
            let queries = entries.entry(language.to_string()).or_default();
            for (name, description, source) in builtin_specs(language) {
                queries.insert(
                    name.to_string(),
                    QueryDefinition {
                        name: name.to_string(),
                        description: description.to_string(),
                        source: source.to_string(),
                    },
                );
            }
        }
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Catalog with no queries at all.
    pub fn empty() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Add or replace a query.
    pub fn add(&self, language: &str, name: &str, source: &str, description: Option<&str>) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        entries.entry(normalize(language)).or_default().insert(
            name.trim().to_string(),
            QueryDefinition {
                name: name.trim().to_string(),
                description: description.unwrap_or("user-defined query").to_string(),
                source: source.to_string(),
            },
        );
    }

    /// Look up a query definition. Language names are trimmed and lower-cased.
    pub fn definition(&self, language: &str, name: &str) -> Option<QueryDefinition> {
        let entries = self.entries.read().ok()?;
        entries.get(&normalize(language))?.get(name.trim()).cloned()
    }

    /// Query source for `language`/`name`, or `None` when unknown.
    pub fn get(&self, language: &str, name: &str) -> Option<String> {
        self.definition(language, name).map(|d| d.source)
    }

    /// Query names available for a language, sorted.
    pub fn names(&self, language: &str) -> Vec<String> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| {
                entries
                    .get(&normalize(language))
                    .map(|q| q.keys().cloned().collect())
            })
            .unwrap_or_default()
    }

    pub fn describe(&self, language: &str, name: &str) -> Option<String> {
        self.definition(language, name).map(|d| d.description)
    }

    /// Languages with at least one query.
    pub fn languages(&self) -> Vec<String> {
        self.entries
            .read()
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(_, q)| !q.is_empty())
                    .map(|(l, _)| l.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for QueryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(language: &str) -> String {
    language.trim().to_lowercase()
}
