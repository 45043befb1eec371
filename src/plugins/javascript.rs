//! JavaScript and TypeScript plugin.
//!
//! One implementation serves three grammars: `javascript`, `typescript` and
//! `tsx`. The TypeScript dialects add interfaces, type aliases, enums and
//! type annotations on top of the JavaScript declarations.

use tree_sitter::Node;

use super::common::{
    clean_type, count_children, field_text, finish, function_element, has_child_kind,
    import_element, named_children_text, query_matches, unquote,
};
use super::LanguagePlugin;
use crate::analysis::{CodeElement, ElementKind, FunctionInfo};
use crate::parser::ParsedFile;

const DECLARATION_QUERY: &str = r#"
(function_declaration
  name: (_) @name
) @function

(generator_function_declaration
  name: (_) @name
) @function

(class_declaration
  name: (_) @name
) @class

(method_definition
  name: (_) @name
) @method

; Functions bound to a variable
(variable_declarator
  name: (identifier) @name
  value: [(arrow_function) (function_expression)]
) @function_variable

; Top-level (optionally exported) variables
(program
  [
    (lexical_declaration (variable_declarator name: (identifier) @name) @variable)
    (variable_declaration (variable_declarator name: (identifier) @name) @variable)
    (export_statement
      declaration: (lexical_declaration
        (variable_declarator name: (identifier) @name) @variable))
  ]
)

(import_statement
  source: (_)
) @import
"#;

const TYPESCRIPT_QUERY: &str = r#"
(abstract_class_declaration
  name: (_) @name
) @class

(interface_declaration
  name: (_) @name
) @interface

(type_alias_declaration
  name: (_) @name
) @type

(enum_declaration
  name: (_) @name
) @enum
"#;

const CONTROL_FLOW_QUERY: &str = r#"
(if_statement) @if
(for_statement) @for
(for_in_statement) @for_in
(while_statement) @while
(do_statement) @do
(switch_case) @case
(ternary_expression) @ternary
(catch_clause) @catch
(binary_expression operator: "&&") @and
(binary_expression operator: "||") @or
(binary_expression operator: "??") @nullish
"#;

const CAPTURES: &[&str] = &[
    "function",
    "function_variable",
    "class",
    "method",
    "variable",
    "import",
    "interface",
    "type",
    "enum",
];

const FUNCTION_VALUES: &[&str] = &["arrow_function", "function_expression"];

pub struct JavaScriptPlugin {
    language: &'static str,
    extensions: &'static [&'static str],
    default_queries: &'static [&'static str],
    typed: bool,
}

impl JavaScriptPlugin {
    pub fn javascript() -> Self {
        Self {
            language: "javascript",
            extensions: &["js", "jsx", "mjs", "cjs"],
            default_queries: &["functions", "classes", "imports"],
            typed: false,
        }
    }

    pub fn typescript() -> Self {
        Self {
            language: "typescript",
            extensions: &["ts", "mts", "cts"],
            default_queries: &["functions", "classes", "interfaces", "imports"],
            typed: true,
        }
    }

    pub fn tsx() -> Self {
        Self {
            language: "tsx",
            extensions: &["tsx"],
            ..Self::typescript()
        }
    }

    fn function(
        &self,
        parsed: &ParsedFile,
        node: Node,
        function: Node,
        name: String,
    ) -> anyhow::Result<CodeElement> {
        let parameters = match function.child_by_field_name("parameters") {
            Some(params) => named_children_text(parsed, params, &[]),
            // Single bare arrow parameter: `x => x + 1`
            None => field_text(parsed, function, "parameter").into_iter().collect(),
        };

        let visibility = {
            let mut cursor = function.walk();
            let modifier = function
                .children(&mut cursor)
                .find(|c| c.kind() == "accessibility_modifier")
                .map(|c| parsed.node_text(c).to_string());
            modifier
        };
        let visibility = visibility.unwrap_or_else(|| {
            if name.starts_with('#') {
                "private".to_string()
            } else {
                "public".to_string()
            }
        });

        let info = FunctionInfo {
            parameters,
            return_type: field_text(parsed, function, "return_type").map(|t| clean_type(&t)),
            visibility,
            is_static: has_child_kind(function, "static"),
            is_async: has_child_kind(function, "async"),
            complexity: None,
        };
        function_element(parsed, node, name, info, CONTROL_FLOW_QUERY)
    }

    fn type_declaration(
        &self,
        parsed: &ParsedFile,
        node: Node,
        class_kind: &str,
        name: String,
    ) -> CodeElement {
        let body = node.child_by_field_name("body");
        let (method_count, field_count) = match (class_kind, body) {
            ("class", Some(body)) => (
                count_children(
                    body,
                    &["method_definition", "method_signature", "abstract_method_signature"],
                ),
                count_children(body, &["field_definition", "public_field_definition"]),
            ),
            ("interface", Some(body)) => (
                count_children(body, &["method_signature"]),
                count_children(body, &["property_signature"]),
            ),
            ("enum", Some(body)) => (
                0,
                count_children(body, &["property_identifier", "enum_assignment"]),
            ),
            _ => (0, 0),
        };

        CodeElement::from_node(
            parsed,
            node,
            name,
            ElementKind::Class {
                class_kind: class_kind.to_string(),
                method_count,
                field_count,
            },
        )
    }

    fn import(&self, parsed: &ParsedFile, node: Node) -> Option<CodeElement> {
        let module_path = unquote(&field_text(parsed, node, "source")?);
        // `import * as ns from "mod"`
        let alias = {
            let mut cursor = node.walk();
            let clause = node
                .named_children(&mut cursor)
                .find(|c| c.kind() == "import_clause");
            clause.and_then(|clause| {
                let mut cursor = clause.walk();
                let namespace = clause
                    .named_children(&mut cursor)
                    .find(|c| c.kind() == "namespace_import")
                    .and_then(|ns| ns.named_child(0))
                    .map(|id| parsed.node_text(id).to_string());
                namespace
            })
        };
        Some(import_element(parsed, node, module_path, alias))
    }

    fn query_source(&self) -> String {
        if self.typed {
            format!("{}\n{}", DECLARATION_QUERY, TYPESCRIPT_QUERY)
        } else {
            DECLARATION_QUERY.to_string()
        }
    }
}

impl LanguagePlugin for JavaScriptPlugin {
    fn language_name(&self) -> &str {
        self.language
    }

    fn file_extensions(&self) -> &[&'static str] {
        self.extensions
    }

    fn default_queries(&self) -> &[&'static str] {
        self.default_queries
    }

    fn extract_elements(&self, parsed: &ParsedFile) -> anyhow::Result<Vec<CodeElement>> {
        let mut elements = Vec::new();

        for m in query_matches(parsed, &self.query_source(), parsed.tree.root_node())? {
            let name = m.get("name").map(|n| parsed.node_text(n).to_string());
            let Some((capture, node)) = m.first_of(CAPTURES) else {
                continue;
            };

            let element = match (capture, name) {
                ("function" | "method", Some(name)) => {
                    Some(self.function(parsed, node, node, name)?)
                }
                ("function_variable", Some(name)) => match node.child_by_field_name("value") {
                    Some(value) => Some(self.function(parsed, node, value, name)?),
                    None => None,
                },
                ("variable", Some(name)) => {
                    let value_kind = node.child_by_field_name("value").map(|v| v.kind());
                    if value_kind.is_some_and(|k| FUNCTION_VALUES.contains(&k)) {
                        None
                    } else {
                        Some(CodeElement::from_node(
                            parsed,
                            node,
                            name,
                            ElementKind::Variable {
                                declared_type: field_text(parsed, node, "type")
                                    .map(|t| clean_type(&t)),
                            },
                        ))
                    }
                }
                ("import", _) => self.import(parsed, node),
                (kind @ ("class" | "interface" | "type" | "enum"), Some(name)) => {
                    Some(self.type_declaration(parsed, node, kind, name))
                }
                _ => None,
            };

            if let Some(element) = element {
                elements.push((node.start_byte(), element));
            }
        }

        Ok(finish(elements))
    }
}
