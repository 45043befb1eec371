//! Java plugin.

use tree_sitter::Node;

use super::common::{
    count_children, field_text, finish, function_element, import_element, named_children_text,
    query_matches,
};
use super::LanguagePlugin;
use crate::analysis::{CodeElement, ElementKind, FunctionInfo};
use crate::parser::ParsedFile;

const DECLARATION_QUERY: &str = r#"
(package_declaration) @package

(import_declaration) @import

(class_declaration
  name: (identifier) @name
) @class

(interface_declaration
  name: (identifier) @name
) @interface

(enum_declaration
  name: (identifier) @name
) @enum

(record_declaration
  name: (identifier) @name
) @record

(method_declaration
  name: (identifier) @name
) @method

(constructor_declaration
  name: (identifier) @name
) @constructor

(field_declaration
  declarator: (variable_declarator
    name: (identifier) @name
  )
) @field
"#;

const CONTROL_FLOW_QUERY: &str = r#"
(if_statement) @if
(for_statement) @for
(enhanced_for_statement) @for_each
(while_statement) @while
(do_statement) @do
(switch_block_statement_group) @case
(switch_rule) @case
(ternary_expression) @ternary
(catch_clause) @catch
(binary_expression operator: "&&") @and
(binary_expression operator: "||") @or
"#;

const DEFAULT_QUERIES: &[&str] = &["classes", "methods", "imports"];

const TYPE_CAPTURES: &[&str] = &["class", "interface", "enum", "record"];

pub struct JavaPlugin;

impl JavaPlugin {
    pub fn new() -> Self {
        Self
    }

    fn method(&self, parsed: &ParsedFile, node: Node, name: String) -> anyhow::Result<CodeElement> {
        let modifiers = modifiers(parsed, node);
        let visibility = ["public", "private", "protected"]
            .into_iter()
            .find(|m| modifiers.contains(m))
            .unwrap_or("package");

        let info = FunctionInfo {
            parameters: node
                .child_by_field_name("parameters")
                .map(|p| named_children_text(parsed, p, &[]))
                .unwrap_or_default(),
            return_type: field_text(parsed, node, "type"),
            visibility: visibility.to_string(),
            is_static: modifiers.contains(&"static"),
            is_async: false,
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
        let (method_count, field_count) = match node.child_by_field_name("body") {
            Some(body) if class_kind == "enum" => {
                let declarations = {
                    let mut cursor = body.walk();
                    let found = body
                        .named_children(&mut cursor)
                        .find(|c| c.kind() == "enum_body_declarations");
                    found
                };
                let methods = declarations
                    .map(|d| count_children(d, &["method_declaration", "constructor_declaration"]))
                    .unwrap_or(0);
                (methods, count_children(body, &["enum_constant"]))
            }
            Some(body) => (
                count_children(body, &["method_declaration", "constructor_declaration"]),
                count_children(body, &["field_declaration", "constant_declaration"]),
            ),
            None => (0, 0),
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
        let mut module_path = qualified_name(parsed, node)?;
        let mut cursor = node.walk();
        if node.named_children(&mut cursor).any(|c| c.kind() == "asterisk") {
            module_path.push_str(".*");
        }
        Some(import_element(parsed, node, module_path, None))
    }
}

impl Default for JavaPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguagePlugin for JavaPlugin {
    fn language_name(&self) -> &str {
        "java"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["java"]
    }

    fn default_queries(&self) -> &[&'static str] {
        DEFAULT_QUERIES
    }

    fn extract_elements(&self, parsed: &ParsedFile) -> anyhow::Result<Vec<CodeElement>> {
        let mut elements = Vec::new();
        let all = [
            "package",
            "import",
            "class",
            "interface",
            "enum",
            "record",
            "method",
            "constructor",
            "field",
        ];

        for m in query_matches(parsed, DECLARATION_QUERY, parsed.tree.root_node())? {
            let name = m.get("name").map(|n| parsed.node_text(n).to_string());
            let Some((capture, node)) = m.first_of(&all) else {
                continue;
            };

            let element = match (capture, name) {
                ("package", _) => qualified_name(parsed, node).map(|package| {
                    CodeElement::from_node(parsed, node, package, ElementKind::Package)
                }),
                ("import", _) => self.import(parsed, node),
                ("method" | "constructor", Some(name)) => Some(self.method(parsed, node, name)?),
                ("field", Some(name)) => Some(CodeElement::from_node(
                    parsed,
                    node,
                    name,
                    ElementKind::Variable {
                        declared_type: field_text(parsed, node, "type"),
                    },
                )),
                (kind, Some(name)) if TYPE_CAPTURES.contains(&kind) => {
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

/// Modifier keywords of a declaration (`public`, `static`, ...).
fn modifiers<'a>(parsed: &'a ParsedFile, node: Node) -> Vec<&'a str> {
    let mut cursor = node.walk();
    let modifiers: Vec<&'a str> = node
        .children(&mut cursor)
        .find(|c| c.kind() == "modifiers")
        .map(|m| {
            parsed
                .node_text(m)
                .split_whitespace()
                .filter(|word| !word.starts_with('@'))
                .collect()
        })
        .unwrap_or_default();
    modifiers
}

/// Dotted name of a package or import declaration.
fn qualified_name(parsed: &ParsedFile, node: Node) -> Option<String> {
    let mut cursor = node.walk();
    let name = node
        .named_children(&mut cursor)
        .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"))
        .map(|c| parsed.node_text(c).to_string());
    name
}
