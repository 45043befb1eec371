//! Rust plugin.

use std::collections::HashMap;

use tree_sitter::Node;

use super::common::{
    count_children, field_text, finish, function_element, import_element, named_children_text,
    query_matches,
};
use super::LanguagePlugin;
use crate::analysis::{CodeElement, ElementKind, FunctionInfo};
use crate::parser::ParsedFile;

const DECLARATION_QUERY: &str = r#"
; Functions, impl and trait methods included
(function_item
  name: (identifier) @name
) @function

(struct_item
  name: (type_identifier) @name
) @struct

(enum_item
  name: (type_identifier) @name
) @enum

(union_item
  name: (type_identifier) @name
) @union

(trait_item
  name: (type_identifier) @name
) @trait

(type_item
  name: (type_identifier) @name
) @type

(mod_item
  name: (identifier) @name
) @module

(impl_item
  type: (_) @impl_type
  body: (declaration_list) @impl_body
) @impl

(use_declaration
  argument: (_) @argument
) @import

(const_item
  name: (identifier) @name
) @variable

(static_item
  name: (identifier) @name
) @variable
"#;

/// Tree-sitter query for control flow nodes (complexity calculation).
const CONTROL_FLOW_QUERY: &str = r#"
(if_expression) @if
(for_expression) @for
(while_expression) @while
(match_arm) @match_arm
(binary_expression operator: "&&") @and
(binary_expression operator: "||") @or
"#;

const DEFAULT_QUERIES: &[&str] = &["functions", "structs", "enums", "traits", "imports"];

const CAPTURES: &[&str] = &[
    "function", "struct", "enum", "union", "trait", "type", "module", "impl", "import",
    "variable",
];

/// Rust language plugin.
pub struct RustPlugin;

impl RustPlugin {
    /// Create a new Rust plugin.
    pub fn new() -> Self {
        Self
    }

    fn function(&self, parsed: &ParsedFile, node: Node, name: String) -> anyhow::Result<CodeElement> {
        let params = node.child_by_field_name("parameters");
        let has_self = params.is_some_and(|p| count_children(p, &["self_parameter"]) > 0);
        let in_impl = node
            .parent()
            .and_then(|body| body.parent())
            .is_some_and(|owner| matches!(owner.kind(), "impl_item" | "trait_item"));

        let modifiers = {
            let mut cursor = node.walk();
            let text = node
                .children(&mut cursor)
                .find(|c| c.kind() == "function_modifiers")
                .map(|m| parsed.node_text(m).to_string())
                .unwrap_or_default();
            text
        };

        let info = FunctionInfo {
            parameters: params
                .map(|p| named_children_text(parsed, p, &["attribute_item"]))
                .unwrap_or_default(),
            return_type: field_text(parsed, node, "return_type"),
            visibility: visibility(parsed, node),
            is_static: in_impl && !has_self,
            is_async: modifiers.split_whitespace().any(|m| m == "async"),
            complexity: None,
        };
        function_element(parsed, node, name, info, CONTROL_FLOW_QUERY)
    }

    fn type_item(&self, parsed: &ParsedFile, node: Node, class_kind: &str, name: String) -> CodeElement {
        let body = node.child_by_field_name("body");
        let (method_count, field_count) = match (class_kind, body) {
            ("struct" | "union", Some(body)) if body.kind() == "field_declaration_list" => {
                (0, count_children(body, &["field_declaration"]))
            }
            // Tuple struct: every named child but visibility and attributes is a field type.
            ("struct", Some(body)) => {
                let mut cursor = body.walk();
                let fields = body
                    .named_children(&mut cursor)
                    .filter(|c| !matches!(c.kind(), "visibility_modifier" | "attribute_item"))
                    .count();
                (0, fields)
            }
            ("enum", Some(body)) => (0, count_children(body, &["enum_variant"])),
            ("trait", Some(body)) => (
                count_children(body, &["function_item", "function_signature_item"]),
                0,
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

    fn import(&self, parsed: &ParsedFile, node: Node, argument: Node) -> CodeElement {
        let (module_path, alias) = if argument.kind() == "use_as_clause" {
            (
                field_text(parsed, argument, "path")
                    .unwrap_or_else(|| parsed.node_text(argument).to_string()),
                field_text(parsed, argument, "alias"),
            )
        } else {
            (parsed.node_text(argument).to_string(), None)
        };
        import_element(parsed, node, module_path, alias)
    }
}

impl Default for RustPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguagePlugin for RustPlugin {
    fn language_name(&self) -> &str {
        "rust"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["rs"]
    }

    fn default_queries(&self) -> &[&'static str] {
        DEFAULT_QUERIES
    }

    fn extract_elements(&self, parsed: &ParsedFile) -> anyhow::Result<Vec<CodeElement>> {
        let mut elements = Vec::new();
        // Impl target type → number of functions in its impl blocks.
        let mut impl_methods: HashMap<String, usize> = HashMap::new();

        for m in query_matches(parsed, DECLARATION_QUERY, parsed.tree.root_node())? {
            let name = m.get("name").map(|n| parsed.node_text(n).to_string());
            let Some((capture, node)) = m.first_of(CAPTURES) else {
                continue;
            };

            let element = match (capture, name) {
                ("function", Some(name)) => Some(self.function(parsed, node, name)?),
                ("module", Some(name)) => Some(CodeElement::from_node(
                    parsed,
                    node,
                    name,
                    ElementKind::Package,
                )),
                ("variable", Some(name)) => Some(CodeElement::from_node(
                    parsed,
                    node,
                    name,
                    ElementKind::Variable {
                        declared_type: field_text(parsed, node, "type"),
                    },
                )),
                ("import", _) => m
                    .get("argument")
                    .map(|argument| self.import(parsed, node, argument)),
                ("impl", _) => {
                    if let (Some(ty), Some(body)) = (m.get("impl_type"), m.get("impl_body")) {
                        let target = base_type_name(parsed.node_text(ty));
                        *impl_methods.entry(target).or_default() +=
                            count_children(body, &["function_item"]);
                    }
                    None
                }
                (kind @ ("struct" | "enum" | "union" | "trait" | "type"), Some(name)) => {
                    Some(self.type_item(parsed, node, kind, name))
                }
                _ => None,
            };

            if let Some(element) = element {
                elements.push((node.start_byte(), element));
            }
        }

        for (_, element) in elements.iter_mut() {
            if let ElementKind::Class {
                class_kind,
                method_count,
                ..
            } = &mut element.kind
            {
                if class_kind.as_str() != "trait" {
                    *method_count += impl_methods.get(&element.name).copied().unwrap_or(0);
                }
            }
        }

        Ok(finish(elements))
    }
}

fn visibility(parsed: &ParsedFile, node: Node) -> String {
    let mut cursor = node.walk();
    let modifier = node
        .children(&mut cursor)
        .find(|c| c.kind() == "visibility_modifier")
        .map(|v| parsed.node_text(v).to_string());
    match modifier.as_deref() {
        None => "private".to_string(),
        Some("pub") => "public".to_string(),
        Some(other) => other.to_string(),
    }
}

/// `Wrapper<T>` → "Wrapper", `crate::a::B` → "B".
fn base_type_name(text: &str) -> String {
    let without_generics = text.split('<').next().unwrap_or(text);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
        .trim()
        .to_string()
}
