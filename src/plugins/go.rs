//! Go plugin.

use std::collections::HashMap;

use tree_sitter::Node;

use super::common::{
    count_children, field_text, finish, function_element, import_element, named_children_text,
    query_matches, unquote,
};
use super::LanguagePlugin;
use crate::analysis::{CodeElement, ElementKind, FunctionInfo};
use crate::parser::ParsedFile;

const DECLARATION_QUERY: &str = r#"
(package_clause
  (package_identifier) @name
) @package

(import_spec
  path: (_) @path
) @import

(function_declaration
  name: (identifier) @name
) @function

(method_declaration
  name: (field_identifier) @name
) @method

(type_spec
  name: (type_identifier) @name
) @type

(var_spec
  name: (identifier) @name
) @variable

(const_spec
  name: (identifier) @name
) @variable
"#;

/// Tree-sitter query for control flow nodes (complexity calculation).
const CONTROL_FLOW_QUERY: &str = r#"
(if_statement) @if
(for_statement) @for
(expression_case) @case
(type_case) @case
(communication_case) @case
(binary_expression operator: "&&") @and
(binary_expression operator: "||") @or
"#;

const DEFAULT_QUERIES: &[&str] = &["functions", "methods", "types", "imports"];

const CAPTURES: &[&str] = &["package", "import", "function", "method", "type", "variable"];

/// Go language plugin.
pub struct GoPlugin;

impl GoPlugin {
    pub fn new() -> Self {
        Self
    }

    fn function(&self, parsed: &ParsedFile, node: Node, name: String) -> anyhow::Result<CodeElement> {
        let info = FunctionInfo {
            parameters: node
                .child_by_field_name("parameters")
                .map(|p| named_children_text(parsed, p, &[]))
                .unwrap_or_default(),
            return_type: field_text(parsed, node, "result"),
            visibility: visibility(&name).to_string(),
            is_static: false,
            is_async: false,
            complexity: None,
        };
        function_element(parsed, node, name, info, CONTROL_FLOW_QUERY)
    }

    fn type_spec(&self, parsed: &ParsedFile, node: Node, name: String) -> CodeElement {
        let ty = node.child_by_field_name("type");
        let (class_kind, method_count, field_count) = match ty.map(|t| (t.kind(), t)) {
            Some(("struct_type", t)) => {
                let fields = {
                    let mut cursor = t.walk();
                    let list = t
                        .named_children(&mut cursor)
                        .find(|c| c.kind() == "field_declaration_list");
                    list
                };
                let fields = fields
                    .map(|list| count_children(list, &["field_declaration"]))
                    .unwrap_or(0);
                ("struct", 0, fields)
            }
            Some(("interface_type", t)) => {
                ("interface", count_children(t, &["method_elem", "method_spec"]), 0)
            }
            _ => ("type", 0, 0),
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
}

impl Default for GoPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguagePlugin for GoPlugin {
    fn language_name(&self) -> &str {
        "go"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["go"]
    }

    fn default_queries(&self) -> &[&'static str] {
        DEFAULT_QUERIES
    }

    fn extract_elements(&self, parsed: &ParsedFile) -> anyhow::Result<Vec<CodeElement>> {
        let mut elements = Vec::new();
        // Receiver type name → number of methods declared on it.
        let mut receivers: HashMap<String, usize> = HashMap::new();

        for m in query_matches(parsed, DECLARATION_QUERY, parsed.tree.root_node())? {
            let name = m.get("name").map(|n| parsed.node_text(n).to_string());
            let Some((capture, node)) = m.first_of(CAPTURES) else {
                continue;
            };

            let element = match (capture, name) {
                ("package", Some(name)) => Some(CodeElement::from_node(
                    parsed,
                    node,
                    name,
                    ElementKind::Package,
                )),
                ("import", _) => m.get("path").map(|path| {
                    let module_path = unquote(parsed.node_text(path));
                    import_element(parsed, node, module_path, field_text(parsed, node, "name"))
                }),
                ("function", Some(name)) => Some(self.function(parsed, node, name)?),
                ("method", Some(name)) => {
                    if let Some(receiver) = receiver_type(parsed, node) {
                        *receivers.entry(receiver).or_default() += 1;
                    }
                    Some(self.function(parsed, node, name)?)
                }
                ("type", Some(name)) => Some(self.type_spec(parsed, node, name)),
                ("variable", Some(name)) if !inside_function(node) => {
                    Some(CodeElement::from_node(
                        parsed,
                        node,
                        name,
                        ElementKind::Variable {
                            declared_type: field_text(parsed, node, "type"),
                        },
                    ))
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
                if class_kind.as_str() != "interface" {
                    *method_count += receivers.get(&element.name).copied().unwrap_or(0);
                }
            }
        }

        Ok(finish(elements))
    }
}

/// Exported identifiers start with an upper-case letter.
fn visibility(name: &str) -> &'static str {
    if name.chars().next().is_some_and(char::is_uppercase) {
        "public"
    } else {
        "private"
    }
}

/// `func (s *Server) Run()` → "Server".
fn receiver_type(parsed: &ParsedFile, method: Node) -> Option<String> {
    let receiver = method.child_by_field_name("receiver")?;
    let param = receiver.named_child(0)?;
    let ty = param.child_by_field_name("type")?;
    let text = parsed.node_text(ty).trim_start_matches('*');
    // Drop type arguments of generic receivers.
    let base = text.split('[').next().unwrap_or(text).trim();
    Some(base.to_string())
}

fn inside_function(node: Node) -> bool {
    let mut current = node.parent();
    while let Some(n) = current {
        if matches!(n.kind(), "block" | "function_declaration" | "method_declaration") {
            return true;
        }
        current = n.parent();
    }
    false
}
