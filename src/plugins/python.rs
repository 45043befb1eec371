//! Python plugin.

use tree_sitter::Node;

use super::common::{
    clean_type, count_children, field_text, finish, function_element, has_child_kind,
    import_element, named_children_text, query_matches,
};
use super::LanguagePlugin;
use crate::analysis::{CodeElement, ElementKind, FunctionInfo};
use crate::parser::ParsedFile;

const DECLARATION_QUERY: &str = r#"
(function_definition
  name: (identifier) @name
) @function

(class_definition
  name: (identifier) @name
) @class

(import_statement) @import

(import_from_statement) @import_from

; Module-level assignments only
(module
  (expression_statement
    (assignment
      left: (identifier) @name
    ) @variable
  )
)
"#;

const CONTROL_FLOW_QUERY: &str = r#"
(if_statement) @if
(elif_clause) @elif
(for_statement) @for
(while_statement) @while
(conditional_expression) @ternary
(boolean_operator operator: "and") @and
(boolean_operator operator: "or") @or
(except_clause) @except
(case_clause) @case
"#;

const DEFAULT_QUERIES: &[&str] = &["functions", "classes", "imports"];

pub struct PythonPlugin;

impl PythonPlugin {
    pub fn new() -> Self {
        Self
    }

    fn function(&self, parsed: &ParsedFile, node: Node, name: String) -> anyhow::Result<CodeElement> {
        let parameters = node
            .child_by_field_name("parameters")
            .map(|p| {
                named_children_text(parsed, p, &["positional_separator", "keyword_separator"])
            })
            .unwrap_or_default();

        let info = FunctionInfo {
            parameters,
            return_type: field_text(parsed, node, "return_type").map(|t| clean_type(&t)),
            visibility: visibility(&name).to_string(),
            is_static: has_decorator(parsed, node, "staticmethod"),
            is_async: has_child_kind(node, "async"),
            complexity: None,
        };
        function_element(parsed, node, name, info, CONTROL_FLOW_QUERY)
    }

    fn class(&self, parsed: &ParsedFile, node: Node, name: String) -> CodeElement {
        let (method_count, field_count) = match node.child_by_field_name("body") {
            Some(body) => {
                let mut cursor = body.walk();
                let fields = body
                    .named_children(&mut cursor)
                    .filter(|s| {
                        s.kind() == "expression_statement"
                            && s.named_child(0).map(|c| c.kind()) == Some("assignment")
                    })
                    .count();
                let methods = count_children(body, &["function_definition"])
                    + decorated_functions(body);
                (methods, fields)
            }
            None => (0, 0),
        };

        CodeElement::from_node(
            parsed,
            node,
            name,
            ElementKind::Class {
                class_kind: "class".to_string(),
                method_count,
                field_count,
            },
        )
    }

    /// `import a.b as c, d` → one element for the first module named.
    fn import(&self, parsed: &ParsedFile, node: Node) -> Option<CodeElement> {
        let first = node.child_by_field_name("name")?;
        let (module_path, alias) = if first.kind() == "aliased_import" {
            (
                field_text(parsed, first, "name")?,
                field_text(parsed, first, "alias"),
            )
        } else {
            (parsed.node_text(first).to_string(), None)
        };
        Some(import_element(parsed, node, module_path, alias))
    }

    fn import_from(&self, parsed: &ParsedFile, node: Node) -> Option<CodeElement> {
        let module_path = field_text(parsed, node, "module_name")?;
        Some(import_element(parsed, node, module_path, None))
    }
}

impl Default for PythonPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguagePlugin for PythonPlugin {
    fn language_name(&self) -> &str {
        "python"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["py", "pyi", "pyw"]
    }

    fn default_queries(&self) -> &[&'static str] {
        DEFAULT_QUERIES
    }

    fn extract_elements(&self, parsed: &ParsedFile) -> anyhow::Result<Vec<CodeElement>> {
        let mut elements = Vec::new();

        for m in query_matches(parsed, DECLARATION_QUERY, parsed.tree.root_node())? {
            let name = m.get("name").map(|n| parsed.node_text(n).to_string());
            let Some((capture, node)) =
                m.first_of(&["function", "class", "import", "import_from", "variable"])
            else {
                continue;
            };

            let element = match (capture, name) {
                ("function", Some(name)) => Some(self.function(parsed, node, name)?),
                ("class", Some(name)) => Some(self.class(parsed, node, name)),
                ("variable", Some(name)) => Some(CodeElement::from_node(
                    parsed,
                    node,
                    name,
                    ElementKind::Variable {
                        declared_type: field_text(parsed, node, "type"),
                    },
                )),
                ("import", _) => self.import(parsed, node),
                ("import_from", _) => self.import_from(parsed, node),
                _ => None,
            };

            if let Some(element) = element {
                elements.push((node.start_byte(), element));
            }
        }

        Ok(finish(elements))
    }
}

/// Naming-convention visibility: `__x` private, `_x` protected.
fn visibility(name: &str) -> &'static str {
    let dunder = name.starts_with("__") && name.ends_with("__");
    if name.starts_with("__") && !dunder {
        "private"
    } else if name.starts_with('_') && !dunder {
        "protected"
    } else {
        "public"
    }
}

fn has_decorator(parsed: &ParsedFile, function: Node, decorator: &str) -> bool {
    let Some(parent) = function.parent() else {
        return false;
    };
    if parent.kind() != "decorated_definition" {
        return false;
    }
    let mut cursor = parent.walk();
    let found = parent
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "decorator")
        .any(|c| parsed.node_text(c).trim_start_matches('@').trim() == decorator);
    found
}

fn decorated_functions(body: Node) -> usize {
    let mut cursor = body.walk();
    let count = body
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "decorated_definition")
        .filter(|c| {
            c.child_by_field_name("definition").map(|d| d.kind()) == Some("function_definition")
        })
        .count();
    count
}
