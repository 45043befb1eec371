//! Structural elements extracted from a syntax tree.

use serde::Serialize;
use std::fmt;

use crate::parser::ParsedFile;

/// Kind-specific data for a function or method.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FunctionInfo {
    /// Parameter source snippets, in declaration order.
    pub parameters: Vec<String>,
    pub return_type: Option<String>,
    /// "public", "private", "protected", or a language default.
    pub visibility: String,
    pub is_static: bool,
    pub is_async: bool,
    /// Cyclomatic complexity (1 + decision points). `None` when not computed.
    pub complexity: Option<u32>,
}

/// Element kind, carrying the fields that only make sense for that kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementKind {
    Package,
    Class {
        /// "class", "struct", "interface", "enum", "trait", ...
        class_kind: String,
        method_count: usize,
        field_count: usize,
    },
    Function(FunctionInfo),
    Variable {
        declared_type: Option<String>,
    },
    Import {
        module_path: String,
        alias: Option<String>,
    },
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Package => "package",
            ElementKind::Class { .. } => "class",
            ElementKind::Function(_) => "function",
            ElementKind::Variable { .. } => "variable",
            ElementKind::Import { .. } => "import",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One structural element of a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeElement {
    pub name: String,
    #[serde(flatten)]
    pub kind: ElementKind,
    /// Start line (1-indexed, inclusive).
    pub start_line: usize,
    /// End line (1-indexed, inclusive).
    pub end_line: usize,
    pub raw_text: String,
    pub language: String,
}

impl CodeElement {
    /// Build an element spanning `node`.
    pub fn from_node(
        parsed: &ParsedFile,
        node: tree_sitter::Node,
        name: impl Into<String>,
        kind: ElementKind,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
            raw_text: parsed.node_text(node).to_string(),
            language: parsed.language().to_string(),
        }
    }

    pub fn kind_str(&self) -> &'static str {
        self.kind.as_str()
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, ElementKind::Function(_))
    }

    pub fn function_info(&self) -> Option<&FunctionInfo> {
        match &self.kind {
            ElementKind::Function(info) => Some(info),
            _ => None,
        }
    }

    /// Drop the computed complexity score, if any.
    pub fn clear_complexity(&mut self) {
        if let ElementKind::Function(info) = &mut self.kind {
            info.complexity = None;
        }
    }
}

/// Count elements of each kind: (packages, classes, functions, variables, imports).
pub fn kind_counts(elements: &[CodeElement]) -> [usize; 5] {
    let mut counts = [0; 5];
    for e in elements {
        let idx = match e.kind {
            ElementKind::Package => 0,
            ElementKind::Class { .. } => 1,
            ElementKind::Function(_) => 2,
            ElementKind::Variable { .. } => 3,
            ElementKind::Import { .. } => 4,
        };
        counts[idx] += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(kind: ElementKind) -> CodeElement {
        CodeElement {
            name: "x".to_string(),
            kind,
            start_line: 1,
            end_line: 1,
            raw_text: String::new(),
            language: "python".to_string(),
        }
    }

    #[test]
    fn test_kind_str() {
        assert_eq!(element(ElementKind::Package).kind_str(), "package");
        assert_eq!(
            element(ElementKind::Function(FunctionInfo::default())).kind_str(),
            "function"
        );
        assert_eq!(
            element(ElementKind::Variable {
                declared_type: None
            })
            .kind
            .to_string(),
            "variable"
        );
    }

    #[test]
    fn test_clear_complexity() {
        let mut e = element(ElementKind::Function(FunctionInfo {
            complexity: Some(4),
            ..Default::default()
        }));
        e.clear_complexity();
        assert_eq!(e.function_info().unwrap().complexity, None);
    }

    #[test]
    fn test_serialize_flattens_kind() {
        let e = element(ElementKind::Import {
            module_path: "os".to_string(),
            alias: None,
        });
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["kind"], "import");
        assert_eq!(json["module_path"], "os");
        assert_eq!(json["name"], "x");
    }

    #[test]
    fn test_kind_counts() {
        let elements = vec![
            element(ElementKind::Package),
            element(ElementKind::Function(FunctionInfo::default())),
            element(ElementKind::Function(FunctionInfo::default())),
        ];
        assert_eq!(kind_counts(&elements), [1, 0, 2, 0, 0]);
    }
}
