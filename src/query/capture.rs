//! Canonical capture record.
//!
//! Tree-sitter hands back `(node, capture index)` pairs; they are normalized
//! here, once, into [`QueryCapture`] and nothing downstream sees the raw form.

use serde::Serialize;
use tree_sitter::Node;

/// Node type used for captures whose normalization failed.
pub const ERROR_NODE_TYPE: &str = "error";

/// One capture produced by running a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryCapture {
    pub capture_name: String,
    pub node_type: String,
    /// 1-indexed.
    pub start_line: usize,
    /// 1-indexed.
    pub end_line: usize,
    /// 0-indexed.
    pub start_column: usize,
    /// 0-indexed.
    pub end_column: usize,
    pub start_byte: usize,
    pub end_byte: usize,
    pub text: String,
}

impl QueryCapture {
    /// Normalize a captured node against `source`.
    ///
    /// Fails when the node's byte range does not address a valid UTF-8 slice of `source`.
    pub fn from_node(capture_name: &str, node: Node, source: &str) -> Result<Self, String> {
        let (start_byte, end_byte) = (node.start_byte(), node.end_byte());
        let text = source.get(start_byte..end_byte).ok_or_else(|| {
            format!(
                "byte range {}..{} is not addressable in a {}-byte source",
                start_byte,
                end_byte,
                source.len()
            )
        })?;

        let start = node.start_position();
        let end = node.end_position();
        Ok(Self {
            capture_name: capture_name.to_string(),
            node_type: node.kind().to_string(),
            start_line: start.row + 1,
            end_line: end.row + 1,
            start_column: start.column,
            end_column: end.column,
            start_byte,
            end_byte,
            text: text.to_string(),
        })
    }

    /// Placeholder reported in place of a capture that could not be normalized.
    pub fn error_placeholder(capture_name: &str, message: impl Into<String>) -> Self {
        Self {
            capture_name: capture_name.to_string(),
            node_type: ERROR_NODE_TYPE.to_string(),
            start_line: 0,
            end_line: 0,
            start_column: 0,
            end_column: 0,
            start_byte: 0,
            end_byte: 0,
            text: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.node_type == ERROR_NODE_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParserAdapter;

    #[test]
    fn test_from_node_positions() {
        let source = "x = 1\ndef f(a):\n    return a\n";
        let parsed = ParserAdapter::new().parse(source, "python", "t.py").unwrap();
        let root = parsed.tree.root_node();
        let func = root.named_child(1).unwrap();
        assert_eq!(func.kind(), "function_definition");

        let capture = QueryCapture::from_node("function", func, source).unwrap();
        assert_eq!(capture.start_line, 2);
        assert_eq!(capture.end_line, 3);
        assert_eq!(capture.start_column, 0);
        assert_eq!(capture.start_byte, 6);
        assert!(capture.text.starts_with("def f(a):"));
        assert!(!capture.is_error());
    }

    #[test]
    fn test_from_node_against_wrong_source() {
        let source = "def long_function_name():\n    pass\n";
        let parsed = ParserAdapter::new().parse(source, "python", "t.py").unwrap();
        let func = parsed.tree.root_node().named_child(0).unwrap();

        let err = QueryCapture::from_node("function", func, "short").unwrap_err();
        assert!(err.contains("not addressable"));
    }

    #[test]
    fn test_error_placeholder() {
        let capture = QueryCapture::error_placeholder("name", "boom");
        assert!(capture.is_error());
        assert_eq!(capture.text, "boom");
    }
}
