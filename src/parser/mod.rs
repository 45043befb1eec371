//! Tree-sitter parser adapter.
//!
//! This module provides:
//! - `ParserAdapter`: grammar table keyed by language name, text in, tree out
//! - `ParsedFile`: a tree plus the source it was parsed from
//! - Extension-based language detection for the built-in grammars

use std::collections::HashMap;
use std::sync::RwLock;

use tree_sitter::{Language, Node, Parser as TsParser, Tree};

use crate::error::{AnalysisError, Result};

/// Built-in extension table (extension without dot → language name).
const EXTENSIONS: &[(&str, &str)] = &[
    ("py", "python"),
    ("pyi", "python"),
    ("pyw", "python"),
    ("java", "java"),
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("mjs", "javascript"),
    ("cjs", "javascript"),
    ("ts", "typescript"),
    ("mts", "typescript"),
    ("cts", "typescript"),
    ("tsx", "tsx"),
    ("go", "go"),
    ("rs", "rust"),
    ("c", "c"),
    ("h", "c"),
    ("cpp", "cpp"),
    ("cc", "cpp"),
    ("cxx", "cpp"),
    ("hpp", "cpp"),
    ("hh", "cpp"),
    ("hxx", "cpp"),
];

/// Detect a built-in language from a file extension (with or without the dot).
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.trim_start_matches('.').to_lowercase();
    EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, lang)| *lang)
}

/// Look up a grammar compiled into the binary.
pub fn builtin_grammar(language: &str) -> Option<Language> {
    let grammar: Language = match language {
        "python" => tree_sitter_python::LANGUAGE.into(),
        "java" => tree_sitter_java::LANGUAGE.into(),
        "javascript" => tree_sitter_javascript::LANGUAGE.into(),
        "typescript" => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        "tsx" => tree_sitter_typescript::LANGUAGE_TSX.into(),
        "go" => tree_sitter_go::LANGUAGE.into(),
        "rust" => tree_sitter_rust::LANGUAGE.into(),
        "c" => tree_sitter_c::LANGUAGE.into(),
        "cpp" => tree_sitter_cpp::LANGUAGE.into(),
        _ => return None,
    };
    Some(grammar)
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

/// A tree-sitter grammar together with the language name it serves.
#[derive(Clone)]
pub struct Grammar {
    pub name: String,
    pub language: Language,
}

impl std::fmt::Debug for Grammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grammar").field("name", &self.name).finish()
    }
}

/// Holds a parsed tree-sitter tree and the text it came from.
#[derive(Debug)]
pub struct ParsedFile {
    /// The tree-sitter parse tree.
    pub tree: Tree,
    /// The original source code (kept for node text extraction).
    pub source: String,
    /// The file path (for error reporting).
    pub path: String,
    /// The grammar used to produce the tree.
    pub grammar: Grammar,
}

impl ParsedFile {
    pub fn language(&self) -> &str {
        &self.grammar.name
    }

    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: Node) -> &str {
        self.source
            .get(node.start_byte()..node.end_byte())
            .unwrap_or("")
    }

    /// Whether the parser had to recover from syntax errors.
    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    pub fn line_count(&self) -> usize {
        count_lines(&self.source)
    }

    /// Total number of nodes in the tree, named and anonymous.
    pub fn node_count(&self) -> usize {
        let mut cursor = self.tree.walk();
        let mut count = 0;
        loop {
            count += 1;
            if cursor.goto_first_child() {
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    return count;
                }
            }
        }
    }
}

/// Number of lines as an editor would show them.
pub fn count_lines(source: &str) -> usize {
    source.lines().count()
}

/// Wraps tree-sitter parsing behind a language-name lookup.
pub struct ParserAdapter {
    /// Grammars registered at runtime; consulted before the built-ins.
    extra: RwLock<HashMap<String, Language>>,
}

impl ParserAdapter {
    pub fn new() -> Self {
        Self {
            extra: RwLock::new(HashMap::new()),
        }
    }

    /// Register (or replace) the grammar used for `language`.
    pub fn register_grammar(&self, language: &str, grammar: Language) {
        if let Ok(mut extra) = self.extra.write() {
            extra.insert(language.to_lowercase(), grammar);
        }
    }

    /// Resolve the grammar for a language name.
    pub fn grammar(&self, language: &str) -> Option<Grammar> {
        let name = language.trim().to_lowercase();
        let registered = self
            .extra
            .read()
            .ok()
            .and_then(|extra| extra.get(&name).cloned());
        registered
            .or_else(|| builtin_grammar(&name))
            .map(|language| Grammar { name, language })
    }

    pub fn supports(&self, language: &str) -> bool {
        self.grammar(language).is_some()
    }

    /// All language names a grammar is available for, sorted.
    pub fn languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = BUILTIN_LANGUAGES.iter().map(|s| s.to_string()).collect();
        if let Ok(extra) = self.extra.read() {
            languages.extend(extra.keys().cloned());
        }
        languages.sort();
        languages.dedup();
        languages
    }

    /// Parse `source` as `language`.
    ///
    /// Syntax errors still produce a tree (with ERROR nodes); only a missing
    /// grammar or a parser that returns no tree is a failure.
    pub fn parse(&self, source: &str, language: &str, path: &str) -> Result<ParsedFile> {
        let grammar = self
            .grammar(language)
            .ok_or_else(|| AnalysisError::ParseFailure {
                language: language.to_string(),
                message: "no grammar available".to_string(),
            })?;

        let mut parser = TsParser::new();
        parser
            .set_language(&grammar.language)
            .map_err(|e| AnalysisError::ParseFailure {
                language: grammar.name.clone(),
                message: e.to_string(),
            })?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| AnalysisError::ParseFailure {
                language: grammar.name.clone(),
                message: format!("parser produced no tree for {}", path),
            })?;

        Ok(ParsedFile {
            tree,
            source: source.to_string(),
            path: path.to_string(),
            grammar,
        })
    }
}

impl Default for ParserAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_detection() {
        assert_eq!(language_for_extension("py"), Some("python"));
        assert_eq!(language_for_extension(".java"), Some("java"));
        assert_eq!(language_for_extension("TSX"), Some("tsx"));
        assert_eq!(language_for_extension("hpp"), Some("cpp"));
        assert_eq!(language_for_extension("cobol"), None);
    }

    #[test]
    fn test_parse_python() {
        let adapter = ParserAdapter::new();
        let parsed = adapter
            .parse("def hello():\n    pass\n", "python", "hello.py")
            .unwrap();

        assert_eq!(parsed.language(), "python");
        assert_eq!(parsed.line_count(), 2);
        assert!(parsed.node_count() > 3);
        assert!(!parsed.has_errors());
        assert_eq!(parsed.tree.root_node().kind(), "module");
    }

    #[test]
    fn test_parse_recovers_from_syntax_errors() {
        let adapter = ParserAdapter::new();
        let parsed = adapter.parse("def broken(:\n", "python", "bad.py").unwrap();
        assert!(parsed.has_errors());
    }

    #[test]
    fn test_parse_unknown_language() {
        let adapter = ParserAdapter::new();
        let err = adapter.parse("x", "cobol", "x.cbl").unwrap_err();
        assert!(matches!(err, AnalysisError::ParseFailure { .. }));
    }

    #[test]
    fn test_register_grammar() {
        let adapter = ParserAdapter::new();
        assert!(!adapter.supports("py3"));
        adapter.register_grammar("py3", tree_sitter_python::LANGUAGE.into());
        assert!(adapter.supports("PY3"));
        assert!(adapter.languages().contains(&"py3".to_string()));
    }
}
