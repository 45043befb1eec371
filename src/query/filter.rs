//! Filter expressions for query results.
//!
//! An expression is a comma-separated list of clauses, all of which must hold:
//!
//! ```text
//! name=main            exact element name
//! name=~get*           case-insensitive glob on the name
//! params=2             number of entries in the first argument list
//! public=true          modifier keyword present (or absent with =false)
//! ```
//!
//! Names, parameter counts and modifiers are read from the raw text of each
//! result with lightweight pattern scans, not from the syntax tree.

use globset::{GlobBuilder, GlobMatcher};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::capture::QueryCapture;
use crate::analysis::CodeElement;

/// Errors from parsing a filter expression.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("malformed filter clause {0:?} (expected key=value)")]
    MalformedClause(String),
    #[error("params expects a non-negative integer, got {0:?}")]
    InvalidParamCount(String),
    #[error("{key} expects true or false, got {value:?}")]
    InvalidBool { key: String, value: String },
    #[error("invalid name pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("{clause} needs source text, which {name:?} does not carry (analyze with details)")]
    MissingText { clause: String, name: String },
}

/// Modifier keywords that can be tested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Static,
    Public,
    Private,
    Protected,
}

impl Modifier {
    fn parse(key: &str) -> Option<Self> {
        match key {
            "static" => Some(Modifier::Static),
            "public" => Some(Modifier::Public),
            "private" => Some(Modifier::Private),
            "protected" => Some(Modifier::Protected),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Modifier::Static => "static",
            Modifier::Public => "public",
            Modifier::Private => "private",
            Modifier::Protected => "protected",
        }
    }
}

/// One parsed clause.
#[derive(Debug, Clone)]
pub enum Clause {
    NameEquals(String),
    NameGlob { pattern: String, matcher: GlobMatcher },
    Params(usize),
    Modifier { modifier: Modifier, present: bool },
    /// Unrecognized key; matches everything.
    Unknown { key: String, value: String },
}

impl Clause {
    fn matches<T: Filterable + ?Sized>(&self, item: &T, language: &str) -> bool {
        match self {
            Clause::NameEquals(expected) => item
                .display_name(language)
                .is_some_and(|name| &name == expected),
            Clause::NameGlob { matcher, .. } => item
                .display_name(language)
                .is_some_and(|name| matcher.is_match(name)),
            Clause::Params(expected) => count_parameters(item.filter_text()) == *expected,
            Clause::Modifier { modifier, present } => {
                item.filter_text().contains(modifier.keyword()) == *present
            }
            Clause::Unknown { .. } => true,
        }
    }

    /// Whether the clause scans raw text rather than the name.
    fn reads_text(&self) -> bool {
        matches!(self, Clause::Params(_) | Clause::Modifier { .. })
    }

    fn describe(&self) -> String {
        match self {
            Clause::NameEquals(name) => format!("name equals {:?}", name),
            Clause::NameGlob { pattern, .. } => format!("name matches {:?}", pattern),
            Clause::Params(n) => format!("{} parameter(s)", n),
            Clause::Modifier { modifier, present } => {
                let verb = if *present { "has" } else { "lacks" };
                format!("{} {}", verb, modifier.keyword())
            }
            Clause::Unknown { key, value } => format!("ignored {}={}", key, value),
        }
    }
}

/// A parsed filter expression. The empty expression matches everything.
#[derive(Debug, Clone, Default)]
pub struct FilterExpr {
    pub clauses: Vec<Clause>,
}

impl FilterExpr {
    pub fn parse(expr: &str) -> Result<Self, FilterError> {
        let mut clauses = Vec::new();
        for raw in expr.split(',') {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            clauses.push(parse_clause(raw)?);
        }
        Ok(Self { clauses })
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Human-readable clause list.
    pub fn summary(&self) -> Vec<String> {
        self.clauses.iter().map(Clause::describe).collect()
    }
}

fn parse_clause(raw: &str) -> Result<Clause, FilterError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| FilterError::MalformedClause(raw.to_string()))?;
    let key = key.trim().to_lowercase();
    let value = value.trim();
    if key.is_empty() {
        return Err(FilterError::MalformedClause(raw.to_string()));
    }

    if key == "name" {
        if let Some(pattern) = value.strip_prefix('~') {
            let pattern = pattern.trim();
            let matcher = GlobBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| FilterError::InvalidPattern {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })?
                .compile_matcher();
            return Ok(Clause::NameGlob {
                pattern: pattern.to_string(),
                matcher,
            });
        }
        return Ok(Clause::NameEquals(value.to_string()));
    }

    if key == "params" {
        let n = value
            .parse::<usize>()
            .map_err(|_| FilterError::InvalidParamCount(value.to_string()))?;
        return Ok(Clause::Params(n));
    }

    if let Some(modifier) = Modifier::parse(&key) {
        let present = match value.to_lowercase().as_str() {
            "true" => true,
            "false" => false,
            _ => {
                return Err(FilterError::InvalidBool {
                    key,
                    value: value.to_string(),
                })
            }
        };
        return Ok(Clause::Modifier { modifier, present });
    }

    tracing::debug!(key = %key, "unknown filter key treated as always true");
    Ok(Clause::Unknown {
        key,
        value: value.to_string(),
    })
}

/// Anything the filter can be applied to.
pub trait Filterable {
    /// Raw source text the heuristics scan.
    fn filter_text(&self) -> &str;

    /// Display name, by default derived from the text.
    fn display_name(&self, language: &str) -> Option<String> {
        extract_name(self.filter_text(), language)
    }

    /// False when the text was stripped and text clauses cannot be answered.
    fn has_filter_text(&self) -> bool {
        true
    }
}

impl Filterable for QueryCapture {
    fn filter_text(&self) -> &str {
        &self.text
    }
}

impl Filterable for CodeElement {
    fn filter_text(&self) -> &str {
        &self.raw_text
    }

    fn display_name(&self, _language: &str) -> Option<String> {
        Some(self.name.clone())
    }

    fn has_filter_text(&self) -> bool {
        !self.raw_text.is_empty()
    }
}

/// Applies filter expressions to results of one language.
#[derive(Debug, Clone)]
pub struct QueryFilter {
    language: String,
}

impl QueryFilter {
    pub fn new(language: &str) -> Self {
        Self {
            language: language.trim().to_lowercase(),
        }
    }

    /// Parse `expr` and keep the items satisfying every clause.
    ///
    /// Results borrow from `items`; an empty expression keeps everything.
    /// Fails with [`FilterError::MissingText`] when a `params` or modifier
    /// clause meets an item whose text was stripped.
    pub fn filter<'a, T: Filterable>(
        &self,
        items: &'a [T],
        expr: &str,
    ) -> Result<Vec<&'a T>, FilterError> {
        let parsed = FilterExpr::parse(expr)?;
        if let Some(clause) = parsed.clauses.iter().find(|c| c.reads_text()) {
            if let Some(item) = items.iter().find(|item| !item.has_filter_text()) {
                return Err(FilterError::MissingText {
                    clause: clause.describe(),
                    name: item.display_name(&self.language).unwrap_or_default(),
                });
            }
        }
        Ok(self.apply(items, &parsed))
    }

    /// Apply an already-parsed expression.
    pub fn apply<'a, T, I>(&self, items: I, expr: &FilterExpr) -> Vec<&'a T>
    where
        T: Filterable + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        items
            .into_iter()
            .filter(|item| self.matches(*item, expr))
            .collect()
    }

    pub fn matches<T: Filterable + ?Sized>(&self, item: &T, expr: &FilterExpr) -> bool {
        expr.clauses
            .iter()
            .all(|clause| clause.matches(item, &self.language))
    }

    /// Describe the clauses of `expr` without applying it.
    pub fn summary(&self, expr: &str) -> Result<Vec<String>, FilterError> {
        Ok(FilterExpr::parse(expr)?.summary())
    }
}

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_$][\w$]*$").unwrap());

static PYTHON_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:async\s+)?(?:def|class)\s+(\w+)").unwrap());

static JS_NAMES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"\bfunction\s*\*?\s*([\w$]+)").unwrap(),
        Regex::new(r"\b(?:class|interface|enum|type)\s+([\w$]+)").unwrap(),
        Regex::new(r"\b(?:const|let|var)\s+([\w$]+)").unwrap(),
        Regex::new(r"^\s*(?:(?:async|static|get|set|public|private|protected|readonly)\s+)*\*?\s*([\w$]+)\s*[(<]").unwrap(),
    ]
});

static GO_NAMES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"\bfunc\s*(?:\([^)]*\)\s*)?(\w+)").unwrap(),
        Regex::new(r"\btype\s+(\w+)").unwrap(),
        Regex::new(r"^\s*(\w+)\s+(?:struct|interface)\b").unwrap(),
    ]
});

static RUST_NAMES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"\bfn\s+(\w+)").unwrap(),
        Regex::new(r"\b(?:struct|enum|trait|union|mod|type)\s+(\w+)").unwrap(),
        Regex::new(r"\bimpl(?:<[^>]*>)?\s+(?:[\w:]+\s+for\s+)?(\w+)").unwrap(),
        Regex::new(r"\b(?:const|static)\s+(?:mut\s+)?(\w+)").unwrap(),
    ]
});

static C_LIKE_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:class|interface|enum|record|struct|namespace)\s+(\w+)").unwrap());

static C_LIKE_CALLABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+)\s*\(").unwrap());

const NON_NAMES: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "new", "synchronized", "sizeof", "throw",
];

/// Best-effort element name from raw text.
pub fn extract_name(text: &str, language: &str) -> Option<String> {
    let text = text.trim();
    if IDENTIFIER.is_match(text) {
        return Some(text.to_string());
    }

    match language {
        "python" => PYTHON_NAME.captures(text).map(|c| c[1].to_string()),
        "javascript" | "typescript" | "tsx" => first_match(&JS_NAMES, header(text)),
        "go" => first_match(&GO_NAMES, header(text)),
        "rust" => first_match(&RUST_NAMES, header(text)),
        _ => {
            let header = header(text);
            if let Some(c) = C_LIKE_TYPE.captures(header) {
                return Some(c[1].to_string());
            }
            C_LIKE_CALLABLE
                .captures_iter(header)
                .map(|c| c[1].to_string())
                .find(|name| !NON_NAMES.contains(&name.as_str()))
        }
    }
}

fn first_match(patterns: &[Regex], text: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|re| re.captures(text).map(|c| c[1].to_string()))
}

/// Text before the first opening brace.
fn header(text: &str) -> &str {
    text.split('{').next().unwrap_or(text)
}

/// Count entries in the first parenthesized list of `text`.
///
/// Only parentheses are balanced; commas inside generics or string literals
/// are counted as separators.
pub fn count_parameters(text: &str) -> usize {
    let Some(open) = text.find('(') else {
        return 0;
    };

    let mut depth = 0usize;
    let mut entries = Vec::new();
    let mut current = String::new();
    for ch in text[open..].chars() {
        match ch {
            '(' => {
                depth += 1;
                if depth > 1 {
                    current.push(ch);
                }
            }
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    break;
                }
                current.push(ch);
            }
            ',' if depth == 1 => entries.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    entries.push(current);

    entries.iter().filter(|e| !e.trim().is_empty()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(text: &str) -> QueryCapture {
        QueryCapture {
            capture_name: "method".to_string(),
            node_type: "method_declaration".to_string(),
            start_line: 1,
            end_line: 1,
            start_column: 0,
            end_column: 0,
            start_byte: 0,
            end_byte: text.len(),
            text: text.to_string(),
        }
    }

    fn java_methods() -> Vec<QueryCapture> {
        vec![
            capture("public static void main(String[] args) {\n    helper();\n}"),
            capture("private static void helper() {\n}"),
            capture("public boolean authenticate(String user, String password) {\n    return true;\n}"),
            capture("protected void initialize() {\n}"),
        ]
    }

    fn names(items: &[&QueryCapture]) -> Vec<String> {
        items
            .iter()
            .filter_map(|c| extract_name(&c.text, "java"))
            .collect()
    }

    #[test]
    fn test_params_filter() {
        let methods = java_methods();
        let filter = QueryFilter::new("java");

        let kept = filter.filter(&methods, "params=0").unwrap();
        assert_eq!(names(&kept), vec!["helper", "initialize"]);

        let kept = filter.filter(&methods, "params=2").unwrap();
        assert_eq!(names(&kept), vec!["authenticate"]);
    }

    #[test]
    fn test_modifier_and_composition() {
        let methods = java_methods();
        let filter = QueryFilter::new("java");

        let kept = filter.filter(&methods, "public=true,params=2").unwrap();
        assert_eq!(names(&kept), vec!["authenticate"]);

        let kept = filter.filter(&methods, "static=true").unwrap();
        assert_eq!(names(&kept), vec!["main", "helper"]);

        let kept = filter.filter(&methods, "static=false, public=false").unwrap();
        assert_eq!(names(&kept), vec!["initialize"]);
    }

    #[test]
    fn test_name_filters() {
        let methods = java_methods();
        let filter = QueryFilter::new("java");

        let kept = filter.filter(&methods, "name=helper").unwrap();
        assert_eq!(kept.len(), 1);

        let kept = filter.filter(&methods, "name=~*IN*").unwrap();
        assert_eq!(names(&kept), vec!["main", "initialize"]);

        let kept = filter.filter(&methods, "name=~auth*").unwrap();
        assert_eq!(names(&kept), vec!["authenticate"]);
    }

    #[test]
    fn test_empty_expression_keeps_identity() {
        let methods = java_methods();
        let filter = QueryFilter::new("java");
        let kept = filter.filter(&methods, "  ").unwrap();
        assert_eq!(kept.len(), methods.len());
        for (kept, original) in kept.iter().zip(methods.iter()) {
            assert!(std::ptr::eq(*kept, original));
        }
    }

    #[test]
    fn test_unknown_key_is_ignored() {
        let methods = java_methods();
        let filter = QueryFilter::new("java");
        let kept = filter.filter(&methods, "color=blue").unwrap();
        assert_eq!(kept.len(), 4);

        let expr = FilterExpr::parse("color=blue,params=0").unwrap();
        assert_eq!(expr.summary(), vec!["ignored color=blue", "0 parameter(s)"]);
        assert_eq!(
            filter.summary("name=~get*, public=false").unwrap(),
            vec!["name matches \"get*\"", "lacks public"]
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            FilterExpr::parse("params").unwrap_err(),
            FilterError::MalformedClause("params".to_string())
        );
        assert!(matches!(
            FilterExpr::parse("params=two").unwrap_err(),
            FilterError::InvalidParamCount(_)
        ));
        assert!(matches!(
            FilterExpr::parse("public=yes").unwrap_err(),
            FilterError::InvalidBool { .. }
        ));
        assert!(matches!(
            FilterExpr::parse("name=~[").unwrap_err(),
            FilterError::InvalidPattern { .. }
        ));
    }

    #[test]
    fn test_extract_name_per_language() {
        assert_eq!(
            extract_name("@decorator\nasync def fetch(url):\n    pass", "python").as_deref(),
            Some("fetch")
        );
        assert_eq!(
            extract_name("class Person:\n    pass", "python").as_deref(),
            Some("Person")
        );
        assert_eq!(
            extract_name("export function render(props) {}", "javascript").as_deref(),
            Some("render")
        );
        assert_eq!(
            extract_name("const add = (a, b) => a + b", "typescript").as_deref(),
            Some("add")
        );
        assert_eq!(
            extract_name("func (s *Server) Start(port int) error {", "go").as_deref(),
            Some("Start")
        );
        assert_eq!(
            extract_name("pub async fn run(&self) -> Result<()> {", "rust").as_deref(),
            Some("run")
        );
        assert_eq!(
            extract_name("public class Account extends Base {", "java").as_deref(),
            Some("Account")
        );
        assert_eq!(extract_name("main", "java").as_deref(), Some("main"));
    }

    #[test]
    fn test_count_parameters() {
        assert_eq!(count_parameters("void f()"), 0);
        assert_eq!(count_parameters("void f(int a)"), 1);
        assert_eq!(count_parameters("void f(int a, Callback cb(int, int))"), 2);
        assert_eq!(count_parameters("def f(self, a=(1, 2), *args):"), 3);
        assert_eq!(count_parameters("no parens here"), 0);
        // Generic commas are not balanced.
        assert_eq!(count_parameters("void f(Map<String, Integer> m)"), 2);
    }

    #[test]
    fn test_filter_code_elements_by_name() {
        use crate::analysis::{CodeElement, ElementKind, FunctionInfo};

        let elements = vec![
            CodeElement {
                name: "hello".to_string(),
                kind: ElementKind::Function(FunctionInfo::default()),
                start_line: 1,
                end_line: 2,
                raw_text: "def hello():\n    pass".to_string(),
                language: "python".to_string(),
            },
            CodeElement {
                name: "Person".to_string(),
                kind: ElementKind::Class {
                    class_kind: "class".to_string(),
                    method_count: 0,
                    field_count: 0,
                },
                start_line: 4,
                end_line: 5,
                raw_text: "class Person:\n    pass".to_string(),
                language: "python".to_string(),
            },
        ];

        let kept = QueryFilter::new("python")
            .filter(&elements, "name=~per*")
            .unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "Person");
    }

    #[test]
    fn test_text_clauses_need_element_text() {
        use crate::analysis::{CodeElement, ElementKind, FunctionInfo};

        let stripped = vec![CodeElement {
            name: "a".to_string(),
            kind: ElementKind::Function(FunctionInfo::default()),
            start_line: 1,
            end_line: 1,
            raw_text: String::new(),
            language: "java".to_string(),
        }];
        let filter = QueryFilter::new("java");

        for expr in ["public=true", "public=false", "params=0", "name=a,params=1"] {
            assert!(
                matches!(
                    filter.filter(&stripped, expr),
                    Err(FilterError::MissingText { .. })
                ),
                "{} should need text",
                expr
            );
        }
        assert_eq!(filter.filter(&stripped, "name=a").unwrap().len(), 1);
        assert_eq!(filter.filter(&stripped, "color=red").unwrap().len(), 1);
    }
}
