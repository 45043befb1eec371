//! Query execution pipeline.
//!
//! Every `execute_*` call resolves query text, runs it against a tree,
//! normalizes captures and updates the executor's statistics. Failures are
//! reported in the returned [`QueryResult`], never raised.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Query, QueryCursor, Tree};

use super::capture::QueryCapture;
use super::catalog::QueryCatalog;
use crate::parser::Grammar;

/// Query name reported for ad-hoc query strings.
pub const CUSTOM_QUERY_NAME: &str = "custom";

/// Outcome of running one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub query_name: String,
    pub success: bool,
    pub captures: Vec<QueryCapture>,
    /// Seconds.
    pub execution_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResult {
    pub fn capture_count(&self) -> usize {
        self.captures.len()
    }

    /// Captures with the given capture name.
    pub fn captures_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a QueryCapture> {
        self.captures.iter().filter(move |c| c.capture_name == name)
    }
}

/// Executor counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryStatistics {
    pub total_queries: u64,
    pub successful_queries: u64,
    pub failed_queries: u64,
    /// Seconds.
    pub total_execution_time: f64,
    pub success_rate: f64,
    pub average_execution_time: f64,
}

/// Runs named and ad-hoc queries against syntax trees.
pub struct QueryExecutor {
    catalog: Arc<QueryCatalog>,
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    total_nanos: AtomicU64,
    /// Compiled queries keyed by (language, query source).
    compiled: Mutex<HashMap<(String, String), Arc<Query>>>,
}

impl QueryExecutor {
    pub fn new(catalog: Arc<QueryCatalog>) -> Self {
        Self {
            catalog,
            total: AtomicU64::new(0),
            successful: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            compiled: Mutex::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &QueryCatalog {
        &self.catalog
    }

    /// Run a catalog query, using the grammar's language name as catalog key.
    pub fn execute_query(
        &self,
        tree: Option<&Tree>,
        grammar: Option<&Grammar>,
        query_name: &str,
        source: &str,
    ) -> QueryResult {
        let language_name = grammar.map(|g| g.name.as_str()).unwrap_or_default();
        self.execute_query_with_language_name(tree, grammar, language_name, query_name, source)
    }

    /// Run a catalog query with an explicit catalog key.
    pub fn execute_query_with_language_name(
        &self,
        tree: Option<&Tree>,
        grammar: Option<&Grammar>,
        language_name: &str,
        query_name: &str,
        source: &str,
    ) -> QueryResult {
        let start = Instant::now();
        let language_name = language_name.trim().to_lowercase();

        let outcome = check_inputs(tree, grammar).and_then(|(tree, grammar)| {
            let query_source = self.catalog.get(&language_name, query_name).ok_or_else(|| {
                format!(
                    "query '{}' not found for language '{}'",
                    query_name, language_name
                )
            })?;
            self.run(tree, grammar, &query_source, source)
        });

        self.finish(query_name, outcome, start)
    }

    /// Run an ad-hoc query string, bypassing the catalog.
    pub fn execute_query_string(
        &self,
        tree: Option<&Tree>,
        grammar: Option<&Grammar>,
        query_text: &str,
        source: &str,
    ) -> QueryResult {
        let start = Instant::now();
        let outcome = check_inputs(tree, grammar).and_then(|(tree, grammar)| {
            if query_text.trim().is_empty() {
                return Err("query string is empty".to_string());
            }
            self.run(tree, grammar, query_text, source)
        });
        self.finish(CUSTOM_QUERY_NAME, outcome, start)
    }

    /// Run several catalog queries. One failure never aborts the others.
    pub fn execute_multiple_queries(
        &self,
        tree: Option<&Tree>,
        grammar: Option<&Grammar>,
        query_names: &[String],
        source: &str,
    ) -> BTreeMap<String, QueryResult> {
        query_names
            .iter()
            .map(|name| {
                (
                    name.clone(),
                    self.execute_query(tree, grammar, name, source),
                )
            })
            .collect()
    }

    pub fn get_query_statistics(&self) -> QueryStatistics {
        let total = self.total.load(Ordering::SeqCst);
        let successful = self.successful.load(Ordering::SeqCst);
        let failed = self.failed.load(Ordering::SeqCst);
        let total_time = self.total_nanos.load(Ordering::SeqCst) as f64 / 1e9;

        let (success_rate, average_execution_time) = if total == 0 {
            (0.0, 0.0)
        } else {
            (successful as f64 / total as f64, total_time / total as f64)
        };

        QueryStatistics {
            total_queries: total,
            successful_queries: successful,
            failed_queries: failed,
            total_execution_time: total_time,
            success_rate,
            average_execution_time,
        }
    }

    pub fn reset_statistics(&self) {
        self.total.store(0, Ordering::SeqCst);
        self.successful.store(0, Ordering::SeqCst);
        self.failed.store(0, Ordering::SeqCst);
        self.total_nanos.store(0, Ordering::SeqCst);
    }

    /// Drop compiled queries.
    pub fn clear_compiled(&self) {
        if let Ok(mut compiled) = self.compiled.lock() {
            compiled.clear();
        }
    }

    fn compile(&self, grammar: &Grammar, query_source: &str) -> Result<Arc<Query>, String> {
        let key = (grammar.name.clone(), query_source.to_string());
        if let Some(query) = self.compiled.lock().ok().and_then(|c| c.get(&key).cloned()) {
            return Ok(query);
        }

        let query = Query::new(&grammar.language, query_source)
            .map_err(|e| format!("invalid query for {}: {}", grammar.name, e))?;
        let query = Arc::new(query);
        if let Ok(mut compiled) = self.compiled.lock() {
            compiled.insert(key, Arc::clone(&query));
        }
        Ok(query)
    }

    fn run(
        &self,
        tree: &Tree,
        grammar: &Grammar,
        query_source: &str,
        source: &str,
    ) -> Result<Vec<QueryCapture>, String> {
        let query = self.compile(grammar, query_source)?;
        let capture_names = query.capture_names();

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.captures(&query, tree.root_node(), source.as_bytes());

        let mut captures = Vec::new();
        while let Some((m, capture_index)) = matches.next() {
            let capture = &m.captures[*capture_index];
            let name = capture_names
                .get(capture.index as usize)
                .copied()
                .unwrap_or("unknown");

            match QueryCapture::from_node(name, capture.node, source) {
                Ok(normalized) => captures.push(normalized),
                Err(e) => {
                    tracing::warn!(capture = name, error = %e, "failed to normalize capture");
                    captures.push(QueryCapture::error_placeholder(name, e));
                }
            }
        }

        Ok(captures)
    }

    fn finish(
        &self,
        query_name: &str,
        outcome: Result<Vec<QueryCapture>, String>,
        start: Instant,
    ) -> QueryResult {
        let elapsed = start.elapsed();
        self.total.fetch_add(1, Ordering::SeqCst);
        self.total_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::SeqCst);

        match outcome {
            Ok(captures) => {
                self.successful.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(
                    query = query_name,
                    captures = captures.len(),
                    elapsed_us = elapsed.as_micros() as u64,
                    "query executed"
                );
                QueryResult {
                    query_name: query_name.to_string(),
                    success: true,
                    captures,
                    execution_time: elapsed.as_secs_f64(),
                    error: None,
                }
            }
            Err(error) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(query = query_name, error = %error, "query failed");
                QueryResult {
                    query_name: query_name.to_string(),
                    success: false,
                    captures: Vec::new(),
                    execution_time: elapsed.as_secs_f64(),
                    error: Some(error),
                }
            }
        }
    }
}

fn check_inputs<'a>(
    tree: Option<&'a Tree>,
    grammar: Option<&'a Grammar>,
) -> Result<(&'a Tree, &'a Grammar), String> {
    let tree = tree.ok_or_else(|| "syntax tree is missing".to_string())?;
    let grammar = grammar.ok_or_else(|| "language is missing".to_string())?;
    Ok((tree, grammar))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ParsedFile, ParserAdapter};

    const PYTHON_SOURCE: &str = r#"
import os

def hello():
    pass

class Person:
    def greet(self, other):
        return other
"#;

    fn setup() -> (QueryExecutor, ParsedFile) {
        let executor = QueryExecutor::new(Arc::new(QueryCatalog::new()));
        let parsed = ParserAdapter::new()
            .parse(PYTHON_SOURCE, "python", "test.py")
            .unwrap();
        (executor, parsed)
    }

    #[test]
    fn test_execute_named_query() {
        let (executor, parsed) = setup();
        let result = executor.execute_query(
            Some(&parsed.tree),
            Some(&parsed.grammar),
            "functions",
            &parsed.source,
        );

        assert!(result.success, "error: {:?}", result.error);
        assert_eq!(result.query_name, "functions");
        assert_eq!(result.capture_count(), 2);
        let first = &result.captures[0];
        assert_eq!(first.node_type, "function_definition");
        assert_eq!(first.start_line, 4);
        assert_eq!(first.start_column, 0);
        assert!(first.text.starts_with("def hello"));
    }

    #[test]
    fn test_missing_inputs() {
        let (executor, parsed) = setup();

        let result = executor.execute_query(None, Some(&parsed.grammar), "functions", "");
        assert!(!result.success);
        assert!(result.error.unwrap().contains("tree"));

        let result = executor.execute_query(Some(&parsed.tree), None, "functions", "");
        assert!(!result.success);
        assert!(result.error.unwrap().contains("language"));
    }

    #[test]
    fn test_unknown_query_name() {
        let (executor, parsed) = setup();
        let result = executor.execute_query(
            Some(&parsed.tree),
            Some(&parsed.grammar),
            "no_such_query",
            &parsed.source,
        );
        assert!(!result.success);
        assert!(result.error.unwrap().contains("not found"));
    }

    #[test]
    fn test_explicit_language_name_is_normalized() {
        let (executor, parsed) = setup();
        let result = executor.execute_query_with_language_name(
            Some(&parsed.tree),
            Some(&parsed.grammar),
            "  PYTHON ",
            "classes",
            &parsed.source,
        );
        assert!(result.success);
        assert_eq!(result.capture_count(), 1);
    }

    #[test]
    fn test_query_string() {
        let (executor, parsed) = setup();
        let result = executor.execute_query_string(
            Some(&parsed.tree),
            Some(&parsed.grammar),
            "((identifier) @id (#eq? @id \"other\"))",
            &parsed.source,
        );
        assert!(result.success);
        assert_eq!(result.query_name, CUSTOM_QUERY_NAME);
        assert_eq!(result.capture_count(), 2);
        assert!(result.captures_named("id").all(|c| c.text == "other"));

        let result = executor.execute_query_string(
            Some(&parsed.tree),
            Some(&parsed.grammar),
            "(not_a_node_type) @x",
            &parsed.source,
        );
        assert!(!result.success);
        assert!(result.error.unwrap().contains("invalid query"));
    }

    #[test]
    fn test_capture_normalization_failure_is_isolated() {
        let (executor, parsed) = setup();
        // Source text that does not match the tree: captures past its end fail.
        let truncated = &parsed.source[..20];
        let result = executor.execute_query(
            Some(&parsed.tree),
            Some(&parsed.grammar),
            "functions",
            truncated,
        );
        assert!(result.success);
        assert_eq!(result.capture_count(), 2);
        assert!(result.captures.iter().all(|c| c.is_error()));
    }

    #[test]
    fn test_multiple_queries() {
        let (executor, parsed) = setup();
        let names = vec![
            "functions".to_string(),
            "bogus".to_string(),
            "imports".to_string(),
        ];
        let results = executor.execute_multiple_queries(
            Some(&parsed.tree),
            Some(&parsed.grammar),
            &names,
            &parsed.source,
        );
        assert_eq!(results.len(), 3);
        assert!(results["functions"].success);
        assert!(!results["bogus"].success);
        assert!(results["imports"].success);

        let empty = executor.execute_multiple_queries(
            Some(&parsed.tree),
            Some(&parsed.grammar),
            &[],
            &parsed.source,
        );
        assert!(empty.is_empty());
    }

    #[test]
    fn test_statistics() {
        let (executor, parsed) = setup();
        let stats = executor.get_query_statistics();
        assert_eq!(stats.total_queries, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.average_execution_time, 0.0);

        executor.execute_query(Some(&parsed.tree), Some(&parsed.grammar), "functions", &parsed.source);
        executor.execute_query(Some(&parsed.tree), Some(&parsed.grammar), "bogus", &parsed.source);

        let stats = executor.get_query_statistics();
        assert_eq!(stats.total_queries, 2);
        assert_eq!(stats.successful_queries, 1);
        assert_eq!(stats.failed_queries, 1);
        assert!((stats.success_rate - 0.5).abs() < f64::EPSILON);

        executor.reset_statistics();
        let stats = executor.get_query_statistics();
        assert_eq!(stats.total_queries, 0);
        assert_eq!(stats.success_rate, 0.0);
    }
}
