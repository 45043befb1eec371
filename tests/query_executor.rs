//! Integration tests for query execution and statistics.

use std::sync::Arc;

use treesight::query::{QueryCatalog, QueryExecutor, QueryStatistics};
use treesight::{ParsedFile, ParserAdapter};

const GO_SOURCE: &str = r#"package main

import "fmt"

type Config struct {
	Name string
}

func (c *Config) Validate() error {
	return nil
}

func main() {
	fmt.Println("hello")
}
"#;

fn setup() -> (QueryExecutor, ParsedFile) {
    let parsed = ParserAdapter::new().parse(GO_SOURCE, "go", "main.go").unwrap();
    (QueryExecutor::new(Arc::new(QueryCatalog::new())), parsed)
}

fn assert_consistent(stats: &QueryStatistics) {
    if stats.total_queries == 0 {
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.average_execution_time, 0.0);
    } else {
        let expected = stats.successful_queries as f64 / stats.total_queries as f64;
        assert!((stats.success_rate - expected).abs() < 1e-9);
        assert_eq!(
            stats.successful_queries + stats.failed_queries,
            stats.total_queries
        );
    }
}

#[test]
fn test_empty_query_list_is_empty_mapping() {
    let (executor, parsed) = setup();
    let results =
        executor.execute_multiple_queries(Some(&parsed.tree), Some(&parsed.grammar), &[], GO_SOURCE);
    assert!(results.is_empty());
    assert_eq!(executor.get_query_statistics().total_queries, 0);
}

#[test]
fn test_one_failure_does_not_abort_others() {
    let (executor, parsed) = setup();
    let names: Vec<String> = ["functions", "missing", "methods", "imports"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let results = executor.execute_multiple_queries(
        Some(&parsed.tree),
        Some(&parsed.grammar),
        &names,
        GO_SOURCE,
    );

    assert_eq!(results.len(), 4);
    assert!(!results["missing"].success);
    assert_eq!(results["functions"].capture_count(), 1);
    assert_eq!(results["methods"].capture_count(), 1);
    assert_eq!(results["imports"].capture_count(), 1);

    let stats = executor.get_query_statistics();
    assert_eq!(stats.total_queries, 4);
    assert_eq!(stats.failed_queries, 1);
    assert_consistent(&stats);
}

#[test]
fn test_missing_tree_or_grammar_is_a_failed_result() {
    let (executor, parsed) = setup();

    let no_tree = executor.execute_query(None, Some(&parsed.grammar), "functions", GO_SOURCE);
    assert!(!no_tree.success);
    assert!(no_tree.captures.is_empty());

    let no_grammar = executor.execute_query(Some(&parsed.tree), None, "functions", GO_SOURCE);
    assert!(!no_grammar.success);
    assert_consistent(&executor.get_query_statistics());
}

#[test]
fn test_capture_positions() {
    let (executor, parsed) = setup();
    let result = executor.execute_query_string(
        Some(&parsed.tree),
        Some(&parsed.grammar),
        "(function_declaration name: (identifier) @fn.name)",
        GO_SOURCE,
    );

    assert!(result.success);
    let capture = &result.captures[0];
    assert_eq!(capture.capture_name, "fn.name");
    assert_eq!(capture.node_type, "identifier");
    assert_eq!(capture.text, "main");
    assert_eq!(capture.start_line, 13);
    assert_eq!(capture.start_column, 5);
    assert_eq!(&GO_SOURCE[capture.start_byte..capture.end_byte], "main");
}

#[test]
fn test_reset_statistics() {
    let (executor, parsed) = setup();
    assert_consistent(&executor.get_query_statistics());

    executor.execute_query(Some(&parsed.tree), Some(&parsed.grammar), "types", GO_SOURCE);
    executor.execute_query(Some(&parsed.tree), Some(&parsed.grammar), "nope", GO_SOURCE);
    assert_consistent(&executor.get_query_statistics());

    executor.reset_statistics();
    let stats = executor.get_query_statistics();
    assert_eq!(stats.total_queries, 0);
    assert_consistent(&stats);
}

#[test]
fn test_concurrent_statistics() {
    let (executor, _) = setup();

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                let parsed = ParserAdapter::new().parse(GO_SOURCE, "go", "main.go").unwrap();
                for _ in 0..10 {
                    executor.execute_query(
                        Some(&parsed.tree),
                        Some(&parsed.grammar),
                        "functions",
                        GO_SOURCE,
                    );
                }
            });
        }
    });

    let stats = executor.get_query_statistics();
    assert_eq!(stats.total_queries, 80);
    assert_eq!(stats.successful_queries, 80);
    assert_consistent(&stats);
}
