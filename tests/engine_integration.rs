//! Integration tests for the analysis engine.
//!
//! These tests drive the public API against the fixture project in
//! `testdata/project` and against temporary project roots.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tempfile::TempDir;
use treesight::cache::cache_key;
use treesight::query::FilterError;
use treesight::{AnalysisEngine, AnalysisError, AnalysisRequest, ElementKind, EngineRegistry};

fn fixture_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata/project")
}

fn fixture_engine() -> AnalysisEngine {
    AnalysisEngine::from_root(Some(fixture_root().as_path())).expect("fixture engine")
}

// =============================================================================
// Element extraction
// =============================================================================

#[test]
fn test_python_hello_and_person() {
    let engine = fixture_engine();
    let result = engine.analyze_file("people.py").unwrap();

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(result.language, "python");
    let names = result.element_names();
    assert!(names.contains(&"hello"));
    assert!(names.contains(&"Person"));
    assert!(names.contains(&"greet"));

    let load = result
        .elements
        .iter()
        .find(|e| e.name == "load")
        .and_then(|e| e.function_info())
        .unwrap();
    // for, if
    assert_eq!(load.complexity, Some(3));
    assert_eq!(load.return_type.as_deref(), Some("int"));
}

#[test]
fn test_elements_are_in_document_order() {
    let engine = fixture_engine();
    for file in ["people.py", "Auth.java", "pkg/server.go", "web/app.ts"] {
        let result = engine.analyze_file(file).unwrap();
        assert!(result.success, "{}: {:?}", file, result.error_message);
        let lines: Vec<usize> = result.elements.iter().map(|e| e.start_line).collect();
        let mut sorted = lines.clone();
        sorted.sort();
        assert_eq!(lines, sorted, "{} elements out of order", file);
    }
}

#[test]
fn test_language_detection_by_extension() {
    let engine = fixture_engine();
    assert_eq!(engine.analyze_file("Auth.java").unwrap().language, "java");
    assert_eq!(engine.analyze_file("pkg/server.go").unwrap().language, "go");
    assert_eq!(engine.analyze_file("web/app.ts").unwrap().language, "typescript");
}

#[test]
fn test_go_methods_attach_to_struct() {
    let engine = fixture_engine();
    let result = engine.analyze_file("pkg/server.go").unwrap();
    let server = result.elements.iter().find(|e| e.name == "Server").unwrap();
    assert!(matches!(server.kind, ElementKind::Class { method_count: 1, field_count: 1, .. }));
}

#[test]
fn test_typescript_elements() {
    let engine = fixture_engine();
    let result = engine.analyze_file("web/app.ts").unwrap();
    let names = result.element_names();
    for expected in ["App", "Options", "run", "start"] {
        assert!(names.contains(&expected), "missing {} in {:?}", expected, names);
    }
}

#[test]
fn test_unregistered_language_uses_fallback() {
    let engine = AnalysisEngine::default();
    let result = engine
        .analyze_code("#include <stdio.h>\nint main(void) {\n  return 0;\n}\n", "c", Some("main.c"))
        .unwrap();
    assert!(result.success);
    assert!(result.elements.is_empty());
    assert_eq!(result.line_count, 4);
    assert!(result.node_count > 0);
}

// =============================================================================
// Caching
// =============================================================================

#[test]
fn test_repeated_analysis_hits_cache() {
    let engine = fixture_engine();
    let first = engine.analyze_file("people.py").unwrap();
    let second = engine.analyze_file("people.py").unwrap();

    let stats = engine.get_cache_stats();
    assert!(stats.hits >= 1);
    assert_eq!(first.file_path, second.file_path);
    assert_eq!(first.elements, second.elements);

    engine.clear_cache();
    assert_eq!(engine.get_cache_stats().size, 0);
}

#[test]
fn test_cache_key_determinism() {
    let path = Path::new("/project/app.py");
    let base = AnalysisRequest::new("app.py");

    let a = cache_key(path, b"x = 1", "python", &base);
    let b = cache_key(path, b"x = 1", "python", &base.clone());
    assert_eq!(a, b);

    let variants = [
        cache_key(Path::new("/project/other.py"), b"x = 1", "python", &base),
        cache_key(path, b"x = 2", "python", &base),
        cache_key(path, b"x = 1", "cython", &base),
        cache_key(path, b"x = 1", "python", &base.clone().include_details(true)),
        cache_key(path, b"x = 1", "python", &base.clone().include_queries(false)),
        cache_key(path, b"x = 1", "python", &base.clone().with_format("text")),
        cache_key(
            path,
            b"x = 1",
            "python",
            &base.clone().with_queries(vec!["classes".into(), "functions".into()]),
        ),
        cache_key(
            path,
            b"x = 1",
            "python",
            &base.clone().with_queries(vec!["functions".into(), "classes".into()]),
        ),
    ];
    for (i, key) in variants.iter().enumerate() {
        assert_ne!(key, &a, "variant {} collided with base key", i);
        for other in &variants[i + 1..] {
            assert_ne!(key, other);
        }
    }
}

#[test]
fn test_concurrent_analysis_shares_cache() {
    let engine = fixture_engine();
    let results: Vec<_> = (0..16)
        .into_par_iter()
        .map(|_| engine.analyze_file("Auth.java").unwrap())
        .collect();

    assert!(results.iter().all(|r| r.success));
    assert!(results.windows(2).all(|w| w[0].elements == w[1].elements));

    let stats = engine.get_cache_stats();
    assert_eq!(stats.total_requests, 16);
    assert_eq!(stats.hits + stats.misses, 16);
    assert_eq!(stats.size, 1);
}

// =============================================================================
// Caller errors
// =============================================================================

#[test]
fn test_traversal_is_rejected_for_any_root() {
    let dir = TempDir::new().unwrap();
    for engine in [
        fixture_engine(),
        AnalysisEngine::from_root(Some(dir.path())).unwrap(),
        AnalysisEngine::default(),
    ] {
        let err = engine.analyze_file("../../../etc/passwd").unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidPath { .. }), "{:?}", err);
        assert!(err.is_caller_error());
        assert_eq!(engine.get_cache_stats().total_requests, 0);
    }
}

#[test]
fn test_absolute_path_outside_root_is_rejected() {
    let dir = TempDir::new().unwrap();
    let engine = AnalysisEngine::from_root(Some(dir.path())).unwrap();
    let outside = fixture_root().join("people.py");
    let err = engine.analyze_file(&outside.to_string_lossy()).unwrap_err();
    assert!(matches!(err, AnalysisError::InvalidPath { .. }));
}

#[test]
fn test_missing_file() {
    let engine = fixture_engine();
    let err = engine.analyze_file("nope.py").unwrap_err();
    assert!(matches!(err, AnalysisError::FileNotFound { .. }));
}

#[test]
fn test_unknown_extension() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "plain text\n").unwrap();
    let engine = AnalysisEngine::from_root(Some(dir.path())).unwrap();

    let err = engine.analyze_file("notes.txt").unwrap_err();
    assert!(matches!(err, AnalysisError::UnsupportedLanguage { .. }));
}

// =============================================================================
// Queries and filtering
// =============================================================================

#[test]
fn test_java_method_filtering() {
    let engine = fixture_engine();
    let methods = engine
        .execute_query(&AnalysisRequest::new("Auth.java"), "methods")
        .unwrap();
    assert!(methods.success);
    assert_eq!(methods.capture_count(), 4);

    let names = |expr: &str| -> Vec<String> {
        engine
            .filter_captures(&methods, "java", expr)
            .unwrap()
            .into_iter()
            .filter_map(|c| treesight::query::extract_name(&c.text, "java"))
            .collect()
    };

    assert_eq!(names("params=0"), vec!["helper", "initialize"]);
    assert_eq!(names("public=true,params=2"), vec!["authenticate"]);
    assert_eq!(names("static=true"), vec!["main", "helper"]);
    assert_eq!(names("name=~*ize"), vec!["initialize"]);
}

#[test]
fn test_element_filtering_with_details() {
    let engine = fixture_engine();
    let result = engine
        .analyze_file_with("people.py", |r| r.include_details(true))
        .unwrap();

    let matched: Vec<&str> = engine
        .filter_elements(&result, "name=~g*")
        .unwrap()
        .into_iter()
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(matched, vec!["greet"]);

    let all = engine.filter_elements(&result, "").unwrap();
    assert_eq!(all.len(), result.elements.len());
}

#[test]
fn test_element_filtering_needs_details_for_text_clauses() {
    let engine = AnalysisEngine::default();
    let source = "public class A { public void a(int x) {} private void b() {} }\n";

    let stripped = engine.analyze_code(source, "java", Some("A.java")).unwrap();
    assert_eq!(stripped.element_names(), vec!["A", "a", "b"]);
    for expr in ["public=true", "public=false", "params=1", "params=0"] {
        let err = engine.filter_elements(&stripped, expr).unwrap_err();
        assert!(matches!(err, FilterError::MissingText { .. }), "{}: {:?}", expr, err);
    }
    assert_eq!(engine.filter_elements(&stripped, "name=b").unwrap().len(), 1);

    let detailed = engine
        .analyze_sync(
            &AnalysisRequest::new("A.java")
                .with_language("java")
                .with_source(source)
                .include_details(true),
        )
        .unwrap();
    let names = |expr: &str| -> Vec<String> {
        engine
            .filter_elements(&detailed, expr)
            .unwrap()
            .into_iter()
            .map(|e| e.name.clone())
            .collect()
    };
    assert_eq!(names("public=true"), vec!["A", "a"]);
    assert_eq!(names("params=0"), vec!["b"]);
    assert_eq!(names("params=1,name=a"), vec!["a"]);
}

#[test]
fn test_requested_queries_replace_defaults() {
    let engine = fixture_engine();
    let result = engine
        .analyze_file_with("people.py", |r| r.with_queries(vec!["classes".into(), "bogus".into()]))
        .unwrap();

    assert!(result.success);
    assert_eq!(result.query_results.len(), 2);
    assert_eq!(result.query_results["classes"].capture_count(), 1);
    let bogus = &result.query_results["bogus"];
    assert!(!bogus.success);
    assert!(bogus.error.as_deref().unwrap().contains("not found"));
}

#[test]
fn test_raw_query() {
    let engine = fixture_engine();
    let result = engine
        .execute_query_string(&AnalysisRequest::new("people.py"), "(if_statement) @if")
        .unwrap();
    assert!(result.success);
    assert_eq!(result.capture_count(), 2);

    let broken = engine
        .execute_query_string(&AnalysisRequest::new("people.py"), "(if_statement")
        .unwrap();
    assert!(!broken.success);
    assert!(broken.error.is_some());
}

// =============================================================================
// Async entry point and registry
// =============================================================================

#[tokio::test]
async fn test_async_analyze_matches_sync() {
    let engine = Arc::new(fixture_engine());
    let request = AnalysisRequest::new("Auth.java");

    let from_async = engine.analyze(request.clone()).await.unwrap();
    let from_sync = engine.analyze_sync(&request).unwrap();
    assert_eq!(from_async.elements, from_sync.elements);
    assert_eq!(engine.get_cache_stats().hits, 1);

    let err = engine
        .analyze(AnalysisRequest::new("../secret.py"))
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::InvalidPath { .. }));
}

#[test]
fn test_registry_identity_and_reset() {
    let registry = EngineRegistry::new();
    let a = registry.get_or_create(Some(fixture_root().as_path())).unwrap();
    let b = registry.get_or_create(Some(fixture_root().as_path())).unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    a.analyze_file("people.py").unwrap();
    assert_eq!(b.get_cache_stats().misses, 1);

    registry.reset();
    assert!(registry.is_empty());
    let c = registry.get_or_create(Some(fixture_root().as_path())).unwrap();
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(c.get_cache_stats().total_requests, 0);
}

#[test]
fn test_supported_languages() {
    let engine = AnalysisEngine::default();
    let languages = engine.get_supported_languages();
    for expected in ["c", "cpp", "go", "java", "javascript", "python", "rust", "tsx", "typescript"] {
        assert!(languages.contains(&expected.to_string()), "missing {}", expected);
    }
    let mut sorted = languages.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(languages, sorted);
}
