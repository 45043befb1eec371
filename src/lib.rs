//! Treesight - multi-language source analysis engine.
//!
//! Treesight parses source files with tree-sitter, extracts code elements
//! (packages, classes, functions, variables, imports) through per-language
//! plugins, runs named or ad-hoc tree-sitter queries and filters the results
//! with a small `key=value` expression language.
//!
//! # Architecture
//!
//! - `analysis`: request/result model, the engine and the per-root registry
//! - `parser`: tree-sitter wrapper and grammar table
//! - `plugins`: language plugin contract and the built-in extractors
//! - `query`: query catalog, executor and result filter
//! - `cache`: fingerprint-keyed result cache
//! - `security`: project-root containment for request paths
//! - `config`: `treesight.yaml` loading
//! - `perf`: operation timings
//!
//! # Example
//!
//! ```no_run
//! use treesight::{AnalysisEngine, AnalysisRequest};
//!
//! let engine = AnalysisEngine::from_root(Some(std::path::Path::new(".")))?;
//! let result = engine.analyze_sync(&AnalysisRequest::new("src/app.py"))?;
//! for element in &result.elements {
//!     println!("{} {}", element.kind_str(), element.name);
//! }
//! # Ok::<(), treesight::AnalysisError>(())
//! ```
//!
//! # Adding a New Language
//!
//! Implement [`LanguagePlugin`] (see `src/plugins/go.rs`) and register it with
//! [`AnalysisEngine::register_plugin`]. A plugin may bring its own grammar.

pub mod analysis;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod parser;
pub mod perf;
pub mod plugins;
pub mod query;
pub mod security;

pub use analysis::{
    AnalysisEngine, AnalysisRequest, AnalysisResult, CodeElement, ElementKind, EngineRegistry,
    FunctionInfo,
};
pub use cache::{CacheService, CacheStats};
pub use config::EngineConfig;
pub use error::{AnalysisError, Result};
pub use parser::{ParsedFile, ParserAdapter};
pub use plugins::{LanguagePlugin, PluginRegistry};
pub use query::{FilterError, QueryCapture, QueryCatalog, QueryExecutor, QueryFilter, QueryResult};
pub use security::SecurityValidator;
