//! Analysis orchestration.
//!
//! [`AnalysisEngine`] ties the subsystems together:
//!
//! ```text
//! request ─▶ security ─▶ source ─▶ language ─▶ cache ─┬─▶ hit: stored result
//!                                                     └─▶ miss: parse ─▶ plugin ─▶ queries ─▶ store
//! ```
//!
//! Subsystems are built on first use. Caller mistakes (bad path, missing file,
//! unsupported language) are returned as errors; everything that goes wrong
//! after that becomes a failed [`AnalysisResult`].

use std::any::Any;
use std::collections::BTreeMap;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::OnceCell;

use super::{AnalysisRequest, AnalysisResult, CodeElement};
use crate::cache::{cache_key, CacheService, CacheStats};
use crate::config::EngineConfig;
use crate::error::{AnalysisError, Result};
use crate::parser::{self, ParsedFile, ParserAdapter};
use crate::perf::{PerformanceMonitor, PerformanceSummary};
use crate::plugins::{LanguagePlugin, PluginRegistry};
use crate::query::{
    FilterError, QueryCapture, QueryCatalog, QueryExecutor, QueryFilter, QueryResult,
    QueryStatistics, CUSTOM_QUERY_NAME,
};
use crate::security::SecurityValidator;

/// Language reported when nothing identifies the file.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// File name used by [`AnalysisEngine::analyze_code`] when none is given.
const SNIPPET_NAME: &str = "snippet";

/// Multi-language analysis engine for one project root.
pub struct AnalysisEngine {
    project_root: Option<PathBuf>,
    config: EngineConfig,
    parser: OnceCell<ParserAdapter>,
    plugins: OnceCell<PluginRegistry>,
    catalog: OnceCell<Arc<QueryCatalog>>,
    executor: OnceCell<QueryExecutor>,
    cache: OnceCell<CacheService>,
    security: OnceCell<SecurityValidator>,
    perf: OnceCell<PerformanceMonitor>,
    closed: AtomicBool,
}

impl AnalysisEngine {
    /// Create an engine with an explicit configuration.
    pub fn new(project_root: Option<&Path>, config: EngineConfig) -> Self {
        tracing::info!(
            root = %project_root.map(|p| p.display().to_string()).unwrap_or_default(),
            "creating analysis engine"
        );
        Self {
            project_root: project_root.map(Path::to_path_buf),
            config,
            parser: OnceCell::new(),
            plugins: OnceCell::new(),
            catalog: OnceCell::new(),
            executor: OnceCell::new(),
            cache: OnceCell::new(),
            security: OnceCell::new(),
            perf: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Create an engine, loading the config file from the project root if present.
    pub fn from_root(project_root: Option<&Path>) -> Result<Self> {
        let config = match project_root {
            Some(root) => EngineConfig::load_for_root(root)?,
            None => EngineConfig::default(),
        };
        Ok(Self::new(project_root, config))
    }

    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn parser(&self) -> &ParserAdapter {
        self.parser.get_or_init(ParserAdapter::new)
    }

    fn plugins(&self) -> &PluginRegistry {
        self.plugins.get_or_init(PluginRegistry::with_builtin)
    }

    fn catalog(&self) -> &Arc<QueryCatalog> {
        self.catalog.get_or_init(|| {
            let catalog = QueryCatalog::new();
            for (language, queries) in &self.config.queries {
                for (name, source) in queries {
                    catalog.add(language, name, source, None);
                }
            }
            Arc::new(catalog)
        })
    }

    fn executor(&self) -> &QueryExecutor {
        self.executor
            .get_or_init(|| QueryExecutor::new(Arc::clone(self.catalog())))
    }

    fn cache(&self) -> &CacheService {
        self.cache.get_or_init(|| {
            CacheService::new(self.config.cache.max_entries, self.config.cache.enabled)
        })
    }

    fn security(&self) -> &SecurityValidator {
        self.security
            .get_or_init(|| SecurityValidator::new(self.project_root.as_deref()))
    }

    fn perf(&self) -> &PerformanceMonitor {
        self.perf.get_or_init(PerformanceMonitor::new)
    }

    /// Analyze on tokio's blocking pool. Same semantics as [`Self::analyze_sync`].
    pub async fn analyze(self: &Arc<Self>, request: AnalysisRequest) -> Result<AnalysisResult> {
        let engine = Arc::clone(self);
        tokio::task::spawn_blocking(move || engine.analyze_sync(&request))
            .await
            .map_err(|e| AnalysisError::Internal(format!("analysis task failed: {}", e)))?
    }

    /// Analyze on the calling thread.
    pub fn analyze_sync(&self, request: &AnalysisRequest) -> Result<AnalysisResult> {
        let _timer = self.perf().measure("analyze");
        let started = Instant::now();

        let path = self.security().validate(&request.file_path)?;
        let display_path = path.to_string_lossy().into_owned();

        let source = match self.load_source(request, &path)? {
            Ok(source) => source,
            Err(message) => {
                let language = request
                    .explicit_language()
                    .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string());
                return Ok(self.failed(&display_path, &language, message, request, started));
            }
        };

        let language = self.resolve_language(request, &path)?;

        let key = cache_key(&path, source.as_bytes(), &language, request);
        if let Some(hit) = self.cache().get(&key) {
            tracing::debug!(path = %display_path, language = %language, "cache hit");
            return Ok(AnalysisResult::clone(&hit));
        }
        tracing::debug!(path = %display_path, language = %language, "cache miss");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run_pipeline(request, &display_path, &source, &language, started)
        }));

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::warn!(path = %display_path, error = %e, "analysis failed");
                self.failed(&display_path, &language, e.to_string(), request, started)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(path = %display_path, panic = %message, "analysis panicked");
                self.failed(
                    &display_path,
                    &language,
                    format!("internal error: {}", message),
                    request,
                    started,
                )
            }
        };

        if result.success {
            self.cache().set(key, result.clone());
        }
        Ok(result)
    }

    /// Analyze a file with default options.
    pub fn analyze_file(&self, path: &str) -> Result<AnalysisResult> {
        self.analyze_sync(&AnalysisRequest::new(path))
    }

    /// Analyze a file, adjusting the default request first.
    ///
    /// ```ignore
    /// engine.analyze_file_with("src/app.py", |r| r.include_details(true))?;
    /// ```
    pub fn analyze_file_with<F>(&self, path: &str, options: F) -> Result<AnalysisResult>
    where
        F: FnOnce(AnalysisRequest) -> AnalysisRequest,
    {
        self.analyze_sync(&options(AnalysisRequest::new(path)))
    }

    /// Analyze in-memory source text.
    pub fn analyze_code(
        &self,
        code: &str,
        language: &str,
        filename: Option<&str>,
    ) -> Result<AnalysisResult> {
        let request = AnalysisRequest::new(filename.unwrap_or(SNIPPET_NAME))
            .with_language(language)
            .with_source(code);
        self.analyze_sync(&request)
    }

    /// Run a single catalog query through the full pipeline.
    ///
    /// The request's own query list is replaced by `query_name`. A failed
    /// analysis is reported as a failed query result.
    pub fn execute_query(&self, request: &AnalysisRequest, query_name: &str) -> Result<QueryResult> {
        let request = request
            .clone()
            .with_queries(vec![query_name.to_string()])
            .include_queries(true)
            .include_elements(false);
        let mut result = self.analyze_sync(&request)?;

        Ok(result.query_results.remove(query_name).unwrap_or_else(|| {
            let message = result
                .error_message
                .take()
                .unwrap_or_else(|| "query was not executed".to_string());
            failed_query(query_name, message)
        }))
    }

    /// Run an ad-hoc query string against the file or source named by `request`.
    ///
    /// Bypasses the result cache; the query name in the result is `"custom"`.
    /// Caller errors are returned as in [`Self::analyze_sync`]; read, parse
    /// and query failures become a failed result.
    pub fn execute_query_string(
        &self,
        request: &AnalysisRequest,
        query_text: &str,
    ) -> Result<QueryResult> {
        let path = self.security().validate(&request.file_path)?;
        let source = match self.load_source(request, &path)? {
            Ok(source) => source,
            Err(message) => return Ok(failed_query(CUSTOM_QUERY_NAME, message)),
        };
        let language = self.resolve_language(request, &path)?;
        let display_path = path.to_string_lossy();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<QueryResult> {
            let parsed = self.parser().parse(&source, &language, &display_path)?;
            Ok(self.executor().execute_query_string(
                Some(&parsed.tree),
                Some(&parsed.grammar),
                query_text,
                &parsed.source,
            ))
        }));

        Ok(match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::warn!(path = %display_path, error = %e, "custom query failed");
                failed_query(CUSTOM_QUERY_NAME, e.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(path = %display_path, panic = %message, "custom query panicked");
                failed_query(CUSTOM_QUERY_NAME, format!("internal error: {}", message))
            }
        })
    }

    /// Filter the captures of a query result.
    pub fn filter_captures<'a>(
        &self,
        result: &'a QueryResult,
        language: &str,
        expr: &str,
    ) -> std::result::Result<Vec<&'a QueryCapture>, FilterError> {
        let filter = QueryFilter::new(language);
        tracing::debug!(clauses = ?filter.summary(expr)?, "filtering captures");
        filter.filter(&result.captures, expr)
    }

    /// Filter the elements of an analysis result.
    pub fn filter_elements<'a>(
        &self,
        result: &'a AnalysisResult,
        expr: &str,
    ) -> std::result::Result<Vec<&'a CodeElement>, FilterError> {
        QueryFilter::new(&result.language).filter(&result.elements, expr)
    }

    pub fn clear_cache(&self) {
        self.cache().clear();
        tracing::debug!("analysis cache cleared");
    }

    pub fn get_cache_stats(&self) -> CacheStats {
        self.cache().stats()
    }

    /// Languages with a plugin or a grammar, sorted.
    pub fn get_supported_languages(&self) -> Vec<String> {
        let mut languages = self.plugins().languages();
        languages.extend(self.parser().languages());
        languages.sort();
        languages.dedup();
        languages
    }

    /// Query names the catalog holds for `language`.
    pub fn get_supported_queries(&self, language: &str) -> Vec<String> {
        self.catalog().names(language)
    }

    pub fn describe_query(&self, language: &str, name: &str) -> Option<String> {
        self.catalog().describe(language, name)
    }

    /// Register (or replace) the plugin for `language`.
    ///
    /// A plugin that brings its own grammar also registers it with the parser.
    /// Cached results are dropped since they may come from the old plugin.
    pub fn register_plugin(&self, language: &str, plugin: Arc<dyn LanguagePlugin>) {
        if let Some(grammar) = plugin.grammar() {
            self.parser().register_grammar(language, grammar);
        }
        self.plugins().register(language, plugin);
        self.cache().clear();
        tracing::info!(language = %language, "language plugin registered");
    }

    pub fn query_statistics(&self) -> QueryStatistics {
        self.executor().get_query_statistics()
    }

    pub fn reset_query_statistics(&self) {
        self.executor().reset_statistics();
    }

    pub fn performance_summary(&self) -> PerformanceSummary {
        self.perf().summary()
    }

    /// Release cached state. Safe to call more than once.
    pub fn cleanup(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(cache) = self.cache.get() {
            cache.clear();
        }
        if let Some(executor) = self.executor.get() {
            executor.clear_compiled();
        }
        if let Some(perf) = self.perf.get() {
            perf.clear();
        }
        tracing::info!("analysis engine cleaned up");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Language for `path` by extension: plugins, built-in grammars, then config.
    pub fn detect_language(&self, path: &Path) -> Option<String> {
        let ext = path.extension()?.to_str()?;
        self.plugins()
            .language_for_extension(ext)
            .or_else(|| parser::language_for_extension(ext).map(str::to_string))
            .or_else(|| self.config.language_for_extension(ext).map(str::to_string))
    }

    /// Source for `request`: the override, else the file read lossily.
    ///
    /// A missing file is a caller error. A file that exists but cannot be
    /// read yields the inner `Err` message.
    fn load_source(
        &self,
        request: &AnalysisRequest,
        path: &Path,
    ) -> Result<std::result::Result<String, String>> {
        if let Some(source) = &request.source_override {
            return Ok(Ok(source.clone()));
        }
        if !path.exists() {
            return Err(AnalysisError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        match fs::read(path) {
            Ok(bytes) => Ok(Ok(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read file");
                Ok(Err(format!("failed to read file: {}", e)))
            }
        }
    }

    /// Effective language: explicit, else by extension, else "unknown".
    fn resolve_language(&self, request: &AnalysisRequest, path: &Path) -> Result<String> {
        let language = request
            .explicit_language()
            .or_else(|| self.detect_language(path))
            .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string());

        if self.plugins().contains(&language) || self.parser().supports(&language) {
            Ok(language)
        } else {
            Err(AnalysisError::UnsupportedLanguage { language })
        }
    }

    /// Queries to run when the request names none.
    fn default_queries(&self, language: &str, plugin: &dyn LanguagePlugin) -> Vec<String> {
        match self.config.default_queries.get(language) {
            Some(configured) => configured.clone(),
            None => plugin
                .default_queries()
                .iter()
                .map(|q| q.to_string())
                .collect(),
        }
    }

    fn run_pipeline(
        &self,
        request: &AnalysisRequest,
        display_path: &str,
        source: &str,
        language: &str,
        started: Instant,
    ) -> Result<AnalysisResult> {
        let plugin = self.plugins().resolve(language);

        let parsed: ParsedFile = {
            let _timer = self.perf().measure("parse");
            self.parser().parse(source, language, display_path)?
        };
        let has_syntax_errors = parsed.has_errors();
        if has_syntax_errors {
            tracing::warn!(path = %display_path, "source has syntax errors; results may be partial");
        }

        let mut elements = if request.include_elements {
            let _timer = self.perf().measure("extract");
            plugin.extract_elements(&parsed)?
        } else {
            Vec::new()
        };
        for element in &mut elements {
            if !request.include_complexity {
                element.clear_complexity();
            }
            if !request.include_details {
                element.raw_text.clear();
            }
        }

        let query_results = if request.include_queries {
            let _timer = self.perf().measure("queries");
            let names = request
                .queries
                .clone()
                .unwrap_or_else(|| self.default_queries(language, plugin.as_ref()));
            self.executor().execute_multiple_queries(
                Some(&parsed.tree),
                Some(&parsed.grammar),
                &names,
                &parsed.source,
            )
        } else {
            BTreeMap::new()
        };

        Ok(AnalysisResult {
            success: true,
            language: language.to_string(),
            file_path: display_path.to_string(),
            line_count: parsed.line_count(),
            node_count: parsed.node_count(),
            elements,
            query_results,
            analysis_time: started.elapsed().as_secs_f64(),
            error_message: None,
            has_syntax_errors,
            format_type: request.format_type.clone(),
        })
    }

    fn failed(
        &self,
        path: &str,
        language: &str,
        message: String,
        request: &AnalysisRequest,
        started: Instant,
    ) -> AnalysisResult {
        let mut result =
            AnalysisResult::failure(path, language, message).with_format(request.format_type.clone());
        result.analysis_time = started.elapsed().as_secs_f64();
        result
    }
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new(None, EngineConfig::default())
    }
}

fn failed_query(name: &str, message: String) -> QueryResult {
    QueryResult {
        query_name: name.to_string(),
        success: false,
        captures: Vec::new(),
        execution_time: 0.0,
        error: Some(message),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic during analysis".to_string()
    }
}
