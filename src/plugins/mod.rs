//! Per-language plugins.
//!
//! A plugin knows the shape of one language's syntax tree and turns it into
//! [`CodeElement`]s. Languages with a grammar but no plugin are analyzed by
//! [`FallbackPlugin`], which reports no elements.
//!
//! # Adding a New Language
//!
//! 1. Create a module here implementing [`LanguagePlugin`]
//! 2. Make sure a grammar exists (built-in table in `parser`, or override
//!    [`LanguagePlugin::grammar`])
//! 3. Register it in [`PluginRegistry::with_builtin`]

mod common;
mod go;
mod java;
mod javascript;
mod python;
mod rust_lang;

pub use go::GoPlugin;
pub use java::JavaPlugin;
pub use javascript::JavaScriptPlugin;
pub use python::PythonPlugin;
pub use rust_lang::RustPlugin;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::analysis::CodeElement;
use crate::parser::ParsedFile;
use crate::query::QueryCatalog;

/// Language-specific extraction capability.
///
/// # Thread Safety
///
/// Plugins are shared between concurrent analyses; `tree_sitter::Parser` is
/// not `Sync`, so plugins never hold one.
pub trait LanguagePlugin: Send + Sync {
    /// Canonical lower-case language name (e.g. "python").
    fn language_name(&self) -> &str;

    /// File extensions this plugin handles (without dot).
    fn file_extensions(&self) -> &[&'static str];

    /// Queries run when a request does not name any.
    fn default_queries(&self) -> &[&'static str];

    /// Every query name available for this language.
    fn supported_queries(&self, catalog: &QueryCatalog) -> Vec<String> {
        catalog.names(self.language_name())
    }

    /// Grammar to parse with, when it is not one of the built-ins.
    fn grammar(&self) -> Option<tree_sitter::Language> {
        None
    }

    /// Extract elements in document order.
    fn extract_elements(&self, parsed: &ParsedFile) -> anyhow::Result<Vec<CodeElement>>;

    /// Check if this plugin handles the given file extension.
    fn handles_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.').to_lowercase();
        self.file_extensions().iter().any(|e| *e == ext)
    }
}

/// Stand-in for languages without a plugin: no elements, no default queries.
#[derive(Debug, Clone)]
pub struct FallbackPlugin {
    language: String,
}

impl FallbackPlugin {
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_lowercase(),
        }
    }
}

impl LanguagePlugin for FallbackPlugin {
    fn language_name(&self) -> &str {
        &self.language
    }

    fn file_extensions(&self) -> &[&'static str] {
        &[]
    }

    fn default_queries(&self) -> &[&'static str] {
        &[]
    }

    fn extract_elements(&self, _parsed: &ParsedFile) -> anyhow::Result<Vec<CodeElement>> {
        Ok(Vec::new())
    }
}

/// Language name → plugin table with an extension index.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: RwLock<HashMap<String, Arc<dyn LanguagePlugin>>>,
    extensions: RwLock<HashMap<String, String>>,
}

impl PluginRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in plugin.
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register("python", Arc::new(PythonPlugin::new()));
        registry.register("java", Arc::new(JavaPlugin::new()));
        registry.register("javascript", Arc::new(JavaScriptPlugin::javascript()));
        registry.register("typescript", Arc::new(JavaScriptPlugin::typescript()));
        registry.register("tsx", Arc::new(JavaScriptPlugin::tsx()));
        registry.register("go", Arc::new(GoPlugin::new()));
        registry.register("rust", Arc::new(RustPlugin::new()));
        registry
    }

    /// Register (or replace) the plugin for `language`.
    pub fn register(&self, language: &str, plugin: Arc<dyn LanguagePlugin>) {
        let language = language.trim().to_lowercase();
        if let Ok(mut extensions) = self.extensions.write() {
            for ext in plugin.file_extensions() {
                extensions.insert(ext.to_lowercase(), language.clone());
            }
        }
        if let Ok(mut plugins) = self.plugins.write() {
            tracing::debug!(language = %language, "registered language plugin");
            plugins.insert(language, plugin);
        }
    }

    pub fn get(&self, language: &str) -> Option<Arc<dyn LanguagePlugin>> {
        let plugins = self.plugins.read().ok()?;
        plugins.get(&language.trim().to_lowercase()).cloned()
    }

    pub fn contains(&self, language: &str) -> bool {
        self.get(language).is_some()
    }

    /// Registered plugin, or a [`FallbackPlugin`] for the language.
    pub fn resolve(&self, language: &str) -> Arc<dyn LanguagePlugin> {
        self.get(language)
            .unwrap_or_else(|| Arc::new(FallbackPlugin::new(language)))
    }

    /// Language claimed by a registered plugin for `ext`.
    pub fn language_for_extension(&self, ext: &str) -> Option<String> {
        let ext = ext.trim_start_matches('.').to_lowercase();
        self.extensions.read().ok()?.get(&ext).cloned()
    }

    /// Registered language names, sorted.
    pub fn languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = self
            .plugins
            .read()
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default();
        languages.sort();
        languages
    }
}
