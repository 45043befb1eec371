//! Analysis request options.

/// What to analyze and what to put in the result.
///
/// Built with the `with_*` / `include_*` methods; the engine never mutates a
/// request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub file_path: String,
    /// Explicit language; detected from the extension when `None`.
    pub language: Option<String>,
    /// Query names to run; the plugin's defaults when `None`.
    pub queries: Option<Vec<String>>,
    pub include_elements: bool,
    pub include_queries: bool,
    pub include_complexity: bool,
    pub include_details: bool,
    /// Output-format tag, carried through to the result uninterpreted.
    pub format_type: String,
    /// Analyze this text instead of reading `file_path`.
    pub source_override: Option<String>,
}

impl AnalysisRequest {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            language: None,
            queries: None,
            include_elements: true,
            include_queries: true,
            include_complexity: true,
            include_details: false,
            format_type: "json".to_string(),
            source_override: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_queries(mut self, queries: Vec<String>) -> Self {
        self.queries = Some(queries);
        self
    }

    pub fn include_elements(mut self, include: bool) -> Self {
        self.include_elements = include;
        self
    }

    pub fn include_queries(mut self, include: bool) -> Self {
        self.include_queries = include;
        self
    }

    pub fn include_complexity(mut self, include: bool) -> Self {
        self.include_complexity = include;
        self
    }

    pub fn include_details(mut self, include: bool) -> Self {
        self.include_details = include;
        self
    }

    pub fn with_format(mut self, format_type: impl Into<String>) -> Self {
        self.format_type = format_type.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source_override = Some(source.into());
        self
    }

    /// The explicit language, trimmed and lower-cased; `None` when blank.
    pub fn explicit_language(&self) -> Option<String> {
        self.language
            .as_deref()
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty())
    }
}
