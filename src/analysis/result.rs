//! Analysis results.

use serde::Serialize;
use std::collections::BTreeMap;

use super::elements::CodeElement;
use crate::query::QueryResult;

/// Outcome of analyzing one file.
///
/// A failed result never carries elements and always has an error message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub success: bool,
    pub language: String,
    pub file_path: String,
    pub line_count: usize,
    pub node_count: usize,
    pub elements: Vec<CodeElement>,
    pub query_results: BTreeMap<String, QueryResult>,
    /// Seconds.
    pub analysis_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub has_syntax_errors: bool,
    pub format_type: String,
}

impl AnalysisResult {
    pub fn failure(
        file_path: impl Into<String>,
        language: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            language: language.into(),
            file_path: file_path.into(),
            line_count: 0,
            node_count: 0,
            elements: Vec::new(),
            query_results: BTreeMap::new(),
            analysis_time: 0.0,
            error_message: Some(message.into()),
            has_syntax_errors: false,
            format_type: "json".to_string(),
        }
    }

    pub fn with_format(mut self, format_type: impl Into<String>) -> Self {
        self.format_type = format_type.into();
        self
    }

    pub fn element_names(&self) -> Vec<&str> {
        self.elements.iter().map(|e| e.name.as_str()).collect()
    }

    /// Elements of one kind ("function", "class", ...).
    pub fn elements_of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a CodeElement> {
        self.elements.iter().filter(move |e| e.kind_str() == kind)
    }

    pub fn query_result(&self, name: &str) -> Option<&QueryResult> {
        self.query_results.get(name)
    }

    pub fn total_captures(&self) -> usize {
        self.query_results.values().map(|r| r.captures.len()).sum()
    }
}
