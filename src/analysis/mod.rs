//! Analysis pipeline.
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────┐     ┌───────────────┐
//! │ AnalysisRequest │────▶│ Analysis     │────▶│ AnalysisResult│
//! └─────────────────┘     │ Engine       │     │ (elements,    │
//!                         └──────────────┘     │  query runs)  │
//!                           │    │    │        └───────────────┘
//!                   parser ─┘    │    └─ query executor
//!                          plugin registry
//! ```
//!
//! Engines are shared per project root through [`EngineRegistry`].

mod elements;
mod engine;
mod registry;
mod request;
mod result;

pub use elements::{kind_counts, CodeElement, ElementKind, FunctionInfo};
pub use engine::{AnalysisEngine, UNKNOWN_LANGUAGE};
pub use registry::EngineRegistry;
pub use request::AnalysisRequest;
pub use result::AnalysisResult;
