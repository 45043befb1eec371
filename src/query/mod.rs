//! Declarative tree-sitter queries.
//!
//! - `catalog`: named query sources per language
//! - `executor`: runs queries and keeps statistics
//! - `capture`: the canonical capture record
//! - `filter`: the `key=value` filter language applied to results

mod capture;
mod catalog;
mod executor;
mod filter;

pub use capture::{QueryCapture, ERROR_NODE_TYPE};
pub use catalog::{QueryCatalog, QueryDefinition};
pub use executor::{QueryExecutor, QueryResult, QueryStatistics, CUSTOM_QUERY_NAME};
pub use filter::{
    count_parameters, extract_name, Clause, FilterError, FilterExpr, Filterable, Modifier,
    QueryFilter,
};
