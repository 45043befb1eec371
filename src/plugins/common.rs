//! Helpers shared by the language plugins.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Query, QueryCursor};

use crate::analysis::{CodeElement, ElementKind, FunctionInfo};
use crate::parser::ParsedFile;

/// Captures of one query match, by capture name.
pub(crate) struct Captures<'tree> {
    entries: Vec<(String, Node<'tree>)>,
}

impl<'tree> Captures<'tree> {
    pub fn get(&self, name: &str) -> Option<Node<'tree>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, node)| *node)
    }

    /// First capture whose name is one of `names`, with the name that matched.
    pub fn first_of(&self, names: &[&str]) -> Option<(&str, Node<'tree>)> {
        self.entries
            .iter()
            .find(|(n, _)| names.contains(&n.as_str()))
            .map(|(n, node)| (n.as_str(), *node))
    }
}

/// Plugin queries compiled once per grammar.
static COMPILED: Lazy<RwLock<HashMap<(String, String), Arc<Query>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// The compiled form of `query_source` for the grammar of `parsed`.
pub(crate) fn compiled_query(parsed: &ParsedFile, query_source: &str) -> anyhow::Result<Arc<Query>> {
    let key = (parsed.language().to_string(), query_source.to_string());
    if let Some(query) = COMPILED.read().ok().and_then(|c| c.get(&key).cloned()) {
        return Ok(query);
    }

    let query = Arc::new(Query::new(&parsed.grammar.language, query_source)?);
    if let Ok(mut compiled) = COMPILED.write() {
        compiled.entry(key).or_insert_with(|| Arc::clone(&query));
    }
    Ok(query)
}

/// Run `query_source` below `node` and collect every match.
pub(crate) fn query_matches<'tree>(
    parsed: &'tree ParsedFile,
    query_source: &str,
    node: Node<'tree>,
) -> anyhow::Result<Vec<Captures<'tree>>> {
    let query = compiled_query(parsed, query_source)?;
    let names = query.capture_names();
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, node, parsed.source.as_bytes());

    let mut out = Vec::new();
    while let Some(m) = matches.next() {
        let entries = m
            .captures
            .iter()
            .map(|c| (names[c.index as usize].to_string(), c.node))
            .collect();
        out.push(Captures { entries });
    }
    Ok(out)
}

/// Cyclomatic complexity of `node`: one plus every decision point the
/// control-flow query captures inside it.
pub(crate) fn cyclomatic_complexity(
    parsed: &ParsedFile,
    node: Node,
    control_flow_query: &str,
) -> anyhow::Result<u32> {
    let query = compiled_query(parsed, control_flow_query)?;
    let mut cursor = QueryCursor::new();
    let mut captures = cursor.captures(&query, node, parsed.source.as_bytes());

    let mut decision_points = 0u32;
    while captures.next().is_some() {
        decision_points += 1;
    }
    Ok(1 + decision_points)
}

/// Text of the child at `field`, if present.
pub(crate) fn field_text(parsed: &ParsedFile, node: Node, field: &str) -> Option<String> {
    node.child_by_field_name(field)
        .map(|child| parsed.node_text(child).to_string())
}

/// Source text of every named, non-comment child of `node`.
pub(crate) fn named_children_text(parsed: &ParsedFile, node: Node, skip: &[&str]) -> Vec<String> {
    let mut cursor = node.walk();
    let texts = node
        .named_children(&mut cursor)
        .filter(|child| !child.kind().contains("comment") && !skip.contains(&child.kind()))
        .map(|child| parsed.node_text(child).to_string())
        .collect();
    texts
}

/// Whether `node` has a direct child (named or not) of the given kind.
pub(crate) fn has_child_kind(node: Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|child| child.kind() == kind);
    found
}

/// Number of direct named children whose kind is one of `kinds`.
pub(crate) fn count_children(node: Node, kinds: &[&str]) -> usize {
    let mut cursor = node.walk();
    let count = node
        .named_children(&mut cursor)
        .filter(|child| kinds.contains(&child.kind()))
        .count();
    count
}

/// Strip one layer of matching quotes from a string literal.
pub(crate) fn unquote(text: &str) -> String {
    let t = text.trim();
    for q in ['"', '\'', '`'] {
        if t.len() >= 2 && t.starts_with(q) && t.ends_with(q) {
            return t[1..t.len() - 1].to_string();
        }
    }
    t.to_string()
}

/// Return-type annotations keep their leading `:` or `->` in some grammars.
pub(crate) fn clean_type(text: &str) -> String {
    text.trim()
        .trim_start_matches("->")
        .trim_start_matches(':')
        .trim()
        .to_string()
}

/// Import element named after its module path.
pub(crate) fn import_element(
    parsed: &ParsedFile,
    node: Node,
    module_path: String,
    alias: Option<String>,
) -> CodeElement {
    CodeElement::from_node(
        parsed,
        node,
        module_path.clone(),
        ElementKind::Import { module_path, alias },
    )
}

/// Function element; complexity is computed from `control_flow_query`.
pub(crate) fn function_element(
    parsed: &ParsedFile,
    node: Node,
    name: String,
    mut info: FunctionInfo,
    control_flow_query: &str,
) -> anyhow::Result<CodeElement> {
    info.complexity = Some(cyclomatic_complexity(parsed, node, control_flow_query)?);
    Ok(CodeElement::from_node(
        parsed,
        node,
        name,
        ElementKind::Function(info),
    ))
}

/// Order elements by position and drop duplicates produced by overlapping
/// query patterns.
pub(crate) fn finish(mut elements: Vec<(usize, CodeElement)>) -> Vec<CodeElement> {
    elements.sort_by_key(|(start_byte, _)| *start_byte);
    elements.dedup_by(|(a_pos, a), (b_pos, b)| {
        a_pos == b_pos && a.name == b.name && a.kind_str() == b.kind_str()
    });
    elements.into_iter().map(|(_, e)| e).collect()
}
