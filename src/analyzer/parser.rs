//! Tree-sitter parser integration for Python sources.

use anyhow::{Context, Result};
use std::path::Path;
use tree_sitter::{Node, Parser, Tree};

/// Parse Python source text into a tree-sitter AST.
pub fn parse_source(content: &str, path: &Path) -> Result<Tree> {
    let mut parser = Parser::new();
    let language = tree_sitter_python::LANGUAGE;

    parser
        .set_language(&language.into())
        .context("Failed to set tree-sitter language")?;

    parser
        .parse(content, None)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Check if a parse tree has errors.
pub fn has_parse_errors(tree: &Tree) -> bool {
    tree.root_node().has_error()
}

/// Get text for a tree-sitter node.
pub fn node_text<'a>(node: &Node, source: &'a str) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}

/// Get the starting line number for a node (1-indexed).
pub fn node_line(node: &Node) -> usize {
    node.start_position().row + 1
}

/// Get the ending line number for a node (1-indexed).
pub fn node_end_line(node: &Node) -> usize {
    node.end_position().row + 1
}
