//! AST-walk classification of executable lines, functions and blocks.
//!
//! A line is executable when it holds a statement whose evaluation has an
//! observable effect: assignments and calls, control transfers, returns,
//! imports. Pure syntax (blank lines, comments, `else:`/`try:` delimiter
//! lines, `def`/`class` headers, docstrings) is non-executable. Multi-line
//! statements are anchored at their first line, matching where the host
//! runtime reports line events.

use std::collections::BTreeSet;
use tree_sitter::{Node, Tree};

use crate::analyzer::parser::{node_end_line, node_line, node_text};
use crate::analyzer::phases::PhaseBudget;
use crate::core::{BlockKind, BlockRecord, FunctionRecord};

/// Result of the extraction phase. `complete` is false when the budget
/// ran out; `analyzed_through` is then the last fully processed line.
#[derive(Debug)]
pub struct Extraction {
    pub executable_lines: BTreeSet<usize>,
    pub functions: Vec<FunctionRecord>,
    pub blocks: Vec<BlockRecord>,
    pub analyzed_through: usize,
    pub complete: bool,
}

/// Walk the parse tree and classify every statement node.
pub fn extract(tree: &Tree, source: &str, budget: &PhaseBudget, track_blocks: bool) -> Extraction {
    let mut walker = Walker {
        source,
        budget,
        track_blocks,
        executable_lines: BTreeSet::new(),
        functions: Vec::new(),
        blocks: Vec::new(),
        next_block_id: 0,
        visited: 0,
        stopped: false,
    };

    let root = tree.root_node();
    let mut analyzed_through = 0;
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        walker.visit(child, None);
        if walker.stopped {
            break;
        }
        analyzed_through = node_end_line(&child);
    }
    if !walker.stopped {
        analyzed_through = node_end_line(&root).max(analyzed_through);
    }

    Extraction {
        executable_lines: walker.executable_lines,
        functions: walker.functions,
        blocks: walker.blocks,
        analyzed_through,
        complete: !walker.stopped,
    }
}

struct Walker<'a> {
    source: &'a str,
    budget: &'a PhaseBudget,
    track_blocks: bool,
    executable_lines: BTreeSet<usize>,
    functions: Vec<FunctionRecord>,
    blocks: Vec<BlockRecord>,
    next_block_id: u32,
    visited: usize,
    stopped: bool,
}

impl<'a> Walker<'a> {
    fn visit(&mut self, node: Node<'a>, parent_block: Option<u32>) {
        if self.stopped {
            return;
        }
        self.visited += 1;
        if !self.budget.check_batch(self.visited) {
            self.stopped = true;
            return;
        }

        match node.kind() {
            // Simple statements with observable effects.
            "return_statement" | "raise_statement" | "assert_statement" | "delete_statement"
            | "import_statement" | "import_from_statement" | "future_import_statement"
            | "break_statement" | "continue_statement" => {
                self.mark(node);
            }

            // Assignments and bare calls, unless the statement is a
            // lone string constant (docstring).
            "expression_statement" => {
                if !is_docstring(&node) {
                    self.mark(node);
                }
            }

            // No observable effect.
            "pass_statement" | "global_statement" | "nonlocal_statement" | "comment" => {}

            // Compound statements: header executability depends on
            // whether the header itself evaluates anything.
            "if_statement" => {
                self.mark(node);
                let block = self.open_block(node, BlockKind::Branch, parent_block);
                self.visit_children(node, block);
            }
            "elif_clause" => {
                self.mark(node);
                let block = self.open_block(node, BlockKind::Branch, parent_block);
                self.visit_children(node, block);
            }
            "else_clause" => {
                // `else:` is a pure delimiter line.
                let block = self.open_block(node, BlockKind::Branch, parent_block);
                self.visit_children(node, block);
            }
            "for_statement" | "while_statement" => {
                self.mark(node);
                let block = self.open_block(node, BlockKind::Loop, parent_block);
                self.visit_children(node, block);
            }
            "try_statement" => {
                // `try:` transfers no control by itself.
                let block = self.open_block(node, BlockKind::Exception, parent_block);
                self.visit_children(node, block);
            }
            "except_clause" | "except_group_clause" => {
                // The exception filter expression is evaluated here.
                self.mark(node);
                let block = self.open_block(node, BlockKind::Exception, parent_block);
                self.visit_children(node, block);
            }
            "finally_clause" => {
                let block = self.open_block(node, BlockKind::Exception, parent_block);
                self.visit_children(node, block);
            }
            "with_statement" => {
                self.mark(node);
                let block = self.open_block(node, BlockKind::With, parent_block);
                self.visit_children(node, block);
            }
            "match_statement" => {
                self.mark(node);
                let block = self.open_block(node, BlockKind::Branch, parent_block);
                self.visit_children(node, block);
            }
            "case_clause" => {
                self.mark(node);
                let block = self.open_block(node, BlockKind::Branch, parent_block);
                self.visit_children(node, block);
            }

            // Declaration headers are non-executable; the body is walked
            // and the definition becomes a function record.
            "function_definition" => {
                self.record_function(node);
                self.visit_children(node, parent_block);
            }
            "decorated_definition" => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if child.kind() == "decorator" {
                        // Decorator application is a call.
                        self.mark(child);
                    } else {
                        self.visit(child, parent_block);
                    }
                }
            }
            "class_definition" => {
                self.visit_children(node, parent_block);
            }

            "block" | "module" => {
                self.visit_children(node, parent_block);
            }

            // Anything else at statement depth gets a conservative
            // descent so new grammar kinds degrade gracefully.
            _ => {
                self.visit_children(node, parent_block);
            }
        }
    }

    fn visit_children(&mut self, node: Node<'a>, parent_block: Option<u32>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if self.stopped {
                return;
            }
            if is_statement_level(child.kind()) {
                self.visit(child, parent_block);
            }
        }
    }

    fn mark(&mut self, node: Node<'a>) {
        self.executable_lines.insert(node_line(&node));
    }

    fn open_block(
        &mut self,
        node: Node<'a>,
        kind: BlockKind,
        parent_id: Option<u32>,
    ) -> Option<u32> {
        if !self.track_blocks {
            return parent_id;
        }
        let id = self.next_block_id;
        self.next_block_id += 1;
        self.blocks.push(BlockRecord {
            id,
            kind,
            start_line: node_line(&node),
            end_line: node_end_line(&node),
            parent_id,
        });
        Some(id)
    }

    fn record_function(&mut self, node: Node<'a>) {
        let name = node
            .child_by_field_name("name")
            .map(|n| node_text(&n, self.source).to_string())
            .unwrap_or_else(|| "<anonymous>".to_string());
        let params = node
            .child_by_field_name("parameters")
            .map(|p| param_names(&p, self.source))
            .unwrap_or_default();
        self.functions.push(FunctionRecord {
            name,
            start_line: node_line(&node),
            end_line: node_end_line(&node),
            params,
            synthetic: false,
        });
    }
}

/// Statement-level node kinds worth descending into. Expression interiors
/// never change line classification, so they are skipped wholesale.
fn is_statement_level(kind: &str) -> bool {
    matches!(
        kind,
        "expression_statement"
            | "return_statement"
            | "raise_statement"
            | "assert_statement"
            | "delete_statement"
            | "import_statement"
            | "import_from_statement"
            | "future_import_statement"
            | "break_statement"
            | "continue_statement"
            | "pass_statement"
            | "global_statement"
            | "nonlocal_statement"
            | "if_statement"
            | "elif_clause"
            | "else_clause"
            | "for_statement"
            | "while_statement"
            | "try_statement"
            | "except_clause"
            | "except_group_clause"
            | "finally_clause"
            | "with_statement"
            | "match_statement"
            | "case_clause"
            | "function_definition"
            | "decorated_definition"
            | "class_definition"
            | "block"
            | "comment"
    )
}

fn is_docstring(node: &Node) -> bool {
    node.named_child_count() == 1
        && node
            .named_child(0)
            .map(|c| c.kind() == "string" || c.kind() == "concatenated_string")
            .unwrap_or(false)
}

fn param_names(parameters: &Node, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = parameters.walk();
    for param in parameters.named_children(&mut cursor) {
        match param.kind() {
            "identifier" => names.push(node_text(&param, source).to_string()),
            "default_parameter" | "typed_default_parameter" => {
                if let Some(name) = param.child_by_field_name("name") {
                    names.push(node_text(&name, source).to_string());
                }
            }
            "typed_parameter" | "list_splat_pattern" | "dictionary_splat_pattern" => {
                if let Some(name) = first_identifier(&param) {
                    names.push(node_text(&name, source).to_string());
                }
            }
            _ => {}
        }
    }
    names
}

fn first_identifier<'tree>(node: &Node<'tree>) -> Option<Node<'tree>> {
    (0..node.named_child_count())
        .filter_map(|i| node.named_child(i))
        .find(|c| c.kind() == "identifier")
}
