//! Raw-text scanner for multi-line string literals.
//!
//! Triple-quoted spans may not appear as distinct AST nodes for every
//! line they cover, so they are detected by scanning the raw text with a
//! running open/close parity across the whole file. Lines inside a span
//! are forced non-executable regardless of AST classification.
//!
//! The scanner is deliberately lexical: it skips `#` comments and
//! single-line strings so delimiters inside them do not flip the parity.

use std::collections::BTreeSet;

use crate::analyzer::phases::PhaseBudget;

/// One multi-line literal, inclusive line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiteralSpan {
    pub start_line: usize,
    pub end_line: usize,
}

enum Mode {
    Normal,
    Triple { quote: u8, start_line: usize },
}

/// Scan all lines for multi-line literal spans.
pub fn scan_literal_spans(lines: &[String]) -> Vec<LiteralSpan> {
    scan_with_budget(lines, None).0
}

/// Budgeted scan. Returns the spans found plus the number of lines
/// scanned; the count is short of `lines.len()` when the budget ran out.
pub fn scan_with_budget(
    lines: &[String],
    budget: Option<&PhaseBudget>,
) -> (Vec<LiteralSpan>, usize) {
    let mut spans = Vec::new();
    let mut mode = Mode::Normal;
    let mut scanned = 0;

    for (idx, line) in lines.iter().enumerate() {
        if let Some(budget) = budget {
            if !budget.check_batch(idx) {
                break;
            }
        }
        let line_no = idx + 1;
        scan_line(line.as_bytes(), line_no, &mut mode, &mut spans);
        scanned = line_no;
    }

    // Unterminated literal runs to the last scanned line.
    if let Mode::Triple { start_line, .. } = mode {
        if scanned >= start_line {
            spans.push(LiteralSpan {
                start_line,
                end_line: scanned,
            });
        }
    }

    (spans, scanned)
}

/// Lines forced non-executable by the given spans: everything after the
/// opening line through the closing line. The opening line keeps its AST
/// classification since it may carry an assignment.
pub fn forced_non_executable(spans: &[LiteralSpan]) -> BTreeSet<usize> {
    let mut forced = BTreeSet::new();
    for span in spans {
        for line in (span.start_line + 1)..=span.end_line {
            forced.insert(line);
        }
    }
    forced
}

fn scan_line(bytes: &[u8], line_no: usize, mode: &mut Mode, spans: &mut Vec<LiteralSpan>) {
    let mut i = 0;
    loop {
        match mode {
            Mode::Normal => {
                let Some(pos) = next_interesting(bytes, i) else {
                    return;
                };
                i = pos;
                let b = bytes[i];
                if b == b'#' {
                    return;
                }
                if is_triple_at(bytes, i) {
                    match find_triple(bytes, i + 3, b) {
                        // Opens and closes on the same line; no span.
                        Some(close) => i = close + 3,
                        None => {
                            *mode = Mode::Triple {
                                quote: b,
                                start_line: line_no,
                            };
                            i += 3;
                        }
                    }
                } else {
                    // Ordinary single-line string; skip to its close so
                    // quotes inside it are not misread as delimiters.
                    match find_quote(bytes, i + 1, b) {
                        Some(close) => i = close + 1,
                        None => return,
                    }
                }
            }
            Mode::Triple { quote, start_line } => {
                match find_triple(bytes, i, *quote) {
                    Some(close) => {
                        spans.push(LiteralSpan {
                            start_line: *start_line,
                            end_line: line_no,
                        });
                        *mode = Mode::Normal;
                        i = close + 3;
                    }
                    None => return,
                }
            }
        }
    }
}

fn next_interesting(bytes: &[u8], mut i: usize) -> Option<usize> {
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' | b'#' => return Some(i),
            b'\\' => i += 2,
            _ => i += 1,
        }
    }
    None
}

fn is_triple_at(bytes: &[u8], i: usize) -> bool {
    i + 2 < bytes.len() && bytes[i] == bytes[i + 1] && bytes[i] == bytes[i + 2]
}

fn find_triple(bytes: &[u8], mut i: usize, quote: u8) -> Option<usize> {
    while i + 2 < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote && bytes[i + 1] == quote && bytes[i + 2] == quote => {
                return Some(i);
            }
            _ => i += 1,
        }
    }
    None
}

fn find_quote(bytes: &[u8], mut i: usize, quote: u8) -> Option<usize> {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return Some(i),
            _ => i += 1,
        }
    }
    None
}
