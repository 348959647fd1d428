//! Pattern-based fallback classification.
//!
//! Used when static analysis fails, times out, is disabled, or is
//! skipped for oversized and test files. The classifier deliberately
//! under-approximates: it marks only the import/setup region and the
//! first function-looking definition, which is enough to avoid reporting
//! zero coverage on files the parser cannot handle.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

use crate::core::FunctionRecord;

static IMPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(import\s+\w|from\s+[\w.]+\s+import\b)").unwrap());

static ASSIGN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[A-Za-z_]\w*\s*=\s*\S").unwrap());

static DEF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\(").unwrap());

/// Result of heuristic classification over a line range.
#[derive(Debug, Default)]
pub struct HeuristicClassification {
    pub executable_lines: BTreeSet<usize>,
    pub functions: Vec<FunctionRecord>,
}

/// Classify lines `[from_line, lines.len()]` by pattern matching.
///
/// Import lines and the variable assignments immediately following them
/// form a minimally-tracked setup region; the first `def`-looking line
/// registers a function record spanning the rest of the file.
pub fn classify_lines(lines: &[String], from_line: usize) -> HeuristicClassification {
    let mut out = HeuristicClassification::default();
    let mut in_setup = false;

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        if line_no < from_line {
            continue;
        }

        if IMPORT_RE.is_match(line) {
            out.executable_lines.insert(line_no);
            in_setup = true;
            continue;
        }

        if in_setup {
            if ASSIGN_RE.is_match(line) {
                out.executable_lines.insert(line_no);
                continue;
            }
            if !line.trim().is_empty() {
                in_setup = false;
            }
        }

        if out.functions.is_empty() {
            if let Some(caps) = DEF_RE.captures(line) {
                out.functions.push(FunctionRecord {
                    name: caps[1].to_string(),
                    start_line: line_no,
                    end_line: lines.len().max(line_no),
                    params: Vec::new(),
                    synthetic: false,
                });
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn lines(source: &str) -> Vec<String> {
        source.lines().map(str::to_string).collect()
    }

    #[test]
    fn imports_and_following_assignments_form_setup_region() {
        let src = lines(indoc! {"
            import os
            from sys import path
            ROOT = os.getcwd()

            print(ROOT)
        "});
        let out = classify_lines(&src, 1);
        assert!(out.executable_lines.contains(&1));
        assert!(out.executable_lines.contains(&2));
        assert!(out.executable_lines.contains(&3));
        // Heuristics under-approximate: the call is not matched.
        assert!(!out.executable_lines.contains(&5));
    }

    #[test]
    fn first_def_line_registers_function() {
        let src = lines(indoc! {"
            def outer(a):
                return a

            def second():
                pass
        "});
        let out = classify_lines(&src, 1);
        assert_eq!(out.functions.len(), 1);
        assert_eq!(out.functions[0].name, "outer");
        assert_eq!(out.functions[0].start_line, 1);
        assert_eq!(out.functions[0].end_line, 5);
    }

    #[test]
    fn from_line_skips_already_analyzed_prefix() {
        let src = lines("import os\nimport sys\n");
        let out = classify_lines(&src, 2);
        assert!(!out.executable_lines.contains(&1));
        assert!(out.executable_lines.contains(&2));
    }

    #[test]
    fn assignments_without_imports_are_not_setup() {
        let src = lines("x = 1\ny = 2\n");
        let out = classify_lines(&src, 1);
        assert!(out.executable_lines.is_empty());
        assert!(out.functions.is_empty());
    }
}
