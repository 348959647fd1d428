//! Reconciliation of raw hit data against the static model.
//!
//! Coverage may never overstate execution by counting a line the static
//! model says cannot run. This pass attaches missing code maps, strips
//! hit marks from non-executable lines (self-healing any invariant
//! violation with a debug-log trail), backfills functions whose body ran
//! without a recorded call, and marks executed blocks. Running it twice
//! changes nothing on the second pass.

use log::debug;
use std::path::PathBuf;
use std::sync::Arc;

use crate::analyzer::literals;
use crate::core::FileData;
use crate::session::Session;

/// Reconcile every file in the session. Invoked at session stop and
/// again, idempotently, before producing a report.
pub fn reconcile(session: &mut Session) {
    let paths: Vec<PathBuf> = session.files.keys().cloned().collect();
    for path in paths {
        attach_code_map(session, &path);
        if let Some(data) = session.files.get_mut(&path) {
            reconcile_file(data);
        }
    }
}

/// Run the analyzer phases for files the tracker seeded with a pending
/// placeholder.
fn attach_code_map(session: &mut Session, path: &PathBuf) {
    let pending = session
        .files
        .get(path)
        .map(|d| d.code_map.is_pending())
        .unwrap_or(false);
    if !pending {
        return;
    }
    let source = session
        .files
        .get(path)
        .map(|d| d.source.clone())
        .unwrap_or_default();
    let map = session.analyzer.analyze_source(path, &source);
    if let Some(data) = session.files.get_mut(path) {
        data.code_map = map;
    }
}

fn reconcile_file(data: &mut FileData) {
    let map = Arc::clone(&data.code_map);

    // Literal spans are recomputed fresh each pass: literal state must be
    // scanned with running parity across the whole file, not per line.
    let spans = literals::scan_literal_spans(&data.lines);
    let forced = literals::forced_non_executable(&spans);

    // Rebuild the authoritative executable map.
    data.executable.clear();
    for &line in &map.executable_lines {
        if !forced.contains(&line) {
            data.executable.insert(line, true);
        }
    }

    // Strip false coverage: a hit mark on a non-executable line is an
    // invariant violation, fixed here rather than surfaced. The raw
    // executed mark is kept as a record that the runtime reported it.
    let false_hits: Vec<usize> = data
        .hits
        .iter()
        .filter(|(line, &hit)| hit && !data.executable.get(*line).copied().unwrap_or(false))
        .map(|(&line, _)| line)
        .collect();
    for line in false_hits {
        debug!(
            "clearing false coverage on non-executable line {}:{}",
            data.path.display(),
            line
        );
        data.hits.remove(&line);
    }

    // Replay call events that arrived before the code map was attached,
    // now that function ranges are known.
    let buffered: Vec<usize> = data.pending_calls.iter().copied().collect();
    data.pending_calls.clear();
    for line in buffered {
        if let Some(func) = map
            .functions
            .iter()
            .find(|f| f.start_line <= line && line <= f.end_line)
        {
            *data.function_hits.entry(func.key()).or_insert(0) += 1;
        }
    }

    // Backfill functions: a function with no recorded call whose range
    // contains any hit line still executed (only an inner line may have
    // been instrumented, not the definition line).
    for func in &map.functions {
        let key = func.key();
        let already = data.function_hits.get(&key).copied().unwrap_or(0);
        if already > 0 {
            continue;
        }
        let any_hit = data
            .hits
            .range(func.start_line..=func.end_line.max(func.start_line))
            .any(|(_, &hit)| hit);
        if any_hit {
            data.function_hits.insert(key, 1);
        }
    }

    // A block is executed when any line in its range was hit.
    for block in &map.blocks {
        if data.block_executed.get(&block.id).copied().unwrap_or(false) {
            continue;
        }
        let any_hit = data
            .hits
            .range(block.start_line..=block.end_line.max(block.start_line))
            .any(|(_, &hit)| hit);
        if any_hit {
            data.block_executed.insert(block.id, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoverageConfig;
    use crate::core::AnalysisOutcome;
    use indoc::indoc;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn session_with_file(content: &str) -> (Session, PathBuf, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.py");
        fs::write(&path, content).unwrap();
        (Session::new(CoverageConfig::default()), path, dir)
    }

    fn hit(session: &mut Session, path: &Path, line: usize) {
        crate::tracker::track_line(session, path, line);
    }

    #[test]
    fn spurious_hit_inside_literal_is_cleared() {
        let content = indoc! {r#"
            x = 1
            doc = """
            alpha
            beta
            gamma
            """
            y = 2
        "#};
        let (mut session, path, _dir) = session_with_file(content);
        hit(&mut session, &path, 1);
        hit(&mut session, &path, 4);

        reconcile(&mut session);

        let data = session.files.get(&path).unwrap();
        assert!(data.is_hit(1));
        assert!(!data.is_hit(4));
        // The raw executed record survives the fix.
        assert!(data.executed.get(&4).copied().unwrap_or(false));
        assert!(!data.is_executable(4));
    }

    #[test]
    fn reconcile_attaches_pending_code_map() {
        let (mut session, path, _dir) = session_with_file("x = 1\ny = 2\n");
        hit(&mut session, &path, 1);
        assert!(session.files.get(&path).unwrap().code_map.is_pending());

        reconcile(&mut session);

        let data = session.files.get(&path).unwrap();
        assert_eq!(data.code_map.outcome, AnalysisOutcome::Full);
        assert!(data.is_executable(1));
    }

    #[test]
    fn function_backfilled_from_inner_hit() {
        let content = indoc! {"
            def work(n):
                total = n * 2
                return total
        "};
        let (mut session, path, _dir) = session_with_file(content);
        hit(&mut session, &path, 2);

        reconcile(&mut session);

        let data = session.files.get(&path).unwrap();
        let count = data
            .function_hits
            .get(&(1, "work".to_string()))
            .copied()
            .unwrap_or(0);
        assert_eq!(count, 1);
    }

    #[test]
    fn buffered_call_replayed_after_code_map_attaches() {
        let content = indoc! {"
            def work(n):
                return n * 2
        "};
        let (mut session, path, _dir) = session_with_file(content);
        // Call arrives while the code map is still a pending placeholder.
        crate::tracker::track_call(&mut session, &path, 1);
        assert!(session.files.get(&path).unwrap().function_hits.is_empty());

        reconcile(&mut session);

        let data = session.files.get(&path).unwrap();
        let count = data
            .function_hits
            .get(&(1, "work".to_string()))
            .copied()
            .unwrap_or(0);
        assert_eq!(count, 1);
        assert!(data.pending_calls.is_empty());
    }

    #[test]
    fn untouched_function_stays_unhit() {
        let content = indoc! {"
            def used():
                return 1

            def unused():
                return 2
        "};
        let (mut session, path, _dir) = session_with_file(content);
        hit(&mut session, &path, 2);

        reconcile(&mut session);

        let data = session.files.get(&path).unwrap();
        assert!(data.function_hits.contains_key(&(1, "used".to_string())));
        assert!(!data.function_hits.contains_key(&(4, "unused".to_string())));
    }

    #[test]
    fn blocks_marked_from_hit_lines() {
        let content = indoc! {"
            if flag:
                a = 1
            else:
                b = 2
        "};
        let (mut session, path, _dir) = session_with_file(content);
        hit(&mut session, &path, 1);
        hit(&mut session, &path, 2);

        reconcile(&mut session);

        let data = session.files.get(&path).unwrap();
        let executed: usize = data.block_executed.values().filter(|&&v| v).count();
        // The if block and its taken arm; the else arm spans lines 3-4
        // which were never hit... except the outer if block covers the
        // whole statement, so only ranges containing hits are marked.
        assert!(executed >= 1);
        let map = Arc::clone(&data.code_map);
        for block in &map.blocks {
            let marked = data.block_executed.get(&block.id).copied().unwrap_or(false);
            let has_hit = (block.start_line..=block.end_line)
                .any(|l| data.hits.get(&l).copied().unwrap_or(false));
            assert_eq!(marked, has_hit);
        }
    }

    #[test]
    fn reconcile_is_idempotent() {
        let content = indoc! {r#"
            x = 1
            s = """
            text
            """
            def f():
                return x
        "#};
        let (mut session, path, _dir) = session_with_file(content);
        hit(&mut session, &path, 1);
        hit(&mut session, &path, 3);
        hit(&mut session, &path, 6);

        reconcile(&mut session);
        let first = session.files.get(&path).unwrap().clone();
        reconcile(&mut session);
        let second = session.files.get(&path).unwrap();

        assert_eq!(first.hits, second.hits);
        assert_eq!(first.executable, second.executable);
        assert_eq!(first.function_hits, second.function_hits);
        assert_eq!(first.block_executed, second.block_executed);
    }
}
