//! Waiting for a run's report and mapping it back onto tree nodes.

use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::time::{Duration, SystemTime};

use super::{CaseOutcome, Report, ReportCase};
use crate::runner::ExitSignal;
use crate::scanner::name_pattern;
use crate::session::TestRun;
use crate::tree::{NodeKind, TreeNode};

/// Notifies when a file changes.
#[async_trait]
pub trait FileWatcher: Send + Sync {
    /// Resolves at the first change to `path` after the call.
    ///
    /// Creation and deletion count as changes.
    async fn changed(&self, path: &Path);
}

/// Watches files by polling their metadata.
#[derive(Debug, Clone, Copy)]
pub struct PollingWatcher {
    interval: Duration,
}

impl PollingWatcher {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }
}

async fn snapshot(path: &Path) -> Option<(u64, Option<SystemTime>)> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    Some((metadata.len(), metadata.modified().ok()))
}

#[async_trait]
impl FileWatcher for PollingWatcher {
    async fn changed(&self, path: &Path) {
        let initial = snapshot(path).await;
        let mut ticker = tokio::time::interval(self.interval);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if snapshot(path).await != initial {
                return;
            }
        }
    }
}

/// Wait for `result_file` to change, then apply it to `node`.
///
/// Never times out. Returns whether a report was applied.
pub async fn track(result_file: &Path, node: &TreeNode, run: &TestRun, watcher: &dyn FileWatcher) -> bool {
    run.started(&node.id);
    watcher.changed(result_file).await;
    finish(result_file, node, run).await
}

/// Like [`track`], but also completes when the runner exits.
///
/// A report that does not parse yet is waited on until the next change. Once
/// the runner has exited the report gets one final read.
pub async fn track_until(
    result_file: &Path,
    node: &TreeNode,
    run: &TestRun,
    watcher: &dyn FileWatcher,
    mut exit: ExitSignal,
) -> bool {
    run.started(&node.id);
    loop {
        tokio::select! {
            _ = watcher.changed(result_file) => {
                match Report::read(result_file).await {
                    Ok(report) => {
                        apply_report(&report, node, run);
                        remove_report(result_file).await;
                        return true;
                    }
                    Err(e) => tracing::debug!(file = %result_file.display(), error = %e, "report not complete yet"),
                }
            }
            code = &mut exit => {
                tracing::debug!(node = %node.id, code = ?code.ok().flatten(), "runner exited");
                return finish(result_file, node, run).await;
            }
        }
    }
}

/// Read, apply and delete the report, logging failures.
async fn finish(result_file: &Path, node: &TreeNode, run: &TestRun) -> bool {
    if !tokio::fs::try_exists(result_file).await.unwrap_or(false) {
        tracing::info!(file = %result_file.display(), node = %node.id, "no report written");
        return false;
    }

    let applied = match Report::read(result_file).await {
        Ok(report) => {
            apply_report(&report, node, run);
            true
        }
        Err(e) => {
            tracing::warn!(file = %result_file.display(), error = %e, "failed to read test report");
            false
        }
    };
    remove_report(result_file).await;
    applied
}

/// Delete a reserved result file without applying it, if one was written.
pub async fn discard_report(result_file: &Path) {
    if tokio::fs::try_exists(result_file).await.unwrap_or(false) {
        tracing::debug!(file = %result_file.display(), "discarding test report");
        remove_report(result_file).await;
    }
}

async fn remove_report(result_file: &Path) {
    if let Err(e) = tokio::fs::remove_file(result_file).await {
        tracing::warn!(file = %result_file.display(), error = %e, "failed to remove test report");
    }
}

/// Record a report's outcome on `node` and on the suites and tests below it.
///
/// A test takes the outcome of the cases named after it. Tests that name a
/// group take the outcome of every case whose class name ends with them. A
/// suite takes the outcome of the cases its tests matched.
pub fn apply_report(report: &Report, node: &TreeNode, run: &TestRun) {
    let all: Vec<&ReportCase> = report.cases.iter().collect();
    record(run, &node.id, &all);

    for child in node.descendants() {
        match child.kind {
            NodeKind::Test => {
                let cases = cases_for_test(report, child);
                if !cases.is_empty() {
                    record(run, &child.id, &cases);
                }
            }
            NodeKind::Suite => {
                let mut cases: Vec<&ReportCase> = Vec::new();
                for test in child.descendants().into_iter().filter(|n| n.kind == NodeKind::Test) {
                    for case in cases_for_test(report, test) {
                        if !cases.iter().any(|seen| std::ptr::eq(*seen, case)) {
                            cases.push(case);
                        }
                    }
                }
                if !cases.is_empty() {
                    record(run, &child.id, &cases);
                }
            }
            NodeKind::Folder => {}
        }
    }

    tracing::info!(
        node = %node.id,
        cases = report.cases.len(),
        failures = report.failures(),
        "report applied"
    );
}

fn cases_for_test<'r>(report: &'r Report, test: &TreeNode) -> Vec<&'r ReportCase> {
    let by_name = LabelMatcher::new(&test.label, "^");
    let cases: Vec<&ReportCase> = report.cases.iter().filter(|c| by_name.matches(&c.name)).collect();
    if !cases.is_empty() {
        return cases;
    }
    let by_group = LabelMatcher::new(&test.label, "^(?:.* )?");
    report.cases.iter().filter(|c| by_group.matches(&c.classname)).collect()
}

fn record(run: &TestRun, node: &str, cases: &[&ReportCase]) {
    let duration = Some(cases.iter().map(|c| c.time).sum());
    let failure = cases.iter().find_map(|c| match &c.outcome {
        CaseOutcome::Failed { message } => Some(message.clone()),
        _ => None,
    });

    if let Some(message) = failure {
        run.failed(node, message, duration);
    } else if cases.iter().all(|c| c.outcome == CaseOutcome::Skipped) {
        run.skipped(node);
    } else {
        run.passed(node, duration);
    }
}

/// Matches a node label exactly, or as an anchored pattern with wildcards.
struct LabelMatcher<'a> {
    label: &'a str,
    pattern: Option<Regex>,
}

impl<'a> LabelMatcher<'a> {
    fn new(label: &'a str, prefix: &str) -> Self {
        let pattern = match Regex::new(&format!("{}{}$", prefix, name_pattern(label))) {
            Ok(re) => Some(re),
            Err(_) => None,
        };
        Self { label, pattern }
    }

    fn matches(&self, text: &str) -> bool {
        text == self.label || self.pattern.as_ref().is_some_and(|re| re.is_match(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Range;
    use crate::session::TestState;
    use std::path::PathBuf;

    fn suite_with_tests(names: &[&str]) -> TreeNode {
        let path = Path::new("/w/math.test.ts");
        let mut suite = TreeNode::suite(path);
        for name in names {
            let test = TreeNode::test(path, *name, Range::default());
            suite.children.insert(test.id.clone(), test);
        }
        suite
    }

    fn case(classname: &str, name: &str, millis: u64, outcome: CaseOutcome) -> ReportCase {
        ReportCase {
            name: name.to_string(),
            classname: classname.to_string(),
            time: Duration::from_millis(millis),
            outcome,
        }
    }

    #[test]
    fn test_apply_passed_report() {
        let suite = suite_with_tests(&["adds"]);
        let run = TestRun::new("run");
        let report = Report {
            cases: vec![case("Math", "adds", 10, CaseOutcome::Passed)],
        };

        apply_report(&report, &suite, &run);

        assert_eq!(
            run.state(&suite.id),
            Some(TestState::Passed {
                duration: Some(Duration::from_millis(10))
            })
        );
        assert!(matches!(
            run.state("/w/math.test.ts::adds"),
            Some(TestState::Passed { .. })
        ));
    }

    #[test]
    fn test_apply_maps_failures_wildcards_and_groups() {
        let suite = suite_with_tests(&["Math", "adds", "case .*", "unreported"]);
        let run = TestRun::new("run");
        let report = Report {
            cases: vec![
                case("Math", "adds", 1, CaseOutcome::Passed),
                case(
                    "Math",
                    "case 2",
                    2,
                    CaseOutcome::Failed {
                        message: "expected 2 to equal 3".to_string(),
                    },
                ),
                case("Math", "case 1", 3, CaseOutcome::Passed),
            ],
        };

        apply_report(&report, &suite, &run);

        assert_eq!(
            run.state(&suite.id),
            Some(TestState::Failed {
                message: "expected 2 to equal 3".to_string(),
                duration: Some(Duration::from_millis(6)),
            })
        );
        assert_eq!(
            run.state("/w/math.test.ts::case .*"),
            Some(TestState::Failed {
                message: "expected 2 to equal 3".to_string(),
                duration: Some(Duration::from_millis(5)),
            })
        );
        assert!(run.state("/w/math.test.ts::Math").unwrap().is_failed());
        assert!(run.state("/w/math.test.ts::unreported").is_none());
    }

    #[test]
    fn test_apply_folder_report_records_suites() {
        let root = Path::new("/w");
        let mut folder = TreeNode::folder(root, "<root>");
        let math = suite_with_tests(&["adds"]);
        let empty = TreeNode::suite(Path::new("/w/empty.test.ts"));
        folder.children.insert(math.id.clone(), math);
        folder.children.insert(empty.id.clone(), empty);
        let run = TestRun::new("run");
        let report = Report {
            cases: vec![
                case("Math", "adds", 2, CaseOutcome::Passed),
                case("Other", "other", 3, CaseOutcome::Passed),
            ],
        };

        apply_report(&report, &folder, &run);

        assert_eq!(
            run.state("/w/math.test.ts"),
            Some(TestState::Passed {
                duration: Some(Duration::from_millis(2))
            })
        );
        assert!(run.state("/w/empty.test.ts").is_none());
        assert!(matches!(run.state("/w"), Some(TestState::Passed { .. })));
    }

    #[test]
    fn test_all_skipped() {
        let suite = suite_with_tests(&[]);
        let run = TestRun::new("run");
        let report = Report {
            cases: vec![case("Math", "later", 0, CaseOutcome::Skipped)],
        };
        apply_report(&report, &suite, &run);
        assert_eq!(run.state(&suite.id), Some(TestState::Skipped));
    }

    #[test]
    fn test_label_matcher_literal_specials() {
        let matcher = LabelMatcher::new("adds (1+1)", "^");
        assert!(matcher.matches("adds (1+1)"));
        assert!(!matcher.matches("adds 11"));
    }

    struct NeverChanges;

    #[async_trait]
    impl FileWatcher for NeverChanges {
        async fn changed(&self, _path: &Path) {
            std::future::pending::<()>().await
        }
    }

    #[tokio::test]
    async fn test_track_until_exit_without_report() {
        let dir = tempfile::TempDir::new().unwrap();
        let file: PathBuf = dir.path().join("test-results-x.xml");
        let suite = suite_with_tests(&["adds"]);
        let run = TestRun::new("run");

        let (tx, rx) = tokio::sync::oneshot::channel();
        tx.send(Some(1)).unwrap();

        let applied = track_until(&file, &suite, &run, &NeverChanges, rx).await;
        assert!(!applied);
        assert_eq!(run.state(&suite.id), Some(TestState::Started));
    }

    #[tokio::test]
    async fn test_track_until_exit_reads_final_report() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("test-results-y.xml");
        std::fs::write(&file, r#"<testsuite><testcase name="adds" time="0.01"/></testsuite>"#).unwrap();
        let suite = suite_with_tests(&["adds"]);
        let run = TestRun::new("run");

        let (tx, rx) = tokio::sync::oneshot::channel();
        tx.send(Some(0)).unwrap();

        assert!(track_until(&file, &suite, &run, &NeverChanges, rx).await);
        assert!(matches!(run.state(&suite.id), Some(TestState::Passed { .. })));
        assert!(!file.exists());
    }
}
