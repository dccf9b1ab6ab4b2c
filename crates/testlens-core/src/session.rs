//! Per-run node states.

use indexmap::IndexMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use uuid::Uuid;

/// State of one node within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestState {
    Enqueued,
    Started,
    Passed { duration: Option<Duration> },
    Failed { message: String, duration: Option<Duration> },
    Skipped,
}

impl TestState {
    /// Whether the node has reached an outcome.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            TestState::Passed { .. } | TestState::Failed { .. } | TestState::Skipped
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TestState::Failed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            TestState::Enqueued => "enqueued",
            TestState::Started => "started",
            TestState::Passed { .. } => "passed",
            TestState::Failed { .. } => "failed",
            TestState::Skipped => "skipped",
        }
    }
}

/// Outcome counts for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Enqueued or started, never finished.
    pub pending: usize,
}

#[derive(Debug, Default)]
struct RunState {
    nodes: IndexMap<String, TestState>,
    ended: bool,
}

/// A test run: node states in the order they were first touched.
///
/// Shared by reference between concurrently running nodes. Updates after
/// [`TestRun::end`] are ignored.
#[derive(Debug)]
pub struct TestRun {
    id: Uuid,
    name: String,
    state: Mutex<RunState>,
}

impl TestRun {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            state: Mutex::new(RunState::default()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, node: &str, state: TestState) {
        let mut run = self.lock();
        if run.ended {
            tracing::debug!(run = %self.name, node, "ignoring update after run ended");
            return;
        }
        run.nodes.insert(node.to_string(), state);
    }

    pub fn enqueued(&self, node: &str) {
        self.set(node, TestState::Enqueued);
    }

    pub fn started(&self, node: &str) {
        self.set(node, TestState::Started);
    }

    pub fn passed(&self, node: &str, duration: Option<Duration>) {
        self.set(node, TestState::Passed { duration });
    }

    pub fn failed(&self, node: &str, message: impl Into<String>, duration: Option<Duration>) {
        self.set(
            node,
            TestState::Failed {
                message: message.into(),
                duration,
            },
        );
    }

    pub fn skipped(&self, node: &str) {
        self.set(node, TestState::Skipped);
    }

    /// Close the run.
    pub fn end(&self) {
        let mut run = self.lock();
        if !run.ended {
            run.ended = true;
            tracing::info!(run = %self.name, nodes = run.nodes.len(), "run ended");
        }
    }

    pub fn is_ended(&self) -> bool {
        self.lock().ended
    }

    pub fn state(&self, node: &str) -> Option<TestState> {
        self.lock().nodes.get(node).cloned()
    }

    /// Every touched node with its state.
    pub fn states(&self) -> Vec<(String, TestState)> {
        self.lock()
            .nodes
            .iter()
            .map(|(id, state)| (id.clone(), state.clone()))
            .collect()
    }

    pub fn summary(&self) -> RunSummary {
        let run = self.lock();
        run.nodes.values().fold(RunSummary::default(), |mut summary, state| {
            match state {
                TestState::Passed { .. } => summary.passed += 1,
                TestState::Failed { .. } => summary.failed += 1,
                TestState::Skipped => summary.skipped += 1,
                TestState::Enqueued | TestState::Started => summary.pending += 1,
            }
            summary
        })
    }
}
