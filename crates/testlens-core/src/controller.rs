//! The controller: one workspace, its tree, and the collaborators used to run it.

use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::discovery::{self, DiscoveryError, DiscoveryStats};
use crate::document::{DocumentSource, FsDocuments, Range};
use crate::report::{discard_report, track_until, FileWatcher, PollingWatcher};
use crate::runner::{
    attach_debugger, DebugHost, NoDebugHost, RequestBuilder, RunError, RunMode, RunOptions, TerminalFactory,
    TerminalProvider,
};
use crate::scanner::TestDeclaration;
use crate::session::TestRun;
use crate::tree::{folder_id, suite_id, test_id, TestTree, TreeNode};
use crate::workspace::Workspace;

/// Owns the test tree for a workspace and runs its nodes.
pub struct TestController {
    workspace: Workspace,
    tree: TestTree,
    terminals: TerminalProvider,
    watcher: Arc<dyn FileWatcher>,
    documents: Arc<dyn DocumentSource>,
    debug_host: Arc<dyn DebugHost>,
}

impl TestController {
    /// Controller with shell terminals, a polling watcher, disk reads and no debugger.
    pub fn new(workspace: Workspace) -> Self {
        let watcher = PollingWatcher::from_millis(workspace.config().poll_interval_ms);
        Self {
            workspace,
            tree: TestTree::new(),
            terminals: TerminalProvider::default(),
            watcher: Arc::new(watcher),
            documents: Arc::new(FsDocuments),
            debug_host: Arc::new(NoDebugHost::new()),
        }
    }

    pub fn with_terminals(mut self, factory: Arc<dyn TerminalFactory>) -> Self {
        self.terminals = TerminalProvider::new(factory);
        self
    }

    pub fn with_watcher(mut self, watcher: Arc<dyn FileWatcher>) -> Self {
        self.watcher = watcher;
        self
    }

    pub fn with_documents(mut self, documents: Arc<dyn DocumentSource>) -> Self {
        self.documents = documents;
        self
    }

    pub fn with_debug_host(mut self, host: Arc<dyn DebugHost>) -> Self {
        self.debug_host = host;
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn tree(&self) -> &TestTree {
        &self.tree
    }

    /// Rediscover every folder and suite.
    pub async fn refresh(&mut self) -> DiscoveryStats {
        discovery::discover_all(&self.workspace, &mut self.tree).await
    }

    /// Scan a suite's file for its tests.
    pub async fn resolve(&mut self, id: &str) -> Result<usize, DiscoveryError> {
        discovery::expand_suite(&mut self.tree, self.documents.as_ref(), id).await
    }

    /// Resolve every suite in the tree, logging the ones that fail to scan.
    pub async fn resolve_all(&mut self) -> usize {
        let suites: Vec<String> = self
            .tree
            .roots()
            .flat_map(|root| root.descendants())
            .filter(|node| node.can_resolve_children)
            .map(|node| node.id.clone())
            .collect();

        let mut total = 0;
        for id in suites {
            match self.resolve(&id).await {
                Ok(found) => total += found,
                Err(e) => tracing::warn!(suite = %id, error = %e, "failed to resolve suite"),
            }
        }
        total
    }

    /// Rebuild one file's suite from edited text.
    pub fn file_changed(&mut self, path: &Path, text: &str) -> Result<Vec<TestDeclaration>, DiscoveryError> {
        discovery::refresh_file(&self.workspace, &mut self.tree, path, text)
    }

    /// Run one file, folder or named test. Returns whether it succeeded.
    pub async fn run_test(&self, file: &Path, test_name: &str, mode: RunMode) -> Result<bool, RunError> {
        self.run_command(file, test_name, mode, false).await
    }

    /// Like [`run_test`](Self::run_test) with a debugger attached.
    pub async fn debug_test(&self, file: &Path, test_name: &str, mode: RunMode) -> Result<bool, RunError> {
        self.run_command(file, test_name, mode, true).await
    }

    async fn run_command(&self, file: &Path, test_name: &str, mode: RunMode, debug: bool) -> Result<bool, RunError> {
        let node = self.command_node(file, test_name, mode);
        let run = TestRun::new(test_name);
        let result = self.run_node(&node, mode, &run, debug).await;
        run.end();
        result
    }

    /// The tree node a command targets, or a detached one if it is not in the tree.
    fn command_node(&self, file: &Path, test_name: &str, mode: RunMode) -> TreeNode {
        let id = match mode {
            RunMode::Folder => folder_id(file),
            RunMode::File => suite_id(file),
            RunMode::Suite => test_id(file, test_name),
        };
        if let Some(node) = self.tree.find(&id) {
            return node.clone();
        }
        match mode {
            RunMode::Folder => TreeNode::folder(file, test_name),
            RunMode::File => TreeNode::suite(file),
            RunMode::Suite => TreeNode::test(file, test_name, Range::default()),
        }
    }

    /// Run tree nodes concurrently, each in the mode its kind implies.
    pub async fn execute(&self, ids: &[String], debug: bool) -> Result<TestRun, RunError> {
        let nodes = ids
            .iter()
            .map(|id| {
                self.tree
                    .find(id)
                    .filter(|node| !node.is_placeholder())
                    .ok_or_else(|| RunError::UnknownNode(id.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let name = match nodes.as_slice() {
            [single] => single.label.clone(),
            _ => format!("{} items", nodes.len()),
        };
        let run = TestRun::new(name);
        for node in &nodes {
            run.enqueued(&node.id);
        }
        let debug_flag = debug;
        tracing::info!(run = %run.name(), nodes = nodes.len(), debug = debug_flag, "run started");

        let run_ref = &run;
        let results = join_all(nodes.iter().map(|node| async move {
            let result = self.run_node(node, RunMode::from(node.kind), run_ref, debug).await;
            (*node, result)
        }))
        .await;

        for (node, result) in results {
            if let Err(e) = result {
                tracing::warn!(node = %node.id, error = %e, "run failed");
                run.failed(&node.id, e.to_string(), None);
            }
        }

        run.end();
        Ok(run)
    }

    async fn run_node(&self, node: &TreeNode, mode: RunMode, run: &TestRun, debug: bool) -> Result<bool, RunError> {
        let config = self.workspace.config();
        let options = RunOptions {
            debug,
            track_results: config.track_results_inline,
        };
        let request = RequestBuilder::new(&self.workspace).build(&node.uri, &node.label, mode, options);

        run.started(&node.id);
        let exit = self.terminals.get(&node.label).send(&request)?;

        if debug {
            let timeout = Duration::from_millis(config.debug_timeout_ms);
            let attached =
                attach_debugger(self.debug_host.as_ref(), self.workspace.root(), &node.label, timeout).await;
            if let Err(e) = attached {
                // The runner carries on undebugged; drop whatever it reports
                let _ = exit.await;
                if let Some(file) = &request.result_file {
                    discard_report(file).await;
                }
                return Err(e.into());
            }
        }

        let succeeded = match &request.result_file {
            Some(file) => {
                track_until(file, node, run, self.watcher.as_ref(), exit).await;
                run.state(&node.id)
                    .map(|state| state.is_final() && !state.is_failed())
                    .unwrap_or(false)
            }
            None => {
                let code = exit.await.ok().flatten();
                if code == Some(0) {
                    run.passed(&node.id, None);
                } else {
                    let message = match code {
                        Some(code) => format!("runner exited with code {}", code),
                        None => "runner was terminated".to_string(),
                    };
                    run.failed(&node.id, message, None);
                }
                code == Some(0)
            }
        };

        tracing::info!(node = %node.id, mode = %mode, succeeded, "node finished");
        Ok(succeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, SEARCHING_NODE_ID};

    #[tokio::test]
    async fn test_execute_rejects_searching_placeholder() {
        let workspace = Workspace::with_config("/w", Config::default());
        let mut controller = TestController::new(workspace);
        controller.tree.upsert_root(TreeNode::searching(Path::new("/w")));

        let err = controller
            .execute(&[SEARCHING_NODE_ID.to_string()], false)
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::UnknownNode(_)));
    }
}
