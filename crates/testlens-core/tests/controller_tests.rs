use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{broadcast, oneshot};
use testlens_core::runner::{AttachConfig, DebugHost, ExitSignal, Terminal, TerminalFactory};
use testlens_core::tree::{folder_id, suite_id, test_id};
use testlens_core::{Config, RunError, RunMode, RunRequest, TestController, TestState, Workspace};

const MATH: &str = "describe('Math', () => {\n  it('adds', () => {});\n  it('divides', () => {});\n});\n";

const REPORT: &str = r#"<testsuite name="Mocha Tests" tests="2" failures="1">
<testcase classname="Math" name="adds" time="0.004"/>
<testcase classname="Math" name="divides" time="0.001"><failure>division by zero</failure></testcase>
</testsuite>"#;

/// Records commands and plays back a fixed report and exit code.
#[derive(Clone)]
struct ScriptedTerminals {
    report: Option<&'static str>,
    exit_code: i32,
    commands: Arc<Mutex<Vec<String>>>,
}

impl ScriptedTerminals {
    fn new(report: Option<&'static str>, exit_code: i32) -> Self {
        Self {
            report,
            exit_code,
            commands: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

struct ScriptedTerminal {
    name: String,
    script: ScriptedTerminals,
}

impl TerminalFactory for ScriptedTerminals {
    fn create(&self, name: &str) -> Arc<dyn Terminal> {
        Arc::new(ScriptedTerminal {
            name: name.to_string(),
            script: self.clone(),
        })
    }
}

impl Terminal for ScriptedTerminal {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, request: &RunRequest) -> Result<ExitSignal, RunError> {
        self.script.commands.lock().unwrap().push(request.command_line());
        let (tx, rx) = oneshot::channel();
        let result_file = request.result_file.clone();
        let report = self.script.report;
        let code = self.script.exit_code;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            if let (Some(file), Some(report)) = (result_file, report) {
                tokio::fs::write(file, report).await.unwrap();
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = tx.send(Some(code));
        });
        Ok(rx)
    }
}

/// Announces every session it is asked to start.
struct AttachingHost {
    sessions: broadcast::Sender<String>,
    requests: Mutex<Vec<AttachConfig>>,
}

impl AttachingHost {
    fn new() -> Self {
        let (sessions, _) = broadcast::channel(4);
        Self {
            sessions,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DebugHost for AttachingHost {
    fn sessions(&self) -> broadcast::Receiver<String> {
        self.sessions.subscribe()
    }

    async fn start_debugging(&self, _root: &Path, config: &AttachConfig) -> bool {
        self.requests.lock().unwrap().push(config.clone());
        let _ = self.sessions.send(config.name.clone());
        true
    }
}

fn fixture(track_results_inline: bool) -> (TempDir, PathBuf, Workspace) {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();
    fs::write(root.join("math.test.ts"), MATH).unwrap();
    let workspace = Workspace::with_config(
        &root,
        Config {
            use_project_descriptor: false,
            poll_interval_ms: 10,
            track_results_inline,
            ..Config::default()
        },
    );
    (dir, root, workspace)
}

async fn controller(workspace: Workspace, terminals: &ScriptedTerminals) -> TestController {
    let mut controller = TestController::new(workspace).with_terminals(Arc::new(terminals.clone()));
    controller.refresh().await;
    controller.resolve_all().await;
    controller
}

#[tokio::test]
async fn test_execute_suite_maps_report_onto_tests() {
    let (_dir, root, workspace) = fixture(true);
    let terminals = ScriptedTerminals::new(Some(REPORT), 1);
    let controller = controller(workspace, &terminals).await;
    let file = root.join("math.test.ts");

    let run = tokio::time::timeout(Duration::from_secs(5), controller.execute(&[suite_id(&file)], false))
        .await
        .unwrap()
        .unwrap();

    assert!(run.is_ended());
    assert!(run.state(&suite_id(&file)).unwrap().is_failed());
    assert!(matches!(
        run.state(&test_id(&file, "adds")),
        Some(TestState::Passed { .. })
    ));
    assert_eq!(
        run.state(&test_id(&file, "divides")),
        Some(TestState::Failed {
            message: "division by zero".to_string(),
            duration: Some(Duration::from_millis(1)),
        })
    );

    let commands = terminals.commands();
    assert_eq!(commands.len(), 1);
    assert!(commands[0].ends_with("./math.test.ts"));
    assert!(commands[0].contains("--reporter xunit"));
}

#[tokio::test]
async fn test_execute_test_node_filters_by_name() {
    let (_dir, root, workspace) = fixture(true);
    let terminals = ScriptedTerminals::new(Some(r#"<testsuite><testcase classname="Math" name="adds" time="0.004"/></testsuite>"#), 0);
    let controller = controller(workspace, &terminals).await;
    let file = root.join("math.test.ts");

    let run = controller.execute(&[test_id(&file, "adds")], false).await.unwrap();

    assert_eq!(
        run.state(&test_id(&file, "adds")),
        Some(TestState::Passed {
            duration: Some(Duration::from_millis(4))
        })
    );
    assert!(terminals.commands()[0].contains("--grep '\"adds\"'"));
}

#[tokio::test]
async fn test_execute_unknown_node() {
    let (_dir, _root, workspace) = fixture(true);
    let terminals = ScriptedTerminals::new(None, 0);
    let controller = controller(workspace, &terminals).await;

    let err = controller.execute(&["/missing.test.ts".to_string()], false).await.unwrap_err();
    assert!(matches!(err, RunError::UnknownNode(_)));
    assert!(terminals.commands().is_empty());
}

#[tokio::test]
async fn test_run_test_without_tracking_uses_exit_code() {
    let (_dir, root, workspace) = fixture(false);
    let passing = ScriptedTerminals::new(None, 0);
    let failing = ScriptedTerminals::new(None, 2);
    let file = root.join("math.test.ts");

    let ok = controller(workspace.clone(), &passing)
        .await
        .run_test(&file, "math.test.ts", RunMode::File)
        .await
        .unwrap();
    let failed = controller(workspace, &failing)
        .await
        .run_test(&file, "math.test.ts", RunMode::File)
        .await
        .unwrap();

    assert!(ok);
    assert!(!failed);
    assert!(!passing.commands()[0].contains("--reporter"));
}

#[tokio::test]
async fn test_terminals_are_reused_by_name() {
    let (_dir, root, workspace) = fixture(false);
    let terminals = ScriptedTerminals::new(None, 0);
    let controller = controller(workspace, &terminals).await;
    let file = root.join("math.test.ts");

    controller.run_test(&file, "adds", RunMode::Suite).await.unwrap();
    controller.run_test(&file, "adds", RunMode::Suite).await.unwrap();

    assert_eq!(terminals.commands().len(), 2);
}

#[tokio::test]
async fn test_debug_test_attaches() {
    let (_dir, root, workspace) = fixture(false);
    let terminals = ScriptedTerminals::new(None, 0);
    let host = Arc::new(AttachingHost::new());
    let controller = controller(workspace, &terminals).await.with_debug_host(host.clone());
    let file = root.join("math.test.ts");

    let ok = controller.debug_test(&file, "adds", RunMode::Suite).await.unwrap();

    assert!(ok);
    assert!(terminals.commands()[0].contains("--inspect"));
    let requests = host.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].name, "Debug adds");
}

#[tokio::test]
async fn test_debug_without_host_fails_node() {
    let (_dir, root, workspace) = fixture(false);
    let terminals = ScriptedTerminals::new(None, 0);
    let controller = controller(workspace, &terminals).await;
    let file = root.join("math.test.ts");

    let err = controller.debug_test(&file, "adds", RunMode::Suite).await.unwrap_err();
    assert!(matches!(err, RunError::Debug(_)));

    let run = controller.execute(&[test_id(&file, "adds")], true).await.unwrap();
    assert!(run.state(&test_id(&file, "adds")).unwrap().is_failed());
}

#[tokio::test]
async fn test_failed_attach_leaves_no_report_behind() {
    let (_dir, root, workspace) = fixture(true);
    let terminals = ScriptedTerminals::new(Some(REPORT), 0);
    let controller = controller(workspace, &terminals).await;
    let file = root.join("math.test.ts");

    let err = controller.debug_test(&file, "adds", RunMode::Suite).await.unwrap_err();
    assert!(matches!(err, RunError::Debug(_)));
    assert!(terminals.commands()[0].contains("--reporter xunit"));

    let leftovers: Vec<String> = fs::read_dir(&root)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .filter(|name| name.starts_with("test-results-"))
        .collect();
    assert!(leftovers.is_empty(), "left behind: {:?}", leftovers);
}

#[tokio::test]
async fn test_execute_folder_records_suites() {
    let (_dir, root, workspace) = fixture(true);
    let terminals = ScriptedTerminals::new(Some(REPORT), 1);
    let controller = controller(workspace, &terminals).await;
    let file = root.join("math.test.ts");

    let run = controller.execute(&[folder_id(&root)], false).await.unwrap();

    assert!(run.state(&folder_id(&root)).unwrap().is_failed());
    assert_eq!(
        run.state(&suite_id(&file)),
        Some(TestState::Failed {
            message: "division by zero".to_string(),
            duration: Some(Duration::from_millis(5)),
        })
    );
    assert!(matches!(
        run.state(&test_id(&file, "adds")),
        Some(TestState::Passed { .. })
    ));
    assert!(terminals.commands()[0].ends_with("**/*.test.ts"));
}
