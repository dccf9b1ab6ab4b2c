//! Named terminals that run commands.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::process::Command;
use tokio::sync::oneshot;

use super::{RunError, RunRequest};
use crate::config::DEFAULT_RUNNER_NAME;

/// Resolves with the exit code once the command finishes.
///
/// `None` when the process was killed by a signal or could not be awaited.
pub type ExitSignal = oneshot::Receiver<Option<i32>>;

/// A place commands are sent to.
pub trait Terminal: Send + Sync {
    fn name(&self) -> &str;

    /// Start `request` and return without waiting for it.
    fn send(&self, request: &RunRequest) -> Result<ExitSignal, RunError>;
}

/// Creates terminals on demand.
pub trait TerminalFactory: Send + Sync {
    fn create(&self, name: &str) -> Arc<dyn Terminal>;
}

/// Terminal name for a test label.
pub fn terminal_name(test_name: &str) -> String {
    format!("{}  - {}", DEFAULT_RUNNER_NAME, test_name)
}

/// Hands out terminals, reusing one per name.
pub struct TerminalProvider {
    factory: Arc<dyn TerminalFactory>,
    terminals: Mutex<HashMap<String, Arc<dyn Terminal>>>,
}

impl TerminalProvider {
    pub fn new(factory: Arc<dyn TerminalFactory>) -> Self {
        Self {
            factory,
            terminals: Mutex::new(HashMap::new()),
        }
    }

    /// Terminal for `test_name`, created on first use.
    pub fn get(&self, test_name: &str) -> Arc<dyn Terminal> {
        let name = terminal_name(test_name);
        let mut terminals = self.terminals.lock().unwrap_or_else(PoisonError::into_inner);
        terminals
            .entry(name.clone())
            .or_insert_with(|| {
                tracing::debug!(terminal = %name, "opening terminal");
                self.factory.create(&name)
            })
            .clone()
    }

    /// Forget a terminal so the next request opens a new one.
    pub fn dispose(&self, test_name: &str) -> bool {
        let name = terminal_name(test_name);
        self.terminals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&name)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.terminals.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TerminalProvider {
    fn default() -> Self {
        Self::new(Arc::new(ShellTerminals))
    }
}

/// Runs commands through the platform shell.
#[derive(Debug, Clone)]
pub struct ShellTerminal {
    name: String,
}

impl ShellTerminal {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn command(line: &str) -> Command {
        if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(line);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(line);
            cmd
        }
    }
}

impl Terminal for ShellTerminal {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, request: &RunRequest) -> Result<ExitSignal, RunError> {
        let line = request.command_line();
        tracing::info!(
            terminal = %self.name,
            cwd = %request.working_directory.display(),
            command = %line,
            "running"
        );

        let mut child = Self::command(&line)
            .current_dir(&request.working_directory)
            .envs(&request.env)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| RunError::Spawn {
                command: line.clone(),
                source,
            })?;

        let (tx, rx) = oneshot::channel();
        let name = self.name.clone();
        tokio::spawn(async move {
            let code = match child.wait().await {
                Ok(status) => status.code(),
                Err(e) => {
                    tracing::warn!(terminal = %name, error = %e, "failed to wait for command");
                    None
                }
            };
            tracing::debug!(terminal = %name, ?code, "command exited");
            let _ = tx.send(code);
        });

        Ok(rx)
    }
}

/// Factory for [`ShellTerminal`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellTerminals;

impl TerminalFactory for ShellTerminals {
    fn create(&self, name: &str) -> Arc<dyn Terminal> {
        Arc::new(ShellTerminal::new(name))
    }
}
