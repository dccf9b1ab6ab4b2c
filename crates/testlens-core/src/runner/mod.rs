//! Building and launching runner invocations.

mod debug;
mod request;
mod terminal;

pub use debug::{attach_debugger, AttachConfig, DebugError, DebugHost, NoDebugHost};
pub use request::{command_path, NameFilter, RequestBuilder, RunOptions};
pub use terminal::{terminal_name, ExitSignal, ShellTerminal, ShellTerminals, Terminal, TerminalFactory, TerminalProvider};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::tree::NodeKind;

/// Scope of a single execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Every test file under a working directory.
    Folder,
    /// One test file.
    File,
    /// One named declaration inside a file.
    Suite,
}

impl RunMode {
    pub fn display_name(&self) -> &'static str {
        match self {
            RunMode::Folder => "folder",
            RunMode::File => "file",
            RunMode::Suite => "suite",
        }
    }
}

impl From<NodeKind> for RunMode {
    /// Folders run whole, suites run their file, tests run by name.
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Folder => RunMode::Folder,
            NodeKind::Suite => RunMode::File,
            NodeKind::Test => RunMode::Suite,
        }
    }
}

impl std::str::FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "folder" => Ok(RunMode::Folder),
            "file" => Ok(RunMode::File),
            "suite" | "test" => Ok(RunMode::Suite),
            other => Err(format!("unknown run mode: {}", other)),
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A concrete runner invocation, built fresh per execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Runner binary followed by its arguments.
    pub command: Vec<String>,
    pub working_directory: PathBuf,
    pub env: BTreeMap<String, String>,
    /// Absolute path the xunit report will be written to.
    pub result_file: Option<PathBuf>,
}

impl RunRequest {
    /// The command as a single shell line.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

/// Errors raised while running tests.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Debug(#[from] DebugError),

    #[error("Failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown test item: {0}")]
    UnknownNode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_mode_from_str() {
        assert_eq!("Folder".parse::<RunMode>().unwrap(), RunMode::Folder);
        assert_eq!("file".parse::<RunMode>().unwrap(), RunMode::File);
        assert_eq!("test".parse::<RunMode>().unwrap(), RunMode::Suite);
        assert!("everything".parse::<RunMode>().is_err());
    }

    #[test]
    fn test_run_mode_for_kind() {
        assert_eq!(RunMode::from(NodeKind::Folder), RunMode::Folder);
        assert_eq!(RunMode::from(NodeKind::Suite), RunMode::File);
        assert_eq!(RunMode::from(NodeKind::Test), RunMode::Suite);
    }

    #[test]
    fn test_command_line() {
        let request = RunRequest {
            command: vec!["./mocha".to_string(), "./a.test.ts".to_string()],
            working_directory: PathBuf::from("/w"),
            env: BTreeMap::new(),
            result_file: None,
        };
        assert_eq!(request.command_line(), "./mocha ./a.test.ts");
    }
}
