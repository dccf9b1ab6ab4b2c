//! Run request construction.
//!
//! Produces command lines of the form
//!
//! ```text
//! <runner> [--grep '"<regex>"' | --fgrep '"<substring>"'] [--inspect] [<extra-args>]
//!          [--reporter xunit --reporter-option output=<path>] <target>
//! ```
//!
//! The `'"…"'` quoting survives one shell pass and the runner's own argument
//! parser strips the inner double quotes.

use std::path::Path;
use uuid::Uuid;

use super::{RunMode, RunRequest};
use crate::config::{DEBUG_FLAG, RESULT_FILE_PREFIX};
use crate::resolver::normalize_separators;
use crate::scanner::{name_pattern, WILDCARD};
use crate::workspace::Workspace;

/// Per-execution switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Append the inspector flag.
    pub debug: bool,
    /// Reserve a result file and ask for an xunit report.
    pub track_results: bool,
}

/// Test name filter passed to the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameFilter {
    /// Regular expression filter.
    Grep(String),
    /// Literal substring filter.
    Fgrep(String),
}

impl NameFilter {
    /// Choose a filter for a declaration name.
    ///
    /// Names with a quote use a substring filter on the shell-escaped name;
    /// everything else is an unanchored regex of the name with its wildcards
    /// kept. Quoted names that also carry a wildcard stay regex with quotes
    /// widened to `.`.
    pub fn for_name(name: &str) -> Self {
        let has_quote = name.contains(['\'', '"']);
        if has_quote && !name.contains(WILDCARD) {
            NameFilter::Fgrep(name.replace('\'', r"'\''"))
        } else if has_quote {
            NameFilter::Grep(name.replace(['\'', '"'], "."))
        } else {
            NameFilter::Grep(name_pattern(name))
        }
    }

    pub fn flag(&self) -> &'static str {
        match self {
            NameFilter::Grep(_) => "--grep",
            NameFilter::Fgrep(_) => "--fgrep",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            NameFilter::Grep(v) | NameFilter::Fgrep(v) => v,
        }
    }

    /// Flag and quoted value, ready for the command line.
    pub fn to_args(&self) -> [String; 2] {
        [self.flag().to_string(), format!("'\"{}\"'", self.value())]
    }
}

/// `target` relative to `cwd`, marked as an explicit path.
///
/// Paths already starting with `./`, `../` or absolute are left alone.
pub fn command_path(cwd: &Path, target: &Path) -> String {
    let relative = pathdiff::diff_paths(target, cwd).unwrap_or_else(|| target.to_path_buf());
    let text = normalize_separators(&relative.to_string_lossy());
    if text.starts_with("./") || text.starts_with("../") || relative.is_absolute() || text.starts_with('/') {
        text
    } else {
        format!("./{}", text)
    }
}

/// Builds [`RunRequest`]s for a workspace.
#[derive(Debug, Clone, Copy)]
pub struct RequestBuilder<'a> {
    workspace: &'a Workspace,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(workspace: &'a Workspace) -> Self {
        Self { workspace }
    }

    /// Build the invocation for `path` (a file, or a folder in folder mode).
    pub fn build(&self, path: &Path, test_name: &str, mode: RunMode, options: RunOptions) -> RunRequest {
        let config = self.workspace.config();
        let root = self.workspace.root();
        let (matching, cwd) = match mode {
            RunMode::Folder => (
                self.workspace.folder_root(path),
                self.workspace.folder_working_directory(path),
            ),
            RunMode::File | RunMode::Suite => (
                self.workspace.matching_root(path),
                self.workspace.working_directory(path),
            ),
        };

        let mut command = vec![command_path(&cwd, &root.join(&config.runner_path))];

        if mode == RunMode::Suite {
            command.extend(NameFilter::for_name(test_name).to_args());
        }

        if options.debug {
            command.push(DEBUG_FLAG.to_string());
        }

        // A matched root replaces the defaults, even with an empty string
        let extra = matching
            .map(|r| r.additional_arguments.as_str())
            .unwrap_or(config.default_arguments.as_str())
            .trim();
        if !extra.is_empty() {
            command.push(extra.to_string());
        }

        let result_file = options.track_results.then(|| {
            let file = cwd.join(format!("{}{}.xml", RESULT_FILE_PREFIX, Uuid::new_v4()));
            command.extend([
                "--reporter".to_string(),
                "xunit".to_string(),
                "--reporter-option".to_string(),
                format!("output={}", command_path(&cwd, &file)),
            ]);
            file
        });

        match mode {
            RunMode::Folder => command.push(config.extension_globs().join(",")),
            RunMode::File | RunMode::Suite => command.push(command_path(&cwd, path)),
        }

        let request = RunRequest {
            command,
            working_directory: cwd,
            env: matching.and_then(|r| r.env.clone()).unwrap_or_default(),
            result_file,
        };
        tracing::debug!(
            command = %request.command_line(),
            cwd = %request.working_directory.display(),
            "built run request"
        );
        request
    }
}
