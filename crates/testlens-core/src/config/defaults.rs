//! Default values for testlens configuration.
//!
//! All hardcoded defaults are centralized here for easy maintenance.

// ============================================================================
// Runner Defaults
// ============================================================================

/// Arguments passed to the runner when no test root matches a file.
pub const DEFAULT_ARGUMENTS: &str = "--require ts-node/register";

/// Runner binary, relative to the workspace root.
pub const DEFAULT_RUNNER_PATH: &str = "node_modules/.bin/mocha";

/// Name used for terminals and debug sessions.
pub const DEFAULT_RUNNER_NAME: &str = "Mocha";

/// Flag appended to the runner command in debug mode.
pub const DEBUG_FLAG: &str = "--inspect";

/// How long to wait for the debugger to attach (milliseconds).
pub const DEFAULT_DEBUG_TIMEOUT_MS: u64 = 10_000;

/// Whether runs started from the tree write an xunit report and track it.
pub const DEFAULT_TRACK_RESULTS_INLINE: bool = true;

/// Result-file poll interval (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Prefix of reserved result files, followed by a v4 uuid and `.xml`.
pub const RESULT_FILE_PREFIX: &str = "test-results-";

// ============================================================================
// Discovery Defaults
// ============================================================================

/// File name suffixes that mark a test file.
pub const DEFAULT_TEST_EXTENSIONS: &[&str] = &[".test.ts"];

/// Dependency directories never searched for tests.
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &["node_modules"];

/// Whether to infer the working directory from the nearest project descriptor.
pub const DEFAULT_USE_PROJECT_DESCRIPTOR: bool = true;

/// Project descriptor marking a natural working directory.
pub const DEFAULT_PROJECT_DESCRIPTOR: &str = "tsconfig.json";

/// Id of the placeholder node shown while discovery runs.
pub const SEARCHING_NODE_ID: &str = "testlens-searching";

/// Label of the placeholder node shown while discovery runs.
pub const SEARCHING_NODE_LABEL: &str = "Searching for tests...";

/// Label of the folder node for the workspace root itself.
pub const ROOT_FOLDER_LABEL: &str = "<root>";

// ============================================================================
// Config File Locations
// ============================================================================

/// Project-local config file name.
pub const PROJECT_CONFIG_FILE: &str = "testlens.toml";

/// Directory under the user config dir.
pub const USER_CONFIG_DIR: &str = "testlens";

/// File name inside the user config dir.
pub const USER_CONFIG_FILE: &str = "config.toml";
