pub mod config;
pub mod controller;
pub mod discovery;
pub mod document;
pub mod report;
pub mod resolver;
pub mod runner;
pub mod scanner;
pub mod session;
pub mod tree;
pub mod workspace;

pub use config::{Config, ConfigError, TestRootConfig};
pub use controller::TestController;
pub use discovery::{DiscoveryError, DiscoveryStats};
pub use document::{DocumentSource, FsDocuments, Position, Range, TextDocument};
pub use report::{FileWatcher, PollingWatcher, Report, ReportError};
pub use runner::{RequestBuilder, RunError, RunMode, RunOptions, RunRequest};
pub use scanner::{Location, ScanError, Scanner, TestDeclaration};
pub use session::{TestRun, TestState};
pub use tree::{NodeKind, TestTree, TreeNode};
pub use workspace::Workspace;
