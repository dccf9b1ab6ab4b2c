//! Debugger attach handshake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};

/// Errors raised while attaching a debugger.
#[derive(Debug, Error)]
pub enum DebugError {
    #[error("Debugger did not attach to '{name}' within {timeout_ms}ms")]
    AttachTimeout { name: String, timeout_ms: u64 },

    #[error("Debug host refused to start '{name}'")]
    StartFailure { name: String },
}

/// Attach configuration handed to the debug host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub request: String,
    pub continue_on_attach: bool,
    pub auto_attach_child_processes: bool,
    pub resolve_source_map_locations: Vec<String>,
    pub skip_files: Vec<String>,
}

impl AttachConfig {
    /// Attach to a node inspector for `test_name`.
    pub fn for_test(test_name: &str) -> Self {
        Self {
            name: format!("Debug {}", test_name),
            kind: "node".to_string(),
            request: "attach".to_string(),
            continue_on_attach: true,
            auto_attach_child_processes: false,
            resolve_source_map_locations: vec!["!**/node_modules/**".to_string()],
            skip_files: vec!["<node_internals>/**".to_string()],
        }
    }
}

/// Something that can start debug sessions.
#[async_trait]
pub trait DebugHost: Send + Sync {
    /// Names of sessions as they start.
    fn sessions(&self) -> broadcast::Receiver<String>;

    /// Ask the host to start a session. `false` when it refuses.
    async fn start_debugging(&self, root: &Path, config: &AttachConfig) -> bool;
}

/// A host with no debugger behind it; every start is refused.
#[derive(Debug)]
pub struct NoDebugHost {
    sessions: broadcast::Sender<String>,
}

impl NoDebugHost {
    pub fn new() -> Self {
        let (sessions, _) = broadcast::channel(1);
        Self { sessions }
    }
}

impl Default for NoDebugHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DebugHost for NoDebugHost {
    fn sessions(&self) -> broadcast::Receiver<String> {
        self.sessions.subscribe()
    }

    async fn start_debugging(&self, _root: &Path, config: &AttachConfig) -> bool {
        tracing::warn!(session = %config.name, "no debug host available");
        false
    }
}

/// Start an attach session for `test_name` and wait for it to begin.
///
/// Returns the session name once the host reports it.
pub async fn attach_debugger(
    host: &dyn DebugHost,
    root: &Path,
    test_name: &str,
    timeout: Duration,
) -> Result<String, DebugError> {
    let config = AttachConfig::for_test(test_name);
    // Subscribe first so a fast start is not missed
    let mut sessions = host.sessions();

    if !host.start_debugging(root, &config).await {
        return Err(DebugError::StartFailure { name: config.name });
    }

    let wanted = config.name.clone();
    let wait = async move {
        loop {
            match sessions.recv().await {
                Ok(name) if name == wanted => return Some(name),
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    };

    match tokio::time::timeout(timeout, wait).await {
        Ok(Some(name)) => {
            tracing::info!(session = %name, "debugger attached");
            Ok(name)
        }
        Ok(None) | Err(_) => Err(DebugError::AttachTimeout {
            name: config.name,
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ImmediateHost {
        sessions: broadcast::Sender<String>,
        announce: Option<String>,
    }

    impl ImmediateHost {
        fn new(announce: Option<&str>) -> Self {
            let (sessions, _) = broadcast::channel(4);
            Self {
                sessions,
                announce: announce.map(String::from),
            }
        }
    }

    #[async_trait]
    impl DebugHost for ImmediateHost {
        fn sessions(&self) -> broadcast::Receiver<String> {
            self.sessions.subscribe()
        }

        async fn start_debugging(&self, _root: &Path, _config: &AttachConfig) -> bool {
            let _ = self.sessions.send("Debug something else".to_string());
            if let Some(name) = &self.announce {
                let _ = self.sessions.send(name.clone());
            }
            true
        }
    }

    #[test]
    fn test_attach_config_serializes_camel_case() {
        let json = serde_json::to_value(AttachConfig::for_test("adds")).unwrap();
        assert_eq!(json["name"], "Debug adds");
        assert_eq!(json["type"], "node");
        assert_eq!(json["continueOnAttach"], true);
        assert_eq!(json["skipFiles"][0], "<node_internals>/**");
    }

    #[tokio::test]
    async fn test_attach_waits_for_matching_session() {
        let host = ImmediateHost::new(Some("Debug adds"));
        let name = attach_debugger(&host, Path::new("/w"), "adds", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(name, "Debug adds");
    }

    #[tokio::test]
    async fn test_attach_times_out() {
        let host = ImmediateHost::new(None);
        let err = attach_debugger(&host, Path::new("/w"), "adds", Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, DebugError::AttachTimeout { timeout_ms: 20, .. }));
    }

    #[tokio::test]
    async fn test_no_host_refuses() {
        let err = attach_debugger(&NoDebugHost::new(), Path::new("/w"), "adds", Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, DebugError::StartFailure { .. }));
    }
}
