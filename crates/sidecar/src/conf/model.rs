//! Model — SidecarConfig and the runtime-backend switch.

use serde::{Deserialize, Serialize};

/// Which container-runtime backend this process watches.
///
/// Exactly one backend is active per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    Docker,
    Containerd,
}

impl RuntimeKind {
    /// Parse the `RUNTIME_TYPE` value. Anything but the two known
    /// backends is rejected by `SidecarConfig::validate`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "docker" => Some(RuntimeKind::Docker),
            "containerd" => Some(RuntimeKind::Containerd),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeKind::Docker => "docker",
            RuntimeKind::Containerd => "containerd",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SidecarConfig {
    /// Selected backend. Required; there is no sensible default.
    pub runtime: Option<RuntimeKind>,
    /// Namespace prefix for log declarations in labels and env vars.
    pub log_prefix: String,
    /// Host-side root under which container log paths are resolved.
    pub base_dir: String,
    /// Docker daemon socket. Empty means the system default.
    pub docker_socket: String,
    /// containerd gRPC socket.
    pub containerd_socket: String,
    /// containerd namespace to list and subscribe in.
    pub containerd_namespace: String,
    /// This node's name, stamped into artifact identity tags.
    pub node_name: String,
    /// Shipper output tag rendered into every artifact.
    pub output: String,
    /// Safe-delete scanner cadence.
    pub scan_interval_secs: u64,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            runtime: None,
            log_prefix: "watchlog".to_string(),
            base_dir: "/host/var/log/pods".to_string(),
            docker_socket: "".to_string(),
            containerd_socket: "/run/containerd/containerd.sock".to_string(),
            containerd_namespace: "k8s.io".to_string(),
            node_name: "".to_string(),
            output: "".to_string(),
            scan_interval_secs: 60,
        }
    }
}
