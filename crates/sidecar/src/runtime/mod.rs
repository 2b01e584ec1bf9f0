//! Runtime domain — the capability contract over container runtimes.
//!
//! The engine consumes exactly three capabilities: list the current
//! containers, inspect one by id, and subscribe to lifecycle events.
//! Each backend lives in its own module and differs only in metadata
//! extraction.

pub mod containerd;
pub mod docker;

use std::collections::{BTreeMap, HashMap};

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use thiserror::Error;

pub const K8S_POD_NAME: &str = "io.kubernetes.pod.name";
pub const K8S_POD_NAMESPACE: &str = "io.kubernetes.pod.namespace";
pub const K8S_CONTAINER_NAME: &str = "io.kubernetes.container.name";

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("runtime connection failed: {0}")]
    ConnectionFailed(String),
    #[error("container not found: {0}")]
    NotFound(String),
    #[error("docker api error: {0}")]
    Docker(#[from] bollard::errors::Error),
    #[error("containerd api error: {0}")]
    Grpc(#[from] tonic::Status),
    #[error("container spec decode failed: {0}")]
    SpecDecode(#[from] serde_json::Error),
}

/// A container lifecycle transition, carrying only the container id.
/// Metadata is fetched on demand through `inspect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    Created(String),
    Started(String),
    Restarted(String),
    Destroyed(String),
}

impl RuntimeEvent {
    pub fn container_id(&self) -> &str {
        match self {
            RuntimeEvent::Created(id)
            | RuntimeEvent::Started(id)
            | RuntimeEvent::Restarted(id)
            | RuntimeEvent::Destroyed(id) => id,
        }
    }
}

/// Runtime-agnostic view of one container. Reconstructed per event or
/// scan pass; never persisted.
#[derive(Debug, Clone, Default)]
pub struct ContainerRecord {
    pub id: String,
    /// Runtime-reported state string ("running", "removing", ...).
    /// Empty when the backend does not report one.
    pub state: String,
    pub labels: HashMap<String, String>,
    /// Raw `NAME=VALUE` environment assignments.
    pub env: Vec<String>,
    /// Log path input, relative to the configured base dir: the
    /// runtime-reported JSON log path (docker) or a pod-layout glob
    /// built from the orchestrator labels (containerd).
    pub log_path: String,
}

impl ContainerRecord {
    /// Identity tags stamped into the artifact alongside the compiled
    /// specs. Empty values are omitted.
    pub fn identity_tags(&self, node_name: &str) -> BTreeMap<String, String> {
        let mut tags = BTreeMap::new();
        put_if_not_empty(&mut tags, "k8s_pod", self.labels.get(K8S_POD_NAME));
        put_if_not_empty(&mut tags, "k8s_pod_namespace", self.labels.get(K8S_POD_NAMESPACE));
        put_if_not_empty(&mut tags, "k8s_container_name", self.labels.get(K8S_CONTAINER_NAME));
        if !node_name.is_empty() {
            tags.insert("k8s_node_name".to_string(), node_name.to_string());
        }
        tags
    }
}

fn put_if_not_empty(tags: &mut BTreeMap<String, String>, key: &str, value: Option<&String>) {
    if let Some(value) = value {
        if !value.is_empty() {
            tags.insert(key.to_string(), value.clone());
        }
    }
}

/// The capability contract both backends implement. Object-safe so the
/// engine can hold `Arc<dyn ContainerRuntime>` and tests can stub it.
pub trait ContainerRuntime: Send + Sync {
    /// Current containers. Backends may return partial records here;
    /// the engine always inspects before compiling.
    fn list_containers(&self) -> BoxFuture<'_, Result<Vec<ContainerRecord>, RuntimeError>>;

    /// Full record for one container id.
    fn inspect<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<ContainerRecord, RuntimeError>>;

    /// One subscription attempt. The stream ends on a clean
    /// end-of-stream; transport errors are yielded as items so the
    /// engine can decide to resubscribe.
    fn subscribe(&self) -> BoxStream<'static, Result<RuntimeEvent, RuntimeError>>;
}
