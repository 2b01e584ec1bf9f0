//! Containerd backend — gRPC over the containerd socket.
//!
//! Containerd does not report a JSON log path the way docker does; the
//! pod layout glob is reconstructed from the orchestrator labels. The
//! OCI spec attached to each container carries the process environment.

mod envelope;
mod rpc;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use serde::Deserialize;
use tonic::transport::Channel;

use super::{
    ContainerRecord, ContainerRuntime, RuntimeError, RuntimeEvent, K8S_CONTAINER_NAME,
    K8S_POD_NAME, K8S_POD_NAMESPACE,
};

const EVENT_CONTAINER_CREATE: &str = "containerd.events.ContainerCreate";
const EVENT_CONTAINER_DELETE: &str = "containerd.events.ContainerDelete";

/// The slice of the OCI runtime spec the sidecar reads.
#[derive(Debug, Default, Deserialize)]
struct OciSpec {
    #[serde(default)]
    process: OciProcess,
}

#[derive(Debug, Default, Deserialize)]
struct OciProcess {
    #[serde(default)]
    env: Vec<String>,
}

#[derive(Clone)]
pub struct ContainerdRuntime {
    channel: Channel,
    namespace: String,
}

impl ContainerdRuntime {
    pub async fn connect(socket_path: &str, namespace: &str) -> Result<Self, RuntimeError> {
        let channel = rpc::connect(socket_path).await?;
        Ok(Self {
            channel,
            namespace: namespace.to_string(),
        })
    }

    fn record_from(&self, container: rpc::Container) -> Result<ContainerRecord, RuntimeError> {
        let env = match &container.spec {
            Some(any) if !any.value.is_empty() => {
                let spec: OciSpec = serde_json::from_slice(&any.value)?;
                spec.process.env
            }
            _ => Vec::new(),
        };
        let log_path = pod_log_glob(&self.namespace, &container.labels);
        Ok(ContainerRecord {
            id: container.id,
            state: String::new(),
            labels: container.labels,
            env,
            log_path,
        })
    }
}

/// Stdout log glob in the kubelet pod-log layout, relative to the
/// configured base dir. Empty when the container carries no pod labels
/// (not orchestrator-managed, nothing to collect).
fn pod_log_glob(namespace: &str, labels: &std::collections::HashMap<String, String>) -> String {
    let pod = labels.get(K8S_POD_NAME).map(String::as_str).unwrap_or("");
    let pod_namespace = labels
        .get(K8S_POD_NAMESPACE)
        .map(String::as_str)
        .unwrap_or(namespace);
    let container = labels
        .get(K8S_CONTAINER_NAME)
        .map(String::as_str)
        .unwrap_or("");
    if pod.is_empty() || container.is_empty() {
        return String::new();
    }
    format!("{}_{}_*/{}/*.log", pod_namespace, pod, container)
}

fn map_envelope(envelope: &rpc::Envelope) -> Option<RuntimeEvent> {
    let any = envelope.event.as_ref()?;
    let id = envelope::container_id(&any.value)?;
    if any.type_url.ends_with(EVENT_CONTAINER_CREATE) {
        Some(RuntimeEvent::Created(id))
    } else if any.type_url.ends_with(EVENT_CONTAINER_DELETE) {
        Some(RuntimeEvent::Destroyed(id))
    } else {
        None
    }
}

impl ContainerRuntime for ContainerdRuntime {
    fn list_containers(&self) -> BoxFuture<'_, Result<Vec<ContainerRecord>, RuntimeError>> {
        Box::pin(async move {
            let mut client = rpc::ContainersClient::new(self.channel.clone(), &self.namespace);
            let response = client
                .list(rpc::ListContainersRequest { filters: vec![] })
                .await?;
            response
                .containers
                .into_iter()
                .map(|container| self.record_from(container))
                .collect()
        })
    }

    fn inspect<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<ContainerRecord, RuntimeError>> {
        Box::pin(async move {
            let mut client = rpc::ContainersClient::new(self.channel.clone(), &self.namespace);
            let response = client
                .get(rpc::GetContainerRequest { id: id.to_string() })
                .await?;
            let container = response
                .container
                .ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;
            self.record_from(container)
        })
    }

    fn subscribe(&self) -> BoxStream<'static, Result<RuntimeEvent, RuntimeError>> {
        let channel = self.channel.clone();
        let namespace = self.namespace.clone();
        Box::pin(async_stream::stream! {
            let mut client = rpc::EventsClient::new(channel, &namespace);
            let mut events = match client
                .subscribe(rpc::SubscribeRequest {
                    filters: vec![
                        format!("topic~=\"/containers/create\",namespace=={}", namespace),
                        format!("topic~=\"/containers/delete\",namespace=={}", namespace),
                    ],
                })
                .await
            {
                Ok(stream) => stream,
                Err(status) => {
                    yield Err(RuntimeError::Grpc(status));
                    return;
                }
            };

            loop {
                match events.message().await {
                    Ok(Some(envelope)) => {
                        if let Some(event) = map_envelope(&envelope) {
                            yield Ok(event);
                        }
                    }
                    // clean end of stream
                    Ok(None) => return,
                    Err(status) => {
                        yield Err(RuntimeError::Grpc(status));
                        return;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn envelope(type_url: &str, id: &str) -> rpc::Envelope {
        let mut value = vec![b'\n', id.len() as u8];
        value.extend_from_slice(id.as_bytes());
        rpc::Envelope {
            timestamp: None,
            namespace: "k8s.io".to_string(),
            topic: "/containers/create".to_string(),
            event: Some(prost_types::Any {
                type_url: format!("types.containerd.io/{}", type_url),
                value,
            }),
        }
    }

    #[test]
    fn test_create_envelope_maps_to_created() {
        let event = map_envelope(&envelope(EVENT_CONTAINER_CREATE, "abc123"));
        assert_eq!(event, Some(RuntimeEvent::Created("abc123".to_string())));
    }

    #[test]
    fn test_delete_envelope_maps_to_destroyed() {
        let event = map_envelope(&envelope(EVENT_CONTAINER_DELETE, "abc123"));
        assert_eq!(event, Some(RuntimeEvent::Destroyed("abc123".to_string())));
    }

    #[test]
    fn test_unknown_topic_ignored() {
        let event = map_envelope(&envelope("containerd.events.TaskExit", "abc123"));
        assert_eq!(event, None);
    }

    #[test]
    fn test_pod_log_glob_from_labels() {
        let labels = HashMap::from([
            (K8S_POD_NAME.to_string(), "web-1".to_string()),
            (K8S_POD_NAMESPACE.to_string(), "prod".to_string()),
            (K8S_CONTAINER_NAME.to_string(), "web".to_string()),
        ]);
        assert_eq!(pod_log_glob("k8s.io", &labels), "prod_web-1_*/web/*.log");
    }

    #[test]
    fn test_pod_log_glob_empty_without_pod_labels() {
        assert_eq!(pod_log_glob("k8s.io", &HashMap::new()), "");
    }
}
