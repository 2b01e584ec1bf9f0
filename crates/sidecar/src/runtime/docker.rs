//! Docker backend — bollard client behind the capability contract.

use std::collections::HashMap;

use bollard::models::EventMessage;
use bollard::query_parameters::{EventsOptionsBuilder, ListContainersOptions};
use bollard::Docker;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;

use super::{ContainerRecord, ContainerRuntime, RuntimeError, RuntimeEvent};

#[derive(Debug, Clone)]
pub struct DockerRuntime {
    client: Docker,
}

impl DockerRuntime {
    pub fn new(socket_path: &str) -> Result<Self, RuntimeError> {
        let client = if socket_path.is_empty() {
            Docker::connect_with_defaults()
                .map_err(|e| RuntimeError::ConnectionFailed(e.to_string()))?
        } else {
            let clean_path = socket_path.trim_start_matches("unix://");
            Docker::connect_with_socket(clean_path, 120, &bollard::API_DEFAULT_VERSION)
                .map_err(|e| RuntimeError::ConnectionFailed(e.to_string()))?
        };
        Ok(Self { client })
    }
}

/// Map a docker engine event onto the runtime event set. `create` is
/// not consumed: the container has no log path until it starts.
pub(crate) fn map_event(message: &EventMessage) -> Option<RuntimeEvent> {
    let id = message.actor.as_ref()?.id.clone()?;
    match message.action.as_deref()? {
        "start" => Some(RuntimeEvent::Started(id)),
        "restart" => Some(RuntimeEvent::Restarted(id)),
        "destroy" | "die" => Some(RuntimeEvent::Destroyed(id)),
        _ => None,
    }
}

impl ContainerRuntime for DockerRuntime {
    fn list_containers(&self) -> BoxFuture<'_, Result<Vec<ContainerRecord>, RuntimeError>> {
        Box::pin(async move {
            let options = Some(ListContainersOptions::default());
            let containers = self.client.list_containers(options).await?;
            Ok(containers
                .into_iter()
                .map(|summary| ContainerRecord {
                    id: summary.id.unwrap_or_default(),
                    state: summary
                        .state
                        .map(|s| s.to_string())
                        .unwrap_or_default(),
                    labels: summary.labels.unwrap_or_default(),
                    // env and log path come from inspect
                    env: Vec::new(),
                    log_path: String::new(),
                })
                .collect())
        })
    }

    fn inspect<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<ContainerRecord, RuntimeError>> {
        Box::pin(async move {
            let details = self.client.inspect_container(id, None).await.map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                } => RuntimeError::NotFound(id.to_string()),
                other => RuntimeError::Docker(other),
            })?;

            let config = details.config.unwrap_or_default();
            Ok(ContainerRecord {
                id: details.id.unwrap_or_else(|| id.to_string()),
                state: details
                    .state
                    .and_then(|s| s.status)
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
                labels: config.labels.unwrap_or_default(),
                env: config.env.unwrap_or_default(),
                log_path: details.log_path.unwrap_or_default(),
            })
        })
    }

    fn subscribe(&self) -> BoxStream<'static, Result<RuntimeEvent, RuntimeError>> {
        let client = self.client.clone();
        Box::pin(async_stream::stream! {
            let mut filters = HashMap::new();
            filters.insert("type", vec!["container"]);
            let options = EventsOptionsBuilder::default().filters(&filters).build();

            let events = client.events(Some(options));
            futures_util::pin_mut!(events);
            while let Some(item) = events.next().await {
                match item {
                    Ok(message) => {
                        if let Some(event) = map_event(&message) {
                            yield Ok(event);
                        }
                    }
                    Err(e) => yield Err(RuntimeError::Docker(e)),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::EventActor;

    fn message(action: &str, id: Option<&str>) -> EventMessage {
        EventMessage {
            action: Some(action.to_string()),
            actor: id.map(|id| EventActor {
                id: Some(id.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_start_and_restart_map() {
        assert_eq!(
            map_event(&message("start", Some("abc"))),
            Some(RuntimeEvent::Started("abc".to_string()))
        );
        assert_eq!(
            map_event(&message("restart", Some("abc"))),
            Some(RuntimeEvent::Restarted("abc".to_string()))
        );
    }

    #[test]
    fn test_destroy_and_die_both_map_to_destroyed() {
        for action in ["destroy", "die"] {
            assert_eq!(
                map_event(&message(action, Some("abc"))),
                Some(RuntimeEvent::Destroyed("abc".to_string()))
            );
        }
    }

    #[test]
    fn test_other_actions_ignored() {
        for action in ["create", "pause", "attach", "exec_start"] {
            assert_eq!(map_event(&message(action, Some("abc"))), None);
        }
    }

    #[test]
    fn test_event_without_actor_ignored() {
        assert_eq!(map_event(&message("start", None)), None);
    }
}
