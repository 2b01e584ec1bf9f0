//! Hand-declared containerd API surface — just the messages and
//! methods the sidecar consumes.
//!
//! Messages declare only the fields we read; prost skips unknown tags
//! on decode, so these stay compatible with the full containerd
//! protos. Calls go through `tonic::client::Grpc` directly instead of
//! generated service clients.

use std::collections::HashMap;
use std::path::Path;

use tonic::client::Grpc;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint, Uri};
use tonic::Request;
use tonic_prost::ProstCodec;

use super::super::RuntimeError;

const NAMESPACE_HEADER: &str = "containerd-namespace";

#[derive(Clone, PartialEq, prost::Message)]
pub struct ListContainersRequest {
    #[prost(string, repeated, tag = "1")]
    pub filters: Vec<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ListContainersResponse {
    #[prost(message, repeated, tag = "1")]
    pub containers: Vec<Container>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Container {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(map = "string, string", tag = "2")]
    pub labels: HashMap<String, String>,
    /// OCI runtime spec, JSON-encoded inside the Any.
    #[prost(message, optional, tag = "5")]
    pub spec: Option<prost_types::Any>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetContainerRequest {
    #[prost(string, tag = "1")]
    pub id: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetContainerResponse {
    #[prost(message, optional, tag = "1")]
    pub container: Option<Container>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SubscribeRequest {
    #[prost(string, repeated, tag = "1")]
    pub filters: Vec<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Envelope {
    #[prost(message, optional, tag = "1")]
    pub timestamp: Option<prost_types::Timestamp>,
    #[prost(string, tag = "2")]
    pub namespace: String,
    #[prost(string, tag = "3")]
    pub topic: String,
    #[prost(message, optional, tag = "4")]
    pub event: Option<prost_types::Any>,
}

/// Connect over the containerd unix socket. The URI is a placeholder;
/// every connection goes through the socket connector.
pub async fn connect(socket_path: &str) -> Result<Channel, RuntimeError> {
    let path = Path::new(socket_path).to_path_buf();
    Endpoint::try_from("http://[::1]:50051")
        .map_err(|e| RuntimeError::ConnectionFailed(e.to_string()))?
        .connect_with_connector(tower::service_fn(move |_: Uri| {
            let path = path.clone();
            async move {
                let stream = tokio::net::UnixStream::connect(path).await?;
                Ok::<_, std::io::Error>(hyper_util::rt::TokioIo::new(stream))
            }
        }))
        .await
        .map_err(|e| RuntimeError::ConnectionFailed(e.to_string()))
}

fn with_namespace<T>(message: T, namespace: &str) -> Result<Request<T>, tonic::Status> {
    let mut request = Request::new(message);
    let value = namespace
        .parse()
        .map_err(|_| tonic::Status::invalid_argument("invalid containerd namespace"))?;
    request.metadata_mut().insert(NAMESPACE_HEADER, value);
    Ok(request)
}

pub struct ContainersClient {
    inner: Grpc<Channel>,
    namespace: String,
}

impl ContainersClient {
    pub fn new(channel: Channel, namespace: &str) -> Self {
        Self {
            inner: Grpc::new(channel),
            namespace: namespace.to_string(),
        }
    }

    pub async fn list(
        &mut self,
        request: ListContainersRequest,
    ) -> Result<ListContainersResponse, tonic::Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| tonic::Status::unavailable(e.to_string()))?;
        let codec = ProstCodec::<ListContainersRequest, ListContainersResponse>::default();
        let path = PathAndQuery::from_static("/containerd.services.containers.v1.Containers/List");
        let response = self
            .inner
            .unary(with_namespace(request, &self.namespace)?, path, codec)
            .await?;
        Ok(response.into_inner())
    }

    pub async fn get(
        &mut self,
        request: GetContainerRequest,
    ) -> Result<GetContainerResponse, tonic::Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| tonic::Status::unavailable(e.to_string()))?;
        let codec = ProstCodec::<GetContainerRequest, GetContainerResponse>::default();
        let path = PathAndQuery::from_static("/containerd.services.containers.v1.Containers/Get");
        let response = self
            .inner
            .unary(with_namespace(request, &self.namespace)?, path, codec)
            .await?;
        Ok(response.into_inner())
    }
}

pub struct EventsClient {
    inner: Grpc<Channel>,
    namespace: String,
}

impl EventsClient {
    pub fn new(channel: Channel, namespace: &str) -> Self {
        Self {
            inner: Grpc::new(channel),
            namespace: namespace.to_string(),
        }
    }

    pub async fn subscribe(
        &mut self,
        request: SubscribeRequest,
    ) -> Result<tonic::Streaming<Envelope>, tonic::Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| tonic::Status::unavailable(e.to_string()))?;
        let codec = ProstCodec::<SubscribeRequest, Envelope>::default();
        let path = PathAndQuery::from_static("/containerd.services.events.v1.Events/Subscribe");
        let response = self
            .inner
            .server_streaming(with_namespace(request, &self.namespace)?, path, codec)
            .await?;
        Ok(response.into_inner())
    }
}
