use futures::{stream, StreamExt};
use shared::{
    domain::OperationKind,
    protocol::{GraphQlRequest, GraphQlResponse},
};
use tracing::warn;

use super::{HttpLink, ResponseStream, SocketLink, TransportError, UploadFile};
use crate::{documents::main_operation_kind, session::SessionHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTarget {
    Socket,
    Http,
}

/// Subscriptions go over the socket; everything else over HTTP.
pub fn route(request: &GraphQlRequest) -> LinkTarget {
    match main_operation_kind(&request.query) {
        Some(OperationKind::Subscription) => LinkTarget::Socket,
        _ => LinkTarget::Http,
    }
}

pub struct SplitLink {
    http: HttpLink,
    socket: SocketLink,
}

impl SplitLink {
    pub fn new(http: HttpLink, socket: SocketLink) -> Self {
        Self { http, socket }
    }

    pub fn from_endpoints(http_url: url::Url, ws_url: url::Url, session: SessionHandle) -> Self {
        Self::new(
            HttpLink::new(http_url, session.clone()),
            SocketLink::new(ws_url, session),
        )
    }

    /// Runs an operation to its first result.
    pub async fn execute(&self, request: GraphQlRequest) -> Result<GraphQlResponse, TransportError> {
        let result = match route(&request) {
            LinkTarget::Http => self.http.execute(&request).await,
            LinkTarget::Socket => match self.socket.subscribe(request.clone()).await {
                Ok(mut responses) => responses
                    .next()
                    .await
                    .unwrap_or_else(|| Err(TransportError::MissingData)),
                Err(err) => Err(err),
            },
        };
        log_errors(&request, &result);
        result
    }

    pub async fn execute_upload(
        &self,
        request: GraphQlRequest,
        files: Vec<UploadFile>,
    ) -> Result<GraphQlResponse, TransportError> {
        let result = self.http.execute_upload(&request, files).await;
        log_errors(&request, &result);
        result
    }

    /// Opens a result stream; non-subscription operations yield one item.
    pub async fn subscribe(&self, request: GraphQlRequest) -> Result<ResponseStream, TransportError> {
        match route(&request) {
            LinkTarget::Socket => {
                let responses = self.socket.subscribe(request.clone()).await;
                if let Err(err) = &responses {
                    warn!(operation = operation_name(&request), error = %err, "Network Error");
                }
                Ok(responses?
                    .inspect(move |result| log_errors(&request, result))
                    .boxed())
            }
            LinkTarget::Http => {
                let result = self.execute(request).await;
                Ok(stream::once(async move { result }).boxed())
            }
        }
    }
}

fn operation_name(request: &GraphQlRequest) -> &str {
    request.operation_name.as_deref().unwrap_or("anonymous")
}

/// Logs GraphQL and network errors before they reach the caller.
fn log_errors(request: &GraphQlRequest, result: &Result<GraphQlResponse, TransportError>) {
    match result {
        Ok(response) if !response.errors.is_empty() => {
            let messages: Vec<&str> = response
                .errors
                .iter()
                .map(|error| error.message.as_str())
                .collect();
            warn!(operation = operation_name(request), errors = ?messages, "GraphQL Error");
        }
        Err(err) if err.is_network() => {
            warn!(operation = operation_name(request), error = %err, "Network Error");
        }
        Err(TransportError::GraphQl(errors)) => {
            warn!(operation = operation_name(request), errors = ?errors, "GraphQL Error");
        }
        _ => {}
    }
}
