//! GraphQL transport: an HTTP link for queries and mutations, a socket link
//! for subscriptions, and the split link that routes between them.

pub mod http;
pub mod link;
pub mod socket;

pub use http::{HttpLink, UploadFile, AUTH_HEADER};
pub use link::{route, LinkTarget, SplitLink};
pub use socket::{SocketLink, GRAPHQL_WS_PROTOCOL};

use futures::stream::BoxStream;
use serde::de::DeserializeOwned;
use shared::{error::ApiError, protocol::GraphQlResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("websocket failure: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("graphql protocol violation: {0}")]
    Protocol(String),
    #[error("graphql errors: {}", format_api_errors(.0))]
    GraphQl(Vec<ApiError>),
    #[error("response carried no data")]
    MissingData,
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl TransportError {
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            TransportError::Http(_) | TransportError::Status { .. } | TransportError::Socket(_)
        )
    }
}

fn format_api_errors(errors: &[ApiError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type ResponseStream = BoxStream<'static, Result<GraphQlResponse, TransportError>>;

/// Decodes `data` into `T`. Any GraphQL error fails the operation.
pub fn decode_data<T: DeserializeOwned>(response: GraphQlResponse) -> Result<T, TransportError> {
    if !response.errors.is_empty() {
        return Err(TransportError::GraphQl(
            response.errors.iter().map(ApiError::from).collect(),
        ));
    }
    let data = response.data.ok_or(TransportError::MissingData)?;
    Ok(serde_json::from_value(data)?)
}

#[cfg(test)]
#[path = "../tests/transport_tests.rs"]
mod tests;
