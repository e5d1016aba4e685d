use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use serde_json::{json, Map, Value};
use shared::protocol::{GraphQlRequest, GraphQlResponse};
use tracing::debug;
use url::Url;

use super::TransportError;
use crate::session::SessionHandle;

/// Header carrying the session token on every HTTP request.
pub const AUTH_HEADER: &str = "token";

/// A file attached to an upload mutation. `variable_path` names the variable
/// it fills, e.g. `variables.file` or `variables.photos.0`.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub variable_path: String,
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

pub struct HttpLink {
    http: Client,
    endpoint: Url,
    session: SessionHandle,
}

impl HttpLink {
    pub fn new(endpoint: Url, session: SessionHandle) -> Self {
        Self::with_client(Client::new(), endpoint, session)
    }

    pub fn with_client(http: Client, endpoint: Url, session: SessionHandle) -> Self {
        Self {
            http,
            endpoint,
            session,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub async fn execute(&self, request: &GraphQlRequest) -> Result<GraphQlResponse, TransportError> {
        let token = self.session.token().await;
        debug!(
            operation = request.operation_name.as_deref().unwrap_or_default(),
            "http: executing operation"
        );
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(AUTH_HEADER, token)
            .json(request)
            .send()
            .await?;
        read_response(response).await
    }

    /// Sends a GraphQL multipart request: an `operations` part holding the
    /// request with file variables nulled, a `map` part pointing each file
    /// part at its variable, then one part per file.
    pub async fn execute_upload(
        &self,
        request: &GraphQlRequest,
        files: Vec<UploadFile>,
    ) -> Result<GraphQlResponse, TransportError> {
        let mut operations = serde_json::to_value(request)?;
        let mut map = Map::new();
        for (index, file) in files.iter().enumerate() {
            null_variable(&mut operations, &file.variable_path);
            map.insert(index.to_string(), json!([file.variable_path]));
        }

        let mut form = Form::new()
            .text("operations", serde_json::to_string(&operations)?)
            .text("map", serde_json::to_string(&map)?);
        for (index, file) in files.into_iter().enumerate() {
            let mut part = Part::bytes(file.bytes).file_name(file.filename);
            if let Some(mime_type) = file.mime_type {
                part = part.mime_str(&mime_type)?;
            }
            form = form.part(index.to_string(), part);
        }

        let token = self.session.token().await;
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(AUTH_HEADER, token)
            .multipart(form)
            .send()
            .await?;
        read_response(response).await
    }
}

async fn read_response(response: Response) -> Result<GraphQlResponse, TransportError> {
    let status = response.status();
    let body = response.bytes().await?;

    // GraphQL servers report request errors with a 4xx status and a normal
    // error body; prefer that body when it parses.
    match serde_json::from_slice::<GraphQlResponse>(&body) {
        Ok(parsed) if status.is_success() || !parsed.errors.is_empty() => Ok(parsed),
        Err(err) if status.is_success() => Err(err.into()),
        _ => Err(TransportError::Status {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        }),
    }
}

fn null_variable(operations: &mut Value, path: &str) {
    let mut target = operations;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let next = match target {
            Value::Object(object) => object.get_mut(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
            _ => None,
        };
        let Some(next) = next else {
            return;
        };
        if segments.peek().is_none() {
            *next = Value::Null;
            return;
        }
        target = next;
    }
}
