use futures::{SinkExt, StreamExt};
use serde_json::json;
use shared::{
    error::ApiError,
    protocol::{GraphQlRequest, SocketClientMessage, SocketServerMessage},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use super::{ResponseStream, TransportError};
use crate::session::SessionHandle;

pub const GRAPHQL_WS_PROTOCOL: &str = "graphql-transport-ws";

const SUBSCRIPTION_BUFFER: usize = 64;

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Persistent-socket link speaking graphql-transport-ws. Each subscription
/// opens its own connection; the session token travels in the
/// `connection_init` payload.
pub struct SocketLink {
    endpoint: Url,
    session: SessionHandle,
}

impl SocketLink {
    pub fn new(endpoint: Url, session: SessionHandle) -> Self {
        Self { endpoint, session }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub async fn subscribe(&self, request: GraphQlRequest) -> Result<ResponseStream, TransportError> {
        let mut socket = self.connect().await?;

        let id = Uuid::new_v4().to_string();
        send_frame(
            &mut socket,
            &SocketClientMessage::Subscribe {
                id: id.clone(),
                payload: request,
            },
        )
        .await?;
        debug!(subscription_id = %id, endpoint = %self.endpoint, "socket: subscribed");

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        tokio::spawn(pump_subscription(socket, id, tx));
        Ok(ReceiverStream::new(rx).boxed())
    }

    async fn connect(&self) -> Result<Socket, TransportError> {
        let mut ws_request = self.endpoint.as_str().into_client_request()?;
        ws_request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static(GRAPHQL_WS_PROTOCOL),
        );
        let (mut socket, _) = connect_async(ws_request).await?;

        let token = self.session.token().await;
        send_frame(
            &mut socket,
            &SocketClientMessage::ConnectionInit {
                payload: Some(json!({ "token": token })),
            },
        )
        .await?;

        loop {
            let frame = match socket.next().await {
                Some(Ok(Message::Text(text))) => serde_json::from_str::<SocketServerMessage>(&text)?,
                Some(Ok(Message::Close(_))) | None => {
                    return Err(TransportError::Protocol(
                        "socket closed before connection_ack".into(),
                    ))
                }
                Some(Ok(_)) => continue,
                Some(Err(err)) => return Err(err.into()),
            };
            match frame {
                SocketServerMessage::ConnectionAck { .. } => return Ok(socket),
                SocketServerMessage::Ping { .. } => {
                    send_frame(&mut socket, &SocketClientMessage::Pong).await?
                }
                other => {
                    return Err(TransportError::Protocol(format!(
                        "unexpected frame before connection_ack: {other:?}"
                    )))
                }
            }
        }
    }
}

async fn send_frame(socket: &mut Socket, frame: &SocketClientMessage) -> Result<(), TransportError> {
    let text = serde_json::to_string(frame)?;
    socket.send(Message::Text(text)).await?;
    Ok(())
}

async fn pump_subscription(
    mut socket: Socket,
    id: String,
    tx: mpsc::Sender<Result<shared::protocol::GraphQlResponse, TransportError>>,
) {
    loop {
        let frame = tokio::select! {
            frame = socket.next() => frame,
            _ = tx.closed() => {
                debug!(subscription_id = %id, "socket: consumer dropped, completing");
                let _ = send_frame(&mut socket, &SocketClientMessage::Complete { id: id.clone() }).await;
                break;
            }
        };

        let text = match frame {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(err)) => {
                let _ = tx.send(Err(err.into())).await;
                break;
            }
        };

        match serde_json::from_str::<SocketServerMessage>(&text) {
            Ok(SocketServerMessage::Next { id: frame_id, payload }) if frame_id == id => {
                if tx.send(Ok(payload)).await.is_err() {
                    let _ = send_frame(&mut socket, &SocketClientMessage::Complete { id: id.clone() }).await;
                    break;
                }
            }
            Ok(SocketServerMessage::Error { id: frame_id, payload }) if frame_id == id => {
                let errors = payload.iter().map(ApiError::from).collect();
                let _ = tx.send(Err(TransportError::GraphQl(errors))).await;
                break;
            }
            Ok(SocketServerMessage::Complete { id: frame_id }) if frame_id == id => break,
            Ok(SocketServerMessage::Ping { .. }) => {
                if let Err(err) = send_frame(&mut socket, &SocketClientMessage::Pong).await {
                    let _ = tx.send(Err(err)).await;
                    break;
                }
            }
            Ok(_) => {}
            Err(err) => warn!(subscription_id = %id, error = %err, "socket: ignoring malformed frame"),
        }
    }

    let _ = socket.close(None).await;
    debug!(subscription_id = %id, "socket: subscription closed");
}
