//! Typed chat operations on top of the split link.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use shared::{
    domain::{MessageId, RoomId},
    protocol::{
        GraphQlRequest, MeData, MessageNode, MutationResult, ReadMessageData,
        ReadMessageVariables, RoomNode, RoomUpdatesData, RoomVariables, SeeRoomData,
        SendMessageData, SendMessageVariables, UserNode,
    },
};

use crate::{
    documents,
    transport::{decode_data, SplitLink},
};

pub type RoomUpdateStream = BoxStream<'static, Result<Option<MessageNode>>>;

#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn me(&self) -> Result<Option<UserNode>>;
    async fn see_room(&self, room_id: RoomId) -> Result<Option<RoomNode>>;
    async fn send_message(&self, room_id: RoomId, payload: &str) -> Result<MutationResult>;
    async fn read_message(&self, message_id: MessageId) -> Result<MutationResult>;
    async fn room_updates(&self, room_id: RoomId) -> Result<RoomUpdateStream>;
}

pub struct GraphQlChatApi {
    link: Arc<SplitLink>,
}

impl GraphQlChatApi {
    pub fn new(link: Arc<SplitLink>) -> Self {
        Self { link }
    }

    pub fn link(&self) -> &Arc<SplitLink> {
        &self.link
    }
}

#[async_trait]
impl ChatApi for GraphQlChatApi {
    async fn me(&self) -> Result<Option<UserNode>> {
        let request = GraphQlRequest::new(documents::me()).with_operation_name("me");
        let response = self.link.execute(request).await?;
        let data: MeData = decode_data(response).context("me query failed")?;
        Ok(data.me)
    }

    async fn see_room(&self, room_id: RoomId) -> Result<Option<RoomNode>> {
        let request = GraphQlRequest::new(documents::see_room())
            .with_operation_name("seeRoom")
            .with_variables(RoomVariables { id: room_id })?;
        let response = self.link.execute(request).await?;
        let data: SeeRoomData = decode_data(response)
            .with_context(|| format!("seeRoom query failed for room {}", room_id.0))?;
        Ok(data.see_room)
    }

    async fn send_message(&self, room_id: RoomId, payload: &str) -> Result<MutationResult> {
        let request = GraphQlRequest::new(documents::SEND_MESSAGE)
            .with_operation_name("sendMessage")
            .with_variables(SendMessageVariables {
                payload: payload.to_string(),
                room_id,
            })?;
        let response = self.link.execute(request).await?;
        let data: SendMessageData = decode_data(response)
            .with_context(|| format!("sendMessage failed for room {}", room_id.0))?;
        Ok(data.send_message)
    }

    async fn read_message(&self, message_id: MessageId) -> Result<MutationResult> {
        let request = GraphQlRequest::new(documents::READ_MESSAGE)
            .with_operation_name("readMessage")
            .with_variables(ReadMessageVariables { id: message_id })?;
        let response = self.link.execute(request).await?;
        let data: ReadMessageData = decode_data(response)
            .with_context(|| format!("readMessage failed for message {}", message_id.0))?;
        Ok(data.read_message)
    }

    async fn room_updates(&self, room_id: RoomId) -> Result<RoomUpdateStream> {
        let request = GraphQlRequest::new(documents::room_updates())
            .with_operation_name("roomUpdates")
            .with_variables(RoomVariables { id: room_id })?;
        let responses = self
            .link
            .subscribe(request)
            .await
            .with_context(|| format!("roomUpdates subscription failed for room {}", room_id.0))?;

        Ok(responses
            .map(|response| -> Result<Option<MessageNode>> {
                let response = response?;
                let data: RoomUpdatesData = decode_data(response)?;
                Ok(data.room_updates)
            })
            .boxed())
    }
}
