//! Collaborator trait implementations for `HttpBackend`.

use async_trait::async_trait;
use folio_common::{PresenceError, RoomId};
use tracing::debug;

use crate::api::{AccessGrant, ChannelTicket, ChatClient, ConversationBackend, ConversationChannel, RoomApi};
use crate::protocol::{AccessResponse, ChannelResponse, ProvisionRequest, ProvisionResponse, RosterResponse};
use crate::roster::PresenceMember;

use super::client::{HttpBackend, Operation};

#[async_trait]
impl RoomApi for HttpBackend {
    async fn join_room(&self, room: &RoomId) -> Result<(), PresenceError> {
        let url = self.endpoint(&["rooms", room.as_str(), "join"]);
        debug!(room_id = %room, "Join request");
        self.send(Operation::Join, self.http.post(url)).await?;
        Ok(())
    }

    async fn leave_room(&self, room: &RoomId) -> Result<(), PresenceError> {
        let url = self.endpoint(&["rooms", room.as_str(), "leave"]);
        debug!(room_id = %room, "Leave request");
        self.send(Operation::Leave, self.http.post(url)).await?;
        Ok(())
    }

    async fn heartbeat(&self, room: &RoomId) -> Result<(), PresenceError> {
        let url = self.endpoint(&["rooms", room.as_str(), "heartbeat"]);
        self.send(Operation::Heartbeat, self.http.post(url)).await?;
        Ok(())
    }

    async fn roster_poll(&self, room: &RoomId) -> Result<Vec<PresenceMember>, PresenceError> {
        let url = self.endpoint(&["rooms", room.as_str(), "presence"]);
        let response = self.send(Operation::RosterPoll, self.http.get(url)).await?;
        let roster: RosterResponse = Self::decode(Operation::RosterPoll, response).await?;
        Ok(roster.into_members())
    }
}

#[async_trait]
impl ConversationBackend for HttpBackend {
    async fn check_access(&self) -> Result<AccessGrant, PresenceError> {
        let url = self.endpoint(&["me", "access"]);
        let response = self.send(Operation::AccessCheck, self.http.get(url)).await?;
        let access: AccessResponse = Self::decode(Operation::AccessCheck, response).await?;
        Ok(AccessGrant::now(access.is_premium))
    }

    async fn provision_channel(
        &self,
        room: &RoomId,
        participant_id: Option<&str>,
    ) -> Result<ChannelTicket, PresenceError> {
        let url = self.endpoint(&["conversations"]);
        let body = ProvisionRequest {
            room_id: room.as_str(),
            participant_id,
        };
        let response = self
            .send(Operation::Provision, self.http.post(url).json(&body))
            .await?;
        let created: ProvisionResponse = Self::decode(Operation::Provision, response).await?;
        debug!(room_id = %room, channel_id = %created.channel_id, "Channel created");
        Ok(created.into())
    }

    async fn delete_channel(&self, channel_id: &str) -> Result<(), PresenceError> {
        let url = self.endpoint(&["conversations", channel_id]);
        self.send(Operation::Delete, self.http.delete(url)).await?;
        Ok(())
    }
}

#[async_trait]
impl ChatClient for HttpBackend {
    async fn watch_channel(&self, channel_id: &str) -> Result<ConversationChannel, PresenceError> {
        let url = self.endpoint(&["conversations", channel_id]);
        let response = self.send(Operation::Watch, self.http.get(url)).await?;
        let channel: ChannelResponse = Self::decode(Operation::Watch, response).await?;
        Ok(channel.into())
    }
}
