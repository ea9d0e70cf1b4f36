use crate::client::{Client, ClientError};
use crate::wire::{RoomRef, c2s};
use log::{debug, info};

impl Client {
    /// Subscribes to a conversation room.
    ///
    /// Idempotent: joining an already-joined room is a no-op, so redundant
    /// calls never produce duplicate event delivery.
    pub async fn join_conversation(&self, conversation_id: &str) -> Result<(), ClientError> {
        {
            let joined = self.joined_rooms.lock().await;
            if joined.contains(conversation_id) {
                debug!(target: "Client/Rooms", "Already joined {conversation_id}, skipping");
                return Ok(());
            }
        }

        self.emit(
            c2s::CONVERSATION_JOIN,
            Some(serde_json::to_value(RoomRef::new(conversation_id))?),
        )
        .await?;

        self.joined_rooms
            .lock()
            .await
            .insert(conversation_id.to_string());
        debug!(target: "Client/Rooms", "Joined {conversation_id}");
        Ok(())
    }

    /// Unsubscribes from a conversation room. A no-op for rooms the client
    /// is not a member of.
    pub async fn leave_conversation(&self, conversation_id: &str) -> Result<(), ClientError> {
        let was_member = self.joined_rooms.lock().await.remove(conversation_id);
        if !was_member {
            return Ok(());
        }

        // Membership is dropped locally even if the emit fails: a dead
        // transport has no server-side membership to keep in sync.
        match self
            .emit(
                c2s::CONVERSATION_LEAVE,
                Some(serde_json::to_value(RoomRef::new(conversation_id))?),
            )
            .await
        {
            Ok(()) => {
                debug!(target: "Client/Rooms", "Left {conversation_id}");
                Ok(())
            }
            Err(ClientError::NotConnected) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Requests a bulk read receipt for every unread message in the room.
    pub async fn mark_conversation_read(&self, conversation_id: &str) -> Result<(), ClientError> {
        self.emit(
            c2s::CONVERSATION_MARK_ALL_READ,
            Some(serde_json::to_value(RoomRef::new(conversation_id))?),
        )
        .await
    }

    /// Re-issues joins for every tracked room after a reconnect, so open
    /// sessions keep receiving pushes without managing reconnect logic.
    pub(crate) async fn rejoin_rooms(&self) -> Result<(), ClientError> {
        let rooms: Vec<String> = self.joined_rooms.lock().await.iter().cloned().collect();
        if rooms.is_empty() {
            return Ok(());
        }

        info!(target: "Client/Rooms", "Re-joining {} room(s) after reconnect", rooms.len());
        for conversation_id in rooms {
            self.emit(
                c2s::CONVERSATION_JOIN,
                Some(serde_json::to_value(RoomRef::new(&conversation_id))?),
            )
            .await?;
        }
        Ok(())
    }
}
