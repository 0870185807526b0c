use serde_json::Value;

use crate::error::PubSubError;

use super::PubSubClient;
use super::models::{
    AcknowledgeRequest, ModifyAckDeadlineRequest, PullRequest, PullResponse, ReceivedMessage,
};

impl PubSubClient {
    /// Lease up to `max_messages` from `subscription` (a full resource path).
    ///
    /// Blocks server-side until at least one message is available or the
    /// broker gives up, in which case the result is empty.
    pub async fn pull(
        &self,
        subscription: &str,
        max_messages: u32,
    ) -> std::result::Result<Vec<ReceivedMessage>, PubSubError> {
        let request = PullRequest {
            max_messages: max_messages.max(1),
        };
        let response: PullResponse = self.call(subscription, "pull", &request).await?;
        Ok(response
            .received_messages
            .into_iter()
            .map(ReceivedMessage::from)
            .collect())
    }

    pub async fn acknowledge(
        &self,
        subscription: &str,
        ack_ids: &[String],
    ) -> std::result::Result<(), PubSubError> {
        if ack_ids.is_empty() {
            return Ok(());
        }
        let _: Value = self
            .call(subscription, "acknowledge", &AcknowledgeRequest { ack_ids })
            .await?;
        Ok(())
    }

    /// Negative acknowledgment: release the lease so the broker redelivers.
    pub async fn nack(
        &self,
        subscription: &str,
        ack_ids: &[String],
    ) -> std::result::Result<(), PubSubError> {
        self.modify_ack_deadline(subscription, ack_ids, 0).await
    }

    /// Reset the lease on `ack_ids` to `seconds` from now.
    pub async fn modify_ack_deadline(
        &self,
        subscription: &str,
        ack_ids: &[String],
        seconds: u32,
    ) -> std::result::Result<(), PubSubError> {
        if ack_ids.is_empty() {
            return Ok(());
        }
        let request = ModifyAckDeadlineRequest {
            ack_ids,
            ack_deadline_seconds: seconds,
        };
        let _: Value = self
            .call(subscription, "modifyAckDeadline", &request)
            .await?;
        Ok(())
    }
}
