use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ParseError;

/// A message leased from a pull subscription.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub ack_id: String,
    pub message_id: String,
    /// Decoded payload, or why it could not be decoded.
    pub data: std::result::Result<Vec<u8>, ParseError>,
    pub attributes: HashMap<String, String>,
    pub delivery_attempt: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PullRequest {
    pub(crate) max_messages: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AcknowledgeRequest<'a> {
    pub(crate) ack_ids: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ModifyAckDeadlineRequest<'a> {
    pub(crate) ack_ids: &'a [String],
    pub(crate) ack_deadline_seconds: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PullResponse {
    #[serde(default)]
    pub(crate) received_messages: Vec<RawReceivedMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawReceivedMessage {
    pub(crate) ack_id: String,
    #[serde(default)]
    pub(crate) message: RawPubsubMessage,
    #[serde(default)]
    pub(crate) delivery_attempt: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawPubsubMessage {
    #[serde(default)]
    pub(crate) data: Option<String>,
    #[serde(default)]
    pub(crate) attributes: Option<HashMap<String, String>>,
    #[serde(default)]
    pub(crate) message_id: String,
}

impl From<RawReceivedMessage> for ReceivedMessage {
    fn from(value: RawReceivedMessage) -> Self {
        let RawPubsubMessage {
            data,
            attributes,
            message_id,
        } = value.message;
        let data = match data.as_deref().map(|encoded| STANDARD.decode(encoded)) {
            Some(Ok(bytes)) => Ok(bytes),
            Some(Err(err)) => {
                warn!(%message_id, error = %err, "message data is not valid base64");
                Err(ParseError::Encoding {
                    message: err.to_string(),
                })
            }
            None => Ok(Vec::new()),
        };
        Self {
            ack_id: value.ack_id,
            message_id,
            data,
            attributes: attributes.unwrap_or_default(),
            delivery_attempt: value.delivery_attempt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PullResponse, ReceivedMessage};
    use crate::error::ParseError;

    #[test]
    fn decodes_received_messages() {
        let response: PullResponse = match serde_json::from_str(
            r#"{"receivedMessages":[
                {"ackId":"a1","message":{"data":"eyJzdGF0dXMiOiJTVUNDRVNTIn0=","messageId":"m1",
                 "attributes":{"buildId":"b1"}},"deliveryAttempt":2},
                {"ackId":"a2","message":{"data":"%%%","messageId":"m2"}}
            ]}"#,
        ) {
            Ok(response) => response,
            Err(err) => panic!("invalid fixture: {err}"),
        };
        let messages: Vec<ReceivedMessage> = response
            .received_messages
            .into_iter()
            .map(ReceivedMessage::from)
            .collect();

        assert!(matches!(&messages[0].data, Ok(bytes) if bytes == br#"{"status":"SUCCESS"}"#));
        assert_eq!(messages[0].attributes.get("buildId").map(String::as_str), Some("b1"));
        assert_eq!(messages[0].delivery_attempt, Some(2));
        assert!(matches!(messages[1].data, Err(ParseError::Encoding { .. })));
    }

    #[test]
    fn empty_pull_response_has_no_messages() {
        let response: PullResponse = match serde_json::from_str("{}") {
            Ok(response) => response,
            Err(err) => panic!("invalid fixture: {err}"),
        };
        assert!(response.received_messages.is_empty());
    }
}
