//! The transport-independent half of message handling.
//!
//! Both ingestion adapters hand raw message bytes to [`Relay::process`] and
//! act on the returned [`Disposition`]. Delivery always completes (or times
//! out) before `process` returns, so the disposition reflects the real
//! outcome.

use std::collections::HashMap;

use tracing::{debug, error, info, warn};

use crate::delivery::WebhookClient;
use crate::error::{DeliveryError, ParseError};
use crate::event::normalize_message;
use crate::notification::Notification;

#[derive(Clone)]
pub struct Relay {
    client: WebhookClient,
    dry_run: bool,
}

/// What happened to one message.
#[derive(Debug)]
pub enum Disposition {
    Delivered,
    /// Status not worth a notification.
    Skipped,
    /// Payload will never parse, redelivery is pointless.
    Malformed(ParseError),
    Failed(DeliveryError),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AckDecision {
    Ack,
    Nack,
}

impl Disposition {
    pub const fn ack_decision(&self) -> AckDecision {
        match self {
            Self::Failed(_) => AckDecision::Nack,
            Self::Delivered | Self::Skipped | Self::Malformed(_) => AckDecision::Ack,
        }
    }
}

impl Relay {
    pub const fn new(client: WebhookClient, dry_run: bool) -> Self {
        Self { client, dry_run }
    }

    pub async fn process(
        &self,
        subscription: &str,
        destination: &str,
        data: &[u8],
        attributes: &HashMap<String, String>,
    ) -> Disposition {
        let event = match normalize_message(data, attributes) {
            Ok(event) => event,
            Err(err) => {
                warn!(subscription, error = %err, "dropping malformed build event");
                return Disposition::Malformed(err);
            }
        };

        let Some(notification) = Notification::from_event(&event) else {
            debug!(
                subscription,
                build_id = %event.id,
                status = %event.status,
                "status does not warrant a notification"
            );
            return Disposition::Skipped;
        };

        if self.dry_run {
            info!(
                subscription,
                build_id = %event.id,
                status = %event.status,
                color = notification.color,
                "dry-run: would deliver notification"
            );
            return Disposition::Delivered;
        }

        match self.client.deliver(destination, &notification).await {
            Ok(()) => {
                info!(
                    subscription,
                    build_id = %event.id,
                    trigger_id = %event.trigger_id,
                    status = %event.status,
                    "notification delivered"
                );
                Disposition::Delivered
            }
            Err(err) => {
                error!(
                    subscription,
                    build_id = %event.id,
                    status = %event.status,
                    error = %err,
                    "failed to deliver notification"
                );
                Disposition::Failed(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AckDecision, Disposition};
    use crate::error::{DeliveryError, ParseError};
    use reqwest::StatusCode;

    #[test]
    fn only_delivery_failures_are_nacked() {
        assert_eq!(Disposition::Delivered.ack_decision(), AckDecision::Ack);
        assert_eq!(Disposition::Skipped.ack_decision(), AckDecision::Ack);
        assert_eq!(
            Disposition::Malformed(ParseError::Empty).ack_decision(),
            AckDecision::Ack
        );
        assert_eq!(
            Disposition::Failed(DeliveryError::HttpStatus {
                status: StatusCode::BAD_GATEWAY
            })
            .ack_decision(),
            AckDecision::Nack
        );
    }
}
