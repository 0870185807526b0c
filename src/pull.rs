use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use backoff::backoff::Backoff;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::PubSubError;
use crate::pubsub::{PubSubClient, ReceivedMessage};
use crate::registry::{Registry, SubscriptionEntry};
use crate::relay::{AckDecision, Disposition, Relay};

const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);
const LEASE_MARGIN_SECS: u64 = 10;
const MAX_ACK_DEADLINE_SECS: u64 = 600;

/// Drives one receive loop per registered subscription.
#[derive(Clone)]
pub struct PullAdapter {
    client: PubSubClient,
    relay: Relay,
    registry: Arc<Registry>,
    max_messages: u32,
    /// Upper bound on handling one message, used to size batch leases.
    delivery_timeout: Duration,
}

impl PullAdapter {
    pub const fn new(
        client: PubSubClient,
        relay: Relay,
        registry: Arc<Registry>,
        max_messages: u32,
        delivery_timeout: Duration,
    ) -> Self {
        Self {
            client,
            relay,
            registry,
            max_messages,
            delivery_timeout,
        }
    }

    /// Run every subscription loop until `shutdown` fires.
    ///
    /// A loop that hits a permanent broker error stops on its own; the others
    /// keep running.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut tasks = JoinSet::new();
        for entry in self.registry.entries().cloned() {
            let adapter = self.clone();
            let shutdown = shutdown.clone();
            tasks.spawn(async move {
                let key = entry.key();
                (key, adapter.stream(entry, shutdown).await)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((key, Err(err))) => {
                    error!(subscription = %key, error = %err, "subscription loop stopped");
                }
                Err(join_err) => {
                    warn!(error = %join_err, "subscription task failed");
                }
            }
        }
    }

    async fn stream(
        &self,
        entry: SubscriptionEntry,
        shutdown: CancellationToken,
    ) -> std::result::Result<(), PubSubError> {
        let path = entry.key();
        info!(subscription = %path, "subscribing");

        let mut reconnect = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_multiplier(2.0)
            .with_randomization_factor(0.25)
            .with_max_interval(MAX_RECONNECT_DELAY)
            .with_max_elapsed_time(None)
            .build();

        loop {
            let pulled = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                res = self.client.pull(&path, self.max_messages) => res,
            };

            match pulled {
                Ok(messages) => {
                    reconnect.reset();
                    self.extend_lease(&path, &messages).await;
                    for message in messages {
                        self.process_message(&entry, &message).await;
                    }
                }
                Err(err) if err.is_retriable() => {
                    let delay = reconnect.next_backoff().unwrap_or(MAX_RECONNECT_DELAY);
                    warn!(
                        subscription = %path,
                        delay_ms = delay.as_millis(),
                        error = %err,
                        "pull failed, reconnecting"
                    );
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        () = sleep(delay) => {}
                    }
                }
                Err(err) => return Err(err),
            }
        }

        info!(subscription = %path, "subscription loop stopped");
        Ok(())
    }

    /// Messages are handled one at a time, so the whole batch must stay
    /// leased until the last one is settled.
    async fn extend_lease(&self, path: &str, messages: &[ReceivedMessage]) {
        if messages.is_empty() {
            return;
        }
        let ack_ids: Vec<String> = messages.iter().map(|m| m.ack_id.clone()).collect();
        let seconds = batch_lease_seconds(messages.len(), self.delivery_timeout);
        if let Err(err) = self
            .client
            .modify_ack_deadline(path, &ack_ids, seconds)
            .await
        {
            warn!(
                subscription = %path,
                batch = messages.len(),
                error = %err,
                "failed to extend batch lease, late messages may be redelivered"
            );
        }
    }

    /// Handle one leased message and settle it exactly once.
    pub async fn process_message(
        &self,
        entry: &SubscriptionEntry,
        message: &ReceivedMessage,
    ) -> AckDecision {
        let path = entry.key();
        debug!(
            subscription = %path,
            message_id = %message.message_id,
            delivery_attempt = message.delivery_attempt.unwrap_or_default(),
            "received message"
        );

        let disposition = match &message.data {
            Ok(data) => {
                self.relay
                    .process(&path, &entry.url, data, &message.attributes)
                    .await
            }
            Err(err) => {
                warn!(
                    subscription = %path,
                    message_id = %message.message_id,
                    error = %err,
                    "dropping undecodable message"
                );
                Disposition::Malformed(err.clone())
            }
        };
        let decision = disposition.ack_decision();

        let ack_ids = [message.ack_id.clone()];
        let settled = match decision {
            AckDecision::Ack => self.client.acknowledge(&path, &ack_ids).await,
            AckDecision::Nack => self.client.nack(&path, &ack_ids).await,
        };
        if let Err(err) = settled {
            warn!(
                subscription = %path,
                message_id = %message.message_id,
                decision = ?decision,
                error = %err,
                "failed to settle message, broker will redeliver after the ack deadline"
            );
        }
        decision
    }
}

fn batch_lease_seconds(batch: usize, per_message: Duration) -> u32 {
    let per_message = per_message.as_secs() + u64::from(per_message.subsec_nanos() > 0);
    let total = per_message
        .saturating_mul(u64::try_from(batch).unwrap_or(u64::MAX))
        .saturating_add(LEASE_MARGIN_SECS)
        .min(MAX_ACK_DEADLINE_SECS);
    u32::try_from(total).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::batch_lease_seconds;

    #[test]
    fn batch_lease_covers_every_delivery() {
        assert_eq!(batch_lease_seconds(10, Duration::from_secs(5)), 60);
        assert_eq!(batch_lease_seconds(2, Duration::from_millis(1500)), 14);
        assert_eq!(batch_lease_seconds(1000, Duration::from_secs(5)), 600);
    }
}
