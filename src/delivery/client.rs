use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::error::DeliveryError;
use crate::notification::Notification;

use super::payload::SlackMessage;

const CORRELATION_HEADER: &str = "x-correlation-id";

/// Posts notifications to chat webhooks. Never retries on its own.
#[derive(Clone)]
pub struct WebhookClient {
    http: reqwest::Client,
}

impl WebhookClient {
    /// Build a client whose requests are bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn new(
        timeout: Duration,
        connect_timeout: Duration,
        insecure_http: bool,
    ) -> std::result::Result<Self, DeliveryError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .user_agent(concat!("buildnotify/", env!("CARGO_PKG_VERSION")))
            .pool_idle_timeout(Duration::from_secs(30));

        if !insecure_http {
            builder = builder.https_only(true);
        }

        let http = builder
            .build()
            .map_err(|source| DeliveryError::Client { source })?;
        Ok(Self { http })
    }

    /// Send one notification.
    ///
    /// An empty `url` is a successful no-op.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] for an unparsable URL, a transport failure
    /// or timeout, or any non-2xx answer.
    pub async fn deliver(
        &self,
        url: &str,
        notification: &Notification,
    ) -> std::result::Result<(), DeliveryError> {
        if url.is_empty() {
            return Ok(());
        }
        let destination = Url::parse(url).map_err(|err| DeliveryError::Destination {
            message: err.to_string(),
        })?;

        let correlation_id = Uuid::now_v7().to_string();
        let started = Instant::now();
        let response = self
            .http
            .post(destination)
            .header(CORRELATION_HEADER, &correlation_id)
            .json(&SlackMessage::from(notification))
            .send()
            .await?;

        let status = response.status();
        if let Err(err) = response.bytes().await {
            debug!(%correlation_id, error = %err, "failed to drain webhook response body");
        }
        if !status.is_success() {
            return Err(DeliveryError::HttpStatus { status });
        }

        debug!(
            %correlation_id,
            status = %status,
            latency_ms = started.elapsed().as_millis(),
            "notification delivered"
        );
        Ok(())
    }
}
