use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::error::{ConfigError, Error, PubSubError};

const CORRELATION_HEADER: &str = "x-correlation-id";
const BODY_PREVIEW_LIMIT: usize = 256;

/// Minimal Cloud Pub/Sub REST client, enough to drive pull subscriptions.
#[derive(Clone)]
pub struct PubSubClient {
    http: reqwest::Client,
    endpoint: String,
    token: Option<SecretString>,
}

impl PubSubClient {
    /// Build a `PubSubClient` against `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTPS is required but the endpoint uses HTTP, or if
    /// the underlying HTTP client fails to build.
    pub fn new(
        endpoint: &Url,
        token: Option<SecretString>,
        timeout: Duration,
        connect_timeout: Duration,
        insecure_http: bool,
    ) -> crate::Result<Self> {
        if endpoint.scheme() != "https" && !insecure_http {
            return Err(Error::Config(ConfigError::InvalidField {
                field: "pubsub.endpoint",
                message: "only https URLs are accepted without --insecure".to_string(),
            }));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .user_agent(concat!("buildnotify/", env!("CARGO_PKG_VERSION")))
            .pool_idle_timeout(Duration::from_secs(90));

        if !insecure_http {
            builder = builder.https_only(true);
        }

        let http = builder
            .build()
            .map_err(|source| PubSubError::Client { source })?;

        Ok(Self {
            http,
            endpoint: endpoint.as_str().trim_end_matches('/').to_string(),
            token,
        })
    }

    pub(super) async fn call<B, T>(
        &self,
        subscription: &str,
        method: &str,
        body: &B,
    ) -> std::result::Result<T, PubSubError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/v1/{subscription}:{method}", self.endpoint);
        let correlation_id = Uuid::now_v7().to_string();
        let started = Instant::now();

        let mut request = self
            .http
            .post(&url)
            .header(CORRELATION_HEADER, &correlation_id)
            .json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(PubSubError::HttpStatus {
                status,
                body: body_preview(&bytes),
            });
        }

        let parsed = if bytes.iter().all(u8::is_ascii_whitespace) {
            serde_json::from_slice(b"{}")
        } else {
            serde_json::from_slice(&bytes)
        }
        .map_err(|err| PubSubError::Json {
            message: format!("{err}; body preview: {}", body_preview(&bytes)),
        })?;

        debug!(
            subscription,
            method,
            %correlation_id,
            latency_ms = started.elapsed().as_millis(),
            "pubsub call succeeded"
        );
        Ok(parsed)
    }
}

fn body_preview(body: &[u8]) -> String {
    if body.is_empty() {
        return "<empty>".to_string();
    }
    let end = body.len().min(BODY_PREVIEW_LIMIT);
    let mut preview = String::from_utf8_lossy(&body[..end]).to_string();
    if body.len() > BODY_PREVIEW_LIMIT {
        preview.push_str("...");
    }
    preview.replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::body_preview;

    #[test]
    fn body_preview_truncates_and_escapes() {
        assert_eq!(body_preview(b""), "<empty>");
        assert_eq!(body_preview(b"a\nb"), "a\\nb");
        let long = vec![b'x'; 300];
        let preview = body_preview(&long);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.len(), 259);
    }
}
