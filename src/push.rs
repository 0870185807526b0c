//! HTTP endpoint for push subscriptions.
//!
//! The broker treats any 2xx answer as an acknowledgment. Requests are
//! validated strictly, then accepted: once a message resolves to a
//! subscription the answer is `204 No Content` whatever the delivery outcome.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::ServerError;
use crate::registry::Registry;
use crate::relay::{Disposition, Relay};

const JSON_MEDIA_TYPE: &str = "application/json";

#[derive(Clone)]
pub struct PushState {
    registry: Arc<Registry>,
    relay: Relay,
}

impl PushState {
    pub const fn new(registry: Arc<Registry>, relay: Relay) -> Self {
        Self { registry, relay }
    }
}

/// Why a push request was refused. Always answered with 400.
#[derive(Debug, Error)]
pub enum PushRejection {
    #[error("method {0} is not allowed")]
    Method(Method),
    #[error("unsupported media type {0:?}")]
    MediaType(String),
    #[error("malformed push envelope: {0}")]
    Envelope(String),
    #[error("missing {0}")]
    MissingField(&'static str),
    #[error("message data is neither base64 nor a JSON object")]
    Data,
    #[error("subscription not found: {0}")]
    UnknownSubscription(String),
}

impl IntoResponse for PushRejection {
    fn into_response(self) -> Response {
        match &self {
            Self::UnknownSubscription(subscription) => {
                warn!(%subscription, "subscription not found");
            }
            other => warn!(reason = %other, "rejecting push request"),
        }
        (StatusCode::BAD_REQUEST, "Bad Request").into_response()
    }
}

#[derive(Debug, Deserialize)]
struct PushEnvelope {
    message: PushMessage,
    #[serde(default)]
    subscription: String,
}

/// Pub/Sub sends the message id under both spellings.
#[derive(Debug, Deserialize)]
struct PushMessage {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    attributes: Option<HashMap<String, String>>,
    #[serde(default)]
    id: String,
    #[serde(default, rename = "messageId")]
    message_id: String,
    #[serde(default, rename = "message_id")]
    message_id_snake: String,
}

impl PushMessage {
    fn id(&self) -> &str {
        [&self.id, &self.message_id, &self.message_id_snake]
            .into_iter()
            .find(|id| !id.is_empty())
            .map_or("", String::as_str)
    }

    fn decode_data(&self) -> std::result::Result<Vec<u8>, PushRejection> {
        match &self.data {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::String(encoded)) => STANDARD
                .decode(encoded.trim())
                .map_err(|_| PushRejection::Data),
            Some(raw @ Value::Object(_)) => {
                serde_json::to_vec(raw).map_err(|_| PushRejection::Data)
            }
            Some(_) => Err(PushRejection::Data),
        }
    }
}

pub fn router(state: PushState) -> Router {
    Router::new()
        .route("/", any(handle_push))
        .fallback(handle_push)
        .with_state(state)
}

/// Serve the push endpoint until `shutdown` fires, letting in-flight
/// requests finish.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve(
    addr: SocketAddr,
    state: PushState,
    shutdown: CancellationToken,
) -> crate::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            address: addr.to_string(),
            source,
        })?;
    info!(%addr, "listening for push deliveries");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|source| ServerError::Serve { source })?;

    info!("push server stopped");
    Ok(())
}

async fn handle_push(
    State(state): State<PushState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<StatusCode, PushRejection> {
    if method != Method::POST {
        return Err(PushRejection::Method(method));
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !is_json(content_type) {
        return Err(PushRejection::MediaType(content_type.to_string()));
    }

    let envelope: PushEnvelope = serde_json::from_slice(&body)
        .map_err(|err| PushRejection::Envelope(err.to_string()))?;
    let data = envelope.message.decode_data()?;
    if envelope.subscription.is_empty() {
        return Err(PushRejection::MissingField("subscription"));
    }
    let message_id = envelope.message.id();
    if message_id.is_empty() {
        return Err(PushRejection::MissingField("message.id"));
    }

    let entry = state
        .registry
        .resolve(&envelope.subscription)
        .ok_or_else(|| PushRejection::UnknownSubscription(envelope.subscription.clone()))?;
    let attributes = envelope.message.attributes.clone().unwrap_or_default();

    info!(
        subscription = %envelope.subscription,
        %message_id,
        "received push message"
    );

    let key = entry.key();
    let disposition = state
        .relay
        .process(&key, &entry.url, &data, &attributes)
        .await;
    if let Disposition::Failed(err) = &disposition {
        warn!(
            subscription = %key,
            %message_id,
            error = %err,
            "delivery failed, push message acknowledged anyway"
        );
    }
    Ok(StatusCode::NO_CONTENT)
}

fn is_json(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|media| media.trim().eq_ignore_ascii_case(JSON_MEDIA_TYPE))
}

#[cfg(test)]
mod tests {
    use super::{PushMessage, PushRejection, is_json};

    fn message(json: &str) -> PushMessage {
        match serde_json::from_str(json) {
            Ok(message) => message,
            Err(err) => panic!("invalid fixture: {err}"),
        }
    }

    #[test]
    fn media_type_ignores_parameters() {
        assert!(is_json("application/json"));
        assert!(is_json("Application/JSON; charset=utf-8"));
        assert!(!is_json("text/plain"));
        assert!(!is_json(""));
        assert!(!is_json("application/jsonp"));
    }

    #[test]
    fn message_id_accepts_every_spelling() {
        assert_eq!(message(r#"{"id":"1"}"#).id(), "1");
        assert_eq!(message(r#"{"messageId":"2","message_id":"2"}"#).id(), "2");
        assert_eq!(message(r#"{"message_id":"3"}"#).id(), "3");
        assert_eq!(message("{}").id(), "");
    }

    #[test]
    fn data_decodes_base64_or_raw_json() {
        let encoded = message(r#"{"data":"eyJzdGF0dXMiOiJTVUNDRVNTIn0="}"#);
        assert!(matches!(encoded.decode_data(), Ok(bytes) if bytes == br#"{"status":"SUCCESS"}"#));

        let raw = message(r#"{"data":{"status":"QUEUED"}}"#);
        assert!(matches!(raw.decode_data(), Ok(bytes) if bytes == br#"{"status":"QUEUED"}"#));

        assert!(matches!(message("{}").decode_data(), Ok(bytes) if bytes.is_empty()));
        assert!(matches!(
            message(r#"{"data":"not base64!"}"#).decode_data(),
            Err(PushRejection::Data)
        ));
        assert!(matches!(message(r#"{"data":42}"#).decode_data(), Err(PushRejection::Data)));
    }
}
