use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    PubSub(#[from] PubSubError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("missing required configuration field: {field}")]
    MissingField { field: &'static str },
    #[error("invalid configuration for {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
    #[error("configuration error: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum PubSubError {
    #[error("failed to build HTTP client")]
    Client {
        #[source]
        source: reqwest::Error,
    },
    #[error("request failed: {source}")]
    Request {
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected HTTP status {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("invalid JSON payload: {message}")]
    Json { message: String },
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to build HTTP client")]
    Client {
        #[source]
        source: reqwest::Error,
    },
    #[error("invalid destination URL: {message}")]
    Destination { message: String },
    #[error("request failed: {source}")]
    Request {
        #[source]
        source: reqwest::Error,
    },
    #[error("destination answered HTTP {status}")]
    HttpStatus { status: reqwest::StatusCode },
}

#[derive(Clone, Debug, Error)]
pub enum ParseError {
    #[error("event payload is empty")]
    Empty,
    #[error("message data is not valid base64: {message}")]
    Encoding { message: String },
    #[error("event payload is not a JSON object: {message}")]
    Json { message: String },
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("push server failed")]
    Serve {
        #[source]
        source: std::io::Error,
    },
}

impl From<reqwest::Error> for PubSubError {
    fn from(source: reqwest::Error) -> Self {
        Self::Request { source }
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(source: reqwest::Error) -> Self {
        if source.is_status() {
            if let Some(status) = source.status() {
                return Self::HttpStatus { status };
            }
        }
        Self::Request { source }
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

impl PubSubError {
    /// Whether a pull loop should back off and try again.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Request { .. } | Self::Json { .. } => true,
            Self::HttpStatus { status, .. } => {
                status.is_server_error()
                    || status.as_u16() == 429
                    || status.as_u16() == 408
            }
            Self::Client { .. } => false,
        }
    }
}
