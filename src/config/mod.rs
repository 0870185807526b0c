use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::Result;
use crate::error::{ConfigError, Error as RelayError};
use crate::registry::SubscriptionEntry;
use crate::types::TransportMode;

mod defaults;
mod env;
mod raw;
mod serde;

use self::serde::HumantimeDuration;

const MAX_MESSAGES_BOUNDS: RangeInclusive<u32> = 1..=1000;

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: TransportMode,
    pub listen_addr: SocketAddr,
    pub subscriptions: Vec<SubscriptionEntry>,
    pub pubsub: PubSubSettings,
    pub delivery: DeliverySettings,
}

#[derive(Debug, Clone)]
pub struct PubSubSettings {
    pub endpoint: Url,
    pub token: Option<SecretString>,
    /// Plain-HTTP emulator endpoint, accepted without `--insecure`.
    pub emulator: bool,
    pub max_messages: u32,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct DeliverySettings {
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Config {
    /// Load configuration from an optional file and the environment.
    ///
    /// A missing file is fine unless `required` is set.
    ///
    /// # Errors
    ///
    /// Returns an error when a required file cannot be read, when the sources
    /// cannot be parsed, when environment overrides are invalid, or when the
    /// resulting values fail validation.
    pub fn from_env_and_file(path: impl AsRef<Path>, required: bool) -> Result<Self> {
        let path = path.as_ref();
        if required {
            std::fs::metadata(path).map_err(|source| ConfigError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let mut raw = raw::load(path).map_err(RelayError::from)?;
        raw.apply_env_overrides().map_err(RelayError::from)?;
        raw.validate_and_build()
    }
}
