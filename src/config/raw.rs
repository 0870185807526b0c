use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use serde_with::serde_as;
use url::Url;

use crate::Result;
use crate::error::ConfigError;
use crate::registry::{SubscriptionEntry, parse_subscription_list};
use crate::types::TransportMode;

use super::defaults::{
    default_bind, default_connect_timeout, default_delivery_timeout, default_max_messages,
    default_mode, default_port, default_pubsub_endpoint, default_pull_timeout,
};
use super::env::{env_duration, env_parse, env_string};
use super::{Config, DeliverySettings, HumantimeDuration, MAX_MESSAGES_BOUNDS, PubSubSettings};

pub(super) fn load(path: &Path) -> std::result::Result<RawConfig, ConfigError> {
    build(::config::Config::builder().add_source(::config::File::from(path).required(false)))
}

#[cfg(test)]
pub(super) fn load_str(toml: &str) -> std::result::Result<RawConfig, ConfigError> {
    build(::config::Config::builder().add_source(::config::File::from_str(
        toml,
        ::config::FileFormat::Toml,
    )))
}

fn build(
    builder: ::config::ConfigBuilder<::config::builder::DefaultState>,
) -> std::result::Result<RawConfig, ConfigError> {
    builder
        .add_source(
            ::config::Environment::with_prefix("BUILDNOTIFY")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|err| ConfigError::Other(err.to_string()))?
        .try_deserialize()
        .map_err(|err| ConfigError::Parse(err.to_string()))
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub(super) relay: RawRelay,
    #[serde(default)]
    pub(super) pubsub: RawPubSub,
    #[serde(default)]
    pub(super) delivery: RawDelivery,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawRelay {
    #[serde(default = "default_mode")]
    pub(super) mode: String,
    #[serde(default = "default_port")]
    pub(super) port: u16,
    #[serde(default = "default_bind")]
    pub(super) bind: String,
    #[serde(default)]
    pub(super) subscriptions: Option<RawSubscriptions>,
}

/// Either the `id|project|url,...` list or a table array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum RawSubscriptions {
    List(String),
    Entries(Vec<RawSubscription>),
}

#[derive(Debug, Deserialize)]
pub(super) struct RawSubscription {
    pub(super) id: String,
    pub(super) project_id: String,
    #[serde(default)]
    pub(super) url: String,
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub(super) struct RawPubSub {
    #[serde(default = "default_pubsub_endpoint")]
    pub(super) endpoint: String,
    #[serde(default)]
    pub(super) token: Option<String>,
    /// Set when the endpoint came from `PUBSUB_EMULATOR_HOST`.
    #[serde(skip)]
    pub(super) emulator: bool,
    #[serde(default = "default_max_messages")]
    pub(super) max_messages: u32,
    #[serde(default = "default_pull_timeout")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) timeout: Duration,
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub(super) struct RawDelivery {
    #[serde(default = "default_delivery_timeout")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) timeout: Duration,
    #[serde(default = "default_connect_timeout")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) connect_timeout: Duration,
}

impl RawConfig {
    pub(super) fn apply_env_overrides(&mut self) -> std::result::Result<(), ConfigError> {
        if let Some(mode) = env_string("MODE")? {
            self.relay.mode = mode;
        }
        if let Some(port) = env_parse::<u16>("PORT")? {
            self.relay.port = port;
        }
        if let Some(list) = env_string("SUBSCRIPTIONS")? {
            self.relay.subscriptions = Some(RawSubscriptions::List(list));
        }
        if let Some(endpoint) = env_string("PUBSUB_ENDPOINT")? {
            self.pubsub.endpoint = endpoint;
        }
        if let Some(host) = env_string("PUBSUB_EMULATOR_HOST")? {
            self.pubsub.endpoint = format!("http://{}", host.trim());
            self.pubsub.emulator = true;
        }
        if let Some(token) = env_string("PUBSUB_TOKEN")? {
            self.pubsub.token = Some(token);
        }
        if let Some(max) = env_parse::<u32>("PULL_MAX_MESSAGES")? {
            self.pubsub.max_messages = max;
        }
        if let Some(timeout) = env_duration("DELIVERY_TIMEOUT")? {
            self.delivery.timeout = timeout;
        }
        Ok(())
    }

    pub(super) fn validate_and_build(self) -> Result<Config> {
        let mode = TransportMode::from_str(&self.relay.mode).map_err(|message| {
            ConfigError::InvalidField {
                field: "relay.mode",
                message,
            }
        })?;

        let subscriptions = match self.relay.subscriptions {
            Some(RawSubscriptions::List(list)) => parse_subscription_list(&list),
            Some(RawSubscriptions::Entries(entries)) => entries
                .into_iter()
                .map(|raw| SubscriptionEntry::new(raw.id, raw.project_id, raw.url))
                .collect(),
            None => Vec::new(),
        };
        if subscriptions.is_empty() {
            return Err(ConfigError::MissingField {
                field: "relay.subscriptions",
            }
            .into());
        }

        if self.relay.port == 0 {
            return Err(ConfigError::InvalidField {
                field: "relay.port",
                message: "port must be greater than zero".to_string(),
            }
            .into());
        }
        let bind = IpAddr::from_str(self.relay.bind.trim()).map_err(|err| {
            ConfigError::InvalidField {
                field: "relay.bind",
                message: err.to_string(),
            }
        })?;

        let endpoint = Url::parse(self.pubsub.endpoint.trim()).map_err(|err| {
            ConfigError::InvalidField {
                field: "pubsub.endpoint",
                message: err.to_string(),
            }
        })?;
        if !MAX_MESSAGES_BOUNDS.contains(&self.pubsub.max_messages) {
            return Err(ConfigError::InvalidField {
                field: "pubsub.max_messages",
                message: format!(
                    "expected between {} and {}, got {}",
                    MAX_MESSAGES_BOUNDS.start(),
                    MAX_MESSAGES_BOUNDS.end(),
                    self.pubsub.max_messages
                ),
            }
            .into());
        }
        if self.pubsub.timeout.is_zero() {
            return Err(ConfigError::InvalidField {
                field: "pubsub.timeout",
                message: "timeout must be greater than zero".to_string(),
            }
            .into());
        }
        if self.delivery.timeout.is_zero() {
            return Err(ConfigError::InvalidField {
                field: "delivery.timeout",
                message: "timeout must be greater than zero".to_string(),
            }
            .into());
        }

        let token = self
            .pubsub
            .token
            .filter(|token| !token.trim().is_empty())
            .map(Into::into);

        Ok(Config {
            mode,
            listen_addr: SocketAddr::new(bind, self.relay.port),
            subscriptions,
            pubsub: PubSubSettings {
                endpoint,
                token,
                emulator: self.pubsub.emulator,
                max_messages: self.pubsub.max_messages,
                timeout: self.pubsub.timeout,
            },
            delivery: DeliverySettings {
                timeout: self.delivery.timeout,
                connect_timeout: self.delivery.connect_timeout,
            },
        })
    }
}

impl Default for RawRelay {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            port: default_port(),
            bind: default_bind(),
            subscriptions: None,
        }
    }
}

impl Default for RawPubSub {
    fn default() -> Self {
        Self {
            endpoint: default_pubsub_endpoint(),
            token: None,
            emulator: false,
            max_messages: default_max_messages(),
            timeout: default_pull_timeout(),
        }
    }
}

impl Default for RawDelivery {
    fn default() -> Self {
        Self {
            timeout: default_delivery_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}
