use std::path::PathBuf;
use std::sync::Arc;

use buildnotify::Result;
use buildnotify::config::Config;
use buildnotify::delivery::WebhookClient;
use buildnotify::error::{ConfigError, Error as RelayError};
use buildnotify::pubsub::PubSubClient;
use buildnotify::pull::PullAdapter;
use buildnotify::push::{self, PushState};
use buildnotify::registry::Registry;
use buildnotify::relay::Relay;
use buildnotify::telemetry::init_tracing;
use buildnotify::types::TransportMode;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::cli::Cli;
use super::shutdown::cancel_on_signal;

const DEFAULT_CONFIG: &str = "config.toml";

pub async fn run(cli: Cli) -> Result<()> {
    init_tracing(cli.log_filter.as_deref(), cli.json_logs)?;

    let (config_path, required) = cli
        .config
        .map_or_else(|| (PathBuf::from(DEFAULT_CONFIG), false), |path| (path, true));
    let mut config = Config::from_env_and_file(&config_path, required)?;

    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if let Some(port) = cli.port {
        config.listen_addr.set_port(port);
    }

    let registry = Arc::new(Registry::new(config.subscriptions.clone()));
    if registry.is_empty() {
        return Err(RelayError::from(ConfigError::InvalidField {
            field: "relay.subscriptions",
            message: "no usable subscription entries".to_string(),
        }));
    }
    if !cli.insecure {
        registry.require_https()?;
    }

    let webhooks = WebhookClient::new(
        config.delivery.timeout,
        config.delivery.connect_timeout,
        cli.insecure,
    )?;
    let relay = Relay::new(webhooks, cli.dry_run);

    info!(
        mode = %config.mode,
        subscriptions = registry.len(),
        dry_run = cli.dry_run,
        "starting relay"
    );

    let shutdown = CancellationToken::new();
    cancel_on_signal(shutdown.clone());

    match config.mode {
        TransportMode::Pull => {
            let client = PubSubClient::new(
                &config.pubsub.endpoint,
                config.pubsub.token.clone(),
                config.pubsub.timeout,
                config.delivery.connect_timeout,
                cli.insecure || config.pubsub.emulator,
            )?;
            PullAdapter::new(
                client,
                relay,
                registry,
                config.pubsub.max_messages,
                config.delivery.timeout,
            )
            .run(shutdown)
            .await;
        }
        TransportMode::Push => {
            push::serve(config.listen_addr, PushState::new(registry, relay), shutdown).await?;
        }
    }

    info!("relay stopped");
    Ok(())
}
