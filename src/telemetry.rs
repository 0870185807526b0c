use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt};

use crate::Result;
use crate::error::Error;

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber.
///
/// The filter is taken from `explicit_filter`, then `RUST_LOG`, then falls
/// back to `info`; the first candidate that parses wins.
///
/// # Errors
///
/// Returns an error when no filter candidate parses, when JSON output is
/// requested from a build without the `json-logs` feature, or when a global
/// subscriber is already installed.
pub fn init_tracing(explicit_filter: Option<&str>, use_json: bool) -> Result<()> {
    let filter = filter_candidates(explicit_filter, std::env::var("RUST_LOG").ok())
        .into_iter()
        .find_map(|candidate| EnvFilter::try_new(candidate).ok())
        .ok_or_else(|| Error::Telemetry("invalid log filter".to_string()))?;

    #[cfg(feature = "json-logs")]
    if use_json {
        let subscriber = Registry::default().with(filter).with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .json()
                .flatten_event(true),
        );
        tracing::subscriber::set_global_default(subscriber)
            .map_err(|err| Error::Telemetry(err.to_string()))?;
        return Ok(());
    }

    #[cfg(not(feature = "json-logs"))]
    if use_json {
        return Err(Error::Telemetry(
            "binary was built without the `json-logs` feature".to_string(),
        ));
    }

    let subscriber = Registry::default()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true));
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| Error::Telemetry(err.to_string()))
}

fn filter_candidates(explicit: Option<&str>, from_env: Option<String>) -> Vec<String> {
    explicit
        .map(str::to_string)
        .into_iter()
        .chain(from_env.filter(|value| !value.trim().is_empty()))
        .chain(std::iter::once(DEFAULT_FILTER.to_string()))
        .collect()
}
