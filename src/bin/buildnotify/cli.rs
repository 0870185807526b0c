use std::path::PathBuf;

use buildnotify::types::TransportMode;
use clap::{ArgAction, Parser};

#[allow(clippy::struct_excessive_bools)]
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Relays Cloud Build notifications from Pub/Sub to chat webhooks",
    long_about = None
)]
pub struct Cli {
    /// Path to the TOML configuration file (defaults to `config.toml`, optional).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Transport used to receive messages: `pull` or `push`.
    #[arg(long, value_name = "MODE")]
    pub mode: Option<TransportMode>,

    /// Listening port for push mode.
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// Allow plain HTTP endpoints (emulator, local webhooks).
    #[arg(long, action = ArgAction::SetTrue)]
    pub insecure: bool,

    /// Log notifications instead of sending them.
    #[arg(long, action = ArgAction::SetTrue)]
    pub dry_run: bool,

    /// JSON log output (requires `--features json-logs`).
    #[arg(long, action = ArgAction::SetTrue)]
    pub json_logs: bool,

    /// Explicit log filter (e.g. "buildnotify=debug").
    #[arg(long, value_name = "FILTER")]
    pub log_filter: Option<String>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
