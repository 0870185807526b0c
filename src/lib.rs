#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod delivery;
pub mod error;
pub mod event;
pub mod notification;
pub mod pubsub;
pub mod pull;
pub mod push;
pub mod registry;
pub mod relay;
pub mod telemetry;
pub mod types;

pub type Result<T> = std::result::Result<T, error::Error>;
