pub(crate) mod client;
pub(crate) mod models;
pub(crate) mod ops;

pub use client::PubSubClient;
pub use models::ReceivedMessage;
