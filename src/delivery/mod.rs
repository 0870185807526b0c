pub(crate) mod client;
pub(crate) mod payload;

pub use client::WebhookClient;
pub use payload::{SlackAttachment, SlackField, SlackMessage};
