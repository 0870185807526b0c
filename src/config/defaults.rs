use std::time::Duration;

pub(super) fn default_mode() -> String {
    "pull".to_string()
}

pub(super) const fn default_port() -> u16 {
    8080
}

pub(super) fn default_bind() -> String {
    "0.0.0.0".to_string()
}

pub(super) fn default_pubsub_endpoint() -> String {
    "https://pubsub.googleapis.com".to_string()
}

pub(super) const fn default_max_messages() -> u32 {
    10
}

pub(super) const fn default_pull_timeout() -> Duration {
    Duration::from_secs(90)
}

pub(super) const fn default_delivery_timeout() -> Duration {
    Duration::from_secs(5)
}

pub(super) const fn default_connect_timeout() -> Duration {
    Duration::from_secs(3)
}
