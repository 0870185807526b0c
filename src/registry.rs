use std::collections::BTreeMap;

use tracing::{info, warn};
use url::Url;

use crate::error::ConfigError;

const ENTRY_SEPARATOR: char = ',';
const FIELD_SEPARATOR: char = '|';

/// A subscription and the webhook its notifications go to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionEntry {
    pub id: String,
    pub project_id: String,
    /// Empty for monitoring-only subscriptions.
    pub url: String,
}

impl SubscriptionEntry {
    pub fn new(
        id: impl Into<String>,
        project_id: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            url: url.into(),
        }
    }

    pub fn key(&self) -> String {
        subscription_path(&self.project_id, &self.id)
    }
}

/// Broker resource path used as the lookup key by both transports.
pub fn subscription_path(project_id: &str, subscription_id: &str) -> String {
    format!("projects/{project_id}/subscriptions/{subscription_id}")
}

/// Parse the `id|project|url,id|project|url` list form.
///
/// Malformed entries are logged and skipped.
pub fn parse_subscription_list(list: &str) -> Vec<SubscriptionEntry> {
    list.trim()
        .split(ENTRY_SEPARATOR)
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .filter_map(|raw| {
            let parts: Vec<&str> = raw.split(FIELD_SEPARATOR).map(str::trim).collect();
            match parts.as_slice() {
                [id, project, url] => Some(SubscriptionEntry::new(*id, *project, *url)),
                _ => {
                    warn!(
                        entry = raw,
                        fields = parts.len(),
                        "skipping subscription entry, expected id|project|url"
                    );
                    None
                }
            }
        })
        .collect()
}

/// Immutable subscription lookup table, built once at startup.
#[derive(Debug, Default)]
pub struct Registry {
    entries: BTreeMap<String, SubscriptionEntry>,
}

impl Registry {
    pub fn new(entries: impl IntoIterator<Item = SubscriptionEntry>) -> Self {
        let mut map = BTreeMap::new();
        for entry in entries {
            if entry.id.is_empty() || entry.project_id.is_empty() {
                warn!(
                    subscription = %entry.id,
                    project = %entry.project_id,
                    "skipping subscription with empty identity"
                );
                continue;
            }
            if !entry.url.is_empty() {
                if let Err(err) = Url::parse(&entry.url) {
                    warn!(
                        subscription = %entry.id,
                        project = %entry.project_id,
                        error = %err,
                        "skipping subscription with invalid destination URL"
                    );
                    continue;
                }
            }
            let key = entry.key();
            info!(%key, "loaded subscription");
            if map.insert(key.clone(), entry).is_some() {
                warn!(%key, "duplicate subscription, keeping the last definition");
            }
        }
        Self { entries: map }
    }

    /// Look up by full resource path, or by bare subscription name when it is
    /// unambiguous.
    pub fn resolve(&self, key: &str) -> Option<&SubscriptionEntry> {
        if let Some(entry) = self.entries.get(key) {
            return Some(entry);
        }
        if key.contains('/') {
            return None;
        }
        let mut matches = self.entries.values().filter(|entry| entry.id == key);
        let first = matches.next()?;
        if matches.next().is_some() {
            warn!(subscription = key, "ambiguous subscription name");
            return None;
        }
        Some(first)
    }

    /// Fail on the first destination that is not `https`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] naming the offending subscription.
    pub fn require_https(&self) -> std::result::Result<(), ConfigError> {
        let insecure = self.entries.iter().find(|(_, entry)| {
            !entry.url.is_empty()
                && Url::parse(&entry.url).is_ok_and(|url| url.scheme() != "https")
        });
        match insecure {
            Some((key, _)) => Err(ConfigError::InvalidField {
                field: "relay.subscriptions",
                message: format!("{key}: destination must use https without --insecure"),
            }),
            None => Ok(()),
        }
    }

    pub fn destination(&self, key: &str) -> Option<&str> {
        self.resolve(key).map(|entry| entry.url.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = &SubscriptionEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Registry, SubscriptionEntry, parse_subscription_list, subscription_path};
    use crate::error::ConfigError;

    #[test]
    fn parses_list_and_skips_malformed_entries() {
        let entries = parse_subscription_list(
            " builds|proj-a|https://hooks.slack.com/a , broken|proj-b ,\
             too|many|fields|here, quiet|proj-c|",
        );
        assert_eq!(
            entries,
            vec![
                SubscriptionEntry::new("builds", "proj-a", "https://hooks.slack.com/a"),
                SubscriptionEntry::new("quiet", "proj-c", ""),
            ]
        );
    }

    #[test]
    fn empty_list_yields_no_entries() {
        assert!(parse_subscription_list("").is_empty());
        assert!(parse_subscription_list(" , ").is_empty());
    }

    #[test]
    fn resolves_by_resource_path() {
        let registry = Registry::new(parse_subscription_list(
            "builds|proj-a|https://hooks.example/a,builds|proj-b|https://hooks.example/b",
        ));
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.destination(&subscription_path("proj-b", "builds")),
            Some("https://hooks.example/b")
        );
        assert_eq!(registry.destination("projects/proj-c/subscriptions/builds"), None);
    }

    #[test]
    fn bare_names_resolve_only_when_unique() {
        let registry = Registry::new(vec![
            SubscriptionEntry::new("shared", "a", "https://hooks.example/1"),
            SubscriptionEntry::new("shared", "b", "https://hooks.example/2"),
            SubscriptionEntry::new("solo", "a", "https://hooks.example/3"),
        ]);
        assert_eq!(registry.destination("solo"), Some("https://hooks.example/3"));
        assert_eq!(registry.destination("shared"), None);
        assert_eq!(registry.destination("missing"), None);
    }

    #[test]
    fn invalid_entries_are_dropped() {
        let registry = Registry::new(vec![
            SubscriptionEntry::new("", "a", ""),
            SubscriptionEntry::new("bad-url", "a", "not a url"),
            SubscriptionEntry::new("monitor", "a", ""),
        ]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.destination("projects/a/subscriptions/monitor"), Some(""));
    }

    #[test]
    fn plain_http_destinations_fail_the_https_check() {
        let registry = Registry::new(vec![
            SubscriptionEntry::new("secure", "p", "https://hooks.example/a"),
            SubscriptionEntry::new("quiet", "p", ""),
            SubscriptionEntry::new("local", "p", "http://127.0.0.1:9000/hook"),
        ]);
        let err = match registry.require_https() {
            Ok(()) => panic!("http destination accepted"),
            Err(err) => err,
        };
        assert!(matches!(
            err,
            ConfigError::InvalidField { field: "relay.subscriptions", ref message }
                if message.contains("projects/p/subscriptions/local")
        ));

        let secure = Registry::new(vec![
            SubscriptionEntry::new("secure", "p", "https://hooks.example/a"),
            SubscriptionEntry::new("quiet", "p", ""),
        ]);
        assert!(secure.require_https().is_ok());
    }
}
