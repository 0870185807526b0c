use std::time::Duration;

use humantime::parse_duration;
use serde::Deserialize;
use serde_with::DeserializeAs;

/// Duration written as `"5s"`/`"1m 30s"`, or as a bare number of seconds.
pub(super) struct HumantimeDuration;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    Text(String),
}

impl<'de> DeserializeAs<'de, Duration> for HumantimeDuration {
    fn deserialize_as<D>(deserializer: D) -> std::result::Result<Duration, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match RawDuration::deserialize(deserializer)? {
            RawDuration::Seconds(secs) => Ok(Duration::from_secs(secs)),
            RawDuration::Text(raw) => {
                parse_duration(raw.trim()).map_err(serde::de::Error::custom)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::HumantimeDuration;
    use serde::Deserialize;
    use serde_with::serde_as;
    use std::time::Duration;

    #[serde_as]
    #[derive(Deserialize)]
    struct Sample {
        #[serde_as(as = "Option<HumantimeDuration>")]
        duration: Option<Duration>,
    }

    fn parse(json: &str) -> Option<Duration> {
        match serde_json::from_str::<Sample>(json) {
            Ok(value) => value.duration,
            Err(err) => panic!("failed to parse sample json: {err}"),
        }
    }

    #[test]
    fn humantime_duration_parses_strings() {
        assert_eq!(parse(r#"{"duration":"5s"}"#), Some(Duration::from_secs(5)));
        assert_eq!(parse(r#"{"duration":"1m 30s"}"#), Some(Duration::from_secs(90)));
    }

    #[test]
    fn humantime_duration_accepts_bare_seconds() {
        assert_eq!(parse(r#"{"duration":7}"#), Some(Duration::from_secs(7)));
    }

    #[test]
    fn humantime_duration_rejects_garbage() {
        assert!(serde_json::from_str::<Sample>(r#"{"duration":"soon"}"#).is_err());
    }
}
