//! Canonical build events.
//!
//! Cloud Build has published several incompatible payload shapes over time.
//! [`normalize`] folds all of them into one [`BuildEvent`].

use std::collections::HashMap;

use crate::error::ParseError;
use crate::types::BuildStatus;

mod raw;

use raw::RawBuild;

const ATTR_BUILD_ID: &str = "buildId";
const ATTR_STATUS: &str = "status";

const SUB_REPO_NAME: &str = "REPO_NAME";
const SUB_BRANCH_NAME: &str = "BRANCH_NAME";
const SUB_COMMIT_SHA: &str = "COMMIT_SHA";
const SUB_REVISION_ID: &str = "REVISION_ID";
const SUB_SHORT_SHA: &str = "SHORT_SHA";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildEvent {
    pub id: String,
    pub project_id: String,
    pub status: BuildStatus,
    pub images: Vec<String>,
    pub log_url: String,
    pub trigger_id: String,
    pub provenance: Option<Provenance>,
}

/// Where the built source came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provenance {
    Repo {
        project_id: String,
        repo_name: String,
        commit_sha: String,
    },
    Storage {
        bucket: String,
        object: String,
    },
    /// GitHub-app triggered builds report a storage source, the repository
    /// identity only survives in the substitution variables.
    Substitution {
        repo_name: String,
        branch_name: String,
        commit_sha: String,
        revision_id: String,
        short_sha: String,
    },
}

/// Parse a raw build payload.
///
/// # Errors
///
/// Returns [`ParseError`] when the payload is empty or is not a JSON object.
/// Missing optional sections are never an error.
pub fn normalize(data: &[u8]) -> std::result::Result<BuildEvent, ParseError> {
    if data.iter().all(u8::is_ascii_whitespace) {
        return Err(ParseError::Empty);
    }
    let raw: RawBuild = serde_json::from_slice(data)?;
    Ok(BuildEvent::from(raw))
}

/// Parse a broker message, falling back to its attributes.
///
/// Legacy publishers sent empty data and put `buildId`/`status` in the
/// message attributes.
///
/// # Errors
///
/// Same as [`normalize`] when the data is not usable and the attributes do
/// not carry a status.
pub fn normalize_message(
    data: &[u8],
    attributes: &HashMap<String, String>,
) -> std::result::Result<BuildEvent, ParseError> {
    match normalize(data) {
        Err(ParseError::Empty) => {
            from_attributes(attributes).ok_or(ParseError::Empty)
        }
        other => other,
    }
}

fn from_attributes(attributes: &HashMap<String, String>) -> Option<BuildEvent> {
    let status = attributes.get(ATTR_STATUS)?;
    Some(BuildEvent {
        id: attributes.get(ATTR_BUILD_ID).cloned().unwrap_or_default(),
        project_id: String::new(),
        status: BuildStatus::from(status.as_str()),
        images: Vec::new(),
        log_url: String::new(),
        trigger_id: String::new(),
        provenance: None,
    })
}

impl From<RawBuild> for BuildEvent {
    fn from(mut raw: RawBuild) -> Self {
        let provenance = resolve_provenance(&mut raw);
        let images = if raw.images.is_empty() {
            raw.artifacts.images
        } else {
            raw.images
        };
        Self {
            id: raw.id,
            project_id: raw.project_id,
            status: BuildStatus::from(raw.status.as_str()),
            images,
            log_url: raw.log_url,
            trigger_id: raw.build_trigger_id,
            provenance,
        }
    }
}

fn resolve_provenance(raw: &mut RawBuild) -> Option<Provenance> {
    let resolved = &mut raw.source_provenance;

    if let Some(repo) = resolved.resolved_repo_source.take() {
        if !repo.is_empty() {
            return Some(Provenance::Repo {
                project_id: repo.project_id,
                repo_name: repo.repo_name,
                commit_sha: repo.commit_sha,
            });
        }
    }

    let subs = &mut raw.substitutions;
    if subs.get(SUB_REPO_NAME).is_some_and(|name| !name.is_empty()) {
        let mut take = |key: &str| subs.remove(key).unwrap_or_default();
        return Some(Provenance::Substitution {
            repo_name: take(SUB_REPO_NAME),
            branch_name: take(SUB_BRANCH_NAME),
            commit_sha: take(SUB_COMMIT_SHA),
            revision_id: take(SUB_REVISION_ID),
            short_sha: take(SUB_SHORT_SHA),
        });
    }

    resolved
        .resolved_storage_source
        .take()
        .filter(|storage| !storage.is_empty())
        .map(|storage| Provenance::Storage {
            bucket: storage.bucket,
            object: storage.object,
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{BuildEvent, Provenance, normalize, normalize_message};
    use crate::error::ParseError;
    use crate::types::BuildStatus;

    fn parse(json: &str) -> BuildEvent {
        match normalize(json.as_bytes()) {
            Ok(event) => event,
            Err(err) => panic!("failed to normalize {json}: {err}"),
        }
    }

    #[test]
    fn repo_source_build() {
        let event = parse(
            r#"{
                "id": "b1",
                "status": "SUCCESS",
                "images": ["img:1"],
                "sourceProvenance": {
                    "resolvedRepoSource": {"repoName": "r1", "commitSha": "abc123", "projectId": "p1"}
                },
                "logUrl": "https://x"
            }"#,
        );
        assert_eq!(event.id, "b1");
        assert_eq!(event.status, BuildStatus::Success);
        assert_eq!(event.images, vec!["img:1".to_string()]);
        assert_eq!(event.log_url, "https://x");
        assert_eq!(
            event.provenance,
            Some(Provenance::Repo {
                project_id: "p1".into(),
                repo_name: "r1".into(),
                commit_sha: "abc123".into(),
            })
        );
    }

    #[test]
    fn storage_source_build() {
        let event = parse(
            r#"{
                "id": "b2",
                "projectId": "p2",
                "status": "WORKING",
                "sourceProvenance": {
                    "resolvedStorageSource": {"bucket": "p2_cloudbuild", "object": "source/123.tgz", "generation": "17"}
                },
                "substitutions": {}
            }"#,
        );
        assert_eq!(
            event.provenance,
            Some(Provenance::Storage {
                bucket: "p2_cloudbuild".into(),
                object: "source/123.tgz".into(),
            })
        );
    }

    #[test]
    fn substitutions_take_precedence_over_storage() {
        let event = parse(
            r#"{
                "id": "b3",
                "projectId": "p3",
                "status": "FAILURE",
                "sourceProvenance": {
                    "resolvedStorageSource": {"bucket": "p3_cloudbuild", "object": "source/9.tgz"}
                },
                "substitutions": {
                    "REPO_NAME": "widgets",
                    "BRANCH_NAME": "main",
                    "COMMIT_SHA": "deadbeef",
                    "REVISION_ID": "deadbeef",
                    "SHORT_SHA": "deadbee"
                }
            }"#,
        );
        assert_eq!(
            event.provenance,
            Some(Provenance::Substitution {
                repo_name: "widgets".into(),
                branch_name: "main".into(),
                commit_sha: "deadbeef".into(),
                revision_id: "deadbeef".into(),
                short_sha: "deadbee".into(),
            })
        );
    }

    #[test]
    fn resolved_repo_source_beats_substitutions() {
        let event = parse(
            r#"{
                "status": "QUEUED",
                "sourceProvenance": {"resolvedRepoSource": {"repoName": "from-source", "commitSha": "1"}},
                "substitutions": {"REPO_NAME": "from-subs"}
            }"#,
        );
        assert!(matches!(
            event.provenance,
            Some(Provenance::Repo { ref repo_name, .. }) if repo_name == "from-source"
        ));
    }

    #[test]
    fn empty_sections_leave_provenance_unset() {
        let event = parse(
            r#"{
                "status": "QUEUED",
                "sourceProvenance": {"resolvedRepoSource": {}, "resolvedStorageSource": {"bucket": ""}},
                "substitutions": {"REPO_NAME": ""},
                "images": null,
                "artifacts": null
            }"#,
        );
        assert_eq!(event.provenance, None);
        assert!(event.images.is_empty());
    }

    #[test]
    fn status_only_payloads_always_parse() {
        let payloads = [
            r#"{"status":"SUCCESS"}"#,
            r#"{"status":"SUCCESS","sourceProvenance":null}"#,
            r#"{"status":"SUCCESS","sourceProvenance":{}}"#,
            r#"{"status":"SUCCESS","substitutions":null,"logUrl":null}"#,
            r#"{"status":"SUCCESS","source":{"repoSource":{"repoName":"legacy"}},"timeout":"600s"}"#,
            r#"{"status":"SUCCESS","unknownField":{"nested":[1,2,3]}}"#,
        ];
        for payload in payloads {
            let event = parse(payload);
            assert_eq!(event.status, BuildStatus::Success, "payload {payload}");
        }
    }

    #[test]
    fn artifacts_images_fill_in_for_missing_images() {
        let event = parse(r#"{"status":"SUCCESS","artifacts":{"images":["gcr.io/p/app:1"]}}"#);
        assert_eq!(event.images, vec!["gcr.io/p/app:1".to_string()]);
    }

    #[test]
    fn null_image_entries_are_dropped() {
        let event = parse(r#"{"status":"SUCCESS","images":["img:1",null,"img:2"]}"#);
        assert_eq!(event.images, vec!["img:1".to_string(), "img:2".to_string()]);

        let event = parse(r#"{"status":"SUCCESS","images":[null],"artifacts":{"images":[null,"img:3"]}}"#);
        assert_eq!(event.images, vec!["img:3".to_string()]);
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(matches!(normalize(b"not json"), Err(ParseError::Json { .. })));
        assert!(matches!(normalize(b"[1,2]"), Err(ParseError::Json { .. })));
        assert!(matches!(normalize(b""), Err(ParseError::Empty)));
    }

    #[test]
    fn attribute_only_messages_use_attributes() {
        let attributes = HashMap::from([
            ("buildId".to_string(), "legacy-1".to_string()),
            ("status".to_string(), "TIMEOUT".to_string()),
        ]);
        let event = match normalize_message(b"", &attributes) {
            Ok(event) => event,
            Err(err) => panic!("attribute event rejected: {err}"),
        };
        assert_eq!(event.id, "legacy-1");
        assert_eq!(event.status, BuildStatus::Timeout);

        assert!(matches!(
            normalize_message(b"", &HashMap::new()),
            Err(ParseError::Empty)
        ));
    }
}
