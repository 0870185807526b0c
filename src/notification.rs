use crate::event::{BuildEvent, Provenance};

const TITLE: &str = "Cloud Build";
const FALLBACK_PREFIX: &str = "cloudbuild: ";
const EMPTY_IMAGES: &str = "-";
const CONSOLE_BUILD_URL: &str = "https://console.cloud.google.com/cloud-build/builds";

/// Destination-agnostic chat notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub color: &'static str,
    pub fallback_text: String,
    pub title: String,
    pub title_link: String,
    pub fields: Vec<Field>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub label: &'static str,
    pub value: String,
}

impl Field {
    fn new(label: &'static str, value: impl Into<String>) -> Self {
        Self {
            label,
            value: value.into(),
        }
    }
}

impl Notification {
    /// Render an event, or `None` when its status is not worth a message.
    pub fn from_event(event: &BuildEvent) -> Option<Self> {
        let color = event.status.color()?;

        let images = if event.images.is_empty() {
            EMPTY_IMAGES.to_string()
        } else {
            event.images.join("\n")
        };

        let mut fields = vec![Field::new("Build ID", &event.id), Field::new("Images", images)];
        let mut project_id = event.project_id.as_str();
        let identity = match &event.provenance {
            Some(Provenance::Repo {
                project_id: repo_project,
                repo_name,
                commit_sha,
            }) => {
                if !repo_project.is_empty() {
                    project_id = repo_project.as_str();
                }
                fields.push(Field::new("Repository", repo_name));
                fields.push(Field::new("Commit SHA", commit_sha));
                format!("{repo_name}:{commit_sha}")
            }
            Some(Provenance::Substitution {
                repo_name,
                commit_sha,
                ..
            }) => {
                fields.push(Field::new("Repository", repo_name));
                fields.push(Field::new("Commit SHA", commit_sha));
                format!("{repo_name}:{commit_sha}")
            }
            Some(Provenance::Storage { bucket, object }) => {
                fields.push(Field::new("Bucket", bucket));
                fields.push(Field::new("Object", object));
                format!("{bucket}/{object}")
            }
            None => String::new(),
        };
        fields.push(Field::new("Project ID", project_id));
        fields.push(Field::new("Status", event.status.as_str()));

        Some(Self {
            color,
            fallback_text: format!("{FALLBACK_PREFIX}{identity}"),
            title: TITLE.to_string(),
            title_link: title_link(event, project_id),
            fields,
        })
    }

    pub fn field(&self, label: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.label == label)
            .map(|field| field.value.as_str())
    }
}

fn title_link(event: &BuildEvent, project_id: &str) -> String {
    if !event.log_url.is_empty() {
        return event.log_url.clone();
    }
    if event.id.is_empty() || project_id.is_empty() {
        return String::new();
    }
    format!("{CONSOLE_BUILD_URL}/{}?project={project_id}", event.id)
}

#[cfg(test)]
mod tests {
    use super::Notification;
    use crate::event::{BuildEvent, Provenance, normalize};
    use crate::types::BuildStatus;

    fn event(json: &str) -> BuildEvent {
        match normalize(json.as_bytes()) {
            Ok(event) => event,
            Err(err) => panic!("invalid fixture: {err}"),
        }
    }

    fn render(event: &BuildEvent) -> Notification {
        match Notification::from_event(event) {
            Some(notification) => notification,
            None => panic!("status {} was skipped", event.status),
        }
    }

    fn pairs(notification: &Notification) -> Vec<(&str, &str)> {
        notification
            .fields
            .iter()
            .map(|field| (field.label, field.value.as_str()))
            .collect()
    }

    #[test]
    fn repo_build_renders_every_field_in_order() {
        let event = event(
            r#"{"id":"b1","status":"SUCCESS","images":["img:1"],
                "sourceProvenance":{"resolvedRepoSource":{"repoName":"r1","commitSha":"abc123","projectId":"p1"}},
                "logUrl":"https://x"}"#,
        );
        let notification = render(&event);
        assert_eq!(notification.color, "#5bff37");
        assert_eq!(notification.title, "Cloud Build");
        assert_eq!(notification.title_link, "https://x");
        assert_eq!(notification.fallback_text, "cloudbuild: r1:abc123");
        assert_eq!(
            pairs(&notification),
            vec![
                ("Build ID", "b1"),
                ("Images", "img:1"),
                ("Repository", "r1"),
                ("Commit SHA", "abc123"),
                ("Project ID", "p1"),
                ("Status", "SUCCESS"),
            ]
        );
    }

    #[test]
    fn queued_build_without_images_uses_placeholder() {
        let notification = render(&event(r#"{"id":"q","status":"QUEUED","images":[]}"#));
        assert_eq!(notification.color, "#508dff");
        assert_eq!(notification.field("Images"), Some("-"));
        assert_eq!(notification.fallback_text, "cloudbuild: ");
    }

    #[test]
    fn images_are_newline_joined() {
        let notification = render(&event(r#"{"status":"WORKING","images":["a:1","b:2"]}"#));
        assert_eq!(notification.field("Images"), Some("a:1\nb:2"));
    }

    #[test]
    fn storage_build_renders_bucket_and_object() {
        let notification = render(&event(
            r#"{"id":"s1","projectId":"p9","status":"FAILURE",
                "sourceProvenance":{"resolvedStorageSource":{"bucket":"bkt","object":"src.tgz"}},
                "substitutions":{}}"#,
        ));
        assert_eq!(notification.field("Bucket"), Some("bkt"));
        assert_eq!(notification.field("Object"), Some("src.tgz"));
        assert_eq!(notification.field("Repository"), None);
        assert_eq!(notification.field("Commit SHA"), None);
        assert_eq!(notification.field("Project ID"), Some("p9"));
        assert_eq!(notification.fallback_text, "cloudbuild: bkt/src.tgz");
    }

    #[test]
    fn repo_only_build_has_no_storage_fields() {
        let notification = render(&event(
            r#"{"status":"TIMEOUT","sourceProvenance":{"resolvedRepoSource":{"repoName":"r","commitSha":"c"}}}"#,
        ));
        assert_eq!(notification.field("Repository"), Some("r"));
        assert_eq!(notification.field("Commit SHA"), Some("c"));
        assert_eq!(notification.field("Bucket"), None);
        assert_eq!(notification.field("Object"), None);
    }

    #[test]
    fn substitution_repository_wins_over_storage() {
        let notification = render(&event(
            r#"{"id":"g1","projectId":"p","status":"CANCELLED",
                "sourceProvenance":{"resolvedStorageSource":{"bucket":"bkt","object":"o"}},
                "substitutions":{"REPO_NAME":"gh-repo","COMMIT_SHA":"f00d"}}"#,
        ));
        assert_eq!(notification.color, "#b959ff");
        assert_eq!(notification.field("Repository"), Some("gh-repo"));
        assert_eq!(notification.field("Commit SHA"), Some("f00d"));
        assert_eq!(notification.field("Bucket"), None);
    }

    #[test]
    fn unknown_status_is_skipped() {
        let event = event(r#"{"id":"u","status":"UNKNOWN_FUTURE_STATUS"}"#);
        assert!(Notification::from_event(&event).is_none());
    }

    #[test]
    fn skip_iff_status_absent_from_color_table() {
        for status in [
            "QUEUED",
            "WORKING",
            "SUCCESS",
            "FAILURE",
            "INTERNAL_ERROR",
            "TIMEOUT",
            "CANCELLED",
            "STATUS_UNKNOWN",
            "PENDING",
            "",
        ] {
            let event = BuildEvent {
                id: "b".into(),
                project_id: String::new(),
                status: BuildStatus::from(status),
                images: Vec::new(),
                log_url: String::new(),
                trigger_id: String::new(),
                provenance: None,
            };
            assert_eq!(
                Notification::from_event(&event).is_none(),
                event.status.color().is_none(),
                "status {status}"
            );
        }
    }

    #[test]
    fn title_link_is_synthesized_without_log_url() {
        let notification = render(&event(r#"{"id":"b7","projectId":"proj","status":"SUCCESS"}"#));
        assert_eq!(
            notification.title_link,
            "https://console.cloud.google.com/cloud-build/builds/b7?project=proj"
        );

        let anonymous = render(&event(r#"{"status":"SUCCESS"}"#));
        assert_eq!(anonymous.title_link, "");
    }

    #[test]
    fn repo_provenance_without_project_falls_back_to_event_project() {
        let event = BuildEvent {
            id: "b".into(),
            project_id: "outer".into(),
            status: BuildStatus::Working,
            images: Vec::new(),
            log_url: String::new(),
            trigger_id: String::new(),
            provenance: Some(Provenance::Repo {
                project_id: String::new(),
                repo_name: "r".into(),
                commit_sha: "c".into(),
            }),
        };
        assert_eq!(render(&event).field("Project ID"), Some("outer"));
    }
}
