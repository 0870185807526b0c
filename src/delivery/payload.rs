use serde::Serialize;

use crate::notification::Notification;

/// Incoming-webhook body understood by Slack and compatible chat services.
#[derive(Debug, Serialize)]
pub struct SlackMessage<'a> {
    pub attachments: Vec<SlackAttachment<'a>>,
}

#[derive(Debug, Serialize)]
pub struct SlackAttachment<'a> {
    pub fallback: &'a str,
    pub color: &'a str,
    pub title: &'a str,
    pub title_link: &'a str,
    pub fields: Vec<SlackField<'a>>,
}

#[derive(Debug, Serialize)]
pub struct SlackField<'a> {
    pub title: &'a str,
    pub value: &'a str,
}

impl<'a> From<&'a Notification> for SlackMessage<'a> {
    fn from(notification: &'a Notification) -> Self {
        Self {
            attachments: vec![SlackAttachment {
                fallback: &notification.fallback_text,
                color: notification.color,
                title: &notification.title,
                title_link: &notification.title_link,
                fields: notification
                    .fields
                    .iter()
                    .map(|field| SlackField {
                        title: field.label,
                        value: &field.value,
                    })
                    .collect(),
            }],
        }
    }
}
