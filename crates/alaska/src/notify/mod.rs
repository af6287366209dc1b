//! Fire-and-forget project notifications.
//!
//! The scheduler emits a [`Notification`] for every project milestone after
//! the triggering transaction has committed. Delivery errors are logged by
//! the caller and never fail the operation that produced them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod broadcast;
pub mod spool;

pub use broadcast::BroadcastNotifier;
pub use spool::MailSpoolNotifier;

use crate::model::Project;

/// Milestone a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Queued,
    Started,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub project_id: String,
    pub kind: NotificationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    pub subject: String,
    pub message: String,
}

impl Notification {
    pub fn queued(project: &Project) -> Self {
        Self::for_project(
            project,
            NotificationKind::Queued,
            format!("Project {} queued", project.id),
            "Your project has been queued for analysis. You will be notified when it starts."
                .to_string(),
        )
    }

    pub fn started(project: &Project) -> Self {
        Self::for_project(
            project,
            NotificationKind::Started,
            format!("Project {} started", project.id),
            "Analysis of your project has started.".to_string(),
        )
    }

    pub fn completed(project: &Project) -> Self {
        Self::for_project(
            project,
            NotificationKind::Completed,
            format!("Project {} completed", project.id),
            "All analysis steps of your project finished successfully.".to_string(),
        )
    }

    pub fn failed(project: &Project, step: &str) -> Self {
        Self::for_project(
            project,
            NotificationKind::Failed,
            format!("Project {} failed", project.id),
            format!(
                "Analysis step '{}' failed. The remaining steps were removed from the queue \
                 and can be resumed by restarting the project.",
                step
            ),
        )
    }

    fn for_project(
        project: &Project,
        kind: NotificationKind,
        subject: String,
        message: String,
    ) -> Self {
        Self {
            project_id: project.id.clone(),
            kind,
            recipient: project.email.clone(),
            subject,
            message,
        }
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Failed to write notification '{path}': {source}")]
    Spool {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode notification: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Sink for project notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Delivers each notification, logging and swallowing failures.
pub(crate) fn deliver_all(notifier: &dyn Notifier, notifications: &[Notification]) {
    for notification in notifications {
        if let Err(e) = notifier.notify(notification) {
            log::warn!(
                "Failed to deliver {:?} notification for project {}: {}",
                notification.kind,
                notification.project_id,
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Failing;

    impl Notifier for Failing {
        fn notify(&self, _notification: &Notification) -> Result<(), NotifyError> {
            Err(NotifyError::Spool {
                path: "/nonexistent".into(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        }
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<NotificationKind>>);

    impl Notifier for Recording {
        fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.0.lock().unwrap().push(notification.kind);
            Ok(())
        }
    }

    #[test]
    fn test_notification_uses_project_email() {
        let project = Project::new(Some("lab@example.org".to_string()));
        let n = Notification::failed(&project, "quant");
        assert_eq!(n.kind, NotificationKind::Failed);
        assert_eq!(n.recipient.as_deref(), Some("lab@example.org"));
        assert!(n.message.contains("'quant'"));
        assert!(n.subject.contains(&project.id));
    }

    #[test]
    fn test_deliver_all_swallows_failures() {
        let project = Project::new(None);
        deliver_all(
            &Failing,
            &[Notification::queued(&project), Notification::started(&project)],
        );
    }

    #[test]
    fn test_deliver_all_preserves_order() {
        let project = Project::new(None);
        let recording = Recording::default();
        deliver_all(
            &recording,
            &[
                Notification::started(&project),
                Notification::completed(&project),
            ],
        );
        assert_eq!(
            *recording.0.lock().unwrap(),
            vec![NotificationKind::Started, NotificationKind::Completed]
        );
    }
}
