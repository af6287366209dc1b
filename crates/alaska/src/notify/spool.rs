//! Mail spool notifier.
//!
//! Writes one JSON message per notification into a spool directory that an
//! external mail relay drains. Each file carries `from`, `to`, `subject` and
//! `message`. Files are written under a `.part` name and renamed once
//! complete so the relay never picks up a half-written message.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use super::{Notification, Notifier, NotifyError};

#[derive(Debug, Serialize)]
struct SpooledMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    message: &'a str,
}

#[derive(Debug, Clone)]
pub struct MailSpoolNotifier {
    directory: PathBuf,
    from: String,
}

impl MailSpoolNotifier {
    pub fn new(directory: impl Into<PathBuf>, from: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            from: from.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl Notifier for MailSpoolNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let Some(to) = notification.recipient.as_deref() else {
            log::debug!(
                "Project {} has no contact address; skipping {:?} mail",
                notification.project_id,
                notification.kind
            );
            return Ok(());
        };

        std::fs::create_dir_all(&self.directory).map_err(|e| NotifyError::Spool {
            path: self.directory.clone(),
            source: e,
        })?;

        let body = serde_json::to_vec_pretty(&SpooledMail {
            from: &self.from,
            to,
            subject: &notification.subject,
            message: &notification.message,
        })?;

        let stem = format!(
            "{}-{}",
            Utc::now().format("%Y%m%dT%H%M%S%.3f"),
            uuid::Uuid::new_v4()
        );
        let partial = self.directory.join(format!("{}.json.part", stem));
        let path = self.directory.join(format!("{}.json", stem));

        std::fs::write(&partial, body).map_err(|e| NotifyError::Spool {
            path: partial.clone(),
            source: e,
        })?;
        std::fs::rename(&partial, &path).map_err(|e| NotifyError::Spool {
            path: path.clone(),
            source: e,
        })?;

        log::debug!("Spooled {:?} mail to {}", notification.kind, path.display());
        Ok(())
    }
}
