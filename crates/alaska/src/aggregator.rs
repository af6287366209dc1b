//! Project-level progress derived from the project's jobs.

use chrono::Utc;
use rusqlite::Connection;

use crate::db::{job_repo, project_repo};
use crate::error::Result;
use crate::model::{JobStatus, Project, ProjectProgress};
use crate::notify::Notification;

pub struct ProjectStateAggregator<'c> {
    conn: &'c Connection,
}

impl<'c> ProjectStateAggregator<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Re-evaluates `project` after one of its jobs succeeded.
    ///
    /// Only the current plan counts: the jobs up to and including the
    /// archive job, in step order. Jobs behind it belong to analyses that
    /// were deactivated since. Once every planned job is `success` the
    /// project moves to `success`, exactly once, and a completion
    /// notification is returned.
    pub fn on_job_succeeded(&self, project: &mut Project) -> Result<Option<Notification>> {
        if project.progress == ProjectProgress::Success {
            return Ok(None);
        }

        let jobs = job_repo::list_for_project_by_step(self.conn, &project.id)?;
        let Some(last) = jobs.iter().position(|job| job.archive) else {
            return Ok(None);
        };
        let planned = &jobs[..=last];
        if planned.iter().any(|job| job.status != JobStatus::Success) {
            return Ok(None);
        }

        project.progress = ProjectProgress::Success;
        project.updated_at = Utc::now();
        project_repo::update(self.conn, project)?;

        log::info!(
            "Project {} completed all {} planned job(s)",
            project.id,
            planned.len()
        );
        Ok(Some(Notification::completed(project)))
    }
}
