//! Ownership cascades on deletion.
//!
//! Foreign keys carry no `ON DELETE CASCADE`; each owner explicitly deletes
//! what it owns, so a missing step surfaces as a constraint error instead of
//! silently orphaning rows.

use log::info;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::{job_repo, project_repo, sample_repo};
use crate::error::{AlaskaError, Result, TransportError};
use crate::model::Project;
use crate::queue::QueueManager;

/// Rows removed by a cascade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReport {
    pub projects: usize,
    pub jobs: usize,
    pub samples: usize,
    pub reads: usize,
}

impl DeleteReport {
    fn absorb(&mut self, other: DeleteReport) {
        self.projects += other.projects;
        self.jobs += other.jobs;
        self.samples += other.samples;
        self.reads += other.reads;
    }
}

/// Deletes one entity together with everything it owns.
pub trait CascadeDelete {
    fn delete(&self, conn: &Connection, id: &str) -> Result<DeleteReport>;
}

/// External storage and visualization session bound to a project.
pub trait ProjectResources: Send + Sync {
    /// Launches the project's visualization session and returns the port it
    /// listens on.
    fn open_session(&self, project: &Project) -> std::result::Result<u16, TransportError>;

    /// Frees storage and stops the session on `project.session_port`, if
    /// any. Called before any row of the project is removed.
    fn release(&self, project: &Project) -> std::result::Result<(), TransportError>;
}

/// No external side: nothing to release and no sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoResources;

impl ProjectResources for NoResources {
    fn open_session(&self, _project: &Project) -> std::result::Result<u16, TransportError> {
        Err(TransportError::RequestFailed {
            endpoint: "session".to_string(),
            reason: "no visualization backend configured".to_string(),
        })
    }

    fn release(&self, _project: &Project) -> std::result::Result<(), TransportError> {
        Ok(())
    }
}

pub struct SampleDeleter;

impl CascadeDelete for SampleDeleter {
    fn delete(&self, conn: &Connection, id: &str) -> Result<DeleteReport> {
        if sample_repo::find_sample(conn, id)?.is_none() {
            return Err(AlaskaError::not_found("sample", id));
        }
        let reads = sample_repo::delete_reads_for_sample(conn, id)?;
        let samples = sample_repo::delete_sample(conn, id)?;
        Ok(DeleteReport {
            samples,
            reads,
            ..DeleteReport::default()
        })
    }
}

pub struct ProjectDeleter;

impl CascadeDelete for ProjectDeleter {
    fn delete(&self, conn: &Connection, id: &str) -> Result<DeleteReport> {
        if project_repo::find_by_id(conn, id)?.is_none() {
            return Err(AlaskaError::not_found("project", id));
        }

        let mut report = DeleteReport {
            jobs: job_repo::delete_for_project(conn, id)?,
            ..DeleteReport::default()
        };
        for sample in sample_repo::list_samples(conn, id)? {
            report.absorb(SampleDeleter.delete(conn, &sample.id)?);
        }
        report.projects = project_repo::delete(conn, id)?;

        let remaining = QueueManager::new(conn).compact()?;
        info!(
            "Deleted project {} ({} job(s), {} sample(s), {} read(s)); {} job(s) left in queue",
            id, report.jobs, report.samples, report.reads, remaining
        );
        Ok(report)
    }
}
