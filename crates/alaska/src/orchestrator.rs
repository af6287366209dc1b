//! Expands a project's active analysis steps into jobs and (re)enqueues the
//! ones that still have to run.

use chrono::Utc;
use log::{debug, info};
use rusqlite::Connection;

use crate::db::{analysis_repo, job_repo, project_repo};
use crate::error::{AlaskaError, Result};
use crate::model::{Job, JobStatus, Project, ProjectProgress};
use crate::notify::Notification;
use crate::queue::QueueManager;

/// Outcome of planning one project.
#[derive(Debug, Clone)]
pub struct Plan {
    pub project: Project,
    /// The project's jobs aligned with the active analyses, in step order.
    pub jobs: Vec<Job>,
    pub created: usize,
    pub enqueued: usize,
    pub notifications: Vec<Notification>,
}

pub struct PipelineOrchestrator<'c> {
    conn: &'c Connection,
    queue: QueueManager<'c>,
}

impl<'c> PipelineOrchestrator<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            queue: QueueManager::new(conn),
        }
    }

    /// Plans `project_id` against the active analysis catalog.
    ///
    /// Jobs are matched to analyses by index in step order. Succeeded and
    /// running jobs are left alone, queued jobs keep their position, and
    /// failed or parked jobs go back to the tail of the queue. Missing jobs
    /// are created. Jobs beyond the active catalog are pulled out of the
    /// queue. Running it twice without intervening transitions changes
    /// nothing.
    pub fn plan(&self, project_id: &str) -> Result<Plan> {
        let mut project = project_repo::find_by_id(self.conn, project_id)?
            .ok_or_else(|| AlaskaError::not_found("project", project_id))?;

        let analyses = analysis_repo::list_active(self.conn)?;
        if analyses.is_empty() {
            return Err(AlaskaError::validation(
                "no active analyses to plan the project against",
            ));
        }

        let mut existing = job_repo::list_for_project_by_step(self.conn, project_id)?;
        if existing.len() > analyses.len() {
            let stale = existing.split_off(analyses.len());
            if self.retire(stale)? > 0 {
                // Compaction moved positions.
                existing = job_repo::list_for_project_by_step(self.conn, project_id)?;
                existing.truncate(analyses.len());
            }
        }

        let mut jobs = Vec::with_capacity(analyses.len());
        let mut created = 0;
        let mut enqueued = 0;
        let mut existing = existing.into_iter();

        for analysis in &analyses {
            let mut job = match existing.next() {
                Some(job) => job,
                None => {
                    let job = Job::new(&project.id, &analysis.id);
                    job_repo::insert(self.conn, &job)?;
                    created += 1;
                    job
                }
            };

            match job.status {
                JobStatus::Success | JobStatus::Running => {}
                JobStatus::Queued if job.queue_position.is_some() => {}
                JobStatus::Queued | JobStatus::Error => {
                    self.queue.enqueue(&mut job)?;
                    enqueued += 1;
                }
            }
            jobs.push(job);
        }

        let last = jobs.len() - 1;
        for (i, job) in jobs.iter_mut().enumerate() {
            let archive = i == last;
            if job.archive != archive {
                job.archive = archive;
                job_repo::update(self.conn, job)?;
            }
        }

        let mut notifications = Vec::new();
        if enqueued > 0 {
            if project.progress != ProjectProgress::Running {
                project.progress = ProjectProgress::Queued;
                project.updated_at = Utc::now();
                project_repo::update(self.conn, &project)?;
            }
            notifications.push(Notification::queued(&project));
            info!(
                "Planned project {}: {} job(s), {} created, {} enqueued",
                project.id,
                jobs.len(),
                created,
                enqueued
            );
        } else {
            debug!("Project {} has nothing to enqueue", project.id);
        }

        Ok(Plan {
            project,
            jobs,
            created,
            enqueued,
            notifications,
        })
    }

    /// Takes jobs past the active catalog out of the current plan: they
    /// lose the archive flag and leave the queue, but keep their records
    /// and status. Returns how many were pulled from the queue.
    fn retire(&self, stale: Vec<Job>) -> Result<usize> {
        let mut pulled = 0;
        for mut job in stale {
            let positioned = job.queue_position.is_some();
            if !job.archive && !positioned {
                continue;
            }
            if positioned {
                self.queue.remove_from_queue(&mut job)?;
                pulled += 1;
            }
            job.archive = false;
            job_repo::update(self.conn, &job)?;
        }
        if pulled > 0 {
            self.queue.compact()?;
            debug!("Pulled {} job(s) of inactive analyses from the queue", pulled);
        }
        Ok(pulled)
    }

    /// Marks the project finalized, seeds its progress counter and plans it.
    pub fn start_project(&self, project_id: &str, finalized_progress: i64) -> Result<Plan> {
        let mut project = project_repo::find_by_id(self.conn, project_id)?
            .ok_or_else(|| AlaskaError::not_found("project", project_id))?;

        project.finalized = true;
        project.old_progress = finalized_progress;
        project.updated_at = Utc::now();
        project_repo::update(self.conn, &project)?;

        self.plan(project_id)
    }
}
