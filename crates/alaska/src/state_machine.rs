//! Job lifecycle: `queued → running → success | error`.
//!
//! Each transition validates the current status, persists the job, keeps the
//! queue dense and updates the owning project. Notifications are returned to
//! the caller instead of being sent, so they can be delivered after the
//! transaction commits.

use std::time::Duration;

use chrono::Utc;
use log::{info, warn};
use rusqlite::Connection;

use crate::aggregator::ProjectStateAggregator;
use crate::config::ProgressConfig;
use crate::db::{analysis_repo, job_repo, project_repo};
use crate::error::{AlaskaError, Result};
use crate::model::{Job, JobStatus, Project, ProjectProgress};
use crate::notify::Notification;
use crate::queue::QueueManager;

/// Result of applying one transition.
#[derive(Debug, Clone)]
pub struct Transition {
    pub job: Job,
    pub project: Project,
    pub notifications: Vec<Notification>,
}

pub struct JobStateMachine<'c> {
    conn: &'c Connection,
    queue: QueueManager<'c>,
    progress: Option<&'c ProgressConfig>,
}

impl<'c> JobStateMachine<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            queue: QueueManager::new(conn),
            progress: None,
        }
    }

    /// Seeds `old_progress` from `progress.started` when a step starts.
    pub fn with_progress(mut self, progress: &'c ProgressConfig) -> Self {
        self.progress = Some(progress);
        self
    }

    fn started_seed(&self, job: &Job) -> Result<Option<i64>> {
        let Some(progress) = self.progress.filter(|p| !p.started.is_empty()) else {
            return Ok(None);
        };
        let seed = analysis_repo::find_by_id(self.conn, &job.analysis_id)?
            .and_then(|analysis| progress.started_for(&analysis.code));
        Ok(seed)
    }

    fn load(&self, job_id: &str) -> Result<(Job, Project)> {
        let job = job_repo::find_by_id(self.conn, job_id)?
            .ok_or_else(|| AlaskaError::not_found("job", job_id))?;
        let project = project_repo::find_by_id(self.conn, &job.project_id)?
            .ok_or_else(|| AlaskaError::not_found("project", &job.project_id))?;
        Ok((job, project))
    }

    fn require(job: &Job, expected: JobStatus, action: &'static str) -> Result<()> {
        if job.status != expected {
            return Err(AlaskaError::InvalidTransition {
                job_id: job.id.clone(),
                status: job.status,
                action,
            });
        }
        Ok(())
    }

    /// A worker picked the job up.
    ///
    /// A project runs one step at a time: starting a job while another job
    /// of the same project is running fails with `StepBlocked`.
    pub fn start(&self, job_id: &str) -> Result<Transition> {
        let (mut job, mut project) = self.load(job_id)?;
        Self::require(&job, JobStatus::Queued, "start")?;
        if let Some(running) = job_repo::find_running_for_project(self.conn, &project.id)? {
            return Err(AlaskaError::StepBlocked {
                job_id: job.id,
                running: running.id,
            });
        }

        self.queue.remove_from_queue(&mut job)?;
        job.status = JobStatus::Running;
        job.started_at = Some(Utc::now());
        job_repo::update(self.conn, &job)?;
        self.queue.compact()?;

        let mut notifications = Vec::new();
        let mut changed = false;
        if project.progress != ProjectProgress::Running {
            project.progress = ProjectProgress::Running;
            notifications.push(Notification::started(&project));
            changed = true;
            info!("Project {} is running", project.id);
        }
        if let Some(seed) = self.started_seed(&job)? {
            project.old_progress = seed;
            changed = true;
        }
        if changed {
            project.updated_at = Utc::now();
            project_repo::update(self.conn, &project)?;
        }

        info!("Job {} started (project {})", job.id, project.id);
        Ok(Transition {
            job,
            project,
            notifications,
        })
    }

    /// The job finished successfully after `runtime`.
    pub fn succeed(&self, job_id: &str, runtime: Duration) -> Result<Transition> {
        let (mut job, mut project) = self.load(job_id)?;
        Self::require(&job, JobStatus::Running, "succeed")?;

        job.status = JobStatus::Success;
        job.runtime = Some(runtime);
        job.finished_at = Some(Utc::now());
        job_repo::update(self.conn, &job)?;

        project.old_progress += 1;
        project.updated_at = Utc::now();
        project_repo::update(self.conn, &project)?;

        let notifications = ProjectStateAggregator::new(self.conn)
            .on_job_succeeded(&mut project)?
            .into_iter()
            .collect();

        info!(
            "Job {} succeeded in {:.1}s (project {})",
            job.id,
            runtime.as_secs_f64(),
            project.id
        );
        Ok(Transition {
            job,
            project,
            notifications,
        })
    }

    /// The job failed. Its project's remaining queued jobs are parked.
    pub fn fail(&self, job_id: &str) -> Result<Transition> {
        let (mut job, mut project) = self.load(job_id)?;
        Self::require(&job, JobStatus::Running, "fail")?;

        job.status = JobStatus::Error;
        job.finished_at = Some(Utc::now());
        job_repo::update(self.conn, &job)?;

        let parked = self.queue.park_project(&project.id)?;
        self.queue.compact()?;

        project.progress = ProjectProgress::Error;
        project.old_progress = -project.old_progress;
        project.updated_at = Utc::now();
        project_repo::update(self.conn, &project)?;

        let step = analysis_repo::find_by_id(self.conn, &job.analysis_id)?
            .map(|a| a.code)
            .unwrap_or_else(|| job.analysis_id.clone());

        warn!(
            "Job {} ({}) failed; pulled {} queued job(s) of project {} from the queue",
            job.id,
            step,
            parked.len(),
            project.id
        );
        let notifications = vec![Notification::failed(&project, &step)];
        Ok(Transition {
            job,
            project,
            notifications,
        })
    }
}
