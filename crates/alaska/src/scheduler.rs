//! Entry point tying the components to the shared database.
//!
//! Every operation runs its components inside one transaction on the
//! serialized [`Database`] handle. Notifications produced by the transaction
//! are delivered only after it committed and the lock was released. Calls to
//! external collaborators happen outside the lock too.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::warn;
use serde::Serialize;
use tracing::instrument;

use crate::aggregator::ProjectStateAggregator;
use crate::cascade::{
    CascadeDelete, DeleteReport, NoResources, ProjectDeleter, ProjectResources, SampleDeleter,
};
use crate::config::{AnalysisConfig, Config, ProgressConfig};
use crate::db::{analysis_repo, job_repo, project_repo, Database};
use crate::error::{AlaskaError, ConfigError, Result};
use crate::intake::{self, NoProvisioning, ProjectProvisioner, SampleInput};
use crate::model::{Analysis, Job, Project, ProjectProgress, Sample};
use crate::notify::{deliver_all, MailSpoolNotifier, NoopNotifier, Notification, Notifier};
use crate::orchestrator::{PipelineOrchestrator, Plan};
use crate::queue::QueueManager;
use crate::state_machine::JobStateMachine;

/// A job handed to a worker, with what it needs to run it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimedJob {
    pub job: Job,
    pub analysis: Analysis,
    pub project: Project,
}

#[derive(Clone)]
pub struct Scheduler {
    db: Database,
    notifier: Arc<dyn Notifier>,
    resources: Arc<dyn ProjectResources>,
    provisioner: Arc<dyn ProjectProvisioner>,
    progress: ProgressConfig,
}

impl Scheduler {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            notifier: Arc::new(NoopNotifier),
            resources: Arc::new(NoResources),
            provisioner: Arc::new(NoProvisioning),
            progress: ProgressConfig::default(),
        }
    }

    /// Opens the configured database, wires the mail spool when configured
    /// and synchronizes the analysis catalog.
    pub fn from_config(config: &Config) -> Result<Self> {
        let path = config.database_path().ok_or_else(|| ConfigError::Validation {
            message: "database_path is unset and no home directory was found".to_string(),
        })?;
        let db = Database::open(&path)?;

        let mut scheduler = Self::new(db).with_progress(config.progress.clone());
        if let Some(dir) = &config.notifications.spool_directory {
            scheduler = scheduler.with_notifier(Arc::new(MailSpoolNotifier::new(
                dir,
                config.notifications.from.clone(),
            )));
        }
        scheduler.sync_catalog(&config.analyses)?;
        Ok(scheduler)
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_resources(mut self, resources: Arc<dyn ProjectResources>) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_provisioner(mut self, provisioner: Arc<dyn ProjectProvisioner>) -> Self {
        self.provisioner = provisioner;
        self
    }

    /// Values `old_progress` is seeded with when a project or a step starts.
    pub fn with_progress(mut self, progress: ProgressConfig) -> Self {
        self.progress = progress;
        self
    }

    /// Value `old_progress` is reset to by [`Scheduler::start_project`].
    pub fn with_finalized_progress(mut self, value: i64) -> Self {
        self.progress.finalized = value;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn deliver(&self, notifications: &[Notification]) {
        deliver_all(self.notifier.as_ref(), notifications);
    }

    // Catalog

    /// Upserts the configured analyses by code.
    pub fn sync_catalog(&self, analyses: &[AnalysisConfig]) -> Result<Vec<Analysis>> {
        let stored = self.db.with_tx(|tx| {
            analyses
                .iter()
                .map(|entry| {
                    let mut analysis = Analysis::new(&entry.code, &entry.name, entry.step);
                    analysis.active = entry.active;
                    analysis_repo::upsert(tx, &analysis).map_err(AlaskaError::from)
                })
                .collect::<Result<Vec<_>>>()
        })?;
        if !stored.is_empty() {
            log::info!("Synchronized {} catalog analyses", stored.len());
        }
        Ok(stored)
    }

    pub fn register_analysis(&self, code: &str, name: &str, step: i64) -> Result<Analysis> {
        self.db
            .with_tx(|tx| analysis_repo::upsert(tx, &Analysis::new(code, name, step)))
            .map_err(AlaskaError::from)
    }

    pub fn set_analysis_active(&self, analysis_id: &str, active: bool) -> Result<()> {
        self.db.with_tx(|tx| {
            if analysis_repo::find_by_id(tx, analysis_id)?.is_none() {
                return Err(AlaskaError::not_found("analysis", analysis_id));
            }
            analysis_repo::set_active(tx, analysis_id, active)?;
            Ok(())
        })
    }

    // Intake

    /// Creates a project and provisions its external side. If provisioning
    /// fails the project is deleted again.
    #[instrument(skip(self))]
    pub fn create_project(&self, email: Option<String>) -> Result<Project> {
        let project = Project::new(email);
        self.db.with_tx(|tx| project_repo::insert(tx, &project))?;

        if let Err(e) = self.provisioner.initialize_project(&project) {
            warn!(
                "Provisioning project {} failed, removing it: {}",
                project.id, e
            );
            self.db.with_tx(|tx| ProjectDeleter.delete(tx, &project.id))?;
            return Err(e.into());
        }

        log::info!("Created project {}", project.id);
        Ok(project)
    }

    /// Replaces the project's samples and moves it to `meta`.
    ///
    /// Invalid input creates nothing. If provisioning a sample fails, every
    /// sample of this attempt is deleted again.
    #[instrument(skip(self, samples), fields(samples = samples.len()))]
    pub fn set_samples(&self, project_id: &str, samples: &[SampleInput]) -> Result<Vec<Sample>> {
        let (project, created) = self
            .db
            .with_tx(|tx| intake::replace_samples(tx, project_id, samples))?;

        for sample in &created {
            if let Err(e) = self.provisioner.initialize_sample(&project, sample) {
                warn!(
                    "Provisioning sample {} of project {} failed, discarding {} sample(s): {}",
                    sample.name,
                    project.id,
                    created.len(),
                    e
                );
                self.db.with_tx(|tx| intake::discard_samples(tx, &created))?;
                return Err(e.into());
            }
        }

        self.db.with_tx(|tx| intake::mark_meta(tx, project_id))?;
        Ok(created)
    }

    // Pipeline

    /// Finalizes the project and plans its pipeline.
    #[instrument(skip(self))]
    pub fn start_project(&self, project_id: &str) -> Result<Plan> {
        let plan = self.db.with_tx(|tx| {
            PipelineOrchestrator::new(tx).start_project(project_id, self.progress.finalized)
        })?;
        self.deliver(&plan.notifications);
        Ok(plan)
    }

    /// (Re)plans the project. Also how a failed project is restarted.
    #[instrument(skip(self))]
    pub fn plan(&self, project_id: &str) -> Result<Plan> {
        let plan = self
            .db
            .with_tx(|tx| PipelineOrchestrator::new(tx).plan(project_id))?;
        self.deliver(&plan.notifications);
        Ok(plan)
    }

    // Dispatch

    /// Starts the lowest positioned job whose project has nothing running.
    ///
    /// Selection and start happen in one transaction, so two callers never
    /// claim the same job and a project never runs two steps at once.
    #[instrument(skip(self))]
    pub fn claim_next(&self) -> Result<Option<ClaimedJob>> {
        let claimed = self.db.with_tx(|tx| {
            let Some(next) = QueueManager::new(tx).next_claimable()? else {
                return Ok(None);
            };
            let transition = JobStateMachine::new(tx)
                .with_progress(&self.progress)
                .start(&next.id)?;
            let analysis = analysis_repo::find_by_id(tx, &transition.job.analysis_id)?
                .ok_or_else(|| AlaskaError::not_found("analysis", &transition.job.analysis_id))?;
            Ok::<_, AlaskaError>(Some((
                ClaimedJob {
                    job: transition.job,
                    analysis,
                    project: transition.project,
                },
                transition.notifications,
            )))
        })?;

        Ok(claimed.map(|(claimed, notifications)| {
            self.deliver(&notifications);
            claimed
        }))
    }

    #[instrument(skip(self))]
    pub fn start_job(&self, job_id: &str) -> Result<Job> {
        let transition = self.db.with_tx(|tx| {
            JobStateMachine::new(tx)
                .with_progress(&self.progress)
                .start(job_id)
        })?;
        self.deliver(&transition.notifications);
        Ok(transition.job)
    }

    #[instrument(skip(self))]
    pub fn succeed_job(&self, job_id: &str, runtime: Duration) -> Result<Job> {
        let transition = self
            .db
            .with_tx(|tx| JobStateMachine::new(tx).succeed(job_id, runtime))?;
        self.deliver(&transition.notifications);
        Ok(transition.job)
    }

    #[instrument(skip(self))]
    pub fn fail_job(&self, job_id: &str) -> Result<Job> {
        let transition = self.db.with_tx(|tx| JobStateMachine::new(tx).fail(job_id))?;
        self.deliver(&transition.notifications);
        Ok(transition.job)
    }

    /// Re-runs completion aggregation for a project, e.g. after a re-plan
    /// dropped its last unfinished analysis from the plan.
    pub fn refresh_project(&self, project_id: &str) -> Result<Project> {
        let (project, notification) = self.db.with_tx(|tx| {
            let mut project = project_repo::find_by_id(tx, project_id)?
                .ok_or_else(|| AlaskaError::not_found("project", project_id))?;
            let notification = ProjectStateAggregator::new(tx).on_job_succeeded(&mut project)?;
            Ok::<_, AlaskaError>((project, notification))
        })?;
        if let Some(notification) = notification {
            self.deliver(&[notification]);
        }
        Ok(project)
    }

    // Sessions

    /// Port of the project's visualization session, launching one if none is
    /// open. Only finished projects have results to show.
    #[instrument(skip(self))]
    pub fn open_session(&self, project_id: &str) -> Result<u16> {
        let project = self.project(project_id)?;
        if let Some(port) = project.session_port {
            return Ok(port);
        }
        if project.progress != ProjectProgress::Success {
            return Err(AlaskaError::validation(format!(
                "project '{}' has no results to visualize yet ({})",
                project_id, project.progress
            )));
        }

        let port = self.resources.open_session(&project)?;
        self.db.with_tx(|tx| {
            let mut project = project_repo::find_by_id(tx, project_id)?
                .ok_or_else(|| AlaskaError::not_found("project", project_id))?;
            project.session_port = Some(port);
            project.updated_at = Utc::now();
            project_repo::update(tx, &project)?;
            Ok::<_, AlaskaError>(())
        })?;

        log::info!("Opened session for project {} on port {}", project_id, port);
        Ok(port)
    }

    // Deletion

    /// Releases the project's external resources, then deletes it with
    /// everything it owns and recompacts the queue.
    #[instrument(skip(self))]
    pub fn delete_project(&self, project_id: &str) -> Result<DeleteReport> {
        let project = self.project(project_id)?;
        self.resources.release(&project)?;
        self.db.with_tx(|tx| ProjectDeleter.delete(tx, project_id))
    }

    #[instrument(skip(self))]
    pub fn delete_sample(&self, sample_id: &str) -> Result<DeleteReport> {
        self.db.with_tx(|tx| SampleDeleter.delete(tx, sample_id))
    }

    // Reads

    pub fn project(&self, project_id: &str) -> Result<Project> {
        self.db
            .with_conn(|conn| project_repo::find_by_id(conn, project_id))?
            .ok_or_else(|| AlaskaError::not_found("project", project_id))
    }

    pub fn job(&self, job_id: &str) -> Result<Job> {
        self.db
            .with_conn(|conn| job_repo::find_by_id(conn, job_id))?
            .ok_or_else(|| AlaskaError::not_found("job", job_id))
    }

    /// The project's jobs in step order.
    pub fn jobs(&self, project_id: &str) -> Result<Vec<Job>> {
        Ok(self
            .db
            .with_conn(|conn| job_repo::list_for_project_by_step(conn, project_id))?)
    }

    /// `(job_id, position)` pairs in queue order.
    pub fn queue_snapshot(&self) -> Result<Vec<(String, u32)>> {
        self.db.with_tx(|tx| QueueManager::new(tx).snapshot())
    }
}
