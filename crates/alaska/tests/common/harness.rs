//! Test harness for isolated scheduler execution.
//!
//! Each harness owns a temporary directory with its own SQLite file, a
//! `Scheduler` on top of it and a notifier that records what was sent.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;

use alaska::notify::NotifyError;
use alaska::{
    Analysis, Database, Job, JobStatus, Notification, NotificationKind, Notifier, Project,
    Scheduler,
};

/// Notifier keeping every notification in memory.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn kinds_for(&self, project_id: &str) -> Vec<NotificationKind> {
        self.sent()
            .into_iter()
            .filter(|n| n.project_id == project_id)
            .map(|n| n.kind)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

pub struct TestHarness {
    /// Keeps the database file alive.
    temp_dir: TempDir,
    pub db_path: PathBuf,
    pub scheduler: Scheduler,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestHarness {
    /// A scheduler on a fresh file database with an empty catalog.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("data").join("alaska.db");
        let db = Database::open(&db_path).expect("Failed to open database");

        let notifier = Arc::new(RecordingNotifier::default());
        let scheduler = Scheduler::new(db).with_notifier(notifier.clone());

        Self {
            temp_dir,
            db_path,
            scheduler,
            notifier,
        }
    }

    /// A harness whose catalog holds one active analysis per code, in order.
    pub fn with_catalog(codes: &[&str]) -> Self {
        let harness = Self::new();
        harness.register(codes);
        harness
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn register(&self, codes: &[&str]) -> Vec<Analysis> {
        codes
            .iter()
            .enumerate()
            .map(|(step, code)| {
                self.scheduler
                    .register_analysis(code, &code.to_uppercase(), step as i64)
                    .expect("Failed to register analysis")
            })
            .collect()
    }

    /// Creates a project and starts its pipeline.
    pub fn started_project(&self) -> Project {
        let project = self
            .scheduler
            .create_project(Some("lab@example.org".to_string()))
            .expect("Failed to create project");
        self.scheduler
            .start_project(&project.id)
            .expect("Failed to start project");
        self.project(&project.id)
    }

    pub fn project(&self, id: &str) -> Project {
        self.scheduler.project(id).expect("Project not found")
    }

    pub fn jobs(&self, project_id: &str) -> Vec<Job> {
        self.scheduler.jobs(project_id).expect("Failed to list jobs")
    }

    pub fn job(&self, id: &str) -> Job {
        self.scheduler.job(id).expect("Job not found")
    }

    /// Job ids in queue order.
    pub fn queue_ids(&self) -> Vec<String> {
        self.scheduler
            .queue_snapshot()
            .expect("Failed to read queue")
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }

    /// Queue positions in queue order.
    pub fn positions(&self) -> Vec<u32> {
        self.scheduler
            .queue_snapshot()
            .expect("Failed to read queue")
            .into_iter()
            .map(|(_, position)| position)
            .collect()
    }

    /// Starts and completes a job.
    pub fn run_job(&self, job_id: &str, runtime: Duration) {
        self.scheduler.start_job(job_id).expect("Failed to start job");
        self.scheduler
            .succeed_job(job_id, runtime)
            .expect("Failed to complete job");
    }

    /// Asserts the dense-queue invariant.
    pub fn assert_dense(&self) {
        let positions = self.positions();
        let expected: Vec<u32> = (0..positions.len() as u32).collect();
        assert_eq!(positions, expected, "queue positions are not dense");

        for id in self.queue_ids() {
            assert_eq!(self.job(&id).status, JobStatus::Queued);
        }
    }
}
