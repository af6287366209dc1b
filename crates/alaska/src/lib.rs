//! Pipeline orchestration and a global job queue for multi-step analysis
//! projects.
//!
//! A project's active analysis steps are expanded into jobs which wait in one
//! globally ordered, gap-free queue shared by all projects. Workers claim the
//! job at the head of the queue and report back; every report drives the job
//! and its project through their state machines and recompacts the queue.

pub mod aggregator;
pub mod api;
pub mod cascade;
pub mod config;
pub mod db;
pub mod error;
pub mod intake;
pub mod logging;
pub mod model;
pub mod notify;
pub mod orchestrator;
pub mod queue;
pub mod scheduler;
pub mod state_machine;
pub mod worker;

pub use api::{WorkerRequest, WorkerResponse};
pub use cascade::{CascadeDelete, DeleteReport, ProjectResources};
pub use config::{load_config, load_config_from_env, load_config_from_str, Config};
pub use db::Database;
pub use error::{AlaskaError, ErrorKind, ErrorPayload, Result, TransportError};
pub use intake::{ProjectProvisioner, ReadInput, SampleInput};
pub use logging::init_logging;
pub use model::{Analysis, Job, JobStatus, Project, ProjectProgress, Read, Sample};
pub use notify::{Notification, NotificationKind, Notifier};
pub use orchestrator::Plan;
pub use scheduler::{ClaimedJob, Scheduler};
pub use worker::{ExecutionError, StepExecutor, WorkerEvent, WorkerOutcome, WorkerPool};
