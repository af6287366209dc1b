//! Domain records: projects, analyses, jobs, samples and reads.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Project-level pipeline progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectProgress {
    Init,
    Meta,
    Queued,
    Running,
    Success,
    Error,
}

impl ProjectProgress {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectProgress::Init => "init",
            ProjectProgress::Meta => "meta",
            ProjectProgress::Queued => "queued",
            ProjectProgress::Running => "running",
            ProjectProgress::Success => "success",
            ProjectProgress::Error => "error",
        }
    }
}

impl FromStr for ProjectProgress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(ProjectProgress::Init),
            "meta" => Ok(ProjectProgress::Meta),
            "queued" => Ok(ProjectProgress::Queued),
            "running" => Ok(ProjectProgress::Running),
            "success" => Ok(ProjectProgress::Success),
            "error" => Ok(ProjectProgress::Error),
            other => Err(format!("unknown project progress '{}'", other)),
        }
    }
}

/// Lifecycle state of a single job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Success,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Error => "error",
        }
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "success" => Ok(JobStatus::Success),
            "error" => Ok(JobStatus::Error),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

macro_rules! sql_text_enum {
    ($ty:ty) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: String| FromSqlError::Other(e.into()))
            }
        }
    };
}

sql_text_enum!(ProjectProgress);
sql_text_enum!(JobStatus);

/// A unit of work made of an ordered pipeline of analysis steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub progress: ProjectProgress,
    /// Completed-job counter; negated when a job of the project fails.
    pub old_progress: i64,
    pub finalized: bool,
    /// Contact address notifications are sent to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Port of the running visualization session, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_port: Option<u16>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(email: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            progress: ProjectProgress::Init,
            old_progress: 0,
            finalized: false,
            email,
            session_port: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Catalog entry describing one pipeline step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub id: String,
    pub code: String,
    pub name: String,
    pub step: i64,
    pub active: bool,
}

impl Analysis {
    pub fn new(code: &str, name: &str, step: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            code: code.to_string(),
            name: name.to_string(),
            step,
            active: true,
        }
    }
}

/// One stateful instantiation of an analysis for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub project_id: String,
    pub analysis_id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<u32>,
    /// Set on the last job of the project's plan.
    pub archive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<Duration>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// A fresh job bound to `(project, analysis)`, not yet in the queue.
    pub fn new(project_id: &str, analysis_id: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            analysis_id: analysis_id.to_string(),
            status: JobStatus::Queued,
            queue_position: None,
            archive: false,
            started_at: None,
            finished_at: None,
            runtime: None,
            created_at: Utc::now(),
        }
    }

    /// Queued but pulled out of the active queue.
    pub fn is_parked(&self) -> bool {
        self.status == JobStatus::Queued && self.queue_position.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Read {
    pub id: String,
    pub sample_id: String,
    pub path: String,
    pub size: u64,
    pub md5_checksum: String,
}
