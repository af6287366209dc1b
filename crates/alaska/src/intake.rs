//! Project intake: sample and read registration before a project is started.

use std::collections::HashSet;

use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;

use crate::cascade::{CascadeDelete, SampleDeleter};
use crate::db::{project_repo, sample_repo};
use crate::error::{AlaskaError, Result, TransportError};
use crate::model::{Project, ProjectProgress, Read, Sample};

/// External side of a new project: storage directories and per-sample
/// folders, created by a provisioning service.
pub trait ProjectProvisioner: Send + Sync {
    fn initialize_project(&self, project: &Project) -> std::result::Result<(), TransportError>;

    fn initialize_sample(
        &self,
        project: &Project,
        sample: &Sample,
    ) -> std::result::Result<(), TransportError>;
}

/// Provisions nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProvisioning;

impl ProjectProvisioner for NoProvisioning {
    fn initialize_project(&self, _project: &Project) -> std::result::Result<(), TransportError> {
        Ok(())
    }

    fn initialize_sample(
        &self,
        _project: &Project,
        _sample: &Sample,
    ) -> std::result::Result<(), TransportError> {
        Ok(())
    }
}

/// A sample as submitted by a caller.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleInput {
    pub name: String,
    #[serde(default)]
    pub reads: Vec<ReadInput>,
}

/// A read as submitted by a caller. Every field is required; they are
/// optional here so a missing one is reported as a validation error rather
/// than a decoding error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadInput {
    pub path: Option<String>,
    pub size: Option<u64>,
    pub md5_checksum: Option<String>,
}

impl ReadInput {
    fn validate(&self, sample: &str) -> Result<(String, u64, String)> {
        let missing = |field: &str| {
            AlaskaError::validation(format!(
                "read of sample '{}' is missing its {}",
                sample, field
            ))
        };
        let path = self
            .path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| missing("path"))?;
        let size = self.size.ok_or_else(|| missing("size"))?;
        let md5 = self
            .md5_checksum
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| missing("md5Checksum"))?;
        Ok((path.to_string(), size, md5.to_string()))
    }
}

/// Replaces the samples of `project_id` with `inputs`.
///
/// Must run inside a transaction: a validation error part-way leaves rows
/// behind that only the rollback removes.
pub fn replace_samples(
    conn: &Connection,
    project_id: &str,
    inputs: &[SampleInput],
) -> Result<(Project, Vec<Sample>)> {
    let project = project_repo::find_by_id(conn, project_id)?
        .ok_or_else(|| AlaskaError::not_found("project", project_id))?;
    if project.finalized {
        return Err(AlaskaError::validation(format!(
            "project '{}' is finalized; samples can no longer change",
            project_id
        )));
    }

    let mut names = HashSet::new();
    for input in inputs {
        if input.name.trim().is_empty() {
            return Err(AlaskaError::validation("sample name must not be empty"));
        }
        if !names.insert(input.name.as_str()) {
            return Err(AlaskaError::validation(format!(
                "duplicate sample name '{}'",
                input.name
            )));
        }
    }

    for existing in sample_repo::list_samples(conn, project_id)? {
        SampleDeleter.delete(conn, &existing.id)?;
    }

    let mut samples = Vec::with_capacity(inputs.len());
    for input in inputs {
        let sample = Sample {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            name: input.name.clone(),
            created_at: Utc::now(),
        };
        sample_repo::insert_sample(conn, &sample)?;

        for read in &input.reads {
            let (path, size, md5_checksum) = read.validate(&input.name)?;
            sample_repo::insert_read(
                conn,
                &Read {
                    id: uuid::Uuid::new_v4().to_string(),
                    sample_id: sample.id.clone(),
                    path,
                    size,
                    md5_checksum,
                },
            )?;
        }
        samples.push(sample);
    }

    log::debug!(
        "Registered {} sample(s) for project {}",
        samples.len(),
        project_id
    );
    Ok((project, samples))
}

/// Removes samples created by a failed intake attempt.
pub fn discard_samples(conn: &Connection, samples: &[Sample]) -> Result<()> {
    for sample in samples {
        SampleDeleter.delete(conn, &sample.id)?;
    }
    Ok(())
}

/// Moves the project to `meta` once its metadata is complete.
pub fn mark_meta(conn: &Connection, project_id: &str) -> Result<Project> {
    let mut project = project_repo::find_by_id(conn, project_id)?
        .ok_or_else(|| AlaskaError::not_found("project", project_id))?;
    project.progress = ProjectProgress::Meta;
    project.updated_at = Utc::now();
    project_repo::update(conn, &project)?;
    Ok(project)
}
