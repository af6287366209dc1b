//! Job repository: CRUD and queue-position queries for the `jobs` table.

use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DatabaseError;
use crate::model::Job;

fn from_row(row: &Row<'_>) -> Result<Job, rusqlite::Error> {
    let runtime_secs: Option<f64> = row.get("runtime_secs")?;
    Ok(Job {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        analysis_id: row.get("analysis_id")?,
        status: row.get("status")?,
        queue_position: row.get("queue_position")?,
        archive: row.get("archive")?,
        started_at: row.get("started_at")?,
        finished_at: row.get("finished_at")?,
        runtime: runtime_secs.map(Duration::from_secs_f64),
        created_at: row.get("created_at")?,
    })
}

/// Inserts a new job row.
pub fn insert(conn: &Connection, job: &Job) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO jobs (id, project_id, analysis_id, status, queue_position, archive,
         started_at, finished_at, runtime_secs, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            job.id,
            job.project_id,
            job.analysis_id,
            job.status,
            job.queue_position,
            job.archive,
            job.started_at,
            job.finished_at,
            job.runtime.map(|d| d.as_secs_f64()),
            job.created_at,
        ],
    )?;
    Ok(())
}

/// Updates the mutable fields of a job. `project_id` and `analysis_id` never change.
pub fn update(conn: &Connection, job: &Job) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE jobs SET status=?2, queue_position=?3, archive=?4, started_at=?5,
         finished_at=?6, runtime_secs=?7
         WHERE id=?1",
        params![
            job.id,
            job.status,
            job.queue_position,
            job.archive,
            job.started_at,
            job.finished_at,
            job.runtime.map(|d| d.as_secs_f64()),
        ],
    )?;
    Ok(())
}

/// Finds a job by its ID.
pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<Job>, DatabaseError> {
    let job = conn
        .query_row("SELECT * FROM jobs WHERE id = ?1", params![id], from_row)
        .optional()?;
    Ok(job)
}

/// A project's jobs ordered by the step of the analysis they instantiate.
pub fn list_for_project_by_step(
    conn: &Connection,
    project_id: &str,
) -> Result<Vec<Job>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT j.* FROM jobs j JOIN analyses a ON a.id = j.analysis_id
         WHERE j.project_id = ?1
         ORDER BY a.step ASC, j.created_at ASC",
    )?;
    let rows = stmt
        .query_map(params![project_id], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Highest queue position currently assigned, if any job is positioned.
pub fn max_queue_position(conn: &Connection) -> Result<Option<u32>, DatabaseError> {
    let max: Option<u32> = conn.query_row(
        "SELECT MAX(queue_position) FROM jobs WHERE queue_position IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    Ok(max)
}

/// `(job_id, position)` of every positioned job, ascending by position.
pub fn list_positioned(conn: &Connection) -> Result<Vec<(String, u32)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, queue_position FROM jobs
         WHERE queue_position IS NOT NULL
         ORDER BY queue_position ASC",
    )?;
    let rows = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// The positioned job with the smallest position.
pub fn first_in_queue(conn: &Connection) -> Result<Option<Job>, DatabaseError> {
    let job = conn
        .query_row(
            "SELECT * FROM jobs WHERE queue_position IS NOT NULL
             ORDER BY queue_position ASC LIMIT 1",
            [],
            from_row,
        )
        .optional()?;
    Ok(job)
}

/// The lowest positioned job whose project has no running job.
pub fn first_claimable(conn: &Connection) -> Result<Option<Job>, DatabaseError> {
    let job = conn
        .query_row(
            "SELECT * FROM jobs j
             WHERE j.queue_position IS NOT NULL
               AND NOT EXISTS (
                   SELECT 1 FROM jobs r
                   WHERE r.project_id = j.project_id AND r.status = 'running'
               )
             ORDER BY j.queue_position ASC LIMIT 1",
            [],
            from_row,
        )
        .optional()?;
    Ok(job)
}

/// The project's running job, if one is running.
pub fn find_running_for_project(
    conn: &Connection,
    project_id: &str,
) -> Result<Option<Job>, DatabaseError> {
    let job = conn
        .query_row(
            "SELECT * FROM jobs WHERE project_id = ?1 AND status = 'running' LIMIT 1",
            params![project_id],
            from_row,
        )
        .optional()?;
    Ok(job)
}

pub fn set_queue_position(
    conn: &Connection,
    id: &str,
    position: Option<u32>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE jobs SET queue_position = ?2 WHERE id = ?1",
        params![id, position],
    )?;
    Ok(())
}

/// Clears the position of every positioned job of a project.
/// Returns the ids that were pulled out of the queue.
pub fn clear_project_positions(
    conn: &Connection,
    project_id: &str,
) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id FROM jobs
         WHERE project_id = ?1 AND status = 'queued' AND queue_position IS NOT NULL",
    )?;
    let ids = stmt
        .query_map(params![project_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    conn.execute(
        "UPDATE jobs SET queue_position = NULL
         WHERE project_id = ?1 AND status = 'queued' AND queue_position IS NOT NULL",
        params![project_id],
    )?;
    Ok(ids)
}

/// Deletes every job of a project, returning how many were removed.
pub fn delete_for_project(conn: &Connection, project_id: &str) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "DELETE FROM jobs WHERE project_id = ?1",
        params![project_id],
    )?)
}
