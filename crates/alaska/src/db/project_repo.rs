//! Project repository: CRUD operations for the `projects` table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DatabaseError;
use crate::model::{Project, ProjectProgress};

fn from_row(row: &Row<'_>) -> Result<Project, rusqlite::Error> {
    Ok(Project {
        id: row.get("id")?,
        progress: row.get("progress")?,
        old_progress: row.get("old_progress")?,
        finalized: row.get("finalized")?,
        email: row.get("email")?,
        session_port: row.get("session_port")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Inserts a new project row.
pub fn insert(conn: &Connection, project: &Project) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO projects (id, progress, old_progress, finalized, email, session_port,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            project.id,
            project.progress,
            project.old_progress,
            project.finalized,
            project.email,
            project.session_port,
            project.created_at,
            project.updated_at,
        ],
    )?;
    Ok(())
}

/// Overwrites every mutable field of an existing project.
pub fn update(conn: &Connection, project: &Project) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE projects SET progress=?2, old_progress=?3, finalized=?4, email=?5,
         session_port=?6, updated_at=?7
         WHERE id=?1",
        params![
            project.id,
            project.progress,
            project.old_progress,
            project.finalized,
            project.email,
            project.session_port,
            project.updated_at,
        ],
    )?;
    Ok(())
}

/// Finds a project by its ID.
pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<Project>, DatabaseError> {
    let project = conn
        .query_row("SELECT * FROM projects WHERE id = ?1", params![id], from_row)
        .optional()?;
    Ok(project)
}

/// Deletes a project row. Owned rows must already be gone.
pub fn delete(conn: &Connection, id: &str) -> Result<usize, DatabaseError> {
    Ok(conn.execute("DELETE FROM projects WHERE id = ?1", params![id])?)
}
