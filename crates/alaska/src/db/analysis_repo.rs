//! Analysis catalog repository.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DatabaseError;
use crate::model::Analysis;

fn from_row(row: &Row<'_>) -> Result<Analysis, rusqlite::Error> {
    Ok(Analysis {
        id: row.get("id")?,
        code: row.get("code")?,
        name: row.get("name")?,
        step: row.get("step")?,
        active: row.get("active")?,
    })
}

/// Inserts an analysis, or updates name/step/active of the one with the same code.
///
/// Returns the stored record, whose id is the pre-existing one on update.
pub fn upsert(conn: &Connection, analysis: &Analysis) -> Result<Analysis, DatabaseError> {
    conn.execute(
        "INSERT INTO analyses (id, code, name, step, active) VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(code) DO UPDATE SET name = excluded.name, step = excluded.step,
         active = excluded.active",
        params![
            analysis.id,
            analysis.code,
            analysis.name,
            analysis.step,
            analysis.active,
        ],
    )?;
    let stored = conn.query_row(
        "SELECT * FROM analyses WHERE code = ?1",
        params![analysis.code],
        from_row,
    )?;
    Ok(stored)
}

pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<Analysis>, DatabaseError> {
    let analysis = conn
        .query_row("SELECT * FROM analyses WHERE id = ?1", params![id], from_row)
        .optional()?;
    Ok(analysis)
}

/// All active analyses in pipeline order.
pub fn list_active(conn: &Connection) -> Result<Vec<Analysis>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT * FROM analyses WHERE active = 1 ORDER BY step ASC")?;
    let rows = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn set_active(conn: &Connection, id: &str, active: bool) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE analyses SET active = ?2 WHERE id = ?1",
        params![id, active],
    )?;
    Ok(())
}
