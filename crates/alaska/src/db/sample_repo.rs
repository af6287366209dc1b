//! Sample and read repository.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DatabaseError;
use crate::model::{Read, Sample};

fn sample_from_row(row: &Row<'_>) -> Result<Sample, rusqlite::Error> {
    Ok(Sample {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        name: row.get("name")?,
        created_at: row.get("created_at")?,
    })
}

fn read_from_row(row: &Row<'_>) -> Result<Read, rusqlite::Error> {
    Ok(Read {
        id: row.get("id")?,
        sample_id: row.get("sample_id")?,
        path: row.get("path")?,
        size: row.get("size")?,
        md5_checksum: row.get("md5_checksum")?,
    })
}

pub fn insert_sample(conn: &Connection, sample: &Sample) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO samples (id, project_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![sample.id, sample.project_id, sample.name, sample.created_at],
    )?;
    Ok(())
}

pub fn insert_read(conn: &Connection, read: &Read) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO reads (id, sample_id, path, size, md5_checksum)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![read.id, read.sample_id, read.path, read.size, read.md5_checksum],
    )?;
    Ok(())
}

pub fn find_sample(conn: &Connection, id: &str) -> Result<Option<Sample>, DatabaseError> {
    let sample = conn
        .query_row(
            "SELECT * FROM samples WHERE id = ?1",
            params![id],
            sample_from_row,
        )
        .optional()?;
    Ok(sample)
}

/// A project's samples, in creation order.
pub fn list_samples(conn: &Connection, project_id: &str) -> Result<Vec<Sample>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM samples WHERE project_id = ?1 ORDER BY created_at ASC, name ASC",
    )?;
    let rows = stmt
        .query_map(params![project_id], sample_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_reads(conn: &Connection, sample_id: &str) -> Result<Vec<Read>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT * FROM reads WHERE sample_id = ?1 ORDER BY path ASC")?;
    let rows = stmt
        .query_map(params![sample_id], read_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete_reads_for_sample(conn: &Connection, sample_id: &str) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "DELETE FROM reads WHERE sample_id = ?1",
        params![sample_id],
    )?)
}

pub fn delete_sample(conn: &Connection, id: &str) -> Result<usize, DatabaseError> {
    Ok(conn.execute("DELETE FROM samples WHERE id = ?1", params![id])?)
}
