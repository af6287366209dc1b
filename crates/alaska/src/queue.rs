//! Global job queue: assignment and compaction of queue positions.
//!
//! Positions of all positioned jobs form the dense range `0..k`. Every
//! method runs on a connection borrowed from an open transaction, so the
//! read-max-then-write sequence of [`QueueManager::enqueue`] cannot
//! interleave with another enqueue: the `Database` lock is held for the
//! whole transaction.

use log::debug;
use rusqlite::Connection;

use crate::db::job_repo;
use crate::error::{AlaskaError, Result};
use crate::model::{Job, JobStatus};

pub struct QueueManager<'c> {
    conn: &'c Connection,
}

impl<'c> QueueManager<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Appends `job` to the tail of the queue and marks it queued.
    ///
    /// A job that already holds a position keeps it.
    pub fn enqueue(&self, job: &mut Job) -> Result<u32> {
        if let Some(position) = job.queue_position {
            return Ok(position);
        }

        let position = match job_repo::max_queue_position(self.conn)? {
            Some(max) => max + 1,
            None => 0,
        };
        job.status = JobStatus::Queued;
        job.queue_position = Some(position);
        job_repo::update(self.conn, job)?;

        debug!("Enqueued job {} at position {}", job.id, position);
        Ok(position)
    }

    /// Clears the job's position. Status is left to the caller and the queue
    /// is not compacted.
    pub fn remove_from_queue(&self, job: &mut Job) -> Result<()> {
        if job.queue_position.take().is_some() {
            job_repo::set_queue_position(self.conn, &job.id, None)?;
        }
        Ok(())
    }

    /// Pulls every positioned job of a project out of the queue, leaving
    /// them queued. Does not compact.
    pub fn park_project(&self, project_id: &str) -> Result<Vec<String>> {
        let parked = job_repo::clear_project_positions(self.conn, project_id)?;
        if !parked.is_empty() {
            debug!(
                "Parked {} queued job(s) of project {}",
                parked.len(),
                project_id
            );
        }
        Ok(parked)
    }

    /// Renumbers positioned jobs to `0..k` keeping their relative order.
    /// Returns `k`.
    pub fn compact(&self) -> Result<usize> {
        let queue = job_repo::list_positioned(self.conn)?;

        for pair in queue.windows(2) {
            if pair[0].1 == pair[1].1 {
                return Err(AlaskaError::InvariantViolation(format!(
                    "jobs '{}' and '{}' share queue position {}",
                    pair[0].0, pair[1].0, pair[0].1
                )));
            }
        }

        // Ascending renumbering never collides: the target slot `i` is at
        // most the current position and every lower slot is already taken
        // by an earlier job.
        let mut moved = 0;
        for (index, (job_id, position)) in queue.iter().enumerate() {
            let index = index as u32;
            if *position != index {
                job_repo::set_queue_position(self.conn, job_id, Some(index))?;
                moved += 1;
            }
        }

        if moved > 0 {
            debug!("Compacted queue: {} of {} job(s) moved", moved, queue.len());
        }
        Ok(queue.len())
    }

    /// The lowest positioned job, regardless of whether it can run now.
    pub fn head(&self) -> Result<Option<Job>> {
        Ok(job_repo::first_in_queue(self.conn)?)
    }

    /// The job a worker receives next: the lowest positioned job whose
    /// project has no running job. Skipped jobs keep their positions.
    pub fn next_claimable(&self) -> Result<Option<Job>> {
        Ok(job_repo::first_claimable(self.conn)?)
    }

    /// `(job_id, position)` pairs in dispatch order.
    pub fn snapshot(&self) -> Result<Vec<(String, u32)>> {
        Ok(job_repo::list_positioned(self.conn)?)
    }
}
