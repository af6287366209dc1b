use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};

use crate::config::Config;
use crate::scheduler::{ClaimedJob, Scheduler};
use crate::worker::{StepExecutor, WorkerEvent, WorkerOutcome};

/// Threads that poll the queue, run claimed jobs through a [`StepExecutor`]
/// and report the outcome back to the scheduler.
pub struct WorkerPool {
    event_receiver: Receiver<WorkerEvent>,
    stop_sender: Sender<()>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn new(
        scheduler: Scheduler,
        executor: Arc<dyn StepExecutor>,
        worker_count: usize,
        poll_interval: Duration,
    ) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        let (event_sender, event_receiver) = unbounded::<WorkerEvent>();
        let (stop_sender, stop_receiver) = unbounded::<()>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let worker = Worker {
                id: worker_id,
                scheduler: scheduler.clone(),
                executor: Arc::clone(&executor),
                events: event_sender.clone(),
                stop: stop_receiver.clone(),
                shutdown: Arc::clone(&shutdown),
                poll_interval,
            };
            workers.push(thread::spawn(move || worker.run()));
        }

        info!("Started {} workers", worker_count);

        Self {
            event_receiver,
            stop_sender,
            workers,
            shutdown,
        }
    }

    pub fn from_config(
        scheduler: Scheduler,
        executor: Arc<dyn StepExecutor>,
        config: &Config,
    ) -> Self {
        Self::new(
            scheduler,
            executor,
            config.worker_count,
            config.worker_interval(),
        )
    }

    pub fn try_recv_event(&self) -> Option<WorkerEvent> {
        self.event_receiver.try_recv().ok()
    }

    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<WorkerEvent> {
        self.event_receiver.recv_timeout(timeout).ok()
    }

    /// Asks every worker to stop after its current job.
    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
        for _ in 0..self.workers.len() {
            let _ = self.stop_sender.send(());
        }
    }

    pub fn wait(self) {
        drop(self.stop_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

struct Worker {
    id: usize,
    scheduler: Scheduler,
    executor: Arc<dyn StepExecutor>,
    events: Sender<WorkerEvent>,
    stop: Receiver<()>,
    shutdown: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl Worker {
    fn run(self) {
        debug!("Worker {} started", self.id);

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                debug!("Worker {} received shutdown signal", self.id);
                break;
            }

            let idle = match self.scheduler.claim_next() {
                Ok(Some(claimed)) => {
                    self.process(claimed);
                    false
                }
                Ok(None) => true,
                Err(e) => {
                    error!("Worker {} failed to claim a job: {}", self.id, e);
                    true
                }
            };

            if idle {
                match self.stop.recv_timeout(self.poll_interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        }

        debug!("Worker {} stopped", self.id);
    }

    fn process(&self, claimed: ClaimedJob) {
        let job_id = claimed.job.id.clone();
        debug!(
            "Worker {} running {} for project {}",
            self.id, claimed.analysis.code, claimed.project.id
        );

        let started = Instant::now();
        let outcome = match self.executor.execute(&claimed) {
            Ok(()) => {
                let runtime = started.elapsed();
                match self.scheduler.succeed_job(&job_id, runtime) {
                    Ok(_) => WorkerOutcome::Succeeded { runtime },
                    Err(e) => WorkerOutcome::Rejected {
                        reason: e.to_string(),
                    },
                }
            }
            Err(e) => {
                warn!("Worker {}: job {} failed: {}", self.id, job_id, e);
                match self.scheduler.fail_job(&job_id) {
                    Ok(_) => WorkerOutcome::Failed {
                        reason: e.to_string(),
                    },
                    Err(report) => WorkerOutcome::Rejected {
                        reason: report.to_string(),
                    },
                }
            }
        };

        if let WorkerOutcome::Rejected { reason } = &outcome {
            error!(
                "Worker {}: report for job {} rejected: {}",
                self.id, job_id, reason
            );
        }

        // Nobody listening is fine.
        let _ = self.events.send(WorkerEvent {
            worker_id: self.id,
            job_id,
            project_id: claimed.project.id,
            outcome,
        });
    }
}
