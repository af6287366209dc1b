//! Global queue invariants across projects.

mod common;

use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use common::TestHarness;

use alaska::{AlaskaError, JobStatus, ProjectProgress};

#[test]
fn test_positions_stay_dense_through_transitions() {
    let harness = TestHarness::with_catalog(&["qc", "trim", "align", "quant"]);
    let first = harness.started_project();
    let second = harness.started_project();
    harness.assert_dense();
    assert_eq!(harness.positions().len(), 8);

    let first_jobs = harness.jobs(&first.id);
    let second_jobs = harness.jobs(&second.id);

    // Out of queue order on purpose.
    harness.scheduler.start_job(&second_jobs[2].id).unwrap();
    harness.assert_dense();
    harness.run_job(&first_jobs[0].id, Duration::from_secs(1));
    harness.assert_dense();
    harness.scheduler.fail_job(&second_jobs[2].id).unwrap();
    harness.assert_dense();

    // Relative order of the survivors is untouched.
    let expected: Vec<String> = first_jobs[1..].iter().map(|j| j.id.clone()).collect();
    assert_eq!(harness.queue_ids(), expected);
}

#[test]
fn test_fail_cascade_stays_within_project() {
    let harness = TestHarness::new();
    let analyses = harness.register(&["qc", "quant", "diff"]);
    let p1 = harness.started_project();
    let p1_jobs = harness.jobs(&p1.id);

    // P2 only runs the first step.
    for analysis in &analyses[1..] {
        harness
            .scheduler
            .set_analysis_active(&analysis.id, false)
            .unwrap();
    }
    let p2 = harness.started_project();
    let p2_jobs = harness.jobs(&p2.id);
    assert_eq!(p2_jobs.len(), 1);
    assert_eq!(p2_jobs[0].queue_position, Some(3));

    let claimed = harness.scheduler.claim_next().unwrap().unwrap();
    assert_eq!(claimed.job.id, p1_jobs[0].id);
    harness.scheduler.fail_job(&claimed.job.id).unwrap();

    for job in &p1_jobs[1..] {
        let job = harness.job(&job.id);
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.queue_position, None);
    }

    let survivor = harness.job(&p2_jobs[0].id);
    assert_eq!(survivor.queue_position, Some(0));
    assert_eq!(survivor.status, JobStatus::Queued);
    assert_eq!(harness.queue_ids(), vec![survivor.id.clone()]);

    assert_eq!(harness.project(&p2.id).progress, ProjectProgress::Queued);
    assert_eq!(harness.project(&p1.id).progress, ProjectProgress::Error);
}

#[test]
fn test_concurrent_planning_never_shares_positions() {
    let harness = TestHarness::with_catalog(&["qc", "trim", "align"]);
    let projects: Vec<String> = (0..8)
        .map(|_| harness.scheduler.create_project(None).unwrap().id)
        .collect();

    let handles: Vec<_> = projects
        .iter()
        .cloned()
        .map(|id| {
            let scheduler = harness.scheduler.clone();
            thread::spawn(move || scheduler.start_project(&id).unwrap())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let positions = harness.positions();
    assert_eq!(positions.len(), 24);
    let unique: HashSet<u32> = positions.iter().copied().collect();
    assert_eq!(unique.len(), positions.len());
    harness.assert_dense();

    // Within each project the queue follows step order.
    for id in &projects {
        let queued: Vec<Option<u32>> = harness
            .jobs(id)
            .iter()
            .map(|j| j.queue_position)
            .collect();
        assert!(queued.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn test_concurrent_claims_hand_out_each_job_once() {
    let harness = TestHarness::with_catalog(&["qc", "quant"]);
    for _ in 0..5 {
        harness.started_project();
    }

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let scheduler = harness.scheduler.clone();
            thread::spawn(move || {
                let mut claimed = Vec::new();
                while let Some(job) = scheduler.claim_next().unwrap() {
                    let running = scheduler
                        .jobs(&job.project.id)
                        .unwrap()
                        .into_iter()
                        .filter(|j| j.status == JobStatus::Running)
                        .count();
                    assert_eq!(running, 1);
                    scheduler
                        .succeed_job(&job.job.id, Duration::from_millis(1))
                        .unwrap();
                    claimed.push(job.job.id);
                }
                claimed
            })
        })
        .collect();

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.join().unwrap());
    }
    let unique: HashSet<&String> = all.iter().collect();
    assert_eq!(all.len(), 10);
    assert_eq!(unique.len(), 10);
    assert!(harness.positions().is_empty());
}

#[test]
fn test_claim_skips_projects_with_running_step() {
    let harness = TestHarness::with_catalog(&["qc", "quant", "diff"]);
    let first = harness.started_project();
    let second = harness.started_project();
    let first_jobs = harness.jobs(&first.id);
    let second_jobs = harness.jobs(&second.id);

    let a = harness.scheduler.claim_next().unwrap().unwrap();
    assert_eq!(a.job.id, first_jobs[0].id);

    // The first project's next step waits; the second project goes ahead.
    let b = harness.scheduler.claim_next().unwrap().unwrap();
    assert_eq!(b.job.id, second_jobs[0].id);
    assert!(harness.scheduler.claim_next().unwrap().is_none());

    // Skipped jobs keep their place at the front of the queue.
    assert_eq!(
        harness.queue_ids(),
        vec![
            first_jobs[1].id.clone(),
            first_jobs[2].id.clone(),
            second_jobs[1].id.clone(),
            second_jobs[2].id.clone(),
        ]
    );
    harness.assert_dense();

    harness
        .scheduler
        .succeed_job(&a.job.id, Duration::from_secs(1))
        .unwrap();
    let c = harness.scheduler.claim_next().unwrap().unwrap();
    assert_eq!(c.job.id, first_jobs[1].id);
}

#[test]
fn test_project_never_runs_two_steps() {
    let harness = TestHarness::with_catalog(&["qc", "quant"]);
    let project = harness.started_project();
    let jobs = harness.jobs(&project.id);

    harness.scheduler.start_job(&jobs[0].id).unwrap();
    let err = harness.scheduler.start_job(&jobs[1].id).unwrap_err();
    assert!(matches!(err, AlaskaError::StepBlocked { .. }));
    assert!(harness.scheduler.claim_next().unwrap().is_none());

    let running: Vec<_> = harness
        .jobs(&project.id)
        .into_iter()
        .filter(|j| j.status == JobStatus::Running)
        .map(|j| j.id)
        .collect();
    assert_eq!(running, vec![jobs[0].id.clone()]);
    assert_eq!(harness.job(&jobs[1].id).queue_position, Some(0));
}

#[test]
fn test_claim_follows_queue_order() {
    let harness = TestHarness::with_catalog(&["qc", "quant"]);
    let first = harness.started_project();
    let second = harness.started_project();

    let order: Vec<String> = harness
        .jobs(&first.id)
        .into_iter()
        .chain(harness.jobs(&second.id))
        .map(|j| j.id)
        .collect();

    let mut claimed = Vec::new();
    while let Some(job) = harness.scheduler.claim_next().unwrap() {
        harness
            .scheduler
            .succeed_job(&job.job.id, Duration::from_secs(1))
            .unwrap();
        claimed.push(job.job.id);
    }
    assert_eq!(claimed, order);
}

#[test]
fn test_delete_project_compacts_queue() {
    let harness = TestHarness::with_catalog(&["qc", "quant"]);
    let doomed = harness.started_project();
    let kept = harness.started_project();

    let report = harness.scheduler.delete_project(&doomed.id).unwrap();
    assert_eq!(report.projects, 1);
    assert_eq!(report.jobs, 2);

    harness.assert_dense();
    let kept_ids: Vec<String> = harness.jobs(&kept.id).into_iter().map(|j| j.id).collect();
    assert_eq!(harness.queue_ids(), kept_ids);
    assert!(harness.scheduler.project(&doomed.id).is_err());
}
