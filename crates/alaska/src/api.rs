//! Worker request/response protocol.
//!
//! Workers send one JSON request per call and always get back either
//! `{"result": ...}` or `{"error": {"kind", "message", "recoverable"}}`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AlaskaError, ErrorPayload, Result};
use crate::scheduler::Scheduler;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum WorkerRequest {
    /// Claim the job at the head of the queue. The result is `null` when the
    /// queue is empty.
    Dequeue,
    Started { job_id: String },
    Succeeded { job_id: String, runtime_secs: f64 },
    Failed { job_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkerResponse {
    Ok { result: serde_json::Value },
    Err { error: ErrorPayload },
}

impl WorkerResponse {
    pub fn is_ok(&self) -> bool {
        matches!(self, WorkerResponse::Ok { .. })
    }
}

impl From<Result<serde_json::Value>> for WorkerResponse {
    fn from(outcome: Result<serde_json::Value>) -> Self {
        match outcome {
            Ok(result) => WorkerResponse::Ok { result },
            Err(e) => {
                log::warn!("Worker request rejected: {}", e);
                WorkerResponse::Err { error: e.payload() }
            }
        }
    }
}

fn runtime_from_secs(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| AlaskaError::validation(format!("invalid runtime {} seconds", secs)))
}

impl Scheduler {
    /// Applies one worker request.
    pub fn handle(&self, request: WorkerRequest) -> WorkerResponse {
        let outcome = match request {
            WorkerRequest::Dequeue => self
                .claim_next()
                .and_then(|claimed| Ok(serde_json::to_value(claimed)?)),
            WorkerRequest::Started { job_id } => self
                .start_job(&job_id)
                .and_then(|job| Ok(serde_json::to_value(job)?)),
            WorkerRequest::Succeeded {
                job_id,
                runtime_secs,
            } => runtime_from_secs(runtime_secs)
                .and_then(|runtime| self.succeed_job(&job_id, runtime))
                .and_then(|job| Ok(serde_json::to_value(job)?)),
            WorkerRequest::Failed { job_id } => self
                .fail_job(&job_id)
                .and_then(|job| Ok(serde_json::to_value(job)?)),
        };
        outcome.into()
    }

    /// Decodes a JSON request, applies it and encodes the response.
    pub fn handle_json(&self, raw: &str) -> String {
        let response = match serde_json::from_str::<WorkerRequest>(raw) {
            Ok(request) => self.handle(request),
            Err(e) => WorkerResponse::Err {
                error: AlaskaError::validation(format!("malformed request: {}", e)).payload(),
            },
        };
        serde_json::to_string(&response).unwrap_or_else(|_| {
            r#"{"error":{"kind":"encode","message":"Failed to encode response","recoverable":false}}"#
                .to_string()
        })
    }
}
