//! Builders and fakes for creating test data without boilerplate.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use alaska::config::{AnalysisConfig, Config};
use alaska::{
    Project, ProjectProvisioner, ProjectResources, ReadInput, Sample, SampleInput, TransportError,
};

/// Builder for `SampleInput` values.
pub struct SampleBuilder {
    name: String,
    reads: Vec<ReadInput>,
}

impl SampleBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reads: Vec::new(),
        }
    }

    /// Adds a complete read.
    pub fn read(mut self, path: &str) -> Self {
        self.reads.push(ReadInput {
            path: Some(path.to_string()),
            size: Some(1_048_576),
            md5_checksum: Some("5d41402abc4b2a76b9719d911017c592".to_string()),
        });
        self
    }

    /// Adds a read with no checksum.
    pub fn read_without_checksum(mut self, path: &str) -> Self {
        self.reads.push(ReadInput {
            path: Some(path.to_string()),
            size: Some(1_048_576),
            md5_checksum: None,
        });
        self
    }

    pub fn build(self) -> SampleInput {
        SampleInput {
            name: self.name,
            reads: self.reads,
        }
    }
}

/// Builder for `Config` instances.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config {
                worker_count: 1,
                ..Config::default()
            },
        }
    }

    pub fn database_path(mut self, path: &str) -> Self {
        self.config.database_path = Some(path.to_string());
        self
    }

    pub fn spool_directory(mut self, path: &str) -> Self {
        self.config.notifications.spool_directory = Some(path.to_string());
        self
    }

    pub fn finalized_progress(mut self, value: i64) -> Self {
        self.config.progress.finalized = value;
        self
    }

    pub fn analysis(mut self, code: &str, step: i64, active: bool) -> Self {
        self.config.analyses.push(AnalysisConfig {
            code: code.to_string(),
            name: code.to_uppercase(),
            step,
            active,
        });
        self
    }

    pub fn build(self) -> Config {
        self.config
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.config).expect("Failed to serialize config")
    }
}

/// Provisioner that fails on the n-th sample (0-based) or on project
/// initialization.
#[derive(Default)]
pub struct FlakyProvisioner {
    pub fail_project: bool,
    pub fail_sample_at: Option<usize>,
    samples_seen: AtomicUsize,
}

impl FlakyProvisioner {
    pub fn failing_project() -> Self {
        Self {
            fail_project: true,
            ..Self::default()
        }
    }

    pub fn failing_sample(index: usize) -> Self {
        Self {
            fail_sample_at: Some(index),
            ..Self::default()
        }
    }
}

impl ProjectProvisioner for FlakyProvisioner {
    fn initialize_project(&self, _project: &Project) -> Result<(), TransportError> {
        if self.fail_project {
            return Err(TransportError::RequestFailed {
                endpoint: "initialize".to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    fn initialize_sample(
        &self,
        _project: &Project,
        _sample: &Sample,
    ) -> Result<(), TransportError> {
        let seen = self.samples_seen.fetch_add(1, Ordering::SeqCst);
        if self.fail_sample_at == Some(seen) {
            return Err(TransportError::BadResponse {
                endpoint: "sample/initialize".to_string(),
                reason: "status 500".to_string(),
            });
        }
        Ok(())
    }
}

/// Resource manager recording sessions and releases, optionally refusing
/// releases.
#[derive(Default)]
pub struct RecordingResources {
    pub refuse: bool,
    pub sessions_opened: AtomicUsize,
    pub released: Mutex<Vec<String>>,
    pub released_ports: Mutex<Vec<Option<u16>>>,
}

impl ProjectResources for RecordingResources {
    fn open_session(&self, _project: &Project) -> Result<u16, TransportError> {
        let n = self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(3838 + n as u16)
    }

    fn release(&self, project: &Project) -> Result<(), TransportError> {
        if self.refuse {
            return Err(TransportError::RequestFailed {
                endpoint: "session/stop".to_string(),
                reason: "timed out".to_string(),
            });
        }
        self.released.lock().unwrap().push(project.id.clone());
        self.released_ports.lock().unwrap().push(project.session_port);
        Ok(())
    }
}
