//! Shared test utilities for alaska integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated scheduler instances backed by a temp database
//! - Builders and recording fakes for catalogs, samples and external services

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
