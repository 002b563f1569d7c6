//! Seed pinning and download orchestration.
//!
//! A seed is a named collection of content-addressed objects. For each object
//! the engine runs a job that pins and/or downloads it through pluggable
//! drivers, checkpoints progress in SQLite, and can be cancelled and resumed
//! without repeating finished work.

pub mod config;
pub mod logging;

pub mod catalog;
pub mod control;
pub mod drivers;
pub mod engine;
pub mod error;
pub mod events;
pub mod job;
pub mod kubo;
pub mod naming;
pub mod probe;
pub mod seed;
pub mod store;

pub use catalog::SeedCatalog;
pub use engine::SeedEngine;
pub use error::{JobError, JobOutcome};
pub use events::{EngineEvent, EventBus, JobPhase, Progress};
pub use seed::SeedController;
