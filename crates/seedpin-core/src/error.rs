//! Failure taxonomy of an object job.

use thiserror::Error;

/// Why an object job stopped without finishing.
///
/// Every variant is caught at the job boundary and turned into a status
/// update; none of them tear down the engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobError {
    /// Object metadata unreachable or the stat call timed out. No state was changed.
    #[error("stat failed: {0}")]
    Stat(String),
    /// The pin driver reported failure; `pinned` stays false.
    #[error("pin failed: {0}")]
    Pin(String),
    /// The transfer failed; `downloaded` stays false.
    #[error("download failed: {0}")]
    Download(String),
    /// A checkpoint write failed; no unconfirmed completion was claimed.
    #[error("persistence failed: {0}")]
    Persistence(String),
    /// A job is already active for this object.
    #[error("a job is already running for this object")]
    AlreadyRunning,
}

impl JobError {
    pub(crate) fn persistence(e: anyhow::Error) -> Self {
        JobError::Persistence(format!("{:#}", e))
    }
}

/// How a job run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Every requested aspect is satisfied and the row is FINISHED.
    Finished,
    /// `stop()` unwound the job; completed checkpoints are kept.
    Cancelled,
    Failed(JobError),
}

impl JobOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobOutcome::Finished)
    }
}
