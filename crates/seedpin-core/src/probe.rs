//! Best-effort provider probing for status display.
//!
//! A probe never gates a job: timeouts and errors collapse into
//! [`ProviderCount::Unknown`].

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::drivers::ProviderLookup;

/// Provider count as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderCount {
    Known(u32),
    Unknown,
}

impl fmt::Display for ProviderCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderCount::Known(n) => write!(f, "{} provider(s)", n),
            ProviderCount::Unknown => write!(f, "unknown providers"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("provider lookup timed out after {0:?}")]
    Timeout(Duration),
    #[error("provider lookup failed: {0}")]
    Failed(String),
}

/// Run one provider lookup bounded by `timeout`.
pub async fn try_probe(
    lookup: &dyn ProviderLookup,
    path: &str,
    num_providers: u32,
    timeout: Duration,
) -> Result<u32, ProbeError> {
    match tokio::time::timeout(timeout, lookup.find_providers(path, num_providers)).await {
        Ok(Ok(n)) => Ok(n),
        Ok(Err(e)) => Err(ProbeError::Failed(format!("{:#}", e))),
        Err(_) => Err(ProbeError::Timeout(timeout)),
    }
}

/// Like [`try_probe`], with failures reported as `Unknown`.
pub async fn probe(
    lookup: &dyn ProviderLookup,
    path: &str,
    num_providers: u32,
    timeout: Duration,
) -> ProviderCount {
    match try_probe(lookup, path, num_providers, timeout).await {
        Ok(n) => ProviderCount::Known(n),
        Err(e) => {
            tracing::debug!(path, "{}", e);
            ProviderCount::Unknown
        }
    }
}
