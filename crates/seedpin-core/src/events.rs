//! Engine events broadcast to observers (CLI progress printer, UIs, tests).

use tokio::sync::broadcast;

use crate::probe::ProviderCount;
use crate::store::SeedId;

/// Observable phase of one object job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Idle,
    Queued,
    Stat,
    Pinning,
    Downloading,
    Finished,
    Error,
    Cancelled,
}

impl JobPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            JobPhase::Idle => "idle",
            JobPhase::Queued => "queued",
            JobPhase::Stat => "stat",
            JobPhase::Pinning => "pinning",
            JobPhase::Downloading => "downloading",
            JobPhase::Finished => "finished",
            JobPhase::Error => "error",
            JobPhase::Cancelled => "cancelled",
        }
    }

    /// Phases in which the job is holding a pin or download in flight.
    pub fn is_active(self) -> bool {
        matches!(self, JobPhase::Pinning | JobPhase::Downloading)
    }
}

/// A progress tick for one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Nodes(u64),
    Percent(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    ObjectStatus {
        seed_id: SeedId,
        obj_index: i64,
        text: String,
    },
    ObjectProgress {
        seed_id: SeedId,
        obj_index: i64,
        progress: Progress,
    },
    ObjectPhase {
        seed_id: SeedId,
        obj_index: i64,
        phase: JobPhase,
    },
    ObjectProviders {
        seed_id: SeedId,
        obj_index: i64,
        providers: ProviderCount,
    },
    SeedAdded {
        seed_id: SeedId,
        dag_cid: String,
    },
    SeedReconfigured {
        seed_id: SeedId,
    },
    SeedRemoved {
        dag_cid: String,
    },
    ActiveJobsChanged {
        seed_id: SeedId,
        count: usize,
    },
}

/// Cloneable handle to the engine's broadcast channel.
///
/// Emitting never blocks; observers that fall behind lose the oldest events.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: EngineEvent) {
        // No subscribers is fine: the engine runs headless too.
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
