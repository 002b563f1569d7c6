//! Status text and event reporting for one object job.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::events::{EngineEvent, EventBus, JobPhase, Progress};
use crate::probe::ProviderCount;
use crate::store::SeedId;

/// Emits the events of one object and tracks its current phase.
#[derive(Clone)]
pub(crate) struct Reporter {
    seed_id: SeedId,
    obj_index: i64,
    events: EventBus,
    phase: Arc<watch::Sender<JobPhase>>,
}

impl Reporter {
    pub(crate) fn new(seed_id: SeedId, obj_index: i64, events: EventBus) -> Self {
        let (tx, _) = watch::channel(JobPhase::Idle);
        Self {
            seed_id,
            obj_index,
            events,
            phase: Arc::new(tx),
        }
    }

    pub(crate) fn current_phase(&self) -> JobPhase {
        *self.phase.borrow()
    }

    pub(crate) fn phase(&self, phase: JobPhase) {
        self.phase.send_replace(phase);
        self.events.emit(EngineEvent::ObjectPhase {
            seed_id: self.seed_id,
            obj_index: self.obj_index,
            phase,
        });
    }

    pub(crate) fn status(&self, text: impl Into<String>) {
        self.events.emit(EngineEvent::ObjectStatus {
            seed_id: self.seed_id,
            obj_index: self.obj_index,
            text: text.into(),
        });
    }

    pub(crate) fn progress(&self, progress: Progress) {
        self.events.emit(EngineEvent::ObjectProgress {
            seed_id: self.seed_id,
            obj_index: self.obj_index,
            progress,
        });
    }

    pub(crate) fn providers(&self, providers: ProviderCount) {
        self.events.emit(EngineEvent::ObjectProviders {
            seed_id: self.seed_id,
            obj_index: self.obj_index,
            providers,
        });
    }
}

/// `1.5s`, `42s`, `3m05s`.
pub(crate) fn human_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 10 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 60 {
        format!("{}s", secs)
    } else {
        format!("{}m{:02}s", secs / 60, secs % 60)
    }
}

pub(crate) fn pinning_text(nodes: u64, since_last: Duration) -> String {
    format!("pinning, {} nodes (+{})", nodes, human_duration(since_last))
}

pub(crate) fn stalled_text(silence: Duration) -> String {
    format!("pinning stalled, no progress for {}", human_duration(silence))
}

pub(crate) fn downloading_text(percent: u8, bytes_read: u64, content_length: u64) -> String {
    format!("downloading, {}% ({} / {} bytes)", percent, bytes_read, content_length)
}

/// Integer percentage clamped to 100. An empty object counts as complete.
pub(crate) fn percent(bytes_read: u64, content_length: u64) -> u8 {
    if content_length == 0 {
        return 100;
    }
    let pct = (bytes_read as u128 * 100) / content_length as u128;
    pct.min(100) as u8
}
