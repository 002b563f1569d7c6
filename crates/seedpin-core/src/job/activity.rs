//! Seed-wide count of jobs inside an active pin/download phase.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::events::{EngineEvent, EventBus};
use crate::store::SeedId;

/// Shared counter; every change is broadcast as `ActiveJobsChanged`.
#[derive(Clone)]
pub struct ActivityCounter {
    seed_id: SeedId,
    count: Arc<AtomicUsize>,
    events: EventBus,
}

impl ActivityCounter {
    pub fn new(seed_id: SeedId, events: EventBus) -> Self {
        Self {
            seed_id,
            count: Arc::new(AtomicUsize::new(0)),
            events,
        }
    }

    pub fn current(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Enter an active phase; leaving happens when the guard drops.
    pub(crate) fn enter(&self) -> ActiveGuard {
        let count = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        self.announce(count);
        ActiveGuard {
            counter: self.clone(),
        }
    }

    fn announce(&self, count: usize) {
        self.events.emit(EngineEvent::ActiveJobsChanged {
            seed_id: self.seed_id,
            count,
        });
    }
}

/// Decrements the activity count when dropped.
pub(crate) struct ActiveGuard {
    counter: ActivityCounter,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let count = self.counter.count.fetch_sub(1, Ordering::SeqCst) - 1;
        self.counter.announce(count);
    }
}
