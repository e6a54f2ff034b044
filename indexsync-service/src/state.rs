use indexsync_core::{CatalogRepository, Dispatcher, Outcome};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub type SharedState = Arc<AppState>;

/// Per-outcome event totals since startup
#[derive(Default)]
pub struct EventCounters {
    handled: AtomicU64,
    ignored: AtomicU64,
    unrecognized: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub handled: u64,
    pub ignored: u64,
    pub unrecognized: u64,
    pub failed: u64,
}

impl EventCounters {
    pub fn record<E>(&self, result: &Result<Outcome, E>) {
        let counter = match result {
            Ok(Outcome::Handled) => &self.handled,
            Ok(Outcome::Ignored) => &self.ignored,
            Ok(Outcome::Unrecognized) => &self.unrecognized,
            Err(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            handled: self.handled.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            unrecognized: self.unrecognized.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

pub struct AppState {
    pub dispatcher: Dispatcher<CatalogRepository>,
    pub counters: EventCounters,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher<CatalogRepository>) -> Self {
        Self {
            dispatcher,
            counters: EventCounters::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_track_each_outcome() {
        let counters = EventCounters::default();
        counters.record::<()>(&Ok(Outcome::Handled));
        counters.record::<()>(&Ok(Outcome::Handled));
        counters.record::<()>(&Ok(Outcome::Unrecognized));
        counters.record(&Err::<Outcome, _>("boom"));

        assert_eq!(
            counters.snapshot(),
            CounterSnapshot {
                handled: 2,
                ignored: 0,
                unrecognized: 1,
                failed: 1,
            }
        );
    }
}
