//! Floating global indicator.
//!
//! An observer with no link to the timer view beyond the shared store. It
//! reads the record on every probe and renders whatever the deadline says,
//! which is how it can show a timer started from a different page. It never
//! writes to the store and never reports completion.

use serde::{Deserialize, Serialize};

use crate::store::SessionStore;
use crate::timer::{format_compact, remaining_secs, Clock, TimerMode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorView {
    pub mode: TimerMode,
    pub remaining_secs: u64,
    pub label: String,
}

pub struct FloatingIndicator<S, C> {
    store: S,
    clock: C,
}

impl<S: SessionStore, C: Clock> FloatingIndicator<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    /// Current view, or `None` when the indicator should be hidden.
    pub fn probe(&self) -> Option<IndicatorView> {
        let record = match self.store.read() {
            Ok(record) => record?,
            Err(e) => {
                tracing::debug!("indicator could not read timer store: {}", e);
                return None;
            }
        };
        let remaining = remaining_secs(record.end_at_ms, self.clock.now_ms());
        (remaining > 0).then(|| IndicatorView {
            mode: record.mode,
            remaining_secs: remaining,
            label: format!("⏱ {}", format_compact(remaining)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoredSession};
    use crate::timer::ManualClock;

    #[test]
    fn hidden_without_session() {
        let indicator = FloatingIndicator::new(MemoryStore::new(), ManualClock::new(0));
        assert!(indicator.probe().is_none());
    }

    #[test]
    fn renders_remaining_from_stored_deadline() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(1_000_000);
        store
            .write(&StoredSession::new(1_000_000 + 125_000, TimerMode::Focus))
            .unwrap();
        let indicator = FloatingIndicator::new(store.clone(), clock.clone());
        let view = indicator.probe().unwrap();
        assert_eq!(view.remaining_secs, 125);
        assert_eq!(view.label, "⏱ 2:05");

        clock.advance_secs(125);
        assert!(indicator.probe().is_none());
        // Expired records are left for the timer view to complete.
        assert!(store.read().unwrap().is_some());
    }

    #[test]
    fn corrupt_record_hides_indicator() {
        let store = MemoryStore::new();
        store.put_raw("{").unwrap();
        let indicator = FloatingIndicator::new(store, ManualClock::new(0));
        assert!(indicator.probe().is_none());
    }
}
