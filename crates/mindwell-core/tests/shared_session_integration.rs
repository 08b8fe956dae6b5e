//! Integration tests for observers sharing one persisted session.
//!
//! Every observer opens its own connection to the same SQLite file, the way
//! the timer view and the floating indicator run in separate processes.

use std::sync::{Arc, Mutex};

use mindwell_core::{
    AmbientNotifier, Database, Event, FloatingIndicator, ManualClock, NotificationService,
    SessionStore, SessionHost, StoredSession, TimerEngine, TimerMode, TimerSettings, TimerState,
};
use mindwell_core::error::StoreError;
use mindwell_core::storage::RewardsConfig;
use tempfile::TempDir;

const T0: u64 = 1_700_000_000_000;

// ============================================================================
// Test Helpers
// ============================================================================

struct Fixture {
    dir: TempDir,
    clock: ManualClock,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            clock: ManualClock::new(T0),
        }
    }

    fn db(&self) -> Database {
        Database::open_at(&self.dir.path().join("mindwell.db")).unwrap()
    }

    fn engine(&self) -> TimerEngine<Database, ManualClock> {
        TimerEngine::new(self.db(), self.clock.clone(), TimerSettings::default())
    }

    fn indicator(&self) -> FloatingIndicator<Database, ManualClock> {
        FloatingIndicator::new(self.db(), self.clock.clone())
    }
}

fn completions(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Event::SessionCompleted { .. }))
        .count()
}

#[derive(Clone, Default)]
struct Inbox(Arc<Mutex<Vec<String>>>);

impl NotificationService for Inbox {
    fn show_message(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }
}

/// Store that cannot be read.
struct BrokenStore;

impl SessionStore for BrokenStore {
    fn write(&self, _session: &StoredSession) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk gone".into()))
    }
    fn read(&self) -> Result<Option<StoredSession>, StoreError> {
        Err(StoreError::Unavailable("disk gone".into()))
    }
    fn clear(&self) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk gone".into()))
    }
    fn claim(&self, _end_at_ms: u64) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("disk gone".into()))
    }
}

// ============================================================================
// Shared record
// ============================================================================

#[test]
fn indicator_follows_session_started_elsewhere() {
    let fx = Fixture::new();
    let indicator = fx.indicator();
    assert!(indicator.probe().is_none());

    let mut timer = fx.engine();
    timer.start().unwrap();
    let view = indicator.probe().unwrap();
    assert_eq!(view.mode, TimerMode::Focus);
    assert_eq!(view.label, "⏱ 25:00");

    fx.clock.advance_secs(61);
    assert_eq!(indicator.probe().unwrap().label, "⏱ 23:59");
}

#[test]
fn full_focus_session_is_seen_identically_by_both_observers() {
    let fx = Fixture::new();
    let mut timer = fx.engine();
    let indicator = fx.indicator();
    timer.start().unwrap();

    for elapsed in 1..1500 {
        fx.clock.advance_secs(1);
        assert!(timer.tick().is_empty(), "unexpected events at {elapsed}s");
        let expected = 1500 - elapsed;
        assert_eq!(timer.remaining_secs(), expected);
        assert_eq!(indicator.probe().map(|v| v.remaining_secs), Some(expected));
    }

    fx.clock.advance_secs(1);
    assert_eq!(completions(&timer.tick()), 1);
    assert!(indicator.probe().is_none());
    assert!(fx.db().read().unwrap().is_none());
}

#[test]
fn completion_is_reported_by_exactly_one_engine() {
    let fx = Fixture::new();
    let mut first = fx.engine();
    first.start_for(60).unwrap();
    let mut second = fx.engine();
    assert!(second.is_running());
    assert_eq!(second.remaining_secs(), 60);

    fx.clock.advance_secs(90);
    let total = completions(&second.tick()) + completions(&first.tick());
    assert_eq!(total, 1);
    assert_eq!(first.state(), TimerState::Completed);
    assert_eq!(second.state(), TimerState::Completed);
}

#[test]
fn indicator_never_clears_the_record() {
    let fx = Fixture::new();
    let mut timer = fx.engine();
    timer.start_for(10).unwrap();
    fx.clock.advance_secs(30);

    let indicator = fx.indicator();
    assert!(indicator.probe().is_none());
    assert!(fx.db().read().unwrap().is_some());
    assert_eq!(completions(&timer.tick()), 1);
}

#[test]
fn pause_from_one_view_interrupts_the_other() {
    let fx = Fixture::new();
    let mut first = fx.engine();
    first.start().unwrap();
    let mut second = fx.engine();

    fx.clock.advance_secs(20);
    second.tick();
    first.pause();
    let events = second.tick();
    assert!(matches!(
        events.as_slice(),
        [Event::TimerInterrupted { remaining_secs: 1480, .. }]
    ));
    assert_eq!(second.state(), TimerState::Paused);
    assert!(fx.indicator().probe().is_none());
}

// ============================================================================
// Reload
// ============================================================================

#[test]
fn reload_resumes_from_deadline() {
    let fx = Fixture::new();
    let mut timer = fx.engine();
    timer.start().unwrap();
    let view = timer.view_state();
    drop(timer);

    fx.clock.advance_secs(600);
    let reloaded =
        TimerEngine::restore(fx.db(), fx.clock.clone(), TimerSettings::default(), Some(view));
    assert!(reloaded.is_running());
    assert_eq!(reloaded.remaining_secs(), 900);
}

#[test]
fn reload_after_deadline_completes_on_first_tick() {
    let fx = Fixture::new();
    let mut timer = fx.engine();
    timer.start_for(300).unwrap();
    drop(timer);

    fx.clock.advance_secs(3600);
    let mut reloaded = fx.engine();
    assert_eq!(reloaded.state(), TimerState::Completed);
    assert!(fx.indicator().probe().is_none());
    assert_eq!(completions(&reloaded.tick()), 1);
    assert!(reloaded.tick().is_empty());
    assert_eq!(reloaded.remaining_secs(), 0);
}

#[test]
fn corrupt_record_reads_as_no_session() {
    let fx = Fixture::new();
    fx.db()
        .kv_set(mindwell_core::store::ACTIVE_TIMER_KEY, "{\"endAt\":12")
        .unwrap();
    let mut timer = fx.engine();
    assert_eq!(timer.state(), TimerState::Idle);
    assert!(timer.tick().is_empty());
    assert!(fx.indicator().probe().is_none());
}

#[test]
fn unreadable_store_degrades_to_idle() {
    let clock = ManualClock::new(T0);
    let mut timer = TimerEngine::new(BrokenStore, clock.clone(), TimerSettings::default());
    assert!(timer.tick().is_empty());
    assert!(timer.start().is_err());
    assert_eq!(timer.state(), TimerState::Idle);
    assert!(FloatingIndicator::new(BrokenStore, clock).probe().is_none());
}

// ============================================================================
// Host
// ============================================================================

#[test]
fn host_records_history_and_rewards_on_completion() {
    let fx = Fixture::new();
    let inbox = Inbox::default();
    let host = SessionHost::new(
        AmbientNotifier::silent(),
        fx.db(),
        inbox.clone(),
        RewardsConfig::default(),
    )
    .with_history(fx.db());

    let mut timer = fx.engine();
    timer.set_mode(TimerMode::Breathing);
    host.dispatch_all(&timer.start().unwrap());
    fx.clock.advance_secs(60);
    host.dispatch_all(&timer.tick());

    let db = fx.db();
    let recent = db.recent_sessions(5).unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].mode, "breathing");
    assert_eq!(recent[0].duration_secs, 60);
    assert_eq!(db.progress().unwrap().xp, 50);
    assert_eq!(
        inbox.0.lock().unwrap().clone(),
        vec!["Breathing session complete", "+50 XP gained"]
    );
}
