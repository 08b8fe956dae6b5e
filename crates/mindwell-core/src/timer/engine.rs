//! Timer engine implementation.
//!
//! The engine is a deadline-anchored state machine. It does not use internal
//! threads or count ticks: starting a session writes an absolute deadline to a
//! [`SessionStore`], and every observation recomputes remaining time from that
//! deadline and the [`Clock`]. A host that was suspended for ten minutes sees
//! the correct value on its next `tick()`.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> (Paused | Completed) -> Running
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(store, SystemClock, settings);
//! engine.start()?;
//! // Once per second:
//! for event in engine.tick() { host.dispatch(&event); }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::clock::Clock;
use super::deadline::{deadline_from, elapsed_secs, remaining_secs};
use super::mode::TimerMode;
use super::phase::{BreathPhase, PhaseScheduler, PhaseTable, PhaseTransition};
use crate::error::{Result, ValidationError};
use crate::events::Event;
use crate::store::{SessionStore, StoredSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    /// Session reached zero. Remaining stays at zero until the next start.
    Completed,
}

/// Durations and breathing table the engine runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSettings {
    pub focus_secs: u64,
    pub break_secs: u64,
    pub breathing_secs: u64,
    pub breathing: PhaseTable,
    /// Move Focus -> Break -> Focus when starting after a completion.
    pub auto_advance: bool,
}

impl TimerSettings {
    pub fn duration_for(&self, mode: TimerMode) -> u64 {
        match mode {
            TimerMode::Focus => self.focus_secs,
            TimerMode::Break => self.break_secs,
            TimerMode::Breathing => self.breathing_secs,
        }
    }
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            focus_secs: 25 * 60,
            break_secs: 5 * 60,
            breathing_secs: 60,
            breathing: PhaseTable::triangle(),
            auto_advance: true,
        }
    }
}

/// Host-side state that is not part of the shared record.
///
/// A host persists this between runs so a paused remainder or the last
/// announced phase survives a restart. It never carries authority over the
/// deadline itself; the store does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub mode: TimerMode,
    pub state: TimerState,
    pub held_secs: u64,
    pub session_secs: u64,
    #[serde(default)]
    pub end_at_ms: Option<u64>,
    #[serde(default)]
    pub last_phase: Option<BreathPhase>,
    /// Deadline of the last session this view reported complete.
    #[serde(default)]
    pub completed_end_at_ms: Option<u64>,
}

/// Core timer engine.
///
/// Holds no deadline of its own beyond the one it last saw in the store.
pub struct TimerEngine<S, C> {
    store: S,
    clock: C,
    settings: TimerSettings,
    mode: TimerMode,
    state: TimerState,
    /// Full length of the current session.
    session_secs: u64,
    /// Remaining seconds when not running; the last observed value while running.
    held_secs: u64,
    /// Deadline of the session this observer believes is running.
    end_at_ms: Option<u64>,
    /// Deadline of the last session this observer saw complete.
    completed_end_at_ms: Option<u64>,
    phases: Option<PhaseScheduler>,
    /// Events found while restoring, handed out by the next `tick()`.
    pending: Vec<Event>,
}

impl<S: SessionStore, C: Clock> TimerEngine<S, C> {
    /// Create an engine in Focus mode, adopting any session already stored.
    pub fn new(store: S, clock: C, settings: TimerSettings) -> Self {
        Self::restore(store, clock, settings, None)
    }

    /// Recreate an engine from a previous run's [`ViewState`].
    ///
    /// The store is observed once before returning, so an overdue session is
    /// already `Completed`. Events from that observation are returned by the
    /// first `tick()`.
    pub fn restore(store: S, clock: C, settings: TimerSettings, view: Option<ViewState>) -> Self {
        let mode = view.map(|v| v.mode).unwrap_or(TimerMode::Focus);
        let mut engine = Self {
            store,
            clock,
            settings,
            mode,
            state: TimerState::Idle,
            session_secs: settings.duration_for(mode),
            held_secs: settings.duration_for(mode),
            end_at_ms: None,
            completed_end_at_ms: view.and_then(|v| v.completed_end_at_ms),
            phases: None,
            pending: Vec::new(),
        };

        if let Some(view) = view {
            engine.state = view.state;
            engine.session_secs = view.session_secs;
            engine.held_secs = view.held_secs;
            engine.end_at_ms = view.end_at_ms.filter(|_| view.state == TimerState::Running);
            if engine.state == TimerState::Running && engine.end_at_ms.is_none() {
                engine.state = TimerState::Paused;
            }
        }
        engine.phases = engine.scheduler_for(mode).map(|phases| {
            match view.and_then(|v| v.last_phase) {
                Some(last) => phases.with_current(last),
                None => phases,
            }
        });

        // First observation: an overdue record completes here, not on a later tick.
        engine.pending = engine.observe_store();
        engine
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn session_secs(&self) -> u64 {
        self.session_secs
    }

    pub fn end_at_ms(&self) -> Option<u64> {
        self.end_at_ms
    }

    /// Remaining seconds, recomputed from the deadline on every call while
    /// running.
    pub fn remaining_secs(&self) -> u64 {
        match self.end_at_ms {
            Some(end) if self.state == TimerState::Running => {
                remaining_secs(end, self.clock.now_ms())
            }
            _ => self.held_secs,
        }
    }

    pub fn elapsed_secs(&self) -> u64 {
        elapsed_secs(self.session_secs, self.remaining_secs())
    }

    pub fn phase(&self) -> Option<BreathPhase> {
        self.phases.as_ref().map(PhaseScheduler::current)
    }

    /// Full breathing cycles finished in the current session.
    pub fn cycles_completed(&self) -> u64 {
        match self.mode {
            TimerMode::Breathing => self.settings.breathing.cycles_completed(self.elapsed_secs()),
            _ => 0,
        }
    }

    pub fn view_state(&self) -> ViewState {
        ViewState {
            mode: self.mode,
            state: self.state,
            held_secs: self.held_secs,
            session_secs: self.session_secs,
            end_at_ms: self.end_at_ms,
            last_phase: self.phase(),
            completed_end_at_ms: self.completed_end_at_ms,
        }
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            mode: self.mode,
            running: self.is_running(),
            remaining_secs: self.remaining_secs(),
            total_secs: self.session_secs,
            end_at_ms: self.end_at_ms,
            phase: self.phase(),
            cycles_completed: self.cycles_completed(),
            at: self.at(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start or resume from the held remainder.
    ///
    /// After a completion this begins a fresh session, in the next mode when
    /// `auto_advance` is set. Already running is a no-op. A zero duration is
    /// rejected and the engine stays where it was.
    pub fn start(&mut self) -> Result<Vec<Event>> {
        let mut events = self.tick();
        match self.state {
            TimerState::Running => return Ok(events),
            TimerState::Completed => {
                let next = if self.settings.auto_advance {
                    self.mode.next()
                } else {
                    self.mode
                };
                self.switch_mode(next);
            }
            TimerState::Idle | TimerState::Paused => {}
        }
        events.push(self.begin(self.held_secs)?);
        Ok(events)
    }

    /// Start a fresh session of exactly `duration_secs`, replacing whatever
    /// is running.
    pub fn start_for(&mut self, duration_secs: u64) -> Result<Vec<Event>> {
        if duration_secs == 0 {
            return Err(self.invalid_duration());
        }
        let events = self.tick();
        if self.state == TimerState::Completed {
            self.state = TimerState::Idle;
        }
        self.session_secs = duration_secs;
        self.held_secs = duration_secs;
        if let Some(phases) = self.phases.as_mut() {
            phases.reset();
        }
        let mut events = events;
        events.push(self.begin(duration_secs)?);
        Ok(events)
    }

    /// One observation of the shared record.
    ///
    /// Adopts a session written by another observer, notices one that was
    /// cleared underneath us, reports breathing phase changes, and completes
    /// a session whose deadline has passed, including one that passed while
    /// nothing was observing.
    ///
    /// Events found while the engine was being restored come first.
    pub fn tick(&mut self) -> Vec<Event> {
        let mut events = std::mem::take(&mut self.pending);
        events.extend(self.observe_store());
        events
    }

    /// Capture the remainder and drop the shared record.
    ///
    /// A session whose deadline already passed completes instead.
    pub fn pause(&mut self) -> Vec<Event> {
        let mut events = self.tick();
        if self.state != TimerState::Running {
            return events;
        }
        self.clear_store();
        self.end_at_ms = None;
        self.state = TimerState::Paused;
        tracing::debug!("paused {} with {}s left", self.mode, self.held_secs);
        events.push(Event::TimerPaused {
            mode: self.mode,
            remaining_secs: self.held_secs,
            at: self.at(),
        });
        events
    }

    /// Stop without starting and show the full configured duration.
    pub fn reset(&mut self) -> Event {
        let secs = self.settings.duration_for(self.mode);
        self.reset_for(secs)
    }

    /// Stop without starting and show `duration_secs`.
    pub fn reset_for(&mut self, duration_secs: u64) -> Event {
        self.clear_store();
        self.end_at_ms = None;
        self.state = TimerState::Idle;
        self.session_secs = duration_secs;
        self.held_secs = duration_secs;
        if let Some(phases) = self.phases.as_mut() {
            phases.reset();
        }
        Event::TimerReset {
            mode: self.mode,
            remaining_secs: duration_secs,
            at: self.at(),
        }
    }

    /// Switch mode, resetting to the new mode's full duration.
    pub fn set_mode(&mut self, mode: TimerMode) -> Event {
        self.switch_mode(mode);
        self.reset()
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn observe_store(&mut self) -> Vec<Event> {
        let stored = self
            .read_store()
            .filter(|record| Some(record.end_at_ms) != self.completed_end_at_ms);
        match (stored, self.end_at_ms) {
            (None, None) => Vec::new(),
            (None, Some(end_at_ms)) => {
                self.end_at_ms = None;
                if self.state != TimerState::Running {
                    return Vec::new();
                }
                if remaining_secs(end_at_ms, self.clock.now_ms()) == 0 {
                    // Another observer claimed the completion.
                    self.completed_end_at_ms = Some(end_at_ms);
                    self.state = TimerState::Completed;
                    self.held_secs = 0;
                    return Vec::new();
                }
                self.state = TimerState::Paused;
                tracing::info!(
                    "{} session cleared externally, holding {}s",
                    self.mode,
                    self.held_secs
                );
                vec![Event::TimerInterrupted {
                    mode: self.mode,
                    remaining_secs: self.held_secs,
                    at: self.at(),
                }]
            }
            (Some(record), current) => {
                if current != Some(record.end_at_ms) || self.state != TimerState::Running {
                    self.adopt(record);
                }
                self.observe(record)
            }
        }
    }

    fn begin(&mut self, duration_secs: u64) -> Result<Event> {
        if duration_secs == 0 {
            return Err(self.invalid_duration());
        }
        let end_at_ms = deadline_from(self.clock.now_ms(), duration_secs);
        self.store.write(&StoredSession::new(end_at_ms, self.mode))?;

        self.end_at_ms = Some(end_at_ms);
        self.state = TimerState::Running;
        self.held_secs = duration_secs;
        let elapsed = elapsed_secs(self.session_secs, duration_secs);
        let table = self.settings.breathing;
        let session_secs = self.session_secs;
        let phase = self.phases.as_mut().map(|phases| {
            let phase = table.phase_for_elapsed(elapsed);
            *phases = PhaseScheduler::new(table, session_secs).with_current(phase);
            phase
        });
        tracing::info!("started {} for {}s, deadline {}", self.mode, duration_secs, end_at_ms);

        Ok(Event::TimerStarted {
            mode: self.mode,
            duration_secs,
            end_at_ms,
            phase,
            at: self.at(),
        })
    }

    fn observe(&mut self, record: StoredSession) -> Vec<Event> {
        let remaining = remaining_secs(record.end_at_ms, self.clock.now_ms());
        self.held_secs = remaining;
        if remaining > 0 {
            let elapsed = elapsed_secs(self.session_secs, remaining);
            let transition = self.phases.as_mut().and_then(|phases| phases.observe(elapsed));
            return transition.map(|t| vec![self.phase_event(t)]).unwrap_or_default();
        }
        self.complete(record)
    }

    fn complete(&mut self, record: StoredSession) -> Vec<Event> {
        let claimed = match self.store.claim(record.end_at_ms) {
            Ok(claimed) => claimed,
            Err(e) => {
                // Report it here, and keep the record from reaching another observer.
                tracing::warn!("could not claim completed {} session: {}", record.mode, e);
                self.clear_store();
                true
            }
        };
        self.end_at_ms = None;
        self.completed_end_at_ms = Some(record.end_at_ms);
        self.state = TimerState::Completed;
        self.held_secs = 0;

        let session_secs = self.session_secs;
        let finish = self.phases.as_mut().and_then(|phases| phases.finish(session_secs));
        if !claimed {
            tracing::debug!("{} session completion already reported elsewhere", record.mode);
            return Vec::new();
        }

        tracing::info!("{} session complete", self.mode);
        let mut events = Vec::new();
        if let Some(transition) = finish {
            events.push(self.phase_event(transition));
        }
        events.push(Event::SessionCompleted {
            mode: self.mode,
            duration_secs: self.session_secs,
            end_at_ms: record.end_at_ms,
            at: self.at(),
        });
        events
    }

    /// Take over a record this observer did not write.
    fn adopt(&mut self, record: StoredSession) {
        if record.mode != self.mode {
            self.switch_mode(record.mode);
        }
        tracing::debug!("observing stored {} session ending at {}", record.mode, record.end_at_ms);
        let remaining = remaining_secs(record.end_at_ms, self.clock.now_ms());
        self.session_secs = self.session_secs.max(remaining);
        self.end_at_ms = Some(record.end_at_ms);
        self.state = TimerState::Running;
        self.held_secs = remaining;
        let session_secs = self.session_secs;
        let elapsed = elapsed_secs(session_secs, remaining);
        let table = self.settings.breathing;
        if let Some(phases) = self.phases.as_mut() {
            *phases =
                PhaseScheduler::new(table, session_secs).with_current(table.phase_for_elapsed(elapsed));
        }
    }

    fn switch_mode(&mut self, mode: TimerMode) {
        self.mode = mode;
        self.state = TimerState::Idle;
        self.session_secs = self.settings.duration_for(mode);
        self.held_secs = self.session_secs;
        self.phases = self.scheduler_for(mode);
    }

    fn scheduler_for(&self, mode: TimerMode) -> Option<PhaseScheduler> {
        (mode == TimerMode::Breathing)
            .then(|| PhaseScheduler::new(self.settings.breathing, self.session_secs))
    }

    fn read_store(&self) -> Option<StoredSession> {
        match self.store.read() {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("timer store unreadable, treating as no active session: {}", e);
                None
            }
        }
    }

    fn clear_store(&self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!("failed to clear timer store: {}", e);
        }
    }

    fn phase_event(&self, transition: PhaseTransition) -> Event {
        Event::PhaseChanged {
            from: transition.from,
            to: transition.to,
            elapsed_secs: transition.elapsed_secs,
            at: self.at(),
        }
    }

    fn invalid_duration(&self) -> crate::error::CoreError {
        ValidationError::InvalidDuration {
            mode: self.mode.to_string(),
        }
        .into()
    }

    fn at(&self) -> DateTime<Utc> {
        i64::try_from(self.clock.now_ms())
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryStore;
    use crate::timer::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const T0: u64 = 1_700_000_000_000;

    fn engine(store: &MemoryStore, clock: &ManualClock) -> TimerEngine<MemoryStore, ManualClock> {
        TimerEngine::new(store.clone(), clock.clone(), TimerSettings::default())
    }

    fn completions(events: &[Event]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, Event::SessionCompleted { .. }))
            .count()
    }

    #[test]
    fn start_writes_deadline_and_reports_full_duration() {
        let (store, clock) = (MemoryStore::new(), ManualClock::new(T0));
        let mut e = engine(&store, &clock);
        let events = e.start().unwrap();
        assert!(matches!(events.last(), Some(Event::TimerStarted { duration_secs: 1500, .. })));
        assert_eq!(e.remaining_secs(), 1500);
        assert_eq!(
            store.read().unwrap(),
            Some(StoredSession::new(T0 + 1_500_000, TimerMode::Focus))
        );
    }

    #[test]
    fn start_while_running_is_noop() {
        let (store, clock) = (MemoryStore::new(), ManualClock::new(T0));
        let mut e = engine(&store, &clock);
        e.start().unwrap();
        clock.advance_secs(10);
        assert!(e.start().unwrap().is_empty());
        assert_eq!(e.remaining_secs(), 1490);
    }

    #[test]
    fn suspended_host_catches_up_on_next_tick() {
        let (store, clock) = (MemoryStore::new(), ManualClock::new(T0));
        let mut e = engine(&store, &clock);
        e.start().unwrap();
        clock.advance_secs(600);
        assert!(e.tick().is_empty());
        assert_eq!(e.remaining_secs(), 900);
    }

    #[test]
    fn full_focus_session_completes_once() {
        let (store, clock) = (MemoryStore::new(), ManualClock::new(T0));
        let mut e = engine(&store, &clock);
        e.start().unwrap();
        clock.advance_secs(1500);
        let first = e.tick();
        assert_eq!(completions(&first), 1);
        assert_eq!(e.remaining_secs(), 0);
        assert_eq!(e.state(), TimerState::Completed);
        clock.advance_secs(5);
        assert!(e.tick().is_empty());
        assert_eq!(e.remaining_secs(), 0);
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn pause_then_start_uses_captured_remainder() {
        let (store, clock) = (MemoryStore::new(), ManualClock::new(T0));
        let mut e = engine(&store, &clock);
        e.start_for(60).unwrap();
        clock.advance_secs(15);
        let paused = e.pause();
        assert!(matches!(paused.last(), Some(Event::TimerPaused { remaining_secs: 45, .. })));
        assert!(store.read().unwrap().is_none());

        clock.advance_secs(300);
        assert_eq!(e.remaining_secs(), 45);
        e.start().unwrap();
        let now = T0 + 315_000;
        assert_eq!(e.end_at_ms(), Some(now + 45_000));
        assert_eq!(store.read().unwrap().map(|s| s.end_at_ms), Some(now + 45_000));
    }

    #[test]
    fn pause_after_deadline_completes_instead() {
        let (store, clock) = (MemoryStore::new(), ManualClock::new(T0));
        let mut e = engine(&store, &clock);
        e.start_for(30).unwrap();
        clock.advance_secs(31);
        let events = e.pause();
        assert_eq!(completions(&events), 1);
        assert!(!events.iter().any(|ev| matches!(ev, Event::TimerPaused { .. })));
    }

    #[test]
    fn reset_clears_store_and_shows_full_duration() {
        let (store, clock) = (MemoryStore::new(), ManualClock::new(T0));
        let mut e = engine(&store, &clock);
        e.start().unwrap();
        clock.advance_secs(100);
        e.reset();
        assert!(store.read().unwrap().is_none());
        assert_eq!(e.state(), TimerState::Idle);
        assert_eq!(e.remaining_secs(), 1500);
    }

    #[test]
    fn zero_duration_is_rejected_without_starting() {
        let (store, clock) = (MemoryStore::new(), ManualClock::new(T0));
        let settings = TimerSettings {
            focus_secs: 0,
            ..TimerSettings::default()
        };
        let mut e = TimerEngine::new(store.clone(), clock, settings);
        assert!(matches!(
            e.start(),
            Err(crate::error::CoreError::Validation(ValidationError::InvalidDuration { .. }))
        ));
        assert!(e.start_for(0).is_err());
        assert!(!e.is_running());
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn external_clear_falls_back_to_last_observed() {
        let (store, clock) = (MemoryStore::new(), ManualClock::new(T0));
        let mut e = engine(&store, &clock);
        e.start().unwrap();
        clock.advance_secs(20);
        e.tick();
        store.clear().unwrap();
        clock.advance_secs(1);
        let events = e.tick();
        assert!(matches!(
            events.as_slice(),
            [Event::TimerInterrupted { remaining_secs: 1480, .. }]
        ));
        assert_eq!(e.remaining_secs(), 1480);
        assert_eq!(e.state(), TimerState::Paused);
    }

    #[test]
    fn past_deadline_completes_on_first_observation() {
        let (store, clock) = (MemoryStore::new(), ManualClock::new(T0));
        store
            .write(&StoredSession::new(T0 - 5_000, TimerMode::Break))
            .unwrap();
        let mut e = engine(&store, &clock);
        assert_eq!(e.mode(), TimerMode::Break);
        assert_eq!(e.remaining_secs(), 0);
        assert_eq!(e.state(), TimerState::Completed);
        assert!(matches!(e.snapshot(), Event::StateSnapshot { running: false, .. }));
        assert!(store.read().unwrap().is_none());
        let events = e.tick();
        assert!(matches!(
            events.as_slice(),
            [Event::SessionCompleted { mode: TimerMode::Break, .. }]
        ));
    }

    #[test]
    fn start_after_completion_advances_mode() {
        let (store, clock) = (MemoryStore::new(), ManualClock::new(T0));
        let mut e = engine(&store, &clock);
        e.start().unwrap();
        clock.advance_secs(1500);
        e.tick();
        e.start().unwrap();
        assert_eq!(e.mode(), TimerMode::Break);
        assert_eq!(e.remaining_secs(), 300);
    }

    #[test]
    fn start_after_completion_without_auto_advance_repeats_mode() {
        let (store, clock) = (MemoryStore::new(), ManualClock::new(T0));
        let settings = TimerSettings {
            auto_advance: false,
            ..TimerSettings::default()
        };
        let mut e = TimerEngine::new(store, clock.clone(), settings);
        e.start().unwrap();
        clock.advance_secs(1500);
        e.tick();
        e.start().unwrap();
        assert_eq!(e.mode(), TimerMode::Focus);
        assert_eq!(e.remaining_secs(), 1500);
    }

    #[test]
    fn new_session_replaces_previous_deadline() {
        let (store, clock) = (MemoryStore::new(), ManualClock::new(T0));
        let mut e = engine(&store, &clock);
        e.start().unwrap();
        e.set_mode(TimerMode::Breathing);
        e.start().unwrap();
        assert_eq!(
            store.read().unwrap(),
            Some(StoredSession::new(T0 + 60_000, TimerMode::Breathing))
        );
    }

    #[test]
    fn breathing_phases_follow_elapsed_time() {
        let (store, clock) = (MemoryStore::new(), ManualClock::new(T0));
        let mut e = engine(&store, &clock);
        e.set_mode(TimerMode::Breathing);
        let started = e.start().unwrap();
        assert!(matches!(
            started.last(),
            Some(Event::TimerStarted { phase: Some(BreathPhase::Inhale), .. })
        ));

        let mut changes = Vec::new();
        for _ in 0..7 {
            clock.advance_secs(1);
            for ev in e.tick() {
                if let Event::PhaseChanged { to, elapsed_secs, .. } = ev {
                    changes.push((elapsed_secs, to));
                }
            }
        }
        assert_eq!(
            changes,
            vec![
                (3, BreathPhase::Hold),
                (4, BreathPhase::Exhale),
                (7, BreathPhase::Inhale)
            ]
        );
    }

    #[test]
    fn breathing_completion_reports_complete_phase_then_session() {
        let (store, clock) = (MemoryStore::new(), ManualClock::new(T0));
        let mut e = engine(&store, &clock);
        e.set_mode(TimerMode::Breathing);
        e.start().unwrap();
        clock.advance_secs(60);
        let events = e.tick();
        assert!(matches!(
            events.as_slice(),
            [
                Event::PhaseChanged { to: BreathPhase::Complete, .. },
                Event::SessionCompleted { mode: TimerMode::Breathing, .. }
            ]
        ));
        assert_eq!(e.phase(), Some(BreathPhase::Complete));
    }

    #[test]
    fn breathing_resume_keeps_cycle_position() {
        let (store, clock) = (MemoryStore::new(), ManualClock::new(T0));
        let mut e = engine(&store, &clock);
        e.set_mode(TimerMode::Breathing);
        e.start().unwrap();
        clock.advance_secs(3);
        e.tick();
        e.pause();
        clock.advance_secs(30);
        let started = e.start().unwrap();
        assert!(matches!(
            started.last(),
            Some(Event::TimerStarted { phase: Some(BreathPhase::Hold), duration_secs: 57, .. })
        ));
        clock.advance_secs(1);
        assert!(matches!(
            e.tick().as_slice(),
            [Event::PhaseChanged { to: BreathPhase::Exhale, elapsed_secs: 4, .. }]
        ));
    }

    #[test]
    fn view_state_restores_paused_remainder() {
        let (store, clock) = (MemoryStore::new(), ManualClock::new(T0));
        let mut e = engine(&store, &clock);
        e.start_for(90).unwrap();
        clock.advance_secs(30);
        e.pause();
        let view = e.view_state();
        drop(e);

        let restored =
            TimerEngine::restore(store.clone(), clock.clone(), TimerSettings::default(), Some(view));
        assert_eq!(restored.state(), TimerState::Paused);
        assert_eq!(restored.remaining_secs(), 60);
        assert_eq!(restored.session_secs(), 90);
    }

    #[test]
    fn snapshot_reflects_running_state() {
        let (store, clock) = (MemoryStore::new(), ManualClock::new(T0));
        let mut e = engine(&store, &clock);
        e.start().unwrap();
        match e.snapshot() {
            Event::StateSnapshot {
                running,
                remaining_secs,
                total_secs,
                end_at_ms,
                ..
            } => {
                assert!(running);
                assert_eq!(remaining_secs, 1500);
                assert_eq!(total_secs, 1500);
                assert_eq!(end_at_ms, Some(T0 + 1_500_000));
            }
            other => panic!("Expected StateSnapshot, got {other:?}"),
        }
    }

    #[test]
    fn completion_claimed_by_other_observer_is_silent() {
        let (store, clock) = (MemoryStore::new(), ManualClock::new(T0));
        let mut first = engine(&store, &clock);
        first.start().unwrap();
        let mut second = engine(&store, &clock);
        assert!(second.is_running());
        clock.advance_secs(1500);
        assert_eq!(completions(&first.tick()), 1);
        assert!(second.tick().is_empty());
        assert_eq!(second.state(), TimerState::Completed);
        assert_eq!(second.remaining_secs(), 0);
    }

    /// Memory store whose first `failing_claims` claims error out.
    #[derive(Clone, Default)]
    struct FlakyClaims {
        inner: MemoryStore,
        failing_claims: Arc<AtomicUsize>,
        clear_fails: bool,
    }

    impl SessionStore for FlakyClaims {
        fn write(&self, session: &StoredSession) -> std::result::Result<(), StoreError> {
            self.inner.write(session)
        }
        fn read(&self) -> std::result::Result<Option<StoredSession>, StoreError> {
            self.inner.read()
        }
        fn clear(&self) -> std::result::Result<(), StoreError> {
            if self.clear_fails {
                return Err(StoreError::Unavailable("read-only".into()));
            }
            self.inner.clear()
        }
        fn claim(&self, end_at_ms: u64) -> std::result::Result<bool, StoreError> {
            let failing = self.failing_claims.load(Ordering::SeqCst);
            if failing > 0 {
                self.failing_claims.store(failing - 1, Ordering::SeqCst);
                return Err(StoreError::Unavailable("locked".into()));
            }
            self.inner.claim(end_at_ms)
        }
    }

    #[test]
    fn failed_claim_still_completes_only_once() {
        let store = FlakyClaims {
            failing_claims: Arc::new(AtomicUsize::new(1)),
            ..FlakyClaims::default()
        };
        let clock = ManualClock::new(T0);
        let mut first = TimerEngine::new(store.clone(), clock.clone(), TimerSettings::default());
        first.start_for(60).unwrap();
        clock.advance_secs(61);
        assert_eq!(completions(&first.tick()), 1);
        assert!(store.read().unwrap().is_none());

        let mut second = TimerEngine::new(store.clone(), clock.clone(), TimerSettings::default());
        assert_eq!(completions(&second.tick()), 0);
        assert_eq!(completions(&first.tick()), 0);
    }

    #[test]
    fn reload_does_not_repeat_completion_left_in_store() {
        let store = FlakyClaims {
            failing_claims: Arc::new(AtomicUsize::new(usize::MAX)),
            clear_fails: true,
            ..FlakyClaims::default()
        };
        let clock = ManualClock::new(T0);
        let mut e = TimerEngine::new(store.clone(), clock.clone(), TimerSettings::default());
        e.start_for(60).unwrap();
        clock.advance_secs(60);
        assert_eq!(completions(&e.tick()), 1);
        assert!(store.read().unwrap().is_some());
        let view = e.view_state();
        drop(e);

        let mut reloaded =
            TimerEngine::restore(store.clone(), clock.clone(), TimerSettings::default(), Some(view));
        assert_eq!(reloaded.state(), TimerState::Completed);
        assert!(reloaded.tick().is_empty());
    }

    #[test]
    fn restore_reports_interruption_on_first_tick() {
        let (store, clock) = (MemoryStore::new(), ManualClock::new(T0));
        let mut e = engine(&store, &clock);
        e.start().unwrap();
        clock.advance_secs(30);
        e.tick();
        let view = e.view_state();
        drop(e);
        store.clear().unwrap();

        let mut reloaded =
            TimerEngine::restore(store.clone(), clock.clone(), TimerSettings::default(), Some(view));
        assert_eq!(reloaded.state(), TimerState::Paused);
        assert!(matches!(
            reloaded.tick().as_slice(),
            [Event::TimerInterrupted { remaining_secs: 1470, .. }]
        ));
        assert!(reloaded.tick().is_empty());
    }

    #[test]
    fn snapshot_counts_breathing_cycles() {
        let (store, clock) = (MemoryStore::new(), ManualClock::new(T0));
        let mut e = engine(&store, &clock);
        e.set_mode(TimerMode::Breathing);
        e.start().unwrap();
        clock.advance_secs(15);
        e.tick();
        assert!(matches!(
            e.snapshot(),
            Event::StateSnapshot { cycles_completed: 2, remaining_secs: 45, .. }
        ));
    }
}
