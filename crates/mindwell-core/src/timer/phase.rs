//! Breathing phase scheduler.
//!
//! A breathing session repeats a fixed cycle of Inhale, Hold and Exhale. The
//! phase is a pure function of elapsed time; the scheduler only remembers the
//! last phase it reported so that a transition is announced once per boundary
//! crossing rather than on every probe.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreathPhase {
    Inhale,
    Hold,
    Exhale,
    /// Terminal pseudo-phase once the session duration is reached.
    Complete,
}

impl BreathPhase {
    /// Text spoken when the phase begins.
    pub fn cue(self) -> &'static str {
        match self {
            BreathPhase::Inhale => "Inhale",
            BreathPhase::Hold => "Hold",
            BreathPhase::Exhale => "Exhale",
            BreathPhase::Complete => "Well done",
        }
    }
}

/// Seconds spent in each phase of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTable {
    pub inhale_secs: u64,
    pub hold_secs: u64,
    pub exhale_secs: u64,
}

impl PhaseTable {
    /// 3/1/3, a seven second cycle.
    pub fn triangle() -> Self {
        Self {
            inhale_secs: 3,
            hold_secs: 1,
            exhale_secs: 3,
        }
    }

    /// 4/4/4 box breathing.
    pub fn box_breath() -> Self {
        Self {
            inhale_secs: 4,
            hold_secs: 4,
            exhale_secs: 4,
        }
    }

    pub fn cycle_secs(&self) -> u64 {
        self.inhale_secs + self.hold_secs + self.exhale_secs
    }

    /// Phase for a position within one cycle.
    ///
    /// Positions past the end of the cycle cannot come out of modulo
    /// arithmetic; they map to `Exhale` with a warning instead of failing.
    pub fn phase_at(&self, cycle_secs: u64) -> BreathPhase {
        if cycle_secs < self.inhale_secs {
            BreathPhase::Inhale
        } else if cycle_secs < self.inhale_secs + self.hold_secs {
            BreathPhase::Hold
        } else if cycle_secs < self.cycle_secs() {
            BreathPhase::Exhale
        } else {
            tracing::warn!(
                "breathing position {}s outside {}s cycle, falling back to exhale",
                cycle_secs,
                self.cycle_secs()
            );
            BreathPhase::Exhale
        }
    }

    /// Phase at a point in the session, wrapping every cycle.
    pub fn phase_for_elapsed(&self, elapsed_secs: u64) -> BreathPhase {
        match elapsed_secs.checked_rem(self.cycle_secs()) {
            Some(pos) => self.phase_at(pos),
            None => {
                tracing::warn!("breathing cycle has zero length, falling back to exhale");
                BreathPhase::Exhale
            }
        }
    }

    pub fn cycles_completed(&self, elapsed_secs: u64) -> u64 {
        elapsed_secs.checked_div(self.cycle_secs()).unwrap_or(0)
    }
}

impl Default for PhaseTable {
    fn default() -> Self {
        Self::triangle()
    }
}

/// A detected change of phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: BreathPhase,
    pub to: BreathPhase,
    pub elapsed_secs: u64,
}

/// Edge-triggered phase tracker for one breathing session.
#[derive(Debug, Clone)]
pub struct PhaseScheduler {
    table: PhaseTable,
    total_secs: u64,
    current: BreathPhase,
}

impl PhaseScheduler {
    pub fn new(table: PhaseTable, total_secs: u64) -> Self {
        Self {
            table,
            total_secs,
            current: table.phase_for_elapsed(0),
        }
    }

    /// Resume tracking from a previously reported phase.
    pub fn with_current(mut self, phase: BreathPhase) -> Self {
        self.current = phase;
        self
    }

    pub fn current(&self) -> BreathPhase {
        self.current
    }

    pub fn is_finished(&self) -> bool {
        self.current == BreathPhase::Complete
    }

    /// Report the phase at `elapsed_secs` if it differs from the last one.
    ///
    /// Reaching the session total finishes the scheduler; later calls return
    /// `None`.
    pub fn observe(&mut self, elapsed_secs: u64) -> Option<PhaseTransition> {
        if self.is_finished() {
            return None;
        }
        if elapsed_secs >= self.total_secs {
            return self.finish(elapsed_secs);
        }
        let phase = self.table.phase_for_elapsed(elapsed_secs);
        if phase == self.current {
            return None;
        }
        let transition = PhaseTransition {
            from: self.current,
            to: phase,
            elapsed_secs,
        };
        self.current = phase;
        Some(transition)
    }

    /// Force the terminal `Complete` phase. Only the first call reports it.
    pub fn finish(&mut self, elapsed_secs: u64) -> Option<PhaseTransition> {
        if self.is_finished() {
            return None;
        }
        let transition = PhaseTransition {
            from: self.current,
            to: BreathPhase::Complete,
            elapsed_secs,
        };
        self.current = BreathPhase::Complete;
        Some(transition)
    }

    pub fn reset(&mut self) {
        self.current = self.table.phase_for_elapsed(0);
    }
}
