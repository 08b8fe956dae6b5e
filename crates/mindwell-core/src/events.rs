use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{BreathPhase, TimerMode};

/// Every state change of the timer produces an Event.
/// Hosts dispatch them to side-effect sinks; the CLI prints them as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        mode: TimerMode,
        duration_secs: u64,
        end_at_ms: u64,
        /// Phase in effect at the moment of starting (breathing only).
        phase: Option<BreathPhase>,
        at: DateTime<Utc>,
    },
    TimerPaused {
        mode: TimerMode,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        mode: TimerMode,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// The stored session disappeared while this observer believed it was running.
    TimerInterrupted {
        mode: TimerMode,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    PhaseChanged {
        from: BreathPhase,
        to: BreathPhase,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    SessionCompleted {
        mode: TimerMode,
        duration_secs: u64,
        end_at_ms: u64,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        mode: TimerMode,
        running: bool,
        remaining_secs: u64,
        total_secs: u64,
        end_at_ms: Option<u64>,
        phase: Option<BreathPhase>,
        /// Full breathing cycles finished so far; zero outside breathing.
        cycles_completed: u64,
        at: DateTime<Utc>,
    },
}
