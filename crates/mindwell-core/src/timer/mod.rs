mod clock;
pub mod deadline;
mod engine;
mod mode;
mod phase;
mod probe;

pub use clock::{Clock, ManualClock, SystemClock};
pub use deadline::{deadline_from, format_clock, format_compact, remaining_secs};
pub use engine::{TimerEngine, TimerSettings, TimerState, ViewState};
pub use mode::TimerMode;
pub use phase::{BreathPhase, PhaseScheduler, PhaseTable, PhaseTransition};
pub use probe::Probe;
