//! # Mindwell Core Library
//!
//! Core logic behind the Mindwell focus, break and breathing timers. The CLI
//! binary is a thin layer over the same library.
//!
//! ## Architecture
//!
//! - **Timer Engine**: a deadline-anchored state machine. Remaining time is
//!   recomputed from an absolute end time on every `tick()`, so missed ticks
//!   never cause drift
//! - **Session Store**: the single persisted record of the active session,
//!   shared by independent observers
//! - **Phase Scheduler**: edge-triggered Inhale/Hold/Exhale tracking
//! - **Ambient Notifier**: fire-and-forget tones, speech and vibration
//! - **Storage**: SQLite for the timer record, history and rewards, TOML for
//!   configuration
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`FloatingIndicator`]: Read-only observer of the active session
//! - [`SessionStore`]: Persisted record contract
//! - [`SessionHost`]: Consumer of timer events
//! - [`Database`]: Persistence
//! - [`Config`]: Application configuration management

pub mod error;
pub mod events;
pub mod host;
pub mod indicator;
pub mod notify;
pub mod storage;
pub mod store;
pub mod timer;

pub use error::{ConfigError, CoreError, DatabaseError, NotifyError, StoreError, ValidationError};
pub use events::Event;
pub use host::{LogMessages, NotificationService, RewardService, SessionHistory, SessionHost};
pub use indicator::{FloatingIndicator, IndicatorView};
pub use notify::{AmbientNotifier, Notifier, NullNotifier, Tone};
pub use storage::{Config, Database, Progress, Stats};
pub use store::{MemoryStore, SessionStore, StoredSession};
pub use timer::{
    BreathPhase, Clock, ManualClock, PhaseScheduler, PhaseTable, Probe, SystemClock, TimerEngine,
    TimerMode, TimerSettings, TimerState, ViewState,
};
