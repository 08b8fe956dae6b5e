//! The view that hosts a timer and reacts to its events.
//!
//! [`SessionHost`] is the consumer of the session-complete signal: it awards
//! experience, shows a transient message, records history and hands every
//! transition to the [`AmbientNotifier`]. None of its collaborators can affect
//! the timer; their failures are logged and dropped.

use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::events::Event;
use crate::notify::AmbientNotifier;
use crate::storage::{Database, Progress, RewardsConfig};
use crate::timer::TimerMode;

/// Grants experience points for completed sessions.
pub trait RewardService {
    fn award_xp(&self, amount: u64) -> Result<Progress, CoreError>;
}

/// Shows a short informational message to the user.
pub trait NotificationService {
    fn show_message(&self, message: &str);
}

/// Keeps a log of completed sessions.
pub trait SessionHistory {
    fn record_session(
        &self,
        mode: TimerMode,
        duration_secs: u64,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), CoreError>;
}

impl RewardService for Database {
    fn award_xp(&self, amount: u64) -> Result<Progress, CoreError> {
        Ok(Database::award_xp(self, amount)?)
    }
}

impl SessionHistory for Database {
    fn record_session(
        &self,
        mode: TimerMode,
        duration_secs: u64,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        Database::record_session(self, mode, duration_secs, started_at, completed_at)?;
        Ok(())
    }
}

/// Messages go to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMessages;

impl NotificationService for LogMessages {
    fn show_message(&self, message: &str) {
        tracing::info!("{}", message);
    }
}

pub struct SessionHost {
    ambient: AmbientNotifier,
    rewards: Box<dyn RewardService + Send>,
    messages: Box<dyn NotificationService + Send>,
    history: Option<Box<dyn SessionHistory + Send>>,
    xp: RewardsConfig,
}

impl SessionHost {
    pub fn new(
        ambient: AmbientNotifier,
        rewards: impl RewardService + Send + 'static,
        messages: impl NotificationService + Send + 'static,
        xp: RewardsConfig,
    ) -> Self {
        Self {
            ambient,
            rewards: Box::new(rewards),
            messages: Box::new(messages),
            history: None,
            xp,
        }
    }

    pub fn with_history(mut self, history: impl SessionHistory + Send + 'static) -> Self {
        self.history = Some(Box::new(history));
        self
    }

    pub fn dispatch_all(&self, events: &[Event]) {
        for event in events {
            self.dispatch(event);
        }
    }

    pub fn dispatch(&self, event: &Event) {
        match event {
            Event::TimerStarted { mode, phase, .. } => self.ambient.session_started(*mode, *phase),
            Event::PhaseChanged { to, .. } => self.ambient.phase_changed(*to),
            Event::SessionCompleted {
                mode,
                duration_secs,
                end_at_ms,
                at,
            } => self.completed(*mode, *duration_secs, *end_at_ms, *at),
            Event::TimerInterrupted { mode, .. } => {
                tracing::debug!("{} session stopped by another view", mode);
            }
            Event::TimerPaused { .. } | Event::TimerReset { .. } | Event::StateSnapshot { .. } => {}
        }
    }

    fn completed(&self, mode: TimerMode, duration_secs: u64, end_at_ms: u64, observed_at: DateTime<Utc>) {
        self.ambient.session_completed(mode);
        self.messages.show_message(completion_message(mode));

        let amount = u64::from(self.xp.xp_for(mode));
        if amount > 0 {
            match self.rewards.award_xp(amount) {
                Ok(progress) => self.messages.show_message(&progress.message()),
                Err(e) => tracing::warn!("reward of {} XP not recorded: {}", amount, e),
            }
        }

        if let Some(history) = &self.history {
            let completed_at = i64::try_from(end_at_ms)
                .ok()
                .and_then(DateTime::from_timestamp_millis)
                .unwrap_or(observed_at);
            let started_at = i64::try_from(duration_secs)
                .ok()
                .and_then(chrono::Duration::try_seconds)
                .and_then(|length| completed_at.checked_sub_signed(length))
                .unwrap_or(completed_at);
            if let Err(e) = history.record_session(mode, duration_secs, started_at, completed_at) {
                tracing::warn!("completed {} session not recorded: {}", mode, e);
            }
        }
    }
}

fn completion_message(mode: TimerMode) -> &'static str {
    match mode {
        TimerMode::Focus => "Focus session complete! Take a break?",
        TimerMode::Break => "Break finished. Ready to focus?",
        TimerMode::Breathing => "Breathing session complete",
    }
}
