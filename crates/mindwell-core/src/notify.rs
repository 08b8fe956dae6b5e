//! Ambient side effects: tones, spoken cues and vibration.
//!
//! The timer never waits on or inspects these. [`AmbientNotifier`] is invoked
//! only on detected transitions and drops every failure after logging it.

use crate::error::NotifyError;
use crate::storage::NotificationsConfig;
use crate::timer::{BreathPhase, TimerMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Upward sweep at the start of an inhale.
    RisingBreath,
    /// Downward sweep at the start of an exhale.
    FallingBreath,
    /// Short three-note chime.
    Chime,
    /// Four-note arpeggio on completion.
    Success,
}

impl Tone {
    /// Notes of the tone in Hz, in playing order.
    pub fn frequencies_hz(self) -> &'static [u32] {
        match self {
            Tone::RisingBreath => &[220, 330],
            Tone::FallingBreath => &[330, 220],
            Tone::Chime => &[523, 659, 784],
            Tone::Success => &[440, 554, 659, 880],
        }
    }
}

/// A device that can make noise, talk or buzz.
pub trait Notifier {
    fn play_tone(&self, tone: Tone) -> Result<(), NotifyError>;
    fn speak(&self, text: &str) -> Result<(), NotifyError>;
    /// Alternating on/off durations in milliseconds.
    fn vibrate(&self, pattern_ms: &[u64]) -> Result<(), NotifyError>;
}

/// Does nothing, successfully.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn play_tone(&self, _tone: Tone) -> Result<(), NotifyError> {
        Ok(())
    }
    fn speak(&self, _text: &str) -> Result<(), NotifyError> {
        Ok(())
    }
    fn vibrate(&self, _pattern_ms: &[u64]) -> Result<(), NotifyError> {
        Ok(())
    }
}

const PHASE_BUZZ_MS: &[u64] = &[120];
const COMPLETE_BUZZ_MS: &[u64] = &[200, 100, 200];

/// Fire-and-forget adapter between timer transitions and a [`Notifier`].
pub struct AmbientNotifier {
    sink: Box<dyn Notifier + Send>,
    prefs: NotificationsConfig,
}

impl AmbientNotifier {
    pub fn new(sink: impl Notifier + Send + 'static, prefs: NotificationsConfig) -> Self {
        Self {
            sink: Box::new(sink),
            prefs,
        }
    }

    pub fn silent() -> Self {
        Self::new(NullNotifier, NotificationsConfig::default())
    }

    pub fn session_started(&self, mode: TimerMode, phase: Option<BreathPhase>) {
        match (mode, phase) {
            (TimerMode::Breathing, Some(phase)) => self.phase_changed(phase),
            _ => self.tone(Tone::Chime),
        }
    }

    pub fn phase_changed(&self, phase: BreathPhase) {
        match phase {
            BreathPhase::Inhale => self.tone(Tone::RisingBreath),
            BreathPhase::Exhale => self.tone(Tone::FallingBreath),
            // Completion has its own cue.
            BreathPhase::Complete => return,
            BreathPhase::Hold => {}
        }
        self.say(phase.cue());
        self.buzz(PHASE_BUZZ_MS);
    }

    pub fn session_completed(&self, mode: TimerMode) {
        self.tone(Tone::Success);
        let line = match mode {
            TimerMode::Focus => "Focus session complete",
            TimerMode::Break => "Break is over",
            TimerMode::Breathing => BreathPhase::Complete.cue(),
        };
        self.say(line);
        self.buzz(COMPLETE_BUZZ_MS);
    }

    fn tone(&self, tone: Tone) {
        if !(self.prefs.enabled && self.prefs.sound) {
            return;
        }
        if let Err(e) = self.sink.play_tone(tone) {
            tracing::debug!("tone {:?} dropped: {}", tone, e);
        }
    }

    fn say(&self, text: &str) {
        if !(self.prefs.enabled && self.prefs.voice) {
            return;
        }
        if let Err(e) = self.sink.speak(text) {
            tracing::debug!("speech '{}' dropped: {}", text, e);
        }
    }

    fn buzz(&self, pattern_ms: &[u64]) {
        if !(self.prefs.enabled && self.prefs.vibration) {
            return;
        }
        if let Err(e) = self.sink.vibrate(pattern_ms) {
            tracing::debug!("vibration dropped: {}", e);
        }
    }
}
