//! Terminal stand-ins for the device side effects.

use std::io::{self, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::JoinHandle;

use mindwell_core::error::NotifyError;
use mindwell_core::{NotificationService, Notifier, Tone};

/// Speech synthesizer looked up on PATH.
const SPEECH_COMMAND: &str = if cfg!(target_os = "macos") {
    "say"
} else {
    "espeak"
};

/// Rings the terminal bell and speaks through the system synthesizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn play_tone(&self, tone: Tone) -> Result<(), NotifyError> {
        tracing::debug!("tone {:?} {:?} Hz", tone, tone.frequencies_hz());
        let mut stderr = std::io::stderr();
        stderr
            .write_all(b"\x07")
            .and_then(|_| stderr.flush())
            .map_err(|e| NotifyError::Failed {
                kind: "tone",
                message: e.to_string(),
            })
    }

    fn speak(&self, text: &str) -> Result<(), NotifyError> {
        let mut command = Command::new(SPEECH_COMMAND);
        command.arg(text);
        spawn_reaped(&mut command).map(drop).map_err(|e| NotifyError::Failed {
            kind: "speech",
            message: format!("{SPEECH_COMMAND}: {e}"),
        })
    }

    fn vibrate(&self, _pattern_ms: &[u64]) -> Result<(), NotifyError> {
        Err(NotifyError::Unsupported("vibration"))
    }
}

/// Spawn `command` with null stdio and reap it on a helper thread.
fn spawn_reaped(command: &mut Command) -> io::Result<JoinHandle<Option<ExitStatus>>> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(std::thread::spawn(move || match child.wait() {
        Ok(status) => Some(status),
        Err(e) => {
            tracing::debug!("speech process not reaped: {}", e);
            None
        }
    }))
}

/// Transient messages printed to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrMessages;

impl NotificationService for StderrMessages {
    fn show_message(&self, message: &str) {
        eprintln!("{message}");
    }
}
