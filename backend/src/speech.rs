use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{HealthError, Result};
use crate::model::ChatEvent;

/// Text for the browser's speech synthesiser.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechCue {
    pub text: String,
    pub lang: String,
    /// Emergency cue; cancels anything still being spoken.
    pub urgent: bool,
}

impl SpeechCue {
    /// `None` when the user switched voice output off.
    pub fn gated(voice_enabled: bool, text: &str, lang: &str, urgent: bool) -> Option<Self> {
        voice_enabled.then(|| SpeechCue {
            text: text.to_string(),
            lang: lang.to_string(),
            urgent,
        })
    }

    pub fn into_event(self) -> ChatEvent {
        ChatEvent::Speak {
            text: self.text,
            lang: self.lang,
            urgent: self.urgent,
        }
    }
}

/// What the browser reported at the end of a recognition session.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Unsupported,
    Failed(String),
    Ended(Option<String>),
}

impl CaptureOutcome {
    pub fn from_report(supported: bool, transcript: Option<String>, error: Option<String>) -> Self {
        if !supported {
            CaptureOutcome::Unsupported
        } else if let Some(reason) = error {
            CaptureOutcome::Failed(reason)
        } else {
            CaptureOutcome::Ended(transcript)
        }
    }
}

/// Handle for one recognition session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceTicket(pub u64);

/// Tracks the live recognition session. Starting a new one supersedes the
/// previous; results for superseded tickets are dropped.
#[derive(Debug, Default)]
pub struct VoiceInput {
    current: AtomicU64,
}

impl VoiceInput {
    pub fn begin(&self) -> VoiceTicket {
        VoiceTicket(self.current.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// `Ok(Some(text))` when there is a transcript to submit, `Ok(None)`
    /// for stale tickets and silent sessions.
    pub fn resolve(&self, ticket: VoiceTicket, outcome: CaptureOutcome) -> Result<Option<String>> {
        if ticket.0 != self.current.load(Ordering::SeqCst) {
            log::debug!("🎙️ Ignoring result of superseded voice session {}", ticket.0);
            return Ok(None);
        }
        match outcome {
            CaptureOutcome::Unsupported => Err(HealthError::PlatformUnavailable),
            CaptureOutcome::Failed(reason) => Err(HealthError::Recognition(reason)),
            CaptureOutcome::Ended(transcript) => Ok(transcript
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())),
        }
    }
}
