use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use crate::error::Result;
use crate::model::{ChatEvent, Speaker};
use crate::speech::{CaptureOutcome, SpeechCue, VoiceInput, VoiceTicket};
use crate::store::Repository;
use crate::triage::{TriageEngine, TriageReply};

pub const TYPING_PLACEHOLDER: &str = "...";

pub const QUICK_SYMPTOMS: [&str; 6] = ["fever", "cough", "chest pain", "dizzy", "breathless", "vomit"];

#[derive(Debug, Clone, PartialEq)]
pub struct Bubble {
    pub id: u64,
    pub who: Speaker,
    pub html: String,
}

/// The chat window contents. Bubbles are addressed by id so a removal can
/// never hit a different bubble that happens to look the same.
#[derive(Debug, Default)]
pub struct Transcript {
    bubbles: Vec<Bubble>,
    next_id: u64,
}

impl Transcript {
    pub fn push(&mut self, who: Speaker, html: &str) -> Bubble {
        self.next_id += 1;
        let bubble = Bubble {
            id: self.next_id,
            who,
            html: html.to_string(),
        };
        self.bubbles.push(bubble.clone());
        bubble
    }

    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.bubbles.len();
        self.bubbles.retain(|b| b.id != id);
        self.bubbles.len() != before
    }

    #[cfg(test)]
    pub fn bubbles(&self) -> &[Bubble] {
        &self.bubbles
    }
}

/// One chat window: transcript, triage and voice input. Cheap to clone;
/// clones share the same transcript.
#[derive(Clone)]
pub struct ChatSession {
    repo: Repository,
    engine: Arc<TriageEngine>,
    transcript: Arc<Mutex<Transcript>>,
    voice: Arc<VoiceInput>,
    typing_delay: Duration,
    speech_lang: String,
}

impl ChatSession {
    pub fn new(repo: Repository, engine: Arc<TriageEngine>, typing_delay: Duration, speech_lang: &str) -> Self {
        Self {
            repo,
            engine,
            transcript: Arc::new(Mutex::new(Transcript::default())),
            voice: Arc::new(VoiceInput::default()),
            typing_delay,
            speech_lang: speech_lang.to_string(),
        }
    }

    /// Echo, typing placeholder, delay, placeholder removal, reply, speech.
    /// Blank messages are ignored.
    pub async fn submit(&self, text: &str, events: &UnboundedSender<ChatEvent>) -> Result<Option<TriageReply>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        self.emit_bubble(Speaker::User, text, events);
        let placeholder = self.emit_bubble(Speaker::Bot, TYPING_PLACEHOLDER, events);

        tokio::time::sleep(self.typing_delay).await;

        if self.with_transcript(|t| t.remove(placeholder)) {
            let _ = events.send(ChatEvent::Remove { id: placeholder });
        }

        let conditions = self
            .repo
            .current_user()
            .await?
            .and_then(|u| u.conditions)
            .unwrap_or_default();
        let reply = self.engine.respond(text, &conditions);
        self.emit_bubble(Speaker::Bot, &reply.html, events);

        let prefs = self.repo.preferences().await?;
        if let Some(cue) = SpeechCue::gated(prefs.voice_enabled, &reply.speech, &self.speech_lang, reply.urgent) {
            let _ = events.send(cue.into_event());
        }
        Ok(Some(reply))
    }

    pub fn start_listening(&self, events: &UnboundedSender<ChatEvent>) -> VoiceTicket {
        let ticket = self.voice.begin();
        let _ = events.send(ChatEvent::Listening { session: ticket.0 });
        ticket
    }

    /// A captured transcript is submitted as if typed; failures become a
    /// visible notice.
    pub async fn finish_listening(
        &self,
        ticket: VoiceTicket,
        outcome: CaptureOutcome,
        events: &UnboundedSender<ChatEvent>,
    ) -> Result<Option<TriageReply>> {
        match self.voice.resolve(ticket, outcome) {
            Ok(Some(transcript)) => self.submit(&transcript, events).await,
            Ok(None) => Ok(None),
            Err(e) => {
                let _ = events.send(ChatEvent::Notice { message: e.to_string() });
                Ok(None)
            }
        }
    }

    #[cfg(test)]
    pub fn bubbles(&self) -> Vec<Bubble> {
        self.with_transcript(|t| t.bubbles().to_vec())
    }

    fn emit_bubble(&self, who: Speaker, html: &str, events: &UnboundedSender<ChatEvent>) -> u64 {
        let bubble = self.with_transcript(|t| t.push(who, html));
        let id = bubble.id;
        let _ = events.send(ChatEvent::Bubble {
            id,
            who: bubble.who,
            html: bubble.html,
        });
        id
    }

    fn with_transcript<T>(&self, f: impl FnOnce(&mut Transcript) -> T) -> T {
        let mut guard = self.transcript.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    #[cfg(test)]
    fn plant_bubble(&self, who: Speaker, html: &str) -> u64 {
        self.with_transcript(|t| t.push(who, html).id)
    }
}
