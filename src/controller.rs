//! The control loop
//!
//! Once per tick the controller advances the [`Character`] and handles at
//! most one transcript: stop words interrupt a running action, a wake word
//! starts a conversation, goodbye words end it, and anything said during a
//! conversation is sent to the [`ConversationService`] and routed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::MissedTickBehavior;
use tracing::Instrument;

use crate::character::Character;
use crate::conversation::ConversationService;
use crate::router;
use crate::voice::{ListenerState, SpeechOutput, SttEngine, Transcriber};

/// Spoken when a movement command arrives while the window is not focused
pub const DEFAULT_APOLOGY: &str = "Sorry, I can't move right now.";

/// Spoken when the conversation service fails
pub const DEFAULT_ERROR_APOLOGY: &str = "Sorry, I lost my train of thought.";

/// Keywords and phrases the control loop reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    pub wake_words: Vec<String>,
    pub stop_words: Vec<String>,
    pub goodbye_words: Vec<String>,
    pub apology: String,
    pub error_apology: String,
    /// Pause between control-loop iterations
    pub tick: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            wake_words: vec!["ringo".to_string()],
            stop_words: vec!["stop".to_string(), "halt".to_string()],
            goodbye_words: vec!["goodbye".to_string(), "bye bye".to_string()],
            apology: DEFAULT_APOLOGY.to_string(),
            error_apology: DEFAULT_ERROR_APOLOGY.to_string(),
            tick: Duration::from_millis(1),
        }
    }
}

/// Whether `text` contains any of `words`, ignoring case
#[must_use]
pub fn mentions(text: &str, words: &[String]) -> bool {
    let text = text.to_lowercase();
    words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .any(|w| !w.is_empty() && text.contains(&w))
}

/// Drives one character from transcripts
pub struct Controller {
    character: Character,
    conversation: Arc<dyn ConversationService>,
    speech: Arc<dyn SpeechOutput>,
    transcriber: Arc<dyn Transcriber>,
    listener: Arc<ListenerState>,
    transcripts: mpsc::UnboundedReceiver<String>,
    settings: ControllerSettings,
}

impl Controller {
    #[must_use]
    pub fn new(
        character: Character,
        conversation: Arc<dyn ConversationService>,
        speech: Arc<dyn SpeechOutput>,
        transcriber: Arc<dyn Transcriber>,
        listener: Arc<ListenerState>,
        transcripts: mpsc::UnboundedReceiver<String>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            character,
            conversation,
            speech,
            transcriber,
            listener,
            transcripts,
            settings,
        }
    }

    #[must_use]
    pub const fn character(&self) -> &Character {
        &self.character
    }

    #[must_use]
    pub const fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Run until `shutdown` resolves or the transcript channel closes, then
    /// stop the action executor
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval(self.settings.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(character = self.character.name(), "control loop started");

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                _ = ticker.tick() => {}
            }

            if !self.tick().await {
                tracing::warn!("transcript channel closed");
                break;
            }
        }

        self.character.actions().shutdown();
        tracing::info!(character = self.character.name(), "control loop stopped");
    }

    /// One loop iteration. Returns `false` once no more transcripts can
    /// arrive.
    pub async fn tick(&mut self) -> bool {
        if let Err(e) = self.character.update().await {
            tracing::warn!(error = %e, "character update failed");
        }
        // A timed-out conversation leaves the cloud engine selected
        if self.character.state().is_wandering() {
            self.listener.set_engine(SttEngine::Local);
        }

        match self.transcripts.try_recv() {
            Ok(text) => {
                self.handle_transcript(&text).await;
                true
            }
            Err(TryRecvError::Empty) => true,
            Err(TryRecvError::Disconnected) => false,
        }
    }

    /// React to one transcript according to the character's state
    pub async fn handle_transcript(&mut self, text: &str) {
        let state = self.character.state();
        tracing::debug!(state = state.name(), transcript = text, "transcript received");
        let (performing, wandering) = (state.is_performing_action(), state.is_wandering());

        if performing {
            if mentions(text, &self.settings.stop_words) {
                tracing::info!(character = self.character.name(), "stop word heard");
                self.character.actions().signal_stop();
                self.character.resume_previous_state();
            }
        } else if wandering {
            if mentions(text, &self.settings.wake_words) {
                tracing::info!(character = self.character.name(), transcript = text, "wake word heard");
                self.character.start_conversation();
                self.listener.set_engine(SttEngine::Cloud);
                let prompt = self.retranscribe(text).await;
                self.prompt(&prompt).await;
            }
        } else if mentions(text, &self.settings.goodbye_words) {
            tracing::info!(character = self.character.name(), "goodbye heard");
            self.end_conversation().await;
        } else {
            self.prompt(text).await;
        }
    }

    /// Transcribe the wake-word utterance again with the cloud engine.
    /// Falls back to `fallback` on failure.
    async fn retranscribe(&self, fallback: &str) -> String {
        let Some(chunk) = self.listener.last_chunk() else {
            return fallback.to_string();
        };

        match self
            .transcriber
            .transcribe(&chunk, SttEngine::Cloud, &self.settings.wake_words)
            .await
        {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => fallback.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "cloud re-transcription failed, keeping local transcript");
                fallback.to_string()
            }
        }
    }

    async fn prompt(&mut self, text: &str) {
        let Some(conversation_id) = self.character.conversation_id().map(str::to_string) else {
            tracing::warn!(transcript = text, "prompt outside a conversation ignored");
            return;
        };

        let span = tracing::info_span!("prompt", conversation = %conversation_id);
        self.exchange(text, &conversation_id).instrument(span).await;
    }

    /// Send, route, speak, and end the conversation if the reply says so
    async fn exchange(&mut self, text: &str, conversation_id: &str) {
        let response = match self.conversation.send_prompt(text, conversation_id).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "conversation service failed");
                let apology = self.settings.error_apology.clone();
                self.say(&apology).await;
                return;
            }
        };

        let dispatch = router::dispatch(
            &mut self.character,
            &response,
            text,
            &self.settings.apology,
        );
        self.say(&dispatch.reply).await;

        if dispatch.terminate {
            self.end_conversation().await;
        }

        self.drop_queued_transcripts();
    }

    /// Speak with the conversation timers paused
    async fn say(&mut self, text: &str) {
        self.character.begin_speaking();
        if let Err(e) = self.speech.speak(text).await {
            tracing::warn!(error = %e, "failed to speak reply");
        }
        self.character.finish_speaking();
    }

    async fn end_conversation(&mut self) {
        if let Err(e) = self.character.end_conversation().await {
            tracing::warn!(error = %e, "failed to speak farewell");
        }
        self.listener.set_engine(SttEngine::Local);
    }

    /// Transcripts that arrived while a reply was in progress are stale
    fn drop_queued_transcripts(&mut self) {
        let mut dropped = 0usize;
        while self.transcripts.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!(dropped, "queued transcripts dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| (*w).to_string()).collect()
    }

    #[test]
    fn test_mentions() {
        let wake = words(&["ringo", "hey buddy"]);
        assert!(mentions("Ringo how are you", &wake));
        assert!(mentions("well HEY BUDDY", &wake));
        assert!(!mentions("hello there", &wake));
    }

    #[test]
    fn test_blank_keywords_never_match() {
        assert!(!mentions("anything", &words(&["", "  "])));
        assert!(!mentions("anything", &[]));
    }
}
