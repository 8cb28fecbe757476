//! The virtual character
//!
//! A [`Character`] ties together its behavioral [`CharacterState`], the
//! conversation it is currently part of, and the [`ActionExecutor`] that
//! moves its avatar.

mod state;

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

pub use state::{
    CharacterState, Conversing, DEFAULT_IDLE_THRESHOLD, PerformingAction, Wandering,
};

use crate::Result;
use crate::action::{Action, ActionExecutor};
use crate::voice::SpeechOutput;

/// Farewell spoken when a conversation ends
pub const DEFAULT_FAREWELL: &str = "Ended conversation";

/// Consecutive confused responses tolerated before giving up
pub const DEFAULT_CONFUSION_LIMIT: u32 = 3;

/// Tunable character behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterSettings {
    /// Pause between autonomous gestures while wandering
    pub idle_threshold: Duration,
    /// End a conversation after this long without a reply
    pub conversation_timeout: Option<Duration>,
    /// Conversation ends once confused responses exceed this
    pub confusion_limit: u32,
    pub farewell: String,
}

impl Default for CharacterSettings {
    fn default() -> Self {
        Self {
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
            conversation_timeout: Some(Duration::from_secs(60)),
            confusion_limit: DEFAULT_CONFUSION_LIMIT,
            farewell: DEFAULT_FAREWELL.to_string(),
        }
    }
}

/// A voice-controlled character bound to one game window
pub struct Character {
    name: String,
    state: CharacterState,
    previous_state: Option<CharacterState>,
    conversation_id: Option<String>,
    confused_responses: u32,
    actions: ActionExecutor,
    speech: Arc<dyn SpeechOutput>,
    settings: CharacterSettings,
}

impl Character {
    /// Create a wandering character and start its action executor.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        actions: ActionExecutor,
        speech: Arc<dyn SpeechOutput>,
        settings: CharacterSettings,
    ) -> Self {
        let name = name.into();
        actions.start();

        tracing::info!(
            character = %name,
            window = actions.window_title(),
            "character initialized"
        );

        Self {
            name,
            state: CharacterState::wandering(settings.idle_threshold),
            previous_state: None,
            conversation_id: None,
            confused_responses: 0,
            actions,
            speech,
            settings,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn state(&self) -> &CharacterState {
        &self.state
    }

    /// The state replaced by the most recent transition
    #[must_use]
    pub const fn previous_state(&self) -> Option<&CharacterState> {
        self.previous_state.as_ref()
    }

    /// Correlation id of the ongoing conversation
    #[must_use]
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    #[must_use]
    pub const fn confused_responses(&self) -> u32 {
        self.confused_responses
    }

    #[must_use]
    pub const fn actions(&self) -> &ActionExecutor {
        &self.actions
    }

    #[must_use]
    pub const fn settings(&self) -> &CharacterSettings {
        &self.settings
    }

    /// Replace the current state, remembering the old one
    pub fn set_state(&mut self, state: CharacterState) {
        tracing::info!(
            character = %self.name,
            from = self.state.name(),
            to = state.name(),
            "state transition"
        );
        let previous = std::mem::replace(&mut self.state, state);
        self.previous_state = Some(previous);
    }

    /// Go back to the state that was interrupted, with fresh timers.
    ///
    /// Falls back to wandering if there is no previous state.
    pub fn resume_previous_state(&mut self) {
        let mut state = self
            .previous_state
            .clone()
            .unwrap_or_else(|| CharacterState::wandering(self.settings.idle_threshold));
        state.touch();
        self.set_state(state);
    }

    /// Begin a new conversation and acknowledge it with a nod
    pub fn start_conversation(&mut self) -> &str {
        let id = Uuid::new_v4().to_string();
        tracing::info!(character = %self.name, conversation = %id, "new conversation");

        self.set_state(CharacterState::conversing(self.settings.conversation_timeout));
        self.actions.enqueue(Action::NodHead);
        self.conversation_id.insert(id)
    }

    /// End the conversation, say goodbye, and go back to wandering.
    ///
    /// The transition happens even if the farewell cannot be spoken.
    ///
    /// # Errors
    ///
    /// Returns error if the farewell fails to play
    pub async fn end_conversation(&mut self) -> Result<()> {
        tracing::info!(
            character = %self.name,
            conversation = ?self.conversation_id,
            confused = self.confused_responses,
            "ending conversation"
        );

        self.conversation_id = None;
        self.confused_responses = 0;

        let spoken = self.speech.speak(&self.settings.farewell).await;
        self.set_state(CharacterState::wandering(self.settings.idle_threshold));
        spoken
    }

    /// A normal, affirmative or negative response breaks a confusion streak
    pub fn reset_confusion(&mut self) {
        self.confused_responses = 0;
    }

    /// Count a confused response. Returns `true` once the streak exceeds the
    /// confusion limit.
    pub fn record_confusion(&mut self) -> bool {
        self.confused_responses += 1;
        tracing::debug!(
            character = %self.name,
            confused = self.confused_responses,
            limit = self.settings.confusion_limit,
            "confused response"
        );
        self.confused_responses > self.settings.confusion_limit
    }

    /// Mark that a reply has started playing
    pub fn begin_speaking(&mut self) {
        if let CharacterState::Conversing(conversing) = &mut self.state {
            conversing.is_speaking = true;
        }
    }

    /// Mark that a reply finished playing, restarting the inactivity timer
    pub fn finish_speaking(&mut self) {
        if let CharacterState::Conversing(conversing) = &mut self.state {
            conversing.is_speaking = false;
            conversing.last_speech_at = std::time::Instant::now();
        }
    }

    /// Advance the character by one control-loop tick.
    ///
    /// # Errors
    ///
    /// Returns error if ending a timed-out conversation fails to speak
    pub async fn update(&mut self) -> Result<()> {
        self.state.execute();

        match &mut self.state {
            CharacterState::Wandering(wandering) => {
                if wandering.is_idle_elapsed()
                    && self.actions.is_window_focused()
                    && self.actions.is_idle()
                {
                    let action = Action::random_wander();
                    tracing::debug!(character = %self.name, %action, "wandering");
                    self.actions.enqueue(action);
                    wandering.latest_action_at = std::time::Instant::now();
                }
            }
            CharacterState::Conversing(conversing) => {
                if conversing.is_timed_out() {
                    tracing::info!(character = %self.name, "conversation timed out");
                    self.end_conversation().await?;
                }
            }
            CharacterState::PerformingAction(performing) => {
                if self.actions.is_idle() {
                    tracing::debug!(
                        character = %self.name,
                        action = %performing.action,
                        "action finished"
                    );
                    self.resume_previous_state();
                }
            }
        }

        Ok(())
    }
}
