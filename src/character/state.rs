//! Behavioral states of a character

use std::fmt;
use std::time::{Duration, Instant};

use crate::action::Action;

/// Default pause between autonomous wander gestures
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(10);

/// Idle behavior: occasional autonomous gestures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wandering {
    /// When the last autonomous gesture was enqueued
    pub latest_action_at: Instant,
    /// Minimum pause between autonomous gestures
    pub idle_threshold: Duration,
}

impl Wandering {
    #[must_use]
    pub fn new(idle_threshold: Duration) -> Self {
        Self {
            latest_action_at: Instant::now(),
            idle_threshold,
        }
    }

    /// The idle threshold has passed since the last gesture
    #[must_use]
    pub fn is_idle_elapsed(&self) -> bool {
        self.latest_action_at.elapsed() >= self.idle_threshold
    }
}

/// Engaged in a conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversing {
    /// When the character last finished speaking (or the conversation began)
    pub last_speech_at: Instant,
    /// A reply is currently being spoken
    pub is_speaking: bool,
    /// Conversation ends after this long without a reply
    pub inactivity_timeout: Option<Duration>,
}

impl Conversing {
    #[must_use]
    pub fn new(inactivity_timeout: Option<Duration>) -> Self {
        Self {
            last_speech_at: Instant::now(),
            is_speaking: false,
            inactivity_timeout,
        }
    }

    /// Not speaking, and the inactivity timeout has passed since the last reply
    #[must_use]
    pub fn is_timed_out(&self) -> bool {
        !self.is_speaking
            && self
                .inactivity_timeout
                .is_some_and(|timeout| self.last_speech_at.elapsed() >= timeout)
    }
}

/// A continuous action is in flight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformingAction {
    pub action: Action,
    pub started_at: Instant,
}

impl PerformingAction {
    #[must_use]
    pub fn new(action: Action) -> Self {
        Self {
            action,
            started_at: Instant::now(),
        }
    }
}

/// Exactly one of the three behaviors a character can be in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CharacterState {
    Wandering(Wandering),
    Conversing(Conversing),
    PerformingAction(PerformingAction),
}

impl CharacterState {
    #[must_use]
    pub fn wandering(idle_threshold: Duration) -> Self {
        Self::Wandering(Wandering::new(idle_threshold))
    }

    #[must_use]
    pub fn conversing(inactivity_timeout: Option<Duration>) -> Self {
        Self::Conversing(Conversing::new(inactivity_timeout))
    }

    #[must_use]
    pub fn performing(action: Action) -> Self {
        Self::PerformingAction(PerformingAction::new(action))
    }

    #[must_use]
    pub const fn is_wandering(&self) -> bool {
        matches!(self, Self::Wandering(_))
    }

    #[must_use]
    pub const fn is_conversing(&self) -> bool {
        matches!(self, Self::Conversing(_))
    }

    #[must_use]
    pub const fn is_performing_action(&self) -> bool {
        matches!(self, Self::PerformingAction(_))
    }

    /// State name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Wandering(_) => "wandering",
            Self::Conversing(_) => "conversing",
            Self::PerformingAction(_) => "performing_action",
        }
    }

    /// Per-tick hook. Behavior lives in [`super::Character::update`] for now.
    pub fn execute(&self) {
        tracing::trace!(state = self.name(), "state tick");
    }

    /// Restart the state's timers as if it had just been entered
    pub fn touch(&mut self) {
        let now = Instant::now();
        match self {
            Self::Wandering(w) => w.latest_action_at = now,
            Self::Conversing(c) => {
                c.last_speech_at = now;
                c.is_speaking = false;
            }
            Self::PerformingAction(p) => p.started_at = now,
        }
    }
}

impl fmt::Display for CharacterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
