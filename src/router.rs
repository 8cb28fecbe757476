//! Response routing
//!
//! The conversation service prefixes every reply with a response tag such as
//! `TYPE_YES` or `TYPE_CMD_TURN`. [`dispatch`] strips the tag and turns it
//! into confusion bookkeeping, gestures and state changes on the
//! [`Character`]. Speaking the reply and ending the conversation are left to
//! the caller.

use std::fmt;

use crate::action::Action;
use crate::character::{Character, CharacterState};

/// Closed vocabulary of reply tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseTag {
    Normal,
    Ending,
    Confused,
    Yes,
    No,
    CmdTurn,
    CmdForward,
    CmdBack,
}

impl ResponseTag {
    /// Longest tags first, `TYPE_NO` is a prefix of `TYPE_NORMAL`
    const BY_LENGTH: [Self; 8] = [
        Self::CmdForward,
        Self::Confused,
        Self::CmdTurn,
        Self::CmdBack,
        Self::Normal,
        Self::Ending,
        Self::Yes,
        Self::No,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "TYPE_NORMAL",
            Self::Ending => "TYPE_ENDING",
            Self::Confused => "TYPE_CONFUSED",
            Self::Yes => "TYPE_YES",
            Self::No => "TYPE_NO",
            Self::CmdTurn => "TYPE_CMD_TURN",
            Self::CmdForward => "TYPE_CMD_FORWARD",
            Self::CmdBack => "TYPE_CMD_BACK",
        }
    }

    /// Split a raw reply into its tag and the text to speak.
    ///
    /// Returns `None` when the reply does not start with a known tag.
    #[must_use]
    pub fn parse(response: &str) -> Option<(Self, &str)> {
        let trimmed = response.trim_start();
        Self::BY_LENGTH.into_iter().find_map(|tag| {
            trimmed.strip_prefix(tag.as_str()).map(|rest| {
                let body = rest.trim_start_matches([':', '-']).trim();
                (tag, body)
            })
        })
    }

    /// Whether the tag asks the character to move
    #[must_use]
    pub const fn is_command(self) -> bool {
        matches!(self, Self::CmdTurn | Self::CmdForward | Self::CmdBack)
    }
}

impl fmt::Display for ResponseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller should do after routing a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub tag: ResponseTag,
    /// Text to speak
    pub reply: String,
    /// End the conversation once the reply has been spoken
    pub terminate: bool,
}

/// Route one tagged reply.
///
/// `transcript` is what the user said, used to pick a turn direction.
/// `apology` replaces the reply when a movement command arrives while the
/// target window is not focused.
pub fn dispatch(
    character: &mut Character,
    response: &str,
    transcript: &str,
    apology: &str,
) -> Dispatch {
    let (tag, mut reply) = match ResponseTag::parse(response) {
        Some((tag, body)) => (tag, body.to_string()),
        None => {
            tracing::warn!(response, "reply has no known response tag, treating as normal");
            (ResponseTag::Normal, response.to_string())
        }
    };

    tracing::debug!(character = character.name(), %tag, "routing reply");

    let mut terminate = false;

    match tag {
        ResponseTag::Normal => character.reset_confusion(),
        ResponseTag::Ending => terminate = true,
        ResponseTag::Confused => {
            if character.record_confusion() {
                tracing::info!(
                    character = character.name(),
                    confused = character.confused_responses(),
                    "too many confused replies"
                );
                terminate = true;
            }
        }
        ResponseTag::Yes => {
            character.reset_confusion();
            character.actions().enqueue(Action::NodHead);
            character.actions().enqueue(Action::NodHead);
        }
        ResponseTag::No => {
            character.reset_confusion();
            character.actions().enqueue(Action::ShakeHead);
        }
        ResponseTag::CmdTurn | ResponseTag::CmdForward | ResponseTag::CmdBack => {
            if character.actions().is_window_focused() {
                let action = command_action(tag, transcript);
                character.actions().enqueue(action);
                character.set_state(CharacterState::performing(action));
            } else {
                tracing::info!(
                    character = character.name(),
                    %tag,
                    window = character.actions().window_title(),
                    "window not focused, command skipped"
                );
                reply = apology.to_string();
            }
        }
    }

    Dispatch {
        tag,
        reply,
        terminate,
    }
}

/// Continuous action for a movement command
fn command_action(tag: ResponseTag, transcript: &str) -> Action {
    match tag {
        ResponseTag::CmdForward => Action::MoveForwardUntilStopped,
        ResponseTag::CmdBack => Action::MoveBackUntilStopped,
        _ => {
            let transcript = transcript.to_lowercase();
            if transcript.contains("left") || transcript.contains("counter") {
                Action::TurnLeftUntilStopped
            } else {
                Action::TurnRightUntilStopped
            }
        }
    }
}
