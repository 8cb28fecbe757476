//! avatar-pilot - voice-driven character controller for VR chat avatars
//!
//! Listens on a (virtual) microphone, holds spoken conversations through a
//! language model, and moves the avatar by injecting keyboard and mouse
//! input into the focused game window.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  Listener: capture → segment → transcribe (STT)      │
//! └────────────────────────┬─────────────────────────────┘
//!                          │ transcripts
//! ┌────────────────────────▼─────────────────────────────┐
//! │  Controller: wake / stop / goodbye words             │
//! │      └─ ConversationService → Router → SpeechOutput  │
//! └────────────────────────┬─────────────────────────────┘
//!                          │ state changes, actions
//! ┌────────────────────────▼─────────────────────────────┐
//! │  Character ─ CharacterState                          │
//! │      └─ ActionExecutor: focus-gated queue → input    │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod action;
pub mod character;
pub mod config;
pub mod controller;
pub mod conversation;
pub mod error;
pub mod focus;
pub mod input;
pub mod router;
pub mod voice;

pub use action::{Action, ActionExecutor, ExecutorTimings, MotionProfile};
pub use character::{Character, CharacterSettings, CharacterState};
pub use config::Config;
pub use controller::{Controller, ControllerSettings};
pub use conversation::{ChatClient, ConversationService};
pub use error::{Error, Result};
pub use focus::{ActiveWindowOracle, FocusOracle};
pub use input::{EnigoBackend, InputBackend, SharedInput};
pub use router::{Dispatch, ResponseTag};
pub use voice::{SpeechOutput, SttEngine, Transcriber};
