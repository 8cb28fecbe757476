//! Error types for avatar-pilot

use thiserror::Error;

/// Result type alias for avatar-pilot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while piloting a character
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or stream error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Conversation service error
    #[error("conversation error: {0}")]
    Conversation(String),

    /// Input injection error
    #[error("input error: {0}")]
    Input(String),

    /// Unknown action name
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
