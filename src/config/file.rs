//! TOML configuration file loading
//!
//! Supports `~/.config/avatar-pilot/config.toml` as a persistent config
//! source. All fields are optional, the file is a partial overlay on top of
//! defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub character: CharacterFileConfig,

    #[serde(default)]
    pub audio: AudioFileConfig,

    #[serde(default)]
    pub motion: MotionFileConfig,

    #[serde(default)]
    pub stt: SttFileConfig,

    #[serde(default)]
    pub tts: TtsFileConfig,

    #[serde(default)]
    pub llm: LlmFileConfig,
}

/// Identity and conversational behavior
#[derive(Debug, Default, Deserialize)]
pub struct CharacterFileConfig {
    pub name: Option<String>,
    pub wake_words: Option<Vec<String>>,
    pub stop_words: Option<Vec<String>>,
    pub goodbye_words: Option<Vec<String>>,

    /// Substring of the game window title (e.g. "VRChat")
    pub window_title: Option<String>,

    pub idle_threshold_secs: Option<u64>,

    /// 0 disables the inactivity timeout
    pub conversation_timeout_secs: Option<u64>,

    pub confusion_limit: Option<u32>,
    pub farewell: Option<String>,
    pub apology: Option<String>,
    pub error_apology: Option<String>,
}

/// Audio routing
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Substring of the input device name (e.g. "cable-a")
    pub listen_device: Option<String>,

    /// Substring of the output device name (e.g. "cable-b")
    pub speak_device: Option<String>,

    /// RMS energy above which audio counts as speech
    pub energy_threshold: Option<f32>,
}

/// Key bindings and motion timings
#[derive(Debug, Default, Deserialize)]
pub struct MotionFileConfig {
    pub forward_key: Option<String>,
    pub back_key: Option<String>,
    pub left_key: Option<String>,
    pub right_key: Option<String>,
    pub key_hold_ms: Option<u64>,
    pub turn_distance: Option<u32>,
    pub turn_around_distance: Option<u32>,
    pub turn_duration_ms: Option<u64>,
    pub head_distance: Option<u32>,
    pub head_duration_ms: Option<u64>,
    pub focus_poll_ms: Option<u64>,
    pub tick_ms: Option<u64>,
}

/// Speech-to-text engines
#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    pub local_url: Option<String>,
    pub local_model: Option<String>,
    pub cloud_url: Option<String>,
    pub cloud_model: Option<String>,
    pub language: Option<String>,
    pub api_key: Option<String>,
}

/// Text-to-speech
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    pub url: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub speed: Option<f32>,
    pub api_key: Option<String>,
}

/// Conversation model
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    pub url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub system_message: Option<String>,
    pub forced_system_message: Option<String>,
    pub max_dialogues: Option<usize>,
    pub prune_after_secs: Option<u64>,
    /// 0 disables the limit
    pub max_response_tokens: Option<u32>,
    /// 0 disables the limit
    pub max_prompt_chars: Option<usize>,
    pub api_key: Option<String>,
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the TOML is malformed or has unknown sections
pub fn parse_config_file(content: &str) -> Result<ConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load the TOML config file.
///
/// An explicit `path` must exist and parse. Without one, the standard path
/// is used and a missing or broken file falls back to defaults.
///
/// # Errors
///
/// Returns error if an explicit path cannot be read or parsed
pub fn load_config_file(path: Option<&Path>) -> Result<ConfigFile> {
    if let Some(path) = path {
        let content = std::fs::read_to_string(path)?;
        let config = parse_config_file(&content)?;
        tracing::info!(path = %path.display(), "loaded config file");
        return Ok(config);
    }

    let Some(path) = config_file_path() else {
        return Ok(ConfigFile::default());
    };

    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(ConfigFile::default());
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match parse_config_file(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                Ok(config)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                Ok(ConfigFile::default())
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            Ok(ConfigFile::default())
        }
    }
}

/// Return the config file path: `~/.config/avatar-pilot/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("avatar-pilot").join("config.toml"))
}
