//! Configuration management for avatar-pilot
//!
//! Values resolve env > TOML file > default. Only secrets and device names
//! are read from the environment.

pub mod file;

use std::path::Path;
use std::time::Duration;

use crate::action::{ExecutorTimings, MotionProfile};
use crate::character::{CharacterSettings, DEFAULT_CONFUSION_LIMIT, DEFAULT_FAREWELL};
use crate::controller::{ControllerSettings, DEFAULT_APOLOGY, DEFAULT_ERROR_APOLOGY};
use crate::conversation::ChatSettings;
use crate::voice::WhisperEndpoint;
use crate::{Error, Result};

use file::ConfigFile;

const OPENAI_URL: &str = "https://api.openai.com/v1";

/// Fully resolved configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub character: CharacterConfig,
    pub audio: AudioConfig,
    pub motion: MotionProfile,
    pub timings: ExecutorTimings,
    pub stt: SttConfig,
    pub tts: TtsConfig,
    pub llm: LlmConfig,
}

/// Identity and conversational behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterConfig {
    pub name: String,
    pub wake_words: Vec<String>,
    pub stop_words: Vec<String>,
    pub goodbye_words: Vec<String>,
    pub window_title: String,
    pub idle_threshold: Duration,
    pub conversation_timeout: Option<Duration>,
    pub confusion_limit: u32,
    pub farewell: String,
    pub apology: String,
    pub error_apology: String,
}

/// Audio routing
#[derive(Debug, Clone, PartialEq)]
pub struct AudioConfig {
    pub listen_device: Option<String>,
    pub speak_device: Option<String>,
    pub energy_threshold: f32,
}

/// Speech-to-text engines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SttConfig {
    pub local: WhisperEndpoint,
    pub cloud: WhisperEndpoint,
}

/// Text-to-speech
#[derive(Debug, Clone, PartialEq)]
pub struct TtsConfig {
    pub url: String,
    pub model: String,
    pub voice: String,
    pub speed: f32,
    pub api_key: Option<String>,
}

/// Conversation model
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub url: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub system_message: Option<String>,
    pub forced_system_message: Option<String>,
    pub max_dialogues: usize,
    pub prune_after: Duration,
    pub max_response_tokens: Option<u32>,
    pub max_prompt_chars: Option<usize>,
    pub api_key: Option<String>,
}

impl Config {
    /// Load the config file (explicit path or the standard location) and
    /// resolve it against the process environment
    ///
    /// # Errors
    ///
    /// Returns error if an explicit file cannot be loaded or a value is invalid
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let fc = file::load_config_file(path)?;
        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Overlay a parsed config file on the defaults, consulting `env` for
    /// secrets and device names
    ///
    /// # Errors
    ///
    /// Returns error if a key binding is not a single character
    pub fn resolve(fc: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let openai_key = env("OPENAI_API_KEY").filter(|k| !k.is_empty());

        let name = fc.character.name.unwrap_or_else(|| "Ringo".to_string());
        let character = CharacterConfig {
            wake_words: fc
                .character
                .wake_words
                .unwrap_or_else(|| vec![name.to_lowercase()]),
            stop_words: fc
                .character
                .stop_words
                .unwrap_or_else(|| words(&["stop", "halt"])),
            goodbye_words: fc
                .character
                .goodbye_words
                .unwrap_or_else(|| words(&["goodbye", "bye bye"])),
            window_title: fc
                .character
                .window_title
                .unwrap_or_else(|| "VRChat".to_string()),
            idle_threshold: Duration::from_secs(fc.character.idle_threshold_secs.unwrap_or(10)),
            conversation_timeout: match fc.character.conversation_timeout_secs.unwrap_or(60) {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            confusion_limit: fc
                .character
                .confusion_limit
                .unwrap_or(DEFAULT_CONFUSION_LIMIT),
            farewell: fc
                .character
                .farewell
                .unwrap_or_else(|| DEFAULT_FAREWELL.to_string()),
            apology: fc
                .character
                .apology
                .unwrap_or_else(|| DEFAULT_APOLOGY.to_string()),
            error_apology: fc
                .character
                .error_apology
                .unwrap_or_else(|| DEFAULT_ERROR_APOLOGY.to_string()),
            name,
        };

        let audio = AudioConfig {
            listen_device: env("AVATAR_PILOT_LISTEN_DEVICE").or(fc.audio.listen_device),
            speak_device: env("AVATAR_PILOT_SPEAK_DEVICE").or(fc.audio.speak_device),
            energy_threshold: fc
                .audio
                .energy_threshold
                .unwrap_or(crate::voice::DEFAULT_ENERGY_THRESHOLD),
        };

        let defaults = MotionProfile::default();
        let m = fc.motion;
        let motion = MotionProfile {
            forward_key: key_binding("forward_key", m.forward_key, defaults.forward_key)?,
            back_key: key_binding("back_key", m.back_key, defaults.back_key)?,
            left_key: key_binding("left_key", m.left_key, defaults.left_key)?,
            right_key: key_binding("right_key", m.right_key, defaults.right_key)?,
            key_hold: m.key_hold_ms.map_or(defaults.key_hold, Duration::from_millis),
            turn_distance: m.turn_distance.unwrap_or(defaults.turn_distance),
            turn_around_distance: m
                .turn_around_distance
                .unwrap_or(defaults.turn_around_distance),
            turn_duration: m
                .turn_duration_ms
                .map_or(defaults.turn_duration, Duration::from_millis),
            head_distance: m.head_distance.unwrap_or(defaults.head_distance),
            head_duration: m
                .head_duration_ms
                .map_or(defaults.head_duration, Duration::from_millis),
        };

        let default_timings = ExecutorTimings::default();
        let timings = ExecutorTimings {
            focus_poll: m
                .focus_poll_ms
                .map_or(default_timings.focus_poll, Duration::from_millis),
            tick: m.tick_ms.map_or(default_timings.tick, Duration::from_millis),
        };

        let stt_key = fc.stt.api_key.or_else(|| openai_key.clone());
        let stt = SttConfig {
            local: WhisperEndpoint {
                base_url: fc
                    .stt
                    .local_url
                    .unwrap_or_else(|| "http://127.0.0.1:8000/v1".to_string()),
                model: fc
                    .stt
                    .local_model
                    .unwrap_or_else(|| "Systran/faster-whisper-base.en".to_string()),
                api_key: None,
                language: fc.stt.language.clone(),
            },
            cloud: WhisperEndpoint {
                base_url: fc.stt.cloud_url.unwrap_or_else(|| OPENAI_URL.to_string()),
                model: fc
                    .stt
                    .cloud_model
                    .unwrap_or_else(|| "whisper-1".to_string()),
                api_key: stt_key,
                language: fc.stt.language,
            },
        };

        let tts = TtsConfig {
            url: fc.tts.url.unwrap_or_else(|| OPENAI_URL.to_string()),
            model: fc.tts.model.unwrap_or_else(|| "tts-1".to_string()),
            voice: fc.tts.voice.unwrap_or_else(|| "alloy".to_string()),
            speed: fc.tts.speed.unwrap_or(1.0),
            api_key: fc.tts.api_key.or_else(|| openai_key.clone()),
        };

        let system_message = match (&fc.llm.system_message, &fc.llm.forced_system_message) {
            (None, None) => Some(default_system_message(&character.name)),
            (system, _) => system.clone(),
        };
        let llm = LlmConfig {
            url: fc.llm.url.unwrap_or_else(|| OPENAI_URL.to_string()),
            model: fc.llm.model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
            temperature: fc.llm.temperature,
            system_message,
            forced_system_message: fc.llm.forced_system_message,
            max_dialogues: fc.llm.max_dialogues.unwrap_or(10),
            prune_after: Duration::from_secs(fc.llm.prune_after_secs.unwrap_or(600)),
            max_response_tokens: Some(fc.llm.max_response_tokens.unwrap_or(256))
                .filter(|&tokens| tokens > 0),
            max_prompt_chars: Some(fc.llm.max_prompt_chars.unwrap_or(2000))
                .filter(|&chars| chars > 0),
            api_key: fc.llm.api_key.or(openai_key),
        };

        Ok(Self {
            character,
            audio,
            motion,
            timings,
            stt,
            tts,
            llm,
        })
    }

    /// Check values that cannot be fixed by falling back to a default
    ///
    /// # Errors
    ///
    /// Returns error describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        if self.character.window_title.trim().is_empty() {
            return Err(Error::Config("character.window_title must not be empty".to_string()));
        }
        if self
            .character
            .wake_words
            .iter()
            .all(|w| w.trim().is_empty())
        {
            return Err(Error::Config("at least one wake word is required".to_string()));
        }
        if self.llm.system_message.is_some() && self.llm.forced_system_message.is_some() {
            return Err(Error::Config(
                "llm.system_message and llm.forced_system_message are mutually exclusive"
                    .to_string(),
            ));
        }
        if self.llm.max_dialogues == 0 {
            return Err(Error::Config("llm.max_dialogues must be at least 1".to_string()));
        }
        if !(0.25..=4.0).contains(&self.tts.speed) {
            return Err(Error::Config("tts.speed must be between 0.25 and 4.0".to_string()));
        }
        if self.timings.focus_poll.is_zero() {
            return Err(Error::Config("motion.focus_poll_ms must be positive".to_string()));
        }
        Ok(())
    }

    #[must_use]
    pub fn character_settings(&self) -> CharacterSettings {
        CharacterSettings {
            idle_threshold: self.character.idle_threshold,
            conversation_timeout: self.character.conversation_timeout,
            confusion_limit: self.character.confusion_limit,
            farewell: self.character.farewell.clone(),
        }
    }

    #[must_use]
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            wake_words: self.character.wake_words.clone(),
            stop_words: self.character.stop_words.clone(),
            goodbye_words: self.character.goodbye_words.clone(),
            apology: self.character.apology.clone(),
            error_apology: self.character.error_apology.clone(),
            ..ControllerSettings::default()
        }
    }

    #[must_use]
    pub fn chat_settings(&self) -> ChatSettings {
        ChatSettings {
            base_url: self.llm.url.clone(),
            api_key: self.llm.api_key.clone().unwrap_or_default(),
            model: self.llm.model.clone(),
            temperature: self.llm.temperature,
            system_message: self.llm.system_message.clone(),
            forced_system_message: self.llm.forced_system_message.clone(),
            max_dialogues: self.llm.max_dialogues,
            prune_after: self.llm.prune_after,
            max_response_tokens: self.llm.max_response_tokens,
            max_prompt_chars: self.llm.max_prompt_chars,
        }
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| (*w).to_string()).collect()
}

/// A key binding must be exactly one character
fn key_binding(field: &str, value: Option<String>, default: char) -> Result<char> {
    let Some(value) = value else {
        return Ok(default);
    };

    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(key), None) => Ok(key.to_ascii_lowercase()),
        _ => Err(Error::Config(format!(
            "motion.{field} must be a single character, got '{value}'"
        ))),
    }
}

/// Instructions that make the model prefix every reply with a response tag
fn default_system_message(name: &str) -> String {
    format!(
        "You are {name}, a friendly character in a VR chat world, talking out loud with \
         the people around you. Keep replies short and conversational. Begin every reply \
         with exactly one tag: TYPE_NORMAL for ordinary replies, TYPE_YES or TYPE_NO when \
         answering a yes/no question, TYPE_CONFUSED when you did not understand, \
         TYPE_ENDING when the conversation is over, TYPE_CMD_TURN when asked to turn, \
         TYPE_CMD_FORWARD when asked to walk forward and TYPE_CMD_BACK when asked to walk \
         backward. Write the tag, then your reply."
    )
}
