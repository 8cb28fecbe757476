//! Voice input and output
//!
//! Audio is captured from a named input device, split into utterances by an
//! energy detector and transcribed by a [`Transcriber`]. Replies are spoken
//! through a [`SpeechOutput`] on a named output device.

mod capture;
pub mod devices;
mod listener;
mod playback;
mod segmenter;
mod stt;
mod tts;

use std::fmt;

use async_trait::async_trait;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use listener::{Listener, ListenerState};
pub use playback::AudioPlayback;
pub use segmenter::{DEFAULT_ENERGY_THRESHOLD, SegmenterState, SpeechSegmenter};
pub use stt::{WhisperEndpoint, WhisperTranscriber};
pub use tts::OpenAiSpeech;

use crate::Result;

/// Which transcription engine handles an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SttEngine {
    /// Fast local model, used while listening for the wake word
    #[default]
    Local,
    /// Accurate hosted model, used during conversations
    Cloud,
}

impl fmt::Display for SttEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Cloud => f.write_str("cloud"),
        }
    }
}

/// One captured utterance, mono f32 samples
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioChunk {
    #[must_use]
    pub const fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Length of the utterance in seconds
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Encode as 16-bit PCM WAV
    ///
    /// # Errors
    ///
    /// Returns error if WAV encoding fails
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        samples_to_wav(&self.samples, self.sample_rate)
    }
}

/// Turns speech audio into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe `audio` with the given engine. `keyword_hints` bias the
    /// model toward words that matter to the caller, such as wake words.
    ///
    /// # Errors
    ///
    /// Returns error if the engine is unreachable or rejects the audio
    async fn transcribe(
        &self,
        audio: &AudioChunk,
        engine: SttEngine,
        keyword_hints: &[String],
    ) -> Result<String>;
}

/// Speaks text aloud
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    /// Speak `text`, resolving once playback has finished
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails
    async fn speak(&self, text: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_duration() {
        let chunk = AudioChunk::new(vec![0.0; 8000], SAMPLE_RATE);
        assert!((chunk.duration_secs() - 0.5).abs() < f32::EPSILON);
        assert!(AudioChunk::new(vec![0.0; 10], 0).duration_secs().abs() < f32::EPSILON);
    }

    #[test]
    fn test_engine_default_is_local() {
        assert_eq!(SttEngine::default(), SttEngine::Local);
        assert_eq!(SttEngine::Cloud.to_string(), "cloud");
    }
}
