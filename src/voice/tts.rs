//! Text-to-speech over the `OpenAI` speech API

use async_trait::async_trait;

use super::{AudioPlayback, SpeechOutput};
use crate::{Error, Result};

/// Synthesizes speech and plays it on an output device
pub struct OpenAiSpeech {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    voice: String,
    speed: f32,
    output_device: Option<String>,
}

impl OpenAiSpeech {
    /// Create a speech output
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(
        base_url: impl Into<String>,
        api_key: String,
        model: impl Into<String>,
        voice: impl Into<String>,
        speed: f32,
        output_device: Option<String>,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            voice: voice.into(),
            speed,
            output_device,
        })
    }

    /// Synthesize `text` to MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
            response_format: &'a str,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
            response_format: "mp3",
        };

        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl SpeechOutput for OpenAiSpeech {
    async fn speak(&self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        tracing::debug!(chars = text.len(), voice = %self.voice, "synthesizing speech");
        let audio = self.synthesize(text).await?;

        let device = self.output_device.clone();
        tokio::task::spawn_blocking(move || {
            AudioPlayback::new(device.as_deref())?.play_mp3(&audio)
        })
        .await
        .map_err(|e| Error::Audio(format!("playback task failed: {e}")))??;

        tracing::info!(text, "spoke");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        assert!(
            OpenAiSpeech::new("https://api.openai.com/v1", String::new(), "tts-1", "alloy", 1.0, None)
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_blank_text_is_silent() {
        let speech = OpenAiSpeech::new(
            "http://127.0.0.1:9",
            "sk-test".to_string(),
            "tts-1",
            "alloy",
            1.0,
            None,
        )
        .unwrap();

        // Never reaches the network
        speech.speak("   ").await.unwrap();
    }
}
