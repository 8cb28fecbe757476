//! Speech-to-text over the Whisper transcription API
//!
//! Both engines speak the `OpenAI` `/audio/transcriptions` protocol: the local
//! engine points at a self-hosted Whisper server, the cloud engine at `OpenAI`.

use async_trait::async_trait;

use super::{AudioChunk, SttEngine, Transcriber};
use crate::{Error, Result};

/// Response from the Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Where and how one engine transcribes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhisperEndpoint {
    /// Base URL including the version prefix, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// ISO-639-1 language hint
    pub language: Option<String>,
}

impl WhisperEndpoint {
    fn url(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url.trim_end_matches('/'))
    }
}

/// Transcribes utterances with a local or cloud Whisper endpoint
pub struct WhisperTranscriber {
    client: reqwest::Client,
    local: WhisperEndpoint,
    cloud: WhisperEndpoint,
}

impl WhisperTranscriber {
    /// Create a transcriber for the two engines
    ///
    /// # Errors
    ///
    /// Returns error if the cloud engine targets `OpenAI` without an API key
    pub fn new(local: WhisperEndpoint, cloud: WhisperEndpoint) -> Result<Self> {
        let keyless = cloud.api_key.as_deref().is_none_or(str::is_empty);
        if keyless && cloud.base_url.contains("api.openai.com") {
            return Err(Error::Config(
                "OpenAI API key required for Whisper".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            local,
            cloud,
        })
    }

    const fn endpoint(&self, engine: SttEngine) -> &WhisperEndpoint {
        match engine {
            SttEngine::Local => &self.local,
            SttEngine::Cloud => &self.cloud,
        }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(
        &self,
        audio: &AudioChunk,
        engine: SttEngine,
        keyword_hints: &[String],
    ) -> Result<String> {
        let endpoint = self.endpoint(engine);
        let wav = audio.to_wav()?;
        tracing::debug!(
            %engine,
            model = %endpoint.model,
            audio_bytes = wav.len(),
            "starting transcription"
        );

        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(wav)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", endpoint.model.clone());

        if let Some(prompt) = hint_prompt(keyword_hints) {
            form = form.text("prompt", prompt);
        }
        if let Some(language) = &endpoint.language {
            form = form.text("language", language.clone());
        }

        let mut request = self.client.post(endpoint.url()).multipart(form);
        if let Some(key) = endpoint.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(%engine, error = %e, "Whisper request failed");
            e
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%engine, status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await?;
        let transcript = result.text.trim().to_string();

        tracing::info!(%engine, transcript = %transcript, "transcription complete");
        Ok(transcript)
    }
}

/// Keyword hints as a Whisper prompt, which biases spelling toward them
fn hint_prompt(keyword_hints: &[String]) -> Option<String> {
    let hints: Vec<&str> = keyword_hints
        .iter()
        .map(|h| h.trim())
        .filter(|h| !h.is_empty())
        .collect();

    (!hints.is_empty()).then(|| hints.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(base_url: &str, api_key: Option<&str>) -> WhisperEndpoint {
        WhisperEndpoint {
            base_url: base_url.to_string(),
            model: "whisper-1".to_string(),
            api_key: api_key.map(String::from),
            language: None,
        }
    }

    #[test]
    fn test_hint_prompt() {
        assert_eq!(hint_prompt(&[]), None);
        assert_eq!(hint_prompt(&[" ".to_string()]), None);
        assert_eq!(
            hint_prompt(&["ringo".to_string(), " hey ringo ".to_string()]),
            Some("ringo, hey ringo".to_string())
        );
    }

    #[test]
    fn test_url_joins_base() {
        let e = endpoint("http://localhost:8000/v1/", None);
        assert_eq!(e.url(), "http://localhost:8000/v1/audio/transcriptions");
    }

    #[test]
    fn test_openai_cloud_requires_key() {
        let local = endpoint("http://localhost:8000/v1", None);

        assert!(
            WhisperTranscriber::new(local.clone(), endpoint("https://api.openai.com/v1", None))
                .is_err()
        );
        assert!(
            WhisperTranscriber::new(
                local,
                endpoint("https://api.openai.com/v1", Some("sk-test"))
            )
            .is_ok()
        );
    }
}
