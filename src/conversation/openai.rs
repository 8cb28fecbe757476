//! `OpenAI`-compatible chat completions client with per-conversation memory

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ConversationService;
use crate::{Error, Result};

/// How the chat client talks to the model
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSettings {
    /// Base URL including the version prefix
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    /// Sent before the history of every request
    pub system_message: Option<String>,
    /// Sent after the user's utterance of every request
    pub forced_system_message: Option<String>,
    /// Exchanges remembered per conversation
    pub max_dialogues: usize,
    /// Conversations idle this long are forgotten
    pub prune_after: Duration,
    /// Sent as `max_tokens`
    pub max_response_tokens: Option<u32>,
    /// Longer utterances are cut to this many characters
    pub max_prompt_chars: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl ChatMessage {
    fn system(content: &str) -> Self {
        Self {
            role: "system",
            content: content.to_string(),
        }
    }

    fn user(content: &str) -> Self {
        Self {
            role: "user",
            content: content.to_string(),
        }
    }

    fn assistant(content: &str) -> Self {
        Self {
            role: "assistant",
            content: content.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Remembered exchanges of one conversation
#[derive(Debug)]
struct History {
    exchanges: VecDeque<(String, String)>,
    last_used: Instant,
}

impl History {
    fn new() -> Self {
        Self {
            exchanges: VecDeque::new(),
            last_used: Instant::now(),
        }
    }
}

/// Chat completions client that remembers each conversation
pub struct ChatClient {
    client: reqwest::Client,
    settings: ChatSettings,
    histories: Mutex<HashMap<String, History>>,
}

impl ChatClient {
    /// # Errors
    ///
    /// Returns error if both system messages are set
    pub fn new(settings: ChatSettings) -> Result<Self> {
        if settings.system_message.is_some() && settings.forced_system_message.is_some() {
            return Err(Error::Config(
                "system_message and forced_system_message are mutually exclusive".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            settings,
            histories: Mutex::new(HashMap::new()),
        })
    }

    /// Number of conversations currently remembered
    #[must_use]
    pub fn conversation_count(&self) -> usize {
        self.histories.lock().map(|h| h.len()).unwrap_or_default()
    }

    /// Cut `text` to the prompt length limit on a character boundary
    fn clip_prompt<'a>(&self, text: &'a str) -> &'a str {
        let Some(limit) = self.settings.max_prompt_chars else {
            return text;
        };
        match text.char_indices().nth(limit) {
            Some((end, _)) => {
                tracing::debug!(limit, "prompt truncated");
                &text[..end]
            }
            None => text,
        }
    }

    /// Messages for a request: system message, remembered exchanges, the new
    /// utterance, forced system message
    fn build_messages(&self, conversation_id: &str, text: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::new();

        if let Some(system) = &self.settings.system_message {
            messages.push(ChatMessage::system(system));
        }

        if let Ok(histories) = self.histories.lock()
            && let Some(history) = histories.get(conversation_id)
        {
            for (user, assistant) in &history.exchanges {
                messages.push(ChatMessage::user(user));
                messages.push(ChatMessage::assistant(assistant));
            }
        }

        messages.push(ChatMessage::user(text));

        if let Some(forced) = &self.settings.forced_system_message {
            messages.push(ChatMessage::system(forced));
        }

        messages
    }

    fn remember(&self, conversation_id: &str, text: &str, reply: &str) {
        let Ok(mut histories) = self.histories.lock() else {
            return;
        };

        let history = histories
            .entry(conversation_id.to_string())
            .or_insert_with(History::new);
        history
            .exchanges
            .push_back((text.to_string(), reply.to_string()));
        while history.exchanges.len() > self.settings.max_dialogues {
            history.exchanges.pop_front();
        }
        history.last_used = Instant::now();
    }

    /// Forget conversations idle longer than the prune threshold
    fn prune(&self) {
        let Ok(mut histories) = self.histories.lock() else {
            return;
        };

        let before = histories.len();
        let prune_after = self.settings.prune_after;
        histories.retain(|_, history| history.last_used.elapsed() < prune_after);

        let pruned = before - histories.len();
        if pruned > 0 {
            tracing::debug!(pruned, "stale conversations forgotten");
        }
    }
}

#[async_trait]
impl ConversationService for ChatClient {
    async fn send_prompt(&self, text: &str, conversation_id: &str) -> Result<String> {
        self.prune();
        let text = self.clip_prompt(text);
        let messages = self.build_messages(conversation_id, text);

        tracing::debug!(
            conversation = conversation_id,
            messages = messages.len(),
            model = %self.settings.model,
            "sending prompt"
        );

        let url = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );
        let request = ChatRequest {
            model: &self.settings.model,
            messages: &messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_response_tokens,
        };

        let mut builder = self.client.post(url).json(&request);
        if !self.settings.api_key.is_empty() {
            builder = builder.bearer_auth(&self.settings.api_key);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat API error");
            return Err(Error::Conversation(format!("chat API error {status}: {body}")));
        }

        let response: ChatResponse = response.json().await?;
        let reply = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| Error::Conversation("empty reply".to_string()))?;

        self.remember(conversation_id, text, &reply);
        tracing::info!(conversation = conversation_id, reply = %reply, "reply received");

        Ok(reply)
    }
}
