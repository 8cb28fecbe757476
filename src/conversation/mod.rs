//! Conversation service
//!
//! The language model behind the character. Replies start with a response
//! tag (see [`crate::router`]) that tells the control loop what to do.

mod openai;

use async_trait::async_trait;

pub use openai::{ChatClient, ChatSettings};

use crate::Result;

/// Produces tagged replies to what the user said
#[async_trait]
pub trait ConversationService: Send + Sync {
    /// Send one user utterance in the given conversation and return the raw
    /// tagged reply
    ///
    /// # Errors
    ///
    /// Returns error if the service is unreachable or returns no reply
    async fn send_prompt(&self, text: &str, conversation_id: &str) -> Result<String>;
}
