use async_trait::async_trait;

use crate::errors::GuiActResult;
use crate::llm::types::ChatMessage;

/// A chat-completion model that can look at screenshots.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Provider identifier, for logs.
    fn name(&self) -> &str;

    /// Sends the conversation and returns the reply text.
    async fn complete(&self, messages: Vec<ChatMessage>) -> GuiActResult<String>;
}
