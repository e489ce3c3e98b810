//! General-purpose chat assistant with history kept in the workflow context.

use anyhow::{Context, Result};
use llm_client::{ChatMessage, LlmProvider, LlmRequest};

use crate::rewrite::DEFAULT_TEMPERATURE;
use crate::session::WorkflowContext;

pub const ASSISTANT_PROMPT: &str = "You are a helpful assistant.";

pub struct ChatAssistant {
    provider: Box<dyn LlmProvider>,
    system_prompt: String,
    temperature: f32,
}

impl ChatAssistant {
    pub fn new(provider: Box<dyn LlmProvider>) -> Self {
        Self {
            provider,
            system_prompt: ASSISTANT_PROMPT.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Send a prompt along with the conversation so far.
    ///
    /// The user turn is recorded even when the request fails; the reply is
    /// recorded only on success.
    pub async fn ask(&self, context: &mut WorkflowContext, prompt: &str) -> Result<String> {
        context.push_message(ChatMessage::user(prompt));

        let request = LlmRequest::conversation(context.messages.clone())
            .with_system(&self.system_prompt)
            .with_temperature(self.temperature);

        let response = self
            .provider
            .complete(request)
            .await
            .with_context(|| format!("{} chat request failed", self.provider.name()))?;

        let reply = response.content.trim().to_string();
        context.push_message(ChatMessage::assistant(reply.clone()));
        Ok(reply)
    }
}
