use std::sync::Arc;
use std::time::Duration;

use parley_ai::{ChatRequest, GenerationError, LlmClient, Message};
use tracing::warn;

pub const FALLBACK_REPLY: &str = "From a conservative viewpoint, the core of this issue seems to be about personal responsibility rather than a need for more regulation. Individuals should have the freedom to make their own choices, and the market will often provide a better solution than a government program.";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a commentator with a conservative perspective. Provide concise, relevant responses without being inflammatory. Focus on personal responsibility, limited government, and free markets.";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.6;
pub const DEFAULT_GENERATION_TIMEOUT_MS: u64 = 45_000;
/// Line the reply template asks the model to put before the postable reply.
pub const FINAL_COMMENT_MARKER: &str = "FINAL COMMENT:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftSource {
    Generated,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Reply text offered to the operator; never empty.
pub struct ReplyDraft {
    pub text: String,
    pub source: DraftSource,
}

/// Text after the last `FINAL COMMENT:` marker, or the whole completion when there is none.
pub fn extract_final_comment(completion: &str) -> &str {
    match completion.rfind(FINAL_COMMENT_MARKER) {
        Some(index) => completion[index + FINAL_COMMENT_MARKER.len()..]
            .trim()
            .trim_start_matches('*')
            .trim(),
        None => completion.trim(),
    }
}

#[derive(Clone)]
/// Wraps a generation client with the bot's framing, timeout and fallback policy.
pub struct ReplyGenerator {
    client: Arc<dyn LlmClient>,
    model: String,
    temperature: f32,
    system_prompt: String,
    timeout: Duration,
    fallback_reply: String,
}

impl ReplyGenerator {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            timeout: Duration::from_millis(DEFAULT_GENERATION_TIMEOUT_MS),
            fallback_reply: FALLBACK_REPLY.to_string(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Blank fallback text is ignored so drafts stay non-empty.
    pub fn with_fallback_reply(mut self, fallback_reply: impl Into<String>) -> Self {
        let fallback_reply = fallback_reply.into();
        if !fallback_reply.trim().is_empty() {
            self.fallback_reply = fallback_reply;
        }
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(self.system_prompt.clone()),
                Message::user(prompt),
            ],
            max_tokens: None,
            temperature: Some(self.temperature),
        };
        let response = tokio::time::timeout(self.timeout, self.client.complete(request))
            .await
            .map_err(|_| GenerationError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            })??;
        let text = response.message.text_content().trim();
        if text.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(text.to_string())
    }

    /// The final comment from the completion, or the fallback reply when generation
    /// fails or leaves nothing to post.
    pub async fn draft_reply(&self, prompt: &str) -> ReplyDraft {
        match self.generate(prompt).await {
            Ok(completion) => {
                let reply = extract_final_comment(&completion);
                if reply.is_empty() {
                    warn!(model = %self.model, "completion has an empty final comment; using fallback reply");
                    return self.fallback_draft();
                }
                ReplyDraft {
                    text: reply.to_string(),
                    source: DraftSource::Generated,
                }
            }
            Err(error) => {
                warn!(model = %self.model, %error, "generation failed; using fallback reply");
                self.fallback_draft()
            }
        }
    }

    fn fallback_draft(&self) -> ReplyDraft {
        ReplyDraft {
            text: self.fallback_reply.clone(),
            source: DraftSource::Fallback,
        }
    }
}
