//! Bridges rig's `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::completion::{CompletionModel, Message};
use rig::message::AssistantContent;

use crate::error::LlmError;
use crate::llm::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role};

/// Default output budget per completion.
pub const DEFAULT_MAX_TOKENS: u64 = 4096;

/// An `LlmProvider` backed by any rig completion model.
pub struct RigAdapter<M: CompletionModel> {
    model: M,
    model_name: String,
    max_tokens: u64,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
    M::Response: Send + Sync,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let split = split_history(&request.messages).ok_or_else(|| LlmError::EmptyHistory {
            provider: self.model_name.clone(),
        })?;

        let mut builder = self
            .model
            .completion_request(split.prompt)
            .messages(split.history)
            .max_tokens(self.max_tokens);
        if let Some(preamble) = split.preamble {
            builder = builder.preamble(preamble);
        }

        let response = self
            .model
            .completion(builder.build())
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: self.model_name.clone(),
                reason: e.to_string(),
            })?;

        let mut text: Option<String> = None;
        for content in response.choice.iter() {
            if let AssistantContent::Text(t) = content {
                text.get_or_insert_with(String::new).push_str(&t.text);
            }
        }

        let content = text.ok_or_else(|| LlmError::InvalidResponse {
            provider: self.model_name.clone(),
            reason: "response contained no text content".to_string(),
        })?;

        tracing::debug!(model = %self.model_name, chars = content.len(), "Completion received");
        Ok(CompletionResponse { content })
    }
}

/// A chat history split into rig's request shape.
#[derive(Debug)]
struct SplitHistory {
    preamble: Option<String>,
    prompt: Message,
    history: Vec<Message>,
}

/// System messages become the preamble, the trailing user message becomes the
/// prompt, and everything before it is chat history. Returns `None` when the
/// history does not end with a user message.
fn split_history(messages: &[ChatMessage]) -> Option<SplitHistory> {
    let (last, earlier) = messages.split_last()?;
    if last.role != Role::User {
        return None;
    }

    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let preamble = (!system.is_empty()).then(|| system.join("\n\n"));

    let history = earlier
        .iter()
        .filter_map(|m| match m.role {
            Role::User => Some(Message::user(m.content.clone())),
            Role::Assistant => Some(Message::assistant(m.content.clone())),
            Role::System => None,
        })
        .collect();

    Some(SplitHistory {
        preamble,
        prompt: Message::user(last.content.clone()),
        history,
    })
}
