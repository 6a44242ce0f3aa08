//! Runs one conversational turn: user message in, model reply out.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::agent::store::ConversationStore;
use crate::config::TurnConfig;
use crate::error::TurnError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

/// Threads user messages through the model, keeping per-thread history.
pub struct TurnExecutor {
    llm: Arc<dyn LlmProvider>,
    store: Arc<ConversationStore>,
    config: TurnConfig,
}

impl TurnExecutor {
    pub fn new(llm: Arc<dyn LlmProvider>, store: Arc<ConversationStore>, config: TurnConfig) -> Self {
        Self { llm, store, config }
    }

    /// The store this executor appends to.
    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Append `user_text` to `thread_id`, call the model with the full history,
    /// append its reply and return it.
    ///
    /// The thread stays locked for the whole turn, so concurrent turns on the
    /// same id are serialized and the history keeps strict user/assistant
    /// pairing. On a model failure the user message is left in place unless
    /// `rollback_on_failure` is set.
    pub async fn take_turn(&self, thread_id: &str, user_text: &str) -> Result<String, TurnError> {
        if thread_id.is_empty() {
            return Err(TurnError::EmptyThreadId);
        }

        let handle = self.store.thread(thread_id).await;
        let mut thread = handle.lock().await;
        thread.push(ChatMessage::user(user_text));

        let mut messages = Vec::with_capacity(thread.len() + 1);
        if let Some(ref prompt) = self.config.system_prompt {
            messages.push(ChatMessage::system(prompt));
        }
        messages.extend_from_slice(thread.messages());

        debug!(
            thread_id = %thread_id,
            history = thread.len(),
            model = %self.llm.model_name(),
            "Calling model"
        );

        match self.llm.complete(CompletionRequest::new(messages)).await {
            Ok(response) => {
                thread.push(ChatMessage::assistant(&response.content));
                Ok(response.content)
            }
            Err(e) => {
                if self.config.rollback_on_failure {
                    thread.pop_unanswered();
                    warn!(thread_id = %thread_id, "Model call failed; rolled back user message");
                }
                Err(TurnError::Llm(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::error::LlmError;
    use crate::llm::{CompletionResponse, Role};

    /// Replies with "Echo: <last message>".
    struct EchoLlm;

    #[async_trait]
    impl LlmProvider for EchoLlm {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            let last = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(CompletionResponse {
                content: format!("Echo: {last}"),
            })
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl LlmProvider for FailingLlm {
        fn model_name(&self) -> &str {
            "failing"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Err(LlmError::RequestFailed {
                provider: "failing".into(),
                reason: "boom".into(),
            })
        }
    }

    /// Records how many messages each request carried.
    struct CountingLlm {
        seen: std::sync::Mutex<Vec<Vec<ChatMessage>>>,
    }

    #[async_trait]
    impl LlmProvider for CountingLlm {
        fn model_name(&self) -> &str {
            "counting"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.seen.lock().unwrap().push(request.messages);
            Ok(CompletionResponse {
                content: "ok".into(),
            })
        }
    }

    /// Echoes after a short pause so concurrent turns overlap.
    struct SlowEchoLlm;

    #[async_trait]
    impl LlmProvider for SlowEchoLlm {
        fn model_name(&self) -> &str {
            "slow-echo"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            EchoLlm.complete(request).await
        }
    }

    fn executor(llm: Arc<dyn LlmProvider>, config: TurnConfig) -> TurnExecutor {
        TurnExecutor::new(llm, Arc::new(ConversationStore::new()), config)
    }

    #[tokio::test]
    async fn turn_returns_model_reply() {
        let turns = executor(Arc::new(EchoLlm), TurnConfig::default());
        let reply = turns.take_turn("t1", "Hi").await.unwrap();
        assert_eq!(reply, "Echo: Hi");
    }

    #[tokio::test]
    async fn history_grows_by_two_per_turn_in_order() {
        let turns = executor(Arc::new(EchoLlm), TurnConfig::default());
        for i in 0..3 {
            turns.take_turn("t1", &format!("m{i}")).await.unwrap();
        }

        let history = turns.store().history("t1").await;
        assert_eq!(history.len(), 6);
        for (i, pair) in history.chunks(2).enumerate() {
            assert_eq!(pair[0], ChatMessage::user(format!("m{i}")));
            assert_eq!(pair[1], ChatMessage::assistant(format!("Echo: m{i}")));
        }
    }

    #[tokio::test]
    async fn model_sees_full_history() {
        let llm = Arc::new(CountingLlm {
            seen: std::sync::Mutex::new(Vec::new()),
        });
        let turns = executor(llm.clone(), TurnConfig::default());
        turns.take_turn("t1", "one").await.unwrap();
        turns.take_turn("t1", "two").await.unwrap();

        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen[0].len(), 1);
        assert_eq!(seen[1].len(), 3);
        assert_eq!(seen[1][2], ChatMessage::user("two"));
    }

    #[tokio::test]
    async fn system_prompt_is_sent_but_not_stored() {
        let llm = Arc::new(CountingLlm {
            seen: std::sync::Mutex::new(Vec::new()),
        });
        let config = TurnConfig {
            system_prompt: Some("Be brief.".into()),
            ..TurnConfig::default()
        };
        let turns = executor(llm.clone(), config);
        turns.take_turn("t1", "hello").await.unwrap();

        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen[0][0].role, Role::System);
        assert_eq!(seen[0][1], ChatMessage::user("hello"));
        drop(seen);

        let history = turns.store().history("t1").await;
        assert!(history.iter().all(|m| m.role != Role::System));
    }

    #[tokio::test]
    async fn threads_are_isolated() {
        let turns = executor(Arc::new(EchoLlm), TurnConfig::default());
        turns.take_turn("A", "x").await.unwrap();
        turns.take_turn("B", "y").await.unwrap();

        let a = turns.store().history("A").await;
        assert_eq!(a, vec![ChatMessage::user("x"), ChatMessage::assistant("Echo: x")]);
        assert!(a.iter().all(|m| !m.content.contains('y')));
    }

    #[tokio::test]
    async fn empty_user_text_is_accepted() {
        let turns = executor(Arc::new(EchoLlm), TurnConfig::default());
        let reply = turns.take_turn("t1", "").await.unwrap();
        assert_eq!(reply, "Echo: ");
    }

    #[tokio::test]
    async fn empty_thread_id_is_rejected_without_mutation() {
        let turns = executor(Arc::new(EchoLlm), TurnConfig::default());
        let err = turns.take_turn("", "hi").await.unwrap_err();
        assert!(matches!(err, TurnError::EmptyThreadId));
        assert_eq!(turns.store().thread_count().await, 0);
    }

    #[tokio::test]
    async fn failed_model_call_leaves_user_message() {
        let turns = executor(Arc::new(FailingLlm), TurnConfig::default());
        let err = turns.take_turn("t1", "hello").await.unwrap_err();
        assert!(matches!(err, TurnError::Llm(_)));

        let history = turns.store().history("t1").await;
        assert_eq!(history, vec![ChatMessage::user("hello")]);
    }

    #[tokio::test]
    async fn failed_model_call_rolls_back_when_configured() {
        let config = TurnConfig {
            rollback_on_failure: true,
            ..TurnConfig::default()
        };
        let turns = executor(Arc::new(FailingLlm), config);
        assert!(turns.take_turn("t1", "hello").await.is_err());
        assert!(turns.store().history("t1").await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_turns_keep_each_thread_paired() {
        let turns = Arc::new(executor(Arc::new(SlowEchoLlm), TurnConfig::default()));

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let turns = Arc::clone(&turns);
                let id = if i % 2 == 0 { "A" } else { "B" };
                tokio::spawn(async move { turns.take_turn(id, &format!("{id}-{i}")).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        for id in ["A", "B"] {
            let history = turns.store().history(id).await;
            assert_eq!(history.len(), 20);
            for pair in history.chunks(2) {
                assert_eq!(pair[0].role, Role::User);
                assert!(pair[0].content.starts_with(id));
                assert_eq!(pair[1], ChatMessage::assistant(format!("Echo: {}", pair[0].content)));
            }
        }
    }
}
