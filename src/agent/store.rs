//! In-memory conversation store mapping thread ids to message history.
//!
//! Threads are created on first reference and live for the process lifetime.
//! Each thread sits behind its own lock so a turn on one thread never waits on
//! a model call running for another.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::llm::{ChatMessage, Role};

/// One conversation's append-only history.
#[derive(Debug, Clone, Default)]
pub struct Thread {
    messages: Vec<ChatMessage>,
}

impl Thread {
    /// Append a message.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Get all messages, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Remove the trailing message if it is a user message.
    ///
    /// Only used to undo the user half of a turn whose model call failed.
    pub(crate) fn pop_unanswered(&mut self) -> Option<ChatMessage> {
        if self.messages.last().map(|m| m.role) == Some(Role::User) {
            self.messages.pop()
        } else {
            None
        }
    }

    /// Get message count.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if the thread has no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Shared handle to a single thread.
pub type ThreadHandle = Arc<Mutex<Thread>>;

/// Maps thread ids to their histories.
#[derive(Debug, Default)]
pub struct ConversationStore {
    threads: RwLock<HashMap<String, ThreadHandle>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the thread for `thread_id`, creating it if unseen.
    pub async fn thread(&self, thread_id: &str) -> ThreadHandle {
        if let Some(existing) = self.threads.read().await.get(thread_id) {
            return Arc::clone(existing);
        }

        let mut threads = self.threads.write().await;
        Arc::clone(threads.entry(thread_id.to_string()).or_insert_with(|| {
            tracing::debug!(thread_id = %thread_id, "Created conversation thread");
            Arc::new(Mutex::new(Thread::default()))
        }))
    }

    /// Snapshot of a thread's history. Unknown ids yield an empty history and
    /// are not created.
    pub async fn history(&self, thread_id: &str) -> Vec<ChatMessage> {
        let handle = self.threads.read().await.get(thread_id).cloned();
        match handle {
            Some(thread) => thread.lock().await.messages().to_vec(),
            None => Vec::new(),
        }
    }

    /// Whether a thread has been created for `thread_id`.
    pub async fn contains(&self, thread_id: &str) -> bool {
        self.threads.read().await.contains_key(thread_id)
    }

    /// Number of known threads.
    pub async fn thread_count(&self) -> usize {
        self.threads.read().await.len()
    }
}
