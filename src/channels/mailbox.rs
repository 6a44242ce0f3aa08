//! The two operations the core needs from an email integration: a stream
//! of inbound events and a reply action.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MailboxError;

/// A new-message notification from the mailbox integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Process-local id for log correlation.
    pub id: Uuid,
    /// Raw sender, possibly in `Display Name <addr>` form.
    pub sender: String,
    /// Message text.
    pub body: String,
    /// Provider thread identifier; doubles as the conversation key.
    pub thread_id: String,
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    pub fn new(
        sender: impl Into<String>,
        body: impl Into<String>,
        thread_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: sender.into(),
            body: body.into(),
            thread_id: thread_id.into(),
            received_at: Utc::now(),
        }
    }
}

/// Stream of inbound events published by a mailbox.
pub type EventStream = Pin<Box<dyn Stream<Item = InboundEvent> + Send>>;

/// An email integration the assistant can listen on and reply through.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Short name for logs and errors.
    fn name(&self) -> &str;

    /// Begin receiving events. The stream ends when the integration stops.
    async fn start(&self) -> Result<EventStream, MailboxError>;

    /// Reply on `thread_id` to `recipient` with `body`.
    async fn send_reply(
        &self,
        recipient: &str,
        body: &str,
        thread_id: &str,
    ) -> Result<(), MailboxError>;
}
