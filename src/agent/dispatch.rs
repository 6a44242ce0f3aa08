//! Answers inbound email: event, model turn, reply on the same thread.
//!
//! Each event moves through: received, address extracted, turn computed,
//! reply sent. A failure at any stage is reported with the stage that failed;
//! the listener loop logs it once and drops the event. Nothing is retried,
//! acknowledged or requeued here.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{error, info};

use crate::agent::TurnExecutor;
use crate::channels::{EventStream, InboundEvent, Mailbox, extract_address};
use crate::error::DispatchError;

/// What was sent for a successfully answered event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub recipient: String,
    pub reply: String,
    pub thread_id: String,
}

/// Answers inbound emails on their own conversation thread.
pub struct EmailResponder {
    turns: Arc<TurnExecutor>,
    mailbox: Arc<dyn Mailbox>,
}

impl EmailResponder {
    pub fn new(turns: Arc<TurnExecutor>, mailbox: Arc<dyn Mailbox>) -> Self {
        Self { turns, mailbox }
    }

    /// Run one event through the reply sequence.
    pub async fn answer_email(&self, event: &InboundEvent) -> Result<DispatchOutcome, DispatchError> {
        let recipient = extract_address(&event.sender).to_string();
        info!(
            event_id = %event.id,
            sender = %recipient,
            thread_id = %event.thread_id,
            "New email received"
        );

        let reply = self
            .turns
            .take_turn(&event.thread_id, &event.body)
            .await
            .map_err(|source| DispatchError::Turn {
                thread_id: event.thread_id.clone(),
                source,
            })?;

        info!(event_id = %event.id, chars = reply.len(), "Reply computed");

        self.mailbox
            .send_reply(&recipient, &reply, &event.thread_id)
            .await
            .map_err(|source| DispatchError::Reply {
                recipient: recipient.clone(),
                source,
            })?;

        Ok(DispatchOutcome {
            recipient,
            reply,
            thread_id: event.thread_id.clone(),
        })
    }

    /// Consume events until the stream ends, one at a time.
    pub async fn run(&self, mut events: EventStream) {
        info!(mailbox = %self.mailbox.name(), "Email listener started");
        while let Some(event) = events.next().await {
            if let Err(e) = self.answer_email(&event).await {
                error!(event_id = %event.id, "Error processing email: {e}");
            }
        }
        info!(mailbox = %self.mailbox.name(), "Email listener stopped");
    }
}
