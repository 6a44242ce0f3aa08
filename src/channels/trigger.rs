//! Trigger webhook — receives new-message events pushed by the mailbox
//! integration and publishes matching ones into the event channel.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use super::mailbox::InboundEvent;

/// Trigger fired by the integration for each new inbound email.
pub const NEW_MESSAGE_TRIGGER: &str = "GMAIL_NEW_GMAIL_MESSAGE";

/// Webhook body as delivered by the integration.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerEnvelope {
    #[serde(alias = "triggerName")]
    pub trigger_name: String,
    #[serde(default)]
    pub payload: TriggerPayload,
}

/// Fields of a new-message trigger. Any of them may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerPayload {
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub message_text: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
}

impl TriggerEnvelope {
    /// Convert to an event, defaulting missing fields to empty text.
    pub fn into_event(self) -> InboundEvent {
        let TriggerPayload {
            sender,
            message_text,
            thread_id,
        } = self.payload;
        InboundEvent::new(
            sender.unwrap_or_default(),
            message_text.unwrap_or_default(),
            thread_id.unwrap_or_default(),
        )
    }
}

#[derive(Clone)]
struct TriggerState {
    trigger_name: String,
    events: mpsc::Sender<InboundEvent>,
}

/// Build the webhook router. Envelopes whose trigger name differs from
/// `trigger_name` are acknowledged and dropped.
pub fn trigger_routes(trigger_name: impl Into<String>, events: mpsc::Sender<InboundEvent>) -> Router {
    let state = TriggerState {
        trigger_name: trigger_name.into(),
        events,
    };

    Router::new()
        .route("/health", get(health))
        .route("/trigger", post(receive_trigger))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

async fn receive_trigger(
    State(state): State<TriggerState>,
    Json(envelope): Json<TriggerEnvelope>,
) -> StatusCode {
    if envelope.trigger_name != state.trigger_name {
        debug!(trigger = %envelope.trigger_name, "Ignoring unrelated trigger");
        return StatusCode::OK;
    }

    let event = envelope.into_event();
    info!(event_id = %event.id, thread_id = %event.thread_id, "Received trigger event");

    // Wait for the listener to have room; one event is handled at a time.
    if state.events.send(event).await.is_err() {
        warn!("Event listener closed; dropping trigger event");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::ACCEPTED
}
