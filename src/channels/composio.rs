//! Gmail via the Composio integration API.
//!
//! Outbound calls (OAuth connection setup, trigger enablement, reply action)
//! go through Composio's REST API with reqwest. Inbound new-message triggers
//! are delivered by Composio to our webhook (see `trigger.rs`).

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::{RwLock, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};

use super::mailbox::{EventStream, Mailbox};
use super::trigger::{NEW_MESSAGE_TRIGGER, trigger_routes};
use crate::error::{ConfigError, MailboxError};

const NAME: &str = "gmail";
const APP_NAME: &str = "gmail";
const DEFAULT_BASE_URL: &str = "https://backend.composio.dev";
const DEFAULT_USER_ID: &str = "cli_user";
const DEFAULT_WEBHOOK_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_ACTIVATION_TIMEOUT_SECS: u64 = 180;
const ACTIVATION_POLL_INTERVAL: Duration = Duration::from_secs(2);

const ACTION_GET_PROFILE: &str = "GMAIL_GET_PROFILE";
const ACTION_REPLY_TO_THREAD: &str = "GMAIL_REPLY_TO_THREAD";

/// Only one event is handed over at a time; the webhook waits for the
/// listener to take it.
const EVENT_BUFFER: usize = 1;

// ── Configuration ───────────────────────────────────────────────────

/// Mailbox configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct MailboxConfig {
    /// Composio integration id for the Gmail app. Not validated here.
    pub integration_id: String,
    /// Entity the connection belongs to.
    pub user_id: String,
    pub api_key: SecretString,
    pub base_url: String,
    pub webhook_addr: SocketAddr,
    pub trigger_name: String,
    pub activation_timeout: Duration,
    pub activation_poll_interval: Duration,
}

impl MailboxConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let integration_id = std::env::var("GMAIL_INTEGRATION_ID").unwrap_or_default();

        let user_id =
            std::env::var("MAIL_ASSIST_USER_ID").unwrap_or_else(|_| DEFAULT_USER_ID.to_string());

        let api_key = SecretString::from(std::env::var("COMPOSIO_API_KEY").unwrap_or_default());

        let base_url = std::env::var("COMPOSIO_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let webhook_addr = std::env::var("MAIL_ASSIST_WEBHOOK_ADDR")
            .unwrap_or_else(|_| DEFAULT_WEBHOOK_ADDR.to_string());
        let webhook_addr: SocketAddr =
            webhook_addr
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                    key: "MAIL_ASSIST_WEBHOOK_ADDR".to_string(),
                    message: e.to_string(),
                })?;

        Ok(Self {
            integration_id,
            user_id,
            api_key,
            base_url,
            webhook_addr,
            trigger_name: NEW_MESSAGE_TRIGGER.to_string(),
            activation_timeout: Duration::from_secs(DEFAULT_ACTIVATION_TIMEOUT_SECS),
            activation_poll_interval: ACTIVATION_POLL_INTERVAL,
        })
    }
}

// ── API shapes ──────────────────────────────────────────────────────

/// Response to initiating an OAuth connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequest {
    pub connected_account_id: String,
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub connection_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConnectedAccount {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct TriggerToggleResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActionResponse {
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default, alias = "successfull")]
    successful: Option<bool>,
}

// ── Mailbox ─────────────────────────────────────────────────────────

/// Gmail mailbox backed by Composio.
pub struct ComposioMailbox {
    config: MailboxConfig,
    http: reqwest::Client,
    connected_account: RwLock<Option<String>>,
}

impl ComposioMailbox {
    pub fn new(config: MailboxConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            connected_account: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &MailboxConfig {
        &self.config
    }

    /// Connected account id, once activation has succeeded.
    pub async fn connected_account(&self) -> Option<String> {
        self.connected_account.read().await.clone()
    }

    /// Run OAuth connection setup and enable the new-message trigger.
    ///
    /// Every step logs its own failure and setup carries on, so the assistant
    /// keeps running (console included) with a possibly non-functional mailbox.
    pub async fn connect(&self) {
        match self.initiate_connection().await {
            Ok(request) => match self.wait_for_activation(&request).await {
                Ok(()) => match self.fetch_profile_email().await {
                    Ok(email) => info!("Connection was successful! User email address: {email}"),
                    Err(e) => error!("Error fetching user profile: {e}"),
                },
                Err(e) => {
                    error!("Connection did not become active within timeout or failed: {e}")
                }
            },
            Err(e) => error!("Error initiating connection: {e}"),
        }

        if let Err(e) = self.enable_trigger().await {
            error!("Error enabling trigger: {e}");
        }
    }

    /// Start an OAuth connection. The returned redirect URL is printed for the
    /// operator to visit.
    pub async fn initiate_connection(&self) -> Result<ConnectionRequest, MailboxError> {
        info!("Initiating OAuth connection...");
        let resp = self
            .http
            .post(self.url("/api/v1/connectedAccounts"))
            .header("x-api-key", self.config.api_key.expose_secret())
            .json(&serde_json::json!({
                "integrationId": self.config.integration_id,
                "entityId": self.config.user_id,
                "data": {},
            }))
            .send()
            .await?;

        let request: ConnectionRequest =
            parse_response(resp)
                .await
                .map_err(|reason| MailboxError::ConnectionFailed {
                    name: NAME.into(),
                    reason,
                })?;

        match request.redirect_url.as_deref() {
            Some(url) if !url.is_empty() => {
                println!("Please, authorize the application by visiting: {url}\n");
                Ok(request)
            }
            _ => Err(MailboxError::ConnectionFailed {
                name: NAME.into(),
                reason: "Expected a redirectUrl for OAuth flow but didn't receive one. \
                         Maybe the integration is misconfigured?"
                    .into(),
            }),
        }
    }

    /// Poll the connected account until it is `ACTIVE` or the activation
    /// timeout elapses.
    pub async fn wait_for_activation(&self, request: &ConnectionRequest) -> Result<(), MailboxError> {
        info!("Waiting for user authorization and connection activation...");
        let account_id = &request.connected_account_id;
        let deadline = tokio::time::Instant::now() + self.config.activation_timeout;

        loop {
            let resp = self
                .http
                .get(self.url(&format!("/api/v1/connectedAccounts/{account_id}")))
                .header("x-api-key", self.config.api_key.expose_secret())
                .send()
                .await?;
            let account: ConnectedAccount =
                parse_response(resp)
                    .await
                    .map_err(|reason| MailboxError::ConnectionFailed {
                        name: NAME.into(),
                        reason,
                    })?;

            debug!(account_id = %account_id, status = %account.status, "Connection status");
            if account.status.eq_ignore_ascii_case("ACTIVE") {
                *self.connected_account.write().await = Some(account_id.clone());
                return Ok(());
            }

            if tokio::time::Instant::now() + self.config.activation_poll_interval > deadline {
                return Err(MailboxError::ActivationTimeout {
                    name: NAME.into(),
                    timeout_secs: self.config.activation_timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.config.activation_poll_interval).await;
        }
    }

    /// Email address of the connected account.
    pub async fn fetch_profile_email(&self) -> Result<String, MailboxError> {
        let data = self
            .execute_action(ACTION_GET_PROFILE, serde_json::json!({}))
            .await?;
        data.pointer("/response_data/emailAddress")
            .or_else(|| data.get("emailAddress"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| MailboxError::ActionFailed {
                name: NAME.into(),
                action: ACTION_GET_PROFILE.into(),
                reason: "response has no emailAddress".into(),
            })
    }

    /// Enable the new-message trigger on the connected account.
    pub async fn enable_trigger(&self) -> Result<(), MailboxError> {
        let trigger = self.config.trigger_name.clone();
        let account_id =
            self.connected_account()
                .await
                .ok_or_else(|| MailboxError::TriggerFailed {
                    name: NAME.into(),
                    trigger: trigger.clone(),
                    reason: "no active connected account".into(),
                })?;

        let resp = self
            .http
            .post(self.url(&format!("/api/v1/triggers/enable/{account_id}/{trigger}")))
            .header("x-api-key", self.config.api_key.expose_secret())
            .json(&serde_json::json!({ "triggerConfig": {} }))
            .send()
            .await?;

        let toggle: TriggerToggleResponse =
            parse_response(resp)
                .await
                .map_err(|reason| MailboxError::TriggerFailed {
                    name: NAME.into(),
                    trigger: trigger.clone(),
                    reason,
                })?;

        if toggle.status.as_deref() != Some("success") {
            return Err(MailboxError::TriggerFailed {
                name: NAME.into(),
                trigger,
                reason: format!(
                    "Failed to enable trigger: {}",
                    toggle.message.unwrap_or_else(|| "unknown error".into())
                ),
            });
        }

        info!(trigger = %trigger, "Trigger enabled");
        Ok(())
    }

    /// Execute a Composio action for our entity and return its `data`.
    async fn execute_action(
        &self,
        action: &str,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, MailboxError> {
        let resp = self
            .http
            .post(self.url(&format!("/api/v2/actions/{action}/execute")))
            .header("x-api-key", self.config.api_key.expose_secret())
            .json(&serde_json::json!({
                "entityId": self.config.user_id,
                "appName": APP_NAME,
                "input": input,
            }))
            .send()
            .await?;

        let action_err = |reason: String| MailboxError::ActionFailed {
            name: NAME.into(),
            action: action.to_string(),
            reason,
        };

        let body: ActionResponse = parse_response(resp).await.map_err(action_err)?;
        if body.successful == Some(false) {
            return Err(action_err(
                body.error.unwrap_or_else(|| "action reported failure".into()),
            ));
        }
        Ok(body.data)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }
}

// ── Mailbox trait ───────────────────────────────────────────────────

#[async_trait]
impl Mailbox for ComposioMailbox {
    fn name(&self) -> &str {
        NAME
    }

    async fn start(&self) -> Result<EventStream, MailboxError> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let app = trigger_routes(self.config.trigger_name.clone(), tx);

        let listener = tokio::net::TcpListener::bind(self.config.webhook_addr)
            .await
            .map_err(|e| MailboxError::StartupFailed {
                name: NAME.into(),
                reason: format!("Failed to bind webhook on {}: {e}", self.config.webhook_addr),
            })?;

        info!(addr = %self.config.webhook_addr, trigger = %self.config.trigger_name, "Trigger webhook listening");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Trigger webhook server stopped: {e}");
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn send_reply(
        &self,
        recipient: &str,
        body: &str,
        thread_id: &str,
    ) -> Result<(), MailboxError> {
        self.execute_action(
            ACTION_REPLY_TO_THREAD,
            serde_json::json!({
                "recipient_email": recipient,
                "message_body": body,
                "thread_id": thread_id,
            }),
        )
        .await
        .map_err(|e| MailboxError::SendFailed {
            name: NAME.into(),
            reason: e.to_string(),
        })?;

        info!(recipient = %recipient, thread_id = %thread_id, "Reply sent");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Decode a JSON body, turning non-2xx statuses into a readable reason.
async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, String> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let preview: String = body.chars().take(300).collect();
        return Err(format!("HTTP {status}: {preview}"));
    }
    resp.json::<T>()
        .await
        .map_err(|e| format!("Invalid response body: {e}"))
}
